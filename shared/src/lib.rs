use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod playback;

pub use playback::{DEFAULT_SPEED_MS, Playback, PlaybackError};

pub type NodeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoNode {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub elevation: Option<f64>,
}

impl GeoNode {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// Directed, weighted street segment. Bidirectional streets need both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// Length in meters.
    pub weight: f64,
    #[serde(rename = "street_name", alias = "label", default)]
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Initialize,
    SelectMin,
    Explore,
    FoundTarget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmStep {
    pub step: u32,
    pub action: StepAction,
    pub current_node: NodeId,
    /// Finalized nodes, in the order they were finalized.
    pub explored_nodes: Vec<NodeId>,
    pub frontier: Vec<NodeId>,
    /// Only finite distances are reported.
    pub distances: BTreeMap<NodeId, f64>,
    pub description: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphMode {
    /// Explicit street edges.
    Streets,
    /// Proximity heuristic, no edges were supplied.
    Proximity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRequest {
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRouteRequest {
    pub nodes: Vec<GeoNode>,
    #[serde(default)]
    pub edges: Option<Vec<StreetEdge>>,
    pub source: NodeId,
    pub target: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub route: Vec<GeoNode>,
    pub steps: Vec<AlgorithmStep>,
    pub total_distance_meters: f64,
    pub nodes_explored: usize,
    pub elapsed_ms: f64,
    pub mode: GraphMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    #[serde(default = "default_search_radius_m")]
    pub radius_m: f64,
    #[serde(default = "default_nearby_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyNode {
    pub node: GeoNode,
    pub distance_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

pub fn default_search_radius_m() -> f64 {
    1000.0
}

pub fn default_nearby_limit() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_accepts_street_name_or_label() {
        let from_osm: StreetEdge =
            serde_json::from_str(r#"{"from":1,"to":2,"weight":12.5,"street_name":"Av. Obregón"}"#)
                .unwrap();
        let from_label: StreetEdge =
            serde_json::from_str(r#"{"from":1,"to":2,"weight":12.5,"label":"Av. Obregón"}"#).unwrap();
        assert_eq!(from_osm, from_label);

        let unnamed: StreetEdge = serde_json::from_str(r#"{"from":1,"to":2,"weight":3.0}"#).unwrap();
        assert!(unnamed.label.is_empty());
    }

    #[test]
    fn node_elevation_is_optional() {
        let node: GeoNode = serde_json::from_str(r#"{"id":7,"lat":24.8,"lon":-107.39}"#).unwrap();
        assert_eq!(node.elevation, None);

        let node: GeoNode =
            serde_json::from_str(r#"{"id":7,"lat":24.8,"lon":-107.39,"elevation":null}"#).unwrap();
        assert_eq!(node.elevation, None);
    }

    #[test]
    fn step_action_uses_snake_case() {
        let json = serde_json::to_string(&StepAction::FoundTarget).unwrap();
        assert_eq!(json, "\"found_target\"");
        let json = serde_json::to_string(&StepAction::SelectMin).unwrap();
        assert_eq!(json, "\"select_min\"");
    }

    #[test]
    fn nearby_query_defaults() {
        let query: NearbyQuery = serde_json::from_str(r#"{"lat":1.0,"lon":2.0}"#).unwrap();
        assert_eq!(query.radius_m, 1000.0);
        assert_eq!(query.limit, 10);
    }
}
