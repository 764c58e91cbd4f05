use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};

use petgraph::graph::NodeIndex;

use crate::{
    dataset::{Dataset, DatasetError},
    geo::haversine_m,
    graph::{GraphBuilder, GraphBuilderConfig, StreetGraph},
    models::{AlgorithmStep, Coordinate, GeoNode, NearbyNode, NodeId, StepAction, StreetEdge},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Source,
    Target,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Source => f.write_str("source"),
            NodeRole::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{role} node {id} not found in graph")]
    UnknownNode { role: NodeRole, id: NodeId },
}

/// Outcome of one route computation.
///
/// An unreachable target is not an error: `route` is empty and `steps`
/// ends without a [`StepAction::FoundTarget`] record.
#[derive(Debug, Clone)]
pub struct RouteTrace {
    pub route: Vec<GeoNode>,
    pub steps: Vec<AlgorithmStep>,
    /// Sum of edge weights along `route`, 0 when unreachable.
    pub total_distance_m: f64,
    pub nodes_explored: usize,
}

impl RouteTrace {
    pub fn is_reachable(&self) -> bool {
        !self.route.is_empty()
    }

    pub fn found_target(&self) -> bool {
        self.steps
            .last()
            .is_some_and(|step| step.action == StepAction::FoundTarget)
    }
}

/// Build a graph from raw data and route over it.
///
/// Source and target are checked against `nodes` before any graph is built,
/// so an invalid request never produces a partial trace.
pub fn compute_route(
    nodes: &[GeoNode],
    edges: Option<&[StreetEdge]>,
    source: NodeId,
    target: NodeId,
    config: &GraphBuilderConfig,
) -> Result<RouteTrace, EngineError> {
    check_endpoints(nodes, source, target)?;

    let graph = GraphBuilder::new(*config).build(nodes, edges);
    find_route(&graph, source, target)
}

/// Fails with [`EngineError::UnknownNode`] unless both ids occur in `nodes`.
pub fn check_endpoints(nodes: &[GeoNode], source: NodeId, target: NodeId) -> Result<(), EngineError> {
    ensure_present(nodes, source, NodeRole::Source)?;
    ensure_present(nodes, target, NodeRole::Target)
}

fn ensure_present(nodes: &[GeoNode], id: NodeId, role: NodeRole) -> Result<(), EngineError> {
    if nodes.iter().any(|node| node.id == id) {
        Ok(())
    } else {
        Err(EngineError::UnknownNode { role, id })
    }
}

/// Dijkstra from `source` to `target`, recording every observable state change.
///
/// # Algorithm
///
/// Classic uninformed Dijkstra with a linear scan for the minimum, which is
/// enough at the few-thousand-node scale this serves. Ties resolve to the
/// first node in graph order, so identical inputs give identical traces.
///
/// ## Trace
/// - `initialize`: source at distance 0
/// - `initialize`: source at distance 0, frontier `[source]`
/// - `select_min`: the closest unvisited node is chosen (still in the frontier)
/// - `found_target`: the chosen node is the target, search stops before it is
///   finalized; the frontier is empty
/// - `explore`: only emitted when at least one neighbor distance improved
///
/// Otherwise the frontier lists every unvisited node in graph order, reached
/// or not. The distance map only holds finite entries. Once a node is
/// finalized it never returns to the frontier.
///
/// # Errors
/// [`EngineError::UnknownNode`] when either endpoint is missing from the graph.
pub fn find_route(
    graph: &StreetGraph,
    source: NodeId,
    target: NodeId,
) -> Result<RouteTrace, EngineError> {
    let source_idx = graph.index_of(source).ok_or(EngineError::UnknownNode {
        role: NodeRole::Source,
        id: source,
    })?;
    let target_idx = graph.index_of(target).ok_or(EngineError::UnknownNode {
        role: NodeRole::Target,
        id: target,
    })?;

    let mut search = Search::new(graph, source_idx);
    search.record(
        StepAction::Initialize,
        source_idx,
        "Initializing: source distance = 0, all others = ∞".to_string(),
    );

    if source_idx == target_idx {
        tracing::debug!("source equals target ({}), trivial route", source);
        return Ok(RouteTrace {
            route: vec![graph.node_at(source_idx).clone()],
            steps: search.steps,
            total_distance_m: 0.0,
            nodes_explored: 0,
        });
    }

    let mut found = false;

    while let Some(current) = search.closest_unvisited() {
        let distance = search.distances[current.index()];
        let current_id = graph.node_at(current).id;
        search.record(
            StepAction::SelectMin,
            current,
            format!(
                "Selecting node with minimum distance: {} (distance: {:.0} m)",
                current_id, distance
            ),
        );

        if current == target_idx {
            search.record(
                StepAction::FoundTarget,
                current,
                "Target reached! Reconstructing optimal path".to_string(),
            );
            found = true;
            break;
        }

        search.finalize(current);

        let updated = search.relax(current);
        if updated > 0 {
            search.record(
                StepAction::Explore,
                current,
                format!("Exploring node {}: updated {} neighbors", current_id, updated),
            );
        }
    }

    let route = if found {
        search.reconstruct(source_idx, target_idx)
    } else {
        Vec::new()
    };
    let total_distance_m = if route.is_empty() {
        0.0
    } else {
        search.distances[target_idx.index()]
    };

    tracing::debug!(
        "route {} -> {}: {} nodes, {:.1} m, {} steps, {} explored",
        source,
        target,
        route.len(),
        total_distance_m,
        search.steps.len(),
        search.explored.len()
    );

    Ok(RouteTrace {
        route,
        total_distance_m,
        nodes_explored: search.explored.len(),
        steps: search.steps,
    })
}

// Per-run state, indexed by NodeIndex.
struct Search<'g> {
    graph: &'g StreetGraph,
    distances: Vec<f64>,
    previous: Vec<Option<NodeIndex>>,
    visited: Vec<bool>,
    explored: Vec<NodeId>,
    steps: Vec<AlgorithmStep>,
}

impl<'g> Search<'g> {
    fn new(graph: &'g StreetGraph, source: NodeIndex) -> Self {
        let count = graph.node_count();
        let mut distances = vec![f64::INFINITY; count];
        distances[source.index()] = 0.0;

        Self {
            graph,
            distances,
            previous: vec![None; count],
            visited: vec![false; count],
            explored: Vec::new(),
            steps: Vec::new(),
        }
    }

    // First minimum in graph order wins.
    fn closest_unvisited(&self) -> Option<NodeIndex> {
        let mut best: Option<(NodeIndex, f64)> = None;
        for idx in self.graph.node_indices() {
            if self.visited[idx.index()] {
                continue;
            }
            let distance = self.distances[idx.index()];
            if !distance.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((idx, distance));
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn finalize(&mut self, idx: NodeIndex) {
        self.visited[idx.index()] = true;
        self.explored.push(self.graph.node_at(idx).id);
    }

    /// Returns how many distinct neighbors got a shorter distance.
    fn relax(&mut self, current: NodeIndex) -> usize {
        let base = self.distances[current.index()];
        let mut updated: Vec<NodeIndex> = Vec::new();

        let graph = self.graph;
        for (neighbor, link) in graph.links(current) {
            if neighbor == current || self.visited[neighbor.index()] {
                continue;
            }
            let candidate = base + link.distance_m;
            if candidate < self.distances[neighbor.index()] {
                self.distances[neighbor.index()] = candidate;
                self.previous[neighbor.index()] = Some(current);
                if !updated.contains(&neighbor) {
                    updated.push(neighbor);
                }
            }
        }

        updated.len()
    }

    fn record(&mut self, action: StepAction, current: NodeIndex, description: String) {
        let frontier = match action {
            StepAction::Initialize => vec![self.graph.node_at(current).id],
            StepAction::FoundTarget => Vec::new(),
            StepAction::SelectMin | StepAction::Explore => self
                .graph
                .node_indices()
                .filter(|idx| !self.visited[idx.index()])
                .map(|idx| self.graph.node_at(idx).id)
                .collect(),
        };

        let distances: BTreeMap<NodeId, f64> = self
            .graph
            .node_indices()
            .filter(|idx| self.distances[idx.index()].is_finite())
            .map(|idx| (self.graph.node_at(idx).id, self.distances[idx.index()]))
            .collect();

        self.steps.push(AlgorithmStep {
            step: self.steps.len() as u32 + 1,
            action,
            current_node: self.graph.node_at(current).id,
            explored_nodes: self.explored.clone(),
            frontier,
            distances,
            description,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        });
    }

    fn reconstruct(&self, source: NodeIndex, target: NodeIndex) -> Vec<GeoNode> {
        let mut path = Vec::new();
        let mut cursor = Some(target);

        while let Some(idx) = cursor {
            path.push(self.graph.node_at(idx).clone());
            if idx == source || path.len() > self.graph.node_count() {
                break;
            }
            cursor = self.previous[idx.index()];
        }

        if path.last().map(|node| node.id) != Some(self.graph.node_at(source).id) {
            tracing::debug!("predecessor chain does not reach the source");
            return Vec::new();
        }

        path.reverse();
        path
    }
}

/// Routing over one dataset loaded at startup.
///
/// The graph is built once and shared read-only between requests; every
/// call to [`RouteEngine::find_route`] runs with its own search state.
#[derive(Debug, Clone)]
pub struct RouteEngine {
    graph: Arc<StreetGraph>,
}

impl RouteEngine {
    pub fn new(graph: Arc<StreetGraph>) -> Self {
        Self { graph }
    }

    pub fn from_dataset(dataset: &Dataset, builder: &GraphBuilder) -> Self {
        Self::new(Arc::new(builder.build(&dataset.nodes, dataset.edges())))
    }

    pub fn from_file(path: impl AsRef<Path>, builder: &GraphBuilder) -> Result<Self, DatasetError> {
        let dataset = Dataset::read_from_path(path)?;
        Ok(Self::from_dataset(&dataset, builder))
    }

    pub fn graph(&self) -> &StreetGraph {
        &self.graph
    }

    pub fn find_route(&self, source: NodeId, target: NodeId) -> Result<RouteTrace, EngineError> {
        find_route(&self.graph, source, target)
    }

    /// Nodes within `radius_m` of `center`, closest first.
    pub fn nearby_nodes(&self, center: Coordinate, radius_m: f64, limit: usize) -> Vec<NearbyNode> {
        let mut nearby: Vec<NearbyNode> = self
            .graph
            .nodes()
            .map(|node| NearbyNode {
                distance_m: haversine_m(center, node.coordinate()),
                node: node.clone(),
            })
            .filter(|candidate| candidate.distance_m <= radius_m)
            .collect();

        nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        nearby.truncate(limit);
        nearby
    }
}
