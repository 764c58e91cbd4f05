use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use rayon::prelude::*;

use crate::geo::node_distance_m;
use crate::models::{GeoNode, GraphMode, NodeId, StreetEdge};

pub const DEFAULT_MAX_CONNECTION_RADIUS_M: f64 = 100.0;
pub const DEFAULT_MAX_CONNECTIONS: usize = 4;

/// Label given to edges materialized from the proximity heuristic.
pub const PROXIMITY_LABEL: &str = "proximity";

/// Tuning for the proximity fallback used when a dataset carries no edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphBuilderConfig {
    pub max_connection_radius_m: f64,
    pub max_connections: usize,
}

impl Default for GraphBuilderConfig {
    fn default() -> Self {
        Self {
            max_connection_radius_m: DEFAULT_MAX_CONNECTION_RADIUS_M,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreetLink {
    pub distance_m: f64,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    pub node: &'a GeoNode,
    pub distance_m: f64,
    pub label: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegreeStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub isolated: usize,
}

/// Immutable adjacency structure over geographic nodes.
///
/// Nodes keep the order in which they were supplied (first occurrence of an
/// id wins) and each node's neighbors keep the order their edges were added.
#[derive(Debug, Clone)]
pub struct StreetGraph {
    graph: DiGraph<GeoNode, StreetLink>,
    index: HashMap<NodeId, NodeIndex>,
    mode: GraphMode,
}

impl StreetGraph {
    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&GeoNode> {
        self.index.get(&id).map(|&idx| &self.graph[idx])
    }

    /// Nodes in input order.
    pub fn nodes(&self) -> impl Iterator<Item = &GeoNode> + '_ {
        self.graph.node_weights()
    }

    /// Outgoing neighbors in insertion order. Unknown ids have none.
    pub fn neighbors(&self, id: NodeId) -> Vec<Neighbor<'_>> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        self.links(idx)
            .into_iter()
            .map(|(to, link)| Neighbor {
                node: &self.graph[to],
                distance_m: link.distance_m,
                label: link.label.as_deref(),
            })
            .collect()
    }

    pub fn degree_stats(&self) -> DegreeStats {
        let degrees: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges(idx).count())
            .collect();

        if degrees.is_empty() {
            return DegreeStats {
                min: 0,
                max: 0,
                mean: 0.0,
                isolated: 0,
            };
        }

        DegreeStats {
            min: degrees.iter().copied().min().unwrap_or(0),
            max: degrees.iter().copied().max().unwrap_or(0),
            mean: degrees.iter().sum::<usize>() as f64 / degrees.len() as f64,
            isolated: degrees.iter().filter(|&&d| d == 0).count(),
        }
    }

    pub(crate) fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.index.get(&id).copied()
    }

    pub(crate) fn node_at(&self, idx: NodeIndex) -> &GeoNode {
        &self.graph[idx]
    }

    pub(crate) fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// petgraph lists a node's edges newest first, so restore insertion order.
    pub(crate) fn links(&self, idx: NodeIndex) -> Vec<(NodeIndex, &StreetLink)> {
        use petgraph::visit::EdgeRef;

        let mut links: Vec<_> = self
            .graph
            .edges(idx)
            .map(|edge| (edge.target(), edge.weight()))
            .collect();
        links.reverse();
        links
    }
}

// Node collection before edges are attached.
struct NodeCollectionState {
    graph: DiGraph<GeoNode, StreetLink>,
    index: HashMap<NodeId, NodeIndex>,
}

impl NodeCollectionState {
    fn collect(nodes: &[GeoNode]) -> Self {
        let mut graph = DiGraph::with_capacity(nodes.len(), nodes.len() * 2);
        let mut index = HashMap::with_capacity(nodes.len());
        let mut duplicates = 0usize;

        for node in nodes {
            if index.contains_key(&node.id) {
                duplicates += 1;
                continue;
            }
            let idx = graph.add_node(node.clone());
            index.insert(node.id, idx);
        }

        if duplicates > 0 {
            tracing::warn!("skipped {} nodes with duplicate ids", duplicates);
        }

        Self { graph, index }
    }

    fn finish(self, mode: GraphMode) -> StreetGraph {
        StreetGraph {
            graph: self.graph,
            index: self.index,
            mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quadrant {
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Quadrant {
    // Zero deltas count as north/east.
    fn between(from: &GeoNode, to: &GeoNode) -> Self {
        let north = to.lat - from.lat >= 0.0;
        let east = to.lon - from.lon >= 0.0;
        match (north, east) {
            (true, true) => Quadrant::NorthEast,
            (true, false) => Quadrant::NorthWest,
            (false, true) => Quadrant::SouthEast,
            (false, false) => Quadrant::SouthWest,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphBuilder {
    config: GraphBuilderConfig,
}

impl GraphBuilder {
    pub fn new(config: GraphBuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GraphBuilderConfig {
        &self.config
    }

    /// Street edges when there are any, proximity heuristic otherwise.
    pub fn build(&self, nodes: &[GeoNode], edges: Option<&[StreetEdge]>) -> StreetGraph {
        match edges {
            Some(edges) if !edges.is_empty() => self.build_from_edges(nodes, edges),
            _ => self.build_by_proximity(nodes),
        }
    }

    /// Attach the supplied directed edges as given. Edges touching unknown
    /// nodes are dropped.
    pub fn build_from_edges(&self, nodes: &[GeoNode], edges: &[StreetEdge]) -> StreetGraph {
        let mut state = NodeCollectionState::collect(nodes);
        let mut skipped = 0usize;

        for edge in edges {
            let (Some(&from), Some(&to)) = (state.index.get(&edge.from), state.index.get(&edge.to))
            else {
                skipped += 1;
                continue;
            };
            state.graph.add_edge(
                from,
                to,
                StreetLink {
                    distance_m: edge.weight,
                    label: Some(edge.label.clone()),
                },
            );
        }

        if skipped > 0 {
            tracing::debug!("dropped {} edges referencing unknown nodes", skipped);
        }

        let graph = state.finish(GraphMode::Streets);
        log_built(&graph);
        graph
    }

    /// Connect every node to its closest neighbors within the radius, at most
    /// one per compass quadrant. The result is not necessarily symmetric.
    pub fn build_by_proximity(&self, nodes: &[GeoNode]) -> StreetGraph {
        let mut state = NodeCollectionState::collect(nodes);
        let links = self.proximity_links(&state.graph);

        for (from, selected) in links.into_iter().enumerate() {
            for (to, distance_m) in selected {
                state.graph.add_edge(
                    NodeIndex::new(from),
                    NodeIndex::new(to),
                    StreetLink {
                        distance_m,
                        label: None,
                    },
                );
            }
        }

        let graph = state.finish(GraphMode::Proximity);
        log_built(&graph);
        graph
    }

    /// Proximity links materialized as street edges, e.g. to precompute a dataset.
    pub fn derive_edges(&self, nodes: &[GeoNode]) -> Vec<StreetEdge> {
        let state = NodeCollectionState::collect(nodes);
        let links = self.proximity_links(&state.graph);

        links
            .into_iter()
            .enumerate()
            .flat_map(|(from, selected)| {
                let from_id = state.graph[NodeIndex::new(from)].id;
                let graph = &state.graph;
                selected.into_iter().map(move |(to, distance_m)| StreetEdge {
                    from: from_id,
                    to: graph[NodeIndex::new(to)].id,
                    weight: distance_m,
                    label: PROXIMITY_LABEL.to_string(),
                })
            })
            .collect()
    }

    // Per-node selections are independent; collect keeps node order.
    fn proximity_links(&self, graph: &DiGraph<GeoNode, StreetLink>) -> Vec<Vec<(usize, f64)>> {
        let nodes: Vec<&GeoNode> = graph.node_weights().collect();
        nodes
            .par_iter()
            .enumerate()
            .map(|(origin, _)| select_neighbors(origin, &nodes, &self.config))
            .collect()
    }
}

fn select_neighbors(origin: usize, nodes: &[&GeoNode], config: &GraphBuilderConfig) -> Vec<(usize, f64)> {
    let node = nodes[origin];

    let mut candidates: Vec<(usize, f64)> = nodes
        .iter()
        .enumerate()
        .filter(|&(other, _)| other != origin)
        .map(|(other, candidate)| (other, node_distance_m(node, candidate)))
        .filter(|&(_, distance)| distance <= config.max_connection_radius_m)
        .collect();
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut filled = [false; 4];
    let mut selected = Vec::with_capacity(config.max_connections.min(filled.len()));

    for (other, distance) in candidates {
        if selected.len() >= config.max_connections {
            break;
        }
        let slot = Quadrant::between(node, nodes[other]).slot();
        if !filled[slot] {
            filled[slot] = true;
            selected.push((other, distance));
        }
    }

    selected
}

fn log_built(graph: &StreetGraph) {
    let stats = graph.degree_stats();
    tracing::debug!(
        "street graph built ({:?}): {} nodes, {} edges, degree min={} max={} avg={:.2}, {} isolated",
        graph.mode(),
        graph.node_count(),
        graph.edge_count(),
        stats.min,
        stats.max,
        stats.mean,
        stats.isolated
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: NodeId, lat: f64, lon: f64) -> GeoNode {
        GeoNode {
            id,
            lat,
            lon,
            elevation: None,
        }
    }

    fn edge(from: NodeId, to: NodeId, weight: f64, label: &str) -> StreetEdge {
        StreetEdge {
            from,
            to,
            weight,
            label: label.to_string(),
        }
    }

    fn triangle() -> Vec<GeoNode> {
        vec![
            node(1, 0.0, 0.0),
            node(2, 0.0, 0.0005),
            node(3, 0.0005, 0.0005),
        ]
    }

    fn neighbor_ids(graph: &StreetGraph, id: NodeId) -> Vec<NodeId> {
        graph.neighbors(id).iter().map(|n| n.node.id).collect()
    }

    #[test]
    fn explicit_edges_keep_weight_label_and_direction() {
        let edges = vec![
            edge(1, 2, 50.0, "A St"),
            edge(2, 3, 50.0, "B St"),
            edge(1, 3, 150.0, "C St"),
        ];
        let graph = GraphBuilder::default().build(&triangle(), Some(&edges));

        assert_eq!(graph.mode(), GraphMode::Streets);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(neighbor_ids(&graph, 1), vec![2, 3]);
        assert!(graph.neighbors(3).is_empty(), "edges are not symmetrized");

        let first = graph.neighbors(1)[0];
        assert_eq!(first.distance_m, 50.0);
        assert_eq!(first.label, Some("A St"));
        assert_eq!(graph.neighbors(1)[1].distance_m, 150.0);
    }

    #[test]
    fn neighbors_follow_edge_insertion_order() {
        let nodes = vec![
            node(1, 0.0, 0.0),
            node(2, 0.0, 0.001),
            node(3, 0.001, 0.0),
            node(4, 0.001, 0.001),
        ];
        let edges = vec![
            edge(1, 4, 10.0, "x"),
            edge(1, 2, 10.0, "y"),
            edge(1, 3, 10.0, "z"),
        ];
        let graph = GraphBuilder::default().build(&nodes, Some(&edges));
        assert_eq!(neighbor_ids(&graph, 1), vec![4, 2, 3]);
    }

    #[test]
    fn edges_to_unknown_nodes_are_skipped() {
        let edges = vec![
            edge(1, 2, 50.0, "A St"),
            edge(1, 99, 10.0, "Ghost St"),
            edge(42, 3, 10.0, "Ghost Ave"),
        ];
        let graph = GraphBuilder::default().build(&triangle(), Some(&edges));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(neighbor_ids(&graph, 1), vec![2]);
        assert!(!graph.contains(99));
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let mut nodes = triangle();
        nodes.push(node(2, 10.0, 10.0));
        let graph = GraphBuilder::default().build(&nodes, None);

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.node(2).map(|n| n.lat), Some(0.0));
    }

    #[test]
    fn empty_edge_list_falls_back_to_proximity() {
        let graph = GraphBuilder::default().build(&triangle(), Some(&[]));
        assert_eq!(graph.mode(), GraphMode::Proximity);
        assert!(graph.edge_count() > 0);
    }

    #[test]
    fn proximity_connects_nearest_neighbor() {
        let builder = GraphBuilder::new(GraphBuilderConfig {
            max_connection_radius_m: 1_000.0,
            max_connections: 4,
        });
        let nodes = triangle();
        let graph = builder.build(&nodes, None);

        for node in &nodes {
            let nearest = nodes
                .iter()
                .filter(|other| other.id != node.id)
                .min_by(|a, b| node_distance_m(node, a).total_cmp(&node_distance_m(node, b)))
                .map(|n| n.id)
                .unwrap();
            assert!(
                neighbor_ids(&graph, node.id).contains(&nearest),
                "node {} should reach its nearest node {}",
                node.id,
                nearest
            );
        }
    }

    #[test]
    fn proximity_uses_haversine_weights_and_no_label() {
        let builder = GraphBuilder::new(GraphBuilderConfig {
            max_connection_radius_m: 1_000.0,
            max_connections: 4,
        });
        let nodes = triangle();
        let graph = builder.build(&nodes, None);

        let link = graph.neighbors(1)[0];
        assert_eq!(link.node.id, 2);
        assert_eq!(link.distance_m, node_distance_m(&nodes[0], &nodes[1]));
        assert_eq!(link.label, None);
    }

    #[test]
    fn proximity_respects_radius() {
        let nodes = vec![node(1, 0.0, 0.0), node(2, 0.0, 0.01)];
        let graph = GraphBuilder::default().build(&nodes, None);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.degree_stats().isolated, 2);
    }

    #[test]
    fn proximity_takes_one_neighbor_per_quadrant() {
        // Two candidates due east; only the closer one is kept.
        let nodes = vec![
            node(1, 0.0, 0.0),
            node(2, 0.0, 0.0002),
            node(3, 0.0, 0.0004),
            node(4, 0.0003, -0.0001),
        ];
        let graph = GraphBuilder::default().build(&nodes, None);
        assert_eq!(neighbor_ids(&graph, 1), vec![2, 4]);
    }

    #[test]
    fn proximity_can_be_asymmetric() {
        // 1 sees 2 alone in its NE quadrant, but from 2 both 1 and 3 lie to
        // the SW and 3 is closer.
        let nodes = vec![
            node(1, 0.0, 0.0),
            node(2, 0.0003, 0.0003),
            node(3, 0.0002, -0.0001),
        ];
        let graph = GraphBuilder::default().build(&nodes, None);

        assert_eq!(neighbor_ids(&graph, 1), vec![3, 2]);
        assert_eq!(neighbor_ids(&graph, 2), vec![3]);
        assert_eq!(neighbor_ids(&graph, 3), vec![1, 2]);
    }

    #[test]
    fn max_connections_caps_degree() {
        let builder = GraphBuilder::new(GraphBuilderConfig {
            max_connection_radius_m: 1_000.0,
            max_connections: 2,
        });
        let nodes = vec![
            node(1, 0.0, 0.0),
            node(2, 0.0001, 0.0001),
            node(3, 0.0001, -0.0002),
            node(4, -0.0003, 0.0001),
            node(5, -0.0004, -0.0004),
        ];
        let graph = builder.build(&nodes, None);
        assert_eq!(neighbor_ids(&graph, 1), vec![2, 3]);
        assert!(graph.degree_stats().max <= 2);
    }

    #[test]
    fn derive_edges_matches_proximity_graph() {
        let builder = GraphBuilder::new(GraphBuilderConfig {
            max_connection_radius_m: 1_000.0,
            max_connections: 4,
        });
        let nodes = triangle();
        let graph = builder.build(&nodes, None);
        let edges = builder.derive_edges(&nodes);

        assert_eq!(edges.len(), graph.edge_count());
        assert!(edges.iter().all(|e| e.label == PROXIMITY_LABEL));

        let rebuilt = builder.build(&nodes, Some(&edges));
        for node in &nodes {
            assert_eq!(neighbor_ids(&rebuilt, node.id), neighbor_ids(&graph, node.id));
        }
    }

    #[test]
    fn degree_stats_on_empty_graph() {
        let graph = GraphBuilder::default().build(&[], None);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.degree_stats().max, 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn cluster() -> impl Strategy<Value = Vec<GeoNode>> {
            prop::collection::vec((-0.002f64..0.002, -0.002f64..0.002), 1..40).prop_map(|coords| {
                coords
                    .into_iter()
                    .enumerate()
                    .map(|(i, (lat, lon))| node(i as NodeId + 1, 24.8 + lat, -107.39 + lon))
                    .collect()
            })
        }

        proptest! {
            #[test]
            fn prop_degree_never_exceeds_max_connections(nodes in cluster(), max in 0usize..6) {
                let builder = GraphBuilder::new(GraphBuilderConfig {
                    max_connection_radius_m: 150.0,
                    max_connections: max,
                });
                let graph = builder.build(&nodes, None);
                for node in &nodes {
                    prop_assert!(graph.neighbors(node.id).len() <= max.min(4));
                }
            }

            #[test]
            fn prop_links_stay_within_radius_and_skip_self(nodes in cluster()) {
                let graph = GraphBuilder::default().build(&nodes, None);
                for node in &nodes {
                    for neighbor in graph.neighbors(node.id) {
                        prop_assert!(neighbor.node.id != node.id);
                        prop_assert!(neighbor.distance_m <= DEFAULT_MAX_CONNECTION_RADIUS_M);
                    }
                }
            }
        }
    }
}
