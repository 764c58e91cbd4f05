use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};

use lru::LruCache;

use crate::{
    graph::{GraphBuilder, GraphBuilderConfig, StreetGraph},
    models::{GeoNode, NodeId, StreetEdge},
};

/// Recently built graphs for custom route requests. Entries are bucketed by
/// a payload fingerprint and only served when the stored payload matches
/// exactly. Graphs are immutable once cached.
pub struct GraphCache {
    entries: Mutex<LruCache<u64, CachedGraph>>,
}

struct CachedGraph {
    key: GraphKey,
    graph: Arc<StreetGraph>,
}

// Exact copy of everything that shapes a built graph. Floats compare by bits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GraphKey {
    nodes: Vec<(NodeId, u64, u64, Option<u64>)>,
    edges: Vec<(NodeId, NodeId, u64, String)>,
    // Only proximity graphs depend on the builder settings.
    proximity: Option<(u64, usize)>,
}

impl GraphKey {
    fn new(nodes: &[GeoNode], edges: Option<&[StreetEdge]>, config: &GraphBuilderConfig) -> Self {
        let nodes = nodes
            .iter()
            .map(|node| {
                (
                    node.id,
                    node.lat.to_bits(),
                    node.lon.to_bits(),
                    node.elevation.map(f64::to_bits),
                )
            })
            .collect();

        match edges {
            Some(edges) if !edges.is_empty() => Self {
                nodes,
                edges: edges
                    .iter()
                    .map(|edge| (edge.from, edge.to, edge.weight.to_bits(), edge.label.clone()))
                    .collect(),
                proximity: None,
            },
            // Empty and absent edge lists build the same proximity graph.
            _ => Self {
                nodes,
                edges: Vec::new(),
                proximity: Some((config.max_connection_radius_m.to_bits(), config.max_connections)),
            },
        }
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl GraphCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_or_build(
        &self,
        nodes: &[GeoNode],
        edges: Option<&[StreetEdge]>,
        builder: &GraphBuilder,
    ) -> Arc<StreetGraph> {
        let key = GraphKey::new(nodes, edges, builder.config());
        let bucket = key.fingerprint();
        self.get_or_build_in(bucket, key, nodes, edges, builder)
    }

    fn get_or_build_in(
        &self,
        bucket: u64,
        key: GraphKey,
        nodes: &[GeoNode],
        edges: Option<&[StreetEdge]>,
        builder: &GraphBuilder,
    ) -> Arc<StreetGraph> {
        if let Some(cached) = self.lock().get(&bucket) {
            if cached.key == key {
                tracing::debug!("graph cache hit ({:016x})", bucket);
                return Arc::clone(&cached.graph);
            }
            tracing::warn!("graph cache fingerprint collision ({:016x}), rebuilding", bucket);
        }

        // Built outside the lock; concurrent misses for the same key both build.
        let graph = Arc::new(builder.build(nodes, edges));
        self.lock().put(
            bucket,
            CachedGraph {
                key,
                graph: Arc::clone(&graph),
            },
        );
        tracing::debug!("graph cache miss ({:016x}), {} nodes", bucket, graph.node_count());
        graph
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<u64, CachedGraph>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
