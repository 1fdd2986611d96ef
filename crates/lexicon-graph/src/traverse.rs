//! Neighborhood traversal over a graph store.
//!
//! The store hands back candidate rows; this module owns the result
//! semantics: per-hop ranking and truncation, duplicate-pair merging, and
//! the hop-2 edge cases.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::model::{Depth, EdgeRecord, NeighborRecord, NodeRecord};
use crate::store::{GraphStore, StoreError};

/// Error types for traversal.
#[derive(Debug, thiserror::Error)]
pub enum GraphQueryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, GraphQueryError>;

/// Deduplicated traversal output prior to assembly. Map ordering doubles
/// as the response ordering.
#[derive(Debug)]
pub struct Subgraph {
    /// Nodes by id, center included.
    pub nodes: BTreeMap<String, NodeRecord>,
    /// One edge per ordered (source, target) pair, max weight kept.
    pub links: BTreeMap<(String, String), EdgeRecord>,
}

/// Collect the bounded neighborhood of `center`.
///
/// Each hop's candidates are ranked by weight descending, ties broken by
/// ascending (source, target), and truncated to `per_hop_limit`. Duplicate
/// pairs are merged before ranking so they cannot consume slots. A row only
/// lands if its edge attaches to a node the previous hop kept: hop-2 rows
/// landing back on the center, or routed through a neighbor that truncation
/// dropped, are discarded. Hop-2 rows between two nodes already in the
/// result add the link without growing the node set.
///
/// An empty neighborhood is a valid result with just the center. The
/// center's existence is the resolver's concern and is not re-checked.
pub async fn collect_subgraph(
    store: &dyn GraphStore,
    center: &NodeRecord,
    depth: Depth,
    per_hop_limit: u32,
) -> Result<Subgraph> {
    let candidates = store.neighborhood(&center.id, depth, per_hop_limit).await?;

    let mut subgraph = Subgraph {
        nodes: BTreeMap::new(),
        links: BTreeMap::new(),
    };
    subgraph.nodes.insert(center.id.clone(), center.clone());

    for hop in [1u8, 2] {
        let rows: Vec<&NeighborRecord> = candidates.iter().filter(|r| r.hop == hop).collect();
        if !rows.is_empty() {
            apply_hop(&mut subgraph, &center.id, hop, rows, per_hop_limit as usize);
        }
    }

    debug!(
        center = %center.id,
        nodes = subgraph.nodes.len(),
        links = subgraph.links.len(),
        "subgraph collected"
    );
    Ok(subgraph)
}

fn apply_hop(
    subgraph: &mut Subgraph,
    center_id: &str,
    hop: u8,
    rows: Vec<&NeighborRecord>,
    limit: usize,
) {
    // Nodes this hop may extend from: the center at hop 1, the kept hop-1
    // frontier at hop 2. Extending from a node added within the same hop
    // would land the far endpoint one hop deeper than the depth promises.
    let anchors: BTreeSet<String> = subgraph.nodes.keys().cloned().collect();

    // Merge duplicate pairs first, keeping the strongest observation.
    let mut merged: BTreeMap<(String, String), &NeighborRecord> = BTreeMap::new();
    for row in rows {
        if hop == 2 && row.node.id == center_id {
            // Trivial back-edge.
            continue;
        }
        let key = (row.edge.source_id.clone(), row.edge.target_id.clone());
        match merged.get(&key) {
            Some(existing) if existing.edge.weight >= row.edge.weight => {}
            _ => {
                merged.insert(key, row);
            }
        }
    }

    let mut ranked: Vec<&NeighborRecord> = merged.into_values().collect();
    ranked.sort_by(|a, b| {
        b.edge
            .weight
            .partial_cmp(&a.edge.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.edge.source_id.cmp(&b.edge.source_id))
            .then_with(|| a.edge.target_id.cmp(&b.edge.target_id))
    });
    ranked.truncate(limit);

    for row in ranked {
        let far_id = &row.node.id;
        let Some(near_id) = row.edge.other_endpoint(far_id) else {
            // The edge does not involve the row's own node.
            continue;
        };

        let far_present = subgraph.nodes.contains_key(far_id);
        if far_present && subgraph.nodes.contains_key(near_id) {
            // Cross edge between nodes already in the result: link only.
        } else if !far_present && anchors.contains(near_id) {
            subgraph.nodes.insert(far_id.clone(), row.node.clone());
        } else {
            // Detached row. A backend may rank paths through a neighbor
            // that truncation dropped; keeping the edge would dangle and
            // keeping the node would overshoot the depth.
            continue;
        }

        let key = (row.edge.source_id.clone(), row.edge.target_id.clone());
        match subgraph.links.get(&key) {
            Some(existing) if existing.weight >= row.edge.weight => {}
            _ => {
                subgraph.links.insert(key, row.edge.clone());
            }
        }
    }
}
