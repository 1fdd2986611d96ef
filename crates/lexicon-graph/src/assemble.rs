//! Response assembly.

use crate::model::{GraphResult, LexicalNode, NodeRecord, SynonymEdge};
use crate::traverse::Subgraph;

/// Normalize a subgraph into the response shape.
///
/// Every record, center included, becomes a [`LexicalNode`] with all
/// attribute slots present. `nodes` comes out sorted by id and `links` by
/// (source, target), so equal subgraphs serialize to equal bytes.
pub fn assemble(center: &NodeRecord, subgraph: Subgraph) -> GraphResult {
    let nodes: Vec<LexicalNode> = subgraph.nodes.into_values().map(LexicalNode::from).collect();
    let links: Vec<SynonymEdge> = subgraph.links.into_values().map(SynonymEdge::from).collect();

    GraphResult {
        nodes,
        links,
        center: LexicalNode::from(center.clone()),
    }
}
