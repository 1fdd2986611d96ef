//! Lexical semantic graph - weighted synonym neighborhoods for a lexicon.
//!
//! This crate provides:
//! - The node/edge/result model shared across the service
//! - The [`store::GraphStore`] contract with in-memory and HTTP adapters
//! - Center resolution across searchable attributes
//! - Depth-bounded traversal with deterministic ranking and dedup
//! - Assembly into the stable response shape

pub mod assemble;
pub mod model;
pub mod resolve;
pub mod store;
pub mod traverse;

pub use assemble::assemble;
pub use model::{
    Depth, EdgeRecord, GraphResult, LexicalNode, NeighborRecord, NodeRecord, SearchField,
    SynonymEdge,
};
pub use resolve::{resolve_center, ResolveError};
pub use store::cypher::{HttpGraphStore, StagedQuery, StoreConfig};
pub use store::memory::{GraphFixture, MemoryGraphStore};
pub use store::{GraphStore, StoreError, StoreStats};
pub use traverse::{collect_subgraph, GraphQueryError, Subgraph};
