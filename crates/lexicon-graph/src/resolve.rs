//! Center resolution against a searchable field.

use tracing::debug;

use crate::model::{NodeRecord, SearchField};
use crate::store::{GraphStore, StoreError};

/// Error types for center resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("No entry found for {field} = {query}")]
    NotFound { field: SearchField, query: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ResolveError>;

/// Resolve a query term to a single center node.
///
/// Multiple candidates (homophone sets on phonetic or translation lookups)
/// are disambiguated by picking the smallest id, so the same query always
/// lands on the same center. The resolved record carries whatever
/// attributes the lookup returned; no refetch is needed downstream.
pub async fn resolve_center(
    store: &dyn GraphStore,
    field: SearchField,
    query: &str,
) -> Result<NodeRecord> {
    let mut candidates = store.lookup(field, query).await?;
    candidates.sort_by(|a, b| a.id.cmp(&b.id));

    match candidates.into_iter().next() {
        Some(record) => {
            debug!(center = %record.id, field = %field, "center resolved");
            Ok(record)
        }
        None => Err(ResolveError::NotFound {
            field,
            query: query.to_string(),
        }),
    }
}
