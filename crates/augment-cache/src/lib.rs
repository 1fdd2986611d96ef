//! Versioned cache of generated study content.
//!
//! Content is persisted per node as an append-only version history in
//! SQLite. Misses are filled by a [`generation_client::ContentGenerator`],
//! with generation single-flighted per node so a burst of requests for the
//! same entry costs one generator call.

pub mod content;
pub mod error;
pub mod flight;
pub mod service;
pub mod store;

pub use content::AugmentedContent;
pub use error::{AugmentError, Result};
pub use flight::{FlightMap, FlightOutcome, FlightRole};
pub use service::{AugmentStats, Augmentor};
pub use store::ContentStore;
