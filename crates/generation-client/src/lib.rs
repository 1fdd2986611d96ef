//! Content generator client - model-written study content for lexicon
//! entries.
//!
//! This crate provides:
//! - The [`ContentGenerator`] contract and its HTTP implementation
//! - Request/output types shared with the augmentation layer
//! - Output validation that keeps malformed generations out of the cache

pub mod client;
pub mod types;
pub mod validate;

pub use client::{
    ContentGenerator, GenerationClient, GenerationError, GeneratorConfig, Result,
};
pub use types::{
    ContentSchema, GeneratedPayload, GeneratedSections, GenerationRequest, SectionKind,
    UsageExample,
};
pub use validate::validate_payload;
