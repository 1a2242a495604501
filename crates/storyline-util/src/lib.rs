//! Shared utilities for storyline.
//!
//! This crate provides common utilities used across the storyline workspace:
//! - ULID-based identifier generation
//! - Variation slug derivation and reserved-name checks
//! - Logging setup with tracing
//! - Standard directory locations

pub mod id;
pub mod log;
pub mod path;
pub mod slug;

pub use id::{IdPrefix, Identifier};
pub use slug::{is_reserved, slugify, unique_slug, RESERVED_SLUGS, SLUG_PLACEHOLDER};
