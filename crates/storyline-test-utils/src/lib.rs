//! Testing utilities, fixtures and builders for storyline.
//!
//! This crate provides common testing infrastructure used across the storyline workspace:
//!
//! - **Fixtures**: A throwaway on-disk library with chosen versioning settings
//! - **Builders**: Fluent builders for document and multi-unit payloads
//! - **Assertions**: Helpers for story invariants and readable failures
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use storyline_test_utils::{DocumentBuilder, TestLibrary};
//!
//! #[tokio::test]
//! async fn test_story_versions() {
//!     let lib = TestLibrary::new();
//!     let content = DocumentBuilder::new().paragraph("It was late.").to_json();
//!     let story = lib.story("Night", &content).await;
//!
//!     lib.assert_pointers_valid(&story.id).await;
//! }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;

// Re-export commonly used items
pub use builders::{DocumentBuilder, UnitsBuilder};
pub use fixtures::TestLibrary;
