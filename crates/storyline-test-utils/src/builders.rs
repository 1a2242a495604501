//! Builder patterns for constructing test payloads.
//!
//! Provides fluent builders for the documents the editor sends.

use std::collections::BTreeMap;
use storyline_core::{ContentTree, Node};

/// Builder for ProseMirror-style documents.
///
/// # Example
///
/// ```rust
/// use storyline_test_utils::builders::DocumentBuilder;
///
/// let doc = DocumentBuilder::new()
///     .heading(1, "Chapter One")
///     .paragraph("It was a dark and stormy night.")
///     .build();
///
/// assert_eq!(doc.word_count(), 9);
/// ```
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    blocks: Vec<Node>,
}

impl DocumentBuilder {
    /// Create an empty document builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a paragraph of plain text.
    pub fn paragraph(self, text: &str) -> Self {
        self.block(Node::element("paragraph", vec![Node::text(text)]))
    }

    /// Add a heading.
    pub fn heading(self, level: u8, text: &str) -> Self {
        self.block(Node::Element {
            kind: "heading".to_string(),
            attrs: Some(serde_json::json!({ "level": level })),
            children: vec![Node::text(text)],
        })
    }

    /// Add a bullet list with one paragraph per item.
    pub fn bullet_list(self, items: &[&str]) -> Self {
        let items = items
            .iter()
            .map(|item| {
                Node::element(
                    "listItem",
                    vec![Node::element("paragraph", vec![Node::text(*item)])],
                )
            })
            .collect();
        self.block(Node::element("bulletList", items))
    }

    /// Add an arbitrary block node.
    pub fn block(mut self, node: Node) -> Self {
        self.blocks.push(node);
        self
    }

    /// Build the document node.
    pub fn build(self) -> Node {
        Node::element("doc", self.blocks)
    }

    /// Build and serialize the document.
    pub fn to_json(self) -> String {
        serde_json::to_string(&self.build()).expect("documents always serialize")
    }
}

/// Builder for multi-unit story payloads.
///
/// # Example
///
/// ```rust
/// use storyline_test_utils::builders::UnitsBuilder;
///
/// let payload = UnitsBuilder::new()
///     .unit("chapter-1", "Once upon a time")
///     .unit("chapter-2", "The end")
///     .build();
///
/// assert!(payload.starts_with(r#"{"units":"#));
/// ```
#[derive(Debug, Default)]
pub struct UnitsBuilder {
    units: BTreeMap<String, String>,
}

impl UnitsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a unit.
    pub fn unit(mut self, path: &str, payload: impl Into<String>) -> Self {
        self.units.insert(path.to_string(), payload.into());
        self
    }

    /// Add a unit holding a one-paragraph document.
    pub fn document_unit(self, path: &str, text: &str) -> Self {
        let payload = DocumentBuilder::new().paragraph(text).to_json();
        self.unit(path, payload)
    }

    /// Serialize to a payload.
    pub fn build(self) -> String {
        ContentTree::from_units(self.units).encode()
    }
}
