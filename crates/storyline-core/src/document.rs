//! Rich-text document model.
//!
//! Story content is a ProseMirror-style JSON tree. Inspection (plain text,
//! word count) is a walk over [`Node`] with a [`Visitor`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content of a freshly created story.
pub const EMPTY_DOCUMENT: &str = r#"{"type":"doc","content":[]}"#;

/// Element kinds that flow inside a text block instead of starting a new one.
const INLINE_KINDS: [&str; 4] = ["hardBreak", "mention", "emoji", "image"];

/// A node in a document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub enum Node {
    /// A run of text with optional formatting marks.
    Text { text: String, marks: Vec<Value> },
    /// Any non-text node: `doc`, `paragraph`, `heading`, `bulletList`, ...
    Element {
        kind: String,
        attrs: Option<Value>,
        children: Vec<Node>,
    },
}

/// Wire shape of a node.
#[derive(Serialize, Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attrs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    marks: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<Vec<Node>>,
}

impl TryFrom<RawNode> for Node {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        if raw.kind == "text" {
            let text = raw.text.ok_or("text node without text")?;
            return Ok(Node::Text {
                text,
                marks: raw.marks.unwrap_or_default(),
            });
        }
        Ok(Node::Element {
            kind: raw.kind,
            attrs: raw.attrs,
            children: raw.content.unwrap_or_default(),
        })
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        match node {
            Node::Text { text, marks } => RawNode {
                kind: "text".to_string(),
                text: Some(text),
                attrs: None,
                marks: (!marks.is_empty()).then_some(marks),
                content: None,
            },
            Node::Element {
                kind,
                attrs,
                children,
            } => RawNode {
                kind,
                text: None,
                attrs,
                marks: None,
                content: Some(children),
            },
        }
    }
}

/// Callbacks for a depth-first walk over a document.
pub trait Visitor {
    fn text(&mut self, text: &str);

    fn enter(&mut self, _kind: &str) {}

    fn leave(&mut self, _kind: &str) {}
}

impl Node {
    /// A plain text node.
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    /// An element with children and no attributes.
    pub fn element(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element {
            kind: kind.into(),
            attrs: None,
            children,
        }
    }

    /// Parse a serialized document. Returns `None` for anything that is not
    /// a node tree.
    pub fn parse(content: &str) -> Option<Self> {
        serde_json::from_str(content).ok()
    }

    /// The node type name.
    pub fn kind(&self) -> &str {
        match self {
            Node::Text { .. } => "text",
            Node::Element { kind, .. } => kind,
        }
    }

    /// Walk the tree depth-first.
    pub fn walk<V: Visitor>(&self, visitor: &mut V) {
        match self {
            Node::Text { text, .. } => visitor.text(text),
            Node::Element { kind, children, .. } => {
                visitor.enter(kind);
                for child in children {
                    child.walk(visitor);
                }
                visitor.leave(kind);
            }
        }
    }

    /// Text content with one line per block.
    pub fn plain_text(&self) -> String {
        let mut collector = PlainText::default();
        self.walk(&mut collector);
        collector.finish()
    }

    /// Number of whitespace-separated words.
    pub fn word_count(&self) -> u32 {
        count_words(&self.plain_text())
    }
}

#[derive(Default)]
struct PlainText {
    out: String,
}

impl PlainText {
    fn break_line(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn finish(self) -> String {
        self.out.trim_end_matches('\n').to_string()
    }
}

impl Visitor for PlainText {
    fn text(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn enter(&mut self, kind: &str) {
        if kind == "hardBreak" {
            self.out.push('\n');
        }
    }

    fn leave(&mut self, kind: &str) {
        if !INLINE_KINDS.contains(&kind) {
            self.break_line();
        }
    }
}

fn count_words(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

/// Plain text of a serialized payload. Non-document payloads are returned as is.
pub fn plain_text(content: &str) -> String {
    match Node::parse(content) {
        Some(node) => node.plain_text(),
        None => content.to_string(),
    }
}

/// Word count of a serialized payload. Non-document payloads are counted by
/// whitespace.
pub fn word_count(content: &str) -> u32 {
    match Node::parse(content) {
        Some(node) => node.word_count(),
        None => count_words(content),
    }
}
