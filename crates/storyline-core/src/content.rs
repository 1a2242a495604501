//! Content units: the granularity of variation diffs and merges.
//!
//! A story payload is either a single document (one unit named
//! [`SINGLE_UNIT`]) or a multi-unit tree of the form
//! `{"units": {"<path>": "<payload>", ...}}`. A single-unit tree encodes
//! back to its payload verbatim.

use crate::document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Unit path used when a payload is not a multi-unit tree.
pub const SINGLE_UNIT: &str = "story";

/// A story payload split into path-addressed units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTree {
    units: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct UnitsWire {
    units: BTreeMap<String, String>,
}

impl ContentTree {
    /// Split a serialized payload into units.
    pub fn parse(content: &str) -> Self {
        match serde_json::from_str::<UnitsWire>(content) {
            Ok(wire) => Self { units: wire.units },
            Err(_) => Self::single(content),
        }
    }

    /// A tree holding one opaque payload.
    pub fn single(payload: impl Into<String>) -> Self {
        let mut units = BTreeMap::new();
        units.insert(SINGLE_UNIT.to_string(), payload.into());
        Self { units }
    }

    /// A tree from explicit units.
    pub fn from_units(units: BTreeMap<String, String>) -> Self {
        Self { units }
    }

    /// Serialize back to a payload.
    pub fn encode(&self) -> String {
        if let Some(payload) = self.single_payload() {
            return payload.to_string();
        }
        let wire = UnitsWire {
            units: self.units.clone(),
        };
        // A map of strings always serializes
        serde_json::to_string(&wire).unwrap_or_default()
    }

    fn single_payload(&self) -> Option<&str> {
        if self.units.len() != 1 {
            return None;
        }
        self.units.get(SINGLE_UNIT).map(String::as_str)
    }

    pub fn units(&self) -> &BTreeMap<String, String> {
        &self.units
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.units.get(path).map(String::as_str)
    }

    pub fn insert(&mut self, path: impl Into<String>, payload: impl Into<String>) {
        self.units.insert(path.into(), payload.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.units.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.units.contains_key(path)
    }

    /// Total words across all units.
    pub fn word_count(&self) -> u32 {
        self.units
            .values()
            .map(|payload| document::word_count(payload))
            .fold(0u32, u32::saturating_add)
    }

    /// Plain text of every unit in path order, separated by blank lines.
    pub fn plain_text(&self) -> String {
        self.units
            .values()
            .map(|payload| document::plain_text(payload))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Compare two payloads: structurally when both are JSON, bytewise otherwise.
pub fn equivalent(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (
        serde_json::from_str::<Value>(a),
        serde_json::from_str::<Value>(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn unit_equivalent(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => equivalent(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// How a unit differs between two trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
}

/// One changed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitChange {
    pub path: String,
    pub status: ChangeStatus,
}

/// Unit-level changes going from `from` to `to`, in path order. Equivalent
/// units are omitted.
pub fn diff_units(from: &ContentTree, to: &ContentTree) -> Vec<UnitChange> {
    all_paths(&[from, to])
        .into_iter()
        .filter_map(|path| {
            let status = match (from.get(&path), to.get(&path)) {
                (None, Some(_)) => ChangeStatus::Added,
                (Some(_), None) => ChangeStatus::Deleted,
                (Some(a), Some(b)) if !equivalent(a, b) => ChangeStatus::Modified,
                _ => return None,
            };
            Some(UnitChange { path, status })
        })
        .collect()
}

/// Union of unit paths across trees, sorted.
pub(crate) fn all_paths(trees: &[&ContentTree]) -> BTreeSet<String> {
    trees
        .iter()
        .flat_map(|tree| tree.units.keys().cloned())
        .collect()
}

/// Outcome of merging one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnitMerge {
    /// Use this payload (`None` removes the unit).
    Take(Option<String>),
    /// Both sides changed the unit differently.
    Conflict,
}

/// Merge one unit from `source` into `target`.
///
/// With a base: unchanged on one side takes the other; identical changes
/// are not conflicts. Without a base: present on both sides and different
/// is a conflict, a unit only in the source is added, a unit only in the
/// target is kept.
pub(crate) fn merge_unit(
    base: Option<Option<&str>>,
    source: Option<&str>,
    target: Option<&str>,
) -> UnitMerge {
    let owned = |payload: Option<&str>| UnitMerge::Take(payload.map(str::to_string));

    if unit_equivalent(source, target) {
        return owned(target);
    }
    match base {
        Some(base) => {
            if unit_equivalent(source, base) {
                owned(target)
            } else if unit_equivalent(target, base) {
                owned(source)
            } else {
                UnitMerge::Conflict
            }
        }
        None => match (source, target) {
            (Some(_), Some(_)) => UnitMerge::Conflict,
            (Some(source), None) => owned(Some(source)),
            (None, target) => owned(target),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(units: &[(&str, &str)]) -> ContentTree {
        ContentTree::from_units(
            units
                .iter()
                .map(|(path, payload)| (path.to_string(), payload.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_single_unit_round_trip_is_verbatim() {
        let payload = r#"{ "type": "doc",   "content": [] }"#;
        let parsed = ContentTree::parse(payload);
        assert_eq!(parsed.units().len(), 1);
        assert_eq!(parsed.get(SINGLE_UNIT), Some(payload));
        assert_eq!(parsed.encode(), payload);

        let opaque = "just some text";
        assert_eq!(ContentTree::parse(opaque).encode(), opaque);
    }

    #[test]
    fn test_multi_unit_parse() {
        let payload = r#"{"units":{"ch1":"one two","ch2":"three"}}"#;
        let parsed = ContentTree::parse(payload);
        assert_eq!(parsed.units().len(), 2);
        assert_eq!(parsed.get("ch2"), Some("three"));
        assert_eq!(parsed.word_count(), 3);
        assert_eq!(ContentTree::parse(&parsed.encode()), parsed);
    }

    #[test]
    fn test_equivalent_is_structural_for_json() {
        assert!(equivalent(r#"{"a":1,"b":2}"#, r#"{ "b": 2, "a": 1 }"#));
        assert!(!equivalent(r#"{"a":1}"#, r#"{"a":2}"#));
        assert!(equivalent("same", "same"));
        assert!(!equivalent("same", "same "));
    }

    #[test]
    fn test_diff_units() {
        let a = tree(&[("ch1", "x"), ("ch2", "y"), ("ch3", "z")]);
        let b = tree(&[("ch1", "x"), ("ch2", "y2"), ("ch4", "w")]);
        let changes = diff_units(&a, &b);
        assert_eq!(
            changes,
            vec![
                UnitChange {
                    path: "ch2".to_string(),
                    status: ChangeStatus::Modified
                },
                UnitChange {
                    path: "ch3".to_string(),
                    status: ChangeStatus::Deleted
                },
                UnitChange {
                    path: "ch4".to_string(),
                    status: ChangeStatus::Added
                },
            ]
        );
        assert!(diff_units(&a, &a).is_empty());
    }

    #[test]
    fn test_merge_unit_three_way() {
        let take = |s: &str| UnitMerge::Take(Some(s.to_string()));

        assert_eq!(merge_unit(Some(Some("b")), Some("s"), Some("b")), take("s"));
        assert_eq!(merge_unit(Some(Some("b")), Some("b"), Some("t")), take("t"));
        assert_eq!(merge_unit(Some(Some("b")), Some("x"), Some("x")), take("x"));
        assert_eq!(
            merge_unit(Some(Some("b")), Some("s"), Some("t")),
            UnitMerge::Conflict
        );
        // Deleted in source, untouched in target
        assert_eq!(
            merge_unit(Some(Some("b")), None, Some("b")),
            UnitMerge::Take(None)
        );
        // Deleted in source, edited in target
        assert_eq!(
            merge_unit(Some(Some("b")), None, Some("t")),
            UnitMerge::Conflict
        );
        // Added only in source
        assert_eq!(merge_unit(Some(None), Some("s"), None), take("s"));
    }

    #[test]
    fn test_merge_unit_without_base() {
        assert_eq!(merge_unit(None, Some("s"), Some("t")), UnitMerge::Conflict);
        assert_eq!(
            merge_unit(None, Some("s"), None),
            UnitMerge::Take(Some("s".to_string()))
        );
        assert_eq!(
            merge_unit(None, None, Some("t")),
            UnitMerge::Take(Some("t".to_string()))
        );
    }
}
