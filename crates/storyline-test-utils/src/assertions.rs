//! Custom assertion helpers for common test patterns.
//!
//! Provides macros and functions for making test assertions more readable
//! and providing better error messages.

use storyline_core::content::equivalent;
use storyline_core::{ChangeStatus, CoreError, ErrorKind, UnitChange};

/// Assert that two strings are equal, with a nice diff on failure.
pub fn assert_strings_equal(actual: &str, expected: &str) {
    if actual != expected {
        let diff = similar::TextDiff::from_lines(expected, actual);
        let mut output = String::new();

        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                similar::ChangeTag::Delete => "-",
                similar::ChangeTag::Insert => "+",
                similar::ChangeTag::Equal => " ",
            };
            output.push_str(&format!("{}{}", sign, change));
        }

        panic!("Strings are not equal.\nDiff:\n{}", output);
    }
}

/// Assert that two content payloads are equivalent (structurally equal when
/// both are JSON, byte-equal otherwise).
///
/// # Example
///
/// ```rust
/// use storyline_test_utils::assertions::assert_content_equivalent;
///
/// assert_content_equivalent(r#"{"a": 1, "b": 2}"#, r#"{"b":2,"a":1}"#);
/// ```
pub fn assert_content_equivalent(actual: &str, expected: &str) {
    if !equivalent(actual, expected) {
        assert_strings_equal(actual, expected);
    }
}

/// Assert that an error has the expected kind.
pub fn assert_error_kind(err: &CoreError, expected: ErrorKind) {
    assert_eq!(
        err.kind(),
        expected,
        "Unexpected error kind for: {}",
        err
    );
}

/// Assert that a unit diff contains a change with the given path and status.
pub fn assert_unit_change(changes: &[UnitChange], path: &str, status: ChangeStatus) {
    assert!(
        changes
            .iter()
            .any(|change| change.path == path && change.status == status),
        "Expected {:?} change for unit {:?}.\nChanges: {:?}",
        status,
        path,
        changes
    );
}

/// Assert that a result is Ok and extract the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Assert that a result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Ok(value) => panic!("{}: {:?}", $msg, value),
            Err(e) => e,
        }
    };
}

/// Assert that an option is Some and extract the value.
#[macro_export]
macro_rules! assert_some {
    ($expr:expr) => {
        match $expr {
            Some(value) => value,
            None => panic!("Expected Some, got None"),
        }
    };
    ($expr:expr, $msg:literal) => {
        match $expr {
            Some(value) => value,
            None => panic!("{}", $msg),
        }
    };
}

/// Assert that an option is None.
#[macro_export]
macro_rules! assert_none {
    ($expr:expr) => {
        if let Some(value) = $expr {
            panic!("Expected None, got Some: {:?}", value);
        }
    };
    ($expr:expr, $msg:literal) => {
        if let Some(value) = $expr {
            panic!("{}: {:?}", $msg, value);
        }
    };
}

/// Assert that a collection contains an item.
#[macro_export]
macro_rules! assert_contains {
    ($collection:expr, $item:expr) => {
        if !$collection.iter().any(|x| x == &$item) {
            panic!(
                "Collection does not contain expected item.\nExpected: {:?}\nCollection: {:?}",
                $item, $collection
            );
        }
    };
}

/// Assert that a string contains a substring (with better error messages).
#[macro_export]
macro_rules! assert_str_contains {
    ($haystack:expr, $needle:expr) => {
        if !$haystack.contains($needle) {
            panic!(
                "String does not contain expected substring.\nExpected to find: {}\nIn string:\n{}",
                $needle, $haystack
            );
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_strings_equal() {
        assert_strings_equal("hello", "hello");
    }

    #[test]
    #[should_panic(expected = "Strings are not equal")]
    fn test_assert_strings_equal_panics_with_diff() {
        assert_strings_equal("hello\nworld", "hello\nthere");
    }

    #[test]
    fn test_assert_content_equivalent() {
        assert_content_equivalent(r#"{"type":"doc"}"#, r#"{ "type": "doc" }"#);
        assert_content_equivalent("plain", "plain");
    }

    #[test]
    fn test_assert_error_kind() {
        assert_error_kind(&CoreError::conflict("dirty"), ErrorKind::Conflict);
        assert_error_kind(&CoreError::not_found("x"), ErrorKind::NotFound);
    }

    #[test]
    fn test_assert_unit_change() {
        let changes = vec![UnitChange {
            path: "chapter-1".to_string(),
            status: ChangeStatus::Modified,
        }];
        assert_unit_change(&changes, "chapter-1", ChangeStatus::Modified);
    }

    #[test]
    fn test_assert_ok_macro() {
        let result: Result<i32, &str> = Ok(42);
        let value = assert_ok!(result);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_assert_some_macro() {
        let option: Option<i32> = Some(42);
        let value = assert_some!(option);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_assert_str_contains_macro() {
        assert_str_contains!("-old line\n+new line", "+new line");
    }
}
