//! Variation slug derivation.
//!
//! A slug is the identifier-safe form of a variation's display name:
//! transliterated to ASCII, lowercased, with every run of other characters
//! collapsed into a single `-`.

use regex::Regex;
use std::sync::OnceLock;

/// Slug used when a display name has no usable characters.
pub const SLUG_PLACEHOLDER: &str = "untitled";

/// Names that user-created variations may not use (compared case-insensitively).
pub const RESERVED_SLUGS: [&str; 4] = ["original", "main", "master", "head"];

static SEPARATOR_REGEX: OnceLock<Regex> = OnceLock::new();

fn separator_regex() -> &'static Regex {
    SEPARATOR_REGEX.get_or_init(|| {
        Regex::new(r"[^a-z0-9]+").expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Derive a slug from a display name.
pub fn slugify(name: &str) -> String {
    let ascii = deunicode::deunicode(name).to_lowercase();
    let collapsed = separator_regex().replace_all(&ascii, "-");
    let slug = collapsed.trim_matches('-');
    if slug.is_empty() {
        SLUG_PLACEHOLDER.to_string()
    } else {
        slug.to_string()
    }
}

/// Check whether a display name (or the slug it derives) is reserved.
pub fn is_reserved(name: &str) -> bool {
    let trimmed = name.trim().to_lowercase();
    if RESERVED_SLUGS.contains(&trimmed.as_str()) {
        return true;
    }
    RESERVED_SLUGS.contains(&slugify(name).as_str())
}

/// Derive a slug that is neither reserved nor already taken.
///
/// Collisions are resolved by appending `-2`, `-3`, and so on.
pub fn unique_slug<F>(name: &str, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let base = slugify(name);
    let usable = |candidate: &str| !taken(candidate) && !RESERVED_SLUGS.contains(&candidate);
    if usable(&base) {
        return base;
    }
    (2u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| usable(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic_sentence() {
        assert_eq!(slugify("What if Sarah lived?"), "what-if-sarah-lived");
    }

    #[test]
    fn test_slugify_transliterates() {
        assert_eq!(slugify("Café Résumé"), "cafe-resume");
        assert_eq!(slugify("Straße nach Köln"), "strasse-nach-koln");
    }

    #[test]
    fn test_slugify_placeholder() {
        assert_eq!(slugify("!!!@@@###"), SLUG_PLACEHOLDER);
        assert_eq!(slugify("   "), SLUG_PLACEHOLDER);
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("  Chapter -- 12 __ draft  "), "chapter-12-draft");
    }

    #[test]
    fn test_reserved_names_case_insensitive() {
        assert!(is_reserved("Main"));
        assert!(is_reserved("ORIGINAL"));
        assert!(is_reserved("HEAD"));
        assert!(is_reserved(" master "));
        assert!(is_reserved("Main!"));
        assert!(!is_reserved("Main Street"));
        assert!(!is_reserved("Alternate Ending"));
    }

    #[test]
    fn test_unique_slug_suffixes_collisions() {
        let taken = ["alternate-ending", "alternate-ending-2"];
        let slug = unique_slug("Alternate Ending", |s| taken.contains(&s));
        assert_eq!(slug, "alternate-ending-3");
    }

    #[test]
    fn test_unique_slug_avoids_reserved() {
        assert_eq!(unique_slug("Main", |_| false), "main-2");
        assert_eq!(unique_slug("Fresh take", |_| false), "fresh-take");
    }
}
