//! The `regexp(pattern, text) -> bool` predicate used by the grep
//! property 6).
//!
//! Grounded in `database/scraper_db.go`'s `regex` helper, which wraps
//! `regexp.MatchString` with no pattern cache — compiling a fresh
//! `regex::Regex` per call here matches that behavior. SQLite has no
//! built-in `REGEXP` operator and wiring a native one in requires dropping
//! into `unsafe` FFI against `libsqlite3-sys`, which nothing else in this
//! crate does; instead the predicate is applied row-by-row against a
//! streamed query result (`store::mod`'s grep methods), which avoids
//! materialising an entire table before filtering without leaving safe
//! Rust.

use regex::Regex;

/// Returns whether `text` matches `pattern`. Anchors, POSIX character
/// classes (`[[:alpha:]]`, `[[:digit:]]`) and the `(?i)` case-insensitivity
/// flag are all handled by the underlying `regex` crate.
pub fn matches(pattern: &str, text: &str) -> Result<bool, regex::Error> {
    Ok(Regex::new(pattern)?.is_match(text))
}

/// Returns whether `text` matches every pattern in `patterns` (used by the
/// multi-flag grep commands, which AND their filters).
pub fn matches_all(patterns: &[String], text: &str) -> Result<bool, regex::Error> {
    for p in patterns {
        if !matches(p, text)? {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_flag() {
        assert!(matches("(?i)cyberTRUCK", "Cybertruck spotted").unwrap());
    }

    #[test]
    fn anchors() {
        assert!(!matches("^truck$", "Cybertruck spotted").unwrap());
        assert!(matches("^Cybertruck$", "Cybertruck").unwrap());
    }

    #[test]
    fn posix_character_classes() {
        assert!(matches("^[[:alpha:]]+$", "abcXYZ").unwrap());
        assert!(!matches("^[[:alpha:]]+$", "abc123").unwrap());
        assert!(matches("^[[:digit:]]+$", "123").unwrap());
    }
}
