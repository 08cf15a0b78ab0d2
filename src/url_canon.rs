//! URL canonicalisation.
//!
//! Grounded in `utils/utils.go`'s `TrimmedURL`: strip exactly one trailing
//! `/` from the path-and-query portion, if present. This is the identity
//! function every forum/thread/comment URL passes through before being
//! written to or compared against the store.

use url::Url;

/// Returns the canonical form of `url`: at most one trailing `/` removed
/// from the full string form. Idempotent — `canonicalize(canonicalize(u))
/// == canonicalize(u)`.
pub fn canonicalize(url: &Url) -> Url {
    let s = url.as_str();
    if let Some(trimmed) = s.strip_suffix('/') {
        // Re-parsing "scheme://host" round-trips back to
        // "scheme://host/" (the url crate normalises an empty path to
        // "/"), so a bare root URL is naturally left untouched by this.
        if let Ok(parsed) = Url::parse(trimmed) {
            return parsed;
        }
    }
    url.clone()
}

/// Convenience wrapper returning the canonical string form directly, which
/// is what the store uses as an identity key.
pub fn canonical_string(url: &Url) -> String {
    canonicalize(url).to_string()
}
