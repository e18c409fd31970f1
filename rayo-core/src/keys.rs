//! Call-site cache key derivation.
//!
//! When no explicit key is given, a key is derived from the *static*
//! identity of the call site: the enclosing function's path plus the source
//! file it lives in. The facade crate's `auto_key!` macro collects both
//! pieces at the call site and feeds them through
//! [`derive_call_site_key`].

/// Separator between the member and source-path components of a derived
/// key. A non-printable control character, so it cannot collide with
/// anything a function path or file path may contain.
pub const CALL_SITE_SEPARATOR: char = '\u{1}';

/// Derives a cache key from a call site's static identity.
///
/// The same `(member, source_path)` pair always yields the same key, across
/// runs and across processes built from the same sources. Two different
/// call sites (different functions or different files) yield different
/// keys. Note that the key embeds the source path: moving a file to a new
/// location changes every key derived in it. Callers that need keys to
/// survive refactors should pass explicit keys instead.
///
/// # Examples
///
/// ```
/// use rayo_core::keys::derive_call_site_key;
///
/// let a = derive_call_site_key("billing::load_invoices", "src/billing.rs");
/// let b = derive_call_site_key("billing::load_invoices", "src/billing.rs");
/// let c = derive_call_site_key("billing::load_customers", "src/billing.rs");
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
pub fn derive_call_site_key(member: &str, source_path: &str) -> String {
    let mut key = String::with_capacity(member.len() + source_path.len() + 1);
    key.push_str(member);
    key.push(CALL_SITE_SEPARATOR);
    key.push_str(source_path);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_site_same_key() {
        assert_eq!(
            derive_call_site_key("m::f", "src/m.rs"),
            derive_call_site_key("m::f", "src/m.rs")
        );
    }

    #[test]
    fn test_different_member_different_key() {
        assert_ne!(
            derive_call_site_key("m::f", "src/m.rs"),
            derive_call_site_key("m::g", "src/m.rs")
        );
    }

    #[test]
    fn test_different_file_different_key() {
        assert_ne!(
            derive_call_site_key("m::f", "src/a.rs"),
            derive_call_site_key("m::f", "src/b.rs")
        );
    }

    #[test]
    fn test_separator_prevents_ambiguity() {
        // "ab" + "c" must not collide with "a" + "bc".
        assert_ne!(
            derive_call_site_key("ab", "c"),
            derive_call_site_key("a", "bc")
        );
    }
}
