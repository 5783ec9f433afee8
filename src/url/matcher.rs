use crate::config::DomainEntry;

/// Checks if a host matches a domain pattern
///
/// `"example.com"` matches only that host. `"*.example.com"` matches the
/// bare domain and any subdomain at any depth. Both sides are expected to be
/// lowercase already.
///
/// # Examples
///
/// ```
/// use site_index::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "docs.example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .map_or(false, |prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}

/// Returns true if any entry in the list matches the host
pub fn matches_any(entries: &[DomainEntry], host: &str) -> bool {
    entries
        .iter()
        .any(|entry| matches_wildcard(&entry.domain, host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_wildcard("example.com", "example.com"));
        assert!(!matches_wildcard("example.com", "other.com"));
        assert!(!matches_wildcard("blog.example.com", "example.com"));
    }

    #[test]
    fn test_wildcard_matches_bare_and_nested() {
        assert!(matches_wildcard("*.example.com", "example.com"));
        assert!(matches_wildcard("*.example.com", "www.example.com"));
        assert!(matches_wildcard("*.example.com", "deep.nested.example.com"));
    }

    #[test]
    fn test_wildcard_rejects_partial_labels() {
        assert!(!matches_wildcard("*.example.com", "notexample.com"));
        assert!(!matches_wildcard("*.example.com", "example.com.org"));
        assert!(!matches_wildcard("*.example.com", ""));
    }

    #[test]
    fn test_multi_label_base() {
        assert!(matches_wildcard("*.co.uk", "example.co.uk"));
        assert!(!matches_wildcard("*.co.uk", "co.jp"));
    }

    #[test]
    fn test_matches_any() {
        let entries = vec![
            DomainEntry {
                domain: "*.ads.example.com".to_string(),
            },
            DomainEntry {
                domain: "tracker.net".to_string(),
            },
        ];
        assert!(matches_any(&entries, "cdn.ads.example.com"));
        assert!(matches_any(&entries, "tracker.net"));
        assert!(!matches_any(&entries, "example.com"));
        assert!(!matches_any(&[], "example.com"));
    }
}
