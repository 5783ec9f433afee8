use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_index::url::extract_domain;
///
/// let url = Url::parse("https://Docs.Example.com/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("docs.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the domain used for same-domain scoping
///
/// This is the lowercase host with a single leading `www.` removed. The
/// scheme and port play no part, so `http://www.example.com` and
/// `https://example.com:8443` share the registrable domain `example.com`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_index::url::registrable_domain;
///
/// let url = Url::parse("http://WWW.example.com/a").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    extract_domain(url).map(|host| match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_simple_domain() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_uppercase_converted_to_lowercase() {
        let url = Url::parse("https://EXAMPLE.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_registrable_strips_www() {
        let url = Url::parse("https://www.example.com/page").unwrap();
        assert_eq!(registrable_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_registrable_ignores_scheme() {
        let http = Url::parse("http://example.com/").unwrap();
        let https = Url::parse("https://www.example.com/").unwrap();
        assert_eq!(registrable_domain(&http), registrable_domain(&https));
    }

    #[test]
    fn test_registrable_keeps_other_subdomains() {
        let url = Url::parse("https://blog.example.com/").unwrap();
        assert_eq!(
            registrable_domain(&url),
            Some("blog.example.com".to_string())
        );
    }

    #[test]
    fn test_registrable_only_strips_leading_www() {
        let url = Url::parse("https://www.www.example.com/").unwrap();
        assert_eq!(
            registrable_domain(&url),
            Some("www.example.com".to_string())
        );
    }

    #[test]
    fn test_registrable_ip_host() {
        let url = Url::parse("http://127.0.0.1:3000/").unwrap();
        assert_eq!(registrable_domain(&url), Some("127.0.0.1".to_string()));
    }
}
