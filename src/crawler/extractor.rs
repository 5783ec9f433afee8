//! Content extraction
//!
//! This module turns fetched bytes into:
//! - Clean page text (boilerplate elements removed, whitespace collapsed)
//! - Page title (from the <title> tag)
//! - Absolute links to follow

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Elements whose content is never part of the page text
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "canvas", "nav", "header",
    "footer", "aside", "form", "button", "select",
];

/// Elements that start a new line of text
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "section", "article", "main", "li", "ul", "ol", "dl", "dt", "dd", "table", "tr",
    "td", "th", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote", "br", "hr", "figure",
    "figcaption", "details", "summary",
];

/// Nesting beyond this depth is flattened instead of walked
const MAX_WALK_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),
}

/// Kinds of content the extractor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    PlainText,
}

impl ContentKind {
    /// Classifies a Content-Type header value
    ///
    /// A missing or empty header is treated as HTML.
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, ExtractError> {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();

        match mime.as_str() {
            "" | "text/html" | "application/xhtml+xml" => Ok(Self::Html),
            "text/plain" => Ok(Self::PlainText),
            _ => Err(ExtractError::UnsupportedContentType(mime)),
        }
    }
}

/// Extracted information from a page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub text: String,
    /// Absolute HTTP(S) links in document order, without duplicates
    pub links: Vec<Url>,
}

/// Extracts text and links from raw page bytes
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document (including nav/header/footer)
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:`, `data:` links and fragment-only anchors
///
/// Relative links resolve against `<base href>` when present, otherwise
/// against `base_url`. Malformed markup is parsed best-effort and never fails.
///
/// # Example
///
/// ```
/// use site_index::crawler::extract;
/// use url::Url;
///
/// let html = br#"<html><head><title>Test</title></head>
///     <body><script>x()</script><p>Hello   world</p><a href="/page">Link</a></body></html>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let page = extract(html, Some("text/html; charset=utf-8"), &base).unwrap();
/// assert_eq!(page.title.as_deref(), Some("Test"));
/// assert_eq!(page.text, "Hello world\nLink");
/// assert_eq!(page.links[0].as_str(), "https://example.com/page");
/// ```
pub fn extract(
    raw: &[u8],
    content_type: Option<&str>,
    base_url: &Url,
) -> Result<ExtractedPage, ExtractError> {
    let body = String::from_utf8_lossy(raw);

    match ContentKind::from_content_type(content_type)? {
        ContentKind::PlainText => Ok(ExtractedPage {
            title: None,
            text: collapse_whitespace(&body),
            links: Vec::new(),
        }),
        ContentKind::Html => Ok(extract_html(&body, base_url)),
    }
}

fn extract_html(html: &str, base_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);

    let base = document_base(&document, base_url);
    let title = extract_title(&document);
    let links = extract_links(&document, &base);

    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw_text = String::new();
    collect_text(root, &mut raw_text, 0);

    ExtractedPage {
        title,
        text: collapse_whitespace(&raw_text),
        links,
    }
}

/// Appends the visible text under `element`, marking block boundaries with newlines
fn collect_text(element: ElementRef, out: &mut String, depth: usize) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if depth >= MAX_WALK_DEPTH {
                    out.extend(child_ref.text());
                } else {
                    collect_text(child_ref, out, depth + 1);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
    // Inline siblings still need a word boundary
    out.push(' ');
}

/// Collapses whitespace within lines and drops empty lines
fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| {
            let raw: String = element.text().collect();
            raw.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|s| !s.is_empty())
}

/// Returns the `<base href>` target if present and valid
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or_else(|| page_url.clone())
}

/// Extracts all followable links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    let mut push = |href: &str| {
        if let Some(url) = resolve_link(href, base_url) {
            if seen.insert(url.to_string()) {
                links.push(url);
            }
        }
    };

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                push(href);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only anchors
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    base_url
        .join(href)
        .ok()
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/docs/page").unwrap()
    }

    fn html(body: &str) -> ExtractedPage {
        extract(body.as_bytes(), Some("text/html"), &base_url()).unwrap()
    }

    #[test]
    fn test_extract_title() {
        let page = html("<html><head><title>  Test\n Page  </title></head><body></body></html>");
        assert_eq!(page.title, Some("Test Page".to_string()));
        assert!(page.text.is_empty());
    }

    #[test]
    fn test_title_is_single_line() {
        let page = html("<html><head><title>\n  API\r\n\t Reference \n</title></head></html>");
        assert_eq!(page.title.as_deref(), Some("API Reference"));
    }

    #[test]
    fn test_no_title() {
        assert_eq!(html("<html><body>x</body></html>").title, None);
    }

    #[test]
    fn test_strips_boilerplate() {
        let page = html(
            r#"<html><head><style>body { color: red }</style></head><body>
                <nav><a href="/home">Home</a> Menu</nav>
                <header>Site banner</header>
                <main><h1>Guide</h1><p>First   paragraph.</p><script>var a = 1;</script>
                <p>Second <b>bold</b> paragraph.</p></main>
                <footer>Copyright</footer>
            </body></html>"#,
        );

        assert_eq!(page.text, "Guide\nFirst paragraph.\nSecond bold paragraph.");
        assert!(!page.text.contains("Menu"));
        assert!(!page.text.contains("var a"));
        assert!(!page.text.contains("color"));
        // Links inside navigation are still followed
        assert_eq!(page.links[0].as_str(), "https://example.com/home");
    }

    #[test]
    fn test_inline_elements_keep_word_boundaries() {
        let page = html("<body><span>alpha</span><span>beta</span></body>");
        assert_eq!(page.text, "alpha beta");
    }

    #[test]
    fn test_malformed_markup_degrades() {
        let page = html("<html><body><p>Unclosed <div>nested <p>text</body>");
        assert!(page.text.contains("Unclosed"));
        assert!(page.text.contains("nested"));
        assert!(page.text.contains("text"));
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let raw = b"<body><p>caf\xe9 ok</p></body>";
        let page = extract(raw, None, &base_url()).unwrap();
        assert!(page.text.ends_with("ok"));
    }

    #[test]
    fn test_relative_and_absolute_links() {
        let page = html(
            r#"<body>
                <a href="intro">Relative</a>
                <a href="/root">Rooted</a>
                <a href="../up">Up</a>
                <a href="https://other.com/x">External</a>
                <a href="//cdn.example.com/y">Protocol relative</a>
            </body>"#,
        );
        let links: Vec<&str> = page.links.iter().map(Url::as_str).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/docs/intro",
                "https://example.com/root",
                "https://example.com/up",
                "https://other.com/x",
                "https://cdn.example.com/y",
            ]
        );
    }

    #[test]
    fn test_excluded_links() {
        let page = html(
            r##"<body>
                <a href="javascript:void(0)">JS</a>
                <a href="MAILTO:someone@example.com">Mail</a>
                <a href="tel:+123">Call</a>
                <a href="data:text/plain,hi">Data</a>
                <a href="#section">Anchor</a>
                <a href="/file.zip" download>Download</a>
                <a href="ftp://example.com/file">FTP</a>
                <a href="">Empty</a>
            </body>"##,
        );
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_duplicate_links_collapsed() {
        let page = html(r#"<body><a href="/a">1</a><a href="/a">2</a><a href="/b">3</a></body>"#);
        assert_eq!(page.links.len(), 2);
    }

    #[test]
    fn test_canonical_and_base_href() {
        let page = html(
            r#"<html><head>
                <base href="https://example.com/v2/">
                <link rel="canonical" href="https://example.com/docs/canonical">
            </head><body><a href="guide">Guide</a></body></html>"#,
        );
        let links: Vec<&str> = page.links.iter().map(Url::as_str).collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/v2/guide",
                "https://example.com/docs/canonical"
            ]
        );
    }

    #[test]
    fn test_plain_text() {
        let page = extract(
            b"  line one  \n\n\tline   two ",
            Some("text/plain; charset=utf-8"),
            &base_url(),
        )
        .unwrap();
        assert_eq!(page.text, "line one\nline two");
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_content_kinds() {
        assert_eq!(
            ContentKind::from_content_type(None).unwrap(),
            ContentKind::Html
        );
        assert_eq!(
            ContentKind::from_content_type(Some("application/xhtml+xml")).unwrap(),
            ContentKind::Html
        );
        assert_eq!(
            ContentKind::from_content_type(Some("Text/HTML; charset=UTF-8")).unwrap(),
            ContentKind::Html
        );
        assert_eq!(
            ContentKind::from_content_type(Some("image/png")).unwrap_err(),
            ExtractError::UnsupportedContentType("image/png".to_string())
        );
        assert!(ContentKind::from_content_type(Some("application/pdf")).is_err());
    }
}
