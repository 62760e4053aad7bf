//! Cheap document sniffing, done before committing to a strict parse.

const SITEMAP_TAG: &[u8] = b"<sitemap>";
const URL_TAG: &[u8] = b"<url>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    UrlSet,
    SitemapIndex,
    /// Neither tag present. Not an error, the node just gets no children.
    Unknown,
}

pub fn looks_like_sitemap_index(body: &[u8]) -> bool {
    contains(body, SITEMAP_TAG)
}

pub fn looks_like_url_set(body: &[u8]) -> bool {
    contains(body, URL_TAG)
}

/// URL sets win when a document carries both tags.
pub fn classify(body: &[u8]) -> DocumentKind {
    if looks_like_url_set(body) {
        DocumentKind::UrlSet
    } else if looks_like_sitemap_index(body) {
        DocumentKind::SitemapIndex
    } else {
        DocumentKind::Unknown
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_url_set() {
        let body = br#"<?xml version="1.0"?><urlset><url><loc>https://example.com/</loc></url></urlset>"#;
        assert!(looks_like_url_set(body));
        assert!(!looks_like_sitemap_index(body));
        assert_eq!(classify(body), DocumentKind::UrlSet);
    }

    #[test]
    fn test_classify_sitemap_index() {
        let body = br#"<sitemapindex><sitemap><loc>https://example.com/s.xml</loc></sitemap></sitemapindex>"#;
        assert_eq!(classify(body), DocumentKind::SitemapIndex);
    }

    #[test]
    fn test_urlset_tag_alone_is_not_a_url_entry() {
        // "<urlset>" must not be mistaken for "<url>"
        let body = b"<urlset></urlset>";
        assert_eq!(classify(body), DocumentKind::Unknown);
    }

    #[test]
    fn test_url_set_takes_precedence() {
        let body = b"<sitemap></sitemap><url></url>";
        assert!(looks_like_sitemap_index(body));
        assert!(looks_like_url_set(body));
        assert_eq!(classify(body), DocumentKind::UrlSet);
    }

    #[test]
    fn test_unknown_content() {
        assert_eq!(classify(b"<html><body>hi</body></html>"), DocumentKind::Unknown);
        assert_eq!(classify(b""), DocumentKind::Unknown);
    }
}
