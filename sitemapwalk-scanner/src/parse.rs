//! Structural decoding of sitemap documents.

use crate::classify::{DocumentKind, classify};
use crate::error::{Result, ScanError};
use crate::fetch::decompress_if_gzip;
use crate::node::Node;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};
use url::Url;

/// One `<sitemap>` or `<url>` entry, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
    pub loc: String,
    pub lastmod: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Loc,
    Lastmod,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"loc" => Some(Field::Loc),
            b"lastmod" => Some(Field::Lastmod),
            _ => None,
        }
    }

    fn assign(self, entry: &mut Entry, value: &str) {
        match self {
            Field::Loc => entry.loc = value.to_string(),
            Field::Lastmod if !value.is_empty() => entry.lastmod = Some(value.to_string()),
            Field::Lastmod => {}
        }
    }
}

pub fn parse_sitemap_index(body: &[u8]) -> Result<Vec<Entry>> {
    parse_entries(body, "sitemapindex", "sitemap")
}

pub fn parse_url_set(body: &[u8]) -> Result<Vec<Entry>> {
    parse_entries(body, "urlset", "url")
}

fn parse_entries(body: &[u8], root_tag: &str, entry_tag: &str) -> Result<Vec<Entry>> {
    let mut reader = Reader::from_reader(body);
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut closed_root = false;
    let mut current: Option<Entry> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if depth == 0 {
                    expect_root(name, root_tag)?;
                    seen_root = true;
                } else if depth == 1 && name == entry_tag.as_bytes() {
                    current = Some(Entry::default());
                } else if depth == 2 && current.is_some() {
                    field = Field::from_tag(name);
                    text.clear();
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                let name = e.local_name();
                let name = name.as_ref();
                if depth == 0 {
                    // <urlset/> is a valid, empty document
                    expect_root(name, root_tag)?;
                    seen_root = true;
                    closed_root = true;
                    break;
                } else if depth == 1 && name == entry_tag.as_bytes() {
                    debug!("Skipping empty <{}/> entry", entry_tag);
                }
            }
            Ok(Event::Text(e)) => {
                if field.is_some() {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| ScanError::Parse(err.to_string()))?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(e)) => {
                if field.is_some() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(_)) => {
                depth = depth.saturating_sub(1);
                match depth {
                    0 => {
                        closed_root = true;
                        break;
                    }
                    1 => {
                        if let Some(entry) = current.take() {
                            if entry.loc.is_empty() {
                                debug!("Skipping <{}> entry without <loc>", entry_tag);
                            } else {
                                entries.push(entry);
                            }
                        }
                    }
                    2 => {
                        if let (Some(f), Some(entry)) = (field.take(), current.as_mut()) {
                            f.assign(entry, text.trim());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ScanError::Parse(format!(
                    "{} (at byte {})",
                    e,
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    if !seen_root {
        return Err(ScanError::Parse(format!(
            "document has no <{}> element",
            root_tag
        )));
    }
    if !closed_root {
        return Err(ScanError::Parse(format!(
            "document ended before </{}>",
            root_tag
        )));
    }

    Ok(entries)
}

fn expect_root(name: &[u8], root_tag: &str) -> Result<()> {
    if name == root_tag.as_bytes() {
        Ok(())
    } else {
        Err(ScanError::Parse(format!(
            "expected element <{}> but found <{}>",
            root_tag,
            String::from_utf8_lossy(name)
        )))
    }
}

/// Parse a plain newline-delimited list of locations. Blank lines and `#`
/// comments are ignored; scheme-less hosts get `http://`.
pub fn parse_location_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_location_line)
        .collect()
}

fn parse_location_line(line: &str) -> Option<String> {
    if Url::parse(line).is_ok() {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if Url::parse(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    warn!("Skipping invalid location '{}'", line);
    None
}

/// Build the root node from the caller-supplied root document.
///
/// The document may be a sitemap index (children become `Sitemap` nodes), a
/// url set (children become `Url` nodes) or a plain location list (children
/// become `Undetermined` and are sniffed during expansion). Gzip input is
/// accepted. Anything else is an error, since nothing can be expanded.
pub fn parse_root_document(raw: &[u8]) -> Result<Node> {
    let body = decompress_if_gzip("<root document>", raw.to_vec())?;

    let children = match classify(&body) {
        DocumentKind::UrlSet => parse_url_set(&body)?
            .into_iter()
            .map(|e| Node::url(e.loc).with_lastmod(e.lastmod))
            .collect(),
        DocumentKind::SitemapIndex => parse_sitemap_index(&body)?
            .into_iter()
            .map(|e| Node::sitemap(e.loc).with_lastmod(e.lastmod))
            .collect(),
        DocumentKind::Unknown if looks_like_xml(&body) => {
            // no entries to sniff, so go by the document element
            match document_element(&body).as_deref() {
                Some(b"urlset") => parse_url_set(&body)?
                    .into_iter()
                    .map(|e| Node::url(e.loc).with_lastmod(e.lastmod))
                    .collect(),
                _ => parse_sitemap_index(&body)?
                    .into_iter()
                    .map(|e| Node::sitemap(e.loc).with_lastmod(e.lastmod))
                    .collect(),
            }
        }
        DocumentKind::Unknown => {
            let text = String::from_utf8_lossy(&body);
            let locations = parse_location_list(&text);
            if locations.is_empty() {
                return Err(ScanError::Parse(
                    "root document is neither a sitemap document nor a location list".to_string(),
                ));
            }
            locations.into_iter().map(Node::undetermined).collect()
        }
    };

    Ok(Node::root().with_children(children))
}

/// Local name of the first element in `body`, if it has one.
fn document_element(body: &[u8]) -> Option<Vec<u8>> {
    let mut reader = Reader::from_reader(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(e.local_name().as_ref().to_vec());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

fn looks_like_xml(body: &[u8]) -> bool {
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'<')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap>
    <loc>https://example.com/sitemap-1.xml</loc>
    <lastmod>2024-01-01</lastmod>
  </sitemap>
  <sitemap>
    <loc> https://example.com/sitemap-2.xml </loc>
  </sitemap>
</sitemapindex>"#;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/a?x=1&amp;y=2</loc></url>
  <url><loc>https://example.com/b</loc><changefreq>daily</changefreq></url>
  <url><loc>https://example.com/a?x=1&amp;y=2</loc></url>
</urlset>"#;

    #[test]
    fn test_parse_sitemap_index_keeps_order_and_lastmod() {
        let entries = parse_sitemap_index(INDEX.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].loc, "https://example.com/sitemap-1.xml");
        assert_eq!(entries[0].lastmod.as_deref(), Some("2024-01-01"));
        assert_eq!(entries[1].loc, "https://example.com/sitemap-2.xml");
        assert_eq!(entries[1].lastmod, None);
    }

    #[test]
    fn test_parse_url_set_unescapes_and_keeps_duplicates() {
        let entries = parse_url_set(URLSET.as_bytes()).unwrap();
        let locs: Vec<&str> = entries.iter().map(|e| e.loc.as_str()).collect();
        assert_eq!(
            locs,
            vec![
                "https://example.com/a?x=1&y=2",
                "https://example.com/b",
                "https://example.com/a?x=1&y=2",
            ]
        );
    }

    #[test]
    fn test_parse_empty_documents() {
        assert!(parse_url_set(b"<urlset></urlset>").unwrap().is_empty());
        assert!(parse_url_set(b"<urlset/>").unwrap().is_empty());
        assert!(parse_sitemap_index(b"<sitemapindex></sitemapindex>").unwrap().is_empty());
    }

    #[test]
    fn test_parse_wrong_root_element() {
        let err = parse_sitemap_index(URLSET.as_bytes()).unwrap_err();
        assert!(matches!(err, ScanError::Parse(_)));
        assert!(err.to_string().contains("sitemapindex"));
    }

    #[test]
    fn test_parse_mismatched_tags() {
        let body = b"<urlset><url><loc>https://example.com/</url></urlset>";
        assert!(matches!(parse_url_set(body), Err(ScanError::Parse(_))));
    }

    #[test]
    fn test_parse_truncated_document() {
        let body = b"<urlset><url><loc>https://example.com/</loc></url>";
        assert!(matches!(parse_url_set(body), Err(ScanError::Parse(_))));
    }

    #[test]
    fn test_entries_without_loc_are_skipped() {
        let body = b"<urlset><url><lastmod>2024</lastmod></url><url/><url><loc>https://e.com/x</loc></url></urlset>";
        let entries = parse_url_set(body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].loc, "https://e.com/x");
    }

    #[test]
    fn test_prefixed_elements_are_recognised() {
        let body = b"<sm:urlset xmlns:sm=\"http://www.sitemaps.org/schemas/sitemap/0.9\"><sm:url><sm:loc>https://e.com/p</sm:loc></sm:url></sm:urlset>";
        let entries = parse_url_set(body).unwrap();
        assert_eq!(entries[0].loc, "https://e.com/p");
    }

    #[test]
    fn test_cdata_loc() {
        let body = b"<urlset><url><loc><![CDATA[https://e.com/c]]></loc></url></urlset>";
        assert_eq!(parse_url_set(body).unwrap()[0].loc, "https://e.com/c");
    }

    #[test]
    fn test_parse_location_list() {
        let text = "https://example.com/sitemap.xml\n\n# comment\nexample.org/feed.xml\nnot a url at all!!\n";
        let locations = parse_location_list(text);
        assert_eq!(
            locations,
            vec![
                "https://example.com/sitemap.xml".to_string(),
                "http://example.org/feed.xml".to_string(),
            ]
        );
    }

    #[test]
    fn test_root_from_sitemap_index() {
        let root = parse_root_document(INDEX.as_bytes()).unwrap();
        assert_eq!(root.kind, NodeKind::Root);
        assert_eq!(root.children().len(), 2);
        assert!(root.children().iter().all(|c| c.kind == NodeKind::Sitemap));
        assert_eq!(root.children()[0].lastmod.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn test_root_from_url_set() {
        let root = parse_root_document(URLSET.as_bytes()).unwrap();
        assert_eq!(root.children().len(), 3);
        assert!(root.children().iter().all(|c| c.kind == NodeKind::Url));
    }

    #[test]
    fn test_root_from_location_list() {
        let root = parse_root_document(b"https://example.com/a.xml\nhttps://example.com/b.xml\n").unwrap();
        assert_eq!(root.children().len(), 2);
        assert!(root.children().iter().all(|c| c.kind == NodeKind::Undetermined));
    }

    #[test]
    fn test_root_empty_index_has_resolved_empty_children() {
        let root = parse_root_document(b"<sitemapindex></sitemapindex>").unwrap();
        assert_eq!(root.children, Some(vec![]));
    }

    #[test]
    fn test_root_empty_url_set_is_accepted() {
        for body in [
            &b"<urlset/>"[..],
            b"<urlset></urlset>",
            b"<?xml version=\"1.0\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n</urlset>",
        ] {
            let root = parse_root_document(body).unwrap();
            assert_eq!(root.kind, NodeKind::Root);
            assert_eq!(root.children, Some(vec![]));
        }
    }

    #[test]
    fn test_document_element() {
        assert_eq!(
            document_element(b"<?xml version=\"1.0\"?><!-- x --><urlset/>").as_deref(),
            Some(&b"urlset"[..])
        );
        assert_eq!(
            document_element(b"<sm:sitemapindex xmlns:sm=\"x\"></sm:sitemapindex>").as_deref(),
            Some(&b"sitemapindex"[..])
        );
        assert_eq!(document_element(b"   "), None);
    }

    #[test]
    fn test_root_malformed_xml_is_fatal() {
        assert!(parse_root_document(b"<sitemapindex><sitemap>").is_err());
        assert!(parse_root_document(b"   \n").is_err());
    }
}
