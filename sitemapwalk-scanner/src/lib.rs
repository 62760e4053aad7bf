pub mod classify;
pub mod error;
pub mod expand;
pub mod fetch;
pub mod node;
pub mod parse;
pub mod stream;

pub use classify::{DocumentKind, classify, looks_like_sitemap_index, looks_like_url_set};
pub use error::ScanError;
pub use expand::{ExpandProgressCallback, Expander};
pub use fetch::{Fetch, FetchConfig, Fetcher};
pub use node::{Node, NodeKind, TreeStats};
pub use parse::{Entry, parse_root_document, parse_sitemap_index, parse_url_set};
pub use stream::{FailedLocation, UrlRecord, for_each_url, send_each_url, spawn_stream};
