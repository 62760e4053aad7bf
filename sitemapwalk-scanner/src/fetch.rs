use crate::error::{Result, ScanError};
use flate2::read::MultiGzDecoder;
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::Client;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub const DEFAULT_DEBUG_PROXY: &str = "https://localhost:8445";

/// Anything that can turn a location into document bytes. The expander only
/// talks to this trait, so tests can hand it canned documents.
pub trait Fetch: Send + Sync {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<Vec<u8>>>;
}

impl<T: Fetch + ?Sized> Fetch for Arc<T> {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        (**self).fetch(location)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Skip TLS certificate validation
    pub insecure: bool,
    /// Route every request through this interception proxy
    pub debug_proxy: Option<String>,
    /// Response headers must arrive within this window
    pub header_timeout: Duration,
    /// The whole request, body included, is aborted after this
    pub overall_timeout: Duration,
    pub user_agent: String,
    /// Raw response bodies are written here before decompression
    pub dump_raw: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            insecure: false,
            debug_proxy: None,
            header_timeout: Duration::from_secs(5),
            overall_timeout: Duration::from_secs(10),
            user_agent: format!("sitemapwalk/{}", env!("CARGO_PKG_VERSION")),
            dump_raw: None,
        }
    }
}

impl FetchConfig {
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Debug mode: traffic goes through the proxy, certificates are not
    /// checked and headers get a shorter deadline.
    pub fn with_debug_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.debug_proxy = Some(proxy.into());
        self.header_timeout = Duration::from_secs(2);
        self
    }

    pub fn with_header_timeout(mut self, timeout: Duration) -> Self {
        self.header_timeout = timeout;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_dump_raw(mut self, path: Option<PathBuf>) -> Self {
        self.dump_raw = path;
        self
    }

    fn accepts_invalid_certs(&self) -> bool {
        self.insecure || self.debug_proxy.is_some()
    }
}

pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.overall_timeout)
            .connect_timeout(config.header_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .danger_accept_invalid_certs(config.accepts_invalid_certs());

        if let Some(ref proxy) = config.debug_proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| ScanError::InvalidUrl(format!("debug proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ScanError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// GET the location and return its body, gunzipped when the body starts
    /// with the gzip magic bytes.
    pub async fn fetch_location(&self, location: &str) -> Result<Vec<u8>> {
        Url::parse(location)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", location, e)))?;

        debug!("GET {}", location);
        let response = tokio::time::timeout(
            self.config.header_timeout,
            self.client.get(location).send(),
        )
        .await
        .map_err(|_| ScanError::Timeout {
            location: location.to_string(),
            timeout: self.config.header_timeout,
        })?
        .map_err(|e| self.transport_error(location, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                location: location.to_string(),
                status: status.as_u16(),
            });
        }

        let raw = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(location, e))?
            .to_vec();

        if let Some(ref path) = self.config.dump_raw
            && let Err(e) = tokio::fs::write(path, &raw).await
        {
            warn!("Could not dump raw body of {} to {}: {}", location, path.display(), e);
        }

        let body = decompress_if_gzip(location, raw)?;
        debug!("GET {} successful ({} bytes)", location, body.len());
        Ok(body)
    }

    fn transport_error(&self, location: &str, e: reqwest::Error) -> ScanError {
        if e.is_timeout() {
            ScanError::Timeout {
                location: location.to_string(),
                timeout: self.config.overall_timeout,
            }
        } else {
            ScanError::Fetch {
                location: location.to_string(),
                source: e,
            }
        }
    }
}

impl Fetch for Fetcher {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<Vec<u8>>> {
        self.fetch_location(location).boxed()
    }
}

pub fn is_gzip(body: &[u8]) -> bool {
    body.starts_with(&GZIP_MAGIC)
}

/// Gunzip the body if it carries gzip framing, otherwise hand it back as is.
pub fn decompress_if_gzip(location: &str, body: Vec<u8>) -> Result<Vec<u8>> {
    if !is_gzip(&body) {
        return Ok(body);
    }

    let mut decoded = Vec::with_capacity(body.len() * 4);
    MultiGzDecoder::new(body.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|e| ScanError::Decode {
            location: location.to_string(),
            source: e,
        })?;
    Ok(decoded)
}
