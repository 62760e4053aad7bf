//! Handing resolved URL nodes to whatever consumes them.

use crate::error::Result;
use crate::node::{Node, NodeKind};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// What a sink receives for every page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
}

impl From<&Node> for UrlRecord {
    fn from(node: &Node) -> Self {
        Self {
            location: node.location.clone(),
            lastmod: node.lastmod.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedLocation {
    pub location: String,
    pub cause: String,
}

/// Call `f` for every `Url` node below `node`, parents before children.
pub fn for_each_url<F>(node: &Node, mut f: F)
where
    F: FnMut(&Node),
{
    node.walk().filter(|n| n.kind == NodeKind::Url).for_each(|n| f(n));
}

pub fn for_each_error<F>(node: &Node, mut f: F)
where
    F: FnMut(&Node),
{
    node.walk().filter(|n| n.kind == NodeKind::Error).for_each(|n| f(n));
}

pub fn failed_locations(node: &Node) -> Vec<FailedLocation> {
    let mut failed = Vec::new();
    for_each_error(node, |n| {
        failed.push(FailedLocation {
            location: n.location.clone(),
            cause: n.error.clone().unwrap_or_else(|| "unknown error".to_string()),
        })
    });
    failed
}

/// Push every URL record into the bounded channel, waiting whenever it is
/// full. Returns the number of records delivered; stops early if the
/// receiver goes away.
pub async fn send_each_url(node: &Node, sender: &mpsc::Sender<UrlRecord>) -> usize {
    let mut sent = 0;
    for url in node.walk().filter(|n| n.kind == NodeKind::Url) {
        if sender.send(UrlRecord::from(url)).await.is_err() {
            warn!("URL receiver closed after {} records", sent);
            break;
        }
        sent += 1;
    }
    sent
}

/// Walk `node` on a separate task. The receiver yields `None` once every
/// record has been sent.
pub fn spawn_stream(node: Node, capacity: usize) -> (JoinHandle<usize>, mpsc::Receiver<UrlRecord>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(async move {
        let sent = send_each_url(&node, &tx).await;
        debug!("Stream producer finished after {} records", sent);
        sent
    });
    (handle, rx)
}

pub async fn collect_urls(node: Node, capacity: usize) -> Result<Vec<UrlRecord>> {
    let (handle, mut rx) = spawn_stream(node, capacity);
    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }
    handle.await?;
    Ok(records)
}

/// Optional sender used by the expander to publish URLs as it finds them.
pub(crate) struct UrlEmitter<'a> {
    sender: Option<&'a mpsc::Sender<UrlRecord>>,
    sent: usize,
}

impl<'a> UrlEmitter<'a> {
    pub(crate) fn new(sender: Option<&'a mpsc::Sender<UrlRecord>>) -> Self {
        Self { sender, sent: 0 }
    }

    pub(crate) async fn emit(&mut self, node: &Node) {
        let Some(sender) = self.sender else {
            return;
        };
        if sender.send(UrlRecord::from(node)).await.is_err() {
            warn!("URL receiver closed after {} records, expansion continues unstreamed", self.sent);
            self.sender = None;
            return;
        }
        self.sent += 1;
    }

    /// Publish the URLs of a subtree that was already resolved earlier.
    pub(crate) async fn emit_subtree(&mut self, node: &Node) {
        if self.sender.is_none() {
            return;
        }
        for url in node.walk().filter(|n| n.kind == NodeKind::Url) {
            self.emit(url).await;
        }
    }

    pub(crate) fn sent(&self) -> usize {
        self.sent
    }
}
