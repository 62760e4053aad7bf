//! Turning a root node into a fully resolved sitemap tree.
//!
//! Expansion is sequential and depth first. Instead of recursing, the
//! expander keeps an explicit stack of open nodes: a child being worked on is
//! moved out of its parent, pushed, and moved back once it is done. Every
//! failure is recorded on the node that failed and never travels further up.

use crate::classify::{DocumentKind, classify};
use crate::error::{Result, ScanError};
use crate::fetch::Fetch;
use crate::node::{Node, NodeKind};
use crate::parse::{parse_sitemap_index, parse_url_set};
use crate::stream::{UrlEmitter, UrlRecord};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Called after every node whose kind or children were decided.
pub type ExpandProgressCallback = Arc<dyn Fn(&str, NodeKind) + Send + Sync>;

pub struct Expander<F: Fetch> {
    fetcher: F,
    classify_attempts: usize,
    cancel: CancellationToken,
    progress_callback: Option<ExpandProgressCallback>,
}

/// What to do with a node after trying to resolve its own content.
enum Outcome {
    Descend,
    Stop,
}

struct Frame {
    node: Node,
    next_child: usize,
}

impl Frame {
    fn new(node: Node) -> Self {
        Self {
            node,
            next_child: 0,
        }
    }

    fn child_mut(&mut self, idx: usize) -> Option<&mut Node> {
        self.node.children.as_mut().and_then(|c| c.get_mut(idx))
    }
}

impl<F: Fetch> Expander<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            classify_attempts: 1,
            cancel: CancellationToken::new(),
            progress_callback: None,
        }
    }

    /// How many fetches an undetermined location gets before it is given up.
    pub fn with_classify_attempts(mut self, attempts: usize) -> Self {
        self.classify_attempts = attempts.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress_callback(mut self, callback: ExpandProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve `node` and everything below it. Never fails: a location that
    /// cannot be fetched or parsed becomes an `Error` node.
    pub async fn expand(&self, node: Node) -> Node {
        let mut emitter = UrlEmitter::new(None);
        self.expand_with(node, &mut emitter).await
    }

    /// Like [`Expander::expand`], but every `Url` node is also sent into
    /// `sender` as soon as it is reached. The channel closes when the
    /// expansion finishes and the sender is dropped.
    pub async fn expand_streaming(&self, node: Node, sender: mpsc::Sender<UrlRecord>) -> Node {
        let mut emitter = UrlEmitter::new(Some(&sender));
        let node = self.expand_with(node, &mut emitter).await;
        debug!("Streamed {} URLs during expansion", emitter.sent());
        node
    }

    async fn expand_with(&self, mut node: Node, emitter: &mut UrlEmitter<'_>) -> Node {
        if node.kind == NodeKind::Undetermined {
            self.determine(&mut node).await;
        }
        if node.is_terminal() || node.kind == NodeKind::Undetermined {
            emitter.emit_subtree(&node).await;
            return node;
        }

        info!("Expanding {}", display_location(&node));
        let mut stack = match self.resolve_self(&mut node).await {
            Outcome::Descend => vec![Frame::new(node)],
            Outcome::Stop => return node,
        };

        let mut finished = None;
        while let Some(frame) = stack.last_mut() {
            let cancelled = self.cancel.is_cancelled();
            let idx = frame.next_child;

            if cancelled || idx >= frame.node.children().len() {
                if let Some(Frame { mut node, .. }) = stack.pop() {
                    if !cancelled {
                        node.children_resolved = true;
                    }
                    // the parent already advanced past this child's slot
                    match stack.last_mut() {
                        Some(parent) => {
                            let slot = parent.next_child - 1;
                            if let Some(child) = parent.child_mut(slot) {
                                *child = node;
                            }
                        }
                        None => finished = Some(node),
                    }
                }
                continue;
            }

            frame.next_child += 1;
            let Some(child) = frame.child_mut(idx) else {
                continue;
            };

            match child.kind {
                NodeKind::Url => emitter.emit(child).await,
                NodeKind::Error => {}
                NodeKind::Undetermined => {
                    if self.determine(child).await {
                        // look at the same child again now that its kind is known
                        frame.next_child = idx;
                    }
                }
                NodeKind::Sitemap | NodeKind::Root => {
                    if child.is_terminal() {
                        emitter.emit_subtree(child).await;
                        continue;
                    }

                    let location = child.location.clone();
                    if on_path(&stack, &location) {
                        let err = ScanError::CycleDetected(location);
                        if let Some(child) = stack.last_mut().and_then(|f| f.child_mut(idx)) {
                            self.fail(child, err);
                        }
                        continue;
                    }

                    let Some(frame) = stack.last_mut() else {
                        continue;
                    };
                    let Some(slot) = frame.child_mut(idx) else {
                        continue;
                    };
                    let mut child = std::mem::take(slot);
                    match self.resolve_self(&mut child).await {
                        Outcome::Descend => stack.push(Frame::new(child)),
                        Outcome::Stop => {
                            if let Some(slot) = stack.last_mut().and_then(|f| f.child_mut(idx)) {
                                *slot = child;
                            }
                        }
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            info!("Expansion cancelled, returning a partially resolved tree");
        }
        finished.unwrap_or_default()
    }

    /// Fetch and attach the node's own children, unless they are already
    /// attached.
    async fn resolve_self(&self, node: &mut Node) -> Outcome {
        if node.children.is_some() {
            return Outcome::Descend;
        }

        match self.fetch_checked(&node.location).await {
            Ok(body) => self.attach(node, &body),
            Err(ScanError::Cancelled(location)) => {
                debug!("Left {} unresolved after cancellation", location);
                Outcome::Stop
            }
            Err(e) => {
                self.fail(node, e);
                Outcome::Stop
            }
        }
    }

    fn attach(&self, node: &mut Node, body: &[u8]) -> Outcome {
        let outcome = match classify(body) {
            DocumentKind::UrlSet => match parse_url_set(body) {
                Ok(entries) => {
                    debug!("{} lists {} URLs", node.location, entries.len());
                    node.children = Some(
                        entries
                            .into_iter()
                            .map(|e| Node::url(e.loc).with_lastmod(e.lastmod))
                            .collect(),
                    );
                    Outcome::Descend
                }
                Err(e) => {
                    self.fail(node, e);
                    Outcome::Stop
                }
            },
            DocumentKind::SitemapIndex => match parse_sitemap_index(body) {
                Ok(entries) => {
                    debug!("{} lists {} sitemaps", node.location, entries.len());
                    node.children = Some(
                        entries
                            .into_iter()
                            .map(|e| Node::sitemap(e.loc).with_lastmod(e.lastmod))
                            .collect(),
                    );
                    Outcome::Descend
                }
                Err(e) => {
                    self.fail(node, e);
                    Outcome::Stop
                }
            },
            DocumentKind::Unknown => {
                info!(
                    "{} is neither a url set nor a sitemap index, no children",
                    node.location
                );
                node.children = Some(Vec::new());
                Outcome::Descend
            }
        };

        self.report(node);
        outcome
    }

    /// Decide what an undetermined location is by looking at its body.
    /// Sitemap documents become `Sitemap` nodes with their entries attached
    /// straight away; any other content is a page and becomes a `Url`.
    /// Returns false when cancellation left the node undetermined.
    async fn determine(&self, node: &mut Node) -> bool {
        let mut last_error = None;

        for attempt in 1..=self.classify_attempts {
            match self.fetch_checked(&node.location).await {
                Ok(body) => {
                    match classify(&body) {
                        DocumentKind::Unknown => {
                            node.kind = NodeKind::Url;
                            node.children_resolved = true;
                            self.report(node);
                        }
                        DocumentKind::UrlSet | DocumentKind::SitemapIndex => {
                            node.kind = NodeKind::Sitemap;
                            self.attach(node, &body);
                        }
                    }
                    return true;
                }
                Err(ScanError::Cancelled(_)) => return false,
                Err(e @ ScanError::InvalidUrl(_)) => {
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, self.classify_attempts, node.location, e
                    );
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            self.fail(node, e);
        }
        true
    }

    async fn fetch_checked(&self, location: &str) -> Result<Vec<u8>> {
        if self.cancel.is_cancelled() {
            return Err(ScanError::Cancelled(location.to_string()));
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ScanError::Cancelled(location.to_string())),
            result = self.fetcher.fetch(location) => result,
        }
    }

    fn fail(&self, node: &mut Node, err: ScanError) {
        warn!("Failed to expand {}: {}", display_location(node), err);
        node.mark_error(err);
        self.report(node);
    }

    fn report(&self, node: &Node) {
        if let Some(ref callback) = self.progress_callback {
            callback(&node.location, node.kind);
        }
    }
}

fn on_path(stack: &[Frame], location: &str) -> bool {
    !location.is_empty() && stack.iter().any(|f| f.node.location == location)
}

fn display_location(node: &Node) -> &str {
    if node.kind == NodeKind::Root {
        "<root>"
    } else {
        &node.location
    }
}
