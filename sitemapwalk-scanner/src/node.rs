//! The discovery tree.
//!
//! A [`Node`] owns its children outright; there are no back references. The
//! `children` field distinguishes "not fetched yet" (`None`) from "fetched and
//! empty" (`Some(vec![])`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Referenced without any hint about what the location serves
    #[default]
    Undetermined,
    Root,
    Sitemap,
    Url,
    Error,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Undetermined => "undetermined",
            NodeKind::Root => "root",
            NodeKind::Sitemap => "sitemap",
            NodeKind::Url => "url",
            NodeKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    pub children: Option<Vec<Node>>,
    pub children_resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Node {
    pub fn root() -> Self {
        Self {
            kind: NodeKind::Root,
            ..Self::default()
        }
    }

    pub fn sitemap(location: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Sitemap,
            location: location.into(),
            ..Self::default()
        }
    }

    /// A page URL. Leaves are resolved from the moment they exist.
    pub fn url(location: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Url,
            location: location.into(),
            children_resolved: true,
            ..Self::default()
        }
    }

    pub fn undetermined(location: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Undetermined,
            location: location.into(),
            ..Self::default()
        }
    }

    pub fn with_lastmod(mut self, lastmod: Option<String>) -> Self {
        self.lastmod = lastmod;
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = Some(children);
        self
    }

    /// Url and Error nodes never change again; nor does anything already
    /// flagged as resolved.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Url | NodeKind::Error) || self.children_resolved
    }

    pub fn mark_error(&mut self, cause: impl ToString) {
        self.kind = NodeKind::Error;
        self.error = Some(cause.to_string());
    }

    pub fn children(&self) -> &[Node] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Pre-order iterator over this node and every descendant.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        for node in self.walk() {
            match node.kind {
                NodeKind::Undetermined => stats.undetermined += 1,
                NodeKind::Root => {}
                NodeKind::Sitemap => {
                    stats.sitemaps += 1;
                    if node.children.is_none() {
                        stats.unresolved += 1;
                    }
                }
                NodeKind::Url => stats.urls += 1,
                NodeKind::Error => stats.errors += 1,
            }
        }
        stats
    }

    /// True when nothing below this node still waits for a fetch.
    pub fn is_fully_resolved(&self) -> bool {
        self.walk().all(|n| match n.kind {
            NodeKind::Undetermined => false,
            NodeKind::Root | NodeKind::Sitemap => n.children.is_some(),
            NodeKind::Url | NodeKind::Error => true,
        })
    }
}

pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // reversed so the first child is popped first
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub sitemaps: usize,
    pub urls: usize,
    pub errors: usize,
    pub undetermined: usize,
    /// Sitemaps whose children were never fetched, e.g. after cancellation
    pub unresolved: usize,
}
