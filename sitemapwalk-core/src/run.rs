use crate::error::{Result, RunError, SinkError};
use crate::report::write_tree_dump;
use crate::sink::{RunStatus, UrlSink};
use sitemapwalk_scanner::stream::{DEFAULT_QUEUE_CAPACITY, FailedLocation, failed_locations};
use sitemapwalk_scanner::{
    ExpandProgressCallback, Expander, FetchConfig, Fetcher, Node, TreeStats, UrlRecord,
    parse_root_document,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Options for configuring a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Root document: sitemap index, url set or a list of locations
    pub input: PathBuf,
    pub fetch: FetchConfig,
    pub queue_capacity: usize,
    pub classify_attempts: usize,
    /// Directory for a JSON dump of the resolved tree
    pub dump_tree: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            fetch: FetchConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            classify_attempts: 1,
            dump_tree: None,
        }
    }

    pub fn with_fetch_config(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_classify_attempts(mut self, attempts: usize) -> Self {
        self.classify_attempts = attempts.max(1);
        self
    }

    pub fn with_dump_tree(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_tree = dir;
        self
    }
}

/// Callback for every record the sink accepted, with the running total
pub type RecordCallback = Arc<dyn Fn(&UrlRecord, usize) + Send + Sync>;

#[derive(Debug)]
pub struct RunSummary {
    pub records: usize,
    pub stats: TreeStats,
    pub failed: Vec<FailedLocation>,
    pub cancelled: bool,
    pub tree_dump: Option<PathBuf>,
    pub elapsed: Duration,
    pub tree: Node,
}

/// Read and parse the root document. Either failure is fatal for a run.
pub fn load_root(path: &Path) -> Result<Node> {
    let raw = std::fs::read(path).map_err(|source| RunError::RootRead {
        path: path.to_path_buf(),
        source,
    })?;
    let root = parse_root_document(&raw).map_err(|source| RunError::RootParse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "Loaded root document {} with {} entries",
        path.display(),
        root.children().len()
    );
    Ok(root)
}

/// Expand the root document and deliver every page URL to `sink` while the
/// expansion is still running.
pub async fn execute_run<S>(
    options: RunOptions,
    sink: S,
    cancel: CancellationToken,
    progress_callback: Option<ExpandProgressCallback>,
    record_callback: Option<RecordCallback>,
) -> Result<RunSummary>
where
    S: UrlSink + 'static,
{
    let started = Instant::now();
    let mut sink = sink;
    let prepared = load_root(&options.input).and_then(|root| {
        let fetcher = Fetcher::new(options.fetch.clone())?;
        Ok((root, fetcher))
    });
    let (root, fetcher) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            mark_failed(&mut sink);
            return Err(e);
        }
    };

    let mut expander = Expander::new(fetcher)
        .with_classify_attempts(options.classify_attempts)
        .with_cancellation(cancel.clone());
    if let Some(callback) = progress_callback {
        expander = expander.with_progress_callback(callback);
    }

    let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
    let consumer_cancel = cancel.clone();
    let consumer = tokio::task::spawn_blocking(move || {
        let result = drain(&mut sink, rx, record_callback.as_ref());
        if result.is_err() {
            // nothing downstream left to feed
            consumer_cancel.cancel();
        }
        (sink, result)
    });

    info!("Starting expansion of {}", options.input.display());
    let tree = expander.expand_streaming(root, tx).await;

    let (mut sink, drained) = consumer.await?;
    let records = match drained {
        Ok(records) => records,
        Err(e) => {
            error!("{} sink failed: {}", sink.name(), e);
            mark_failed(&mut sink);
            return Err(RunError::Sink(e));
        }
    };

    let cancelled = cancel.is_cancelled();
    let status = if cancelled {
        RunStatus::Cancelled
    } else {
        RunStatus::Completed
    };
    sink.finish(status)?;

    let tree_dump = match options.dump_tree {
        Some(ref dir) => {
            let path = write_tree_dump(&tree, dir).map_err(|source| RunError::TreeDump {
                path: dir.clone(),
                source,
            })?;
            info!("Tree written to {}", path.display());
            Some(path)
        }
        None => None,
    };

    let summary = RunSummary {
        records,
        stats: tree.stats(),
        failed: failed_locations(&tree),
        cancelled,
        tree_dump,
        elapsed: started.elapsed(),
        tree,
    };
    info!(
        "Run finished: {} URLs, {} failed locations ({})",
        summary.records,
        summary.failed.len(),
        status.as_str()
    );
    Ok(summary)
}

fn mark_failed<S: UrlSink>(sink: &mut S) {
    if let Err(e) = sink.finish(RunStatus::Failed) {
        debug!("Could not mark the {} output as failed: {}", sink.name(), e);
    }
}

fn drain<S: UrlSink>(
    sink: &mut S,
    mut rx: mpsc::Receiver<UrlRecord>,
    record_callback: Option<&RecordCallback>,
) -> std::result::Result<usize, SinkError> {
    let mut written = 0;
    while let Some(record) = rx.blocking_recv() {
        sink.write(&record)?;
        written += 1;
        if let Some(callback) = record_callback {
            callback(&record, written);
        }
    }
    debug!("{} sink drained {} records", sink.name(), written);
    Ok(written)
}
