//! Destinations for the URL records produced by a run.
//!
//! Sinks are plain synchronous writers. A run drives them from a blocking
//! task that drains the record queue, so a slow database never stalls the
//! expander for longer than the queue takes to fill up.

use crate::error::SinkError;
use serde::{Deserialize, Serialize};
use sitemapwalk_scanner::UrlRecord;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// How a run ended, as far as a sink is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

pub trait UrlSink: Send {
    /// Short label used in progress output, e.g. "sqlite".
    fn name(&self) -> &str;

    fn write(&mut self, record: &UrlRecord) -> Result<(), SinkError>;

    /// Called once after the last record. The default does nothing.
    fn finish(&mut self, _status: RunStatus) -> Result<(), SinkError> {
        Ok(())
    }
}

impl UrlSink for Box<dyn UrlSink> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write(&mut self, record: &UrlRecord) -> Result<(), SinkError> {
        (**self).write(record)
    }

    fn finish(&mut self, status: RunStatus) -> Result<(), SinkError> {
        (**self).finish(status)
    }
}

/// Keeps every record in memory. Clones share the same storage, so a clone
/// kept by the caller sees what the run wrote.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<UrlRecord>>>,
    status: Arc<Mutex<Option<RunStatus>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<UrlRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn locations(&self) -> Vec<String> {
        self.records().into_iter().map(|r| r.location).collect()
    }

    /// The status passed to `finish`, if the run got that far.
    pub fn status(&self) -> Option<RunStatus> {
        self.status.lock().ok().and_then(|s| *s)
    }
}

impl UrlSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn write(&mut self, record: &UrlRecord) -> Result<(), SinkError> {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
        Ok(())
    }

    fn finish(&mut self, status: RunStatus) -> Result<(), SinkError> {
        if let Ok(mut s) = self.status.lock() {
            *s = Some(status);
        }
        Ok(())
    }
}

/// Streams the records out as one JSON array without buffering them.
pub struct JsonSink<W: Write + Send> {
    writer: W,
    written: usize,
}

impl JsonSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> UrlSink for JsonSink<W> {
    fn name(&self) -> &str {
        "json"
    }

    fn write(&mut self, record: &UrlRecord) -> Result<(), SinkError> {
        let separator: &[u8] = if self.written == 0 { b"[\n  " } else { b",\n  " };
        self.writer.write_all(separator)?;
        serde_json::to_writer(&mut self.writer, record)?;
        self.written += 1;
        Ok(())
    }

    // A cancelled run still gets a closed array so the file stays valid JSON.
    fn finish(&mut self, _status: RunStatus) -> Result<(), SinkError> {
        let closing: &[u8] = if self.written == 0 { b"[]\n" } else { b"\n]\n" };
        self.writer.write_all(closing)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// One location per line.
pub struct StdoutSink<W: Write + Send = io::Stdout> {
    writer: W,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            writer: io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> StdoutSink<W> {
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> UrlSink for StdoutSink<W> {
    fn name(&self) -> &str {
        "stdout"
    }

    fn write(&mut self, record: &UrlRecord) -> Result<(), SinkError> {
        writeln!(self.writer, "{}", record.location)?;
        Ok(())
    }

    fn finish(&mut self, _status: RunStatus) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
