pub mod data;
pub mod error;
pub mod report;
pub mod run;
pub mod sink;
pub mod template;

pub use data::{Database, RunRecord, SqliteSink};
pub use error::{RunError, SinkError};
pub use report::{generate_run_report, tree_dump_filename, write_tree_dump};
pub use run::{RecordCallback, RunOptions, RunSummary, execute_run, load_root};
pub use sink::{JsonSink, MemorySink, RunStatus, StdoutSink, UrlSink};
pub use template::{DEFAULT_TEMPLATE_FILENAME, SITEMAPS_TEMPLATE, write_template};
