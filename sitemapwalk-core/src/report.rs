// Run summaries and tree dumps

use crate::error::SinkError;
use crate::run::RunSummary;
use chrono::{DateTime, Local};
use colored::Colorize;
use sitemapwalk_scanner::Node;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// File name used for a tree dump taken at `when`.
pub fn tree_dump_filename(when: DateTime<Local>) -> String {
    format!("{} result.json", when.format("%Y-%m-%d_%H-%M-%S"))
}

/// Write the whole tree as pretty JSON into `dir` and return the file path.
pub fn write_tree_dump(tree: &Node, dir: &Path) -> Result<PathBuf, SinkError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(tree_dump_filename(Local::now()));

    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, tree)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(path)
}

/// Human readable summary printed after a run.
pub fn generate_run_report(summary: &RunSummary) -> String {
    let mut report = String::new();
    report.push_str(DIVIDER);
    report.push_str("\n\n# Summary:\n");
    report.push_str(&format!("  URLs delivered: {}\n", summary.records));
    report.push_str(&format!("  Sitemaps resolved: {}\n", summary.stats.sitemaps));
    report.push_str(&format!("  Failed locations: {}\n", summary.stats.errors));
    if summary.stats.unresolved > 0 {
        report.push_str(&format!(
            "  Left unresolved: {}\n",
            summary.stats.unresolved
        ));
    }
    report.push_str(&format!(
        "  Elapsed: {:.1}s\n",
        summary.elapsed.as_secs_f64()
    ));

    if summary.cancelled {
        report.push_str(&format!(
            "\n  {}\n",
            "Run was cancelled, the tree is only partially expanded".yellow()
        ));
    }

    if let Some(ref path) = summary.tree_dump {
        report.push_str(&format!("  Tree written to: {}\n", path.display()));
    }

    if !summary.failed.is_empty() {
        report.push_str(&format!("\n{}\n\n", DIVIDER));
        report.push_str("## Failed locations\n");
        for failed in &summary.failed {
            report.push_str(&format!(
                "  {} {}\n      {}\n",
                "✗".red(),
                failed.location,
                failed.cause.dimmed()
            ));
        }
    }

    report.push('\n');
    report
}
