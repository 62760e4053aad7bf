use clap::ArgMatches;
use clap::parser::ValueSource;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sitemapwalk_core::data::{Database, SqliteSink};
use sitemapwalk_core::error::SinkError;
use sitemapwalk_core::report::generate_run_report;
use sitemapwalk_core::run::{RecordCallback, RunOptions, execute_run};
use sitemapwalk_core::sink::{JsonSink, StdoutSink, UrlSink};
use sitemapwalk_core::template::write_template;
use sitemapwalk_scanner::{ExpandProgressCallback, FetchConfig, NodeKind, UrlRecord};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Level, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Sqlite,
    Json,
    Stdout,
}

impl OutputType {
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Some(OutputType::Sqlite),
            "json" => Some(OutputType::Json),
            "stdout" => Some(OutputType::Stdout),
            _ => None,
        }
    }
}

/// Expand a leading `~` the same way a shell would.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn path_arg(args: &ArgMatches, id: &str) -> Option<PathBuf> {
    args.get_one::<String>(id).map(|p| expand_path(p))
}

fn pathbuf_arg(args: &ArgMatches, id: &str) -> Option<PathBuf> {
    args.get_one::<PathBuf>(id)
        .map(|p| expand_path(&p.to_string_lossy()))
}

/// Log level from the global `-v` / `--quiet` flags.
pub fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

pub fn init_tracing(level: Level) {
    // stdout may be carrying URLs
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

pub fn fetch_config_from_args(args: &ArgMatches) -> FetchConfig {
    let mut config = FetchConfig::default()
        .with_insecure(args.get_flag("insecure"))
        .with_dump_raw(pathbuf_arg(args, "dump-raw"));

    if let Some(proxy) = args.get_one::<String>("debug-proxy") {
        config = config.with_debug_proxy(proxy.clone());
    }

    // an explicit value beats the shorter debug proxy default
    let explicit = args.value_source("header-timeout") == Some(ValueSource::CommandLine);
    if (explicit || config.debug_proxy.is_none())
        && let Some(secs) = args.get_one::<u64>("header-timeout")
    {
        config = config.with_header_timeout(Duration::from_secs(*secs));
    }
    if let Some(secs) = args.get_one::<u64>("timeout") {
        config = config.with_overall_timeout(Duration::from_secs(*secs));
    }
    config
}

pub fn run_options_from_args(args: &ArgMatches) -> RunOptions {
    let input = path_arg(args, "input").unwrap_or_else(|| PathBuf::from("sitemaps.xml"));
    let mut options = RunOptions::new(input)
        .with_fetch_config(fetch_config_from_args(args))
        .with_dump_tree(pathbuf_arg(args, "dump-tree"));

    if let Some(capacity) = args.get_one::<usize>("queue-capacity") {
        options = options.with_queue_capacity(*capacity);
    }
    if let Some(attempts) = args.get_one::<usize>("attempts") {
        options = options.with_classify_attempts(*attempts);
    }
    options
}

/// Open the sink chosen with `--output-type`.
pub fn build_sink(args: &ArgMatches, input: &Path) -> Result<Box<dyn UrlSink>, SinkError> {
    let output_type = args
        .get_one::<String>("output-type")
        .and_then(|s| OutputType::from_arg(s))
        .unwrap_or(OutputType::Sqlite);

    match output_type {
        OutputType::Sqlite => {
            let db_path =
                path_arg(args, "database").unwrap_or_else(|| PathBuf::from("sitemapwalk.db"));
            let db = Database::new(&db_path)?;
            match path_arg(args, "execute-sql") {
                Some(sql_path) => {
                    let sql = std::fs::read_to_string(&sql_path)?;
                    Ok(Box::new(SqliteSink::with_statement(db, &sql)?))
                }
                None => Ok(Box::new(SqliteSink::new(db, &input.display().to_string())?)),
            }
        }
        OutputType::Json => {
            let json_path =
                path_arg(args, "json-out").unwrap_or_else(|| PathBuf::from("urls.json"));
            Ok(Box::new(JsonSink::create(&json_path)?))
        }
        OutputType::Stdout => Ok(Box::new(StdoutSink::new())),
    }
}

fn print_divider() {
    eprintln!("{}", "═".repeat(60).bright_blue().bold());
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", "✗".red().bold(), message);
    std::process::exit(1);
}

pub async fn handle_run(args: &ArgMatches) {
    let options = run_options_from_args(args);
    let sink = build_sink(args, &options.input).unwrap_or_else(|e| fail(e));

    print_divider();
    eprintln!("{}", "  SITEMAPWALK RUN".bright_white().bold());
    print_divider();
    eprintln!(
        "{} Input: {}",
        "→".blue(),
        options.input.display().to_string().bright_white()
    );
    eprintln!("{} Output: {}", "→".blue(), sink.name().bright_white());
    if let Some(ref proxy) = options.fetch.debug_proxy {
        eprintln!("{} Debug proxy: {}", "⚠".yellow(), proxy.yellow());
    }
    eprintln!();

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with what was found so far");
            ctrl_c_cancel.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Loading root document...");

    let sitemaps = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));

    let progress_spinner = spinner.clone();
    let progress_sitemaps = sitemaps.clone();
    let progress_errors = errors.clone();
    let progress_callback: ExpandProgressCallback = Arc::new(move |location: &str, kind: NodeKind| {
        match kind {
            NodeKind::Sitemap | NodeKind::Root => {
                progress_sitemaps.fetch_add(1, Ordering::Relaxed);
            }
            NodeKind::Error => {
                progress_errors.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }
        progress_spinner.set_message(format!(
            "Expanding... {} sitemaps, {} failed, latest {}",
            progress_sitemaps.load(Ordering::Relaxed),
            progress_errors.load(Ordering::Relaxed),
            location
        ));
    });

    let record_spinner = spinner.clone();
    let record_callback: RecordCallback = Arc::new(move |record: &UrlRecord, total: usize| {
        if total % 100 == 0 {
            record_spinner.set_message(format!(
                "{} URLs saved, latest loc {}",
                total, record.location
            ));
        }
    });

    let result = execute_run(
        options,
        sink,
        cancel,
        Some(progress_callback),
        Some(record_callback),
    )
    .await;
    spinner.finish_and_clear();

    match result {
        Ok(summary) => {
            if summary.cancelled {
                eprintln!("{} Run interrupted\n", "⚠".yellow().bold());
            } else {
                eprintln!("{} Run complete!\n", "✓".green().bold());
            }
            eprint!("{}", generate_run_report(&summary));
        }
        Err(e) => fail(format!("Run failed: {}", e)),
    }
}

pub fn handle_init(args: &ArgMatches) {
    let filename = args
        .get_one::<String>("filename")
        .map(|f| expand_path(f))
        .unwrap_or_else(|| PathBuf::from(sitemapwalk_core::DEFAULT_TEMPLATE_FILENAME));
    let force = args.get_flag("force");

    match write_template(&filename, force) {
        Ok(()) => println!(
            "{} Template written: {}",
            "✓".green().bold(),
            filename.display().to_string().bright_white()
        ),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => fail(format!(
            "{} already exists, use --force to overwrite it",
            filename.display()
        )),
        Err(e) => fail(format!("Error while writing {}: {}", filename.display(), e)),
    }
}
