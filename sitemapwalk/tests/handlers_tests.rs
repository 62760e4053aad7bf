use sitemapwalk::commands::command_argument_builder;
use sitemapwalk::handlers::*;
use sitemapwalk_core::sink::UrlSink;
use sitemapwalk_scanner::UrlRecord;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tracing::Level;

fn run_args(extra: &[&str]) -> clap::ArgMatches {
    let mut argv = vec!["sitemapwalk", "run"];
    argv.extend_from_slice(extra);
    let matches = command_argument_builder()
        .try_get_matches_from(argv)
        .unwrap();
    let (name, sub) = matches.subcommand().unwrap();
    assert_eq!(name, "run");
    sub.clone()
}

#[test]
fn test_output_type_from_arg() {
    assert_eq!(OutputType::from_arg("sqlite"), Some(OutputType::Sqlite));
    assert_eq!(OutputType::from_arg("JSON"), Some(OutputType::Json));
    assert_eq!(OutputType::from_arg("stdout"), Some(OutputType::Stdout));
    assert_eq!(OutputType::from_arg("postgres"), None);
}

#[test]
fn test_unknown_output_type_is_rejected() {
    let result =
        command_argument_builder().try_get_matches_from(["sitemapwalk", "run", "-o", "postgres"]);
    assert!(result.is_err());
}

#[test]
fn test_log_level() {
    assert_eq!(log_level(0, false), Level::WARN);
    assert_eq!(log_level(1, false), Level::INFO);
    assert_eq!(log_level(3, false), Level::DEBUG);
    assert_eq!(log_level(2, true), Level::ERROR);
}

#[test]
fn test_expand_path_keeps_plain_paths() {
    assert_eq!(expand_path("out/urls.json"), PathBuf::from("out/urls.json"));
}

#[test]
fn test_run_defaults() {
    let args = run_args(&[]);
    let options = run_options_from_args(&args);

    assert_eq!(options.input, PathBuf::from("sitemaps.xml"));
    assert_eq!(options.queue_capacity, 64);
    assert_eq!(options.classify_attempts, 1);
    assert!(options.dump_tree.is_none());
    assert!(!options.fetch.insecure);
    assert!(options.fetch.debug_proxy.is_none());
    assert_eq!(options.fetch.header_timeout, Duration::from_secs(5));
    assert_eq!(options.fetch.overall_timeout, Duration::from_secs(10));
}

#[test]
fn test_run_flags() {
    let args = run_args(&[
        "-i",
        "my.xml",
        "--insecure",
        "--timeout",
        "30",
        "--queue-capacity",
        "8",
        "--attempts",
        "3",
        "--dump-tree",
        "dumps",
        "--dump-raw",
        "raw.txt",
    ]);
    let options = run_options_from_args(&args);

    assert_eq!(options.input, PathBuf::from("my.xml"));
    assert!(options.fetch.insecure);
    assert_eq!(options.fetch.overall_timeout, Duration::from_secs(30));
    assert_eq!(options.queue_capacity, 8);
    assert_eq!(options.classify_attempts, 3);
    assert_eq!(options.dump_tree, Some(PathBuf::from("dumps")));
    assert_eq!(options.fetch.dump_raw, Some(PathBuf::from("raw.txt")));
}

#[test]
fn test_debug_proxy_without_value_uses_default() {
    let args = run_args(&["--debug-proxy"]);
    let config = fetch_config_from_args(&args);

    assert_eq!(config.debug_proxy.as_deref(), Some("https://localhost:8445"));
    assert_eq!(config.header_timeout, Duration::from_secs(2));
}

#[test]
fn test_debug_proxy_with_explicit_header_timeout() {
    let args = run_args(&[
        "--debug-proxy",
        "http://127.0.0.1:8080",
        "--header-timeout",
        "7",
    ]);
    let config = fetch_config_from_args(&args);

    assert_eq!(config.debug_proxy.as_deref(), Some("http://127.0.0.1:8080"));
    assert_eq!(config.header_timeout, Duration::from_secs(7));
}

#[test]
fn test_build_json_sink() {
    let temp_dir = TempDir::new().unwrap();
    let json_path = temp_dir.path().join("urls.json");
    let args = run_args(&["-o", "json", "--json-out", json_path.to_str().unwrap()]);

    let mut sink = build_sink(&args, &PathBuf::from("sitemaps.xml")).unwrap();
    assert_eq!(sink.name(), "json");

    sink.write(&UrlRecord {
        location: "https://example.com/a".to_string(),
        lastmod: None,
    })
    .unwrap();
    sink.finish(sitemapwalk_core::RunStatus::Completed).unwrap();
    drop(sink);

    let parsed: Vec<UrlRecord> =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed.len(), 1);
}

#[test]
fn test_build_sqlite_sink_creates_database() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("urls.db");
    let args = run_args(&["--database", db_path.to_str().unwrap()]);

    let sink = build_sink(&args, &PathBuf::from("sitemaps.xml")).unwrap();
    assert_eq!(sink.name(), "sqlite");
    assert!(db_path.exists());
}

#[test]
fn test_build_sqlite_sink_missing_sql_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("urls.db");
    let sql_path = temp_dir.path().join("missing.sql");
    let args = run_args(&[
        "--database",
        db_path.to_str().unwrap(),
        "--execute-sql",
        sql_path.to_str().unwrap(),
    ]);

    assert!(build_sink(&args, &PathBuf::from("sitemaps.xml")).is_err());
}

#[test]
fn test_init_defaults() {
    let matches = command_argument_builder()
        .try_get_matches_from(["sitemapwalk", "init"])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    assert_eq!(
        sub.get_one::<String>("filename").map(String::as_str),
        Some("sitemaps.xml")
    );
    assert!(!sub.get_flag("force"));
}

#[test]
fn test_init_writes_template() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("root.xml");
    let matches = command_argument_builder()
        .try_get_matches_from(["sitemapwalk", "init", "-f", path.to_str().unwrap()])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();

    handle_init(sub);
    assert!(
        std::fs::read_to_string(&path)
            .unwrap()
            .contains("<sitemapindex")
    );
}
