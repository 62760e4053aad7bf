use sitemapwalk::commands::command_argument_builder;
use sitemapwalk::handlers::{handle_init, handle_run, init_tracing, log_level};

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_count("verbose");
    init_tracing(log_level(verbose, quiet));

    match chosen_command.subcommand() {
        Some(("run", primary_command)) => handle_run(primary_command).await,
        Some(("init", primary_command)) => handle_init(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    }
}
