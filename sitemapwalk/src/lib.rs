pub mod commands;
pub mod handlers;

pub use commands::{CLAP_STYLING, command_argument_builder};
pub use handlers::{
    OutputType, build_sink, expand_path, fetch_config_from_args, handle_init, handle_run,
    log_level, run_options_from_args,
};
