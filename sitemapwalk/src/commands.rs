use clap::{arg, command};
use sitemapwalk_core::DEFAULT_TEMPLATE_FILENAME;
use sitemapwalk_scanner::fetch::DEFAULT_DEBUG_PROXY;
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sitemapwalk")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sitemapwalk")
        .about("Expands nested sitemap indexes into every page URL they describe")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Only log errors")
                .required(false)
                .global(true)
                .conflicts_with("verbose"),
        )
        .arg(
            arg!(-v --"verbose" ... "More log output (-v info, -vv debug)")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("run")
                .about("Takes a root sitemap, expands it and saves every page URL")
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(false)
                        .help("Root document: a sitemap index, a url set or a list of locations")
                        .default_value(DEFAULT_TEMPLATE_FILENAME),
                )
                .arg(
                    arg!(-o --"output-type" <TYPE>)
                        .required(false)
                        .help("Where to save the URLs")
                        .value_parser(["sqlite", "json", "stdout"])
                        .default_value("sqlite"),
                )
                .arg(
                    arg!(--"database" <PATH>)
                        .required(false)
                        .help("SQLite database for the sqlite output")
                        .default_value("sitemapwalk.db"),
                )
                .arg(
                    arg!(--"execute-sql" <PATH>)
                        .required(false)
                        .help(
                            "File with one SQL statement executed per URL instead of the built-in \
                        schema (?1 = loc, optional ?2 = lastmod)",
                        ),
                )
                .arg(
                    arg!(--"json-out" <PATH>)
                        .required(false)
                        .help("Output file for the json output")
                        .default_value("urls.json"),
                )
                .arg(
                    arg!(--"dump-tree" <DIR>)
                        .required(false)
                        .help("Also write the resolved tree as JSON into this directory")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"insecure")
                        .required(false)
                        .help("Skip TLS certificate validation")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"debug-proxy" [URL])
                        .required(false)
                        .help("Send every request through an intercepting proxy (implies --insecure)")
                        .num_args(0..=1)
                        .default_missing_value(DEFAULT_DEBUG_PROXY),
                )
                .arg(
                    arg!(--"header-timeout" <SECONDS>)
                        .required(false)
                        .help("Seconds to wait for response headers")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("5"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Seconds a whole request may take")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"queue-capacity" <NUM>)
                        .required(false)
                        .help("URLs buffered between expansion and the output")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("64"),
                )
                .arg(
                    arg!(--"attempts" <NUM>)
                        .required(false)
                        .help("Fetch attempts for a location of unknown type")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1"),
                )
                .arg(
                    arg!(--"dump-raw" <PATH>)
                        .required(false)
                        .help("Write each raw response body to this file (debugging)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("init")
                .about("Creates a new root sitemap template to start from")
                .arg(
                    arg!(-f --"filename" <PATH>)
                        .required(false)
                        .help("Filename of the new XML file")
                        .default_value(DEFAULT_TEMPLATE_FILENAME),
                )
                .arg(
                    arg!(--"force")
                        .required(false)
                        .help("Overwrite the file if it already exists")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_is_well_formed() {
        command_argument_builder().debug_assert();
    }
}
