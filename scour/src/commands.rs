use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("scour")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("scour")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" ... "Increase log verbosity (-v info, -vv debug)")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Creates the scour configuration directory with a default config.json")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location of the configuration directory")
                        .default_value("~/.config/scour/"),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing config.json at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("scan")
                .about(
                    "Crawl a site within its origin, then probe every discovered page for \
                reflected XSS, SQL injection, CSRF, missing security headers and DOM-based XSS.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("Root URL of the target site"),
                )
                .arg(
                    arg!(-n --"links" <LINKS>)
                        .required(false)
                        .help("Maximum number of pages to crawl (default: 10, or the config file)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"sqli-model" <PATH>)
                        .required(false)
                        .help("Injection classifier artifact (JSON)")
                        .value_parser(clap::value_parser!(PathBuf))
                        .requires("xss-model")
                        .conflicts_with("no-ai"),
                )
                .arg(
                    arg!(--"xss-model" <PATH>)
                        .required(false)
                        .help("Markup classifier artifact (JSON)")
                        .value_parser(clap::value_parser!(PathBuf))
                        .requires("sqli-model")
                        .conflicts_with("no-ai"),
                )
                .arg(
                    arg!(--"no-ai")
                        .required(false)
                        .help("Skip the classifier stage even if the config file enables it")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-dom")
                        .required(false)
                        .help("Skip the headless browser DOM-XSS pass")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"settle-ms" <MILLIS>)
                        .required(false)
                        .help("Wait after each browser navigation and payload attempt")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown, csv")
                        .value_parser(["text", "json", "markdown", "csv"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"db" <PATH>)
                        .required(false)
                        .help("Record the scan into this SQLite database")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"config" <PATH>)
                        .required(false)
                        .help("Configuration file (default: ~/.config/scour/config.json)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("report")
                .about("List recorded scans or render one of them")
                .arg(
                    arg!(--"db" <PATH>)
                        .required(true)
                        .help("SQLite database written by `scour scan --db`")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"scan" <ID>)
                        .required(false)
                        .help("Scan to render; use `latest` for the most recent one"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown, csv")
                        .value_parser(["text", "json", "markdown", "csv"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_scan_rejects_half_a_model_pair() {
        let result = command_argument_builder().try_get_matches_from([
            "scour",
            "scan",
            "-u",
            "http://t/",
            "--sqli-model",
            "a.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_scan_rejects_models_with_no_ai() {
        let result = command_argument_builder().try_get_matches_from([
            "scour",
            "scan",
            "-u",
            "http://t/",
            "--sqli-model",
            "a.json",
            "--xss-model",
            "b.json",
            "--no-ai",
        ]);
        assert!(result.is_err());
    }
}
