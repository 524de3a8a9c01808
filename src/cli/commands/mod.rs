pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};
use std::{net::IpAddr, path::PathBuf};

use crate::config::ENV_ENV_FILE;

pub const ARG_PORT: &str = "port";
pub const ARG_BIND: &str = "bind";
pub const ARG_ENV_FILE: &str = "env-file";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("tmux-dashboard")
        .about("Web dashboard for tmux sessions")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            // No env binding: DASHBOARD_PORT is read by the config loader,
            // which falls back to the default on garbage instead of failing.
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on, overrides DASHBOARD_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_BIND)
                .short('b')
                .long("bind")
                .help("Address to listen on")
                .default_value("127.0.0.1")
                .env("DASHBOARD_BIND")
                .value_parser(clap::value_parser!(IpAddr)),
        )
        .arg(
            Arg::new(ARG_ENV_FILE)
                .short('e')
                .long("env-file")
                .help("KEY=VALUE file with DASHBOARD_* settings (default: ./.env when present)")
                .env(ENV_ENV_FILE)
                .value_parser(clap::value_parser!(PathBuf)),
        );

    logging::with_args(command)
}
