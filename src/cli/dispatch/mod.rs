//! Map parsed CLI arguments to an [`Action`], loading the dashboard
//! configuration on the way.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{ARG_BIND, ARG_ENV_FILE, ARG_PORT};
use crate::config::DashboardConfig;
use anyhow::{Context, Result};
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
};

/// # Errors
/// Returns an error if the env file cannot be read or the configuration is
/// invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let env_file = matches.get_one::<PathBuf>(ARG_ENV_FILE);
    let mut config =
        DashboardConfig::load(env_file.map(PathBuf::as_path)).context("invalid configuration")?;

    if let Some(port) = matches.get_one::<u16>(ARG_PORT) {
        config.port = *port;
    }

    let bind = matches
        .get_one::<IpAddr>(ARG_BIND)
        .copied()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    Ok(Action::Server(Args { config, bind }))
}
