use crate::{api, config::DashboardConfig};
use anyhow::Result;
use std::net::IpAddr;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub config: DashboardConfig,
    pub bind: IpAddr,
}

/// Run the HTTP server until a shutdown signal arrives.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let config = args.config;

    if config.auth_secret_generated {
        warn!(
            "DASHBOARD_AUTH_SECRET is not set; using a per-process secret, \
             issued tokens will not survive a restart"
        );
    }

    info!(
        environment = ?config.environment,
        allowed_actions = config.allowed_actions.len(),
        cert_data_file = %config.cert_data_file.display(),
        "Starting tmux dashboard"
    );

    api::new(&config, args.bind).await
}
