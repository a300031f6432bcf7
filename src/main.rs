//! tw-client - interactive Teamwork.com MCP chat client
//!
#![doc = "tw-client - interactive Teamwork.com MCP chat client"]
#![doc = "Main entry point for the tw-client application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tw_mcp_client::cli::Cli;
use tw_mcp_client::commands;
use tw_mcp_client::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse_args();

    // Resolve flags and environment once; nothing below reads either again.
    let config = Config::from_cli(&cli)?;
    tracing::debug!("Resolved configuration: {:?}", config);

    commands::chat::run_chat(config).await
}

/// Logs go to stderr so they never interleave with the transcript on stdout.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tw_mcp_client=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
