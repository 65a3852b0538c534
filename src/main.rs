//! PostHog MCP server.
//!
//! Usage:
//!   POSTHOG_PERSONAL_API_KEY=phx_... posthog-mcp --stdio
//!   posthog-mcp --bind 0.0.0.0:3000
//!
//! Logs go to stderr; stdout is reserved for the stdio transport.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use posthog_mcp_lib::config::Config;
use posthog_mcp_lib::context::StateBacking;
use posthog_mcp_lib::{http_server, mcp};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "posthog-mcp")]
#[command(version, about = "MCP server for the PostHog API", long_about = None)]
struct Cli {
    /// Serve a single session over stdin/stdout instead of HTTP
    #[arg(long)]
    stdio: bool,

    /// HTTP bind address
    #[arg(long, env = "POSTHOG_MCP_BIND", default_value = "0.0.0.0:3000")]
    bind: String,

    /// Fixed API host for self-hosted instances (disables region detection)
    #[arg(long, env = "POSTHOG_BASE_URL")]
    base_url: Option<String>,

    /// Enables the docs-search tool
    #[arg(long, env = "INKEEP_API_KEY", hide_env_values = true)]
    inkeep_api_key: Option<String>,

    /// Comma separated feature groups to expose (default: all)
    #[arg(long, env = "POSTHOG_MCP_FEATURES")]
    features: Option<String>,

    /// Personal API key used by the stdio transport
    #[arg(long, env = "POSTHOG_PERSONAL_API_KEY", hide_env_values = true)]
    personal_api_key: Option<String>,

    /// SQLite file for durable per-user state (default: in memory)
    #[arg(long, env = "POSTHOG_MCP_STATE_DB")]
    state_db: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            custom_base_url: self.base_url.clone(),
            inkeep_api_key: self.inkeep_api_key.clone(),
            features: self
                .features
                .as_deref()
                .map(Config::parse_features)
                .unwrap_or_default(),
            api_token: self.personal_api_key.clone(),
            state_db: self.state_db.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(cli.config());

    let backing = match StateBacking::from_config(&config) {
        Ok(backing) => backing,
        Err(e) => {
            error!(error = %e, "failed to open state store");
            std::process::exit(1);
        }
    };

    let result = if cli.stdio {
        info!("serving MCP over stdio");
        mcp::run_stdio(config, backing).await
    } else {
        http_server::serve(&cli.bind, config, backing).await
    };

    if let Err(e) = result {
        error!(error = %e, "server exited");
        std::process::exit(1);
    }
}
