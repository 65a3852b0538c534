//! PostHog MCP proxy: forwards /mcp and /sse to a remote MCP server with a
//! fixed credential injected.
//!
//! Usage:
//!   PORT=8080 POSTHOG_AUTH_HEADER=phx_... posthog-mcp-proxy

use clap::Parser;
use posthog_mcp_lib::proxy::{self, Proxy, DEFAULT_REMOTE_MCP_URL};
use tracing::error;

#[derive(Parser)]
#[command(name = "posthog-mcp-proxy")]
#[command(version, about = "Reverse proxy to a remote PostHog MCP server", long_about = None)]
struct Cli {
    /// Listen port (binds 0.0.0.0)
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Remote MCP endpoint
    #[arg(long, env = "POSTHOG_REMOTE_MCP_URL", default_value = DEFAULT_REMOTE_MCP_URL)]
    remote_url: String,

    /// Credential injected as the Authorization header
    #[arg(long, env = "POSTHOG_AUTH_HEADER", default_value = "", hide_env_values = true)]
    auth_header: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let proxy = match Proxy::new(&cli.remote_url, &cli.auth_header) {
        Ok(proxy) => proxy,
        Err(e) => {
            error!(error = %e, "invalid proxy configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = proxy::serve(cli.port, proxy).await {
        error!(error = %e, "proxy exited");
        std::process::exit(1);
    }
}
