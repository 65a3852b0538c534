//! PostHog MCP server library.
//!
//! The binaries in this package are thin wrappers: `posthog-mcp` serves the
//! tools over stdio or streamable HTTP, `posthog-mcp-proxy` forwards to a
//! hosted server.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod http_server;
pub mod mcp;
pub mod proxy;
pub mod region;
pub mod state;
pub mod tools;
