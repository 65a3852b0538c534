//! Error types shared across the crate.
//!
//! Remote failures arrive as [`ApiError`] values (never panics), get wrapped
//! by the state manager into [`StateError`] with a message naming what was
//! being resolved, and end up as [`ToolError`] at the tool boundary where they
//! are rendered into an MCP error result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message} (status {status})")]
    Status { status: u16, message: String },

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// A cache was requested without a caller identity. Always a bug in the
    /// calling layer.
    #[error("User hash is required to use the cache")]
    MissingScope,

    #[error("state storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("state storage lock poisoned")]
    Poisoned,

    #[error("state storage directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to get user: {0}")]
    User(ApiError),

    #[error("Failed to get organizations: {0}")]
    Organizations(ApiError),

    #[error("Failed to get current organization: {0}")]
    CurrentOrganization(ApiError),

    #[error("Failed to get projects: {0}")]
    Projects(ApiError),

    #[error("Failed to get current project: {0}")]
    CurrentProject(ApiError),

    #[error("Failed to get API key: {0}")]
    ApiKey(ApiError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to {action}: {source}")]
    Api {
        action: &'static str,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("{0}")]
    InvalidInput(String),

    #[error("failed to encode result: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to bind a credential to a working context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid remote MCP URL: {0}")]
    RemoteUrl(#[from] url::ParseError),

    #[error("invalid authorization header value")]
    AuthHeader,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Attach the "Failed to <action>" prefix to a remote failure.
pub trait ApiResultExt<T> {
    fn context(self, action: &'static str) -> Result<T, ToolError>;
}

impl<T> ApiResultExt<T> for ApiResult<T> {
    fn context(self, action: &'static str) -> Result<T, ToolError> {
        self.map_err(|source| ToolError::Api { action, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_embeds_upstream_message() {
        let err = StateError::User(ApiError::Status {
            status: 401,
            message: "Invalid personal API key.".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Failed to get user: Invalid personal API key. (status 401)"
        );
    }

    #[test]
    fn test_tool_error_context() {
        let res: ApiResult<()> = Err(ApiError::NotFound("dashboard 12".to_string()));
        let err = res.context("get dashboard").unwrap_err();
        assert_eq!(err.to_string(), "Failed to get dashboard: dashboard 12 not found");
    }

    #[test]
    fn test_missing_scope_message() {
        assert_eq!(
            CacheError::MissingScope.to_string(),
            "User hash is required to use the cache"
        );
    }
}
