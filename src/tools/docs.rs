//! Documentation search through Inkeep's chat completions API.

use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::ToolResult;
use crate::config::INKEEP_API_URL;
use crate::context::Context;
use crate::error::{ApiError, ApiResultExt, ToolError};

const MODEL: &str = "inkeep-context-expert";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// What to look up in the documentation
    pub query: String,
}

pub async fn search(ctx: &Context, params: SearchParams) -> ToolResult {
    let api_key = ctx
        .config
        .inkeep_api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ToolError::InvalidInput("Documentation search is not configured".to_string()))?;

    let answer = search_with(INKEEP_API_URL, api_key, &params.query)
        .await
        .context("search docs")?;
    Ok(Value::String(answer))
}

pub async fn search_with(url: &str, api_key: &str, query: &str) -> Result<String, ApiError> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;
    let response = http
        .post(url)
        .bearer_auth(api_key)
        .json(&json!({
            "model": MODEL,
            "messages": [{"role": "user", "content": query}],
        }))
        .send()
        .await?;

    let status = response.status();
    debug!(status = status.as_u16(), "docs search response");
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: body.trim().chars().take(500).collect(),
        });
    }

    let body: Value = response.json().await.map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "No response from documentation search.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_search_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer ik_test"))
            .and(body_partial_json(json!({"model": MODEL})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Use posthog.capture()."}}]
            })))
            .mount(&server)
            .await;

        let answer = search_with(&server.uri(), "ik_test", "how do I capture events")
            .await
            .unwrap();
        assert_eq!(answer, "Use posthog.capture().");
    }

    #[tokio::test]
    async fn test_search_without_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let answer = search_with(&server.uri(), "ik_test", "anything").await.unwrap();
        assert_eq!(answer, "No response from documentation search.");
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let server = MockServer::start().await;
        let ctx = crate::tools::testing::context(&server.uri()).await;
        let err = search(&ctx, SearchParams { query: "x".into() }).await.unwrap_err();
        assert_eq!(err.to_string(), "Documentation search is not configured");
    }
}
