//! Saved insights and ad-hoc queries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{with_url, ToolResult};
use crate::context::Context;
use crate::error::{ApiResultExt, ToolError};

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListInsightsFilter {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetAllParams {
    pub data: Option<ListInsightsFilter>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsightIdParams {
    /// Numeric insight id or its short id
    pub insight_id: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateInsightData {
    pub name: String,
    /// Query node to save, e.g. an `InsightVizNode` wrapping a `TrendsQuery`
    pub query: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub saved: bool,
    #[serde(default)]
    pub favorited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateParams {
    pub data: CreateInsightData,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub insight_id: String,
    /// Fields to change: name, description, query, tags, ...
    pub data: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryRunParams {
    /// Query node, e.g. `{"kind": "HogQLQuery", "query": "select ..."}`
    pub query: Value,
}

/// Insights are addressed by numeric id or short id; the API wants the
/// numeric one for writes.
pub async fn resolve_insight_id(
    ctx: &Context,
    project_id: &str,
    insight_id: &str,
) -> Result<i64, ToolError> {
    if let Ok(id) = insight_id.trim().parse::<i64>() {
        return Ok(id);
    }
    let insight = ctx
        .api
        .insights(project_id)
        .find_by_short_id(insight_id.trim())
        .await
        .context("find insight")?;
    insight
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| ToolError::InvalidInput(format!("Insight '{}' has no id", insight_id)))
}

pub(crate) fn insight_url(ctx: &Context, project_id: &str, insight: &Value) -> String {
    let short_id = insight.get("short_id").and_then(Value::as_str).unwrap_or_default();
    format!("{}/insights/{}", ctx.api.project_base_url(project_id), short_id)
}

pub async fn get_all(ctx: &Context, params: GetAllParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let filter = params.data.unwrap_or_default();
    let insights = ctx
        .api
        .insights(&project_id)
        .list(filter.search.as_deref(), filter.limit, filter.offset)
        .await
        .context("get insights")?;
    Ok(Value::Array(insights))
}

pub async fn get(ctx: &Context, params: InsightIdParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let id = resolve_insight_id(ctx, &project_id, &params.insight_id).await?;
    let insight = ctx.api.insights(&project_id).get(id).await.context("get insight")?;
    let url = insight_url(ctx, &project_id, &insight);
    Ok(with_url(insight, "url", url))
}

pub async fn create_from_query(ctx: &Context, params: CreateParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let body = serde_json::to_value(&params.data)?;
    let insight = ctx
        .api
        .insights(&project_id)
        .create(&body)
        .await
        .context("create insight")?;
    let url = insight_url(ctx, &project_id, &insight);
    Ok(with_url(insight, "url", url))
}

pub async fn update(ctx: &Context, params: UpdateParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let id = resolve_insight_id(ctx, &project_id, &params.insight_id).await?;
    let insight = ctx
        .api
        .insights(&project_id)
        .update(id, &params.data)
        .await
        .context("update insight")?;
    let url = insight_url(ctx, &project_id, &insight);
    Ok(with_url(insight, "url", url))
}

pub async fn delete(ctx: &Context, params: InsightIdParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let id = resolve_insight_id(ctx, &project_id, &params.insight_id).await?;
    ctx.api.insights(&project_id).delete(id).await.context("delete insight")
}

/// Run a saved insight's query and return it alongside the insight.
pub async fn query(ctx: &Context, params: InsightIdParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let id = resolve_insight_id(ctx, &project_id, &params.insight_id).await?;
    let insight = ctx.api.insights(&project_id).get(id).await.context("get insight")?;

    let saved_query = insight.get("query").cloned().ok_or_else(|| {
        ToolError::InvalidInput(format!("Insight '{}' has no query", params.insight_id))
    })?;
    let result = ctx
        .api
        .query(&project_id)
        .run(&saved_query)
        .await
        .context("query insight")?;

    let url = insight_url(ctx, &project_id, &insight);
    Ok(json!({
        "insight": with_url(insight, "url", url),
        "results": result.get("results").cloned().unwrap_or(Value::Null),
    }))
}

pub async fn query_run(ctx: &Context, params: QueryRunParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let result = ctx
        .api
        .query(&project_id)
        .run(&params.query)
        .await
        .context("query insight")?;
    Ok(result.get("results").cloned().unwrap_or(Value::Null))
}
