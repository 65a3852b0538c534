use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{with_url, ToolResult};
use crate::api::flag_id;
use crate::context::Context;
use crate::error::{ApiResultExt, ToolError};

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetDefinitionParams {
    pub flag_id: Option<i64>,
    pub flag_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateFlagParams {
    pub name: String,
    pub key: String,
    pub description: String,
    /// Release conditions, e.g. `{"groups": [{"properties": [], "rollout_percentage": 100}]}`
    pub filters: Value,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFlagParams {
    pub flag_key: String,
    /// Fields to change: name, description, filters, active, tags
    pub data: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFlagParams {
    pub flag_key: String,
}

fn flag_url(ctx: &Context, project_id: &str, flag: &Value) -> String {
    let id = flag_id(flag).map(|id| id.to_string()).unwrap_or_default();
    format!("{}/feature_flags/{}", ctx.api.project_base_url(project_id), id)
}

pub async fn get_all(ctx: &Context) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let flags = ctx
        .api
        .feature_flags(&project_id)
        .list()
        .await
        .context("get feature flags")?;

    Ok(Value::Array(
        flags
            .iter()
            .map(|f| {
                json!({
                    "id": f.get("id"),
                    "key": f.get("key"),
                    "name": f.get("name"),
                    "active": f.get("active"),
                })
            })
            .collect(),
    ))
}

/// `flag_id` takes precedence over `flag_key`.
pub async fn get_definition(ctx: &Context, params: GetDefinitionParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let flags = ctx.api.feature_flags(&project_id);
    match (params.flag_id, params.flag_key.as_deref()) {
        (Some(id), _) => flags.get(id).await.context("get feature flag"),
        (None, Some(key)) => flags.find_by_key(key).await.context("get feature flag"),
        (None, None) => Err(ToolError::InvalidInput(
            "Either flagId or flagKey must be provided".to_string(),
        )),
    }
}

pub async fn create(ctx: &Context, params: CreateFlagParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let body = serde_json::to_value(&params)?;
    let flag = ctx
        .api
        .feature_flags(&project_id)
        .create(&body)
        .await
        .context("create feature flag")?;
    let url = flag_url(ctx, &project_id, &flag);
    Ok(with_url(flag, "url", url))
}

pub async fn update(ctx: &Context, params: UpdateFlagParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let flags = ctx.api.feature_flags(&project_id);
    let existing = flags.find_by_key(&params.flag_key).await.context("find feature flag")?;
    let id = require_id(&existing, &params.flag_key)?;

    let flag = flags.update(id, &params.data).await.context("update feature flag")?;
    let url = flag_url(ctx, &project_id, &flag);
    Ok(with_url(flag, "url", url))
}

pub async fn delete(ctx: &Context, params: DeleteFlagParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let flags = ctx.api.feature_flags(&project_id);
    let existing = flags.find_by_key(&params.flag_key).await.context("find feature flag")?;
    let id = require_id(&existing, &params.flag_key)?;

    flags.delete(id).await.context("delete feature flag")?;
    Ok(json!({
        "success": true,
        "message": format!("Feature flag '{}' deleted", params.flag_key),
    }))
}

fn require_id(flag: &Value, key: &str) -> Result<i64, ToolError> {
    flag_id(flag).ok_or_else(|| ToolError::InvalidInput(format!("Feature flag '{}' has no id", key)))
}
