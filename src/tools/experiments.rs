use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::ToolResult;
use crate::context::Context;
use crate::error::ApiResultExt;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GetParams {
    /// The ID of the experiment to retrieve
    pub experiment_id: i64,
}

pub async fn get_all(ctx: &Context) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let experiments = ctx
        .api
        .experiments(&project_id)
        .list()
        .await
        .context("get experiments")?;
    Ok(Value::Array(experiments))
}

pub async fn get(ctx: &Context, params: GetParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    ctx.api
        .experiments(&project_id)
        .get(params.experiment_id)
        .await
        .context("get experiment")
}
