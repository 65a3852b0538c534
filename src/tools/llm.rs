use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ToolResult;
use crate::context::Context;
use crate::error::{ApiResultExt, ToolError};

const DEFAULT_DAYS: u32 = 6;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostsParams {
    pub project_id: i64,
    /// Days to look back (default 7, today included)
    pub days: Option<u32>,
}

/// Daily `$ai_generation` cost, broken down by model.
pub fn costs_query(days: u32) -> Value {
    json!({
        "kind": "TrendsQuery",
        "dateRange": {
            "date_from": format!("-{}d", days),
            "date_to": null,
        },
        "filterTestAccounts": true,
        "series": [{
            "event": "$ai_generation",
            "name": "$ai_generation",
            "math": "sum",
            "math_property": "$ai_total_cost_usd",
            "kind": "EventsNode",
        }],
        "breakdownFilter": {
            "breakdown_type": "event",
            "breakdown": "$ai_model",
        },
    })
}

pub async fn total_costs(ctx: &Context, params: CostsParams) -> ToolResult {
    if params.project_id <= 0 {
        return Err(ToolError::InvalidInput(
            "projectId must be a positive integer".to_string(),
        ));
    }
    let project_id = params.project_id.to_string();
    let days = params.days.unwrap_or(DEFAULT_DAYS);

    let result = ctx
        .api
        .query(&project_id)
        .run(&costs_query(days))
        .await
        .context("get LLM costs")?;
    Ok(result.get("results").cloned().unwrap_or(Value::Null))
}
