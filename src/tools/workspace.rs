//! Organizations, projects and the event schema of the active project.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{to_json, ToolResult};
use crate::context::Context;
use crate::error::{ApiResultExt, ToolError};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwitchOrganizationParams {
    /// UUID of the organization to make active
    pub org_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwitchProjectParams {
    /// ID of the project to make active
    pub project_id: i64,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct EventDefinitionsParams {
    /// Search query to filter event names. Only use if there are lots of events.
    pub q: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PropertiesParams {
    /// Event name to filter properties by
    pub event_name: String,
}

pub async fn organizations_get(ctx: &Context) -> ToolResult {
    let orgs = ctx.api.organizations().list().await.context("get organizations")?;
    to_json(&orgs)
}

pub async fn switch_organization(ctx: &Context, params: SwitchOrganizationParams) -> ToolResult {
    let org_id = Uuid::parse_str(params.org_id.trim())
        .map_err(|_| {
            ToolError::InvalidInput(format!(
                "Invalid organization id '{}': expected a UUID",
                params.org_id
            ))
        })?
        .hyphenated()
        .to_string();
    ctx.state.set_active_org(&org_id).await?;
    Ok(Value::String(format!("Switched to organization {}", org_id)))
}

pub async fn organization_details_get(ctx: &Context) -> ToolResult {
    let org_id = ctx.state.get_org_id().await?;
    let org = ctx
        .api
        .organizations()
        .get(&org_id)
        .await
        .context("get organization details")?;
    to_json(&org)
}

pub async fn projects_get(ctx: &Context) -> ToolResult {
    let org_id = ctx.state.get_org_id().await?;
    let projects = ctx
        .api
        .organizations()
        .projects(&org_id)
        .list()
        .await
        .context("get projects")?;
    to_json(&projects)
}

pub async fn switch_project(ctx: &Context, params: SwitchProjectParams) -> ToolResult {
    if params.project_id <= 0 {
        return Err(ToolError::InvalidInput(
            "projectId must be a positive integer".to_string(),
        ));
    }
    ctx.state.set_active_project(&params.project_id.to_string()).await?;
    Ok(Value::String(format!("Switched to project {}", params.project_id)))
}

pub async fn event_definitions_list(ctx: &Context, params: EventDefinitionsParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let defs = ctx
        .api
        .projects()
        .event_definitions(&project_id, params.q.as_deref())
        .await
        .context("get event definitions")?;

    let simplified: Vec<Value> = defs
        .iter()
        .map(|def| {
            json!({
                "name": def.get("name"),
                "description": def.get("description"),
                "last_seen_at": def.get("last_seen_at"),
            })
        })
        .collect();
    Ok(Value::Array(simplified))
}

pub async fn properties_list(ctx: &Context, params: PropertiesParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let props = ctx
        .api
        .projects()
        .property_definitions(&project_id, &params.event_name)
        .await
        .context("get property definitions")?;

    let simplified: Vec<Value> = props
        .iter()
        .map(|prop| {
            json!({
                "name": prop.get("name"),
                "property_type": prop.get("property_type"),
            })
        })
        .collect();
    Ok(Value::Array(simplified))
}
