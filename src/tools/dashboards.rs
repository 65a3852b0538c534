use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::insights::{insight_url, resolve_insight_id};
use super::{with_url, ToolResult};
use crate::context::Context;
use crate::error::ApiResultExt;

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct ListDashboardsFilter {
    pub limit: Option<u32>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct GetAllParams {
    pub data: Option<ListDashboardsFilter>,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardIdParams {
    pub dashboard_id: i64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CreateDashboardData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateParams {
    pub data: CreateDashboardData,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub dashboard_id: i64,
    /// Fields to change: name, description, pinned, tags
    pub data: Value,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddInsightData {
    /// Numeric insight id or its short id
    pub insight_id: String,
    pub dashboard_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddInsightParams {
    pub data: AddInsightData,
}

fn dashboard_url(ctx: &Context, project_id: &str, dashboard_id: impl std::fmt::Display) -> String {
    format!("{}/dashboard/{}", ctx.api.project_base_url(project_id), dashboard_id)
}

pub async fn get_all(ctx: &Context, params: GetAllParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let filter = params.data.unwrap_or_default();
    let dashboards = ctx
        .api
        .dashboards(&project_id)
        .list(filter.search.as_deref(), filter.limit)
        .await
        .context("get dashboards")?;
    Ok(Value::Array(dashboards))
}

pub async fn get(ctx: &Context, params: DashboardIdParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let dashboard = ctx
        .api
        .dashboards(&project_id)
        .get(params.dashboard_id)
        .await
        .context("get dashboard")?;
    Ok(with_url(dashboard, "url", dashboard_url(ctx, &project_id, params.dashboard_id)))
}

pub async fn create(ctx: &Context, params: CreateParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let body = serde_json::to_value(&params.data)?;
    let dashboard = ctx
        .api
        .dashboards(&project_id)
        .create(&body)
        .await
        .context("create dashboard")?;
    let id = dashboard.get("id").cloned().unwrap_or(Value::Null);
    Ok(with_url(dashboard, "url", dashboard_url(ctx, &project_id, id)))
}

pub async fn update(ctx: &Context, params: UpdateParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let dashboard = ctx
        .api
        .dashboards(&project_id)
        .update(params.dashboard_id, &params.data)
        .await
        .context("update dashboard")?;
    Ok(with_url(dashboard, "url", dashboard_url(ctx, &project_id, params.dashboard_id)))
}

pub async fn delete(ctx: &Context, params: DashboardIdParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    ctx.api
        .dashboards(&project_id)
        .delete(params.dashboard_id)
        .await
        .context("delete dashboard")
}

pub async fn add_insight(ctx: &Context, params: AddInsightParams) -> ToolResult {
    let project_id = ctx.project_id().await?;
    let data = params.data;
    let insight_id = resolve_insight_id(ctx, &project_id, &data.insight_id).await?;

    let updated = ctx
        .api
        .dashboards(&project_id)
        .add_insight(data.dashboard_id, insight_id)
        .await
        .context("add insight to dashboard")?;

    let insight_link = insight_url(ctx, &project_id, &updated);
    let result = with_url(
        updated,
        "dashboard_url",
        dashboard_url(ctx, &project_id, data.dashboard_id),
    );
    Ok(with_url(result, "insight_url", insight_link))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_links_dashboard() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/projects/1/dashboards/"))
            .and(body_json(json!({"name": "KPIs", "pinned": false})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 12, "name": "KPIs"})))
            .mount(&server)
            .await;
        let ctx = testing::context(&server.uri()).await;

        let out = create(
            &ctx,
            CreateParams {
                data: CreateDashboardData {
                    name: "KPIs".into(),
                    description: None,
                    pinned: false,
                    tags: None,
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(out["url"], format!("{}/project/1/dashboard/12", server.uri()));
    }

    #[tokio::test]
    async fn test_add_insight_by_short_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects/1/insights/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": 42, "short_id": "Ab12Cd"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/projects/1/insights/42/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42, "short_id": "Ab12Cd", "dashboards": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/projects/1/insights/42/"))
            .and(body_json(json!({"dashboards": [7]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42, "short_id": "Ab12Cd", "dashboards": [7]
            })))
            .expect(1)
            .mount(&server)
            .await;
        let ctx = testing::context(&server.uri()).await;

        let out = add_insight(
            &ctx,
            AddInsightParams {
                data: AddInsightData {
                    insight_id: "Ab12Cd".into(),
                    dashboard_id: 7,
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(out["dashboard_url"], format!("{}/project/1/dashboard/7", server.uri()));
        assert_eq!(out["insight_url"], format!("{}/project/1/insights/Ab12Cd", server.uri()));
    }
}
