use serde_json::{json, Value};

use super::models::Paginated;
use super::ApiClient;
use crate::error::ApiResult;

pub struct Dashboards<'a> {
    pub(super) client: &'a ApiClient,
    pub(super) project_id: &'a str,
}

impl Dashboards<'_> {
    fn path(&self, suffix: &str) -> String {
        format!("/api/projects/{}/dashboards/{}", self.project_id, suffix)
    }

    pub async fn list(&self, search: Option<&str>, limit: Option<u32>) -> ApiResult<Vec<Value>> {
        let mut query = vec![("limit", limit.unwrap_or(100).to_string())];
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        let page: Paginated<Value> = self.client.get_with_query(&self.path(""), &query).await?;
        Ok(page.results)
    }

    pub async fn get(&self, dashboard_id: i64) -> ApiResult<Value> {
        self.client.get(&self.path(&format!("{}/", dashboard_id))).await
    }

    pub async fn create(&self, data: &Value) -> ApiResult<Value> {
        self.client.post(&self.path(""), data).await
    }

    pub async fn update(&self, dashboard_id: i64, data: &Value) -> ApiResult<Value> {
        self.client.patch(&self.path(&format!("{}/", dashboard_id)), data).await
    }

    pub async fn delete(&self, dashboard_id: i64) -> ApiResult<Value> {
        self.client
            .patch(&self.path(&format!("{}/", dashboard_id)), &json!({"deleted": true}))
            .await
    }

    /// Dashboard membership lives on the insight, so this appends to the
    /// insight's `dashboards` list.
    pub async fn add_insight(&self, dashboard_id: i64, insight_id: i64) -> ApiResult<Value> {
        let insights = self.client.insights(self.project_id);
        let insight = insights.get(insight_id).await?;
        let mut dashboards: Vec<i64> = insight
            .get("dashboards")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        if !dashboards.contains(&dashboard_id) {
            dashboards.push(dashboard_id);
        }
        insights.update(insight_id, &json!({ "dashboards": dashboards })).await
    }
}
