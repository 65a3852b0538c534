use serde_json::{json, Value};

use super::models::Paginated;
use super::ApiClient;
use crate::error::{ApiError, ApiResult};

pub struct Insights<'a> {
    pub(super) client: &'a ApiClient,
    pub(super) project_id: &'a str,
}

impl Insights<'_> {
    fn path(&self, suffix: &str) -> String {
        format!("/api/projects/{}/insights/{}", self.project_id, suffix)
    }

    pub async fn list(
        &self,
        search: Option<&str>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> ApiResult<Vec<Value>> {
        let mut query = vec![("saved", "true".to_string())];
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        query.push(("limit", limit.unwrap_or(100).to_string()));
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        let page: Paginated<Value> = self.client.get_with_query(&self.path(""), &query).await?;
        Ok(page.results)
    }

    pub async fn get(&self, insight_id: i64) -> ApiResult<Value> {
        self.client.get(&self.path(&format!("{}/", insight_id))).await
    }

    pub async fn find_by_short_id(&self, short_id: &str) -> ApiResult<Value> {
        let page: Paginated<Value> = self
            .client
            .get_with_query(&self.path(""), &[("short_id", short_id.to_string())])
            .await?;
        page.results
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("Insight '{}'", short_id)))
    }

    pub async fn create(&self, data: &Value) -> ApiResult<Value> {
        self.client.post(&self.path(""), data).await
    }

    pub async fn update(&self, insight_id: i64, data: &Value) -> ApiResult<Value> {
        self.client.patch(&self.path(&format!("{}/", insight_id)), data).await
    }

    pub async fn delete(&self, insight_id: i64) -> ApiResult<Value> {
        self.client
            .patch(&self.path(&format!("{}/", insight_id)), &json!({"deleted": true}))
            .await
    }
}

pub struct Query<'a> {
    pub(super) client: &'a ApiClient,
    pub(super) project_id: &'a str,
}

impl Query<'_> {
    /// Run any query node (HogQL, trends, insight viz, ...).
    pub async fn run(&self, query: &Value) -> ApiResult<Value> {
        self.client
            .post(
                &format!("/api/environments/{}/query/", self.project_id),
                &json!({ "query": query }),
            )
            .await
    }
}
