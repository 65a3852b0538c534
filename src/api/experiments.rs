use serde_json::Value;

use super::models::Paginated;
use super::ApiClient;
use crate::error::ApiResult;

pub struct Experiments<'a> {
    pub(super) client: &'a ApiClient,
    pub(super) project_id: &'a str,
}

impl Experiments<'_> {
    pub async fn list(&self) -> ApiResult<Vec<Value>> {
        let page: Paginated<Value> = self
            .client
            .get(&format!("/api/projects/{}/experiments/", self.project_id))
            .await?;
        Ok(page.results)
    }

    pub async fn get(&self, experiment_id: i64) -> ApiResult<Value> {
        self.client
            .get(&format!("/api/projects/{}/experiments/{}/", self.project_id, experiment_id))
            .await
    }
}
