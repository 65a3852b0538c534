use serde_json::{json, Value};

use super::models::Paginated;
use super::ApiClient;
use crate::error::{ApiError, ApiResult};

pub struct FeatureFlags<'a> {
    pub(super) client: &'a ApiClient,
    pub(super) project_id: &'a str,
}

impl FeatureFlags<'_> {
    fn path(&self, suffix: &str) -> String {
        format!("/api/projects/{}/feature_flags/{}", self.project_id, suffix)
    }

    pub async fn list(&self) -> ApiResult<Vec<Value>> {
        let page: Paginated<Value> = self
            .client
            .get_with_query(&self.path(""), &[("limit", "500".to_string())])
            .await?;
        Ok(page.results)
    }

    pub async fn get(&self, flag_id: i64) -> ApiResult<Value> {
        self.client.get(&self.path(&format!("{}/", flag_id))).await
    }

    /// Keys are unique per project; the API has no direct lookup for them.
    pub async fn find_by_key(&self, key: &str) -> ApiResult<Value> {
        self.list()
            .await?
            .into_iter()
            .find(|flag| flag.get("key").and_then(Value::as_str) == Some(key))
            .ok_or_else(|| ApiError::NotFound(format!("Feature flag with key '{}'", key)))
    }

    pub async fn create(&self, data: &Value) -> ApiResult<Value> {
        self.client.post(&self.path(""), data).await
    }

    pub async fn update(&self, flag_id: i64, data: &Value) -> ApiResult<Value> {
        self.client.patch(&self.path(&format!("{}/", flag_id)), data).await
    }

    /// Flags are soft deleted.
    pub async fn delete(&self, flag_id: i64) -> ApiResult<Value> {
        self.client
            .patch(&self.path(&format!("{}/", flag_id)), &json!({"deleted": true}))
            .await
    }
}

/// Id of a flag payload as returned by the API.
pub fn flag_id(flag: &Value) -> Option<i64> {
    flag.get("id").and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_find_by_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/projects/5/feature_flags/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"id": 1, "key": "beta", "active": true},
                    {"id": 2, "key": "new-onboarding", "active": false}
                ]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), "phx_test").unwrap();
        let flag = client.feature_flags("5").find_by_key("new-onboarding").await.unwrap();
        assert_eq!(flag_id(&flag), Some(2));

        let missing = client.feature_flags("5").find_by_key("gone").await.unwrap_err();
        assert_eq!(missing.to_string(), "Feature flag with key 'gone' not found");
    }

    #[tokio::test]
    async fn test_delete_is_soft() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/projects/5/feature_flags/2/"))
            .and(body_json(json!({"deleted": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 2, "deleted": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), "phx_test").unwrap();
        client.feature_flags("5").delete(2).await.unwrap();
    }
}
