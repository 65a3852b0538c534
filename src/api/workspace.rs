//! Users, organizations, projects and the credential itself.

use serde_json::Value;

use super::models::{ApiKeyInfo, Organization, Paginated, Project, User};
use super::ApiClient;
use crate::error::ApiResult;

pub struct Users<'a> {
    pub(super) client: &'a ApiClient,
}

impl Users<'_> {
    pub async fn me(&self) -> ApiResult<User> {
        self.client.get("/api/users/@me/").await
    }
}

pub struct Organizations<'a> {
    pub(super) client: &'a ApiClient,
}

impl<'a> Organizations<'a> {
    pub async fn list(&self) -> ApiResult<Vec<Organization>> {
        let page: Paginated<Organization> = self.client.get("/api/organizations/").await?;
        Ok(page.results)
    }

    /// `org_id` may be [`super::CURRENT`].
    pub async fn get(&self, org_id: &str) -> ApiResult<Organization> {
        self.client.get(&format!("/api/organizations/{}/", org_id)).await
    }

    pub fn projects(&self, org_id: &'a str) -> OrganizationProjects<'a> {
        OrganizationProjects { client: self.client, org_id }
    }
}

pub struct OrganizationProjects<'a> {
    client: &'a ApiClient,
    org_id: &'a str,
}

impl OrganizationProjects<'_> {
    pub async fn list(&self) -> ApiResult<Vec<Project>> {
        let page: Paginated<Project> = self
            .client
            .get(&format!("/api/organizations/{}/projects/", self.org_id))
            .await?;
        Ok(page.results)
    }
}

pub struct Projects<'a> {
    pub(super) client: &'a ApiClient,
}

impl Projects<'_> {
    /// `project_id` may be [`super::CURRENT`].
    pub async fn get(&self, project_id: &str) -> ApiResult<Project> {
        self.client.get(&format!("/api/projects/{}/", project_id)).await
    }

    pub async fn event_definitions(
        &self,
        project_id: &str,
        search: Option<&str>,
    ) -> ApiResult<Vec<Value>> {
        let mut query = vec![("limit", "500".to_string())];
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        let page: Paginated<Value> = self
            .client
            .get_with_query(&format!("/api/projects/{}/event_definitions/", project_id), &query)
            .await?;
        Ok(page.results)
    }

    /// Non-core event properties seen on `event_name`.
    pub async fn property_definitions(
        &self,
        project_id: &str,
        event_name: &str,
    ) -> ApiResult<Vec<Value>> {
        let event_names = serde_json::to_string(&[event_name]).unwrap_or_default();
        let query = [
            ("event_names", event_names),
            ("exclude_core_properties", "true".to_string()),
            ("filter_by_event_names", "true".to_string()),
            ("is_feature_flag", "false".to_string()),
            ("limit", "100".to_string()),
            ("type", "event".to_string()),
        ];
        let page: Paginated<Value> = self
            .client
            .get_with_query(&format!("/api/projects/{}/property_definitions/", project_id), &query)
            .await?;
        Ok(page.results)
    }
}

pub struct ApiKeys<'a> {
    pub(super) client: &'a ApiClient,
}

impl ApiKeys<'_> {
    pub async fn current(&self) -> ApiResult<ApiKeyInfo> {
        self.client.get("/api/personal_api_keys/@current/").await
    }
}
