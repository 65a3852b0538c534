//! REST client for the PostHog API.
//!
//! Every call returns an [`ApiResult`]: transport problems, non-2xx statuses
//! and undecodable bodies all come back as [`ApiError`] values carrying the
//! upstream message. Nothing here panics or retries.

mod dashboards;
mod experiments;
mod feature_flags;
mod insights;
pub mod models;
mod workspace;

pub use dashboards::Dashboards;
pub use experiments::Experiments;
pub use feature_flags::{flag_id, FeatureFlags};
pub use insights::{Insights, Query};
pub use models::{ApiKeyInfo, Organization, Paginated, Project, User};
pub use workspace::{ApiKeys, Organizations, OrganizationProjects, Projects, Users};

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{ApiError, ApiResult};

const USER_AGENT: &str = concat!("posthog-mcp/", env!("CARGO_PKG_VERSION"));

/// Sentinel id meaning "whatever the server considers active".
pub const CURRENT: &str = "@current";

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: String,
    http: Client,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// UI root for a project, used to hand links back to the user.
    pub fn project_base_url(&self, project_id: &str) -> String {
        format!("{}/project/{}", self.base_url, project_id)
    }

    pub fn users(&self) -> Users<'_> {
        Users { client: self }
    }

    pub fn organizations(&self) -> Organizations<'_> {
        Organizations { client: self }
    }

    pub fn projects(&self) -> Projects<'_> {
        Projects { client: self }
    }

    pub fn api_keys(&self) -> ApiKeys<'_> {
        ApiKeys { client: self }
    }

    pub fn feature_flags<'a>(&'a self, project_id: &'a str) -> FeatureFlags<'a> {
        FeatureFlags { client: self, project_id }
    }

    pub fn insights<'a>(&'a self, project_id: &'a str) -> Insights<'a> {
        Insights { client: self, project_id }
    }

    pub fn dashboards<'a>(&'a self, project_id: &'a str) -> Dashboards<'a> {
        Dashboards { client: self, project_id }
    }

    pub fn experiments<'a>(&'a self, project_id: &'a str) -> Experiments<'a> {
        Experiments { client: self, project_id }
    }

    pub fn query<'a>(&'a self, project_id: &'a str) -> Query<'a> {
        Query { client: self, project_id }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send(self.http.get(self.url(path))).await
    }

    pub(crate) async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        self.send(self.http.get(self.url(path)).query(query)).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    pub(crate) async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.send(self.http.patch(self.url(path)).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "api response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body, status.canonical_reason()),
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Pull the human readable part out of an error body.
fn error_message(body: &str, reason: Option<&str>) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for field in ["detail", "error", "message"] {
            if let Some(msg) = json.get(field).and_then(Value::as_str) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.chars().take(500).collect();
    }
    reason.unwrap_or("request failed").to_string()
}

/// The slice of the API the state layer needs.
///
/// Kept object safe so resolution logic can run against any backend.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    async fn me(&self) -> ApiResult<User>;
    async fn list_organizations(&self) -> ApiResult<Vec<Organization>>;
    async fn get_organization(&self, org_id: &str) -> ApiResult<Organization>;
    async fn list_projects(&self, org_id: &str) -> ApiResult<Vec<Project>>;
    async fn get_project(&self, project_id: &str) -> ApiResult<Project>;
    async fn current_api_key(&self) -> ApiResult<ApiKeyInfo>;
}

#[async_trait]
impl ResourceClient for ApiClient {
    async fn me(&self) -> ApiResult<User> {
        self.users().me().await
    }

    async fn list_organizations(&self) -> ApiResult<Vec<Organization>> {
        self.organizations().list().await
    }

    async fn get_organization(&self, org_id: &str) -> ApiResult<Organization> {
        self.organizations().get(org_id).await
    }

    async fn list_projects(&self, org_id: &str) -> ApiResult<Vec<Project>> {
        self.organizations().projects(org_id).list().await
    }

    async fn get_project(&self, project_id: &str) -> ApiResult<Project> {
        self.projects().get(project_id).await
    }

    async fn current_api_key(&self) -> ApiResult<ApiKeyInfo> {
        self.api_keys().current().await
    }
}
