//! Lazy resolution of the caller's identity, organization and project.
//!
//! Each getter reads its field from the scoped cache and only goes to the API
//! on a miss. A successful resolution is written back before it is returned;
//! a failed one leaves the field untouched so the next call starts over.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::api::{ApiKeyInfo, ResourceClient, CURRENT};
use crate::cache::{ScopedCache, StateKey};
use crate::error::StateError;

pub struct StateManager {
    cache: Arc<dyn ScopedCache>,
    api: Arc<dyn ResourceClient>,
    api_key: OnceCell<ApiKeyInfo>,
}

impl StateManager {
    pub fn new(cache: Arc<dyn ScopedCache>, api: Arc<dyn ResourceClient>) -> Self {
        Self {
            cache,
            api,
            api_key: OnceCell::new(),
        }
    }

    pub fn cache(&self) -> &Arc<dyn ScopedCache> {
        &self.cache
    }

    pub async fn get_distinct_id(&self) -> Result<String, StateError> {
        if let Some(id) = self.cache.get(StateKey::DistinctId).await? {
            return Ok(id);
        }

        debug!(scope = %self.cache.scope(), "resolving distinct id");
        let user = self.api.me().await.map_err(StateError::User)?;
        self.cache.set(StateKey::DistinctId, &user.distinct_id).await?;
        Ok(user.distinct_id)
    }

    pub async fn get_org_id(&self) -> Result<String, StateError> {
        if let Some(id) = self.cache.get(StateKey::OrgId).await? {
            return Ok(id);
        }

        let orgs = self
            .api
            .list_organizations()
            .await
            .map_err(StateError::Organizations)?;

        let org_id = match orgs.as_slice() {
            [only] => only.id.clone(),
            _ => {
                debug!(
                    scope = %self.cache.scope(),
                    visible = orgs.len(),
                    "asking server for current organization"
                );
                self.api
                    .get_organization(CURRENT)
                    .await
                    .map_err(StateError::CurrentOrganization)?
                    .id
            }
        };

        self.cache.set(StateKey::OrgId, &org_id).await?;
        info!(scope = %self.cache.scope(), org_id = %org_id, "resolved organization");
        Ok(org_id)
    }

    /// May resolve (and cache) the organization first.
    pub async fn get_project_id(&self) -> Result<String, StateError> {
        if let Some(id) = self.cache.get(StateKey::ProjectId).await? {
            return Ok(id);
        }

        let org_id = self.get_org_id().await?;
        let projects = self
            .api
            .list_projects(&org_id)
            .await
            .map_err(StateError::Projects)?;

        let project_id = match projects.as_slice() {
            [only] => only.id.clone(),
            _ => {
                debug!(
                    scope = %self.cache.scope(),
                    visible = projects.len(),
                    "asking server for current project"
                );
                self.api
                    .get_project(CURRENT)
                    .await
                    .map_err(StateError::CurrentProject)?
                    .id
            }
        };

        self.cache.set(StateKey::ProjectId, &project_id).await?;
        info!(scope = %self.cache.scope(), project_id = %project_id, "resolved project");
        Ok(project_id)
    }

    /// Scopes granted to the credential. Fetched once per manager.
    pub async fn get_api_key(&self) -> Result<&ApiKeyInfo, StateError> {
        self.api_key
            .get_or_try_init(|| async {
                self.api.current_api_key().await.map_err(StateError::ApiKey)
            })
            .await
    }

    pub async fn set_active_project(&self, project_id: &str) -> Result<(), StateError> {
        self.cache.set(StateKey::ProjectId, project_id).await?;
        info!(scope = %self.cache.scope(), project_id, "active project set");
        Ok(())
    }

    pub async fn set_active_org(&self, org_id: &str) -> Result<(), StateError> {
        self.cache.set(StateKey::OrgId, org_id).await?;
        info!(scope = %self.cache.scope(), org_id, "active organization set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Organization, Project, User};
    use crate::cache::{MemoryCache, MemoryStore, Scope, SqliteStore};
    use crate::error::{ApiError, ApiResult};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeApi {
        orgs: Vec<&'static str>,
        projects: Vec<&'static str>,
        current_org: Option<&'static str>,
        current_project: Option<&'static str>,
        fail_me: AtomicBool,
        me_calls: AtomicUsize,
        org_list_calls: AtomicUsize,
        current_org_calls: AtomicUsize,
        project_list_calls: AtomicUsize,
        current_project_calls: AtomicUsize,
        key_calls: AtomicUsize,
        listed_for_org: Mutex<Vec<String>>,
    }

    fn org(id: &str) -> Organization {
        serde_json::from_value(serde_json::json!({"id": id, "name": format!("org {}", id)}))
            .unwrap()
    }

    fn project(id: &str) -> Project {
        serde_json::from_value(serde_json::json!({"id": id, "name": format!("project {}", id)}))
            .unwrap()
    }

    fn unavailable(what: &str) -> ApiError {
        ApiError::Status {
            status: 500,
            message: format!("{} unavailable", what),
        }
    }

    #[async_trait::async_trait]
    impl ResourceClient for FakeApi {
        async fn me(&self) -> ApiResult<User> {
            self.me_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_me.load(Ordering::SeqCst) {
                return Err(ApiError::Status {
                    status: 401,
                    message: "Invalid personal API key.".to_string(),
                });
            }
            Ok(serde_json::from_value(serde_json::json!({"distinct_id": "user-abc"})).unwrap())
        }

        async fn list_organizations(&self) -> ApiResult<Vec<Organization>> {
            self.org_list_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.orgs.iter().map(|id| org(id)).collect())
        }

        async fn get_organization(&self, org_id: &str) -> ApiResult<Organization> {
            assert_eq!(org_id, CURRENT);
            self.current_org_calls.fetch_add(1, Ordering::SeqCst);
            self.current_org.map(org).ok_or_else(|| unavailable("current organization"))
        }

        async fn list_projects(&self, org_id: &str) -> ApiResult<Vec<Project>> {
            self.project_list_calls.fetch_add(1, Ordering::SeqCst);
            self.listed_for_org.lock().unwrap().push(org_id.to_string());
            Ok(self.projects.iter().map(|id| project(id)).collect())
        }

        async fn get_project(&self, project_id: &str) -> ApiResult<Project> {
            assert_eq!(project_id, CURRENT);
            self.current_project_calls.fetch_add(1, Ordering::SeqCst);
            self.current_project.map(project).ok_or_else(|| unavailable("current project"))
        }

        async fn current_api_key(&self) -> ApiResult<ApiKeyInfo> {
            self.key_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(serde_json::json!({"scopes": ["*"]})).unwrap())
        }
    }

    fn manager(api: Arc<FakeApi>) -> StateManager {
        let cache = MemoryCache::new(Scope::new("scope-a").unwrap());
        StateManager::new(Arc::new(cache), api)
    }

    #[tokio::test]
    async fn test_distinct_id_resolved_once() {
        let api = Arc::new(FakeApi::default());
        let state = manager(api.clone());

        assert_eq!(state.get_distinct_id().await.unwrap(), "user-abc");
        assert_eq!(state.get_distinct_id().await.unwrap(), "user-abc");
        assert_eq!(api.me_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_org_skips_current_lookup() {
        let api = Arc::new(FakeApi {
            orgs: vec!["42"],
            ..Default::default()
        });
        let state = manager(api.clone());

        assert_eq!(state.get_org_id().await.unwrap(), "42");
        assert_eq!(state.get_org_id().await.unwrap(), "42");
        assert_eq!(api.org_list_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.current_org_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_multiple_orgs_use_current() {
        let api = Arc::new(FakeApi {
            orgs: vec!["1", "2"],
            current_org: Some("2"),
            ..Default::default()
        });
        let state = manager(api.clone());

        assert_eq!(state.get_org_id().await.unwrap(), "2");
        assert_eq!(api.current_org_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_org_resolution_agrees() {
        let api = Arc::new(FakeApi {
            orgs: vec!["1", "2"],
            current_org: Some("2"),
            ..Default::default()
        });
        let state = manager(api.clone());

        let (first, second) = tokio::join!(state.get_org_id(), state.get_org_id());
        assert_eq!(first.unwrap(), "2");
        assert_eq!(second.unwrap(), "2");
        assert_eq!(
            state.cache().get(StateKey::OrgId).await.unwrap().as_deref(),
            Some("2")
        );
        // Both may miss the cache; neither may leave it inconsistent.
        assert!(api.org_list_calls.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_no_orgs_and_no_current_fails() {
        let api = Arc::new(FakeApi::default());
        let state = manager(api.clone());

        let err = state.get_org_id().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get current organization: current organization unavailable (status 500)"
        );
        assert_eq!(state.cache().get(StateKey::OrgId).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_project_chains_through_org() {
        let api = Arc::new(FakeApi {
            orgs: vec!["42"],
            projects: vec!["7"],
            ..Default::default()
        });
        let state = manager(api.clone());

        assert_eq!(state.get_project_id().await.unwrap(), "7");
        assert_eq!(*api.listed_for_org.lock().unwrap(), vec!["42".to_string()]);
        assert_eq!(
            state.cache().get(StateKey::OrgId).await.unwrap().as_deref(),
            Some("42")
        );
        assert_eq!(api.current_project_calls.load(Ordering::SeqCst), 0);

        assert_eq!(state.get_project_id().await.unwrap(), "7");
        assert_eq!(api.project_list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_multiple_projects_use_current() {
        let api = Arc::new(FakeApi {
            orgs: vec!["42"],
            projects: vec!["7", "8", "9"],
            current_project: Some("8"),
            ..Default::default()
        });
        let state = manager(api.clone());

        assert_eq!(state.get_project_id().await.unwrap(), "8");
        assert_eq!(api.current_project_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_resolution_keeps_org() {
        let api = Arc::new(FakeApi {
            orgs: vec!["42"],
            projects: vec!["7", "8"],
            ..Default::default()
        });
        let state = manager(api.clone());

        let err = state.get_project_id().await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to get current project: "));
        let snapshot = state.cache().snapshot().await.unwrap();
        assert_eq!(snapshot.org_id.as_deref(), Some("42"));
        assert_eq!(snapshot.project_id, None);
    }

    #[tokio::test]
    async fn test_explicit_project_wins() {
        let api = Arc::new(FakeApi {
            orgs: vec!["1", "2"],
            projects: vec!["7", "8"],
            ..Default::default()
        });
        let state = manager(api.clone());

        state.set_active_project("99").await.unwrap();
        assert_eq!(state.get_project_id().await.unwrap(), "99");
        assert_eq!(api.org_list_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.project_list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_explicit_org_last_write_wins() {
        let api = Arc::new(FakeApi {
            orgs: vec!["42"],
            ..Default::default()
        });
        let state = manager(api.clone());

        assert_eq!(state.get_org_id().await.unwrap(), "42");
        state.set_active_org("43").await.unwrap();
        assert_eq!(state.get_org_id().await.unwrap(), "43");
        assert_eq!(api.org_list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_poison_cache() {
        let api = Arc::new(FakeApi::default());
        api.fail_me.store(true, Ordering::SeqCst);
        let state = manager(api.clone());

        let err = state.get_distinct_id().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to get user: Invalid personal API key. (status 401)"
        );

        api.fail_me.store(false, Ordering::SeqCst);
        assert_eq!(state.get_distinct_id().await.unwrap(), "user-abc");
        assert_eq!(api.me_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_string_is_a_value() {
        let api = Arc::new(FakeApi::default());
        let state = manager(api.clone());

        state.cache().set(StateKey::DistinctId, "").await.unwrap();
        assert_eq!(state.get_distinct_id().await.unwrap(), "");
        assert_eq!(api.me_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_scopes_isolated_on_shared_store() {
        let api = Arc::new(FakeApi {
            orgs: vec!["42"],
            ..Default::default()
        });
        let store = MemoryStore::new();
        let a = StateManager::new(
            Arc::new(store.scoped(Scope::new("a").unwrap())),
            api.clone(),
        );
        let b = StateManager::new(
            Arc::new(store.scoped(Scope::new("b").unwrap())),
            api.clone(),
        );

        a.set_active_org("from-a").await.unwrap();
        assert_eq!(b.get_org_id().await.unwrap(), "42");
        assert_eq!(a.get_org_id().await.unwrap(), "from-a");
    }

    #[tokio::test]
    async fn test_scopes_isolated_on_sqlite_store() {
        let api = Arc::new(FakeApi::default());
        let store = SqliteStore::in_memory().unwrap();
        let a = StateManager::new(
            Arc::new(store.scoped(Scope::new("a").unwrap())),
            api.clone(),
        );
        let b = StateManager::new(
            Arc::new(store.scoped(Scope::new("b").unwrap())),
            api.clone(),
        );

        a.set_active_project("1").await.unwrap();
        b.set_active_project("2").await.unwrap();
        assert_eq!(a.get_project_id().await.unwrap(), "1");
        assert_eq!(b.get_project_id().await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_api_key_memoized() {
        let api = Arc::new(FakeApi::default());
        let state = manager(api.clone());

        assert_eq!(state.get_api_key().await.unwrap().scopes, vec!["*"]);
        state.get_api_key().await.unwrap();
        assert_eq!(api.key_calls.load(Ordering::SeqCst), 1);
    }
}
