//! Per-credential context handed to every tool.

use std::sync::Arc;

use tracing::info;

use crate::api::ApiClient;
use crate::cache::{MemoryStore, Scope, ScopedCache, SqliteStore};
use crate::config::Config;
use crate::error::{CacheError, ContextError, StateError};
use crate::region::RegionResolver;
use crate::state::StateManager;

/// Where scoped state lives. One backing is shared by every session.
#[derive(Clone)]
pub enum StateBacking {
    Memory(Arc<MemoryStore>),
    Sqlite(Arc<SqliteStore>),
}

impl StateBacking {
    pub fn from_config(config: &Config) -> Result<Self, CacheError> {
        match &config.state_db {
            Some(path) => {
                let store = SqliteStore::open(path)?;
                info!(path = store.get_path(), "using durable state store");
                Ok(Self::Sqlite(store))
            }
            None => Ok(Self::Memory(MemoryStore::new())),
        }
    }

    pub fn cache_for(&self, scope: Scope) -> Arc<dyn ScopedCache> {
        match self {
            Self::Memory(store) => Arc::new(store.scoped(scope)),
            Self::Sqlite(store) => Arc::new(store.scoped(scope)),
        }
    }
}

pub struct Context {
    pub api: Arc<ApiClient>,
    pub cache: Arc<dyn ScopedCache>,
    pub state: StateManager,
    pub config: Arc<Config>,
}

impl Context {
    /// Bind a credential: derive its scope, pick the API host (detecting the
    /// region if needed) and wire up the state manager.
    pub async fn new(
        token: &str,
        config: Arc<Config>,
        backing: &StateBacking,
    ) -> Result<Self, ContextError> {
        let scope = Scope::from_token(token)?;
        let cache = backing.cache_for(scope);

        let resolver = RegionResolver::new(
            cache.clone(),
            config.custom_base_url().map(str::to_string),
        );
        let base_url = resolver.base_url(token).await?;
        info!(scope = %cache.scope(), base_url = %base_url, "context ready");

        let api = Arc::new(ApiClient::new(&base_url, token)?);
        let state = StateManager::new(cache.clone(), api.clone());
        Ok(Self {
            api,
            cache,
            state,
            config,
        })
    }

    pub async fn project_id(&self) -> Result<String, StateError> {
        self.state.get_project_id().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StateKey;

    #[tokio::test]
    async fn test_custom_host_context() {
        let config = Arc::new(Config {
            custom_base_url: Some("http://localhost:8010".to_string()),
            ..Default::default()
        });
        let backing = StateBacking::Memory(MemoryStore::new());
        let ctx = Context::new("phx_abc", config, &backing).await.unwrap();

        assert_eq!(ctx.api.base_url(), "http://localhost:8010");
        assert_eq!(ctx.cache.scope(), &Scope::from_token("phx_abc").unwrap());
    }

    #[tokio::test]
    async fn test_same_token_shares_state() {
        let config = Arc::new(Config {
            custom_base_url: Some("http://localhost:8010".to_string()),
            ..Default::default()
        });
        let backing = StateBacking::Memory(MemoryStore::new());
        let first = Context::new("phx_abc", config.clone(), &backing).await.unwrap();
        first.state.set_active_project("12").await.unwrap();

        let second = Context::new("phx_abc", config.clone(), &backing).await.unwrap();
        assert_eq!(second.project_id().await.unwrap(), "12");

        let other = Context::new("phx_other", config, &backing).await.unwrap();
        assert_eq!(other.cache.get(StateKey::ProjectId).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blank_token_rejected() {
        let backing = StateBacking::Memory(MemoryStore::new());
        let res = Context::new("  ", Arc::new(Config::default()), &backing).await;
        assert!(matches!(
            res.err(),
            Some(ContextError::Cache(CacheError::MissingScope))
        ));
    }

    #[test]
    fn test_backing_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            state_db: Some(dir.path().join("state.db")),
            ..Default::default()
        };
        assert!(matches!(
            StateBacking::from_config(&config).unwrap(),
            StateBacking::Sqlite(_)
        ));
        assert!(matches!(
            StateBacking::from_config(&Config::default()).unwrap(),
            StateBacking::Memory(_)
        ));
    }
}
