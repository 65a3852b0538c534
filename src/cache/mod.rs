//! Per-caller state storage.
//!
//! Every cache is bound to a [`Scope`] derived from the caller's credential.
//! Two backings share the same [`ScopedCache`] contract: [`MemoryCache`] for
//! short-lived processes and [`SqliteCache`] for state that must survive
//! restarts.

mod memory;
mod sqlite;

pub use memory::{MemoryCache, MemoryStore};
pub use sqlite::{SqliteCache, SqliteStore};

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CacheError;

/// Opaque identity a cache is partitioned by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope(String);

impl Scope {
    pub fn new(id: impl Into<String>) -> Result<Self, CacheError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CacheError::MissingScope);
        }
        Ok(Self(id))
    }

    /// Scope for a credential: hex SHA-256 of the token. A blank token has
    /// no identity and is rejected like an empty scope.
    pub fn from_token(token: &str) -> Result<Self, CacheError> {
        if token.trim().is_empty() {
            return Err(CacheError::MissingScope);
        }
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix is enough to correlate log lines.
        let prefix: String = self.0.chars().take(12).collect();
        f.write_str(&prefix)
    }
}

/// The fixed set of fields a scope can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    ProjectId,
    OrgId,
    DistinctId,
    Region,
}

impl StateKey {
    pub const ALL: [StateKey; 4] = [
        StateKey::ProjectId,
        StateKey::OrgId,
        StateKey::DistinctId,
        StateKey::Region,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectId => "projectId",
            Self::OrgId => "orgId",
            Self::DistinctId => "distinctId",
            Self::Region => "region",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudRegion {
    Us,
    Eu,
}

impl CloudRegion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Eu => "eu",
        }
    }
}

impl FromStr for CloudRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "us" => Ok(Self::Us),
            "eu" => Ok(Self::Eu),
            other => Err(format!("Unknown region: '{}'", other)),
        }
    }
}

/// Snapshot of everything cached for one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub project_id: Option<String>,
    pub org_id: Option<String>,
    pub distinct_id: Option<String>,
    pub region: Option<CloudRegion>,
}

impl State {
    pub fn get(&self, key: StateKey) -> Option<String> {
        match key {
            StateKey::ProjectId => self.project_id.clone(),
            StateKey::OrgId => self.org_id.clone(),
            StateKey::DistinctId => self.distinct_id.clone(),
            StateKey::Region => self.region.map(|r| r.as_str().to_string()),
        }
    }

    /// Unrecognised region strings leave the region unset.
    pub fn set(&mut self, key: StateKey, value: String) {
        match key {
            StateKey::ProjectId => self.project_id = Some(value),
            StateKey::OrgId => self.org_id = Some(value),
            StateKey::DistinctId => self.distinct_id = Some(value),
            StateKey::Region => self.region = value.parse().ok(),
        }
    }
}

/// Key/value storage bound to a single scope.
///
/// `get` returns `None` only when the key was never written; an empty string
/// is a stored value. `set` overwrites and returns once the write is applied.
/// Implementations must tolerate concurrent calls from many tasks; each key
/// is read and written atomically, with no cross-key transactions.
#[async_trait]
pub trait ScopedCache: Send + Sync {
    fn scope(&self) -> &Scope;

    async fn get(&self, key: StateKey) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: StateKey, value: &str) -> Result<(), CacheError>;

    async fn snapshot(&self) -> Result<State, CacheError> {
        let mut state = State::default();
        for key in StateKey::ALL {
            if let Some(value) = self.get(key).await? {
                state.set(key, value);
            }
        }
        Ok(state)
    }
}
