//! Durable state backing on SQLite.
//!
//! One row per scope, one column per state field. Writes upsert a single
//! column so concurrent resolutions of different fields never clobber each
//! other.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{Scope, ScopedCache, StateKey};
use crate::error::CacheError;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: String,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Arc<Self>, CacheError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        let store = SqliteStore { conn: Mutex::new(conn), path: path_str };
        store.init()?;
        Ok(Arc::new(store))
    }

    pub fn in_memory() -> Result<Arc<Self>, CacheError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore { conn: Mutex::new(conn), path: ":memory:".to_string() };
        store.init()?;
        Ok(Arc::new(store))
    }

    pub fn get_path(&self) -> &str {
        &self.path
    }

    pub fn scoped(self: &Arc<Self>, scope: Scope) -> SqliteCache {
        SqliteCache {
            scope,
            store: Arc::clone(self),
        }
    }

    fn init(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scoped_state (
                scope TEXT PRIMARY KEY,
                project_id TEXT,
                org_id TEXT,
                distinct_id TEXT,
                region TEXT,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );
            ",
        )?;
        Ok(())
    }

    fn column(key: StateKey) -> &'static str {
        match key {
            StateKey::ProjectId => "project_id",
            StateKey::OrgId => "org_id",
            StateKey::DistinctId => "distinct_id",
            StateKey::Region => "region",
        }
    }

    fn read(&self, scope: &Scope, key: StateKey) -> Result<Option<String>, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let sql = format!("SELECT {} FROM scoped_state WHERE scope = ?1", Self::column(key));
        let value: Option<Option<String>> = conn
            .query_row(&sql, params![scope.as_str()], |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }

    fn write(&self, scope: &Scope, key: StateKey, value: &str) -> Result<(), CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let column = Self::column(key);
        let sql = format!(
            "INSERT INTO scoped_state (scope, {col}) VALUES (?1, ?2)
             ON CONFLICT(scope) DO UPDATE SET {col} = excluded.{col},
                updated_at = strftime('%s', 'now')",
            col = column
        );
        conn.execute(&sql, params![scope.as_str(), value])?;
        Ok(())
    }

    pub fn scope_count(&self) -> Result<usize, CacheError> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM scoped_state", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[derive(Clone)]
pub struct SqliteCache {
    scope: Scope,
    store: Arc<SqliteStore>,
}

#[async_trait]
impl ScopedCache for SqliteCache {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    async fn get(&self, key: StateKey) -> Result<Option<String>, CacheError> {
        self.store.read(&self.scope, key)
    }

    async fn set(&self, key: StateKey, value: &str) -> Result<(), CacheError> {
        self.store.write(&self.scope, key, value)
    }
}
