//! Shared test utilities for swagstore.
//!
//! This module provides common helper functions for setting up test databases
//! and building tenants, ledgers and lifecycle managers with sensible defaults.

#![allow(clippy::expect_used)]

use crate::{
    config::database::create_tables,
    core::{
        actor::Actor,
        ledger::Ledger,
        lifecycle::TenantLifecycle,
        rewards::RewardPolicy,
        tenant::{StoreRequest, new_pending_tenant},
    },
    entities::tenant,
    errors::{Error, Result},
    store::{DocumentTenantStore, ListQueue, ListTenantStore, SqlListQueue},
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::{path::PathBuf, sync::Mutex as StdMutex};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
///
/// The pool is limited to one connection, so concurrent transactions queue for it
/// instead of each seeing a separate in-memory database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;
    create_tables(&db).await?;
    Ok(db)
}

/// A `SQLite` database file in the temp directory, shared by a pool of
/// `max_connections`. Unlike [`setup_test_db`], transactions on different connections
/// really run side by side and contend for the file lock. The file is deleted on drop.
pub struct TestFileDb {
    /// Pool over the file
    pub db: DatabaseConnection,
    path: PathBuf,
}

impl TestFileDb {
    /// Creates a fresh database file with all tables initialized.
    pub async fn open(max_connections: u32) -> Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "swagstore_test_{}.db",
            uuid::Uuid::new_v4().simple()
        ));
        let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
        options
            .max_connections(max_connections)
            .sqlx_logging(false);
        let db = Database::connect(options).await?;
        create_tables(&db).await?;
        Ok(Self { db, path })
    }
}

impl Drop for TestFileDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(self.path.with_extension("db-journal"));
    }
}

/// An authorized admin with id `admin_1`.
pub fn admin() -> Actor {
    Actor::admin("admin_1")
}

/// A store request with the required fields filled in.
///
/// # Defaults
/// * `contact_name`: "Jamie Tremblay"
/// * `contact_email`: "jamie@example.ca"
/// * `city` / `province`: "Vohon" / "ON"
pub fn store_request(team_name: &str) -> StoreRequest {
    StoreRequest {
        team_name: team_name.to_string(),
        contact_name: "Jamie Tremblay".to_string(),
        contact_email: "jamie@example.ca".to_string(),
        city: Some("Vohon".to_string()),
        province: Some("ON".to_string()),
        ..StoreRequest::default()
    }
}

/// A pending tenant record built from [`store_request`].
pub fn pending_tenant(team_name: &str) -> tenant::Model {
    new_pending_tenant(store_request(team_name)).expect("valid store request")
}

/// Sets up a ledger with the default reward policy.
/// Returns (db, ledger) so tests can inspect tables directly.
pub async fn setup_ledger() -> Result<(DatabaseConnection, Ledger)> {
    let db = setup_test_db().await?;
    let ledger = Ledger::new(db.clone(), RewardPolicy::default());
    Ok((db, ledger))
}

/// Lifecycle manager over the document store.
pub async fn setup_document_lifecycle() -> Result<TenantLifecycle<DocumentTenantStore>> {
    let (db, ledger) = setup_ledger().await?;
    Ok(TenantLifecycle::new(DocumentTenantStore::new(db), ledger))
}

/// Lifecycle manager over the list store.
pub async fn setup_list_lifecycle() -> Result<TenantLifecycle<ListTenantStore<SqlListQueue>>> {
    let (db, ledger) = setup_ledger().await?;
    Ok(TenantLifecycle::new(
        ListTenantStore::new(SqlListQueue::new(db)),
        ledger,
    ))
}

/// Lifecycle manager over a list store whose queue can be told to fail.
pub async fn setup_flaky_list_lifecycle() -> Result<TenantLifecycle<ListTenantStore<FlakyQueue>>>
{
    let (db, ledger) = setup_ledger().await?;
    Ok(TenantLifecycle::new(
        ListTenantStore::new(FlakyQueue::new(SqlListQueue::new(db))),
        ledger,
    ))
}

/// Queue that fails the next `push`/`clear` on a chosen key, once.
pub struct FlakyQueue {
    inner: SqlListQueue,
    fail_push: StdMutex<Option<String>>,
    fail_clear: StdMutex<Option<String>>,
}

impl FlakyQueue {
    /// Wraps `inner`; nothing fails until asked to.
    pub const fn new(inner: SqlListQueue) -> Self {
        Self {
            inner,
            fail_push: StdMutex::new(None),
            fail_clear: StdMutex::new(None),
        }
    }

    /// The next `push` to `key` fails without writing.
    pub fn fail_next_push(&self, key: &str) {
        *self.fail_push.lock().expect("fail_push lock") = Some(key.to_string());
    }

    /// The next `clear` of `key` fails without writing.
    pub fn fail_next_clear(&self, key: &str) {
        *self.fail_clear.lock().expect("fail_clear lock") = Some(key.to_string());
    }
}

fn trip(slot: &StdMutex<Option<String>>, key: &str) -> bool {
    let mut slot = slot.lock().expect("failure slot lock");
    if slot.as_deref() == Some(key) {
        *slot = None;
        true
    } else {
        false
    }
}

fn injected() -> Error {
    Error::StoreUnavailable {
        message: "injected failure".to_string(),
    }
}

impl ListQueue for FlakyQueue {
    async fn range(&self, key: &str) -> Result<Vec<String>> {
        self.inner.range(key).await
    }

    async fn push(&self, key: &str, values: Vec<String>) -> Result<()> {
        if trip(&self.fail_push, key) {
            return Err(injected());
        }
        self.inner.push(key, values).await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        if trip(&self.fail_clear, key) {
            return Err(injected());
        }
        self.inner.clear(key).await
    }
}
