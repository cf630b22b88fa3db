//! Tenant storage - Two interchangeable shapes behind one contract.
//!
//! A tenant lives in exactly one partition, named by its status. The only way to change
//! partition is [`TenantStore::transition`], which must behave as an atomic move: either
//! the record leaves `from` and appears in `to`, or nothing changes.

pub mod document;
pub mod list;
pub mod list_queue;

use crate::{
    core::tenant::TenantStatus,
    entities::tenant,
    errors::Result,
};
use std::future::Future;

pub use document::DocumentTenantStore;
pub use list::{ListTenantStore, RecoveryReport};
pub use list_queue::{ListQueue, SqlListQueue};

/// Storage contract consumed by the lifecycle manager.
pub trait TenantStore: Send + Sync {
    /// Looks a tenant up in any partition.
    fn get(&self, tenant_id: &str) -> impl Future<Output = Result<Option<tenant::Model>>> + Send;

    /// Every tenant currently in `status`.
    fn list(&self, status: TenantStatus) -> impl Future<Output = Result<Vec<tenant::Model>>> + Send;

    /// Stores a new pending request. Fails with `Conflict` if the id or slug is taken.
    fn insert_pending(
        &self,
        tenant: tenant::Model,
    ) -> impl Future<Output = Result<tenant::Model>> + Send;

    /// Atomically moves a tenant from `from` to `to`, rewriting it with `apply`.
    ///
    /// The tenant's partition is re-checked when the move commits; if it is no longer
    /// in `from` the call fails with `NotFound` and nothing is written. `apply` is
    /// called at most once per attempt and must not touch storage itself.
    fn transition<F>(
        &self,
        tenant_id: &str,
        from: TenantStatus,
        to: TenantStatus,
        apply: F,
    ) -> impl Future<Output = Result<tenant::Model>> + Send
    where
        F: FnOnce(tenant::Model) -> Result<tenant::Model> + Send;

    /// Permanently removes a tenant that is in `from`; `NotFound` otherwise.
    fn remove(
        &self,
        tenant_id: &str,
        from: TenantStatus,
    ) -> impl Future<Output = Result<()>> + Send;
}
