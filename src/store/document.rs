//! Document-shaped tenant store: one `tenants` row per tenant, partition = `status`.
//!
//! A transition reads the row, applies the mutation and writes it back inside one
//! database transaction. The write is filtered on `(id, status = from)`, so a
//! concurrent transition that committed first leaves zero affected rows and this one
//! fails with `NotFound` instead of overwriting it.

use crate::{
    core::tenant::{TenantStatus, check_invariants, status_of},
    entities::{Tenant, TenantColumn, tenant},
    errors::{Error, Result},
    store::TenantStore,
};
use sea_orm::{ActiveModelTrait, QueryOrder, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument};

/// [`TenantStore`] over the `tenants` table.
#[derive(Debug, Clone)]
pub struct DocumentTenantStore {
    db: DatabaseConnection,
}

impl DocumentTenantStore {
    /// Creates a store over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Rejects a rewritten record that changed identity or landed in the wrong partition.
pub(crate) fn check_rewrite(
    tenant_id: &str,
    to: TenantStatus,
    next: &tenant::Model,
) -> Result<()> {
    if next.id != tenant_id {
        return Err(Error::Validation {
            message: format!("Tenant id {tenant_id} cannot be changed to {}", next.id),
        });
    }
    if status_of(next)? != to {
        return Err(Error::Validation {
            message: format!("Tenant {tenant_id} rewritten as {} instead of {to}", next.status),
        });
    }
    check_invariants(next)
}

impl TenantStore for DocumentTenantStore {
    async fn get(&self, tenant_id: &str) -> Result<Option<tenant::Model>> {
        Ok(Tenant::find_by_id(tenant_id.to_string()).one(&self.db).await?)
    }

    async fn list(&self, status: TenantStatus) -> Result<Vec<tenant::Model>> {
        Ok(Tenant::find()
            .filter(TenantColumn::Status.eq(status.as_str()))
            .order_by_asc(TenantColumn::SubmittedAt)
            .all(&self.db)
            .await?)
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id))]
    async fn insert_pending(&self, tenant: tenant::Model) -> Result<tenant::Model> {
        if status_of(&tenant)? != TenantStatus::Pending {
            return Err(Error::Validation {
                message: format!("New tenant {} must be pending", tenant.id),
            });
        }
        check_invariants(&tenant)?;

        let model = tenant::ActiveModel::from(tenant)
            .reset_all()
            .insert(&self.db)
            .await?;
        info!(slug = %model.slug, "Pending tenant stored");
        Ok(model)
    }

    #[instrument(skip(self, apply))]
    async fn transition<F>(
        &self,
        tenant_id: &str,
        from: TenantStatus,
        to: TenantStatus,
        apply: F,
    ) -> Result<tenant::Model>
    where
        F: FnOnce(tenant::Model) -> Result<tenant::Model> + Send,
    {
        let txn = self.db.begin().await?;

        let current = Tenant::find_by_id(tenant_id.to_string())
            .filter(TenantColumn::Status.eq(from.as_str()))
            .one(&txn)
            .await?
            .ok_or_else(|| Error::not_found(tenant_id, from.as_str()))?;

        let next = apply(current)?;
        check_rewrite(tenant_id, to, &next)?;

        let result = Tenant::update_many()
            .set(tenant::ActiveModel::from(next.clone()).reset_all())
            .filter(TenantColumn::Id.eq(tenant_id))
            .filter(TenantColumn::Status.eq(from.as_str()))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            debug!("Tenant left {from} before the move committed");
            return Err(Error::not_found(tenant_id, from.as_str()));
        }

        txn.commit().await?;
        info!("Tenant moved from {from} to {to}");
        Ok(next)
    }

    #[instrument(skip(self))]
    async fn remove(&self, tenant_id: &str, from: TenantStatus) -> Result<()> {
        let result = Tenant::delete_many()
            .filter(TenantColumn::Id.eq(tenant_id))
            .filter(TenantColumn::Status.eq(from.as_str()))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(Error::not_found(tenant_id, from.as_str()));
        }
        info!("Tenant removed from {from}");
        Ok(())
    }
}
