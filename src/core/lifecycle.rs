//! Tenant lifecycle - Approve, decline, restore and delete storefront tenants.
//!
//! ```text
//! pending --approve--> active --delete--> (removed, ledger archived)
//!    |
//!    +----decline----> declined --delete--> (removed)
//!    ^                    |
//!    +------restore-------+
//! ```
//!
//! Every edge is a single [`TenantStore::transition`], so the source state is checked
//! when the move commits and a tenant can never be approved twice.

use crate::{
    core::{
        actor::Actor,
        ledger::Ledger,
        tenant::{StoreRequest, TenantOverrides, TenantStatus, new_pending_tenant, status_of},
        website::default_website,
    },
    entities::tenant,
    errors::{Error, Result},
    store::TenantStore,
};
use chrono::Utc;
use tracing::{error, info, instrument};

/// Drives tenants through their lifecycle over a [`TenantStore`].
pub struct TenantLifecycle<S> {
    store: S,
    ledger: Ledger,
}

impl<S: TenantStore> TenantLifecycle<S> {
    /// Creates a manager over `store`; `ledger` is archived when an active tenant is deleted.
    pub const fn new(store: S, ledger: Ledger) -> Self {
        Self { store, ledger }
    }

    /// The tenant store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The SwagBucks ledger.
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Records a new store request as a pending tenant.
    #[instrument(skip(self, request), fields(team_name = %request.team_name))]
    pub async fn submit(&self, request: StoreRequest) -> Result<tenant::Model> {
        let tenant = self.store.insert_pending(new_pending_tenant(request)?).await?;
        info!(tenant_id = %tenant.id, "Store request submitted");
        Ok(tenant)
    }

    /// Approves a pending tenant and attaches its default storefront.
    ///
    /// `overrides` are merged onto the request before activation. Fails with `NotFound`
    /// if the tenant is not pending when the move commits, e.g. because another admin
    /// approved or declined it first.
    #[instrument(skip(self, actor, overrides), fields(actor = %actor.id))]
    pub async fn approve(
        &self,
        actor: &Actor,
        tenant_id: &str,
        overrides: TenantOverrides,
    ) -> Result<tenant::Model> {
        actor.require("approve tenants")?;
        let approved_by = actor.id.clone();

        let tenant = self
            .store
            .transition(
                tenant_id,
                TenantStatus::Pending,
                TenantStatus::Active,
                move |mut tenant| {
                    overrides.apply_to(&mut tenant)?;
                    let now = Utc::now();
                    tenant.status = TenantStatus::Active.as_str().to_string();
                    tenant.is_active = true;
                    tenant.approved_at = Some(now);
                    tenant.approved_by = Some(approved_by);
                    tenant.created_at = Some(tenant.created_at.unwrap_or(now));
                    tenant.website = Some(default_website(&tenant).to_json()?);
                    Ok(tenant)
                },
            )
            .await?;

        info!(slug = %tenant.slug, "Tenant approved");
        Ok(tenant)
    }

    /// Declines a pending tenant.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn decline(
        &self,
        actor: &Actor,
        tenant_id: &str,
        reason: Option<String>,
    ) -> Result<()> {
        actor.require("decline tenants")?;
        let declined_by = actor.id.clone();

        self.store
            .transition(
                tenant_id,
                TenantStatus::Pending,
                TenantStatus::Declined,
                move |mut tenant| {
                    tenant.status = TenantStatus::Declined.as_str().to_string();
                    tenant.is_active = false;
                    tenant.declined_at = Some(Utc::now());
                    tenant.declined_by = Some(declined_by);
                    tenant.decline_reason = reason;
                    Ok(tenant)
                },
            )
            .await?;

        info!("Tenant declined");
        Ok(())
    }

    /// Puts a declined tenant back into review.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn restore(&self, actor: &Actor, tenant_id: &str) -> Result<()> {
        actor.require("restore tenants")?;

        self.store
            .transition(
                tenant_id,
                TenantStatus::Declined,
                TenantStatus::Pending,
                |mut tenant| {
                    tenant.status = TenantStatus::Pending.as_str().to_string();
                    tenant.is_active = false;
                    tenant.declined_at = None;
                    tenant.declined_by = None;
                    tenant.decline_reason = None;
                    Ok(tenant)
                },
            )
            .await?;

        info!("Tenant restored to pending");
        Ok(())
    }

    /// Permanently deletes a declined tenant, or tears down an active one.
    ///
    /// Tearing down archives the tenant's SwagBucks ledger before the record is removed.
    /// If the removal fails and the tenant is still active, the archive is undone so the
    /// tenant keeps earning.
    /// Pending tenants cannot be deleted and yield `NotFound`.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete(&self, actor: &Actor, tenant_id: &str) -> Result<()> {
        actor.require("delete tenants")?;

        let tenant = self
            .store
            .get(tenant_id)
            .await?
            .ok_or_else(|| Error::not_found(tenant_id, "active or declined"))?;

        match status_of(&tenant)? {
            TenantStatus::Declined => {
                self.store.remove(tenant_id, TenantStatus::Declined).await?;
                info!("Declined tenant deleted");
            }
            TenantStatus::Active => {
                let archived = self.ledger.archive(tenant_id, actor).await?;
                if let Err(err) = self.store.remove(tenant_id, TenantStatus::Active).await {
                    if archived && self.still_active(tenant_id).await? {
                        self.ledger
                            .unarchive(tenant_id, actor)
                            .await
                            .inspect_err(|e| error!(error = %e, "Failed to reopen ledger"))?;
                    }
                    return Err(err);
                }
                info!("Active tenant torn down");
            }
            TenantStatus::Pending => {
                return Err(Error::not_found(tenant_id, "active or declined"));
            }
        }
        Ok(())
    }

    async fn still_active(&self, tenant_id: &str) -> Result<bool> {
        let tenant = self.store.get(tenant_id).await?;
        Ok(tenant.is_some_and(|t| t.status == TenantStatus::Active.as_str()))
    }

    /// Looks a tenant up in any state.
    pub async fn get(&self, tenant_id: &str) -> Result<Option<tenant::Model>> {
        self.store.get(tenant_id).await
    }

    /// Every tenant in `status`.
    pub async fn list(&self, status: TenantStatus) -> Result<Vec<tenant::Model>> {
        self.store.list(status).await
    }
}
