//! Tenant entity - One storefront account per row.
//!
//! The `status` column doubles as the partition the tenant currently lives in
//! (`pending`, `active`, or `declined`); moving between partitions is an update of
//! this column guarded by its previous value. The same model is serialized as JSON
//! when tenants are stored in list form.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Tenant database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tenants")]
pub struct Model {
    /// Opaque tenant identifier (e.g. `tenant_5f0c...`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Organization name as requested
    pub name: String,
    /// Display name of the storefront
    pub store_name: String,
    /// URL-safe identifier derived from the requested name
    #[sea_orm(unique)]
    pub slug: String,
    /// Subdomain the store is served under (e.g. `vohon` for vohon.swagstore.ca)
    #[sea_orm(unique)]
    pub subdomain: String,
    /// Lifecycle state: `pending`, `active`, or `declined`
    pub status: String,
    /// True iff `status == "active"`
    pub is_active: bool,
    /// Kind of team (e.g. `hockey`)
    pub team_type: Option<String>,
    /// Competitive level (e.g. `Minor/Youth`)
    pub organization_level: Option<String>,
    /// City of the organization
    pub city: Option<String>,
    /// Province of the organization
    pub province: Option<String>,
    /// Canadian postal code
    pub postal_code: Option<String>,
    /// Name of the requesting contact
    pub contact_name: String,
    /// Email of the requesting contact
    pub contact_email: String,
    /// Phone of the requesting contact
    pub contact_phone: Option<String>,
    /// Team size bracket (e.g. `26-50`)
    pub team_size: Option<String>,
    /// Expected order volume bracket
    pub expected_volume: Option<String>,
    /// Requested turnaround
    pub urgency: Option<String>,
    /// Free-form request description
    pub description: Option<String>,
    /// Hosted logo URL
    pub logo_url: Option<String>,
    /// When the store request was submitted
    pub submitted_at: DateTimeUtc,
    /// When the tenant became an active store
    pub created_at: Option<DateTimeUtc>,
    /// Approval timestamp, set only on pending -> active
    pub approved_at: Option<DateTimeUtc>,
    /// Approving admin, set only on pending -> active
    pub approved_by: Option<String>,
    /// Decline timestamp, set only on pending -> declined
    pub declined_at: Option<DateTimeUtc>,
    /// Declining admin, set only on pending -> declined
    pub declined_by: Option<String>,
    /// Optional reason given when declining
    pub decline_reason: Option<String>,
    /// Generated storefront structure, present iff the tenant is active
    pub website: Option<Json>,
}

/// `Tenant` rows are standalone; ledger rows reference them by id only so that
/// ledgers outlive tenant teardown.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
