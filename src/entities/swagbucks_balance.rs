//! SwagBucks balance entity - The materialized projection of a tenant's ledger.
//!
//! One row per tenant, created lazily by the first credit. The row is a cache of the
//! transaction log: `balance == total_earned - total_redeemed` must hold after every
//! committed operation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Balance database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "swagbucks_balances")]
pub struct Model {
    /// Tenant the balance belongs to
    #[sea_orm(primary_key, auto_increment = false)]
    pub tenant_id: String,
    /// Spendable SwagBucks
    pub balance: i64,
    /// Sum of every credit (earned, bonus, positive adjustment)
    pub total_earned: i64,
    /// Sum of every debit magnitude (redeemed, negative adjustment)
    pub total_redeemed: i64,
    /// When the projection was last written
    pub updated_at: DateTimeUtc,
    /// Set when the owning tenant is torn down; archived ledgers are read-only
    pub archived_at: Option<DateTimeUtc>,
}

/// Transactions reference the balance by `tenant_id` without a foreign key: the log
/// row and the first balance row are written in the same transaction, in either order.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
