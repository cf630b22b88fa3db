//! SwagBucks transaction entity - The append-only ledger log.
//!
//! Each row records one balance-affecting event: `transaction_type` is one of `earned`,
//! `redeemed`, `adjustment`, or `bonus`, and `amount` is signed (credits positive,
//! debits negative). Earned rows carry `order_id` and an `earn_key` of the form
//! `<tenant_id>:<order_id>`; the unique constraint on `earn_key` is what stops an
//! order from being credited twice. Rows are never updated or deleted.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "swagbucks_transactions")]
pub struct Model {
    /// Generated identifier (`sb_<uuid>`)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Tenant whose balance this entry affects
    pub tenant_id: String,
    /// Entry kind: `"earned"`, `"redeemed"`, `"adjustment"`, or `"bonus"`
    pub transaction_type: String,
    /// Signed amount in whole SwagBucks
    pub amount: i64,
    /// Human-readable description of the entry
    pub description: String,
    /// Purchase that produced an `earned` entry
    pub order_id: Option<String>,
    /// Idempotency key for `earned` entries, NULL for every other kind
    #[sea_orm(unique)]
    pub earn_key: Option<String>,
    /// Extra context such as the order subtotal
    pub metadata: Option<Json>,
    /// When the entry was appended
    pub created_at: DateTimeUtc,
    /// Actor that caused the entry (`system` for order completion)
    pub created_by: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
