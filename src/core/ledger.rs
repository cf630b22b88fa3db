//! SwagBucks ledger - Handles all balance-affecting operations.
//!
//! The transaction log is the source of truth and the balance row is a projection of it.
//! Every operation that appends to the log updates the projection in the same database
//! transaction, using `col = col + ?` expressions rather than read-modify-write. The
//! balance row is written before it is read, so a transaction holds the write lock
//! before it looks at anything and two writers never wait on each other's read lock.
//! A conditional write that matched nothing is then explained by reading the row.
//!
//! Earned entries carry a unique `earn_key`, so a retried or concurrent credit for the
//! same order is rejected by the database rather than by application locking.

use crate::{
    core::{actor::Actor, rewards::RewardPolicy},
    entities::{SwagBucksBalance, SwagBucksTransaction, swagbucks_balance, swagbucks_transaction},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    DatabaseTransaction, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use std::{collections::BTreeSet, fmt, str::FromStr};
use tracing::{debug, info, instrument, warn};

/// Kind of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Credit for a completed purchase
    Earned,
    /// Debit for a redemption
    Redeemed,
    /// Signed admin correction
    Adjustment,
    /// Promotional credit
    Bonus,
}

impl TransactionKind {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::Redeemed => "redeemed",
            Self::Adjustment => "adjustment",
            Self::Bonus => "bonus",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "earned" => Ok(Self::Earned),
            "redeemed" => Ok(Self::Redeemed),
            "adjustment" => Ok(Self::Adjustment),
            "bonus" => Ok(Self::Bonus),
            other => Err(Error::Validation {
                message: format!("Unknown SwagBucks transaction type '{other}'"),
            }),
        }
    }
}

/// A tenant's balance as shown to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerBalance {
    /// Tenant the balance belongs to
    pub tenant_id: String,
    /// Spendable SwagBucks
    pub balance: i64,
    /// Lifetime credits
    pub total_earned: i64,
    /// Lifetime debits
    pub total_redeemed: i64,
    /// Last write to the projection, `None` if the tenant has no ledger activity
    pub updated_at: Option<DateTimeUtc>,
    /// Whether the ledger was archived by tenant teardown
    pub archived: bool,
}

impl LedgerBalance {
    fn empty(tenant_id: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            balance: 0,
            total_earned: 0,
            total_redeemed: 0,
            updated_at: None,
            archived: false,
        }
    }

    /// The three totals of this balance.
    #[must_use]
    pub const fn totals(&self) -> LedgerTotals {
        LedgerTotals {
            balance: self.balance,
            total_earned: self.total_earned,
            total_redeemed: self.total_redeemed,
        }
    }
}

impl From<swagbucks_balance::Model> for LedgerBalance {
    fn from(model: swagbucks_balance::Model) -> Self {
        Self {
            tenant_id: model.tenant_id,
            balance: model.balance,
            total_earned: model.total_earned,
            total_redeemed: model.total_redeemed,
            updated_at: Some(model.updated_at),
            archived: model.archived_at.is_some(),
        }
    }
}

/// Balance, credits and debits, either stored or recomputed from the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerTotals {
    /// Spendable SwagBucks
    pub balance: i64,
    /// Sum of positive entries
    pub total_earned: i64,
    /// Sum of negative entry magnitudes
    pub total_redeemed: i64,
}

impl LedgerTotals {
    /// Sums a tenant's log.
    #[must_use]
    pub fn from_log(entries: &[swagbucks_transaction::Model]) -> Self {
        let total_earned: i64 = entries.iter().map(|e| e.amount).filter(|a| *a > 0).sum();
        let total_redeemed: i64 = entries
            .iter()
            .map(|e| e.amount)
            .filter(|a| *a < 0)
            .map(i64::abs)
            .sum();
        Self {
            balance: total_earned - total_redeemed,
            total_earned,
            total_redeemed,
        }
    }
}

/// Whether `reconcile` may rewrite a drifted projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Detect and report drift only
    ReportOnly,
    /// Rewrite the balance row from the log when it drifted
    Repair,
}

/// Outcome of comparing a balance row with its log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Tenant checked
    pub tenant_id: String,
    /// Totals on the balance row (zeros when absent)
    pub stored: LedgerTotals,
    /// Totals recomputed from the log
    pub computed: LedgerTotals,
    /// Whether the row was rewritten
    pub repaired: bool,
}

impl ReconcileReport {
    /// True when the stored projection matches the log.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.stored == self.computed
    }
}

struct NewEntry<'a> {
    tenant_id: &'a str,
    kind: TransactionKind,
    amount: i64,
    description: String,
    order_id: Option<String>,
    metadata: Option<serde_json::Value>,
    created_by: &'a str,
}

/// The SwagBucks ledger for every tenant.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: DatabaseConnection,
    policy: RewardPolicy,
}

impl Ledger {
    /// Creates a ledger over `db` applying `policy`.
    #[must_use]
    pub const fn new(db: DatabaseConnection, policy: RewardPolicy) -> Self {
        Self { db, policy }
    }

    /// The earning and redemption policy in force.
    #[must_use]
    pub const fn policy(&self) -> &RewardPolicy {
        &self.policy
    }

    /// Credits a tenant for a completed order, at most once per `(tenant_id, order_id)`.
    ///
    /// Returns the amount credited: 0 when the order earns nothing or was already
    /// credited. The log entry and the balance increment commit together or not at all.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn record_earn(
        &self,
        tenant_id: &str,
        order_id: &str,
        order_subtotal: f64,
        actor: &Actor,
    ) -> Result<i64> {
        actor.require("record SwagBucks earnings")?;
        if order_id.trim().is_empty() {
            return Err(Error::Validation {
                message: "Order id is required to record earnings".to_string(),
            });
        }

        let amount = self.policy.earn_amount(order_subtotal)?;
        if amount == 0 {
            debug!("Order earns no SwagBucks");
            return Ok(0);
        }

        let txn = self.db.begin().await?;

        let inserted = entry_model(NewEntry {
            tenant_id,
            kind: TransactionKind::Earned,
            amount,
            description: format!("Earned from order #{}", order_suffix(order_id)),
            order_id: Some(order_id.to_string()),
            metadata: Some(serde_json::json!({ "orderSubtotal": order_subtotal })),
            created_by: &actor.id,
        })
        .insert(&txn)
        .await;

        match inserted {
            Ok(_) => {}
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                txn.rollback().await?;
                info!("Order already credited, skipping");
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        }

        apply_credit(&txn, tenant_id, amount).await?;
        txn.commit().await?;

        info!(amount, "SwagBucks earned");
        Ok(amount)
    }

    /// Redeems `amount` SwagBucks from a tenant's balance.
    ///
    /// The debit is a single conditional update on the balance still covering `amount`,
    /// so concurrent redemptions can never overdraw.
    #[instrument(skip(self, description, actor), fields(actor = %actor.id))]
    pub async fn redeem(
        &self,
        tenant_id: &str,
        amount: i64,
        description: String,
        actor: &Actor,
    ) -> Result<swagbucks_transaction::Model> {
        actor.require("redeem SwagBucks")?;
        self.policy.check_redemption(amount)?;

        let txn = self.db.begin().await?;
        apply_debit(&txn, tenant_id, amount).await?;
        let entry = entry_model(NewEntry {
            tenant_id,
            kind: TransactionKind::Redeemed,
            amount: -amount,
            description,
            order_id: None,
            metadata: None,
            created_by: &actor.id,
        })
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(amount, "SwagBucks redeemed");
        Ok(entry)
    }

    /// Grants a promotional credit.
    #[instrument(skip(self, description, actor), fields(actor = %actor.id))]
    pub async fn grant_bonus(
        &self,
        tenant_id: &str,
        amount: i64,
        description: String,
        actor: &Actor,
    ) -> Result<swagbucks_transaction::Model> {
        actor.require("grant SwagBucks bonuses")?;
        if amount <= 0 {
            return Err(Error::InvalidAmount {
                amount: amount as f64,
            });
        }

        let txn = self.db.begin().await?;
        let entry = entry_model(NewEntry {
            tenant_id,
            kind: TransactionKind::Bonus,
            amount,
            description,
            order_id: None,
            metadata: None,
            created_by: &actor.id,
        })
        .insert(&txn)
        .await?;
        apply_credit(&txn, tenant_id, amount).await?;
        txn.commit().await?;

        info!(amount, "SwagBucks bonus granted");
        Ok(entry)
    }

    /// Appends a signed correction. This is the only way to correct a committed entry;
    /// the log itself is never edited. A negative delta may not overdraw the balance.
    #[instrument(skip(self, description, actor), fields(actor = %actor.id))]
    pub async fn adjust(
        &self,
        tenant_id: &str,
        delta: i64,
        description: String,
        actor: &Actor,
    ) -> Result<swagbucks_transaction::Model> {
        actor.require("adjust SwagBucks balances")?;
        if delta == 0 {
            return Err(Error::InvalidAmount { amount: 0.0 });
        }

        let txn = self.db.begin().await?;
        if delta > 0 {
            apply_credit(&txn, tenant_id, delta).await?;
        } else {
            apply_debit(&txn, tenant_id, -delta).await?;
        }
        let entry = entry_model(NewEntry {
            tenant_id,
            kind: TransactionKind::Adjustment,
            amount: delta,
            description,
            order_id: None,
            metadata: None,
            created_by: &actor.id,
        })
        .insert(&txn)
        .await?;
        txn.commit().await?;

        info!(delta, "SwagBucks adjusted");
        Ok(entry)
    }

    /// Current balance; all zeros for a tenant with no ledger activity. Never writes.
    pub async fn get_balance(&self, tenant_id: &str) -> Result<LedgerBalance> {
        Ok(SwagBucksBalance::find_by_id(tenant_id.to_string())
            .one(&self.db)
            .await?
            .map_or_else(|| LedgerBalance::empty(tenant_id), LedgerBalance::from))
    }

    /// Every stored balance, largest first.
    pub async fn all_balances(&self) -> Result<Vec<LedgerBalance>> {
        Ok(SwagBucksBalance::find()
            .order_by_desc(swagbucks_balance::Column::Balance)
            .order_by_asc(swagbucks_balance::Column::TenantId)
            .all(&self.db)
            .await?
            .into_iter()
            .map(LedgerBalance::from)
            .collect())
    }

    /// A tenant's log, newest first.
    pub async fn transactions(&self, tenant_id: &str) -> Result<Vec<swagbucks_transaction::Model>> {
        SwagBucksTransaction::find()
            .filter(swagbucks_transaction::Column::TenantId.eq(tenant_id))
            .order_by_desc(swagbucks_transaction::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// Recomputes a tenant's totals from the log and compares them with the balance row.
    ///
    /// Drift means an update escaped its transaction; it is logged and reported, and
    /// only rewritten in [`ReconcileMode::Repair`].
    #[instrument(skip(self))]
    pub async fn reconcile(&self, tenant_id: &str, mode: ReconcileMode) -> Result<ReconcileReport> {
        let txn = self.db.begin().await?;

        let entries = SwagBucksTransaction::find()
            .filter(swagbucks_transaction::Column::TenantId.eq(tenant_id))
            .all(&txn)
            .await?;
        let stored_row = SwagBucksBalance::find_by_id(tenant_id.to_string())
            .one(&txn)
            .await?;

        let computed = LedgerTotals::from_log(&entries);
        let stored = stored_row
            .clone()
            .map_or_else(LedgerTotals::default, |row| LedgerBalance::from(row).totals());

        let mut report = ReconcileReport {
            tenant_id: tenant_id.to_string(),
            stored,
            computed,
            repaired: false,
        };

        if report.is_consistent() {
            txn.commit().await?;
            return Ok(report);
        }

        warn!(?stored, ?computed, "SwagBucks balance drifted from its log");

        if mode == ReconcileMode::Repair {
            let now = Utc::now();
            match stored_row {
                Some(row) => {
                    let mut active: swagbucks_balance::ActiveModel = row.into();
                    active.balance = Set(computed.balance);
                    active.total_earned = Set(computed.total_earned);
                    active.total_redeemed = Set(computed.total_redeemed);
                    active.updated_at = Set(now);
                    active.update(&txn).await?;
                }
                None => {
                    swagbucks_balance::ActiveModel {
                        tenant_id: Set(tenant_id.to_string()),
                        balance: Set(computed.balance),
                        total_earned: Set(computed.total_earned),
                        total_redeemed: Set(computed.total_redeemed),
                        updated_at: Set(now),
                        archived_at: Set(None),
                    }
                    .insert(&txn)
                    .await?;
                }
            }
            report.repaired = true;
            info!("SwagBucks balance repaired from log");
        }

        txn.commit().await?;
        Ok(report)
    }

    /// Reconciles every tenant that has a balance row or any log entry.
    pub async fn reconcile_all(&self, mode: ReconcileMode) -> Result<Vec<ReconcileReport>> {
        let mut tenant_ids: BTreeSet<String> = SwagBucksBalance::find()
            .select_only()
            .column(swagbucks_balance::Column::TenantId)
            .into_tuple::<String>()
            .all(&self.db)
            .await?
            .into_iter()
            .collect();
        tenant_ids.extend(
            SwagBucksTransaction::find()
                .select_only()
                .column(swagbucks_transaction::Column::TenantId)
                .distinct()
                .into_tuple::<String>()
                .all(&self.db)
                .await?,
        );

        let mut reports = Vec::with_capacity(tenant_ids.len());
        for tenant_id in tenant_ids {
            reports.push(self.reconcile(&tenant_id, mode).await?);
        }
        Ok(reports)
    }

    /// Freezes a tenant's ledger when the tenant is torn down.
    ///
    /// Balance and log are kept; later credits and debits fail with `TenantArchived`.
    /// Archiving is idempotent, and a tenant without ledger activity gets an archived
    /// zero row so a late order completion cannot open a fresh ledger. Returns `false`
    /// if the ledger was already archived.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn archive(&self, tenant_id: &str, actor: &Actor) -> Result<bool> {
        actor.require("archive SwagBucks ledgers")?;
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let result = SwagBucksBalance::update_many()
            .col_expr(swagbucks_balance::Column::ArchivedAt, Expr::value(Some(now)))
            .col_expr(swagbucks_balance::Column::UpdatedAt, Expr::value(now))
            .filter(swagbucks_balance::Column::TenantId.eq(tenant_id))
            .filter(swagbucks_balance::Column::ArchivedAt.is_null())
            .exec(&txn)
            .await?;

        let archived = if result.rows_affected > 0 {
            true
        } else if SwagBucksBalance::find_by_id(tenant_id.to_string())
            .one(&txn)
            .await?
            .is_some()
        {
            debug!("Ledger already archived");
            false
        } else {
            swagbucks_balance::ActiveModel {
                tenant_id: Set(tenant_id.to_string()),
                balance: Set(0),
                total_earned: Set(0),
                total_redeemed: Set(0),
                updated_at: Set(now),
                archived_at: Set(Some(now)),
            }
            .insert(&txn)
            .await?;
            true
        };

        txn.commit().await?;
        if archived {
            info!("SwagBucks ledger archived");
        }
        Ok(archived)
    }

    /// Reopens an archived ledger, undoing [`Ledger::archive`] for a teardown that did
    /// not complete. A ledger that is not archived is left as it is.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn unarchive(&self, tenant_id: &str, actor: &Actor) -> Result<()> {
        actor.require("archive SwagBucks ledgers")?;
        let result = SwagBucksBalance::update_many()
            .col_expr(
                swagbucks_balance::Column::ArchivedAt,
                Expr::value(Option::<DateTimeUtc>::None),
            )
            .col_expr(swagbucks_balance::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(swagbucks_balance::Column::TenantId.eq(tenant_id))
            .filter(swagbucks_balance::Column::ArchivedAt.is_not_null())
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            info!("SwagBucks ledger reopened");
        }
        Ok(())
    }
}

/// Idempotency key of an earned entry.
#[must_use]
pub fn earn_key(tenant_id: &str, order_id: &str) -> String {
    format!("{tenant_id}:{order_id}")
}

/// Last eight characters of an order id, used in entry descriptions.
fn order_suffix(order_id: &str) -> &str {
    order_id
        .char_indices()
        .rev()
        .nth(7)
        .map_or(order_id, |(i, _)| &order_id[i..])
}

fn entry_model(entry: NewEntry<'_>) -> swagbucks_transaction::ActiveModel {
    let earn_key = match (entry.kind, &entry.order_id) {
        (TransactionKind::Earned, Some(order_id)) => Some(earn_key(entry.tenant_id, order_id)),
        _ => None,
    };

    swagbucks_transaction::ActiveModel {
        id: Set(format!("sb_{}", uuid::Uuid::new_v4().simple())),
        tenant_id: Set(entry.tenant_id.to_string()),
        transaction_type: Set(entry.kind.as_str().to_string()),
        amount: Set(entry.amount),
        description: Set(entry.description),
        order_id: Set(entry.order_id),
        earn_key: Set(earn_key),
        metadata: Set(entry.metadata),
        created_at: Set(Utc::now()),
        created_by: Set(entry.created_by.to_string()),
    }
}

/// Adds `amount` to `balance` and `total_earned`, creating the row on first credit.
async fn apply_credit(txn: &DatabaseTransaction, tenant_id: &str, amount: i64) -> Result<()> {
    let now = Utc::now();
    let result = SwagBucksBalance::update_many()
        .col_expr(
            swagbucks_balance::Column::Balance,
            Expr::col(swagbucks_balance::Column::Balance).add(amount),
        )
        .col_expr(
            swagbucks_balance::Column::TotalEarned,
            Expr::col(swagbucks_balance::Column::TotalEarned).add(amount),
        )
        .col_expr(swagbucks_balance::Column::UpdatedAt, Expr::value(now))
        .filter(swagbucks_balance::Column::TenantId.eq(tenant_id))
        .filter(swagbucks_balance::Column::ArchivedAt.is_null())
        .exec(txn)
        .await?;
    if result.rows_affected > 0 {
        return Ok(());
    }

    if SwagBucksBalance::find_by_id(tenant_id.to_string())
        .one(txn)
        .await?
        .is_some()
    {
        return Err(Error::TenantArchived {
            tenant_id: tenant_id.to_string(),
        });
    }
    swagbucks_balance::ActiveModel {
        tenant_id: Set(tenant_id.to_string()),
        balance: Set(amount),
        total_earned: Set(amount),
        total_redeemed: Set(0),
        updated_at: Set(now),
        archived_at: Set(None),
    }
    .insert(txn)
    .await?;
    Ok(())
}

/// Moves `amount` from `balance` to `total_redeemed` if the balance covers it.
async fn apply_debit(txn: &DatabaseTransaction, tenant_id: &str, amount: i64) -> Result<()> {
    let result = SwagBucksBalance::update_many()
        .col_expr(
            swagbucks_balance::Column::Balance,
            Expr::col(swagbucks_balance::Column::Balance).sub(amount),
        )
        .col_expr(
            swagbucks_balance::Column::TotalRedeemed,
            Expr::col(swagbucks_balance::Column::TotalRedeemed).add(amount),
        )
        .col_expr(swagbucks_balance::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(swagbucks_balance::Column::TenantId.eq(tenant_id))
        .filter(swagbucks_balance::Column::ArchivedAt.is_null())
        .filter(swagbucks_balance::Column::Balance.gte(amount))
        .exec(txn)
        .await?;
    if result.rows_affected > 0 {
        return Ok(());
    }

    match SwagBucksBalance::find_by_id(tenant_id.to_string())
        .one(txn)
        .await?
    {
        Some(row) if row.archived_at.is_some() => Err(Error::TenantArchived {
            tenant_id: tenant_id.to_string(),
        }),
        row => Err(Error::InsufficientBalance {
            balance: row.map_or(0, |row| row.balance),
            requested: amount,
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    async fn assert_balance_identity(ledger: &Ledger, tenant_id: &str) -> Result<()> {
        let balance = ledger.get_balance(tenant_id).await?;
        assert_eq!(
            balance.balance,
            balance.total_earned - balance.total_redeemed
        );
        let report = ledger.reconcile(tenant_id, ReconcileMode::ReportOnly).await?;
        assert!(report.is_consistent(), "drift: {report:?}");
        Ok(())
    }

    #[tokio::test]
    async fn test_record_earn_validation() -> Result<()> {
        let (db, ledger) = setup_ledger().await?;

        let result = ledger
            .record_earn("tenant_a", "order_1", f64::NAN, &Actor::system())
            .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result = ledger
            .record_earn("tenant_a", "order_1", -10.0, &Actor::system())
            .await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result = ledger
            .record_earn("tenant_a", " ", 100.0, &Actor::system())
            .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = ledger
            .record_earn("tenant_a", "order_1", 100.0, &Actor::unauthorized("guest"))
            .await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));

        assert_eq!(SwagBucksTransaction::find().count(&db).await?, 0);
        assert_eq!(SwagBucksBalance::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_redeem_below_minimum_touches_nothing() -> Result<()> {
        let (db, ledger) = setup_ledger().await?;

        let result = ledger
            .redeem("tenant_a", 49, "Jerseys".to_string(), &admin())
            .await;
        assert!(matches!(
            result,
            Err(Error::BelowMinimum {
                amount: 49,
                minimum: 50
            })
        ));

        assert_eq!(SwagBucksTransaction::find().count(&db).await?, 0);
        assert_eq!(SwagBucksBalance::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_earn_formula() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;

        let credited = ledger
            .record_earn("tenant_a", "order_0001", 523.40, &Actor::system())
            .await?;
        assert_eq!(credited, 52);

        let credited = ledger
            .record_earn("tenant_a", "order_0002", 10_000.0, &Actor::system())
            .await?;
        assert_eq!(credited, 500);

        let balance = ledger.get_balance("tenant_a").await?;
        assert_eq!(balance.balance, 552);
        assert_eq!(balance.total_earned, 552);
        assert_eq!(balance.total_redeemed, 0);
        assert_balance_identity(&ledger, "tenant_a").await
    }

    #[tokio::test]
    async fn test_earn_creates_balance_lazily() -> Result<()> {
        let (db, ledger) = setup_ledger().await?;
        assert_eq!(SwagBucksBalance::find().count(&db).await?, 0);

        ledger
            .record_earn("tenant_a", "order_1", 120.0, &Actor::system())
            .await?;

        let row = SwagBucksBalance::find_by_id("tenant_a".to_string())
            .one(&db)
            .await?
            .unwrap();
        assert_eq!(row.balance, 12);
        assert_eq!(row.total_earned, 12);
        assert_eq!(row.total_redeemed, 0);
        assert!(row.archived_at.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_earn_writes_nothing() -> Result<()> {
        let (db, ledger) = setup_ledger().await?;

        let credited = ledger
            .record_earn("tenant_a", "order_small", 9.99, &Actor::system())
            .await?;
        assert_eq!(credited, 0);
        assert_eq!(SwagBucksBalance::find().count(&db).await?, 0);
        assert_eq!(SwagBucksTransaction::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_earn_entry_fields() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        ledger
            .record_earn("tenant_a", "order_ABCDEFGH12345678", 523.40, &Actor::system())
            .await?;

        let entries = ledger.transactions("tenant_a").await?;
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert!(entry.id.starts_with("sb_"));
        assert_eq!(entry.transaction_type, "earned");
        assert_eq!(entry.amount, 52);
        assert_eq!(entry.description, "Earned from order #12345678");
        assert_eq!(entry.order_id.as_deref(), Some("order_ABCDEFGH12345678"));
        assert_eq!(
            entry.earn_key.as_deref(),
            Some("tenant_a:order_ABCDEFGH12345678")
        );
        assert_eq!(entry.metadata.as_ref().unwrap()["orderSubtotal"], 523.4);
        assert_eq!(entry.created_by, "system");
        Ok(())
    }

    #[tokio::test]
    async fn test_record_earn_is_idempotent() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;

        let first = ledger
            .record_earn("tenant_a", "order_1", 523.40, &Actor::system())
            .await?;
        let second = ledger
            .record_earn("tenant_a", "order_1", 523.40, &Actor::system())
            .await?;
        assert_eq!(first, 52);
        assert_eq!(second, 0);

        let balance = ledger.get_balance("tenant_a").await?;
        assert_eq!(balance.balance, 52);
        assert_eq!(ledger.transactions("tenant_a").await?.len(), 1);
        assert_balance_identity(&ledger, "tenant_a").await
    }

    #[tokio::test]
    async fn test_same_order_id_for_different_tenants() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;

        let a = ledger
            .record_earn("tenant_a", "order_1", 200.0, &Actor::system())
            .await?;
        let b = ledger
            .record_earn("tenant_b", "order_1", 200.0, &Actor::system())
            .await?;
        assert_eq!((a, b), (20, 20));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_earn_for_same_order() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        let system = Actor::system();

        let (first, second) = tokio::join!(
            ledger.record_earn("tenant_a", "order_1", 523.40, &system),
            ledger.record_earn("tenant_a", "order_1", 523.40, &system),
        );
        let mut credited = vec![first?, second?];
        credited.sort_unstable();
        assert_eq!(credited, vec![0, 52]);

        assert_eq!(ledger.get_balance("tenant_a").await?.balance, 52);
        assert_eq!(ledger.transactions("tenant_a").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_redemption_boundaries() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        ledger
            .record_earn("tenant_a", "order_1", 1_000.0, &Actor::system())
            .await?;
        assert_eq!(ledger.get_balance("tenant_a").await?.balance, 100);

        let below = ledger
            .redeem("tenant_a", 49, "Socks".to_string(), &admin())
            .await;
        assert!(matches!(below, Err(Error::BelowMinimum { .. })));

        let entry = ledger
            .redeem("tenant_a", 50, "Team jerseys".to_string(), &admin())
            .await?;
        assert_eq!(entry.amount, -50);
        assert_eq!(entry.transaction_type, "redeemed");
        assert_eq!(entry.order_id, None);
        assert_eq!(entry.earn_key, None);

        let balance = ledger.get_balance("tenant_a").await?;
        assert_eq!(balance.balance, 50);
        assert_eq!(balance.total_redeemed, 50);

        let over = ledger
            .redeem("tenant_a", balance.balance + 1, "Bags".to_string(), &admin())
            .await;
        assert!(matches!(
            over,
            Err(Error::InsufficientBalance {
                balance: 50,
                requested: 51
            })
        ));

        assert_eq!(ledger.get_balance("tenant_a").await?.balance, 50);
        assert_balance_identity(&ledger, "tenant_a").await
    }

    #[tokio::test]
    async fn test_redeem_without_ledger_activity() -> Result<()> {
        let (db, ledger) = setup_ledger().await?;
        let result = ledger
            .redeem("tenant_new", 50, "Hats".to_string(), &admin())
            .await;
        assert!(matches!(
            result,
            Err(Error::InsufficientBalance { balance: 0, .. })
        ));
        assert_eq!(SwagBucksTransaction::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_redemptions_never_overdraw() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        ledger
            .record_earn("tenant_a", "order_1", 1_000.0, &Actor::system())
            .await?;
        let admin = admin();

        let (first, second) = tokio::join!(
            ledger.redeem("tenant_a", 60, "Jerseys".to_string(), &admin),
            ledger.redeem("tenant_a", 60, "Pucks".to_string(), &admin),
        );
        let successes = [first.is_ok(), second.is_ok()]
            .into_iter()
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert!(matches!(
            first.err().or(second.err()),
            Some(Error::InsufficientBalance { .. })
        ));

        let balance = ledger.get_balance("tenant_a").await?;
        assert_eq!(balance.balance, 40);
        assert_eq!(balance.total_redeemed, 60);
        assert_balance_identity(&ledger, "tenant_a").await
    }

    #[tokio::test]
    async fn test_get_balance_defaults_without_writing() -> Result<()> {
        let (db, ledger) = setup_ledger().await?;

        let balance = ledger.get_balance("tenant_unknown").await?;
        assert_eq!(balance.totals(), LedgerTotals::default());
        assert!(balance.updated_at.is_none());
        assert!(!balance.archived);
        assert_eq!(SwagBucksBalance::find().count(&db).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_bonus_and_adjustments() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;

        ledger
            .grant_bonus("tenant_a", 25, "Launch bonus".to_string(), &admin())
            .await?;
        ledger
            .adjust("tenant_a", 10, "Goodwill".to_string(), &admin())
            .await?;
        let entry = ledger
            .adjust("tenant_a", -5, "Correction".to_string(), &admin())
            .await?;
        assert_eq!(entry.transaction_type, "adjustment");
        assert_eq!(entry.amount, -5);

        let balance = ledger.get_balance("tenant_a").await?;
        assert_eq!(balance.balance, 30);
        assert_eq!(balance.total_earned, 35);
        assert_eq!(balance.total_redeemed, 5);

        let overdraw = ledger
            .adjust("tenant_a", -31, "Too much".to_string(), &admin())
            .await;
        assert!(matches!(overdraw, Err(Error::InsufficientBalance { .. })));

        let zero = ledger
            .grant_bonus("tenant_a", 0, "Nothing".to_string(), &admin())
            .await;
        assert!(matches!(zero, Err(Error::InvalidAmount { .. })));

        assert_balance_identity(&ledger, "tenant_a").await
    }

    #[tokio::test]
    async fn test_transactions_newest_first() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        ledger
            .record_earn("tenant_a", "order_1", 1_000.0, &Actor::system())
            .await?;
        ledger
            .redeem("tenant_a", 50, "Jerseys".to_string(), &admin())
            .await?;

        let entries = ledger.transactions("tenant_a").await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].transaction_type, "redeemed");
        assert_eq!(entries[1].transaction_type, "earned");
        assert!(ledger.transactions("tenant_b").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_reports_drift_without_repairing() -> Result<()> {
        let (db, ledger) = setup_ledger().await?;
        ledger
            .record_earn("tenant_a", "order_1", 1_000.0, &Actor::system())
            .await?;

        // Simulate a balance write that escaped its transaction
        SwagBucksBalance::update_many()
            .col_expr(swagbucks_balance::Column::Balance, Expr::value(999_i64))
            .filter(swagbucks_balance::Column::TenantId.eq("tenant_a"))
            .exec(&db)
            .await?;

        let report = ledger.reconcile("tenant_a", ReconcileMode::ReportOnly).await?;
        assert!(!report.is_consistent());
        assert!(!report.repaired);
        assert_eq!(report.stored.balance, 999);
        assert_eq!(report.computed.balance, 100);
        assert_eq!(ledger.get_balance("tenant_a").await?.balance, 999);

        let report = ledger.reconcile("tenant_a", ReconcileMode::Repair).await?;
        assert!(report.repaired);
        assert_eq!(ledger.get_balance("tenant_a").await?.balance, 100);
        assert_balance_identity(&ledger, "tenant_a").await
    }

    #[tokio::test]
    async fn test_reconcile_repairs_missing_balance_row() -> Result<()> {
        let (db, ledger) = setup_ledger().await?;
        ledger
            .record_earn("tenant_a", "order_1", 1_000.0, &Actor::system())
            .await?;
        SwagBucksBalance::delete_by_id("tenant_a".to_string())
            .exec(&db)
            .await?;

        let reports = ledger.reconcile_all(ReconcileMode::Repair).await?;
        assert_eq!(reports.len(), 1);
        assert!(reports[0].repaired);
        assert_eq!(reports[0].stored, LedgerTotals::default());
        assert_eq!(ledger.get_balance("tenant_a").await?.balance, 100);
        Ok(())
    }

    #[tokio::test]
    async fn test_archived_ledger_is_frozen() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        ledger
            .record_earn("tenant_a", "order_1", 1_000.0, &Actor::system())
            .await?;

        assert!(ledger.archive("tenant_a", &admin()).await?);
        assert!(!ledger.archive("tenant_a", &admin()).await?);

        let balance = ledger.get_balance("tenant_a").await?;
        assert!(balance.archived);
        assert_eq!(balance.balance, 100);

        let earn = ledger
            .record_earn("tenant_a", "order_2", 1_000.0, &Actor::system())
            .await;
        assert!(matches!(earn, Err(Error::TenantArchived { .. })));
        let redeem = ledger
            .redeem("tenant_a", 50, "Jerseys".to_string(), &admin())
            .await;
        assert!(matches!(redeem, Err(Error::TenantArchived { .. })));

        // The rejected earn left no log entry behind
        assert_eq!(ledger.transactions("tenant_a").await?.len(), 1);
        assert_balance_identity(&ledger, "tenant_a").await
    }

    #[tokio::test]
    async fn test_archive_without_activity_blocks_new_ledger() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        assert!(ledger.archive("tenant_gone", &admin()).await?);

        let earn = ledger
            .record_earn("tenant_gone", "order_1", 500.0, &Actor::system())
            .await;
        assert!(matches!(earn, Err(Error::TenantArchived { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_unarchive_reopens_ledger() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        ledger
            .record_earn("tenant_a", "order_1", 1_000.0, &Actor::system())
            .await?;
        ledger.archive("tenant_a", &admin()).await?;

        let guest = ledger.unarchive("tenant_a", &Actor::unauthorized("guest")).await;
        assert!(matches!(guest, Err(Error::Unauthorized { .. })));
        assert!(ledger.get_balance("tenant_a").await?.archived);

        ledger.unarchive("tenant_a", &admin()).await?;
        ledger.unarchive("tenant_a", &admin()).await?;
        assert!(!ledger.get_balance("tenant_a").await?.archived);

        ledger
            .record_earn("tenant_a", "order_2", 1_000.0, &Actor::system())
            .await?;
        assert_eq!(ledger.get_balance("tenant_a").await?.balance, 200);
        assert_balance_identity(&ledger, "tenant_a").await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemptions_on_shared_file() -> Result<()> {
        let file_db = TestFileDb::open(5).await?;
        let ledger = Ledger::new(file_db.db.clone(), RewardPolicy::default());
        ledger
            .grant_bonus("tenant_a", 100_000, "Launch promo".to_string(), &admin())
            .await?;

        let mut handles = Vec::new();
        for i in 0..16 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .redeem("tenant_a", 50, format!("Order {i}"), &admin())
                    .await
            }));
        }

        let mut redeemed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => redeemed += 50,
                Err(err) => assert!(err.is_retryable(), "permanent failure: {err:?}"),
            }
        }

        let balance = ledger.get_balance("tenant_a").await?;
        assert_eq!(balance.total_redeemed, redeemed);
        assert_eq!(balance.balance, 100_000 - redeemed);
        assert_balance_identity(&ledger, "tenant_a").await
    }

    #[tokio::test]
    async fn test_all_balances() -> Result<()> {
        let (_db, ledger) = setup_ledger().await?;
        ledger
            .record_earn("tenant_a", "order_1", 200.0, &Actor::system())
            .await?;
        ledger
            .record_earn("tenant_b", "order_2", 900.0, &Actor::system())
            .await?;

        let balances = ledger.all_balances().await?;
        let ids: Vec<&str> = balances.iter().map(|b| b.tenant_id.as_str()).collect();
        assert_eq!(ids, vec!["tenant_b", "tenant_a"]);
        Ok(())
    }

    #[test]
    fn test_transaction_kind_parsing() {
        for kind in [
            TransactionKind::Earned,
            TransactionKind::Redeemed,
            TransactionKind::Adjustment,
            TransactionKind::Bonus,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!("refund".parse::<TransactionKind>().is_err());
    }

    #[test]
    fn test_order_suffix() {
        assert_eq!(order_suffix("order_ABCDEFGH12345678"), "12345678");
        assert_eq!(order_suffix("short"), "short");
        assert_eq!(order_suffix("12345678"), "12345678");
    }
}
