/// Calling identity and the admin capability check
pub mod actor;
/// SwagBucks balances and the append-only transaction log
pub mod ledger;
/// Tenant state machine over a pluggable tenant store
pub mod lifecycle;
/// Earning rate, per-order cap and redemption minimum
pub mod rewards;
/// Tenant statuses, intake records, approval overrides and invariants
pub mod tenant;
/// Default storefront generated at approval
pub mod website;

pub use actor::Actor;
pub use ledger::{Ledger, LedgerBalance, ReconcileMode, ReconcileReport, TransactionKind};
pub use lifecycle::TenantLifecycle;
pub use rewards::RewardPolicy;
pub use tenant::{StoreRequest, TenantOverrides, TenantStatus};
