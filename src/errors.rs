//! Unified error types for tenant lifecycle and ledger operations.
//!
//! Every failure is scoped to a single request. [`Error::is_retryable`] tells callers
//! whether a failed unit of work may be attempted again; a failed unit never leaves
//! partial state committed.

use sea_orm::{DbErr, RuntimeErr, SqlErr, sqlx};
use thiserror::Error;

/// Errors produced by the swagstore core.
#[derive(Debug, Error)]
pub enum Error {
    /// The tenant is not in the state the operation requires (or does not exist).
    #[error("Tenant {tenant_id} not found in {expected}")]
    NotFound {
        /// Tenant the operation targeted
        tenant_id: String,
        /// Partition the tenant was expected in
        expected: String,
    },

    /// A concurrent writer changed the same record before this one committed.
    #[error("Conflicting update: {message}")]
    Conflict {
        /// Description of the collision
        message: String,
    },

    /// Redemption larger than the balance read inside the transaction.
    #[error("Insufficient SwagBucks: balance {balance}, requested {requested}")]
    InsufficientBalance {
        /// Balance at the time of the check
        balance: i64,
        /// Amount the caller tried to debit
        requested: i64,
    },

    /// Redemption smaller than the configured minimum.
    #[error("Redemption of {amount} is below the minimum of {minimum}")]
    BelowMinimum {
        /// Requested amount
        amount: i64,
        /// Configured minimum redemption
        minimum: i64,
    },

    /// The store could not be reached or a connection could not be acquired in time.
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Underlying failure
        message: String,
    },

    /// The calling actor failed the admin capability check.
    #[error("Actor {actor} is not authorized to {action}")]
    Unauthorized {
        /// Actor id
        actor: String,
        /// Operation that was refused
        action: String,
    },

    /// A numeric input was negative, zero where not allowed, or not finite.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// Offending value
        amount: f64,
    },

    /// The tenant's ledger was archived when the tenant was torn down.
    #[error("SwagBucks ledger for tenant {tenant_id} is archived")]
    TenantArchived {
        /// Tenant whose ledger is archived
        tenant_id: String,
    },

    /// Input failed a domain rule.
    #[error("Validation error: {message}")]
    Validation {
        /// What was wrong
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(DbErr),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O failure outside the database.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Builds a [`Error::NotFound`] for a tenant expected in `expected`.
    pub fn not_found(tenant_id: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::NotFound {
            tenant_id: tenant_id.into(),
            expected: expected.into(),
        }
    }

    /// Whether the failed unit of work may be retried.
    ///
    /// `Conflict` is safe to retry once, `StoreUnavailable` with backoff. Validation
    /// failures and `NotFound` (another actor already acted) are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::StoreUnavailable { .. })
    }
}

/// Primary SQLite result codes for a database held by another writer.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Whether `err` is SQLite reporting `SQLITE_BUSY`/`SQLITE_LOCKED` or one of their
/// extended codes (e.g. 517, busy snapshot). The losing unit wrote nothing.
fn is_store_busy(err: &DbErr) -> bool {
    let (DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
    | DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(e)))
    | DbErr::Conn(RuntimeErr::SqlxError(sqlx::Error::Database(e)))) = err
    else {
        return false;
    };
    e.code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
            return Self::Conflict { message };
        }
        if is_store_busy(&err) {
            return Self::Conflict {
                message: format!("Store busy: {err}"),
            };
        }
        match err {
            DbErr::ConnectionAcquire(e) => Self::StoreUnavailable {
                message: e.to_string(),
            },
            DbErr::Conn(e) => Self::StoreUnavailable {
                message: e.to_string(),
            },
            other => Self::Database(other),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]
    use super::*;
    use crate::{
        entities::{ListEntry, list_entry},
        test_utils::TestFileDb,
    };
    use sea_orm::{EntityTrait, Set, TransactionTrait};

    #[test]
    fn test_retry_classification() {
        assert!(
            Error::Conflict {
                message: "dup".to_string()
            }
            .is_retryable()
        );
        assert!(
            Error::StoreUnavailable {
                message: "timeout".to_string()
            }
            .is_retryable()
        );
        assert!(!Error::not_found("t1", "pending").is_retryable());
        assert!(
            !Error::BelowMinimum {
                amount: 49,
                minimum: 50
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("tenant_1", "pending");
        assert_eq!(err.to_string(), "Tenant tenant_1 not found in pending");
    }

    #[test]
    fn test_custom_db_error_maps_to_database() {
        let err: Error = DbErr::Custom("boom".to_string()).into();
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_retryable());

        let err: Error =
            DbErr::Exec(RuntimeErr::Internal("database is locked".to_string())).into();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn test_lock_upgrade_deadlock_is_retryable_conflict() -> Result<()> {
        let file_db = TestFileDb::open(2).await?;
        let first = file_db.db.begin().await?;
        let second = file_db.db.begin().await?;

        // Both transactions read, so both hold the shared lock
        ListEntry::find().all(&first).await?;
        ListEntry::find().all(&second).await?;

        let entry = |value: &str| list_entry::ActiveModel {
            list_key: Set("pending_tenants".to_string()),
            value: Set(value.to_string()),
            ..Default::default()
        };
        ListEntry::insert(entry("a")).exec(&first).await?;
        let err: Error = ListEntry::insert(entry("b"))
            .exec(&second)
            .await
            .map(|_| ())
            .map_err(Error::from)
            .expect_err("second writer must be refused the lock");

        assert!(matches!(err, Error::Conflict { .. }), "{err:?}");
        assert!(err.is_retryable());

        second.rollback().await?;
        first.commit().await?;
        assert_eq!(ListEntry::find().all(&file_db.db).await?.len(), 1);
        Ok(())
    }
}
