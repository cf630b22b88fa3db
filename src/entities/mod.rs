//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables backing the tenant stores and the
//! SwagBucks ledger. Each entity has a Model struct for data and an Entity struct for operations.

pub mod list_entry;
pub mod swagbucks_balance;
pub mod swagbucks_transaction;
pub mod tenant;

// Re-export specific types to avoid conflicts
pub use list_entry::{Column as ListEntryColumn, Entity as ListEntry, Model as ListEntryModel};
pub use swagbucks_balance::{
    Column as SwagBucksBalanceColumn, Entity as SwagBucksBalance, Model as SwagBucksBalanceModel,
};
pub use swagbucks_transaction::{
    Column as SwagBucksTransactionColumn, Entity as SwagBucksTransaction,
    Model as SwagBucksTransactionModel,
};
pub use tenant::{Column as TenantColumn, Entity as Tenant, Model as TenantModel};
