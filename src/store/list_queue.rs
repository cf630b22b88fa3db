//! Ordered string lists keyed by name.
//!
//! The primitive set is deliberately small: read a whole list, append values, clear a
//! list. There is no delete-by-content, so removing one element means reading the
//! list, clearing it and pushing back the rest. Every call is independent; callers that
//! need several calls to look atomic must coordinate themselves.

use crate::{
    entities::{ListEntry, ListEntryColumn, list_entry},
    errors::Result,
};
use sea_orm::{QueryOrder, Set, prelude::*};
use std::future::Future;

/// A keyed collection of ordered string lists.
pub trait ListQueue: Send + Sync {
    /// Every value of `key`, in insertion order. Missing lists are empty.
    fn range(&self, key: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Appends `values` to the end of `key`.
    fn push(&self, key: &str, values: Vec<String>) -> impl Future<Output = Result<()>> + Send;

    /// Removes every value of `key`.
    fn clear(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// [`ListQueue`] backed by the `list_entries` table.
#[derive(Debug, Clone)]
pub struct SqlListQueue {
    db: DatabaseConnection,
}

impl SqlListQueue {
    /// Creates a queue over `db`.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl ListQueue for SqlListQueue {
    async fn range(&self, key: &str) -> Result<Vec<String>> {
        Ok(ListEntry::find()
            .filter(ListEntryColumn::ListKey.eq(key))
            .order_by_asc(ListEntryColumn::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|entry| entry.value)
            .collect())
    }

    async fn push(&self, key: &str, values: Vec<String>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let rows = values.into_iter().map(|value| list_entry::ActiveModel {
            list_key: Set(key.to_string()),
            value: Set(value),
            ..Default::default()
        });
        ListEntry::insert_many(rows).exec(&self.db).await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        ListEntry::delete_many()
            .filter(ListEntryColumn::ListKey.eq(key))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}
