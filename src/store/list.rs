//! List-shaped tenant store: one list per status, entries are JSON-encoded tenants.
//!
//! The list primitives cannot move an element atomically, so a transition is a
//! sequence: read the source list, write an intent record to the journal, rewrite the
//! source without the tenant, append the rewritten tenant to the destination, drop the
//! intent record. The destination append is the commit point.
//!
//! Within one process the sequence is serialized by a single-writer lock per list key,
//! always taken in key order. If the sequence stops part way (a failed call, a crash),
//! the intent record survives and [`ListTenantStore::recover`] finishes or undoes the
//! move. Every mutating call runs recovery first when it finds an intent record left
//! behind.

use crate::{
    core::tenant::{TenantStatus, check_invariants, status_of},
    entities::tenant,
    errors::{Error, Result},
    store::{ListQueue, TenantStore, document::check_rewrite},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, instrument, warn};

/// List holding pending tenants.
pub const PENDING_LIST: &str = "pending_tenants";
/// List holding active tenants.
pub const APPROVED_LIST: &str = "approved_tenants";
/// List holding declined tenants.
pub const DECLINED_LIST: &str = "declined_tenants";
/// Intent records of in-flight transitions.
pub const JOURNAL_LIST: &str = "tenant_transitions";

/// List key of a status partition.
#[must_use]
pub const fn list_key(status: TenantStatus) -> &'static str {
    match status {
        TenantStatus::Pending => PENDING_LIST,
        TenantStatus::Active => APPROVED_LIST,
        TenantStatus::Declined => DECLINED_LIST,
    }
}

/// Intent record written before the source list is rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    tenant_id: String,
    source: String,
    /// `None` for a removal
    destination: Option<String>,
    original: tenant::Model,
    /// Raw source entries other than the tenant, as read before the rewrite
    remaining: Vec<String>,
}

/// What a recovery sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Intent records found
    pub journal_entries: usize,
    /// Moves that had reached the destination and were completed
    pub rolled_forward: usize,
    /// Moves that had not reached the destination and were undone
    pub rolled_back: usize,
    /// Source entries put back after an interrupted rewrite
    pub restored_entries: usize,
    /// Entries dropped because the tenant was stored more than once
    pub duplicates_removed: usize,
}

impl RecoveryReport {
    /// True when the sweep changed nothing.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.journal_entries == 0 && self.restored_entries == 0 && self.duplicates_removed == 0
    }
}

#[derive(Debug, Default)]
struct ListLocks {
    pending: Mutex<()>,
    approved: Mutex<()>,
    declined: Mutex<()>,
    journal: Mutex<()>,
}

impl ListLocks {
    fn for_key(&self, key: &str) -> &Mutex<()> {
        match key {
            PENDING_LIST => &self.pending,
            APPROVED_LIST => &self.approved,
            DECLINED_LIST => &self.declined,
            _ => &self.journal,
        }
    }
}

/// [`TenantStore`] over a [`ListQueue`].
pub struct ListTenantStore<Q> {
    queue: Q,
    locks: ListLocks,
}

fn decode(raw: &str) -> Result<tenant::Model> {
    Ok(serde_json::from_str(raw)?)
}

fn encode(tenant: &tenant::Model) -> Result<String> {
    Ok(serde_json::to_string(tenant)?)
}

impl<Q: ListQueue> ListTenantStore<Q> {
    /// Creates a store over `queue`. Call [`Self::recover`] before serving traffic.
    pub fn new(queue: Q) -> Self {
        Self {
            queue,
            locks: ListLocks::default(),
        }
    }

    /// The underlying queue.
    pub const fn queue(&self) -> &Q {
        &self.queue
    }

    async fn lock_keys(&self, keys: &[&'static str]) -> Vec<MutexGuard<'_, ()>> {
        let ordered: BTreeSet<&'static str> = keys.iter().copied().collect();
        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            guards.push(self.locks.for_key(key).lock().await);
        }
        guards
    }

    async fn decode_list(&self, key: &str) -> Result<Vec<(String, tenant::Model)>> {
        self.queue
            .range(key)
            .await?
            .into_iter()
            .map(|raw| decode(&raw).map(|tenant| (raw, tenant)))
            .collect()
    }

    async fn rewrite(&self, key: &str, entries: Vec<String>) -> Result<()> {
        self.queue.clear(key).await?;
        self.queue.push(key, entries).await
    }

    /// Fails with `Conflict` if another tenant already holds `tenant`'s slug or subdomain.
    async fn ensure_address_free(&self, tenant: &tenant::Model) -> Result<()> {
        for status in TenantStatus::ALL {
            for (_, other) in self.decode_list(list_key(status)).await? {
                if other.id == tenant.id {
                    continue;
                }
                let message = if other.slug == tenant.slug {
                    format!("Slug {} is already taken", tenant.slug)
                } else if other.subdomain == tenant.subdomain {
                    format!("Subdomain {} is already taken", tenant.subdomain)
                } else {
                    continue;
                };
                return Err(Error::Conflict { message });
            }
        }
        Ok(())
    }

    /// Runs recovery if an earlier sequence left an intent record behind.
    async fn recover_if_needed(&self) -> Result<()> {
        if !self.queue.range(JOURNAL_LIST).await?.is_empty() {
            warn!("Found interrupted tenant transition, recovering");
            self.recover().await?;
        }
        Ok(())
    }

    async fn ensure_journal_empty(&self) -> Result<()> {
        if self.queue.range(JOURNAL_LIST).await?.is_empty() {
            Ok(())
        } else {
            Err(Error::Conflict {
                message: "an interrupted tenant transition is awaiting recovery".to_string(),
            })
        }
    }

    /// Shared body of `transition` and `remove`; expects the locks to be held.
    async fn move_entry(
        &self,
        tenant_id: &str,
        from: TenantStatus,
        next: Option<(TenantStatus, tenant::Model)>,
        entries: Vec<(String, tenant::Model)>,
        original: tenant::Model,
    ) -> Result<()> {
        let source = list_key(from);
        let remaining: Vec<String> = entries
            .into_iter()
            .filter(|(_, t)| t.id != tenant_id)
            .map(|(raw, _)| raw)
            .collect();

        let intent = JournalEntry {
            tenant_id: tenant_id.to_string(),
            source: source.to_string(),
            destination: next.as_ref().map(|(to, _)| list_key(*to).to_string()),
            original,
            remaining: remaining.clone(),
        };
        self.queue
            .push(JOURNAL_LIST, vec![serde_json::to_string(&intent)?])
            .await?;

        self.rewrite(source, remaining).await?;
        if let Some((to, record)) = next {
            self.queue.push(list_key(to), vec![encode(&record)?]).await?;
        }
        self.queue.clear(JOURNAL_LIST).await
    }

    /// Replays intent records and removes duplicate entries.
    ///
    /// A move whose tenant already sits in the destination is completed by dropping it
    /// from the source; any other move is undone by putting the original back.
    /// A removal counts as done once the tenant has left the source, so a tenant that is
    /// still listed stays where it is. Source entries lost by an interrupted rewrite are
    /// restored. Finally a tenant found in pending and also in approved or declined is
    /// dropped from pending, and repeated ids within one list are collapsed.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<RecoveryReport> {
        let _guards = self
            .lock_keys(&[PENDING_LIST, APPROVED_LIST, DECLINED_LIST, JOURNAL_LIST])
            .await;
        let mut report = RecoveryReport::default();

        let journal = self.queue.range(JOURNAL_LIST).await?;
        report.journal_entries = journal.len();

        for raw in journal {
            let intent: JournalEntry = serde_json::from_str(&raw)?;
            self.replay(&intent, &mut report).await?;
        }
        if report.journal_entries > 0 {
            self.queue.clear(JOURNAL_LIST).await?;
        }

        self.sweep_duplicates(&mut report).await?;

        if report.is_clean() {
            info!("Tenant lists consistent");
        } else {
            warn!(?report, "Tenant lists repaired");
        }
        Ok(report)
    }

    async fn replay(&self, intent: &JournalEntry, report: &mut RecoveryReport) -> Result<()> {
        let source = self.decode_list(&intent.source).await?;
        let present: HashSet<String> = source.iter().map(|(_, t)| t.id.clone()).collect();

        let committed = match &intent.destination {
            Some(destination) => self
                .decode_list(destination)
                .await?
                .iter()
                .any(|(_, t)| t.id == intent.tenant_id),
            None => !present.contains(&intent.tenant_id),
        };
        let mut entries: Vec<String> = source
            .into_iter()
            .filter(|(_, t)| !committed || t.id != intent.tenant_id)
            .map(|(raw, _)| raw)
            .collect();
        let mut changed = committed && present.contains(&intent.tenant_id);

        if committed {
            report.rolled_forward += 1;
        } else {
            report.rolled_back += 1;
            if !present.contains(&intent.tenant_id) {
                entries.push(encode(&intent.original)?);
                changed = true;
            }
        }

        for raw in &intent.remaining {
            let id = decode(raw)?.id;
            if !present.contains(&id) {
                entries.push(raw.clone());
                report.restored_entries += 1;
                changed = true;
            }
        }

        if changed {
            self.rewrite(&intent.source, entries).await?;
        }
        Ok(())
    }

    async fn sweep_duplicates(&self, report: &mut RecoveryReport) -> Result<()> {
        let mut settled: HashSet<String> = HashSet::new();
        for key in [APPROVED_LIST, DECLINED_LIST, PENDING_LIST] {
            let entries = self.decode_list(key).await?;
            let before = entries.len();
            let mut seen: HashSet<String> = HashSet::new();
            let kept: Vec<(String, tenant::Model)> = entries
                .into_iter()
                .filter(|(_, t)| {
                    let fresh = seen.insert(t.id.clone());
                    fresh && !(key == PENDING_LIST && settled.contains(&t.id))
                })
                .collect();

            if kept.len() != before {
                report.duplicates_removed += before - kept.len();
                self.rewrite(key, kept.iter().map(|(raw, _)| raw.clone()).collect())
                    .await?;
            }
            if key != PENDING_LIST {
                settled.extend(kept.into_iter().map(|(_, t)| t.id));
            }
        }
        Ok(())
    }
}

impl<Q: ListQueue> TenantStore for ListTenantStore<Q> {
    async fn get(&self, tenant_id: &str) -> Result<Option<tenant::Model>> {
        for status in TenantStatus::ALL {
            let found = self
                .decode_list(list_key(status))
                .await?
                .into_iter()
                .map(|(_, t)| t)
                .find(|t| t.id == tenant_id);
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    async fn list(&self, status: TenantStatus) -> Result<Vec<tenant::Model>> {
        Ok(self
            .decode_list(list_key(status))
            .await?
            .into_iter()
            .map(|(_, t)| t)
            .collect())
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.id))]
    async fn insert_pending(&self, tenant: tenant::Model) -> Result<tenant::Model> {
        if status_of(&tenant)? != TenantStatus::Pending {
            return Err(Error::Validation {
                message: format!("New tenant {} must be pending", tenant.id),
            });
        }
        check_invariants(&tenant)?;

        self.recover_if_needed().await?;
        let _guards = self
            .lock_keys(&[PENDING_LIST, APPROVED_LIST, DECLINED_LIST])
            .await;

        if self.get(&tenant.id).await?.is_some() {
            return Err(Error::Conflict {
                message: format!("Tenant {} already exists", tenant.id),
            });
        }
        self.ensure_address_free(&tenant).await?;

        self.queue.push(PENDING_LIST, vec![encode(&tenant)?]).await?;
        info!(slug = %tenant.slug, "Pending tenant stored");
        Ok(tenant)
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
        self.recover_if_needed().await?;
        let _guards = self
            .lock_keys(&[list_key(from), list_key(to), JOURNAL_LIST])
            .await;
        self.ensure_journal_empty().await?;

        let entries = self.decode_list(list_key(from)).await?;
        let original = entries
            .iter()
            .map(|(_, t)| t)
            .find(|t| t.id == tenant_id)
            .cloned()
            .ok_or_else(|| Error::not_found(tenant_id, from.as_str()))?;

        let next = apply(original.clone())?;
        check_rewrite(tenant_id, to, &next)?;

        if next.slug != original.slug || next.subdomain != original.subdomain {
            self.ensure_address_free(&next).await?;
        }
        if from != to
            && self
                .decode_list(list_key(to))
                .await?
                .iter()
                .any(|(_, t)| t.id == tenant_id)
        {
            return Err(Error::Conflict {
                message: format!("Tenant {tenant_id} is already stored in {to}"),
            });
        }

        self.move_entry(tenant_id, from, Some((to, next.clone())), entries, original)
            .await?;
        info!("Tenant moved from {from} to {to}");
        Ok(next)
    }

    #[instrument(skip(self))]
    async fn remove(&self, tenant_id: &str, from: TenantStatus) -> Result<()> {
        self.recover_if_needed().await?;
        let _guards = self.lock_keys(&[list_key(from), JOURNAL_LIST]).await;
        self.ensure_journal_empty().await?;

        let entries = self.decode_list(list_key(from)).await?;
        let original = entries
            .iter()
            .map(|(_, t)| t)
            .find(|t| t.id == tenant_id)
            .cloned()
            .ok_or_else(|| Error::not_found(tenant_id, from.as_str()))?;

        self.move_entry(tenant_id, from, None, entries, original)
            .await?;
        info!("Tenant removed from {from}");
        Ok(())
    }
}
