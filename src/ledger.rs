//! Account ledger: per-member point balances and per-cycle pairing history.
//!
//! The ledger is the sole mutator of account state. Every read path goes
//! through [`Ledger::get_or_create`], which lazily rolls an account into the
//! current cycle before returning it, so `cycle_reset_at` is never stale
//! relative to "now" — accounts are corrected one by one as they are
//! touched, independently of the announcement scheduler observing the same
//! boundary.

use crate::error::{PairError, Result};
use crate::resets::ResetCycle;
use crate::storage::AccountStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{error, info};

/// One member's persisted state. Created lazily on first touch, never
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Point balance.
    pub points: u64,
    /// Instant at which the per-cycle history expires. Always a boundary
    /// computed by the reset clock.
    pub cycle_reset_at: DateTime<Utc>,
    /// Members successfully paired with since `cycle_reset_at` was last set.
    pub paired_this_cycle: BTreeSet<String>,
}

impl Account {
    /// Zero-balance account whose history expires at the given boundary.
    #[must_use]
    pub fn fresh(cycle_reset_at: DateTime<Utc>) -> Self {
        Self {
            points: 0,
            cycle_reset_at,
            paired_this_cycle: BTreeSet::new(),
        }
    }
}

/// In-memory account table plus its injected persistence collaborator.
pub struct Ledger {
    accounts: HashMap<String, Account>,
    store: Box<dyn AccountStore>,
    cycle: ResetCycle,
}

impl Ledger {
    /// Create an empty ledger. Call [`load`](Self::load) before use.
    #[must_use]
    pub fn new(store: Box<dyn AccountStore>, cycle: ResetCycle) -> Self {
        Self {
            accounts: HashMap::new(),
            store,
            cycle,
        }
    }

    /// Stream all persisted accounts into memory. Must complete before any
    /// other component runs; a store error here is fatal — the process
    /// cannot start with a partially loaded ledger.
    ///
    /// # Errors
    ///
    /// Propagates [`PairError::Storage`] from the store.
    pub async fn load(&mut self) -> Result<()> {
        let entries = self.store.load_all().await?;
        self.accounts = entries.into_iter().collect();
        info!(
            accounts = self.accounts.len(),
            total = self.total_baked(),
            "ledger loaded"
        );
        Ok(())
    }

    /// Existing account for `id`, or a fresh zero-balance one. Rolls the
    /// account into the current cycle first (clearing `paired_this_cycle`)
    /// if its boundary has passed.
    pub fn get_or_create(&mut self, id: &str) -> &Account {
        self.entry_at(id, Utc::now())
    }

    /// Whether `inviter` has already paired with `other` in the current
    /// cycle.
    pub fn has_paired_this_cycle(&mut self, inviter: &str, other: &str) -> bool {
        self.has_paired_at(inviter, other, Utc::now())
    }

    pub(crate) fn has_paired_at(&mut self, inviter: &str, other: &str, now: DateTime<Utc>) -> bool {
        self.entry_at(inviter, now).paired_this_cycle.contains(other)
    }

    /// Record a successful pairing: both accounts gain one point and each
    /// other's id in their cycle history, persisted as one atomic batch.
    ///
    /// Returns the new cumulative total. On a storage failure the in-memory
    /// mutation is rolled back before the error is returned — a failed
    /// commit never leaves the pair marked as paired.
    ///
    /// # Errors
    ///
    /// Returns [`PairError::Storage`] when the commit fails.
    pub async fn record_pair(&mut self, id_a: &str, id_b: &str) -> Result<u64> {
        self.record_pair_at(id_a, id_b, Utc::now()).await
    }

    pub(crate) async fn record_pair_at(
        &mut self,
        id_a: &str,
        id_b: &str,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        debug_assert_ne!(id_a, id_b, "self-pairing must be rejected upstream");

        let before_a = self.entry_at(id_a, now).clone();
        let before_b = self.entry_at(id_b, now).clone();

        self.apply_pair_half(id_a, id_b, now);
        self.apply_pair_half(id_b, id_a, now);

        if let Err(err) = self.commit(&[id_a, id_b]).await {
            self.accounts.insert(id_a.to_owned(), before_a);
            self.accounts.insert(id_b.to_owned(), before_b);
            return Err(err);
        }

        Ok(self.total_baked())
    }

    /// Persist the current in-memory state of the given accounts: a single
    /// write for one id, an atomic batch for several.
    ///
    /// # Errors
    ///
    /// [`PairError::AccountNotFound`] if an id was never created through
    /// the ledger (programmer error), [`PairError::Storage`] on a failed
    /// write.
    pub async fn commit(&self, ids: &[&str]) -> Result<()> {
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            match self.accounts.get(*id) {
                Some(account) => entries.push(((*id).to_owned(), account.clone())),
                None => {
                    error!(member = id, "commit requested for unknown account");
                    return Err(PairError::AccountNotFound((*id).to_owned()));
                }
            }
        }

        match entries.as_slice() {
            [] => Ok(()),
            [(id, account)] => self.store.put_one(id, account).await,
            _ => self.store.put_many(&entries).await,
        }
    }

    /// Sum of all account balances, recomputed from the full table on
    /// demand so partial failures can never leave a drifted total.
    #[must_use]
    pub fn total_baked(&self) -> u64 {
        self.accounts.values().map(|account| account.points).sum()
    }

    /// `(id, points)` for every account, for reporting.
    #[must_use]
    pub fn list_accounts(&self) -> Vec<(String, u64)> {
        self.accounts
            .iter()
            .map(|(id, account)| (id.clone(), account.points))
            .collect()
    }

    /// The reset cycle this ledger rolls accounts against.
    #[must_use]
    pub fn cycle(&self) -> ResetCycle {
        self.cycle
    }

    pub(crate) fn entry_at(&mut self, id: &str, now: DateTime<Utc>) -> &mut Account {
        let cycle = self.cycle;
        let account = self
            .accounts
            .entry(id.to_owned())
            .or_insert_with(|| Account::fresh(cycle.next_boundary(now)));

        if now >= account.cycle_reset_at {
            account.cycle_reset_at = cycle.next_boundary(now);
            account.paired_this_cycle.clear();
        }
        account
    }

    fn apply_pair_half(&mut self, id: &str, partner: &str, now: DateTime<Utc>) {
        let account = self.entry_at(id, now);
        account.points += 1;
        account.paired_this_cycle.insert(partner.to_owned());
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid RFC 3339 timestamp")
    }

    fn weekly_cycle() -> ResetCycle {
        ResetCycle::new(at("2024-01-01T00:00:00Z"), 604_800)
    }

    fn ledger_with_store() -> (Ledger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(Box::new(SharedStore(Arc::clone(&store))), weekly_cycle());
        (ledger, store)
    }

    // Test shim so assertions can inspect the store the ledger owns.
    struct SharedStore(Arc<MemoryStore>);

    #[async_trait::async_trait]
    impl AccountStore for SharedStore {
        async fn load_all(&self) -> Result<Vec<(String, Account)>> {
            self.0.load_all().await
        }
        async fn put_one(&self, id: &str, account: &Account) -> Result<()> {
            self.0.put_one(id, account).await
        }
        async fn put_many(&self, entries: &[(String, Account)]) -> Result<()> {
            self.0.put_many(entries).await
        }
    }

    #[test]
    fn fresh_account_points_at_the_coming_boundary() {
        let (mut ledger, _store) = ledger_with_store();
        let account = ledger.entry_at("u1", at("2024-01-10T00:00:00Z"));
        assert_eq!(account.points, 0);
        assert_eq!(account.cycle_reset_at, at("2024-01-15T00:00:00Z"));
        assert!(account.paired_this_cycle.is_empty());
    }

    #[test]
    fn rollover_clears_history_and_is_idempotent() {
        let (mut ledger, _store) = ledger_with_store();

        let account = ledger.entry_at("u1", at("2024-01-10T00:00:00Z"));
        account.paired_this_cycle.insert("u2".to_owned());
        account.points = 4;

        // Boundary passed: history clears, points survive.
        let rolled = ledger.entry_at("u1", at("2024-01-16T00:00:00Z")).clone();
        assert_eq!(rolled.points, 4);
        assert!(rolled.paired_this_cycle.is_empty());
        assert_eq!(rolled.cycle_reset_at, at("2024-01-22T00:00:00Z"));

        // Second touch with no intervening writes: identical result.
        let again = ledger.entry_at("u1", at("2024-01-16T00:00:00Z")).clone();
        assert_eq!(again, rolled);
    }

    #[test]
    fn rollover_does_not_fire_before_the_boundary() {
        let (mut ledger, _store) = ledger_with_store();

        ledger
            .entry_at("u1", at("2024-01-10T00:00:00Z"))
            .paired_this_cycle
            .insert("u2".to_owned());

        let account = ledger.entry_at("u1", at("2024-01-14T23:59:59Z"));
        assert!(account.paired_this_cycle.contains("u2"));
    }

    #[tokio::test]
    async fn record_pair_upholds_the_pairing_invariant() {
        let (mut ledger, store) = ledger_with_store();
        let now = at("2024-01-10T00:00:00Z");

        let total = ledger.record_pair_at("alice", "bob", now).await.expect("pair");

        assert_eq!(total, 2);
        assert_eq!(ledger.total_baked(), 2);

        let alice = ledger.entry_at("alice", now).clone();
        let bob = ledger.entry_at("bob", now).clone();
        assert_eq!(alice.points, 1);
        assert_eq!(bob.points, 1);
        assert!(alice.paired_this_cycle.contains("bob"));
        assert!(bob.paired_this_cycle.contains("alice"));

        // Both halves of the batch landed in the store.
        let dump = store.dump();
        assert_eq!(dump["alice"], alice);
        assert_eq!(dump["bob"], bob);
    }

    #[tokio::test]
    async fn failed_commit_rolls_the_mutation_back() {
        let (mut ledger, store) = ledger_with_store();
        let now = at("2024-01-10T00:00:00Z");

        ledger.record_pair_at("alice", "bob", now).await.expect("pair");
        store.set_fail_writes(true);

        let result = ledger.record_pair_at("alice", "carol", now).await;
        assert!(matches!(result, Err(PairError::Storage(_))));

        // In-memory state is back to the pre-commit snapshot.
        assert_eq!(ledger.total_baked(), 2);
        let alice = ledger.entry_at("alice", now).clone();
        assert_eq!(alice.points, 1);
        assert!(!alice.paired_this_cycle.contains("carol"));
        assert!(!store.dump().contains_key("carol"));
    }

    #[tokio::test]
    async fn commit_of_unknown_account_is_a_programmer_error() {
        let (ledger, _store) = ledger_with_store();
        assert!(matches!(
            ledger.commit(&["ghost"]).await,
            Err(PairError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn load_streams_persisted_accounts() {
        let (mut ledger, store) = ledger_with_store();
        let now = at("2024-01-10T00:00:00Z");
        ledger.record_pair_at("alice", "bob", now).await.expect("pair");

        let mut reloaded = Ledger::new(Box::new(SharedStore(store)), weekly_cycle());
        reloaded.load().await.expect("load");

        assert_eq!(reloaded.total_baked(), 2);
        let mut accounts = reloaded.list_accounts();
        accounts.sort();
        assert_eq!(accounts, vec![("alice".to_owned(), 1), ("bob".to_owned(), 1)]);
    }

    #[tokio::test]
    async fn has_paired_this_cycle_tracks_history() {
        let (mut ledger, _store) = ledger_with_store();
        let now = at("2024-01-10T00:00:00Z");
        ledger.record_pair_at("alice", "bob", now).await.expect("pair");

        assert!(ledger.has_paired_at("alice", "bob", now));
        assert!(!ledger.has_paired_at("alice", "carol", now));

        // History resets once the boundary passes.
        let next_cycle = at("2024-01-15T00:00:00Z");
        assert!(!ledger.has_paired_at("alice", "bob", next_cycle));
    }
}
