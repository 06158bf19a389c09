//! Persistence collaborator for the account ledger.
//!
//! The ledger owns all account state in memory and pushes snapshots through
//! an injected [`AccountStore`]. A batch write is all-or-nothing from the
//! caller's point of view: either every account in the batch lands on disk
//! or none does.

use crate::error::{PairError, Result};
use crate::ledger::Account;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Storage contract consumed by the ledger.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Stream every persisted account. Called once, before any other
    /// component runs; an error here is fatal to startup.
    async fn load_all(&self) -> Result<Vec<(String, Account)>>;

    /// Persist a single account.
    async fn put_one(&self, id: &str, account: &Account) -> Result<()>;

    /// Persist several accounts atomically (all-or-nothing).
    async fn put_many(&self, entries: &[(String, Account)]) -> Result<()>;
}

/// [`AccountStore`] backed by one pretty-printed JSON file.
///
/// Writes are read-modify-write with a temp-file + rename, so a batch can
/// never partially land and a crashed write never corrupts the table.
/// The ledger serializes access; this store takes no lock of its own.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store persisting to `path`. The file and its parent
    /// directories are created on first write; a missing file reads as an
    /// empty table.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_table(&self) -> Result<BTreeMap<String, Account>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(PairError::Storage(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            PairError::Storage(format!("cannot parse {}: {e}", self.path.display()))
        })
    }

    fn write_table(&self, table: &BTreeMap<String, Account>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PairError::Storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(table)
            .map_err(|e| PairError::Storage(format!("cannot serialize accounts: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| PairError::Storage(format!("cannot write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            PairError::Storage(format!("cannot replace {}: {e}", self.path.display()))
        })?;

        Ok(())
    }

    fn merge(&self, entries: &[(String, Account)]) -> Result<()> {
        let mut table = self.read_table()?;
        for (id, account) in entries {
            table.insert(id.clone(), account.clone());
        }
        self.write_table(&table)?;
        debug!(count = entries.len(), "persisted accounts");
        Ok(())
    }
}

#[async_trait]
impl AccountStore for JsonFileStore {
    async fn load_all(&self) -> Result<Vec<(String, Account)>> {
        Ok(self.read_table()?.into_iter().collect())
    }

    async fn put_one(&self, id: &str, account: &Account) -> Result<()> {
        self.merge(&[(id.to_owned(), account.clone())])
    }

    async fn put_many(&self, entries: &[(String, Account)]) -> Result<()> {
        self.merge(entries)
    }
}

/// In-memory [`AccountStore`] for tests and embedding.
///
/// `fail_writes` injects a storage fault on the next put, for exercising
/// commit rollback paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<BTreeMap<String, Account>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the stored table.
    pub fn dump(&self) -> BTreeMap<String, Account> {
        self.table.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PairError::Storage("injected write failure".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn load_all(&self) -> Result<Vec<(String, Account)>> {
        Ok(self.dump().into_iter().collect())
    }

    async fn put_one(&self, id: &str, account: &Account) -> Result<()> {
        self.check_writable()?;
        if let Ok(mut table) = self.table.lock() {
            table.insert(id.to_owned(), account.clone());
        }
        Ok(())
    }

    async fn put_many(&self, entries: &[(String, Account)]) -> Result<()> {
        self.check_writable()?;
        if let Ok(mut table) = self.table.lock() {
            for (id, account) in entries {
                table.insert(id.clone(), account.clone());
            }
        }
        Ok(())
    }
}
