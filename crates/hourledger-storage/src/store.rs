use crate::config::StorageConfig;
use crate::tables::Tables;
use crate::transaction::Transaction;
use crate::wal::{ReplayStats, WalEntry, WalOp, WriteAheadLog};
use hourledger_model::{LedgerError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// On-disk checkpoint: every table plus the id of the last transaction folded
/// into it. WAL transactions at or below that id are skipped on replay.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    last_tx_id: u64,
    tables: Tables,
}

/// Durable home of accounts, activities, pending requests, and the log.
pub struct LedgerStore {
    config: StorageConfig,
    tables: RwLock<Tables>,
    wal: Option<WriteAheadLog>,
    next_tx_id: AtomicU64,
}

impl LedgerStore {
    /// Open (or create) the store described by `config`, recovering committed
    /// state from the snapshot and WAL.
    pub fn open(config: StorageConfig) -> Result<Self> {
        let (Some(wal_path), Some(snapshot_path)) = (config.wal_path(), config.snapshot_path())
        else {
            return Ok(Self::with_config(config));
        };
        if let Some(dir) = &config.data_dir {
            std::fs::create_dir_all(dir)?;
        }

        let snapshot = if snapshot_path.exists() {
            let bytes = std::fs::read(&snapshot_path)?;
            bincode::deserialize::<Snapshot>(&bytes)
                .map_err(|e| LedgerError::corrupt(format!("snapshot: {e}")))?
        } else {
            Snapshot {
                last_tx_id: 0,
                tables: Tables::default(),
            }
        };

        let wal = WriteAheadLog::open(&wal_path, config.sync_writes)?;
        let mut tables = snapshot.tables;
        let (last_tx_id, stats) = recover(&wal, &mut tables, snapshot.last_tx_id)?;
        tracing::info!(
            path = %wal_path.display(),
            frames = stats.frames,
            last_tx_id,
            accounts = tables.accounts.len(),
            pending_requests = tables.requests.len(),
            logs = tables.logs.len(),
            "ledger store recovered"
        );

        Ok(Self {
            config,
            tables: RwLock::new(tables),
            wal: Some(wal),
            next_tx_id: AtomicU64::new(last_tx_id + 1),
        })
    }

    /// A store with no durable backing.
    pub fn in_memory() -> Self {
        Self::with_config(StorageConfig::default())
    }

    fn with_config(config: StorageConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(Tables::default()),
            wal: None,
            next_tx_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub(crate) fn wal(&self) -> Option<&WriteAheadLog> {
        self.wal.as_ref()
    }

    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }

    /// Take the write lock and start a transaction.
    ///
    /// Fails with `Conflict` if another writer holds the lock longer than the
    /// configured timeout.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        let guard = self
            .tables
            .try_write_for(self.config.lock_timeout())
            .ok_or_else(|| LedgerError::Conflict {
                resource: "ledger store".to_string(),
            })?;
        let tx_id = self.next_tx_id.fetch_add(1, Ordering::SeqCst);
        Ok(Transaction::new(tx_id, self, guard))
    }

    /// Run `f` in a transaction: commit on `Ok`, roll back on `Err`.
    pub fn transact<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T>,
    {
        let mut tx = self.begin()?;
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `f` against a consistent view of committed state.
    pub fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Tables) -> T,
    {
        f(&self.tables.read())
    }

    /// Fold the WAL into a fresh snapshot and truncate it.
    pub fn checkpoint(&self) -> Result<()> {
        let (Some(wal), Some(snapshot_path)) = (self.wal(), self.config.snapshot_path()) else {
            return Ok(());
        };

        // Holding the write lock means no transaction is in flight, so every
        // id below next_tx_id is either committed or rolled back.
        let tables = self
            .tables
            .try_write_for(self.config.lock_timeout())
            .ok_or_else(|| LedgerError::Conflict {
                resource: "ledger store".to_string(),
            })?;
        let last_tx_id = self.next_tx_id.load(Ordering::SeqCst) - 1;

        let snapshot = Snapshot {
            last_tx_id,
            tables: tables.clone(),
        };
        write_snapshot(&snapshot_path, &snapshot)?;
        wal.truncate()?;
        wal.append_batch(&[WalEntry::Checkpoint { last_tx_id }])?;

        tracing::info!(
            path = %snapshot_path.display(),
            last_tx_id,
            "checkpoint written"
        );
        Ok(())
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let data = bincode::serialize(snapshot)
        .map_err(|e| LedgerError::corrupt(format!("snapshot encode: {e}")))?;
    let tmp = path.with_extension("tmp");
    {
        use std::io::Write;
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Replay committed transactions newer than `after_tx_id` into `tables`.
/// Returns the highest transaction id seen.
fn recover(
    wal: &WriteAheadLog,
    tables: &mut Tables,
    after_tx_id: u64,
) -> Result<(u64, ReplayStats)> {
    let mut open_txs: HashMap<u64, Vec<WalOp>> = HashMap::new();
    let mut last_tx_id = after_tx_id;
    let mut replayed = 0usize;
    let mut apply_error: Option<LedgerError> = None;

    let stats = wal.replay(|entry| {
        if let Some(tx_id) = entry.tx_id() {
            last_tx_id = last_tx_id.max(tx_id);
        }
        match entry {
            WalEntry::BeginTx { tx_id, .. } => {
                open_txs.insert(tx_id, Vec::new());
            }
            WalEntry::Op { tx_id, op } => {
                open_txs.entry(tx_id).or_default().push(op);
            }
            WalEntry::CommitTx { tx_id } => {
                let ops = open_txs.remove(&tx_id).unwrap_or_default();
                if tx_id > after_tx_id && apply_error.is_none() {
                    for op in ops {
                        if let Err(err) = tables.apply(op) {
                            apply_error = Some(err);
                            break;
                        }
                    }
                    replayed += 1;
                }
            }
            WalEntry::Checkpoint { last_tx_id: seq } => {
                last_tx_id = last_tx_id.max(seq);
            }
        }
        Ok(())
    })?;

    if let Some(err) = apply_error {
        return Err(err);
    }
    if stats.torn_tail {
        tracing::warn!(
            path = %wal.path().display(),
            valid_len = stats.valid_len,
            "dropping torn frame at wal tail"
        );
        wal.truncate_to(stats.valid_len)?;
    }
    if !open_txs.is_empty() {
        tracing::warn!(
            uncommitted = open_txs.len(),
            "discarding transactions without a commit marker"
        );
    }
    tracing::debug!(replayed, "wal replay finished");
    Ok((last_tx_id, stats))
}
