//! Hour Ledger Storage Layer
//!
//! Durable storage for accounts, activities, pending requests, and the
//! append-only hours log:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         LEDGER STORE                                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌─────────────┐   begin()   ┌───────────────┐                      │
//! │  │  Approval   │────────────►│  Transaction  │  write guard held    │
//! │  │  Engine     │             │  (staged ops  │  until commit        │
//! │  └─────────────┘             │   + undo log) │                      │
//! │                              └───────┬───────┘                      │
//! │                                      │ commit()                     │
//! │                                      ▼                              │
//! │  ┌─────────────┐             ┌───────────────┐    ┌─────────────┐  │
//! │  │   Readers   │◄── read ────│    Tables     │    │     WAL     │  │
//! │  │ (leaderboard│             │  (in memory)  │    │ (bincode    │  │
//! │  │  accolades) │             └───────────────┘    │  frames)    │  │
//! │  └─────────────┘                     ▲            └──────┬──────┘  │
//! │                                      │ open(): snapshot  │         │
//! │                                      └──── + replay ─────┘         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Features
//!
//! - **Atomic**: all ops of a transaction reach the WAL in one batch with one
//!   commit marker; recovery ignores transactions without one
//! - **Serialized writers**: a transaction holds the store's write lock from
//!   its first read to commit, so read-then-delete is a single step
//! - **Reconcilable**: the cached per-student total can be audited against,
//!   and repaired from, the log

pub mod config;
pub mod directory;
pub mod ledger;
pub mod registry;
pub mod store;
pub mod tables;
pub mod transaction;
pub mod wal;


pub use config::StorageConfig;
pub use ledger::{HoursDrift, HoursSource, Standing};
pub use store::LedgerStore;
pub use tables::Tables;
pub use transaction::{Transaction, TxState};

/// Open a durable store rooted at `data_dir` with default settings.
pub fn open_store(data_dir: impl AsRef<std::path::Path>) -> hourledger_model::Result<LedgerStore> {
    LedgerStore::open(StorageConfig::in_dir(data_dir))
}
