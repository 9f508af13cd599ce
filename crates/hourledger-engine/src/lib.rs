//! Hour Ledger Engine
//!
//! The request/approval state machine and the views computed from the log:
//!
//! ```text
//!  caller ──► HoursService ──► role guard
//!                  │
//!                  ├──► ApprovalEngine ──► LedgerStore transaction
//!                  │        (remove request + append log + bump counter)
//!                  │
//!                  └──► AccoladeAggregator ──► read log ──► MilestoneCatalog
//! ```
//!
//! The aggregator never writes the ledger; its only write is the optional
//! write-once accolade cache.

pub mod accolades;
pub mod approval;
pub mod config;
pub mod service;

pub use accolades::{AccoladeAggregator, AccoladeReport, Accolades};
pub use approval::{Approval, ApprovalEngine, Rejection};
pub use config::EngineConfig;
pub use service::{HoursService, LeaderboardEntry};
