//! Hour ledger model
//!
//! Shared vocabulary for every other crate in the workspace:
//!
//! - [`model`]: accounts, activities, pending requests, and log entries
//! - [`error`]: the classified error taxonomy returned by every core operation
//! - [`auth`]: the caller identity passed into each call, plus the role guard
//! - [`milestone`]: the pure threshold -> label resolver
//!
//! Nothing in this crate touches storage. The storage and engine crates build
//! on these types; the CLI only renders them.

pub mod auth;
pub mod error;
pub mod milestone;
pub mod model;

pub use auth::{require_role, require_self_or_staff, Caller};
pub use error::{LedgerError, Result};
pub use milestone::{resolve, Milestone, MilestoneCatalog, MilestoneTable, NO_MILESTONE};
pub use model::{
    Account, AccountId, AccountProfile, Activity, ActivityId, LogEntry, LogId, Request,
    RequestId, Role,
};
