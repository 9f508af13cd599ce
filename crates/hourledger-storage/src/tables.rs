//! In-memory row storage.
//!
//! `Tables` is the materialized state: the last snapshot plus every committed
//! WAL op applied in order. It is only mutated through [`Tables::apply`].

use crate::wal::WalOp;
use hourledger_model::{
    Account, AccountId, AccountProfile, Activity, ActivityId, LedgerError, LogEntry, Request,
    RequestId, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    pub(crate) accounts: BTreeMap<AccountId, Account>,
    pub(crate) activities: BTreeMap<ActivityId, Activity>,
    pub(crate) requests: BTreeMap<RequestId, Request>,
    pub(crate) logs: Vec<LogEntry>,
    pub(crate) next_account_id: u64,
    pub(crate) next_activity_id: u64,
    pub(crate) next_request_id: u64,
    pub(crate) next_log_id: u64,
}

impl Tables {
    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn account_by_username(&self, username: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.username == username)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn activity(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.get(&id)
    }

    pub fn activity_by_name(&self, name: &str) -> Option<&Activity> {
        self.activities.values().find(|a| a.name == name)
    }

    /// All activities, id ascending.
    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Apply one committed op.
    ///
    /// Ops are validated while staged under the same write lock, so a failure
    /// here means the WAL or snapshot is inconsistent.
    pub(crate) fn apply(&mut self, op: WalOp) -> Result<()> {
        match op {
            WalOp::CreateAccount(account) => {
                self.next_account_id = self.next_account_id.max(account.id.get() + 1);
                self.accounts.insert(account.id, account);
            }
            WalOp::CreateActivity(activity) => {
                self.next_activity_id = self.next_activity_id.max(activity.id.get() + 1);
                self.activities.insert(activity.id, activity);
            }
            WalOp::InsertRequest(request) => {
                self.next_request_id = self.next_request_id.max(request.id.get() + 1);
                self.requests.insert(request.id, request);
            }
            WalOp::DeleteRequest { request_id } => {
                if self.requests.remove(&request_id).is_none() {
                    return Err(LedgerError::corrupt(format!(
                        "delete of absent {request_id}"
                    )));
                }
            }
            WalOp::AppendLog(entry) => {
                self.next_log_id = self.next_log_id.max(entry.id.get() + 1);
                self.logs.push(entry);
            }
            WalOp::IncrementHours { student_id, delta } => {
                let hours = self.cached_hours_mut(student_id)?;
                *hours = hours.checked_add(delta).ok_or_else(|| {
                    LedgerError::corrupt(format!("hour counter overflow for {student_id}"))
                })?;
            }
            WalOp::SetHours {
                student_id,
                hours: value,
            } => {
                *self.cached_hours_mut(student_id)? = value;
            }
            WalOp::CacheAccolade {
                student_id,
                summary,
            } => match self.accounts.get_mut(&student_id).map(|a| &mut a.profile) {
                Some(AccountProfile::Student { accolade, .. }) => {
                    accolade.get_or_insert(summary);
                }
                _ => {
                    return Err(LedgerError::corrupt(format!(
                        "accolade cached for non-student {student_id}"
                    )))
                }
            },
        }
        Ok(())
    }

    fn cached_hours_mut(&mut self, student_id: AccountId) -> Result<&mut u64> {
        match self.accounts.get_mut(&student_id).map(|a| &mut a.profile) {
            Some(AccountProfile::Student {
                cumulative_hours, ..
            }) => Ok(cumulative_hours),
            _ => Err(LedgerError::corrupt(format!(
                "hour counter update for non-student {student_id}"
            ))),
        }
    }
}
