//! Ledger Store: the append-only log and the per-student hour counter.
//!
//! The log is the source of truth. `Account::cumulative_hours` is a cache of
//! `sum(log.hours)` for that student and is only ever moved in the same
//! transaction as the log write that justifies it.

use crate::registry::positive_hours;
use crate::store::LedgerStore;
use crate::tables::Tables;
use crate::transaction::Transaction;
use crate::wal::WalOp;
use hourledger_model::{
    AccountId, ActivityId, LedgerError, LogEntry, LogId, Result, Role,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a total is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoursSource {
    /// The cached counter on the account.
    Cached,
    /// A fresh sum over log rows.
    Recomputed,
}

/// A student whose cached counter disagrees with the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursDrift {
    pub student_id: AccountId,
    pub username: String,
    pub cached_hours: u64,
    pub logged_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub student_id: AccountId,
    pub username: String,
    pub cumulative_hours: u64,
}

impl Tables {
    pub fn total_hours_for(&self, student_id: AccountId, source: HoursSource) -> Result<u64> {
        let student = self.student(student_id)?;
        Ok(match source {
            HoursSource::Cached => student.cumulative_hours().unwrap_or_default(),
            HoursSource::Recomputed => self.logged_hours(student_id),
        })
    }

    fn logged_hours(&self, student_id: AccountId) -> u64 {
        self.logs
            .iter()
            .filter(|l| l.student_id == student_id)
            .map(|l| u64::from(l.hours))
            .sum()
    }

    /// Logged hours grouped by activity. Activities with no log rows are absent.
    pub fn hours_by_activity_for(&self, student_id: AccountId) -> Result<BTreeMap<ActivityId, u64>> {
        self.student(student_id)?;
        let mut by_activity: BTreeMap<ActivityId, u64> = BTreeMap::new();
        for entry in self.logs.iter().filter(|l| l.student_id == student_id) {
            *by_activity.entry(entry.activity_id).or_default() += u64::from(entry.hours);
        }
        Ok(by_activity)
    }

    pub fn logs_for(&self, student_id: AccountId) -> Vec<LogEntry> {
        self.logs
            .iter()
            .filter(|l| l.student_id == student_id)
            .cloned()
            .collect()
    }

    /// Students by cached hours descending, ties by username ascending.
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> = self
            .accounts
            .values()
            .filter_map(|a| {
                a.cumulative_hours().map(|hours| Standing {
                    student_id: a.id,
                    username: a.username.clone(),
                    cumulative_hours: hours,
                })
            })
            .collect();
        standings.sort_by(|a, b| {
            b.cumulative_hours
                .cmp(&a.cumulative_hours)
                .then_with(|| a.username.cmp(&b.username))
        });
        standings
    }

    /// Every student whose cached counter differs from the log sum.
    pub fn audit(&self) -> Vec<HoursDrift> {
        let mut logged: BTreeMap<AccountId, u64> = BTreeMap::new();
        for entry in &self.logs {
            *logged.entry(entry.student_id).or_default() += u64::from(entry.hours);
        }
        self.accounts
            .values()
            .filter_map(|a| {
                let cached = a.cumulative_hours()?;
                let logged_hours = logged.get(&a.id).copied().unwrap_or_default();
                (cached != logged_hours).then(|| HoursDrift {
                    student_id: a.id,
                    username: a.username.clone(),
                    cached_hours: cached,
                    logged_hours,
                })
            })
            .collect()
    }
}

impl Transaction<'_> {
    /// Append an immutable log row.
    pub fn append_log(
        &mut self,
        student_id: AccountId,
        staff_id: AccountId,
        activity_id: ActivityId,
        hours: u32,
    ) -> Result<LogId> {
        positive_hours(hours)?;
        self.tables().known_activity(activity_id)?;
        self.tables().student(student_id)?;
        let staff = self
            .tables()
            .account(staff_id)
            .ok_or_else(|| LedgerError::not_found("staff", staff_id))?;
        if staff.role() != Role::Staff {
            return Err(LedgerError::validation(format!(
                "{} ({staff_id}) is not staff",
                staff.username
            )));
        }

        let id = LogId(Self::allocate(self.tables().next_log_id));
        self.stage(WalOp::AppendLog(LogEntry {
            id,
            staff_id,
            student_id,
            activity_id,
            hours,
            timestamp: chrono::Utc::now(),
        }))?;
        Ok(id)
    }

    /// Add `delta` to the student's cached total; returns the new total.
    pub fn increment_student_hours(&mut self, student_id: AccountId, delta: u64) -> Result<u64> {
        let current = self
            .tables()
            .total_hours_for(student_id, HoursSource::Cached)?;
        let updated = current.checked_add(delta).ok_or_else(|| {
            LedgerError::validation(format!("hour total overflow for {student_id}"))
        })?;
        self.stage(WalOp::IncrementHours { student_id, delta })?;
        Ok(updated)
    }

    /// Overwrite the cached total. Reserved for drift repair.
    pub(crate) fn reset_cached_hours(&mut self, student_id: AccountId, hours: u64) -> Result<()> {
        self.tables().student(student_id)?;
        self.stage(WalOp::SetHours { student_id, hours })
    }

    /// Fill the accolade cache if empty. Returns whether it was written.
    pub fn cache_accolade(&mut self, student_id: AccountId, summary: String) -> Result<bool> {
        if self.tables().student(student_id)?.cached_accolade().is_some() {
            return Ok(false);
        }
        self.stage(WalOp::CacheAccolade {
            student_id,
            summary,
        })?;
        Ok(true)
    }
}

impl LedgerStore {
    /// Rewrite every drifted counter from the log, atomically.
    pub fn repair_drift(&self) -> Result<Vec<HoursDrift>> {
        self.transact(|tx| {
            let drift = tx.tables().audit();
            for d in &drift {
                tracing::warn!(
                    student = %d.username,
                    cached = d.cached_hours,
                    logged = d.logged_hours,
                    "repairing cached hour total"
                );
                tx.reset_cached_hours(d.student_id, d.logged_hours)?;
            }
            Ok(drift)
        })
    }
}
