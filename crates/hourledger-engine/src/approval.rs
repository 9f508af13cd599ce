//! Approval Engine: the request state machine.
//!
//! ```text
//!              approve                 ┌──────────────────────────┐
//!   Pending ──────────────────────────►│ Approved (a LogEntry row)│
//!      │                               └──────────────────────────┘
//!      │       reject                  ┌──────────────────────────┐
//!      └──────────────────────────────►│ Rejected (row deleted)   │
//!                                      └──────────────────────────┘
//! ```
//!
//! Both transitions delete the request row inside the same transaction that
//! checked it exists, so a request resolves exactly once. Approval also
//! appends the log row and bumps the student's cached total in that
//! transaction; the three writes commit together or not at all.

use hourledger_model::{AccountId, ActivityId, LedgerError, LogId, RequestId, Result, Role};
use hourledger_storage::{LedgerStore, Transaction};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    pub log_id: LogId,
    pub new_total_hours: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub request_id: RequestId,
    pub rejected_hours: u32,
}

pub struct ApprovalEngine<'a> {
    store: &'a LedgerStore,
}

fn require_staff_account(tx: &Transaction<'_>, staff_id: AccountId) -> Result<()> {
    let staff = tx
        .tables()
        .account(staff_id)
        .ok_or_else(|| LedgerError::not_found("staff", staff_id))?;
    if staff.role() != Role::Staff {
        return Err(LedgerError::validation(format!(
            "{} ({staff_id}) is not staff",
            staff.username
        )));
    }
    Ok(())
}

/// Log `hours` and move the counter with it. Caller owns the transaction.
fn award(
    tx: &mut Transaction<'_>,
    student_id: AccountId,
    staff_id: AccountId,
    activity_id: ActivityId,
    hours: u32,
) -> Result<Approval> {
    let log_id = tx.append_log(student_id, staff_id, activity_id, hours)?;
    let new_total_hours = tx.increment_student_hours(student_id, u64::from(hours))?;
    Ok(Approval {
        log_id,
        new_total_hours,
    })
}

impl<'a> ApprovalEngine<'a> {
    pub fn new(store: &'a LedgerStore) -> Self {
        Self { store }
    }

    /// Pending -> Approved.
    pub fn approve(&self, request_id: RequestId, staff_id: AccountId) -> Result<Approval> {
        let (approval, request) = self.store.transact(|tx| {
            let request = tx.remove_request(request_id)?;
            let approval = award(
                tx,
                request.student_id,
                staff_id,
                request.activity_id,
                request.hours,
            )?;
            Ok((approval, request))
        })?;

        tracing::info!(
            request = %request_id,
            staff = %staff_id,
            student = %request.student_id,
            hours = request.hours,
            log = %approval.log_id,
            total = approval.new_total_hours,
            "request approved"
        );
        Ok(approval)
    }

    /// Pending -> Rejected. Leaves the ledger untouched.
    pub fn reject(&self, request_id: RequestId, staff_id: AccountId) -> Result<Rejection> {
        let request = self.store.transact(|tx| {
            require_staff_account(tx, staff_id)?;
            tx.remove_request(request_id)
        })?;

        tracing::info!(
            request = %request_id,
            staff = %staff_id,
            student = %request.student_id,
            hours = request.hours,
            "request rejected"
        );
        Ok(Rejection {
            request_id,
            rejected_hours: request.hours,
        })
    }

    /// Staff-initiated grant with no prior request.
    pub fn log_directly(
        &self,
        student_id: AccountId,
        staff_id: AccountId,
        activity_id: ActivityId,
        hours: u32,
    ) -> Result<Approval> {
        let approval = self
            .store
            .transact(|tx| award(tx, student_id, staff_id, activity_id, hours))?;

        tracing::info!(
            staff = %staff_id,
            student = %student_id,
            activity = %activity_id,
            hours,
            total = approval.new_total_hours,
            "hours logged directly"
        );
        Ok(approval)
    }
}
