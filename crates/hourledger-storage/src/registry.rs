//! Request Registry: one row per open request.
//!
//! A request row exists only while the request is pending. Staff resolution
//! removes it through [`Transaction::remove_request`]; a second removal of the
//! same id reports `NotFound`.

use crate::tables::Tables;
use crate::transaction::Transaction;
use crate::wal::WalOp;
use hourledger_model::{
    AccountId, ActivityId, LedgerError, Request, RequestId, Result, Role,
};

impl Tables {
    pub fn request(&self, id: RequestId) -> Result<&Request> {
        self.requests
            .get(&id)
            .ok_or_else(|| LedgerError::not_found("request", id))
    }

    /// Pending requests, id ascending (ids are allocated in submission order).
    pub fn pending_requests(&self) -> Vec<Request> {
        self.requests.values().cloned().collect()
    }

    pub fn pending_requests_for(&self, student_id: AccountId) -> Vec<Request> {
        self.requests
            .values()
            .filter(|r| r.student_id == student_id)
            .cloned()
            .collect()
    }

    /// The student behind `id`: `NotFound` if absent, `Validation` if the
    /// account is staff.
    pub(crate) fn student(&self, id: AccountId) -> Result<&hourledger_model::Account> {
        let account = self
            .account(id)
            .ok_or_else(|| LedgerError::not_found("student", id))?;
        if account.role() != Role::Student {
            return Err(LedgerError::validation(format!(
                "{} ({id}) is not a student",
                account.username
            )));
        }
        Ok(account)
    }

    pub(crate) fn known_activity(&self, id: ActivityId) -> Result<()> {
        if self.activity(id).is_none() {
            return Err(LedgerError::validation(format!("unknown activity {id}")));
        }
        Ok(())
    }
}

pub(crate) fn positive_hours(hours: u32) -> Result<()> {
    if hours == 0 {
        return Err(LedgerError::validation("hours must be a positive integer"));
    }
    Ok(())
}

impl Transaction<'_> {
    /// Open a pending request. No ledger side effect.
    pub fn submit_request(
        &mut self,
        student_id: AccountId,
        activity_id: ActivityId,
        hours: u32,
    ) -> Result<RequestId> {
        positive_hours(hours)?;
        self.tables().known_activity(activity_id)?;
        self.tables().student(student_id)?;

        let id = RequestId(Self::allocate(self.tables().next_request_id));
        self.stage(WalOp::InsertRequest(Request {
            id,
            student_id,
            activity_id,
            hours,
        }))?;
        Ok(id)
    }

    pub fn request(&self, id: RequestId) -> Result<Request> {
        self.tables().request(id).cloned()
    }

    /// Delete a pending request and return it.
    pub fn remove_request(&mut self, id: RequestId) -> Result<Request> {
        let request = self.request(id)?;
        self.stage(WalOp::DeleteRequest { request_id: id })?;
        Ok(request)
    }
}
