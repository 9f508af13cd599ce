//! Transactions.
//!
//! A [`Transaction`] owns the store's write guard from `begin` to `commit`, so
//! every read it makes and every write it stages is serialized against all
//! other writers. Writes are applied to the guarded tables immediately (later
//! reads in the same transaction see them) and an undo record is kept for
//! each. On commit the ops go to the WAL as one batch; if that fails, or the
//! transaction is dropped without committing, the undo records are replayed
//! in reverse before the guard is released. Readers never see staged state.

use crate::store::LedgerStore;
use crate::tables::Tables;
use crate::wal::{WalEntry, WalOp};
use hourledger_model::{Account, AccountId, AccountProfile, ActivityId, Request, RequestId, Result};
use parking_lot::RwLockWriteGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy)]
struct Counters {
    account: u64,
    activity: u64,
    request: u64,
    log: u64,
}

impl Counters {
    fn capture(tables: &Tables) -> Self {
        Self {
            account: tables.next_account_id,
            activity: tables.next_activity_id,
            request: tables.next_request_id,
            log: tables.next_log_id,
        }
    }

    fn restore(self, tables: &mut Tables) {
        tables.next_account_id = self.account;
        tables.next_activity_id = self.activity;
        tables.next_request_id = self.request;
        tables.next_log_id = self.log;
    }
}

#[derive(Debug)]
enum Undo {
    RemoveAccount(AccountId),
    RemoveActivity(ActivityId),
    RemoveRequest(RequestId),
    RestoreRequest(Request),
    PopLog,
    RestoreHours { student_id: AccountId, hours: u64 },
    ClearAccolade(AccountId),
    Nothing,
}

pub struct Transaction<'s> {
    id: u64,
    store: &'s LedgerStore,
    tables: RwLockWriteGuard<'s, Tables>,
    counters: Counters,
    pending_writes: Vec<WalOp>,
    undo: Vec<Undo>,
    state: TxState,
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(id: u64, store: &'s LedgerStore, tables: RwLockWriteGuard<'s, Tables>) -> Self {
        let counters = Counters::capture(&tables);
        Self {
            id,
            store,
            tables,
            counters,
            pending_writes: Vec::new(),
            undo: Vec::new(),
            state: TxState::Active,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Tables as seen by this transaction, staged writes included.
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Ops staged so far.
    pub fn pending_writes(&self) -> &[WalOp] {
        &self.pending_writes
    }

    /// Next id for a table, given its persisted counter. Ids start at 1.
    pub(crate) fn allocate(counter: u64) -> u64 {
        counter.max(1)
    }

    /// Apply `op` to the guarded tables and remember how to take it back.
    pub(crate) fn stage(&mut self, op: WalOp) -> Result<()> {
        let undo = self.undo_for(&op);
        self.tables.apply(op.clone())?;
        self.undo.push(undo);
        self.pending_writes.push(op);
        Ok(())
    }

    fn undo_for(&self, op: &WalOp) -> Undo {
        match op {
            WalOp::CreateAccount(account) => Undo::RemoveAccount(account.id),
            WalOp::CreateActivity(activity) => Undo::RemoveActivity(activity.id),
            WalOp::InsertRequest(request) => Undo::RemoveRequest(request.id),
            WalOp::DeleteRequest { request_id } => match self.tables.requests.get(request_id) {
                Some(request) => Undo::RestoreRequest(request.clone()),
                None => Undo::Nothing,
            },
            WalOp::AppendLog(_) => Undo::PopLog,
            WalOp::IncrementHours { student_id, .. } | WalOp::SetHours { student_id, .. } => {
                match self.tables.account(*student_id).and_then(Account::cumulative_hours) {
                    Some(hours) => Undo::RestoreHours {
                        student_id: *student_id,
                        hours,
                    },
                    None => Undo::Nothing,
                }
            }
            WalOp::CacheAccolade { student_id, .. } => {
                match self.tables.account(*student_id).map(Account::cached_accolade) {
                    Some(None) => Undo::ClearAccolade(*student_id),
                    _ => Undo::Nothing,
                }
            }
        }
    }

    /// Make every staged write durable, then release the lock.
    ///
    /// On WAL failure the staged writes are undone and the error is returned;
    /// nothing of this transaction survives a restart either, since its
    /// commit marker was never written.
    pub fn commit(mut self) -> Result<()> {
        if self.pending_writes.is_empty() {
            self.state = TxState::Committed;
            return Ok(());
        }

        if let Some(wal) = self.store.wal() {
            let mut entries = Vec::with_capacity(self.pending_writes.len() + 2);
            entries.push(WalEntry::BeginTx {
                tx_id: self.id,
                timestamp: chrono::Utc::now().timestamp(),
            });
            entries.extend(self.pending_writes.iter().map(|op| WalEntry::Op {
                tx_id: self.id,
                op: op.clone(),
            }));
            entries.push(WalEntry::CommitTx { tx_id: self.id });

            if let Err(err) = wal.append_batch(&entries) {
                tracing::error!(tx_id = self.id, error = %err, "wal append failed; rolling back");
                self.rollback_in_place();
                return Err(err.into());
            }
        }

        tracing::debug!(
            tx_id = self.id,
            ops = self.pending_writes.len(),
            "transaction committed"
        );
        self.undo.clear();
        self.state = TxState::Committed;
        Ok(())
    }

    /// Discard every staged write.
    pub fn rollback(mut self) {
        self.rollback_in_place();
    }

    fn rollback_in_place(&mut self) {
        if self.state != TxState::Active {
            return;
        }
        let tables = &mut *self.tables;
        while let Some(undo) = self.undo.pop() {
            match undo {
                Undo::RemoveAccount(id) => {
                    tables.accounts.remove(&id);
                }
                Undo::RemoveActivity(id) => {
                    tables.activities.remove(&id);
                }
                Undo::RemoveRequest(id) => {
                    tables.requests.remove(&id);
                }
                Undo::RestoreRequest(request) => {
                    tables.requests.insert(request.id, request);
                }
                Undo::PopLog => {
                    tables.logs.pop();
                }
                Undo::RestoreHours { student_id, hours } => {
                    if let Some(AccountProfile::Student {
                        cumulative_hours, ..
                    }) = tables.accounts.get_mut(&student_id).map(|a| &mut a.profile)
                    {
                        *cumulative_hours = hours;
                    }
                }
                Undo::ClearAccolade(student_id) => {
                    if let Some(AccountProfile::Student { accolade, .. }) =
                        tables.accounts.get_mut(&student_id).map(|a| &mut a.profile)
                    {
                        *accolade = None;
                    }
                }
                Undo::Nothing => {}
            }
        }
        self.counters.restore(tables);
        if !self.pending_writes.is_empty() {
            tracing::debug!(
                tx_id = self.id,
                ops = self.pending_writes.len(),
                "transaction rolled back"
            );
        }
        self.pending_writes.clear();
        self.state = TxState::RolledBack;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.rollback_in_place();
    }
}
