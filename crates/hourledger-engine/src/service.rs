//! Public entry points.
//!
//! Every operation that acts for someone takes the caller's already-verified
//! identity and runs the role guard before touching storage.

use crate::accolades::{AccoladeAggregator, Accolades};
use crate::approval::{Approval, ApprovalEngine, Rejection};
use crate::config::EngineConfig;
use hourledger_model::auth::{require_role, require_self_or_staff};
use hourledger_model::{
    Account, AccountId, Activity, ActivityId, Caller, LedgerError, Request, RequestId, Result,
    Role,
};
use hourledger_storage::{HoursDrift, LedgerStore, Standing};
use std::sync::Arc;

pub type LeaderboardEntry = Standing;

const DEFAULT_STUDENTS: [&str; 4] = ["bob", "rob", "jim", "phil"];
const DEFAULT_STAFF: [&str; 2] = ["dean", "teacher"];
const DEFAULT_ACTIVITIES: [&str; 3] = ["community_service", "volunteering", "help_desk"];

#[derive(Clone)]
pub struct HoursService {
    store: Arc<LedgerStore>,
    config: Arc<EngineConfig>,
}

impl HoursService {
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = LedgerStore::open(config.storage.clone())?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn new(store: Arc<LedgerStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(LedgerStore::in_memory()), EngineConfig::default())
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Directory
    // ========================================================================

    pub fn create_student(&self, username: &str) -> Result<AccountId> {
        self.store
            .transact(|tx| tx.create_account(username, Role::Student))
    }

    pub fn create_staff(&self, username: &str) -> Result<AccountId> {
        self.store.transact(|tx| tx.create_account(username, Role::Staff))
    }

    pub fn create_activity(&self, name: &str) -> Result<ActivityId> {
        self.store.transact(|tx| tx.create_activity(name))
    }

    /// Default students, staff, and activities, in one transaction.
    pub fn seed_defaults(&self) -> Result<()> {
        self.store.transact(|tx| {
            for name in DEFAULT_STUDENTS {
                tx.create_account(name, Role::Student)?;
            }
            for name in DEFAULT_STAFF {
                tx.create_account(name, Role::Staff)?;
            }
            for name in DEFAULT_ACTIVITIES {
                tx.create_activity(name)?;
            }
            Ok(())
        })?;
        tracing::info!("default accounts and activities created");
        Ok(())
    }

    pub fn list_accounts(&self) -> Vec<Account> {
        self.store.read(|t| t.accounts().cloned().collect())
    }

    pub fn list_activities(&self) -> Vec<Activity> {
        self.store.read(|t| t.activities().cloned().collect())
    }

    pub fn account_by_username(&self, username: &str) -> Result<Account> {
        self.store.read(|t| {
            t.account_by_username(username)
                .cloned()
                .ok_or_else(|| LedgerError::not_found("account", username))
        })
    }

    pub fn activity_by_name(&self, name: &str) -> Result<Activity> {
        self.store.read(|t| {
            t.activity_by_name(name)
                .cloned()
                .ok_or_else(|| LedgerError::not_found("activity", name))
        })
    }

    /// The caller identity for an account the collaborator has authenticated.
    pub fn caller_for(&self, username: &str) -> Result<Caller> {
        let account = self.account_by_username(username)?;
        Ok(Caller {
            account_id: account.id,
            role: account.role(),
        })
    }

    // ========================================================================
    // Requests
    // ========================================================================

    pub fn submit_request(
        &self,
        caller: &Caller,
        student_id: AccountId,
        activity_id: ActivityId,
        hours: u32,
    ) -> Result<RequestId> {
        require_role(caller, Role::Student)?;
        require_self_or_staff(caller, student_id)?;
        let id = self
            .store
            .transact(|tx| tx.submit_request(student_id, activity_id, hours))?;
        tracing::info!(request = %id, student = %student_id, hours, "request submitted");
        Ok(id)
    }

    pub fn approve_request(&self, caller: &Caller, request_id: RequestId) -> Result<Approval> {
        require_role(caller, Role::Staff)?;
        ApprovalEngine::new(&self.store).approve(request_id, caller.account_id)
    }

    pub fn reject_request(&self, caller: &Caller, request_id: RequestId) -> Result<Rejection> {
        require_role(caller, Role::Staff)?;
        ApprovalEngine::new(&self.store).reject(request_id, caller.account_id)
    }

    pub fn log_hours_directly(
        &self,
        caller: &Caller,
        student_id: AccountId,
        activity_id: ActivityId,
        hours: u32,
    ) -> Result<Approval> {
        require_role(caller, Role::Staff)?;
        ApprovalEngine::new(&self.store).log_directly(
            student_id,
            caller.account_id,
            activity_id,
            hours,
        )
    }

    pub fn list_pending_requests(&self, caller: &Caller) -> Result<Vec<Request>> {
        require_role(caller, Role::Staff)?;
        Ok(self.store.read(|t| t.pending_requests()))
    }

    /// A student's own open requests.
    pub fn my_pending_requests(&self, caller: &Caller) -> Result<Vec<Request>> {
        require_role(caller, Role::Student)?;
        Ok(self.store.read(|t| t.pending_requests_for(caller.account_id)))
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Students by cumulative hours descending, ties by name ascending.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.store.read(|t| t.standings())
    }

    pub fn accolades(&self, caller: &Caller, student_id: AccountId) -> Result<Accolades> {
        require_self_or_staff(caller, student_id)?;
        let aggregator = AccoladeAggregator::new(&self.store, &self.config.milestones);
        if self.config.cache_accolades {
            Ok(aggregator.compute_and_cache(student_id)?.accolades)
        } else {
            aggregator.compute(student_id)
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    pub fn audit_hours(&self, caller: &Caller) -> Result<Vec<HoursDrift>> {
        require_role(caller, Role::Staff)?;
        let drift = self.store.read(|t| t.audit());
        for d in &drift {
            tracing::warn!(
                student = %d.username,
                cached = d.cached_hours,
                logged = d.logged_hours,
                "cached hour total disagrees with the log"
            );
        }
        Ok(drift)
    }

    pub fn repair_hours(&self, caller: &Caller) -> Result<Vec<HoursDrift>> {
        require_role(caller, Role::Staff)?;
        self.store.repair_drift()
    }

    pub fn checkpoint(&self) -> Result<()> {
        self.store.checkpoint()
    }
}
