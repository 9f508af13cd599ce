//! Accounts and activities. Both are created once and never deleted.

use crate::transaction::Transaction;
use crate::wal::WalOp;
use hourledger_model::{Account, AccountId, Activity, ActivityId, LedgerError, Result, Role};

fn valid_name(kind: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation(format!("{kind} name must not be empty")));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(LedgerError::validation(format!(
            "{kind} name `{name}` must not contain whitespace"
        )));
    }
    Ok(name.to_string())
}

impl Transaction<'_> {
    pub fn create_account(&mut self, username: &str, role: Role) -> Result<AccountId> {
        let username = valid_name("account", username)?;
        if self.tables().account_by_username(&username).is_some() {
            return Err(LedgerError::validation(format!(
                "username `{username}` is already taken"
            )));
        }

        let id = AccountId(Self::allocate(self.tables().next_account_id));
        let account = match role {
            Role::Student => Account::student(id, username),
            Role::Staff => Account::staff(id, username),
        };
        self.stage(WalOp::CreateAccount(account))?;
        Ok(id)
    }

    pub fn create_activity(&mut self, name: &str) -> Result<ActivityId> {
        let name = valid_name("activity", name)?;
        if self.tables().activity_by_name(&name).is_some() {
            return Err(LedgerError::validation(format!(
                "activity `{name}` already exists"
            )));
        }

        let id = ActivityId(Self::allocate(self.tables().next_activity_id));
        self.stage(WalOp::CreateActivity(Activity { id, name }))?;
        Ok(id)
    }
}
