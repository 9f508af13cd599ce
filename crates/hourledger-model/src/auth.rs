//! Caller identity.
//!
//! Authentication happens outside the core. Each public operation receives the
//! already-verified identity as a [`Caller`] and runs [`require_role`] (or one
//! of the narrower guards) before touching storage.

use crate::error::{LedgerError, Result};
use crate::model::{AccountId, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub account_id: AccountId,
    pub role: Role,
}

impl Caller {
    pub fn student(account_id: AccountId) -> Self {
        Self {
            account_id,
            role: Role::Student,
        }
    }

    pub fn staff(account_id: AccountId) -> Self {
        Self {
            account_id,
            role: Role::Staff,
        }
    }
}

pub fn require_role(caller: &Caller, role: Role) -> Result<()> {
    if caller.role != role {
        return Err(LedgerError::Unauthorized(format!(
            "not logged in as {role}; cannot perform this operation"
        )));
    }
    Ok(())
}

/// Staff may act on anyone; a student only on their own account.
pub fn require_self_or_staff(caller: &Caller, subject: AccountId) -> Result<()> {
    match caller.role {
        Role::Staff => Ok(()),
        Role::Student if caller.account_id == subject => Ok(()),
        Role::Student => Err(LedgerError::Unauthorized(format!(
            "{} may not act on behalf of {subject}",
            caller.account_id
        ))),
    }
}
