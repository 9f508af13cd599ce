//! Rows held by the ledger store.
//!
//! Students and staff share one [`Account`] row; the [`AccountProfile`]
//! carries the role-specific payload. Callers dispatch on [`Account::role`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Identifier of a student or staff account.
    AccountId,
    "account#"
);
id_type!(
    /// Identifier of an activity.
    ActivityId,
    "activity#"
);
id_type!(
    /// Identifier of a pending request.
    RequestId,
    "request#"
);
id_type!(
    /// Identifier of an immutable log entry.
    LogId,
    "log#"
);

/// Role of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Staff,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => f.write_str("student"),
            Role::Staff => f.write_str("staff"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            other => Err(crate::LedgerError::Validation(format!(
                "unknown role `{other}` (expected student|staff)"
            ))),
        }
    }
}

/// Role-specific payload of an account.
///
/// Externally tagged: the write-ahead log encodes rows with bincode, which
/// cannot decode internally tagged enums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountProfile {
    Student {
        /// Cached sum of this student's log hours.
        cumulative_hours: u64,
        /// Write-once accolade summary; never the source of truth.
        accolade: Option<String>,
    },
    Staff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    pub profile: AccountProfile,
}

impl Account {
    pub fn student(id: AccountId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            profile: AccountProfile::Student {
                cumulative_hours: 0,
                accolade: None,
            },
        }
    }

    pub fn staff(id: AccountId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            profile: AccountProfile::Staff,
        }
    }

    pub fn role(&self) -> Role {
        match self.profile {
            AccountProfile::Student { .. } => Role::Student,
            AccountProfile::Staff => Role::Staff,
        }
    }

    /// Cached cumulative hours, or `None` for staff.
    pub fn cumulative_hours(&self) -> Option<u64> {
        match self.profile {
            AccountProfile::Student {
                cumulative_hours, ..
            } => Some(cumulative_hours),
            AccountProfile::Staff => None,
        }
    }

    pub fn cached_accolade(&self) -> Option<&str> {
        match &self.profile {
            AccountProfile::Student { accolade, .. } => accolade.as_deref(),
            AccountProfile::Staff => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
}

/// A pending request. Resolution deletes the row; there is no resolved state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub student_id: AccountId,
    pub activity_id: ActivityId,
    pub hours: u32,
}

/// An awarded hour grant. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: LogId,
    pub staff_id: AccountId,
    pub student_id: AccountId,
    pub activity_id: ActivityId,
    pub hours: u32,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_follows_profile() {
        let bob = Account::student(AccountId(1), "bob");
        let dean = Account::staff(AccountId(2), "dean");
        assert_eq!(bob.role(), Role::Student);
        assert_eq!(bob.cumulative_hours(), Some(0));
        assert_eq!(dean.role(), Role::Staff);
        assert_eq!(dean.cumulative_hours(), None);
        assert_eq!(dean.cached_accolade(), None);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Staff".parse::<Role>().unwrap(), Role::Staff);
        assert_eq!(" student ".parse::<Role>().unwrap(), Role::Student);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn ids_serialize_as_bare_integers() {
        let json = serde_json::to_string(&RequestId(7)).unwrap();
        assert_eq!(json, "7");
        assert_eq!(RequestId(7).to_string(), "request#7");
    }
}
