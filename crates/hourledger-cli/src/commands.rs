//! Command bodies. Each one opens the service, runs one core operation, and
//! prints the result.

use anyhow::{anyhow, bail, Context as _, Result};
use colored::Colorize;
use hourledger_engine::{EngineConfig, HoursService};
use hourledger_model::{Caller, LedgerError, RequestId, Role};
use std::fs;
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "./hourledger-data";

pub struct Context {
    config: EngineConfig,
    as_user: Option<String>,
}

impl Context {
    pub fn new(
        data_dir: Option<PathBuf>,
        config_path: Option<PathBuf>,
        as_user: Option<String>,
    ) -> Result<Self> {
        let mut config = match &config_path {
            Some(path) => EngineConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(dir) = data_dir {
            config.storage.data_dir = Some(dir);
        }
        if config.storage.data_dir.is_none() {
            config.storage.data_dir = Some(PathBuf::from(DEFAULT_DATA_DIR));
        }
        Ok(Self { config, as_user })
    }

    fn data_dir(&self) -> PathBuf {
        self.config
            .storage
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    fn service(&self) -> Result<HoursService> {
        HoursService::open(self.config.clone())
            .with_context(|| format!("opening ledger in {}", self.data_dir().display()))
    }

    /// The `--as` identity, which must hold `role`.
    fn caller(&self, service: &HoursService, role: Option<Role>) -> Result<Caller> {
        let username = self
            .as_user
            .as_deref()
            .ok_or_else(|| anyhow!("Not logged in. Pass --as <username>."))?;
        let caller = service.caller_for(username)?;
        if let Some(role) = role {
            if caller.role != role {
                bail!("Not logged in as {role}. Cannot perform this function.");
            }
        }
        Ok(caller)
    }
}

/// Run `op`, retrying once if the store reports a conflict.
fn retry_once<T>(
    mut op: impl FnMut() -> hourledger_model::Result<T>,
) -> hourledger_model::Result<T> {
    match op() {
        Err(err) if err.is_retryable() => {
            tracing::warn!(error = %err, "retrying after conflict");
            op()
        }
        other => other,
    }
}

fn describe(err: LedgerError) -> anyhow::Error {
    match err {
        LedgerError::NotFound { kind: "request", key } => {
            anyhow!("{key} is not pending (already resolved or never submitted)")
        }
        other => other.into(),
    }
}

pub fn cmd_init(ctx: &Context) -> Result<()> {
    let dir = ctx.data_dir();
    for name in [&ctx.config.storage.wal_file, &ctx.config.storage.snapshot_file] {
        let path = dir.join(name);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
    }
    let service = ctx.service()?;
    service.seed_defaults()?;
    println!("{} {}", "Initialized".green().bold(), dir.display());
    Ok(())
}

pub fn cmd_leaderboard(ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let board = service.leaderboard();
    if board.is_empty() {
        println!("No students added.");
        return Ok(());
    }
    println!("{}", "=====LEADERBOARD=====".bold());
    for (i, entry) in board.iter().enumerate() {
        println!(
            "{}. {}: {} Hours",
            i + 1,
            entry.username.cyan(),
            entry.cumulative_hours
        );
    }
    Ok(())
}

pub fn cmd_user_create(ctx: &Context, role: &str, username: &str) -> Result<()> {
    let role: Role = role.parse()?;
    let service = ctx.service()?;
    let id = match role {
        Role::Student => service.create_student(username)?,
        Role::Staff => service.create_staff(username)?,
    };
    println!(
        "{} {role}: {} (id = {})",
        "Created".green().bold(),
        username.cyan(),
        id.get()
    );
    Ok(())
}

pub fn cmd_user_list(ctx: &Context, json: bool) -> Result<()> {
    let service = ctx.service()?;
    let accounts = service.list_accounts();
    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }
    for account in &accounts {
        match account.cumulative_hours() {
            Some(hours) => println!(
                "  {} {} ({}) {} hours",
                account.id.get(),
                account.username.cyan(),
                account.role(),
                hours
            ),
            None => println!(
                "  {} {} ({})",
                account.id.get(),
                account.username.cyan(),
                account.role()
            ),
        }
    }
    Ok(())
}

pub fn cmd_activity_create(ctx: &Context, name: &str) -> Result<()> {
    let service = ctx.service()?;
    let id = service.create_activity(name)?;
    println!(
        "{} activity {} (id = {})",
        "Created".green().bold(),
        name.cyan(),
        id.get()
    );
    Ok(())
}

pub fn cmd_activity_list(ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    for activity in service.list_activities() {
        println!("  {} {}", activity.id.get(), activity.name.cyan());
    }
    Ok(())
}

pub fn cmd_request_submit(ctx: &Context, activity: &str, hours: u32) -> Result<()> {
    let service = ctx.service()?;
    let caller = ctx.caller(&service, Some(Role::Student))?;
    let activity_id = service.activity_by_name(activity)?.id;
    let id = retry_once(|| service.submit_request(&caller, caller.account_id, activity_id, hours))?;
    println!(
        "{} request {} for {hours} hours on {}",
        "Submitted".green().bold(),
        id.get(),
        activity.cyan()
    );
    Ok(())
}

pub fn cmd_request_list(ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let caller = ctx.caller(&service, None)?;
    let pending = match caller.role {
        Role::Staff => service.list_pending_requests(&caller)?,
        Role::Student => service.my_pending_requests(&caller)?,
    };
    if pending.is_empty() {
        println!("No pending requests.");
        return Ok(());
    }

    let accounts = service.list_accounts();
    let activities = service.list_activities();
    for request in pending {
        let student = accounts
            .iter()
            .find(|a| a.id == request.student_id)
            .map(|a| a.username.as_str())
            .unwrap_or("?");
        let activity = activities
            .iter()
            .find(|a| a.id == request.activity_id)
            .map(|a| a.name.as_str())
            .unwrap_or("?");
        println!(
            "  #{} {} {} hours on {}",
            request.id.get(),
            student.cyan(),
            request.hours,
            activity
        );
    }
    Ok(())
}

pub fn cmd_request_approve(ctx: &Context, id: u64) -> Result<()> {
    let service = ctx.service()?;
    let caller = ctx.caller(&service, Some(Role::Staff))?;
    let approval =
        retry_once(|| service.approve_request(&caller, RequestId(id))).map_err(describe)?;
    println!(
        "{} request {id} (log {}). Student total: {} Hours",
        "Approved".green().bold(),
        approval.log_id.get(),
        approval.new_total_hours
    );
    Ok(())
}

pub fn cmd_request_reject(ctx: &Context, id: u64) -> Result<()> {
    let service = ctx.service()?;
    let caller = ctx.caller(&service, Some(Role::Staff))?;
    let rejection =
        retry_once(|| service.reject_request(&caller, RequestId(id))).map_err(describe)?;
    println!(
        "{} request {id} ({} hours)",
        "Rejected".yellow().bold(),
        rejection.rejected_hours
    );
    Ok(())
}

pub fn cmd_log(ctx: &Context, username: &str, activity: &str, hours: u32) -> Result<()> {
    let service = ctx.service()?;
    let caller = ctx.caller(&service, Some(Role::Staff))?;
    let student = service
        .account_by_username(username)
        .map_err(|_| anyhow!("User does not exist."))?;
    let activity_id = service.activity_by_name(activity)?.id;
    let approval =
        retry_once(|| service.log_hours_directly(&caller, student.id, activity_id, hours))?;
    println!("Logged {hours} hours for {username} successfully.");
    println!(
        "{}'s Total Hours: {} Hours",
        username.cyan(),
        approval.new_total_hours
    );
    Ok(())
}

pub fn cmd_accolades(ctx: &Context, username: Option<&str>) -> Result<()> {
    let service = ctx.service()?;
    let caller = ctx.caller(&service, None)?;
    let student_id = match username {
        Some(name) => service.account_by_username(name)?.id,
        None => caller.account_id,
    };
    let accolades = service.accolades(&caller, student_id)?;
    for (activity, label) in &accolades {
        println!("  {}: {}", activity.cyan(), label);
    }
    Ok(())
}

pub fn cmd_audit(ctx: &Context, repair: bool) -> Result<()> {
    let service = ctx.service()?;
    let caller = ctx.caller(&service, Some(Role::Staff))?;
    let drift = if repair {
        service.repair_hours(&caller)?
    } else {
        service.audit_hours(&caller)?
    };
    if drift.is_empty() {
        println!("{} every total matches the log", "OK".green().bold());
        return Ok(());
    }
    for d in &drift {
        println!(
            "  {} cached {} logged {}",
            d.username.yellow(),
            d.cached_hours,
            d.logged_hours
        );
    }
    if repair {
        println!("{} {} totals", "Repaired".green().bold(), drift.len());
    } else {
        bail!("{} totals disagree with the log (rerun with --repair)", drift.len());
    }
    Ok(())
}

pub fn cmd_checkpoint(ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    service.checkpoint()?;
    println!("{} {}", "Checkpointed".green().bold(), ctx.data_dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn conflict() -> LedgerError {
        LedgerError::Conflict {
            resource: "ledger store".to_string(),
        }
    }

    #[test]
    fn conflict_is_retried_once() {
        let calls = Cell::new(0);
        let result = retry_once(|| {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(conflict())
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn second_conflict_is_returned() {
        let calls = Cell::new(0);
        let result: hourledger_model::Result<()> = retry_once(|| {
            calls.set(calls.get() + 1);
            Err(conflict())
        });
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: hourledger_model::Result<()> = retry_once(|| {
            calls.set(calls.get() + 1);
            Err(LedgerError::not_found("request", RequestId(3)))
        });
        let message = describe(result.unwrap_err()).to_string();
        assert!(message.contains("not pending"), "{message}");
        assert_eq!(calls.get(), 1);
    }
}
