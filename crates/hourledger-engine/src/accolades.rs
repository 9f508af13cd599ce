//! Accolade Aggregator.
//!
//! Per-activity milestone labels computed from logged hours. The optional
//! cache on the student account is write-once: once a summary is stored it is
//! never refreshed, so it can lag behind later approvals. [`compute`] always
//! reads the log and is the value callers should trust.
//!
//! [`compute`]: AccoladeAggregator::compute

use hourledger_model::{AccountId, LedgerError, MilestoneCatalog, Result};
use hourledger_storage::{LedgerStore, Tables};
use std::collections::BTreeMap;

/// Activity name -> milestone label.
pub type Accolades = BTreeMap<String, String>;

pub struct AccoladeAggregator<'a> {
    store: &'a LedgerStore,
    catalog: &'a MilestoneCatalog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccoladeReport {
    pub accolades: Accolades,
    /// True when this call filled the cache.
    pub cached_now: bool,
}

impl<'a> AccoladeAggregator<'a> {
    pub fn new(store: &'a LedgerStore, catalog: &'a MilestoneCatalog) -> Self {
        Self { store, catalog }
    }

    fn summarize(&self, tables: &Tables, student_id: AccountId) -> Result<Accolades> {
        let hours = tables.hours_by_activity_for(student_id)?;
        Ok(tables
            .activities()
            .map(|activity| {
                let logged = hours.get(&activity.id).copied().unwrap_or_default();
                let label = self.catalog.milestones_for(&activity.name).resolve(logged);
                (activity.name.clone(), label.to_string())
            })
            .collect())
    }

    /// Milestone label for every known activity. Read-only.
    pub fn compute(&self, student_id: AccountId) -> Result<Accolades> {
        self.store.read(|tables| self.summarize(tables, student_id))
    }

    /// [`compute`](Self::compute), then store a JSON summary on the account if
    /// none is cached yet.
    pub fn compute_and_cache(&self, student_id: AccountId) -> Result<AccoladeReport> {
        let (accolades, already_cached) = self.store.read(|tables| {
            let accolades = self.summarize(tables, student_id)?;
            let cached = tables
                .account(student_id)
                .and_then(|a| a.cached_accolade())
                .is_some();
            Ok::<_, LedgerError>((accolades, cached))
        })?;
        if already_cached {
            return Ok(AccoladeReport {
                accolades,
                cached_now: false,
            });
        }

        self.store.transact(|tx| {
            let accolades = self.summarize(tx.tables(), student_id)?;
            let summary = serde_json::to_string(&accolades)
                .map_err(|e| LedgerError::corrupt(e.to_string()))?;
            let cached_now = tx.cache_accolade(student_id, summary)?;
            if cached_now {
                tracing::debug!(student = %student_id, "accolade summary cached");
            }
            Ok(AccoladeReport {
                accolades,
                cached_now,
            })
        })
    }
}
