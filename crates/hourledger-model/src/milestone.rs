//! Milestone resolution.
//!
//! A milestone is a named label attached to a cumulative-hours threshold.
//! Thresholds are per activity: [`MilestoneCatalog::milestones_for`] picks the
//! table for an activity name and [`resolve`] maps a cumulative hour count to
//! the label of the highest threshold it has reached.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label returned when no threshold has been reached.
pub const NO_MILESTONE: &str = "No milestone reached yet.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub threshold: u64,
    pub label: String,
}

impl Milestone {
    pub fn new(threshold: u64, label: impl Into<String>) -> Self {
        Self {
            threshold,
            label: label.into(),
        }
    }
}

/// Label of the highest threshold not exceeding `hours`.
///
/// `thresholds` must be ascending. Below the lowest threshold (or for an empty
/// table) the result is [`NO_MILESTONE`].
pub fn resolve(hours: u64, thresholds: &[Milestone]) -> &str {
    // partition_point needs the predicate to be true for a prefix, which
    // ascending thresholds guarantee.
    let reached = thresholds.partition_point(|m| m.threshold <= hours);
    match reached {
        0 => NO_MILESTONE,
        n => thresholds[n - 1].label.as_str(),
    }
}

/// A validated, strictly ascending threshold table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Milestone>", into = "Vec<Milestone>")]
pub struct MilestoneTable {
    milestones: Vec<Milestone>,
}

impl MilestoneTable {
    pub fn new(milestones: Vec<Milestone>) -> Result<Self> {
        for pair in milestones.windows(2) {
            if pair[0].threshold >= pair[1].threshold {
                return Err(LedgerError::validation(format!(
                    "milestone thresholds must be strictly ascending ({} then {})",
                    pair[0].threshold, pair[1].threshold
                )));
            }
        }
        if let Some(m) = milestones.iter().find(|m| m.label.trim().is_empty()) {
            return Err(LedgerError::validation(format!(
                "milestone at {} hours has an empty label",
                m.threshold
            )));
        }
        Ok(Self { milestones })
    }

    /// 10 / 25 / 50 hour milestones.
    pub fn standard() -> Self {
        Self {
            milestones: vec![
                Milestone::new(10, "10 Hour Milestone"),
                Milestone::new(25, "25 Hour Milestone"),
                Milestone::new(50, "50 Hour Milestone"),
            ],
        }
    }

    pub fn resolve(&self, hours: u64) -> &str {
        resolve(hours, &self.milestones)
    }

    /// Position of the reached milestone, 0 meaning none.
    pub fn rank(&self, hours: u64) -> usize {
        self.milestones.partition_point(|m| m.threshold <= hours)
    }

    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }
}

impl Default for MilestoneTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<Milestone>> for MilestoneTable {
    type Error = LedgerError;

    fn try_from(milestones: Vec<Milestone>) -> Result<Self> {
        Self::new(milestones)
    }
}

impl From<MilestoneTable> for Vec<Milestone> {
    fn from(table: MilestoneTable) -> Self {
        table.milestones
    }
}

/// Per-activity threshold tables with a fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneCatalog {
    #[serde(default)]
    pub default: MilestoneTable,
    #[serde(default)]
    pub per_activity: BTreeMap<String, MilestoneTable>,
}

impl MilestoneCatalog {
    pub fn with_activity(mut self, activity_name: impl Into<String>, table: MilestoneTable) -> Self {
        self.per_activity.insert(activity_name.into(), table);
        self
    }

    pub fn milestones_for(&self, activity_name: &str) -> &MilestoneTable {
        self.per_activity
            .get(activity_name)
            .unwrap_or(&self.default)
    }
}
