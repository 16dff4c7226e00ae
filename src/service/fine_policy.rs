//! Overdue fine computation and its reconciliation into the fine store.
//!
//! The computation is pure: given an issue and a reference instant it yields
//! an optional [`FineAssessment`]. [`FineReconciler`] then applies that
//! assessment with a single upsert keyed by issue id, so repeated calls for
//! the same issue never produce a second fine and never touch a paid one.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Fine, FineAssessment, Issue},
    error::Result,
    repository::FineRepository,
};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Which instant the overdue clock runs from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FineAnchor {
    /// Count whole days since the issue date and subtract the grace period.
    #[default]
    IssueDate,
    /// Count whole days past the stored due date.
    DueDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinePolicy {
    pub grace_days: i64,
    pub per_day: i64,
    pub anchor: FineAnchor,
}

impl Default for FinePolicy {
    fn default() -> Self {
        Self::new(10, 10, FineAnchor::IssueDate)
    }
}

impl FinePolicy {
    pub fn new(grace_days: i64, per_day: i64, anchor: FineAnchor) -> Self {
        Self { grace_days, per_day, anchor }
    }

    /// Due date for an issue opened at `issue_date`.
    pub fn due_date(&self, issue_date: DateTime<Utc>) -> DateTime<Utc> {
        issue_date + Duration::days(self.grace_days)
    }

    /// Whole days overdue at `at`, or zero when still inside the grace period.
    pub fn days_overdue(&self, issue: &Issue, at: DateTime<Utc>) -> i64 {
        let overdue = match self.anchor {
            FineAnchor::IssueDate => ceil_days(at - issue.issue_date) - self.grace_days,
            FineAnchor::DueDate => ceil_days(at - issue.due_date),
        };
        overdue.max(0)
    }

    /// Computes the fine owed for `issue` at `at`.
    ///
    /// Returned issues are always measured at their return date, whatever
    /// `at` is.
    pub fn assess(&self, issue: &Issue, at: DateTime<Utc>) -> Option<FineAssessment> {
        let measured_at = issue.return_date.unwrap_or(at);
        let days_overdue = self.days_overdue(issue, measured_at);
        if days_overdue == 0 {
            return None;
        }

        Some(FineAssessment {
            issue_id: issue.id,
            user_id: issue.user_id,
            book_id: issue.book_id,
            due_date: issue.due_date,
            return_date: issue.return_date,
            days_overdue,
            amount: days_overdue * self.per_day,
        })
    }
}

/// Rounds a span up to whole days; a span of exactly N days stays N.
fn ceil_days(span: Duration) -> i64 {
    let millis = span.num_milliseconds();
    let days = millis.div_euclid(MILLIS_PER_DAY);
    if millis.rem_euclid(MILLIS_PER_DAY) > 0 {
        days + 1
    } else {
        days
    }
}

pub struct FineReconciler {
    policy: FinePolicy,
    fine_repo: Arc<dyn FineRepository>,
}

impl FineReconciler {
    pub fn new(policy: FinePolicy, fine_repo: Arc<dyn FineRepository>) -> Self {
        Self { policy, fine_repo }
    }

    pub fn policy(&self) -> &FinePolicy {
        &self.policy
    }

    /// Brings the stored fine for `issue` in line with the policy at `now`.
    ///
    /// Returns the fine as stored after reconciliation, or `None` when the
    /// issue is not overdue. A paid fine is returned untouched.
    pub async fn reconcile(&self, issue: &Issue, now: DateTime<Utc>) -> Result<Option<Fine>> {
        let Some(assessment) = self.policy.assess(issue, now) else {
            return Ok(None);
        };

        let fine = self.fine_repo.upsert_pending(&assessment).await?;

        if fine.is_paid() {
            tracing::debug!(issue_id = %issue.id, fine_id = %fine.id, "fine already paid, left as is");
        } else {
            tracing::info!(
                issue_id = %issue.id,
                fine_id = %fine.id,
                days_overdue = fine.days_overdue,
                amount = fine.amount,
                "fine reconciled"
            );
        }

        Ok(Some(fine))
    }
}
