use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BookSummary, UserSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub issue_id: Uuid,
    pub amount: i64,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub days_overdue: i64,
    pub status: FineStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fine {
    pub fn is_paid(&self) -> bool {
        self.status == FineStatus::Paid
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FineStatus {
    Pending,
    Paid,
}

impl FineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FineStatus::Pending => "pending",
            FineStatus::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FineStatus::Pending),
            "paid" => Some(FineStatus::Paid),
            _ => None,
        }
    }
}

/// A computed charge for one issue, ready to be reconciled into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct FineAssessment {
    pub issue_id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub days_overdue: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FineDetails {
    #[serde(flatten)]
    pub fine: Fine,
    pub user: UserSummary,
    /// `None` once the title has been removed from the catalog.
    pub book: Option<BookSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberFines {
    pub fines: Vec<FineDetails>,
    pub total_pending: i64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FineTotals {
    pub total: i64,
    pub count: i64,
}

/// Paid and pending totals side by side.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FineSummary {
    pub total_amount: i64,
    pub total_paid: i64,
    pub total_pending: i64,
    pub count: i64,
    pub paid_count: i64,
    pub pending_count: i64,
}

impl FineSummary {
    pub fn new(paid: FineTotals, pending: FineTotals) -> Self {
        Self {
            total_amount: paid.total + pending.total,
            total_paid: paid.total,
            total_pending: pending.total,
            count: paid.count + pending.count,
            paid_count: paid.count,
            pending_count: pending.count,
        }
    }
}
