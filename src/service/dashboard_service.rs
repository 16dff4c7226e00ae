use std::sync::Arc;

use serde::Serialize;

use crate::{
    domain::*,
    error::Result,
    repository::{BookRepository, UserRepository},
    service::{fine_service::FineService, issue_service::IssueService},
};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_members: i64,
    pub total_books: i64,
    pub total_issued_books: i64,
    pub total_pending_fines: i64,
    pub pending_fines_count: i64,
    pub total_fines_collected: i64,
    pub collected_fines_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub issued_books: Vec<IssueDetails>,
    pub fines: Vec<FineDetails>,
}

pub struct DashboardService {
    user_repo: Arc<dyn UserRepository>,
    book_repo: Arc<dyn BookRepository>,
    issue_service: Arc<IssueService>,
    fine_service: Arc<FineService>,
}

impl DashboardService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        book_repo: Arc<dyn BookRepository>,
        issue_service: Arc<IssueService>,
        fine_service: Arc<FineService>,
    ) -> Self {
        Self { user_repo, book_repo, issue_service, fine_service }
    }

    /// Surfaces fines for overdue open issues, then aggregates.
    pub async fn load(&self, admin: &User) -> Result<Dashboard> {
        self.issue_service.refresh_overdue_fines().await?;

        let pending = self.fine_service.totals(FineStatus::Pending).await?;
        let collected = self.fine_service.totals(FineStatus::Paid).await?;

        let stats = DashboardStats {
            total_members: self.user_repo.count_by_role(Role::Member).await?,
            total_books: self.book_repo.count().await?,
            total_issued_books: self.issue_service.count_active().await?,
            total_pending_fines: pending.total,
            pending_fines_count: pending.count,
            total_fines_collected: collected.total,
            collected_fines_count: collected.count,
        };

        Ok(Dashboard {
            stats,
            issued_books: self.issue_service.active_issues().await?,
            fines: self.fine_service.list(admin).await?,
        })
    }
}
