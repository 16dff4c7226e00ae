use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::{BookRepository, IssueRepository},
    service::fine_policy::FineReconciler,
};

/// Result of a fine refresh pass over the open issues.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub scanned: usize,
    pub fined: usize,
}

pub struct IssueService {
    issue_repo: Arc<dyn IssueRepository>,
    book_repo: Arc<dyn BookRepository>,
    reconciler: Arc<FineReconciler>,
    copy_policy: CopyPolicy,
}

impl IssueService {
    pub fn new(
        issue_repo: Arc<dyn IssueRepository>,
        book_repo: Arc<dyn BookRepository>,
        reconciler: Arc<FineReconciler>,
        copy_policy: CopyPolicy,
    ) -> Self {
        Self { issue_repo, book_repo, reconciler, copy_policy }
    }

    pub async fn issue_book(&self, user_id: Uuid, book_id: Uuid) -> Result<Issue> {
        self.issue_book_at(user_id, book_id, Utc::now()).await
    }

    pub async fn issue_book_at(&self, user_id: Uuid, book_id: Uuid, now: DateTime<Utc>) -> Result<Issue> {
        if self.book_repo.find_by_id(book_id).await?.is_none() {
            return Err(AppError::NotFound("Book not found".to_string()));
        }

        if self.issue_repo.find_active(user_id, book_id).await?.is_some() {
            return Err(AppError::Conflict("You already have this book issued".to_string()));
        }

        if self.copy_policy == CopyPolicy::SingleCopy && !self.book_repo.claim_copy(book_id).await? {
            return Err(AppError::Conflict("Book is not available".to_string()));
        }

        let new_issue = NewIssue {
            user_id,
            book_id,
            issue_date: now,
            due_date: self.reconciler.policy().due_date(now),
        };

        // The partial unique index still guards against a racing duplicate
        match self.issue_repo.create(new_issue).await {
            Ok(issue) => {
                tracing::info!(issue_id = %issue.id, user_id = %user_id, book_id = %book_id, "book issued");
                Ok(issue)
            }
            Err(e) => {
                if self.copy_policy == CopyPolicy::SingleCopy {
                    self.book_repo.release_copy(book_id).await?;
                }
                Err(e)
            }
        }
    }

    /// Member return of their own open issue for `book_id`.
    pub async fn return_book(&self, user_id: Uuid, book_id: Uuid) -> Result<ReturnOutcome> {
        self.return_book_at(user_id, book_id, Utc::now()).await
    }

    pub async fn return_book_at(&self, user_id: Uuid, book_id: Uuid, now: DateTime<Utc>) -> Result<ReturnOutcome> {
        let issue = self
            .issue_repo
            .find_active(user_id, book_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No active issue found for this book".to_string()))?;

        self.close(issue, now).await
    }

    /// Admin return of any issue by id.
    pub async fn force_return(&self, issue_id: Uuid) -> Result<ReturnOutcome> {
        self.force_return_at(issue_id, Utc::now()).await
    }

    pub async fn force_return_at(&self, issue_id: Uuid, now: DateTime<Utc>) -> Result<ReturnOutcome> {
        let issue = self
            .issue_repo
            .find_by_id(issue_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Issue not found".to_string()))?;

        if issue.is_returned() {
            return Err(AppError::Conflict("Book already returned".to_string()));
        }

        self.close(issue, now).await
    }

    async fn close(&self, issue: Issue, now: DateTime<Utc>) -> Result<ReturnOutcome> {
        // Conditional on status, so only one of two racing returns gets here with Some
        let issue = self
            .issue_repo
            .mark_returned(issue.id, now)
            .await?
            .ok_or_else(|| AppError::Conflict("Book already returned".to_string()))?;

        if self.copy_policy == CopyPolicy::SingleCopy {
            self.book_repo.release_copy(issue.book_id).await?;
        }

        let fine = self.reconciler.reconcile(&issue, now).await?;
        tracing::info!(
            issue_id = %issue.id,
            fined = fine.is_some(),
            "book returned"
        );

        Ok(ReturnOutcome { issue, fine })
    }

    /// Reconciles fines for every open issue.
    pub async fn refresh_overdue_fines(&self) -> Result<RefreshSummary> {
        self.refresh_overdue_fines_at(Utc::now()).await
    }

    pub async fn refresh_overdue_fines_at(&self, now: DateTime<Utc>) -> Result<RefreshSummary> {
        let active = self.issue_repo.list_active().await?;
        let mut summary = RefreshSummary { scanned: active.len(), fined: 0 };

        for issue in &active {
            if self.reconciler.reconcile(issue, now).await?.is_some() {
                summary.fined += 1;
            }
        }

        tracing::debug!(scanned = summary.scanned, fined = summary.fined, "overdue fines refreshed");
        Ok(summary)
    }

    pub async fn my_issues(&self, user_id: Uuid) -> Result<Vec<IssueDetails>> {
        self.issue_repo.list_details(Some(user_id)).await
    }

    pub async fn all_issues(&self) -> Result<Vec<IssueDetails>> {
        self.issue_repo.list_details(None).await
    }

    pub async fn active_issues(&self) -> Result<Vec<IssueDetails>> {
        self.issue_repo.list_active_details().await
    }

    pub async fn count_active(&self) -> Result<i64> {
        self.issue_repo.count_active().await
    }
}
