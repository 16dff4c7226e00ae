use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::FineRepository,
};

pub struct FineService {
    repo: Arc<dyn FineRepository>,
}

impl FineService {
    pub fn new(repo: Arc<dyn FineRepository>) -> Self {
        Self { repo }
    }

    /// A member's fines plus the sum of the ones still pending
    pub async fn member_fines(&self, user_id: Uuid) -> Result<MemberFines> {
        let fines = self.repo.list_details(Some(user_id)).await?;
        let total_pending = fines
            .iter()
            .filter(|f| !f.fine.is_paid())
            .map(|f| f.fine.amount)
            .sum();

        Ok(MemberFines { fines, total_pending })
    }

    /// Admins see every fine, members only their own.
    pub async fn list(&self, caller: &User) -> Result<Vec<FineDetails>> {
        let scope = if caller.is_admin() { None } else { Some(caller.id) };
        self.repo.list_details(scope).await
    }

    pub async fn get(&self, caller: &User, id: Uuid) -> Result<FineDetails> {
        let details = self
            .repo
            .find_details(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Fine not found".to_string()))?;

        if !caller.is_admin() && details.fine.user_id != caller.id {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }
        Ok(details)
    }

    pub async fn pay_as_member(&self, user_id: Uuid, id: Uuid) -> Result<Fine> {
        self.pay_as_member_at(user_id, id, Utc::now()).await
    }

    pub async fn pay_as_member_at(&self, user_id: Uuid, id: Uuid, now: DateTime<Utc>) -> Result<Fine> {
        let fine = self.find(id).await?;
        if fine.user_id != user_id {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }

        self.settle(fine, now).await
    }

    pub async fn pay_as_admin(&self, id: Uuid) -> Result<Fine> {
        let fine = self.find(id).await?;
        self.settle(fine, Utc::now()).await
    }

    async fn find(&self, id: Uuid) -> Result<Fine> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Fine not found".to_string()))
    }

    async fn settle(&self, fine: Fine, now: DateTime<Utc>) -> Result<Fine> {
        let already_paid = || AppError::BadRequest("Fine already paid".to_string());
        if fine.is_paid() {
            return Err(already_paid());
        }

        // A concurrent payment may win between the read and this update
        let paid = self.repo.mark_paid(fine.id, now).await?.ok_or_else(already_paid)?;
        tracing::info!(fine_id = %paid.id, user_id = %paid.user_id, amount = paid.amount, "fine paid");
        Ok(paid)
    }

    pub async fn totals(&self, status: FineStatus) -> Result<FineTotals> {
        self.repo.totals(status).await
    }

    pub async fn summary(&self) -> Result<FineSummary> {
        let paid = self.repo.totals(FineStatus::Paid).await?;
        let pending = self.repo.totals(FineStatus::Pending).await?;
        Ok(FineSummary::new(paid, pending))
    }
}
