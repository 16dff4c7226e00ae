use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod user_repository;
pub mod book_repository;
pub mod issue_repository;
pub mod fine_repository;
pub mod payment_repository;

pub use user_repository::SqliteUserRepository;
pub use book_repository::SqliteBookRepository;
pub use issue_repository::SqliteIssueRepository;
pub use fine_repository::SqliteFineRepository;
pub use payment_repository::SqlitePaymentRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User>;
    /// Inserts an admin only if no admin exists yet, as one statement.
    /// Returns `None` when another admin is already registered.
    async fn create_sole_admin(&self, user: NewUser) -> Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_by_username_or_email(&self, username: &str, email: &str) -> Result<Option<User>>;
    /// User and stored password hash, for login.
    async fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>>;
    async fn list(&self) -> Result<Vec<User>>;
    async fn count_by_role(&self, role: Role) -> Result<i64>;
    async fn update_role(&self, id: Uuid, role: Role) -> Result<User>;
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn create(&self, book: CreateBookRequest, added_by: Uuid) -> Result<Book>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Book>>;
    async fn list(&self, filter: &BookFilter) -> Result<Vec<Book>>;
    async fn update(&self, id: Uuid, update: UpdateBookRequest) -> Result<Book>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
    /// Flips availability from true to false. Returns false if the copy was already out.
    async fn claim_copy(&self, id: Uuid) -> Result<bool>;
    async fn release_copy(&self, id: Uuid) -> Result<()>;
    async fn upsert_rating(&self, book_id: Uuid, user_id: Uuid, rating: i32) -> Result<()>;
    async fn count(&self) -> Result<i64>;
}

#[async_trait]
pub trait IssueRepository: Send + Sync {
    async fn create(&self, issue: NewIssue) -> Result<Issue>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Issue>>;
    async fn find_active(&self, user_id: Uuid, book_id: Uuid) -> Result<Option<Issue>>;
    /// Closes an open issue. Returns `None` if it was not open.
    async fn mark_returned(&self, id: Uuid, return_date: DateTime<Utc>) -> Result<Option<Issue>>;
    async fn list_active(&self) -> Result<Vec<Issue>>;
    async fn list_details(&self, user_id: Option<Uuid>) -> Result<Vec<IssueDetails>>;
    async fn list_active_details(&self) -> Result<Vec<IssueDetails>>;
    async fn count_active(&self) -> Result<i64>;
}

#[async_trait]
pub trait FineRepository: Send + Sync {
    /// Creates the fine for an issue, or raises a pending one to the assessed
    /// figures. Paid fines are left untouched. Returns the stored fine.
    async fn upsert_pending(&self, assessment: &FineAssessment) -> Result<Fine>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Fine>>;
    async fn find_by_issue(&self, issue_id: Uuid) -> Result<Option<Fine>>;
    async fn find_details(&self, id: Uuid) -> Result<Option<FineDetails>>;
    async fn list_details(&self, user_id: Option<Uuid>) -> Result<Vec<FineDetails>>;
    /// Settles a pending fine. Returns `None` if it was not pending.
    async fn mark_paid(&self, id: Uuid, paid_at: DateTime<Utc>) -> Result<Option<Fine>>;
    async fn totals(&self, status: FineStatus) -> Result<FineTotals>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: NewPayment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_reference(&self, reference: &str, user_id: Uuid) -> Result<Option<Payment>>;
    async fn list_by_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Payment>>;
    async fn update_status(&self, id: Uuid, status: PaymentStatus) -> Result<Payment>;
}
