pub mod fine_policy;
pub mod payment_service;
pub mod user_service;
pub mod book_service;
pub mod issue_service;
pub mod fine_service;
pub mod dashboard_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::AuthService;
use crate::config::Settings;
use crate::payments::SimulatedGateway;
use fine_policy::FineReconciler;
use payment_service::PaymentService;
use user_service::UserService;
use book_service::BookService;
use issue_service::IssueService;
use fine_service::FineService;
use dashboard_service::DashboardService;

pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub book_repo: Arc<dyn BookRepository>,
    pub issue_repo: Arc<dyn IssueRepository>,
    pub fine_repo: Arc<dyn FineRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub book_service: Arc<BookService>,
    pub issue_service: Arc<IssueService>,
    pub fine_service: Arc<FineService>,
    pub payment_service: Arc<PaymentService>,
    pub dashboard_service: Arc<DashboardService>,
}

impl ServiceContext {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        book_repo: Arc<dyn BookRepository>,
        issue_repo: Arc<dyn IssueRepository>,
        fine_repo: Arc<dyn FineRepository>,
        payment_repo: Arc<dyn PaymentRepository>,
        auth_service: Arc<AuthService>,
        settings: &Settings,
    ) -> Self {
        let reconciler = Arc::new(FineReconciler::new(settings.fines.policy(), fine_repo.clone()));

        let payment_service = Arc::new(PaymentService::new(
            payment_repo.clone(),
            SimulatedGateway::new(settings.payments.success_rate),
        ));
        let user_service = Arc::new(UserService::new(
            user_repo.clone(),
            auth_service.clone(),
            payment_service.clone(),
            settings.auth.member_fee,
        ));
        let book_service = Arc::new(BookService::new(book_repo.clone()));
        let issue_service = Arc::new(IssueService::new(
            issue_repo.clone(),
            book_repo.clone(),
            reconciler,
            settings.catalog.copy_policy,
        ));
        let fine_service = Arc::new(FineService::new(fine_repo.clone()));
        let dashboard_service = Arc::new(DashboardService::new(
            user_repo.clone(),
            book_repo.clone(),
            issue_service.clone(),
            fine_service.clone(),
        ));

        Self {
            user_repo,
            book_repo,
            issue_repo,
            fine_repo,
            payment_repo,
            auth_service,
            user_service,
            book_service,
            issue_service,
            fine_service,
            payment_service,
            dashboard_service,
        }
    }

    /// Wires every repository to the same SQLite pool.
    pub fn sqlite(db_pool: SqlitePool, settings: &Settings) -> Self {
        let auth_service = Arc::new(AuthService::new(
            &settings.auth.jwt_secret,
            settings.auth.token_ttl_days,
        ));

        Self::new(
            Arc::new(SqliteUserRepository::new(db_pool.clone())),
            Arc::new(SqliteBookRepository::new(db_pool.clone())),
            Arc::new(SqliteIssueRepository::new(db_pool.clone())),
            Arc::new(SqliteFineRepository::new(db_pool.clone())),
            Arc::new(SqlitePaymentRepository::new(db_pool)),
            auth_service,
            settings,
        )
    }
}
