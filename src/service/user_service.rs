use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthService,
    domain::*,
    error::{AppError, Result},
    repository::UserRepository,
    service::payment_service::PaymentService,
};

/// Body returned by register and login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentReceipt>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub reference: String,
    pub amount: i64,
}

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    auth_service: Arc<AuthService>,
    payment_service: Arc<PaymentService>,
    member_fee: i64,
}

impl UserService {
    pub fn new(
        repo: Arc<dyn UserRepository>,
        auth_service: Arc<AuthService>,
        payment_service: Arc<PaymentService>,
        member_fee: i64,
    ) -> Self {
        Self { repo, auth_service, payment_service, member_fee }
    }

    pub async fn register(&self, mut request: RegisterRequest) -> Result<AuthResponse> {
        request.username = request.username.trim().to_string();
        request.email = request.email.trim().to_lowercase();

        if request.username.is_empty() || request.email.is_empty() || request.password.is_empty() {
            return Err(AppError::BadRequest("Please provide all required fields".to_string()));
        }
        request.validate()?;

        if self
            .repo
            .find_by_username_or_email(&request.username, &request.email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = AuthService::hash_password(&request.password)?;
        let role = match request.role.as_deref() {
            None => Role::Member,
            Some(raw) => Role::from_str(raw).ok_or_else(|| {
                AppError::Validation("Invalid role. Must be admin or member".to_string())
            })?,
        };
        let new_user = NewUser {
            username: request.username,
            email: request.email,
            password_hash,
            role,
        };

        match role {
            // Admin registration is free, and only the first one succeeds
            Role::Admin => {
                let user = self.repo.create_sole_admin(new_user).await?.ok_or_else(|| {
                    AppError::Conflict(
                        "Admin user already exists. Only one admin account is allowed.".to_string(),
                    )
                })?;
                tracing::info!(user_id = %user.id, "admin registered");
                self.auth_response(user, None)
            }
            Role::Member => {
                let method = match request.payment_method.as_deref() {
                    None | Some("") => {
                        return Err(AppError::BadRequest(
                            "Member registration requires payment. Please select a payment method."
                                .to_string(),
                        ))
                    }
                    raw => PaymentService::parse_method(raw)?,
                };

                let user = self.repo.create(new_user).await?;
                let payment = self
                    .payment_service
                    .record_registration_fee(user.id, self.member_fee, method, request.payment_details)
                    .await?;

                tracing::info!(user_id = %user.id, reference = %payment.reference, "member registered");
                self.auth_response(
                    user,
                    Some(PaymentReceipt {
                        reference: payment.reference,
                        amount: payment.amount,
                    }),
                )
            }
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let email = request.email.trim().to_lowercase();
        if email.is_empty() || request.password.is_empty() {
            return Err(AppError::BadRequest("Please provide email and password".to_string()));
        }

        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

        let (user, password_hash) = self.repo.find_credentials(&email).await?.ok_or_else(invalid)?;
        if !AuthService::verify_password(&request.password, &password_hash)? {
            return Err(invalid());
        }

        self.auth_response(user, None)
    }

    pub async fn get(&self, id: Uuid) -> Result<User> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.repo.list().await
    }

    pub async fn update_role(&self, id: Uuid, role: Option<&str>) -> Result<User> {
        let role = role.and_then(Role::from_str).ok_or_else(|| {
            AppError::Validation("Invalid role. Must be admin or member".to_string())
        })?;

        let user = self.repo.update_role(id, role).await?;
        tracing::info!(user_id = %id, role = role.as_str(), "user role updated");
        Ok(user)
    }

    fn auth_response(&self, user: User, payment: Option<PaymentReceipt>) -> Result<AuthResponse> {
        let token = self.auth_service.issue_token(user.id)?;
        Ok(AuthResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            token,
            payment,
        })
    }
}
