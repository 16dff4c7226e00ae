use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    payments::{generate_reference, SimulatedGateway},
    repository::PaymentRepository,
};

const MAX_REFERENCE_ATTEMPTS: u32 = 5;
const REFERENCE_RETRY_DELAY: Duration = Duration::from_millis(100);
const HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPaymentRequest {
    pub amount: Option<i64>,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub payment_details: Option<PaymentDetails>,
}

pub struct PaymentService {
    repo: Arc<dyn PaymentRepository>,
    gateway: SimulatedGateway,
}

impl PaymentService {
    pub fn new(repo: Arc<dyn PaymentRepository>, gateway: SimulatedGateway) -> Self {
        Self { repo, gateway }
    }

    pub fn parse_method(raw: Option<&str>) -> Result<PaymentMethod> {
        raw.and_then(PaymentMethod::from_str).ok_or_else(|| {
            AppError::Validation(
                "Please provide a valid payment method (upi, cash, or card)".to_string(),
            )
        })
    }

    /// Stores `payment` under a fresh `prefix` reference, drawing a new one
    /// when the reference collides with an existing payment.
    pub async fn create_with_reference(&self, prefix: &str, mut payment: NewPayment) -> Result<Payment> {
        let mut attempts = 0;
        loop {
            payment.reference = generate_reference(prefix);
            match self.repo.create(payment.clone()).await {
                Ok(created) => return Ok(created),
                Err(AppError::Conflict(_)) => {
                    attempts += 1;
                    if attempts >= MAX_REFERENCE_ATTEMPTS {
                        tracing::error!(user_id = %payment.user_id, attempts, "payment reference collisions exhausted");
                        return Err(AppError::Internal(
                            "Failed to create payment. Please try again.".to_string(),
                        ));
                    }
                    tracing::warn!(user_id = %payment.user_id, attempts, "payment reference collision, retrying");
                    tokio::time::sleep(REFERENCE_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Registration fee for a new member. The fee is recorded as settled.
    pub async fn record_registration_fee(
        &self,
        user_id: Uuid,
        amount: i64,
        method: PaymentMethod,
        details: Option<PaymentDetails>,
    ) -> Result<Payment> {
        let payment = NewPayment {
            user_id,
            amount,
            reference: String::new(),
            status: PaymentStatus::Success,
            description: "Member Registration Fee".to_string(),
            payment_method: method,
            payment_details: details.unwrap_or_default(),
        };

        self.create_with_reference("MEMBER", payment).await
    }

    pub async fn process(&self, user_id: Uuid, request: ProcessPaymentRequest) -> Result<Payment> {
        let amount = request
            .amount
            .filter(|a| *a > 0)
            .ok_or_else(|| AppError::BadRequest("Please provide a valid amount".to_string()))?;
        let method = Self::parse_method(request.payment_method.as_deref())?;

        let payment = NewPayment {
            user_id,
            amount,
            reference: String::new(),
            status: self.gateway.charge(method),
            description: request
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "Library service payment".to_string()),
            payment_method: method,
            payment_details: request.payment_details.unwrap_or_default(),
        };

        let payment = self.create_with_reference("PAY", payment).await?;
        tracing::info!(
            user_id = %user_id,
            reference = %payment.reference,
            status = payment.status.as_str(),
            "payment processed"
        );
        Ok(payment)
    }

    pub async fn status(&self, user_id: Uuid, reference: &str) -> Result<Payment> {
        self.repo
            .find_by_reference(reference, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }

    pub async fn history(&self, caller_id: Uuid, user_id: Uuid) -> Result<Vec<Payment>> {
        if caller_id != user_id {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }
        self.repo.list_by_user(user_id, HISTORY_LIMIT).await
    }

    pub async fn verify(&self, user_id: Uuid, reference: Option<&str>) -> Result<Payment> {
        let reference = reference
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| AppError::BadRequest("Please provide a payment reference".to_string()))?;

        let payment = self.status(user_id, reference).await?;
        if payment.status != PaymentStatus::Pending {
            return Ok(payment);
        }

        let settled = self.gateway.verify(payment.status);
        tracing::info!(reference = %payment.reference, status = settled.as_str(), "payment verified");
        self.repo.update_status(payment.id, settled).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Rejects the first `collisions` inserts as duplicate references.
    struct CollidingRepo {
        collisions: Mutex<u32>,
        stored: Mutex<Vec<Payment>>,
    }

    impl CollidingRepo {
        fn new(collisions: u32) -> Self {
            Self {
                collisions: Mutex::new(collisions),
                stored: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PaymentRepository for CollidingRepo {
        async fn create(&self, payment: NewPayment) -> Result<Payment> {
            {
                let mut remaining = self.collisions.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(AppError::Conflict("UNIQUE constraint failed: payments.reference".into()));
                }
            }
            let now = Utc::now();
            let stored = Payment {
                id: Uuid::new_v4(),
                user_id: payment.user_id,
                amount: payment.amount,
                reference: payment.reference,
                status: payment.status,
                description: payment.description,
                payment_method: payment.payment_method,
                payment_details: payment.payment_details,
                created_at: now,
                updated_at: now,
            };
            self.stored.lock().unwrap().push(stored.clone());
            Ok(stored)
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
            Ok(self.stored.lock().unwrap().iter().find(|p| p.id == id).cloned())
        }

        async fn find_by_reference(&self, reference: &str, user_id: Uuid) -> Result<Option<Payment>> {
            Ok(self
                .stored
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.reference == reference && p.user_id == user_id)
                .cloned())
        }

        async fn list_by_user(&self, user_id: Uuid, _limit: i64) -> Result<Vec<Payment>> {
            Ok(self
                .stored
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn update_status(&self, id: Uuid, status: PaymentStatus) -> Result<Payment> {
            let mut stored = self.stored.lock().unwrap();
            let payment = stored
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| AppError::NotFound("Payment not found".into()))?;
            payment.status = status;
            Ok(payment.clone())
        }
    }

    #[tokio::test]
    async fn test_reference_collision_is_retried() {
        let service = PaymentService::new(Arc::new(CollidingRepo::new(2)), SimulatedGateway::new(1.0));

        let payment = service
            .record_registration_fee(Uuid::new_v4(), 200, PaymentMethod::Upi, None)
            .await
            .unwrap();

        assert!(payment.reference.starts_with("MEMBER-"));
        assert_eq!(payment.status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn test_reference_collisions_give_up_after_five_attempts() {
        let service = PaymentService::new(Arc::new(CollidingRepo::new(5)), SimulatedGateway::new(1.0));

        let err = service
            .record_registration_fee(Uuid::new_v4(), 200, PaymentMethod::Cash, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_process_validates_amount_and_method() {
        let service = PaymentService::new(Arc::new(CollidingRepo::new(0)), SimulatedGateway::new(1.0));
        let user_id = Uuid::new_v4();

        let err = service
            .process(user_id, ProcessPaymentRequest {
                amount: Some(0),
                payment_method: Some("cash".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = service
            .process(user_id, ProcessPaymentRequest {
                amount: Some(50),
                payment_method: Some("cheque".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_verify_settles_pending_payment() {
        let repo = Arc::new(CollidingRepo::new(0));
        let pending = PaymentService::new(repo.clone(), SimulatedGateway::new(0.0));
        let user_id = Uuid::new_v4();

        let payment = pending
            .process(user_id, ProcessPaymentRequest {
                amount: Some(120),
                payment_method: Some("card".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);

        let settling = PaymentService::new(repo, SimulatedGateway::new(1.0));
        let verified = settling.verify(user_id, Some(&payment.reference)).await.unwrap();
        assert_eq!(verified.status, PaymentStatus::Success);

        let err = settling.history(Uuid::new_v4(), user_id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
