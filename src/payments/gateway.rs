use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};

use crate::domain::{PaymentMethod, PaymentStatus};

/// Decides how a payment settles. There is no real processor behind this;
/// cash always clears and electronic methods clear with a fixed probability.
pub struct SimulatedGateway {
    success_rate: f64,
}

impl SimulatedGateway {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }

    /// Status for a freshly submitted payment.
    pub fn charge(&self, method: PaymentMethod) -> PaymentStatus {
        match method {
            PaymentMethod::Cash => PaymentStatus::Success,
            PaymentMethod::Upi | PaymentMethod::Card => {
                if self.roll() {
                    PaymentStatus::Success
                } else {
                    PaymentStatus::Pending
                }
            }
        }
    }

    /// Settles a pending payment one way or the other.
    pub fn verify(&self, current: PaymentStatus) -> PaymentStatus {
        match current {
            PaymentStatus::Pending => {
                if self.roll() {
                    PaymentStatus::Success
                } else {
                    PaymentStatus::Failed
                }
            }
            settled => settled,
        }
    }

    fn roll(&self) -> bool {
        rand::thread_rng().gen_bool(self.success_rate)
    }
}

/// `PREFIX-<unix millis>-<9 uppercase alphanumerics>`
pub fn generate_reference(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cash_always_clears() {
        let gateway = SimulatedGateway::new(0.0);
        assert_eq!(gateway.charge(PaymentMethod::Cash), PaymentStatus::Success);
        assert_eq!(gateway.charge(PaymentMethod::Card), PaymentStatus::Pending);
    }

    #[test]
    fn test_verify_only_moves_pending() {
        let always = SimulatedGateway::new(1.0);
        let never = SimulatedGateway::new(0.0);
        assert_eq!(always.verify(PaymentStatus::Pending), PaymentStatus::Success);
        assert_eq!(never.verify(PaymentStatus::Pending), PaymentStatus::Failed);
        assert_eq!(never.verify(PaymentStatus::Success), PaymentStatus::Success);
    }

    #[test]
    fn test_reference_format() {
        let reference = generate_reference("PAY");
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "PAY");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
