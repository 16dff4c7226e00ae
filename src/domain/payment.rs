use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub reference: String,
    pub status: PaymentStatus,
    pub description: String,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "success" => Some(PaymentStatus::Success),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Upi,
    Cash,
    Card,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Upi => "upi",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "upi" => Some(PaymentMethod::Upi),
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            _ => None,
        }
    }
}

/// Method-specific details captured with a payment.
///
/// Known shapes are typed. Keys outside a known shape are kept in `extra`,
/// and anything else the client sends is an opaque key/value bag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PaymentDetails {
    Upi {
        #[serde(rename = "upiId")]
        upi_id: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Card {
        #[serde(rename = "cardLast4")]
        card_last4: String,
        #[serde(rename = "cardHolder", default, skip_serializing_if = "Option::is_none")]
        card_holder: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Other(Map<String, Value>),
}

impl Default for PaymentDetails {
    fn default() -> Self {
        PaymentDetails::Other(Map::new())
    }
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub amount: i64,
    pub reference: String,
    pub status: PaymentStatus,
    pub description: String,
    pub payment_method: PaymentMethod,
    pub payment_details: PaymentDetails,
}
