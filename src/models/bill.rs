use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{PaymentMethod, PaymentStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub items: Vec<BillItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total_amount: f64,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_date: Option<DateTime<Utc>>,
    pub invoice_number: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// Server-computed `quantity * unit_price`; client values are
    /// ignored.
    pub total: f64,
}
