use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Gender, RiskLevel};

/// Observational log of a successful prediction made by a patient.
/// Written by the standalone prediction endpoint only; the booking
/// orchestrator never reads these back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriagePrediction {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub symptoms: Vec<String>,
    pub age: i64,
    pub gender: Gender,
    pub medical_history: Vec<String>,
    pub predicted_disease: String,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}
