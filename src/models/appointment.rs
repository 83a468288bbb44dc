use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AppointmentStatus, Priority, RiskLevel};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub department_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub reason: Option<String>,
    pub symptoms: Vec<String>,
    pub status: AppointmentStatus,
    pub priority: Priority,
    /// Time-of-booking triage snapshot. Denormalized on purpose: it
    /// never updates retroactively, even if a later prediction for
    /// the same patient would differ.
    pub triage_snapshot: Option<TriageSnapshot>,
    pub ai_scheduled: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageSnapshot {
    pub predicted_disease: String,
    pub risk_level: RiskLevel,
    pub confidence: f64,
}
