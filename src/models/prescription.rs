use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub medications: Vec<Medication>,
    pub diagnosis: String,
    pub treatment_notes: Option<String>,
    pub additional_notes: Option<String>,
    pub prescription_date: DateTime<Utc>,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// One medication line. Name, dosage, frequency, and duration are all
/// required; a partially filled entry is rejected rather than stored
/// with holes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
    pub instructions: Option<String>,
}
