use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ConditionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blood_group: Option<String>,
    pub allergies: Vec<String>,
    pub medical_history: Vec<MedicalHistoryEntry>,
    pub emergency_contact: Option<EmergencyContact>,
    pub insurance_info: Option<InsuranceInfo>,
    /// Doctor of record. Set once by the first booking (soft
    /// assignment) and only changed thereafter by an explicit,
    /// authorized reassignment.
    pub assigned_doctor_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalHistoryEntry {
    pub condition: String,
    pub diagnosis_date: Option<NaiveDate>,
    pub status: Option<ConditionStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceInfo {
    pub provider: String,
    pub policy_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}
