use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Gender, Role};

/// Account record behind a patient, doctor, or admin principal.
/// Identity management proper lives outside this service; we keep
/// only what resolution and triage demographics need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
}
