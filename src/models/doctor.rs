use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub specialization: String,
    pub department_id: Uuid,
    pub license_number: String,
    pub experience_years: i64,
    /// Weekly availability keyed by lowercase weekday name.
    pub availability: BTreeMap<String, DayAvailability>,
    pub consultation_fee: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    pub start: Option<String>,
    pub end: Option<String>,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}
