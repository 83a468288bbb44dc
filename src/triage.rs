//! Triage Advisor client and prediction log.
//!
//! The advisor is an external scoring service mapping symptoms and
//! demographics to a predicted condition, risk level, and confidence.
//! One attempt per call, no retry, no circuit breaker; connect errors,
//! timeouts, and non-2xx responses all collapse into
//! [`TriageError::Unavailable`] so callers can treat them uniformly
//! as "no result available".

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{Gender, Priority, RiskLevel};
use crate::models::TriagePrediction;

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("Triage advisor unreachable: {0}")]
    Unavailable(String),
    #[error("Unexpected advisor response: {0}")]
    InvalidResponse(String),
}

// ─── Wire types ───────────────────────────────────────────────────────────────

/// Request body for `POST /predict`. Demographics are optional on the
/// way in; callers without a patient profile fall back to the same
/// defaults booking uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    pub symptoms: Vec<String>,
    #[serde(default = "default_age")]
    pub age: i64,
    #[serde(default = "default_gender")]
    pub gender: Gender,
    #[serde(default)]
    pub medical_history: Vec<String>,
}

fn default_age() -> i64 {
    30
}

fn default_gender() -> Gender {
    Gender::Male
}

/// Successful prediction from the advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub disease: String,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Request body for `POST /schedule`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub risk_level: RiskLevel,
    pub doctor_id: Uuid,
    pub preferred_date: String,
}

/// Scheduling advice. Either field may be absent; callers fall back
/// to their own defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleAdvice {
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub suggested_time: Option<String>,
}

// ─── Advisor seam ─────────────────────────────────────────────────────────────

/// Boundary to the external triage service. The orchestrator only
/// ever sees this trait; tests inject [`MockTriageAdvisor`].
pub trait TriageAdvisor: Send + Sync {
    fn predict(&self, request: &PredictRequest) -> Result<Prediction, TriageError>;
    fn schedule(&self, request: &ScheduleRequest) -> Result<ScheduleAdvice, TriageError>;
}

/// HTTP client for the triage advisor.
///
/// Blocking reqwest with a hard timeout, mirroring how the rest of
/// the service talks to local model servers. Callers inside the async
/// API layer wrap invocations in `spawn_blocking`.
pub struct HttpTriageAdvisor {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpTriageAdvisor {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Advisor from `TRIAGE_SERVICE_URL` / `TRIAGE_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::new(
            &crate::config::triage_service_url(),
            crate::config::triage_timeout_secs(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post_json<B: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, TriageError> {
        let url = format!("{}{path}", self.base_url);

        let response = self.client.post(&url).json(body).send().map_err(|e| {
            if e.is_timeout() {
                TriageError::Unavailable(format!(
                    "request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                TriageError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TriageError::Unavailable(format!(
                "advisor returned HTTP {status}"
            )));
        }

        response
            .json()
            .map_err(|e| TriageError::InvalidResponse(e.to_string()))
    }
}

impl TriageAdvisor for HttpTriageAdvisor {
    fn predict(&self, request: &PredictRequest) -> Result<Prediction, TriageError> {
        self.post_json("/predict", request)
    }

    fn schedule(&self, request: &ScheduleRequest) -> Result<ScheduleAdvice, TriageError> {
        self.post_json("/schedule", request)
    }
}

/// Mock advisor for tests — configurable responses plus call counters
/// so tests can assert which calls happened.
pub struct MockTriageAdvisor {
    prediction: Option<Prediction>,
    advice: Option<ScheduleAdvice>,
    predict_calls: std::sync::Mutex<u32>,
    schedule_calls: std::sync::Mutex<u32>,
}

impl MockTriageAdvisor {
    /// Advisor where both calls fail as unavailable.
    pub fn unavailable() -> Self {
        Self {
            prediction: None,
            advice: None,
            predict_calls: std::sync::Mutex::new(0),
            schedule_calls: std::sync::Mutex::new(0),
        }
    }

    pub fn with_prediction(mut self, prediction: Prediction) -> Self {
        self.prediction = Some(prediction);
        self
    }

    pub fn with_advice(mut self, advice: ScheduleAdvice) -> Self {
        self.advice = Some(advice);
        self
    }

    pub fn predict_calls(&self) -> u32 {
        *self.predict_calls.lock().unwrap()
    }

    pub fn schedule_calls(&self) -> u32 {
        *self.schedule_calls.lock().unwrap()
    }
}

impl TriageAdvisor for MockTriageAdvisor {
    fn predict(&self, _request: &PredictRequest) -> Result<Prediction, TriageError> {
        *self.predict_calls.lock().unwrap() += 1;
        self.prediction
            .clone()
            .ok_or_else(|| TriageError::Unavailable("mock offline".into()))
    }

    fn schedule(&self, _request: &ScheduleRequest) -> Result<ScheduleAdvice, TriageError> {
        *self.schedule_calls.lock().unwrap() += 1;
        self.advice
            .clone()
            .ok_or_else(|| TriageError::Unavailable("mock offline".into()))
    }
}

// ─── Prediction log ───────────────────────────────────────────────────────────

/// Record a successful prediction made by a patient. Purely
/// observational; nothing reads these back during booking.
pub fn record_prediction(
    conn: &Connection,
    patient_id: Uuid,
    request: &PredictRequest,
    prediction: &Prediction,
) -> Result<TriagePrediction, DatabaseError> {
    let record = TriagePrediction {
        id: Uuid::new_v4(),
        patient_id,
        symptoms: request.symptoms.clone(),
        age: request.age,
        gender: request.gender,
        medical_history: request.medical_history.clone(),
        predicted_disease: prediction.disease.clone(),
        risk_level: prediction.risk_level,
        confidence: prediction.confidence,
        recommendations: prediction.recommendations.clone(),
        created_at: Utc::now(),
    };

    conn.execute(
        "INSERT INTO triage_predictions
            (id, patient_id, symptoms, age, gender, medical_history,
             predicted_disease, risk_level, confidence, recommendations, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            record.id.to_string(),
            record.patient_id.to_string(),
            serde_json::to_string(&record.symptoms).unwrap_or_else(|_| "[]".into()),
            record.age,
            record.gender.as_str(),
            serde_json::to_string(&record.medical_history).unwrap_or_else(|_| "[]".into()),
            record.predicted_disease,
            record.risk_level.as_str(),
            record.confidence,
            serde_json::to_string(&record.recommendations).unwrap_or_else(|_| "[]".into()),
            record.created_at.to_rfc3339(),
        ],
    )?;

    Ok(record)
}

/// List logged predictions, newest first. `patient_id` scopes the
/// query for patient callers; admins pass `None` for all records.
pub fn list_predictions(
    conn: &Connection,
    patient_id: Option<Uuid>,
) -> Result<Vec<TriagePrediction>, DatabaseError> {
    let sql = "SELECT id, patient_id, symptoms, age, gender, medical_history,
                      predicted_disease, risk_level, confidence, recommendations, created_at
               FROM triage_predictions
               WHERE (?1 IS NULL OR patient_id = ?1)
               ORDER BY created_at DESC";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![patient_id.map(|id| id.to_string())], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, f64>(8)?,
            row.get::<_, String>(9)?,
            row.get::<_, String>(10)?,
        ))
    })?;

    let mut predictions = Vec::new();
    for row in rows {
        let (id, patient, symptoms, age, gender, history, disease, risk, confidence, recs, created) =
            row?;
        predictions.push(TriagePrediction {
            id: crate::directory::parse_uuid(&id, "triage_predictions.id")?,
            patient_id: crate::directory::parse_uuid(&patient, "triage_predictions.patient_id")?,
            symptoms: crate::directory::json_col(&symptoms, "triage_predictions.symptoms")?,
            age,
            gender: gender.parse()?,
            medical_history: crate::directory::json_col(
                &history,
                "triage_predictions.medical_history",
            )?,
            predicted_disease: disease,
            risk_level: risk.parse()?,
            confidence,
            recommendations: crate::directory::json_col(
                &recs,
                "triage_predictions.recommendations",
            )?,
            created_at: crate::directory::parse_timestamp(&created, "triage_predictions.created_at")?,
        });
    }
    Ok(predictions)
}

/// Admin statistics over the prediction log.
#[derive(Debug, Clone, Serialize)]
pub struct TriageStats {
    pub total_predictions: i64,
    pub disease_stats: Vec<DiseaseStat>,
    pub risk_level_stats: Vec<RiskLevelStat>,
    pub ai_scheduled_appointments: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiseaseStat {
    pub disease: String,
    pub count: i64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskLevelStat {
    pub risk_level: String,
    pub count: i64,
}

pub fn triage_stats(conn: &Connection) -> Result<TriageStats, DatabaseError> {
    let total_predictions: i64 =
        conn.query_row("SELECT COUNT(*) FROM triage_predictions", [], |row| row.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT predicted_disease, COUNT(*), AVG(confidence)
         FROM triage_predictions
         GROUP BY predicted_disease
         ORDER BY COUNT(*) DESC
         LIMIT 10",
    )?;
    let disease_stats = stmt
        .query_map([], |row| {
            Ok(DiseaseStat {
                disease: row.get(0)?,
                count: row.get(1)?,
                avg_confidence: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT risk_level, COUNT(*) FROM triage_predictions GROUP BY risk_level",
    )?;
    let risk_level_stats = stmt
        .query_map([], |row| {
            Ok(RiskLevelStat {
                risk_level: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let ai_scheduled_appointments: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments WHERE ai_scheduled = 1",
        [],
        |row| row.get(0),
    )?;

    Ok(TriageStats {
        total_predictions,
        disease_stats,
        risk_level_stats,
        ai_scheduled_appointments,
    })
}
