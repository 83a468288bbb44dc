//! Appointment Orchestrator — booking intake with best-effort triage.
//!
//! Booking resolves the patient and doctor, optionally consults the
//! Triage Advisor, persists the appointment with a time-of-booking
//! prediction snapshot, and establishes the one-time doctor
//! assignment. Triage failures never surface to the booking caller;
//! the appointment is simply persisted without a prediction.
//!
//! Status updates accept any target status from any authorized
//! caller. There is deliberately no transition-validity check here;
//! restricting the machine is an open gap, not something this module
//! quietly fixes.

use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::{
    self, assign_doctor_if_unassigned, get_doctor_with_department, get_user, resolve_patient,
    Caller,
};
use crate::error::WorkflowError;
use crate::models::enums::{AppointmentStatus, Gender, Priority, Role};
use crate::models::{Appointment, TriageSnapshot};
use crate::triage::{PredictRequest, Prediction, ScheduleRequest, TriageAdvisor};

// ─── Request / view types ─────────────────────────────────────────────────────

/// Booking intent as received from the API boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    /// Required unless the caller is a patient booking for themself.
    pub patient_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub appointment_time: String,
    pub reason: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
}

/// Partial update: status, notes, date, time. `None` means "keep the
/// stored value", so existing notes cannot be cleared through this
/// type, only replaced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentUpdate {
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
}

/// Appointment with patient, doctor, and department resolved.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: PatientSummary,
    pub doctor: DoctorSummary,
    pub department: DepartmentSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientSummary {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub consultation_fee: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepartmentSummary {
    pub id: Uuid,
    pub name: String,
}

// ─── Booking orchestration ────────────────────────────────────────────────────

/// Create an appointment.
///
/// Patient/doctor resolution failures abort the booking with
/// `NotFound`. Both advisor calls are best-effort: prediction failure
/// books without a snapshot, scheduling failure keeps the
/// caller-supplied time and default priority. The appointment is
/// written with `ai_scheduled = true` iff a prediction was obtained,
/// and the patient's doctor-of-record is soft-assigned if unset.
pub fn create_appointment(
    conn: &Connection,
    advisor: &dyn TriageAdvisor,
    caller: &Caller,
    request: &BookingRequest,
) -> Result<AppointmentView, WorkflowError> {
    let patient = resolve_patient(conn, caller, request.patient_id)?;
    let (doctor, department) = get_doctor_with_department(conn, request.doctor_id)?;

    let prediction = obtain_prediction(conn, advisor, &patient, &request.symptoms)?;

    let mut priority = Priority::Medium;
    let mut appointment_time = request.appointment_time.clone();
    if let Some(prediction) = &prediction {
        match advisor.schedule(&ScheduleRequest {
            risk_level: prediction.risk_level,
            doctor_id: doctor.id,
            preferred_date: request.appointment_date.to_string(),
        }) {
            Ok(advice) => {
                if let Some(p) = advice.priority {
                    priority = p;
                }
                if let Some(t) = advice.suggested_time {
                    appointment_time = t;
                }
            }
            Err(e) => {
                // Scheduling failure does not discard the prediction.
                tracing::warn!(error = %e, "triage scheduling unavailable, keeping requested slot");
            }
        }
    }

    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        doctor_id: doctor.id,
        department_id: department.id,
        appointment_date: request.appointment_date,
        appointment_time,
        reason: request.reason.clone(),
        symptoms: request.symptoms.clone(),
        status: AppointmentStatus::Pending,
        priority,
        triage_snapshot: prediction.as_ref().map(|p| TriageSnapshot {
            predicted_disease: p.disease.clone(),
            risk_level: p.risk_level,
            confidence: p.confidence,
        }),
        ai_scheduled: prediction.is_some(),
        notes: None,
        created_at: Utc::now(),
    };
    insert_appointment(conn, &appointment)?;

    if assign_doctor_if_unassigned(conn, patient.id, doctor.id)? {
        tracing::info!(
            patient = %patient.id,
            doctor = %doctor.id,
            "soft-assigned doctor of record on first booking"
        );
    }

    get_appointment(conn, appointment.id)
}

/// Best-effort prediction. `None` when symptoms are empty or the
/// advisor fails; the distinction is logged, not surfaced.
fn obtain_prediction(
    conn: &Connection,
    advisor: &dyn TriageAdvisor,
    patient: &crate::models::Patient,
    symptoms: &[String],
) -> Result<Option<Prediction>, WorkflowError> {
    if symptoms.is_empty() {
        return Ok(None);
    }

    let user = get_user(conn, patient.user_id)?;
    let age = user
        .date_of_birth
        .map(|dob| i64::from(Utc::now().year() - dob.year()))
        .unwrap_or(30);
    let gender = user.gender.unwrap_or(Gender::Male);

    let request = PredictRequest {
        symptoms: symptoms.to_vec(),
        age,
        gender,
        medical_history: patient
            .medical_history
            .iter()
            .map(|entry| entry.condition.clone())
            .collect(),
    };

    match advisor.predict(&request) {
        Ok(prediction) => Ok(Some(prediction)),
        Err(e) => {
            tracing::warn!(error = %e, "triage prediction unavailable, booking without it");
            Ok(None)
        }
    }
}

fn insert_appointment(conn: &Connection, a: &Appointment) -> Result<(), WorkflowError> {
    conn.execute(
        "INSERT INTO appointments
            (id, patient_id, doctor_id, department_id, appointment_date, appointment_time,
             reason, symptoms, status, priority, predicted_disease, risk_level, confidence,
             ai_scheduled, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            a.id.to_string(),
            a.patient_id.to_string(),
            a.doctor_id.to_string(),
            a.department_id.to_string(),
            a.appointment_date.to_string(),
            a.appointment_time,
            a.reason,
            serde_json::to_string(&a.symptoms).unwrap_or_else(|_| "[]".into()),
            a.status.as_str(),
            a.priority.as_str(),
            a.triage_snapshot.as_ref().map(|s| s.predicted_disease.clone()),
            a.triage_snapshot.as_ref().map(|s| s.risk_level.as_str()),
            a.triage_snapshot.as_ref().map(|s| s.confidence),
            a.ai_scheduled,
            a.notes,
            a.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

// ─── Queries ──────────────────────────────────────────────────────────────────

const VIEW_SQL: &str = "
    SELECT a.id, a.patient_id, a.doctor_id, a.department_id, a.appointment_date,
           a.appointment_time, a.reason, a.symptoms, a.status, a.priority,
           a.predicted_disease, a.risk_level, a.confidence, a.ai_scheduled, a.notes,
           a.created_at,
           pu.name, du.name, d.specialization, d.consultation_fee, dep.name
    FROM appointments a
    JOIN patients p ON a.patient_id = p.id
    JOIN users pu ON p.user_id = pu.id
    JOIN doctors d ON a.doctor_id = d.id
    JOIN users du ON d.user_id = du.id
    JOIN departments dep ON a.department_id = dep.id";

type ViewRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<f64>,
    bool,
    Option<String>,
    String,
    String,
    String,
    String,
    f64,
    String,
);

fn read_view_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ViewRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
        row.get(13)?,
        row.get(14)?,
        row.get(15)?,
        row.get(16)?,
        row.get(17)?,
        row.get(18)?,
        row.get(19)?,
        row.get(20)?,
    ))
}

fn view_from_row(row: ViewRow) -> Result<AppointmentView, WorkflowError> {
    let (
        id,
        patient_id,
        doctor_id,
        department_id,
        date,
        time,
        reason,
        symptoms,
        status,
        priority,
        predicted_disease,
        risk_level,
        confidence,
        ai_scheduled,
        notes,
        created_at,
        patient_name,
        doctor_name,
        specialization,
        consultation_fee,
        department_name,
    ) = row;

    let triage_snapshot = match (predicted_disease, risk_level, confidence) {
        (Some(disease), Some(risk), Some(confidence)) => Some(TriageSnapshot {
            predicted_disease: disease,
            risk_level: risk.parse().map_err(WorkflowError::Storage)?,
            confidence,
        }),
        _ => None,
    };

    let patient_id = directory::parse_uuid(&patient_id, "appointments.patient_id")
        .map_err(WorkflowError::Storage)?;
    let doctor_id = directory::parse_uuid(&doctor_id, "appointments.doctor_id")
        .map_err(WorkflowError::Storage)?;
    let department_id = directory::parse_uuid(&department_id, "appointments.department_id")
        .map_err(WorkflowError::Storage)?;

    let appointment = Appointment {
        id: directory::parse_uuid(&id, "appointments.id").map_err(WorkflowError::Storage)?,
        patient_id,
        doctor_id,
        department_id,
        appointment_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
            WorkflowError::Storage(crate::db::DatabaseError::InvalidJson {
                column: "appointments.appointment_date".into(),
                reason: e.to_string(),
            })
        })?,
        appointment_time: time,
        reason,
        symptoms: directory::json_col(&symptoms, "appointments.symptoms")
            .map_err(WorkflowError::Storage)?,
        status: status.parse().map_err(WorkflowError::Storage)?,
        priority: priority.parse().map_err(WorkflowError::Storage)?,
        triage_snapshot,
        ai_scheduled,
        notes,
        created_at: directory::parse_timestamp(&created_at, "appointments.created_at")
            .map_err(WorkflowError::Storage)?,
    };

    Ok(AppointmentView {
        appointment,
        patient: PatientSummary {
            id: patient_id,
            name: patient_name,
        },
        doctor: DoctorSummary {
            id: doctor_id,
            name: doctor_name,
            specialization,
            consultation_fee,
        },
        department: DepartmentSummary {
            id: department_id,
            name: department_name,
        },
    })
}

/// Appointment by id with all references resolved.
pub fn get_appointment(
    conn: &Connection,
    appointment_id: Uuid,
) -> Result<AppointmentView, WorkflowError> {
    let sql = format!("{VIEW_SQL} WHERE a.id = ?1");
    let row = conn
        .query_row(&sql, params![appointment_id.to_string()], read_view_row)
        .optional()?;
    let row = row.ok_or_else(|| WorkflowError::not_found("Appointment"))?;
    view_from_row(row)
}

/// Role-scoped listing: patients see their own appointments, doctors
/// their schedule, admins everything. Sorted newest first.
pub fn list_appointments(
    conn: &Connection,
    caller: &Caller,
) -> Result<Vec<AppointmentView>, WorkflowError> {
    let scope: Option<(&str, Uuid)> = match caller.role {
        Role::Patient => match directory::find_patient_by_user(conn, caller.user_id)? {
            Some(patient) => Some(("a.patient_id = ?1", patient.id)),
            None => return Ok(Vec::new()),
        },
        Role::Doctor => {
            let doctor = directory::get_doctor_by_user(conn, caller.user_id)?;
            Some(("a.doctor_id = ?1", doctor.id))
        }
        Role::Admin => None,
    };

    let order = " ORDER BY a.appointment_date DESC, a.appointment_time DESC";
    let rows = match scope {
        Some((clause, id)) => {
            let sql = format!("{VIEW_SQL} WHERE {clause}{order}");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![id.to_string()], read_view_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("{VIEW_SQL}{order}");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], read_view_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };

    rows.into_iter().map(view_from_row).collect()
}

// ─── Mutations ────────────────────────────────────────────────────────────────

/// Apply a partial update. Any target status is accepted.
pub fn update_appointment(
    conn: &Connection,
    appointment_id: Uuid,
    update: &AppointmentUpdate,
) -> Result<AppointmentView, WorkflowError> {
    // Existence check before mutating
    let current = get_appointment(conn, appointment_id)?;

    conn.execute(
        "UPDATE appointments
         SET status = ?1, notes = ?2, appointment_date = ?3, appointment_time = ?4
         WHERE id = ?5",
        params![
            update
                .status
                .unwrap_or(current.appointment.status)
                .as_str(),
            update
                .notes
                .clone()
                .or(current.appointment.notes.clone()),
            update
                .appointment_date
                .unwrap_or(current.appointment.appointment_date)
                .to_string(),
            update
                .appointment_time
                .clone()
                .unwrap_or(current.appointment.appointment_time.clone()),
            appointment_id.to_string(),
        ],
    )?;

    get_appointment(conn, appointment_id)
}

/// Soft cancel: unconditional status change, never a row delete.
pub fn cancel_appointment(
    conn: &Connection,
    appointment_id: Uuid,
) -> Result<(), WorkflowError> {
    let changed = conn.execute(
        "UPDATE appointments SET status = 'cancelled' WHERE id = ?1",
        params![appointment_id.to_string()],
    )?;
    if changed == 0 {
        return Err(WorkflowError::not_found("Appointment"));
    }
    Ok(())
}
