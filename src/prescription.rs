//! Prescription Authorization Guard.
//!
//! Prescribing authority follows the assignment invariant: only the
//! patient's doctor of record may create a prescription, and updates
//! re-verify both authorship and the *current* assignment — a revoked
//! assignment blocks edits even by the original author. All checks
//! run before any write.

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::{self, get_doctor_by_user, get_patient, Caller};
use crate::error::WorkflowError;
use crate::models::enums::Role;
use crate::models::{Medication, Prescription};

// ─── Request / view types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PrescriptionRequest {
    pub patient_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub medications: Vec<MedicationInput>,
    pub diagnosis: String,
    pub treatment_notes: Option<String>,
    pub additional_notes: Option<String>,
    pub prescription_date: Option<chrono::DateTime<Utc>>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrescriptionUpdate {
    pub medications: Option<Vec<MedicationInput>>,
    pub diagnosis: Option<String>,
    pub treatment_notes: Option<String>,
    pub additional_notes: Option<String>,
    pub prescription_date: Option<chrono::DateTime<Utc>>,
    pub follow_up_date: Option<NaiveDate>,
}

/// Unvalidated medication entry as received from the boundary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MedicationInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrescriptionView {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub patient_name: String,
    pub doctor_name: String,
    pub doctor_specialization: String,
}

// ─── Validation ───────────────────────────────────────────────────────────────

/// Validate medication entries. Every entry must carry all of name,
/// dosage, frequency, and duration; partially filled entries are
/// rejected with the missing fields named, so intended data is never
/// silently dropped.
fn validate_medications(inputs: &[MedicationInput]) -> Result<Vec<Medication>, WorkflowError> {
    if inputs.is_empty() {
        return Err(WorkflowError::Validation(
            "at least one medication is required".into(),
        ));
    }

    let mut problems = Vec::new();
    let mut medications = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.iter().enumerate() {
        let mut missing = Vec::new();
        for (field, value) in [
            ("name", &input.name),
            ("dosage", &input.dosage),
            ("frequency", &input.frequency),
            ("duration", &input.duration),
        ] {
            if value.trim().is_empty() {
                missing.push(field);
            }
        }
        if missing.is_empty() {
            medications.push(Medication {
                name: input.name.trim().to_string(),
                dosage: input.dosage.trim().to_string(),
                frequency: input.frequency.trim().to_string(),
                duration: input.duration.trim().to_string(),
                instructions: input
                    .instructions
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            });
        } else {
            problems.push(format!("medications[{index}]: {} required", missing.join(", ")));
        }
    }

    if problems.is_empty() {
        Ok(medications)
    } else {
        Err(WorkflowError::Validation(problems.join("; ")))
    }
}

/// Enforce the assignment invariant for a prescribing doctor.
/// Distinguishes "no doctor assigned yet" from "assigned elsewhere"
/// in the message, not the error kind.
fn check_assignment(
    patient: &crate::models::Patient,
    doctor_id: Uuid,
    context: &str,
) -> Result<(), WorkflowError> {
    match patient.assigned_doctor_id {
        None => Err(WorkflowError::Forbidden(
            "Patient is not assigned to any doctor. Assign the patient first.".into(),
        )),
        Some(assigned) if assigned != doctor_id => Err(WorkflowError::Forbidden(format!(
            "Patient is assigned to a different doctor; {context}"
        ))),
        Some(_) => Ok(()),
    }
}

// ─── Operations ───────────────────────────────────────────────────────────────

/// Create a prescription. Doctor-only, assignment-gated.
pub fn create_prescription(
    conn: &Connection,
    caller: &Caller,
    request: &PrescriptionRequest,
) -> Result<PrescriptionView, WorkflowError> {
    let doctor = get_doctor_by_user(conn, caller.user_id)?;
    let patient = get_patient(conn, request.patient_id)?;

    check_assignment(&patient, doctor.id, "only the assigned doctor may prescribe")?;

    let medications = validate_medications(&request.medications)?;
    let diagnosis = request.diagnosis.trim();
    if diagnosis.is_empty() {
        return Err(WorkflowError::Validation("diagnosis is required".into()));
    }

    let now = Utc::now();
    let prescription = Prescription {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        doctor_id: doctor.id,
        appointment_id: request.appointment_id,
        medications,
        diagnosis: diagnosis.to_string(),
        treatment_notes: trimmed(&request.treatment_notes),
        additional_notes: trimmed(&request.additional_notes),
        prescription_date: request.prescription_date.unwrap_or(now),
        follow_up_date: request.follow_up_date,
        created_at: now,
    };

    conn.execute(
        "INSERT INTO prescriptions
            (id, patient_id, doctor_id, appointment_id, medications, diagnosis,
             treatment_notes, additional_notes, prescription_date, follow_up_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            prescription.id.to_string(),
            prescription.patient_id.to_string(),
            prescription.doctor_id.to_string(),
            prescription.appointment_id.map(|id| id.to_string()),
            serde_json::to_string(&prescription.medications)
                .unwrap_or_else(|_| "[]".into()),
            prescription.diagnosis,
            prescription.treatment_notes,
            prescription.additional_notes,
            prescription.prescription_date.to_rfc3339(),
            prescription.follow_up_date.map(|d| d.to_string()),
            prescription.created_at.to_rfc3339(),
        ],
    )?;

    get_prescription_unchecked(conn, prescription.id)
}

/// Update a prescription. Re-verifies authorship *and* the current
/// assignment; either failing blocks the edit.
pub fn update_prescription(
    conn: &Connection,
    caller: &Caller,
    prescription_id: Uuid,
    update: &PrescriptionUpdate,
) -> Result<PrescriptionView, WorkflowError> {
    let current = get_prescription_unchecked(conn, prescription_id)?;
    let doctor = get_doctor_by_user(conn, caller.user_id)?;

    if current.prescription.doctor_id != doctor.id {
        return Err(WorkflowError::Forbidden(
            "Only the prescribing doctor may update this prescription".into(),
        ));
    }

    let patient = get_patient(conn, current.prescription.patient_id)?;
    check_assignment(
        &patient,
        doctor.id,
        "the assignment changed since this prescription was written",
    )?;

    let medications = match &update.medications {
        Some(inputs) => validate_medications(inputs)?,
        None => current.prescription.medications.clone(),
    };
    let diagnosis = match &update.diagnosis {
        Some(d) if d.trim().is_empty() => {
            return Err(WorkflowError::Validation("diagnosis cannot be empty".into()))
        }
        Some(d) => d.trim().to_string(),
        None => current.prescription.diagnosis.clone(),
    };

    conn.execute(
        "UPDATE prescriptions
         SET medications = ?1, diagnosis = ?2, treatment_notes = ?3, additional_notes = ?4,
             prescription_date = ?5, follow_up_date = ?6
         WHERE id = ?7",
        params![
            serde_json::to_string(&medications).unwrap_or_else(|_| "[]".into()),
            diagnosis,
            trimmed(&update.treatment_notes).or(current.prescription.treatment_notes.clone()),
            trimmed(&update.additional_notes).or(current.prescription.additional_notes.clone()),
            update
                .prescription_date
                .unwrap_or(current.prescription.prescription_date)
                .to_rfc3339(),
            update
                .follow_up_date
                .or(current.prescription.follow_up_date)
                .map(|d| d.to_string()),
            prescription_id.to_string(),
        ],
    )?;

    get_prescription_unchecked(conn, prescription_id)
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ─── Queries ──────────────────────────────────────────────────────────────────

const VIEW_SQL: &str = "
    SELECT pr.id, pr.patient_id, pr.doctor_id, pr.appointment_id, pr.medications,
           pr.diagnosis, pr.treatment_notes, pr.additional_notes, pr.prescription_date,
           pr.follow_up_date, pr.created_at,
           pu.name, du.name, d.specialization
    FROM prescriptions pr
    JOIN patients p ON pr.patient_id = p.id
    JOIN users pu ON p.user_id = pu.id
    JOIN doctors d ON pr.doctor_id = d.id
    JOIN users du ON d.user_id = du.id";

type ViewRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    String,
    String,
    String,
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
    ))
}

fn view_from_row(row: ViewRow) -> Result<PrescriptionView, WorkflowError> {
    let (
        id,
        patient_id,
        doctor_id,
        appointment_id,
        medications,
        diagnosis,
        treatment_notes,
        additional_notes,
        prescription_date,
        follow_up_date,
        created_at,
        patient_name,
        doctor_name,
        doctor_specialization,
    ) = row;

    let prescription = Prescription {
        id: directory::parse_uuid(&id, "prescriptions.id").map_err(WorkflowError::Storage)?,
        patient_id: directory::parse_uuid(&patient_id, "prescriptions.patient_id")
            .map_err(WorkflowError::Storage)?,
        doctor_id: directory::parse_uuid(&doctor_id, "prescriptions.doctor_id")
            .map_err(WorkflowError::Storage)?,
        appointment_id: appointment_id
            .map(|a| directory::parse_uuid(&a, "prescriptions.appointment_id"))
            .transpose()
            .map_err(WorkflowError::Storage)?,
        medications: directory::json_col(&medications, "prescriptions.medications")
            .map_err(WorkflowError::Storage)?,
        diagnosis,
        treatment_notes,
        additional_notes,
        prescription_date: directory::parse_timestamp(
            &prescription_date,
            "prescriptions.prescription_date",
        )
        .map_err(WorkflowError::Storage)?,
        follow_up_date: follow_up_date
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        created_at: directory::parse_timestamp(&created_at, "prescriptions.created_at")
            .map_err(WorkflowError::Storage)?,
    };

    Ok(PrescriptionView {
        prescription,
        patient_name,
        doctor_name,
        doctor_specialization,
    })
}

fn get_prescription_unchecked(
    conn: &Connection,
    prescription_id: Uuid,
) -> Result<PrescriptionView, WorkflowError> {
    let sql = format!("{VIEW_SQL} WHERE pr.id = ?1");
    let row = conn
        .query_row(&sql, params![prescription_id.to_string()], read_view_row)
        .optional()?;
    let row = row.ok_or_else(|| WorkflowError::not_found("Prescription"))?;
    view_from_row(row)
}

/// Prescription by id with an ownership check: patients may read
/// their own, doctors the ones they authored, admins anything.
pub fn get_prescription(
    conn: &Connection,
    caller: &Caller,
    prescription_id: Uuid,
) -> Result<PrescriptionView, WorkflowError> {
    let view = get_prescription_unchecked(conn, prescription_id)?;

    match caller.role {
        Role::Admin => Ok(view),
        Role::Patient => {
            let patient = directory::find_patient_by_user(conn, caller.user_id)?;
            match patient {
                Some(p) if p.id == view.prescription.patient_id => Ok(view),
                _ => Err(WorkflowError::Forbidden(
                    "Not authorized to view this prescription".into(),
                )),
            }
        }
        Role::Doctor => {
            let doctor = get_doctor_by_user(conn, caller.user_id)?;
            if doctor.id == view.prescription.doctor_id {
                Ok(view)
            } else {
                Err(WorkflowError::Forbidden(
                    "Not authorized to view this prescription".into(),
                ))
            }
        }
    }
}

/// Role-scoped listing, newest prescription date first.
pub fn list_prescriptions(
    conn: &Connection,
    caller: &Caller,
) -> Result<Vec<PrescriptionView>, WorkflowError> {
    let scope: Option<(&str, Uuid)> = match caller.role {
        Role::Patient => {
            let patient = directory::find_patient_by_user(conn, caller.user_id)?
                .ok_or_else(|| WorkflowError::not_found("Patient profile"))?;
            Some(("pr.patient_id = ?1", patient.id))
        }
        Role::Doctor => {
            let doctor = get_doctor_by_user(conn, caller.user_id)?;
            Some(("pr.doctor_id = ?1", doctor.id))
        }
        Role::Admin => None,
    };

    let order = " ORDER BY pr.prescription_date DESC, pr.created_at DESC";
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

/// All prescriptions for one patient. Patients may ask for themselves,
/// doctors only for patients currently assigned to them.
pub fn list_for_patient(
    conn: &Connection,
    caller: &Caller,
    patient_id: Uuid,
) -> Result<Vec<PrescriptionView>, WorkflowError> {
    match caller.role {
        Role::Admin => {}
        Role::Patient => {
            let own = directory::find_patient_by_user(conn, caller.user_id)?;
            if own.map(|p| p.id) != Some(patient_id) {
                return Err(WorkflowError::Forbidden("Not authorized".into()));
            }
        }
        Role::Doctor => {
            let doctor = get_doctor_by_user(conn, caller.user_id)?;
            let patient = get_patient(conn, patient_id)?;
            check_assignment(&patient, doctor.id, "only the assigned doctor may view")?;
        }
    }

    let sql = format!("{VIEW_SQL} WHERE pr.patient_id = ?1 ORDER BY pr.prescription_date DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![patient_id.to_string()], read_view_row)?;
    let rows = rows.collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(view_from_row).collect()
}
