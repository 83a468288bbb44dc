//! Patient and Doctor directory lookups.
//!
//! Directory CRUD lives elsewhere; this module only resolves the
//! references the workflow layer depends on and owns the one mutation
//! the booking flow is allowed to make: the one-time soft assignment
//! of a doctor to a previously unassigned patient.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::error::WorkflowError;
use crate::models::enums::Role;
use crate::models::{Department, Doctor, Patient, User};

/// Authenticated principal, as injected by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

// ─── Column helpers ───────────────────────────────────────────────────────────

pub(crate) fn parse_uuid(s: &str, column: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|_| DatabaseError::InvalidUuid {
        column: column.into(),
        value: s.into(),
    })
}

pub(crate) fn json_col<T: serde::de::DeserializeOwned>(
    s: &str,
    column: &str,
) -> Result<T, DatabaseError> {
    serde_json::from_str(s).map_err(|e| DatabaseError::InvalidJson {
        column: column.into(),
        reason: e.to_string(),
    })
}

pub(crate) fn parse_timestamp(s: &str, column: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::InvalidJson {
            column: column.into(),
            reason: e.to_string(),
        })
}

fn opt_json_col<T: serde::de::DeserializeOwned>(
    s: Option<String>,
    column: &str,
) -> Result<Option<T>, DatabaseError> {
    match s {
        Some(raw) => Ok(Some(json_col(&raw, column)?)),
        None => Ok(None),
    }
}

// ─── Users ────────────────────────────────────────────────────────────────────

pub fn get_user(conn: &Connection, user_id: Uuid) -> Result<User, WorkflowError> {
    let row = conn
        .query_row(
            "SELECT id, name, email, phone, role, gender, date_of_birth
             FROM users WHERE id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )
        .optional()?;

    let (id, name, email, phone, role, gender, dob) =
        row.ok_or_else(|| WorkflowError::not_found("User"))?;

    Ok(User {
        id: parse_uuid(&id, "users.id").map_err(WorkflowError::Storage)?,
        name,
        email,
        phone,
        role: role.parse().map_err(WorkflowError::Storage)?,
        gender: gender
            .map(|g| g.parse())
            .transpose()
            .map_err(WorkflowError::Storage)?,
        date_of_birth: dob.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
    })
}

// ─── Patients ─────────────────────────────────────────────────────────────────

fn patient_from_parts(
    id: String,
    user_id: String,
    blood_group: Option<String>,
    allergies: String,
    medical_history: String,
    emergency_contact: Option<String>,
    insurance_info: Option<String>,
    assigned_doctor_id: Option<String>,
) -> Result<Patient, DatabaseError> {
    Ok(Patient {
        id: parse_uuid(&id, "patients.id")?,
        user_id: parse_uuid(&user_id, "patients.user_id")?,
        blood_group,
        allergies: json_col(&allergies, "patients.allergies")?,
        medical_history: json_col(&medical_history, "patients.medical_history")?,
        emergency_contact: opt_json_col(emergency_contact, "patients.emergency_contact")?,
        insurance_info: opt_json_col(insurance_info, "patients.insurance_info")?,
        assigned_doctor_id: assigned_doctor_id
            .map(|d| parse_uuid(&d, "patients.assigned_doctor_id"))
            .transpose()?,
    })
}

const PATIENT_COLS: &str = "id, user_id, blood_group, allergies, medical_history,
                            emergency_contact, insurance_info, assigned_doctor_id";

fn query_patient(
    conn: &Connection,
    where_clause: &str,
    key: &str,
) -> Result<Option<Patient>, WorkflowError> {
    let row = conn
        .query_row(
            &format!("SELECT {PATIENT_COLS} FROM patients WHERE {where_clause}"),
            params![key],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, user_id, bg, al, mh, ec, ins, ad)| {
        patient_from_parts(id, user_id, bg, al, mh, ec, ins, ad)
    })
    .transpose()
    .map_err(WorkflowError::Storage)
}

/// Patient by id, `NotFound` on miss.
pub fn get_patient(conn: &Connection, patient_id: Uuid) -> Result<Patient, WorkflowError> {
    query_patient(conn, "id = ?1", &patient_id.to_string())?
        .ok_or_else(|| WorkflowError::not_found("Patient"))
}

/// Patient profile owned by a user account, if any.
pub fn find_patient_by_user(
    conn: &Connection,
    user_id: Uuid,
) -> Result<Option<Patient>, WorkflowError> {
    query_patient(conn, "user_id = ?1", &user_id.to_string())
}

/// Resolve the patient a request acts on: patient callers act on
/// their own profile, anyone else must name the patient explicitly.
pub fn resolve_patient(
    conn: &Connection,
    caller: &Caller,
    explicit_patient_id: Option<Uuid>,
) -> Result<Patient, WorkflowError> {
    if caller.role == Role::Patient {
        find_patient_by_user(conn, caller.user_id)?
            .ok_or_else(|| WorkflowError::not_found("Patient profile"))
    } else {
        let patient_id = explicit_patient_id
            .ok_or_else(|| WorkflowError::Validation("patient_id is required".into()))?;
        get_patient(conn, patient_id)
    }
}

/// One-time soft assignment: set `assigned_doctor_id` only if the
/// patient has none. The conditional UPDATE is a single atomic
/// statement, so two concurrent bookings cannot both win.
/// Returns whether this call set the assignment.
pub fn assign_doctor_if_unassigned(
    conn: &Connection,
    patient_id: Uuid,
    doctor_id: Uuid,
) -> Result<bool, WorkflowError> {
    let changed = conn.execute(
        "UPDATE patients SET assigned_doctor_id = ?1
         WHERE id = ?2 AND assigned_doctor_id IS NULL",
        params![doctor_id.to_string(), patient_id.to_string()],
    )?;
    Ok(changed == 1)
}

// ─── Doctors ──────────────────────────────────────────────────────────────────

fn doctor_from_parts(
    id: String,
    user_id: String,
    specialization: String,
    department_id: String,
    license_number: String,
    experience_years: i64,
    availability: String,
    consultation_fee: f64,
) -> Result<Doctor, DatabaseError> {
    Ok(Doctor {
        id: parse_uuid(&id, "doctors.id")?,
        user_id: parse_uuid(&user_id, "doctors.user_id")?,
        specialization,
        department_id: parse_uuid(&department_id, "doctors.department_id")?,
        license_number,
        experience_years,
        availability: json_col(&availability, "doctors.availability")?,
        consultation_fee,
    })
}

const DOCTOR_COLS: &str = "id, user_id, specialization, department_id, license_number,
                           experience_years, availability, consultation_fee";

fn query_doctor(
    conn: &Connection,
    where_clause: &str,
    key: &str,
) -> Result<Option<Doctor>, WorkflowError> {
    let row = conn
        .query_row(
            &format!("SELECT {DOCTOR_COLS} FROM doctors WHERE {where_clause}"),
            params![key],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, f64>(7)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, user_id, sp, dep, lic, exp, av, fee)| {
        doctor_from_parts(id, user_id, sp, dep, lic, exp, av, fee)
    })
    .transpose()
    .map_err(WorkflowError::Storage)
}

/// Doctor by id, `NotFound` on miss.
pub fn get_doctor(conn: &Connection, doctor_id: Uuid) -> Result<Doctor, WorkflowError> {
    query_doctor(conn, "id = ?1", &doctor_id.to_string())?
        .ok_or_else(|| WorkflowError::not_found("Doctor"))
}

/// Doctor profile owned by a user account, `NotFound` on miss.
pub fn get_doctor_by_user(conn: &Connection, user_id: Uuid) -> Result<Doctor, WorkflowError> {
    query_doctor(conn, "user_id = ?1", &user_id.to_string())?
        .ok_or_else(|| WorkflowError::not_found("Doctor profile"))
}

pub fn get_department(conn: &Connection, department_id: Uuid) -> Result<Department, WorkflowError> {
    let row = conn
        .query_row(
            "SELECT id, name, description FROM departments WHERE id = ?1",
            params![department_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;

    let (id, name, description) = row.ok_or_else(|| WorkflowError::not_found("Department"))?;
    Ok(Department {
        id: parse_uuid(&id, "departments.id").map_err(WorkflowError::Storage)?,
        name,
        description,
    })
}

/// Doctor with department attached, as bookings need it.
pub fn get_doctor_with_department(
    conn: &Connection,
    doctor_id: Uuid,
) -> Result<(Doctor, Department), WorkflowError> {
    let doctor = get_doctor(conn, doctor_id)?;
    let department = get_department(conn, doctor.department_id)?;
    Ok((doctor, department))
}
