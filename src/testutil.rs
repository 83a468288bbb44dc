//! Shared seeding helpers for unit and router tests.

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::api::types::hash_token_hex;
use crate::models::enums::Role;

/// Insert a user and return its id. `date_of_birth` is `YYYY-MM-DD`.
pub fn seed_user(
    conn: &Connection,
    role: Role,
    name: &str,
    date_of_birth: Option<&str>,
) -> Uuid {
    seed_user_with_token(conn, role, name, date_of_birth, None)
}

/// Insert a user with an optional bearer token for API tests.
pub fn seed_user_with_token(
    conn: &Connection,
    role: Role,
    name: &str,
    date_of_birth: Option<&str>,
    token: Option<&str>,
) -> Uuid {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO users (id, name, email, phone, role, gender, date_of_birth, token_hash, created_at)
         VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6, ?7, ?8)",
        params![
            id.to_string(),
            name,
            format!("{id}@example.test"),
            role.as_str(),
            if role == Role::Patient { Some("female") } else { None },
            date_of_birth,
            token.map(hash_token_hex),
            chrono::Utc::now().to_rfc3339(),
        ],
    )
    .unwrap();
    id
}

/// Insert a patient profile and return its id.
pub fn seed_patient(
    conn: &Connection,
    user_id: Uuid,
    allergies: &[&str],
    conditions: &[&str],
) -> Uuid {
    let id = Uuid::new_v4();
    let history: Vec<serde_json::Value> = conditions
        .iter()
        .map(|c| serde_json::json!({"condition": c, "diagnosis_date": null, "status": "active"}))
        .collect();
    conn.execute(
        "INSERT INTO patients (id, user_id, blood_group, allergies, medical_history,
                               emergency_contact, insurance_info, assigned_doctor_id)
         VALUES (?1, ?2, 'O+', ?3, ?4, NULL, NULL, NULL)",
        params![
            id.to_string(),
            user_id.to_string(),
            serde_json::to_string(allergies).unwrap(),
            serde_json::to_string(&history).unwrap(),
        ],
    )
    .unwrap();
    id
}

pub struct SeededDoctor {
    pub doctor_id: Uuid,
    pub user_id: Uuid,
    pub department_id: Uuid,
}

/// Insert a department, a doctor user, and a doctor profile.
pub fn seed_doctor(conn: &Connection, specialization: &str) -> SeededDoctor {
    seed_doctor_with_token(conn, specialization, None)
}

pub fn seed_doctor_with_token(
    conn: &Connection,
    specialization: &str,
    token: Option<&str>,
) -> SeededDoctor {
    let user_id = seed_user_with_token(conn, Role::Doctor, "Dr. Imani Ba", None, token);
    let department_id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO departments (id, name, description) VALUES (?1, ?2, NULL)",
        params![department_id.to_string(), specialization],
    )
    .unwrap();

    let doctor_id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO doctors (id, user_id, specialization, department_id, license_number,
                              experience_years, availability, consultation_fee)
         VALUES (?1, ?2, ?3, ?4, ?5, 8, '{}', 150.0)",
        params![
            doctor_id.to_string(),
            user_id.to_string(),
            specialization,
            department_id.to_string(),
            format!("LIC-{}", &doctor_id.to_string()[..8]),
        ],
    )
    .unwrap();

    SeededDoctor {
        doctor_id,
        user_id,
        department_id,
    }
}
