//! Appointment endpoints.
//!
//! Booking runs the full orchestration including the triage advisor,
//! so the handler body is wrapped in `spawn_blocking` to keep the
//! blocking HTTP client off the async runtime.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rusqlite::Connection;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::appointment::{self, AppointmentUpdate, AppointmentView, BookingRequest};
use crate::directory::{self, Caller};
use crate::models::enums::Role;

/// Whether the caller may see this appointment: admins always,
/// patients and doctors only their own.
fn ensure_can_view(
    conn: &Connection,
    caller: &Caller,
    view: &AppointmentView,
) -> Result<(), ApiError> {
    match caller.role {
        Role::Admin => Ok(()),
        Role::Patient => {
            let own = directory::find_patient_by_user(conn, caller.user_id)?;
            match own {
                Some(p) if p.id == view.appointment.patient_id => Ok(()),
                _ => Err(ApiError::Forbidden(
                    "Not authorized to view this appointment".into(),
                )),
            }
        }
        Role::Doctor => {
            let doctor = directory::get_doctor_by_user(conn, caller.user_id)
                .map_err(ApiError::from)?;
            if doctor.id == view.appointment.doctor_id {
                Ok(())
            } else {
                Err(ApiError::Forbidden(
                    "Not authorized to view this appointment".into(),
                ))
            }
        }
    }
}

/// `POST /api/appointments` — book an appointment.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<AppointmentView>), ApiError> {
    let view = tokio::task::spawn_blocking(move || {
        let conn = ctx.open_db()?;
        appointment::create_appointment(&conn, ctx.triage.as_ref(), &caller, &request)
            .map_err(ApiError::from)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("booking task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/appointments` — role-scoped listing.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<AppointmentView>>, ApiError> {
    let conn = ctx.open_db()?;
    let views = appointment::list_appointments(&conn, &caller)?;
    Ok(Json(views))
}

/// `GET /api/appointments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<AppointmentView>, ApiError> {
    let conn = ctx.open_db()?;
    let view = appointment::get_appointment(&conn, appointment_id)?;
    ensure_can_view(&conn, &caller, &view)?;
    Ok(Json(view))
}

/// `PUT /api/appointments/:id` — partial update by anyone who can see
/// the appointment, patients included.
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(appointment_id): Path<Uuid>,
    Json(update): Json<AppointmentUpdate>,
) -> Result<Json<AppointmentView>, ApiError> {
    let conn = ctx.open_db()?;
    let current = appointment::get_appointment(&conn, appointment_id)?;
    ensure_can_view(&conn, &caller, &current)?;

    let view = appointment::update_appointment(&conn, appointment_id, &update)?;
    Ok(Json(view))
}

/// `DELETE /api/appointments/:id` — soft cancel.
pub async fn cancel(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.open_db()?;
    let current = appointment::get_appointment(&conn, appointment_id)?;
    ensure_can_view(&conn, &caller, &current)?;

    appointment::cancel_appointment(&conn, appointment_id)?;
    Ok(StatusCode::NO_CONTENT)
}
