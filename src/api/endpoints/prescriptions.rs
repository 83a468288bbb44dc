//! Prescription endpoints. Creation and updates are doctor-only;
//! the assignment invariant itself is enforced in the domain layer.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::directory::Caller;
use crate::models::enums::Role;
use crate::prescription::{
    self, PrescriptionRequest, PrescriptionUpdate, PrescriptionView,
};

/// `POST /api/prescriptions`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<PrescriptionRequest>,
) -> Result<(StatusCode, Json<PrescriptionView>), ApiError> {
    if caller.role != Role::Doctor {
        return Err(ApiError::Forbidden(
            "Only doctors may write prescriptions".into(),
        ));
    }
    let conn = ctx.open_db()?;
    let view = prescription::create_prescription(&conn, &caller, &request)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/prescriptions` — role-scoped listing.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<PrescriptionView>>, ApiError> {
    let conn = ctx.open_db()?;
    let views = prescription::list_prescriptions(&conn, &caller)?;
    Ok(Json(views))
}

/// `GET /api/prescriptions/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(prescription_id): Path<Uuid>,
) -> Result<Json<PrescriptionView>, ApiError> {
    let conn = ctx.open_db()?;
    let view = prescription::get_prescription(&conn, &caller, prescription_id)?;
    Ok(Json(view))
}

/// `PUT /api/prescriptions/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(prescription_id): Path<Uuid>,
    Json(update): Json<PrescriptionUpdate>,
) -> Result<Json<PrescriptionView>, ApiError> {
    if caller.role != Role::Doctor {
        return Err(ApiError::Forbidden(
            "Only doctors may edit prescriptions".into(),
        ));
    }
    let conn = ctx.open_db()?;
    let view = prescription::update_prescription(&conn, &caller, prescription_id, &update)?;
    Ok(Json(view))
}

/// `GET /api/prescriptions/patient/:patient_id`
pub async fn for_patient(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<PrescriptionView>>, ApiError> {
    let conn = ctx.open_db()?;
    let views = prescription::list_for_patient(&conn, &caller, patient_id)?;
    Ok(Json(views))
}
