//! Standalone triage endpoints: on-demand prediction with a logged
//! result, the prediction history, and admin statistics.

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::directory::{self, Caller};
use crate::models::enums::Role;
use crate::models::TriagePrediction;
use crate::triage::{self, PredictRequest, Prediction, TriageStats};

/// `POST /api/triage/predict` — any authenticated caller. Unlike
/// booking, a failed advisor call here is surfaced as 503 rather than
/// swallowed; the caller asked for the prediction itself. The
/// observational log is written only when the caller resolves to a
/// patient profile.
pub async fn predict(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<Prediction>, ApiError> {
    if request.symptoms.is_empty() {
        return Err(ApiError::Validation("symptoms are required".into()));
    }

    let prediction = tokio::task::spawn_blocking(move || {
        let conn = ctx.open_db()?;
        let prediction = ctx
            .triage
            .predict(&request)
            .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;

        if caller.role == Role::Patient {
            if let Some(patient) = directory::find_patient_by_user(&conn, caller.user_id)? {
                triage::record_prediction(&conn, patient.id, &request, &prediction)
                    .map_err(ApiError::from)?;
            }
        }
        Ok::<_, ApiError>(prediction)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("predict task failed: {e}")))??;

    Ok(Json(prediction))
}

/// `GET /api/triage/predictions` — own history for patients, all
/// records for staff.
pub async fn predictions(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<TriagePrediction>>, ApiError> {
    let conn = ctx.open_db()?;
    let scope = match caller.role {
        Role::Admin | Role::Doctor => None,
        Role::Patient => {
            let patient = directory::find_patient_by_user(&conn, caller.user_id)?
                .ok_or_else(|| ApiError::NotFound("Patient profile not found".into()))?;
            Some(patient.id)
        }
    };
    let records = triage::list_predictions(&conn, scope)?;
    Ok(Json(records))
}

/// `GET /api/triage/stats` — admin-only aggregates.
pub async fn stats(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<TriageStats>, ApiError> {
    if caller.role != Role::Admin {
        return Err(ApiError::Forbidden(
            "Only administrators may view triage statistics".into(),
        ));
    }
    let conn = ctx.open_db()?;
    let stats = triage::triage_stats(&conn)?;
    Ok(Json(stats))
}
