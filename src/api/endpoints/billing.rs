//! Billing endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::billing::{self, BillRequest, BillView, PaymentRequest, RevenueStats};
use crate::directory::Caller;

/// `POST /api/billing`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Json(request): Json<BillRequest>,
) -> Result<(StatusCode, Json<BillView>), ApiError> {
    let conn = ctx.open_db()?;
    let view = billing::create_bill(&conn, &caller, &request)?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /api/billing`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<BillView>>, ApiError> {
    let conn = ctx.open_db()?;
    let views = billing::list_bills(&conn, &caller)?;
    Ok(Json(views))
}

/// `GET /api/billing/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(bill_id): Path<Uuid>,
) -> Result<Json<BillView>, ApiError> {
    let conn = ctx.open_db()?;
    let view = billing::get_bill(&conn, &caller, bill_id)?;
    Ok(Json(view))
}

/// `PUT /api/billing/:id/payment` — record a payment-state change.
pub async fn payment(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(bill_id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<BillView>, ApiError> {
    let conn = ctx.open_db()?;
    let view = billing::record_payment(&conn, &caller, bill_id, &request)?;
    Ok(Json(view))
}

/// `GET /api/billing/stats/revenue`
pub async fn revenue(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<RevenueStats>, ApiError> {
    let conn = ctx.open_db()?;
    let stats = billing::revenue_stats(&conn, &caller)?;
    Ok(Json(stats))
}
