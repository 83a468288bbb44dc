//! API router.
//!
//! Routes are nested under `/api/`. All routes except `/api/health`
//! require bearer token authentication. Middleware uses
//! `Extension<ApiContext>` (injected as the outermost layer);
//! endpoint handlers use `State<ApiContext>`.

use axum::routing::{get, post, put};
use axum::Router;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the full API router.
pub fn api_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route(
            "/appointments",
            post(endpoints::appointments::create).get(endpoints::appointments::list),
        )
        .route(
            "/appointments/:id",
            get(endpoints::appointments::detail)
                .put(endpoints::appointments::update)
                .delete(endpoints::appointments::cancel),
        )
        .route(
            "/prescriptions",
            post(endpoints::prescriptions::create).get(endpoints::prescriptions::list),
        )
        .route(
            "/prescriptions/:id",
            get(endpoints::prescriptions::detail).put(endpoints::prescriptions::update),
        )
        .route(
            "/prescriptions/patient/:patient_id",
            get(endpoints::prescriptions::for_patient),
        )
        .route(
            "/billing",
            post(endpoints::billing::create).get(endpoints::billing::list),
        )
        .route("/billing/:id", get(endpoints::billing::detail))
        .route("/billing/:id/payment", put(endpoints::billing::payment))
        .route("/billing/stats/revenue", get(endpoints::billing::revenue))
        .route("/triage/predict", post(endpoints::triage::predict))
        .route("/triage/predictions", get(endpoints::triage::predictions))
        .route("/triage/stats", get(endpoints::triage::stats))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rusqlite::params;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::db::open_database;
    use crate::models::enums::{RiskLevel, Role};
    use crate::testutil::{seed_doctor_with_token, seed_patient, seed_user_with_token};
    use crate::triage::{MockTriageAdvisor, Prediction, ScheduleAdvice, TriageAdvisor};

    struct Harness {
        db_path: PathBuf,
        patient_token: String,
        patient_id: Uuid,
        doctor_token: String,
        doctor_id: Uuid,
        admin_token: String,
        _tmp: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("api.db");
        let conn = open_database(&db_path).unwrap();

        let patient_user = seed_user_with_token(
            &conn,
            Role::Patient,
            "Ada Osei",
            Some("1990-03-14"),
            Some("patient-token"),
        );
        let patient_id = seed_patient(&conn, patient_user, &["penicillin"], &["asthma"]);
        let doctor = seed_doctor_with_token(&conn, "Pulmonology", Some("doctor-token"));
        seed_user_with_token(&conn, Role::Admin, "Root Admin", None, Some("admin-token"));

        Harness {
            db_path,
            patient_token: "patient-token".into(),
            patient_id,
            doctor_token: "doctor-token".into(),
            doctor_id: doctor.doctor_id,
            admin_token: "admin-token".into(),
            _tmp: tmp,
        }
    }

    fn app_with(h: &Harness, advisor: Arc<dyn TriageAdvisor>) -> Router {
        api_router(ApiContext::new(h.db_path.clone(), advisor))
    }

    fn app(h: &Harness) -> Router {
        app_with(h, Arc::new(MockTriageAdvisor::unavailable()))
    }

    fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn json_req(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn response_json(response: axum::http::Response<Body>) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn booking_body(h: &Harness, symptoms: &[&str]) -> serde_json::Value {
        serde_json::json!({
            "doctor_id": h.doctor_id,
            "appointment_date": "2026-09-15",
            "appointment_time": "10:00",
            "reason": "persistent cough",
            "symptoms": symptoms,
        })
    }

    #[tokio::test]
    async fn health_needs_no_auth() {
        let h = harness();
        let response = app(&h).oneshot(get_req("/api/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], "ok");
    }

    #[tokio::test]
    async fn protected_routes_require_auth() {
        let h = harness();
        let response = app(&h)
            .oneshot(get_req("/api/appointments", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let h = harness();
        let response = app(&h)
            .oneshot(get_req("/api/appointments", Some("bogus")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn booking_succeeds_with_advisor_online() {
        let h = harness();
        let advisor = MockTriageAdvisor::unavailable()
            .with_prediction(Prediction {
                disease: "Bronchitis".into(),
                risk_level: RiskLevel::High,
                confidence: 91.0,
                recommendations: vec![],
            })
            .with_advice(ScheduleAdvice {
                priority: Some(crate::models::enums::Priority::Urgent),
                suggested_time: Some("08:30".into()),
            });
        let app = app_with(&h, Arc::new(advisor));

        let response = app
            .oneshot(json_req(
                "POST",
                "/api/appointments",
                &h.patient_token,
                booking_body(&h, &["cough", "fever"]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = response_json(response).await;
        assert_eq!(json["status"], "pending");
        assert_eq!(json["priority"], "urgent");
        assert_eq!(json["appointment_time"], "08:30");
        assert_eq!(json["ai_scheduled"], true);
        assert_eq!(json["patient"]["name"], "Ada Osei");
        assert_eq!(json["doctor"]["specialization"], "Pulmonology");
    }

    #[tokio::test]
    async fn booking_survives_advisor_outage() {
        let h = harness();
        let response = app(&h)
            .oneshot(json_req(
                "POST",
                "/api/appointments",
                &h.patient_token,
                booking_body(&h, &["cough"]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = response_json(response).await;
        assert_eq!(json["ai_scheduled"], false);
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["appointment_time"], "10:00");
        assert!(json["triage_snapshot"].is_null());
    }

    #[tokio::test]
    async fn booking_unknown_doctor_is_404() {
        let h = harness();
        let mut body = booking_body(&h, &[]);
        body["doctor_id"] = serde_json::json!(Uuid::new_v4());

        let response = app(&h)
            .oneshot(json_req("POST", "/api/appointments", &h.patient_token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn prescription_requires_assignment() {
        let h = harness();

        // Nothing assigned the patient yet, so even a valid doctor
        // is rejected.
        let body = serde_json::json!({
            "patient_id": h.patient_id,
            "diagnosis": "Bronchitis",
            "medications": [{
                "name": "Amoxicillin",
                "dosage": "500mg",
                "frequency": "twice daily",
                "duration": "7 days"
            }]
        });
        let response = app(&h)
            .oneshot(json_req("POST", "/api/prescriptions", &h.doctor_token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn booking_then_prescribing_flows_through_assignment() {
        let h = harness();

        // Booking soft-assigns the doctor of record
        let response = app(&h)
            .oneshot(json_req(
                "POST",
                "/api/appointments",
                &h.patient_token,
                booking_body(&h, &[]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = serde_json::json!({
            "patient_id": h.patient_id,
            "diagnosis": "Bronchitis",
            "medications": [{
                "name": "Amoxicillin",
                "dosage": "500mg",
                "frequency": "twice daily",
                "duration": "7 days"
            }]
        });
        let response = app(&h)
            .oneshot(json_req("POST", "/api/prescriptions", &h.doctor_token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = response_json(response).await;
        assert_eq!(json["diagnosis"], "Bronchitis");
        assert_eq!(json["patient_name"], "Ada Osei");
    }

    #[tokio::test]
    async fn patient_cannot_write_prescriptions() {
        let h = harness();
        let body = serde_json::json!({
            "patient_id": h.patient_id,
            "diagnosis": "self-diagnosis",
            "medications": []
        });
        let response = app(&h)
            .oneshot(json_req("POST", "/api/prescriptions", &h.patient_token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn empty_medication_list_is_validation_error() {
        let h = harness();
        {
            let conn = open_database(&h.db_path).unwrap();
            conn.execute(
                "UPDATE patients SET assigned_doctor_id = ?1 WHERE id = ?2",
                params![h.doctor_id.to_string(), h.patient_id.to_string()],
            )
            .unwrap();
        }

        let body = serde_json::json!({
            "patient_id": h.patient_id,
            "diagnosis": "Bronchitis",
            "medications": []
        });
        let response = app(&h)
            .oneshot(json_req("POST", "/api/prescriptions", &h.doctor_token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn billing_is_admin_only_and_computes_totals() {
        let h = harness();
        let body = serde_json::json!({
            "patient_id": h.patient_id,
            "items": [
                {"description": "Consultation", "quantity": 1, "unit_price": 150.0},
                {"description": "X-ray", "quantity": 2, "unit_price": 80.0}
            ],
            "tax": 31.0,
            "discount": 10.0
        });

        let response = app(&h)
            .oneshot(json_req("POST", "/api/billing", &h.doctor_token, body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(&h)
            .oneshot(json_req("POST", "/api/billing", &h.admin_token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = response_json(response).await;
        assert_eq!(json["subtotal"], 310.0);
        assert_eq!(json["total_amount"], 331.0);
        assert_eq!(json["payment_status"], "pending");
        let invoice = json["invoice_number"].as_str().unwrap();
        assert!(invoice.starts_with("INV-"));
    }

    #[tokio::test]
    async fn payment_flow_marks_bill_paid() {
        let h = harness();
        let create = serde_json::json!({
            "patient_id": h.patient_id,
            "items": [{"description": "Consultation", "quantity": 1, "unit_price": 150.0}]
        });
        let response = app(&h)
            .oneshot(json_req("POST", "/api/billing", &h.admin_token, create))
            .await
            .unwrap();
        let bill = response_json(response).await;
        let bill_id = bill["id"].as_str().unwrap().to_string();

        let pay = serde_json::json!({"payment_status": "paid", "payment_method": "card"});
        let response = app(&h)
            .oneshot(json_req(
                "PUT",
                &format!("/api/billing/{bill_id}/payment"),
                &h.admin_token,
                pay,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["payment_status"], "paid");
        assert_eq!(json["payment_method"], "card");
        assert!(json["payment_date"].is_string());

        // Paid revenue now shows up in admin stats
        let response = app(&h)
            .oneshot(get_req("/api/billing/stats/revenue", Some(&h.admin_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats = response_json(response).await;
        assert_eq!(stats["paid_bills"], 1);
        assert_eq!(stats["total_revenue"], 150.0);
    }

    #[tokio::test]
    async fn patients_see_only_their_own_bills() {
        let h = harness();
        let create = serde_json::json!({
            "patient_id": h.patient_id,
            "items": [{"description": "Consultation", "quantity": 1, "unit_price": 150.0}]
        });
        app(&h)
            .oneshot(json_req("POST", "/api/billing", &h.admin_token, create))
            .await
            .unwrap();

        let response = app(&h)
            .oneshot(get_req("/api/billing", Some(&h.patient_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        let response = app(&h)
            .oneshot(get_req("/api/billing/stats/revenue", Some(&h.patient_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn patient_settles_own_bill_over_the_api() {
        let h = harness();
        let create = serde_json::json!({
            "patient_id": h.patient_id,
            "items": [{"description": "Consultation", "quantity": 1, "unit_price": 150.0}]
        });
        let response = app(&h)
            .oneshot(json_req("POST", "/api/billing", &h.admin_token, create))
            .await
            .unwrap();
        let bill = response_json(response).await;
        let bill_id = bill["id"].as_str().unwrap().to_string();

        let response = app(&h)
            .oneshot(json_req(
                "PUT",
                &format!("/api/billing/{bill_id}/payment"),
                &h.patient_token,
                serde_json::json!({"payment_status": "paid", "payment_method": "online"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["payment_status"], "paid");
        assert!(json["payment_date"].is_string());
    }

    #[tokio::test]
    async fn doctor_reads_the_billing_ledger() {
        let h = harness();
        let create = serde_json::json!({
            "patient_id": h.patient_id,
            "items": [{"description": "Consultation", "quantity": 1, "unit_price": 150.0}]
        });
        app(&h)
            .oneshot(json_req("POST", "/api/billing", &h.admin_token, create))
            .await
            .unwrap();

        let response = app(&h)
            .oneshot(get_req("/api/billing", Some(&h.doctor_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn triage_predict_returns_503_when_advisor_down() {
        let h = harness();
        let body = serde_json::json!({
            "symptoms": ["fever"],
            "age": 36,
            "gender": "female",
            "medicalHistory": ["asthma"]
        });
        let response = app(&h)
            .oneshot(json_req("POST", "/api/triage/predict", &h.patient_token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn triage_predict_logs_and_lists() {
        let h = harness();
        let advisor = MockTriageAdvisor::unavailable().with_prediction(Prediction {
            disease: "Influenza".into(),
            risk_level: RiskLevel::Medium,
            confidence: 82.5,
            recommendations: vec!["Rest".into()],
        });
        let advisor = Arc::new(advisor);

        let body = serde_json::json!({
            "symptoms": ["fever", "cough"],
            "age": 36,
            "gender": "female",
            "medicalHistory": ["asthma"]
        });
        let response = app_with(&h, advisor.clone())
            .oneshot(json_req("POST", "/api/triage/predict", &h.patient_token, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["disease"], "Influenza");
        assert_eq!(json["riskLevel"], "medium");

        let response = app_with(&h, advisor)
            .oneshot(get_req("/api/triage/predictions", Some(&h.patient_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);

        // Stats are admin-only
        let response = app(&h)
            .oneshot(get_req("/api/triage/stats", Some(&h.patient_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(&h)
            .oneshot(get_req("/api/triage/stats", Some(&h.admin_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats = response_json(response).await;
        assert_eq!(stats["total_predictions"], 1);
    }

    #[tokio::test]
    async fn staff_predictions_skip_the_observational_log() {
        let h = harness();
        let advisor = Arc::new(MockTriageAdvisor::unavailable().with_prediction(Prediction {
            disease: "Influenza".into(),
            risk_level: RiskLevel::Medium,
            confidence: 82.5,
            recommendations: vec![],
        }));

        // Doctors may ask for a prediction; demographics default when absent
        let response = app_with(&h, advisor.clone())
            .oneshot(json_req(
                "POST",
                "/api/triage/predict",
                &h.doctor_token,
                serde_json::json!({"symptoms": ["fever"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["disease"], "Influenza");

        // No patient profile resolved, so nothing was logged
        let response = app_with(&h, advisor)
            .oneshot(get_req("/api/triage/predictions", Some(&h.doctor_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert!(json.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn appointment_detail_is_ownership_checked() {
        let h = harness();
        let response = app(&h)
            .oneshot(json_req(
                "POST",
                "/api/appointments",
                &h.patient_token,
                booking_body(&h, &[]),
            ))
            .await
            .unwrap();
        let json = response_json(response).await;
        let id = json["id"].as_str().unwrap().to_string();

        // A second patient cannot read it
        {
            let conn = open_database(&h.db_path).unwrap();
            let other_user = seed_user_with_token(
                &conn,
                Role::Patient,
                "Nia Kato",
                None,
                Some("other-token"),
            );
            seed_patient(&conn, other_user, &[], &[]);
        }
        let response = app(&h)
            .oneshot(get_req(&format!("/api/appointments/{id}"), Some("other-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // The owner can
        let response = app(&h)
            .oneshot(get_req(&format!("/api/appointments/{id}"), Some(&h.patient_token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Cancel is a status change, not a delete
        let response = app(&h)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/appointments/{id}"))
                    .header("Authorization", format!("Bearer {}", h.patient_token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app(&h)
            .oneshot(get_req(&format!("/api/appointments/{id}"), Some(&h.patient_token)))
            .await
            .unwrap();
        let json = response_json(response).await;
        assert_eq!(json["status"], "cancelled");
    }

    #[tokio::test]
    async fn patient_edits_own_appointment() {
        let h = harness();
        let response = app(&h)
            .oneshot(json_req(
                "POST",
                "/api/appointments",
                &h.patient_token,
                booking_body(&h, &[]),
            ))
            .await
            .unwrap();
        let json = response_json(response).await;
        let id = json["id"].as_str().unwrap().to_string();

        let response = app(&h)
            .oneshot(json_req(
                "PUT",
                &format!("/api/appointments/{id}"),
                &h.patient_token,
                serde_json::json!({"appointment_time": "14:30", "notes": "running late"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["appointment_time"], "14:30");
        assert_eq!(json["notes"], "running late");
    }
}
