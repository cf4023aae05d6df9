use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use immersion_enroll::workflows::enrollment::{
    enrollment_router, EnrollmentDraft, EnrollmentService, EnrollmentStore, ReceiptRenderer,
    ReceiptView, RosterGateway, TextReceipt, TrackCatalog,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_enrollment_routes<G, E>(service: Arc<EnrollmentService<G, E>>) -> axum::Router
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
{
    enrollment_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/enrollment/receipt",
            axum::routing::post(receipt_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Renders the confirmation artifact for a finalized draft. Pure function of
/// the posted draft; a draft that has not reached the success step is
/// rejected.
pub(crate) async fn receipt_endpoint(Json(draft): Json<EnrollmentDraft>) -> Response {
    let catalog = TrackCatalog::standard();
    let Some(track_id) = draft.selected_track_id.clone() else {
        return unprocessable("draft has no selected track");
    };
    let Some(track) = catalog.get(&track_id) else {
        return unprocessable(&format!("track {track_id} is not in the catalog"));
    };

    match ReceiptView::compose(&draft, track).and_then(|view| TextReceipt.render(&view)) {
        Ok(artifact) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, artifact.media_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", artifact.file_name),
                ),
            ],
            artifact.bytes,
        )
            .into_response(),
        Err(error) => unprocessable(&error.to_string()),
    }
}

fn unprocessable(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use immersion_enroll::workflows::enrollment::{StudentProfile, TrackId, WizardStep};

    fn finalized_draft() -> EnrollmentDraft {
        EnrollmentDraft {
            profile: StudentProfile {
                student_number: "12345".to_string(),
                email: "maria.santos@school.edu".to_string(),
                full_name: "Maria Santos".to_string(),
                section: "12 - Newton".to_string(),
                section_id: "film-photo".to_string(),
                enrolled_at: Utc.with_ymd_and_hms(2025, 9, 1, 8, 30, 0).single(),
            },
            selected_track_id: Some(TrackId::new("ai")),
            step: WizardStep::Success,
        }
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    #[tokio::test]
    async fn receipt_endpoint_renders_a_finalized_draft() {
        let response = receipt_endpoint(Json(finalized_draft())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .expect("disposition header")
            .to_str()
            .expect("header is ascii")
            .to_string();
        assert!(disposition.contains("immersion-track-ai.txt"));

        let body = body_string(response).await;
        assert!(body.contains("Maria Santos"));
        assert!(body.contains("Understanding Artificial Intelligence"));
    }

    #[tokio::test]
    async fn receipt_endpoint_rejects_an_unfinished_draft() {
        let mut draft = finalized_draft();
        draft.step = WizardStep::Review;

        let response = receipt_endpoint(Json(draft)).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn receipt_endpoint_rejects_an_unknown_track() {
        let mut draft = finalized_draft();
        draft.selected_track_id = Some(TrackId::new("underwater-basketry"));

        let response = receipt_endpoint(Json(draft)).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
