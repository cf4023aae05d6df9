use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::domain::NewEnrollment;
use super::roster::RosterGateway;
use super::service::{EnrollmentService, ServiceError, VerificationReport};
use super::store::EnrollmentStore;

/// HTTP surface for the wizard and the admin console. Admin data routes
/// carry no server-side gate; access control lives with the console, the
/// same separation the hosted store used.
pub fn enrollment_router<G, E>(service: Arc<EnrollmentService<G, E>>) -> Router
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
{
    Router::new()
        .route("/api/v1/enrollment/verify", post(verify_handler::<G, E>))
        .route("/api/v1/enrollment/tracks", get(tracks_handler::<G, E>))
        .route(
            "/api/v1/enrollment/submissions",
            post(submit_handler::<G, E>),
        )
        .route("/api/v1/admin/login", post(admin_login_handler::<G, E>))
        .route(
            "/api/v1/admin/enrollments",
            get(admin_enrollments_handler::<G, E>),
        )
        .route(
            "/api/v1/admin/enrollments/export",
            get(admin_export_handler::<G, E>),
        )
        .route(
            "/api/v1/admin/enrollments/:id",
            delete(admin_delete_handler::<G, E>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub student_number: String,
    pub email: String,
}

pub async fn verify_handler<G, E>(
    State(service): State<Arc<EnrollmentService<G, E>>>,
    Json(request): Json<VerifyRequest>,
) -> Response
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
{
    match service
        .verify_identity(&request.student_number, &request.email)
        .await
    {
        Ok(VerificationReport::Verified {
            entry,
            already_enrolled,
        }) => (
            StatusCode::OK,
            Json(json!({
                "status": "verified",
                "already_enrolled": already_enrolled,
                "profile": {
                    "student_number": entry.student_number,
                    "name": entry.name,
                    "section": entry.section,
                    "section_id": entry.section_id,
                },
            })),
        )
            .into_response(),
        Ok(VerificationReport::NotFound) => (
            StatusCode::OK,
            Json(json!({ "status": "not_found", "already_enrolled": false })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub struct TracksQuery {
    pub section_id: Option<String>,
}

pub async fn tracks_handler<G, E>(
    State(service): State<Arc<EnrollmentService<G, E>>>,
    Query(query): Query<TracksQuery>,
) -> Response
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
{
    match service
        .track_availability(query.section_id.as_deref())
        .await
    {
        Ok(availability) => {
            let tracks: Vec<_> = availability
                .into_iter()
                .map(|entry| {
                    json!({
                        "id": entry.track.id,
                        "title": entry.track.title,
                        "description": entry.track.description,
                        "icon": entry.track.icon.label(),
                        "hours": entry.track.hours,
                        "enrolled": entry.enrolled,
                        "capacity": entry.ceiling,
                        "is_own_section": entry.is_own_section,
                        "is_full": entry.is_full,
                        "selectable": entry.selectable(),
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "tracks": tracks }))).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub async fn submit_handler<G, E>(
    State(service): State<Arc<EnrollmentService<G, E>>>,
    Json(enrollment): Json<NewEnrollment>,
) -> Response
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
{
    match service.submit(enrollment).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn admin_login_handler<G, E>(
    State(service): State<Arc<EnrollmentService<G, E>>>,
    Json(request): Json<AdminLoginRequest>,
) -> Response
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
{
    let authenticated = service.check_admin_login(&request.username, &request.password);
    (
        StatusCode::OK,
        Json(json!({ "authenticated": authenticated })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct AdminSearchQuery {
    pub search: Option<String>,
}

pub async fn admin_enrollments_handler<G, E>(
    State(service): State<Arc<EnrollmentService<G, E>>>,
    Query(query): Query<AdminSearchQuery>,
) -> Response
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
{
    match service.admin_enrollments(query.search.as_deref()).await {
        Ok(records) => (StatusCode::OK, Json(json!({ "enrollments": records }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub async fn admin_export_handler<G, E>(
    State(service): State<Arc<EnrollmentService<G, E>>>,
) -> Response
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
{
    match service.admin_export().await {
        Ok(export) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.file_name),
                ),
            ],
            export.bytes,
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub async fn admin_delete_handler<G, E>(
    State(service): State<Arc<EnrollmentService<G, E>>>,
    Path(id): Path<i64>,
) -> Response
where
    G: RosterGateway + 'static,
    E: EnrollmentStore + 'static,
{
    match service.admin_delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: ServiceError) -> Response {
    match error {
        ServiceError::UnknownTrack(id) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": format!("track {id} is not in the catalog") })),
        )
            .into_response(),
        ServiceError::NothingToExport => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no enrollments to export" })),
        )
            .into_response(),
        ServiceError::Store(error) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": error.to_string(), "retryable": true })),
        )
            .into_response(),
    }
}
