use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::approvals::Decision;
use super::domain::{Actor, RequestId, Role, SectionId, StudentId};
use super::rejection::EnrollmentError;
use super::repository::RegistrarRepository;
use super::service::{RegistrarService, RequestSubmission, Submission, WorkflowError};

const DEFAULT_QUEUE_LIMIT: usize = 50;

/// Router builder exposing the enrollment and approval endpoints.
pub fn registrar_router<R>(service: Arc<RegistrarService<R>>) -> Router
where
    R: RegistrarRepository + 'static,
{
    Router::new()
        .route("/api/v1/requests", post(submit_handler::<R>))
        .route(
            "/api/v1/requests/:request_id/decision",
            post(decision_handler::<R>),
        )
        .route(
            "/api/v1/requests/:request_id/history",
            get(history_handler::<R>),
        )
        .route("/api/v1/approvals", get(queue_handler::<R>))
        .route(
            "/api/v1/sections/:section_id/enrollments",
            post(enroll_handler::<R>),
        )
        .route(
            "/api/v1/sections/:section_id/enrollments/:student_id",
            get(eligibility_handler::<R>).delete(drop_handler::<R>),
        )
        .route(
            "/api/v1/sections/:section_id/grades/:student_id",
            put(grade_handler::<R>),
        )
        .route(
            "/api/v1/sections/:section_id/lock",
            post(lock_handler::<R>),
        )
        .route(
            "/api/v1/sections/:section_id/overview",
            get(overview_handler::<R>),
        )
        .route(
            "/api/v1/students/:student_id/transcript",
            get(transcript_handler::<R>),
        )
        .route(
            "/api/v1/students/:student_id/requests",
            get(summary_handler::<R>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitBody {
    pub actor: Actor,
    #[serde(flatten)]
    pub submission: RequestSubmission,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionBody {
    pub actor: Actor,
    pub decision: Decision,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnrollBody {
    pub actor: Actor,
    pub student: StudentId,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawGradeInput {
    Text(String),
    Number(f64),
}

impl RawGradeInput {
    fn into_raw(self) -> String {
        match self {
            RawGradeInput::Text(text) => text,
            RawGradeInput::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GradeBody {
    pub actor: Actor,
    pub grade: RawGradeInput,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorBody {
    pub actor: Actor,
}

/// Caller identity passed on query strings for bodiless requests.
#[derive(Debug, Deserialize)]
pub(crate) struct ActorQuery {
    pub actor_id: String,
    pub role: Role,
    pub limit: Option<usize>,
}

impl ActorQuery {
    fn actor(&self) -> Actor {
        Actor::new(self.actor_id.clone(), self.role)
    }
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Json(body): Json<SubmitBody>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    match service.submit(&body.actor, body.submission) {
        Ok(submission @ Submission::Completed { .. }) => {
            (StatusCode::CREATED, Json(submission)).into_response()
        }
        Ok(submission @ Submission::Pending { .. }) => {
            (StatusCode::ACCEPTED, Json(submission)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decision_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path(request_id): Path<String>,
    Json(body): Json<DecisionBody>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    let id = RequestId(request_id);
    match service.decide(&body.actor, &id, body.decision, &body.note) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path(request_id): Path<String>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    match service.approval_history(&RequestId(request_id)) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn queue_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Query(query): Query<ActorQuery>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_QUEUE_LIMIT);
    match service.approval_queue(&query.actor(), limit) {
        Ok(queue) => (StatusCode::OK, Json(queue)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn enroll_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path(section_id): Path<String>,
    Json(body): Json<EnrollBody>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    match service.enroll(&body.actor, &body.student, &SectionId(section_id)) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn eligibility_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path((section_id, student_id)): Path<(String, String)>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    match service.evaluate(&StudentId(student_id), &SectionId(section_id)) {
        Ok(verdict) => (StatusCode::OK, Json(verdict)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn drop_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path((section_id, student_id)): Path<(String, String)>,
    Query(query): Query<ActorQuery>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    let student = StudentId(student_id);
    match service.withdraw(&query.actor(), &student, &SectionId(section_id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn grade_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path((section_id, student_id)): Path<(String, String)>,
    Json(body): Json<GradeBody>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    let raw = body.grade.into_raw();
    let section = SectionId(section_id);
    match service.record_grade(&body.actor, &section, &StudentId(student_id), &raw) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn lock_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path(section_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    match service.toggle_section_lock(&body.actor, &SectionId(section_id)) {
        Ok(section) => {
            let payload = json!({
                "section": section.id,
                "grades_locked": section.grades_locked,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn overview_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path(section_id): Path<String>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    match service.section_overview(&SectionId(section_id)) {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn transcript_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    match service.transcript(&StudentId(student_id)) {
        Ok(transcript) => (StatusCode::OK, Json(transcript)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn summary_handler<R>(
    State(service): State<Arc<RegistrarService<R>>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: RegistrarRepository + 'static,
{
    match service.request_summary(&StudentId(student_id)) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn error_response(error: WorkflowError) -> Response {
    match error {
        WorkflowError::Enrollment(EnrollmentError::Rejected(reason)) => {
            let payload = json!({
                "error": reason.to_string(),
                "reason": reason,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        WorkflowError::Enrollment(EnrollmentError::NotFound(entity)) => {
            let payload = json!({
                "error": format!("{entity} not found"),
            });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        WorkflowError::Unauthorized { .. } => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::FORBIDDEN, Json(payload)).into_response()
        }
        WorkflowError::AlreadyDecided(_) => {
            let payload = json!({
                "error": error.to_string(),
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        other => {
            let payload = json!({
                "error": other.to_string(),
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}
