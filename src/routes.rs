use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    models::*,
    reconcile::SyncReport,
    remote::{RemoteCourseApi, RemoteCourseWrite},
    store::CanonicalStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CanonicalStore>,
    /// Write side of the course API; `None` when running offline.
    pub remote: Option<Arc<RemoteCourseApi>>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

pub fn router(state: AppState) -> Router {
    Router::new()
        // instructor + learner course views
        .route("/api/instructor/courses", get(instructor_courses))
        .route("/api/paths/:slug/courses", get(path_courses))
        .route("/api/courses", post(create_course))
        .route(
            "/api/courses/:id",
            get(get_course).patch(update_course).delete(delete_course),
        )
        .route("/api/courses/:id/modules", put(set_modules))
        .route("/api/courses/:id/publish", post(publish_course))
        .route("/api/courses/:id/archive", post(archive_course))
        // assignments + quizzes
        .route("/api/assignments", get(list_assignments).post(create_assignment))
        .route("/api/assignments/:id", get(get_assignment).patch(update_assignment))
        .route("/api/quizzes", get(list_quizzes))
        .route("/api/quizzes/:id", get(get_quiz).put(put_quiz))
        .route("/api/assessments", get(list_assessments))
        // manual reconciliation
        .route("/api/sync", post(sync_courses))
        .with_state(state)
}

async fn instructor_courses(State(app): State<AppState>) -> Json<Vec<Course>> {
    Json(app.store.courses_for_instructor())
}

async fn path_courses(State(app): State<AppState>, Path(slug): Path<String>) -> Json<Vec<Course>> {
    Json(app.store.published_courses_for_path(&slug))
}

async fn get_course(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Course> {
    app.store
        .course_by_id(&id)
        .map(Json)
        .ok_or_else(|| e404("course not found"))
}

async fn create_course(
    State(app): State<AppState>,
    Json(req): Json<CreateCourseReq>,
) -> Result<(StatusCode, Json<Course>), (StatusCode, String)> {
    if req.title.trim().is_empty() {
        return Err(e400("title is required"));
    }
    let mut course = Course::new(Uuid::new_v4().to_string(), req.title.trim(), req.roles);
    course.description = req.description;
    course.video_url = req.video_url.filter(|u| !u.trim().is_empty());
    course.instructor = req.instructor;
    if let Some(status) = req.status {
        course.status = status;
    }
    let course = app.store.add_course(course);
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<CoursePatch>,
) -> ApiResult<Course> {
    app.store
        .update_course(&id, patch)
        .map(Json)
        .ok_or_else(|| e404("course not found"))
}

async fn delete_course(State(app): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, (StatusCode, String)> {
    let removed = app.store.delete_course(&id).ok_or_else(|| e404("course not found"))?;
    if let (Some(remote), Some(backend_id)) = (&app.remote, &removed.backend_id) {
        if let Err(e) = remote.delete_course(backend_id).await {
            tracing::warn!(error = %e, course_id = %removed.id, "remote course delete failed");
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn set_modules(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(modules): Json<Vec<Module>>,
) -> ApiResult<Course> {
    app.store
        .set_course_modules(&id, modules)
        .map(Json)
        .ok_or_else(|| e404("course not found"))
}

async fn publish_course(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Course> {
    let course = app.store.publish_course(&id).ok_or_else(|| e404("course not found"))?;
    Ok(Json(push_status(&app, course).await))
}

async fn archive_course(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Course> {
    app.store
        .archive_course(&id)
        .map(Json)
        .ok_or_else(|| e404("course not found"))
}

// The store never talks to the remote on its own; publishing is pushed here.
async fn push_status(app: &AppState, course: Course) -> Course {
    let Some(remote) = &app.remote else {
        return course;
    };
    let body = RemoteCourseWrite::from_course(&course);
    match &course.backend_id {
        Some(backend_id) => {
            if let Err(e) = remote.update_course(backend_id, &body).await {
                tracing::warn!(error = %e, course_id = %course.id, "remote course update failed");
            }
            course
        }
        None => match remote.create_course(&body).await {
            Ok(created) => app
                .store
                .attach_backend_id(&course.id, &created.id)
                .unwrap_or(course),
            Err(e) => {
                tracing::warn!(error = %e, course_id = %course.id, "remote course create failed");
                course
            }
        },
    }
}

async fn list_assignments(State(app): State<AppState>) -> Json<Vec<Assignment>> {
    Json(app.store.assignments())
}

async fn get_assignment(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<Assignment> {
    app.store
        .assignment_by_id(&id)
        .map(Json)
        .ok_or_else(|| e404("assignment not found"))
}

async fn create_assignment(
    State(app): State<AppState>,
    Json(req): Json<CreateAssignmentReq>,
) -> Result<(StatusCode, Json<Assignment>), (StatusCode, String)> {
    if req.title.trim().is_empty() {
        return Err(e400("title is required"));
    }
    if app.store.course_by_id(&req.course_id).is_none() {
        return Err(e400("course not found"));
    }
    let assignment = app.store.add_assignment(Assignment {
        id: Uuid::new_v4().to_string(),
        title: req.title.trim().to_string(),
        course_id: req.course_id,
        module_id: req.module_id,
        role: req.role,
        kind: req.kind,
        due_date: req.due_date,
        status: AssignmentStatus::Assigned,
        description: req.description,
        ai_feedback: None,
    });
    Ok((StatusCode::CREATED, Json(assignment)))
}

async fn update_assignment(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<AssignmentPatch>,
) -> ApiResult<Assignment> {
    app.store
        .update_assignment(&id, patch)
        .map(Json)
        .ok_or_else(|| e404("assignment not found"))
}

async fn list_quizzes(State(app): State<AppState>) -> Json<Vec<QuizConfig>> {
    Json(app.store.quiz_configs())
}

async fn get_quiz(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult<QuizConfig> {
    app.store
        .quiz_config(&id)
        .map(Json)
        .ok_or_else(|| e404("quiz not found"))
}

async fn put_quiz(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(mut quiz): Json<QuizConfig>,
) -> ApiResult<QuizConfig> {
    if quiz.passing_score > 100 {
        return Err(e400("passingScore must be a percentage"));
    }
    // the path decides which quiz is written
    quiz.id = id;
    Ok(Json(app.store.add_or_update_quiz_config(quiz)))
}

#[derive(Deserialize, Debug)]
struct AssessmentQuery {
    course_id: Option<String>,
}

async fn list_assessments(
    State(app): State<AppState>,
    Query(q): Query<AssessmentQuery>,
) -> Json<Vec<Assessment>> {
    Json(app.store.available_assessments(q.course_id.as_deref()))
}

async fn sync_courses(State(app): State<AppState>) -> Json<SyncReport> {
    Json(app.store.sync_courses_from_backend().await)
}

// --- helpers ---
fn e400<T: Into<String>>(msg: T) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.into())
}

fn e404<T: Into<String>>(msg: T) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, msg.into())
}
