//! Course catalog handlers: courses, assignments, and enrollments.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{Pagination, PaginationQuery};
use crate::api::middleware::auth::{AuthExtension, UPLOAD_ROLES};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::course::{Assignment, Course, Enrollment};
use crate::services::course_service::{
    AssignmentPatch, CourseFilter, CoursePatch, NewAssignment, NewCourse,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route(
            "/:id",
            get(get_course).patch(update_course).delete(delete_course),
        )
        .route(
            "/:id/assignments",
            get(list_assignments).post(create_assignment),
        )
        .route("/:id/enrollments", get(list_enrollments).post(enroll))
        .route("/:id/enrollments/:user_id", delete(unenroll))
}

/// Assignments addressed by their own id once created under a course.
pub fn assignments_router() -> Router<SharedState> {
    Router::new().route("/:id", patch(update_assignment).delete(delete_assignment))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub semester: String,
    pub instructor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub semester: Option<String>,
    pub instructor_id: Option<Uuid>,
    pub is_archived: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseResponse {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub semester: String,
    pub instructor_id: Option<Uuid>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Course> for CourseResponse {
    fn from(course: Course) -> Self {
        Self {
            id: course.id,
            code: course.code,
            title: course.title,
            description: course.description,
            semester: course.semester,
            instructor_id: course.instructor_id,
            is_archived: course.is_archived,
            created_at: course.created_at,
            updated_at: course.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCoursesQuery {
    pub semester: Option<String>,
    pub include_archived: Option<bool>,
    /// Substring match on title or code
    pub search: Option<String>,
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PaginationQuery,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CourseListResponse {
    pub courses: Vec<CourseResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAssignmentRequest {
    pub title: String,
    pub instructions: Option<String>,
    pub points: i32,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAssignmentRequest {
    pub title: Option<String>,
    pub instructions: Option<String>,
    pub points: Option<i32>,
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub instructions: Option<String>,
    pub points: i32,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Assignment> for AssignmentResponse {
    fn from(a: Assignment) -> Self {
        Self {
            id: a.id,
            course_id: a.course_id,
            title: a.title,
            instructions: a.instructions,
            points: a.points,
            due_at: a.due_at,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollmentResponse {
    pub course_id: Uuid,
    pub user_id: Uuid,
    pub enrolled_at: DateTime<Utc>,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            course_id: e.course_id,
            user_id: e.user_id,
            enrolled_at: e.enrolled_at,
        }
    }
}

/// List courses with optional semester, archive, and search filters.
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/courses",
    tag = "courses",
    params(ListCoursesQuery),
    responses(
        (status = 200, description = "List of courses", body = CourseListResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn list_courses(
    State(state): State<SharedState>,
    Query(query): Query<ListCoursesQuery>,
) -> Result<Json<CourseListResponse>> {
    let filter = CourseFilter {
        semester: query.semester.clone(),
        include_archived: query.include_archived.unwrap_or(false),
        search: query.search.clone(),
        limit: query.pagination.limit(),
        offset: query.pagination.offset(),
    };

    let (courses, total) = state.courses.list(&filter).await?;

    Ok(Json(CourseListResponse {
        courses: courses.into_iter().map(Into::into).collect(),
        pagination: Pagination::from_query_and_total(&query.pagination, total),
    }))
}

/// Create a course.
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/courses",
    tag = "courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 409, description = "Course code already in use")
    ),
    security(("bearer_auth" = []))
)]
async fn create_course(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(req): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<CourseResponse>)> {
    auth.require_role(UPLOAD_ROLES)?;

    let course = state
        .courses
        .create(
            NewCourse {
                code: req.code,
                title: req.title,
                description: req.description,
                semester: req.semester,
                instructor_id: req.instructor_id,
            },
            auth.user_id,
            &auth.email,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(course.into())))
}

/// Fetch a single course.
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/courses",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Course details", body = CourseResponse),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = []))
)]
async fn get_course(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CourseResponse>> {
    let course = state.courses.get(id).await?;
    Ok(Json(course.into()))
}

/// Update course fields; absent fields are left unchanged.
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/courses",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Course updated", body = CourseResponse),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = []))
)]
async fn update_course(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCourseRequest>,
) -> Result<Json<CourseResponse>> {
    auth.require_role(UPLOAD_ROLES)?;

    let course = state
        .courses
        .update(
            id,
            CoursePatch {
                title: req.title,
                description: req.description,
                semester: req.semester,
                instructor_id: req.instructor_id,
                is_archived: req.is_archived,
            },
            auth.user_id,
            &auth.email,
        )
        .await?;

    Ok(Json(course.into()))
}

/// Delete a course. Lecture videos keep their rows; the course reference
/// becomes null.
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/courses",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 204, description = "Course deleted"),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = []))
)]
async fn delete_course(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require_role(UPLOAD_ROLES)?;
    state.courses.delete(id, auth.user_id, &auth.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List assignments for a course, soonest due first.
#[utoipa::path(
    get,
    path = "/{id}/assignments",
    context_path = "/api/courses",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Assignments", body = Vec<AssignmentResponse>),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = []))
)]
async fn list_assignments(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AssignmentResponse>>> {
    let assignments = state.courses.list_assignments(id).await?;
    Ok(Json(assignments.into_iter().map(Into::into).collect()))
}

/// Add an assignment to a course.
#[utoipa::path(
    post,
    path = "/{id}/assignments",
    context_path = "/api/courses",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = CreateAssignmentRequest,
    responses(
        (status = 201, description = "Assignment created", body = AssignmentResponse),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = []))
)]
async fn create_assignment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<AssignmentResponse>)> {
    auth.require_role(UPLOAD_ROLES)?;

    let assignment = state
        .courses
        .create_assignment(
            id,
            NewAssignment {
                title: req.title,
                instructions: req.instructions,
                points: req.points,
                due_at: req.due_at,
            },
            auth.user_id,
            &auth.email,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(assignment.into())))
}

/// Update assignment fields; absent fields are left unchanged.
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/assignments",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    request_body = UpdateAssignmentRequest,
    responses(
        (status = 200, description = "Assignment updated", body = AssignmentResponse),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer_auth" = []))
)]
async fn update_assignment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAssignmentRequest>,
) -> Result<Json<AssignmentResponse>> {
    auth.require_role(UPLOAD_ROLES)?;

    let assignment = state
        .courses
        .update_assignment(
            id,
            AssignmentPatch {
                title: req.title,
                instructions: req.instructions,
                points: req.points,
                due_at: req.due_at,
            },
            auth.user_id,
            &auth.email,
        )
        .await?;

    Ok(Json(assignment.into()))
}

/// Remove an assignment.
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/assignments",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Assignment ID")),
    responses(
        (status = 204, description = "Assignment deleted"),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer_auth" = []))
)]
async fn delete_assignment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require_role(UPLOAD_ROLES)?;
    state
        .courses
        .delete_assignment(id, auth.user_id, &auth.email)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List enrollments for a course.
#[utoipa::path(
    get,
    path = "/{id}/enrollments",
    context_path = "/api/courses",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course ID")),
    responses(
        (status = 200, description = "Enrollments", body = Vec<EnrollmentResponse>),
        (status = 404, description = "Course not found")
    ),
    security(("bearer_auth" = []))
)]
async fn list_enrollments(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<EnrollmentResponse>>> {
    let enrollments = state.courses.list_enrollments(id).await?;
    Ok(Json(enrollments.into_iter().map(Into::into).collect()))
}

/// Enroll a user in a course. Enrolling twice is a no-op.
#[utoipa::path(
    post,
    path = "/{id}/enrollments",
    context_path = "/api/courses",
    tag = "courses",
    params(("id" = Uuid, Path, description = "Course ID")),
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "User enrolled", body = EnrollmentResponse),
        (status = 404, description = "Course or user not found")
    ),
    security(("bearer_auth" = []))
)]
async fn enroll(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<EnrollmentResponse>)> {
    auth.require_role(UPLOAD_ROLES)?;

    let enrollment = state
        .courses
        .enroll(id, req.user_id, auth.user_id, &auth.email)
        .await?;

    Ok((StatusCode::CREATED, Json(enrollment.into())))
}

/// Remove a user from a course.
#[utoipa::path(
    delete,
    path = "/{id}/enrollments/{user_id}",
    context_path = "/api/courses",
    tag = "courses",
    params(
        ("id" = Uuid, Path, description = "Course ID"),
        ("user_id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "Enrollment removed"),
        (status = 404, description = "Enrollment not found")
    ),
    security(("bearer_auth" = []))
)]
async fn unenroll(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode> {
    auth.require_role(UPLOAD_ROLES)?;
    state
        .courses
        .unenroll(id, user_id, auth.user_id, &auth.email)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_courses,
        create_course,
        get_course,
        update_course,
        delete_course,
        list_assignments,
        create_assignment,
        update_assignment,
        delete_assignment,
        list_enrollments,
        enroll,
        unenroll,
    ),
    components(schemas(
        CreateCourseRequest,
        UpdateCourseRequest,
        CourseResponse,
        CourseListResponse,
        CreateAssignmentRequest,
        UpdateAssignmentRequest,
        AssignmentResponse,
        EnrollRequest,
        EnrollmentResponse,
    ))
)]
pub struct CoursesApiDoc;
