//! Courses, assignments, and enrollments.

use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::course::{Assignment, Course, Enrollment};
use crate::services::audit_service::{AuditRecord, AuditService, EntityType};

const COURSE_COLUMNS: &str =
    "id, code, title, description, semester, instructor_id, is_archived, created_at, updated_at";

const ASSIGNMENT_COLUMNS: &str =
    "id, course_id, title, instructions, points, due_at, created_at, updated_at";

/// Fields for a new course
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub code: String,
    pub title: String,
    pub description: Option<String>,
    pub semester: String,
    pub instructor_id: Option<Uuid>,
}

/// Partial update; None leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub semester: Option<String>,
    pub instructor_id: Option<Uuid>,
    pub is_archived: Option<bool>,
}

/// List filters plus pagination
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub semester: Option<String>,
    pub include_archived: bool,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Fields for a new assignment
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub title: String,
    pub instructions: Option<String>,
    pub points: i32,
    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Partial update; None leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub instructions: Option<String>,
    pub points: Option<i32>,
    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn validate_course(course: &NewCourse) -> Result<()> {
    if course.code.trim().is_empty() {
        return Err(AppError::Validation("course code must not be empty".into()));
    }
    if course.title.trim().is_empty() {
        return Err(AppError::Validation("course title must not be empty".into()));
    }
    if course.semester.trim().is_empty() {
        return Err(AppError::Validation("semester must not be empty".into()));
    }
    Ok(())
}

/// Course service
pub struct CourseService {
    db: PgPool,
    audit: Arc<AuditService>,
}

impl CourseService {
    pub fn new(db: PgPool, audit: Arc<AuditService>) -> Self {
        Self { db, audit }
    }

    pub async fn create(
        &self,
        course: NewCourse,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Course> {
        validate_course(&course)?;

        let created = sqlx::query_as::<_, Course>(&format!(
            "INSERT INTO courses (code, title, description, semester, instructor_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(course.code.trim())
        .bind(course.title.trim())
        .bind(&course.description)
        .bind(course.semester.trim())
        .bind(course.instructor_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
                "a course with code '{}' already exists",
                course.code.trim()
            )),
            _ => AppError::from(e),
        })?;

        self.audit
            .record(
                AuditRecord::new("course.created", EntityType::Course, created.id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "code": created.code, "title": created.title })),
            )
            .await?;

        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Course> {
        sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("course {} not found", id)))
    }

    pub async fn list(&self, filter: &CourseFilter) -> Result<(Vec<Course>, i64)> {
        let courses = sqlx::query_as::<_, Course>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses
             WHERE ($1::text IS NULL OR semester = $1)
               AND ($2 OR NOT is_archived)
               AND ($3::text IS NULL OR title ILIKE '%' || $3 || '%' OR code ILIKE '%' || $3 || '%')
             ORDER BY code ASC
             LIMIT $4 OFFSET $5"
        ))
        .bind(&filter.semester)
        .bind(filter.include_archived)
        .bind(&filter.search)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM courses
             WHERE ($1::text IS NULL OR semester = $1)
               AND ($2 OR NOT is_archived)
               AND ($3::text IS NULL OR title ILIKE '%' || $3 || '%' OR code ILIKE '%' || $3 || '%')",
        )
        .bind(&filter.semester)
        .bind(filter.include_archived)
        .bind(&filter.search)
        .fetch_one(&self.db)
        .await?;

        Ok((courses, total))
    }

    pub async fn update(
        &self,
        id: Uuid,
        patch: CoursePatch,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Course> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("course title must not be empty".into()));
            }
        }

        let course = sqlx::query_as::<_, Course>(&format!(
            "UPDATE courses SET title = COALESCE($2, title), \
             description = COALESCE($3, description), \
             semester = COALESCE($4, semester), \
             instructor_id = COALESCE($5, instructor_id), \
             is_archived = COALESCE($6, is_archived), updated_at = NOW()
             WHERE id = $1
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.title.as_deref().map(str::trim))
        .bind(&patch.description)
        .bind(patch.semester.as_deref().map(str::trim))
        .bind(patch.instructor_id)
        .bind(patch.is_archived)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("course {} not found", id)))?;

        self.audit
            .record(
                AuditRecord::new("course.updated", EntityType::Course, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "code": course.code })),
            )
            .await?;

        Ok(course)
    }

    /// Hard delete; assignments and enrollments cascade, videos keep
    /// their rows with course_id set to null by the schema.
    pub async fn delete(&self, id: Uuid, actor_id: Uuid, actor_email: &str) -> Result<()> {
        let course = self.get(id).await?;

        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        self.audit
            .record(
                AuditRecord::new("course.deleted", EntityType::Course, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "code": course.code })),
            )
            .await?;

        Ok(())
    }

    pub async fn create_assignment(
        &self,
        course_id: Uuid,
        assignment: NewAssignment,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Assignment> {
        if assignment.title.trim().is_empty() {
            return Err(AppError::Validation("assignment title must not be empty".into()));
        }
        if assignment.points <= 0 {
            return Err(AppError::Validation("points must be positive".into()));
        }
        self.get(course_id).await?;

        let created = sqlx::query_as::<_, Assignment>(&format!(
            "INSERT INTO assignments (course_id, title, instructions, points, due_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(course_id)
        .bind(assignment.title.trim())
        .bind(&assignment.instructions)
        .bind(assignment.points)
        .bind(assignment.due_at)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record(
                AuditRecord::new("assignment.created", EntityType::Assignment, created.id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "course_id": course_id, "title": created.title })),
            )
            .await?;

        Ok(created)
    }

    pub async fn list_assignments(&self, course_id: Uuid) -> Result<Vec<Assignment>> {
        self.get(course_id).await?;
        Ok(sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
             WHERE course_id = $1
             ORDER BY due_at ASC NULLS LAST, created_at ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn update_assignment(
        &self,
        id: Uuid,
        patch: AssignmentPatch,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Assignment> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("assignment title must not be empty".into()));
            }
        }
        if let Some(points) = patch.points {
            if points <= 0 {
                return Err(AppError::Validation("points must be positive".into()));
            }
        }

        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            "UPDATE assignments SET title = COALESCE($2, title), \
             instructions = COALESCE($3, instructions), \
             points = COALESCE($4, points), due_at = COALESCE($5, due_at), \
             updated_at = NOW()
             WHERE id = $1
             RETURNING {ASSIGNMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.title.as_deref().map(str::trim))
        .bind(&patch.instructions)
        .bind(patch.points)
        .bind(patch.due_at)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("assignment {} not found", id)))?;

        self.audit
            .record(
                AuditRecord::new("assignment.updated", EntityType::Assignment, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({
                        "course_id": assignment.course_id,
                        "title": assignment.title,
                    })),
            )
            .await?;

        Ok(assignment)
    }

    pub async fn delete_assignment(
        &self,
        id: Uuid,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<()> {
        let assignment = sqlx::query_as::<_, Assignment>(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("assignment {} not found", id)))?;

        sqlx::query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        self.audit
            .record(
                AuditRecord::new("assignment.deleted", EntityType::Assignment, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "course_id": assignment.course_id })),
            )
            .await?;

        Ok(())
    }

    /// Enrolling twice is a no-op; the row already says everything.
    pub async fn enroll(
        &self,
        course_id: Uuid,
        user_id: Uuid,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Enrollment> {
        self.get(course_id).await?;
        let user_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(user_id)
                .fetch_one(&self.db)
                .await?;
        if !user_exists {
            return Err(AppError::NotFound(format!("user {} not found", user_id)));
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(
            "INSERT INTO enrollments (course_id, user_id)
             VALUES ($1, $2)
             ON CONFLICT (course_id, user_id) DO UPDATE SET user_id = EXCLUDED.user_id
             RETURNING course_id, user_id, enrolled_at",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record(
                AuditRecord::new("course.enrolled", EntityType::Course, course_id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "user_id": user_id })),
            )
            .await?;

        Ok(enrollment)
    }

    pub async fn unenroll(
        &self,
        course_id: Uuid,
        user_id: Uuid,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<()> {
        let deleted = sqlx::query(
            "DELETE FROM enrollments WHERE course_id = $1 AND user_id = $2",
        )
        .bind(course_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "user {} is not enrolled in course {}",
                user_id, course_id
            )));
        }

        self.audit
            .record(
                AuditRecord::new("course.unenrolled", EntityType::Course, course_id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "user_id": user_id })),
            )
            .await?;

        Ok(())
    }

    pub async fn list_enrollments(&self, course_id: Uuid) -> Result<Vec<Enrollment>> {
        self.get(course_id).await?;
        Ok(sqlx::query_as::<_, Enrollment>(
            "SELECT course_id, user_id, enrolled_at FROM enrollments
             WHERE course_id = $1
             ORDER BY enrolled_at ASC",
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course() -> NewCourse {
        NewCourse {
            code: "LAW-601".into(),
            title: "Constitutional Law".into(),
            description: None,
            semester: "2026-fall".into(),
            instructor_id: None,
        }
    }

    #[test]
    fn course_validation_requires_code_title_semester() {
        assert!(validate_course(&course()).is_ok());

        let mut bad = course();
        bad.code = " ".into();
        assert!(validate_course(&bad).is_err());

        let mut bad = course();
        bad.title = "".into();
        assert!(validate_course(&bad).is_err());

        let mut bad = course();
        bad.semester = "".into();
        assert!(validate_course(&bad).is_err());
    }
}
