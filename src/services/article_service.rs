//! Law-review editorial workflow.
//!
//! Articles carry metadata and a status; their text lives in numbered
//! immutable versions and ordered sections. Status moves through
//! draft, in_review, approved, published, with the model deciding
//! which transitions are legal.

use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::article::{Article, ArticleComment, ArticleSection, ArticleStatus, ArticleVersion};
use crate::services::audit_service::{AuditRecord, AuditService, EntityType};

const ARTICLE_COLUMNS: &str = "id, title, abstract_text, authors, bluebook_citation, status, \
     submitted_by, published_at, created_at, updated_at";

const VERSION_COLUMNS: &str =
    "id, article_id, version_number, body, change_summary, created_by, created_at";

const SECTION_COLUMNS: &str =
    "id, article_id, position, heading, body, created_at, updated_at";

const COMMENT_COLUMNS: &str =
    "id, article_id, author_id, section_id, body, resolved, created_at";

/// Fields for a new manuscript
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub abstract_text: Option<String>,
    pub authors: Vec<String>,
    pub bluebook_citation: Option<String>,
    /// Initial body; stored as version 1 when present
    pub body: Option<String>,
}

/// Metadata update; None leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub authors: Option<Vec<String>>,
    pub bluebook_citation: Option<String>,
}

/// List filters plus pagination
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub status: Option<ArticleStatus>,
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// One section in a full replacement
#[derive(Debug, Clone)]
pub struct NewSection {
    pub heading: String,
    pub body: String,
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    Ok(())
}

/// Article service
pub struct ArticleService {
    db: PgPool,
    audit: Arc<AuditService>,
}

impl ArticleService {
    pub fn new(db: PgPool, audit: Arc<AuditService>) -> Self {
        Self { db, audit }
    }

    pub async fn create(
        &self,
        article: NewArticle,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Article> {
        validate_title(&article.title)?;

        let mut tx = self.db.begin().await?;

        let created = sqlx::query_as::<_, Article>(&format!(
            "INSERT INTO articles (title, abstract_text, authors, bluebook_citation, status, submitted_by)
             VALUES ($1, $2, $3, $4, 'draft', $5)
             RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(article.title.trim())
        .bind(&article.abstract_text)
        .bind(&article.authors)
        .bind(&article.bluebook_citation)
        .bind(actor_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(body) = &article.body {
            sqlx::query(
                "INSERT INTO article_versions (article_id, version_number, body, created_by)
                 VALUES ($1, 1, $2, $3)",
            )
            .bind(created.id)
            .bind(body)
            .bind(actor_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.audit
            .record(
                AuditRecord::new("article.created", EntityType::Article, created.id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "title": created.title })),
            )
            .await?;

        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Article> {
        sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("article {} not found", id)))
    }

    pub async fn list(&self, filter: &ArticleFilter) -> Result<(Vec<Article>, i64)> {
        let articles = sqlx::query_as::<_, Article>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles
             WHERE ($1::article_status IS NULL OR status = $1)
               AND ($2::text IS NULL OR title ILIKE '%' || $2 || '%')
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(filter.status)
        .bind(&filter.search)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM articles
             WHERE ($1::article_status IS NULL OR status = $1)
               AND ($2::text IS NULL OR title ILIKE '%' || $2 || '%')",
        )
        .bind(filter.status)
        .bind(&filter.search)
        .fetch_one(&self.db)
        .await?;

        Ok((articles, total))
    }

    /// Metadata edits stop once an article is published.
    pub async fn update(
        &self,
        id: Uuid,
        patch: ArticlePatch,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Article> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        let current = self.get(id).await?;
        if current.status == ArticleStatus::Published {
            return Err(AppError::Conflict(
                "published articles cannot be edited".to_string(),
            ));
        }

        let article = sqlx::query_as::<_, Article>(&format!(
            "UPDATE articles SET title = COALESCE($2, title), \
             abstract_text = COALESCE($3, abstract_text), \
             authors = COALESCE($4, authors), \
             bluebook_citation = COALESCE($5, bluebook_citation), updated_at = NOW()
             WHERE id = $1
             RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.title.as_deref().map(str::trim))
        .bind(&patch.abstract_text)
        .bind(&patch.authors)
        .bind(&patch.bluebook_citation)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record(
                AuditRecord::new("article.updated", EntityType::Article, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "title": article.title })),
            )
            .await?;

        Ok(article)
    }

    /// Move an article along the editorial workflow. Illegal
    /// transitions are rejected with a conflict.
    pub async fn transition(
        &self,
        id: Uuid,
        next: ArticleStatus,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Article> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(next) {
            return Err(AppError::Conflict(format!(
                "cannot move article from {} to {}",
                current.status.as_str(),
                next.as_str()
            )));
        }

        let article = sqlx::query_as::<_, Article>(&format!(
            "UPDATE articles SET status = $2, \
             published_at = CASE WHEN $2 = 'published'::article_status THEN NOW() \
             ELSE published_at END, updated_at = NOW()
             WHERE id = $1
             RETURNING {ARTICLE_COLUMNS}"
        ))
        .bind(id)
        .bind(next)
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record(
                AuditRecord::new("article.status_changed", EntityType::Article, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({
                        "from": current.status.as_str(),
                        "to": next.as_str(),
                    })),
            )
            .await?;

        Ok(article)
    }

    /// Hard delete; versions, sections, and comments cascade.
    pub async fn delete(&self, id: Uuid, actor_id: Uuid, actor_email: &str) -> Result<()> {
        let article = self.get(id).await?;

        sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        self.audit
            .record(
                AuditRecord::new("article.deleted", EntityType::Article, id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "title": article.title })),
            )
            .await?;

        Ok(())
    }

    /// Append a new numbered body snapshot. Concurrent appends race on
    /// the unique (article_id, version_number) constraint; the loser
    /// gets a conflict.
    pub async fn add_version(
        &self,
        article_id: Uuid,
        body: String,
        change_summary: Option<String>,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<ArticleVersion> {
        if body.trim().is_empty() {
            return Err(AppError::Validation("version body must not be empty".into()));
        }

        let article = self.get(article_id).await?;
        if article.status == ArticleStatus::Published {
            return Err(AppError::Conflict(
                "published articles cannot receive new versions".to_string(),
            ));
        }

        let version = sqlx::query_as::<_, ArticleVersion>(&format!(
            "INSERT INTO article_versions (article_id, version_number, body, change_summary, created_by)
             SELECT $1, COALESCE(MAX(version_number), 0) + 1, $2, $3, $4
             FROM article_versions WHERE article_id = $1
             RETURNING {VERSION_COLUMNS}"
        ))
        .bind(article_id)
        .bind(&body)
        .bind(&change_summary)
        .bind(actor_id)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                "another version was added concurrently; retry".to_string(),
            ),
            _ => AppError::from(e),
        })?;

        self.audit
            .record(
                AuditRecord::new("article.version_added", EntityType::Article, article_id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "version": version.version_number })),
            )
            .await?;

        Ok(version)
    }

    pub async fn list_versions(&self, article_id: Uuid) -> Result<Vec<ArticleVersion>> {
        self.get(article_id).await?;
        Ok(sqlx::query_as::<_, ArticleVersion>(&format!(
            "SELECT {VERSION_COLUMNS} FROM article_versions
             WHERE article_id = $1 ORDER BY version_number DESC"
        ))
        .bind(article_id)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn get_version(&self, article_id: Uuid, number: i32) -> Result<ArticleVersion> {
        sqlx::query_as::<_, ArticleVersion>(&format!(
            "SELECT {VERSION_COLUMNS} FROM article_versions
             WHERE article_id = $1 AND version_number = $2"
        ))
        .bind(article_id)
        .bind(number)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "version {} of article {} not found",
                number, article_id
            ))
        })
    }

    /// Replace the section outline wholesale. Positions are assigned
    /// from the order given, starting at 1.
    pub async fn replace_sections(
        &self,
        article_id: Uuid,
        sections: Vec<NewSection>,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<Vec<ArticleSection>> {
        let article = self.get(article_id).await?;
        if article.status == ArticleStatus::Published {
            return Err(AppError::Conflict(
                "published articles cannot be restructured".to_string(),
            ));
        }
        for section in &sections {
            if section.heading.trim().is_empty() {
                return Err(AppError::Validation("section heading must not be empty".into()));
            }
        }

        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM article_sections WHERE article_id = $1")
            .bind(article_id)
            .execute(&mut *tx)
            .await?;

        let mut stored = Vec::with_capacity(sections.len());
        for (index, section) in sections.iter().enumerate() {
            let row = sqlx::query_as::<_, ArticleSection>(&format!(
                "INSERT INTO article_sections (article_id, position, heading, body)
                 VALUES ($1, $2, $3, $4)
                 RETURNING {SECTION_COLUMNS}"
            ))
            .bind(article_id)
            .bind(index as i32 + 1)
            .bind(section.heading.trim())
            .bind(&section.body)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(row);
        }

        tx.commit().await?;

        self.audit
            .record(
                AuditRecord::new("article.sections_replaced", EntityType::Article, article_id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "count": stored.len() })),
            )
            .await?;

        Ok(stored)
    }

    pub async fn list_sections(&self, article_id: Uuid) -> Result<Vec<ArticleSection>> {
        self.get(article_id).await?;
        Ok(sqlx::query_as::<_, ArticleSection>(&format!(
            "SELECT {SECTION_COLUMNS} FROM article_sections
             WHERE article_id = $1 ORDER BY position ASC"
        ))
        .bind(article_id)
        .fetch_all(&self.db)
        .await?)
    }

    /// Attach an editorial comment, optionally anchored to a section
    /// of the same article.
    pub async fn add_comment(
        &self,
        article_id: Uuid,
        section_id: Option<Uuid>,
        body: String,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<ArticleComment> {
        if body.trim().is_empty() {
            return Err(AppError::Validation("comment body must not be empty".into()));
        }
        self.get(article_id).await?;

        if let Some(section_id) = section_id {
            let belongs = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM article_sections WHERE id = $1 AND article_id = $2)",
            )
            .bind(section_id)
            .bind(article_id)
            .fetch_one(&self.db)
            .await?;
            if !belongs {
                return Err(AppError::Validation(format!(
                    "section {} does not belong to article {}",
                    section_id, article_id
                )));
            }
        }

        let comment = sqlx::query_as::<_, ArticleComment>(&format!(
            "INSERT INTO article_comments (article_id, author_id, section_id, body)
             VALUES ($1, $2, $3, $4)
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(article_id)
        .bind(actor_id)
        .bind(section_id)
        .bind(body.trim())
        .fetch_one(&self.db)
        .await?;

        self.audit
            .record(
                AuditRecord::new("article.comment_added", EntityType::Article, article_id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "comment_id": comment.id })),
            )
            .await?;

        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        article_id: Uuid,
        include_resolved: bool,
    ) -> Result<Vec<ArticleComment>> {
        self.get(article_id).await?;
        Ok(sqlx::query_as::<_, ArticleComment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM article_comments
             WHERE article_id = $1 AND ($2 OR NOT resolved)
             ORDER BY created_at ASC"
        ))
        .bind(article_id)
        .bind(include_resolved)
        .fetch_all(&self.db)
        .await?)
    }

    pub async fn resolve_comment(
        &self,
        article_id: Uuid,
        comment_id: Uuid,
        actor_id: Uuid,
        actor_email: &str,
    ) -> Result<ArticleComment> {
        let comment = sqlx::query_as::<_, ArticleComment>(&format!(
            "UPDATE article_comments SET resolved = TRUE
             WHERE id = $1 AND article_id = $2
             RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment_id)
        .bind(article_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "comment {} not found on article {}",
                comment_id, article_id
            ))
        })?;

        self.audit
            .record(
                AuditRecord::new("article.comment_resolved", EntityType::Article, article_id.to_string())
                    .actor(actor_id, actor_email)
                    .payload(json!({ "comment_id": comment_id })),
            )
            .await?;

        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_titles_are_rejected() {
        assert!(validate_title("Standing After Lujan").is_ok());
        assert!(validate_title("").is_err());
        assert!(validate_title("  \t ").is_err());
    }
}
