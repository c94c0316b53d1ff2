//! Law review article handlers: submissions, editorial workflow, versions,
//! sections, and review comments.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::api::dto::{Pagination, PaginationQuery};
use crate::api::middleware::auth::{AuthExtension, EDITORIAL_ROLES};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::article::{Article, ArticleComment, ArticleSection, ArticleStatus, ArticleVersion};
use crate::services::article_service::{ArticleFilter, ArticlePatch, NewArticle, NewSection};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route(
            "/:id",
            get(get_article).patch(update_article).delete(delete_article),
        )
        .route("/:id/status", post(change_status))
        .route("/:id/versions", get(list_versions).post(add_version))
        .route("/:id/versions/:number", get(get_version))
        .route("/:id/sections", get(list_sections).put(replace_sections))
        .route("/:id/comments", get(list_comments).post(add_comment))
        .route("/:id/comments/:comment_id/resolve", post(resolve_comment))
}

/// The submitter may edit their own article; editors may edit any.
fn require_author_or_editor(auth: &AuthExtension, article: &Article) -> Result<()> {
    if article.submitted_by == Some(auth.user_id) {
        return Ok(());
    }
    auth.require_role(EDITORIAL_ROLES)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateArticleRequest {
    pub title: String,
    pub abstract_text: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub bluebook_citation: Option<String>,
    /// Initial manuscript body; stored as version 1 when present
    pub body: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub authors: Option<Vec<String>>,
    pub bluebook_citation: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransitionRequest {
    pub status: ArticleStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArticleResponse {
    pub id: Uuid,
    pub title: String,
    pub abstract_text: Option<String>,
    pub authors: Vec<String>,
    pub bluebook_citation: Option<String>,
    pub status: ArticleStatus,
    pub submitted_by: Option<Uuid>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Article> for ArticleResponse {
    fn from(a: Article) -> Self {
        Self {
            id: a.id,
            title: a.title,
            abstract_text: a.abstract_text,
            authors: a.authors,
            bluebook_citation: a.bluebook_citation,
            status: a.status,
            submitted_by: a.submitted_by,
            published_at: a.published_at,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListArticlesQuery {
    pub status: Option<ArticleStatus>,
    /// Substring match on title
    pub search: Option<String>,
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PaginationQuery,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ArticleListResponse {
    pub articles: Vec<ArticleResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddVersionRequest {
    pub body: String,
    pub change_summary: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VersionResponse {
    pub id: Uuid,
    pub article_id: Uuid,
    pub version_number: i32,
    pub body: String,
    pub change_summary: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ArticleVersion> for VersionResponse {
    fn from(v: ArticleVersion) -> Self {
        Self {
            id: v.id,
            article_id: v.article_id,
            version_number: v.version_number,
            body: v.body,
            change_summary: v.change_summary,
            created_by: v.created_by,
            created_at: v.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SectionInput {
    pub heading: String,
    pub body: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReplaceSectionsRequest {
    pub sections: Vec<SectionInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SectionResponse {
    pub id: Uuid,
    pub article_id: Uuid,
    pub position: i32,
    pub heading: String,
    pub body: String,
}

impl From<ArticleSection> for SectionResponse {
    fn from(s: ArticleSection) -> Self {
        Self {
            id: s.id,
            article_id: s.article_id,
            position: s.position,
            heading: s.heading,
            body: s.body,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCommentRequest {
    pub body: String,
    /// Anchor the comment to a specific section
    pub section_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCommentsQuery {
    pub include_resolved: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub article_id: Uuid,
    pub author_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub body: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ArticleComment> for CommentResponse {
    fn from(c: ArticleComment) -> Self {
        Self {
            id: c.id,
            article_id: c.article_id,
            author_id: c.author_id,
            section_id: c.section_id,
            body: c.body,
            resolved: c.resolved,
            created_at: c.created_at,
        }
    }
}

/// List articles with optional status and title filters.
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/articles",
    tag = "articles",
    params(ListArticlesQuery),
    responses(
        (status = 200, description = "List of articles", body = ArticleListResponse)
    ),
    security(("bearer_auth" = []))
)]
async fn list_articles(
    State(state): State<SharedState>,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<ArticleListResponse>> {
    let filter = ArticleFilter {
        status: query.status,
        search: query.search.clone(),
        limit: query.pagination.limit(),
        offset: query.pagination.offset(),
    };

    let (articles, total) = state.articles.list(&filter).await?;

    Ok(Json(ArticleListResponse {
        articles: articles.into_iter().map(Into::into).collect(),
        pagination: Pagination::from_query_and_total(&query.pagination, total),
    }))
}

/// Submit a new article. It starts in draft.
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/articles",
    tag = "articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Article created", body = ArticleResponse),
        (status = 400, description = "Invalid submission")
    ),
    security(("bearer_auth" = []))
)]
async fn create_article(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(req): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<ArticleResponse>)> {
    let article = state
        .articles
        .create(
            NewArticle {
                title: req.title,
                abstract_text: req.abstract_text,
                authors: req.authors,
                bluebook_citation: req.bluebook_citation,
                body: req.body,
            },
            auth.user_id,
            &auth.email,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(article.into())))
}

/// Fetch a single article.
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/articles",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Article details", body = ArticleResponse),
        (status = 404, description = "Article not found")
    ),
    security(("bearer_auth" = []))
)]
async fn get_article(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ArticleResponse>> {
    let article = state.articles.get(id).await?;
    Ok(Json(article.into()))
}

/// Update article metadata. Published articles are immutable.
#[utoipa::path(
    patch,
    path = "/{id}",
    context_path = "/api/articles",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Article updated", body = ArticleResponse),
        (status = 404, description = "Article not found"),
        (status = 409, description = "Article is published")
    ),
    security(("bearer_auth" = []))
)]
async fn update_article(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateArticleRequest>,
) -> Result<Json<ArticleResponse>> {
    let article = state.articles.get(id).await?;
    require_author_or_editor(&auth, &article)?;

    let updated = state
        .articles
        .update(
            id,
            ArticlePatch {
                title: req.title,
                abstract_text: req.abstract_text,
                authors: req.authors,
                bluebook_citation: req.bluebook_citation,
            },
            auth.user_id,
            &auth.email,
        )
        .await?;

    Ok(Json(updated.into()))
}

/// Move an article through the editorial workflow.
#[utoipa::path(
    post,
    path = "/{id}/status",
    context_path = "/api/articles",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Status changed", body = ArticleResponse),
        (status = 409, description = "Transition not allowed from current status"),
        (status = 403, description = "Editorial role required")
    ),
    security(("bearer_auth" = []))
)]
async fn change_status(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<ArticleResponse>> {
    // Submitting a draft for review is the author's own step; every other
    // transition is an editorial decision.
    if req.status == ArticleStatus::InReview {
        let article = state.articles.get(id).await?;
        require_author_or_editor(&auth, &article)?;
    } else {
        auth.require_role(EDITORIAL_ROLES)?;
    }

    let article = state
        .articles
        .transition(id, req.status, auth.user_id, &auth.email)
        .await?;

    Ok(Json(article.into()))
}

/// Delete an article and all of its versions, sections, and comments.
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/articles",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 204, description = "Article deleted"),
        (status = 404, description = "Article not found")
    ),
    security(("bearer_auth" = []))
)]
async fn delete_article(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let article = state.articles.get(id).await?;
    require_author_or_editor(&auth, &article)?;

    state.articles.delete(id, auth.user_id, &auth.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List manuscript versions, newest first.
#[utoipa::path(
    get,
    path = "/{id}/versions",
    context_path = "/api/articles",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Versions", body = Vec<VersionResponse>),
        (status = 404, description = "Article not found")
    ),
    security(("bearer_auth" = []))
)]
async fn list_versions(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<VersionResponse>>> {
    let versions = state.articles.list_versions(id).await?;
    Ok(Json(versions.into_iter().map(Into::into).collect()))
}

/// Add a new manuscript version.
#[utoipa::path(
    post,
    path = "/{id}/versions",
    context_path = "/api/articles",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = AddVersionRequest,
    responses(
        (status = 201, description = "Version added", body = VersionResponse),
        (status = 409, description = "Article is published")
    ),
    security(("bearer_auth" = []))
)]
async fn add_version(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddVersionRequest>,
) -> Result<(StatusCode, Json<VersionResponse>)> {
    let article = state.articles.get(id).await?;
    require_author_or_editor(&auth, &article)?;

    let version = state
        .articles
        .add_version(id, req.body, req.change_summary, auth.user_id, &auth.email)
        .await?;

    Ok((StatusCode::CREATED, Json(version.into())))
}

/// Fetch one manuscript version by number.
#[utoipa::path(
    get,
    path = "/{id}/versions/{number}",
    context_path = "/api/articles",
    tag = "articles",
    params(
        ("id" = Uuid, Path, description = "Article ID"),
        ("number" = i32, Path, description = "Version number")
    ),
    responses(
        (status = 200, description = "Version", body = VersionResponse),
        (status = 404, description = "Version not found")
    ),
    security(("bearer_auth" = []))
)]
async fn get_version(
    State(state): State<SharedState>,
    Path((id, number)): Path<(Uuid, i32)>,
) -> Result<Json<VersionResponse>> {
    let version = state.articles.get_version(id, number).await?;
    Ok(Json(version.into()))
}

/// List sections in reading order.
#[utoipa::path(
    get,
    path = "/{id}/sections",
    context_path = "/api/articles",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Sections", body = Vec<SectionResponse>),
        (status = 404, description = "Article not found")
    ),
    security(("bearer_auth" = []))
)]
async fn list_sections(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SectionResponse>>> {
    let sections = state.articles.list_sections(id).await?;
    Ok(Json(sections.into_iter().map(Into::into).collect()))
}

/// Replace the article's section structure wholesale.
#[utoipa::path(
    put,
    path = "/{id}/sections",
    context_path = "/api/articles",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = ReplaceSectionsRequest,
    responses(
        (status = 200, description = "Sections replaced", body = Vec<SectionResponse>),
        (status = 409, description = "Article is published")
    ),
    security(("bearer_auth" = []))
)]
async fn replace_sections(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReplaceSectionsRequest>,
) -> Result<Json<Vec<SectionResponse>>> {
    let article = state.articles.get(id).await?;
    require_author_or_editor(&auth, &article)?;

    let sections = req
        .sections
        .into_iter()
        .map(|s| NewSection {
            heading: s.heading,
            body: s.body,
        })
        .collect();

    let replaced = state
        .articles
        .replace_sections(id, sections, auth.user_id, &auth.email)
        .await?;

    Ok(Json(replaced.into_iter().map(Into::into).collect()))
}

/// List review comments; resolved ones are hidden unless requested.
#[utoipa::path(
    get,
    path = "/{id}/comments",
    context_path = "/api/articles",
    tag = "articles",
    params(
        ("id" = Uuid, Path, description = "Article ID"),
        ListCommentsQuery
    ),
    responses(
        (status = 200, description = "Comments", body = Vec<CommentResponse>),
        (status = 404, description = "Article not found")
    ),
    security(("bearer_auth" = []))
)]
async fn list_comments(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListCommentsQuery>,
) -> Result<Json<Vec<CommentResponse>>> {
    let comments = state
        .articles
        .list_comments(id, query.include_resolved.unwrap_or(false))
        .await?;
    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

/// Add a review comment, optionally anchored to a section.
#[utoipa::path(
    post,
    path = "/{id}/comments",
    context_path = "/api/articles",
    tag = "articles",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = AddCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = CommentResponse),
        (status = 400, description = "Empty body or foreign section")
    ),
    security(("bearer_auth" = []))
)]
async fn add_comment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let comment = state
        .articles
        .add_comment(id, req.section_id, req.body, auth.user_id, &auth.email)
        .await?;

    Ok((StatusCode::CREATED, Json(comment.into())))
}

/// Mark a review comment as resolved.
#[utoipa::path(
    post,
    path = "/{id}/comments/{comment_id}/resolve",
    context_path = "/api/articles",
    tag = "articles",
    params(
        ("id" = Uuid, Path, description = "Article ID"),
        ("comment_id" = Uuid, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Comment resolved", body = CommentResponse),
        (status = 404, description = "Comment not found")
    ),
    security(("bearer_auth" = []))
)]
async fn resolve_comment(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path((id, comment_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CommentResponse>> {
    let article = state.articles.get(id).await?;
    require_author_or_editor(&auth, &article)?;

    let comment = state
        .articles
        .resolve_comment(id, comment_id, auth.user_id, &auth.email)
        .await?;

    Ok(Json(comment.into()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_articles,
        create_article,
        get_article,
        update_article,
        change_status,
        delete_article,
        list_versions,
        add_version,
        get_version,
        list_sections,
        replace_sections,
        list_comments,
        add_comment,
        resolve_comment,
    ),
    components(schemas(
        CreateArticleRequest,
        UpdateArticleRequest,
        TransitionRequest,
        ArticleResponse,
        ArticleListResponse,
        AddVersionRequest,
        VersionResponse,
        SectionInput,
        ReplaceSectionsRequest,
        SectionResponse,
        AddCommentRequest,
        CommentResponse,
    ))
)]
pub struct ArticlesApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn auth_as(role: UserRole, user_id: Uuid) -> AuthExtension {
        AuthExtension {
            user_id,
            email: "reviewer@law.example.edu".to_string(),
            role,
        }
    }

    fn draft_article(submitted_by: Option<Uuid>) -> Article {
        Article {
            id: Uuid::new_v4(),
            title: "Standing in Climate Litigation".to_string(),
            abstract_text: None,
            authors: vec!["A. Scholar".to_string()],
            bluebook_citation: None,
            status: ArticleStatus::Draft,
            submitted_by,
            published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn submitter_may_edit_own_draft() {
        let user_id = Uuid::new_v4();
        let article = draft_article(Some(user_id));
        let auth = auth_as(UserRole::Student, user_id);
        assert!(require_author_or_editor(&auth, &article).is_ok());
    }

    #[test]
    fn strangers_need_an_editorial_role() {
        let article = draft_article(Some(Uuid::new_v4()));

        let editor = auth_as(UserRole::Editor, Uuid::new_v4());
        assert!(require_author_or_editor(&editor, &article).is_ok());

        let student = auth_as(UserRole::Student, Uuid::new_v4());
        assert!(require_author_or_editor(&student, &article).is_err());

        let faculty = auth_as(UserRole::Faculty, Uuid::new_v4());
        assert!(require_author_or_editor(&faculty, &article).is_err());
    }
}
