//! Law-review article models: manuscripts, versions, sections, comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Editorial state mirroring the `article_status` Postgres type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "article_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    InReview,
    Approved,
    Published,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::InReview => "in_review",
            ArticleStatus::Approved => "approved",
            ArticleStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(ArticleStatus::Draft),
            "in_review" => Some(ArticleStatus::InReview),
            "approved" => Some(ArticleStatus::Approved),
            "published" => Some(ArticleStatus::Published),
            _ => None,
        }
    }

    /// Transitions the editorial workflow allows from this state.
    /// Draft and in_review move forward or back; published is terminal.
    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        use ArticleStatus::*;
        matches!(
            (self, next),
            (Draft, InReview)
                | (InReview, Draft)
                | (InReview, Approved)
                | (Approved, InReview)
                | (Approved, Published)
        )
    }
}

/// Article entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Article {
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

/// Immutable snapshot of an article body.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArticleVersion {
    pub id: Uuid,
    pub article_id: Uuid,
    pub version_number: i32,
    pub body: String,
    pub change_summary: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Ordered section within an article.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArticleSection {
    pub id: Uuid,
    pub article_id: Uuid,
    pub position: i32,
    pub heading: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editorial comment, optionally anchored to a section.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArticleComment {
    pub id: Uuid,
    pub article_id: Uuid,
    pub author_id: Option<Uuid>,
    pub section_id: Option<Uuid>,
    pub body: String,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ArticleStatus::Draft,
            ArticleStatus::InReview,
            ArticleStatus::Approved,
            ArticleStatus::Published,
        ] {
            assert_eq!(ArticleStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ArticleStatus::parse("retracted"), None);
    }

    #[test]
    fn workflow_moves_forward_and_back_but_not_past_published() {
        assert!(ArticleStatus::Draft.can_transition_to(ArticleStatus::InReview));
        assert!(ArticleStatus::InReview.can_transition_to(ArticleStatus::Draft));
        assert!(ArticleStatus::InReview.can_transition_to(ArticleStatus::Approved));
        assert!(ArticleStatus::Approved.can_transition_to(ArticleStatus::Published));

        assert!(!ArticleStatus::Draft.can_transition_to(ArticleStatus::Published));
        assert!(!ArticleStatus::Published.can_transition_to(ArticleStatus::Draft));
        assert!(!ArticleStatus::Draft.can_transition_to(ArticleStatus::Draft));
    }

    #[test]
    fn in_review_serializes_snake_case() {
        let json = serde_json::to_string(&ArticleStatus::InReview).unwrap();
        assert_eq!(json, "\"in_review\"");
    }
}
