use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const MAX_PROMPT_CHARS: usize = 128;
pub const MAX_ORIGIN_CHARS: usize = 32;
pub const MAX_CATEGORY_CHARS: usize = 32;
pub const MAX_COMMENT_CHARS: usize = 256;
pub const MAX_USER_ID_CHARS: usize = 64;

/// One stored thumbs up/down response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub workspace: String,
    pub prompt: String,
    pub thumb_up: bool,
    pub comment: Option<String>,
    pub origin: String,
    pub category: String,
    pub in_production: bool,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn has_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|comment| !comment.trim().is_empty())
    }
}

/// A prompt a workspace has received feedback for. Counts against the
/// workspace's prompt limit until deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegisteredPrompt {
    pub id: i64,
    pub workspace: String,
    pub origin: String,
    pub category: String,
    pub prompt: String,
}

/// Feedback as submitted to the ingestion API, before it is scoped to a workspace.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct FeedbackSubmission {
    pub prompt: String,
    pub thumb_up: bool,
    pub origin: String,
    pub category: String,
    pub in_production: bool,
    pub user_id: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl FeedbackSubmission {
    /// Trims every field and enforces the per-field length limits.
    /// A blank comment is normalized to `None`.
    pub fn normalize(self) -> Result<Self, DomainError> {
        let prompt = required_field("prompt", &self.prompt, MAX_PROMPT_CHARS)?;
        let origin = required_field("origin", &self.origin, MAX_ORIGIN_CHARS)?;
        let category = required_field("category", &self.category, MAX_CATEGORY_CHARS)?;
        let user_id = required_field("user_id", &self.user_id, MAX_USER_ID_CHARS)?;

        let comment = match self.comment.as_deref().map(str::trim) {
            Some(comment) if !comment.is_empty() => {
                check_length("comment", comment, MAX_COMMENT_CHARS)?;
                Some(comment.to_owned())
            }
            _ => None,
        };

        Ok(Self {
            prompt,
            thumb_up: self.thumb_up,
            origin,
            category,
            in_production: self.in_production,
            user_id,
            comment,
        })
    }

    pub fn into_record(self, workspace: impl Into<String>, created_at: DateTime<Utc>) -> FeedbackRecord {
        FeedbackRecord {
            workspace: workspace.into(),
            prompt: self.prompt,
            thumb_up: self.thumb_up,
            comment: self.comment,
            origin: self.origin,
            category: self.category,
            in_production: self.in_production,
            user_id: self.user_id,
            created_at,
        }
    }
}

fn required_field(field: &'static str, value: &str, max_chars: usize) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidFeedback { field, reason: "is required".to_owned() });
    }
    check_length(field, trimmed, max_chars)?;
    Ok(trimmed.to_owned())
}

fn check_length(field: &'static str, value: &str, max_chars: usize) -> Result<(), DomainError> {
    if value.chars().count() > max_chars {
        return Err(DomainError::InvalidFeedback {
            field,
            reason: format!("must be at most {max_chars} characters"),
        });
    }
    Ok(())
}

/// Cached cohort summary for one day, written by the daily cache job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub summary_date: NaiveDate,
    pub origin: String,
    pub category: String,
    pub prompt: String,
    pub comment_count: u32,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReport {
    pub workspace: String,
    pub origin: String,
    pub report: String,
}

/// Per-user explore selection. `None` fields do not constrain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackFilter {
    pub origin: Option<String>,
    pub category: Option<String>,
    pub prompt: Option<String>,
    pub thumb_up: Option<bool>,
}

impl FeedbackFilter {
    pub fn is_empty(&self) -> bool {
        self.origin.is_none()
            && self.category.is_none()
            && self.prompt.is_none()
            && self.thumb_up.is_none()
    }

    pub fn matches(&self, record: &FeedbackRecord) -> bool {
        fn field(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |wanted| wanted == value)
        }

        field(&self.origin, &record.origin)
            && field(&self.category, &record.category)
            && field(&self.prompt, &record.prompt)
            && self.thumb_up.map_or(true, |wanted| wanted == record.thumb_up)
    }
}

/// One month of a cohort's chart series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: NaiveDate,
    pub approval_pct: f64,
    pub response_count: usize,
    pub comment_count: usize,
}
