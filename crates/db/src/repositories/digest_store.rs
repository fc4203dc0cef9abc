use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use secrecy::SecretString;
use sqlx::Row;

use tally_core::digest::ports::{DigestStore, EligibleWorkspace, StoreError};
use tally_core::domain::cadence::{Cadence, DateWindow};
use tally_core::domain::feedback::{FeedbackRecord, IssueReport, SummaryRow};

use super::feedback::{row_to_feedback, FEEDBACK_COLUMNS};
use super::{decode_count, decode_date, encode_date, encode_timestamp, RepositoryError};
use crate::DbPool;

/// SQLite side of the digest pipeline.
pub struct SqlDigestStore {
    pool: DbPool,
}

impl SqlDigestStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn feedback_in_window(
        &self,
        workspace: &str,
        window: DateWindow,
        commented_only: bool,
    ) -> Result<Vec<FeedbackRecord>, RepositoryError> {
        let comment_clause =
            if commented_only { "AND comment IS NOT NULL AND TRIM(comment) <> ''" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {FEEDBACK_COLUMNS}
             FROM feedback
             WHERE slack_workspace = ?
               AND in_production = 1
               AND created_at >= ?
               AND created_at < ?
               {comment_clause}
             ORDER BY created_at, id"
        ))
        .bind(workspace)
        .bind(encode_timestamp(window.start_instant()))
        .bind(encode_timestamp(window.end_instant()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_feedback).collect()
    }
}

fn row_to_summary(row: &sqlx::sqlite::SqliteRow) -> Result<SummaryRow, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());
    let summary_date: String = row.try_get("summary_date").map_err(decode)?;
    let comment_count: i64 = row.try_get("n_comments").map_err(decode)?;

    Ok(SummaryRow {
        summary_date: decode_date(&summary_date)?,
        origin: row.try_get("origin").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        prompt: row.try_get("prompt").map_err(decode)?,
        comment_count: decode_count(comment_count, "n_comments")?,
        summary: row.try_get("summary").map_err(decode)?,
    })
}

fn row_to_target(row: &sqlx::sqlite::SqliteRow) -> Result<EligibleWorkspace, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());
    Ok(EligibleWorkspace {
        workspace: row.try_get("slack_workspace").map_err(decode)?,
        channel: row.try_get("slack_channel").map_err(decode)?,
    })
}

fn today_start(today: NaiveDate) -> String {
    encode_timestamp(today.and_time(NaiveTime::MIN).and_utc())
}

#[async_trait]
impl DigestStore for SqlDigestStore {
    /// Workspaces with a live subscription, a digest channel, and an account
    /// older than the cadence period. Accounts sharing a workspace collapse
    /// to one target.
    async fn eligible_workspaces(
        &self,
        cadence: Cadence,
        today: NaiveDate,
    ) -> Result<Vec<EligibleWorkspace>, StoreError> {
        let rows = sqlx::query(
            "SELECT slack_workspace, MIN(slack_channel) AS slack_channel
             FROM accounts
             WHERE slack_workspace IS NOT NULL AND slack_workspace <> ''
               AND slack_channel IS NOT NULL AND slack_channel <> ''
               AND account_expiry_date > ?
               AND created_at < ?
             GROUP BY slack_workspace
             ORDER BY slack_workspace",
        )
        .bind(today_start(today))
        .bind(today_start(cadence.eligibility_cutoff(today)))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_target).collect::<Result<Vec<_>, _>>()?)
    }

    async fn active_workspaces(&self, today: NaiveDate) -> Result<Vec<String>, StoreError> {
        let workspaces: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT slack_workspace
             FROM accounts
             WHERE slack_workspace IS NOT NULL AND slack_workspace <> ''
               AND account_expiry_date > ?
             ORDER BY slack_workspace",
        )
        .bind(today_start(today))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(workspaces)
    }

    async fn bot_token(&self, workspace: &str) -> Result<SecretString, StoreError> {
        let token: Option<String> =
            sqlx::query_scalar("SELECT bot_token FROM installations WHERE slack_workspace = ?")
                .bind(workspace)
                .fetch_optional(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        match token {
            Some(token) if !token.trim().is_empty() => Ok(SecretString::from(token)),
            _ => Err(StoreError::MissingBotToken(workspace.to_owned())),
        }
    }

    async fn production_feedback(
        &self,
        workspace: &str,
        window: DateWindow,
    ) -> Result<Vec<FeedbackRecord>, StoreError> {
        Ok(self.feedback_in_window(workspace, window, false).await?)
    }

    async fn commented_feedback(
        &self,
        workspace: &str,
        window: DateWindow,
    ) -> Result<Vec<FeedbackRecord>, StoreError> {
        Ok(self.feedback_in_window(workspace, window, true).await?)
    }

    async fn summaries(
        &self,
        workspace: &str,
        window: DateWindow,
    ) -> Result<Vec<SummaryRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT summary_date, origin, category, prompt, n_comments, summary
             FROM summaries
             WHERE slack_workspace = ?
               AND summary_date >= ?
               AND summary_date < ?
             ORDER BY summary_date, id",
        )
        .bind(workspace)
        .bind(encode_date(window.start))
        .bind(encode_date(window.end))
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(row_to_summary).collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert_summary(&self, workspace: &str, row: &SummaryRow) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO summaries
                (summary_date, slack_workspace, origin, category, prompt, n_comments, summary)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(encode_date(row.summary_date))
        .bind(workspace)
        .bind(&row.origin)
        .bind(&row.category)
        .bind(&row.prompt)
        .bind(i64::from(row.comment_count))
        .bind(&row.summary)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn clear_issue_reports(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM issues")
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn upsert_issue_report(&self, report: &IssueReport) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO issues (slack_workspace, origin, report)
             VALUES (?, ?, ?)
             ON CONFLICT(slack_workspace, origin) DO UPDATE SET report = excluded.report",
        )
        .bind(&report.workspace)
        .bind(&report.origin)
        .bind(&report.report)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;
        Ok(())
    }
}
