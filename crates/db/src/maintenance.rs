//! Monthly housekeeping: quota reset, retention, and expired account removal.

use chrono::{Months, NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::info;

use crate::repositories::{encode_date, encode_timestamp, RepositoryError};
use crate::DbPool;

pub const RETENTION_MONTHS: u32 = 6;
pub const EXPIRED_GRACE_MONTHS: u32 = 1;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub quotas_reset: u64,
    pub feedback_deleted: u64,
    pub summaries_deleted: u64,
    pub expired_accounts: u64,
    pub expired_workspace_rows: u64,
}

/// Runs in one transaction so a failure leaves quotas and data untouched.
pub async fn run_cleanup(pool: &DbPool, today: NaiveDate) -> Result<CleanupReport, RepositoryError> {
    let retention_cutoff = today - Months::new(RETENTION_MONTHS);
    let expiry_cutoff = today - Months::new(EXPIRED_GRACE_MONTHS);
    let mut report = CleanupReport::default();
    let mut tx = pool.begin().await?;

    report.quotas_reset = sqlx::query("UPDATE accounts SET feedback_count = 0")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    report.feedback_deleted = sqlx::query("DELETE FROM feedback WHERE created_at < ?")
        .bind(encode_timestamp(retention_cutoff.and_time(NaiveTime::MIN).and_utc()))
        .execute(&mut *tx)
        .await?
        .rows_affected();

    report.summaries_deleted = sqlx::query("DELETE FROM summaries WHERE summary_date < ?")
        .bind(encode_date(retention_cutoff))
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let expiry_bound = encode_timestamp(expiry_cutoff.and_time(NaiveTime::MIN).and_utc());
    // A workspace keeps its data while any account linked to it is still
    // within the grace period.
    let workspaces: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT slack_workspace FROM accounts
         WHERE account_expiry_date < ? AND slack_workspace IS NOT NULL AND slack_workspace <> ''
           AND slack_workspace NOT IN (
               SELECT slack_workspace FROM accounts
               WHERE account_expiry_date >= ? AND slack_workspace IS NOT NULL
           )",
    )
    .bind(&expiry_bound)
    .bind(&expiry_bound)
    .fetch_all(&mut *tx)
    .await?;

    for workspace in &workspaces {
        for table in ["prompts", "feedback", "summaries", "issues"] {
            report.expired_workspace_rows += sqlx::query(&format!(
                "DELETE FROM {table} WHERE slack_workspace = ?"
            ))
            .bind(workspace)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
    }

    report.expired_accounts = sqlx::query("DELETE FROM accounts WHERE account_expiry_date < ?")
        .bind(&expiry_bound)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    info!(
        event_name = "maintenance.cleanup.finished",
        quotas_reset = report.quotas_reset,
        feedback_deleted = report.feedback_deleted,
        summaries_deleted = report.summaries_deleted,
        expired_accounts = report.expired_accounts,
        expired_workspace_rows = report.expired_workspace_rows,
        "cleanup finished"
    );
    Ok(report)
}
