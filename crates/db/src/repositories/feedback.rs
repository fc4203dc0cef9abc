use async_trait::async_trait;
use sqlx::Row;

use tally_core::domain::cadence::DateWindow;
use tally_core::domain::feedback::{FeedbackFilter, FeedbackRecord, IssueReport, RegisteredPrompt};

use super::{
    decode_count, decode_timestamp, encode_timestamp, FeedbackRepository, PromptUsage,
    RepositoryError,
};
use crate::DbPool;

pub struct SqlFeedbackRepository {
    pool: DbPool,
}

impl SqlFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) const FEEDBACK_COLUMNS: &str =
    "slack_workspace, prompt, thumb_up, comment, origin, category, in_production, user_id, created_at";

pub(crate) fn row_to_feedback(row: &sqlx::sqlite::SqliteRow) -> Result<FeedbackRecord, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());
    let created_at: String = row.try_get("created_at").map_err(decode)?;

    Ok(FeedbackRecord {
        workspace: row.try_get("slack_workspace").map_err(decode)?,
        prompt: row.try_get("prompt").map_err(decode)?,
        thumb_up: row.try_get("thumb_up").map_err(decode)?,
        comment: row.try_get("comment").map_err(decode)?,
        origin: row.try_get("origin").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        in_production: row.try_get("in_production").map_err(decode)?,
        user_id: row.try_get("user_id").map_err(decode)?,
        created_at: decode_timestamp(&created_at)?,
    })
}

fn row_to_issue(row: &sqlx::sqlite::SqliteRow) -> Result<IssueReport, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());
    Ok(IssueReport {
        workspace: row.try_get("slack_workspace").map_err(decode)?,
        origin: row.try_get("origin").map_err(decode)?,
        report: row.try_get("report").map_err(decode)?,
    })
}

fn row_to_prompt(row: &sqlx::sqlite::SqliteRow) -> Result<RegisteredPrompt, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());
    Ok(RegisteredPrompt {
        id: row.try_get("id").map_err(decode)?,
        workspace: row.try_get("slack_workspace").map_err(decode)?,
        origin: row.try_get("origin").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        prompt: row.try_get("prompt").map_err(decode)?,
    })
}

#[async_trait]
impl FeedbackRepository for SqlFeedbackRepository {
    async fn prompt_usage(
        &self,
        workspace: &str,
        origin: &str,
        category: &str,
        prompt: &str,
    ) -> Result<PromptUsage, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) AS registered,
                 COALESCE(SUM(CASE WHEN origin = ? AND category = ? AND prompt = ? THEN 1 ELSE 0 END), 0)
                     AS matching
             FROM prompts
             WHERE slack_workspace = ?",
        )
        .bind(origin)
        .bind(category)
        .bind(prompt)
        .bind(workspace)
        .fetch_one(&self.pool)
        .await?;

        let registered: i64 =
            row.try_get("registered").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let matching: i64 =
            row.try_get("matching").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        Ok(PromptUsage { registered: decode_count(registered, "registered")?, exists: matching > 0 })
    }

    async fn insert(&self, account_id: &str, record: &FeedbackRecord) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO prompts (slack_workspace, origin, category, prompt)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(slack_workspace, origin, category, prompt) DO NOTHING",
        )
        .bind(&record.workspace)
        .bind(&record.origin)
        .bind(&record.category)
        .bind(&record.prompt)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!("INSERT INTO feedback ({FEEDBACK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"))
            .bind(&record.workspace)
            .bind(&record.prompt)
            .bind(record.thumb_up)
            .bind(&record.comment)
            .bind(&record.origin)
            .bind(&record.category)
            .bind(record.in_production)
            .bind(&record.user_id)
            .bind(encode_timestamp(record.created_at))
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE accounts SET feedback_count = feedback_count + 1 WHERE account_id = ?")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn explore(
        &self,
        workspace: &str,
        window: DateWindow,
        filter: &FeedbackFilter,
    ) -> Result<Vec<FeedbackRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {FEEDBACK_COLUMNS}
             FROM feedback
             WHERE slack_workspace = ?
               AND in_production = 1
               AND created_at >= ?
               AND created_at < ?
               AND (? IS NULL OR origin = ?)
               AND (? IS NULL OR category = ?)
               AND (? IS NULL OR prompt = ?)
               AND (? IS NULL OR thumb_up = ?)
             ORDER BY created_at, id"
        ))
        .bind(workspace)
        .bind(encode_timestamp(window.start_instant()))
        .bind(encode_timestamp(window.end_instant()))
        .bind(&filter.origin)
        .bind(&filter.origin)
        .bind(&filter.category)
        .bind(&filter.category)
        .bind(&filter.prompt)
        .bind(&filter.prompt)
        .bind(filter.thumb_up)
        .bind(filter.thumb_up)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_feedback).collect()
    }

    async fn issue_reports(&self, workspace: &str) -> Result<Vec<IssueReport>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT slack_workspace, origin, report FROM issues
             WHERE slack_workspace = ?
             ORDER BY origin",
        )
        .bind(workspace)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_issue).collect()
    }

    async fn prompts(&self, workspace: &str) -> Result<Vec<RegisteredPrompt>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, slack_workspace, origin, category, prompt FROM prompts
             WHERE slack_workspace = ?
             ORDER BY origin, category, prompt",
        )
        .bind(workspace)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_prompt).collect()
    }

    async fn prompt(
        &self,
        workspace: &str,
        id: i64,
    ) -> Result<Option<RegisteredPrompt>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, slack_workspace, origin, category, prompt FROM prompts
             WHERE slack_workspace = ? AND id = ?",
        )
        .bind(workspace)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_prompt).transpose()
    }

    async fn delete_prompt(&self, workspace: &str, id: i64) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT id, slack_workspace, origin, category, prompt FROM prompts
             WHERE slack_workspace = ? AND id = ?",
        )
        .bind(workspace)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(prompt) = row.as_ref().map(row_to_prompt).transpose()? else {
            return Ok(false);
        };

        for table in ["feedback", "summaries"] {
            sqlx::query(&format!(
                "DELETE FROM {table}
                 WHERE slack_workspace = ? AND origin = ? AND category = ? AND prompt = ?"
            ))
            .bind(&prompt.workspace)
            .bind(&prompt.origin)
            .bind(&prompt.category)
            .bind(&prompt.prompt)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query("DELETE FROM prompts WHERE id = ?").bind(prompt.id).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn test_feedback(
        &self,
        workspace: &str,
        limit: u32,
    ) -> Result<Vec<FeedbackRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {FEEDBACK_COLUMNS}
             FROM feedback
             WHERE slack_workspace = ? AND in_production = 0
             ORDER BY created_at DESC, id DESC
             LIMIT ?"
        ))
        .bind(workspace)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_feedback).collect()
    }
}

#[cfg(test)]
mod tests {
    use tally_core::digest::ports::DigestStore;
    use tally_core::domain::cadence::DateWindow;
    use tally_core::domain::feedback::{FeedbackFilter, SummaryRow};

    use super::SqlFeedbackRepository;
    use crate::repositories::test_support::{account, at, date, pool, record};
    use crate::repositories::{
        AccountRepository, FeedbackRepository, SqlAccountRepository, SqlDigestStore,
    };

    const DOCS: (&str, &str, &str) = ("docs", "api", "summarize");
    const APP: (&str, &str, &str) = ("app", "search", "find");

    #[tokio::test]
    async fn insert_registers_prompt_once_and_counts_feedback() {
        let pool = pool().await;
        let accounts = SqlAccountRepository::new(pool.clone());
        accounts.create(&account("a1", Some("T1"), None)).await.expect("save account");
        let repo = SqlFeedbackRepository::new(pool);

        let before = repo.prompt_usage("T1", "docs", "api", "summarize").await.expect("usage");
        assert_eq!(before.registered, 0);
        assert!(!before.exists);

        for user in ["U1", "U2"] {
            repo.insert("a1", &record("T1", DOCS, user, true, None, at("2026-10-18", 9)))
                .await
                .expect("insert");
        }
        repo.insert("a1", &record("T1", APP, "U3", false, Some("slow"), at("2026-10-18", 9)))
            .await
            .expect("insert");

        let after = repo.prompt_usage("T1", "docs", "api", "summarize").await.expect("usage");
        assert_eq!(after.registered, 2);
        assert!(after.exists);

        let account = accounts.find_by_api_key("key-a1").await.expect("query").expect("account");
        assert_eq!(account.feedback_count, 3);
    }

    #[tokio::test]
    async fn explore_applies_window_and_filter() {
        let pool = pool().await;
        SqlAccountRepository::new(pool.clone())
            .create(&account("a1", Some("T1"), None))
            .await
            .expect("save account");
        let repo = SqlFeedbackRepository::new(pool);

        let rows = [
            record("T1", DOCS, "U1", true, None, at("2026-10-10", 9)),
            record("T1", DOCS, "U2", false, Some("missing"), at("2026-10-11", 9)),
            record("T1", APP, "U3", false, None, at("2026-10-11", 10)),
            record("T1", DOCS, "U4", false, None, at("2026-10-19", 0)),
            record("T2", DOCS, "U5", false, None, at("2026-10-11", 9)),
        ];
        for row in &rows {
            repo.insert("a1", row).await.expect("insert");
        }

        let window = DateWindow::new(date("2026-10-10"), date("2026-10-19"));
        let all = repo.explore("T1", window, &FeedbackFilter::default()).await.expect("explore");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], rows[0]);

        let filter = FeedbackFilter {
            origin: Some("docs".to_owned()),
            thumb_up: Some(false),
            ..FeedbackFilter::default()
        };
        let filtered = repo.explore("T1", window, &filter).await.expect("explore");
        assert_eq!(filtered, vec![rows[1].clone()]);
    }

    #[tokio::test]
    async fn deleting_a_prompt_removes_its_feedback_and_summaries_only() {
        let pool = pool().await;
        SqlAccountRepository::new(pool.clone())
            .create(&account("a1", Some("T1"), None))
            .await
            .expect("save account");
        let repo = SqlFeedbackRepository::new(pool.clone());
        let store = SqlDigestStore::new(pool);

        repo.insert("a1", &record("T1", DOCS, "U1", true, None, at("2026-10-10", 9))).await.expect("insert");
        repo.insert("a1", &record("T1", APP, "U2", false, Some("slow"), at("2026-10-10", 9))).await.expect("insert");
        store
            .insert_summary(
                "T1",
                &SummaryRow {
                    summary_date: date("2026-10-10"),
                    origin: "docs".to_owned(),
                    category: "api".to_owned(),
                    prompt: "summarize".to_owned(),
                    comment_count: 1,
                    summary: "short".to_owned(),
                },
            )
            .await
            .expect("summary");

        let prompts = repo.prompts("T1").await.expect("prompts");
        assert_eq!(
            prompts.iter().map(|prompt| prompt.origin.as_str()).collect::<Vec<_>>(),
            vec!["app", "docs"]
        );
        let docs = prompts[1].clone();
        assert_eq!(repo.prompt("T1", docs.id).await.expect("query"), Some(docs.clone()));
        assert_eq!(repo.prompt("T2", docs.id).await.expect("query"), None);
        assert!(!repo.delete_prompt("T2", docs.id).await.expect("other workspace"));

        assert!(repo.delete_prompt("T1", docs.id).await.expect("delete"));
        assert!(!repo.delete_prompt("T1", docs.id).await.expect("already gone"));

        let window = DateWindow::new(date("2026-10-01"), date("2026-10-20"));
        let left = repo.explore("T1", window, &FeedbackFilter::default()).await.expect("explore");
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].origin, "app");
        assert!(store.summaries("T1", window).await.expect("summaries").is_empty());
        assert_eq!(repo.prompt_usage("T1", "docs", "api", "summarize").await.expect("usage").registered, 1);
    }

    #[tokio::test]
    async fn test_feedback_lists_newest_non_production_rows() {
        let pool = pool().await;
        SqlAccountRepository::new(pool.clone())
            .create(&account("a1", Some("T1"), None))
            .await
            .expect("save account");
        let repo = SqlFeedbackRepository::new(pool);

        for hour in 1..=3 {
            let mut row = record("T1", DOCS, "U1", true, None, at("2026-10-10", hour));
            row.in_production = false;
            repo.insert("a1", &row).await.expect("insert");
        }
        repo.insert("a1", &record("T1", DOCS, "U2", true, None, at("2026-10-10", 5))).await.expect("insert");

        let rows = repo.test_feedback("T1", 2).await.expect("test data");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| !row.in_production));
        assert_eq!(rows[0].created_at, at("2026-10-10", 3));
    }
}

