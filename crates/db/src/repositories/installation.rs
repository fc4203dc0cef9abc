use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use super::{encode_timestamp, InstallationRepository, RepositoryError};
use crate::DbPool;

/// Bot tokens captured when a workspace installs the app.
pub struct SqlInstallationRepository {
    pool: DbPool,
}

impl SqlInstallationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstallationRepository for SqlInstallationRepository {
    async fn bot_token(&self, workspace: &str) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT bot_token FROM installations WHERE slack_workspace = ?")
            .bind(workspace)
            .fetch_optional(&self.pool)
            .await?;

        let token = match row {
            Some(row) => row
                .try_get::<String, _>("bot_token")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?,
            None => return Ok(None),
        };
        Ok(Some(token).filter(|token| !token.trim().is_empty()))
    }

    async fn save(&self, workspace: &str, bot_token: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO installations (slack_workspace, bot_token, created_at)
             VALUES (?, ?, ?)
             ON CONFLICT(slack_workspace) DO UPDATE SET bot_token = excluded.bot_token",
        )
        .bind(workspace)
        .bind(bot_token)
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, workspace: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM installations WHERE slack_workspace = ?")
            .bind(workspace)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::SqlInstallationRepository;
    use crate::repositories::test_support::pool;
    use crate::repositories::InstallationRepository;

    #[tokio::test]
    async fn reinstall_replaces_token_and_blank_tokens_read_as_missing() {
        let repo = SqlInstallationRepository::new(pool().await);
        repo.save("T1", "xoxb-old").await.expect("save");
        repo.save("T1", "xoxb-new").await.expect("save");
        repo.save("T2", "  ").await.expect("save");

        assert_eq!(repo.bot_token("T1").await.expect("query").as_deref(), Some("xoxb-new"));
        assert_eq!(repo.bot_token("T2").await.expect("query"), None);
        assert_eq!(repo.bot_token("T3").await.expect("query"), None);
    }

    #[tokio::test]
    async fn uninstall_removes_the_token_once() {
        let repo = SqlInstallationRepository::new(pool().await);
        repo.save("T1", "xoxb-1").await.expect("save");

        assert!(repo.remove("T1").await.expect("remove"));
        assert!(!repo.remove("T1").await.expect("remove again"));
        assert_eq!(repo.bot_token("T1").await.expect("query"), None);
    }
}
