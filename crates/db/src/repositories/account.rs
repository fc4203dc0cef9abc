use async_trait::async_trait;
use sqlx::Row;

use tally_core::domain::account::{Account, WorkspaceSettings};

use super::{decode_count, decode_timestamp, encode_timestamp, AccountRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAccountRepository {
    pool: DbPool,
}

impl SqlAccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account, RepositoryError> {
    let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());

    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let expires_at: String = row.try_get("account_expiry_date").map_err(decode)?;
    let feedback_count: i64 = row.try_get("feedback_count").map_err(decode)?;

    Ok(Account {
        account_id: row.try_get("account_id").map_err(decode)?,
        created_at: decode_timestamp(&created_at)?,
        expires_at: decode_timestamp(&expires_at)?,
        activation_code: row.try_get("activation_code").map_err(decode)?,
        api_key: row.try_get("api_key").map_err(decode)?,
        slack_workspace: row.try_get("slack_workspace").map_err(decode)?,
        slack_channel: row.try_get("slack_channel").map_err(decode)?,
        feedback_count: decode_count(feedback_count, "feedback_count")?,
    })
}

#[async_trait]
impl AccountRepository for SqlAccountRepository {
    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query(
            "SELECT account_id, created_at, account_expiry_date, activation_code, api_key,
                    slack_workspace, slack_channel, feedback_count
             FROM accounts
             WHERE api_key = ?",
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    async fn create(&self, account: &Account) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO accounts
                (account_id, created_at, account_expiry_date, activation_code, api_key,
                 slack_workspace, slack_channel, feedback_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&account.account_id)
        .bind(encode_timestamp(account.created_at))
        .bind(encode_timestamp(account.expires_at))
        .bind(&account.activation_code)
        .bind(&account.api_key)
        .bind(&account.slack_workspace)
        .bind(&account.slack_channel)
        .bind(i64::from(account.feedback_count))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn link_workspace(
        &self,
        activation_code: &str,
        workspace: &str,
    ) -> Result<bool, RepositoryError> {
        let linked = sqlx::query(
            "UPDATE accounts SET slack_workspace = ?
             WHERE activation_code = ? AND (slack_workspace IS NULL OR slack_workspace = '')",
        )
        .bind(workspace)
        .bind(activation_code)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(linked > 0)
    }

    async fn workspace_settings(
        &self,
        workspace: &str,
    ) -> Result<Option<WorkspaceSettings>, RepositoryError> {
        let row = sqlx::query(
            "SELECT api_key, slack_channel, account_expiry_date
             FROM accounts
             WHERE slack_workspace = ?
             ORDER BY account_expiry_date DESC
             LIMIT 1",
        )
        .bind(workspace)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let decode = |error: sqlx::Error| RepositoryError::Decode(error.to_string());
        let expires_at: String = row.try_get("account_expiry_date").map_err(decode)?;
        let channel: Option<String> = row.try_get("slack_channel").map_err(decode)?;
        Ok(Some(WorkspaceSettings {
            api_key: row.try_get("api_key").map_err(decode)?,
            channel: channel.filter(|channel| !channel.trim().is_empty()),
            expires_at: decode_timestamp(&expires_at)?,
        }))
    }

    async fn set_channel(&self, workspace: &str, channel: Option<&str>) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE accounts SET slack_channel = ? WHERE slack_workspace = ?")
            .bind(channel)
            .bind(workspace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rotate_api_key(&self, workspace: &str, api_key: &str) -> Result<(), RepositoryError> {
        // Keys are unique, so only the account the settings tab shows rotates.
        sqlx::query(
            "UPDATE accounts SET api_key = ?
             WHERE account_id = (
                 SELECT account_id FROM accounts
                 WHERE slack_workspace = ?
                 ORDER BY account_expiry_date DESC
                 LIMIT 1
             )",
        )
            .bind(api_key)
            .bind(workspace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SqlAccountRepository;
    use crate::repositories::test_support::{account, at, expired, pool};
    use crate::repositories::AccountRepository;

    #[tokio::test]
    async fn created_account_is_found_by_api_key() {
        let repo = SqlAccountRepository::new(pool().await);
        let created = account("a1", Some("T1"), Some("C1"));
        repo.create(&created).await.expect("create");

        let found = repo.find_by_api_key("key-a1").await.expect("query").expect("account");
        assert_eq!(found, created);
        assert!(repo.find_by_api_key("unknown").await.expect("query").is_none());
        assert!(repo.create(&created).await.is_err(), "duplicate account ids are rejected");
    }

    #[tokio::test]
    async fn activation_code_links_a_workspace_only_once() {
        let repo = SqlAccountRepository::new(pool().await);
        repo.create(&account("a1", None, None)).await.expect("create");

        assert!(!repo.link_workspace("ACT-missing", "T1").await.expect("link"));
        assert!(repo.link_workspace("ACT-a1", "T1").await.expect("link"));
        assert!(!repo.link_workspace("ACT-a1", "T2").await.expect("link"));

        let found = repo.find_by_api_key("key-a1").await.expect("query").expect("account");
        assert_eq!(found.slack_workspace.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn settings_follow_channel_and_key_changes() {
        let repo = SqlAccountRepository::new(pool().await);
        repo.create(&account("a1", Some("T1"), None)).await.expect("create");
        repo.create(&expired(account("old", Some("T1"), Some("C-old")), at("2026-05-01", 0)))
            .await
            .expect("create");
        assert!(repo.workspace_settings("T9").await.expect("query").is_none());

        let settings = repo.workspace_settings("T1").await.expect("query").expect("settings");
        assert_eq!(settings.api_key, "key-a1");
        assert_eq!(settings.channel, None);

        repo.set_channel("T1", Some("C42")).await.expect("set");
        repo.rotate_api_key("T1", "key-rotated").await.expect("rotate");
        let settings = repo.workspace_settings("T1").await.expect("query").expect("settings");
        assert_eq!(settings.channel.as_deref(), Some("C42"));
        assert_eq!(settings.api_key, "key-rotated");
        assert!(repo.find_by_api_key("key-old").await.expect("query").is_some());

        repo.set_channel("T1", None).await.expect("clear");
        let settings = repo.workspace_settings("T1").await.expect("query").expect("settings");
        assert_eq!(settings.channel, None);
    }
}
