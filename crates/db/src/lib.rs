pub mod connection;
pub mod maintenance;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, ping, DbPool};
pub use maintenance::{run_cleanup, CleanupReport};
pub use repositories::{
    AccountRepository, FeedbackRepository, InstallationRepository, PromptUsage, RepositoryError,
    SqlAccountRepository, SqlDigestStore, SqlFeedbackRepository, SqlInstallationRepository,
};
