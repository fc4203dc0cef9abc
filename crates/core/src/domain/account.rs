use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const ACTIVATION_CODE_PREFIX: &str = "TLLY";
pub const API_KEY_PREFIX: &str = "tally_";
const API_KEY_CHARS: usize = 24;
const ACCOUNT_ID_CHARS: usize = 12;

/// A paying customer. Feedback is only accepted once the account is linked
/// to a Slack workspace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub activation_code: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub slack_workspace: Option<String>,
    pub slack_channel: Option<String>,
    pub feedback_count: u32,
}

impl Account {
    /// A fresh, unlinked account valid for `validity` from `now`.
    pub fn issue<R: Rng + ?Sized>(now: DateTime<Utc>, validity: Duration, rng: &mut R) -> Self {
        Self {
            account_id: format!("acct_{}", alphanumeric(rng, ACCOUNT_ID_CHARS).to_lowercase()),
            created_at: now,
            expires_at: now + validity,
            activation_code: generate_activation_code(rng),
            api_key: generate_api_key(rng),
            slack_workspace: None,
            slack_channel: None,
            feedback_count: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn has_reached_quota(&self, monthly_limit: u32) -> bool {
        self.feedback_count >= monthly_limit
    }
}

/// What the App Home settings tab shows for a linked workspace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkspaceSettings {
    pub api_key: String,
    pub channel: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl WorkspaceSettings {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at >= now
    }
}

/// `TLLY-XXXX-YYYY` with upper-case hex groups.
pub fn generate_activation_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let bytes: [u8; 4] = rng.gen();
    format!(
        "{ACTIVATION_CODE_PREFIX}-{:02X}{:02X}-{:02X}{:02X}",
        bytes[0], bytes[1], bytes[2], bytes[3]
    )
}

pub fn generate_api_key<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{API_KEY_PREFIX}{}", alphanumeric(rng, API_KEY_CHARS))
}

/// API key drawn from the thread-local generator.
pub fn new_api_key() -> String {
    generate_api_key(&mut rand::thread_rng())
}

fn alphanumeric<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}
