//! Slack surface for tally.
//!
//! - **Block Kit** (`blocks`): typed blocks, views and a message builder
//! - **Digests** (`digest`, `chunking`, `publisher`): cadence layouts split
//!   into messages Slack accepts, posted in order
//! - **Web API** (`client`): `chat.postMessage`, views, external file upload
//! - **Interactions** (`actions`, `home`): typed payload and event decoding,
//!   plus the App Home tabs and modals they open

pub mod actions;
pub mod blocks;
pub mod chunking;
pub mod client;
pub mod digest;
pub mod home;
pub mod publisher;

pub use actions::{
    decode_event, decode_interaction, DecodeError, FilterChange, HomeTab, InteractionContext,
    InteractionEvent, SlackEvent, StatsPeriod,
};
pub use client::{SlackApiError, SlackWebClient};
pub use publisher::SlackDigestPublisher;
