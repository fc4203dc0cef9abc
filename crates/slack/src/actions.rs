//! Interaction payloads decoded once at the HTTP boundary.

use serde::Deserialize;
use serde_json::Value;
use tally_core::FeedbackFilter;
use thiserror::Error;

pub const EXPLORE_FEEDBACK: &str = "explore_feedback";
pub const REPORT_ISSUE: &str = "report_issue";
pub const MODAL_TOP_ISSUES: &str = "modal-top-issues";
pub const MODAL_COMMENTS: &str = "modal-comments";
pub const HOME_EXPLORE: &str = "home-explore";
pub const HOME_PROMPTS: &str = "home-prompts";
pub const HOME_SETTINGS: &str = "home-settings";
pub const HOME_SUPPORT: &str = "home-support";
pub const HOME_STATS_7D: &str = "home-stats-7d";
pub const HOME_STATS_30D: &str = "home-stats-30d";
pub const MODAL_STATS_7D: &str = "modal-stats-7d";
pub const MODAL_STATS_30D: &str = "modal-stats-30d";
pub const LINK_WORKSPACE: &str = "link-workspace";
pub const SET_CHANNEL: &str = "set-channel";
pub const CLEAR_CHANNEL: &str = "clear-channel";
pub const ROTATE_API_KEY: &str = "rotate-api-key";
pub const VIEW_TEST_DATA: &str = "view-test-data";
pub const MODAL_DELETE_PROMPT: &str = "modal-delete-prompt";
pub const SELECT_ORIGIN: &str = "select-origin";
pub const SELECT_CATEGORY: &str = "select-category";
pub const SELECT_PROMPT: &str = "select-prompt";
pub const SELECT_THUMB: &str = "select-thumb";
pub const CLEAR_FILTERS: &str = "clear-filters";

pub const REPORT_MODAL_CALLBACK: &str = "report_issue_modal";
pub const REPORT_DESCRIPTION_BLOCK: &str = "issue_description";
pub const REPORT_DESCRIPTION_INPUT: &str = "message-text";
pub const REPORT_EMAIL_BLOCK: &str = "issue_email";
pub const REPORT_EMAIL_INPUT: &str = "email-address";

pub const DELETE_PROMPT_CALLBACK: &str = "delete-prompt";
pub const DELETE_CONFIRM_BLOCK: &str = "delete_confirm";
pub const DELETE_CONFIRM_INPUT: &str = "delete-confirm";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("interaction payload is not valid json: {0}")]
    Json(String),
    #[error("interaction payload is missing `{0}`")]
    MissingField(&'static str),
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("unsupported interaction type")]
    UnsupportedType,
    #[error("invalid value `{value}` for `{action}`")]
    InvalidValue { action: String, value: String },
}

/// Who triggered the interaction and in which workspace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractionContext {
    pub user_id: String,
    pub workspace: String,
}

impl InteractionContext {
    /// Key for per-user state such as explore filters.
    pub fn state_key(&self) -> String {
        format!("{}:{}", self.user_id, self.workspace)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterField {
    Origin,
    Category,
    Prompt,
    Thumb,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterChange {
    Set { field: FilterField, value: String },
    ClearAll,
}

impl FilterChange {
    pub fn apply(&self, filter: &mut FeedbackFilter) {
        match self {
            Self::ClearAll => *filter = FeedbackFilter::default(),
            Self::Set { field: FilterField::Origin, value } => filter.origin = Some(value.clone()),
            Self::Set { field: FilterField::Category, value } => {
                filter.category = Some(value.clone())
            }
            Self::Set { field: FilterField::Prompt, value } => filter.prompt = Some(value.clone()),
            Self::Set { field: FilterField::Thumb, value } => {
                filter.thumb_up = match value.as_str() {
                    "up" => Some(true),
                    "down" => Some(false),
                    _ => None,
                }
            }
        }
    }
}

/// App Home tabs reachable from the navigation bar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HomeTab {
    #[default]
    Explore,
    Prompts,
    Settings,
}

impl HomeTab {
    pub fn action_id(self) -> &'static str {
        match self {
            Self::Explore => HOME_EXPLORE,
            Self::Prompts => HOME_PROMPTS,
            Self::Settings => HOME_SETTINGS,
        }
    }
}

/// Trailing windows offered by the stats modals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatsPeriod {
    Last7Days,
    Last30Days,
}

impl StatsPeriod {
    pub fn days(self) -> i64 {
        match self {
            Self::Last7Days => 7,
            Self::Last30Days => 30,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Last7Days => "7-Day Stats",
            Self::Last30Days => "30-Day Stats",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionEvent {
    OpenExplore { context: InteractionContext, trigger_id: String },
    OpenReport { context: InteractionContext, trigger_id: String },
    ShowTopIssues { context: InteractionContext, trigger_id: String },
    ShowLatestComments { context: InteractionContext, trigger_id: String },
    /// `stacked` stats are pushed on top of an open modal instead of opened.
    ShowStats { context: InteractionContext, trigger_id: String, period: StatsPeriod, stacked: bool },
    ShowTab { context: InteractionContext, tab: HomeTab },
    UpdateFilter { context: InteractionContext, change: FilterChange },
    SubmitReport { context: InteractionContext, description: String, email: Option<String> },
    LinkWorkspace { context: InteractionContext, activation_code: String },
    /// `None` clears the digest channel.
    SetChannel { context: InteractionContext, channel: Option<String> },
    RotateApiKey { context: InteractionContext },
    ShowTestData { context: InteractionContext, trigger_id: String },
    OpenDeletePrompt { context: InteractionContext, trigger_id: String, prompt_id: i64 },
    SubmitDeletePrompt { context: InteractionContext, prompt_id: i64, confirmation: Option<String> },
}

impl InteractionEvent {
    pub fn context(&self) -> &InteractionContext {
        match self {
            Self::OpenExplore { context, .. }
            | Self::OpenReport { context, .. }
            | Self::ShowTopIssues { context, .. }
            | Self::ShowLatestComments { context, .. }
            | Self::ShowStats { context, .. }
            | Self::ShowTab { context, .. }
            | Self::UpdateFilter { context, .. }
            | Self::SubmitReport { context, .. }
            | Self::LinkWorkspace { context, .. }
            | Self::SetChannel { context, .. }
            | Self::RotateApiKey { context }
            | Self::ShowTestData { context, .. }
            | Self::OpenDeletePrompt { context, .. }
            | Self::SubmitDeletePrompt { context, .. } => context,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenExplore { .. } => EXPLORE_FEEDBACK,
            Self::OpenReport { .. } => REPORT_ISSUE,
            Self::ShowTopIssues { .. } => MODAL_TOP_ISSUES,
            Self::ShowLatestComments { .. } => MODAL_COMMENTS,
            Self::ShowStats { period: StatsPeriod::Last7Days, .. } => HOME_STATS_7D,
            Self::ShowStats { period: StatsPeriod::Last30Days, .. } => HOME_STATS_30D,
            Self::ShowTab { tab, .. } => tab.action_id(),
            Self::UpdateFilter { .. } => "update-filter",
            Self::SubmitReport { .. } => REPORT_MODAL_CALLBACK,
            Self::LinkWorkspace { .. } => LINK_WORKSPACE,
            Self::SetChannel { channel: Some(_), .. } => SET_CHANNEL,
            Self::SetChannel { channel: None, .. } => CLEAR_CHANNEL,
            Self::RotateApiKey { .. } => ROTATE_API_KEY,
            Self::ShowTestData { .. } => VIEW_TEST_DATA,
            Self::OpenDeletePrompt { .. } => MODAL_DELETE_PROMPT,
            Self::SubmitDeletePrompt { .. } => DELETE_PROMPT_CALLBACK,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawPayload {
    BlockActions {
        user: RawUser,
        team: Option<RawTeam>,
        trigger_id: Option<String>,
        #[serde(default)]
        actions: Vec<RawAction>,
    },
    ViewSubmission {
        user: RawUser,
        team: Option<RawTeam>,
        view: RawView,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
    team_id: Option<String>,
}

#[derive(Deserialize)]
struct RawTeam {
    id: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
    value: Option<String>,
    selected_option: Option<RawOption>,
    selected_channel: Option<String>,
}

#[derive(Deserialize)]
struct RawOption {
    value: String,
}

#[derive(Deserialize)]
struct RawView {
    callback_id: Option<String>,
    private_metadata: Option<String>,
    #[serde(default)]
    state: Value,
}

/// Decodes the `payload` form field of an interaction request.
pub fn decode_interaction(payload: &str) -> Result<InteractionEvent, DecodeError> {
    let raw: RawPayload =
        serde_json::from_str(payload).map_err(|error| DecodeError::Json(error.to_string()))?;

    match raw {
        RawPayload::BlockActions { user, team, trigger_id, actions } => {
            let context = context(user, team)?;
            let action = actions.into_iter().next().ok_or(DecodeError::MissingField("actions"))?;
            decode_action(context, trigger_id, action)
        }
        RawPayload::ViewSubmission { user, team, view } => {
            let context = context(user, team)?;
            match view.callback_id.as_deref() {
                Some(REPORT_MODAL_CALLBACK) => {
                    let description = state_value(&view.state, REPORT_DESCRIPTION_BLOCK, REPORT_DESCRIPTION_INPUT)
                        .ok_or(DecodeError::MissingField("issue description"))?;
                    let email = state_value(&view.state, REPORT_EMAIL_BLOCK, REPORT_EMAIL_INPUT);
                    Ok(InteractionEvent::SubmitReport { context, description, email })
                }
                Some(DELETE_PROMPT_CALLBACK) => {
                    let prompt_id = view
                        .private_metadata
                        .as_deref()
                        .ok_or(DecodeError::MissingField("view.private_metadata"))
                        .and_then(|value| prompt_id(DELETE_PROMPT_CALLBACK, value))?;
                    let confirmation =
                        state_value(&view.state, DELETE_CONFIRM_BLOCK, DELETE_CONFIRM_INPUT);
                    Ok(InteractionEvent::SubmitDeletePrompt { context, prompt_id, confirmation })
                }
                Some(other) => Err(DecodeError::UnknownAction(other.to_owned())),
                None => Err(DecodeError::MissingField("view.callback_id")),
            }
        }
        RawPayload::Other => Err(DecodeError::UnsupportedType),
    }
}

/// Events API callbacks the app subscribes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    UrlVerification { challenge: String },
    AppHomeOpened { context: InteractionContext },
    AppUninstalled { workspace: String },
    Ignored { kind: String },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawEnvelope {
    UrlVerification { challenge: String },
    EventCallback { team_id: String, event: RawEvent },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    user: Option<String>,
    tab: Option<String>,
}

/// Decodes an Events API request body.
pub fn decode_event(body: &str) -> Result<SlackEvent, DecodeError> {
    let raw: RawEnvelope =
        serde_json::from_str(body).map_err(|error| DecodeError::Json(error.to_string()))?;

    match raw {
        RawEnvelope::UrlVerification { challenge } => Ok(SlackEvent::UrlVerification { challenge }),
        RawEnvelope::EventCallback { team_id, event } => match event.kind.as_str() {
            // Opening the Messages tab fires the same event.
            "app_home_opened" if event.tab.as_deref() != Some("messages") => {
                let user_id = event.user.ok_or(DecodeError::MissingField("event.user"))?;
                Ok(SlackEvent::AppHomeOpened {
                    context: InteractionContext { user_id, workspace: team_id },
                })
            }
            "app_uninstalled" => Ok(SlackEvent::AppUninstalled { workspace: team_id }),
            _ => Ok(SlackEvent::Ignored { kind: event.kind }),
        },
        RawEnvelope::Other => Err(DecodeError::UnsupportedType),
    }
}

fn context(user: RawUser, team: Option<RawTeam>) -> Result<InteractionContext, DecodeError> {
    let workspace = team
        .map(|team| team.id)
        .or(user.team_id)
        .filter(|id| !id.trim().is_empty())
        .ok_or(DecodeError::MissingField("team.id"))?;
    Ok(InteractionContext { user_id: user.id, workspace })
}

fn decode_action(
    context: InteractionContext,
    trigger_id: Option<String>,
    action: RawAction,
) -> Result<InteractionEvent, DecodeError> {
    let selected = || {
        action
            .selected_option
            .as_ref()
            .map(|option| option.value.clone())
            .or_else(|| action.value.clone())
            .ok_or(DecodeError::MissingField("selected_option"))
    };
    let trigger = || trigger_id.clone().ok_or(DecodeError::MissingField("trigger_id"));
    let set = |field| -> Result<InteractionEvent, DecodeError> {
        Ok(InteractionEvent::UpdateFilter {
            context: context.clone(),
            change: FilterChange::Set { field, value: selected()? },
        })
    };

    match action.action_id.as_str() {
        EXPLORE_FEEDBACK => Ok(InteractionEvent::OpenExplore { trigger_id: trigger()?, context }),
        REPORT_ISSUE => Ok(InteractionEvent::OpenReport { trigger_id: trigger()?, context }),
        MODAL_TOP_ISSUES => Ok(InteractionEvent::ShowTopIssues { trigger_id: trigger()?, context }),
        MODAL_COMMENTS => {
            Ok(InteractionEvent::ShowLatestComments { trigger_id: trigger()?, context })
        }
        HOME_EXPLORE => Ok(InteractionEvent::ShowTab { context, tab: HomeTab::Explore }),
        HOME_PROMPTS => Ok(InteractionEvent::ShowTab { context, tab: HomeTab::Prompts }),
        HOME_SETTINGS => Ok(InteractionEvent::ShowTab { context, tab: HomeTab::Settings }),
        HOME_SUPPORT => Ok(InteractionEvent::OpenReport { trigger_id: trigger()?, context }),
        HOME_STATS_7D | HOME_STATS_30D | MODAL_STATS_7D | MODAL_STATS_30D => {
            let period = match action.action_id.as_str() {
                HOME_STATS_7D | MODAL_STATS_7D => StatsPeriod::Last7Days,
                _ => StatsPeriod::Last30Days,
            };
            let stacked = action.action_id.starts_with("modal-");
            Ok(InteractionEvent::ShowStats { trigger_id: trigger()?, context, period, stacked })
        }
        LINK_WORKSPACE => {
            let activation_code = action
                .value
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .ok_or(DecodeError::MissingField("activation code"))?
                .to_owned();
            Ok(InteractionEvent::LinkWorkspace { context, activation_code })
        }
        SET_CHANNEL => {
            let channel =
                action.selected_channel.clone().ok_or(DecodeError::MissingField("selected_channel"))?;
            Ok(InteractionEvent::SetChannel { context, channel: Some(channel) })
        }
        CLEAR_CHANNEL => Ok(InteractionEvent::SetChannel { context, channel: None }),
        ROTATE_API_KEY => Ok(InteractionEvent::RotateApiKey { context }),
        VIEW_TEST_DATA => Ok(InteractionEvent::ShowTestData { trigger_id: trigger()?, context }),
        MODAL_DELETE_PROMPT => {
            let value = action.value.as_deref().ok_or(DecodeError::MissingField("value"))?;
            let prompt_id = prompt_id(MODAL_DELETE_PROMPT, value)?;
            Ok(InteractionEvent::OpenDeletePrompt { trigger_id: trigger()?, context, prompt_id })
        }
        SELECT_ORIGIN => set(FilterField::Origin),
        SELECT_CATEGORY => set(FilterField::Category),
        SELECT_PROMPT => set(FilterField::Prompt),
        SELECT_THUMB => {
            let value = selected()?;
            if value != "up" && value != "down" {
                return Err(DecodeError::InvalidValue { action: SELECT_THUMB.to_owned(), value });
            }
            Ok(InteractionEvent::UpdateFilter {
                context,
                change: FilterChange::Set { field: FilterField::Thumb, value },
            })
        }
        CLEAR_FILTERS => Ok(InteractionEvent::UpdateFilter { context, change: FilterChange::ClearAll }),
        other => Err(DecodeError::UnknownAction(other.to_owned())),
    }
}

fn prompt_id(action: &str, value: &str) -> Result<i64, DecodeError> {
    value.trim().parse().map_err(|_| DecodeError::InvalidValue {
        action: action.to_owned(),
        value: value.to_owned(),
    })
}

fn state_value(state: &Value, block_id: &str, action_id: &str) -> Option<String> {
    state
        .get("values")?
        .get(block_id)?
        .get(action_id)?
        .get("value")?
        .as_str()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tally_core::FeedbackFilter;

    use super::{
        decode_event, decode_interaction, DecodeError, FilterChange, FilterField, HomeTab,
        InteractionContext, InteractionEvent, SlackEvent, StatsPeriod,
    };

    fn block_action(action: serde_json::Value) -> String {
        json!({
            "type": "block_actions",
            "user": {"id": "U1", "team_id": "T1"},
            "team": {"id": "T1"},
            "trigger_id": "trig-1",
            "actions": [action]
        })
        .to_string()
    }

    #[test]
    fn digest_buttons_decode_to_modal_events() {
        let event = decode_interaction(&block_action(json!({"action_id": "explore_feedback", "type": "button"})))
            .expect("decoded");

        match event {
            InteractionEvent::OpenExplore { context, trigger_id } => {
                assert_eq!(context.user_id, "U1");
                assert_eq!(context.workspace, "T1");
                assert_eq!(context.state_key(), "U1:T1");
                assert_eq!(trigger_id, "trig-1");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let report = decode_interaction(&block_action(json!({"action_id": "report_issue"}))).expect("decoded");
        assert!(matches!(report, InteractionEvent::OpenReport { .. }));
    }

    #[test]
    fn filter_selects_carry_the_selected_value() {
        let event = decode_interaction(&block_action(json!({
            "action_id": "select-category",
            "type": "static_select",
            "selected_option": {"value": "api", "text": {"type": "plain_text", "text": "api"}}
        })))
        .expect("decoded");

        let InteractionEvent::UpdateFilter { change, .. } = event else {
            panic!("expected filter update");
        };
        assert_eq!(change, FilterChange::Set { field: FilterField::Category, value: "api".to_owned() });

        let mut filter = FeedbackFilter { origin: Some("docs".to_owned()), ..FeedbackFilter::default() };
        change.apply(&mut filter);
        assert_eq!(filter.category.as_deref(), Some("api"));
        assert_eq!(filter.origin.as_deref(), Some("docs"));

        FilterChange::Set { field: FilterField::Thumb, value: "down".to_owned() }.apply(&mut filter);
        assert_eq!(filter.thumb_up, Some(false));
        FilterChange::ClearAll.apply(&mut filter);
        assert!(filter.is_empty());
    }

    #[test]
    fn unknown_or_malformed_actions_are_rejected() {
        assert!(matches!(
            decode_interaction(&block_action(json!({"action_id": "home-billing"}))),
            Err(DecodeError::UnknownAction(action)) if action == "home-billing"
        ));
        assert!(matches!(
            decode_interaction(&block_action(json!({"action_id": "select-thumb", "selected_option": {"value": "sideways"}}))),
            Err(DecodeError::InvalidValue { .. })
        ));
        assert!(matches!(decode_interaction("{not json"), Err(DecodeError::Json(_))));
        assert!(matches!(
            decode_interaction(&json!({"type": "shortcut", "user": {"id": "U1"}}).to_string()),
            Err(DecodeError::UnsupportedType)
        ));
    }

    #[test]
    fn report_submission_reads_state_values() {
        let payload = json!({
            "type": "view_submission",
            "user": {"id": "U2", "team_id": "T9"},
            "view": {
                "callback_id": "report_issue_modal",
                "state": {"values": {
                    "issue_description": {"message-text": {"type": "plain_text_input", "value": "  Charts missing  "}},
                    "issue_email": {"email-address": {"type": "email_text_input", "value": null}}
                }}
            }
        });

        let event = decode_interaction(&payload.to_string()).expect("decoded");

        assert_eq!(
            event,
            InteractionEvent::SubmitReport {
                context: InteractionContext { user_id: "U2".to_owned(), workspace: "T9".to_owned() },
                description: "Charts missing".to_owned(),
                email: None,
            }
        );
    }

    fn ctx() -> InteractionContext {
        InteractionContext { user_id: "U1".to_owned(), workspace: "T1".to_owned() }
    }

    #[test]
    fn navigation_and_settings_actions_decode() {
        let decode = |action| decode_interaction(&block_action(action)).expect("decoded");

        assert_eq!(
            decode(json!({"action_id": "home-settings"})),
            InteractionEvent::ShowTab { context: ctx(), tab: HomeTab::Settings }
        );
        assert!(matches!(decode(json!({"action_id": "home-support"})), InteractionEvent::OpenReport { .. }));
        assert_eq!(
            decode(json!({"action_id": "link-workspace", "type": "plain_text_input", "value": " TLLY-0A1B-2C3D "})),
            InteractionEvent::LinkWorkspace { context: ctx(), activation_code: "TLLY-0A1B-2C3D".to_owned() }
        );
        assert_eq!(
            decode(json!({"action_id": "set-channel", "type": "channels_select", "selected_channel": "C42"})),
            InteractionEvent::SetChannel { context: ctx(), channel: Some("C42".to_owned()) }
        );
        assert_eq!(
            decode(json!({"action_id": "clear-channel", "value": "C42"})),
            InteractionEvent::SetChannel { context: ctx(), channel: None }
        );
        assert_eq!(
            decode(json!({"action_id": "modal-stats-30d"})),
            InteractionEvent::ShowStats {
                context: ctx(),
                trigger_id: "trig-1".to_owned(),
                period: StatsPeriod::Last30Days,
                stacked: true,
            }
        );
        assert_eq!(
            decode(json!({"action_id": "modal-delete-prompt", "value": "17"})),
            InteractionEvent::OpenDeletePrompt { context: ctx(), trigger_id: "trig-1".to_owned(), prompt_id: 17 }
        );
        assert!(matches!(
            decode_interaction(&block_action(json!({"action_id": "modal-delete-prompt", "value": "seventeen"}))),
            Err(DecodeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn delete_prompt_submission_reads_metadata_and_confirmation() {
        let payload = json!({
            "type": "view_submission",
            "user": {"id": "U1", "team_id": "T1"},
            "view": {
                "callback_id": "delete-prompt",
                "private_metadata": "17",
                "state": {"values": {
                    "delete_confirm": {"delete-confirm": {"type": "plain_text_input", "value": "YES"}}
                }}
            }
        });

        assert_eq!(
            decode_interaction(&payload.to_string()).expect("decoded"),
            InteractionEvent::SubmitDeletePrompt {
                context: ctx(),
                prompt_id: 17,
                confirmation: Some("YES".to_owned()),
            }
        );
    }

    #[test]
    fn events_api_bodies_decode() {
        let verification = json!({"type": "url_verification", "challenge": "abc"}).to_string();
        assert_eq!(
            decode_event(&verification).expect("decoded"),
            SlackEvent::UrlVerification { challenge: "abc".to_owned() }
        );

        let opened = json!({
            "type": "event_callback",
            "team_id": "T1",
            "event": {"type": "app_home_opened", "user": "U1", "tab": "home"}
        });
        assert_eq!(decode_event(&opened.to_string()).expect("decoded"), SlackEvent::AppHomeOpened { context: ctx() });

        let messages = json!({
            "type": "event_callback",
            "team_id": "T1",
            "event": {"type": "app_home_opened", "user": "U1", "tab": "messages"}
        });
        assert!(matches!(decode_event(&messages.to_string()), Ok(SlackEvent::Ignored { .. })));

        let uninstalled = json!({"type": "event_callback", "team_id": "T1", "event": {"type": "app_uninstalled"}});
        assert_eq!(
            decode_event(&uninstalled.to_string()).expect("decoded"),
            SlackEvent::AppUninstalled { workspace: "T1".to_owned() }
        );
        assert!(matches!(decode_event("{not json"), Err(DecodeError::Json(_))));
    }
}
