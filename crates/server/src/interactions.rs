//! `POST /slack/interactions` and `POST /slack/events`: App Home tabs,
//! workspace settings, prompt management and issue reports.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::Duration;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tally_core::digest::{group_by_cohort, CohortKey, Granularity, PeriodStats};
use tally_core::domain::account::new_api_key;
use tally_core::{DateWindow, FeedbackFilter, FeedbackRecord};
use tally_db::{AccountRepository, FeedbackRepository, InstallationRepository, RepositoryError};
use tally_slack::blocks::View;
use tally_slack::home::{
    delete_prompt_modal, explore_home, explore_modal, latest_comments_modal,
    prompt_delete_failed_modal, prompt_delete_unconfirmed_modal, prompt_deleted_modal, prompts_home,
    report_modal, report_received_modal, settings_home, stats_modal, test_data_modal,
    top_issues_modal, welcome_home, ExploreSnapshot, DELETE_CONFIRMATION, TEST_DATA_LIMIT,
};
use tally_slack::{
    decode_event, decode_interaction, FilterChange, HomeTab, InteractionContext, InteractionEvent,
    SlackApiError, SlackEvent, SlackWebClient, StatsPeriod,
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::app::ErrorBody;
use crate::filter_state::{Clock, FilterStateStore};
use crate::refresh::{HomeRefresher, RefreshHandle, RefreshRequest};

pub const EXPLORE_WINDOW_DAYS: i64 = 30;
const API_KEY_ATTEMPTS: usize = 5;
const GENERIC_FAILURE: &str = "Failed to handle action";

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("no bot token installed for workspace `{0}`")]
    MissingInstallation(String),
    #[error("prompt {prompt_id} does not exist in workspace `{workspace}`")]
    UnknownPrompt { workspace: String, prompt_id: i64 },
    #[error("no unused api key after {0} attempts")]
    ApiKeyExhausted(usize),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Slack(#[from] SlackApiError),
}

/// The Slack view calls the interaction flows need.
#[async_trait]
pub trait ViewSurface: Send + Sync {
    async fn publish_home(
        &self,
        token: &SecretString,
        user_id: &str,
        view: &View,
    ) -> Result<(), SlackApiError>;

    async fn open_modal(
        &self,
        token: &SecretString,
        trigger_id: &str,
        view: &View,
    ) -> Result<(), SlackApiError>;

    async fn push_modal(
        &self,
        token: &SecretString,
        trigger_id: &str,
        view: &View,
    ) -> Result<(), SlackApiError>;
}

#[async_trait]
impl ViewSurface for SlackWebClient {
    async fn publish_home(
        &self,
        token: &SecretString,
        user_id: &str,
        view: &View,
    ) -> Result<(), SlackApiError> {
        self.publish_view(token, user_id, view).await
    }

    async fn open_modal(
        &self,
        token: &SecretString,
        trigger_id: &str,
        view: &View,
    ) -> Result<(), SlackApiError> {
        self.open_view(token, trigger_id, view).await
    }

    async fn push_modal(
        &self,
        token: &SecretString,
        trigger_id: &str,
        view: &View,
    ) -> Result<(), SlackApiError> {
        self.push_view(token, trigger_id, view).await
    }
}

/// What the endpoint answers Slack with once an event is handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionReply {
    Handled,
    /// Replaces the submitted modal in place.
    UpdateView(View),
    WorkspaceLinked,
    ActivationCodeRejected,
}

impl IntoResponse for InteractionReply {
    fn into_response(self) -> Response {
        match self {
            Self::Handled => {
                (StatusCode::OK, Json(json!({ "status": "action handled" }))).into_response()
            }
            Self::UpdateView(view) => {
                (StatusCode::OK, Json(json!({ "response_action": "update", "view": view })))
                    .into_response()
            }
            Self::WorkspaceLinked => {
                (StatusCode::OK, Json(json!({ "status": "workspace linked" }))).into_response()
            }
            Self::ActivationCodeRejected => (
                StatusCode::NOT_FOUND,
                Json(ErrorBody::new("activation code not found or already used")),
            )
                .into_response(),
        }
    }
}

/// Everything the App Home flows read and write.
pub struct AppHomeService {
    pub feedback: Arc<dyn FeedbackRepository>,
    pub accounts: Arc<dyn AccountRepository>,
    pub installations: Arc<dyn InstallationRepository>,
    pub filters: Arc<dyn FilterStateStore>,
    pub views: Arc<dyn ViewSurface>,
    pub clock: Arc<dyn Clock>,
    /// Shown on the prompts tab as the workspace's allowance.
    pub prompt_limit: u32,
}

impl AppHomeService {
    pub async fn handle(
        &self,
        event: &InteractionEvent,
        refresh: &RefreshHandle,
    ) -> Result<InteractionReply, InteractionError> {
        let show = |context: &InteractionContext, tab| {
            refresh.enqueue(RefreshRequest::new(context.clone(), tab));
        };

        match event {
            InteractionEvent::OpenExplore { context, trigger_id } => {
                let token = self.bot_token(&context.workspace).await?;
                self.views.open_modal(&token, trigger_id, &explore_modal()).await?;
            }
            InteractionEvent::OpenReport { context, trigger_id } => {
                let token = self.bot_token(&context.workspace).await?;
                self.views.open_modal(&token, trigger_id, &report_modal()).await?;
            }
            InteractionEvent::ShowTopIssues { context, trigger_id } => {
                let reports = self.feedback.issue_reports(&context.workspace).await?;
                let token = self.bot_token(&context.workspace).await?;
                self.views.push_modal(&token, trigger_id, &top_issues_modal(&reports)).await?;
            }
            InteractionEvent::ShowLatestComments { context, trigger_id } => {
                let snapshot = self.snapshot(context).await?;
                let token = self.bot_token(&context.workspace).await?;
                let view = latest_comments_modal(&snapshot.latest_comments);
                self.views.push_modal(&token, trigger_id, &view).await?;
            }
            InteractionEvent::ShowStats { context, trigger_id, period, stacked } => {
                let rows = self.period_stats(&context.workspace, *period).await?;
                let token = self.bot_token(&context.workspace).await?;
                let view = stats_modal(*period, &rows);
                if *stacked {
                    self.views.push_modal(&token, trigger_id, &view).await?;
                } else {
                    self.views.open_modal(&token, trigger_id, &view).await?;
                }
            }
            InteractionEvent::ShowTab { context, tab } => show(context, *tab),
            InteractionEvent::UpdateFilter { context, change } => {
                self.update_filter(context, change).await;
                show(context, HomeTab::Explore);
            }
            InteractionEvent::SubmitReport { context, description, email } => {
                info!(
                    event_name = "server.report.received",
                    workspace = %context.workspace,
                    user_id = %context.user_id,
                    description_chars = description.chars().count(),
                    has_email = email.is_some(),
                    "issue report submitted"
                );
                return Ok(InteractionReply::UpdateView(report_received_modal()));
            }
            InteractionEvent::LinkWorkspace { context, activation_code } => {
                if !self.accounts.link_workspace(activation_code, &context.workspace).await? {
                    return Ok(InteractionReply::ActivationCodeRejected);
                }
                info!(
                    event_name = "server.workspace.linked",
                    workspace = %context.workspace,
                    user_id = %context.user_id,
                    "workspace linked to account"
                );
                show(context, HomeTab::Settings);
                return Ok(InteractionReply::WorkspaceLinked);
            }
            InteractionEvent::SetChannel { context, channel } => {
                self.accounts.set_channel(&context.workspace, channel.as_deref()).await?;
                show(context, HomeTab::Settings);
            }
            InteractionEvent::RotateApiKey { context } => {
                let api_key = self.unused_api_key().await?;
                self.accounts.rotate_api_key(&context.workspace, &api_key).await?;
                info!(
                    event_name = "server.api_key.rotated",
                    workspace = %context.workspace,
                    user_id = %context.user_id,
                    "api key rotated"
                );
                show(context, HomeTab::Settings);
            }
            InteractionEvent::ShowTestData { context, trigger_id } => {
                let records =
                    self.feedback.test_feedback(&context.workspace, TEST_DATA_LIMIT).await?;
                let token = self.bot_token(&context.workspace).await?;
                self.views.open_modal(&token, trigger_id, &test_data_modal(&records)).await?;
            }
            InteractionEvent::OpenDeletePrompt { context, trigger_id, prompt_id } => {
                let prompt = self.feedback.prompt(&context.workspace, *prompt_id).await?.ok_or_else(
                    || InteractionError::UnknownPrompt {
                        workspace: context.workspace.clone(),
                        prompt_id: *prompt_id,
                    },
                )?;
                let token = self.bot_token(&context.workspace).await?;
                self.views.open_modal(&token, trigger_id, &delete_prompt_modal(&prompt)).await?;
            }
            InteractionEvent::SubmitDeletePrompt { context, prompt_id, confirmation } => {
                if confirmation.as_deref() != Some(DELETE_CONFIRMATION) {
                    return Ok(InteractionReply::UpdateView(prompt_delete_unconfirmed_modal()));
                }
                let view = match self.feedback.delete_prompt(&context.workspace, *prompt_id).await {
                    Ok(true) => {
                        info!(
                            event_name = "server.prompt.deleted",
                            workspace = %context.workspace,
                            user_id = %context.user_id,
                            prompt_id,
                            "prompt and its feedback deleted"
                        );
                        show(context, HomeTab::Prompts);
                        prompt_deleted_modal()
                    }
                    Ok(false) => {
                        warn!(
                            event_name = "server.prompt.delete_missing",
                            workspace = %context.workspace,
                            prompt_id,
                            "prompt to delete does not exist"
                        );
                        prompt_delete_failed_modal()
                    }
                    Err(failure) => {
                        error!(
                            event_name = "server.prompt.delete_failed",
                            workspace = %context.workspace,
                            prompt_id,
                            error = %failure,
                            "prompt deletion failed"
                        );
                        prompt_delete_failed_modal()
                    }
                };
                return Ok(InteractionReply::UpdateView(view));
            }
        }
        Ok(InteractionReply::Handled)
    }

    /// Re-renders and publishes one App Home tab. Workspaces without an
    /// active account see the welcome view whatever tab was asked for.
    pub async fn publish_home(&self, request: &RefreshRequest) -> Result<(), InteractionError> {
        let context = &request.context;
        let token = self.bot_token(&context.workspace).await?;
        let settings = self
            .accounts
            .workspace_settings(&context.workspace)
            .await?
            .filter(|settings| settings.is_active(self.clock.now()));

        let view = match (settings, request.tab) {
            (None, _) => welcome_home(),
            (Some(_), HomeTab::Explore) => {
                let snapshot = self.snapshot(context).await?;
                self.filters.put(&context.state_key(), snapshot.filter.clone()).await;
                explore_home(&snapshot)
            }
            (Some(_), HomeTab::Prompts) => {
                let prompts = self.feedback.prompts(&context.workspace).await?;
                prompts_home(&prompts, self.prompt_limit)
            }
            (Some(settings), HomeTab::Settings) => settings_home(&settings),
        };
        self.views.publish_home(&token, &context.user_id, &view).await?;
        Ok(())
    }

    async fn update_filter(&self, context: &InteractionContext, change: &FilterChange) {
        let key = context.state_key();
        let mut filter = self.filters.get(&key).await.unwrap_or_default();
        change.apply(&mut filter);
        self.filters.put(&key, filter).await;
    }

    async fn snapshot(&self, context: &InteractionContext) -> Result<ExploreSnapshot, InteractionError> {
        let filter = self.filters.get(&context.state_key()).await.unwrap_or_default();
        let today = self.clock.now().date_naive();
        let window =
            DateWindow::new(today - Duration::days(EXPLORE_WINDOW_DAYS), today + Duration::days(1));
        let records =
            self.feedback.explore(&context.workspace, window, &FeedbackFilter::default()).await?;
        Ok(ExploreSnapshot::build(&records, &filter))
    }

    /// Feedback from the `days` days ending `offset` periods before tomorrow.
    async fn trailing_records(
        &self,
        workspace: &str,
        days: i64,
        offset: i64,
    ) -> Result<Vec<FeedbackRecord>, InteractionError> {
        let end = self.clock.now().date_naive() + Duration::days(1) - Duration::days(days * offset);
        let window = DateWindow::new(end - Duration::days(days), end);
        Ok(self.feedback.explore(workspace, window, &FeedbackFilter::default()).await?)
    }

    /// Per-prompt stats for the period against the period before it, for
    /// prompts with feedback in the current period.
    async fn period_stats(
        &self,
        workspace: &str,
        period: StatsPeriod,
    ) -> Result<Vec<(CohortKey, PeriodStats)>, InteractionError> {
        let current = self.trailing_records(workspace, period.days(), 0).await?;
        let previous = self.trailing_records(workspace, period.days(), 1).await?;
        let mut previous = group_by_cohort(previous, Granularity::OriginCategoryPrompt);

        Ok(group_by_cohort(current, Granularity::OriginCategoryPrompt)
            .into_iter()
            .map(|(key, rows)| {
                let before = previous.remove(&key).unwrap_or_default();
                let stats = PeriodStats::compute(&rows, &before);
                (key, stats)
            })
            .collect())
    }

    async fn unused_api_key(&self) -> Result<String, InteractionError> {
        for _ in 0..API_KEY_ATTEMPTS {
            let candidate = new_api_key();
            if self.accounts.find_by_api_key(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(InteractionError::ApiKeyExhausted(API_KEY_ATTEMPTS))
    }

    async fn bot_token(&self, workspace: &str) -> Result<SecretString, InteractionError> {
        self.installations
            .bot_token(workspace)
            .await?
            .map(SecretString::from)
            .ok_or_else(|| InteractionError::MissingInstallation(workspace.to_owned()))
    }
}

#[async_trait]
impl HomeRefresher for AppHomeService {
    async fn refresh(&self, request: &RefreshRequest) -> Result<(), InteractionError> {
        self.publish_home(request).await
    }
}

#[derive(Clone)]
pub struct InteractionState {
    pub app_home: Arc<AppHomeService>,
    pub refresh: RefreshHandle,
}

#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

pub async fn handle_interaction(
    State(state): State<InteractionState>,
    Form(form): Form<InteractionForm>,
) -> Response {
    let event = match decode_interaction(&form.payload) {
        Ok(event) => event,
        Err(error) => {
            warn!(
                event_name = "server.interaction.rejected",
                error = %error,
                "interaction payload rejected"
            );
            return (StatusCode::BAD_REQUEST, Json(ErrorBody::new(error.to_string())))
                .into_response();
        }
    };

    let context = event.context().clone();
    match state.app_home.handle(&event, &state.refresh).await {
        Ok(reply) => {
            info!(
                event_name = "server.interaction.handled",
                action = event.name(),
                workspace = %context.workspace,
                user_id = %context.user_id,
                "interaction handled"
            );
            reply.into_response()
        }
        Err(failure) => {
            error!(
                event_name = "server.interaction.failed",
                action = event.name(),
                workspace = %context.workspace,
                user_id = %context.user_id,
                error = %failure,
                "interaction handling failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new(GENERIC_FAILURE)))
                .into_response()
        }
    }
}

/// Events API callbacks. Slack retries anything that is not a 2xx, so only
/// undecodable bodies are rejected.
pub async fn handle_event(State(state): State<InteractionState>, body: String) -> Response {
    let event = match decode_event(&body) {
        Ok(event) => event,
        Err(error) => {
            warn!(event_name = "server.event.rejected", error = %error, "event body rejected");
            return (StatusCode::BAD_REQUEST, Json(ErrorBody::new(error.to_string())))
                .into_response();
        }
    };

    match event {
        SlackEvent::UrlVerification { challenge } => {
            return (StatusCode::OK, Json(json!({ "challenge": challenge }))).into_response();
        }
        SlackEvent::AppHomeOpened { context } => {
            info!(
                event_name = "server.event.app_home_opened",
                workspace = %context.workspace,
                user_id = %context.user_id,
                "app home opened"
            );
            state.refresh.enqueue(RefreshRequest::new(context, HomeTab::Explore));
        }
        SlackEvent::AppUninstalled { workspace } => {
            match state.app_home.installations.remove(&workspace).await {
                Ok(removed) => info!(
                    event_name = "server.event.app_uninstalled",
                    workspace = %workspace,
                    removed,
                    "installation removed"
                ),
                Err(failure) => error!(
                    event_name = "server.event.uninstall_failed",
                    workspace = %workspace,
                    error = %failure,
                    "installation removal failed"
                ),
            }
        }
        SlackEvent::Ignored { kind } => {
            info!(event_name = "server.event.ignored", kind = %kind, "event ignored");
        }
    }
    (StatusCode::OK, Json(json!({ "status": "event handled" }))).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use axum::{body::to_bytes, extract::State, http::StatusCode, Form};
    use chrono::{Duration, TimeZone, Utc};
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::{json, Value};
    use tally_core::FeedbackSubmission;
    use tally_db::{
        connect_with_settings, migrations, AccountRepository, FeedbackRepository,
        InstallationRepository, SqlAccountRepository, SqlFeedbackRepository,
        SqlInstallationRepository,
    };
    use tally_slack::blocks::View;
    use tally_slack::SlackApiError;

    use super::{
        handle_event, handle_interaction, AppHomeService, InteractionForm, InteractionState,
        ViewSurface,
    };
    use crate::feedback::tests::account;
    use crate::filter_state::tests::ManualClock;
    use crate::filter_state::{Clock, FilterStateStore, InMemoryFilterStore};
    use crate::refresh::{LoggingFailureSink, RefreshDispatcher, RefreshStats};

    #[derive(Default)]
    struct RecordingViews {
        calls: Mutex<Vec<(String, String, Value)>>,
    }

    impl RecordingViews {
        fn record(&self, method: &str, token: &SecretString, target: &str, view: &View) {
            assert_eq!(token.expose_secret(), "xoxb-T1");
            let view = serde_json::to_value(view).expect("view serializes");
            self.calls.lock().expect("lock").push((method.to_owned(), target.to_owned(), view));
        }

        fn calls(&self) -> Vec<(String, String, Value)> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl ViewSurface for RecordingViews {
        async fn publish_home(
            &self,
            token: &SecretString,
            user_id: &str,
            view: &View,
        ) -> Result<(), SlackApiError> {
            self.record("views.publish", token, user_id, view);
            Ok(())
        }

        async fn open_modal(
            &self,
            token: &SecretString,
            trigger_id: &str,
            view: &View,
        ) -> Result<(), SlackApiError> {
            self.record("views.open", token, trigger_id, view);
            Ok(())
        }

        async fn push_modal(
            &self,
            token: &SecretString,
            trigger_id: &str,
            view: &View,
        ) -> Result<(), SlackApiError> {
            self.record("views.push", token, trigger_id, view);
            Ok(())
        }
    }

    struct Harness {
        state: InteractionState,
        dispatcher: RefreshDispatcher,
        views: Arc<RecordingViews>,
        filters: Arc<InMemoryFilterStore>,
        clock: Arc<ManualClock>,
    }

    async fn harness(install: bool) -> Harness {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let clock = ManualClock::new();
        let mut owner = account("acc-1", Some("T1"));
        owner.expires_at = clock.now() + Duration::days(335);
        SqlAccountRepository::new(pool.clone()).create(&owner).await.expect("save account");
        if install {
            SqlInstallationRepository::new(pool.clone())
                .save("T1", "xoxb-T1")
                .await
                .expect("install");
        }

        let yesterday = Utc.with_ymd_and_hms(2026, 10, 4, 9, 0, 0).single().expect("valid");
        let feedback = SqlFeedbackRepository::new(pool.clone());
        let rows = [
            (10, "summarize", Some("too long")),
            (20, "translate", None),
            (30, "summarize", Some("great")),
        ];
        for (minutes, prompt, comment) in rows {
            let record = FeedbackSubmission {
                prompt: prompt.to_owned(),
                thumb_up: comment != Some("too long"),
                origin: "docs".to_owned(),
                category: "api".to_owned(),
                in_production: true,
                user_id: "end-user".to_owned(),
                comment: comment.map(str::to_owned),
            }
            .into_record("T1", yesterday + Duration::minutes(minutes));
            feedback.insert("acc-1", &record).await.expect("insert feedback");
        }

        let views = Arc::new(RecordingViews::default());
        let filters = Arc::new(InMemoryFilterStore::new(clock.clone()));
        let app_home = Arc::new(AppHomeService {
            feedback: Arc::new(feedback),
            accounts: Arc::new(SqlAccountRepository::new(pool.clone())),
            installations: Arc::new(SqlInstallationRepository::new(pool)),
            filters: filters.clone(),
            views: views.clone(),
            clock: clock.clone(),
            prompt_limit: 10,
        });
        let dispatcher = RefreshDispatcher::spawn(app_home.clone(), Arc::new(LoggingFailureSink), 8);
        let state = InteractionState { app_home, refresh: dispatcher.handle() };

        Harness { state, dispatcher, views, filters, clock }
    }

    fn block_action(action_id: &str, selected: Option<&str>) -> String {
        let mut action = json!({ "action_id": action_id, "value": action_id });
        if let Some(value) = selected {
            action["selected_option"] = json!({ "value": value });
        }
        json!({
            "type": "block_actions",
            "user": { "id": "U1", "team_id": "T1" },
            "team": { "id": "T1" },
            "trigger_id": "trigger-1",
            "actions": [action],
        })
        .to_string()
    }

    fn raw_action(action: Value) -> String {
        json!({
            "type": "block_actions",
            "user": { "id": "U1", "team_id": "T1" },
            "team": { "id": "T1" },
            "trigger_id": "trigger-1",
            "actions": [action],
        })
        .to_string()
    }

    fn delete_submission(prompt_id: i64, confirmation: &str) -> String {
        json!({
            "type": "view_submission",
            "user": { "id": "U1", "team_id": "T1" },
            "view": {
                "callback_id": "delete-prompt",
                "private_metadata": prompt_id.to_string(),
                "state": { "values": {
                    "delete_confirm": { "delete-confirm": { "type": "plain_text_input", "value": confirmation } }
                } }
            }
        })
        .to_string()
    }

    async fn into_parts(response: axum::response::Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    async fn post(state: &InteractionState, payload: String) -> (StatusCode, Value) {
        into_parts(handle_interaction(State(state.clone()), Form(InteractionForm { payload })).await)
            .await
    }

    async fn post_event(state: &InteractionState, body: Value) -> (StatusCode, Value) {
        into_parts(handle_event(State(state.clone()), body.to_string()).await).await
    }

    #[tokio::test]
    async fn explore_button_opens_the_explore_modal() {
        let harness = harness(true).await;

        let (status, body) = post(&harness.state, block_action("explore_feedback", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "action handled");
        let calls = harness.views.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "views.open");
        assert_eq!(calls[0].1, "trigger-1");
        assert_eq!(calls[0].2["type"], "modal");
    }

    #[tokio::test]
    async fn filter_change_is_stored_and_home_is_republished_in_background() {
        let harness = harness(true).await;

        let (status, _) =
            post(&harness.state, block_action("select-prompt", Some("summarize"))).await;
        assert_eq!(status, StatusCode::OK);

        let stats = harness.dispatcher.shutdown().await;
        assert_eq!(stats, RefreshStats { processed: 1, failed: 0 });

        let stored = harness.filters.get("U1:T1").await.expect("filter stored");
        assert_eq!(stored.prompt.as_deref(), Some("summarize"));

        let calls = harness.views.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "views.publish");
        assert_eq!(calls[0].1, "U1");
        let rendered = calls[0].2.to_string();
        assert!(rendered.contains("*2* feedback items, *2* comments"));
    }

    #[tokio::test]
    async fn latest_comments_are_pushed_newest_first() {
        let harness = harness(true).await;

        let (status, _) = post(&harness.state, block_action("modal-comments", None)).await;
        assert_eq!(status, StatusCode::OK);

        let calls = harness.views.calls();
        assert_eq!(calls[0].0, "views.push");
        let rendered = calls[0].2.to_string();
        let newest = rendered.find("great").expect("newest comment shown");
        let oldest = rendered.find("too long").expect("oldest comment shown");
        assert!(newest < oldest);
    }

    #[tokio::test]
    async fn report_submission_replaces_the_modal() {
        let harness = harness(true).await;
        let payload = json!({
            "type": "view_submission",
            "user": { "id": "U1", "team_id": "T1" },
            "view": {
                "callback_id": "report_issue_modal",
                "state": { "values": {
                    "issue_description": { "message-text": { "type": "plain_text_input", "value": "Digest is empty" } },
                    "issue_email": { "email-address": { "type": "email_text_input", "value": null } }
                } }
            }
        })
        .to_string();

        let (status, body) = post(&harness.state, payload).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response_action"], "update");
        assert_eq!(body["view"]["callback_id"], "report_received_modal");
        assert!(harness.views.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_action_is_a_bad_request() {
        let harness = harness(true).await;

        let (status, body) = post(&harness.state, block_action("delete-everything", None)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error text").contains("delete-everything"));
    }

    #[tokio::test]
    async fn handler_failures_return_a_generic_message() {
        let harness = harness(false).await;

        let (status, body) = post(&harness.state, block_action("report_issue", None)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to handle action");
        assert!(!body.to_string().contains("T1"));
    }

    #[tokio::test]
    async fn activation_code_links_once_and_shows_settings() {
        let harness = harness(true).await;
        let accounts = harness.state.app_home.accounts.clone();
        accounts.create(&account("acc-2", None)).await.expect("save account");
        let link = || raw_action(json!({ "action_id": "link-workspace", "value": "ACT-acc-2" }));

        let (status, body) = post(&harness.state, link()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "workspace linked");

        let (status, body) = post(&harness.state, link()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "activation code not found or already used");

        harness.dispatcher.shutdown().await;
        let calls = harness.views.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "views.publish");
        assert!(calls[0].2.to_string().contains("Your current API key: key-acc-"));
    }

    #[tokio::test]
    async fn channel_selection_is_stored_and_can_be_cleared() {
        let harness = harness(true).await;
        let accounts = harness.state.app_home.accounts.clone();

        let select = raw_action(json!({ "action_id": "set-channel", "selected_channel": "C42" }));
        assert_eq!(post(&harness.state, select).await.0, StatusCode::OK);
        let settings = accounts.workspace_settings("T1").await.expect("query").expect("linked");
        assert_eq!(settings.channel.as_deref(), Some("C42"));

        let clear = raw_action(json!({ "action_id": "clear-channel", "value": "C42" }));
        assert_eq!(post(&harness.state, clear).await.0, StatusCode::OK);
        let settings = accounts.workspace_settings("T1").await.expect("query").expect("linked");
        assert_eq!(settings.channel, None);

        let stats = harness.dispatcher.shutdown().await;
        assert_eq!(stats, RefreshStats { processed: 2, failed: 0 });
        let calls = harness.views.calls();
        assert!(calls.iter().all(|call| call.0 == "views.publish"));
        let latest = calls[1].2.to_string();
        assert!(latest.contains("Output Channel"));
        assert!(!latest.contains("initial_channel"));
    }

    #[tokio::test]
    async fn rotating_the_api_key_retires_the_old_one() {
        let harness = harness(true).await;
        let accounts = harness.state.app_home.accounts.clone();

        let (status, _) = post(&harness.state, block_action("rotate-api-key", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(accounts.find_by_api_key("key-acc-1").await.expect("query").is_none());
        let settings = accounts.workspace_settings("T1").await.expect("query").expect("linked");
        assert!(settings.api_key.starts_with("tally_"));
        assert!(accounts.find_by_api_key(&settings.api_key).await.expect("query").is_some());
    }

    #[tokio::test]
    async fn deleting_a_prompt_requires_yes_and_refreshes_the_prompts_tab() {
        let harness = harness(true).await;
        let feedback = harness.state.app_home.feedback.clone();
        let prompts = feedback.prompts("T1").await.expect("prompts");
        let summarize = prompts.iter().find(|prompt| prompt.prompt == "summarize").expect("registered");

        let open = raw_action(json!({ "action_id": "modal-delete-prompt", "value": summarize.id.to_string() }));
        assert_eq!(post(&harness.state, open).await.0, StatusCode::OK);
        let opened = harness.views.calls();
        assert_eq!(opened[0].0, "views.open");
        assert_eq!(opened[0].2["callback_id"], "delete-prompt");
        assert_eq!(opened[0].2["private_metadata"], summarize.id.to_string());

        let (_, body) = post(&harness.state, delete_submission(summarize.id, "yes")).await;
        assert_eq!(body["view"]["callback_id"], "prompt_delete_unconfirmed_modal");
        assert_eq!(feedback.prompts("T1").await.expect("prompts").len(), 2);

        let (_, body) = post(&harness.state, delete_submission(summarize.id, "YES")).await;
        assert_eq!(body["response_action"], "update");
        assert_eq!(body["view"]["callback_id"], "prompt_deleted_modal");

        let (_, body) = post(&harness.state, delete_submission(summarize.id, "YES")).await;
        assert_eq!(body["view"]["callback_id"], "prompt_delete_failed_modal");

        harness.dispatcher.shutdown().await;
        let published = harness.views.calls().pop().expect("prompts tab published");
        assert_eq!(published.0, "views.publish");
        assert!(published.2.to_string().contains("_1/10 prompts in use_"));
    }

    #[tokio::test]
    async fn deleting_an_unknown_prompt_fails_without_opening_a_modal() {
        let harness = harness(true).await;

        let open = raw_action(json!({ "action_id": "modal-delete-prompt", "value": "999" }));
        let (status, _) = post(&harness.state, open).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(harness.views.calls().is_empty());
    }

    #[tokio::test]
    async fn stats_buttons_open_or_stack_the_stats_modal() {
        let harness = harness(true).await;

        post(&harness.state, block_action("home-stats-7d", None)).await;
        post(&harness.state, block_action("modal-stats-30d", None)).await;

        let calls = harness.views.calls();
        assert_eq!(calls[0].0, "views.open");
        assert_eq!(calls[0].2["title"]["text"], "7-Day Stats");
        let rendered = calls[0].2.to_string();
        assert!(rendered.contains("_summarize_"));
        assert!(rendered.contains("_translate_"));
        assert_eq!(calls[1].0, "views.push");
        assert_eq!(calls[1].2["title"]["text"], "30-Day Stats");
    }

    #[tokio::test]
    async fn test_data_modal_lists_only_non_production_rows() {
        let harness = harness(true).await;

        post(&harness.state, block_action("view-test-data", None)).await;

        let calls = harness.views.calls();
        assert_eq!(calls[0].0, "views.open");
        assert!(calls[0].2.to_string().contains("No data to display"));
    }

    #[tokio::test]
    async fn app_home_opened_shows_welcome_once_the_account_expires() {
        let harness = harness(true).await;
        let opened = json!({
            "type": "event_callback",
            "team_id": "T1",
            "event": { "type": "app_home_opened", "user": "U1", "tab": "home" }
        });

        let (status, body) = post_event(&harness.state, opened.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "event handled");
        // Let the worker publish before the clock moves past expiry.
        while harness.views.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        harness.clock.advance(Duration::days(400));
        post_event(&harness.state, opened).await;

        harness.dispatcher.shutdown().await;
        let calls = harness.views.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].2.to_string().contains("Latest Comments"));
        assert!(calls[1].2.to_string().contains("link-workspace"));
    }

    #[tokio::test]
    async fn events_endpoint_answers_verification_and_uninstalls() {
        let harness = harness(true).await;

        let (status, body) =
            post_event(&harness.state, json!({ "type": "url_verification", "challenge": "c-1" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["challenge"], "c-1");

        let uninstalled = json!({
            "type": "event_callback",
            "team_id": "T1",
            "event": { "type": "app_uninstalled" }
        });
        assert_eq!(post_event(&harness.state, uninstalled).await.0, StatusCode::OK);
        let installations = harness.state.app_home.installations.clone();
        assert_eq!(installations.bot_token("T1").await.expect("query"), None);

        let (status, _) = post_event(&harness.state, json!({ "type": "shortcut" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
