//! App Home tabs and the modals they open.

use std::collections::BTreeSet;

use tally_core::digest::{CohortKey, PeriodStats};
use tally_core::{FeedbackFilter, FeedbackRecord, IssueReport, RegisteredPrompt, WorkspaceSettings};

use crate::actions::{
    HomeTab, StatsPeriod, CLEAR_CHANNEL, CLEAR_FILTERS, DELETE_CONFIRM_BLOCK, DELETE_CONFIRM_INPUT,
    DELETE_PROMPT_CALLBACK, HOME_STATS_30D, HOME_STATS_7D, HOME_SUPPORT, LINK_WORKSPACE,
    MODAL_COMMENTS, MODAL_DELETE_PROMPT, MODAL_STATS_30D, MODAL_STATS_7D, MODAL_TOP_ISSUES,
    REPORT_DESCRIPTION_BLOCK, REPORT_DESCRIPTION_INPUT, REPORT_EMAIL_BLOCK, REPORT_EMAIL_INPUT,
    REPORT_MODAL_CALLBACK, ROTATE_API_KEY, SELECT_CATEGORY, SELECT_ORIGIN, SELECT_PROMPT,
    SELECT_THUMB, SET_CHANNEL, VIEW_TEST_DATA,
};
use crate::blocks::{
    Block, ButtonElement, ButtonStyle, ConfirmDialog, InputElement, MessageBuilder, SelectOption,
    TextObject, View,
};
use crate::digest::stats_line;

pub const LATEST_COMMENTS_LIMIT: usize = 10;
pub const TEST_DATA_LIMIT: u32 = 10;
/// Typed into the delete-prompt modal to confirm.
pub const DELETE_CONFIRMATION: &str = "YES";
/// Slack caps static select menus at 100 options.
const MAX_SELECT_OPTIONS: usize = 100;

/// What the explore view shows for one user's filter selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExploreSnapshot {
    pub origins: Vec<String>,
    pub categories: Vec<String>,
    pub prompts: Vec<String>,
    pub filter: FeedbackFilter,
    pub feedback_count: usize,
    pub comment_count: usize,
    pub latest_comments: Vec<FeedbackRecord>,
}

impl ExploreSnapshot {
    /// Builds the snapshot from every record in the explore window.
    /// Selections that no longer match any record are dropped.
    pub fn build(records: &[FeedbackRecord], filter: &FeedbackFilter) -> Self {
        let origins = distinct(records.iter().map(|record| record.origin.as_str()));
        let categories = distinct(records.iter().map(|record| record.category.as_str()));
        let prompts = distinct(records.iter().map(|record| record.prompt.as_str()));

        let keep = |selected: &Option<String>, values: &[String]| {
            selected.clone().filter(|value| values.contains(value))
        };
        let filter = FeedbackFilter {
            origin: keep(&filter.origin, &origins),
            category: keep(&filter.category, &categories),
            prompt: keep(&filter.prompt, &prompts),
            thumb_up: filter.thumb_up,
        };

        let matching: Vec<&FeedbackRecord> =
            records.iter().filter(|record| filter.matches(record)).collect();
        let mut commented: Vec<&FeedbackRecord> =
            matching.iter().copied().filter(|record| record.has_comment()).collect();
        commented.sort_by(|left, right| right.created_at.cmp(&left.created_at));

        Self {
            feedback_count: matching.len(),
            comment_count: commented.len(),
            latest_comments: commented.into_iter().take(LATEST_COMMENTS_LIMIT).cloned().collect(),
            origins,
            categories,
            prompts,
            filter,
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|value| !value.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .take(MAX_SELECT_OPTIONS)
        .map(str::to_owned)
        .collect()
}

fn options(values: &[String]) -> Vec<SelectOption> {
    values.iter().map(|value| SelectOption::new(value.clone(), value.clone())).collect()
}

fn thumb_value(thumb_up: Option<bool>) -> Option<&'static str> {
    thumb_up.map(|up| if up { "up" } else { "down" })
}

/// Tab buttons shared by every App Home tab, current tab highlighted.
fn navigation(builder: MessageBuilder, current: HomeTab) -> MessageBuilder {
    builder.actions("home_nav", |actions| {
        for (tab, label) in [
            (HomeTab::Explore, "Explore Feedback"),
            (HomeTab::Prompts, "Prompts"),
            (HomeTab::Settings, "Settings"),
        ] {
            let button = ButtonElement::new(tab.action_id(), label);
            actions.button(if tab == current { button.style(ButtonStyle::Primary) } else { button });
        }
        actions.button(ButtonElement::new(HOME_SUPPORT, "Support"));
    })
}

fn prompt_text(prompt: &RegisteredPrompt) -> String {
    format!("Origin: {}\nCategory: {}\n\n>_{}_", prompt.origin, prompt.category, prompt.prompt)
}

pub fn explore_home(snapshot: &ExploreSnapshot) -> View {
    let filter = &snapshot.filter;
    let message = navigation(MessageBuilder::new("Explore Feedback"), HomeTab::Explore)
        .spacer()
        .divider()
        .header("Filters  🔎")
        .actions("explore_filters", |actions| {
            actions
                .select(SELECT_ORIGIN, "Origin", options(&snapshot.origins), filter.origin.as_deref())
                .select(
                    SELECT_CATEGORY,
                    "Category",
                    options(&snapshot.categories),
                    filter.category.as_deref(),
                )
                .select(SELECT_PROMPT, "Prompt", options(&snapshot.prompts), filter.prompt.as_deref())
                .select(
                    SELECT_THUMB,
                    "Thumb",
                    vec![SelectOption::new("👍", "up"), SelectOption::new("👎", "down")],
                    thumb_value(filter.thumb_up),
                )
                .button(ButtonElement::new(CLEAR_FILTERS, "Clear").style(ButtonStyle::Danger));
        })
        .context(|context| {
            context.mrkdwn(format!(
                "*{}* feedback items, *{}* comments in the last 30 days",
                snapshot.feedback_count, snapshot.comment_count
            ));
        })
        .actions("explore_stats", |actions| {
            actions
                .button(ButtonElement::new(HOME_STATS_7D, "7-Day Stats"))
                .button(ButtonElement::new(HOME_STATS_30D, "30-Day Stats"));
        })
        .divider()
        .header("Latest Comments  💬")
        .extend(comment_blocks(&snapshot.latest_comments))
        .build();

    View::home(message.blocks)
}

fn comment_blocks(records: &[FeedbackRecord]) -> Vec<Block> {
    if records.is_empty() {
        return vec![Block::Section {
            block_id: None,
            text: TextObject::plain("No comments to display"),
        }];
    }
    records
        .iter()
        .flat_map(|record| {
            let thumb = if record.thumb_up { "👍" } else { "👎" };
            [
                Block::Context {
                    elements: vec![TextObject::mrkdwn(format!(
                        "{thumb}  *{}* / {} / _{}_  ·  {}",
                        record.origin,
                        record.category,
                        record.prompt,
                        record.created_at.format("%Y-%m-%d %H:%M")
                    ))],
                },
                Block::quote(record.comment.clone().unwrap_or_default()),
            ]
        })
        .collect()
}

pub fn explore_modal() -> View {
    let message = MessageBuilder::new("Explore Feedback")
        .header("Quick Actions  ⚡️")
        .actions("explore_quick_actions", |actions| {
            actions
                .button(ButtonElement::new(MODAL_COMMENTS, "Latest Comments"))
                .button(ButtonElement::new(MODAL_TOP_ISSUES, "Top Issues"))
                .button(ButtonElement::new(MODAL_STATS_7D, "7-Day Stats"))
                .button(ButtonElement::new(MODAL_STATS_30D, "30-Day Stats"));
        })
        .spacer()
        .context(|context| {
            context.mrkdwn("_Open the app's Home tab to filter feedback by origin, category and prompt._");
        })
        .build();

    View::modal("explore_modal", "Explore Feedback", message.blocks)
}

pub fn report_modal() -> View {
    let blocks = vec![
        Block::Input {
            block_id: REPORT_DESCRIPTION_BLOCK.to_owned(),
            label: TextObject::plain("Issue Description"),
            element: InputElement::PlainTextInput {
                action_id: REPORT_DESCRIPTION_INPUT.to_owned(),
                multiline: true,
                placeholder: Some(TextObject::plain("Pour your heart out")),
            },
            optional: false,
            dispatch_action: false,
        },
        Block::Input {
            block_id: REPORT_EMAIL_BLOCK.to_owned(),
            label: TextObject::plain("Email"),
            element: InputElement::EmailTextInput {
                action_id: REPORT_EMAIL_INPUT.to_owned(),
                placeholder: Some(TextObject::plain("Let us take care of you")),
            },
            optional: true,
            dispatch_action: false,
        },
    ];

    View::modal(REPORT_MODAL_CALLBACK, "Report an Issue  🛠️", blocks).with_submit("Submit")
}

/// Numbers each blank-line separated paragraph of a report.
pub fn number_paragraphs(report: &str) -> String {
    report
        .split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .enumerate()
        .map(|(index, paragraph)| format!("{}. {paragraph}", index + 1))
        .collect::<Vec<_>>()
        .join("\n\n\n")
}

pub fn top_issues_modal(reports: &[IssueReport]) -> View {
    let mut builder = MessageBuilder::new("Top Issues");
    if reports.is_empty() {
        builder = builder
            .spacer()
            .section(|section| {
                section.plain("No issues to display");
            })
            .spacer();
    } else {
        builder = builder
            .context(|context| {
                context.mrkdwn("_Issues are based on feedback gathered during the last 30 days._");
            })
            .spacer();
        for (index, report) in reports.iter().enumerate() {
            builder = builder
                .header(report.origin.clone())
                .section(|section| {
                    section.mrkdwn(number_paragraphs(&report.report));
                })
                .spacer();
            if index + 1 < reports.len() {
                builder = builder.divider();
            }
        }
    }

    View::modal("top_issues_modal", "Top Issues ❗️", builder.build().blocks)
}

pub fn latest_comments_modal(records: &[FeedbackRecord]) -> View {
    View::modal("latest_comments_modal", "Latest Comments", comment_blocks(records))
}

pub fn report_received_modal() -> View {
    let message = MessageBuilder::new("Report received")
        .section(|section| {
            section.mrkdwn("Thanks! Your report has been received.");
        })
        .build();
    View::modal("report_received_modal", "Report an Issue  🛠️", message.blocks)
}

pub fn prompts_home(prompts: &[RegisteredPrompt], limit: u32) -> View {
    let mut builder = navigation(MessageBuilder::new("Prompts"), HomeTab::Prompts)
        .spacer()
        .divider()
        .header("Prompts  🙌")
        .spacer()
        .context(|context| {
            context.mrkdwn(format!("_{}/{limit} prompts in use_", prompts.len()));
        })
        .spacer()
        .divider();

    if prompts.is_empty() {
        builder = builder
            .spacer()
            .section(|section| {
                section.mrkdwn("_No prompts to display_");
            })
            .spacer();
    }
    for (index, prompt) in prompts.iter().enumerate() {
        builder = builder
            .section(|section| {
                section.mrkdwn(prompt_text(prompt));
            })
            .actions(format!("prompt_{}", prompt.id), |actions| {
                actions.button(
                    ButtonElement::new(MODAL_DELETE_PROMPT, "Delete").value(prompt.id.to_string()),
                );
            });
        if index + 1 < prompts.len() {
            builder = builder.divider();
        }
    }

    View::home(builder.build().blocks)
}

pub fn settings_home(settings: &WorkspaceSettings) -> View {
    let channel = settings.channel.as_deref();
    let message = navigation(MessageBuilder::new("Settings"), HomeTab::Settings)
        .spacer()
        .divider()
        .header("Output Channel  📢")
        .spacer()
        .section(|section| {
            section.plain("Select the channel where digests are sent:");
        })
        .actions("settings_channel", |actions| {
            actions.channel_select(SET_CHANNEL, "Select a channel", channel);
            if let Some(channel) = channel {
                actions.button(ButtonElement::new(CLEAR_CHANNEL, "Clear").value(channel).confirm(
                    ConfirmDialog::new(
                        "Clear Output Channel?",
                        "No digests are delivered without an output channel. Clear it anyway?",
                        "Clear",
                    ),
                ));
            }
        })
        .context(|context| {
            context.mrkdwn("_The app must be invited to the channel (use Slack's /invite command)._");
        })
        .spacer()
        .header("API Key  🔑")
        .spacer()
        .section(|section| {
            section.plain(format!("Your current API key: {}", settings.api_key));
        })
        .actions("settings_api_key", |actions| {
            actions.button(ButtonElement::new(ROTATE_API_KEY, "Rotate API Key").confirm(
                ConfirmDialog::new(
                    "Rotate API Key?",
                    "The current key stops working immediately and a new one is generated.",
                    "Rotate",
                ),
            ));
        })
        .spacer()
        .header("Test Data  ⚗️")
        .spacer()
        .section(|section| {
            section.plain("View feedback data with in_production = false:");
        })
        .actions("settings_test_data", |actions| {
            actions.button(ButtonElement::new(VIEW_TEST_DATA, "View Test Data"));
        })
        .build();

    View::home(message.blocks)
}

/// Shown until the workspace is linked to an active account.
pub fn welcome_home() -> View {
    let message = MessageBuilder::new("Welcome")
        .header("Welcome  🎉")
        .spacer()
        .section(|section| {
            section.plain(
                "To get started, link your Slack workspace to your Tally account. \
                 Submit the activation code from your welcome email and you are good to go.",
            );
        })
        .extend([Block::Input {
            block_id: "link_workspace".to_owned(),
            label: TextObject::plain(" "),
            element: InputElement::PlainTextInput {
                action_id: LINK_WORKSPACE.to_owned(),
                multiline: false,
                placeholder: Some(TextObject::plain("Activation code")),
            },
            optional: false,
            dispatch_action: true,
        }])
        .build();

    View::home(message.blocks)
}

pub fn delete_prompt_modal(prompt: &RegisteredPrompt) -> View {
    let message = MessageBuilder::new("Delete Prompt")
        .section(|section| {
            section.plain(
                "You are about to delete the following prompt and ALL RELATED FEEDBACK DATA. \
                 This cannot be undone.",
            );
        })
        .spacer()
        .divider()
        .spacer()
        .section(|section| {
            section.mrkdwn(prompt_text(prompt));
        })
        .spacer()
        .divider()
        .extend([Block::Input {
            block_id: DELETE_CONFIRM_BLOCK.to_owned(),
            label: TextObject::plain(format!("Type '{DELETE_CONFIRMATION}' to proceed")),
            element: InputElement::PlainTextInput {
                action_id: DELETE_CONFIRM_INPUT.to_owned(),
                multiline: false,
                placeholder: Some(TextObject::plain(DELETE_CONFIRMATION)),
            },
            optional: false,
            dispatch_action: false,
        }])
        .build();

    View::modal(DELETE_PROMPT_CALLBACK, "Delete Prompt?  🛑", message.blocks)
        .with_metadata(prompt.id.to_string())
        .with_submit("Delete")
}

fn notice_modal(callback_id: &str, title: &str, text: &str) -> View {
    let message = MessageBuilder::new(title)
        .section(|section| {
            section.plain(text);
        })
        .build();
    View::modal(callback_id, title, message.blocks)
}

pub fn prompt_deleted_modal() -> View {
    notice_modal(
        "prompt_deleted_modal",
        "Done  ✅",
        "The prompt and all related feedback were deleted.",
    )
}

pub fn prompt_delete_failed_modal() -> View {
    notice_modal(
        "prompt_delete_failed_modal",
        "Ouch  🤕",
        "The prompt could not be deleted. Please try again and contact support if it keeps failing.",
    )
}

pub fn prompt_delete_unconfirmed_modal() -> View {
    notice_modal(
        "prompt_delete_unconfirmed_modal",
        "Confirmation Required  🤖",
        "You must type 'YES' to confirm deletion. The prompt and its feedback were NOT deleted.",
    )
}

pub fn test_data_modal(records: &[FeedbackRecord]) -> View {
    let mut builder = MessageBuilder::new("Test Data");
    if records.is_empty() {
        builder = builder
            .spacer()
            .section(|section| {
                section.plain("No data to display");
            })
            .spacer();
    } else {
        builder = builder
            .context(|context| {
                context.mrkdwn(format!(
                    "_Only the {TEST_DATA_LIMIT} most recent events are shown._"
                ));
            })
            .spacer();
    }
    for (index, record) in records.iter().enumerate() {
        builder = builder
            .section(|section| {
                section.mrkdwn(format!(
                    "origin: `{}`\ncategory: `{}`\nprompt: `{}`\nthumb_up: `{}`\ncomment: {}\nuser_id: `{}`",
                    record.origin,
                    record.category,
                    record.prompt,
                    record.thumb_up,
                    record.comment.as_deref().unwrap_or(" "),
                    record.user_id,
                ));
            })
            .context(|context| {
                context.mrkdwn(format!("Sent {} UTC", record.created_at.format("%Y-%m-%d %H:%M")));
            });
        if index + 1 < records.len() {
            builder = builder.spacer().divider();
        }
    }

    View::modal("test_data_modal", "Test Data", builder.build().blocks)
}

/// Stats per prompt cohort, grouped under an origin header. `rows` must be in
/// cohort order.
pub fn stats_modal(period: StatsPeriod, rows: &[(CohortKey, PeriodStats)]) -> View {
    let mut builder = MessageBuilder::new(period.title());
    if rows.is_empty() {
        builder = builder
            .spacer()
            .section(|section| {
                section.plain("No stats to display");
            })
            .spacer();
    }

    let mut last_origin: Option<&str> = None;
    let mut last_category: Option<&str> = None;
    for (key, stats) in rows {
        if last_origin != Some(key.origin.as_str()) {
            builder = builder.header(key.origin.clone()).spacer().divider();
            last_origin = Some(key.origin.as_str());
            last_category = None;
        }
        let text = if last_category == Some(key.category()) {
            format!("_{}_\n{}", key.prompt(), stats_line(stats))
        } else {
            format!("*{}*\n_{}_\n{}", key.category(), key.prompt(), stats_line(stats))
        };
        last_category = Some(key.category());
        builder = builder.section(|section| {
            section.mrkdwn(text);
        });
    }

    View::modal("stats_modal", period.title(), builder.build().blocks)
}
