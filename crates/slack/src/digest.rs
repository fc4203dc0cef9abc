//! Block Kit layout for cadence digests.
//!
//! Rendering is pure: the same [`WorkspaceDigest`] always yields the same
//! blocks. Entries are rendered in cohort order regardless of input order.

use tally_core::digest::{DigestEntry, PeriodStats, WorkspaceDigest};
use tally_core::Cadence;

use crate::blocks::{ButtonElement, ButtonStyle, MessageBuilder, MessageTemplate};

pub const EXPLORE_FEEDBACK_ACTION: &str = "explore_feedback";
pub const REPORT_ISSUE_ACTION: &str = "report_issue";
pub const DIGEST_FOOTER_BLOCK: &str = "digest_footer";

pub fn digest_title(cadence: Cadence) -> &'static str {
    match cadence {
        Cadence::Daily => "Daily Digest ☀️",
        Cadence::Weekly => "Weekly Digest 🚀",
        Cadence::Monthly => "Monthly Digest 🌙",
        Cadence::Quarterly => "Quarterly Digest 📊",
    }
}

pub fn stats_line(stats: &PeriodStats) -> String {
    format!(
        "👍 {}% ({}%)   👋 {} ({}%)   💬 {} ({}%)",
        stats.rounded_approval(),
        stats.approval_delta,
        stats.response_count,
        stats.response_delta,
        stats.comment_count,
        stats.comment_delta,
    )
}

pub fn digest_message(digest: &WorkspaceDigest) -> MessageTemplate {
    let title = digest_title(digest.cadence);
    let entries = digest.sorted_entries();

    let builder = MessageBuilder::new(title)
        .header(title)
        .maybe(digest.period_label.as_deref(), |builder, label| {
            builder.section(|section| {
                section.mrkdwn(format!("*{label}*"));
            })
        });

    let builder = match digest.cadence {
        Cadence::Daily => daily_body(builder, &entries),
        Cadence::Weekly => weekly_body(builder, &entries),
        Cadence::Monthly => monthly_body(builder, &entries),
        Cadence::Quarterly => quarterly_body(builder, &entries),
    };

    footer(builder).build()
}

/// Workspaces without new comments get no daily digest, so `entries` is
/// never empty here.
fn daily_body(mut builder: MessageBuilder, entries: &[&DigestEntry]) -> MessageBuilder {
    let mut current_origin: Option<&str> = None;
    for entry in entries {
        if current_origin != Some(entry.key.origin.as_str()) {
            current_origin = Some(entry.key.origin.as_str());
            builder = builder.spacer().header(entry.key.origin.clone());
        }
        let noun = if entry.comment_count == 1 { "comment" } else { "comments" };
        builder = builder
            .section(|section| {
                section.mrkdwn(format!(
                    "*{}* / _{}_ ({} new {noun})",
                    entry.key.category(),
                    entry.key.prompt(),
                    entry.comment_count
                ));
            })
            .quote(entry.summary.clone());
    }
    builder
}

fn weekly_body(mut builder: MessageBuilder, entries: &[&DigestEntry]) -> MessageBuilder {
    let mut current_origin: Option<&str> = None;
    let mut current_category: Option<&str> = None;
    for entry in entries {
        if current_origin != Some(entry.key.origin.as_str()) {
            current_origin = Some(entry.key.origin.as_str());
            current_category = None;
            builder = builder.spacer().header(entry.key.origin.clone());
        }
        if current_category != Some(entry.key.category()) {
            current_category = Some(entry.key.category());
            builder = builder.section(|section| {
                section.mrkdwn(format!("*{}*", entry.key.category()));
            });
        }
        builder = builder
            .section(|section| {
                section.mrkdwn(format!("_{}_\n{}", entry.key.prompt(), stats_text(entry)));
            })
            .quote(entry.summary.clone());
    }
    builder
}

fn monthly_body(mut builder: MessageBuilder, entries: &[&DigestEntry]) -> MessageBuilder {
    let mut current_origin: Option<&str> = None;
    for entry in entries {
        if current_origin != Some(entry.key.origin.as_str()) {
            current_origin = Some(entry.key.origin.as_str());
            builder = builder.spacer().header(entry.key.origin.clone());
        }
        builder = builder
            .section(|section| {
                section.mrkdwn(format!("*{}*\n{}", entry.key.category(), stats_text(entry)));
            })
            .quote(entry.summary.clone())
            .maybe(entry.chart_url.as_deref(), |builder, url| {
                builder.image(url, entry.key.to_string())
            });
    }
    builder
}

fn quarterly_body(mut builder: MessageBuilder, entries: &[&DigestEntry]) -> MessageBuilder {
    for entry in entries {
        builder = builder
            .spacer()
            .header(entry.key.origin.clone())
            .maybe(entry.chart_url.as_deref(), |builder, url| {
                builder.image(url, entry.key.to_string())
            })
            .section(|section| {
                section.mrkdwn(stats_text(entry));
            })
            .quote(entry.summary.clone());
    }
    builder
}

fn stats_text(entry: &DigestEntry) -> String {
    entry.stats.as_ref().map(stats_line).unwrap_or_default()
}

fn footer(builder: MessageBuilder) -> MessageBuilder {
    builder.divider().actions(DIGEST_FOOTER_BLOCK, |actions| {
        actions
            .button(
                ButtonElement::new(EXPLORE_FEEDBACK_ACTION, "Explore Feedback")
                    .style(ButtonStyle::Primary),
            )
            .button(ButtonElement::new(REPORT_ISSUE_ACTION, "Report an Issue"));
    })
}
