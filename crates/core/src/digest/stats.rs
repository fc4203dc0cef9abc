//! Period-over-period statistics for a cohort.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::domain::cadence::month_start;
use crate::domain::feedback::{FeedbackRecord, MonthlyPoint};

/// Change against the previous period. Empty baselines never produce a number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Delta {
    NotApplicable,
    Change(f64),
}

impl Delta {
    /// Relative change in percent.
    pub fn relative(current: usize, previous: usize) -> Self {
        if previous == 0 {
            return Self::NotApplicable;
        }
        Self::Change(100.0 * (current as f64 - previous as f64) / previous as f64)
    }

    /// Difference in percentage points, gated on the baseline having responses.
    pub fn points(current_pct: f64, previous_pct: f64, previous_responses: usize) -> Self {
        if previous_responses == 0 {
            return Self::NotApplicable;
        }
        Self::Change(current_pct - previous_pct)
    }
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApplicable => f.write_str("–"),
            Self::Change(value) => {
                let rounded = value.round();
                // avoid printing "-0"
                let rounded = if rounded == 0.0 { 0.0 } else { rounded };
                write!(f, "{rounded:+.0}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PeriodStats {
    pub approval_pct: f64,
    pub prev_approval_pct: f64,
    pub approval_delta: Delta,
    pub response_count: usize,
    pub prev_response_count: usize,
    pub response_delta: Delta,
    pub comment_count: usize,
    pub prev_comment_count: usize,
    pub comment_delta: Delta,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct WindowTally {
    responses: usize,
    approvals: usize,
    comments: usize,
}

impl WindowTally {
    fn of(records: &[FeedbackRecord]) -> Self {
        let latest = latest_per_user(records);
        Self {
            responses: latest.len(),
            approvals: latest.iter().filter(|record| record.thumb_up).count(),
            comments: records.iter().filter(|record| record.has_comment()).count(),
        }
    }

    fn approval_pct(&self) -> f64 {
        percentage(self.approvals, self.responses)
    }
}

impl PeriodStats {
    pub fn compute(current: &[FeedbackRecord], previous: &[FeedbackRecord]) -> Self {
        let now = WindowTally::of(current);
        let before = WindowTally::of(previous);
        let approval_pct = now.approval_pct();
        let prev_approval_pct = before.approval_pct();

        Self {
            approval_pct,
            prev_approval_pct,
            approval_delta: Delta::points(approval_pct, prev_approval_pct, before.responses),
            response_count: now.responses,
            prev_response_count: before.responses,
            response_delta: Delta::relative(now.responses, before.responses),
            comment_count: now.comments,
            prev_comment_count: before.comments,
            comment_delta: Delta::relative(now.comments, before.comments),
        }
    }

    pub fn rounded_approval(&self) -> i64 {
        self.approval_pct.round() as i64
    }
}

/// Latest record per user id. Later arrivals win timestamp ties.
fn latest_per_user(records: &[FeedbackRecord]) -> Vec<&FeedbackRecord> {
    let mut latest: HashMap<&str, &FeedbackRecord> = HashMap::new();
    for record in records {
        latest
            .entry(record.user_id.as_str())
            .and_modify(|kept| {
                if record.created_at >= kept.created_at {
                    *kept = record;
                }
            })
            .or_insert(record);
    }
    latest.into_values().collect()
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    100.0 * part as f64 / whole as f64
}

/// Buckets records by calendar month for chart series. Raw volumes are
/// plotted, so no per-user dedup happens here.
pub fn monthly_points(records: &[FeedbackRecord]) -> Vec<MonthlyPoint> {
    let mut months: BTreeMap<_, WindowTally> = BTreeMap::new();
    for record in records {
        let date = record.created_at.date_naive();
        let tally = months.entry(month_start(date)).or_default();
        tally.responses += 1;
        if record.thumb_up {
            tally.approvals += 1;
        }
        if record.has_comment() {
            tally.comments += 1;
        }
    }

    months
        .into_iter()
        .map(|(month, tally)| MonthlyPoint {
            month,
            approval_pct: tally.approval_pct(),
            response_count: tally.responses,
            comment_count: tally.comments,
        })
        .collect()
}
