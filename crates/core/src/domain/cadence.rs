use std::fmt;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::digest::grouping::Granularity;
use crate::errors::DomainError;

/// Digest schedule. Each cadence has its own cohort granularity and lookback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

/// Half-open `[start, end)` range of UTC calendar dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CadenceWindows {
    pub current: DateWindow,
    pub previous: DateWindow,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let date = instant.date_naive();
        date >= self.start && date < self.end
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn end_instant(&self) -> DateTime<Utc> {
        self.end.and_time(NaiveTime::MIN).and_utc()
    }
}

impl Cadence {
    pub const ALL: [Cadence; 4] = [Self::Daily, Self::Weekly, Self::Monthly, Self::Quarterly];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        }
    }

    pub fn granularity(self) -> Granularity {
        match self {
            Self::Daily | Self::Weekly => Granularity::OriginCategoryPrompt,
            Self::Monthly => Granularity::OriginCategory,
            Self::Quarterly => Granularity::Origin,
        }
    }

    pub fn has_charts(self) -> bool {
        matches!(self, Self::Monthly | Self::Quarterly)
    }

    pub fn has_stats(self) -> bool {
        !matches!(self, Self::Daily)
    }

    /// Longer cadences feed dated summaries to the summarizer so it can see trends.
    pub fn dated_summaries(self) -> bool {
        matches!(self, Self::Monthly | Self::Quarterly)
    }

    pub fn windows(self, today: NaiveDate) -> CadenceWindows {
        match self {
            Self::Daily => {
                let yesterday = today - Days::new(1);
                CadenceWindows {
                    current: DateWindow::new(yesterday, today),
                    previous: DateWindow::new(yesterday - Days::new(1), yesterday),
                }
            }
            Self::Weekly => {
                let week_ago = today - Days::new(7);
                CadenceWindows {
                    current: DateWindow::new(week_ago, today),
                    previous: DateWindow::new(week_ago - Days::new(7), week_ago),
                }
            }
            Self::Monthly => month_windows(today, 1),
            Self::Quarterly => month_windows(today, 3),
        }
    }

    /// Accounts created on or after this date are too young for the cadence.
    pub fn eligibility_cutoff(self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => today - Days::new(1),
            Self::Weekly => today - Days::new(7),
            Self::Monthly => today - Months::new(1),
            Self::Quarterly => today - Months::new(3),
        }
    }

    pub fn is_due(self, today: NaiveDate) -> bool {
        match self {
            Self::Daily => true,
            Self::Weekly => today.weekday() == Weekday::Mon,
            Self::Monthly => is_first_weekday_of_month(today),
            Self::Quarterly => {
                matches!(today.month(), 1 | 4 | 7 | 10) && nth_weekday_of_month(today, 2) == today
            }
        }
    }

    /// Heading shown under the digest title, naming the period being reported.
    pub fn period_label(self, today: NaiveDate) -> Option<String> {
        let previous_start = self.windows(today).current.start;
        match self {
            Self::Daily | Self::Weekly => None,
            Self::Monthly => Some(previous_start.format("%B %Y").to_string()),
            Self::Quarterly => {
                Some(format!("Q{} {}", previous_start.month0() / 3 + 1, previous_start.year()))
            }
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Cadence {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown cadence `{other}` (expected daily|weekly|monthly|quarterly)"
            ))),
        }
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Trailing six complete months used for chart series.
pub fn chart_window(today: NaiveDate) -> DateWindow {
    let end = month_start(today);
    DateWindow::new(end - Months::new(6), end)
}

pub fn is_first_weekday_of_month(today: NaiveDate) -> bool {
    nth_weekday_of_month(today, 1) == today
}

/// Cadences due on `today`, in the order the scheduler runs them.
pub fn due_cadences(today: NaiveDate) -> Vec<Cadence> {
    Cadence::ALL.into_iter().filter(|cadence| cadence.is_due(today)).collect()
}

fn month_windows(today: NaiveDate, months: u32) -> CadenceWindows {
    let end = month_start(today);
    let start = end - Months::new(months);
    CadenceWindows {
        current: DateWindow::new(start, end),
        previous: DateWindow::new(start - Months::new(months), start),
    }
}

fn nth_weekday_of_month(date: NaiveDate, nth: usize) -> NaiveDate {
    let mut day = month_start(date);
    let mut seen = 0;
    loop {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            seen += 1;
            if seen == nth {
                return day;
            }
        }
        day = day + Days::new(1);
    }
}
