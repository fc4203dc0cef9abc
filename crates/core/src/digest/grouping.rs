//! Cohort partitioning for feedback and summary rows.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::feedback::{FeedbackRecord, SummaryRow};

/// Which key components identify a cohort.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Granularity {
    Origin,
    OriginCategory,
    OriginCategoryPrompt,
}

/// Rows that can be assigned to a cohort.
pub trait Cohorted {
    fn origin(&self) -> &str;
    fn category(&self) -> &str;
    fn prompt(&self) -> &str;
}

/// Ordering is lexicographic on origin, then category, then prompt, which is
/// also the order digests render cohorts in.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CohortKey {
    pub origin: String,
    pub category: Option<String>,
    pub prompt: Option<String>,
}

pub type Cohorts<T> = BTreeMap<CohortKey, Vec<T>>;

impl CohortKey {
    pub fn of<T: Cohorted + ?Sized>(row: &T, granularity: Granularity) -> Self {
        let origin = row.origin().to_owned();
        match granularity {
            Granularity::Origin => Self { origin, category: None, prompt: None },
            Granularity::OriginCategory => {
                Self { origin, category: Some(row.category().to_owned()), prompt: None }
            }
            Granularity::OriginCategoryPrompt => Self {
                origin,
                category: Some(row.category().to_owned()),
                prompt: Some(row.prompt().to_owned()),
            },
        }
    }

    pub fn category(&self) -> &str {
        self.category.as_deref().unwrap_or_default()
    }

    pub fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for CohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin)?;
        if let Some(category) = &self.category {
            write!(f, "/{category}")?;
        }
        if let Some(prompt) = &self.prompt {
            write!(f, "/{prompt}")?;
        }
        Ok(())
    }
}

/// Partitions `rows` by cohort key. Rows keep their arrival order inside each
/// bucket; rows with empty key components still get their own bucket.
pub fn group_by_cohort<T, I>(rows: I, granularity: Granularity) -> Cohorts<T>
where
    T: Cohorted,
    I: IntoIterator<Item = T>,
{
    let mut cohorts: Cohorts<T> = BTreeMap::new();
    for row in rows {
        cohorts.entry(CohortKey::of(&row, granularity)).or_default().push(row);
    }
    cohorts
}

impl Cohorted for FeedbackRecord {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn prompt(&self) -> &str {
        &self.prompt
    }
}

impl Cohorted for SummaryRow {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn prompt(&self) -> &str {
        &self.prompt
    }
}
