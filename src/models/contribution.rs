use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Days covered by a series, today included.
pub const SERIES_DAYS: usize = 366;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionSource {
    /// Authenticated GraphQL contribution calendar.
    Calendar,
    /// Estimated from the public event feed, which only reaches back about 90 days.
    PublicEvents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionCalendar {
    pub days: Vec<ContributionDay>,
    pub source: ContributionSource,
    pub is_estimated: bool,
}

impl ContributionCalendar {
    pub fn new(today: NaiveDate, counts: &HashMap<NaiveDate, u32>, source: ContributionSource) -> Self {
        Self {
            days: build_series(today, counts),
            source,
            is_estimated: source != ContributionSource::Calendar,
        }
    }

    pub fn total(&self) -> u64 {
        self.days.iter().map(|d| d.count as u64).sum()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.first().map(|d| d.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.last().map(|d| d.date)
    }
}

/// One entry per date from `today - 365` through `today`, ascending, zero-filled.
/// Counts outside the window are ignored.
pub fn build_series(today: NaiveDate, counts: &HashMap<NaiveDate, u32>) -> Vec<ContributionDay> {
    let start = today - Duration::days(SERIES_DAYS as i64 - 1);
    start
        .iter_days()
        .take(SERIES_DAYS)
        .map(|date| ContributionDay {
            date,
            count: counts.get(&date).copied().unwrap_or(0),
        })
        .collect()
}
