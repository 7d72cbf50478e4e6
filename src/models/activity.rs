use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Envelope of the search endpoints. Only the total is read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
}

/// Entry of `GET /users/{handle}/events/public`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    pub action: Option<String>,
    pub size: Option<u32>,
    pub distinct_size: Option<u32>,
    pub commits: Option<Vec<serde_json::Value>>,
}

impl PublicEvent {
    /// Contribution weight of the event: pushed commits, or one per opened
    /// issue, opened pull request and submitted review.
    pub fn weight(&self) -> u32 {
        match self.kind.as_str() {
            "PushEvent" => self
                .payload
                .size
                .or(self.payload.distinct_size)
                .or_else(|| self.payload.commits.as_ref().map(|c| c.len() as u32))
                .unwrap_or(1),
            "IssuesEvent" | "PullRequestEvent" => {
                u32::from(self.payload.action.as_deref() == Some("opened"))
            }
            "PullRequestReviewEvent" => 1,
            _ => 0,
        }
    }
}

/// Per-day totals keyed by UTC date.
pub fn daily_counts(events: &[PublicEvent]) -> HashMap<NaiveDate, u32> {
    let mut counts = HashMap::new();
    for event in events {
        let weight = event.weight();
        if weight > 0 {
            *counts.entry(event.created_at.date_naive()).or_insert(0) += weight;
        }
    }
    counts
}
