//! Vote types for answer feedback

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Vote value. Stored as text; the table carries a matching CHECK constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteValue::Up => "up",
            VoteValue::Down => "down",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(VoteValue::Up),
            "down" => Some(VoteValue::Down),
            _ => None,
        }
    }
}

/// One vote. At most one row exists per (answer_id, voter_id); a later vote
/// for the same pair replaces value, comment and updated_at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub answer_id: String,
    pub voter_id: String,
    pub value: VoteValue,
    /// Optional free-text comment attached to the vote
    #[serde(default)]
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Live aggregate over the vote set for one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSummary {
    pub up_count: u64,
    pub down_count: u64,
}

/// Aggregate statistics over all recorded votes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteStatistics {
    pub total_votes: u64,
    pub up_votes: u64,
    pub down_votes: u64,
    pub up_percentage: f64,
    pub down_percentage: f64,
    pub votes_with_comments: u64,
    /// Votes per day over the last 30 days, keyed by YYYY-MM-DD
    pub votes_per_day: BTreeMap<String, u64>,
}

/// Filter options for listing votes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteFilter {
    /// Filter by vote value
    pub value: Option<VoteValue>,
    /// Only votes updated at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only votes updated at or before this instant
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of votes to return
    pub limit: Option<usize>,
    /// Number of votes to skip
    #[serde(default)]
    pub offset: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_value_round_trips_through_text() {
        assert_eq!(VoteValue::parse("up"), Some(VoteValue::Up));
        assert_eq!(VoteValue::parse("down"), Some(VoteValue::Down));
        assert_eq!(VoteValue::parse("yes"), None);
        assert_eq!(VoteValue::parse(VoteValue::Up.as_str()), Some(VoteValue::Up));
    }
}
