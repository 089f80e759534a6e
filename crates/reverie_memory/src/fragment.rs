//! Memory fragment records.
//!
//! A fragment is the structured artifact mined from free-text conversation:
//! a notable life event with whatever date, place, people, and emotional
//! color the heuristics could recover. Immutable once created.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse bucket for when the event happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    DistantPast,
    Childhood,
    YoungAdult,
    RecentPast,
    Present,
}

impl TimePeriod {
    /// Fixed year thresholds; absent years land in the current-year bucket.
    pub fn from_year(year: i32) -> Self {
        if year < 1950 {
            TimePeriod::DistantPast
        } else if year < 1980 {
            TimePeriod::Childhood
        } else if year < 2000 {
            TimePeriod::YoungAdult
        } else if year < 2010 {
            TimePeriod::RecentPast
        } else {
            TimePeriod::Present
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDate {
    /// When the fragment was recorded, not when the event happened.
    pub timestamp: DateTime<Utc>,
    /// Free-text date hint recovered from the conversation, e.g. "1998".
    pub approximate_date: Option<String>,
    pub time_period: TimePeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentLocation {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentPerson {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentContext {
    pub emotions: Vec<String>,
    /// 1..=5, higher means more significant.
    pub significance: u8,
    pub themes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentStatus {
    Complete,
    NeedsDetails,
    Unverified,
}

/// A structured memory mined from conversation. Created at most once per
/// completed introduction, plus once per reveal in the casual graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryFragment {
    pub id: Uuid,
    pub user_id: String,
    /// First sentence of the story, at most 50 chars.
    pub title: String,
    /// Raw story text as the user told it.
    pub description: String,
    pub date: FragmentDate,
    pub location: Option<FragmentLocation>,
    pub people: Vec<FragmentPerson>,
    pub context: FragmentContext,
    pub status: FragmentStatus,
    pub source: String,
    pub version: u32,
}

impl MemoryFragment {
    /// Fragment recording a conversational moment rather than a mined life
    /// event. Used by the casual graph for significant exchanges and for
    /// the reveal itself; `significance` arrives as a [0,1] score and is
    /// mapped onto the 1..=5 scale.
    pub fn from_exchange(user_id: &str, description: &str, significance: f32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: truncate_title(description),
            description: description.to_string(),
            date: FragmentDate {
                timestamp: now,
                approximate_date: None,
                time_period: TimePeriod::from_year(now.year()),
            },
            location: None,
            people: Vec::new(),
            context: FragmentContext {
                emotions: Vec::new(),
                significance: ((significance * 5.0).round() as u8).clamp(1, 5),
                themes: vec!["conversation".to_string()],
            },
            status: FragmentStatus::Unverified,
            source: "conversation".to_string(),
            version: 1,
        }
    }
}

/// First sentence (split on `.`, `!`, `?`), capped at 50 chars including the
/// `...` suffix when truncated.
pub fn truncate_title(story: &str) -> String {
    let first = story
        .split_inclusive(['.', '!', '?'])
        .next()
        .unwrap_or(story)
        .trim_end_matches(['.', '!', '?'])
        .trim();
    if first.chars().count() <= 50 {
        first.to_string()
    } else {
        let cut: String = first.chars().take(47).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_period_thresholds() {
        assert_eq!(TimePeriod::from_year(1944), TimePeriod::DistantPast);
        assert_eq!(TimePeriod::from_year(1950), TimePeriod::Childhood);
        assert_eq!(TimePeriod::from_year(1979), TimePeriod::Childhood);
        assert_eq!(TimePeriod::from_year(1980), TimePeriod::YoungAdult);
        assert_eq!(TimePeriod::from_year(1998), TimePeriod::YoungAdult);
        assert_eq!(TimePeriod::from_year(2000), TimePeriod::RecentPast);
        assert_eq!(TimePeriod::from_year(2009), TimePeriod::RecentPast);
        assert_eq!(TimePeriod::from_year(2010), TimePeriod::Present);
        assert_eq!(TimePeriod::from_year(2026), TimePeriod::Present);
    }

    #[test]
    fn test_title_is_first_sentence() {
        assert_eq!(truncate_title("We got lost. Then it rained."), "We got lost");
        assert_eq!(truncate_title("What a day!"), "What a day");
    }

    #[test]
    fn test_title_truncation_stays_within_cap() {
        let long = "This opening sentence keeps going well past the fifty character limit";
        let title = truncate_title(long);
        assert!(title.chars().count() <= 50, "title too long: {}", title);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_exchange_fragment_significance_mapping() {
        let f = MemoryFragment::from_exchange("u1", "a moment", 0.9);
        assert_eq!(f.context.significance, 5);
        let f = MemoryFragment::from_exchange("u1", "a moment", 0.0);
        assert_eq!(f.context.significance, 1);
        assert_eq!(f.status, FragmentStatus::Unverified);
        assert_eq!(f.source, "conversation");
    }

    #[test]
    fn test_fragment_json_round_trip() {
        let f = MemoryFragment::from_exchange("u1", "A walk by the harbor at dusk.", 0.7);
        let json = serde_json::to_string(&f).unwrap();
        let back: MemoryFragment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}
