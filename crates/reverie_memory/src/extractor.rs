//! Heuristic memory extraction from a conversation transcript.
//!
//! The pipeline is deterministic and first-match-wins at every step: anchor
//! on the persona's "tell me about a life event" ask, take the next user
//! turn as the story, then mine the when/where answer (or the story itself)
//! for a year, a location, and people. Regex-based extraction is brittle by
//! nature, so the whole thing sits behind a strategy trait and fails
//! silently — no story, no fragment, no error.

use crate::fragment::{
    truncate_title, FragmentContext, FragmentDate, FragmentLocation, FragmentPerson,
    FragmentStatus, MemoryFragment, TimePeriod,
};
use chrono::{Datelike, Utc};
use regex::Regex;
use reverie_core::persona::PersonaDefinition;
use reverie_core::state::Transcript;
use std::sync::LazyLock;
use uuid::Uuid;

// Year patterns, in priority order. The first pattern that matches anywhere
// in the scanned text wins.
static RE_YEARS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bin\s+(\d{4})\b",
        r"(?i)\baround\s+(\d{4})\b",
        r"(?i)\bduring\s+the\s+(\d{4})s\b",
        r"(?i)\bback\s+in\s+(\d{4})\b",
        r"\b(\d{4})\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

// Location patterns: a preposition followed by capitalized words.
static RE_LOCATIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bin\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*)",
        r"\bat\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*)",
        r"\bnear\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static RE_WITH_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bwith\s+([A-Z][a-z]+)\b").unwrap());
static RE_MY_RELATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bmy\s+(mom|mother|dad|father|sister|brother|friend|wife|husband|son|daughter|grandmother|grandfather|grandma|grandpa|aunt|uncle|cousin|partner|colleague|neighbor)\s+([A-Z][a-z]+)\b",
    )
    .unwrap()
});
static RE_NAME_AND_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]+)\s+and\s+([A-Z][a-z]+)\b").unwrap());

/// Emotion vocabulary: (stem matched in lowercased text, canonical label).
const EMOTION_STEMS: &[(&str, &str)] = &[
    ("happy", "happy"),
    ("joy", "joyful"),
    ("excit", "excited"),
    ("thrill", "thrilled"),
    ("proud", "proud"),
    ("grateful", "grateful"),
    ("peaceful", "peaceful"),
    ("relie", "relieved"),
    ("nostalg", "nostalgic"),
    ("surpris", "surprised"),
    ("sad", "sad"),
    ("terrif", "terrified"),
    ("scared", "scared"),
    ("afraid", "afraid"),
    ("nervous", "nervous"),
    ("anxi", "anxious"),
    ("angry", "angry"),
    ("lonel", "lonely"),
    ("embarrass", "embarrassed"),
    ("heartbroken", "heartbroken"),
];

const POSITIVE_HINTS: &[&str] = &[
    "great", "wonderful", "amazing", "best", "fun", "beautiful", "laughed", "perfect", "love",
];
const NEGATIVE_HINTS: &[&str] = &[
    "terrible", "awful", "worst", "hard", "difficult", "hurt", "alone", "cried", "hate",
];

/// Theme keyword table: (theme, stems scanned against the lowercased story).
const THEME_KEYWORDS: &[(&str, &[&str])] = &[
    ("family", &["mom", "dad", "mother", "father", "sister", "brother", "parents", "grandma", "grandpa", "family"]),
    ("friendship", &["friend", "buddy", "pal"]),
    ("education", &["school", "college", "university", "teacher", "class", "graduat"]),
    ("career", &["job", "work", "career", "boss", "office", "promot"]),
    ("travel", &["trip", "travel", "visited", "abroad", "flight", "backpack"]),
    ("relationships", &["girlfriend", "boyfriend", "wife", "husband", "partner", "married", "wedding"]),
    ("challenges", &["hard", "difficult", "struggle", "challenge", "tough"]),
    ("achievements", &["won", "award", "achiev", "succeed", "accomplish"]),
    ("loss", &["died", "passed away", "funeral", "goodbye", "grief"]),
    ("celebrations", &["birthday", "party", "christmas", "holiday", "celebrat"]),
    ("health", &["hospital", "sick", "doctor", "surgery", "recover"]),
    ("adventure", &["adventure", "hike", "climb", "explore", "camping"]),
    ("spirituality", &["church", "pray", "faith", "spiritual", "temple"]),
    ("creativity", &["paint", "music", "wrote", "song", "draw", "band"]),
    ("nature", &["mountain", "ocean", "forest", "river", "beach", "garden"]),
    ("technology", &["computer", "internet", "phone", "software", "video game"]),
    ("food", &["cook", "meal", "recipe", "restaurant", "dinner", "baked"]),
    ("sports", &["team", "match", "soccer", "football", "basketball", "race"]),
    ("home", &["home", "house", "moved", "apartment", "neighborhood"]),
    ("personal_growth", &["learned", "realized", "changed", "grew", "became"]),
];

/// Strategy seam for extraction, so the regex pipeline can later be swapped
/// for a model-based extractor without touching the state machine.
pub trait MemoryExtractor: Send + Sync {
    fn extract(
        &self,
        transcript: &Transcript,
        user_id: &str,
        persona: &PersonaDefinition,
    ) -> Option<MemoryFragment>;
}

/// The regex-and-keyword pipeline described above.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl MemoryExtractor for HeuristicExtractor {
    fn extract(
        &self,
        transcript: &Transcript,
        user_id: &str,
        persona: &PersonaDefinition,
    ) -> Option<MemoryFragment> {
        // Step 1: anchor on the event ask; the next user turn is the story.
        let ask_idx = transcript.find_agent_turn(&persona.event_ask_phrases)?;
        let story = &transcript.user_turn_after(ask_idx)?.text;

        // Step 2: the when/where answer is the preferred scan text for
        // dates, locations and people; the story itself is the fallback.
        let detail = transcript
            .find_agent_turn(&persona.when_where_phrases)
            .and_then(|idx| transcript.user_turn_after(idx))
            .map(|t| t.text.clone());
        let scan_texts: Vec<&str> = match &detail {
            Some(d) => vec![d.as_str(), story.as_str()],
            None => vec![story.as_str()],
        };

        let year = scan_texts.iter().find_map(|t| find_year(t));
        let location = scan_texts.iter().find_map(|t| find_location(t));
        let people = scan_texts
            .iter()
            .map(|t| find_people(t))
            .find(|p| !p.is_empty())
            .unwrap_or_default();

        // Step 3: emotions across every user turn.
        let emotions = find_emotions(transcript);

        // Steps 4-7: period, themes, significance, title.
        let time_period = TimePeriod::from_year(year.unwrap_or_else(|| Utc::now().year()));
        let themes = find_themes(story);
        let significance =
            ((story.len() / 100) as i64 + emotions.len() as i64).clamp(1, 5) as u8;

        tracing::debug!(
            year = ?year,
            location = ?location,
            people = people.len(),
            "Extracted memory fragment from transcript"
        );

        Some(MemoryFragment {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            title: truncate_title(story),
            description: story.clone(),
            date: FragmentDate {
                timestamp: Utc::now(),
                approximate_date: year.map(|y| y.to_string()),
                time_period,
            },
            location: location.map(|name| FragmentLocation { name }),
            people,
            context: FragmentContext {
                emotions,
                significance,
                themes,
            },
            status: FragmentStatus::Complete,
            source: "conversation".to_string(),
            version: 1,
        })
    }
}

fn find_year(text: &str) -> Option<i32> {
    for re in RE_YEARS.iter() {
        if let Some(caps) = re.captures(text) {
            if let Ok(year) = caps[1].parse::<i32>() {
                return Some(year);
            }
        }
    }
    None
}

fn find_location(text: &str) -> Option<String> {
    for re in RE_LOCATIONS.iter() {
        if let Some(caps) = re.captures(text) {
            return Some(caps[1].to_string());
        }
    }
    None
}

fn find_people(text: &str) -> Vec<FragmentPerson> {
    let mut people: Vec<FragmentPerson> = Vec::new();
    let seen = |people: &[FragmentPerson], name: &str| {
        people.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    };

    for caps in RE_WITH_NAME.captures_iter(text) {
        let name = &caps[1];
        if !seen(&people, name) {
            people.push(FragmentPerson {
                name: name.to_string(),
                relationship: None,
            });
        }
    }
    for caps in RE_MY_RELATION.captures_iter(text) {
        let name = &caps[2];
        let relation = caps[1].to_lowercase();
        if let Some(existing) = people.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
            existing.relationship.get_or_insert(relation);
        } else {
            people.push(FragmentPerson {
                name: name.to_string(),
                relationship: Some(relation),
            });
        }
    }
    for caps in RE_NAME_AND_NAME.captures_iter(text) {
        for name in [&caps[1], &caps[2]] {
            if !seen(&people, name) {
                people.push(FragmentPerson {
                    name: name.to_string(),
                    relationship: None,
                });
            }
        }
    }
    people
}

fn find_emotions(transcript: &Transcript) -> Vec<String> {
    let mut emotions: Vec<String> = Vec::new();
    for turn in transcript.user_turns() {
        let lower = turn.text.to_lowercase();
        for (stem, label) in EMOTION_STEMS {
            if lower.contains(stem) && !emotions.iter().any(|e| e == label) {
                emotions.push(label.to_string());
            }
        }
    }
    if !emotions.is_empty() {
        return emotions;
    }

    // No explicit vocabulary hit: infer a coarse pair from sentiment hints.
    let all_text: String = transcript
        .user_turns()
        .map(|t| t.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if POSITIVE_HINTS.iter().any(|h| all_text.contains(h)) {
        vec!["happy".to_string(), "excited".to_string()]
    } else if NEGATIVE_HINTS.iter().any(|h| all_text.contains(h)) {
        vec!["sad".to_string(), "anxious".to_string()]
    } else {
        vec!["reflective".to_string()]
    }
}

fn find_themes(story: &str) -> Vec<String> {
    let lower = story.to_lowercase();
    let themes: Vec<String> = THEME_KEYWORDS
        .iter()
        .filter(|(_, stems)| stems.iter().any(|s| lower.contains(s)))
        .map(|(theme, _)| theme.to_string())
        .collect();
    if themes.is_empty() {
        vec!["life_experience".to_string()]
    } else {
        themes
    }
}
