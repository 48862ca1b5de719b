use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub party: String,
    pub description: String,
    pub image: String,
}

impl Candidate {
    #[cfg(test)]
    pub fn new(id: i64, name: &str, party: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            party: party.to_string(),
            description: String::new(),
            image: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoterKind {
    Human,
    Synthetic,
}

impl VoterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoterKind::Human => "human",
            VoterKind::Synthetic => "synthetic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "human" => Some(VoterKind::Human),
            "synthetic" => Some(VoterKind::Synthetic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voter {
    pub identifier: String,
    pub display_name: String,
    pub kind: VoterKind,
    pub registered_at: DateTime<Utc>,
}

impl Voter {
    pub fn human(identifier: &str, display_name: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            display_name: display_name.to_string(),
            kind: VoterKind::Human,
            registered_at: Utc::now(),
        }
    }

    pub fn synthetic(identifier: String, ordinal: usize) -> Self {
        Self {
            identifier,
            display_name: format!("Auto Voter {}", ordinal),
            kind: VoterKind::Synthetic,
            registered_at: Utc::now(),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.kind == VoterKind::Synthetic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strongest a preference can be; the weakest is 1.
pub const MAX_STRENGTH: u8 = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub voter_id: String,
    pub candidate_id: i64,
    pub sentiment: Sentiment,
    pub strength: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Round {
    First,
    Second,
}

impl Round {
    pub fn number(&self) -> i64 {
        match self {
            Round::First => 1,
            Round::Second => 2,
        }
    }

    pub fn from_number(value: i64) -> Option<Self> {
        match value {
            1 => Some(Round::First),
            2 => Some(Round::Second),
            _ => None,
        }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Round::First => f.write_str("first round"),
            Round::Second => f.write_str("second round"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter_id: String,
    pub candidate_id: i64,
    pub candidate_name: String,
    pub candidate_party: String,
    pub round: Round,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResultEntry {
    pub candidate_id: i64,
    pub name: String,
    pub party: String,
    pub vote_count: u32,
    pub rank: u32,
}

/// Everything the round result store holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredResults {
    pub first_round: Vec<RoundResultEntry>,
    pub second_round: Vec<RoundResultEntry>,
    pub advancing: Vec<RoundResultEntry>,
}
