//! Preference-weighted choice of a single candidate for one voter.

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;
use std::fmt;

use crate::models::{Candidate, Preference, Sentiment};

/// Strength range for preferences invented on the spot for a fresh voter.
pub const FRESH_STRENGTH_MIN: u8 = 1;
pub const FRESH_STRENGTH_MAX: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecisionReason {
    PositivePreference,
    LeastNegativePreference,
    RandomFallback,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionReason::PositivePreference => f.write_str("positive preference"),
            DecisionReason::LeastNegativePreference => f.write_str("least negative preference"),
            DecisionReason::RandomFallback => f.write_str("random fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision<'a> {
    pub candidate: &'a Candidate,
    pub reason: DecisionReason,
}

/// A preference that has been drawn but not yet stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferenceDraft {
    pub candidate_id: i64,
    pub sentiment: Sentiment,
    pub strength: u8,
}

/// 40% neutral, 30% positive, 30% negative.
pub fn weighted_sentiment<R: Rng>(rng: &mut R) -> Sentiment {
    match rng.random_range(0..10u8) {
        0..=3 => Sentiment::Neutral,
        4..=6 => Sentiment::Positive,
        _ => Sentiment::Negative,
    }
}

/// One random preference per candidate, for a voter seen for the first time.
pub fn fresh_preferences<R: Rng>(candidates: &[Candidate], rng: &mut R) -> Vec<PreferenceDraft> {
    candidates
        .iter()
        .map(|candidate| PreferenceDraft {
            candidate_id: candidate.id,
            sentiment: weighted_sentiment(rng),
            strength: rng.random_range(FRESH_STRENGTH_MIN..=FRESH_STRENGTH_MAX),
        })
        .collect()
}

/// True when none of `preferences` refers to an eligible candidate.
pub fn needs_fresh_preferences(eligible: &[Candidate], preferences: &[Preference]) -> bool {
    !preferences
        .iter()
        .any(|p| eligible.iter().any(|c| c.id == p.candidate_id))
}

/// Strongest eligible candidate carrying `sentiment`. Ties keep the first one
/// in `eligible` order.
fn strongest<'a>(
    eligible: &'a [Candidate],
    preferences: &[Preference],
    sentiment: Sentiment,
) -> Option<&'a Candidate> {
    let mut best: Option<(&Candidate, u8)> = None;
    for candidate in eligible {
        let Some(pref) = preferences
            .iter()
            .find(|p| p.candidate_id == candidate.id && p.sentiment == sentiment)
        else {
            continue;
        };
        match best {
            Some((_, strength)) if strength >= pref.strength => {}
            _ => best = Some((candidate, pref.strength)),
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Pick exactly one of `eligible` for a voter holding `preferences`.
///
/// Positive preferences win by strength. Without any, the negative preference
/// with the highest strength is taken as the least bad option. Otherwise the
/// pick is uniform. Returns `None` only when `eligible` is empty.
pub fn choose_candidate<'a, R: Rng>(
    eligible: &'a [Candidate],
    preferences: &[Preference],
    rng: &mut R,
) -> Option<Decision<'a>> {
    if let Some(candidate) = strongest(eligible, preferences, Sentiment::Positive) {
        return Some(Decision {
            candidate,
            reason: DecisionReason::PositivePreference,
        });
    }
    if let Some(candidate) = strongest(eligible, preferences, Sentiment::Negative) {
        return Some(Decision {
            candidate,
            reason: DecisionReason::LeastNegativePreference,
        });
    }
    eligible.choose(rng).map(|candidate| Decision {
        candidate,
        reason: DecisionReason::RandomFallback,
    })
}
