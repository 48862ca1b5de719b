//! Preferences for a returning human voter, derived from their last ballot.

use rand::Rng;
use std::ops::RangeInclusive;

use super::decision::{PreferenceDraft, fresh_preferences};
use crate::models::{Ballot, Candidate, Sentiment};

const CHOSEN_STRENGTH: RangeInclusive<u8> = 7..=9;
const LEANING_STRENGTH: RangeInclusive<u8> = 4..=6;
const UNDECIDED_STRENGTH: RangeInclusive<u8> = 3..=5;
const LEANING_PROBABILITY: f64 = 2.0 / 3.0;

pub fn seed_from_history<R: Rng>(
    candidates: &[Candidate],
    last_ballot: Option<&Ballot>,
    rng: &mut R,
) -> Vec<PreferenceDraft> {
    let Some(ballot) = last_ballot else {
        return fresh_preferences(candidates, rng);
    };

    candidates
        .iter()
        .map(|candidate| {
            let (sentiment, strength) = if candidate.id == ballot.candidate_id {
                (Sentiment::Positive, rng.random_range(CHOSEN_STRENGTH))
            } else {
                let leaning = if candidate.party == ballot.candidate_party {
                    Sentiment::Positive
                } else {
                    Sentiment::Negative
                };
                if rng.random_bool(LEANING_PROBABILITY) {
                    (leaning, rng.random_range(LEANING_STRENGTH))
                } else {
                    (Sentiment::Neutral, rng.random_range(UNDECIDED_STRENGTH))
                }
            };
            PreferenceDraft {
                candidate_id: candidate.id,
                sentiment,
                strength,
            }
        })
        .collect()
}
