//! Post-tally consistency checks.

use super::tally::{ADVANCING_COUNT, total_votes};
use crate::models::RoundResultEntry;

/// What a round is expected to look like after tallying.
#[derive(Debug, Clone, Copy)]
pub struct RoundExpectation {
    /// Ballots the store holds for this round on eligible candidates.
    pub stored_ballots: u32,
    /// Synthetic ballots successfully written this round.
    pub synthetic_cast: u32,
    /// Distinct human voters whose ballot counts this round.
    pub human_cast: u32,
}

/// Every invariant the ranked result violates, as readable messages.
pub fn check_round(ranked: &[RoundResultEntry], expected: RoundExpectation) -> Vec<String> {
    let mut violations = Vec::new();

    for (i, entry) in ranked.iter().enumerate() {
        if entry.rank != i as u32 + 1 {
            violations.push(format!(
                "candidate {} has rank {} at position {}",
                entry.candidate_id,
                entry.rank,
                i + 1
            ));
        }
    }

    if ranked.windows(2).any(|w| w[0].vote_count < w[1].vote_count) {
        violations.push("vote counts are not in descending order".to_string());
    }

    let tallied = total_votes(ranked);
    if tallied != expected.stored_ballots {
        violations.push(format!(
            "tally sums to {} but {} ballots are stored",
            tallied, expected.stored_ballots
        ));
    }

    let cast = expected.synthetic_cast + expected.human_cast;
    if tallied != cast {
        violations.push(format!(
            "tally sums to {} but {} synthetic and {} human ballots were cast",
            tallied, expected.synthetic_cast, expected.human_cast
        ));
    }

    violations
}

pub fn check_advancing(ranked: &[RoundResultEntry], advancing: &[RoundResultEntry]) -> Vec<String> {
    let expected: Vec<i64> = ranked.iter().take(ADVANCING_COUNT).map(|e| e.candidate_id).collect();
    let actual: Vec<i64> = advancing.iter().map(|e| e.candidate_id).collect();
    if expected == actual {
        Vec::new()
    } else {
        vec![format!("advancing set {:?} is not the top two {:?}", actual, expected)]
    }
}
