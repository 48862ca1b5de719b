use std::collections::{BTreeMap, HashMap};

use crate::models::{Candidate, RoundResultEntry};

/// Candidates that advance from the first round to the runoff.
pub const ADVANCING_COUNT: usize = 2;

/// Rank every eligible candidate by vote count, highest first.
///
/// Candidates missing from `counts` get zero votes. The sort is stable, so ties
/// keep the order of `eligible`. Ranks run 1..=N without gaps.
pub fn rank_results(eligible: &[Candidate], counts: &[(i64, u32)]) -> Vec<RoundResultEntry> {
    let lookup: HashMap<i64, u32> = counts.iter().copied().collect();

    let mut ranked: Vec<RoundResultEntry> = eligible
        .iter()
        .map(|candidate| RoundResultEntry {
            candidate_id: candidate.id,
            name: candidate.name.clone(),
            party: candidate.party.clone(),
            vote_count: lookup.get(&candidate.id).copied().unwrap_or(0),
            rank: 0,
        })
        .collect();

    ranked.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));

    for (i, entry) in ranked.iter_mut().enumerate() {
        entry.rank = i as u32 + 1;
    }
    ranked
}

pub fn advancing_set(ranked: &[RoundResultEntry]) -> Vec<RoundResultEntry> {
    ranked.iter().take(ADVANCING_COUNT).cloned().collect()
}

pub fn total_votes(ranked: &[RoundResultEntry]) -> u32 {
    ranked.iter().map(|entry| entry.vote_count).sum()
}

/// Number of candidates per party, sorted by party name.
pub fn party_counts(candidates: &[Candidate]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for candidate in candidates {
        *counts.entry(candidate.party.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(party, count)| (party.to_string(), count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<Candidate> {
        vec![
            Candidate::new(10, "Ana", "Blue"),
            Candidate::new(20, "Bob", "Red"),
            Candidate::new(30, "Cid", "Green"),
            Candidate::new(40, "Dan", "Gold"),
        ]
    }

    #[test]
    fn ranks_by_count_with_zero_fill() {
        let ranked = rank_results(&candidates(), &[(30, 7), (10, 3)]);

        let ids: Vec<i64> = ranked.iter().map(|e| e.candidate_id).collect();
        let ranks: Vec<u32> = ranked.iter().map(|e| e.rank).collect();
        assert_eq!(ids, vec![30, 10, 20, 40]);
        assert_eq!(ranks, vec![1, 2, 3, 4]);
        assert_eq!(ranked[2].vote_count, 0);
        assert_eq!(total_votes(&ranked), 10);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let ranked = rank_results(&candidates(), &[(40, 5), (20, 5), (10, 5)]);
        let ids: Vec<i64> = ranked.iter().map(|e| e.candidate_id).collect();
        assert_eq!(ids, vec![10, 20, 40, 30]);
    }

    #[test]
    fn advancing_set_is_top_two() {
        let ranked = rank_results(&candidates(), &[(20, 1), (30, 9), (40, 4)]);
        let pair = advancing_set(&ranked);
        let ids: Vec<i64> = pair.iter().map(|e| e.candidate_id).collect();
        assert_eq!(ids, vec![30, 40]);
    }

    #[test]
    fn single_candidate_advances_alone() {
        let ranked = rank_results(&candidates()[..1], &[(10, 2)]);
        assert_eq!(advancing_set(&ranked).len(), 1);
    }

    #[test]
    fn counts_for_ineligible_candidates_are_ignored() {
        let ranked = rank_results(&candidates()[..2], &[(10, 1), (99, 50)]);
        assert_eq!(ranked.len(), 2);
        assert_eq!(total_votes(&ranked), 1);
    }

    #[test]
    fn parties_are_counted_alphabetically() {
        let mut candidates = candidates();
        candidates.push(Candidate::new(9, "Dana", "Blue"));
        let counts = party_counts(&candidates);

        assert_eq!(counts.iter().map(|(_, n)| n).sum::<usize>(), candidates.len());
        assert!(counts.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(counts.contains(&("Blue".to_string(), 2)));
        assert!(party_counts(&[]).is_empty());
    }
}
