use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{BallotSink, CandidateSource, PreferenceSink, RoundResultSink, StoreResult, VoterRegistry};
use crate::models::{
    Ballot, Candidate, Preference, Round, RoundResultEntry, Sentiment, StoredResults, Voter, VoterKind,
};

#[derive(Default)]
struct State {
    candidates: Vec<Candidate>,
    voters: HashMap<String, Voter>,
    preferences: BTreeMap<(String, i64), Preference>,
    ballots: HashMap<String, Ballot>,
    results: StoredResults,
    failing_ballot_writes: usize,
}

/// In-process store used to exercise the engine without SQLite.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn with_candidates(candidates: Vec<Candidate>) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().candidates = candidates;
        store
    }

    /// Five candidates, two of them sharing a party.
    pub fn sample() -> Self {
        Self::with_candidates(vec![
            Candidate::new(1, "John Smith", "Democratic Party"),
            Candidate::new(2, "Sarah Johnson", "Republican Party"),
            Candidate::new(3, "Michael Chen", "Independent"),
            Candidate::new(4, "Emily Davis", "Green Party"),
            Candidate::new(5, "David Wilson", "Democratic Party"),
        ])
    }

    /// Make the next `count` ballot writes fail.
    pub fn fail_next_ballot_writes(&self, count: usize) {
        self.state.lock().unwrap().failing_ballot_writes = count;
    }

    pub fn ballot_total(&self) -> usize {
        self.state.lock().unwrap().ballots.len()
    }

    pub fn preference_total(&self) -> usize {
        self.state.lock().unwrap().preferences.len()
    }
}

fn eligible_contains(eligible: Option<&[i64]>, candidate_id: i64) -> bool {
    eligible.map_or(true, |ids| ids.contains(&candidate_id))
}

#[async_trait]
impl CandidateSource for MemoryStore {
    async fn list_candidates(&self) -> StoreResult<Vec<Candidate>> {
        Ok(self.state.lock().unwrap().candidates.clone())
    }

    async fn get_candidate(&self, id: i64) -> StoreResult<Option<Candidate>> {
        let state = self.state.lock().unwrap();
        Ok(state.candidates.iter().find(|c| c.id == id).cloned())
    }
}

#[async_trait]
impl BallotSink for MemoryStore {
    async fn upsert_ballot(&self, voter_id: &str, round: Round, candidate: &Candidate) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_ballot_writes > 0 {
            state.failing_ballot_writes -= 1;
            return Err(format!("ballot write rejected for voter {}", voter_id).into());
        }
        state.ballots.insert(
            voter_id.to_string(),
            Ballot {
                voter_id: voter_id.to_string(),
                candidate_id: candidate.id,
                candidate_name: candidate.name.clone(),
                candidate_party: candidate.party.clone(),
                round,
                cast_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_ballot(&self, voter_id: &str) -> StoreResult<Option<Ballot>> {
        Ok(self.state.lock().unwrap().ballots.get(voter_id).cloned())
    }

    async fn tally(&self, round: Round, eligible: Option<&[i64]>) -> StoreResult<Vec<(i64, u32)>> {
        let state = self.state.lock().unwrap();
        let mut counts: BTreeMap<i64, u32> = BTreeMap::new();
        for ballot in state.ballots.values() {
            if ballot.round == round && eligible_contains(eligible, ballot.candidate_id) {
                *counts.entry(ballot.candidate_id).or_insert(0) += 1;
            }
        }
        Ok(counts.into_iter().collect())
    }

    async fn count_ballots(&self, round: Round, eligible: Option<&[i64]>) -> StoreResult<u32> {
        let state = self.state.lock().unwrap();
        let count = state
            .ballots
            .values()
            .filter(|b| b.round == round && eligible_contains(eligible, b.candidate_id))
            .count();
        Ok(count as u32)
    }

    async fn clear_round_ballots(&self, round: Round) -> StoreResult<()> {
        self.state.lock().unwrap().ballots.retain(|_, b| b.round != round);
        Ok(())
    }

    async fn clear_ballots(&self) -> StoreResult<()> {
        self.state.lock().unwrap().ballots.clear();
        Ok(())
    }
}

#[async_trait]
impl PreferenceSink for MemoryStore {
    async fn upsert_preference(
        &self,
        voter_id: &str,
        candidate_id: i64,
        sentiment: Sentiment,
        strength: u8,
    ) -> StoreResult<()> {
        self.state.lock().unwrap().preferences.insert(
            (voter_id.to_string(), candidate_id),
            Preference {
                voter_id: voter_id.to_string(),
                candidate_id,
                sentiment,
                strength,
            },
        );
        Ok(())
    }

    async fn list_preferences(&self, voter_id: &str) -> StoreResult<Vec<Preference>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .preferences
            .values()
            .filter(|p| p.voter_id == voter_id)
            .cloned()
            .collect())
    }

    async fn clear_synthetic_preferences(&self) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let State { voters, preferences, .. } = &mut *state;
        preferences.retain(|(voter_id, _), _| {
            voters.get(voter_id).map_or(false, |v| v.kind == VoterKind::Human)
        });
        Ok(())
    }
}

#[async_trait]
impl RoundResultSink for MemoryStore {
    async fn save_round_results(&self, round: Round, ranked: &[RoundResultEntry]) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        match round {
            Round::First => state.results.first_round = ranked.to_vec(),
            Round::Second => state.results.second_round = ranked.to_vec(),
        }
        Ok(())
    }

    async fn save_advancing_set(&self, pair: &[RoundResultEntry]) -> StoreResult<()> {
        self.state.lock().unwrap().results.advancing = pair.to_vec();
        Ok(())
    }

    async fn load_results(&self) -> StoreResult<StoredResults> {
        Ok(self.state.lock().unwrap().results.clone())
    }

    async fn clear_results(&self) -> StoreResult<()> {
        self.state.lock().unwrap().results = StoredResults::default();
        Ok(())
    }
}

#[async_trait]
impl VoterRegistry for MemoryStore {
    async fn insert_voter(&self, voter: &Voter) -> StoreResult<bool> {
        let mut state = self.state.lock().unwrap();
        if state.voters.contains_key(&voter.identifier) {
            return Ok(false);
        }
        state.voters.insert(voter.identifier.clone(), voter.clone());
        Ok(true)
    }

    async fn get_voter(&self, identifier: &str) -> StoreResult<Option<Voter>> {
        Ok(self.state.lock().unwrap().voters.get(identifier).cloned())
    }

    async fn human_identifiers(&self) -> StoreResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .voters
            .values()
            .filter(|v| v.kind == VoterKind::Human)
            .map(|v| v.identifier.clone())
            .collect())
    }

    async fn clear_synthetic_voters(&self) -> StoreResult<()> {
        self.state
            .lock()
            .unwrap()
            .voters
            .retain(|_, v| v.kind == VoterKind::Human);
        Ok(())
    }
}
