//! Storage seams consumed by the election engine.
//!
//! The engine never talks to SQLite directly; it takes any `S: ElectionStore`.
//! `crate::db::Database` is the production implementation.

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;

use crate::models::{Ballot, Candidate, Preference, Round, RoundResultEntry, Sentiment, StoredResults, Voter};

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;
pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CandidateSource {
    /// All candidates in insertion order.
    async fn list_candidates(&self) -> StoreResult<Vec<Candidate>>;
    async fn get_candidate(&self, id: i64) -> StoreResult<Option<Candidate>>;
}

#[async_trait]
pub trait BallotSink {
    /// Insert the voter's ballot, or replace the one they already have.
    async fn upsert_ballot(&self, voter_id: &str, round: Round, candidate: &Candidate) -> StoreResult<()>;
    async fn get_ballot(&self, voter_id: &str) -> StoreResult<Option<Ballot>>;
    /// Per-candidate counts of ballots cast in `round`, optionally restricted to
    /// `eligible`. Candidates without ballots are omitted.
    async fn tally(&self, round: Round, eligible: Option<&[i64]>) -> StoreResult<Vec<(i64, u32)>>;
    async fn count_ballots(&self, round: Round, eligible: Option<&[i64]>) -> StoreResult<u32>;
    async fn clear_round_ballots(&self, round: Round) -> StoreResult<()>;
    async fn clear_ballots(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait PreferenceSink {
    async fn upsert_preference(
        &self,
        voter_id: &str,
        candidate_id: i64,
        sentiment: Sentiment,
        strength: u8,
    ) -> StoreResult<()>;
    async fn list_preferences(&self, voter_id: &str) -> StoreResult<Vec<Preference>>;
    /// Drop preferences held by synthetic voters.
    async fn clear_synthetic_preferences(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait RoundResultSink {
    async fn save_round_results(&self, round: Round, ranked: &[RoundResultEntry]) -> StoreResult<()>;
    async fn save_advancing_set(&self, pair: &[RoundResultEntry]) -> StoreResult<()>;
    async fn load_results(&self) -> StoreResult<StoredResults>;
    async fn clear_results(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait VoterRegistry {
    /// Insert a voter. Returns `false` if the identifier is already taken.
    async fn insert_voter(&self, voter: &Voter) -> StoreResult<bool>;
    async fn get_voter(&self, identifier: &str) -> StoreResult<Option<Voter>>;
    async fn human_identifiers(&self) -> StoreResult<Vec<String>>;
    async fn clear_synthetic_voters(&self) -> StoreResult<()>;
}

/// Everything the engine needs from persistence.
pub trait ElectionStore:
    CandidateSource + BallotSink + PreferenceSink + RoundResultSink + VoterRegistry + Send + Sync
{
}

impl<T> ElectionStore for T where
    T: CandidateSource + BallotSink + PreferenceSink + RoundResultSink + VoterRegistry + Send + Sync
{
}
