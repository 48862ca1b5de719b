//! The round orchestrator.
//!
//! A `SimulationSession` owns the election phase, the identifier generator and
//! the RNG. Every operation takes the store it should work against, so the same
//! session logic runs over SQLite in production and over memory in tests.
//! Callers must not run two operations on one session at the same time.

use log::{debug, error, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::decision::{DecisionReason, choose_candidate, fresh_preferences, needs_fresh_preferences};
use super::identifiers::{DEFAULT_MAX_ATTEMPTS, IdentifierGenerator, validate_identifier};
use super::seeding::seed_from_history;
use super::tally::{advancing_set, rank_results, total_votes};
use super::verify::{RoundExpectation, check_advancing, check_round};
use super::{ElectionError, Phase};
use crate::models::{Ballot, Candidate, Preference, Round, RoundResultEntry, Voter};
use crate::store::ElectionStore;

pub const DEFAULT_VOTER_COUNT: usize = 100;

#[derive(Debug, Clone)]
pub struct ElectionConfig {
    /// Synthetic voters generated per round.
    pub voter_count: usize,
    /// Draws allowed per identifier before generation gives up.
    pub max_attempts: u32,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            voter_count: DEFAULT_VOTER_COUNT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecisionCounts {
    pub positive: usize,
    pub least_negative: usize,
    pub random: usize,
}

impl DecisionCounts {
    fn record(&mut self, reason: DecisionReason) {
        match reason {
            DecisionReason::PositivePreference => self.positive += 1,
            DecisionReason::LeastNegativePreference => self.least_negative += 1,
            DecisionReason::RandomFallback => self.random += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundOutcome {
    pub round: Round,
    pub run_id: Uuid,
    pub results: Vec<RoundResultEntry>,
    /// Top two of the first round; the runoff pair for the second.
    pub advancing: Vec<RoundResultEntry>,
    pub synthetic_voters: usize,
    pub ballots_cast: u32,
    pub skipped: usize,
    pub decisions: DecisionCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct HumanVoteOutcome {
    pub round: Round,
    pub results: Vec<RoundResultEntry>,
    pub advancing: Vec<RoundResultEntry>,
    pub choice: Ballot,
    pub total_voters: u32,
    /// Set once the second round has been decided.
    pub winner: Option<RoundResultEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElectionResults {
    pub phase: Phase,
    pub run_id: Uuid,
    pub first_round: Vec<RoundResultEntry>,
    pub second_round: Vec<RoundResultEntry>,
    pub advancing: Vec<RoundResultEntry>,
}

impl ElectionResults {
    pub fn winner(&self) -> Option<&RoundResultEntry> {
        if self.phase == Phase::Completed {
            self.second_round.first()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub voter: Voter,
    pub preferences: Vec<Preference>,
}

#[derive(Default)]
struct BatchSummary {
    generated: usize,
    cast: u32,
    skipped: usize,
    decisions: DecisionCounts,
}

pub struct SimulationSession {
    config: ElectionConfig,
    phase: Phase,
    run_id: Uuid,
    rng: StdRng,
    identifiers: IdentifierGenerator,
    synthetic_cast: HashMap<Round, u32>,
    human_voters: HashMap<Round, HashSet<String>>,
}

impl SimulationSession {
    pub fn new(config: ElectionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let identifiers = IdentifierGenerator::new(Vec::new(), config.max_attempts);
        Self {
            config,
            phase: Phase::NotStarted,
            run_id: Uuid::new_v4(),
            rng,
            identifiers,
            synthetic_cast: HashMap::new(),
            human_voters: HashMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn guard(&self, operation: &'static str, allowed: &[Phase]) -> Result<(), ElectionError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ElectionError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    // --- Rounds ---

    pub async fn run_first_round_auto<S: ElectionStore>(&mut self, store: &S) -> Result<RoundOutcome, ElectionError> {
        self.guard(
            "run the first round",
            &[
                Phase::NotStarted,
                Phase::FirstRoundAwaitingUser,
                Phase::SecondRoundAwaitingUser,
                Phase::Completed,
            ],
        )?;
        let mut restore = self.phase;
        self.phase = Phase::FirstRoundAuto;

        match self.first_round(store, &mut restore).await {
            Ok(outcome) => {
                self.phase = Phase::FirstRoundAwaitingUser;
                Ok(outcome)
            }
            Err(e) => {
                error!("First round simulation failed: {}", e);
                self.phase = restore;
                Err(e)
            }
        }
    }

    /// `restore` becomes `NotStarted` once earlier ballots and results are gone.
    async fn first_round<S: ElectionStore>(
        &mut self,
        store: &S,
        restore: &mut Phase,
    ) -> Result<RoundOutcome, ElectionError> {
        info!("Starting automatic first round simulation (run {})", self.run_id);

        let candidates = store.list_candidates().await?;
        if candidates.is_empty() {
            return Err(ElectionError::NoCandidates);
        }

        *restore = Phase::NotStarted;
        self.synthetic_cast.clear();
        self.human_voters.clear();
        store.clear_ballots().await?;
        store.clear_results().await?;

        let batch = self.cast_synthetic_batch(store, &candidates, Round::First).await?;
        let results = self.tally_round(store, &candidates, Round::First).await?;
        let advancing = self.persist_first_round(store, &results).await?;

        info!(
            "Automatic first round completed: {} ballots cast, {} skipped",
            batch.cast, batch.skipped
        );
        for entry in &advancing {
            info!(
                "{}. {} ({}) - {} votes",
                entry.rank, entry.name, entry.party, entry.vote_count
            );
        }

        Ok(RoundOutcome {
            round: Round::First,
            run_id: self.run_id,
            results,
            advancing,
            synthetic_voters: batch.generated,
            ballots_cast: batch.cast,
            skipped: batch.skipped,
            decisions: batch.decisions,
        })
    }

    pub async fn run_second_round_auto<S: ElectionStore>(&mut self, store: &S) -> Result<RoundOutcome, ElectionError> {
        self.guard(
            "run the second round",
            &[
                Phase::FirstRoundAwaitingUser,
                Phase::SecondRoundAwaitingUser,
                Phase::Completed,
            ],
        )?;
        let previous = self.phase;
        self.phase = Phase::SecondRoundAuto;

        match self.second_round(store).await {
            Ok(outcome) => {
                self.phase = Phase::SecondRoundAwaitingUser;
                Ok(outcome)
            }
            Err(e) => {
                error!("Second round simulation failed: {}", e);
                self.phase = previous;
                Err(e)
            }
        }
    }

    async fn second_round<S: ElectionStore>(&mut self, store: &S) -> Result<RoundOutcome, ElectionError> {
        info!("Starting automatic second round simulation (run {})", self.run_id);

        let finalists = self.finalists(store).await?;

        store.clear_round_ballots(Round::Second).await?;
        self.synthetic_cast.remove(&Round::Second);
        self.human_voters.remove(&Round::Second);

        let batch = self.cast_synthetic_batch(store, &finalists, Round::Second).await?;
        let results = self.tally_round(store, &finalists, Round::Second).await?;
        store.save_round_results(Round::Second, &results).await?;

        info!(
            "Automatic second round completed: {} ballots cast, {} skipped. Waiting for user vote",
            batch.cast, batch.skipped
        );

        Ok(RoundOutcome {
            round: Round::Second,
            run_id: self.run_id,
            advancing: results.clone(),
            results,
            synthetic_voters: batch.generated,
            ballots_cast: batch.cast,
            skipped: batch.skipped,
            decisions: batch.decisions,
        })
    }

    // --- Human ballots ---

    pub async fn submit_human_first_round_vote<S: ElectionStore>(
        &mut self,
        store: &S,
        voter_id: &str,
        candidate_id: i64,
    ) -> Result<HumanVoteOutcome, ElectionError> {
        self.guard("vote in the first round", &[Phase::FirstRoundAwaitingUser])?;
        info!("Processing user vote: voter={}, candidate={}", voter_id, candidate_id);

        self.require_human(store, voter_id).await?;
        let candidate = store
            .get_candidate(candidate_id)
            .await?
            .ok_or(ElectionError::CandidateNotFound(candidate_id))?;

        let choice = self.record_human_ballot(store, voter_id, &candidate, Round::First).await?;

        let candidates = store.list_candidates().await?;
        let results = self.tally_round(store, &candidates, Round::First).await?;
        let advancing = self.persist_first_round(store, &results).await?;

        info!(
            "User vote for {} ({}) counted; top candidates: {}",
            candidate.name,
            candidate.party,
            advancing.iter().map(|e| e.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        Ok(HumanVoteOutcome {
            round: Round::First,
            total_voters: total_votes(&results),
            results,
            advancing,
            choice,
            winner: None,
        })
    }

    pub async fn submit_human_second_round_vote<S: ElectionStore>(
        &mut self,
        store: &S,
        voter_id: &str,
        candidate_id: i64,
    ) -> Result<HumanVoteOutcome, ElectionError> {
        self.guard(
            "vote in the second round",
            &[Phase::SecondRoundAwaitingUser, Phase::Completed],
        )?;
        info!(
            "Processing user second round vote: voter={}, candidate={}",
            voter_id, candidate_id
        );

        self.require_human(store, voter_id).await?;
        let candidate = store
            .get_candidate(candidate_id)
            .await?
            .ok_or(ElectionError::CandidateNotFound(candidate_id))?;
        let finalists = self.finalists(store).await?;
        if !finalists.iter().any(|c| c.id == candidate.id) {
            return Err(ElectionError::CandidateNotAdvancing(candidate.id));
        }

        let choice = self.record_human_ballot(store, voter_id, &candidate, Round::Second).await?;
        let results = self.tally_round(store, &finalists, Round::Second).await?;
        store.save_round_results(Round::Second, &results).await?;
        self.phase = Phase::Completed;

        let winner = results.first().cloned();
        if let Some(w) = &winner {
            info!("Winner: {} ({}) with {} votes", w.name, w.party, w.vote_count);
        }

        Ok(HumanVoteOutcome {
            round: Round::Second,
            total_voters: total_votes(&results),
            advancing: results.clone(),
            results,
            choice,
            winner,
        })
    }

    // --- Results & reset ---

    pub async fn get_results<S: ElectionStore>(&self, store: &S) -> Result<ElectionResults, ElectionError> {
        let stored = store.load_results().await?;
        Ok(ElectionResults {
            phase: self.phase,
            run_id: self.run_id,
            first_round: stored.first_round,
            second_round: stored.second_round,
            advancing: stored.advancing,
        })
    }

    pub async fn reset_election<S: ElectionStore>(&mut self, store: &S) -> Result<(), ElectionError> {
        store.clear_ballots().await?;
        store.clear_results().await?;
        store.clear_synthetic_preferences().await?;
        store.clear_synthetic_voters().await?;

        self.synthetic_cast.clear();
        self.human_voters.clear();
        self.identifiers.reset();
        self.phase = Phase::NotStarted;
        self.run_id = Uuid::new_v4();

        info!("Election simulation reset (new run {})", self.run_id);
        Ok(())
    }

    // --- Voter registry ---

    pub async fn register_voter<S: ElectionStore>(
        &self,
        store: &S,
        identifier: &str,
        display_name: &str,
    ) -> Result<Voter, ElectionError> {
        validate_identifier(identifier)?;
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ElectionError::InvalidDisplayName);
        }

        let voter = Voter::human(identifier, display_name);
        if !store.insert_voter(&voter).await? {
            return Err(ElectionError::DuplicateIdentifier(identifier.to_string()));
        }
        info!("Registered voter {} ({})", voter.identifier, voter.display_name);
        Ok(voter)
    }

    /// Resolve a returning voter and reseed their preferences from their last ballot.
    pub async fn login_voter<S: ElectionStore>(
        &mut self,
        store: &S,
        identifier: &str,
    ) -> Result<LoginOutcome, ElectionError> {
        let voter = self.require_human(store, identifier).await?;
        let last_ballot = store.get_ballot(identifier).await?;
        let candidates = store.list_candidates().await?;

        let drafts = seed_from_history(&candidates, last_ballot.as_ref(), &mut self.rng);
        for draft in &drafts {
            store
                .upsert_preference(identifier, draft.candidate_id, draft.sentiment, draft.strength)
                .await?;
        }
        info!(
            "Seeded {} preferences for voter {} ({})",
            drafts.len(),
            identifier,
            if last_ballot.is_some() { "from voting history" } else { "random" }
        );

        let preferences = store.list_preferences(identifier).await?;
        Ok(LoginOutcome { voter, preferences })
    }

    pub async fn voter_preferences<S: ElectionStore>(
        &self,
        store: &S,
        identifier: &str,
    ) -> Result<Vec<Preference>, ElectionError> {
        self.require_human(store, identifier).await?;
        Ok(store.list_preferences(identifier).await?)
    }

    // --- Internals ---

    async fn require_human<S: ElectionStore>(&self, store: &S, identifier: &str) -> Result<Voter, ElectionError> {
        validate_identifier(identifier)?;
        match store.get_voter(identifier).await? {
            Some(voter) if !voter.is_synthetic() => Ok(voter),
            _ => Err(ElectionError::VoterNotRegistered(identifier.to_string())),
        }
    }

    /// Candidates of the stored advancing set, in insertion order so runoff
    /// ties break the same way first-round ties do.
    async fn finalists<S: ElectionStore>(&self, store: &S) -> Result<Vec<Candidate>, ElectionError> {
        let stored = store.load_results().await?;
        if stored.advancing.len() != 2 {
            return Err(ElectionError::InsufficientCandidates {
                found: stored.advancing.len(),
            });
        }

        let finalists: Vec<Candidate> = store
            .list_candidates()
            .await?
            .into_iter()
            .filter(|c| stored.advancing.iter().any(|e| e.candidate_id == c.id))
            .collect();
        if let Some(missing) = stored
            .advancing
            .iter()
            .find(|e| !finalists.iter().any(|c| c.id == e.candidate_id))
        {
            return Err(ElectionError::CandidateNotFound(missing.candidate_id));
        }
        Ok(finalists)
    }

    async fn record_human_ballot<S: ElectionStore>(
        &mut self,
        store: &S,
        voter_id: &str,
        candidate: &Candidate,
        round: Round,
    ) -> Result<Ballot, ElectionError> {
        if let Some(existing) = store.get_ballot(voter_id).await? {
            debug!(
                "Voter {} already holds a {} ballot for {}; replacing it",
                voter_id, existing.round, existing.candidate_name
            );
        }
        store.upsert_ballot(voter_id, round, candidate).await?;
        self.human_voters
            .entry(round)
            .or_default()
            .insert(voter_id.to_string());

        match store.get_ballot(voter_id).await? {
            Some(ballot) => Ok(ballot),
            None => Err(ElectionError::Store(
                format!("ballot for voter {} vanished after write", voter_id).into(),
            )),
        }
    }

    async fn cast_synthetic_batch<S: ElectionStore>(
        &mut self,
        store: &S,
        eligible: &[Candidate],
        round: Round,
    ) -> Result<BatchSummary, ElectionError> {
        let humans = store.human_identifiers().await?;
        self.identifiers.set_reserved(humans);
        let voters = self
            .identifiers
            .generate_random_voters(self.config.voter_count, &mut self.rng)?;

        let mut summary = BatchSummary {
            generated: voters.len(),
            ..BatchSummary::default()
        };

        for voter in &voters {
            match self.cast_synthetic_ballot(store, voter, eligible, round).await {
                Ok(reason) => {
                    summary.cast += 1;
                    summary.decisions.record(reason);
                }
                Err(e) => {
                    warn!("Skipping ballot for synthetic voter {}: {}", voter.identifier, e);
                    summary.skipped += 1;
                }
            }
        }

        self.synthetic_cast.insert(round, summary.cast);
        Ok(summary)
    }

    async fn cast_synthetic_ballot<S: ElectionStore>(
        &mut self,
        store: &S,
        voter: &Voter,
        eligible: &[Candidate],
        round: Round,
    ) -> Result<DecisionReason, ElectionError> {
        // Returning identifiers keep their existing row.
        store.insert_voter(voter).await?;

        let mut preferences = store.list_preferences(&voter.identifier).await?;
        if needs_fresh_preferences(eligible, &preferences) {
            for draft in fresh_preferences(eligible, &mut self.rng) {
                store
                    .upsert_preference(&voter.identifier, draft.candidate_id, draft.sentiment, draft.strength)
                    .await?;
                preferences.push(Preference {
                    voter_id: voter.identifier.clone(),
                    candidate_id: draft.candidate_id,
                    sentiment: draft.sentiment,
                    strength: draft.strength,
                });
            }
        }

        let decision = choose_candidate(eligible, &preferences, &mut self.rng).ok_or(ElectionError::NoCandidates)?;
        debug!(
            "{} ({}) votes for {} by {}",
            voter.display_name, voter.identifier, decision.candidate.name, decision.reason
        );
        store.upsert_ballot(&voter.identifier, round, decision.candidate).await?;
        Ok(decision.reason)
    }

    async fn tally_round<S: ElectionStore>(
        &self,
        store: &S,
        eligible: &[Candidate],
        round: Round,
    ) -> Result<Vec<RoundResultEntry>, ElectionError> {
        let ids: Vec<i64> = eligible.iter().map(|c| c.id).collect();
        let counts = store.tally(round, Some(&ids)).await?;
        let results = rank_results(eligible, &counts);

        let expectation = RoundExpectation {
            stored_ballots: store.count_ballots(round, Some(&ids)).await?,
            synthetic_cast: self.synthetic_cast.get(&round).copied().unwrap_or(0),
            human_cast: self.human_voters.get(&round).map_or(0, |v| v.len() as u32),
        };
        let violations = check_round(&results, expectation);
        if !violations.is_empty() {
            for violation in &violations {
                error!("{} consistency violation: {}", round, violation);
            }
            return Err(ElectionError::Inconsistent(violations));
        }
        Ok(results)
    }

    async fn persist_first_round<S: ElectionStore>(
        &self,
        store: &S,
        results: &[RoundResultEntry],
    ) -> Result<Vec<RoundResultEntry>, ElectionError> {
        let advancing = advancing_set(results);
        let violations = check_advancing(results, &advancing);
        if !violations.is_empty() {
            return Err(ElectionError::Inconsistent(violations));
        }
        store.save_round_results(Round::First, results).await?;
        store.save_advancing_set(&advancing).await?;
        Ok(advancing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, Sentiment};
    use crate::store::memory::MemoryStore;
    use crate::election::identifiers::IDENTIFIER_SPACE;
    use crate::store::{BallotSink, PreferenceSink, RoundResultSink, VoterRegistry};

    const HUMAN: &str = "24680";

    fn session(voter_count: usize, seed: u64) -> SimulationSession {
        SimulationSession::new(ElectionConfig {
            voter_count,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            seed: Some(seed),
        })
    }

    async fn with_human(store: &MemoryStore, session: &SimulationSession) {
        session.register_voter(store, HUMAN, "Maria Popescu").await.unwrap();
    }

    fn ids(entries: &[RoundResultEntry]) -> Vec<i64> {
        entries.iter().map(|e| e.candidate_id).collect()
    }

    #[tokio::test]
    async fn first_round_ranks_every_candidate() {
        let store = MemoryStore::sample();
        let mut session = session(90, 1);

        let outcome = session.run_first_round_auto(&store).await.unwrap();

        assert_eq!(outcome.results.len(), 5);
        assert_eq!(total_votes(&outcome.results), 90);
        assert_eq!(outcome.advancing.len(), 2);
        assert_eq!(outcome.advancing, outcome.results[..2].to_vec());
        let ranks: Vec<u32> = outcome.results.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert_eq!(outcome.synthetic_voters, 90);
        assert_eq!(outcome.ballots_cast, 90);
        let decisions = outcome.decisions;
        assert_eq!(decisions.positive + decisions.least_negative + decisions.random, 90);

        assert_eq!(session.phase(), Phase::FirstRoundAwaitingUser);
        assert_eq!(store.ballot_total(), 90);
        assert_eq!(store.preference_total(), 90 * 5);

        let stored = store.load_results().await.unwrap();
        assert_eq!(stored.first_round, outcome.results);
        assert_eq!(stored.advancing, outcome.advancing);
    }

    #[tokio::test]
    async fn first_round_without_candidates_fails() {
        let store = MemoryStore::default();
        let mut session = session(10, 1);

        let err = session.run_first_round_auto(&store).await.unwrap_err();
        assert!(matches!(err, ElectionError::NoCandidates));
        assert_eq!(session.phase(), Phase::NotStarted);
    }

    #[tokio::test]
    async fn rerunning_first_round_replaces_ballots() {
        let store = MemoryStore::sample();
        let mut session = session(40, 2);

        session.run_first_round_auto(&store).await.unwrap();
        let outcome = session.run_first_round_auto(&store).await.unwrap();

        assert_eq!(store.ballot_total(), 40);
        assert_eq!(total_votes(&outcome.results), 40);
    }

    #[tokio::test]
    async fn human_first_round_vote_is_idempotent() {
        let store = MemoryStore::sample();
        let mut session = session(90, 3);
        with_human(&store, &session).await;
        session.run_first_round_auto(&store).await.unwrap();

        let first = session.submit_human_first_round_vote(&store, HUMAN, 4).await.unwrap();
        assert_eq!(store.ballot_total(), 91);
        assert_eq!(first.total_voters, 91);
        assert_eq!(first.choice.candidate_id, 4);
        assert_eq!(first.choice.round, Round::First);

        let second = session.submit_human_first_round_vote(&store, HUMAN, 4).await.unwrap();
        assert_eq!(store.ballot_total(), 91);
        assert_eq!(second.total_voters, 91);
        assert_eq!(second.results, first.results);
        assert_eq!(session.phase(), Phase::FirstRoundAwaitingUser);
    }

    #[tokio::test]
    async fn human_vote_can_change_the_advancing_pair() {
        let store = MemoryStore::with_candidates(vec![
            Candidate::new(1, "Ana", "Blue"),
            Candidate::new(2, "Bob", "Red"),
            Candidate::new(3, "Cid", "Green"),
        ]);
        let mut session = session(0, 4);
        with_human(&store, &session).await;
        let outcome = session.run_first_round_auto(&store).await.unwrap();
        assert_eq!(ids(&outcome.advancing), vec![1, 2]);

        let vote = session.submit_human_first_round_vote(&store, HUMAN, 3).await.unwrap();
        assert_eq!(ids(&vote.advancing), vec![3, 1]);
        assert_eq!(ids(&store.load_results().await.unwrap().advancing), vec![3, 1]);
    }

    #[tokio::test]
    async fn human_vote_for_unknown_candidate_is_rejected() {
        let store = MemoryStore::sample();
        let mut session = session(20, 5);
        with_human(&store, &session).await;
        session.run_first_round_auto(&store).await.unwrap();

        let err = session.submit_human_first_round_vote(&store, HUMAN, 99).await.unwrap_err();
        assert!(matches!(err, ElectionError::CandidateNotFound(99)));
        assert_eq!(store.ballot_total(), 20);
        assert!(store.get_ballot(HUMAN).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn human_vote_requires_registration() {
        let store = MemoryStore::sample();
        let mut session = session(10, 6);
        session.run_first_round_auto(&store).await.unwrap();

        let err = session.submit_human_first_round_vote(&store, "13579", 1).await.unwrap_err();
        assert!(matches!(err, ElectionError::VoterNotRegistered(_)));

        let err = session.submit_human_first_round_vote(&store, "abc", 1).await.unwrap_err();
        assert!(matches!(err, ElectionError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn operations_respect_the_phase() {
        let store = MemoryStore::sample();
        let mut session = session(10, 7);
        with_human(&store, &session).await;

        let err = session.submit_human_first_round_vote(&store, HUMAN, 1).await.unwrap_err();
        assert!(matches!(err, ElectionError::InvalidPhase { phase: Phase::NotStarted, .. }));

        let err = session.run_second_round_auto(&store).await.unwrap_err();
        assert!(matches!(err, ElectionError::InvalidPhase { .. }));

        session.run_first_round_auto(&store).await.unwrap();
        let err = session.submit_human_second_round_vote(&store, HUMAN, 1).await.unwrap_err();
        assert!(matches!(err, ElectionError::InvalidPhase { .. }));
    }

    #[tokio::test]
    async fn second_round_needs_two_finalists() {
        let store = MemoryStore::with_candidates(vec![Candidate::new(1, "Solo", "Only")]);
        let mut session = session(10, 8);
        session.run_first_round_auto(&store).await.unwrap();

        let err = session.run_second_round_auto(&store).await.unwrap_err();
        assert!(matches!(err, ElectionError::InsufficientCandidates { found: 1 }));
        assert_eq!(session.phase(), Phase::FirstRoundAwaitingUser);
    }

    #[tokio::test]
    async fn second_round_is_restricted_to_finalists() {
        let store = MemoryStore::sample();
        let mut session = session(90, 9);
        with_human(&store, &session).await;
        session.run_first_round_auto(&store).await.unwrap();
        session.submit_human_first_round_vote(&store, HUMAN, 5).await.unwrap();

        let second = session.run_second_round_auto(&store).await.unwrap();
        let stored_advancing = ids(&store.load_results().await.unwrap().advancing);
        let runoff = ids(&second.results);

        assert_eq!(session.phase(), Phase::SecondRoundAwaitingUser);
        assert_eq!(runoff.len(), 2);
        assert!(runoff.iter().all(|id| stored_advancing.contains(id)));
        // The human's first-round ballot does not count in the runoff.
        assert_eq!(total_votes(&second.results), 90);
        assert_eq!(store.count_ballots(Round::Second, None).await.unwrap(), 90);
    }

    #[tokio::test]
    async fn runoff_ties_follow_candidate_order() {
        let store = MemoryStore::with_candidates(vec![
            Candidate::new(1, "Ana", "Blue"),
            Candidate::new(2, "Bob", "Red"),
            Candidate::new(3, "Cid", "Green"),
        ]);
        let mut session = session(0, 18);
        with_human(&store, &session).await;
        session.run_first_round_auto(&store).await.unwrap();
        let vote = session.submit_human_first_round_vote(&store, HUMAN, 2).await.unwrap();
        assert_eq!(ids(&vote.advancing), vec![2, 1]);

        let runoff = session.run_second_round_auto(&store).await.unwrap();
        assert_eq!(ids(&runoff.results), vec![1, 2]);
        assert!(runoff.results.iter().all(|e| e.vote_count == 0));
        assert_eq!(runoff.results[0].rank, 1);

        let decided = session.submit_human_second_round_vote(&store, HUMAN, 2).await.unwrap();
        assert_eq!(decided.winner.unwrap().candidate_id, 2);
    }

    #[tokio::test]
    async fn failed_rerun_after_wipe_falls_back_to_not_started() {
        let store = MemoryStore::sample();
        let mut session = session(10, 19);
        with_human(&store, &session).await;
        session.run_first_round_auto(&store).await.unwrap();
        assert_eq!(session.phase(), Phase::FirstRoundAwaitingUser);

        session.config.voter_count = IDENTIFIER_SPACE + 1;
        let err = session.run_first_round_auto(&store).await.unwrap_err();
        assert!(matches!(err, ElectionError::GenerationExhausted { .. }));
        assert_eq!(session.phase(), Phase::NotStarted);
        assert!(store.load_results().await.unwrap().first_round.is_empty());

        let err = session.submit_human_first_round_vote(&store, HUMAN, 1).await.unwrap_err();
        assert!(matches!(err, ElectionError::InvalidPhase { phase: Phase::NotStarted, .. }));
    }

    #[tokio::test]
    async fn second_round_rejects_non_finalist_without_touching_ballots() {
        let store = MemoryStore::sample();
        let mut session = session(30, 10);
        with_human(&store, &session).await;
        session.run_first_round_auto(&store).await.unwrap();
        session.run_second_round_auto(&store).await.unwrap();

        let advancing = ids(&store.load_results().await.unwrap().advancing);
        let outsider = (1..=5).find(|id| !advancing.contains(id)).unwrap();
        let before = store.ballot_total();

        let err = session
            .submit_human_second_round_vote(&store, HUMAN, outsider)
            .await
            .unwrap_err();
        assert!(matches!(err, ElectionError::CandidateNotAdvancing(id) if id == outsider));
        assert_eq!(store.ballot_total(), before);
        assert!(store.get_ballot(HUMAN).await.unwrap().is_none());
        assert_eq!(session.phase(), Phase::SecondRoundAwaitingUser);
    }

    #[tokio::test]
    async fn human_second_round_vote_decides_the_winner() {
        let store = MemoryStore::sample();
        let mut session = session(50, 11);
        with_human(&store, &session).await;
        session.run_first_round_auto(&store).await.unwrap();
        session.submit_human_first_round_vote(&store, HUMAN, 1).await.unwrap();
        session.run_second_round_auto(&store).await.unwrap();

        let finalist = store.load_results().await.unwrap().advancing[1].candidate_id;
        let outcome = session
            .submit_human_second_round_vote(&store, HUMAN, finalist)
            .await
            .unwrap();

        assert_eq!(session.phase(), Phase::Completed);
        assert_eq!(outcome.total_voters, 51);
        assert_eq!(outcome.choice.round, Round::Second);
        let winner = outcome.winner.unwrap();
        assert_eq!(winner.rank, 1);
        assert_eq!(winner, outcome.results[0]);

        let results = session.get_results(&store).await.unwrap();
        assert_eq!(results.winner(), Some(&winner));
        assert_eq!(results.second_round, outcome.results);
    }

    #[tokio::test]
    async fn failed_ballot_writes_are_skipped() {
        let store = MemoryStore::sample();
        let mut session = session(30, 12);
        store.fail_next_ballot_writes(3);

        let outcome = session.run_first_round_auto(&store).await.unwrap();

        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.ballots_cast, 27);
        assert_eq!(total_votes(&outcome.results), 27);
    }

    #[tokio::test]
    async fn same_seed_gives_same_results() {
        let first_store = MemoryStore::sample();
        let second_store = MemoryStore::sample();

        let a = session(60, 77).run_first_round_auto(&first_store).await.unwrap();
        let b = session(60, 77).run_first_round_auto(&second_store).await.unwrap();

        assert_eq!(a.results, b.results);
        assert_eq!(a.decisions, b.decisions);
    }

    #[tokio::test]
    async fn reset_clears_results_but_keeps_humans() {
        let store = MemoryStore::sample();
        let mut session = session(40, 13);
        with_human(&store, &session).await;
        session.login_voter(&store, HUMAN).await.unwrap();
        session.run_first_round_auto(&store).await.unwrap();
        session.submit_human_first_round_vote(&store, HUMAN, 2).await.unwrap();
        session.run_second_round_auto(&store).await.unwrap();
        let finalist = store.load_results().await.unwrap().advancing[0].candidate_id;
        session.submit_human_second_round_vote(&store, HUMAN, finalist).await.unwrap();
        let old_run = session.run_id();

        session.reset_election(&store).await.unwrap();

        let results = session.get_results(&store).await.unwrap();
        assert!(results.first_round.is_empty());
        assert!(results.second_round.is_empty());
        assert!(results.advancing.is_empty());
        assert_eq!(results.phase, Phase::NotStarted);
        assert_ne!(results.run_id, old_run);
        assert_eq!(store.ballot_total(), 0);

        let voter = store.get_voter(HUMAN).await.unwrap().unwrap();
        assert_eq!(voter.display_name, "Maria Popescu");
        assert_eq!(store.human_identifiers().await.unwrap(), vec![HUMAN.to_string()]);
        // Only the human's five preferences survive.
        assert_eq!(store.preference_total(), 5);
    }

    #[tokio::test]
    async fn registration_validates_input() {
        let store = MemoryStore::sample();
        let session = session(0, 14);
        with_human(&store, &session).await;

        let err = session.register_voter(&store, HUMAN, "Someone Else").await.unwrap_err();
        assert!(matches!(err, ElectionError::DuplicateIdentifier(_)));

        let err = session.register_voter(&store, "1234", "Short").await.unwrap_err();
        assert!(matches!(err, ElectionError::InvalidIdentifier(_)));

        let err = session.register_voter(&store, "11111", "   ").await.unwrap_err();
        assert!(matches!(err, ElectionError::InvalidDisplayName));
    }

    #[tokio::test]
    async fn login_seeds_preferences_from_last_ballot() {
        let store = MemoryStore::sample();
        let mut session = session(10, 15);
        with_human(&store, &session).await;
        session.run_first_round_auto(&store).await.unwrap();
        session.submit_human_first_round_vote(&store, HUMAN, 3).await.unwrap();

        let login = session.login_voter(&store, HUMAN).await.unwrap();

        assert_eq!(login.voter.identifier, HUMAN);
        assert_eq!(login.preferences.len(), 5);
        let chosen = login.preferences.iter().find(|p| p.candidate_id == 3).unwrap();
        assert_eq!(chosen.sentiment, Sentiment::Positive);
        assert!((7..=9).contains(&chosen.strength));
        // Independent has no party mates, so nobody else leans positive.
        assert!(
            login
                .preferences
                .iter()
                .filter(|p| p.candidate_id != 3)
                .all(|p| p.sentiment != Sentiment::Positive)
        );

        let stored = session.voter_preferences(&store, HUMAN).await.unwrap();
        assert_eq!(stored, login.preferences);
    }

    #[tokio::test]
    async fn login_of_unknown_voter_fails() {
        let store = MemoryStore::sample();
        let mut session = session(0, 16);
        let err = session.login_voter(&store, "55555").await.unwrap_err();
        assert!(matches!(err, ElectionError::VoterNotRegistered(_)));
    }

    #[tokio::test]
    async fn synthetic_voters_use_existing_preferences() {
        let store = MemoryStore::with_candidates(vec![
            Candidate::new(1, "Ana", "Blue"),
            Candidate::new(2, "Bob", "Red"),
        ]);
        let mut session = session(25, 17);
        session.run_first_round_auto(&store).await.unwrap();

        // Every synthetic ballot must agree with the rule applied to stored preferences.
        let results = store.load_results().await.unwrap();
        assert_eq!(total_votes(&results.first_round), 25);
        let mut agreeing = 0;
        for id in 10_000..=99_999u32 {
            let id = id.to_string();
            let Some(ballot) = store.get_ballot(&id).await.unwrap() else {
                continue;
            };
            let prefs = store.list_preferences(&id).await.unwrap();
            assert_eq!(prefs.len(), 2);
            let positives: Vec<&Preference> =
                prefs.iter().filter(|p| p.sentiment == Sentiment::Positive).collect();
            if let Some(best) = positives.iter().max_by(|a, b| {
                a.strength.cmp(&b.strength).then(b.candidate_id.cmp(&a.candidate_id))
            }) {
                assert_eq!(ballot.candidate_id, best.candidate_id);
            }
            agreeing += 1;
        }
        assert_eq!(agreeing, 25);
    }
}
