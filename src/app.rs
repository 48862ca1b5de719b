use serenity::model::id::UserId;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::db::Database;
use crate::election::{ElectionError, Phase, SimulationSession};
use crate::election::session::HumanVoteOutcome;
use crate::models::{Candidate, RoundResultEntry};
use crate::notify::Announcer;
use crate::store::CandidateSource;

/// Everything an interaction handler can reach.
pub struct AppState {
    pub database: Database,
    /// One writer at a time: every engine operation locks this first.
    pub session: Mutex<SimulationSession>,
    pub announcer: Announcer,
    /// Discord users and the voter identifier they logged in with.
    logins: Mutex<HashMap<UserId, String>>,
}

impl AppState {
    pub fn new(database: Database, session: SimulationSession, announcer: Announcer) -> Self {
        Self {
            database,
            session: Mutex::new(session),
            announcer,
            logins: Mutex::new(HashMap::new()),
        }
    }

    pub async fn bind_login(&self, user: UserId, identifier: &str) {
        self.logins.lock().await.insert(user, identifier.to_string());
    }

    pub async fn logged_in_as(&self, user: UserId) -> Option<String> {
        self.logins.lock().await.get(&user).cloned()
    }

    /// Route a human ballot to whichever round is waiting for one.
    pub async fn submit_vote(&self, voter_id: &str, candidate_id: i64) -> Result<HumanVoteOutcome, ElectionError> {
        let mut session = self.session.lock().await;
        match session.phase() {
            Phase::SecondRoundAwaitingUser | Phase::Completed => {
                session
                    .submit_human_second_round_vote(&self.database, voter_id, candidate_id)
                    .await
            }
            _ => {
                session
                    .submit_human_first_round_vote(&self.database, voter_id, candidate_id)
                    .await
            }
        }
    }

    /// Candidates a human may vote for right now, or `None` when no round is open.
    pub async fn ballot_choices(&self) -> Result<Option<Vec<Candidate>>, ElectionError> {
        let session = self.session.lock().await;
        match session.phase() {
            Phase::FirstRoundAwaitingUser => Ok(Some(self.database.list_candidates().await?)),
            Phase::SecondRoundAwaitingUser | Phase::Completed => {
                let results = session.get_results(&self.database).await?;
                let finalists = finalist_ids(&results.advancing);
                let candidates = self.database.list_candidates().await?;
                Ok(Some(
                    finalists
                        .iter()
                        .filter_map(|id| candidates.iter().find(|c| c.id == *id).cloned())
                        .collect(),
                ))
            }
            _ => Ok(None),
        }
    }
}

fn finalist_ids(advancing: &[RoundResultEntry]) -> Vec<i64> {
    advancing.iter().map(|e| e.candidate_id).collect()
}
