//! Two-round election simulation engine.

pub mod decision;
pub mod identifiers;
pub mod seeding;
pub mod session;
pub mod tally;
pub mod verify;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

pub use session::{ElectionConfig, SimulationSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    NotStarted,
    FirstRoundAuto,
    FirstRoundAwaitingUser,
    SecondRoundAuto,
    SecondRoundAwaitingUser,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::NotStarted => "not started",
            Phase::FirstRoundAuto => "first round (automatic voting)",
            Phase::FirstRoundAwaitingUser => "first round (awaiting your vote)",
            Phase::SecondRoundAuto => "second round (automatic voting)",
            Phase::SecondRoundAwaitingUser => "second round (awaiting your vote)",
            Phase::Completed => "completed",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum ElectionError {
    #[error("No candidates found for election")]
    NoCandidates,

    #[error("Candidate {0} not found")]
    CandidateNotFound(i64),

    #[error("Candidate {0} did not advance to the second round")]
    CandidateNotAdvancing(i64),

    #[error("Not enough candidates for second round (found {found}, need 2)")]
    InsufficientCandidates { found: usize },

    #[error("Identifier space exhausted after {attempts} attempts ({generated} voters generated)")]
    GenerationExhausted { attempts: u32, generated: usize },

    #[error("Cannot {operation} while the election is {phase}")]
    InvalidPhase { operation: &'static str, phase: Phase },

    #[error("Invalid voter identifier '{0}': expected a 5-digit number")]
    InvalidIdentifier(String),

    #[error("Voter identifier {0} is already registered")]
    DuplicateIdentifier(String),

    #[error("Display name must not be empty")]
    InvalidDisplayName,

    #[error("No registered voter with identifier {0}")]
    VoterNotRegistered(String),

    #[error("Round consistency check failed: {}", .0.join("; "))]
    Inconsistent(Vec<String>),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
