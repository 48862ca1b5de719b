//! Voter identifiers: the 5-digit non-secret token and the synthetic generator.

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use std::collections::HashSet;

use super::ElectionError;
use crate::models::Voter;

pub const IDENTIFIER_MIN: u32 = 10_000;
pub const IDENTIFIER_MAX: u32 = 99_999;
/// Number of distinct identifiers the generator can hand out.
#[cfg(test)]
pub const IDENTIFIER_SPACE: usize = (IDENTIFIER_MAX - IDENTIFIER_MIN + 1) as usize;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[1-9][0-9]{4}$").unwrap();
}

pub fn validate_identifier(identifier: &str) -> Result<(), ElectionError> {
    if IDENTIFIER_RE.is_match(identifier) {
        Ok(())
    } else {
        Err(ElectionError::InvalidIdentifier(identifier.to_string()))
    }
}

/// Draws unique identifiers for one batch of synthetic voters.
///
/// Identifiers in `reserved` (registered humans) are never handed out.
pub struct IdentifierGenerator {
    used: HashSet<String>,
    reserved: HashSet<String>,
    max_attempts: u32,
}

impl IdentifierGenerator {
    pub fn new(reserved: impl IntoIterator<Item = String>, max_attempts: u32) -> Self {
        let reserved: HashSet<String> = reserved.into_iter().collect();
        Self {
            used: reserved.clone(),
            reserved,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn set_reserved(&mut self, reserved: impl IntoIterator<Item = String>) {
        self.reserved = reserved.into_iter().collect();
        self.reset();
    }

    /// Forget every identifier handed out so far; reserved ones stay blocked.
    pub fn reset(&mut self) {
        self.used = self.reserved.clone();
    }

    pub fn next_identifier<R: Rng>(&mut self, rng: &mut R) -> Option<String> {
        for _ in 0..self.max_attempts {
            let candidate = rng.random_range(IDENTIFIER_MIN..=IDENTIFIER_MAX).to_string();
            if self.used.insert(candidate.clone()) {
                return Some(candidate);
            }
        }
        None
    }

    /// Generate exactly `count` synthetic voters with identifiers unique in this batch.
    pub fn generate_random_voters<R: Rng>(
        &mut self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Voter>, ElectionError> {
        self.reset();
        let mut voters = Vec::with_capacity(count);
        for ordinal in 1..=count {
            match self.next_identifier(rng) {
                Some(identifier) => voters.push(Voter::synthetic(identifier, ordinal)),
                None => {
                    return Err(ElectionError::GenerationExhausted {
                        attempts: self.max_attempts,
                        generated: voters.len(),
                    });
                }
            }
        }
        Ok(voters)
    }
}
