//! Plain-text election snapshots and the channel they are pushed to.

use log::{info, warn};
use serenity::http::Http;
use serenity::model::id::ChannelId;
use std::fmt::Write;

use crate::election::session::{ElectionResults, HumanVoteOutcome, RoundOutcome};
use crate::election::tally::party_counts;
use crate::models::{Candidate, Round, RoundResultEntry};

// Discord rejects longer messages.
const MESSAGE_LIMIT: usize = 2000;

pub struct Announcer {
    channel: Option<ChannelId>,
}

impl Announcer {
    pub fn new(channel: Option<u64>) -> Self {
        match channel {
            Some(id) => info!("Announcing election updates to channel {}", id),
            None => info!("ANNOUNCE_CHANNEL_ID not set, election updates stay in replies"),
        }
        Self {
            channel: channel.map(ChannelId),
        }
    }

    /// Post `text` to the announcement channel. Failures are logged, never returned.
    pub async fn announce(&self, http: impl AsRef<Http>, text: &str) {
        let Some(channel) = self.channel else {
            return;
        };
        if let Err(why) = channel.say(http, truncate(text)).await {
            warn!("Failed to announce to channel {}: {:?}", channel, why);
        }
    }
}

pub fn truncate(text: &str) -> &str {
    if text.len() <= MESSAGE_LIMIT {
        return text;
    }
    let mut end = MESSAGE_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn write_ranking(out: &mut String, entries: &[RoundResultEntry]) {
    for entry in entries {
        let _ = writeln!(
            out,
            "{}. {} ({}) - {} votes",
            entry.rank, entry.name, entry.party, entry.vote_count
        );
    }
}

pub fn round_summary(outcome: &RoundOutcome) -> String {
    let mut out = String::new();
    let title = match outcome.round {
        Round::First => "First Round",
        Round::Second => "Second Round",
    };
    let _ = writeln!(
        out,
        "**{}**: {} automatic voters, {} ballots cast",
        title, outcome.synthetic_voters, outcome.ballots_cast
    );
    if outcome.skipped > 0 {
        let _ = writeln!(out, "{} ballots could not be recorded", outcome.skipped);
    }
    write_ranking(&mut out, &outcome.results);

    if outcome.round == Round::First {
        let names: Vec<&str> = outcome.advancing.iter().map(|e| e.name.as_str()).collect();
        let _ = writeln!(out, "Advancing: {}", names.join(" vs "));
        out.push_str("Cast your vote with `/election vote`.");
    } else {
        out.push_str("Cast your runoff vote with `/election vote`.");
    }
    out
}

pub fn vote_summary(outcome: &HumanVoteOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Your {} vote for **{}** ({}) was recorded. {} voters so far.",
        outcome.round, outcome.choice.candidate_name, outcome.choice.candidate_party, outcome.total_voters
    );
    write_ranking(&mut out, &outcome.results);
    if let Some(winner) = &outcome.winner {
        let _ = write!(
            out,
            "Winner: **{}** ({}) with {} votes",
            winner.name, winner.party, winner.vote_count
        );
    }
    out.trim_end().to_string()
}

pub fn results_summary(results: &ElectionResults) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Election is {} (run {})", results.phase, results.run_id);

    if results.first_round.is_empty() {
        out.push_str("No results yet. Start one with `/election start`.");
        return out;
    }

    out.push_str("\n**First Round**\n");
    write_ranking(&mut out, &results.first_round);
    if !results.second_round.is_empty() {
        out.push_str("\n**Second Round**\n");
        write_ranking(&mut out, &results.second_round);
    }
    if let Some(winner) = results.winner() {
        let _ = write!(out, "\nWinner: **{}** ({})", winner.name, winner.party);
    }
    out.trim_end().to_string()
}

/// Where a JSON rendering of the results has to go.
#[derive(Debug)]
pub enum JsonReply {
    /// Fenced JSON that fits in one message.
    Inline(String),
    /// Too long for a message; send as a file.
    Attachment(Vec<u8>),
}

pub fn results_json(results: &ElectionResults) -> serde_json::Result<JsonReply> {
    let json = serde_json::to_string_pretty(results)?;
    let fenced = format!("```json\n{}\n```", json);
    if fenced.len() <= MESSAGE_LIMIT {
        Ok(JsonReply::Inline(fenced))
    } else {
        Ok(JsonReply::Attachment(json.into_bytes()))
    }
}

pub fn candidate_list(candidates: &[Candidate]) -> String {
    if candidates.is_empty() {
        return "No candidates registered.".to_string();
    }
    let mut out = String::from("**Candidates**\n");
    for candidate in candidates {
        let _ = writeln!(out, "`{}` {} ({})", candidate.id, candidate.name, candidate.party);
    }
    let parties: Vec<String> = party_counts(candidates)
        .into_iter()
        .map(|(party, count)| format!("{} {}", party, count))
        .collect();
    let _ = write!(out, "\nParties: {}", parties.join(", "));
    out
}
