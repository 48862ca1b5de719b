use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{migrate::MigrateDatabase, sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow}, Row, Sqlite};

use crate::models::{
    Ballot, Candidate, Preference, Round, RoundResultEntry, Sentiment, StoredResults, Voter, VoterKind,
};
use crate::store::{
    BallotSink, CandidateSource, PreferenceSink, RoundResultSink, StoreError, StoreResult, VoterRegistry,
};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:mock_ballot.db";

// (name, party, description, image)
const DEFAULT_CANDIDATES: [(&str, &str, &str, &str); 5] = [
    (
        "John Smith",
        "Democratic Party",
        "Experienced politician with 10 years in public service. Focuses on healthcare reform and environmental protection.",
        "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=200&h=200&fit=crop&crop=face",
    ),
    (
        "Sarah Johnson",
        "Republican Party",
        "Business leader and former mayor. Advocates for economic growth and tax reform.",
        "https://images.unsplash.com/photo-1494790108755-2616b612b786?w=200&h=200&fit=crop&crop=face",
    ),
    (
        "Michael Chen",
        "Independent",
        "Community activist and educator. Campaigns for education reform and social justice.",
        "https://images.unsplash.com/photo-1472099645785-5658abf4ff4e?w=200&h=200&fit=crop&crop=face",
    ),
    (
        "Emily Davis",
        "Green Party",
        "Environmental scientist and climate advocate. Focuses on renewable energy and sustainability.",
        "https://images.unsplash.com/photo-1438761681033-6461ffad8d80?w=200&h=200&fit=crop&crop=face",
    ),
    (
        "David Wilson",
        "Libertarian Party",
        "Small business owner and constitutional advocate. Promotes individual freedoms and limited government.",
        "https://images.unsplash.com/photo-1500648767791-00dcc994a43e?w=200&h=200&fit=crop&crop=face",
    ),
];

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self, StoreError> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;
        let db = Self { pool };
        db.seed_default_candidates().await?;
        Ok(db)
    }

    /// A private database living as long as the returned handle.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, StoreError> {
        // Every SQLite memory connection is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                party TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                image TEXT NOT NULL DEFAULT ''
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS voters (
                identifier TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                registered_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                voter_id TEXT NOT NULL,
                candidate_id INTEGER NOT NULL,
                sentiment TEXT NOT NULL CHECK (sentiment IN ('positive', 'negative', 'neutral')),
                strength INTEGER NOT NULL CHECK (strength BETWEEN 1 AND 9),
                updated_at TEXT NOT NULL,
                PRIMARY KEY (voter_id, candidate_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ballots (
                voter_id TEXT PRIMARY KEY,
                candidate_id INTEGER NOT NULL,
                candidate_name TEXT NOT NULL,
                candidate_party TEXT NOT NULL,
                round INTEGER NOT NULL,
                cast_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS round_results (
                round INTEGER NOT NULL,
                candidate_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                party TEXT NOT NULL,
                vote_count INTEGER NOT NULL,
                rank INTEGER NOT NULL,
                PRIMARY KEY (round, candidate_id)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS advancing_candidates (
                candidate_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                party TEXT NOT NULL,
                vote_count INTEGER NOT NULL,
                rank INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Fill an empty candidates table with the default line-up.
    pub async fn seed_default_candidates(&self) -> Result<(), StoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM candidates")
            .fetch_one(&self.pool)
            .await?
            .get("count");
        if count > 0 {
            return Ok(());
        }

        for (name, party, description, image) in DEFAULT_CANDIDATES {
            self.create_candidate(name, party, description, image).await?;
        }
        info!("Seeded {} default candidates", DEFAULT_CANDIDATES.len());
        Ok(())
    }

    pub async fn create_candidate(
        &self,
        name: &str,
        party: &str,
        description: &str,
        image: &str,
    ) -> Result<Candidate, StoreError> {
        let id = sqlx::query(
            r#"
            INSERT INTO candidates (name, party, description, image)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(party)
        .bind(description)
        .bind(image)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Candidate {
            id,
            name: name.to_string(),
            party: party.to_string(),
            description: description.to_string(),
            image: image.to_string(),
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|e| format!("Failed to parse timestamp '{}': {}", value, e))?
        .with_timezone(&Utc))
}

fn candidate_from_row(row: &SqliteRow) -> Candidate {
    Candidate {
        id: row.get::<i64, _>("id"),
        name: row.get::<String, _>("name"),
        party: row.get::<String, _>("party"),
        description: row.get::<String, _>("description"),
        image: row.get::<String, _>("image"),
    }
}

fn ballot_from_row(row: &SqliteRow) -> Result<Ballot, StoreError> {
    let round = row.get::<i64, _>("round");
    Ok(Ballot {
        voter_id: row.get::<String, _>("voter_id"),
        candidate_id: row.get::<i64, _>("candidate_id"),
        candidate_name: row.get::<String, _>("candidate_name"),
        candidate_party: row.get::<String, _>("candidate_party"),
        round: Round::from_number(round).ok_or_else(|| format!("Unknown round: {}", round))?,
        cast_at: parse_timestamp(&row.get::<String, _>("cast_at"))?,
    })
}

fn result_entry_from_row(row: &SqliteRow) -> RoundResultEntry {
    RoundResultEntry {
        candidate_id: row.get::<i64, _>("candidate_id"),
        name: row.get::<String, _>("name"),
        party: row.get::<String, _>("party"),
        vote_count: row.get::<i64, _>("vote_count") as u32,
        rank: row.get::<i64, _>("rank") as u32,
    }
}

#[async_trait]
impl CandidateSource for Database {
    async fn list_candidates(&self) -> StoreResult<Vec<Candidate>> {
        let candidates = sqlx::query("SELECT id, name, party, description, image FROM candidates ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(candidate_from_row)
            .collect();
        Ok(candidates)
    }

    async fn get_candidate(&self, id: i64) -> StoreResult<Option<Candidate>> {
        let row = sqlx::query("SELECT id, name, party, description, image FROM candidates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(candidate_from_row))
    }
}

#[async_trait]
impl BallotSink for Database {
    async fn upsert_ballot(&self, voter_id: &str, round: Round, candidate: &Candidate) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ballots (voter_id, candidate_id, candidate_name, candidate_party, round, cast_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(voter_id)
            DO UPDATE SET candidate_id = excluded.candidate_id,
                          candidate_name = excluded.candidate_name,
                          candidate_party = excluded.candidate_party,
                          round = excluded.round,
                          cast_at = excluded.cast_at
            "#,
        )
        .bind(voter_id)
        .bind(candidate.id)
        .bind(&candidate.name)
        .bind(&candidate.party)
        .bind(round.number())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_ballot(&self, voter_id: &str) -> StoreResult<Option<Ballot>> {
        let row = sqlx::query(
            r#"
            SELECT voter_id, candidate_id, candidate_name, candidate_party, round, cast_at
            FROM ballots
            WHERE voter_id = ?
            "#,
        )
        .bind(voter_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(ballot_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn tally(&self, round: Round, eligible: Option<&[i64]>) -> StoreResult<Vec<(i64, u32)>> {
        let counts = sqlx::query(
            r#"
            SELECT candidate_id, COUNT(*) AS votes
            FROM ballots
            WHERE round = ?
            GROUP BY candidate_id
            ORDER BY candidate_id
            "#,
        )
        .bind(round.number())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| (row.get::<i64, _>("candidate_id"), row.get::<i64, _>("votes") as u32))
        .filter(|(candidate_id, _)| eligible.map_or(true, |ids| ids.contains(candidate_id)))
        .collect();
        Ok(counts)
    }

    async fn count_ballots(&self, round: Round, eligible: Option<&[i64]>) -> StoreResult<u32> {
        let counts = self.tally(round, eligible).await?;
        Ok(counts.iter().map(|(_, count)| count).sum())
    }

    async fn clear_round_ballots(&self, round: Round) -> StoreResult<()> {
        sqlx::query("DELETE FROM ballots WHERE round = ?")
            .bind(round.number())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_ballots(&self) -> StoreResult<()> {
        sqlx::query("DELETE FROM ballots").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceSink for Database {
    async fn upsert_preference(
        &self,
        voter_id: &str,
        candidate_id: i64,
        sentiment: Sentiment,
        strength: u8,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (voter_id, candidate_id, sentiment, strength, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(voter_id, candidate_id)
            DO UPDATE SET sentiment = excluded.sentiment,
                          strength = excluded.strength,
                          updated_at = excluded.updated_at
            "#,
        )
        .bind(voter_id)
        .bind(candidate_id)
        .bind(sentiment.as_str())
        .bind(strength as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_preferences(&self, voter_id: &str) -> StoreResult<Vec<Preference>> {
        let rows = sqlx::query(
            r#"
            SELECT voter_id, candidate_id, sentiment, strength
            FROM preferences
            WHERE voter_id = ?
            ORDER BY candidate_id
            "#,
        )
        .bind(voter_id)
        .fetch_all(&self.pool)
        .await?;

        let mut preferences = Vec::with_capacity(rows.len());
        for row in rows {
            let sentiment_str = row.get::<String, _>("sentiment");
            let sentiment = Sentiment::parse(&sentiment_str)
                .ok_or_else(|| format!("Unknown sentiment: {}", sentiment_str))?;
            preferences.push(Preference {
                voter_id: row.get::<String, _>("voter_id"),
                candidate_id: row.get::<i64, _>("candidate_id"),
                sentiment,
                strength: row.get::<i64, _>("strength") as u8,
            });
        }
        Ok(preferences)
    }

    async fn clear_synthetic_preferences(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            DELETE FROM preferences
            WHERE voter_id NOT IN (SELECT identifier FROM voters WHERE kind = 'human')
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RoundResultSink for Database {
    async fn save_round_results(&self, round: Round, ranked: &[RoundResultEntry]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM round_results WHERE round = ?")
            .bind(round.number())
            .execute(&mut *tx)
            .await?;

        for entry in ranked {
            sqlx::query(
                r#"
                INSERT INTO round_results (round, candidate_id, name, party, vote_count, rank)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(round.number())
            .bind(entry.candidate_id)
            .bind(&entry.name)
            .bind(&entry.party)
            .bind(entry.vote_count as i64)
            .bind(entry.rank as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_advancing_set(&self, pair: &[RoundResultEntry]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM advancing_candidates")
            .execute(&mut *tx)
            .await?;

        for entry in pair {
            sqlx::query(
                r#"
                INSERT INTO advancing_candidates (candidate_id, name, party, vote_count, rank)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(entry.candidate_id)
            .bind(&entry.name)
            .bind(&entry.party)
            .bind(entry.vote_count as i64)
            .bind(entry.rank as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_results(&self) -> StoreResult<StoredResults> {
        let rows = sqlx::query(
            r#"
            SELECT round, candidate_id, name, party, vote_count, rank
            FROM round_results
            ORDER BY round, rank
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut results = StoredResults::default();
        for row in &rows {
            let entry = result_entry_from_row(row);
            match Round::from_number(row.get::<i64, _>("round")) {
                Some(Round::First) => results.first_round.push(entry),
                Some(Round::Second) => results.second_round.push(entry),
                None => return Err(format!("Unknown round for candidate {}", entry.candidate_id).into()),
            }
        }

        results.advancing = sqlx::query(
            r#"
            SELECT candidate_id, name, party, vote_count, rank
            FROM advancing_candidates
            ORDER BY rank
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(result_entry_from_row)
        .collect();

        Ok(results)
    }

    async fn clear_results(&self) -> StoreResult<()> {
        sqlx::query("DELETE FROM round_results").execute(&self.pool).await?;
        sqlx::query("DELETE FROM advancing_candidates").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl VoterRegistry for Database {
    async fn insert_voter(&self, voter: &Voter) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO voters (identifier, display_name, kind, registered_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(identifier) DO NOTHING
            "#,
        )
        .bind(&voter.identifier)
        .bind(&voter.display_name)
        .bind(voter.kind.as_str())
        .bind(voter.registered_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_voter(&self, identifier: &str) -> StoreResult<Option<Voter>> {
        let Some(row) = sqlx::query(
            r#"
            SELECT identifier, display_name, kind, registered_at
            FROM voters
            WHERE identifier = ?
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let kind_str = row.get::<String, _>("kind");
        let kind = VoterKind::parse(&kind_str).ok_or_else(|| format!("Unknown voter kind: {}", kind_str))?;
        Ok(Some(Voter {
            identifier: row.get::<String, _>("identifier"),
            display_name: row.get::<String, _>("display_name"),
            kind,
            registered_at: parse_timestamp(&row.get::<String, _>("registered_at"))?,
        }))
    }

    async fn human_identifiers(&self) -> StoreResult<Vec<String>> {
        let identifiers = sqlx::query("SELECT identifier FROM voters WHERE kind = 'human' ORDER BY identifier")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.get::<String, _>("identifier"))
            .collect();
        Ok(identifiers)
    }

    async fn clear_synthetic_voters(&self) -> StoreResult<()> {
        sqlx::query("DELETE FROM voters WHERE kind = 'synthetic'")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
