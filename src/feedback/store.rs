//! SQLite-backed vote store with idempotent upsert
//!
//! At most one vote exists per (answer_id, voter_id); the uniqueness
//! constraint lives in the schema and the write is a single upsert
//! statement, so two concurrent votes from the same voter cannot produce a
//! lost update or a duplicate row. Answers are persisted alongside for
//! audit and the optional strict voting mode.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::vote::VoteFilter;
use crate::types::{Answer, Vote, VoteStatistics, VoteSummary, VoteValue};

/// SQLite-backed feedback store
pub struct FeedbackStore {
    conn: Arc<Mutex<Connection>>,
    /// Reject votes for answers never persisted server-side
    require_known_answer: bool,
}

impl FeedbackStore {
    /// Create or open the store at the given path
    pub fn new<P: AsRef<Path>>(path: P, require_known_answer: bool) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::feedback(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            require_known_answer,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory(require_known_answer: bool) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::feedback(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            require_known_answer,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Run idempotent migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )
        .map_err(|e| Error::feedback(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            -- One row per (answer, voter); re-votes replace in place
            CREATE TABLE IF NOT EXISTS votes (
                answer_id TEXT NOT NULL,
                voter_id TEXT NOT NULL,
                value TEXT NOT NULL CHECK(value IN ('up', 'down')),
                comment TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (answer_id, voter_id)
            );

            CREATE INDEX IF NOT EXISTS idx_votes_answer_id ON votes(answer_id);
            CREATE INDEX IF NOT EXISTS idx_votes_updated_at ON votes(updated_at);

            -- Answers persisted for audit; id is content-derived so
            -- re-generation of an identical answer is a no-op
            CREATE TABLE IF NOT EXISTS answers (
                id TEXT PRIMARY KEY,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                source_passage_ids TEXT NOT NULL,
                model_tag TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_answers_created_at ON answers(created_at);
        "#,
        )
        .map_err(|e| Error::feedback(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Feedback store migrations complete");
        Ok(())
    }

    /// Record a vote. Idempotent upsert on (answer_id, voter_id): a second
    /// call from the same voter replaces value, comment and updated_at
    /// instead of creating a duplicate row.
    pub fn record_vote(
        &self,
        answer_id: &str,
        voter_id: &str,
        value: VoteValue,
        comment: Option<&str>,
    ) -> Result<Vote> {
        if self.require_known_answer && !self.answer_exists(answer_id)? {
            return Err(Error::AnswerNotFound(answer_id.to_string()));
        }

        let updated_at = Utc::now();
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO votes (answer_id, voter_id, value, comment, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(answer_id, voter_id) DO UPDATE SET
                value = excluded.value,
                comment = excluded.comment,
                updated_at = excluded.updated_at
            "#,
            params![
                answer_id,
                voter_id,
                value.as_str(),
                comment,
                updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::feedback(format!("Failed to record vote: {}", e)))?;

        tracing::info!(
            "Vote recorded: answer={} voter={} value={}",
            answer_id,
            voter_id,
            value.as_str()
        );

        Ok(Vote {
            answer_id: answer_id.to_string(),
            voter_id: voter_id.to_string(),
            value,
            comment: comment.map(|c| c.to_string()),
            updated_at,
        })
    }

    /// Live aggregate over the vote set for one answer. Reflects the latest
    /// upsert; a revised vote is never double-counted.
    pub fn vote_summary(&self, answer_id: &str) -> Result<VoteSummary> {
        let conn = self.conn.lock();

        conn.query_row(
            r#"
            SELECT
                COUNT(CASE WHEN value = 'up' THEN 1 END),
                COUNT(CASE WHEN value = 'down' THEN 1 END)
            FROM votes WHERE answer_id = ?1
            "#,
            params![answer_id],
            |row| {
                Ok(VoteSummary {
                    up_count: row.get::<_, i64>(0)? as u64,
                    down_count: row.get::<_, i64>(1)? as u64,
                })
            },
        )
        .map_err(|e| Error::feedback(format!("Failed to summarize votes: {}", e)))
    }

    /// Persist an answer for audit. Content-derived ids make this a no-op
    /// for re-generated identical answers.
    pub fn record_answer(&self, question: &str, answer: &Answer) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT OR IGNORE INTO answers
                (id, question, answer, source_passage_ids, model_tag, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                answer.id,
                question,
                answer.text,
                serde_json::to_string(&answer.source_passage_ids)?,
                answer.model_tag,
                answer.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| Error::feedback(format!("Failed to record answer: {}", e)))?;

        Ok(())
    }

    /// Whether an answer with this id was persisted
    pub fn answer_exists(&self, answer_id: &str) -> Result<bool> {
        let conn = self.conn.lock();

        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM answers WHERE id = ?1",
                params![answer_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::feedback(format!("Failed to look up answer: {}", e)))?;

        Ok(found.is_some())
    }

    /// List votes, newest first, with optional filtering and pagination
    pub fn list_votes(&self, filter: &VoteFilter) -> Result<Vec<Vote>> {
        let conn = self.conn.lock();

        let mut query =
            String::from("SELECT answer_id, voter_id, value, comment, updated_at FROM votes");
        let mut conditions: Vec<&str> = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(value) = filter.value {
            conditions.push("value = ?");
            params_vec.push(Box::new(value.as_str()));
        }
        if let Some(since) = filter.since {
            conditions.push("updated_at >= ?");
            params_vec.push(Box::new(since.to_rfc3339()));
        }
        if let Some(until) = filter.until {
            conditions.push("updated_at <= ?");
            params_vec.push(Box::new(until.to_rfc3339()));
        }

        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        query.push_str(" ORDER BY updated_at DESC");

        if let Some(limit) = filter.limit {
            query.push_str(" LIMIT ? OFFSET ?");
            params_vec.push(Box::new(limit as i64));
            params_vec.push(Box::new(filter.offset as i64));
        }

        let mut stmt = conn
            .prepare(&query)
            .map_err(|e| Error::feedback(format!("Failed to prepare query: {}", e)))?;

        let votes = stmt
            .query_map(params_from_iter(params_vec.iter().map(|p| p.as_ref())), row_to_vote)
            .map_err(|e| Error::feedback(format!("Failed to list votes: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::feedback(format!("Failed to read vote row: {}", e)))?;

        Ok(votes)
    }

    /// Aggregate statistics over all recorded votes
    pub fn statistics(&self) -> Result<VoteStatistics> {
        let conn = self.conn.lock();

        let (total, up, down, with_comments) = conn
            .query_row(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(CASE WHEN value = 'up' THEN 1 END),
                    COUNT(CASE WHEN value = 'down' THEN 1 END),
                    COUNT(CASE WHEN comment IS NOT NULL AND comment != '' THEN 1 END)
                FROM votes
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)? as u64,
                        row.get::<_, i64>(1)? as u64,
                        row.get::<_, i64>(2)? as u64,
                        row.get::<_, i64>(3)? as u64,
                    ))
                },
            )
            .map_err(|e| Error::feedback(format!("Failed to compute statistics: {}", e)))?;

        let cutoff = (Utc::now() - Duration::days(30)).to_rfc3339();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT substr(updated_at, 1, 10) AS day, COUNT(*)
                FROM votes
                WHERE updated_at >= ?1
                GROUP BY day
                ORDER BY day
                "#,
            )
            .map_err(|e| Error::feedback(format!("Failed to prepare query: {}", e)))?;

        let votes_per_day = stmt
            .query_map(params![cutoff], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })
            .map_err(|e| Error::feedback(format!("Failed to query votes per day: {}", e)))?
            .collect::<rusqlite::Result<std::collections::BTreeMap<String, u64>>>()
            .map_err(|e| Error::feedback(format!("Failed to read votes per day: {}", e)))?;

        let pct = |n: u64| {
            if total > 0 {
                n as f64 / total as f64 * 100.0
            } else {
                0.0
            }
        };

        Ok(VoteStatistics {
            total_votes: total,
            up_votes: up,
            down_votes: down,
            up_percentage: pct(up),
            down_percentage: pct(down),
            votes_with_comments: with_comments,
            votes_per_day,
        })
    }
}

fn row_to_vote(row: &rusqlite::Row<'_>) -> rusqlite::Result<Vote> {
    let value_text: String = row.get(2)?;
    let updated_at_text: String = row.get(4)?;

    Ok(Vote {
        answer_id: row.get(0)?,
        voter_id: row.get(1)?,
        value: VoteValue::parse(&value_text).unwrap_or(VoteValue::Up),
        comment: row.get(3)?,
        updated_at: DateTime::parse_from_rfc3339(&updated_at_text)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FeedbackStore {
        FeedbackStore::in_memory(false).unwrap()
    }

    #[test]
    fn second_vote_replaces_not_duplicates() {
        let s = store();

        let first = s.record_vote("a1", "u1", VoteValue::Up, None).unwrap();
        let second = s.record_vote("a1", "u1", VoteValue::Down, None).unwrap();
        assert!(second.updated_at >= first.updated_at);

        let all = s.list_votes(&VoteFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, VoteValue::Down);
    }

    #[test]
    fn up_then_down_counts_once() {
        let s = store();

        s.record_vote("a1", "u1", VoteValue::Up, None).unwrap();
        s.record_vote("a1", "u1", VoteValue::Down, None).unwrap();

        let summary = s.vote_summary("a1").unwrap();
        assert_eq!(summary, VoteSummary { up_count: 0, down_count: 1 });
    }

    #[test]
    fn summary_aggregates_across_voters() {
        let s = store();

        s.record_vote("a1", "u1", VoteValue::Up, None).unwrap();
        s.record_vote("a1", "u2", VoteValue::Up, None).unwrap();
        s.record_vote("a1", "u3", VoteValue::Down, None).unwrap();
        s.record_vote("a2", "u1", VoteValue::Down, None).unwrap();

        let summary = s.vote_summary("a1").unwrap();
        assert_eq!(summary, VoteSummary { up_count: 2, down_count: 1 });

        let empty = s.vote_summary("unseen").unwrap();
        assert_eq!(empty, VoteSummary { up_count: 0, down_count: 0 });
    }

    #[test]
    fn revote_replaces_comment() {
        let s = store();

        s.record_vote("a1", "u1", VoteValue::Up, Some("great answer")).unwrap();
        s.record_vote("a1", "u1", VoteValue::Up, None).unwrap();

        let all = s.list_votes(&VoteFilter::default()).unwrap();
        assert_eq!(all[0].comment, None);
    }

    #[test]
    fn stateless_mode_accepts_unknown_answer_ids() {
        let s = store();
        assert!(s.record_vote("never-seen", "u1", VoteValue::Up, None).is_ok());
    }

    #[test]
    fn strict_mode_rejects_unknown_answer_ids() {
        let s = FeedbackStore::in_memory(true).unwrap();

        let err = s.record_vote("never-seen", "u1", VoteValue::Up, None).unwrap_err();
        assert!(matches!(err, Error::AnswerNotFound(_)));

        let answer = Answer::grounded("q", "text".into(), vec!["p1".into()], "fp", "m1");
        s.record_answer("q", &answer).unwrap();
        assert!(s.record_vote(&answer.id, "u1", VoteValue::Up, None).is_ok());
    }

    #[test]
    fn answer_persistence_is_idempotent() {
        let s = store();
        let answer = Answer::grounded("q", "text".into(), vec!["p1".into()], "fp", "m1");

        s.record_answer("q", &answer).unwrap();
        s.record_answer("q", &answer).unwrap();
        assert!(s.answer_exists(&answer.id).unwrap());
    }

    #[test]
    fn list_votes_filters_by_value() {
        let s = store();
        s.record_vote("a1", "u1", VoteValue::Up, None).unwrap();
        s.record_vote("a2", "u1", VoteValue::Down, None).unwrap();
        s.record_vote("a3", "u2", VoteValue::Down, None).unwrap();

        let downs = s
            .list_votes(&VoteFilter {
                value: Some(VoteValue::Down),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(downs.len(), 2);
        assert!(downs.iter().all(|v| v.value == VoteValue::Down));
    }

    #[test]
    fn list_votes_paginates() {
        let s = store();
        for i in 0..5 {
            s.record_vote(&format!("a{}", i), "u1", VoteValue::Up, None).unwrap();
        }

        let page = s
            .list_votes(&VoteFilter {
                limit: Some(2),
                offset: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn malformed_rows_surface_as_errors() {
        let s = store();
        // bypass the store API to plant a row with a non-text updated_at
        s.conn
            .lock()
            .execute(
                "INSERT INTO votes (answer_id, voter_id, value, comment, updated_at) \
                 VALUES ('a1', 'u1', 'up', NULL, 12345)",
                [],
            )
            .unwrap();

        let err = s.list_votes(&VoteFilter::default()).unwrap_err();
        assert!(matches!(err, Error::Feedback(_)));
    }

    #[test]
    fn statistics_reflect_upserts() {
        let s = store();
        s.record_vote("a1", "u1", VoteValue::Up, Some("nice")).unwrap();
        s.record_vote("a1", "u2", VoteValue::Down, None).unwrap();
        s.record_vote("a1", "u1", VoteValue::Down, Some("changed my mind")).unwrap();

        let stats = s.statistics().unwrap();
        assert_eq!(stats.total_votes, 2);
        assert_eq!(stats.up_votes, 0);
        assert_eq!(stats.down_votes, 2);
        assert_eq!(stats.votes_with_comments, 1);
        assert!((stats.down_percentage - 100.0).abs() < 1e-9);
        assert_eq!(stats.votes_per_day.values().sum::<u64>(), 2);
    }
}
