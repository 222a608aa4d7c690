//! Embedded relational document store fallback: one `concepts` table plus a
//! sidecar `ngrams` table, mirroring the teacher's `storage/sqlite.rs`
//! schema-migration style (`PRAGMA journal_mode=WAL`, a `Mutex<Connection>`,
//! `CREATE TABLE IF NOT EXISTS` + explicit migrations for later columns).

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{DocumentStore, SaveTermFailure, SaveTermsOutcome};
use crate::autocomplete::{self, normalize_query};
use crate::error::{BtsError, BtsResult};
use crate::model::{ApiKey, Concept, Prefix, User};

pub struct SqliteDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentStore {
    pub fn open(path: impl AsRef<Path>) -> BtsResult<Self> {
        let conn = Connection::open(path).map_err(|e| BtsError::Storage(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> BtsResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| BtsError::Storage(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> BtsResult<()> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS concepts (
                prefix TEXT NOT NULL,
                concept_id TEXT NOT NULL,
                label TEXT,
                search_text TEXT NOT NULL,
                data_json TEXT NOT NULL,
                PRIMARY KEY (prefix, concept_id)
            );
            CREATE INDEX IF NOT EXISTS idx_concepts_label ON concepts(prefix, label);

            CREATE TABLE IF NOT EXISTS ngrams (
                prefix TEXT NOT NULL,
                concept_id TEXT NOT NULL,
                gram TEXT NOT NULL,
                PRIMARY KEY (prefix, concept_id, gram)
            );
            CREATE INDEX IF NOT EXISTS idx_ngrams_gram ON ngrams(prefix, gram);

            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                data_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS api_keys (
                key_hash TEXT PRIMARY KEY,
                data_json TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| BtsError::Storage(e.to_string()))?;
        Self::migrate_add_vector_id(conn)?;
        Ok(())
    }

    /// `vector_id` was added after the initial release; guard with
    /// `pragma_table_info` so re-opening an older database is safe.
    fn migrate_add_vector_id(conn: &Connection) -> BtsResult<()> {
        let mut stmt = conn
            .prepare("SELECT 1 FROM pragma_table_info('concepts') WHERE name = 'vector_id'")
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        let exists = stmt
            .exists([])
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        if !exists {
            conn.execute("ALTER TABLE concepts ADD COLUMN vector_id TEXT", [])
                .map_err(|e| BtsError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    fn save_terms_blocking(
        conn: &Mutex<Connection>,
        prefix: Prefix,
        terms: Vec<Concept>,
    ) -> BtsResult<SaveTermsOutcome> {
        let indexed = autocomplete::index_terms(terms);
        let mut guard = conn.lock().unwrap();
        let tx = guard.transaction().map_err(|e| BtsError::Storage(e.to_string()))?;

        let mut outcome = SaveTermsOutcome::default();
        for term in indexed {
            let data_json = serde_json::to_string(&term.concept)?;
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO concepts (prefix, concept_id, label, search_text, data_json)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        prefix.as_str(),
                        term.concept.concept_id,
                        term.concept.label,
                        term.search_text,
                        data_json
                    ],
                )
                .map_err(|e| BtsError::Storage(e.to_string()))?;
            if inserted == 0 {
                outcome.failures.push(SaveTermFailure {
                    concept_id: term.concept.concept_id.clone(),
                    reason: "duplicate concept_id within prefix".to_string(),
                });
                continue;
            }
            for gram in &term.n_grams {
                tx.execute(
                    "INSERT OR IGNORE INTO ngrams (prefix, concept_id, gram) VALUES (?1, ?2, ?3)",
                    params![prefix.as_str(), term.concept.concept_id, gram],
                )
                .map_err(|e| BtsError::Storage(e.to_string()))?;
            }
            outcome.saved += 1;
        }
        tx.commit().map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(outcome)
    }

    fn row_to_concept(data_json: String) -> BtsResult<Concept> {
        Ok(serde_json::from_str(&data_json)?)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create_index(
        &self,
        _prefix: Prefix,
        _field: &str,
        _unique: bool,
        _overwrite: bool,
    ) -> BtsResult<()> {
        // Indices are created once in `init_schema`; per-prefix tables are
        // not used here, so there is nothing further to create.
        Ok(())
    }

    async fn save_terms(&self, prefix: Prefix, terms: Vec<Concept>) -> BtsResult<SaveTermsOutcome> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || Self::save_terms_blocking(&conn, prefix, terms))
            .await
            .map_err(|e| BtsError::Storage(e.to_string()))?
    }

    async fn count_terms(&self, prefix: Prefix) -> BtsResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM concepts WHERE prefix = ?1",
                params![prefix.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(count as u64)
    }

    async fn delete_all_for_prefix(&self, prefix: Prefix) -> BtsResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM concepts WHERE prefix = ?1", params![prefix.as_str()])
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        conn.execute("DELETE FROM ngrams WHERE prefix = ?1", params![prefix.as_str()])
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_terms(&self, prefix: Prefix, limit: Option<usize>) -> BtsResult<Vec<Concept>> {
        let conn = self.conn.lock().unwrap();
        let sql = match limit {
            Some(_) => "SELECT data_json FROM concepts WHERE prefix = ?1 LIMIT ?2",
            None => "SELECT data_json FROM concepts WHERE prefix = ?1",
        };
        let mut stmt = conn.prepare(sql).map_err(|e| BtsError::Storage(e.to_string()))?;
        let rows = if let Some(n) = limit {
            stmt.query_map(params![prefix.as_str(), n as i64], |row| row.get::<_, String>(0))
        } else {
            stmt.query_map(params![prefix.as_str()], |row| row.get::<_, String>(0))
        }
        .map_err(|e| BtsError::Storage(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows {
            let data_json = row.map_err(|e| BtsError::Storage(e.to_string()))?;
            out.push(Self::row_to_concept(data_json)?);
        }
        Ok(out)
    }

    async fn get_terms_by_ids(&self, prefix: Prefix, ids: &[String]) -> BtsResult<Vec<Concept>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = std::iter::repeat("?").take(ids.len()).collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT data_json FROM concepts WHERE prefix = ? AND concept_id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| BtsError::Storage(e.to_string()))?;
        let prefix_str = prefix.as_str();
        let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&prefix_str];
        for id in ids {
            bound.push(id);
        }
        let rows = stmt
            .query_map(bound.as_slice(), |row| row.get::<_, String>(0))
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(Self::row_to_concept(row.map_err(|e| BtsError::Storage(e.to_string()))?)?);
        }
        Ok(out)
    }

    async fn auto_complete(
        &self,
        prefix: Prefix,
        query: &str,
        limit: usize,
    ) -> BtsResult<Vec<Concept>> {
        let normalized = normalize_query(query);
        if normalized.tokens.is_empty() {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT data_json, label, search_text, concept_id FROM concepts WHERE prefix = ?1",
                )
                .map_err(|e| BtsError::Storage(e.to_string()))?;
            let rows = stmt
                .query_map(params![prefix.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(|e| BtsError::Storage(e.to_string()))?;
            return Self::rank_and_truncate(rows, &normalized.score_query, limit);
        }

        let conn = self.conn.lock().unwrap();
        let placeholders = std::iter::repeat("?").take(normalized.tokens.len()).collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT c.data_json, c.label, c.search_text, c.concept_id
             FROM concepts c
             WHERE c.prefix = ?
               AND (SELECT COUNT(DISTINCT gram) FROM ngrams n
                    WHERE n.prefix = c.prefix AND n.concept_id = c.concept_id
                      AND n.gram IN ({placeholders})) = ?"
        );
        let mut stmt = conn.prepare(&sql).map_err(|e| BtsError::Storage(e.to_string()))?;
        let prefix_str = prefix.as_str();
        let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&prefix_str];
        for token in &normalized.tokens {
            bound.push(token);
        }
        let token_count = normalized.tokens.len() as i64;
        bound.push(&token_count);
        let rows = stmt
            .query_map(bound.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Self::rank_and_truncate(rows, &normalized.score_query, limit)
    }

    async fn update_vector_mapping(
        &self,
        prefix: Prefix,
        mapping: Vec<(String, String)>,
    ) -> BtsResult<()> {
        let conn = self.conn.lock().unwrap();
        for (concept_id, vector_id) in mapping {
            conn.execute(
                "UPDATE concepts SET vector_id = ?1 WHERE prefix = ?2 AND concept_id = ?3",
                params![vector_id, prefix.as_str(), concept_id],
            )
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn save_user(&self, user: User) -> BtsResult<()> {
        let conn = self.conn.lock().unwrap();
        let data_json = serde_json::to_string(&user)?;
        conn.execute(
            "INSERT INTO users (username, data_json) VALUES (?1, ?2)
             ON CONFLICT(username) DO UPDATE SET data_json = excluded.data_json",
            params![user.username, data_json],
        )
        .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get_user(&self, username: &str) -> BtsResult<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let data_json: Option<String> = conn
            .query_row(
                "SELECT data_json FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(match data_json {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }

    async fn save_api_key(&self, key: ApiKey) -> BtsResult<()> {
        let conn = self.conn.lock().unwrap();
        let data_json = serde_json::to_string(&key)?;
        conn.execute(
            "INSERT INTO api_keys (key_hash, data_json) VALUES (?1, ?2)
             ON CONFLICT(key_hash) DO UPDATE SET data_json = excluded.data_json",
            params![key.key_hash, data_json],
        )
        .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn find_by_api_key_hash(&self, key_hash: &str) -> BtsResult<Option<ApiKey>> {
        let conn = self.conn.lock().unwrap();
        let data_json: Option<String> = conn
            .query_row(
                "SELECT data_json FROM api_keys WHERE key_hash = ?1",
                params![key_hash],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| BtsError::Storage(e.to_string()))?;
        Ok(match data_json {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }
}

impl SqliteDocumentStore {
    fn rank_and_truncate(
        rows: impl Iterator<Item = rusqlite::Result<(String, Option<String>, String, String)>>,
        score_query: &str,
        limit: usize,
    ) -> BtsResult<Vec<Concept>> {
        let mut matches: Vec<(Concept, i64, usize, String)> = Vec::new();
        for row in rows {
            let (data_json, label, search_text, concept_id) =
                row.map_err(|e| BtsError::Storage(e.to_string()))?;
            let concept = Self::row_to_concept(data_json)?;
            let pos = if score_query.is_empty() {
                0
            } else {
                match search_text.to_lowercase().find(&score_query.to_lowercase()) {
                    Some(byte_idx) => search_text[..byte_idx].chars().count() as i64,
                    None => -1,
                }
            };
            let label_len = label.map(|l| l.chars().count()).unwrap_or(999);
            matches.push((concept, pos, label_len, concept_id));
        }
        matches.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)).then(a.3.cmp(&b.3)));
        Ok(matches.into_iter().take(limit).map(|(c, ..)| c).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hpo_concept(id: &str, label: &str) -> Concept {
        let mut c = Concept::new(Prefix::Hpo, id);
        c.label = Some(label.to_string());
        c
    }

    #[tokio::test]
    async fn save_and_retrieve_round_trips() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.save_terms(Prefix::Hpo, vec![hpo_concept("0001250", "Seizure")]).await.unwrap();
        assert_eq!(store.count_terms(Prefix::Hpo).await.unwrap(), 1);
        let terms = store.get_terms(Prefix::Hpo, None).await.unwrap();
        assert_eq!(terms[0].label.as_deref(), Some("Seizure"));
    }

    #[tokio::test]
    async fn duplicate_within_prefix_fails_record_not_batch() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.save_terms(Prefix::Hpo, vec![hpo_concept("0001250", "Seizure")]).await.unwrap();
        let outcome = store
            .save_terms(
                Prefix::Hpo,
                vec![hpo_concept("0001250", "Seizure"), hpo_concept("0002373", "Febrile seizure")],
            )
            .await
            .unwrap();
        assert_eq!(outcome.saved, 1);
        assert_eq!(outcome.failures.len(), 1);
    }

    #[tokio::test]
    async fn auto_complete_matches_ngram_superset() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store
            .save_terms(
                Prefix::Hpo,
                vec![hpo_concept("0001250", "Seizure"), hpo_concept("0002373", "Febrile seizure")],
            )
            .await
            .unwrap();
        let results = store.auto_complete(Prefix::Hpo, "seizure", 5).await.unwrap();
        assert_eq!(results[0].concept_id, "0001250");
    }

    #[tokio::test]
    async fn delete_all_for_prefix_clears_rows_and_ngrams() {
        let store = SqliteDocumentStore::open_in_memory().unwrap();
        store.save_terms(Prefix::Hpo, vec![hpo_concept("0001250", "Seizure")]).await.unwrap();
        store.delete_all_for_prefix(Prefix::Hpo).await.unwrap();
        assert_eq!(store.count_terms(Prefix::Hpo).await.unwrap(), 0);
    }
}
