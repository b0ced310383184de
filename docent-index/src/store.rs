//! SQLite-backed storage for embedded description records.
//!
//! Records arrive flattened: one row per description with its scalar fields,
//! the rendered embedding text, and the vector as a little-endian f32 BLOB.
//! Search is brute-force cosine ranking over every stored vector, which is
//! plenty for corpora of this size and keeps the store dependency-free beyond
//! SQLite itself.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE function_records (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     function_name TEXT NOT NULL,
//!     class_name TEXT NOT NULL,
//!     filepath TEXT NOT NULL,
//!     repo_name TEXT NOT NULL,
//!     return_type TEXT NOT NULL,
//!     functionality TEXT NOT NULL,
//!     tags TEXT NOT NULL,              -- comma-joined
//!     text TEXT NOT NULL,              -- rendered embedding document
//!     embedding BLOB NOT NULL          -- f32 little-endian
//! );
//!
//! CREATE TABLE file_records (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     filepath TEXT NOT NULL,
//!     repo_name TEXT NOT NULL,
//!     overall_purpose_and_domain TEXT NOT NULL,
//!     primary_responsibilities TEXT NOT NULL,   -- newline-joined
//!     tags TEXT NOT NULL,
//!     text TEXT NOT NULL,
//!     embedding BLOB NOT NULL
//! );
//! ```

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use docent_extract::records::{FileRecord, FunctionRecord};

use crate::error::Result;

/// A function-description search hit.
#[derive(Debug, Clone)]
pub struct FunctionHit {
    pub function_name: String,
    pub class_name: String,
    pub filepath: String,
    pub repo_name: String,
    pub text: String,
    pub similarity: f32,
}

/// A file-description search hit.
#[derive(Debug, Clone)]
pub struct FileHit {
    pub filepath: String,
    pub repo_name: String,
    pub overall_purpose_and_domain: String,
    pub text: String,
    pub similarity: f32,
}

/// Row counts for both tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub function_records: usize,
    pub file_records: usize,
}

/// SQLite store for embedded records.
#[derive(Clone, Debug)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Opens (creating if missing) a persistent store at `db_path`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .create_if_missing(true),
        )
        .await?;
        Self::new_with_pool(pool).await
    }

    /// Opens an in-memory store for testing.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS function_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                function_name TEXT NOT NULL,
                class_name TEXT NOT NULL,
                filepath TEXT NOT NULL,
                repo_name TEXT NOT NULL,
                return_type TEXT NOT NULL,
                functionality TEXT NOT NULL,
                tags TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS file_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filepath TEXT NOT NULL,
                repo_name TEXT NOT NULL,
                overall_purpose_and_domain TEXT NOT NULL,
                primary_responsibilities TEXT NOT NULL,
                tags TEXT NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_function_repo ON function_records(repo_name)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_file_repo ON file_records(repo_name)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Empties both tables; a reload always starts from scratch.
    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM function_records")
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM file_records")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Inserts function records with their rendered text and vectors, in one
    /// transaction.
    pub async fn insert_function_records(
        &self,
        rows: &[(FunctionRecord, String, Vec<f32>)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (record, text, embedding) in rows {
            sqlx::query(
                r#"
                INSERT INTO function_records
                    (function_name, class_name, filepath, repo_name, return_type,
                     functionality, tags, text, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&record.function_name)
            .bind(&record.class_name)
            .bind(&record.filepath)
            .bind(&record.repo_name)
            .bind(&record.return_type)
            .bind(&record.functionality)
            .bind(record.tags.join(","))
            .bind(text)
            .bind(bytemuck::cast_slice::<f32, u8>(embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Inserts file records with their rendered text and vectors, in one
    /// transaction.
    pub async fn insert_file_records(
        &self,
        rows: &[(FileRecord, String, Vec<f32>)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (record, text, embedding) in rows {
            sqlx::query(
                r#"
                INSERT INTO file_records
                    (filepath, repo_name, overall_purpose_and_domain,
                     primary_responsibilities, tags, text, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&record.filepath)
            .bind(&record.repo_name)
            .bind(&record.overall_purpose_and_domain)
            .bind(record.primary_responsibilities.join("\n"))
            .bind(record.tags.join(","))
            .bind(text)
            .bind(bytemuck::cast_slice::<f32, u8>(embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Ranks every stored function record against `query` by cosine
    /// similarity, highest first.
    pub async fn search_functions(
        &self,
        query: &[f32],
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<FunctionHit>> {
        let rows = sqlx::query(
            "SELECT function_name, class_name, filepath, repo_name, text, embedding \
             FROM function_records",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<FunctionHit> = rows
            .into_iter()
            .map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let embedding: Vec<f32> = bytemuck::pod_collect_to_vec(&embedding_bytes);
                FunctionHit {
                    function_name: row.get("function_name"),
                    class_name: row.get("class_name"),
                    filepath: row.get("filepath"),
                    repo_name: row.get("repo_name"),
                    text: row.get("text"),
                    similarity: cosine_similarity(query, &embedding),
                }
            })
            .collect();

        rank(&mut hits, limit, threshold, |hit| hit.similarity);
        Ok(hits)
    }

    /// Ranks every stored file record against `query` by cosine similarity,
    /// highest first.
    pub async fn search_files(
        &self,
        query: &[f32],
        limit: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<FileHit>> {
        let rows = sqlx::query(
            "SELECT filepath, repo_name, overall_purpose_and_domain, text, embedding \
             FROM file_records",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut hits: Vec<FileHit> = rows
            .into_iter()
            .map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let embedding: Vec<f32> = bytemuck::pod_collect_to_vec(&embedding_bytes);
                FileHit {
                    filepath: row.get("filepath"),
                    repo_name: row.get("repo_name"),
                    overall_purpose_and_domain: row.get("overall_purpose_and_domain"),
                    text: row.get("text"),
                    similarity: cosine_similarity(query, &embedding),
                }
            })
            .collect();

        rank(&mut hits, limit, threshold, |hit| hit.similarity);
        Ok(hits)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let function_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM function_records")
            .fetch_one(&self.pool)
            .await?;
        let file_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM file_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(StoreStats {
            function_records: function_records as usize,
            file_records: file_records as usize,
        })
    }
}

fn rank<T>(hits: &mut Vec<T>, limit: usize, threshold: Option<f32>, similarity: impl Fn(&T) -> f32) {
    if let Some(threshold) = threshold {
        hits.retain(|hit| similarity(hit) >= threshold);
    }
    hits.sort_by(|a, b| {
        similarity(b)
            .partial_cmp(&similarity(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
}

/// Cosine similarity; zero when either vector is degenerate or lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function_record(name: &str, filepath: &str) -> FunctionRecord {
        FunctionRecord {
            file_name: String::new(),
            function_name: name.to_string(),
            class_name: String::new(),
            arguments: Vec::new(),
            return_type: "None".to_string(),
            functionality: "Does something.".to_string(),
            tags: vec!["misc".to_string()],
            filepath: filepath.to_string(),
            repository_url: "https://example.com/acme/widget.git".to_string(),
            group_name: "acme".to_string(),
            repo_name: "widget".to_string(),
        }
    }

    fn file_record(filepath: &str) -> FileRecord {
        FileRecord {
            file_name: String::new(),
            overall_purpose_and_domain: "A module.".to_string(),
            primary_responsibilities: vec!["Does things.".to_string()],
            tags: vec!["misc".to_string()],
            filepath: filepath.to_string(),
            repository_url: "https://example.com/acme/widget.git".to_string(),
            group_name: "acme".to_string(),
            repo_name: "widget".to_string(),
        }
    }

    #[tokio::test]
    async fn cosine_ranking_orders_by_similarity() {
        let store = RecordStore::open_memory().await.unwrap();
        store
            .insert_function_records(&[
                (
                    function_record("aligned", "a.py"),
                    "aligned text".to_string(),
                    vec![1.0, 0.0, 0.0],
                ),
                (
                    function_record("orthogonal", "b.py"),
                    "other text".to_string(),
                    vec![0.0, 1.0, 0.0],
                ),
                (
                    function_record("close", "c.py"),
                    "close text".to_string(),
                    vec![0.9, 0.1, 0.0],
                ),
            ])
            .await
            .unwrap();

        let hits = store
            .search_functions(&[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.function_name.as_str()).collect();
        assert_eq!(names, vec!["aligned", "close", "orthogonal"]);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn threshold_and_limit_are_applied() {
        let store = RecordStore::open_memory().await.unwrap();
        store
            .insert_function_records(&[
                (function_record("a", "a.py"), "a".to_string(), vec![1.0, 0.0]),
                (function_record("b", "b.py"), "b".to_string(), vec![0.7, 0.7]),
                (function_record("c", "c.py"), "c".to_string(), vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store
            .search_functions(&[1.0, 0.0], 10, Some(0.5))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);

        let hits = store.search_functions(&[1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].function_name, "a");
    }

    #[tokio::test]
    async fn embeddings_round_trip_through_blobs() {
        let store = RecordStore::open_memory().await.unwrap();
        let vector = vec![0.25_f32, -1.5, 3.75];
        store
            .insert_file_records(&[(file_record("mod.py"), "text".to_string(), vector.clone())])
            .await
            .unwrap();

        // a query equal to the stored vector must rank at similarity 1
        let hits = store.search_files(&vector, 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("index.db");

        {
            let store = RecordStore::open(&db_path).await.unwrap();
            store
                .insert_function_records(&[(
                    function_record("kept", "kept.py"),
                    "kept".to_string(),
                    vec![1.0, 0.0],
                )])
                .await
                .unwrap();
        }

        let store = RecordStore::open(&db_path).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.function_records, 1);
    }

    #[tokio::test]
    async fn clear_resets_both_tables() {
        let store = RecordStore::open_memory().await.unwrap();
        store
            .insert_function_records(&[(
                function_record("f", "f.py"),
                "f".to_string(),
                vec![1.0],
            )])
            .await
            .unwrap();
        store
            .insert_file_records(&[(file_record("f.py"), "f".to_string(), vec![1.0])])
            .await
            .unwrap();

        store.clear().await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.function_records, 0);
        assert_eq!(stats.file_records, 0);
    }
}
