//! # kasten-db
//!
//! PostgreSQL database layer for the kasten knowledge base.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for contents, chunks, categories,
//!   collections, signals, and the job queue
//! - Vector storage with pgvector
//! - Candidate queries for the hybrid search engine
//! - The line-accumulating text chunker

pub mod categories;
pub mod chunking;
pub mod chunks;
pub mod collections;
pub mod contents;
pub mod jobs;
pub mod pool;
pub mod search;
pub mod signals;

// Test fixtures for integration tests.
// Always compiled so integration tests (in tests/) can use them.
pub mod test_fixtures;

// Re-export core types
pub use kasten_core::*;

pub use categories::PgCategoryRepository;
pub use chunking::LineChunker;
pub use chunks::PgChunkRepository;
pub use collections::PgCollectionRepository;
pub use contents::PgContentRepository;
pub use jobs::PgJobRepository;
pub use pool::{create_pool, PoolConfig};
pub use search::{KeywordCandidate, PatternCombine, PgSearchRepository, SemanticCandidate};
pub use signals::PgSignalRepository;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// SHA-256 content hash, hex-encoded. Stored in content metadata so
/// re-ingesting identical bytes can be detected.
pub fn compute_content_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Content repository.
    pub contents: PgContentRepository,
    /// Chunk repository for text slices and embedding backfill.
    pub chunks: PgChunkRepository,
    /// Category taxonomy and association repository.
    pub categories: PgCategoryRepository,
    /// Collection repository.
    pub collections: PgCollectionRepository,
    /// Append-only decision audit log.
    pub signals: PgSignalRepository,
    /// Job queue repository.
    pub jobs: PgJobRepository,
    /// Search candidate queries.
    pub search: PgSearchRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            contents: PgContentRepository::new(pool.clone()),
            chunks: PgChunkRepository::new(pool.clone()),
            categories: PgCategoryRepository::new(pool.clone()),
            collections: PgCollectionRepository::new(pool.clone()),
            signals: PgSignalRepository::new(pool.clone()),
            jobs: PgJobRepository::new(pool.clone()),
            search: PgSearchRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the database and build the repository context.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url, PoolConfig::from_env()).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Ok(())
    }
}
