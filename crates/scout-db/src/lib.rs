//! # scout-db
//!
//! PostgreSQL persistence layer for vibescout.
//!
//! This crate provides:
//! - Connection pool management
//! - The place repository (JSONB document rows keyed by supplier external id)
//! - An in-memory store with identical semantics for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use scout_db::Database;
//! use scout_core::models::PlaceQuery;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/vibescout").await?;
//!
//!     let query = PlaceQuery::new("delhi", "cafe", &["cozy"], 5);
//!     let places = db.places.search(&query).await?;
//!
//!     println!("Found {} places", places.len());
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod places;
pub mod pool;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use scout_core::*;

// Re-export repository implementations
pub use memory::MemoryPlaceStore;
pub use places::PgPlaceRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

use sqlx::PgPool;

/// Escape LIKE pattern metacharacters in user-supplied input.
///
/// Escapes `\`, `%`, and `_` so they match literally. Queries using the
/// result must specify `ESCAPE '\'`.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Aggregated database handle with all repositories.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    pub places: PgPlaceRepository,
}

impl Database {
    /// Create a database handle from an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            places: PgPlaceRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(database_url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending database migrations.
    ///
    /// Only available with the `migrations` feature enabled. Consumers that
    /// manage schema externally can skip the feature and this call.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    /// Access the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
