//! TTL cache for the metro-city and state-adjacency reference tables.

use crate::services::address::ReferenceTables;
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Where reference tables are loaded from.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn load_metro_cities(&self) -> Result<Vec<String>, AppError>;

    async fn load_state_adjacency(&self) -> Result<Vec<(String, String)>, AppError>;
}

struct CachedTables {
    loaded_at: Instant,
    tables: Arc<ReferenceTables>,
}

/// Shares one immutable [`ReferenceTables`] snapshot across requests.
///
/// Snapshots with an unavailable table are handed out but not cached, so the
/// next request retries the load. A zero TTL disables caching.
pub struct ReferenceCache {
    ttl: Duration,
    current: RwLock<Option<CachedTables>>,
}

impl ReferenceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            current: RwLock::new(None),
        }
    }

    pub async fn get<S: ReferenceSource + ?Sized>(&self, source: &S) -> Arc<ReferenceTables> {
        if let Some(cached) = self.current.read().await.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return cached.tables.clone();
            }
        }

        let tables = Arc::new(load(source).await);
        if tables.is_complete() && !self.ttl.is_zero() {
            *self.current.write().await = Some(CachedTables {
                loaded_at: Instant::now(),
                tables: tables.clone(),
            });
            debug!("Reference tables cached");
        }
        tables
    }

    /// Drop the cached snapshot; the next `get` reloads.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
        debug!("Reference tables invalidated");
    }
}

async fn load<S: ReferenceSource + ?Sized>(source: &S) -> ReferenceTables {
    let metro = match source.load_metro_cities().await {
        Ok(cities) => Some(cities),
        Err(e) => {
            error!(error = %e, "Failed to load metro cities");
            None
        }
    };
    let adjacency = match source.load_state_adjacency().await {
        Ok(pairs) => Some(pairs),
        Err(e) => {
            error!(error = %e, "Failed to load state adjacency");
            None
        }
    };
    ReferenceTables::new(metro, adjacency)
}
