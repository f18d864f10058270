//! Postgres-backed [`RateCatalog`] with cached reference tables.

use crate::models::{
    DistanceSlab, Mode, Party, PartyRateSlab, RateSlabKey, ServiceType, WeightSlab,
};
use crate::services::address::ReferenceTables;
use crate::services::database::Database;
use crate::services::reference_cache::ReferenceCache;
use crate::services::resolver::RateCatalog;
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

pub struct DbCatalog<'a> {
    db: &'a Database,
    cache: &'a ReferenceCache,
}

impl<'a> DbCatalog<'a> {
    pub fn new(db: &'a Database, cache: &'a ReferenceCache) -> Self {
        Self { db, cache }
    }
}

#[async_trait]
impl RateCatalog for DbCatalog<'_> {
    async fn find_mode_by_code(&self, code: &str) -> Result<Option<Mode>, AppError> {
        self.db.find_mode_by_code(code).await
    }

    async fn find_service_type_by_code(
        &self,
        code: &str,
    ) -> Result<Option<ServiceType>, AppError> {
        self.db.find_service_type_by_code(code).await
    }

    async fn list_distance_slabs(&self) -> Result<Vec<DistanceSlab>, AppError> {
        self.db.list_distance_slabs().await
    }

    async fn list_active_weight_slabs(&self) -> Result<Vec<WeightSlab>, AppError> {
        self.db.list_weight_slabs(false).await
    }

    async fn find_party_by_id(&self, party_id: Uuid) -> Result<Option<Party>, AppError> {
        self.db.find_party_by_id(party_id).await
    }

    async fn find_party_by_normalized_name(&self, name: &str) -> Result<Option<Party>, AppError> {
        self.db.find_party_by_normalized_name(name).await
    }

    async fn find_active_rate_slab(
        &self,
        key: &RateSlabKey,
    ) -> Result<Option<PartyRateSlab>, AppError> {
        self.db.find_active_rate_slab(key).await
    }

    async fn reference_tables(&self) -> Arc<ReferenceTables> {
        self.cache.get(self.db).await
    }
}
