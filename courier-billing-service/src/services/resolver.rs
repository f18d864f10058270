//! Rate resolution: shipment context in, one rate slab and its breakdown out.

use crate::models::{
    DistanceCategory, DistanceSlab, Mode, Party, PartyRateSlab, RateSlabKey, ServiceType,
    ShipmentType, WeightSlab,
};
use crate::services::address::{AddressClassifier, Classification, ReferenceTables};
use crate::services::error::BillingError;
use crate::services::metrics::RATE_RESOLUTIONS_TOTAL;
use crate::services::pricing::RateBreakdown;
use crate::services::weight::find_weight_slab;
use async_trait::async_trait;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Read access to everything rate resolution looks up.
#[async_trait]
pub trait RateCatalog: Send + Sync {
    async fn find_mode_by_code(&self, code: &str) -> Result<Option<Mode>, AppError>;

    async fn find_service_type_by_code(&self, code: &str)
        -> Result<Option<ServiceType>, AppError>;

    async fn list_distance_slabs(&self) -> Result<Vec<DistanceSlab>, AppError>;

    async fn list_active_weight_slabs(&self) -> Result<Vec<WeightSlab>, AppError>;

    async fn find_party_by_id(&self, party_id: Uuid) -> Result<Option<Party>, AppError>;

    async fn find_party_by_normalized_name(&self, name: &str) -> Result<Option<Party>, AppError>;

    async fn find_active_rate_slab(&self, key: &RateSlabKey)
        -> Result<Option<PartyRateSlab>, AppError>;

    async fn reference_tables(&self) -> Arc<ReferenceTables>;
}

/// Party given either by id or by display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartyRef {
    Id(Uuid),
    Name(String),
}

impl std::fmt::Display for PartyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartyRef::Id(id) => write!(f, "{}", id),
            PartyRef::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Shipment context for one rate lookup.
///
/// `distance_slab_id` and `weight_slab_id` bypass classification and weight
/// lookup when the caller already knows the slab.
#[derive(Debug, Clone)]
pub struct ResolveRateInput {
    pub party: PartyRef,
    pub shipment_type: ShipmentType,
    pub mode_code: String,
    pub service_type_code: String,
    pub origin_address: Option<String>,
    pub destination_address: Option<String>,
    pub region_title: Option<String>,
    pub distance_slab_id: Option<i32>,
    pub weight_grams: Option<i32>,
    pub weight_slab_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRate {
    pub rate_slab: PartyRateSlab,
    pub key: RateSlabKey,
    pub distance_slab: DistanceSlab,
    pub weight_slab: WeightSlab,
    pub classification: Option<Classification>,
    pub breakdown: RateBreakdown,
}

pub struct RateResolver<'a, C: RateCatalog + ?Sized> {
    catalog: &'a C,
}

impl<'a, C: RateCatalog + ?Sized> RateResolver<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Resolve and count the outcome.
    #[instrument(skip(self, input), fields(party = %input.party, mode = %input.mode_code))]
    pub async fn resolve(&self, input: &ResolveRateInput) -> Result<ResolvedRate, BillingError> {
        let result = self.resolve_inner(input).await;
        let outcome = match &result {
            Ok(_) => "resolved",
            Err(e) => e.kind(),
        };
        RATE_RESOLUTIONS_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    async fn resolve_inner(&self, input: &ResolveRateInput) -> Result<ResolvedRate, BillingError> {
        let mode = self
            .catalog
            .find_mode_by_code(input.mode_code.trim())
            .await?
            .filter(|m| m.active)
            .ok_or_else(|| BillingError::ModeNotRecognized {
                mode_code: input.mode_code.clone(),
            })?;

        let service_type = self
            .catalog
            .find_service_type_by_code(input.service_type_code.trim())
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| BillingError::ServiceTypeNotRecognized {
                service_type_code: input.service_type_code.clone(),
            })?;

        let (distance_slab, classification) = self.resolve_distance(input).await?;
        let weight_slab = self.resolve_weight(input).await?;
        let party = self.resolve_party(&input.party).await?;

        let key = RateSlabKey {
            party_id: party.party_id,
            shipment_type: input.shipment_type,
            mode_id: mode.mode_id,
            service_type_id: service_type.service_type_id,
            distance_slab_id: distance_slab.distance_slab_id,
            weight_slab_id: weight_slab.weight_slab_id,
        };

        let rate_slab = self
            .catalog
            .find_active_rate_slab(&key)
            .await?
            .ok_or(BillingError::NoRateConfigured { key })?;

        let breakdown = RateBreakdown::from_pricing(&rate_slab.pricing());

        debug!(
            rate_slab_id = %rate_slab.rate_slab_id,
            total = %breakdown.total,
            "Rate resolved"
        );

        Ok(ResolvedRate {
            rate_slab,
            key,
            distance_slab,
            weight_slab,
            classification,
            breakdown,
        })
    }

    async fn resolve_distance(
        &self,
        input: &ResolveRateInput,
    ) -> Result<(DistanceSlab, Option<Classification>), BillingError> {
        let slabs = self.catalog.list_distance_slabs().await?;
        let mut active = slabs.into_iter().filter(|s| s.active);

        if let Some(id) = input.distance_slab_id {
            return active
                .find(|s| s.distance_slab_id == id)
                .map(|s| (s, None))
                .ok_or_else(|| BillingError::NotFound(format!("Distance slab {} not found", id)));
        }
        let active: Vec<DistanceSlab> = active.collect();

        let classification = match (&input.origin_address, &input.destination_address) {
            (Some(origin), Some(destination)) => {
                let tables = self.catalog.reference_tables().await;
                Some(AddressClassifier::new(&tables).classify(origin, destination))
            }
            _ => None,
        };

        let by_category = classification
            .as_ref()
            .and_then(|c| c.category)
            .and_then(|category| slab_for_category(&active, category));

        let by_title = || {
            input.region_title.as_deref().and_then(|title| {
                let title = title.trim();
                active.iter().find(|s| {
                    s.title.eq_ignore_ascii_case(title) || s.code.eq_ignore_ascii_case(title)
                })
            })
        };

        match by_category.or_else(by_title) {
            Some(slab) => Ok((slab.clone(), classification)),
            None => Err(BillingError::DistanceCategoryUnresolvable {
                origin_address: input.origin_address.clone(),
                destination_address: input.destination_address.clone(),
                origin_state: classification
                    .as_ref()
                    .and_then(|c| c.origin.state_code.clone()),
                destination_state: classification
                    .as_ref()
                    .and_then(|c| c.destination.state_code.clone()),
                region_title: input.region_title.clone(),
            }),
        }
    }

    async fn resolve_weight(&self, input: &ResolveRateInput) -> Result<WeightSlab, BillingError> {
        let slabs = self.catalog.list_active_weight_slabs().await?;

        if let Some(id) = input.weight_slab_id {
            return slabs
                .into_iter()
                .find(|s| s.weight_slab_id == id && s.active)
                .ok_or_else(|| BillingError::NotFound(format!("Weight slab {} not found", id)));
        }

        let weight_grams = input.weight_grams.ok_or_else(|| {
            BillingError::Validation("Either weight_grams or weight_slab_id is required".to_string())
        })?;

        find_weight_slab(&slabs, weight_grams).cloned()
    }

    async fn resolve_party(&self, party: &PartyRef) -> Result<Party, BillingError> {
        let found = match party {
            PartyRef::Id(id) => self.catalog.find_party_by_id(*id).await?,
            PartyRef::Name(name) => {
                let normalized = Party::normalize_name(name);
                if normalized.is_empty() {
                    None
                } else {
                    self.catalog.find_party_by_normalized_name(&normalized).await?
                }
            }
        };

        found.ok_or_else(|| BillingError::PartyNotFound {
            party: party.to_string(),
        })
    }
}

fn slab_for_category(slabs: &[DistanceSlab], category: DistanceCategory) -> Option<&DistanceSlab> {
    slabs
        .iter()
        .find(|s| s.code.eq_ignore_ascii_case(category.as_str()))
}
