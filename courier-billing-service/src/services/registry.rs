//! Rate slab registry: validated mutations followed by a best-effort audit.

use crate::models::{
    AuditAction, ListRateSlabsFilter, PartyRateSlab, RateAudit, RatePricing, UpsertRateSlab,
};
use crate::services::database::Database;
use crate::services::error::BillingError;
use crate::services::metrics::AUDIT_FAILURES_TOTAL;
use crate::services::pricing::ensure_two_places;
use async_trait::async_trait;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// A committed rate slab write and what it replaced.
#[derive(Debug, Clone)]
pub struct RateMutation {
    pub action: AuditAction,
    pub before: Option<PartyRateSlab>,
    pub after: PartyRateSlab,
}

/// Audit row ready to be appended.
#[derive(Debug, Clone)]
pub struct NewRateAudit {
    pub rate_slab_id: Uuid,
    pub action: AuditAction,
    pub before_snapshot: Option<serde_json::Value>,
    pub after_snapshot: Option<serde_json::Value>,
    pub actor: String,
}

impl NewRateAudit {
    pub fn from_mutation(mutation: &RateMutation, actor: &str) -> Self {
        Self {
            rate_slab_id: mutation.after.rate_slab_id,
            action: mutation.action,
            before_snapshot: mutation
                .before
                .as_ref()
                .and_then(|s| serde_json::to_value(s).ok()),
            after_snapshot: serde_json::to_value(&mutation.after).ok(),
            actor: actor.to_string(),
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append_rate_audit(&self, audit: &NewRateAudit) -> Result<(), AppError>;
}

/// Append the audit row for a committed mutation. Failures are logged and
/// counted, never returned.
pub async fn record_audit<S: AuditSink + ?Sized>(sink: &S, mutation: &RateMutation, actor: &str) {
    let audit = NewRateAudit::from_mutation(mutation, actor);
    if let Err(e) = sink.append_rate_audit(&audit).await {
        AUDIT_FAILURES_TOTAL.inc();
        warn!(
            rate_slab_id = %audit.rate_slab_id,
            action = audit.action.as_str(),
            error = %e,
            "Rate audit write failed; mutation kept"
        );
    }
}

pub fn validate_pricing(pricing: &RatePricing) -> Result<(), BillingError> {
    let fields = [
        ("rate", pricing.rate),
        ("fuel_pct", pricing.fuel_pct),
        ("packing", pricing.packing),
        ("handling", pricing.handling),
        ("gst_pct", pricing.gst_pct),
    ];
    if let Some((name, _)) = fields.iter().find(|(_, v)| *v < Decimal::ZERO) {
        return Err(BillingError::Validation(format!("{} must not be negative", name)));
    }
    for (name, value) in fields {
        ensure_two_places(name, value)?;
    }
    Ok(())
}

pub struct RateSlabRegistry<'a> {
    db: &'a Database,
}

impl<'a> RateSlabRegistry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create or update by business key.
    #[instrument(skip(self, input), fields(party_id = %input.key.party_id))]
    pub async fn upsert(
        &self,
        input: &UpsertRateSlab,
        actor: &str,
    ) -> Result<PartyRateSlab, BillingError> {
        let mut slabs = self
            .upsert_batch(std::slice::from_ref(input), actor)
            .await?;
        slabs.pop().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Upsert returned no rows")).into()
        })
    }

    /// Upsert many slabs in one transaction; nothing is written if any fails.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn upsert_batch(
        &self,
        inputs: &[UpsertRateSlab],
        actor: &str,
    ) -> Result<Vec<PartyRateSlab>, BillingError> {
        if inputs.is_empty() {
            return Err(BillingError::Validation("No rate slabs supplied".to_string()));
        }
        for input in inputs {
            validate_pricing(&input.pricing)?;
        }

        let mutations = self.db.upsert_rate_slabs(inputs).await?;
        for mutation in &mutations {
            record_audit(self.db, mutation, actor).await;
        }

        info!(count = mutations.len(), actor = %actor, "Rate slabs upserted");
        Ok(mutations.into_iter().map(|m| m.after).collect())
    }

    /// Rewrite one slab by id, including its key.
    #[instrument(skip(self, input), fields(rate_slab_id = %rate_slab_id))]
    pub async fn update(
        &self,
        rate_slab_id: Uuid,
        input: &UpsertRateSlab,
        actor: &str,
    ) -> Result<PartyRateSlab, BillingError> {
        validate_pricing(&input.pricing)?;

        let mutation = self
            .db
            .update_rate_slab(rate_slab_id, input)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("Rate slab {} not found", rate_slab_id)))?;
        record_audit(self.db, &mutation, actor).await;

        Ok(mutation.after)
    }

    /// Soft delete.
    #[instrument(skip(self), fields(rate_slab_id = %rate_slab_id))]
    pub async fn deactivate(
        &self,
        rate_slab_id: Uuid,
        actor: &str,
    ) -> Result<PartyRateSlab, BillingError> {
        let mutation = self
            .db
            .deactivate_rate_slab(rate_slab_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("Rate slab {} not found", rate_slab_id)))?;
        record_audit(self.db, &mutation, actor).await;

        Ok(mutation.after)
    }

    pub async fn list(
        &self,
        filter: &ListRateSlabsFilter,
    ) -> Result<Vec<PartyRateSlab>, BillingError> {
        Ok(self.db.list_rate_slabs(filter).await?)
    }

    pub async fn audit_trail(&self, rate_slab_id: Uuid) -> Result<Vec<RateAudit>, BillingError> {
        Ok(self.db.list_rate_audits(rate_slab_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        rows: Mutex<Vec<NewRateAudit>>,
        fail: bool,
    }

    #[async_trait]
    impl AuditSink for MemorySink {
        async fn append_rate_audit(&self, audit: &NewRateAudit) -> Result<(), AppError> {
            if self.fail {
                return Err(AppError::DatabaseError(anyhow::anyhow!("audit table locked")));
            }
            self.rows.lock().unwrap().push(audit.clone());
            Ok(())
        }
    }

    fn slab(active: bool, rate: Decimal) -> PartyRateSlab {
        PartyRateSlab {
            rate_slab_id: Uuid::new_v4(),
            party_id: Uuid::new_v4(),
            shipment_type: "DOCUMENT".to_string(),
            mode_id: 1,
            service_type_id: 1,
            distance_slab_id: 2,
            weight_slab_id: 1,
            rate,
            fuel_pct: dec!(0),
            packing: dec!(0),
            handling: dec!(0),
            gst_pct: dec!(18),
            active,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delete_audit_keeps_prior_snapshot() {
        let before = slab(true, dec!(40));
        let mut after = before.clone();
        after.active = false;
        let mutation = RateMutation {
            action: AuditAction::Delete,
            before: Some(before),
            after,
        };

        let sink = MemorySink::default();
        record_audit(&sink, &mutation, "ops@example.com").await;

        let rows = sink.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, AuditAction::Delete);
        assert_eq!(rows[0].actor, "ops@example.com");
        assert_eq!(rows[0].before_snapshot.as_ref().unwrap()["active"], true);
        assert_eq!(rows[0].after_snapshot.as_ref().unwrap()["active"], false);
    }

    #[tokio::test]
    async fn failed_audit_is_swallowed() {
        let mutation = RateMutation {
            action: AuditAction::Create,
            before: None,
            after: slab(true, dec!(40)),
        };
        let sink = MemorySink {
            fail: true,
            ..Default::default()
        };

        let failures = AUDIT_FAILURES_TOTAL.get();
        record_audit(&sink, &mutation, "system").await;
        assert!(AUDIT_FAILURES_TOTAL.get() >= failures + 1.0);
        assert!(sink.rows.lock().unwrap().is_empty());
    }

    #[test]
    fn negative_pricing_is_rejected() {
        let mut pricing = slab(true, dec!(40)).pricing();
        assert!(validate_pricing(&pricing).is_ok());
        pricing.handling = dec!(-1);
        match validate_pricing(&pricing) {
            Err(BillingError::Validation(msg)) => assert!(msg.contains("handling")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn sub_paise_pricing_is_rejected() {
        let mut pricing = slab(true, dec!(40)).pricing();
        pricing.rate = dec!(40.005);
        match validate_pricing(&pricing) {
            Err(BillingError::Validation(msg)) => assert!(msg.contains("rate")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
