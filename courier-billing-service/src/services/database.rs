//! Database service for courier-billing-service.

use crate::models::{
    AuditAction, Consignment, CreatePartyPayment, CreateWeightSlab, DistanceSlab, Invoice, InvoiceLine,
    ListRateSlabsFilter, Mode, NewConsignment, Party, PartyPayment, PartyRateSlab,
    PaymentAllocation, RateAudit, RateSlabKey, ServiceType, UpdateWeightSlab, UpsertRateSlab,
    WeightSlab,
};
use crate::services::error::BillingError;
use crate::services::metrics::{
    record_amount, DB_QUERY_DURATION, INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL, PAYMENT_AMOUNT_TOTAL,
};
use crate::services::reconciler::{
    format_invoice_number, plan_invoice, validate_allocations, BillingSummary, ReconcileRequest,
};
use crate::services::reference_cache::ReferenceSource;
use crate::services::registry::{AuditSink, NewRateAudit, RateMutation};
use crate::services::weight::validate_weight_range;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const RATE_SLAB_COLUMNS: &str = "rate_slab_id, party_id, shipment_type, mode_id, service_type_id, \
     distance_slab_id, weight_slab_id, rate, fuel_pct, packing, handling, gst_pct, active, \
     created_utc, updated_utc";

const WEIGHT_SLAB_COLUMNS: &str =
    "weight_slab_id, label, min_grams, max_grams, active, created_utc, updated_utc";

const CONSIGNMENT_COLUMNS: &str = "consignment_id, consignment_number, party_name, shipment_date, \
     weight_grams, origin_address, destination_address, pricing_meta, calculated_amount, \
     final_collected, retail_price, invoice_id, created_utc";

const INVOICE_COLUMNS: &str = "invoice_id, party_id, invoice_number, subtotal, tax_amount, \
     additional_charges, total_amount, received_amount, period_start, period_end, created_by, \
     created_utc";

const INVOICE_LINE_COLUMNS: &str = "invoice_line_id, invoice_id, consignment_id, description, \
     base_amount, fuel_amount, packing, handling, subtotal, gst_amount, total, sort_order";

const PARTY_COLUMNS: &str = "party_id, name, normalized_name, active, created_utc";

/// Map a write error, reporting missing referenced rows as caller errors.
fn write_error(context: &str, e: sqlx::Error) -> BillingError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            BillingError::Validation(format!(
                "Referenced record does not exist ({})",
                db_err.constraint().unwrap_or("foreign key")
            ))
        }
        _ => BillingError::database(context, e),
    }
}

fn is_unique_violation(e: &BillingError) -> bool {
    matches!(
        e,
        BillingError::Internal(AppError::DatabaseError(err))
            if err.downcast_ref::<sqlx::Error>().is_some_and(|e| matches!(
                e,
                sqlx::Error::Database(db_err) if db_err.is_unique_violation()
            ))
    )
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "courier-billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, BillingError> {
        self.pool
            .begin()
            .await
            .map_err(|e| BillingError::database("Failed to begin transaction", e))
    }

    // -------------------------------------------------------------------------
    // Reference Data
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn find_mode_by_code(&self, code: &str) -> Result<Option<Mode>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_mode_by_code"])
            .start_timer();

        let mode = sqlx::query_as::<_, Mode>(
            "SELECT mode_id, code, title, active FROM modes WHERE upper(code) = upper($1)",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get mode: {}", e)))?;

        timer.observe_duration();

        Ok(mode)
    }

    #[instrument(skip(self))]
    pub async fn find_service_type_by_code(
        &self,
        code: &str,
    ) -> Result<Option<ServiceType>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_service_type_by_code"])
            .start_timer();

        let service_type = sqlx::query_as::<_, ServiceType>(
            r#"
            SELECT service_type_id, code, title, active
            FROM service_types
            WHERE upper(code) = upper($1)
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get service type: {}", e))
        })?;

        timer.observe_duration();

        Ok(service_type)
    }

    #[instrument(skip(self))]
    pub async fn list_distance_slabs(&self) -> Result<Vec<DistanceSlab>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_distance_slabs"])
            .start_timer();

        let slabs = sqlx::query_as::<_, DistanceSlab>(
            "SELECT distance_slab_id, code, title, active FROM distance_slabs ORDER BY distance_slab_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list distance slabs: {}", e))
        })?;

        timer.observe_duration();

        Ok(slabs)
    }

    /// List weight slabs ordered by lower bound.
    #[instrument(skip(self))]
    pub async fn list_weight_slabs(&self, include_inactive: bool) -> Result<Vec<WeightSlab>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_weight_slabs"])
            .start_timer();

        let sql = format!(
            "SELECT {} FROM weight_slabs WHERE ($1::bool OR active) ORDER BY min_grams, weight_slab_id",
            WEIGHT_SLAB_COLUMNS
        );
        let slabs = sqlx::query_as::<_, WeightSlab>(&sql)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list weight slabs: {}", e))
            })?;

        timer.observe_duration();

        Ok(slabs)
    }

    /// Serialize weight slab edits so range checks see a stable table.
    async fn lock_weight_slabs(
        tx: &mut Transaction<'static, Postgres>,
    ) -> Result<Vec<WeightSlab>, BillingError> {
        sqlx::query("LOCK TABLE weight_slabs IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut **tx)
            .await
            .map_err(|e| BillingError::database("Failed to lock weight slabs", e))?;

        let sql = format!("SELECT {} FROM weight_slabs ORDER BY min_grams", WEIGHT_SLAB_COLUMNS);
        sqlx::query_as::<_, WeightSlab>(&sql)
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| BillingError::database("Failed to load weight slabs", e))
    }

    #[instrument(skip(self, input), fields(label = %input.label))]
    pub async fn create_weight_slab(&self, input: &CreateWeightSlab) -> Result<WeightSlab, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_weight_slab"])
            .start_timer();

        let mut tx = self.begin().await?;
        let existing = Self::lock_weight_slabs(&mut tx).await?;
        validate_weight_range(&existing, input.min_grams, input.max_grams, None)?;

        let sql = format!(
            "INSERT INTO weight_slabs (label, min_grams, max_grams) VALUES ($1, $2, $3) RETURNING {}",
            WEIGHT_SLAB_COLUMNS
        );
        let slab = sqlx::query_as::<_, WeightSlab>(&sql)
            .bind(input.label.trim())
            .bind(input.min_grams)
            .bind(input.max_grams)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to create weight slab", e))?;

        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit weight slab", e))?;

        timer.observe_duration();

        info!(weight_slab_id = slab.weight_slab_id, label = %slab.label, "Weight slab created");

        Ok(slab)
    }

    #[instrument(skip(self, input), fields(weight_slab_id = weight_slab_id))]
    pub async fn update_weight_slab(
        &self,
        weight_slab_id: i32,
        input: &UpdateWeightSlab,
    ) -> Result<Option<WeightSlab>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_weight_slab"])
            .start_timer();

        let mut tx = self.begin().await?;
        let existing = Self::lock_weight_slabs(&mut tx).await?;
        let Some(current) = existing.iter().find(|s| s.weight_slab_id == weight_slab_id) else {
            return Ok(None);
        };

        let min_grams = input.min_grams.unwrap_or(current.min_grams);
        let max_grams = input.max_grams.unwrap_or(current.max_grams);
        let active = input.active.unwrap_or(current.active);
        let label = input
            .label
            .as_deref()
            .map(str::trim)
            .unwrap_or(current.label.as_str())
            .to_string();

        if active {
            validate_weight_range(&existing, min_grams, max_grams, Some(weight_slab_id))?;
        }

        let sql = format!(
            r#"
            UPDATE weight_slabs
            SET label = $2, min_grams = $3, max_grams = $4, active = $5, updated_utc = NOW()
            WHERE weight_slab_id = $1
            RETURNING {}
            "#,
            WEIGHT_SLAB_COLUMNS
        );
        let slab = sqlx::query_as::<_, WeightSlab>(&sql)
            .bind(weight_slab_id)
            .bind(&label)
            .bind(min_grams)
            .bind(max_grams)
            .bind(active)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to update weight slab", e))?;

        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit weight slab", e))?;

        timer.observe_duration();

        info!(weight_slab_id = weight_slab_id, "Weight slab updated");

        Ok(Some(slab))
    }

    #[instrument(skip(self))]
    pub async fn deactivate_weight_slab(
        &self,
        weight_slab_id: i32,
    ) -> Result<Option<WeightSlab>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["deactivate_weight_slab"])
            .start_timer();

        let sql = format!(
            "UPDATE weight_slabs SET active = FALSE, updated_utc = NOW() WHERE weight_slab_id = $1 RETURNING {}",
            WEIGHT_SLAB_COLUMNS
        );
        let slab = sqlx::query_as::<_, WeightSlab>(&sql)
            .bind(weight_slab_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to deactivate weight slab: {}", e))
            })?;

        timer.observe_duration();

        if slab.is_some() {
            info!(weight_slab_id = weight_slab_id, "Weight slab deactivated");
        }

        Ok(slab)
    }

    // -------------------------------------------------------------------------
    // Party Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(party_id = %party_id))]
    pub async fn find_party_by_id(&self, party_id: Uuid) -> Result<Option<Party>, AppError> {
        let sql = format!("SELECT {} FROM parties WHERE party_id = $1", PARTY_COLUMNS);
        sqlx::query_as::<_, Party>(&sql)
            .bind(party_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get party: {}", e)))
    }

    #[instrument(skip(self))]
    pub async fn find_party_by_normalized_name(
        &self,
        normalized_name: &str,
    ) -> Result<Option<Party>, AppError> {
        let sql = format!("SELECT {} FROM parties WHERE normalized_name = $1", PARTY_COLUMNS);
        sqlx::query_as::<_, Party>(&sql)
            .bind(normalized_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get party: {}", e)))
    }

    /// Find or create by normalized name. Never fails for a missing party.
    async fn ensure_party(
        tx: &mut Transaction<'static, Postgres>,
        name: &str,
        normalized_name: &str,
    ) -> Result<Party, BillingError> {
        let sql = format!(
            r#"
            INSERT INTO parties (party_id, name, normalized_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (normalized_name) DO UPDATE SET normalized_name = EXCLUDED.normalized_name
            RETURNING {}
            "#,
            PARTY_COLUMNS
        );
        sqlx::query_as::<_, Party>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(normalized_name)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| BillingError::database("Failed to resolve party", e))
    }

    // -------------------------------------------------------------------------
    // Rate Slab Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(rate_slab_id = %rate_slab_id))]
    pub async fn get_rate_slab(&self, rate_slab_id: Uuid) -> Result<Option<PartyRateSlab>, AppError> {
        let sql = format!(
            "SELECT {} FROM party_rate_slabs WHERE rate_slab_id = $1",
            RATE_SLAB_COLUMNS
        );
        sqlx::query_as::<_, PartyRateSlab>(&sql)
            .bind(rate_slab_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get rate slab: {}", e)))
    }

    /// The active slab for a business key, if any.
    #[instrument(skip(self, key), fields(party_id = %key.party_id))]
    pub async fn find_active_rate_slab(
        &self,
        key: &RateSlabKey,
    ) -> Result<Option<PartyRateSlab>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_active_rate_slab"])
            .start_timer();

        let sql = format!(
            r#"
            SELECT {}
            FROM party_rate_slabs
            WHERE party_id = $1 AND shipment_type = $2 AND mode_id = $3
              AND service_type_id = $4 AND distance_slab_id = $5 AND weight_slab_id = $6
              AND active = TRUE
            "#,
            RATE_SLAB_COLUMNS
        );
        let slab = sqlx::query_as::<_, PartyRateSlab>(&sql)
            .bind(key.party_id)
            .bind(key.shipment_type.as_str())
            .bind(key.mode_id)
            .bind(key.service_type_id)
            .bind(key.distance_slab_id)
            .bind(key.weight_slab_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find rate slab: {}", e)))?;

        timer.observe_duration();

        Ok(slab)
    }

    #[instrument(skip(self, filter))]
    pub async fn list_rate_slabs(
        &self,
        filter: &ListRateSlabsFilter,
    ) -> Result<Vec<PartyRateSlab>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_rate_slabs"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 500) as i64;
        let sql = format!(
            r#"
            SELECT {}
            FROM party_rate_slabs
            WHERE ($1::uuid IS NULL OR party_id = $1)
              AND ($2::bool = FALSE OR active = TRUE)
              AND ($3::uuid IS NULL OR rate_slab_id > $3)
            ORDER BY rate_slab_id
            LIMIT $4
            "#,
            RATE_SLAB_COLUMNS
        );
        let slabs = sqlx::query_as::<_, PartyRateSlab>(&sql)
            .bind(filter.party_id)
            .bind(filter.active_only)
            .bind(filter.page_token)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to list rate slabs: {}", e))
            })?;

        timer.observe_duration();

        Ok(slabs)
    }

    async fn find_rate_slab_by_key_for_update(
        tx: &mut Transaction<'static, Postgres>,
        key: &RateSlabKey,
    ) -> Result<Option<PartyRateSlab>, BillingError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM party_rate_slabs
            WHERE party_id = $1 AND shipment_type = $2 AND mode_id = $3
              AND service_type_id = $4 AND distance_slab_id = $5 AND weight_slab_id = $6
            FOR UPDATE
            "#,
            RATE_SLAB_COLUMNS
        );
        sqlx::query_as::<_, PartyRateSlab>(&sql)
            .bind(key.party_id)
            .bind(key.shipment_type.as_str())
            .bind(key.mode_id)
            .bind(key.service_type_id)
            .bind(key.distance_slab_id)
            .bind(key.weight_slab_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| BillingError::database("Failed to look up rate slab", e))
    }

    async fn find_rate_slab_for_update(
        tx: &mut Transaction<'static, Postgres>,
        rate_slab_id: Uuid,
    ) -> Result<Option<PartyRateSlab>, BillingError> {
        let sql = format!(
            "SELECT {} FROM party_rate_slabs WHERE rate_slab_id = $1 FOR UPDATE",
            RATE_SLAB_COLUMNS
        );
        sqlx::query_as::<_, PartyRateSlab>(&sql)
            .bind(rate_slab_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| BillingError::database("Failed to look up rate slab", e))
    }

    async fn ensure_party_exists(
        tx: &mut Transaction<'static, Postgres>,
        party_id: Uuid,
    ) -> Result<(), BillingError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM parties WHERE party_id = $1)",
        )
        .bind(party_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| BillingError::database("Failed to check party", e))?;

        if exists {
            Ok(())
        } else {
            Err(BillingError::PartyNotFound {
                party: party_id.to_string(),
            })
        }
    }

    /// Insert or update one slab by business key inside `tx`.
    async fn upsert_rate_slab_tx(
        tx: &mut Transaction<'static, Postgres>,
        input: &UpsertRateSlab,
    ) -> Result<RateMutation, BillingError> {
        Self::ensure_party_exists(tx, input.key.party_id).await?;

        let existing = Self::find_rate_slab_by_key_for_update(tx, &input.key).await?;
        let p = &input.pricing;

        match existing {
            Some(before) => {
                let sql = format!(
                    r#"
                    UPDATE party_rate_slabs
                    SET rate = $2, fuel_pct = $3, packing = $4, handling = $5, gst_pct = $6,
                        active = TRUE, updated_utc = NOW()
                    WHERE rate_slab_id = $1
                    RETURNING {}
                    "#,
                    RATE_SLAB_COLUMNS
                );
                let after = sqlx::query_as::<_, PartyRateSlab>(&sql)
                    .bind(before.rate_slab_id)
                    .bind(p.rate)
                    .bind(p.fuel_pct)
                    .bind(p.packing)
                    .bind(p.handling)
                    .bind(p.gst_pct)
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(|e| write_error("Failed to update rate slab", e))?;

                Ok(RateMutation {
                    action: AuditAction::Update,
                    before: Some(before),
                    after,
                })
            }
            None => {
                let sql = format!(
                    r#"
                    INSERT INTO party_rate_slabs (
                        rate_slab_id, party_id, shipment_type, mode_id, service_type_id,
                        distance_slab_id, weight_slab_id, rate, fuel_pct, packing, handling, gst_pct
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    RETURNING {}
                    "#,
                    RATE_SLAB_COLUMNS
                );
                let after = sqlx::query_as::<_, PartyRateSlab>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(input.key.party_id)
                    .bind(input.key.shipment_type.as_str())
                    .bind(input.key.mode_id)
                    .bind(input.key.service_type_id)
                    .bind(input.key.distance_slab_id)
                    .bind(input.key.weight_slab_id)
                    .bind(p.rate)
                    .bind(p.fuel_pct)
                    .bind(p.packing)
                    .bind(p.handling)
                    .bind(p.gst_pct)
                    .fetch_one(&mut **tx)
                    .await
                    .map_err(|e| match e {
                        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                            BillingError::Internal(AppError::DatabaseError(anyhow::Error::new(e)))
                        }
                        _ => write_error("Failed to create rate slab", e),
                    })?;

                Ok(RateMutation {
                    action: AuditAction::Create,
                    before: None,
                    after,
                })
            }
        }
    }

    /// Create-or-update every input in one transaction.
    ///
    /// A concurrent insert of the same key surfaces as a unique violation;
    /// the batch is retried once, when the key lookup finds the winner's row.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn upsert_rate_slabs(
        &self,
        inputs: &[UpsertRateSlab],
    ) -> Result<Vec<RateMutation>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upsert_rate_slabs"])
            .start_timer();

        let mut attempt = 0;
        let mutations = loop {
            attempt += 1;
            match self.upsert_rate_slabs_once(inputs).await {
                Err(e) if attempt < 2 && is_unique_violation(&e) => {
                    warn!("Concurrent rate slab insert detected, retrying as update");
                }
                Err(e) if is_unique_violation(&e) => {
                    break Err(BillingError::Conflict(
                        "Rate slab was modified concurrently; retry the request".to_string(),
                    ));
                }
                result => break result,
            }
        }?;

        timer.observe_duration();

        Ok(mutations)
    }

    async fn upsert_rate_slabs_once(
        &self,
        inputs: &[UpsertRateSlab],
    ) -> Result<Vec<RateMutation>, BillingError> {
        let mut tx = self.begin().await?;
        let mut mutations = Vec::with_capacity(inputs.len());
        for input in inputs {
            mutations.push(Self::upsert_rate_slab_tx(&mut tx, input).await?);
        }
        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit rate slabs", e))?;
        Ok(mutations)
    }

    /// Rewrite a slab by id. Moving it onto a key held by another row is a
    /// `DuplicateMapping`, never a merge.
    #[instrument(skip(self, input), fields(rate_slab_id = %rate_slab_id))]
    pub async fn update_rate_slab(
        &self,
        rate_slab_id: Uuid,
        input: &UpsertRateSlab,
    ) -> Result<Option<RateMutation>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_rate_slab"])
            .start_timer();

        let mut tx = self.begin().await?;
        let Some(before) = Self::find_rate_slab_for_update(&mut tx, rate_slab_id).await? else {
            return Ok(None);
        };
        Self::ensure_party_exists(&mut tx, input.key.party_id).await?;

        if let Some(other) = Self::find_rate_slab_by_key_for_update(&mut tx, &input.key).await? {
            if other.rate_slab_id != rate_slab_id {
                return Err(BillingError::DuplicateMapping {
                    conflicting_rate_slab_id: other.rate_slab_id,
                });
            }
        }

        let p = &input.pricing;
        let sql = format!(
            r#"
            UPDATE party_rate_slabs
            SET party_id = $2, shipment_type = $3, mode_id = $4, service_type_id = $5,
                distance_slab_id = $6, weight_slab_id = $7, rate = $8, fuel_pct = $9,
                packing = $10, handling = $11, gst_pct = $12, updated_utc = NOW()
            WHERE rate_slab_id = $1
            RETURNING {}
            "#,
            RATE_SLAB_COLUMNS
        );
        let after = sqlx::query_as::<_, PartyRateSlab>(&sql)
            .bind(rate_slab_id)
            .bind(input.key.party_id)
            .bind(input.key.shipment_type.as_str())
            .bind(input.key.mode_id)
            .bind(input.key.service_type_id)
            .bind(input.key.distance_slab_id)
            .bind(input.key.weight_slab_id)
            .bind(p.rate)
            .bind(p.fuel_pct)
            .bind(p.packing)
            .bind(p.handling)
            .bind(p.gst_pct)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    BillingError::Conflict("Another rate slab already uses this key".to_string())
                }
                _ => write_error("Failed to update rate slab", e),
            })?;

        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit rate slab", e))?;

        timer.observe_duration();

        info!(rate_slab_id = %rate_slab_id, "Rate slab updated");

        Ok(Some(RateMutation {
            action: AuditAction::Update,
            before: Some(before),
            after,
        }))
    }

    #[instrument(skip(self), fields(rate_slab_id = %rate_slab_id))]
    pub async fn deactivate_rate_slab(
        &self,
        rate_slab_id: Uuid,
    ) -> Result<Option<RateMutation>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["deactivate_rate_slab"])
            .start_timer();

        let mut tx = self.begin().await?;
        let Some(before) = Self::find_rate_slab_for_update(&mut tx, rate_slab_id).await? else {
            return Ok(None);
        };

        let sql = format!(
            r#"
            UPDATE party_rate_slabs
            SET active = FALSE, updated_utc = NOW()
            WHERE rate_slab_id = $1
            RETURNING {}
            "#,
            RATE_SLAB_COLUMNS
        );
        let after = sqlx::query_as::<_, PartyRateSlab>(&sql)
            .bind(rate_slab_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to deactivate rate slab", e))?;

        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit rate slab", e))?;

        timer.observe_duration();

        info!(rate_slab_id = %rate_slab_id, "Rate slab deactivated");

        Ok(Some(RateMutation {
            action: AuditAction::Delete,
            before: Some(before),
            after,
        }))
    }

    #[instrument(skip(self), fields(rate_slab_id = %rate_slab_id))]
    pub async fn list_rate_audits(&self, rate_slab_id: Uuid) -> Result<Vec<RateAudit>, AppError> {
        sqlx::query_as::<_, RateAudit>(
            r#"
            SELECT audit_id, rate_slab_id, action, before_snapshot, after_snapshot, actor, created_utc
            FROM rate_audits
            WHERE rate_slab_id = $1
            ORDER BY created_utc, audit_id
            "#,
        )
        .bind(rate_slab_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list rate audits: {}", e)))
    }

    // -------------------------------------------------------------------------
    // Consignment Operations
    // -------------------------------------------------------------------------

    /// Store parsed upload rows as unbilled consignments, all or nothing.
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn import_consignments(
        &self,
        rows: &[NewConsignment],
    ) -> Result<Vec<Consignment>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["import_consignments"])
            .start_timer();

        let sql = format!(
            r#"
            INSERT INTO consignments (
                consignment_id, consignment_number, party_name, normalized_party,
                shipment_date, weight_grams, origin_address, destination_address,
                pricing_meta, calculated_amount, final_collected, retail_price
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            CONSIGNMENT_COLUMNS
        );

        let mut tx = self.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let consignment = sqlx::query_as::<_, Consignment>(&sql)
                .bind(Uuid::new_v4())
                .bind(row.consignment_number.trim())
                .bind(&row.party_name)
                .bind(row.normalized_party())
                .bind(row.shipment_date)
                .bind(row.weight_grams)
                .bind(&row.origin_address)
                .bind(&row.destination_address)
                .bind(row.pricing_meta.as_ref().map(sqlx::types::Json))
                .bind(row.calculated_amount)
                .bind(row.final_collected)
                .bind(row.retail_price)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| match e {
                    sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                        BillingError::Conflict(format!(
                            "Consignment '{}' already exists",
                            row.consignment_number
                        ))
                    }
                    _ => BillingError::database("Failed to import consignment", e),
                })?;
            inserted.push(consignment);
        }

        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit consignments", e))?;

        timer.observe_duration();

        info!(count = inserted.len(), "Consignments imported");

        Ok(inserted)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Turn a batch of unbilled consignments into one invoice, atomically.
    #[instrument(skip(self, request), fields(count = request.consignment_ids.len(), actor = %request.actor))]
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
    ) -> Result<(Invoice, Vec<InvoiceLine>), BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reconcile"])
            .start_timer();

        let result = self.reconcile_inner(request).await;

        timer.observe_duration();

        match &result {
            Ok((invoice, _)) => {
                INVOICES_TOTAL.with_label_values(&["created"]).inc();
                record_amount(&INVOICE_AMOUNT_TOTAL, invoice.total_amount);
                info!(
                    invoice_id = %invoice.invoice_id,
                    invoice_number = %invoice.invoice_number,
                    total = %invoice.total_amount,
                    "Invoice created"
                );
            }
            Err(e) => {
                INVOICES_TOTAL.with_label_values(&[e.kind()]).inc();
                warn!(error_kind = e.kind(), error = %e, "Reconciliation rejected");
            }
        }

        result
    }

    async fn reconcile_inner(
        &self,
        request: &ReconcileRequest,
    ) -> Result<(Invoice, Vec<InvoiceLine>), BillingError> {
        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = request
            .consignment_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if ids.is_empty() {
            return Err(BillingError::Validation(
                "At least one consignment is required".to_string(),
            ));
        }

        let mut tx = self.begin().await?;

        let sql = format!(
            r#"
            SELECT {}
            FROM consignments
            WHERE consignment_id = ANY($1)
            ORDER BY shipment_date, consignment_number
            FOR UPDATE
            "#,
            CONSIGNMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Consignment>(&sql)
            .bind(&ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to lock consignments", e))?;

        if rows.len() != ids.len() {
            let found: HashSet<Uuid> = rows.iter().map(|r| r.consignment_id).collect();
            let missing: Vec<String> = ids
                .iter()
                .filter(|id| !found.contains(id))
                .map(Uuid::to_string)
                .collect();
            return Err(BillingError::NotFound(format!(
                "Consignments not found: {}",
                missing.join(", ")
            )));
        }

        let plan = plan_invoice(
            &rows,
            request.party_filter.as_deref(),
            request.overrides.as_ref(),
            request.additional_charges,
        )?;

        let party = Self::ensure_party(&mut tx, &plan.party_name, &plan.normalized_party).await?;

        let sequence = sqlx::query_scalar::<_, i64>("SELECT nextval('invoice_number_seq')")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to allocate invoice number", e))?;
        let invoice_number =
            format_invoice_number(&request.invoice_prefix, Utc::now().date_naive(), sequence);

        let sql = format!(
            r#"
            INSERT INTO invoices (
                invoice_id, party_id, invoice_number, subtotal, tax_amount, additional_charges,
                total_amount, period_start, period_end, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(Uuid::new_v4())
            .bind(party.party_id)
            .bind(&invoice_number)
            .bind(plan.totals.subtotal)
            .bind(plan.totals.tax_amount)
            .bind(plan.totals.additional_charges)
            .bind(plan.totals.total_amount)
            .bind(plan.period_start)
            .bind(plan.period_end)
            .bind(&request.actor)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to create invoice", e))?;

        let sql = format!(
            r#"
            INSERT INTO invoice_lines (
                invoice_line_id, invoice_id, consignment_id, description, base_amount,
                fuel_amount, packing, handling, subtotal, gst_amount, total, sort_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            INVOICE_LINE_COLUMNS
        );
        let mut lines = Vec::with_capacity(plan.lines.len());
        for (i, line) in plan.lines.iter().enumerate() {
            let stored = sqlx::query_as::<_, InvoiceLine>(&sql)
                .bind(Uuid::new_v4())
                .bind(invoice.invoice_id)
                .bind(line.consignment_id)
                .bind(&line.description)
                .bind(line.base_amount)
                .bind(line.fuel_amount)
                .bind(line.packing)
                .bind(line.handling)
                .bind(line.subtotal)
                .bind(line.gst_amount)
                .bind(line.total)
                .bind(i as i32 + 1)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| BillingError::database("Failed to create invoice line", e))?;
            lines.push(stored);
        }

        let linked = sqlx::query(
            r#"
            UPDATE consignments
            SET invoice_id = $1
            WHERE consignment_id = ANY($2) AND invoice_id IS NULL
            "#,
        )
        .bind(invoice.invoice_id)
        .bind(&ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| BillingError::database("Failed to link consignments", e))?;

        if linked.rows_affected() != ids.len() as u64 {
            return Err(BillingError::Conflict(
                "Consignments changed during reconciliation; retry the request".to_string(),
            ));
        }

        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit invoice", e))?;

        Ok((invoice, lines))
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let sql = format!("SELECT {} FROM invoices WHERE invoice_id = $1", INVOICE_COLUMNS);
        sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_lines(&self, invoice_id: Uuid) -> Result<Vec<InvoiceLine>, AppError> {
        let sql = format!(
            "SELECT {} FROM invoice_lines WHERE invoice_id = $1 ORDER BY sort_order",
            INVOICE_LINE_COLUMNS
        );
        sqlx::query_as::<_, InvoiceLine>(&sql)
            .bind(invoice_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice lines: {}", e))
            })
    }

    /// Delete an invoice with no payments against it, returning its
    /// consignments to the unbilled pool.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let mut tx = self.begin().await?;

        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT invoice_id FROM invoices WHERE invoice_id = $1 FOR UPDATE",
        )
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| BillingError::database("Failed to lock invoice", e))?;
        if locked.is_none() {
            return Ok(false);
        }

        let allocations = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM payment_allocations WHERE invoice_id = $1",
        )
        .bind(invoice_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| BillingError::database("Failed to count allocations", e))?;
        if allocations > 0 {
            return Err(BillingError::Conflict(format!(
                "Invoice has {} payment allocation(s) and cannot be deleted",
                allocations
            )));
        }

        let released = sqlx::query("UPDATE consignments SET invoice_id = NULL WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to release consignments", e))?;

        sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to delete invoice", e))?;

        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit invoice deletion", e))?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice_id,
            released = released.rows_affected(),
            "Invoice deleted"
        );

        Ok(true)
    }

    /// Set `received_amount` to the sum of the invoice's allocations.
    async fn recompute_received_tx(
        tx: &mut Transaction<'static, Postgres>,
        invoice_id: Uuid,
    ) -> Result<Invoice, BillingError> {
        let sql = format!(
            r#"
            UPDATE invoices
            SET received_amount = COALESCE(
                (SELECT SUM(amount) FROM payment_allocations WHERE invoice_id = $1), 0)
            WHERE invoice_id = $1
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );
        sqlx::query_as::<_, Invoice>(&sql)
            .bind(invoice_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| BillingError::database("Failed to recompute received amount", e))
    }

    /// Idempotent: repeated runs converge on the allocation sum.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn recompute_received(&self, invoice_id: Uuid) -> Result<Option<Invoice>, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["recompute_received"])
            .start_timer();

        let mut tx = self.begin().await?;
        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT invoice_id FROM invoices WHERE invoice_id = $1 FOR UPDATE",
        )
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| BillingError::database("Failed to lock invoice", e))?;
        if locked.is_none() {
            return Ok(None);
        }

        let invoice = Self::recompute_received_tx(&mut tx, invoice_id).await?;

        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit recompute", e))?;

        timer.observe_duration();

        Ok(Some(invoice))
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Record a payment and its allocations, then recompute every touched
    /// invoice's received amount under a row lock.
    #[instrument(skip(self, input), fields(party_id = %input.party_id, amount = %input.amount))]
    pub async fn record_payment(
        &self,
        input: &CreatePartyPayment,
        actor: &str,
    ) -> Result<(PartyPayment, Vec<PaymentAllocation>, Vec<Invoice>), BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        validate_allocations(input.amount, &input.allocations)?;

        let mut tx = self.begin().await?;
        Self::ensure_party_exists(&mut tx, input.party_id).await?;

        let mut invoice_ids: Vec<Uuid> = input.allocations.iter().map(|a| a.invoice_id).collect();
        invoice_ids.sort();

        let sql = format!(
            "SELECT {} FROM invoices WHERE invoice_id = ANY($1) ORDER BY invoice_id FOR UPDATE",
            INVOICE_COLUMNS
        );
        let invoices = sqlx::query_as::<_, Invoice>(&sql)
            .bind(&invoice_ids)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to lock invoices", e))?;

        for id in &invoice_ids {
            match invoices.iter().find(|i| i.invoice_id == *id) {
                None => return Err(BillingError::NotFound(format!("Invoice {} not found", id))),
                Some(inv) if inv.party_id != input.party_id => {
                    return Err(BillingError::Validation(format!(
                        "Invoice {} belongs to another party",
                        inv.invoice_number
                    )));
                }
                Some(_) => {}
            }
        }

        let payment = sqlx::query_as::<_, PartyPayment>(
            r#"
            INSERT INTO party_payments (
                payment_id, party_id, amount, payment_date, method, reference, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING payment_id, party_id, amount, payment_date, method, reference, notes,
                created_by, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.party_id)
        .bind(input.amount)
        .bind(input.payment_date)
        .bind(&input.method)
        .bind(&input.reference)
        .bind(&input.notes)
        .bind(actor)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| BillingError::database("Failed to record payment", e))?;

        let mut allocations = Vec::with_capacity(input.allocations.len());
        for allocation in &input.allocations {
            let stored = sqlx::query_as::<_, PaymentAllocation>(
                r#"
                INSERT INTO payment_allocations (allocation_id, payment_id, invoice_id, amount)
                VALUES ($1, $2, $3, $4)
                RETURNING allocation_id, payment_id, invoice_id, amount, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(payment.payment_id)
            .bind(allocation.invoice_id)
            .bind(allocation.amount)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| BillingError::database("Failed to record allocation", e))?;
            allocations.push(stored);
        }

        let mut balances = Vec::with_capacity(invoice_ids.len());
        for id in &invoice_ids {
            let invoice = Self::recompute_received_tx(&mut tx, *id).await?;
            if invoice.received_amount > invoice.total_amount {
                return Err(BillingError::Validation(format!(
                    "Allocations to invoice {} exceed its total ({} > {})",
                    invoice.invoice_number, invoice.received_amount, invoice.total_amount
                )));
            }
            balances.push(invoice);
        }

        tx.commit()
            .await
            .map_err(|e| BillingError::database("Failed to commit payment", e))?;

        timer.observe_duration();

        record_amount(&PAYMENT_AMOUNT_TOTAL, payment.amount);
        info!(
            payment_id = %payment.payment_id,
            allocations = allocations.len(),
            "Party payment recorded"
        );

        Ok((payment, allocations, balances))
    }

    // -------------------------------------------------------------------------
    // Billing Status
    // -------------------------------------------------------------------------

    /// Unbilled, billed and paid amounts for a party, optionally within a
    /// shipment period.
    #[instrument(skip(self), fields(party_id = %party_id))]
    pub async fn billing_summary(
        &self,
        party_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<BillingSummary, BillingError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["billing_summary"])
            .start_timer();

        let party = self
            .find_party_by_id(party_id)
            .await?
            .ok_or_else(|| BillingError::PartyNotFound {
                party: party_id.to_string(),
            })?;

        let unbilled = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(COALESCE(calculated_amount, final_collected, retail_price, 0)), 0)
            FROM consignments
            WHERE invoice_id IS NULL
              AND normalized_party = $1
              AND ($2::date IS NULL OR shipment_date >= $2)
              AND ($3::date IS NULL OR shipment_date <= $3)
            "#,
        )
        .bind(&party.normalized_name)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BillingError::database("Failed to sum unbilled consignments", e))?;

        let (billed, paid) = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT COALESCE(SUM(total_amount), 0), COALESCE(SUM(received_amount), 0)
            FROM invoices
            WHERE party_id = $1
              AND ($2::date IS NULL OR period_end >= $2)
              AND ($3::date IS NULL OR period_start <= $3)
            "#,
        )
        .bind(party_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BillingError::database("Failed to sum invoices", e))?;

        timer.observe_duration();

        Ok(BillingSummary::new(party_id, unbilled, billed, paid))
    }
}

#[async_trait]
impl ReferenceSource for Database {
    async fn load_metro_cities(&self) -> Result<Vec<String>, AppError> {
        sqlx::query_scalar::<_, String>("SELECT city FROM metro_cities WHERE active = TRUE")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to load metro cities: {}", e))
            })
    }

    async fn load_state_adjacency(&self) -> Result<Vec<(String, String)>, AppError> {
        sqlx::query_as::<_, (String, String)>(
            "SELECT state_code, neighbor_state_code FROM state_adjacency",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load state adjacency: {}", e))
        })
    }
}

#[async_trait]
impl AuditSink for Database {
    async fn append_rate_audit(&self, audit: &NewRateAudit) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO rate_audits (
                audit_id, rate_slab_id, action, before_snapshot, after_snapshot, actor
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(audit.rate_slab_id)
        .bind(audit.action.as_str())
        .bind(&audit.before_snapshot)
        .bind(&audit.after_snapshot)
        .bind(&audit.actor)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to write rate audit: {}", e)))?;
        Ok(())
    }
}
