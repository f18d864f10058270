//! Services module for courier-billing-service.

pub mod address;
pub mod catalog;
pub mod database;
pub mod error;
pub mod metrics;
pub mod pricing;
pub mod reconciler;
pub mod reference_cache;
pub mod registry;
pub mod resolver;
pub mod weight;

pub use address::{AddressClassifier, Classification, ParsedAddress, ReferenceTables};
pub use catalog::DbCatalog;
pub use database::Database;
pub use error::BillingError;
pub use metrics::{get_metrics, init_metrics};
pub use reference_cache::ReferenceCache;
pub use registry::RateSlabRegistry;
pub use resolver::{PartyRef, RateResolver, ResolveRateInput, ResolvedRate};
