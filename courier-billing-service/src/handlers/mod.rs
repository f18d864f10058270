//! HTTP handlers for courier-billing-service.
//!
//! Health, readiness and metrics endpoints live in `startup`.

pub mod consignments;
pub mod distance;
pub mod invoices;
pub mod parties;
pub mod payments;
pub mod rate_slabs;
pub mod rates;
pub mod weight_slabs;
