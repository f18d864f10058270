//! Courier Billing Service - rate resolution and invoice reconciliation for
//! courier consignments.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
