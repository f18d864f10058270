//! Domain models for courier-billing-service.

mod consignment;
mod invoice;
mod party;
mod payment;
mod rate_slab;
mod reference;

pub use consignment::{Consignment, NewConsignment, StoredPricing};
pub use invoice::{Invoice, InvoiceLine, InvoiceTotals, NewInvoiceLine};
pub use party::Party;
pub use payment::{AllocationInput, CreatePartyPayment, PartyPayment, PaymentAllocation};
pub use rate_slab::{
    AuditAction, ListRateSlabsFilter, PartyRateSlab, RateAudit, RatePricing, RateSlabKey,
    UpsertRateSlab,
};
pub use reference::{
    CreateWeightSlab, DistanceCategory, DistanceSlab, Mode, ServiceType, ShipmentType,
    UpdateWeightSlab, WeightSlab,
};
