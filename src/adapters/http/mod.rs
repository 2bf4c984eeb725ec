//! HTTP adapters - REST API implementations.

pub mod entitlement;

pub use entitlement::{entitlement_router, EntitlementAppState, EntitlementSettings, EntitlementStores};
