//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `entitlement` - Subscription lifecycle, grants, and tier resolution
//! - `allocation` - Tier-bounded content selection

pub mod allocation;
pub mod entitlement;
pub mod foundation;
