//! Entitlement Engine - Subscription lifecycle, time-boxed grants, and
//! tier-bounded content allocation.
//!
//! Billing-provider webhooks drive subscription state, operators open 24-hour
//! grant windows, and every read resolves the account's effective tier to
//! decide how many picks it receives.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
