//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod allocation;
pub mod entitlement;

pub use allocation::{AllocatePicksCommand, AllocatePicksHandler, AllocatePicksResult};
pub use entitlement::{
    // Webhooks
    ApplyBillingEventHandler,
    BillingWebhookAck,
    HandleBillingWebhookCommand,
    HandleBillingWebhookHandler,
    RetryFailedWebhooksHandler,
    RetryReport,
    // Grants
    ClearGrantCommand,
    ClearGrantHandler,
    ExpireGrantsHandler,
    GrantAccessCommand,
    GrantAccessHandler,
    SweepReport,
    // Queries
    GetEffectiveTierHandler,
    GetEffectiveTierQuery,
};
