//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).

pub mod handlers;

pub use handlers::{
    AllocatePicksCommand, AllocatePicksHandler, AllocatePicksResult, ApplyBillingEventHandler,
    BillingWebhookAck, ClearGrantCommand, ClearGrantHandler, ExpireGrantsHandler,
    GetEffectiveTierHandler, GetEffectiveTierQuery, GrantAccessCommand, GrantAccessHandler,
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, RetryFailedWebhooksHandler,
    RetryReport, SweepReport,
};
