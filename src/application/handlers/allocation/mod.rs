//! Allocation command handlers.

mod allocate_picks;

pub use allocate_picks::{AllocatePicksCommand, AllocatePicksHandler, AllocatePicksResult};
