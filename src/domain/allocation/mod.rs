//! Content allocation domain module.
//!
//! Pure selection of a tier-bounded set of picks from a candidate pool.

mod allocator;
mod content_item;

pub use allocator::{allocate, Allocation, SportPreferences};
pub use content_item::{ContentItem, PickCategory, Sport};
