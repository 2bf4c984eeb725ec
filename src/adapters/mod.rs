//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - In-memory stores for tests and single-process runs
//! - `postgres` - PostgreSQL repositories (sqlx)
//! - `redis` - Redis tier cache
//! - `http` - Axum REST endpoints
//! - `scheduler` - Background maintenance jobs

pub mod http;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod scheduler;
