#![warn(clippy::unwrap_used)]

//! Per-respondent session persistence with TTL.
//!
//! The backend is an explicit dependency of the engine: Redis for
//! multi-process deployments, the in-process store for single-node and test
//! use. There is no silent fallback between them — a Redis failure surfaces
//! as a `StoreError` rather than degrading to process-local persistence.

pub mod client;
pub mod local;
pub mod store;

pub use client::RedisSessionStore;
pub use local::MemorySessionStore;
pub use store::{SessionStore, StoreError};
