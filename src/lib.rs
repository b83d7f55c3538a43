//! Client core of the Fitflix fitness app.
//!
//! - [`session`]: who is logged in, persisted locally and verified with the
//!   server
//! - [`cache`]: keyed resource cache with in-flight de-duplication and
//!   mutation-driven invalidation
//! - [`api`]: the REST transport with its auth and error interceptors, and
//!   the typed, cached client built on it

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod storage;
