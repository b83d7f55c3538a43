//! Fitflix REST API: transport, wire types and the cached client.

pub mod cached_client;
pub mod client;
pub mod envelope;
pub mod queries;
pub mod types;

pub use cached_client::{FitflixClient, DEFAULT_CHAT_LIMIT, DEFAULT_HISTORY_DAYS};
pub use client::ApiClient;
pub use envelope::{Envelope, RegisterOutcome};
pub use queries::{today, Mutation, ResourceKey};
