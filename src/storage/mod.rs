//! Persisted local state: a small key/value store that survives restarts.
//!
//! The session keeps two entries here: the serialized identity snapshot
//! under [`USER_KEY`] and the opaque bearer credential under
//! [`AUTH_TOKEN_KEY`]. When the server authenticates through an HTTP-only
//! cookie the token entry stays empty.

mod sqlite;

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

pub use sqlite::SqliteStore;

/// Key of the serialized identity snapshot
pub const USER_KEY: &str = "user";
/// Key of the bearer credential
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// Trait for local state backends.
pub trait LocalStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  /// Remove a key. Removing a missing key is not an error.
  fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store. Nothing outlives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl LocalStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.remove(key);
    Ok(())
  }
}
