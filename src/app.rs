use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::api::{ApiClient, FitflixClient};
use crate::cache::ResourceCache;
use crate::config::Config;
use crate::event::EventSink;
use crate::session::{SessionState, SessionStore};
use crate::storage::{LocalStore, SqliteStore};

/// Main application state: one session, one cache, one transport.
pub struct App {
  config: Config,
  session: SessionStore,
  client: FitflixClient,
}

impl App {
  /// Wire the application on top of `store`.
  pub fn new(config: Config, store: Arc<dyn LocalStore>, events: EventSink) -> Result<Self> {
    let state = SessionState::new(store);
    let cache = ResourceCache::new();
    let api = ApiClient::new(&config.api, state.clone(), events.clone())?;

    let session = SessionStore::new(api.clone(), state, cache.clone(), events);
    let client = FitflixClient::new(api, cache);

    Ok(Self {
      config,
      session,
      client,
    })
  }

  /// Wire the application with the SQLite store in the data directory.
  pub fn open(config: Config, events: EventSink) -> Result<Self> {
    let dir = config.data_dir()?;
    debug!(dir = %dir.display(), "opening local state");
    let store = SqliteStore::open_in(&dir)?;
    Self::new(config, Arc::new(store), events)
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn session(&self) -> &SessionStore {
    &self.session
  }

  pub fn client(&self) -> &FitflixClient {
    &self.client
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::USER_KEY;

  #[tokio::test]
  async fn test_open_restores_persisted_identity() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/auth/me")
      .with_status(200)
      .with_body(r#"{"success":true,"message":"","data":{"user":{"user_id":"9"}}}"#)
      .create_async()
      .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.api.base_url = server.url();
    config.data_dir = Some(dir.path().to_path_buf());

    {
      let store = SqliteStore::open_in(dir.path()).unwrap();
      store.set(USER_KEY, r#"{"user_id":"9"}"#).unwrap();
    }

    let app = App::open(config, EventSink::disconnected()).unwrap();
    app.session().initialize().await;
    assert_eq!(
      app.session().user().map(|u| u.user_id),
      Some("9".to_string())
    );
  }

  #[tokio::test]
  async fn test_logout_drops_client_cache() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/memberships")
      .with_status(200)
      .with_body(r#"{"success":true,"message":"","data":[]}"#)
      .create_async()
      .await;
    server
      .mock("POST", "/auth/logout")
      .with_status(200)
      .with_body(r#"{"success":true,"message":""}"#)
      .create_async()
      .await;

    let mut config = Config::default();
    config.api.base_url = server.url();
    let app = App::new(
      config,
      Arc::new(crate::storage::MemoryStore::new()),
      EventSink::disconnected(),
    )
    .unwrap();

    app.client().membership_plans().await.unwrap();
    assert_eq!(app.client().cache().len(), 1);

    app.session().logout().await;
    assert!(app.client().cache().is_empty());
  }
}
