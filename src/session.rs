//! Session store: the single source of truth for who is logged in.
//!
//! The identity lives in two places that are kept in step: an in-memory
//! snapshot observable through a watch channel, and the persisted copy in
//! the [`LocalStore`]. [`SessionState`] owns both and is shared with the
//! transport, which must be able to end the session on a 401.

use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::client::ApiClient;
use crate::api::envelope::RegisterOutcome;
use crate::api::types::{AuthPayload, LoginForm, RegisterForm, Role, User, UserPatch};
use crate::cache::ResourceCache;
use crate::error::ApiResult;
use crate::event::EventSink;
use crate::storage::{LocalStore, AUTH_TOKEN_KEY, USER_KEY};

const LOGIN: &str = "/auth/login";
const REGISTER: &str = "/auth/register";
const LOGOUT: &str = "/auth/logout";
const ME: &str = "/auth/me";
const CHANGE_PASSWORD: &str = "/auth/change-password";
const FORGOT_PASSWORD: &str = "/auth/forgot-password";
const RESET_PASSWORD: &str = "/auth/reset-password";

// ============================================================================
// Observable state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
  Uninitialized,
  Loading,
  Authenticated,
  Anonymous,
}

/// Route guard kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
  /// Requires a session, optionally with a specific role
  Protected { role: Option<Role> },
  /// Only for visitors without a session (login, register)
  PublicOnly,
}

impl Guard {
  pub fn authenticated() -> Self {
    Self::Protected { role: None }
  }

  pub fn role(role: Role) -> Self {
    Self::Protected { role: Some(role) }
  }
}

/// Outcome of evaluating a [`Guard`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  /// The session is still being established
  Pending,
  Granted,
  RedirectToLogin,
  Unauthorized,
  RedirectToDashboard,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
  pub user: Option<User>,
  pending: u32,
  initialized: bool,
}

impl Snapshot {
  pub fn is_authenticated(&self) -> bool {
    self.user.is_some()
  }

  pub fn is_loading(&self) -> bool {
    self.pending > 0
  }

  pub fn phase(&self) -> SessionPhase {
    if self.is_loading() {
      SessionPhase::Loading
    } else if self.user.is_some() {
      SessionPhase::Authenticated
    } else if !self.initialized {
      SessionPhase::Uninitialized
    } else {
      SessionPhase::Anonymous
    }
  }

  pub fn has_role(&self, role: Role) -> bool {
    self.user.as_ref().is_some_and(|u| u.role() == role)
  }

  pub fn access(&self, guard: Guard) -> Access {
    match self.phase() {
      SessionPhase::Uninitialized | SessionPhase::Loading => return Access::Pending,
      SessionPhase::Authenticated | SessionPhase::Anonymous => {}
    }

    match (guard, &self.user) {
      (Guard::Protected { .. }, None) => Access::RedirectToLogin,
      (Guard::Protected { role: Some(role) }, Some(user)) if user.role() != role => {
        Access::Unauthorized
      }
      (Guard::Protected { .. }, Some(_)) => Access::Granted,
      (Guard::PublicOnly, Some(_)) => Access::RedirectToDashboard,
      (Guard::PublicOnly, None) => Access::Granted,
    }
  }
}

/// Shared handle on the in-memory and persisted session.
#[derive(Clone)]
pub struct SessionState {
  store: Arc<dyn LocalStore>,
  snapshot: Arc<watch::Sender<Snapshot>>,
}

impl SessionState {
  pub fn new(store: Arc<dyn LocalStore>) -> Self {
    let (tx, _) = watch::channel(Snapshot::default());
    Self {
      store,
      snapshot: Arc::new(tx),
    }
  }

  pub fn snapshot(&self) -> Snapshot {
    self.snapshot.borrow().clone()
  }

  pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
    self.snapshot.subscribe()
  }

  pub fn user(&self) -> Option<User> {
    self.snapshot.borrow().user.clone()
  }

  pub fn is_authenticated(&self) -> bool {
    self.snapshot.borrow().is_authenticated()
  }

  /// Stored bearer credential, if any
  pub fn token(&self) -> Option<String> {
    match self.store.get(AUTH_TOKEN_KEY) {
      Ok(token) => token.filter(|t| !t.is_empty()),
      Err(error) => {
        warn!(%error, "failed to read auth token");
        None
      }
    }
  }

  fn store_token(&self, token: &str) {
    if let Err(error) = self.store.set(AUTH_TOKEN_KEY, token) {
      warn!(%error, "failed to persist auth token");
    }
  }

  /// Persisted identity snapshot. A snapshot that does not parse is absent.
  pub fn stored_user(&self) -> Option<User> {
    let raw = match self.store.get(USER_KEY) {
      Ok(raw) => raw?,
      Err(error) => {
        warn!(%error, "failed to read stored identity");
        return None;
      }
    };
    match serde_json::from_str(&raw) {
      Ok(user) => Some(user),
      Err(error) => {
        warn!(%error, "ignoring corrupt identity snapshot");
        None
      }
    }
  }

  fn persist(&self, user: &User) {
    let result = serde_json::to_string(user)
      .map_err(color_eyre::eyre::Report::from)
      .and_then(|raw| self.store.set(USER_KEY, &raw));
    if let Err(error) = result {
      warn!(%error, "failed to persist identity");
    }
  }

  /// Set the in-memory identity without persisting it
  fn set_user(&self, user: User) {
    self.snapshot.send_modify(|s| s.user = Some(user));
  }

  /// Set the identity and persist it
  pub fn replace_user(&self, user: User) {
    self.persist(&user);
    self.set_user(user);
  }

  /// Merge `patch` into the current identity. No-op without a session.
  pub fn update(&self, patch: UserPatch) {
    let mut updated = None;
    self.snapshot.send_if_modified(|s| match &mut s.user {
      Some(user) => {
        user.apply(patch);
        updated = Some(user.clone());
        true
      }
      None => false,
    });
    if let Some(user) = updated {
      self.persist(&user);
    }
  }

  /// Drop the identity from memory and storage, token included
  pub fn clear(&self) {
    for key in [USER_KEY, AUTH_TOKEN_KEY] {
      if let Err(error) = self.store.remove(key) {
        warn!(key, %error, "failed to remove persisted session entry");
      }
    }
    self.snapshot.send_if_modified(|s| s.user.take().is_some());
  }

  /// Enter the loading phase until the returned scope is dropped.
  fn begin_loading(&self) -> LoadingScope {
    self.enter_loading(false)
  }

  /// Like [`Self::begin_loading`]; the session also counts as initialized
  /// once the scope ends.
  fn begin_initializing(&self) -> LoadingScope {
    self.enter_loading(true)
  }

  fn enter_loading(&self, initializes: bool) -> LoadingScope {
    self.snapshot.send_modify(|s| s.pending += 1);
    LoadingScope {
      state: self.clone(),
      initializes,
    }
  }
}

/// Leaves the loading phase on drop, on every exit path.
struct LoadingScope {
  state: SessionState,
  initializes: bool,
}

impl Drop for LoadingScope {
  fn drop(&mut self) {
    let initializes = self.initializes;
    self.state.snapshot.send_modify(|s| {
      s.pending = s.pending.saturating_sub(1);
      s.initialized |= initializes;
    });
  }
}

// ============================================================================
// Session operations
// ============================================================================

#[derive(Clone)]
pub struct SessionStore {
  api: ApiClient,
  state: SessionState,
  cache: ResourceCache,
  events: EventSink,
}

impl SessionStore {
  pub fn new(api: ApiClient, state: SessionState, cache: ResourceCache, events: EventSink) -> Self {
    Self {
      api,
      state,
      cache,
      events,
    }
  }

  pub fn state(&self) -> &SessionState {
    &self.state
  }

  pub fn user(&self) -> Option<User> {
    self.state.user()
  }

  pub fn is_authenticated(&self) -> bool {
    self.state.is_authenticated()
  }

  pub fn phase(&self) -> SessionPhase {
    self.state.snapshot().phase()
  }

  pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
    self.state.subscribe()
  }

  pub fn has_role(&self, role: Role) -> bool {
    self.state.snapshot().has_role(role)
  }

  pub fn access(&self, guard: Guard) -> Access {
    self.state.snapshot().access(guard)
  }

  /// Restore the persisted identity and verify it with the server.
  pub async fn initialize(&self) {
    let _loading = self.state.begin_initializing();

    let Some(stored) = self.state.stored_user() else {
      debug!("no stored identity");
      return;
    };
    self.state.set_user(stored);

    match self
      .api
      .envelope::<AuthPayload>(Method::GET, ME, &[], None)
      .await
    {
      Ok(envelope) => match envelope.into_data() {
        Ok(payload) => {
          info!(user_id = %payload.user.user_id, "session verified");
          self.state.replace_user(payload.user);
        }
        Err(error) => debug!(%error, "verification returned no identity, keeping stored one"),
      },
      Err(error) => {
        warn!(%error, "stored session could not be verified, signing out");
        self.state.clear();
      }
    }
  }

  pub async fn login(&self, email: &str, password: &str) -> bool {
    let _loading = self.state.begin_loading();
    let form = LoginForm {
      email: email.to_string(),
      password: password.to_string(),
    };

    match self.api.post::<AuthPayload, _>(LOGIN, &form).await {
      Ok(payload) => {
        info!(user_id = %payload.user.user_id, "logged in");
        self.establish(payload.user, payload.token);
        self.events.success("Login successful!");
        true
      }
      Err(error) => {
        warn!(%error, "login failed");
        self.events.error(error.user_message("Login failed"));
        false
      }
    }
  }

  pub async fn register(&self, form: &RegisterForm) -> bool {
    let _loading = self.state.begin_loading();

    let outcome = match self.api.post_raw(REGISTER, form).await {
      Ok(body) => RegisterOutcome::from_body(body),
      Err(error) => {
        warn!(%error, "registration failed");
        self.events.error(error.user_message("Registration failed"));
        return false;
      }
    };

    match outcome {
      RegisterOutcome::Registered { user, token } => {
        info!(user_id = %user.user_id, "registered");
        self.establish(user, token);
        self.events.success("Registration successful!");
        true
      }
      RegisterOutcome::Failed { message } => {
        warn!(%message, "registration rejected");
        if message.is_empty() {
          self.events.error("Registration failed");
        } else {
          self.events.error(message);
        }
        false
      }
    }
  }

  fn establish(&self, user: User, token: Option<String>) {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
      self.state.store_token(&token);
    }
    self.state.replace_user(user);
  }

  /// End the session locally, whatever the server says.
  pub async fn logout(&self) {
    if let Err(error) = self.api.post_ack(LOGOUT, &json!({})).await {
      warn!(%error, "server logout failed, clearing local session anyway");
    }
    self.state.clear();
    self.cache.clear();
    info!("logged out");
    self.events.success("Logged out successfully");
  }

  pub fn update_identity(&self, patch: UserPatch) {
    self.state.update(patch);
  }

  pub async fn refresh_identity(&self) {
    match self.api.get::<AuthPayload>(ME, &[]).await {
      Ok(payload) => self.state.replace_user(payload.user),
      Err(error) => warn!(%error, "failed to refresh identity"),
    }
  }

  pub async fn change_password(&self, current: &str, new: &str) -> ApiResult<()> {
    self
      .api
      .post_ack(
        CHANGE_PASSWORD,
        &json!({ "currentPassword": current, "newPassword": new }),
      )
      .await
  }

  pub async fn forgot_password(&self, email: &str) -> ApiResult<()> {
    self
      .api
      .post_ack(FORGOT_PASSWORD, &json!({ "email": email }))
      .await
  }

  pub async fn reset_password(&self, token: &str, new: &str) -> ApiResult<()> {
    self
      .api
      .post_ack(RESET_PASSWORD, &json!({ "token": token, "newPassword": new }))
      .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::Fingerprint;
  use crate::config::ApiConfig;
  use crate::error::ApiError;
  use crate::event::{AppEvent, EventStream, NoticeKind};
  use crate::storage::MemoryStore;
  use mockito::Matcher;
  use std::time::Duration;

  struct Harness {
    session: SessionStore,
    store: Arc<MemoryStore>,
    cache: ResourceCache,
    events: EventStream,
  }

  fn harness(base_url: &str) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let state = SessionState::new(store.clone());
    let (sink, events) = EventSink::channel();
    let config = ApiConfig {
      base_url: base_url.to_string(),
      timeout_ms: 2_000,
    };
    let api = ApiClient::new(&config, state.clone(), sink.clone()).unwrap();
    let cache = ResourceCache::new();
    Harness {
      session: SessionStore::new(api, state, cache.clone(), sink),
      store,
      cache,
      events,
    }
  }

  fn user(value: serde_json::Value) -> User {
    serde_json::from_value(value).unwrap()
  }

  fn notice(kind: NoticeKind, message: &str) -> AppEvent {
    AppEvent::Notice {
      kind,
      message: message.to_string(),
    }
  }

  fn sign_in(h: &Harness) {
    h.session
      .state
      .replace_user(user(json!({"user_id": "1", "email": "a@b.com"})));
    h.store.set(AUTH_TOKEN_KEY, "tok").unwrap();
  }

  #[tokio::test]
  async fn test_login_persists_exact_snapshot() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("POST", "/auth/login")
      .match_body(Matcher::Json(json!({"email": "a@b.com", "password": "pw"})))
      .with_status(200)
      .with_body(
        json!({"success": true, "message": "ok", "data": {"user": {"user_id": "1", "email": "a@b.com"}}})
          .to_string(),
      )
      .create_async()
      .await;

    let mut h = harness(&server.url());
    assert!(h.session.login("a@b.com", "pw").await);

    mock.assert_async().await;
    assert!(h.session.is_authenticated());
    assert_eq!(h.session.phase(), SessionPhase::Authenticated);
    assert_eq!(
      h.store.get(USER_KEY).unwrap().as_deref(),
      Some(r#"{"user_id":"1","email":"a@b.com"}"#)
    );
    assert_eq!(h.store.get(AUTH_TOKEN_KEY).unwrap(), None);
    assert_eq!(
      h.events.drain(),
      vec![notice(NoticeKind::Success, "Login successful!")]
    );
  }

  #[tokio::test]
  async fn test_login_stores_bearer_token() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/auth/login")
      .with_status(200)
      .with_body(
        json!({"success": true, "message": "", "data": {"user": {"user_id": "1"}, "token": "t0k"}})
          .to_string(),
      )
      .create_async()
      .await;
    let me = server
      .mock("GET", "/auth/me")
      .match_header("authorization", "Bearer t0k")
      .with_status(200)
      .with_body(json!({"success": true, "message": "", "data": {"user": {"user_id": "1"}}}).to_string())
      .create_async()
      .await;

    let h = harness(&server.url());
    assert!(h.session.login("a@b.com", "pw").await);
    assert_eq!(h.store.get(AUTH_TOKEN_KEY).unwrap().as_deref(), Some("t0k"));

    h.session.refresh_identity().await;
    me.assert_async().await;
  }

  #[tokio::test]
  async fn test_login_failure_leaves_session() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/auth/login")
      .with_status(200)
      .with_body(json!({"success": false, "message": "Invalid credentials"}).to_string())
      .create_async()
      .await;

    let mut h = harness(&server.url());
    assert!(!h.session.login("a@b.com", "nope").await);

    assert!(!h.session.is_authenticated());
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
    assert_eq!(
      h.events.drain(),
      vec![notice(NoticeKind::Error, "Invalid credentials")]
    );

    // Only initialize settles the phase; guards keep waiting until then
    assert_eq!(h.session.phase(), SessionPhase::Uninitialized);
    assert_eq!(h.session.access(Guard::authenticated()), Access::Pending);

    h.session.initialize().await;
    assert_eq!(h.session.phase(), SessionPhase::Anonymous);
  }

  #[tokio::test]
  async fn test_login_failure_without_message_uses_fallback() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/auth/login")
      .with_status(200)
      .with_body(json!({"success": false}).to_string())
      .create_async()
      .await;

    let mut h = harness(&server.url());
    assert!(!h.session.login("a@b.com", "pw").await);
    assert_eq!(
      h.events.drain(),
      vec![notice(NoticeKind::Error, "Login failed")]
    );
  }

  #[tokio::test]
  async fn test_register_accepts_direct_shape() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/auth/register")
      .with_status(201)
      .with_body(json!({"message": "ok", "user": {"user_id": "2"}}).to_string())
      .create_async()
      .await;

    let mut h = harness(&server.url());
    let form = RegisterForm {
      email: "c@d.com".into(),
      password: "pw".into(),
      username: "cd".into(),
    };
    assert!(h.session.register(&form).await);

    assert_eq!(h.session.user().map(|u| u.user_id), Some("2".to_string()));
    assert_eq!(
      h.store.get(USER_KEY).unwrap().as_deref(),
      Some(r#"{"user_id":"2"}"#)
    );
    assert_eq!(
      h.events.drain(),
      vec![notice(NoticeKind::Success, "Registration successful!")]
    );
  }

  #[tokio::test]
  async fn test_register_accepts_wrapped_shape() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/auth/register")
      .with_status(201)
      .with_body(
        json!({"success": true, "message": "ok", "data": {"user": {"user_id": "3", "email": "e@f.com"}}})
          .to_string(),
      )
      .create_async()
      .await;

    let h = harness(&server.url());
    let form = RegisterForm {
      email: "e@f.com".into(),
      password: "pw".into(),
      username: "ef".into(),
    };
    assert!(h.session.register(&form).await);
    assert_eq!(h.session.user().map(|u| u.email), Some("e@f.com".to_string()));
  }

  #[tokio::test]
  async fn test_register_rejection() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/auth/register")
      .with_status(200)
      .with_body(json!({"success": false, "message": ""}).to_string())
      .create_async()
      .await;

    let mut h = harness(&server.url());
    let form = RegisterForm {
      email: "e@f.com".into(),
      password: "pw".into(),
      username: "ef".into(),
    };
    assert!(!h.session.register(&form).await);
    assert!(!h.session.is_authenticated());
    assert_eq!(
      h.events.drain(),
      vec![notice(NoticeKind::Error, "Registration failed")]
    );
  }

  #[tokio::test]
  async fn test_logout_clears_even_when_server_unreachable() {
    let mut h = harness("http://127.0.0.1:1");
    sign_in(&h);

    h.session.logout().await;

    assert!(!h.session.is_authenticated());
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
    assert_eq!(h.store.get(AUTH_TOKEN_KEY).unwrap(), None);
    assert!(h
      .events
      .drain()
      .contains(&notice(NoticeKind::Success, "Logged out successfully")));
  }

  #[tokio::test]
  async fn test_logout_drops_cached_resources() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/auth/logout")
      .with_status(200)
      .with_body(json!({"success": true, "message": "bye"}).to_string())
      .create_async()
      .await;

    let h = harness(&server.url());
    sign_in(&h);
    h.cache
      .read(
        &Fingerprint::new("user-memberships"),
        Duration::from_secs(60),
        || async { Ok::<_, ApiError>(vec![1u32]) },
      )
      .await
      .unwrap();
    assert_eq!(h.cache.len(), 1);

    h.session.logout().await;
    assert!(h.cache.is_empty());
    assert!(!h.session.is_authenticated());
  }

  #[tokio::test]
  async fn test_initialize_replaces_with_verified_identity() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/auth/me")
      .with_status(200)
      .with_body(
        json!({"success": true, "message": "", "data": {"user": {"user_id": "1", "email": "new@b.com"}}})
          .to_string(),
      )
      .create_async()
      .await;

    let h = harness(&server.url());
    h.store
      .set(USER_KEY, r#"{"user_id":"1","email":"old@b.com"}"#)
      .unwrap();
    assert_eq!(h.session.phase(), SessionPhase::Uninitialized);

    h.session.initialize().await;

    assert_eq!(h.session.phase(), SessionPhase::Authenticated);
    assert_eq!(h.session.user().map(|u| u.email), Some("new@b.com".to_string()));
    assert_eq!(
      h.store.get(USER_KEY).unwrap().as_deref(),
      Some(r#"{"user_id":"1","email":"new@b.com"}"#)
    );
  }

  #[tokio::test]
  async fn test_initialize_fails_closed() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/auth/me")
      .with_status(500)
      .create_async()
      .await;

    let h = harness(&server.url());
    h.store.set(USER_KEY, r#"{"user_id":"1"}"#).unwrap();
    h.store.set(AUTH_TOKEN_KEY, "tok").unwrap();

    h.session.initialize().await;

    assert_eq!(h.session.phase(), SessionPhase::Anonymous);
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
    assert_eq!(h.store.get(AUTH_TOKEN_KEY).unwrap(), None);
  }

  #[tokio::test]
  async fn test_initialize_keeps_identity_on_unsuccessful_envelope() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/auth/me")
      .with_status(200)
      .with_body(json!({"success": false, "message": "try later"}).to_string())
      .create_async()
      .await;

    let h = harness(&server.url());
    h.store.set(USER_KEY, r#"{"user_id":"1"}"#).unwrap();

    h.session.initialize().await;
    assert_eq!(h.session.phase(), SessionPhase::Authenticated);
  }

  #[tokio::test]
  async fn test_initialize_without_snapshot_skips_network() {
    let mut server = mockito::Server::new_async().await;
    let me = server
      .mock("GET", "/auth/me")
      .expect(0)
      .create_async()
      .await;

    let h = harness(&server.url());
    h.store.set(USER_KEY, "{not json").unwrap();

    h.session.initialize().await;

    me.assert_async().await;
    assert_eq!(h.session.phase(), SessionPhase::Anonymous);
    assert_eq!(h.session.access(Guard::authenticated()), Access::RedirectToLogin);
  }

  #[tokio::test]
  async fn test_refresh_failure_leaves_state() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/auth/me")
      .with_status(503)
      .create_async()
      .await;

    let h = harness(&server.url());
    sign_in(&h);

    h.session.refresh_identity().await;
    assert_eq!(h.session.user().map(|u| u.user_id), Some("1".to_string()));
  }

  #[tokio::test]
  async fn test_unauthorized_anywhere_signs_out() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/auth/change-password")
      .with_status(401)
      .create_async()
      .await;

    let mut h = harness(&server.url());
    sign_in(&h);
    let mut watcher = h.session.subscribe();

    let err = h.session.change_password("old", "new").await.unwrap_err();
    assert!(err.is_unauthorized());
    assert!(!h.session.is_authenticated());
    assert!(watcher.has_changed().unwrap());
    assert!(!watcher.borrow_and_update().is_authenticated());
    assert_eq!(h.events.drain(), vec![AppEvent::RedirectToLogin]);
  }

  #[tokio::test]
  async fn test_password_endpoints_send_expected_bodies() {
    let mut server = mockito::Server::new_async().await;
    let forgot = server
      .mock("POST", "/auth/forgot-password")
      .match_body(Matcher::Json(json!({"email": "a@b.com"})))
      .with_status(200)
      .with_body(json!({"success": true, "message": "sent"}).to_string())
      .create_async()
      .await;
    let reset = server
      .mock("POST", "/auth/reset-password")
      .match_body(Matcher::Json(json!({"token": "r1", "newPassword": "pw2"})))
      .with_status(200)
      .with_body(json!({"success": false, "message": "Token expired"}).to_string())
      .create_async()
      .await;

    let h = harness(&server.url());
    h.session.forgot_password("a@b.com").await.unwrap();
    assert_eq!(
      h.session.reset_password("r1", "pw2").await.unwrap_err(),
      ApiError::rejected("Token expired")
    );
    forgot.assert_async().await;
    reset.assert_async().await;
  }

  #[test]
  fn test_update_identity_merges_and_persists() {
    let h = harness("http://localhost:3000/api");
    h.session.update_identity(UserPatch {
      first_name: Some("Ann".into()),
      ..Default::default()
    });
    assert!(h.session.user().is_none());
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);

    sign_in(&h);
    h.session.update_identity(UserPatch {
      first_name: Some("Ann".into()),
      ..Default::default()
    });
    assert_eq!(
      h.store.get(USER_KEY).unwrap().as_deref(),
      Some(r#"{"user_id":"1","email":"a@b.com","first_name":"Ann"}"#)
    );
  }

  #[test]
  fn test_access_rules() {
    let mut snapshot = Snapshot::default();
    assert_eq!(snapshot.access(Guard::authenticated()), Access::Pending);

    snapshot.initialized = true;
    assert_eq!(snapshot.access(Guard::authenticated()), Access::RedirectToLogin);
    assert_eq!(snapshot.access(Guard::PublicOnly), Access::Granted);

    snapshot.user = Some(user(json!({"user_id": "1"})));
    assert_eq!(snapshot.access(Guard::authenticated()), Access::Granted);
    assert_eq!(snapshot.access(Guard::role(Role::Admin)), Access::Unauthorized);
    assert_eq!(snapshot.access(Guard::role(Role::User)), Access::Granted);
    assert_eq!(snapshot.access(Guard::PublicOnly), Access::RedirectToDashboard);
    assert!(snapshot.has_role(Role::User));
    assert!(!snapshot.has_role(Role::Admin));

    snapshot.pending = 1;
    assert_eq!(snapshot.access(Guard::authenticated()), Access::Pending);
  }
}
