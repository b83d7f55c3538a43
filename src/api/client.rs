use color_eyre::{eyre::eyre, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::envelope::Envelope;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult, StatusClass, GENERIC_ERROR, NETWORK_ERROR};
use crate::event::EventSink;
use crate::session::SessionState;

const USER_AGENT: &str = concat!("fitflix/", env!("CARGO_PKG_VERSION"));

/// Query string pairs
pub type Query = [(String, String)];

/// Fitflix REST transport.
///
/// Every request goes through the same two interceptors: the outbound one
/// attaches the stored bearer credential, the inbound one turns error
/// statuses into notices and ends the session on a 401. Cookies set by the
/// server are kept for the lifetime of the client.
#[derive(Clone)]
pub struct ApiClient {
  http: Client,
  base_url: Url,
  session: SessionState,
  events: EventSink,
}

impl ApiClient {
  pub fn new(config: &ApiConfig, session: SessionState, events: EventSink) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base URL '{}': {}", config.base_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid API base URL '{}'", config.base_url));
    }

    let http = Client::builder()
      .user_agent(USER_AGENT)
      .timeout(config.timeout())
      .cookie_store(true)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      session,
      events,
    })
  }

  /// Build the URL for `path` (relative to the base URL) and `query`.
  fn url(&self, path: &str, query: &Query) -> ApiResult<Url> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::Invalid(format!("cannot append {} to base URL", path)))?
      .pop_if_empty()
      .extend(path.split('/').filter(|s| !s.is_empty()));

    if !query.is_empty() {
      url
        .query_pairs_mut()
        .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    Ok(url)
  }

  /// Outbound interceptor: bearer header only when a local token exists.
  fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
    match self.session.token() {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  /// Inbound interceptor for failed requests.
  fn intercept(&self, error: &ApiError) {
    match error {
      ApiError::Status {
        class: StatusClass::Unauthorized,
        ..
      } => {
        info!("request rejected as unauthenticated, ending session");
        self.session.clear();
        self.events.redirect_to_login();
      }
      ApiError::Status { class, message, .. } => {
        let text = class
          .notice()
          .map(String::from)
          .or_else(|| message.clone())
          .unwrap_or_else(|| GENERIC_ERROR.to_string());
        self.events.error(text);
      }
      ApiError::Network(_) => self.events.error(NETWORK_ERROR),
      // Reported by the caller
      ApiError::Rejected { .. } | ApiError::Decode(_) | ApiError::Invalid(_) => {}
    }
  }

  /// Send a request and return the raw JSON body of a 2xx response.
  pub async fn execute(
    &self,
    method: Method,
    path: &str,
    query: &Query,
    body: Option<Value>,
  ) -> ApiResult<Value> {
    let url = self.url(path, query)?;
    debug!(%method, %url, "request");

    let mut request = self.authorize(self.http.request(method, url));
    if let Some(body) = body {
      request = request.json(&body);
    }

    let result = Self::dispatch(request).await;
    if let Err(error) = &result {
      debug!(path, %error, "request failed");
      self.intercept(error);
    }
    result
  }

  async fn dispatch(request: RequestBuilder) -> ApiResult<Value> {
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
      return Err(ApiError::status(status.as_u16(), server_message(&text)));
    }
    if text.trim().is_empty() {
      return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
  }

  /// Send a request and parse the response envelope.
  pub async fn envelope<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    query: &Query,
    body: Option<Value>,
  ) -> ApiResult<Envelope<T>> {
    let value = self.execute(method, path, query, body).await?;
    Ok(serde_json::from_value(value)?)
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> ApiResult<T> {
    self
      .envelope(Method::GET, path, query, None)
      .await?
      .into_data()
  }

  pub async fn post<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let body = serde_json::to_value(body)?;
    self
      .envelope(Method::POST, path, &[], Some(body))
      .await?
      .into_data()
  }

  pub async fn put<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    let body = serde_json::to_value(body)?;
    self
      .envelope(Method::PUT, path, &[], Some(body))
      .await?
      .into_data()
  }

  /// Send a request that only reports success.
  ///
  /// An empty 2xx body (`204 No Content`) counts as success; a body must be
  /// an envelope with `success: true`.
  async fn acknowledge(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> ApiResult<()> {
    let value = self.execute(method, path, &[], body).await?;
    if value.is_null() {
      return Ok(());
    }
    serde_json::from_value::<Envelope<Value>>(value)?.into_ack()
  }

  /// POST that only reports success.
  pub async fn post_ack<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<()> {
    let body = serde_json::to_value(body)?;
    self.acknowledge(Method::POST, path, Some(body)).await
  }

  /// POST returning the body as-is, for endpoints with irregular shapes.
  pub async fn post_raw<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<Value> {
    let body = serde_json::to_value(body)?;
    self.execute(Method::POST, path, &[], Some(body)).await
  }

  pub async fn delete(&self, path: &str) -> ApiResult<()> {
    self.acknowledge(Method::DELETE, path, None).await
  }
}

/// `message` (or `error`) field of an error response body, if any.
fn server_message(body: &str) -> Option<String> {
  let value: Value = serde_json::from_str(body).ok()?;
  value
    .get("message")
    .or_else(|| value.get("error"))
    .and_then(Value::as_str)
    .map(String::from)
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::Matcher;
  use serde_json::json;
  use std::sync::Arc;

  use crate::event::{AppEvent, EventStream, NoticeKind};
  use crate::storage::{LocalStore, MemoryStore, AUTH_TOKEN_KEY, USER_KEY};

  struct Harness {
    api: ApiClient,
    state: SessionState,
    store: Arc<MemoryStore>,
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
    let api = ApiClient::new(&config, state.clone(), sink).unwrap();
    Harness {
      api,
      state,
      store,
      events,
    }
  }

  fn sign_in(h: &Harness) {
    let user = serde_json::from_value(json!({"user_id": "1", "email": "a@b.com"})).unwrap();
    h.state.replace_user(user);
    h.store.set(AUTH_TOKEN_KEY, "abc").unwrap();
  }

  fn error_notice(message: &str) -> AppEvent {
    AppEvent::Notice {
      kind: NoticeKind::Error,
      message: message.to_string(),
    }
  }

  #[test]
  fn test_url_keeps_base_path() {
    let h = harness("http://localhost:3000/api");
    let url = h
      .api
      .url("/nutrition/daily", &[("date".to_string(), "2024-05-01".to_string())])
      .unwrap();
    assert_eq!(
      url.as_str(),
      "http://localhost:3000/api/nutrition/daily?date=2024-05-01"
    );

    let h = harness("http://localhost:3000/");
    let url = h.api.url("/gyms/a b", &[]).unwrap();
    assert_eq!(url.as_str(), "http://localhost:3000/gyms/a%20b");
  }

  #[test]
  fn test_rejects_unusable_base_url() {
    let state = SessionState::new(Arc::new(MemoryStore::new()));
    let config = ApiConfig {
      base_url: "not a url".to_string(),
      timeout_ms: 1_000,
    };
    assert!(ApiClient::new(&config, state, EventSink::disconnected()).is_err());
  }

  #[tokio::test]
  async fn test_attaches_bearer_token_when_stored() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/memberships")
      .match_header("authorization", "Bearer abc")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(json!({"success": true, "message": "", "data": []}).to_string())
      .create_async()
      .await;

    let h = harness(&server.url());
    sign_in(&h);

    let plans: Vec<Value> = h.api.get("/memberships", &[]).await.unwrap();
    assert!(plans.is_empty());
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_no_bearer_header_without_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/memberships")
      .match_header("authorization", Matcher::Missing)
      .with_status(200)
      .with_body(json!({"success": true, "message": "", "data": []}).to_string())
      .create_async()
      .await;

    let h = harness(&server.url());
    let _: Vec<Value> = h.api.get("/memberships", &[]).await.unwrap();
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_unauthorized_ends_session() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/users/me/memberships")
      .with_status(401)
      .with_body(json!({"success": false, "message": "Token expired"}).to_string())
      .create_async()
      .await;

    let mut h = harness(&server.url());
    sign_in(&h);
    assert!(h.state.is_authenticated());

    let err = h
      .api
      .get::<Vec<Value>>("/users/me/memberships", &[])
      .await
      .unwrap_err();

    assert!(err.is_unauthorized());
    assert!(!h.state.is_authenticated());
    assert_eq!(h.store.get(USER_KEY).unwrap(), None);
    assert_eq!(h.store.get(AUTH_TOKEN_KEY).unwrap(), None);
    assert_eq!(h.events.drain(), vec![AppEvent::RedirectToLogin]);
  }

  #[tokio::test]
  async fn test_other_statuses_only_notify() {
    let mut server = mockito::Server::new_async().await;
    for (path, status) in [("/a", 403), ("/b", 404), ("/c", 429), ("/d", 503)] {
      server
        .mock("GET", path)
        .with_status(status)
        .create_async()
        .await;
    }
    server
      .mock("GET", "/e")
      .with_status(409)
      .with_body(json!({"message": "Already subscribed"}).to_string())
      .create_async()
      .await;

    let mut h = harness(&server.url());
    sign_in(&h);

    for path in ["/a", "/b", "/c", "/d", "/e"] {
      assert!(h.api.get::<Value>(path, &[]).await.is_err());
    }

    assert!(h.state.is_authenticated());
    assert_eq!(
      h.events.drain(),
      vec![
        error_notice("Access denied. Insufficient permissions."),
        error_notice("Resource not found."),
        error_notice("Too many requests. Please try again later."),
        error_notice("Server error. Please try again later."),
        error_notice("Already subscribed"),
      ]
    );
  }

  #[tokio::test]
  async fn test_network_failure_notifies() {
    let mut h = harness("http://127.0.0.1:1");
    sign_in(&h);

    let err = h.api.get::<Value>("/gyms", &[]).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    assert!(h.state.is_authenticated());
    assert_eq!(h.events.drain(), vec![error_notice(NETWORK_ERROR)]);
  }

  #[tokio::test]
  async fn test_rejected_envelope_is_left_to_caller() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("POST", "/nutrition/log")
      .with_status(200)
      .with_body(json!({"success": false, "message": "Servings must be positive"}).to_string())
      .create_async()
      .await;

    let mut h = harness(&server.url());
    let err = h
      .api
      .post::<Value, _>("/nutrition/log", &json!({"servings": 0}))
      .await
      .unwrap_err();

    assert_eq!(err, ApiError::rejected("Servings must be positive"));
    assert!(h.events.drain().is_empty());
  }

  #[tokio::test]
  async fn test_empty_success_body_acknowledges() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("DELETE", "/nutrition/log/7")
      .with_status(204)
      .create_async()
      .await;
    server
      .mock("POST", "/memberships/3/cancel")
      .with_status(200)
      .create_async()
      .await;

    let mut h = harness(&server.url());
    h.api.delete("/nutrition/log/7").await.unwrap();
    h.api.post_ack("/memberships/3/cancel", &json!({})).await.unwrap();
    assert!(h.events.drain().is_empty());
  }

  #[tokio::test]
  async fn test_acknowledge_still_requires_success_flag() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("DELETE", "/chatbot/history")
      .with_status(200)
      .with_body(json!({"success": false, "message": "Nothing to clear"}).to_string())
      .create_async()
      .await;

    let h = harness(&server.url());
    let err = h.api.delete("/chatbot/history").await.unwrap_err();
    assert_eq!(err, ApiError::rejected("Nothing to clear"));
  }

  #[tokio::test]
  async fn test_query_parameters_are_sent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/api/nutrition/history")
      .match_query(Matcher::UrlEncoded("days".into(), "7".into()))
      .with_status(200)
      .with_body(json!({"success": true, "message": "", "data": []}).to_string())
      .create_async()
      .await;

    let h = harness(&format!("{}/api", server.url()));
    let _: Vec<Value> = h
      .api
      .get("/nutrition/history", &[("days".to_string(), "7".to_string())])
      .await
      .unwrap();
    mock.assert_async().await;
  }
}
