use thiserror::Error;

/// Result type alias for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub const NETWORK_ERROR: &str = "Network error. Please check your connection.";
pub const GENERIC_ERROR: &str = "An unexpected error occurred.";

/// Coarse class of a non-success HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
  /// 401 - clears the session
  Unauthorized,
  /// 403
  Forbidden,
  /// 404
  NotFound,
  /// 429
  RateLimited,
  /// 5xx
  Server,
  /// Anything else outside 2xx
  Other,
}

impl StatusClass {
  pub fn of(code: u16) -> Self {
    match code {
      401 => Self::Unauthorized,
      403 => Self::Forbidden,
      404 => Self::NotFound,
      429 => Self::RateLimited,
      500..=599 => Self::Server,
      _ => Self::Other,
    }
  }

  /// Fixed notification text for this class, if it has one.
  pub fn notice(self) -> Option<&'static str> {
    match self {
      Self::Forbidden => Some("Access denied. Insufficient permissions."),
      Self::NotFound => Some("Resource not found."),
      Self::RateLimited => Some("Too many requests. Please try again later."),
      Self::Server => Some("Server error. Please try again later."),
      Self::Unauthorized | Self::Other => None,
    }
  }
}

/// Errors returned by the transport and everything built on top of it.
///
/// `Clone` because a single in-flight fetch hands its outcome to every
/// caller that joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
  /// No response was received (connect failure, timeout, broken body)
  #[error("Network error: {0}")]
  Network(String),

  /// Server answered with a non-success status
  #[error("HTTP {code}: {}", .message.as_deref().unwrap_or("request failed"))]
  Status {
    class: StatusClass,
    code: u16,
    message: Option<String>,
  },

  /// 2xx response whose envelope reports `success: false`
  #[error("Request rejected: {message}")]
  Rejected { message: String },

  /// Response body did not have the expected shape
  #[error("Failed to parse response: {0}")]
  Decode(String),

  /// Request was refused before reaching the network
  #[error("Invalid request: {0}")]
  Invalid(String),
}

impl ApiError {
  /// Create a status error from an HTTP code and optional server message
  pub fn status(code: u16, message: Option<String>) -> Self {
    Self::Status {
      class: StatusClass::of(code),
      code,
      message: message.filter(|m| !m.is_empty()),
    }
  }

  pub fn rejected(message: impl Into<String>) -> Self {
    Self::Rejected {
      message: message.into(),
    }
  }

  pub fn is_unauthorized(&self) -> bool {
    matches!(
      self,
      Self::Status {
        class: StatusClass::Unauthorized,
        ..
      }
    )
  }

  /// Text to show at the call site: the server's own message when it sent
  /// one, otherwise `fallback`.
  pub fn user_message(&self, fallback: &str) -> String {
    match self {
      Self::Status {
        message: Some(message),
        ..
      } => message.clone(),
      Self::Rejected { message } if !message.is_empty() => message.clone(),
      _ => fallback.to_string(),
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(error: reqwest::Error) -> Self {
    if error.is_decode() {
      Self::Decode(error.to_string())
    } else {
      Self::Network(error.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(error: serde_json::Error) -> Self {
    Self::Decode(error.to_string())
  }
}
