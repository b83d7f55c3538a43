//! Response envelope and the registration response normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{AuthPayload, User};
use crate::error::{ApiError, ApiResult};

/// Uniform wrapper `{ success, message, data?, error? }` around every
/// response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data: Option<T>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

impl<T> Envelope<T> {
  /// Best message describing a failed envelope: `message`, then `error`.
  pub fn failure_message(&self) -> String {
    if !self.message.is_empty() {
      return self.message.clone();
    }
    self.error.clone().unwrap_or_default()
  }

  /// `data` of a successful envelope.
  pub fn into_data(self) -> ApiResult<T> {
    if !self.success {
      return Err(ApiError::rejected(self.failure_message()));
    }
    self
      .data
      .ok_or_else(|| ApiError::Decode("response envelope has no data".to_string()))
  }

  /// Success flag only, for endpoints without a payload.
  pub fn into_ack(self) -> ApiResult<()> {
    if self.success {
      Ok(())
    } else {
      Err(ApiError::rejected(self.failure_message()))
    }
  }
}

/// The two body shapes the register endpoint answers with.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RegisterResponse {
  /// `{ message, user }`
  Direct {
    user: User,
    #[serde(default)]
    token: Option<String>,
  },
  /// `{ success, message, data: { user } }`
  Wrapped(Envelope<AuthPayload>),
}

/// Registration result after normalization; internal code only sees this.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
  Registered { user: User, token: Option<String> },
  Failed { message: String },
}

impl RegisterOutcome {
  /// Normalize a raw register response body.
  pub fn from_body(body: Value) -> Self {
    match serde_json::from_value::<RegisterResponse>(body) {
      Ok(RegisterResponse::Direct { user, token }) => Self::Registered { user, token },
      Ok(RegisterResponse::Wrapped(envelope)) => match envelope {
        Envelope {
          success: true,
          data: Some(payload),
          ..
        } => Self::Registered {
          user: payload.user,
          token: payload.token,
        },
        envelope => Self::Failed {
          message: envelope.failure_message(),
        },
      },
      Err(_) => Self::Failed {
        message: String::new(),
      },
    }
  }
}
