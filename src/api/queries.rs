//! Cache keys and invalidation rules for the Fitflix API.

use chrono::{NaiveDate, Utc};
use std::time::Duration;

use super::types::SearchFilters;
use crate::cache::{Fingerprint, InvalidationRule, QueryKey};

const MINUTE: Duration = Duration::from_secs(60);

/// Today's calendar date, as the web client computes it (UTC)
pub fn today() -> NaiveDate {
  Utc::now().date_naive()
}

// ============================================================================
// Query key types
// ============================================================================

/// Readable resources of the Fitflix API.
#[derive(Clone, Debug, PartialEq)]
pub enum ResourceKey {
  /// Gym search
  Gyms { filters: SearchFilters },
  /// A single gym by id
  Gym { id: String },
  MembershipPlans,
  /// Memberships of the current user
  UserMemberships,
  DailyNutrition { date: NaiveDate },
  NutritionHistory { days: u32 },
  ChatHistory { limit: u32 },
  UserProfile,
}

impl QueryKey for ResourceKey {
  fn fingerprint(&self) -> Fingerprint {
    match self {
      Self::Gyms { filters } => Fingerprint::new("gyms").with(filters.to_params()),
      Self::Gym { id } => Fingerprint::new("gym").with(id.as_str()),
      Self::MembershipPlans => Fingerprint::new("memberships"),
      Self::UserMemberships => Fingerprint::new("user-memberships"),
      Self::DailyNutrition { date } => Fingerprint::new("nutrition").with("daily").with(*date),
      Self::NutritionHistory { days } => Fingerprint::new("nutrition").with("history").with(*days),
      Self::ChatHistory { limit } => Fingerprint::new("chat").with("history").with(*limit),
      Self::UserProfile => Fingerprint::new("user-profile"),
    }
  }

  fn stale_after(&self) -> Duration {
    match self {
      Self::Gyms { .. } => 5 * MINUTE,
      Self::Gym { .. } => 10 * MINUTE,
      Self::MembershipPlans => 15 * MINUTE,
      Self::UserMemberships => 2 * MINUTE,
      Self::DailyNutrition { .. } => MINUTE,
      Self::NutritionHistory { .. } => 5 * MINUTE,
      Self::ChatHistory { .. } => MINUTE,
      Self::UserProfile => 5 * MINUTE,
    }
  }

  fn description(&self) -> String {
    match self {
      Self::Gyms { filters } => {
        let params = filters.to_params();
        if params.is_empty() {
          "all gyms".to_string()
        } else {
          format!("gyms matching {}", crate::cache::Segment::from(params))
        }
      }
      Self::Gym { id } => format!("gym {}", id),
      Self::MembershipPlans => "membership plans".to_string(),
      Self::UserMemberships => "my memberships".to_string(),
      Self::DailyNutrition { date } => format!("nutrition for {}", date),
      Self::NutritionHistory { days } => format!("nutrition history ({} days)", days),
      Self::ChatHistory { limit } => format!("chat history (last {})", limit),
      Self::UserProfile => "my profile".to_string(),
    }
  }
}

// ============================================================================
// Mutations
// ============================================================================

/// Write operations and what they invalidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation {
  SubscribeMembership,
  CancelMembership,
  InitializePayment,
  VerifyPayment,
  LogNutrition,
  UpdateNutrition,
  DeleteNutrition,
  SendChatMessage,
  ClearChatHistory,
  UpdateUserProfile,
}

impl Mutation {
  /// Prefixes invalidated when the mutation succeeds on `today`
  pub fn invalidates_on(self, today: NaiveDate) -> Vec<Fingerprint> {
    match self {
      Self::SubscribeMembership | Self::CancelMembership | Self::VerifyPayment => {
        vec![Fingerprint::new("user-memberships")]
      }
      Self::InitializePayment => Vec::new(),
      Self::LogNutrition | Self::UpdateNutrition | Self::DeleteNutrition => vec![
        Fingerprint::new("nutrition").with("daily").with(today),
        Fingerprint::new("nutrition").with("history"),
      ],
      Self::SendChatMessage | Self::ClearChatHistory => {
        vec![Fingerprint::new("chat").with("history")]
      }
      Self::UpdateUserProfile => vec![Fingerprint::new("user-profile")],
    }
  }
}

impl InvalidationRule for Mutation {
  fn name(&self) -> &'static str {
    match self {
      Self::SubscribeMembership => "subscribe_membership",
      Self::CancelMembership => "cancel_membership",
      Self::InitializePayment => "initialize_payment",
      Self::VerifyPayment => "verify_payment",
      Self::LogNutrition => "log_nutrition",
      Self::UpdateNutrition => "update_nutrition",
      Self::DeleteNutrition => "delete_nutrition",
      Self::SendChatMessage => "send_chat_message",
      Self::ClearChatHistory => "clear_chat_history",
      Self::UpdateUserProfile => "update_user_profile",
    }
  }

  fn invalidates(&self) -> Vec<Fingerprint> {
    self.invalidates_on(today())
  }
}
