//! Fitflix client with transparent caching and mutation-driven invalidation.

use chrono::NaiveDate;
use tracing::debug;

use super::client::ApiClient;
use super::queries::{today, Mutation, ResourceKey};
use super::types::{
  ChatHistory, ChatMessage, ChatRequest, DailyNutrition, Gym, MealLog, MealUpdate, MembershipPlan,
  NutritionEntry, PaymentConfirmation, PaymentOrder, PlanSelection, ProfileUpdate, SearchFilters,
  UserMembership, UserProfile,
};
use crate::cache::{Cacheable, QueryKey, ResourceCache};
use crate::error::{ApiError, ApiResult};

/// Default window of the nutrition history view
pub const DEFAULT_HISTORY_DAYS: u32 = 7;
/// Default number of chat messages loaded
pub const DEFAULT_CHAT_LIMIT: u32 = 50;

/// Typed access to every Fitflix resource.
///
/// Reads go through the shared [`ResourceCache`]; writes go through its
/// mutation path so that, on success, the resources they affect are
/// refetched on the next read.
#[derive(Clone)]
pub struct FitflixClient {
  api: ApiClient,
  cache: ResourceCache,
}

impl FitflixClient {
  pub fn new(api: ApiClient, cache: ResourceCache) -> Self {
    Self { api, cache }
  }

  pub fn cache(&self) -> &ResourceCache {
    &self.cache
  }

  async fn cached<T: Cacheable>(
    &self,
    key: ResourceKey,
    path: String,
    query: Vec<(String, String)>,
  ) -> ApiResult<T> {
    let result = self
      .cache
      .fetch(&key, || {
        let api = self.api.clone();
        async move { api.get::<T>(&path, &query).await }
      })
      .await?;

    debug!(resource = %key.description(), source = ?result.source, "resource ready");
    Ok(result.data)
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  pub async fn gyms(&self, filters: &SearchFilters) -> ApiResult<Vec<Gym>> {
    let query = filters.to_params().into_iter().collect();
    let key = ResourceKey::Gyms {
      filters: filters.clone(),
    };
    self.cached(key, "/gyms".to_string(), query).await
  }

  /// A single gym. An empty id is rejected without a request.
  pub async fn gym(&self, id: &str) -> ApiResult<Gym> {
    let id = require_id("gym", id)?;
    let key = ResourceKey::Gym { id: id.to_string() };
    self.cached(key, format!("/gyms/{}", id), Vec::new()).await
  }

  pub async fn membership_plans(&self) -> ApiResult<Vec<MembershipPlan>> {
    self
      .cached(
        ResourceKey::MembershipPlans,
        "/memberships".to_string(),
        Vec::new(),
      )
      .await
  }

  pub async fn user_memberships(&self) -> ApiResult<Vec<UserMembership>> {
    self
      .cached(
        ResourceKey::UserMemberships,
        "/users/me/memberships".to_string(),
        Vec::new(),
      )
      .await
  }

  /// Nutrition summary for `date`, today when `None`
  pub async fn daily_nutrition(&self, date: Option<NaiveDate>) -> ApiResult<DailyNutrition> {
    let date = date.unwrap_or_else(today);
    self
      .cached(
        ResourceKey::DailyNutrition { date },
        "/nutrition/daily".to_string(),
        vec![("date".to_string(), date.format("%Y-%m-%d").to_string())],
      )
      .await
  }

  pub async fn nutrition_history(&self, days: u32) -> ApiResult<Vec<DailyNutrition>> {
    self
      .cached(
        ResourceKey::NutritionHistory { days },
        "/nutrition/history".to_string(),
        vec![("days".to_string(), days.to_string())],
      )
      .await
  }

  pub async fn chat_history(&self, limit: u32) -> ApiResult<ChatHistory> {
    self
      .cached(
        ResourceKey::ChatHistory { limit },
        "/chatbot/context".to_string(),
        vec![("limit".to_string(), limit.to_string())],
      )
      .await
  }

  pub async fn user_profile(&self) -> ApiResult<UserProfile> {
    self
      .cached(
        ResourceKey::UserProfile,
        "/user-profile/me".to_string(),
        Vec::new(),
      )
      .await
  }

  // ==========================================================================
  // Mutations
  // ==========================================================================

  pub async fn subscribe_membership(&self, selection: &PlanSelection) -> ApiResult<UserMembership> {
    self
      .cache
      .mutate(&Mutation::SubscribeMembership, || {
        self.api.post("/users/me/memberships", selection)
      })
      .await
  }

  pub async fn cancel_membership(&self, membership_id: &str) -> ApiResult<()> {
    let path = format!("/users/me/memberships/{}", require_id("membership", membership_id)?);
    self
      .cache
      .mutate(&Mutation::CancelMembership, || self.api.delete(&path))
      .await
  }

  /// Create a payment order for a plan. Nothing is invalidated until the
  /// payment is verified.
  pub async fn initialize_payment(&self, selection: &PlanSelection) -> ApiResult<PaymentOrder> {
    self
      .cache
      .mutate(&Mutation::InitializePayment, || {
        self.api.post("/payments/initialize", selection)
      })
      .await
  }

  pub async fn verify_payment(&self, confirmation: &PaymentConfirmation) -> ApiResult<()> {
    self
      .cache
      .mutate(&Mutation::VerifyPayment, || {
        self.api.post_ack("/payments/verify", confirmation)
      })
      .await
  }

  pub async fn log_nutrition(&self, meal: &MealLog) -> ApiResult<NutritionEntry> {
    self
      .cache
      .mutate(&Mutation::LogNutrition, || self.api.post("/nutrition/log", meal))
      .await
  }

  pub async fn update_nutrition(&self, log_id: &str, update: &MealUpdate) -> ApiResult<NutritionEntry> {
    let path = format!("/nutrition/{}", require_id("nutrition entry", log_id)?);
    self
      .cache
      .mutate(&Mutation::UpdateNutrition, || self.api.put(&path, update))
      .await
  }

  pub async fn delete_nutrition(&self, log_id: &str) -> ApiResult<()> {
    let path = format!("/nutrition/{}", require_id("nutrition entry", log_id)?);
    self
      .cache
      .mutate(&Mutation::DeleteNutrition, || self.api.delete(&path))
      .await
  }

  pub async fn send_message(&self, request: &ChatRequest) -> ApiResult<ChatMessage> {
    if request.message.trim().is_empty() {
      return Err(ApiError::Invalid("message is empty".to_string()));
    }
    self
      .cache
      .mutate(&Mutation::SendChatMessage, || {
        self.api.post("/chatbot/message", request)
      })
      .await
  }

  pub async fn clear_chat_history(&self) -> ApiResult<()> {
    self
      .cache
      .mutate(&Mutation::ClearChatHistory, || {
        self.api.delete("/chatbot/history")
      })
      .await
  }

  pub async fn update_user_profile(&self, update: &ProfileUpdate) -> ApiResult<UserProfile> {
    self
      .cache
      .mutate(&Mutation::UpdateUserProfile, || {
        self.api.put("/user-profile/me", update)
      })
      .await
  }
}

fn require_id<'a>(what: &str, id: &'a str) -> ApiResult<&'a str> {
  let id = id.trim();
  if id.is_empty() {
    return Err(ApiError::Invalid(format!("{} id is empty", what)));
  }
  Ok(id)
}
