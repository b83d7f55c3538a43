//! Domain types exchanged with the Fitflix API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Users
// ============================================================================

/// Role tag carried by every identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  #[default]
  User,
  Admin,
}

/// Authenticated identity as returned by the auth endpoints.
///
/// Absent optional fields are not written back, so a persisted snapshot
/// holds exactly what the server sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub user_id: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub username: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role: Option<Role>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub user_profiles: Option<UserProfile>,
}

impl User {
  /// Role of this user; an identity without a role tag is a regular user
  pub fn role(&self) -> Role {
    self.role.unwrap_or_default()
  }

  /// Best name to greet the user with
  pub fn display_name(&self) -> String {
    match (&self.first_name, &self.last_name, &self.username) {
      (Some(first), Some(last), _) => format!("{} {}", first, last),
      (Some(first), None, _) => first.clone(),
      (None, _, Some(username)) => username.clone(),
      _ => self.email.clone(),
    }
  }

  /// Merge a partial identity into this one
  pub fn apply(&mut self, patch: UserPatch) {
    if let Some(email) = patch.email {
      self.email = email;
    }
    if patch.username.is_some() {
      self.username = patch.username;
    }
    if patch.first_name.is_some() {
      self.first_name = patch.first_name;
    }
    if patch.last_name.is_some() {
      self.last_name = patch.last_name;
    }
    if patch.role.is_some() {
      self.role = patch.role;
    }
    if patch.user_profiles.is_some() {
      self.user_profiles = patch.user_profiles;
    }
  }
}

/// Partial identity for optimistic local updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
  pub email: Option<String>,
  pub username: Option<String>,
  pub first_name: Option<String>,
  pub last_name: Option<String>,
  pub role: Option<Role>,
  pub user_profiles: Option<UserProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
  Male,
  Female,
  Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
  pub profile_id: String,
  pub user_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date_of_birth: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub height_cm: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub weight_kg: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gender: Option<Gender>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub primary_fitness_goal: Option<String>,
  #[serde(default)]
  pub dietary_preferences: Vec<String>,
  #[serde(default)]
  pub allergies: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub profile_picture_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub city: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone_number: Option<String>,
  #[serde(default)]
  pub created_at: String,
  #[serde(default)]
  pub updated_at: String,
}

/// Fields accepted by the profile update and onboarding endpoints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date_of_birth: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub height_cm: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub weight_kg: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub gender: Option<Gender>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub primary_fitness_goal: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub dietary_preferences: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub allergies: Option<Vec<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub city: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone_number: Option<String>,
}

// ============================================================================
// Auth forms and payloads
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginForm {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterForm {
  pub email: String,
  pub password: String,
  pub username: String,
}

/// `data` of a successful login / register / who-am-i response
#[derive(Debug, Clone, Deserialize)]
pub struct AuthPayload {
  pub user: User,
  /// Bearer credential, when the server does not use a cookie
  #[serde(default)]
  pub token: Option<String>,
}

// ============================================================================
// Gyms
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gym {
  pub gym_id: String,
  pub name: String,
  #[serde(default)]
  pub address: String,
  #[serde(default)]
  pub latitude: String,
  #[serde(default)]
  pub longitude: String,
  #[serde(default)]
  pub phone_number: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub opening_time: String,
  #[serde(default)]
  pub closing_time: String,
  #[serde(default)]
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub distance: Option<f64>,
  #[serde(default)]
  pub gym_amenities: Vec<GymAmenity>,
  #[serde(default)]
  pub gym_classes_services: Vec<GymService>,
  #[serde(default)]
  pub gym_media: Vec<GymMedia>,
  #[serde(default)]
  pub membership_plans: Vec<MembershipPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymAmenity {
  pub amenity_id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymService {
  pub service_id: String,
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
  Image,
  Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymMedia {
  pub media_id: String,
  pub media_type: MediaType,
  pub media_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub caption: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
  Distance,
  Price,
  Rating,
}

impl SortBy {
  fn as_str(self) -> &'static str {
    match self {
      Self::Distance => "distance",
      Self::Price => "price",
      Self::Rating => "rating",
    }
  }
}

/// Gym search parameters. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
  pub latitude: Option<f64>,
  pub longitude: Option<f64>,
  pub radius: Option<f64>,
  pub amenities: Vec<String>,
  pub price_range: Option<(f64, f64)>,
  pub sort_by: Option<SortBy>,
}

impl SearchFilters {
  /// Query parameters for `GET /gyms`, sorted by name
  pub fn to_params(&self) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    if let Some(lat) = self.latitude {
      params.insert("latitude".to_string(), lat.to_string());
    }
    if let Some(lng) = self.longitude {
      params.insert("longitude".to_string(), lng.to_string());
    }
    if let Some(radius) = self.radius {
      params.insert("radius".to_string(), radius.to_string());
    }
    if !self.amenities.is_empty() {
      params.insert("amenities".to_string(), self.amenities.join(","));
    }
    if let Some((min, max)) = self.price_range {
      params.insert("priceRange".to_string(), format!("{},{}", min, max));
    }
    if let Some(sort_by) = self.sort_by {
      params.insert("sortBy".to_string(), sort_by.as_str().to_string());
    }
    params
  }
}

// ============================================================================
// Memberships & payments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
  Daily,
  Weekly,
  Monthly,
  Quarterly,
  Yearly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipPlan {
  pub plan_id: String,
  pub gym_id: String,
  pub plan_name: String,
  pub plan_type: PlanType,
  pub price: f64,
  pub duration_days: u32,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub features: Vec<String>,
  #[serde(default = "default_true")]
  pub is_active: bool,
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
  Active,
  Expired,
  Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipGym {
  pub gym_id: String,
  pub name: String,
  #[serde(default)]
  pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipPlanRef {
  pub plan_id: String,
  pub plan_name: String,
  pub plan_type: PlanType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMembership {
  pub membership_id: String,
  pub user_id: String,
  pub gym_id: String,
  pub plan_id: String,
  pub start_date: String,
  pub end_date: String,
  pub status: MembershipStatus,
  #[serde(default)]
  pub digital_pass_code: String,
  #[serde(default)]
  pub auto_renew: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gym: Option<MembershipGym>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub plan: Option<MembershipPlanRef>,
}

/// Body of subscribe and payment-initialization requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSelection {
  pub gym_id: String,
  pub plan_id: String,
  pub plan_type: PlanType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentContact {
  pub name: String,
  pub email: String,
  pub contact: String,
}

/// Order created by the server, handed to the checkout widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOrder {
  pub order_id: String,
  /// Amount in the currency's smallest unit
  pub amount: u64,
  pub currency: String,
  pub razorpay_key_id: String,
  pub user_details: PaymentContact,
}

/// What the checkout widget reports back after a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
  pub razorpay_order_id: String,
  pub razorpay_payment_id: String,
  pub razorpay_signature: String,
}

// ============================================================================
// Nutrition
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
  Breakfast,
  Lunch,
  Dinner,
  Snack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionEntry {
  pub log_id: String,
  pub user_id: String,
  pub date: String,
  pub meal_type: MealType,
  pub food_item: String,
  pub calories_per_serving: f64,
  pub protein_g: f64,
  pub carbs_g: f64,
  pub fat_g: f64,
  pub servings: f64,
  pub total_calories: f64,
  pub total_protein_g: f64,
  pub total_carbs_g: f64,
  pub total_fat_g: f64,
  #[serde(default)]
  pub logged_at: String,
}

/// A meal to log; totals are computed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLog {
  pub meal_type: MealType,
  pub food_item: String,
  pub calories_per_serving: f64,
  pub protein_g: f64,
  pub carbs_g: f64,
  pub fat_g: f64,
  pub servings: f64,
}

/// Partial update of a logged meal
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MealUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub meal_type: Option<MealType>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub food_item: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub calories_per_serving: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub protein_g: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub carbs_g: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub fat_g: Option<f64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub servings: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroBreakdown {
  pub calories: f64,
  pub protein_g: f64,
  pub carbs_g: f64,
  pub fat_g: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealBreakdown {
  #[serde(default)]
  pub breakfast: MacroBreakdown,
  #[serde(default)]
  pub lunch: MacroBreakdown,
  #[serde(default)]
  pub dinner: MacroBreakdown,
  #[serde(default)]
  pub snack: MacroBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyNutrition {
  pub date: String,
  pub total_calories: f64,
  pub total_protein_g: f64,
  pub total_carbs_g: f64,
  pub total_fat_g: f64,
  #[serde(default)]
  pub meal_breakdown: MealBreakdown,
  #[serde(default)]
  pub entries: Vec<NutritionEntry>,
}

// ============================================================================
// Chat coach
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub message_id: String,
  pub message: String,
  pub response: String,
  pub created_at: String,
  #[serde(default)]
  pub response_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
  pub message: String,
  #[serde(rename = "includeContext", skip_serializing_if = "Option::is_none")]
  pub include_context: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
  #[serde(default)]
  pub messages: Vec<ChatMessage>,
}
