//! Command-line surface over the client core.

use chrono::NaiveDate;
use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use fitflix::api::types::{
  ChatRequest, MealLog, MealType, PlanSelection, PlanType, RegisterForm, SearchFilters, SortBy,
};
use fitflix::api::{DEFAULT_CHAT_LIMIT, DEFAULT_HISTORY_DAYS};
use fitflix::app::App;
use fitflix::error::ApiError;
use fitflix::session::{Access, Guard};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Sign in with email and password
  Login {
    email: String,
    #[arg(long, env = "FITFLIX_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// Create an account
  Register {
    email: String,
    username: String,
    #[arg(long, env = "FITFLIX_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// End the session
  Logout,
  /// Show the signed-in identity
  Whoami,
  /// Search gyms
  Gyms {
    #[arg(long)]
    latitude: Option<f64>,
    #[arg(long)]
    longitude: Option<f64>,
    /// Search radius in kilometers
    #[arg(long)]
    radius: Option<f64>,
    /// Comma-separated amenity names
    #[arg(long, value_delimiter = ',')]
    amenities: Vec<String>,
    #[arg(long, value_parser = parse_tag::<SortBy>)]
    sort_by: Option<SortBy>,
  },
  /// Show one gym
  Gym { id: String },
  /// List membership plans
  Plans,
  /// List my memberships
  Memberships,
  /// Subscribe to a membership plan
  Subscribe {
    gym_id: String,
    plan_id: String,
    #[arg(long, value_parser = parse_tag::<PlanType>, default_value = "monthly")]
    plan_type: PlanType,
  },
  /// Cancel one of my memberships
  Cancel { membership_id: String },
  /// Nutrition tracker
  Nutrition {
    #[command(subcommand)]
    action: NutritionAction,
  },
  /// Chat with the fitness coach
  Chat {
    /// Message to send; without one the recent history is shown
    message: Option<String>,
    /// Clear the chat history
    #[arg(long, conflicts_with = "message")]
    clear: bool,
    #[arg(long, default_value_t = DEFAULT_CHAT_LIMIT)]
    limit: u32,
  },
  /// Show my profile
  Profile,
}

#[derive(Subcommand, Debug)]
pub enum NutritionAction {
  /// Daily summary (today by default)
  Day {
    #[arg(long)]
    date: Option<NaiveDate>,
  },
  /// Daily summaries over the last days
  History {
    #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
    days: u32,
  },
  /// Log a meal
  Log {
    #[arg(value_parser = parse_tag::<MealType>)]
    meal_type: MealType,
    food_item: String,
    #[arg(long)]
    calories: f64,
    #[arg(long, default_value_t = 0.0)]
    protein: f64,
    #[arg(long, default_value_t = 0.0)]
    carbs: f64,
    #[arg(long, default_value_t = 0.0)]
    fat: f64,
    #[arg(long, default_value_t = 1.0)]
    servings: f64,
  },
  /// Delete a logged meal
  Delete { log_id: String },
}

/// Parse a lowercase wire tag (`monthly`, `lunch`, ...) into its enum.
fn parse_tag<T: DeserializeOwned>(raw: &str) -> std::result::Result<T, String> {
  serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
    .map_err(|_| format!("unknown value '{}'", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  let text =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to format output: {}", e))?;
  println!("{}", text);
  Ok(())
}

/// Error for a failed API call; notices for transport and status errors
/// have already been raised by the transport.
fn failed(action: &str, error: ApiError) -> color_eyre::Report {
  eyre!("{}", error.user_message(&format!("Failed to {}", action)))
}

fn require_session(app: &App) -> Result<()> {
  match app.session().access(Guard::authenticated()) {
    Access::Granted => Ok(()),
    _ => Err(eyre!("Not logged in. Run `fitflix login` first.")),
  }
}

fn greet(app: &App) {
  if let Some(user) = app.session().user() {
    println!("Signed in as {}", user.display_name());
  }
}

/// Run one command against an initialized app.
pub async fn run(app: &App, command: Command) -> Result<()> {
  let client = app.client();

  match command {
    Command::Login { email, password } => {
      if app.session().access(Guard::PublicOnly) == Access::RedirectToDashboard {
        return Err(eyre!("Already logged in. Run `fitflix logout` first."));
      }
      if !app.session().login(&email, &password).await {
        return Err(eyre!("Login failed"));
      }
      greet(app);
    }
    Command::Register {
      email,
      username,
      password,
    } => {
      if app.session().access(Guard::PublicOnly) == Access::RedirectToDashboard {
        return Err(eyre!("Already logged in. Run `fitflix logout` first."));
      }
      let form = RegisterForm {
        email,
        password,
        username,
      };
      if !app.session().register(&form).await {
        return Err(eyre!("Registration failed"));
      }
      greet(app);
    }
    Command::Logout => {
      info!("logging out");
      app.session().logout().await;
    }
    Command::Whoami => match app.session().user() {
      Some(user) => print_json(&user)?,
      None => println!("Not logged in"),
    },
    Command::Gyms {
      latitude,
      longitude,
      radius,
      amenities,
      sort_by,
    } => {
      let filters = SearchFilters {
        latitude,
        longitude,
        radius,
        amenities,
        price_range: None,
        sort_by,
      };
      let gyms = client
        .gyms(&filters)
        .await
        .map_err(|e| failed("load gyms", e))?;
      print_json(&gyms)?;
    }
    Command::Gym { id } => {
      let gym = client.gym(&id).await.map_err(|e| failed("load gym", e))?;
      print_json(&gym)?;
    }
    Command::Plans => {
      let plans = client
        .membership_plans()
        .await
        .map_err(|e| failed("load membership plans", e))?;
      print_json(&plans)?;
    }
    Command::Memberships => {
      require_session(app)?;
      let memberships = client
        .user_memberships()
        .await
        .map_err(|e| failed("load memberships", e))?;
      print_json(&memberships)?;
    }
    Command::Subscribe {
      gym_id,
      plan_id,
      plan_type,
    } => {
      require_session(app)?;
      let selection = PlanSelection {
        gym_id,
        plan_id,
        plan_type,
      };
      let membership = client
        .subscribe_membership(&selection)
        .await
        .map_err(|e| failed("subscribe", e))?;
      print_json(&membership)?;
    }
    Command::Cancel { membership_id } => {
      require_session(app)?;
      client
        .cancel_membership(&membership_id)
        .await
        .map_err(|e| failed("cancel membership", e))?;
      println!("Membership cancelled");
    }
    Command::Nutrition { action } => {
      if !app.config().features.nutrition_tracker {
        return Err(eyre!("The nutrition tracker is disabled"));
      }
      require_session(app)?;
      run_nutrition(app, action).await?;
    }
    Command::Chat {
      message,
      clear,
      limit,
    } => {
      if !app.config().features.chatbot {
        return Err(eyre!("The chat coach is disabled"));
      }
      require_session(app)?;
      if clear {
        client
          .clear_chat_history()
          .await
          .map_err(|e| failed("clear chat history", e))?;
        println!("Chat history cleared");
      } else if let Some(message) = message {
        let request = ChatRequest {
          message,
          include_context: Some(true),
        };
        let reply = client
          .send_message(&request)
          .await
          .map_err(|e| failed("send message", e))?;
        println!("{}", reply.response);
      } else {
        let history = client
          .chat_history(limit)
          .await
          .map_err(|e| failed("load chat history", e))?;
        print_json(&history)?;
      }
    }
    Command::Profile => {
      require_session(app)?;
      let profile = client
        .user_profile()
        .await
        .map_err(|e| failed("load profile", e))?;
      print_json(&profile)?;
    }
  }

  Ok(())
}

async fn run_nutrition(app: &App, action: NutritionAction) -> Result<()> {
  let client = app.client();

  match action {
    NutritionAction::Day { date } => {
      let day = client
        .daily_nutrition(date)
        .await
        .map_err(|e| failed("load nutrition", e))?;
      print_json(&day)?;
    }
    NutritionAction::History { days } => {
      let history = client
        .nutrition_history(days)
        .await
        .map_err(|e| failed("load nutrition history", e))?;
      print_json(&history)?;
    }
    NutritionAction::Log {
      meal_type,
      food_item,
      calories,
      protein,
      carbs,
      fat,
      servings,
    } => {
      let meal = MealLog {
        meal_type,
        food_item,
        calories_per_serving: calories,
        protein_g: protein,
        carbs_g: carbs,
        fat_g: fat,
        servings,
      };
      let entry = client
        .log_nutrition(&meal)
        .await
        .map_err(|e| failed("log meal", e))?;
      print_json(&entry)?;
    }
    NutritionAction::Delete { log_id } => {
      client
        .delete_nutrition(&log_id)
        .await
        .map_err(|e| failed("delete meal", e))?;
      println!("Meal deleted");
    }
  }

  Ok(())
}
