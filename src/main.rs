mod commands;

use clap::Parser;
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

use fitflix::app::App;
use fitflix::config::Config;
use fitflix::event::{AppEvent, EventSink, EventStream, NoticeKind};

#[derive(Parser, Debug)]
#[command(name = "fitflix")]
#[command(about = "Command-line client for the Fitflix fitness platform")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fitflix/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: commands::Command,
}

/// Log to `fitflix.log` in the data directory so output stays clean.
fn init_tracing(dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)?;
  let appender = tracing_appender::rolling::never(dir, "fitflix.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fitflix=info"));
  fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

fn report(events: &mut EventStream) {
  for event in events.drain() {
    match event {
      AppEvent::Notice {
        kind: NoticeKind::Success,
        message,
      } => eprintln!("{}", message),
      AppEvent::Notice {
        kind: NoticeKind::Error,
        message,
      } => eprintln!("error: {}", message),
      AppEvent::RedirectToLogin => eprintln!("Session expired. Run `fitflix login` to sign in again."),
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?.with_env_overrides()?;
  let _guard = init_tracing(&config.data_dir()?)?;

  let (sink, mut events) = EventSink::channel();
  let app = App::open(config, sink)?;

  app.session().initialize().await;
  let outcome = commands::run(&app, args.command).await;

  report(&mut events);
  outcome
}
