//! Rakshak server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `RAKSHAK_*` environment variables, opens the SQLite store and serves the
//! JSON API over HTTP.
//!
//! Organizations and administrators are provisioned from the command line:
//!
//! ```text
//! rakshak create-organization --name "Paws Trust" --email ngo@example.org
//! rakshak create-admin --name Root --email root@example.org
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use rakshak_core::{
  principal::{NewOrganization, NewRequester, RequesterRole},
  store::RescueStore,
};
use rakshak_server::{AppState, ServerConfig, auth::hash_password, notify::LogNotifier};
use rakshak_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Rakshak animal rescue coordination server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
  /// Create an Organization account. The password is read from stdin.
  CreateOrganization {
    #[arg(long)]
    name:  String,
    #[arg(long)]
    email: String,
  },
  /// Create an administrator account. The password is read from stdin.
  CreateAdmin {
    #[arg(long)]
    name:  String,
    #[arg(long)]
    email: String,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command.unwrap_or(Command::Serve) {
    Command::HashPassword => {
      let password = read_password()?;
      println!("{}", hash_password(&password)?);
      Ok(())
    }
    Command::CreateOrganization { name, email } => {
      let config = load_config(&cli.config)?;
      let store = open_store(&config).await?;
      let password_hash = hash_password(&read_password()?)?;
      let org = store
        .add_organization(NewOrganization {
          name,
          email: email.trim().to_lowercase(),
          password_hash,
        })
        .await
        .context("failed to create organization")?;
      println!("{}", org.organization_id);
      Ok(())
    }
    Command::CreateAdmin { name, email } => {
      let config = load_config(&cli.config)?;
      let store = open_store(&config).await?;
      let password_hash = hash_password(&read_password()?)?;
      let admin = store
        .add_requester(NewRequester {
          name,
          email: email.trim().to_lowercase(),
          phone: None,
          role: RequesterRole::Admin,
          password_hash,
        })
        .await
        .context("failed to create administrator")?;
      println!("{}", admin.requester_id);
      Ok(())
    }
    Command::Serve => serve(load_config(&cli.config)?).await,
  }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
  let store = open_store(&config).await?;
  let state = AppState::new(Arc::new(store), &config, Arc::new(LogNotifier));

  let app = rakshak_server::router(state);
  let address = format!("{}:{}", config.host, config.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("RAKSHAK"))
    .build()
    .context("failed to read config file")?;

  let config: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig (is jwt_secret set?)")?;

  if config.jwt_secret.trim().is_empty() {
    anyhow::bail!("jwt_secret must not be empty");
  }
  Ok(config)
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<SqliteStore> {
  // Expand `~` in store path.
  let store_path = expand_tilde(&config.store_path);
  SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']).to_owned();
  if password.is_empty() {
    anyhow::bail!("password must not be empty");
  }
  Ok(password)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
