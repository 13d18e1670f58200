//! JSON HTTP API for Rakshak.
//!
//! Exposes an axum [`Router`] backed by any [`RescueStore`]. Every request
//! except login, registration and the health check carries a bearer token,
//! which is resolved to a [`rakshak_core::principal::Principal`] once by the
//! [`auth::Authenticated`] extractor before any handler logic runs.
//!
//! Responses use a uniform envelope: `{"success": true, "data": …}` on
//! success and `{"success": false, "message": …}` on failure.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod notify;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use rakshak_core::{
  lifecycle::{CaseService, LifecyclePolicy},
  roster::RosterService,
  store::RescueStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::TokenConfig;
use handlers::{cases, session, volunteers};
use notify::Notifier;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `RAKSHAK_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  /// Shared HS256 secret for issuing and verifying bearer tokens.
  pub jwt_secret:          String,
  #[serde(default = "default_token_ttl_days")]
  pub token_ttl_days:      i64,
  #[serde(default = "default_true")]
  pub org_triage_visible:  bool,
  #[serde(default = "default_max_commit_attempts")]
  pub max_commit_attempts: u32,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 5000 }
fn default_store_path() -> PathBuf { PathBuf::from("rakshak.db") }
fn default_token_ttl_days() -> i64 { 30 }
fn default_true() -> bool { true }
fn default_max_commit_attempts() -> u32 { 3 }

impl ServerConfig {
  pub fn policy(&self) -> LifecyclePolicy {
    LifecyclePolicy {
      org_triage_visible:  self.org_triage_visible,
      max_commit_attempts: self.max_commit_attempts,
    }
  }

  #[cfg(test)]
  pub(crate) fn for_tests() -> Self {
    Self {
      host:                default_host(),
      port:                default_port(),
      store_path:          PathBuf::from(":memory:"),
      jwt_secret:          "test-secret".to_owned(),
      token_ttl_days:      default_token_ttl_days(),
      org_triage_visible:  true,
      max_commit_attempts: default_max_commit_attempts(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:    Arc<S>,
  pub cases:    CaseService<S>,
  pub roster:   RosterService<S>,
  pub tokens:   Arc<TokenConfig>,
  pub notifier: Arc<dyn Notifier>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      cases:    self.cases.clone(),
      roster:   self.roster.clone(),
      tokens:   Arc::clone(&self.tokens),
      notifier: Arc::clone(&self.notifier),
    }
  }
}

impl<S: RescueStore> AppState<S> {
  pub fn new(store: Arc<S>, config: &ServerConfig, notifier: Arc<dyn Notifier>) -> Self {
    Self {
      cases: CaseService::new(Arc::clone(&store), config.policy()),
      roster: RosterService::new(Arc::clone(&store)),
      tokens: Arc::new(TokenConfig::new(config.jwt_secret.clone(), config.token_ttl_days)),
      store,
      notifier,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RescueStore + 'static,
{
  let api: Router<AppState<S>> = Router::new()
    // Session
    .route("/auth/login", post(session::login::<S>))
    .route("/auth/register", post(session::register::<S>))
    .route("/auth/me", get(session::me))
    // Cases
    .route("/cases", get(cases::list::<S>).post(cases::submit::<S>))
    .route("/cases/{id}", get(cases::get_one::<S>))
    .route("/cases/{id}/timeline", get(cases::timeline::<S>))
    .route("/cases/{id}/accept", put(cases::accept::<S>))
    .route("/cases/{id}/assign-volunteer", put(cases::assign_volunteer::<S>))
    .route("/cases/{id}/status", put(cases::update_status::<S>))
    .route("/cases/{id}/notes", post(cases::add_note::<S>))
    .route("/cases/{id}/milestones", post(cases::record_milestone::<S>))
    // Volunteer roster
    .route("/volunteers", get(volunteers::list::<S>).post(volunteers::create::<S>))
    .route("/volunteers/{id}", delete(volunteers::remove::<S>))
    .route("/volunteers/{id}/status", put(volunteers::set_status::<S>));

  #[cfg(feature = "diagnostics")]
  let api = api.route("/diagnostics/whoami", get(handlers::diagnostics::whoami));

  Router::new()
    .route("/", get(handlers::health))
    .nest("/api", api)
    .fallback(handlers::not_found)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
