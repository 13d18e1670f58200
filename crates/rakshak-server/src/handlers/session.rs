//! Handlers for `/api/auth` endpoints: login, registration and the
//! self-check.

use axum::{Json, extract::State, http::StatusCode};
use rakshak_core::{
  Error,
  principal::{AccountStatus, NewRequester, Principal, PrincipalKind, RequesterRole},
  store::{RescueStore, StoreError as _},
};
use serde::{Deserialize, Serialize};

use super::{Envelope, JsonBody};
use crate::{
  AppState,
  auth::{SelfCheck, hash_password, issue_token, verify_login},
  error::{ApiError, Result},
};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Serialize)]
pub struct Session {
  pub token:     String,
  pub principal: Principal,
}

// ─── Login ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  /// `requester` (or `user`/`admin`), `organization` (or `ngo`), `volunteer`.
  /// When absent every store is tried in resolution order.
  #[serde(default)]
  pub kind:     Option<String>,
  pub email:    String,
  pub password: String,
}

/// `POST /auth/login`
pub async fn login<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<LoginBody>,
) -> Result<Json<Envelope<Session>>> {
  let kinds: Vec<PrincipalKind> = match body.kind.as_deref() {
    Some(k) => vec![
      PrincipalKind::parse_hint(k)
        .ok_or_else(|| Error::validation(format!("unknown account kind {k:?}")))?,
    ],
    None => PrincipalKind::RESOLUTION_ORDER.to_vec(),
  };

  let mut found = None;
  for kind in kinds {
    if let Some(p) = state
      .store
      .find_by_email(kind, &body.email)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?
    {
      found = Some(p);
      break;
    }
  }

  let verified = verify_login(&body.password, found.as_ref().map(Principal::password_hash));
  let principal = found.filter(|_| verified).ok_or(ApiError::InvalidCredentials)?;

  if principal.status() == AccountStatus::Inactive {
    return Err(Error::InactiveAccount.into());
  }

  let token = issue_token(&principal, &state.tokens)?;
  tracing::info!(id = %principal.id(), kind = principal.kind().as_str(), "login");
  Ok(Envelope::with_message("Login successful", Session { token, principal }))
}

// ─── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub name:     String,
  pub email:    String,
  pub password: String,
  #[serde(default)]
  pub phone:    Option<String>,
}

/// `POST /auth/register`: creates an ordinary Requester.
pub async fn register<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<RegisterBody>,
) -> Result<(StatusCode, Json<Envelope<Session>>)> {
  let name = body.name.trim().to_owned();
  let email = body.email.trim().to_lowercase();
  if name.is_empty() {
    return Err(Error::validation("name is required").into());
  }
  if !email.contains('@') {
    return Err(Error::validation("a valid email is required").into());
  }
  if body.password.len() < MIN_PASSWORD_LEN {
    return Err(
      Error::validation(format!("password must be at least {MIN_PASSWORD_LEN} characters")).into(),
    );
  }

  let requester = state
    .store
    .add_requester(NewRequester {
      name,
      email,
      phone: body.phone.filter(|p| !p.trim().is_empty()),
      role: RequesterRole::User,
      password_hash: hash_password(&body.password)?,
    })
    .await
    .map_err(|e| {
      if e.is_conflict() {
        Error::Conflict("an account with this email already exists".into())
      } else {
        Error::Store(Box::new(e))
      }
    })?;

  let principal = Principal::Requester(requester);
  let token = issue_token(&principal, &state.tokens)?;
  tracing::info!(id = %principal.id(), "requester registered");
  Ok((
    StatusCode::CREATED,
    Envelope::with_message("Registration successful", Session { token, principal }),
  ))
}

// ─── Self-check ───────────────────────────────────────────────────────────────

/// `GET /auth/me`. Resolves even for deactivated accounts so the client can
/// tell the user why everything else is refused.
pub async fn me(SelfCheck { principal, .. }: SelfCheck) -> Json<Envelope<Principal>> {
  Envelope::ok(principal)
}
