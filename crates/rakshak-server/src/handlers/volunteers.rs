//! Handlers for `/api/volunteers` endpoints. Organization accounts only.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/volunteers` | Caller's volunteers, newest first |
//! | `POST`   | `/volunteers` | Body: `{"name", "email", "phone"?}` |
//! | `DELETE` | `/volunteers/{id}` | Refused while the volunteer has active cases |
//! | `PUT`    | `/volunteers/{id}/status` | Body: `{"status": "active"\|"inactive"}` |

use axum::{Json, extract::State, http::StatusCode};
use rakshak_core::{
  principal::{AccountStatus, Role, Volunteer, authorize},
  roster::VolunteerSignup,
  store::RescueStore,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{Envelope, IdPath, JsonBody};
use crate::{
  AppState,
  auth::{Authenticated, generate_password, hash_password},
  error::Result,
};

/// `GET /volunteers`
pub async fn list<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
) -> Result<Json<Envelope<Vec<Volunteer>>>> {
  let volunteers = state.roster.list_volunteers(&principal).await?;
  Ok(Envelope::list(volunteers, None))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:  String,
  pub email: String,
  #[serde(default)]
  pub phone: Option<String>,
}

/// `POST /volunteers`
///
/// Generates the initial password and hands it to the notifier. The password
/// is never part of the response.
pub async fn create<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  JsonBody(body): JsonBody<CreateBody>,
) -> Result<(StatusCode, Json<Envelope<Volunteer>>)> {
  authorize(&principal, &[Role::Organization])?;

  let password = generate_password();
  let volunteer = state
    .roster
    .add_volunteer(
      &principal,
      VolunteerSignup {
        name:          body.name,
        email:         body.email,
        phone:         body.phone,
        password_hash: hash_password(&password)?,
      },
    )
    .await?;

  if let Err(e) = state.notifier.volunteer_created(&volunteer, &password) {
    tracing::warn!(volunteer = %volunteer.volunteer_id, error = %e, "credential delivery failed");
  }

  Ok((StatusCode::CREATED, Envelope::with_message("Volunteer added successfully", volunteer)))
}

/// `DELETE /volunteers/{id}`
pub async fn remove<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  IdPath(id): IdPath,
) -> Result<Json<Value>> {
  state.roster.remove_volunteer(&principal, id).await?;
  Ok(Json(json!({ "success": true, "message": "Volunteer removed successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: AccountStatus,
}

/// `PUT /volunteers/{id}/status`
pub async fn set_status<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  IdPath(id): IdPath,
  JsonBody(body): JsonBody<StatusBody>,
) -> Result<Json<Envelope<Volunteer>>> {
  let volunteer = state.roster.set_status(&principal, id, body.status).await?;
  Ok(Envelope::ok(volunteer))
}
