//! Handlers for `/api/cases` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/cases` | `?status=&emergency=&page=&limit=`, scoped to the caller |
//! | `POST` | `/cases` | Submit; Requester or Admin |
//! | `GET`  | `/cases/{id}` | 404 if absent or invisible |
//! | `GET`  | `/cases/{id}/timeline` | |
//! | `PUT`  | `/cases/{id}/accept` | Body optional: `{"volunteerId": …}` |
//! | `PUT`  | `/cases/{id}/assign-volunteer` | Body: `{"volunteerId": …}` |
//! | `PUT`  | `/cases/{id}/status` | Body: `{"status": …, "notes": …}` |
//! | `POST` | `/cases/{id}/notes` | Body: `{"notes": …}`; assigned Volunteer |
//! | `POST` | `/cases/{id}/milestones` | Body: `{"milestone": …, "notes": …}` |

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use rakshak_core::{
  Error,
  case::{Assignment, CaseStatus, Milestone, NewCase, RescueCase, TimelineEntry},
  lifecycle::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
  store::{CaseFilter, RescueStore},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Envelope, IdPath, JsonBody, QueryParams};
use crate::{AppState, auth::Authenticated, error::{ApiError, Result}};

fn parse_status(s: &str) -> Result<CaseStatus, Error> {
  CaseStatus::parse(s.trim()).ok_or_else(|| {
    Error::validation(format!(
      "status must be one of pending, accepted, in_progress, completed, cancelled (got {s:?})"
    ))
  })
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status:    Option<String>,
  pub emergency: Option<bool>,
  /// 1-based.
  pub page:      Option<usize>,
  pub limit:     Option<usize>,
}

impl ListParams {
  fn into_filter(self) -> Result<(CaseFilter, usize), Error> {
    let status = self.status.as_deref().map(parse_status).transpose()?;
    let page = self.page.unwrap_or(1).max(1);
    let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let filter = CaseFilter {
      status,
      emergency: self.emergency,
      limit: Some(limit),
      offset: Some((page - 1).saturating_mul(limit)),
    };
    Ok((filter, page))
  }
}

/// `GET /cases`
pub async fn list<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Envelope<Vec<RescueCase>>>> {
  let (filter, page) = params.into_filter()?;
  let cases = state.cases.list(&principal, filter).await?;
  Ok(Envelope::list(cases, Some(page)))
}

// ─── Submit ───────────────────────────────────────────────────────────────────

/// `POST /cases`
pub async fn submit<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  JsonBody(body): JsonBody<NewCase>,
) -> Result<(StatusCode, Json<Envelope<RescueCase>>)> {
  let case = state.cases.submit(&principal, body).await?;
  Ok((
    StatusCode::CREATED,
    Envelope::with_message("Rescue request submitted successfully", case),
  ))
}

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /cases/{id}`
pub async fn get_one<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  IdPath(id): IdPath,
) -> Result<Json<Envelope<RescueCase>>> {
  Ok(Envelope::ok(state.cases.get(&principal, id).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineView {
  pub id:          Uuid,
  pub status:      CaseStatus,
  pub assigned_to: Assignment,
  pub timeline:    Vec<TimelineEntry>,
  pub updated_at:  DateTime<Utc>,
}

/// `GET /cases/{id}/timeline`
pub async fn timeline<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  IdPath(id): IdPath,
) -> Result<Json<Envelope<TimelineView>>> {
  let case = state.cases.get(&principal, id).await?;
  Ok(Envelope::ok(TimelineView {
    id:          case.case_id,
    status:      case.status,
    assigned_to: case.assigned_to,
    timeline:    case.timeline,
    updated_at:  case.updated_at,
  }))
}

// ─── Accept / assign ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptBody {
  pub volunteer_id: Option<Uuid>,
}

/// `PUT /cases/{id}/accept`. The body may be empty.
pub async fn accept<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  IdPath(id): IdPath,
  body: Bytes,
) -> Result<Json<Envelope<RescueCase>>> {
  let body: AcceptBody = if body.iter().all(u8::is_ascii_whitespace) {
    AcceptBody::default()
  } else {
    serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
  };
  let case = state.cases.accept(&principal, id, body.volunteer_id).await?;
  Ok(Envelope::with_message("Rescue request accepted", case))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBody {
  pub volunteer_id: Uuid,
}

/// `PUT /cases/{id}/assign-volunteer`
pub async fn assign_volunteer<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  IdPath(id): IdPath,
  JsonBody(body): JsonBody<AssignBody>,
) -> Result<Json<Envelope<RescueCase>>> {
  let case = state.cases.assign_volunteer(&principal, id, body.volunteer_id).await?;
  Ok(Envelope::with_message("Volunteer assigned", case))
}

// ─── Status, notes, milestones ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: String,
  #[serde(default)]
  pub notes:  Option<String>,
}

/// `PUT /cases/{id}/status`
pub async fn update_status<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  IdPath(id): IdPath,
  JsonBody(body): JsonBody<StatusBody>,
) -> Result<Json<Envelope<RescueCase>>> {
  let target = parse_status(&body.status)?;
  let case = state.cases.update_status(&principal, id, target, body.notes).await?;
  Ok(Envelope::with_message(format!("Status updated to {}", case.status), case))
}

#[derive(Debug, Deserialize)]
pub struct NoteBody {
  pub notes: String,
}

/// `POST /cases/{id}/notes`
pub async fn add_note<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  IdPath(id): IdPath,
  JsonBody(body): JsonBody<NoteBody>,
) -> Result<(StatusCode, Json<Envelope<RescueCase>>)> {
  let case = state.cases.add_note(&principal, id, body.notes).await?;
  Ok((StatusCode::CREATED, Envelope::with_message("Note added", case)))
}

#[derive(Debug, Deserialize)]
pub struct MilestoneBody {
  pub milestone: String,
  #[serde(default)]
  pub notes:     Option<String>,
}

/// `POST /cases/{id}/milestones`
pub async fn record_milestone<S: RescueStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(principal): Authenticated,
  IdPath(id): IdPath,
  JsonBody(body): JsonBody<MilestoneBody>,
) -> Result<(StatusCode, Json<Envelope<RescueCase>>)> {
  let milestone = Milestone::parse(body.milestone.trim())
    .ok_or_else(|| Error::validation(format!("unknown milestone {:?}", body.milestone)))?;
  let case = state.cases.record_milestone(&principal, id, milestone, body.notes).await?;
  Ok((StatusCode::CREATED, Envelope::with_message("Milestone recorded", case)))
}
