//! Router-level tests: requests go through extraction, identity resolution,
//! the services and the SQLite store exactly as in production.

use std::sync::{Arc, Mutex};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use rakshak_core::{
  principal::{
    AccountStatus, NewOrganization, NewVolunteer, Principal, Volunteer,
  },
  store::RescueStore,
};
use rakshak_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{
  AppState, ServerConfig,
  auth::{hash_password, issue_token},
  notify::{Notifier, NotifyError},
  router,
};

// ─── Harness ─────────────────────────────────────────────────────────────────

/// Captures delivered credentials so tests can log in as new volunteers.
#[derive(Default)]
struct Outbox(Mutex<Vec<(String, String)>>);

impl Notifier for Outbox {
  fn volunteer_created(&self, volunteer: &Volunteer, password: &str) -> Result<(), NotifyError> {
    self.0.lock().unwrap().push((volunteer.email.clone(), password.to_owned()));
    Ok(())
  }
}

struct Harness {
  state:  AppState<SqliteStore>,
  outbox: Arc<Outbox>,
}

impl Harness {
  async fn new() -> Self {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let outbox = Arc::new(Outbox::default());
    let state = AppState::new(Arc::new(store), &ServerConfig::for_tests(), outbox.clone());
    Self { state, outbox }
  }

  fn store(&self) -> &SqliteStore { &self.state.store }

  fn token(&self, principal: &Principal) -> String {
    issue_token(principal, &self.state.tokens).unwrap()
  }

  async fn organization(&self, name: &str, password: &str) -> Principal {
    let org = self
      .store()
      .add_organization(NewOrganization {
        name:          name.into(),
        email:         format!("{}@ngo.test", name.to_lowercase()),
        password_hash: hash_password(password).unwrap(),
      })
      .await
      .unwrap();
    Principal::Organization(org)
  }

  async fn volunteer(&self, org: &Principal, email: &str) -> Principal {
    let v = self
      .store()
      .add_volunteer(NewVolunteer {
        organization_id: org.id(),
        name:            "Ravi".into(),
        email:           email.into(),
        phone:           None,
        password_hash:   "x".into(),
      })
      .await
      .unwrap();
    Principal::Volunteer(v)
  }

  async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    router(self.state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json(
    &self,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let resp = self.send(method, uri, token, body).await;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  /// Register a requester through the API and return its token.
  async fn register(&self, email: &str) -> String {
    let (status, body) = self
      .json(
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "name": "Asha", "email": email, "password": "secret-pw" })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["token"].as_str().unwrap().to_owned()
  }
}

fn pune_dog() -> Value {
  json!({
    "animalType": "Dog",
    "animalDetails": { "condition": "Injured", "color": "brown" },
    "location": { "city": "Pune", "state": "MH", "landmark": "near the temple" },
    "contactInfo": { "phone": "9999999999" },
    "emergency": true
  })
}

fn case_id(body: &Value) -> String { body["data"]["id"].as_str().unwrap().to_owned() }

// ─── Basics ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_check_needs_no_token() {
  let h = Harness::new().await;
  let (status, body) = h.json("GET", "/", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], true);
}

#[tokio::test]
async fn unknown_route_is_enveloped_404() {
  let h = Harness::new().await;
  let (status, body) = h.json("GET", "/api/nope", None, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["success"], false);
}

#[tokio::test]
async fn missing_and_garbage_tokens_are_401() {
  let h = Harness::new().await;
  let (status, body) = h.json("GET", "/api/cases", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["success"], false);

  let (status, _) = h.json("GET", "/api/cases", Some("garbage"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_login_then_me() {
  let h = Harness::new().await;
  h.register("asha@example.test").await;

  let (status, body) = h
    .json(
      "POST",
      "/api/auth/login",
      None,
      Some(json!({ "kind": "user", "email": "Asha@Example.test", "password": "secret-pw" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  let token = body["data"]["token"].as_str().unwrap().to_owned();
  assert!(body["data"]["principal"]["record"].get("passwordHash").is_none());

  let (status, me) = h.json("GET", "/api/auth/me", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["data"]["kind"], "requester");
  assert_eq!(me["data"]["record"]["email"], "asha@example.test");
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
  let h = Harness::new().await;
  h.register("asha@example.test").await;
  let (status, _) = h
    .json(
      "POST",
      "/api/auth/register",
      None,
      Some(json!({ "name": "Asha", "email": "asha@example.test", "password": "secret-pw" })),
    )
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_password_is_401() {
  let h = Harness::new().await;
  h.organization("Paws", "right-pw").await;
  let (status, body) = h
    .json(
      "POST",
      "/api/auth/login",
      None,
      Some(json!({ "kind": "ngo", "email": "paws@ngo.test", "password": "wrong-pw" })),
    )
    .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["message"], "invalid email or password");
}

#[tokio::test]
async fn unknown_email_is_indistinguishable_from_wrong_password() {
  let h = Harness::new().await;
  let (status, body) = h
    .json(
      "POST",
      "/api/auth/login",
      None,
      Some(json!({ "email": "nobody@ngo.test", "password": "whatever" })),
    )
    .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["message"], "invalid email or password");
}

#[tokio::test]
async fn login_without_kind_searches_every_store() {
  let h = Harness::new().await;
  let org = h.organization("Paws", "right-pw").await;
  let (status, body) = h
    .json(
      "POST",
      "/api/auth/login",
      None,
      Some(json!({ "email": "paws@ngo.test", "password": "right-pw" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["principal"]["record"]["organizationId"], org.id().to_string());
}

#[tokio::test]
async fn inactive_volunteer_is_403_except_on_me() {
  let h = Harness::new().await;
  let org = h.organization("Paws", "pw-pw-pw").await;
  let v = h.volunteer(&org, "v@example.test").await;
  h.store().set_volunteer_status(v.id(), AccountStatus::Inactive).await.unwrap();
  let token = h.token(&v);

  let (status, body) = h.json("GET", "/api/cases", Some(&token), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["message"], "account is inactive");

  let (status, me) = h.json("GET", "/api/auth/me", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["data"]["record"]["status"], "inactive");
}

// ─── Cases ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_rescue_over_http() {
  let h = Harness::new().await;
  let requester = h.register("asha@example.test").await;
  let org = h.organization("Paws", "pw-pw-pw").await;
  let org_token = h.token(&org);
  let v = h.volunteer(&org, "v@example.test").await;
  let v_token = h.token(&v);

  let (status, body) = h.json("POST", "/api/cases", Some(&requester), Some(pune_dog())).await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body["data"]["status"], "pending");
  assert_eq!(body["data"]["timeline"].as_array().unwrap().len(), 1);
  assert_eq!(body["data"]["animalDetails"]["condition"], "Injured");
  let id = case_id(&body);

  let (status, body) = h.json("PUT", &format!("/api/cases/{id}/accept"), Some(&org_token), None).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["status"], "accepted");
  assert_eq!(body["data"]["assignedTo"]["ngo"], org.id().to_string());

  // Volunteers cannot jump an accepted case straight to completed.
  let (status, _) = h
    .json("PUT", &format!("/api/cases/{id}/status"), Some(&v_token), Some(json!({ "status": "completed" })))
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, body) = h
    .json(
      "PUT",
      &format!("/api/cases/{id}/assign-volunteer"),
      Some(&org_token),
      Some(json!({ "volunteerId": v.id() })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["status"], "in_progress");

  let (status, body) = h
    .json(
      "POST",
      &format!("/api/cases/{id}/milestones"),
      Some(&v_token),
      Some(json!({ "milestone": "reached_location" })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");

  let (status, body) = h
    .json(
      "POST",
      &format!("/api/cases/{id}/notes"),
      Some(&v_token),
      Some(json!({ "notes": "Leg splinted" })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");

  let (status, body) = h
    .json(
      "PUT",
      &format!("/api/cases/{id}/status"),
      Some(&v_token),
      Some(json!({ "status": "completed", "notes": "Handed to shelter" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["status"], "completed");

  let (status, body) = h.json("GET", &format!("/api/cases/{id}/timeline"), Some(&requester), None).await;
  assert_eq!(status, StatusCode::OK);
  let labels: Vec<_> = body["data"]["timeline"]
    .as_array()
    .unwrap()
    .iter()
    .map(|e| e["status"].as_str().unwrap().to_owned())
    .collect();
  assert_eq!(
    labels,
    [
      "request_received",
      "ngo_assigned",
      "volunteer_assigned",
      "reached_location",
      "reached_location",
      "completed",
    ]
  );

  let after = h.store().get_volunteer(v.id()).await.unwrap().unwrap();
  assert_eq!(after.completed_rescues, 1);
  assert!(after.active_cases.is_empty());
}

#[tokio::test]
async fn illegal_transition_is_409_naming_both_states() {
  let h = Harness::new().await;
  let requester = h.register("asha@example.test").await;
  let org = h.organization("Paws", "pw-pw-pw").await;
  let org_token = h.token(&org);

  let (_, body) = h.json("POST", "/api/cases", Some(&requester), Some(pune_dog())).await;
  let id = case_id(&body);
  h.json("PUT", &format!("/api/cases/{id}/accept"), Some(&org_token), None).await;

  let (status, body) = h
    .json("PUT", &format!("/api/cases/{id}/status"), Some(&org_token), Some(json!({ "status": "completed" })))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
  let msg = body["message"].as_str().unwrap();
  assert!(msg.contains("accepted") && msg.contains("completed"), "{msg}");
}

#[tokio::test]
async fn other_organization_is_refused() {
  let h = Harness::new().await;
  let requester = h.register("asha@example.test").await;
  let a = h.organization("Paws", "pw-pw-pw").await;
  let b = h.organization("Claws", "pw-pw-pw").await;
  let (a_token, b_token) = (h.token(&a), h.token(&b));

  let (_, body) = h.json("POST", "/api/cases", Some(&requester), Some(pune_dog())).await;
  let id = case_id(&body);
  h.json("PUT", &format!("/api/cases/{id}/accept"), Some(&a_token), None).await;

  let (status, _) = h.json("PUT", &format!("/api/cases/{id}/accept"), Some(&b_token), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = h
    .json("PUT", &format!("/api/cases/{id}/status"), Some(&b_token), Some(json!({ "status": "cancelled" })))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = h.json("GET", &format!("/api/cases/{id}"), Some(&b_token), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submission_validation_errors_are_400() {
  let h = Harness::new().await;
  let requester = h.register("asha@example.test").await;

  let mut bad = pune_dog();
  bad["animalType"] = json!("Dragon");
  let (status, body) = h.json("POST", "/api/cases", Some(&requester), Some(bad)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["success"], false);

  let mut no_city = pune_dog();
  no_city["location"]["city"] = json!("");
  let (status, _) = h.json("POST", "/api/cases", Some(&requester), Some(no_city)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let resp = h
    .send("POST", "/api/cases", Some(&requester), None)
    .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_is_paginated_and_filtered() {
  let h = Harness::new().await;
  let requester = h.register("asha@example.test").await;
  for i in 0..3 {
    let mut c = pune_dog();
    c["emergency"] = json!(i == 0);
    h.json("POST", "/api/cases", Some(&requester), Some(c)).await;
  }

  let (status, body) = h.json("GET", "/api/cases?limit=2&page=2", Some(&requester), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["count"], 1);
  assert_eq!(body["page"], 2);

  let (_, body) = h.json("GET", "/api/cases?emergency=true", Some(&requester), None).await;
  assert_eq!(body["count"], 1);

  let (status, _) = h.json("GET", "/api/cases?status=lost", Some(&requester), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn case_id_path_is_extracted() {
  let h = Harness::new().await;
  let requester = h.register("asha@example.test").await;
  let (_, body) = h.json("POST", "/api/cases", Some(&requester), Some(pune_dog())).await;
  let id = case_id(&body);

  let (status, body) = h.json("GET", &format!("/api/cases/{id}"), Some(&requester), None).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["id"], id);

  let (status, body) = h.json("GET", &format!("/api/cases/{id}/timeline"), Some(&requester), None).await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["timeline"][0]["status"], "request_received");

  let (status, _) = h
    .json("GET", &format!("/api/cases/{}", Uuid::new_v4()), Some(&requester), None)
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_case_id_is_400() {
  let h = Harness::new().await;
  let requester = h.register("asha@example.test").await;
  let (status, body) = h.json("GET", "/api/cases/not-a-uuid", Some(&requester), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["success"], false);
}

// ─── Volunteers ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn organization_onboards_a_volunteer_who_can_log_in() {
  let h = Harness::new().await;
  let org = h.organization("Paws", "pw-pw-pw").await;
  let org_token = h.token(&org);

  let (status, body) = h
    .json(
      "POST",
      "/api/volunteers",
      Some(&org_token),
      Some(json!({ "name": "Meera", "email": "meera@example.test" })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert!(body["data"].get("passwordHash").is_none());
  let volunteer_id = body["data"]["volunteerId"].as_str().unwrap().to_owned();

  let (email, password) = h.outbox.0.lock().unwrap()[0].clone();
  assert_eq!(email, "meera@example.test");
  assert_eq!(password.len(), 8);

  let (status, body) = h
    .json(
      "POST",
      "/api/auth/login",
      None,
      Some(json!({ "kind": "volunteer", "email": email, "password": password })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");

  let (_, list) = h.json("GET", "/api/volunteers", Some(&org_token), None).await;
  assert_eq!(list["count"], 1);

  let (status, body) = h
    .json(
      "PUT",
      &format!("/api/volunteers/{volunteer_id}/status"),
      Some(&org_token),
      Some(json!({ "status": "inactive" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["status"], "inactive");

  let (status, _) = h
    .json("DELETE", &format!("/api/volunteers/{volunteer_id}"), Some(&org_token), None)
    .await;
  assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn roster_is_private_to_the_organization() {
  let h = Harness::new().await;
  let a = h.organization("Paws", "pw-pw-pw").await;
  let b = h.organization("Claws", "pw-pw-pw").await;
  let v = h.volunteer(&a, "v@example.test").await;
  let requester = h.register("asha@example.test").await;

  let (status, _) = h
    .json("DELETE", &format!("/api/volunteers/{}", v.id()), Some(&h.token(&b)), None)
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = h.json("GET", "/api/volunteers", Some(&requester), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = h
    .json("DELETE", &format!("/api/volunteers/{}", Uuid::new_v4()), Some(&h.token(&a)), None)
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
