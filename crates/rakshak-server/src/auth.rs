//! Bearer tokens, identity resolution and the request extractors built on
//! them.
//!
//! A token is an HS256 JWT carrying the principal id (`sub`) and an optional
//! kind hint. The hint only decides which store is searched first; it never
//! narrows the search, so a stale or forged hint cannot select a different
//! principal.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rakshak_core::{
  Error,
  principal::{AccountStatus, Principal, PrincipalKind},
  store::RescueStore,
};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState,
  error::{ApiError, Result},
};

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// Signing material shared by issuance and verification.
#[derive(Clone)]
pub struct TokenConfig {
  pub secret: String,
  pub ttl:    Duration,
}

impl TokenConfig {
  pub fn new(secret: impl Into<String>, ttl_days: i64) -> Self {
    Self { secret: secret.into(), ttl: Duration::days(ttl_days) }
  }
}

/// Claims embedded in every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  /// Principal id (UUID string).
  pub sub:  String,
  /// Kind hint. Free-form so that unknown values are ignored, not rejected.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  pub iat:  i64,
  pub exp:  i64,
}

/// Issue a signed token for `principal`.
pub fn issue_token(principal: &Principal, config: &TokenConfig) -> Result<String> {
  let now = Utc::now();
  let claims = Claims {
    sub:  principal.id().to_string(),
    kind: Some(principal.kind().as_str().to_owned()),
    iat:  now.timestamp(),
    exp:  (now + config.ttl).timestamp(),
  };
  jsonwebtoken::encode(
    &Header::new(Algorithm::HS256),
    &claims,
    &EncodingKey::from_secret(config.secret.as_bytes()),
  )
  .map_err(ApiError::internal)
}

/// Check signature and expiry and return the claims.
pub fn verify_token(token: &str, config: &TokenConfig) -> Result<Claims, Error> {
  let mut validation = Validation::new(Algorithm::HS256);
  validation.set_required_spec_claims(&["sub", "exp"]);

  jsonwebtoken::decode::<Claims>(
    token,
    &DecodingKey::from_secret(config.secret.as_bytes()),
    &validation,
  )
  .map(|data| data.claims)
  .map_err(|e| {
    tracing::debug!(error = %e, "bearer token rejected");
    Error::Unauthenticated
  })
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

// ─── Identity resolution ─────────────────────────────────────────────────────

/// Whether an inactive Organization or Volunteer may resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvePolicy {
  ActiveOnly,
  /// Only for the self-check endpoint.
  AllowInactive,
}

/// Resolve verified claims to exactly one principal.
///
/// The hinted store is searched first, then every store in
/// [`PrincipalKind::RESOLUTION_ORDER`]. Lookups never write.
pub async fn resolve<S: RescueStore>(
  store: &S,
  claims: &Claims,
  policy: ResolvePolicy,
) -> Result<Principal, Error> {
  let id = Uuid::parse_str(&claims.sub).map_err(|_| Error::Unauthenticated)?;
  let hint = claims.kind.as_deref().and_then(PrincipalKind::parse_hint);

  let mut order: Vec<PrincipalKind> = hint.into_iter().collect();
  order.extend(PrincipalKind::RESOLUTION_ORDER.into_iter().filter(|k| Some(*k) != hint));

  for kind in order {
    let Some(principal) = lookup(store, kind, id).await? else {
      continue;
    };
    if hint.is_some_and(|h| h != kind) {
      tracing::debug!(%id, hinted = ?hint, found = ?kind, "token kind hint overridden");
    }
    if policy == ResolvePolicy::ActiveOnly && principal.status() == AccountStatus::Inactive {
      return Err(Error::InactiveAccount);
    }
    return Ok(principal);
  }

  Err(Error::Unauthenticated)
}

async fn lookup<S: RescueStore>(
  store: &S,
  kind: PrincipalKind,
  id: Uuid,
) -> Result<Option<Principal>, Error> {
  let found = match kind {
    PrincipalKind::Requester => store.get_requester(id).await.map(|r| r.map(Principal::Requester)),
    PrincipalKind::Organization => {
      store.get_organization(id).await.map(|o| o.map(Principal::Organization))
    }
    PrincipalKind::Volunteer => store.get_volunteer(id).await.map(|v| v.map(Principal::Volunteer)),
  };
  found.map_err(|e| Error::Store(Box::new(e)))
}

// ─── Extractors ──────────────────────────────────────────────────────────────

/// An active, resolved principal. Present in a handler means the request
/// carried a valid token for an existing, active account.
pub struct Authenticated(pub Principal);

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: RescueStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer(&parts.headers).ok_or(Error::Unauthenticated)?;
    let claims = verify_token(token, &state.tokens)?;
    let principal = resolve(state.store.as_ref(), &claims, ResolvePolicy::ActiveOnly).await?;
    Ok(Authenticated(principal))
  }
}

/// A resolved principal regardless of activation status, with its claims.
pub struct SelfCheck {
  pub principal: Principal,
  pub claims:    Claims,
}

impl<S> FromRequestParts<AppState<S>> for SelfCheck
where
  S: RescueStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer(&parts.headers).ok_or(Error::Unauthenticated)?;
    let claims = verify_token(token, &state.tokens)?;
    let principal = resolve(state.store.as_ref(), &claims, ResolvePolicy::AllowInactive).await?;
    Ok(SelfCheck { principal, claims })
  }
}

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Produce an argon2 PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(ApiError::internal)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
  PasswordHash::new(hash)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

/// Well-formed argon2id hash, at the default cost, that no password matches.
const UNMATCHABLE_HASH: &str =
  "$argon2id$v=19$m=19456,t=2,p=1$cmFrc2hhay10aW1pbmctcA$DVn32UWMAkJl+Nd55ex2k6Z6noIWGMY39BCnAZme8Xw";

/// Verify a login attempt. With no account the same argon2 work is done
/// against a hash nothing matches, so timing does not reveal whether the
/// e-mail is registered.
pub fn verify_login(password: &str, stored_hash: Option<&str>) -> bool {
  match stored_hash {
    Some(hash) => verify_password(password, hash),
    None => {
      verify_password(password, UNMATCHABLE_HASH);
      false
    }
  }
}

/// A fresh initial password for a volunteer: 8 lowercase hex characters.
pub fn generate_password() -> String {
  let mut bytes = [0u8; 4];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::http::Request;
  use rakshak_core::{
    principal::{NewOrganization, NewRequester, NewVolunteer, RequesterRole},
    store::RescueStore,
  };
  use rakshak_store_sqlite::SqliteStore;

  use super::*;
  use crate::{ServerConfig, notify::LogNotifier};

  fn tokens() -> TokenConfig { TokenConfig::new("test-secret", 30) }

  fn claims_for(id: Uuid, kind: Option<&str>) -> Claims {
    let now = Utc::now().timestamp();
    Claims { sub: id.to_string(), kind: kind.map(str::to_owned), iat: now, exp: now + 3600 }
  }

  async fn store_with_org() -> (SqliteStore, Principal) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let org = store
      .add_organization(NewOrganization {
        name:          "Paws".into(),
        email:         "paws@ngo.test".into(),
        password_hash: "x".into(),
      })
      .await
      .unwrap();
    (store, Principal::Organization(org))
  }

  #[test]
  fn token_round_trip() {
    let cfg = tokens();
    let id = Uuid::new_v4();
    let token = jsonwebtoken::encode(
      &Header::new(Algorithm::HS256),
      &claims_for(id, Some("volunteer")),
      &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .unwrap();

    let claims = verify_token(&token, &cfg).unwrap();
    assert_eq!(claims.sub, id.to_string());
    assert_eq!(claims.kind.as_deref(), Some("volunteer"));
  }

  #[test]
  fn issued_tokens_expire_after_ttl() {
    let cfg = tokens();
    let org = Principal::Organization(rakshak_core::principal::Organization {
      organization_id: Uuid::new_v4(),
      name:            "Paws".into(),
      email:           "paws@ngo.test".into(),
      status:          AccountStatus::Active,
      password_hash:   String::new(),
      created_at:      Utc::now(),
    });
    let claims = verify_token(&issue_token(&org, &cfg).unwrap(), &cfg).unwrap();
    assert_eq!(claims.exp - claims.iat, 30 * 24 * 3600);
    assert_eq!(claims.kind.as_deref(), Some("organization"));
  }

  #[test]
  fn wrong_secret_and_expired_tokens_are_rejected() {
    let cfg = tokens();
    let mut stale = claims_for(Uuid::new_v4(), None);
    stale.exp = Utc::now().timestamp() - 3600;

    let forged = jsonwebtoken::encode(
      &Header::new(Algorithm::HS256),
      &claims_for(Uuid::new_v4(), None),
      &EncodingKey::from_secret(b"other-secret"),
    )
    .unwrap();
    let expired = jsonwebtoken::encode(
      &Header::new(Algorithm::HS256),
      &stale,
      &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )
    .unwrap();

    assert!(matches!(verify_token(&forged, &cfg), Err(Error::Unauthenticated)));
    assert!(matches!(verify_token(&expired, &cfg), Err(Error::Unauthenticated)));
    assert!(matches!(verify_token("not.a.jwt", &cfg), Err(Error::Unauthenticated)));
  }

  #[tokio::test]
  async fn wrong_hint_is_overridden_by_lookup() {
    let (store, org) = store_with_org().await;
    let claims = claims_for(org.id(), Some("volunteer"));

    let resolved = resolve(&store, &claims, ResolvePolicy::ActiveOnly).await.unwrap();
    assert_eq!(resolved.kind(), PrincipalKind::Organization);
    assert_eq!(resolved.id(), org.id());
  }

  #[tokio::test]
  async fn missing_or_unknown_hint_falls_back() {
    let (store, org) = store_with_org().await;
    for kind in [None, Some("martian")] {
      let resolved = resolve(&store, &claims_for(org.id(), kind), ResolvePolicy::ActiveOnly)
        .await
        .unwrap();
      assert_eq!(resolved.id(), org.id());
    }
  }

  #[tokio::test]
  async fn unknown_or_malformed_subject_is_unauthenticated() {
    let (store, _) = store_with_org().await;
    let unknown = claims_for(Uuid::new_v4(), Some("requester"));
    assert!(matches!(
      resolve(&store, &unknown, ResolvePolicy::ActiveOnly).await,
      Err(Error::Unauthenticated)
    ));

    let mut malformed = claims_for(Uuid::new_v4(), None);
    malformed.sub = "507f1f77bcf86cd799439011".into();
    assert!(matches!(
      resolve(&store, &malformed, ResolvePolicy::ActiveOnly).await,
      Err(Error::Unauthenticated)
    ));
  }

  #[tokio::test]
  async fn inactive_volunteer_is_distinct_from_unknown() {
    let (store, org) = store_with_org().await;
    let v = store
      .add_volunteer(NewVolunteer {
        organization_id: org.id(),
        name:            "Ravi".into(),
        email:           "ravi@example.test".into(),
        phone:           None,
        password_hash:   "x".into(),
      })
      .await
      .unwrap();
    store.set_volunteer_status(v.volunteer_id, AccountStatus::Inactive).await.unwrap();

    let claims = claims_for(v.volunteer_id, Some("volunteer"));
    assert!(matches!(
      resolve(&store, &claims, ResolvePolicy::ActiveOnly).await,
      Err(Error::InactiveAccount)
    ));
    let relaxed = resolve(&store, &claims, ResolvePolicy::AllowInactive).await.unwrap();
    assert_eq!(relaxed.status(), AccountStatus::Inactive);
  }

  #[tokio::test]
  async fn admin_resolves_from_requester_store() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let admin = store
      .add_requester(NewRequester {
        name:          "Root".into(),
        email:         "root@rakshak.test".into(),
        phone:         None,
        role:          RequesterRole::Admin,
        password_hash: "x".into(),
      })
      .await
      .unwrap();
    let resolved = resolve(&store, &claims_for(admin.requester_id, Some("admin")), ResolvePolicy::ActiveOnly)
      .await
      .unwrap();
    assert!(resolved.is_admin());
  }

  #[tokio::test]
  async fn extractor_requires_bearer_header() {
    let (store, org) = store_with_org().await;
    let config = ServerConfig::for_tests();
    let state = AppState::new(Arc::new(store), &config, Arc::new(LogNotifier));

    let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
    let err = Authenticated::from_request_parts(&mut parts, &state).await.err().unwrap();
    assert!(matches!(err, ApiError::Core(Error::Unauthenticated)));

    let token = issue_token(&org, &state.tokens).unwrap();
    let (mut parts, _) = Request::builder()
      .header(header::AUTHORIZATION, format!("Bearer {token}"))
      .body(())
      .unwrap()
      .into_parts();
    let Authenticated(p) = Authenticated::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(p.id(), org.id());
  }

  #[test]
  fn password_helpers() {
    let hash = hash_password("hunter22").unwrap();
    assert!(verify_password("hunter22", &hash));
    assert!(!verify_password("hunter23", &hash));
    assert!(!verify_password("hunter22", "not-a-phc-string"));

    let generated = generate_password();
    assert_eq!(generated.len(), 8);
    assert!(generated.chars().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn unknown_account_costs_a_full_verification() {
    let parsed = PasswordHash::new(UNMATCHABLE_HASH).unwrap();
    let params = argon2::Params::try_from(&parsed).unwrap();
    let defaults = argon2::Params::default();
    assert_eq!(params.m_cost(), defaults.m_cost());
    assert_eq!(params.t_cost(), defaults.t_cost());
    assert_eq!(params.p_cost(), defaults.p_cost());

    assert!(!verify_login("hunter22", None));
    assert!(!verify_login("", None));

    let hash = hash_password("hunter22").unwrap();
    assert!(verify_login("hunter22", Some(&hash)));
    assert!(!verify_login("hunter23", Some(&hash)));
  }
}
