//! Principals (the three disjoint kinds of authenticated actor) and the
//! authorization gate.
//!
//! Requesters, Organizations and Volunteers live in separate stores and share
//! nothing but an authentication scheme. A [`Principal`] is the tagged union
//! produced once per request by identity resolution; handlers never repeat the
//! lookup themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Kinds and status ────────────────────────────────────────────────────────

/// Which principal store a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
  Requester,
  Organization,
  Volunteer,
}

impl PrincipalKind {
  /// Fallback order used when a credential carries no usable kind hint.
  pub const RESOLUTION_ORDER: [PrincipalKind; 3] = [
    PrincipalKind::Volunteer,
    PrincipalKind::Requester,
    PrincipalKind::Organization,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Requester => "requester",
      Self::Organization => "organization",
      Self::Volunteer => "volunteer",
    }
  }

  /// Parse a kind hint. Legacy spellings (`user`, `admin`, `ngo`) are
  /// accepted; any other value yields `None` and the hint is ignored.
  pub fn parse_hint(s: &str) -> Option<Self> {
    match s {
      "requester" | "user" | "admin" => Some(Self::Requester),
      "organization" | "ngo" => Some(Self::Organization),
      "volunteer" => Some(Self::Volunteer),
      _ => None,
    }
  }
}

/// Activation status of Organizations and Volunteers.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
  #[default]
  Active,
  Inactive,
}

/// Requesters are ordinary users unless flagged as administrators.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RequesterRole {
  #[default]
  User,
  Admin,
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A member of the public who files rescue requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
  pub requester_id:  Uuid,
  pub name:          String,
  pub email:         String,
  pub phone:         Option<String>,
  pub role:          RequesterRole,
  /// Argon2 PHC string. Never serialised.
  #[serde(skip_serializing, default)]
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

/// An NGO that accepts and runs rescues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
  pub organization_id: Uuid,
  pub name:            String,
  pub email:           String,
  pub status:          AccountStatus,
  #[serde(skip_serializing, default)]
  pub password_hash:   String,
  pub created_at:      DateTime<Utc>,
}

/// A field volunteer owned by exactly one Organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volunteer {
  pub volunteer_id:      Uuid,
  /// The owning Organization.
  pub organization_id:   Uuid,
  pub name:              String,
  pub email:             String,
  pub phone:             Option<String>,
  pub status:            AccountStatus,
  /// Cases currently assigned to this volunteer and not yet terminal. A
  /// lookup aid only; the case record is authoritative.
  pub active_cases:      Vec<Uuid>,
  pub completed_rescues: u32,
  #[serde(skip_serializing, default)]
  pub password_hash:     String,
  pub created_at:        DateTime<Utc>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewRequester {
  pub name:          String,
  pub email:         String,
  pub phone:         Option<String>,
  pub role:          RequesterRole,
  pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewVolunteer {
  pub organization_id: Uuid,
  pub name:            String,
  pub email:           String,
  pub phone:           Option<String>,
  pub password_hash:   String,
}

// ─── Principal ───────────────────────────────────────────────────────────────

/// A resolved, authenticated actor.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "lowercase")]
pub enum Principal {
  Requester(Requester),
  Organization(Organization),
  Volunteer(Volunteer),
}

impl Principal {
  pub fn kind(&self) -> PrincipalKind {
    match self {
      Self::Requester(_) => PrincipalKind::Requester,
      Self::Organization(_) => PrincipalKind::Organization,
      Self::Volunteer(_) => PrincipalKind::Volunteer,
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::Requester(r) => r.requester_id,
      Self::Organization(o) => o.organization_id,
      Self::Volunteer(v) => v.volunteer_id,
    }
  }

  pub fn role(&self) -> Role {
    match self {
      Self::Requester(r) if r.role == RequesterRole::Admin => Role::Admin,
      Self::Requester(_) => Role::Requester,
      Self::Organization(_) => Role::Organization,
      Self::Volunteer(_) => Role::Volunteer,
    }
  }

  /// Requesters have no activation status and are always active.
  pub fn status(&self) -> AccountStatus {
    match self {
      Self::Requester(_) => AccountStatus::Active,
      Self::Organization(o) => o.status,
      Self::Volunteer(v) => v.status,
    }
  }

  pub fn password_hash(&self) -> &str {
    match self {
      Self::Requester(r) => &r.password_hash,
      Self::Organization(o) => &o.password_hash,
      Self::Volunteer(v) => &v.password_hash,
    }
  }

  pub fn is_admin(&self) -> bool { self.role() == Role::Admin }
}

// ─── Authorization gate ──────────────────────────────────────────────────────

/// The role an operation is gated on. Derived from the stored record, never
/// from anything the client supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Requester,
  Admin,
  Organization,
  Volunteer,
}

/// Permit the operation iff the principal's role is in `allowed`.
///
/// Taking a `&Principal` means the gate can only run after identity
/// resolution succeeded.
pub fn authorize(principal: &Principal, allowed: &[Role]) -> Result<()> {
  let role = principal.role();
  if allowed.contains(&role) {
    Ok(())
  } else {
    Err(Error::forbidden(format!(
      "{} accounts may not perform this action",
      role_label(role)
    )))
  }
}

fn role_label(role: Role) -> &'static str {
  match role {
    Role::Requester => "requester",
    Role::Admin => "admin",
    Role::Organization => "organization",
    Role::Volunteer => "volunteer",
  }
}


#[cfg(test)]
mod tests {
  use super::{fixtures::*, *};

  #[test]
  fn gate_allows_listed_role() {
    assert!(authorize(&organization(), &[Role::Organization]).is_ok());
    assert!(authorize(&admin(), &[Role::Organization, Role::Admin]).is_ok());
  }

  #[test]
  fn gate_denies_unlisted_role() {
    let err = authorize(&requester(), &[Role::Organization]).unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
  }

  #[test]
  fn admin_is_not_a_plain_requester() {
    assert!(authorize(&admin(), &[Role::Requester]).is_err());
    assert_eq!(admin().kind(), PrincipalKind::Requester);
  }

  #[test]
  fn serialised_principal_omits_password_hash() {
    let mut org = organization();
    if let Principal::Organization(o) = &mut org {
      o.password_hash = "$argon2id$secret".into();
    }
    let json = serde_json::to_string(&org).unwrap();
    assert!(!json.contains("argon2"), "{json}");
    assert!(json.contains("\"kind\":\"organization\""), "{json}");
  }

  #[test]
  fn kind_hint_parsing() {
    assert_eq!(PrincipalKind::parse_hint("ngo"), Some(PrincipalKind::Organization));
    assert_eq!(PrincipalKind::parse_hint("user"), Some(PrincipalKind::Requester));
    assert_eq!(PrincipalKind::parse_hint("admin"), Some(PrincipalKind::Requester));
    assert_eq!(PrincipalKind::parse_hint("superuser"), None);
  }
}
