//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (nanosecond
//! precision, `Z` suffix) so that lexical order equals chronological order.
//! Structured case fields are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use rakshak_core::{
  case::{
    AnimalType, Assignment, CaseStatus, Milestone, RescueCase, TimelineEntry,
  },
  principal::{
    AccountStatus, Organization, Requester, RequesterRole, Volunteer,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Labels ──────────────────────────────────────────────────────────────────

fn unknown(kind: &'static str, value: &str) -> Error {
  Error::UnknownLabel { kind, value: value.to_owned() }
}

pub fn decode_status(s: &str) -> Result<CaseStatus> {
  CaseStatus::parse(s).ok_or_else(|| unknown("case status", s))
}

pub fn decode_milestone(s: &str) -> Result<Milestone> {
  Milestone::parse(s).ok_or_else(|| unknown("milestone", s))
}

pub fn decode_animal_type(s: &str) -> Result<AnimalType> {
  AnimalType::parse(s).ok_or_else(|| unknown("animal type", s))
}

pub fn encode_account_status(s: AccountStatus) -> &'static str {
  match s {
    AccountStatus::Active => "active",
    AccountStatus::Inactive => "inactive",
  }
}

pub fn decode_account_status(s: &str) -> Result<AccountStatus> {
  match s {
    "active" => Ok(AccountStatus::Active),
    "inactive" => Ok(AccountStatus::Inactive),
    other => Err(unknown("account status", other)),
  }
}

pub fn encode_role(r: RequesterRole) -> &'static str {
  match r {
    RequesterRole::User => "user",
    RequesterRole::Admin => "admin",
  }
}

pub fn decode_role(s: &str) -> Result<RequesterRole> {
  match s {
    "user" => Ok(RequesterRole::User),
    "admin" => Ok(RequesterRole::Admin),
    other => Err(unknown("requester role", other)),
  }
}

// ─── Principal rows ──────────────────────────────────────────────────────────

pub struct RawRequester {
  pub requester_id:  String,
  pub name:          String,
  pub email:         String,
  pub phone:         Option<String>,
  pub role:          String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawRequester {
  pub const COLUMNS: &'static str =
    "requester_id, name, email, phone, role, password_hash, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      requester_id:  row.get(0)?,
      name:          row.get(1)?,
      email:         row.get(2)?,
      phone:         row.get(3)?,
      role:          row.get(4)?,
      password_hash: row.get(5)?,
      created_at:    row.get(6)?,
    })
  }

  pub fn into_requester(self) -> Result<Requester> {
    Ok(Requester {
      requester_id:  decode_uuid(&self.requester_id)?,
      name:          self.name,
      email:         self.email,
      phone:         self.phone,
      role:          decode_role(&self.role)?,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawOrganization {
  pub organization_id: String,
  pub name:            String,
  pub email:           String,
  pub status:          String,
  pub password_hash:   String,
  pub created_at:      String,
}

impl RawOrganization {
  pub const COLUMNS: &'static str =
    "organization_id, name, email, status, password_hash, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      organization_id: row.get(0)?,
      name:            row.get(1)?,
      email:           row.get(2)?,
      status:          row.get(3)?,
      password_hash:   row.get(4)?,
      created_at:      row.get(5)?,
    })
  }

  pub fn into_organization(self) -> Result<Organization> {
    Ok(Organization {
      organization_id: decode_uuid(&self.organization_id)?,
      name:            self.name,
      email:           self.email,
      status:          decode_account_status(&self.status)?,
      password_hash:   self.password_hash,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawVolunteer {
  pub volunteer_id:      String,
  pub organization_id:   String,
  pub name:              String,
  pub email:             String,
  pub phone:             Option<String>,
  pub status:            String,
  pub completed_rescues: i64,
  pub password_hash:     String,
  pub created_at:        String,
  /// Filled from `volunteer_active_cases` after the row is read.
  pub active_cases:      Vec<String>,
}

impl RawVolunteer {
  pub const COLUMNS: &'static str = "volunteer_id, organization_id, name, email, phone, \
     status, completed_rescues, password_hash, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      volunteer_id:      row.get(0)?,
      organization_id:   row.get(1)?,
      name:              row.get(2)?,
      email:             row.get(3)?,
      phone:             row.get(4)?,
      status:            row.get(5)?,
      completed_rescues: row.get(6)?,
      password_hash:     row.get(7)?,
      created_at:        row.get(8)?,
      active_cases:      Vec::new(),
    })
  }

  pub fn into_volunteer(self) -> Result<Volunteer> {
    Ok(Volunteer {
      volunteer_id:      decode_uuid(&self.volunteer_id)?,
      organization_id:   decode_uuid(&self.organization_id)?,
      name:              self.name,
      email:             self.email,
      phone:             self.phone,
      status:            decode_account_status(&self.status)?,
      active_cases:      self
        .active_cases
        .iter()
        .map(|s| decode_uuid(s))
        .collect::<Result<_>>()?,
      completed_rescues: u32::try_from(self.completed_rescues).unwrap_or(u32::MAX),
      password_hash:     self.password_hash,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

// ─── Case rows ───────────────────────────────────────────────────────────────

/// Raw strings read from a `timeline_entries` row.
pub struct RawEntry {
  pub status:    String,
  pub timestamp: String,
  pub notes:     Option<String>,
}

impl RawEntry {
  pub fn into_entry(self) -> Result<TimelineEntry> {
    Ok(TimelineEntry {
      status:    decode_milestone(&self.status)?,
      timestamp: decode_dt(&self.timestamp)?,
      notes:     self.notes,
    })
  }
}

/// Raw strings read from a `cases` row, plus its timeline.
pub struct RawCase {
  pub case_id:        String,
  pub requester_id:   String,
  pub animal_type:    String,
  pub animal_details: String,
  pub location:       String,
  pub images:         String,
  pub status:         String,
  pub emergency:      bool,
  pub ngo_id:         Option<String>,
  pub volunteer_id:   Option<String>,
  pub assigned_at:    Option<String>,
  pub contact_info:   String,
  pub created_at:     String,
  pub updated_at:     String,
  pub revision:       i64,
  pub timeline:       Vec<RawEntry>,
}

impl RawCase {
  pub const COLUMNS: &'static str = "case_id, requester_id, animal_type, animal_details, \
     location, images, status, emergency, ngo_id, volunteer_id, assigned_at, \
     contact_info, created_at, updated_at, revision";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:        row.get(0)?,
      requester_id:   row.get(1)?,
      animal_type:    row.get(2)?,
      animal_details: row.get(3)?,
      location:       row.get(4)?,
      images:         row.get(5)?,
      status:         row.get(6)?,
      emergency:      row.get(7)?,
      ngo_id:         row.get(8)?,
      volunteer_id:   row.get(9)?,
      assigned_at:    row.get(10)?,
      contact_info:   row.get(11)?,
      created_at:     row.get(12)?,
      updated_at:     row.get(13)?,
      revision:       row.get(14)?,
      timeline:       Vec::new(),
    })
  }

  pub fn into_case(self) -> Result<RescueCase> {
    Ok(RescueCase {
      case_id:        decode_uuid(&self.case_id)?,
      requester_id:   decode_uuid(&self.requester_id)?,
      animal_type:    decode_animal_type(&self.animal_type)?,
      animal_details: serde_json::from_str(&self.animal_details)?,
      location:       serde_json::from_str(&self.location)?,
      images:         serde_json::from_str(&self.images)?,
      status:         decode_status(&self.status)?,
      emergency:      self.emergency,
      assigned_to:    Assignment {
        ngo:         decode_opt_uuid(self.ngo_id)?,
        volunteer:   decode_opt_uuid(self.volunteer_id)?,
        assigned_at: self.assigned_at.as_deref().map(decode_dt).transpose()?,
      },
      timeline:       self
        .timeline
        .into_iter()
        .map(RawEntry::into_entry)
        .collect::<Result<_>>()?,
      contact_info:   serde_json::from_str(&self.contact_info)?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
      revision:       u64::try_from(self.revision).unwrap_or_default(),
    })
  }
}

/// Column values for inserting a timeline entry.
pub fn encode_entry(e: &TimelineEntry) -> (&'static str, String, Option<String>) {
  (e.status.as_str(), encode_dt(e.timestamp), e.notes.clone())
}
