//! Rescue cases: the state machine at the centre of the system.
//!
//! A case carries a coarse [`CaseStatus`] that drives authorization and
//! queries, and a fine-grained append-only timeline of [`Milestone`]s that
//! forms the human-readable audit trail. The timeline vocabulary is a superset
//! of the status vocabulary.
//!
//! Field names are camelCase on the wire to match existing API clients.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Subject description ─────────────────────────────────────────────────────

/// The closed set of animal categories a case may be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimalType {
  Dog,
  Cat,
  Bird,
  Cattle,
  Wildlife,
  Other,
}

impl AnimalType {
  pub const ALL: [AnimalType; 6] = [
    Self::Dog,
    Self::Cat,
    Self::Bird,
    Self::Cattle,
    Self::Wildlife,
    Self::Other,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Dog => "Dog",
      Self::Cat => "Cat",
      Self::Bird => "Bird",
      Self::Cattle => "Cattle",
      Self::Wildlife => "Wildlife",
      Self::Other => "Other",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|t| t.as_str() == s)
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
pub enum AnimalCondition {
  Critical,
  Injured,
  Sick,
  Healthy,
  #[default]
  Unknown,
}

/// Free-form description of the animal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnimalDetails {
  pub breed:           Option<String>,
  pub color:           Option<String>,
  pub approximate_age: Option<String>,
  pub condition:       AnimalCondition,
  pub special_needs:   Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub latitude:  f64,
  pub longitude: f64,
}

/// Where the animal is. `city` and `state` are mandatory; a submission that
/// omits them deserialises to empty strings and fails validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
  pub address:     Option<String>,
  pub landmark:    Option<String>,
  pub city:        String,
  pub state:       String,
  pub pincode:     Option<String>,
  pub coordinates: Option<Coordinates>,
}

/// A reference to an uploaded image. Binary content lives in media storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseImage {
  pub url:     String,
  pub caption: Option<String>,
}

/// The reporter's contact details at filing time. Immutable once set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactInfo {
  pub name:  Option<String>,
  pub phone: String,
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// The controlling field of the case state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
  Pending,
  Accepted,
  InProgress,
  Completed,
  Cancelled,
}

impl CaseStatus {
  pub const ALL: [CaseStatus; 5] = [
    Self::Pending,
    Self::Accepted,
    Self::InProgress,
    Self::Completed,
    Self::Cancelled,
  ];

  /// The legal-transition table.
  pub fn allowed_targets(self) -> &'static [CaseStatus] {
    match self {
      Self::Pending => &[Self::Accepted, Self::Cancelled],
      Self::Accepted => &[Self::InProgress, Self::Cancelled],
      Self::InProgress => &[Self::Completed, Self::Cancelled],
      Self::Completed | Self::Cancelled => &[],
    }
  }

  pub fn can_transition_to(self, to: CaseStatus) -> bool {
    self.allowed_targets().contains(&to)
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Completed | Self::Cancelled)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Accepted => "accepted",
      Self::InProgress => "in_progress",
      Self::Completed => "completed",
      Self::Cancelled => "cancelled",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|st| st.as_str() == s)
  }

  /// Check a requested transition against the table.
  pub fn transition(self, to: CaseStatus) -> Result<CaseStatus> {
    if self.can_transition_to(to) {
      Ok(to)
    } else {
      Err(Error::InvalidTransition { from: self, to })
    }
  }
}

impl fmt::Display for CaseStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Timeline ────────────────────────────────────────────────────────────────

/// Timeline labels. Only some correspond to a case-level status; the rest are
/// operational milestones recorded while a rescue is under way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
  RequestReceived,
  NgoAssigned,
  VolunteerAssigned,
  VolunteerDispatched,
  ReachedLocation,
  AnimalRescued,
  ReturningToCenter,
  TreatmentStarted,
  Completed,
  Cancelled,
}

impl Milestone {
  pub const ALL: [Milestone; 10] = [
    Self::RequestReceived,
    Self::NgoAssigned,
    Self::VolunteerAssigned,
    Self::VolunteerDispatched,
    Self::ReachedLocation,
    Self::AnimalRescued,
    Self::ReturningToCenter,
    Self::TreatmentStarted,
    Self::Completed,
    Self::Cancelled,
  ];

  /// The label written when a case enters `status`.
  pub fn for_status(status: CaseStatus) -> Milestone {
    match status {
      CaseStatus::Pending => Self::RequestReceived,
      CaseStatus::Accepted => Self::NgoAssigned,
      CaseStatus::InProgress => Self::VolunteerDispatched,
      CaseStatus::Completed => Self::Completed,
      CaseStatus::Cancelled => Self::Cancelled,
    }
  }

  /// Field milestones that may be recorded while a case is in progress
  /// without changing its status.
  pub fn is_operational(self) -> bool {
    matches!(
      self,
      Self::VolunteerDispatched
        | Self::ReachedLocation
        | Self::AnimalRescued
        | Self::ReturningToCenter
        | Self::TreatmentStarted
    )
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::RequestReceived => "request_received",
      Self::NgoAssigned => "ngo_assigned",
      Self::VolunteerAssigned => "volunteer_assigned",
      Self::VolunteerDispatched => "volunteer_dispatched",
      Self::ReachedLocation => "reached_location",
      Self::AnimalRescued => "animal_rescued",
      Self::ReturningToCenter => "returning_to_center",
      Self::TreatmentStarted => "treatment_started",
      Self::Completed => "completed",
      Self::Cancelled => "cancelled",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|m| m.as_str() == s)
  }
}

/// One append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
  pub status:    Milestone,
  pub timestamp: DateTime<Utc>,
  pub notes:     Option<String>,
}

// ─── Assignment ──────────────────────────────────────────────────────────────

/// The (Organization, Volunteer) pair responsible for a case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
  pub ngo:         Option<Uuid>,
  pub volunteer:   Option<Uuid>,
  pub assigned_at: Option<DateTime<Utc>>,
}

// ─── Case ────────────────────────────────────────────────────────────────────

/// A rescue request and its full lifecycle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescueCase {
  #[serde(rename = "id")]
  pub case_id:        Uuid,
  /// The Requester who filed the case.
  pub requester_id:   Uuid,
  pub animal_type:    AnimalType,
  pub animal_details: AnimalDetails,
  pub location:       Location,
  pub images:         Vec<CaseImage>,
  pub status:         CaseStatus,
  pub emergency:      bool,
  pub assigned_to:    Assignment,
  pub timeline:       Vec<TimelineEntry>,
  pub contact_info:   ContactInfo,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
  /// Incremented by every committed change; the optimistic-concurrency token.
  pub revision:       u64,
}

impl RescueCase {
  pub fn last_entry(&self) -> Option<&TimelineEntry> { self.timeline.last() }

  /// A timestamp for the next timeline entry that never precedes the last
  /// one, even if the wall clock stepped backwards.
  pub fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
    match self.last_entry() {
      Some(last) if last.timestamp > now => last.timestamp,
      _ => now,
    }
  }

  pub fn is_assigned_ngo(&self, organization_id: Uuid) -> bool {
    self.assigned_to.ngo == Some(organization_id)
  }

  pub fn is_assigned_volunteer(&self, volunteer_id: Uuid) -> bool {
    self.assigned_to.volunteer == Some(volunteer_id)
  }
}

// ─── Submission ──────────────────────────────────────────────────────────────

/// Input to a Requester submission. `animal_type` stays a string until
/// validation so that an unknown category is a validation error, not a
/// decoding error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewCase {
  pub animal_type:    String,
  pub animal_details: AnimalDetails,
  pub location:       Location,
  pub images:         Vec<CaseImage>,
  pub emergency:      bool,
  pub contact_info:   ContactInfo,
}

impl NewCase {
  /// Check required fields and return the parsed animal category.
  pub fn validate(&self) -> Result<AnimalType> {
    let animal_type = AnimalType::parse(self.animal_type.trim()).ok_or_else(|| {
      Error::validation(format!(
        "animalType must be one of Dog, Cat, Bird, Cattle, Wildlife, Other (got {:?})",
        self.animal_type
      ))
    })?;

    if self.location.city.trim().is_empty() {
      return Err(Error::validation("location.city is required"));
    }
    if self.location.state.trim().is_empty() {
      return Err(Error::validation("location.state is required"));
    }
    if self.contact_info.phone.trim().is_empty() {
      return Err(Error::validation("contactInfo.phone is required"));
    }
    if let Some(c) = self.location.coordinates
      && (!(-90.0..=90.0).contains(&c.latitude)
        || !(-180.0..=180.0).contains(&c.longitude))
    {
      return Err(Error::validation("location.coordinates out of range"));
    }
    if self.images.iter().any(|i| i.url.trim().is_empty()) {
      return Err(Error::validation("images[].url must not be empty"));
    }

    Ok(animal_type)
  }
}
