//! The `RescueStore` trait and supporting query/commit types.
//!
//! The trait is implemented by storage backends (e.g. `rakshak-store-sqlite`).
//! The services in this crate and the HTTP layer depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  case::{Assignment, CaseStatus, RescueCase, TimelineEntry},
  principal::{
    AccountStatus, NewOrganization, NewRequester, NewVolunteer, Organization,
    Principal, PrincipalKind, Requester, Volunteer,
  },
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Backend error classification the services rely on.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// Contention or connectivity failures that may succeed if retried.
  fn is_transient(&self) -> bool { false }

  /// A uniqueness constraint (e.g. e-mail address) was violated.
  fn is_conflict(&self) -> bool { false }
}

// ─── Query types ─────────────────────────────────────────────────────────────

/// Which cases a principal may list. Derived from the principal, never taken
/// from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseScope {
  All,
  /// Cases filed by this Requester.
  Requester(Uuid),
  /// Cases assigned to this Organization, plus unassigned pending cases when
  /// `include_triage` is set.
  Organization {
    organization_id: Uuid,
    include_triage:  bool,
  },
  /// Cases assigned to this Volunteer.
  Volunteer(Uuid),
}

/// Parameters for [`RescueStore::list_cases`]. Results are always ordered
/// most-recently-created first.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
  pub status:    Option<CaseStatus>,
  pub emergency: Option<bool>,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

// ─── Commit ──────────────────────────────────────────────────────────────────

/// A change to a Volunteer's active-case bookkeeping that must land together
/// with the case update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolunteerEffect {
  /// Add the case to the volunteer's active set.
  Assign(Uuid),
  /// Remove the case from the active set and bump the completed counter.
  Complete(Uuid),
  /// Remove the case from the active set (cancellation).
  Release(Uuid),
}

/// One atomic case update: new status and assignment, timeline entries to
/// append, and the matching volunteer bookkeeping.
#[derive(Debug, Clone)]
pub struct CaseCommit {
  pub case_id:           Uuid,
  /// The revision the change was planned against. The store must refuse the
  /// commit if the stored revision differs.
  pub expected_revision: u64,
  pub status:            CaseStatus,
  pub assigned_to:       Assignment,
  pub append:            Vec<TimelineEntry>,
  pub volunteer:         Option<VolunteerEffect>,
  pub updated_at:        DateTime<Utc>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Rakshak storage backend.
///
/// Timelines are append-only and cases are never deleted. All case mutation
/// goes through [`RescueStore::commit_case`], which is atomic with respect to
/// concurrent commits on the same case.
pub trait RescueStore: Send + Sync {
  type Error: StoreError;

  // ── Principals ────────────────────────────────────────────────────────

  fn add_requester(
    &self,
    input: NewRequester,
  ) -> impl Future<Output = Result<Requester, Self::Error>> + Send + '_;

  fn add_organization(
    &self,
    input: NewOrganization,
  ) -> impl Future<Output = Result<Organization, Self::Error>> + Send + '_;

  /// Returns an error for which [`StoreError::is_conflict`] holds if the
  /// e-mail address is already registered to a volunteer.
  fn add_volunteer(
    &self,
    input: NewVolunteer,
  ) -> impl Future<Output = Result<Volunteer, Self::Error>> + Send + '_;

  fn get_requester(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Requester>, Self::Error>> + Send + '_;

  fn get_organization(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Organization>, Self::Error>> + Send + '_;

  /// Volunteers are returned with their active-case set populated.
  fn get_volunteer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Volunteer>, Self::Error>> + Send + '_;

  /// Look up a principal of `kind` by e-mail address (login).
  fn find_by_email<'a>(
    &'a self,
    kind: PrincipalKind,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + 'a;

  /// Volunteers owned by `organization_id`, newest first.
  fn list_volunteers(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Volunteer>, Self::Error>> + Send + '_;

  fn set_volunteer_status(
    &self,
    id: Uuid,
    status: AccountStatus,
  ) -> impl Future<Output = Result<Option<Volunteer>, Self::Error>> + Send + '_;

  /// Delete a volunteer. Returns `false` if no row was removed, either
  /// because it does not exist or because it still has active cases.
  fn remove_volunteer(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Cases ─────────────────────────────────────────────────────────────

  /// Persist a freshly submitted case, timeline included.
  fn insert_case(
    &self,
    case: RescueCase,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_case(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<RescueCase>, Self::Error>> + Send + '_;

  fn list_cases<'a>(
    &'a self,
    scope: CaseScope,
    filter: &'a CaseFilter,
  ) -> impl Future<Output = Result<Vec<RescueCase>, Self::Error>> + Send + 'a;

  /// Apply `commit` as one durable unit. Returns `None` without writing
  /// anything if the case's revision no longer equals
  /// `commit.expected_revision` (or the case is gone), or if a
  /// [`VolunteerEffect::Assign`] names a volunteer that is inactive or not
  /// owned by `commit.assigned_to.ngo` at commit time.
  fn commit_case(
    &self,
    commit: CaseCommit,
  ) -> impl Future<Output = Result<Option<RescueCase>, Self::Error>> + Send + '_;
}
