//! The Case Lifecycle Service, the only writer of rescue cases.
//!
//! Every mutating operation follows the same shape:
//!
//! 1. the role gate ([`authorize`]) runs against the resolved principal;
//! 2. the current case is loaded and a [`CaseChange`] is planned from it,
//!    checking visibility, ownership and the transition table;
//! 3. the change is committed with an optimistic revision check. If another
//!    writer got there first the case is reloaded and the change re-planned,
//!    so a stale request fails validation instead of overwriting.

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  case::{
    Assignment, CaseStatus, Milestone, NewCase, RescueCase, TimelineEntry,
  },
  principal::{AccountStatus, Principal, Role, Volunteer, authorize},
  store::{
    CaseCommit, CaseFilter, CaseScope, RescueStore, StoreError, VolunteerEffect,
  },
};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

// ─── Policy ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
  /// Let Organizations see unassigned pending cases so they can pick them up.
  pub org_triage_visible:  bool,
  /// Upper bound on plan/commit rounds for one operation.
  pub max_commit_attempts: u32,
}

impl Default for LifecyclePolicy {
  fn default() -> Self {
    Self { org_triage_visible: true, max_commit_attempts: 3 }
  }
}

// ─── Planned change ──────────────────────────────────────────────────────────

/// The outcome of planning an operation against one snapshot of a case.
#[derive(Debug)]
struct CaseChange {
  status:      CaseStatus,
  assigned_to: Assignment,
  append:      Vec<TimelineEntry>,
  volunteer:   Option<VolunteerEffect>,
}

impl CaseChange {
  /// Keep status and assignment; append entries only.
  fn append_only(case: &RescueCase, append: Vec<TimelineEntry>) -> Self {
    Self {
      status: case.status,
      assigned_to: case.assigned_to,
      append,
      volunteer: None,
    }
  }
}

fn entry(status: Milestone, timestamp: DateTime<Utc>, notes: Option<String>) -> TimelineEntry {
  TimelineEntry { status, timestamp, notes }
}

fn store_err<E: StoreError>(e: E) -> Error { Error::Store(Box::new(e)) }

fn non_blank(notes: Option<String>) -> Option<String> {
  notes.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty())
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Applies rescue-case transitions on behalf of resolved principals.
pub struct CaseService<S> {
  store:  Arc<S>,
  policy: LifecyclePolicy,
}

impl<S> Clone for CaseService<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), policy: self.policy.clone() }
  }
}

impl<S: RescueStore> CaseService<S> {
  pub fn new(store: Arc<S>, policy: LifecyclePolicy) -> Self {
    Self { store, policy }
  }

  pub fn policy(&self) -> &LifecyclePolicy { &self.policy }

  // ── Visibility ────────────────────────────────────────────────────────

  /// Whether `principal` may see `case` at all.
  pub fn can_view(&self, principal: &Principal, case: &RescueCase) -> bool {
    match principal.role() {
      Role::Admin => true,
      Role::Requester => case.requester_id == principal.id(),
      Role::Organization => {
        case.is_assigned_ngo(principal.id())
          || (self.policy.org_triage_visible
            && case.assigned_to.ngo.is_none()
            && case.status == CaseStatus::Pending)
      }
      Role::Volunteer => case.is_assigned_volunteer(principal.id()),
    }
  }

  fn scope_for(&self, principal: &Principal) -> CaseScope {
    match principal.role() {
      Role::Admin => CaseScope::All,
      Role::Requester => CaseScope::Requester(principal.id()),
      Role::Organization => CaseScope::Organization {
        organization_id: principal.id(),
        include_triage:  self.policy.org_triage_visible,
      },
      Role::Volunteer => CaseScope::Volunteer(principal.id()),
    }
  }

  /// Write authority of an Organization (or Admin) over a case.
  ///
  /// A case owned by a different Organization is `Forbidden`; a case no
  /// Organization owns yet is `Forbidden` as well, since only Accept may
  /// claim it.
  fn require_owning_org(principal: &Principal, case: &RescueCase) -> Result<()> {
    if principal.is_admin() || case.is_assigned_ngo(principal.id()) {
      return Ok(());
    }
    match case.assigned_to.ngo {
      Some(_) => Err(Error::forbidden("case is assigned to another organization")),
      None => Err(Error::forbidden("case has not been accepted by your organization")),
    }
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Fetch one case, reporting invisible cases as absent.
  pub async fn get(&self, principal: &Principal, case_id: Uuid) -> Result<RescueCase> {
    let case = self
      .store
      .get_case(case_id)
      .await
      .map_err(store_err)?
      .filter(|c| self.can_view(principal, c))
      .ok_or(Error::NotFound("rescue case"))?;
    Ok(case)
  }

  /// List the cases visible to `principal`, newest first.
  pub async fn list(
    &self,
    principal: &Principal,
    mut filter: CaseFilter,
  ) -> Result<Vec<RescueCase>> {
    filter.limit = Some(filter.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE));
    let scope = self.scope_for(principal);
    self.store.list_cases(scope, &filter).await.map_err(store_err)
  }

  // ── Submit ────────────────────────────────────────────────────────────

  /// File a new case in `pending` with a single `request_received` entry.
  pub async fn submit(&self, principal: &Principal, input: NewCase) -> Result<RescueCase> {
    authorize(principal, &[Role::Requester, Role::Admin])?;
    let animal_type = input.validate()?;

    let now = Utc::now();
    let case = RescueCase {
      case_id: Uuid::new_v4(),
      requester_id: principal.id(),
      animal_type,
      animal_details: input.animal_details,
      location: input.location,
      images: input.images,
      status: CaseStatus::Pending,
      emergency: input.emergency,
      assigned_to: Assignment::default(),
      timeline: vec![entry(
        Milestone::RequestReceived,
        now,
        Some("Rescue request submitted by user".into()),
      )],
      contact_info: input.contact_info,
      created_at: now,
      updated_at: now,
      revision: 0,
    };

    self.store.insert_case(case.clone()).await.map_err(store_err)?;
    tracing::info!(case_id = %case.case_id, requester = %case.requester_id, "rescue case submitted");
    Ok(case)
  }

  // ── Accept ────────────────────────────────────────────────────────────

  /// An Organization takes a pending case, optionally naming one of its
  /// volunteers in the same step.
  pub async fn accept(
    &self,
    principal: &Principal,
    case_id: Uuid,
    volunteer_id: Option<Uuid>,
  ) -> Result<RescueCase> {
    authorize(principal, &[Role::Organization])?;
    let Principal::Organization(org) = principal else {
      return Err(Error::forbidden("only organizations may accept cases"));
    };

    let organization_id = org.organization_id;

    let updated = self
      .apply_with(
        case_id,
        || async move {
          match volunteer_id {
            Some(id) => self.assignable_volunteer(id, organization_id).await.map(Some),
            None => Ok(None),
          }
        },
        |case: &RescueCase, volunteer: &Option<Volunteer>, at| {
          if let Some(owner) = case.assigned_to.ngo
            && owner != org.organization_id
          {
            return Err(Error::forbidden("case is assigned to another organization"));
          }
          let status = case.status.transition(CaseStatus::Accepted)?;

          let mut append = vec![entry(
            Milestone::NgoAssigned,
            at,
            Some(format!("Rescue accepted by NGO: {}", org.name)),
          )];
          if let Some(v) = volunteer {
            append.push(entry(
              Milestone::VolunteerAssigned,
              at,
              Some(format!("Volunteer {} assigned", v.name)),
            ));
          }

          Ok(CaseChange {
            status,
            assigned_to: Assignment {
              ngo:         Some(org.organization_id),
              volunteer:   volunteer.as_ref().map(|v| v.volunteer_id),
              assigned_at: Some(at),
            },
            append,
            volunteer: volunteer.as_ref().map(|v| VolunteerEffect::Assign(v.volunteer_id)),
          })
        },
      )
      .await?;

    tracing::info!(%case_id, organization = %org.organization_id, ?volunteer_id, "rescue case accepted");
    Ok(updated)
  }

  // ── Assign volunteer ──────────────────────────────────────────────────

  /// Put a volunteer on an accepted case, moving it to `in_progress`.
  pub async fn assign_volunteer(
    &self,
    principal: &Principal,
    case_id: Uuid,
    volunteer_id: Uuid,
  ) -> Result<RescueCase> {
    authorize(principal, &[Role::Organization, Role::Admin])?;

    let updated = self
      .apply_with(
        case_id,
        || async move {
          self
            .store
            .get_volunteer(volunteer_id)
            .await
            .map_err(store_err)?
            .ok_or(Error::NotFound("volunteer"))
        },
        |case: &RescueCase, volunteer: &Volunteer, at| {
          Self::require_owning_org(principal, case)?;
          if case.status != CaseStatus::Accepted {
            return Err(Error::InvalidTransition {
              from: case.status,
              to:   CaseStatus::InProgress,
            });
          }
          if case.assigned_to.volunteer.is_some() {
            return Err(Error::Conflict("case already has an assigned volunteer".into()));
          }
          if case.assigned_to.ngo != Some(volunteer.organization_id) {
            return Err(Error::NotFound("volunteer"));
          }
          if volunteer.status != AccountStatus::Active {
            return Err(Error::validation("volunteer account is inactive"));
          }
          let status = case.status.transition(CaseStatus::InProgress)?;

          Ok(CaseChange {
            status,
            assigned_to: Assignment {
              volunteer: Some(volunteer.volunteer_id),
              ..case.assigned_to
            },
            append: vec![entry(
              Milestone::VolunteerAssigned,
              at,
              Some(format!("Volunteer {} assigned", volunteer.name)),
            )],
            volunteer: Some(VolunteerEffect::Assign(volunteer.volunteer_id)),
          })
        },
      )
      .await?;

    tracing::info!(%case_id, %volunteer_id, "volunteer assigned");
    Ok(updated)
  }

  // ── Update status ─────────────────────────────────────────────────────

  /// Generic transition along the legal-transition table.
  ///
  /// | caller | may request |
  /// |---|---|
  /// | assigned Organization, Admin | any legal target except `accepted` |
  /// | assigned Volunteer | `in_progress`, `completed` |
  /// | originating Requester | `cancelled`, while still `pending` |
  pub async fn update_status(
    &self,
    principal: &Principal,
    case_id: Uuid,
    target: CaseStatus,
    notes: Option<String>,
  ) -> Result<RescueCase> {
    authorize(
      principal,
      &[Role::Organization, Role::Admin, Role::Volunteer, Role::Requester],
    )?;
    let notes = non_blank(notes);

    let updated = self
      .apply(case_id, |case, at| {
        match principal.role() {
          Role::Admin | Role::Organization => Self::require_owning_org(principal, case)?,
          Role::Volunteer => {
            if !case.is_assigned_volunteer(principal.id()) {
              return Err(Error::NotFound("rescue case"));
            }
            if !matches!(target, CaseStatus::InProgress | CaseStatus::Completed) {
              return Err(Error::forbidden(format!("volunteers may not set status {target}")));
            }
          }
          Role::Requester => {
            if case.requester_id != principal.id() {
              return Err(Error::NotFound("rescue case"));
            }
            if target != CaseStatus::Cancelled {
              return Err(Error::forbidden("requesters may only cancel their requests"));
            }
            if case.status != CaseStatus::Pending && !case.status.is_terminal() {
              return Err(Error::forbidden("requests can only be withdrawn while pending"));
            }
          }
        }

        let status = case.status.transition(target)?;
        if status == CaseStatus::Accepted {
          return Err(Error::validation("pending cases are taken through accept"));
        }

        let volunteer = match (status, case.assigned_to.volunteer) {
          (CaseStatus::Completed, Some(v)) => Some(VolunteerEffect::Complete(v)),
          (CaseStatus::Cancelled, Some(v)) => Some(VolunteerEffect::Release(v)),
          _ => None,
        };

        Ok(CaseChange {
          status,
          assigned_to: case.assigned_to,
          append: vec![entry(
            Milestone::for_status(status),
            at,
            Some(notes.clone().unwrap_or_else(|| format!("Status updated to {status}"))),
          )],
          volunteer,
        })
      })
      .await?;

    tracing::info!(%case_id, status = %updated.status, by = %principal.id(), "case status updated");
    Ok(updated)
  }

  // ── Milestones and notes ──────────────────────────────────────────────

  /// Record a field milestone on an in-progress case without changing its
  /// status.
  pub async fn record_milestone(
    &self,
    principal: &Principal,
    case_id: Uuid,
    milestone: Milestone,
    notes: Option<String>,
  ) -> Result<RescueCase> {
    authorize(principal, &[Role::Volunteer, Role::Organization, Role::Admin])?;
    if !milestone.is_operational() {
      return Err(Error::validation(format!(
        "{} is not a field milestone",
        milestone.as_str()
      )));
    }
    let notes = non_blank(notes);

    self
      .apply(case_id, |case, at| {
        if principal.role() == Role::Volunteer {
          if !case.is_assigned_volunteer(principal.id()) {
            return Err(Error::NotFound("rescue case"));
          }
        } else {
          Self::require_owning_org(principal, case)?;
        }
        if case.status != CaseStatus::InProgress {
          return Err(Error::validation(format!(
            "milestones can only be recorded while a rescue is in progress (case is {})",
            case.status
          )));
        }
        Ok(CaseChange::append_only(case, vec![entry(milestone, at, notes.clone())]))
      })
      .await
  }

  /// Append a note under the most recent timeline label. Notes are never
  /// deduplicated.
  pub async fn add_note(
    &self,
    principal: &Principal,
    case_id: Uuid,
    notes: String,
  ) -> Result<RescueCase> {
    authorize(principal, &[Role::Volunteer])?;
    let notes = non_blank(Some(notes)).ok_or_else(|| Error::validation("notes must not be empty"))?;

    self
      .apply(case_id, |case, at| {
        if !case.is_assigned_volunteer(principal.id()) {
          return Err(Error::NotFound("rescue case"));
        }
        if case.status.is_terminal() {
          return Err(Error::validation(format!(
            "case is {}; notes can no longer be added",
            case.status
          )));
        }
        let label = case
          .last_entry()
          .map(|e| e.status)
          .unwrap_or(Milestone::for_status(case.status));
        Ok(CaseChange::append_only(case, vec![entry(label, at, Some(notes.clone()))]))
      })
      .await
  }

  // ── Internals ─────────────────────────────────────────────────────────

  /// Load a volunteer for assignment by `organization_id`. Volunteers of
  /// other organizations read as absent.
  async fn assignable_volunteer(&self, id: Uuid, organization_id: Uuid) -> Result<Volunteer> {
    let volunteer = self
      .store
      .get_volunteer(id)
      .await
      .map_err(store_err)?
      .filter(|v| v.organization_id == organization_id)
      .ok_or(Error::NotFound("volunteer"))?;
    if volunteer.status != AccountStatus::Active {
      return Err(Error::validation("volunteer account is inactive"));
    }
    Ok(volunteer)
  }

  /// Plan-and-commit loop with optimistic concurrency control.
  ///
  /// `plan` sees the freshest snapshot on every round and the timestamp to
  /// stamp new entries with. Nothing is written unless a plan succeeds and
  /// its commit lands on an unchanged revision.
  async fn apply<F>(&self, case_id: Uuid, mut plan: F) -> Result<RescueCase>
  where
    F: FnMut(&RescueCase, DateTime<Utc>) -> Result<CaseChange>,
  {
    self
      .apply_with(case_id, || async { Ok(()) }, |case, _, at| plan(case, at))
      .await
  }

  /// [`Self::apply`] with extra state reloaded by `load` on every round, after
  /// the case snapshot and before planning.
  async fn apply_with<C, L, Fut, F>(
    &self,
    case_id: Uuid,
    mut load: L,
    mut plan: F,
  ) -> Result<RescueCase>
  where
    L: FnMut() -> Fut,
    Fut: Future<Output = Result<C>>,
    F: FnMut(&RescueCase, &C, DateTime<Utc>) -> Result<CaseChange>,
  {
    let attempts = self.policy.max_commit_attempts.max(1);

    for attempt in 1..=attempts {
      let case = self
        .store
        .get_case(case_id)
        .await
        .map_err(store_err)?
        .ok_or(Error::NotFound("rescue case"))?;

      let context = load().await?;

      let now = Utc::now();
      let change = plan(&case, &context, case.next_timestamp(now))?;

      let commit = CaseCommit {
        case_id,
        expected_revision: case.revision,
        status: change.status,
        assigned_to: change.assigned_to,
        append: change.append,
        volunteer: change.volunteer,
        updated_at: now,
      };

      match self.store.commit_case(commit).await {
        Ok(Some(updated)) => return Ok(updated),
        Ok(None) => {
          tracing::warn!(%case_id, attempt, "case changed concurrently; re-planning");
        }
        Err(e) if e.is_transient() && attempt < attempts => {
          tracing::warn!(%case_id, attempt, error = %e, "transient store error; retrying commit");
        }
        Err(e) => return Err(store_err(e)),
      }
    }

    Err(Error::Conflict(format!(
      "case {case_id} changed concurrently {attempts} times; giving up"
    )))
  }
}
