//! Organization-owned volunteer management.
//!
//! An Organization exclusively owns the lifecycle of its volunteers. Another
//! Organization's volunteers are reported as absent, never as forbidden.
//! Credential generation and delivery are the caller's concern; this service
//! receives an already-hashed secret.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  principal::{AccountStatus, NewVolunteer, Principal, Role, Volunteer, authorize},
  store::{RescueStore, StoreError},
};

/// Input to [`RosterService::add_volunteer`].
#[derive(Debug, Clone)]
pub struct VolunteerSignup {
  pub name:          String,
  pub email:         String,
  pub phone:         Option<String>,
  pub password_hash: String,
}

pub struct RosterService<S> {
  store: Arc<S>,
}

impl<S> Clone for RosterService<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

fn store_err<E: StoreError>(e: E) -> Error { Error::Store(Box::new(e)) }

impl<S: RescueStore> RosterService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub async fn add_volunteer(
    &self,
    principal: &Principal,
    signup: VolunteerSignup,
  ) -> Result<Volunteer> {
    authorize(principal, &[Role::Organization])?;

    let name  = signup.name.trim().to_owned();
    let email = signup.email.trim().to_lowercase();
    if name.is_empty() {
      return Err(Error::validation("name is required"));
    }
    if !email.contains('@') {
      return Err(Error::validation("a valid email is required"));
    }

    let volunteer = self
      .store
      .add_volunteer(NewVolunteer {
        organization_id: principal.id(),
        name,
        email,
        phone: signup.phone.filter(|p| !p.trim().is_empty()),
        password_hash: signup.password_hash,
      })
      .await
      .map_err(|e| {
        if e.is_conflict() {
          Error::Conflict("a volunteer with this email already exists".into())
        } else {
          store_err(e)
        }
      })?;

    tracing::info!(
      volunteer = %volunteer.volunteer_id,
      organization = %volunteer.organization_id,
      "volunteer added"
    );
    Ok(volunteer)
  }

  pub async fn list_volunteers(&self, principal: &Principal) -> Result<Vec<Volunteer>> {
    authorize(principal, &[Role::Organization])?;
    self.store.list_volunteers(principal.id()).await.map_err(store_err)
  }

  /// Deactivate or reactivate a volunteer. An inactive volunteer still
  /// authenticates but every operation except the self-check is refused.
  pub async fn set_status(
    &self,
    principal: &Principal,
    volunteer_id: Uuid,
    status: AccountStatus,
  ) -> Result<Volunteer> {
    authorize(principal, &[Role::Organization])?;
    self.owned(principal, volunteer_id).await?;

    let volunteer = self
      .store
      .set_volunteer_status(volunteer_id, status)
      .await
      .map_err(store_err)?
      .ok_or(Error::NotFound("volunteer"))?;

    tracing::info!(volunteer = %volunteer_id, ?status, "volunteer status changed");
    Ok(volunteer)
  }

  /// Remove a volunteer. Refused while the volunteer still has active cases,
  /// since that would leave those cases pointing at nobody.
  pub async fn remove_volunteer(&self, principal: &Principal, volunteer_id: Uuid) -> Result<()> {
    authorize(principal, &[Role::Organization])?;
    let volunteer = self.owned(principal, volunteer_id).await?;

    if !volunteer.active_cases.is_empty() {
      return Err(Error::Conflict(format!(
        "volunteer still has {} active case(s)",
        volunteer.active_cases.len()
      )));
    }

    if !self.store.remove_volunteer(volunteer_id).await.map_err(store_err)? {
      return Err(Error::Conflict("volunteer was assigned a case concurrently".into()));
    }

    tracing::info!(volunteer = %volunteer_id, organization = %principal.id(), "volunteer removed");
    Ok(())
  }

  async fn owned(&self, principal: &Principal, volunteer_id: Uuid) -> Result<Volunteer> {
    self
      .store
      .get_volunteer(volunteer_id)
      .await
      .map_err(store_err)?
      .filter(|v| v.organization_id == principal.id())
      .ok_or(Error::NotFound("volunteer"))
  }
}
