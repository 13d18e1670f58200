//! Out-of-band delivery of volunteer credentials.
//!
//! Delivery is best-effort: a failed dispatch is logged by the caller and
//! never undoes the volunteer's creation.

use rakshak_core::principal::Volunteer;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

pub trait Notifier: Send + Sync {
  /// Deliver `password` to the newly created `volunteer`.
  fn volunteer_created(&self, volunteer: &Volunteer, password: &str) -> Result<(), NotifyError>;
}

/// Records the delivery in the log instead of sending anything. The
/// password itself is never logged.
pub struct LogNotifier;

impl Notifier for LogNotifier {
  fn volunteer_created(&self, volunteer: &Volunteer, _password: &str) -> Result<(), NotifyError> {
    tracing::info!(
      volunteer = %volunteer.volunteer_id,
      email = %volunteer.email,
      "initial credentials ready for delivery"
    );
    Ok(())
  }
}
