//! Introspection endpoint, compiled only with the `diagnostics` feature.
//!
//! It reads the resolved identity and changes nothing. Authorization does
//! not depend on whether this module is present.

use axum::Json;
use serde::Serialize;

use super::Envelope;
use crate::auth::{Claims, SelfCheck};
use rakshak_core::principal::{Principal, Role};

#[derive(Debug, Serialize)]
pub struct WhoAmI {
  pub principal: Principal,
  pub role:      Role,
  pub claims:    Claims,
}

/// `GET /diagnostics/whoami`
pub async fn whoami(SelfCheck { principal, claims }: SelfCheck) -> Json<Envelope<WhoAmI>> {
  let role = principal.role();
  Envelope::ok(WhoAmI { principal, role, claims })
}
