//! [`SqliteStore`], the SQLite implementation of [`RescueStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use rakshak_core::{
  case::RescueCase,
  principal::{
    AccountStatus, NewOrganization, NewRequester, NewVolunteer, Organization,
    Principal, PrincipalKind, Requester, Volunteer,
  },
  store::{CaseCommit, CaseFilter, CaseScope, RescueStore, VolunteerEffect},
};

use crate::{
  Result,
  encode::{
    RawCase, RawEntry, RawOrganization, RawRequester, RawVolunteer,
    encode_account_status, encode_dt, encode_entry, encode_role, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// Synchronous helpers run inside `Connection::call` closures, so a case and
// its timeline (or a volunteer and its active set) are read in one hop.

fn read_timeline(conn: &rusqlite::Connection, case_id: &str) -> rusqlite::Result<Vec<RawEntry>> {
  let mut stmt = conn.prepare_cached(
    "SELECT status, timestamp, notes FROM timeline_entries
     WHERE case_id = ?1 ORDER BY seq",
  )?;
  stmt
    .query_map(rusqlite::params![case_id], |row| {
      Ok(RawEntry {
        status:    row.get(0)?,
        timestamp: row.get(1)?,
        notes:     row.get(2)?,
      })
    })?
    .collect()
}

fn read_case(conn: &rusqlite::Connection, case_id: &str) -> rusqlite::Result<Option<RawCase>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM cases WHERE case_id = ?1", RawCase::COLUMNS),
      rusqlite::params![case_id],
      RawCase::from_row,
    )
    .optional()?;

  match raw {
    Some(mut raw) => {
      raw.timeline = read_timeline(conn, case_id)?;
      Ok(Some(raw))
    }
    None => Ok(None),
  }
}

fn read_active_cases(conn: &rusqlite::Connection, volunteer_id: &str) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare_cached(
    "SELECT case_id FROM volunteer_active_cases WHERE volunteer_id = ?1 ORDER BY case_id",
  )?;
  stmt
    .query_map(rusqlite::params![volunteer_id], |row| row.get(0))?
    .collect()
}

fn read_volunteer(conn: &rusqlite::Connection, volunteer_id: &str) -> rusqlite::Result<Option<RawVolunteer>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM volunteers WHERE volunteer_id = ?1", RawVolunteer::COLUMNS),
      rusqlite::params![volunteer_id],
      RawVolunteer::from_row,
    )
    .optional()?;

  match raw {
    Some(mut raw) => {
      raw.active_cases = read_active_cases(conn, volunteer_id)?;
      Ok(Some(raw))
    }
    None => Ok(None),
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rakshak store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RescueStore impl ────────────────────────────────────────────────────────

impl RescueStore for SqliteStore {
  type Error = crate::Error;

  // ── Principals ────────────────────────────────────────────────────────────

  async fn add_requester(&self, input: NewRequester) -> Result<Requester> {
    let requester = Requester {
      requester_id:  Uuid::new_v4(),
      name:          input.name,
      email:         input.email,
      phone:         input.phone,
      role:          input.role,
      password_hash: input.password_hash,
      created_at:    Utc::now(),
    };

    let id_str   = encode_uuid(requester.requester_id);
    let name     = requester.name.clone();
    let email    = requester.email.clone();
    let phone    = requester.phone.clone();
    let role_str = encode_role(requester.role);
    let hash     = requester.password_hash.clone();
    let at_str   = encode_dt(requester.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO requesters (requester_id, name, email, phone, role, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, name, email, phone, role_str, hash, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(requester)
  }

  async fn add_organization(&self, input: NewOrganization) -> Result<Organization> {
    let org = Organization {
      organization_id: Uuid::new_v4(),
      name:            input.name,
      email:           input.email,
      status:          AccountStatus::Active,
      password_hash:   input.password_hash,
      created_at:      Utc::now(),
    };

    let id_str     = encode_uuid(org.organization_id);
    let name       = org.name.clone();
    let email      = org.email.clone();
    let status_str = encode_account_status(org.status);
    let hash       = org.password_hash.clone();
    let at_str     = encode_dt(org.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO organizations (organization_id, name, email, status, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, name, email, status_str, hash, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(org)
  }

  async fn add_volunteer(&self, input: NewVolunteer) -> Result<Volunteer> {
    let volunteer = Volunteer {
      volunteer_id:      Uuid::new_v4(),
      organization_id:   input.organization_id,
      name:              input.name,
      email:             input.email,
      phone:             input.phone,
      status:            AccountStatus::Active,
      active_cases:      Vec::new(),
      completed_rescues: 0,
      password_hash:     input.password_hash,
      created_at:        Utc::now(),
    };

    let id_str     = encode_uuid(volunteer.volunteer_id);
    let org_str    = encode_uuid(volunteer.organization_id);
    let name       = volunteer.name.clone();
    let email      = volunteer.email.clone();
    let phone      = volunteer.phone.clone();
    let status_str = encode_account_status(volunteer.status);
    let hash       = volunteer.password_hash.clone();
    let at_str     = encode_dt(volunteer.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO volunteers (
             volunteer_id, organization_id, name, email, phone,
             status, completed_rescues, password_hash, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8)",
          rusqlite::params![id_str, org_str, name, email, phone, status_str, hash, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(volunteer)
  }

  async fn get_requester(&self, id: Uuid) -> Result<Option<Requester>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRequester> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM requesters WHERE requester_id = ?1", RawRequester::COLUMNS),
            rusqlite::params![id_str],
            RawRequester::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRequester::into_requester).transpose()
  }

  async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawOrganization> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM organizations WHERE organization_id = ?1",
              RawOrganization::COLUMNS
            ),
            rusqlite::params![id_str],
            RawOrganization::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawOrganization::into_organization).transpose()
  }

  async fn get_volunteer(&self, id: Uuid) -> Result<Option<Volunteer>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| Ok(read_volunteer(conn, &id_str)?))
      .await?;

    raw.map(RawVolunteer::into_volunteer).transpose()
  }

  async fn find_by_email(&self, kind: PrincipalKind, email: &str) -> Result<Option<Principal>> {
    let email = email.trim().to_lowercase();

    match kind {
      PrincipalKind::Requester => {
        let raw: Option<RawRequester> = self
          .conn
          .call(move |conn| {
            Ok(conn
              .query_row(
                &format!(
                  "SELECT {} FROM requesters WHERE lower(email) = ?1",
                  RawRequester::COLUMNS
                ),
                rusqlite::params![email],
                RawRequester::from_row,
              )
              .optional()?)
          })
          .await?;
        Ok(raw.map(RawRequester::into_requester).transpose()?.map(Principal::Requester))
      }
      PrincipalKind::Organization => {
        let raw: Option<RawOrganization> = self
          .conn
          .call(move |conn| {
            Ok(conn
              .query_row(
                &format!(
                  "SELECT {} FROM organizations WHERE lower(email) = ?1",
                  RawOrganization::COLUMNS
                ),
                rusqlite::params![email],
                RawOrganization::from_row,
              )
              .optional()?)
          })
          .await?;
        Ok(raw.map(RawOrganization::into_organization).transpose()?.map(Principal::Organization))
      }
      PrincipalKind::Volunteer => {
        let raw: Option<RawVolunteer> = self
          .conn
          .call(move |conn| {
            let id: Option<String> = conn
              .query_row(
                "SELECT volunteer_id FROM volunteers WHERE lower(email) = ?1",
                rusqlite::params![email],
                |row| row.get(0),
              )
              .optional()?;
            match id {
              Some(id) => Ok(read_volunteer(conn, &id)?),
              None => Ok(None),
            }
          })
          .await?;
        Ok(raw.map(RawVolunteer::into_volunteer).transpose()?.map(Principal::Volunteer))
      }
    }
  }

  async fn list_volunteers(&self, organization_id: Uuid) -> Result<Vec<Volunteer>> {
    let org_str = encode_uuid(organization_id);

    let raws: Vec<RawVolunteer> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM volunteers WHERE organization_id = ?1
           ORDER BY created_at DESC, rowid DESC",
          RawVolunteer::COLUMNS
        ))?;
        let mut rows = stmt
          .query_map(rusqlite::params![org_str], RawVolunteer::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        for raw in &mut rows {
          raw.active_cases = read_active_cases(conn, &raw.volunteer_id)?;
        }
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVolunteer::into_volunteer).collect()
  }

  async fn set_volunteer_status(&self, id: Uuid, status: AccountStatus) -> Result<Option<Volunteer>> {
    let id_str     = encode_uuid(id);
    let status_str = encode_account_status(status);

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE volunteers SET status = ?1 WHERE volunteer_id = ?2",
          rusqlite::params![status_str, id_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(read_volunteer(conn, &id_str)?)
      })
      .await?;

    raw.map(RawVolunteer::into_volunteer).transpose()
  }

  async fn remove_volunteer(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);

    let removed = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "DELETE FROM volunteers
           WHERE volunteer_id = ?1
             AND NOT EXISTS (SELECT 1 FROM volunteer_active_cases WHERE volunteer_id = ?1)",
          rusqlite::params![id_str],
        )?;
        Ok(changed > 0)
      })
      .await?;

    Ok(removed)
  }

  // ── Cases ─────────────────────────────────────────────────────────────────

  async fn insert_case(&self, case: RescueCase) -> Result<()> {
    let case_id_str    = encode_uuid(case.case_id);
    let requester_str  = encode_uuid(case.requester_id);
    let animal_type    = case.animal_type.as_str();
    let details_json   = serde_json::to_string(&case.animal_details)?;
    let location_json  = serde_json::to_string(&case.location)?;
    let images_json    = serde_json::to_string(&case.images)?;
    let status_str     = case.status.as_str();
    let emergency      = case.emergency;
    let ngo_str        = case.assigned_to.ngo.map(encode_uuid);
    let volunteer_str  = case.assigned_to.volunteer.map(encode_uuid);
    let assigned_str   = case.assigned_to.assigned_at.map(encode_dt);
    let contact_json   = serde_json::to_string(&case.contact_info)?;
    let created_str    = encode_dt(case.created_at);
    let updated_str    = encode_dt(case.updated_at);
    let revision       = i64::try_from(case.revision).unwrap_or(i64::MAX);
    let entries: Vec<_> = case.timeline.iter().map(encode_entry).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO cases (
             case_id, requester_id, animal_type, animal_details, location, images,
             status, emergency, ngo_id, volunteer_id, assigned_at, contact_info,
             created_at, updated_at, revision
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
          rusqlite::params![
            case_id_str,
            requester_str,
            animal_type,
            details_json,
            location_json,
            images_json,
            status_str,
            emergency,
            ngo_str,
            volunteer_str,
            assigned_str,
            contact_json,
            created_str,
            updated_str,
            revision,
          ],
        )?;
        for (seq, (status, timestamp, notes)) in entries.into_iter().enumerate() {
          tx.execute(
            "INSERT INTO timeline_entries (case_id, seq, status, timestamp, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![case_id_str, seq as i64, status, timestamp, notes],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn get_case(&self, id: Uuid) -> Result<Option<RescueCase>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| Ok(read_case(conn, &id_str)?))
      .await?;

    raw.map(RawCase::into_case).transpose()
  }

  async fn list_cases(&self, scope: CaseScope, filter: &CaseFilter) -> Result<Vec<RescueCase>> {
    let status_str = filter.status.map(|s| s.as_str());
    let emergency  = filter.emergency;
    let limit_val  = filter.limit.unwrap_or(100) as i64;
    let offset_val = filter.offset.unwrap_or(0) as i64;

    // Every scope binds ?3 so the parameter count stays fixed.
    let (scope_clause, scope_id): (&'static str, Option<String>) = match scope {
      CaseScope::All => ("?3 IS NULL", None),
      CaseScope::Requester(id) => ("requester_id = ?3", Some(encode_uuid(id))),
      CaseScope::Organization { organization_id, include_triage: true } => (
        "(ngo_id = ?3 OR (ngo_id IS NULL AND status = 'pending'))",
        Some(encode_uuid(organization_id)),
      ),
      CaseScope::Organization { organization_id, include_triage: false } => {
        ("ngo_id = ?3", Some(encode_uuid(organization_id)))
      }
      CaseScope::Volunteer(id) => ("volunteer_id = ?3", Some(encode_uuid(id))),
    };

    let raws: Vec<RawCase> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {cols} FROM cases
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL OR emergency = ?2)
             AND {scope_clause}
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?4 OFFSET ?5",
          cols = RawCase::COLUMNS,
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
          .query_map(
            rusqlite::params![status_str, emergency, scope_id, limit_val, offset_val],
            RawCase::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        for raw in &mut rows {
          raw.timeline = read_timeline(conn, &raw.case_id)?;
        }
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCase::into_case).collect()
  }

  async fn commit_case(&self, commit: CaseCommit) -> Result<Option<RescueCase>> {
    let case_id_str   = encode_uuid(commit.case_id);
    let expected      = i64::try_from(commit.expected_revision).unwrap_or(i64::MAX);
    let status_str    = commit.status.as_str();
    let ngo_str       = commit.assigned_to.ngo.map(encode_uuid);
    let volunteer_str = commit.assigned_to.volunteer.map(encode_uuid);
    let assigned_str  = commit.assigned_to.assigned_at.map(encode_dt);
    let updated_str   = encode_dt(commit.updated_at);
    let entries: Vec<_> = commit.append.iter().map(encode_entry).collect();
    let effect        = commit.volunteer;

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // An assignment only lands on an active volunteer of the case's
        // organization, checked under the same write lock.
        if let Some(VolunteerEffect::Assign(v)) = &effect {
          let eligible: bool = tx.query_row(
            "SELECT EXISTS (
               SELECT 1 FROM volunteers
               WHERE volunteer_id = ?1 AND status = 'active' AND organization_id = ?2
             )",
            rusqlite::params![encode_uuid(*v), ngo_str],
            |row| row.get(0),
          )?;
          if !eligible {
            return Ok(None);
          }
        }

        // Compare-and-set on the revision; zero rows means someone else won.
        let changed = tx.execute(
          "UPDATE cases
           SET status = ?1, ngo_id = ?2, volunteer_id = ?3, assigned_at = ?4,
               updated_at = ?5, revision = revision + 1
           WHERE case_id = ?6 AND revision = ?7",
          rusqlite::params![
            status_str,
            ngo_str,
            volunteer_str,
            assigned_str,
            updated_str,
            case_id_str,
            expected,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }

        let next_seq: i64 = tx.query_row(
          "SELECT COALESCE(MAX(seq), -1) + 1 FROM timeline_entries WHERE case_id = ?1",
          rusqlite::params![case_id_str],
          |row| row.get(0),
        )?;
        for (offset, (status, timestamp, notes)) in entries.into_iter().enumerate() {
          tx.execute(
            "INSERT INTO timeline_entries (case_id, seq, status, timestamp, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![case_id_str, next_seq + offset as i64, status, timestamp, notes],
          )?;
        }

        match effect {
          Some(VolunteerEffect::Assign(v)) => {
            tx.execute(
              "INSERT OR IGNORE INTO volunteer_active_cases (volunteer_id, case_id)
               VALUES (?1, ?2)",
              rusqlite::params![encode_uuid(v), case_id_str],
            )?;
          }
          Some(VolunteerEffect::Complete(v)) => {
            tx.execute(
              "DELETE FROM volunteer_active_cases WHERE volunteer_id = ?1 AND case_id = ?2",
              rusqlite::params![encode_uuid(v), case_id_str],
            )?;
            tx.execute(
              "UPDATE volunteers SET completed_rescues = completed_rescues + 1
               WHERE volunteer_id = ?1",
              rusqlite::params![encode_uuid(v)],
            )?;
          }
          Some(VolunteerEffect::Release(v)) => {
            tx.execute(
              "DELETE FROM volunteer_active_cases WHERE volunteer_id = ?1 AND case_id = ?2",
              rusqlite::params![encode_uuid(v), case_id_str],
            )?;
          }
          None => {}
        }

        let raw = read_case(&tx, &case_id_str)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawCase::into_case).transpose()
  }
}
