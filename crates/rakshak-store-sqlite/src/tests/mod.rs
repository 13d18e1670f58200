//! Integration tests for `SqliteStore` and the services running on top of it,
//! against an in-memory database.


use std::sync::Arc;

use rakshak_core::{
  case::{ContactInfo, Location, NewCase},
  lifecycle::{CaseService, LifecyclePolicy},
  principal::{
    NewOrganization, NewRequester, NewVolunteer, Principal, RequesterRole,
  },
  store::RescueStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn service() -> (Arc<SqliteStore>, CaseService<SqliteStore>) {
  let store = Arc::new(store().await);
  let service = CaseService::new(Arc::clone(&store), LifecyclePolicy::default());
  (store, service)
}

async fn requester(s: &SqliteStore, email: &str) -> Principal {
  let r = s
    .add_requester(NewRequester {
      name:          "Asha".into(),
      email:         email.into(),
      phone:         Some("9999999999".into()),
      role:          RequesterRole::User,
      password_hash: "x".into(),
    })
    .await
    .unwrap();
  Principal::Requester(r)
}

async fn admin(s: &SqliteStore) -> Principal {
  let r = s
    .add_requester(NewRequester {
      name:          "Root".into(),
      email:         "root@rakshak.test".into(),
      phone:         None,
      role:          RequesterRole::Admin,
      password_hash: "x".into(),
    })
    .await
    .unwrap();
  Principal::Requester(r)
}

async fn organization(s: &SqliteStore, name: &str) -> Principal {
  let o = s
    .add_organization(NewOrganization {
      name:          name.into(),
      email:         format!("{}@ngo.test", name.to_lowercase().replace(' ', "-")),
      password_hash: "x".into(),
    })
    .await
    .unwrap();
  Principal::Organization(o)
}

async fn volunteer(s: &SqliteStore, organization_id: Uuid, email: &str) -> Principal {
  let v = s
    .add_volunteer(NewVolunteer {
      organization_id,
      name: "Vikram".into(),
      email: email.into(),
      phone: None,
      password_hash: "x".into(),
    })
    .await
    .unwrap();
  Principal::Volunteer(v)
}

/// Re-read a volunteer principal so its active-case set is current.
async fn reload_volunteer(s: &SqliteStore, id: Uuid) -> rakshak_core::principal::Volunteer {
  s.get_volunteer(id).await.unwrap().expect("volunteer exists")
}

fn pune_dog() -> NewCase {
  NewCase {
    animal_type: "Dog".into(),
    location: Location {
      city: "Pune".into(),
      state: "MH".into(),
      ..Location::default()
    },
    contact_info: ContactInfo { name: None, phone: "9999999999".into() },
    ..NewCase::default()
  }
}
