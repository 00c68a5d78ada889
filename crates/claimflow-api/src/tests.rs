//! Router tests over an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use claimflow_core::ClaimService;
use claimflow_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{
  api_router,
  principal::{USER_ID, USER_NAME, USER_ROLE},
};

struct Caller {
  id:   Uuid,
  role: &'static str,
  name: &'static str,
}

impl Caller {
  fn new(role: &'static str, name: &'static str) -> Self {
    Self { id: Uuid::new_v4(), role, name }
  }
}

async fn app() -> Router {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  api_router(ClaimService::new(Arc::new(store)))
}

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  caller: Option<&Caller>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  if let Some(c) = caller {
    req = req
      .header(USER_ID, c.id.to_string())
      .header(USER_ROLE, c.role)
      .header(USER_NAME, c.name);
  }
  let req = match body {
    Some(b) => req
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(b.to_string()))
      .unwrap(),
    None => req.body(Body::empty()).unwrap(),
  };

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn institution(app: &Router, admin: &Caller) -> String {
  let (status, body) = send(
    app,
    "POST",
    "/institutions",
    Some(admin),
    Some(json!({ "kind": "institution", "name": "Northfield College" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["institution_id"].as_str().unwrap().to_owned()
}

async fn claim(app: &Router, requester: &Caller, institution_id: &str) -> String {
  let (status, body) = send(
    app,
    "POST",
    "/claims",
    Some(requester),
    Some(json!({
      "target_institution_id": institution_id,
      "requester_email": "alice@example.org",
      "position": "Registrar",
      "evidence": ["https://files.example.org/staff-card.jpg"],
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  assert_eq!(body["status"], "PENDING");
  body["claim_id"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/claims", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["kind"], "unauthorized");
}

#[tokio::test]
async fn review_flow_over_http() {
  let app = app().await;
  let admin = Caller::new("admin", "Ada");
  let alice = Caller::new("user", "Alice");
  let inst = institution(&app, &admin).await;
  let id = claim(&app, &alice, &inst).await;

  let (status, body) = send(
    &app,
    "POST",
    &format!("/claims/{id}/status"),
    Some(&admin),
    Some(json!({ "status": "UNDER_REVIEW", "audit_note": "starting review" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["audit_log"].as_array().unwrap().len(), 2);

  let (status, _) = send(
    &app,
    "POST",
    &format!("/claims/{id}/messages"),
    Some(&admin),
    Some(json!({
      "type": "DOCUMENT_REQUEST",
      "message": "Please confirm your staff number",
      "schema": {
        "title": "Staff verification",
        "fields": [
          { "name": "staff_id", "label": "Staff ID", "input": "text", "required": true }
        ],
      },
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (_, body) = send(&app, "GET", &format!("/claims/{id}"), Some(&alice), None).await;
  assert_eq!(body["status"], "ACTION_REQUIRED");

  let (status, body) = send(
    &app,
    "POST",
    &format!("/claims/{id}/submissions"),
    Some(&alice),
    Some(json!({ "submitted_data": { "staff_id": "NF-0042" } })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");

  let (status, docs) = send(
    &app,
    "GET",
    &format!("/claims/{id}/documents"),
    Some(&admin),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let doc_id = docs[0]["document_id"].as_str().unwrap().to_owned();
  assert_eq!(docs[0]["kind"], "image");

  let (status, body) = send(
    &app,
    "POST",
    &format!("/documents/{doc_id}/review"),
    Some(&admin),
    Some(json!({ "status": "APPROVED" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["status"], "APPROVED");

  let (_, body) = send(&app, "GET", &format!("/claims/{id}"), Some(&alice), None).await;
  assert_eq!(body["status"], "VERIFIED");
  assert_eq!(body["audit_log"].as_array().unwrap().len(), 5);

  let (_, body) = send(&app, "GET", &format!("/institutions/{inst}"), Some(&alice), None).await;
  assert_eq!(body["ownership"]["claimed_by"], alice.id.to_string());

  // Verified claims are frozen.
  let (status, body) = send(&app, "DELETE", &format!("/claims/{id}"), Some(&alice), None).await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["kind"], "invalid_state");
}

#[tokio::test]
async fn engine_errors_become_json() {
  let app = app().await;
  let admin = Caller::new("admin", "Ada");
  let alice = Caller::new("user", "Alice");
  let bob = Caller::new("user", "Bob");
  let inst = institution(&app, &admin).await;
  let id = claim(&app, &alice, &inst).await;

  let (status, body) = send(
    &app,
    "POST",
    &format!("/claims/{id}/status"),
    Some(&admin),
    Some(json!({ "status": "VERIFIED", "audit_note": "skip" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["kind"], "invalid_transition");

  let (status, body) = send(
    &app,
    "POST",
    &format!("/claims/{id}/status"),
    Some(&alice),
    Some(json!({ "status": "UNDER_REVIEW", "audit_note": "me" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["kind"], "forbidden");

  let (status, _) = send(&app, "GET", &format!("/claims/{id}"), Some(&bob), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = send(&app, "GET", &format!("/claims/{id}/documents"), Some(&bob), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = send(
    &app,
    "GET",
    &format!("/claims/{}", Uuid::new_v4()),
    Some(&admin),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["kind"], "not_found");

  let (status, body) = send(
    &app,
    "POST",
    "/claims",
    Some(&alice),
    Some(json!({
      "target_institution_id": inst,
      "requester_email": "alice@example.org",
      "position": "Registrar",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["kind"], "conflict");

  let (status, _) = send(&app, "GET", "/admin/claims", Some(&alice), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn requesters_never_see_admin_notes() {
  let app = app().await;
  let admin = Caller::new("admin", "Ada");
  let alice = Caller::new("user", "Alice");
  let inst = institution(&app, &admin).await;
  let id = claim(&app, &alice, &inst).await;

  send(
    &app,
    "POST",
    &format!("/claims/{id}/status"),
    Some(&admin),
    Some(json!({
      "status": "UNDER_REVIEW",
      "audit_note": "starting review",
      "admin_notes": "email domain does not match",
    })),
  )
  .await;

  let (_, body) = send(&app, "GET", &format!("/claims/{id}"), Some(&admin), None).await;
  assert_eq!(body["admin_notes"], "email domain does not match");

  let (_, body) = send(&app, "GET", &format!("/claims/{id}"), Some(&alice), None).await;
  assert!(body["admin_notes"].is_null());

  let (_, body) = send(
    &app,
    "GET",
    "/admin/claims?status=UNDER_REVIEW",
    Some(&admin),
    None,
  )
  .await;
  assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn requester_edits_then_withdraws() {
  let app = app().await;
  let admin = Caller::new("admin", "Ada");
  let alice = Caller::new("user", "Alice");
  let inst = institution(&app, &admin).await;
  let id = claim(&app, &alice, &inst).await;

  let (status, body) = send(
    &app,
    "PATCH",
    &format!("/claims/{id}"),
    Some(&alice),
    Some(json!({ "position": "Dean" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["position"], "Dean");

  let (status, _) = send(&app, "DELETE", &format!("/claims/{id}"), Some(&alice), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, body) = send(&app, "GET", "/claims", Some(&alice), None).await;
  assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn submissions_must_fill_the_requested_form() {
  let app = app().await;
  let admin = Caller::new("admin", "Ada");
  let alice = Caller::new("user", "Alice");
  let inst = institution(&app, &admin).await;
  let id = claim(&app, &alice, &inst).await;

  send(
    &app,
    "POST",
    &format!("/claims/{id}/status"),
    Some(&admin),
    Some(json!({ "status": "UNDER_REVIEW", "audit_note": "starting review" })),
  )
  .await;
  let (status, _) = send(
    &app,
    "POST",
    &format!("/claims/{id}/messages"),
    Some(&admin),
    Some(json!({
      "type": "DOCUMENT_REQUEST",
      "message": "Please confirm your staff number",
      "schema": {
        "title": "Staff verification",
        "fields": [
          { "name": "staff_id", "label": "Staff ID", "input": "text", "required": true }
        ],
      },
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, body) = send(
    &app,
    "POST",
    &format!("/claims/{id}/submissions"),
    Some(&alice),
    Some(json!({ "submitted_data": { "staff_id": "  " } })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "invalid_request");
  assert!(body["error"].as_str().unwrap().contains("staff_id"));

  let (_, body) = send(&app, "GET", &format!("/claims/{id}"), Some(&alice), None).await;
  assert_eq!(body["status"], "ACTION_REQUIRED");

  // Someone else's submission is refused by ownership, not by the form.
  let bob = Caller::new("user", "Bob");
  let (status, _) = send(
    &app,
    "POST",
    &format!("/claims/{id}/submissions"),
    Some(&bob),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}
