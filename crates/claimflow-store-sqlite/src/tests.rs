//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Utc;
use claimflow_core::{
  audit::{AuditEntry, AuditLog},
  claim::{Claim, ClaimDetails, ClaimQuery, ClaimTarget, expiry_from},
  document::{DocumentApproval, DocumentStatus},
  institution::{InstitutionKind, NewInstitution, Ownership},
  message::{ClaimMessage, DataRequestSchema, FieldInput, FormField, MessageKind},
  status::ClaimStatus,
  store::{
    ClaimStore, ClaimWrite, CommitOutcome, DetailsEdit, OwnershipGrant,
    StatusChange,
  },
  user::{Role, User},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn user(name: &str, role: Role) -> User {
  User {
    user_id:      Uuid::new_v4(),
    display_name: name.into(),
    email:        Some(format!("{}@example.org", name.to_lowercase())),
    role,
  }
}

async fn seeded_claim(s: &SqliteStore) -> (User, Claim) {
  let alice = s.upsert_user(user("Alice", Role::User)).await.unwrap();
  let inst = s
    .add_institution(NewInstitution {
      kind: InstitutionKind::Institution,
      name: "Northfield College".into(),
    })
    .await
    .unwrap();

  let now = Utc::now();
  let claim = Claim {
    claim_id:       Uuid::new_v4(),
    target:         ClaimTarget::Institution(inst.institution_id),
    requester_id:   alice.user_id,
    requester_name: alice.display_name.clone(),
    details:        ClaimDetails {
      requester_email:     "alice@example.org".into(),
      institutional_email: Some("alice@northfield.edu".into()),
      position:            "Registrar".into(),
      comments:            None,
      evidence:            vec!["https://files.example.org/id.pdf".into()],
    },
    status:         ClaimStatus::Pending,
    admin_notes:    None,
    created_at:     now,
    updated_at:     now,
    expires_at:     expiry_from(now),
    reviewed_by:    None,
    reviewed_at:    None,
    audit_log:      AuditLog::from_entries(vec![AuditEntry {
      to_status: Some(ClaimStatus::Pending),
      ..AuditEntry::action(&alice, "claim created")
    }]),
  };
  s.insert_claim(&claim).await.unwrap();
  (alice, claim)
}

fn change(actor: &User, from: ClaimStatus, to: ClaimStatus) -> StatusChange {
  StatusChange {
    from,
    to,
    entry: AuditEntry::transition(actor, from, to, "test"),
    review: Some((actor.user_id, Utc::now())),
    admin_notes: None,
    grant: None,
  }
}

// ─── Users and institutions ──────────────────────────────────────────────────

#[tokio::test]
async fn upsert_user_refreshes_existing_row() {
  let s = store().await;
  let mut bob = s.upsert_user(user("Bob", Role::User)).await.unwrap();

  bob.display_name = "Robert".into();
  bob.role = Role::Admin;
  s.upsert_user(bob.clone()).await.unwrap();

  let fetched = s.get_user(bob.user_id).await.unwrap().unwrap();
  assert_eq!(fetched, bob);
}

#[tokio::test]
async fn get_user_missing_returns_none() {
  let s = store().await;
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn add_and_get_institution() {
  let s = store().await;
  let inst = s
    .add_institution(NewInstitution {
      kind: InstitutionKind::Group,
      name: "Riverside Schools".into(),
    })
    .await
    .unwrap();

  let fetched = s.get_institution(inst.institution_id).await.unwrap().unwrap();
  assert_eq!(fetched.kind, InstitutionKind::Group);
  assert_eq!(fetched.name, "Riverside Schools");
  assert!(fetched.ownership.is_none());
}

// ─── Claims ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_claim_round_trips_audit_log() {
  let s = store().await;
  let (alice, claim) = seeded_claim(&s).await;

  let fetched = s.get_claim(claim.claim_id).await.unwrap().unwrap();
  assert_eq!(fetched.requester_id, alice.user_id);
  assert_eq!(fetched.status, ClaimStatus::Pending);
  assert_eq!(fetched.target, claim.target);
  assert_eq!(fetched.details, claim.details);
  assert_eq!(fetched.audit_log.len(), 1);
  assert_eq!(fetched.audit_log.entries()[0].action, "claim created");
}

#[tokio::test]
async fn list_claims_filters_by_status_and_requester() {
  let s = store().await;
  let (alice, first) = seeded_claim(&s).await;
  let (_, second) = seeded_claim(&s).await;

  let outcome = s
    .commit(ClaimWrite {
      transition: Some(change(&alice, ClaimStatus::Pending, ClaimStatus::UnderReview)),
      ..ClaimWrite::new(second.claim_id)
    })
    .await
    .unwrap();
  assert_eq!(outcome, CommitOutcome::Applied);

  let all = s.list_claims(&ClaimQuery::default()).await.unwrap();
  assert_eq!(all.len(), 2);

  let pending = s
    .list_claims(&ClaimQuery {
      status: Some(ClaimStatus::Pending),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].claim_id, first.claim_id);

  let mine = s
    .list_claims(&ClaimQuery {
      requester_id: Some(alice.user_id),
      target: Some(first.target),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(mine.len(), 1);

  let page = s
    .list_claims(&ClaimQuery {
      limit: Some(1),
      offset: Some(1),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn update_claim_details_appends_audit_entry() {
  let s = store().await;
  let (alice, claim) = seeded_claim(&s).await;

  let mut details = claim.details.clone();
  details.position = "Head Registrar".into();
  s.update_claim_details(DetailsEdit {
    claim_id: claim.claim_id,
    details,
    entry: AuditEntry::action(&alice, "claim updated by requester"),
    new_documents: Vec::new(),
    replaced_documents: Vec::new(),
  })
  .await
  .unwrap();

  let fetched = s.get_claim(claim.claim_id).await.unwrap().unwrap();
  assert_eq!(fetched.details.position, "Head Registrar");
  assert_eq!(fetched.audit_log.len(), 2);
  assert!(fetched.updated_at >= claim.updated_at);
}

#[tokio::test]
async fn update_claim_details_carries_ledger_changes() {
  let s = store().await;
  let (alice, claim) = seeded_claim(&s).await;

  let original =
    DocumentApproval::pending(claim.claim_id, "https://files.example.org/id.pdf");
  s.commit(ClaimWrite {
    new_documents: vec![original.clone()],
    ..ClaimWrite::new(claim.claim_id)
  })
  .await
  .unwrap();

  let letter = "https://files.example.org/letter.pdf";
  let mut details = claim.details.clone();
  details.evidence = vec![letter.into()];
  s.update_claim_details(DetailsEdit {
    claim_id: claim.claim_id,
    details,
    entry: AuditEntry::action(&alice, "claim updated by requester"),
    new_documents: vec![DocumentApproval::pending(claim.claim_id, letter)],
    replaced_documents: vec![original.document_id],
  })
  .await
  .unwrap();

  let docs = s.list_documents(claim.claim_id).await.unwrap();
  let ledger: Vec<(&str, DocumentStatus)> =
    docs.iter().map(|d| (d.url.as_str(), d.status)).collect();
  assert_eq!(
    ledger,
    [
      ("https://files.example.org/id.pdf", DocumentStatus::Replaced),
      (letter, DocumentStatus::Pending),
    ]
  );
}

#[tokio::test]
async fn delete_claim_removes_dependents() {
  let s = store().await;
  let (_, claim) = seeded_claim(&s).await;

  let mut write = ClaimWrite::new(claim.claim_id);
  write.new_documents = vec![DocumentApproval::pending(
    claim.claim_id,
    "https://files.example.org/id.pdf",
  )];
  s.commit(write).await.unwrap();

  assert!(s.delete_claim(claim.claim_id).await.unwrap());
  assert!(s.get_claim(claim.claim_id).await.unwrap().is_none());
  assert!(s.list_documents(claim.claim_id).await.unwrap().is_empty());
  assert!(!s.delete_claim(claim.claim_id).await.unwrap());
}

// ─── Commit ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn commit_on_missing_claim() {
  let s = store().await;
  let outcome = s.commit(ClaimWrite::new(Uuid::new_v4())).await.unwrap();
  assert_eq!(outcome, CommitOutcome::ClaimMissing);
}

#[tokio::test]
async fn commit_with_stale_status_rolls_back() {
  let s = store().await;
  let (alice, claim) = seeded_claim(&s).await;

  let mut write = ClaimWrite::new(claim.claim_id);
  write.transition = Some(change(&alice, ClaimStatus::UnderReview, ClaimStatus::Verified));
  write.new_evidence = vec!["https://files.example.org/extra.png".into()];

  let outcome = s.commit(write).await.unwrap();
  assert_eq!(outcome, CommitOutcome::StatusChanged {
    current: ClaimStatus::Pending,
  });

  let fetched = s.get_claim(claim.claim_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, ClaimStatus::Pending);
  assert_eq!(fetched.audit_log.len(), 1);
  assert_eq!(fetched.details.evidence.len(), 1);
}

#[tokio::test]
async fn commit_appends_message_and_evidence_with_transition() {
  let s = store().await;
  let (alice, claim) = seeded_claim(&s).await;

  let schema = DataRequestSchema {
    title:       "Proof of employment".into(),
    description: None,
    fields:      vec![FormField {
      name:     "staff_id".into(),
      label:    "Staff ID".into(),
      input:    FieldInput::Text,
      required: true,
      options:  None,
    }],
  };
  let message = ClaimMessage {
    message_id:     Uuid::new_v4(),
    claim_id:       claim.claim_id,
    sender_id:      alice.user_id,
    sender_role:    Role::User,
    body:           "please provide".into(),
    attachments:    Vec::new(),
    kind:           MessageKind::DocumentRequest { schema },
    submitted_data: None,
    documents:      Vec::new(),
    created_at:     Utc::now(),
  };

  let mut write = ClaimWrite::new(claim.claim_id);
  write.message = Some(message.clone());
  write.new_evidence = vec!["https://files.example.org/badge.jpg".into()];
  write.transition = Some(change(&alice, ClaimStatus::Pending, ClaimStatus::UnderReview));
  assert_eq!(s.commit(write).await.unwrap(), CommitOutcome::Applied);

  let fetched = s.get_claim(claim.claim_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, ClaimStatus::UnderReview);
  assert_eq!(fetched.reviewed_by, Some(alice.user_id));
  assert_eq!(fetched.details.evidence, vec![
    "https://files.example.org/id.pdf".to_owned(),
    "https://files.example.org/badge.jpg".to_owned(),
  ]);
  let last = fetched.audit_log.last().unwrap();
  assert_eq!(last.from_status, Some(ClaimStatus::Pending));
  assert_eq!(last.to_status, Some(ClaimStatus::UnderReview));

  let messages = s.list_messages(claim.claim_id).await.unwrap();
  assert_eq!(messages.len(), 1);
  assert_eq!(messages[0].kind, message.kind);
}

#[tokio::test]
async fn commit_grants_ownership_once() {
  let s = store().await;
  let (alice, claim) = seeded_claim(&s).await;
  s.commit(ClaimWrite {
    transition: Some(change(&alice, ClaimStatus::Pending, ClaimStatus::UnderReview)),
    ..ClaimWrite::new(claim.claim_id)
  })
  .await
  .unwrap();

  let grant = OwnershipGrant {
    target:    claim.target,
    ownership: Ownership {
      claimed_by: alice.user_id,
      claimed_at: Utc::now(),
      claim_id:   claim.claim_id,
    },
  };
  let mut verify = change(&alice, ClaimStatus::UnderReview, ClaimStatus::Verified);
  verify.grant = Some(grant);
  let outcome = s
    .commit(ClaimWrite {
      transition: Some(verify),
      ..ClaimWrite::new(claim.claim_id)
    })
    .await
    .unwrap();
  assert_eq!(outcome, CommitOutcome::Applied);

  let inst = s.get_institution(claim.target.id()).await.unwrap().unwrap();
  let ownership = inst.ownership.unwrap();
  assert_eq!(ownership.claimed_by, alice.user_id);
  assert_eq!(ownership.claim_id, claim.claim_id);
}

#[tokio::test]
async fn commit_grant_conflict_rolls_back_transition() {
  let s = store().await;
  let (alice, claim) = seeded_claim(&s).await;
  let mallory = s.upsert_user(user("Mallory", Role::User)).await.unwrap();

  // Someone else already owns the target.
  let mut first = change(&alice, ClaimStatus::Pending, ClaimStatus::UnderReview);
  first.grant = Some(OwnershipGrant {
    target:    claim.target,
    ownership: Ownership {
      claimed_by: mallory.user_id,
      claimed_at: Utc::now(),
      claim_id:   Uuid::new_v4(),
    },
  });
  s.commit(ClaimWrite {
    transition: Some(first),
    ..ClaimWrite::new(claim.claim_id)
  })
  .await
  .unwrap();

  let mut verify = change(&alice, ClaimStatus::UnderReview, ClaimStatus::Verified);
  verify.grant = Some(OwnershipGrant {
    target:    claim.target,
    ownership: Ownership {
      claimed_by: alice.user_id,
      claimed_at: Utc::now(),
      claim_id:   claim.claim_id,
    },
  });
  let outcome = s
    .commit(ClaimWrite {
      transition: Some(verify),
      ..ClaimWrite::new(claim.claim_id)
    })
    .await
    .unwrap();
  assert_eq!(outcome, CommitOutcome::OwnershipConflict {
    claimed_by: mallory.user_id,
  });

  let fetched = s.get_claim(claim.claim_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, ClaimStatus::UnderReview);
  assert_eq!(fetched.audit_log.len(), 2);
}

#[tokio::test]
async fn reviewed_document_must_still_be_pending() {
  let s = store().await;
  let (alice, claim) = seeded_claim(&s).await;

  let doc = DocumentApproval::pending(claim.claim_id, "https://files.example.org/id.pdf");
  s.commit(ClaimWrite {
    new_documents: vec![doc.clone()],
    ..ClaimWrite::new(claim.claim_id)
  })
  .await
  .unwrap();

  let mut approved = doc.clone();
  approved.status = DocumentStatus::Approved;
  approved.reviewed_by = Some(alice.user_id);
  approved.reviewed_at = Some(Utc::now());
  let outcome = s
    .commit(ClaimWrite {
      reviewed_document: Some(approved.clone()),
      ..ClaimWrite::new(claim.claim_id)
    })
    .await
    .unwrap();
  assert_eq!(outcome, CommitOutcome::Applied);

  let again = s
    .commit(ClaimWrite {
      reviewed_document: Some(approved),
      ..ClaimWrite::new(claim.claim_id)
    })
    .await
    .unwrap();
  assert_eq!(again, CommitOutcome::DocumentChanged {
    document_id: doc.document_id,
  });

  let stored = s.get_document(doc.document_id).await.unwrap().unwrap();
  assert_eq!(stored.status, DocumentStatus::Approved);
  assert_eq!(stored.reviewed_by, Some(alice.user_id));
}

#[tokio::test]
async fn replaced_documents_are_marked() {
  let s = store().await;
  let (_, claim) = seeded_claim(&s).await;

  let mut rejected =
    DocumentApproval::pending(claim.claim_id, "https://files.example.org/id.pdf");
  rejected.status = DocumentStatus::Rejected;
  rejected.can_resubmit = true;
  s.commit(ClaimWrite {
    new_documents: vec![rejected.clone()],
    ..ClaimWrite::new(claim.claim_id)
  })
  .await
  .unwrap();

  let fresh = DocumentApproval::pending(claim.claim_id, "https://files.example.org/id-v2.pdf");
  s.commit(ClaimWrite {
    new_documents: vec![fresh.clone()],
    replaced_documents: vec![rejected.document_id],
    ..ClaimWrite::new(claim.claim_id)
  })
  .await
  .unwrap();

  let docs = s.list_documents(claim.claim_id).await.unwrap();
  assert_eq!(docs.len(), 2);
  assert_eq!(docs[0].status, DocumentStatus::Replaced);
  assert!(!docs[0].can_resubmit);
  assert_eq!(docs[1].document_id, fresh.document_id);
  assert_eq!(docs[1].status, DocumentStatus::Pending);
}

#[tokio::test]
async fn audit_entries_cannot_be_rewritten() {
  let s = store().await;
  let (_, claim) = seeded_claim(&s).await;

  let result = s
    .conn
    .call(|conn| {
      conn.execute("UPDATE audit_entries SET note = 'forged'", [])?;
      Ok(())
    })
    .await;
  assert!(result.is_err());

  let fetched = s.get_claim(claim.claim_id).await.unwrap().unwrap();
  assert_eq!(fetched.audit_log.entries()[0].note, None);
}

#[tokio::test]
async fn unknown_message_kind_is_a_decode_error() {
  let s = store().await;
  let (alice, claim) = seeded_claim(&s).await;

  let claim_id = claim.claim_id.to_string();
  let sender_id = alice.user_id.to_string();
  s.conn
    .call(move |conn| {
      conn.execute(
        "INSERT INTO messages
           (message_id, claim_id, sender_id, sender_role, body, kind, created_at)
         VALUES (?1, ?2, ?3, 'user', 'hello', 'BROADCAST', ?4)",
        rusqlite::params![
          Uuid::new_v4().to_string(),
          claim_id,
          sender_id,
          Utc::now().to_rfc3339(),
        ],
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let result = s.list_messages(claim.claim_id).await;
  assert!(matches!(
    result,
    Err(Error::UnknownValue { column: "kind", ref value }) if value == "BROADCAST"
  ));
}
