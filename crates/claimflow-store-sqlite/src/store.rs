//! [`SqliteStore`]: the SQLite implementation of [`ClaimStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use claimflow_core::{
  claim::{Claim, ClaimQuery},
  document::DocumentApproval,
  institution::{Institution, NewInstitution},
  message::ClaimMessage,
  store::{ClaimStore, ClaimWrite, CommitOutcome, DetailsEdit, StatusChange},
  user::User,
};

use crate::{
  Result,
  encode::{
    AUDIT_COLUMNS, AuditRow, CLAIM_COLUMNS, ClaimRow, DOCUMENT_COLUMNS,
    DocumentRow, INSTITUTION_COLUMNS, InstitutionRow, MESSAGE_COLUMNS,
    MessageRow, USER_COLUMNS, UserRow, decode_enum, decode_uuid, encode_dt,
    encode_list, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A claim store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
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

// ─── Row helpers (run on the database thread) ────────────────────────────────

fn read_audit(conn: &Connection, claim_id: &str) -> rusqlite::Result<Vec<AuditRow>> {
  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {AUDIT_COLUMNS} FROM audit_entries WHERE claim_id = ?1 ORDER BY seq"
  ))?;
  stmt
    .query_map(rusqlite::params![claim_id], AuditRow::read)?
    .collect()
}

fn insert_claim_row(conn: &Connection, row: &ClaimRow) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO claims ({CLAIM_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
    ),
    rusqlite::params![
      row.claim_id,
      row.target_kind,
      row.target_id,
      row.requester_id,
      row.requester_name,
      row.requester_email,
      row.institutional_email,
      row.position,
      row.comments,
      row.evidence,
      row.status,
      row.admin_notes,
      row.created_at,
      row.updated_at,
      row.expires_at,
      row.reviewed_by,
      row.reviewed_at,
    ],
  )?;
  Ok(())
}

fn insert_audit_row(conn: &Connection, row: &AuditRow) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO audit_entries ({AUDIT_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
    ),
    rusqlite::params![
      row.entry_id,
      row.claim_id,
      row.at,
      row.actor_id,
      row.actor_name,
      row.action,
      row.from_status,
      row.to_status,
      row.note,
    ],
  )?;
  Ok(())
}

fn insert_message_row(conn: &Connection, row: &MessageRow) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO messages ({MESSAGE_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    ),
    rusqlite::params![
      row.message_id,
      row.claim_id,
      row.sender_id,
      row.sender_role,
      row.body,
      row.attachments,
      row.kind,
      row.schema,
      row.submitted_data,
      row.documents,
      row.created_at,
    ],
  )?;
  Ok(())
}

fn insert_document_row(conn: &Connection, row: &DocumentRow) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO documents ({DOCUMENT_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    ),
    rusqlite::params![
      row.document_id,
      row.claim_id,
      row.url,
      row.kind,
      row.name,
      row.status,
      row.admin_notes,
      row.reviewed_by,
      row.reviewed_at,
      row.can_resubmit,
      row.created_at,
    ],
  )?;
  Ok(())
}

fn mark_replaced(conn: &Connection, document_id: &str, claim_id: &str) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE documents SET status = 'REPLACED', can_resubmit = 0
      WHERE document_id = ?1 AND claim_id = ?2",
    rusqlite::params![document_id, claim_id],
  )?;
  Ok(())
}

// ─── Commit bundle ───────────────────────────────────────────────────────────

/// A [`ClaimWrite`] pre-encoded into column strings so it can be moved onto
/// the database thread.
struct EncodedWrite {
  claim_id:           String,
  now:                String,
  message:            Option<MessageRow>,
  new_evidence:       Vec<String>,
  new_documents:      Vec<DocumentRow>,
  reviewed_document:  Option<DocumentRow>,
  replaced_documents: Vec<String>,
  transition:         Option<EncodedChange>,
}

struct EncodedChange {
  from:        String,
  to:          String,
  entry:       AuditRow,
  reviewed_by: Option<String>,
  reviewed_at: Option<String>,
  admin_notes: Option<String>,
  grant:       Option<EncodedGrant>,
}

struct EncodedGrant {
  target_kind: String,
  target_id:   String,
  claimed_by:  String,
  claimed_at:  String,
  claim_id:    String,
}

impl EncodedWrite {
  fn new(write: ClaimWrite) -> Result<Self> {
    let claim_id = write.claim_id;
    Ok(Self {
      claim_id:           encode_uuid(claim_id),
      now:                encode_dt(Utc::now()),
      message:            write.message.as_ref().map(MessageRow::encode).transpose()?,
      new_evidence:       write.new_evidence,
      new_documents:      write.new_documents.iter().map(DocumentRow::encode).collect(),
      reviewed_document:  write.reviewed_document.as_ref().map(DocumentRow::encode),
      replaced_documents: write.replaced_documents.into_iter().map(encode_uuid).collect(),
      transition:         write.transition.map(|c| EncodedChange::new(claim_id, c)),
    })
  }
}

impl EncodedChange {
  fn new(claim_id: Uuid, change: StatusChange) -> Self {
    Self {
      from:        change.from.as_ref().to_owned(),
      to:          change.to.as_ref().to_owned(),
      entry:       AuditRow::encode(claim_id, &change.entry),
      reviewed_by: change.review.map(|(id, _)| encode_uuid(id)),
      reviewed_at: change.review.map(|(_, at)| encode_dt(at)),
      admin_notes: change.admin_notes,
      grant:       change.grant.map(|g| EncodedGrant {
        target_kind: g.target.kind().as_ref().to_owned(),
        target_id:   encode_uuid(g.target.id()),
        claimed_by:  encode_uuid(g.ownership.claimed_by),
        claimed_at:  encode_dt(g.ownership.claimed_at),
        claim_id:    encode_uuid(g.ownership.claim_id),
      }),
    }
  }
}

/// [`CommitOutcome`] before its ids are decoded.
enum RawOutcome {
  Applied,
  ClaimMissing,
  TargetMissing,
  StatusChanged(String),
  DocumentChanged(String),
  OwnershipConflict(String),
}

fn apply_write(conn: &mut Connection, w: EncodedWrite) -> rusqlite::Result<RawOutcome> {
  let tx = conn.transaction()?;

  let current: Option<String> = tx
    .query_row(
      "SELECT status FROM claims WHERE claim_id = ?1",
      rusqlite::params![w.claim_id],
      |r| r.get(0),
    )
    .optional()?;
  let Some(current) = current else {
    return Ok(RawOutcome::ClaimMissing);
  };

  if let Some(change) = &w.transition {
    let updated = tx.execute(
      "UPDATE claims
          SET status      = ?2,
              reviewed_by = COALESCE(?3, reviewed_by),
              reviewed_at = COALESCE(?4, reviewed_at),
              admin_notes = COALESCE(?5, admin_notes)
        WHERE claim_id = ?1 AND status = ?6",
      rusqlite::params![
        w.claim_id,
        change.to,
        change.reviewed_by,
        change.reviewed_at,
        change.admin_notes,
        change.from,
      ],
    )?;
    if updated == 0 {
      return Ok(RawOutcome::StatusChanged(current));
    }
    insert_audit_row(&tx, &change.entry)?;

    if let Some(grant) = &change.grant {
      let granted = tx.execute(
        "UPDATE institutions
            SET claimed_by = ?3, claimed_at = ?4, claim_id = ?5
          WHERE institution_id = ?1 AND kind = ?2 AND claimed_by IS NULL",
        rusqlite::params![
          grant.target_id,
          grant.target_kind,
          grant.claimed_by,
          grant.claimed_at,
          grant.claim_id,
        ],
      )?;
      if granted == 0 {
        let owner: Option<Option<String>> = tx
          .query_row(
            "SELECT claimed_by FROM institutions WHERE institution_id = ?1 AND kind = ?2",
            rusqlite::params![grant.target_id, grant.target_kind],
            |r| r.get(0),
          )
          .optional()?;
        match owner {
          None | Some(None) => return Ok(RawOutcome::TargetMissing),
          Some(Some(owner)) if owner != grant.claimed_by => {
            return Ok(RawOutcome::OwnershipConflict(owner));
          }
          // Already owned by this requester; leave the original grant.
          Some(Some(_)) => {}
        }
      }
    }
  }

  if let Some(message) = &w.message {
    insert_message_row(&tx, message)?;
  }

  for url in &w.new_evidence {
    tx.execute(
      "UPDATE claims SET evidence = json_insert(evidence, '$[#]', ?2) WHERE claim_id = ?1",
      rusqlite::params![w.claim_id, url],
    )?;
  }

  for id in &w.replaced_documents {
    mark_replaced(&tx, id, &w.claim_id)?;
  }

  for doc in &w.new_documents {
    insert_document_row(&tx, doc)?;
  }

  if let Some(doc) = &w.reviewed_document {
    let reviewed = tx.execute(
      "UPDATE documents
          SET status = ?2, admin_notes = ?3, reviewed_by = ?4,
              reviewed_at = ?5, can_resubmit = ?6
        WHERE document_id = ?1 AND status = 'PENDING'",
      rusqlite::params![
        doc.document_id,
        doc.status,
        doc.admin_notes,
        doc.reviewed_by,
        doc.reviewed_at,
        doc.can_resubmit,
      ],
    )?;
    if reviewed == 0 {
      return Ok(RawOutcome::DocumentChanged(doc.document_id.clone()));
    }
  }

  tx.execute(
    "UPDATE claims SET updated_at = ?2 WHERE claim_id = ?1",
    rusqlite::params![w.claim_id, w.now],
  )?;

  tx.commit()?;
  Ok(RawOutcome::Applied)
}

// ─── ClaimStore impl ─────────────────────────────────────────────────────────

impl ClaimStore for SqliteStore {
  type Error = crate::Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn upsert_user(&self, user: User) -> Result<User> {
    let row = UserRow::encode(&user);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, display_name, email, role)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_id) DO UPDATE SET
             display_name = excluded.display_name,
             email        = excluded.email,
             role         = excluded.role",
          rusqlite::params![row.user_id, row.display_name, row.email, row.role],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<UserRow> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
              rusqlite::params![id_str],
              UserRow::read,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(UserRow::into_user).transpose()
  }

  // ── Institutions ──────────────────────────────────────────────────────────

  async fn add_institution(&self, input: NewInstitution) -> Result<Institution> {
    let institution = Institution {
      institution_id: Uuid::new_v4(),
      kind:           input.kind,
      name:           input.name,
      created_at:     Utc::now(),
      ownership:      None,
    };

    let id_str   = encode_uuid(institution.institution_id);
    let kind_str = institution.kind.as_ref().to_owned();
    let name     = institution.name.clone();
    let at_str   = encode_dt(institution.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO institutions (institution_id, kind, name, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, kind_str, name, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(institution)
  }

  async fn get_institution(&self, id: Uuid) -> Result<Option<Institution>> {
    let id_str = encode_uuid(id);

    let raw: Option<InstitutionRow> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {INSTITUTION_COLUMNS} FROM institutions WHERE institution_id = ?1"
              ),
              rusqlite::params![id_str],
              InstitutionRow::read,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(InstitutionRow::into_institution).transpose()
  }

  // ── Claims ────────────────────────────────────────────────────────────────

  async fn insert_claim(&self, claim: &Claim) -> Result<()> {
    let row = ClaimRow::encode(claim)?;
    let entries: Vec<AuditRow> = claim
      .audit_log
      .entries()
      .iter()
      .map(|e| AuditRow::encode(claim.claim_id, e))
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        insert_claim_row(&tx, &row)?;
        for entry in &entries {
          insert_audit_row(&tx, entry)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_claim(&self, id: Uuid) -> Result<Option<Claim>> {
    let id_str = encode_uuid(id);

    let raw: Option<(ClaimRow, Vec<AuditRow>)> = self
      .conn
      .call(move |conn| {
        let row = conn
          .query_row(
            &format!("SELECT {CLAIM_COLUMNS} FROM claims WHERE claim_id = ?1"),
            rusqlite::params![id_str],
            ClaimRow::read,
          )
          .optional()?;
        match row {
          Some(row) => {
            let audit = read_audit(conn, &id_str)?;
            Ok(Some((row, audit)))
          }
          None => Ok(None),
        }
      })
      .await?;

    raw.map(|(row, audit)| row.into_claim(audit)).transpose()
  }

  async fn list_claims(&self, query: &ClaimQuery) -> Result<Vec<Claim>> {
    let status_str    = query.status.map(|s| s.as_ref().to_owned());
    let requester_str = query.requester_id.map(encode_uuid);
    let target_kind   = query.target.map(|t| t.kind().as_ref().to_owned());
    let target_id     = query.target.map(|t| encode_uuid(t.id()));
    // SQLite treats a negative LIMIT as "no limit".
    let limit_val     = query.limit.map_or(-1, |l| l as i64);
    let offset_val    = query.offset.unwrap_or(0) as i64;

    let raws: Vec<(ClaimRow, Vec<AuditRow>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CLAIM_COLUMNS} FROM claims
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR requester_id = ?2)
              AND (?3 IS NULL OR (target_kind = ?3 AND target_id = ?4))
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?5 OFFSET ?6"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              status_str,
              requester_str,
              target_kind,
              target_id,
              limit_val,
              offset_val,
            ],
            ClaimRow::read,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
          let audit = read_audit(conn, &row.claim_id)?;
          out.push((row, audit));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(row, audit)| row.into_claim(audit))
      .collect()
  }

  async fn update_claim_details(&self, edit: DetailsEdit) -> Result<()> {
    let DetailsEdit { claim_id, details, entry, new_documents, replaced_documents } = edit;
    let id_str   = encode_uuid(claim_id);
    let evidence = encode_list(&details.evidence)?;
    let entry    = AuditRow::encode(claim_id, &entry);
    let now      = encode_dt(Utc::now());
    let added: Vec<DocumentRow> = new_documents.iter().map(DocumentRow::encode).collect();
    let replaced: Vec<String> = replaced_documents.into_iter().map(encode_uuid).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE claims
              SET requester_email = ?2, institutional_email = ?3, position = ?4,
                  comments = ?5, evidence = ?6, updated_at = ?7
            WHERE claim_id = ?1",
          rusqlite::params![
            id_str,
            details.requester_email,
            details.institutional_email,
            details.position,
            details.comments,
            evidence,
            now,
          ],
        )?;
        insert_audit_row(&tx, &entry)?;
        for id in &replaced {
          mark_replaced(&tx, id, &id_str)?;
        }
        for doc in &added {
          insert_document_row(&tx, doc)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_claim(&self, claim_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(claim_id);

    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for table in ["documents", "messages", "audit_entries"] {
          tx.execute(
            &format!("DELETE FROM {table} WHERE claim_id = ?1"),
            rusqlite::params![id_str],
          )?;
        }
        let n = tx.execute(
          "DELETE FROM claims WHERE claim_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(n > 0)
      })
      .await?;

    Ok(deleted)
  }

  async fn commit(&self, write: ClaimWrite) -> Result<CommitOutcome> {
    let encoded = EncodedWrite::new(write)?;

    let raw = self
      .conn
      .call(move |conn| Ok(apply_write(conn, encoded)?))
      .await?;

    Ok(match raw {
      RawOutcome::Applied => CommitOutcome::Applied,
      RawOutcome::ClaimMissing => CommitOutcome::ClaimMissing,
      RawOutcome::TargetMissing => CommitOutcome::TargetMissing,
      RawOutcome::StatusChanged(s) => CommitOutcome::StatusChanged {
        current: decode_enum("status", &s)?,
      },
      RawOutcome::DocumentChanged(id) => CommitOutcome::DocumentChanged {
        document_id: decode_uuid(&id)?,
      },
      RawOutcome::OwnershipConflict(owner) => CommitOutcome::OwnershipConflict {
        claimed_by: decode_uuid(&owner)?,
      },
    })
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn list_messages(&self, claim_id: Uuid) -> Result<Vec<ClaimMessage>> {
    let id_str = encode_uuid(claim_id);

    let raws: Vec<MessageRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages WHERE claim_id = ?1 ORDER BY seq"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], MessageRow::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(MessageRow::into_message).collect()
  }

  // ── Documents ─────────────────────────────────────────────────────────────

  async fn list_documents(&self, claim_id: Uuid) -> Result<Vec<DocumentApproval>> {
    let id_str = encode_uuid(claim_id);

    let raws: Vec<DocumentRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE claim_id = ?1 ORDER BY seq"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], DocumentRow::read)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(DocumentRow::into_document).collect()
  }

  async fn get_document(&self, id: Uuid) -> Result<Option<DocumentApproval>> {
    let id_str = encode_uuid(id);

    let raw: Option<DocumentRow> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE document_id = ?1"),
              rusqlite::params![id_str],
              DocumentRow::read,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(DocumentRow::into_document).transpose()
  }
}
