//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Enums are stored as their
//! `strum` string form. Lists and free-form maps are stored as compact JSON.
//! UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use claimflow_core::{
  audit::{AuditEntry, AuditLog},
  claim::{Claim, ClaimDetails, ClaimTarget},
  document::DocumentApproval,
  institution::{Institution, InstitutionKind, Ownership},
  message::{ClaimMessage, DataRequestSchema, MessageKind},
  user::User,
};
use rusqlite::Row;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Parse any `strum::EnumString` column.
pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::UnknownValue {
    column,
    value: s.to_owned(),
  })
}

// ─── JSON lists ──────────────────────────────────────────────────────────────

pub fn encode_list(items: &[String]) -> Result<String> {
  Ok(serde_json::to_string(items)?)
}

pub fn decode_list(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Users ───────────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, display_name, email, role";

/// Raw strings for one `users` row.
pub struct UserRow {
  pub user_id:      String,
  pub display_name: String,
  pub email:        Option<String>,
  pub role:         String,
}

impl UserRow {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:      row.get(0)?,
      display_name: row.get(1)?,
      email:        row.get(2)?,
      role:         row.get(3)?,
    })
  }

  pub fn encode(user: &User) -> Self {
    Self {
      user_id:      encode_uuid(user.user_id),
      display_name: user.display_name.clone(),
      email:        user.email.clone(),
      role:         user.role.as_ref().to_owned(),
    }
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:      decode_uuid(&self.user_id)?,
      display_name: self.display_name,
      email:        self.email,
      role:         decode_enum("role", &self.role)?,
    })
  }
}

// ─── Institutions ────────────────────────────────────────────────────────────

pub const INSTITUTION_COLUMNS: &str =
  "institution_id, kind, name, created_at, claimed_by, claimed_at, claim_id";

pub struct InstitutionRow {
  pub institution_id: String,
  pub kind:           String,
  pub name:           String,
  pub created_at:     String,
  pub claimed_by:     Option<String>,
  pub claimed_at:     Option<String>,
  pub claim_id:       Option<String>,
}

impl InstitutionRow {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      institution_id: row.get(0)?,
      kind:           row.get(1)?,
      name:           row.get(2)?,
      created_at:     row.get(3)?,
      claimed_by:     row.get(4)?,
      claimed_at:     row.get(5)?,
      claim_id:       row.get(6)?,
    })
  }

  pub fn into_institution(self) -> Result<Institution> {
    let ownership = match (self.claimed_by, self.claimed_at, self.claim_id) {
      (Some(by), Some(at), Some(claim)) => Some(Ownership {
        claimed_by: decode_uuid(&by)?,
        claimed_at: decode_dt(&at)?,
        claim_id:   decode_uuid(&claim)?,
      }),
      _ => None,
    };
    Ok(Institution {
      institution_id: decode_uuid(&self.institution_id)?,
      kind: decode_enum::<InstitutionKind>("kind", &self.kind)?,
      name: self.name,
      created_at: decode_dt(&self.created_at)?,
      ownership,
    })
  }
}

// ─── Claims ──────────────────────────────────────────────────────────────────

pub const CLAIM_COLUMNS: &str = "claim_id, target_kind, target_id, requester_id, \
   requester_name, requester_email, institutional_email, position, comments, \
   evidence, status, admin_notes, created_at, updated_at, expires_at, \
   reviewed_by, reviewed_at";

/// Raw strings for one `claims` row, without its audit log.
pub struct ClaimRow {
  pub claim_id:            String,
  pub target_kind:         String,
  pub target_id:           String,
  pub requester_id:        String,
  pub requester_name:      String,
  pub requester_email:     String,
  pub institutional_email: Option<String>,
  pub position:            String,
  pub comments:            Option<String>,
  pub evidence:            String,
  pub status:              String,
  pub admin_notes:         Option<String>,
  pub created_at:          String,
  pub updated_at:          String,
  pub expires_at:          String,
  pub reviewed_by:         Option<String>,
  pub reviewed_at:         Option<String>,
}

impl ClaimRow {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      claim_id:            row.get(0)?,
      target_kind:         row.get(1)?,
      target_id:           row.get(2)?,
      requester_id:        row.get(3)?,
      requester_name:      row.get(4)?,
      requester_email:     row.get(5)?,
      institutional_email: row.get(6)?,
      position:            row.get(7)?,
      comments:            row.get(8)?,
      evidence:            row.get(9)?,
      status:              row.get(10)?,
      admin_notes:         row.get(11)?,
      created_at:          row.get(12)?,
      updated_at:          row.get(13)?,
      expires_at:          row.get(14)?,
      reviewed_by:         row.get(15)?,
      reviewed_at:         row.get(16)?,
    })
  }

  pub fn encode(claim: &Claim) -> Result<Self> {
    Ok(Self {
      claim_id:            encode_uuid(claim.claim_id),
      target_kind:         claim.target.kind().as_ref().to_owned(),
      target_id:           encode_uuid(claim.target.id()),
      requester_id:        encode_uuid(claim.requester_id),
      requester_name:      claim.requester_name.clone(),
      requester_email:     claim.details.requester_email.clone(),
      institutional_email: claim.details.institutional_email.clone(),
      position:            claim.details.position.clone(),
      comments:            claim.details.comments.clone(),
      evidence:            encode_list(&claim.details.evidence)?,
      status:              claim.status.as_ref().to_owned(),
      admin_notes:         claim.admin_notes.clone(),
      created_at:          encode_dt(claim.created_at),
      updated_at:          encode_dt(claim.updated_at),
      expires_at:          encode_dt(claim.expires_at),
      reviewed_by:         claim.reviewed_by.map(encode_uuid),
      reviewed_at:         claim.reviewed_at.map(encode_dt),
    })
  }

  pub fn into_claim(self, audit: Vec<AuditRow>) -> Result<Claim> {
    let target_id = decode_uuid(&self.target_id)?;
    let target = match decode_enum::<InstitutionKind>("target_kind", &self.target_kind)? {
      InstitutionKind::Institution => ClaimTarget::Institution(target_id),
      InstitutionKind::Group => ClaimTarget::Group(target_id),
    };

    let entries = audit
      .into_iter()
      .map(AuditRow::into_entry)
      .collect::<Result<Vec<_>>>()?;

    Ok(Claim {
      claim_id: decode_uuid(&self.claim_id)?,
      target,
      requester_id: decode_uuid(&self.requester_id)?,
      requester_name: self.requester_name,
      details: ClaimDetails {
        requester_email:     self.requester_email,
        institutional_email: self.institutional_email,
        position:            self.position,
        comments:            self.comments,
        evidence:            decode_list(&self.evidence)?,
      },
      status: decode_enum("status", &self.status)?,
      admin_notes: self.admin_notes,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      expires_at: decode_dt(&self.expires_at)?,
      reviewed_by: decode_opt_uuid(self.reviewed_by)?,
      reviewed_at: decode_opt_dt(self.reviewed_at)?,
      audit_log: AuditLog::from_entries(entries),
    })
  }
}

// ─── Audit entries ───────────────────────────────────────────────────────────

pub const AUDIT_COLUMNS: &str = "entry_id, claim_id, at, actor_id, actor_name, \
   action, from_status, to_status, note";

pub struct AuditRow {
  pub entry_id:    String,
  pub claim_id:    String,
  pub at:          String,
  pub actor_id:    String,
  pub actor_name:  String,
  pub action:      String,
  pub from_status: Option<String>,
  pub to_status:   Option<String>,
  pub note:        Option<String>,
}

impl AuditRow {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:    row.get(0)?,
      claim_id:    row.get(1)?,
      at:          row.get(2)?,
      actor_id:    row.get(3)?,
      actor_name:  row.get(4)?,
      action:      row.get(5)?,
      from_status: row.get(6)?,
      to_status:   row.get(7)?,
      note:        row.get(8)?,
    })
  }

  pub fn encode(claim_id: Uuid, entry: &AuditEntry) -> Self {
    Self {
      entry_id:    encode_uuid(entry.entry_id),
      claim_id:    encode_uuid(claim_id),
      at:          encode_dt(entry.at),
      actor_id:    encode_uuid(entry.actor_id),
      actor_name:  entry.actor_name.clone(),
      action:      entry.action.clone(),
      from_status: entry.from_status.map(|s| s.as_ref().to_owned()),
      to_status:   entry.to_status.map(|s| s.as_ref().to_owned()),
      note:        entry.note.clone(),
    }
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      entry_id:    decode_uuid(&self.entry_id)?,
      at:          decode_dt(&self.at)?,
      actor_id:    decode_uuid(&self.actor_id)?,
      actor_name:  self.actor_name,
      action:      self.action,
      from_status: self
        .from_status
        .as_deref()
        .map(|s| decode_enum("from_status", s))
        .transpose()?,
      to_status:   self
        .to_status
        .as_deref()
        .map(|s| decode_enum("to_status", s))
        .transpose()?,
      note:        self.note,
    })
  }
}

// ─── Messages ────────────────────────────────────────────────────────────────

pub const MESSAGE_COLUMNS: &str = "message_id, claim_id, sender_id, sender_role, \
   body, attachments, kind, schema, submitted_data, documents, created_at";

pub struct MessageRow {
  pub message_id:     String,
  pub claim_id:       String,
  pub sender_id:      String,
  pub sender_role:    String,
  pub body:           String,
  pub attachments:    String,
  pub kind:           String,
  pub schema:         Option<String>,
  pub submitted_data: Option<String>,
  pub documents:      String,
  pub created_at:     String,
}

impl MessageRow {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:     row.get(0)?,
      claim_id:       row.get(1)?,
      sender_id:      row.get(2)?,
      sender_role:    row.get(3)?,
      body:           row.get(4)?,
      attachments:    row.get(5)?,
      kind:           row.get(6)?,
      schema:         row.get(7)?,
      submitted_data: row.get(8)?,
      documents:      row.get(9)?,
      created_at:     row.get(10)?,
    })
  }

  pub fn encode(message: &ClaimMessage) -> Result<Self> {
    Ok(Self {
      message_id:     encode_uuid(message.message_id),
      claim_id:       encode_uuid(message.claim_id),
      sender_id:      encode_uuid(message.sender_id),
      sender_role:    message.sender_role.as_ref().to_owned(),
      body:           message.body.clone(),
      attachments:    encode_list(&message.attachments)?,
      kind:           message.kind.discriminant().to_owned(),
      schema:         message
        .kind
        .schema()
        .map(serde_json::to_string)
        .transpose()?,
      submitted_data: message
        .submitted_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?,
      documents:      encode_list(&message.documents)?,
      created_at:     encode_dt(message.created_at),
    })
  }

  pub fn into_message(self) -> Result<ClaimMessage> {
    let schema = self
      .schema
      .as_deref()
      .map(serde_json::from_str::<DataRequestSchema>)
      .transpose()?;
    let submitted_data = self
      .submitted_data
      .as_deref()
      .map(serde_json::from_str::<Map<String, Value>>)
      .transpose()?;

    Ok(ClaimMessage {
      message_id: decode_uuid(&self.message_id)?,
      claim_id: decode_uuid(&self.claim_id)?,
      sender_id: decode_uuid(&self.sender_id)?,
      sender_role: decode_enum("sender_role", &self.sender_role)?,
      body: self.body,
      attachments: decode_list(&self.attachments)?,
      kind: decode_message_kind(&self.kind, schema)?,
      submitted_data,
      documents: decode_list(&self.documents)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Rebuild a [`MessageKind`] from its stored discriminant and schema column.
fn decode_message_kind(
  kind: &str,
  schema: Option<DataRequestSchema>,
) -> Result<MessageKind> {
  match (kind, schema) {
    ("CHAT", _) => Ok(MessageKind::Chat),
    ("INTERNAL_NOTE", _) => Ok(MessageKind::InternalNote),
    ("DOCUMENT_REQUEST", Some(schema)) => Ok(MessageKind::DocumentRequest { schema }),
    ("DOCUMENT_REQUEST", None) => Err(Error::MissingValue {
      column: "schema",
      kind:   kind.to_owned(),
    }),
    (other, _) => Err(Error::UnknownValue {
      column: "kind",
      value:  other.to_owned(),
    }),
  }
}

// ─── Documents ───────────────────────────────────────────────────────────────

pub const DOCUMENT_COLUMNS: &str = "document_id, claim_id, url, kind, name, \
   status, admin_notes, reviewed_by, reviewed_at, can_resubmit, created_at";

pub struct DocumentRow {
  pub document_id:  String,
  pub claim_id:     String,
  pub url:          String,
  pub kind:         String,
  pub name:         String,
  pub status:       String,
  pub admin_notes:  Option<String>,
  pub reviewed_by:  Option<String>,
  pub reviewed_at:  Option<String>,
  pub can_resubmit: bool,
  pub created_at:   String,
}

impl DocumentRow {
  pub fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id:  row.get(0)?,
      claim_id:     row.get(1)?,
      url:          row.get(2)?,
      kind:         row.get(3)?,
      name:         row.get(4)?,
      status:       row.get(5)?,
      admin_notes:  row.get(6)?,
      reviewed_by:  row.get(7)?,
      reviewed_at:  row.get(8)?,
      can_resubmit: row.get(9)?,
      created_at:   row.get(10)?,
    })
  }

  pub fn encode(doc: &DocumentApproval) -> Self {
    Self {
      document_id:  encode_uuid(doc.document_id),
      claim_id:     encode_uuid(doc.claim_id),
      url:          doc.url.clone(),
      kind:         doc.kind.as_ref().to_owned(),
      name:         doc.name.clone(),
      status:       doc.status.as_ref().to_owned(),
      admin_notes:  doc.admin_notes.clone(),
      reviewed_by:  doc.reviewed_by.map(encode_uuid),
      reviewed_at:  doc.reviewed_at.map(encode_dt),
      can_resubmit: doc.can_resubmit,
      created_at:   encode_dt(doc.created_at),
    }
  }

  pub fn into_document(self) -> Result<DocumentApproval> {
    Ok(DocumentApproval {
      document_id:  decode_uuid(&self.document_id)?,
      claim_id:     decode_uuid(&self.claim_id)?,
      url:          self.url,
      kind:         decode_enum("kind", &self.kind)?,
      name:         self.name,
      status:       decode_enum("status", &self.status)?,
      admin_notes:  self.admin_notes,
      reviewed_by:  decode_opt_uuid(self.reviewed_by)?,
      reviewed_at:  decode_opt_dt(self.reviewed_at)?,
      can_resubmit: self.can_resubmit,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}
