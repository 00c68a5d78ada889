//! Messages exchanged on a claim's thread.
//!
//! A message is chat, an internal reviewer note, or a document request.
//! Only the document-request variant carries a form schema, so a request
//! without one cannot be represented.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result, user::Role};

// ─── Form schema ─────────────────────────────────────────────────────────────

/// Input widget requested for a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldInput {
  Text,
  Textarea,
  Email,
  Url,
  Number,
  Date,
  Select,
  /// Satisfied by uploading a document rather than a value.
  File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
  pub name:     String,
  pub label:    String,
  pub input:    FieldInput,
  #[serde(default)]
  pub required: bool,
  /// Choices for `select` fields.
  pub options:  Option<Vec<String>>,
}

/// The form a reviewer asks the requester to fill in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequestSchema {
  pub title:       String,
  pub description: Option<String>,
  pub fields:      Vec<FormField>,
}

impl DataRequestSchema {
  pub fn validate(&self) -> Result<()> {
    if self.title.trim().is_empty() {
      return Err(Error::InvalidRequest(
        "document request needs a title".into(),
      ));
    }
    if self.fields.is_empty() {
      return Err(Error::InvalidRequest(
        "document request needs at least one field".into(),
      ));
    }
    let mut seen = std::collections::HashSet::new();
    for field in &self.fields {
      if field.name.trim().is_empty() {
        return Err(Error::InvalidRequest("field name must not be empty".into()));
      }
      if !seen.insert(field.name.as_str()) {
        return Err(Error::InvalidRequest(format!(
          "duplicate field name {:?}",
          field.name
        )));
      }
      if field.input == FieldInput::Select
        && field.options.as_ref().is_none_or(|o| o.is_empty())
      {
        return Err(Error::InvalidRequest(format!(
          "select field {:?} needs options",
          field.name
        )));
      }
    }
    Ok(())
  }

  /// Names of required fields that `data` (plus any uploaded documents)
  /// leaves unanswered.
  pub fn missing_required<'a>(
    &'a self,
    data: &Map<String, Value>,
    has_documents: bool,
  ) -> Vec<&'a str> {
    self
      .fields
      .iter()
      .filter(|f| f.required)
      .filter(|f| {
        if f.input == FieldInput::File && has_documents {
          return false;
        }
        match data.get(&f.name) {
          None | Some(Value::Null) => true,
          Some(Value::String(s)) => s.trim().is_empty(),
          Some(_) => false,
        }
      })
      .map(|f| f.name.as_str())
      .collect()
  }
}

// ─── Kind ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
  Chat,
  DocumentRequest { schema: DataRequestSchema },
  /// Visible to administrators only.
  InternalNote,
}

impl MessageKind {
  /// The discriminant string stored alongside the message.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::Chat => "CHAT",
      Self::DocumentRequest { .. } => "DOCUMENT_REQUEST",
      Self::InternalNote => "INTERNAL_NOTE",
    }
  }

  pub fn schema(&self) -> Option<&DataRequestSchema> {
    match self {
      Self::DocumentRequest { schema } => Some(schema),
      _ => None,
    }
  }
}

// ─── Message ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimMessage {
  pub message_id:     Uuid,
  pub claim_id:       Uuid,
  pub sender_id:      Uuid,
  /// The sender's role when the message was sent.
  pub sender_role:    Role,
  pub body:           String,
  #[serde(default)]
  pub attachments:    Vec<String>,
  #[serde(flatten)]
  pub kind:           MessageKind,
  /// Answers to a prior document request.
  pub submitted_data: Option<Map<String, Value>>,
  /// Evidence uploaded with a submission.
  #[serde(default)]
  pub documents:      Vec<String>,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::service::ClaimService::post_message`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
  #[serde(rename = "message")]
  pub body:        String,
  #[serde(default)]
  pub attachments: Vec<String>,
  #[serde(flatten)]
  pub kind:        MessageKind,
}

/// Input to [`crate::service::ClaimService::submit_data`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
  #[serde(default)]
  pub submitted_data: Map<String, Value>,
  #[serde(default)]
  pub documents:      Vec<String>,
  /// Optional covering text; a default is used when absent.
  pub message:        Option<String>,
}
