//! Per-document review records and their claim-level aggregate.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::status::ClaimStatus;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
  Pending,
  Approved,
  Rejected,
  /// Superseded by a resubmission; excluded from the aggregate.
  Replaced,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocumentKind {
  Image,
  Pdf,
}

impl DocumentKind {
  /// Infer from the URL's file extension, ignoring query and fragment.
  pub fn from_url(url: &str) -> Self {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if path.to_ascii_lowercase().ends_with(".pdf") {
      Self::Pdf
    } else {
      Self::Image
    }
  }
}

/// Last path segment of a URL, used as the document's display name.
pub fn display_name(url: &str) -> String {
  let path = url.split(['?', '#']).next().unwrap_or(url);
  path
    .trim_end_matches('/')
    .rsplit('/')
    .next()
    .filter(|s| !s.is_empty())
    .unwrap_or(url)
    .to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentApproval {
  pub document_id:  Uuid,
  pub claim_id:     Uuid,
  pub url:          String,
  pub kind:         DocumentKind,
  pub name:         String,
  pub status:       DocumentStatus,
  pub admin_notes:  Option<String>,
  pub reviewed_by:  Option<Uuid>,
  pub reviewed_at:  Option<DateTime<Utc>>,
  /// True only for rejected documents the requester may replace.
  pub can_resubmit: bool,
  pub created_at:   DateTime<Utc>,
}

impl DocumentApproval {
  /// A fresh `PENDING` record for one evidence URL.
  pub fn pending(claim_id: Uuid, url: &str) -> Self {
    Self {
      document_id:  Uuid::new_v4(),
      claim_id,
      url:          url.to_owned(),
      kind:         DocumentKind::from_url(url),
      name:         display_name(url),
      status:       DocumentStatus::Pending,
      admin_notes:  None,
      reviewed_by:  None,
      reviewed_at:  None,
      can_resubmit: false,
      created_at:   Utc::now(),
    }
  }

  pub(crate) fn record_review(
    &mut self,
    status: DocumentStatus,
    admin_id: Uuid,
    admin_notes: Option<String>,
  ) {
    self.status = status;
    self.admin_notes = admin_notes;
    self.reviewed_by = Some(admin_id);
    self.reviewed_at = Some(Utc::now());
    self.can_resubmit = status == DocumentStatus::Rejected;
  }
}

// ─── Ledger maintenance ──────────────────────────────────────────────────────

/// Changes that bring `ledger` back in line with a claim's edited evidence
/// list: a `PENDING` record for each URL with no live record, and the ids of
/// live records whose URL was removed.
pub fn realign(
  claim_id: Uuid,
  ledger: &[DocumentApproval],
  evidence: &[String],
) -> (Vec<DocumentApproval>, Vec<Uuid>) {
  let live: Vec<&DocumentApproval> = ledger
    .iter()
    .filter(|d| d.status != DocumentStatus::Replaced)
    .collect();

  let mut seen = HashSet::new();
  let added = evidence
    .iter()
    .filter(|url| seen.insert(*url))
    .filter(|url| !live.iter().any(|d| &d.url == *url))
    .map(|url| DocumentApproval::pending(claim_id, url))
    .collect();
  let removed = live
    .iter()
    .filter(|d| !evidence.contains(&d.url))
    .map(|d| d.document_id)
    .collect();
  (added, removed)
}

/// The rejected records that `uploads` new documents stand in for, one each,
/// in ledger order. Rejections beyond that stay and keep counting.
pub fn superseded_by(ledger: &[DocumentApproval], uploads: usize) -> Vec<Uuid> {
  ledger
    .iter()
    .filter(|d| d.status == DocumentStatus::Rejected && d.can_resubmit)
    .take(uploads)
    .map(|d| d.document_id)
    .collect()
}

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// What the ledger as a whole says about its claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  AllApproved,
  ResubmissionRequired,
  Undecided,
}

impl Verdict {
  /// Fold over every record of one claim. `REPLACED` records do not count.
  pub fn of<'a>(documents: impl IntoIterator<Item = &'a DocumentApproval>) -> Self {
    let mut any = false;
    let mut pending = false;
    let mut rejected = false;
    for doc in documents {
      match doc.status {
        DocumentStatus::Replaced => continue,
        DocumentStatus::Pending => pending = true,
        DocumentStatus::Rejected => rejected = true,
        DocumentStatus::Approved => {}
      }
      any = true;
    }
    match (any, pending, rejected) {
      (false, ..) | (true, true, _) => Self::Undecided,
      (true, false, true) => Self::ResubmissionRequired,
      (true, false, false) => Self::AllApproved,
    }
  }

  /// The claim status this verdict drives toward, with its audit note.
  pub fn target(self) -> Option<(ClaimStatus, &'static str)> {
    match self {
      Self::AllApproved => Some((ClaimStatus::Verified, "all documents approved")),
      Self::ResubmissionRequired => Some((
        ClaimStatus::ActionRequired,
        "some documents rejected; resubmission required",
      )),
      Self::Undecided => None,
    }
  }
}
