//! Claim status and the transition table.
//!
//! The table lives in [`ClaimStatus::allowed_transitions`]. Adding a state
//! means adding a variant and one match arm there.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Where a claim sits in the review workflow.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
  /// Submitted, not yet looked at. The only status the requester may edit in.
  Pending,
  UnderReview,
  /// Waiting on the requester to answer a document request.
  ActionRequired,
  PendingDocuments,
  /// Legacy approval state kept for older records; leads on to `Verified`.
  Approved,
  /// Ownership granted.
  Verified,
  Rejected,
  Archived,
}

impl ClaimStatus {
  /// Statuses reachable from `self` in a single step.
  pub fn allowed_transitions(self) -> &'static [ClaimStatus] {
    use ClaimStatus::*;
    match self {
      Pending => &[UnderReview, Rejected, Archived],
      Approved => &[Verified, Archived],
      UnderReview => &[ActionRequired, Verified, Rejected, Archived, Approved],
      ActionRequired => &[UnderReview, Rejected, Archived],
      PendingDocuments => &[UnderReview, ActionRequired, Rejected, Archived],
      Verified => &[Archived],
      Rejected => &[Archived],
      Archived => &[],
    }
  }

  pub fn can_transition_to(self, next: ClaimStatus) -> bool {
    self.allowed_transitions().contains(&next)
  }

  pub fn is_terminal(self) -> bool { self.allowed_transitions().is_empty() }

  /// A claim in one of these statuses blocks the same user from opening
  /// another claim on the same target.
  pub fn blocks_duplicate(self) -> bool {
    matches!(
      self,
      ClaimStatus::Pending | ClaimStatus::UnderReview | ClaimStatus::ActionRequired
    )
  }

  /// Review has concluded; the requester can no longer submit data.
  pub fn is_closed(self) -> bool {
    matches!(
      self,
      ClaimStatus::Verified | ClaimStatus::Rejected | ClaimStatus::Archived
    )
  }

  pub const ALL: [ClaimStatus; 8] = [
    ClaimStatus::Pending,
    ClaimStatus::UnderReview,
    ClaimStatus::ActionRequired,
    ClaimStatus::PendingDocuments,
    ClaimStatus::Approved,
    ClaimStatus::Verified,
    ClaimStatus::Rejected,
    ClaimStatus::Archived,
  ];
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn archived_is_the_only_terminal_status() {
    let terminal: Vec<_> =
      ClaimStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
    assert_eq!(terminal, vec![ClaimStatus::Archived]);
  }

  #[test]
  fn every_non_terminal_status_can_be_archived() {
    for s in ClaimStatus::ALL {
      if s != ClaimStatus::Archived {
        assert!(s.can_transition_to(ClaimStatus::Archived), "{s}");
      }
    }
  }

  #[test]
  fn no_status_transitions_to_itself() {
    for s in ClaimStatus::ALL {
      assert!(!s.can_transition_to(s), "{s}");
    }
  }

  #[test]
  fn pending_cannot_skip_to_verified() {
    assert!(!ClaimStatus::Pending.can_transition_to(ClaimStatus::Verified));
    assert!(!ClaimStatus::Pending.can_transition_to(ClaimStatus::ActionRequired));
  }

  #[test]
  fn verified_and_rejected_only_archive() {
    assert_eq!(
      ClaimStatus::Verified.allowed_transitions(),
      &[ClaimStatus::Archived]
    );
    assert_eq!(
      ClaimStatus::Rejected.allowed_transitions(),
      &[ClaimStatus::Archived]
    );
  }

  #[test]
  fn string_form_matches_serde() {
    assert_eq!(ClaimStatus::ActionRequired.as_ref(), "ACTION_REQUIRED");
    assert_eq!(
      ClaimStatus::from_str("PENDING_DOCUMENTS").unwrap(),
      ClaimStatus::PendingDocuments
    );
    assert_eq!(
      serde_json::to_string(&ClaimStatus::UnderReview).unwrap(),
      "\"UNDER_REVIEW\""
    );
  }
}
