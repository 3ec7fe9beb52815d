//! Four-state credential lifecycle.
//!
//! States: Pending, Active, Revoked, Expired
//! Terminal states: Revoked, Expired
//!
//! Valid transitions:
//!   Pending -> Active (signed)
//!   Pending -> Revoked
//!   Active -> Revoked
//!   Active -> Expired
//!
//! Expiry by time is normally computed from `expires_at` rather than stored;
//! the Active -> Expired edge exists for stores that materialize it.

use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::types::CredentialStatus;

pub fn is_valid_transition(from: CredentialStatus, to: CredentialStatus) -> bool {
    matches!(
        (from, to),
        (CredentialStatus::Pending, CredentialStatus::Active)
            | (CredentialStatus::Pending, CredentialStatus::Revoked)
            | (CredentialStatus::Active, CredentialStatus::Revoked)
            | (CredentialStatus::Active, CredentialStatus::Expired)
    )
}

/// Attempt a status transition, returning the new status or an error.
pub fn transition(from: CredentialStatus, to: CredentialStatus) -> CredResult<CredentialStatus> {
    if is_valid_transition(from, to) {
        Ok(to)
    } else {
        Err(CredErrorDetail::new(
            CredError::StatusTransitionDenied(format!("{} -> {}", from, to)),
            format!("transition from {} to {} is not allowed", from, to),
        ))
    }
}

/// Only an active credential can be presented.
pub fn can_present(status: CredentialStatus) -> bool {
    status == CredentialStatus::Active
}

pub fn can_revoke(status: CredentialStatus) -> bool {
    matches!(status, CredentialStatus::Pending | CredentialStatus::Active)
}

/// Transition to Revoked. Idempotent: an already revoked credential stays revoked.
pub fn transition_to_revoked(current: CredentialStatus) -> CredResult<CredentialStatus> {
    if current == CredentialStatus::Revoked {
        return Ok(CredentialStatus::Revoked);
    }
    if !can_revoke(current) {
        return Err(CredErrorDetail::new(
            CredError::StatusTransitionDenied(format!("cannot revoke from {}", current)),
            format!("credential in {} state cannot be revoked", current),
        ));
    }
    transition(current, CredentialStatus::Revoked)
}
