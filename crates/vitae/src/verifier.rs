//! Verification service: issuer signature, digest consistency, expiry and
//! revocation.
//!
//! The signature is checked over a payload rebuilt from the presentation
//! before any presented manifest, status entry or expiry is relied on.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vitae_core::{Clock, CredentialId, CredentialVerifier};
use vitae_cred::{verify_presentation, ClaimMap, CredError, CredErrorDetail, Presentation};
use vitae_status::RevocationRegistry;

use crate::error::RootResult;

/// Outcome of checking a presentation that is internally consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub credential_id: CredentialId,
    /// Revealed claims together with the credential's plain claims.
    pub disclosed: ClaimMap,
    pub revoked: bool,
    pub expired: bool,
}

impl VerificationReport {
    /// Neither revoked nor expired.
    pub fn is_valid(&self) -> bool {
        !self.revoked && !self.expired
    }
}

pub struct Verifier {
    revocation: RevocationRegistry,
    clock: Arc<dyn Clock>,
    signatures: Arc<dyn CredentialVerifier>,
}

impl Verifier {
    pub fn new(
        revocation: RevocationRegistry,
        clock: Arc<dyn Clock>,
        signatures: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            revocation,
            clock,
            signatures,
        }
    }

    /// Check `presentation` against the manifest it carries. The manifest is
    /// covered by the issuer signature, which is checked first.
    pub fn verify(&self, presentation: &Presentation) -> RootResult<VerificationReport> {
        self.verify_against(presentation, &presentation.digest_manifest)
    }

    /// Check `presentation` against a manifest obtained out of band.
    pub fn verify_against(
        &self,
        presentation: &Presentation,
        manifest: &[String],
    ) -> RootResult<VerificationReport> {
        self.check_signature(presentation)?;
        if presentation.digest_manifest.as_slice() != manifest {
            return Err(mismatch(
                presentation,
                "manifest mismatch",
                "presented digest manifest differs from the expected one",
            )
            .into());
        }
        verify_presentation(presentation, manifest)?;

        let entry = presentation.status_entry.as_ref().ok_or_else(|| {
            mismatch(
                presentation,
                "missing status entry",
                "presentation names no status list to check",
            )
        })?;
        let revoked = self
            .revocation
            .check_status(&entry.status_list_id, entry.status_list_index)?;
        let expired = presentation.is_expired_at(self.clock.now());

        let report = VerificationReport {
            credential_id: presentation.credential_id.clone(),
            disclosed: presentation
                .plain_claims
                .iter()
                .chain(presentation.claims.iter())
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            revoked,
            expired,
        };
        if report.is_valid() {
            tracing::info!(
                credential_id = %report.credential_id,
                disclosed = report.disclosed.len(),
                "presentation verified"
            );
        } else {
            tracing::warn!(
                credential_id = %report.credential_id,
                revoked,
                expired,
                "presentation consistent but credential no longer valid"
            );
        }
        Ok(report)
    }

    /// Like `verify`, and additionally require the presentation to be bound
    /// to `audience` and `nonce`.
    pub fn verify_bound(
        &self,
        presentation: &Presentation,
        audience: &str,
        nonce: &str,
    ) -> RootResult<VerificationReport> {
        if presentation.audience.as_deref() != Some(audience) {
            return Err(mismatch(
                presentation,
                "audience mismatch",
                "presentation is bound to another audience",
            )
            .into());
        }
        if presentation.nonce.as_deref() != Some(nonce) {
            return Err(mismatch(
                presentation,
                "nonce mismatch",
                "presentation nonce does not match",
            )
            .into());
        }
        self.verify(presentation)
    }

    fn check_signature(&self, presentation: &Presentation) -> RootResult<()> {
        let proof = presentation.proof.as_ref().ok_or_else(|| {
            mismatch(presentation, "missing proof", "presentation carries no proof")
        })?;
        if proof.algorithm != self.signatures.algorithm() {
            return Err(mismatch(
                presentation,
                "algorithm mismatch",
                "proof algorithm is not the one this verifier checks",
            )
            .into());
        }
        let payload = presentation.signing_payload()?;
        if !self
            .signatures
            .verify(&presentation.issuer, &payload, &proof.signature)?
        {
            tracing::warn!(
                credential_id = %presentation.credential_id,
                issuer = %presentation.issuer,
                "presentation rejected: issuer signature does not match"
            );
            return Err(CredErrorDetail::new(
                CredError::SignatureInvalid,
                "issuer signature does not cover the presented fields",
            )
            .with_credential_id(presentation.credential_id.as_str())
            .into());
        }
        tracing::debug!(credential_id = %presentation.credential_id, "issuer signature verified");
        Ok(())
    }
}

fn mismatch(presentation: &Presentation, reason: &str, message: &str) -> CredErrorDetail {
    tracing::warn!(
        credential_id = %presentation.credential_id,
        reason,
        "presentation rejected"
    );
    CredErrorDetail::new(CredError::PresentationMismatch(reason.to_string()), message)
        .with_credential_id(presentation.credential_id.as_str())
}
