use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vitae_core::{ClaimType, CredentialId, EventId, StatusEntry, WalletAddress};

use crate::claims::{Claim, ClaimMap};
use crate::disclosure_set::DisclosureSet;
use crate::error::{CredError, CredErrorDetail, CredResult, ValidationErrors};
use crate::registry::ClaimTypeRegistry;
use crate::status::{transition, transition_to_revoked};

// ---------------------------------------------------------------------------
// CredentialStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Pending,
    Active,
    Revoked,
    Expired,
}

impl CredentialStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked | Self::Expired)
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Revoked => write!(f, "revoked"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

// ---------------------------------------------------------------------------
// CredentialProof: caller-supplied signature, recorded verbatim
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialProof {
    pub signature: String,
    pub algorithm: String,
    pub created: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// An issued credential. Owns its claims and disclosures; `source_event_ids`
/// are references into the timeline and are never dereferenced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: CredentialId,
    pub issuer: WalletAddress,
    pub subject: WalletAddress,
    pub claim_type: ClaimType,
    pub claims: ClaimMap,
    pub disclosures: DisclosureSet,
    pub source_event_ids: Vec<EventId>,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub status: CredentialStatus,
    /// Revocation index. Set when the credential was registered in a status list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_entry: Option<StatusEntry>,
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<CredentialProof>,
}

/// The signed portion of a credential. Selectively disclosable values enter
/// only through `digest_manifest`, so a presentation carries everything
/// needed to rebuild these bytes.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SigningView<'a> {
    pub id: &'a CredentialId,
    pub issuer: &'a WalletAddress,
    pub subject: &'a WalletAddress,
    pub claim_type: &'a ClaimType,
    pub plain_claims: &'a ClaimMap,
    pub digest_manifest: &'a [String],
    pub source_event_ids: &'a [EventId],
    pub issued_at: &'a DateTime<Utc>,
    pub expires_at: &'a Option<DateTime<Utc>>,
    pub status_entry: &'a Option<StatusEntry>,
    pub schema_version: u32,
}

impl SigningView<'_> {
    pub(crate) fn to_bytes(&self) -> CredResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|_| {
            CredErrorDetail::new(CredError::EncodingFailed, "failed to serialize signing payload")
                .with_credential_id(self.id.as_str())
        })
    }
}

impl Credential {
    /// Structural validation. Every violation is reported.
    pub fn validate(&self, registry: &ClaimTypeRegistry) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.claim_type.is_empty() {
            errors.push("claimType", "must not be empty");
        } else if !registry.is_registered(&self.claim_type) {
            errors.push(
                "claimType",
                format!("'{}' is not a registered claim type", self.claim_type),
            );
        }
        if self.claims.is_empty() {
            errors.push("claims", "must contain at least one claim");
        }
        if self.issued_at.timestamp() <= 0 {
            errors.push("issuedAt", "must be set");
        }
        if self.source_event_ids.is_empty() {
            errors.push("sourceEventIds", "at least one source event is required");
        }
        if self.schema_version < 1 {
            errors.push("schemaVersion", "must be >= 1");
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= self.issued_at {
                errors.push("expiresAt", "must be after issuedAt");
            }
        }

        for disclosure in self.disclosures.iter() {
            match self.claims.get(&disclosure.key) {
                None => errors.push(
                    format!("disclosures.{}", disclosure.key),
                    "disclosure has no matching claim",
                ),
                Some(v) if *v != disclosure.value => errors.push(
                    format!("disclosures.{}", disclosure.key),
                    "disclosure value differs from claim value",
                ),
                Some(_) => {}
            }
        }

        match (&self.proof, self.status) {
            (None, CredentialStatus::Active) => {
                errors.push("proof", "an active credential must carry a signature");
            }
            (Some(proof), _) => {
                if proof.signature.is_empty() {
                    errors.push("proof.signature", "must not be empty");
                }
                if proof.algorithm.is_empty() {
                    errors.push("proof.algorithm", "must not be empty");
                }
            }
            _ => {}
        }

        errors.into_result()
    }

    /// Digests of every selectively disclosable claim, insertion order.
    pub fn digest_manifest(&self) -> Vec<String> {
        self.disclosures.digests()
    }

    pub fn disclosable_keys(&self) -> Vec<&str> {
        self.disclosures.keys().collect()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }

    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == CredentialStatus::Active && !self.is_expired_at(now)
    }

    pub fn is_usable(&self) -> bool {
        self.is_usable_at(Utc::now())
    }

    /// Stored status, except that an active credential past `expires_at`
    /// reports `Expired`.
    pub fn effective_status_at(&self, now: DateTime<Utc>) -> CredentialStatus {
        if self.status == CredentialStatus::Active && self.is_expired_at(now) {
            CredentialStatus::Expired
        } else {
            self.status
        }
    }

    /// Claims embedded without a disclosure. They are always visible and
    /// signed in plain form.
    pub fn plain_claims(&self) -> ClaimMap {
        self.claims
            .iter()
            .filter(|(key, _)| !self.disclosures.contains_key(key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Canonical JSON bytes of the signed content.
    pub fn signing_payload(&self) -> CredResult<Vec<u8>> {
        let plain_claims = self.plain_claims();
        let digest_manifest = self.digest_manifest();
        SigningView {
            id: &self.id,
            issuer: &self.issuer,
            subject: &self.subject,
            claim_type: &self.claim_type,
            plain_claims: &plain_claims,
            digest_manifest: &digest_manifest,
            source_event_ids: &self.source_event_ids,
            issued_at: &self.issued_at,
            expires_at: &self.expires_at,
            status_entry: &self.status_entry,
            schema_version: self.schema_version,
        }
        .to_bytes()
    }

    /// Attach a proof, move Pending -> Active and re-validate. The credential
    /// is consumed, so a failed activation leaves nothing marked active.
    pub fn activate(
        mut self,
        proof: CredentialProof,
        registry: &ClaimTypeRegistry,
    ) -> CredResult<Credential> {
        self.status = transition(self.status, CredentialStatus::Active)
            .map_err(|e| e.with_credential_id(self.id.as_str()))?;
        self.proof = Some(proof);
        self.validate(registry).map_err(|errors| {
            CredErrorDetail::from(errors).with_credential_id(self.id.as_str())
        })?;
        Ok(self)
    }

    /// Local status flip. The authoritative revocation bit lives in the
    /// status list referenced by `status_entry`.
    pub fn revoke(&mut self) -> CredResult<()> {
        self.status = transition_to_revoked(self.status)
            .map_err(|e| e.with_credential_id(self.id.as_str()))?;
        Ok(())
    }

    /// Parse the embedded claims back into their typed shape.
    pub fn typed_claim<C: Claim>(&self) -> CredResult<C> {
        if self.claim_type != C::claim_type() {
            return Err(CredErrorDetail::new(
                CredError::ClaimParse(C::claim_type().to_string()),
                format!(
                    "credential carries '{}' claims, not '{}'",
                    self.claim_type,
                    C::claim_type()
                ),
            )
            .with_credential_id(self.id.as_str()));
        }
        C::parse(&self.claims)
    }
}
