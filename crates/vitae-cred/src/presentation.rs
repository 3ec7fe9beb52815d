//! Selective-disclosure presentations.
//!
//! A presentation reveals the values of the chosen claim keys only. Every
//! other selectively disclosable claim is represented by its digest, so a
//! verifier can check the reveal against the credential's digest manifest
//! without learning the hidden values.
//!
//! Besides the reveal, a presentation carries every signed field of the
//! credential, so the issuer's signature can be checked over a payload
//! rebuilt from the presentation alone.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vitae_core::{ClaimType, CredentialId, EventId, StatusEntry, WalletAddress};

use crate::claims::ClaimMap;
use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::types::{Credential, CredentialProof, SigningView};

/// What a verifier receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub credential_id: CredentialId,
    pub issuer: WalletAddress,
    pub subject: WalletAddress,
    pub claim_type: ClaimType,
    /// Disclosed keys only.
    pub claims: ClaimMap,
    /// Claims embedded without a disclosure; always visible.
    #[serde(default, skip_serializing_if = "ClaimMap::is_empty")]
    pub plain_claims: ClaimMap,
    /// Encoded disclosure strings, manifest order.
    pub disclosures: Vec<String>,
    pub withheld_digests: Vec<String>,
    pub digest_manifest: Vec<String>,
    pub source_event_ids: Vec<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_entry: Option<StatusEntry>,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<CredentialProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl Presentation {
    pub fn disclosed_keys(&self) -> Vec<&str> {
        self.claims.keys().map(String::as_str).collect()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires_at| now > expires_at)
    }

    /// The bytes the issuer signed, rebuilt from the presented fields. Equal
    /// to `Credential::signing_payload` of the source credential unless a
    /// signed field was altered.
    pub fn signing_payload(&self) -> CredResult<Vec<u8>> {
        SigningView {
            id: &self.credential_id,
            issuer: &self.issuer,
            subject: &self.subject,
            claim_type: &self.claim_type,
            plain_claims: &self.plain_claims,
            digest_manifest: &self.digest_manifest,
            source_event_ids: &self.source_event_ids,
            issued_at: &self.issued_at,
            expires_at: &self.expires_at,
            status_entry: &self.status_entry,
            schema_version: self.schema_version,
        }
        .to_bytes()
    }
}

/// Collects the keys to reveal from one credential.
#[derive(Debug)]
pub struct PresentationBuilder<'a> {
    credential: &'a Credential,
    disclosed: HashSet<String>,
    audience: Option<String>,
    nonce: Option<String>,
}

impl<'a> PresentationBuilder<'a> {
    pub fn new(credential: &'a Credential) -> Self {
        Self {
            credential,
            disclosed: HashSet::new(),
            audience: None,
            nonce: None,
        }
    }

    /// Mark one claim for reveal. The claim must have been embedded with a
    /// disclosure.
    pub fn disclose_key(&mut self, key: &str) -> CredResult<&mut Self> {
        if !self.credential.disclosures.contains_key(key) {
            tracing::warn!(
                credential_id = %self.credential.id,
                claim = key,
                "disclosure requested for a claim that is not selectively disclosable"
            );
            return Err(CredErrorDetail::new(
                CredError::ClaimNotFound(key.to_string()),
                format!("claim '{}' has no disclosure", key),
            )
            .with_credential_id(self.credential.id.as_str()));
        }
        self.disclosed.insert(key.to_string());
        Ok(self)
    }

    /// Mark several claims. Stops at the first key without a disclosure.
    pub fn disclose_keys<I, S>(&mut self, keys: I) -> CredResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            self.disclose_key(key.as_ref())?;
        }
        Ok(self)
    }

    pub fn disclose_all(&mut self) -> &mut Self {
        self.disclosed
            .extend(self.credential.disclosures.keys().map(str::to_string));
        self
    }

    pub fn with_audience(&mut self, audience: impl Into<String>) -> &mut Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_nonce(&mut self, nonce: impl Into<String>) -> &mut Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn is_disclosed(&self, key: &str) -> bool {
        self.disclosed.contains(key)
    }

    pub fn build(&self) -> CredResult<Presentation> {
        self.build_at(Utc::now())
    }

    /// Fails with `CredentialNotUsable` unless the credential is active and
    /// unexpired at `now`.
    pub fn build_at(&self, now: DateTime<Utc>) -> CredResult<Presentation> {
        let credential = self.credential;
        if !credential.is_usable_at(now) {
            let status = credential.effective_status_at(now);
            tracing::warn!(
                credential_id = %credential.id,
                status = %status,
                "presentation refused for unusable credential"
            );
            return Err(CredErrorDetail::new(
                CredError::CredentialNotUsable(status.to_string()),
                format!("credential is {}", status),
            )
            .with_credential_id(credential.id.as_str()));
        }

        let mut claims = ClaimMap::new();
        let mut disclosures = Vec::new();
        let mut withheld_digests = Vec::new();
        let mut digest_manifest = Vec::with_capacity(credential.disclosures.len());

        for (disclosure, digest) in credential.disclosures.iter_with_digests() {
            if self.disclosed.contains(&disclosure.key) {
                claims.insert(disclosure.key.clone(), disclosure.value.clone());
                disclosures.push(disclosure.encoded.clone());
            } else {
                withheld_digests.push(digest.to_string());
            }
            digest_manifest.push(digest.to_string());
        }

        tracing::info!(
            credential_id = %credential.id,
            disclosed = disclosures.len(),
            withheld = withheld_digests.len(),
            "presentation built"
        );

        Ok(Presentation {
            credential_id: credential.id.clone(),
            issuer: credential.issuer.clone(),
            subject: credential.subject.clone(),
            claim_type: credential.claim_type.clone(),
            claims,
            plain_claims: credential.plain_claims(),
            disclosures,
            withheld_digests,
            digest_manifest,
            source_event_ids: credential.source_event_ids.clone(),
            status_entry: credential.status_entry.clone(),
            issued_at: credential.issued_at,
            expires_at: credential.expires_at,
            schema_version: credential.schema_version,
            proof: credential.proof.clone(),
            audience: self.audience.clone(),
            nonce: self.nonce.clone(),
        })
    }
}
