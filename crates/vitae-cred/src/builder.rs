//! Fluent, error-accumulating credential construction.
//!
//! Every setter either records its input or appends a field-scoped error;
//! nothing short-circuits. `build` returns all collected errors at once, or a
//! validated `Pending` credential. `build_signed` and `sign_with` attach the
//! proof and activate before validation, so activation and validation are
//! one step.

use chrono::{DateTime, Duration, Utc};

use vitae_core::{
    ClaimType, Clock, CredentialId, CredentialSigner, EventId, StatusEntry, WalletAddress,
};

use crate::claims::{
    AgeOver, BiometricPercentile, BloodworkRange, Claim, ClaimMap, ProtocolAdherence,
};
use crate::disclosure::Disclosure;
use crate::disclosure_set::DisclosureSet;
use crate::error::{CredErrorDetail, CredResult, ValidationErrors};
use crate::registry::ClaimTypeRegistry;
use crate::types::{Credential, CredentialProof, CredentialStatus};

/// Current credential schema version.
pub const SCHEMA_VERSION: u32 = 1;

pub struct CredentialBuilder<'a> {
    registry: &'a ClaimTypeRegistry,
    clock: &'a dyn Clock,
    id: CredentialId,
    issuer: Option<WalletAddress>,
    subject: Option<WalletAddress>,
    claim_type: Option<ClaimType>,
    claims: ClaimMap,
    disclosures: DisclosureSet,
    source_event_ids: Vec<EventId>,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    status_entry: Option<StatusEntry>,
    schema_version: u32,
    errors: ValidationErrors,
}

impl<'a> CredentialBuilder<'a> {
    /// Start a credential with a fresh id, issued now according to `clock`.
    pub fn new(registry: &'a ClaimTypeRegistry, clock: &'a dyn Clock) -> Self {
        Self {
            registry,
            clock,
            id: CredentialId::generate(),
            issuer: None,
            subject: None,
            claim_type: None,
            claims: ClaimMap::new(),
            disclosures: DisclosureSet::new(),
            source_event_ids: Vec::new(),
            issued_at: clock.now(),
            expires_at: None,
            status_entry: None,
            schema_version: SCHEMA_VERSION,
            errors: ValidationErrors::new(),
        }
    }

    pub fn id(&self) -> &CredentialId {
        &self.id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn issuer(&self) -> Option<&WalletAddress> {
        self.issuer.as_ref()
    }

    /// Errors collected so far.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn with_id(mut self, id: CredentialId) -> Self {
        self.id = id;
        self
    }

    /// Set once. A second, different address is recorded as an error and
    /// the first one is kept.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        let addr = match WalletAddress::new(issuer) {
            Ok(addr) => addr,
            Err(_) => {
                self.errors.push("issuer", "wallet address must not be empty");
                return self;
            }
        };
        match &self.issuer {
            Some(existing) if *existing != addr => self.errors.push(
                "issuer",
                format!("already set to '{}', cannot change to '{}'", existing, addr),
            ),
            _ => self.issuer = Some(addr),
        }
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        match WalletAddress::new(subject) {
            Ok(addr) => self.subject = Some(addr),
            Err(_) => self.errors.push("subject", "wallet address must not be empty"),
        }
        self
    }

    pub fn with_claim_type(mut self, claim_type: ClaimType) -> Self {
        self.set_claim_type(claim_type);
        self
    }

    fn set_claim_type(&mut self, claim_type: ClaimType) {
        if !self.registry.is_registered(&claim_type) {
            self.errors.push(
                "claimType",
                format!("'{}' is not a registered claim type", claim_type),
            );
            return;
        }
        match &self.claim_type {
            Some(existing) if *existing != claim_type => self.errors.push(
                "claimType",
                format!("already set to '{}', cannot change to '{}'", existing, claim_type),
            ),
            _ => self.claim_type = Some(claim_type),
        }
    }

    /// Store a claim. When `disclosed` is true a salted disclosure is created
    /// for it as well, making it selectively presentable.
    pub fn add_claim(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
        disclosed: bool,
    ) -> Self {
        self.push_claim(key.into(), value, disclosed);
        self
    }

    fn push_claim(&mut self, key: String, value: serde_json::Value, disclosed: bool) {
        if key.trim().is_empty() {
            self.errors.push("claims", "claim key must not be empty");
            return;
        }
        if self.claims.contains_key(&key) {
            self.errors
                .push(format!("claims.{}", key), "claim key already present");
            return;
        }
        if disclosed {
            if let Err(e) = self.disclosures.add(Disclosure::new(key.clone(), value.clone())) {
                self.errors.push(format!("disclosures.{}", key), e.message);
                return;
            }
        }
        self.claims.insert(key, value);
    }

    /// Validate a typed claim and embed every field of it.
    pub fn add_typed_claim<C: Claim>(mut self, claim: &C, disclosed: bool) -> Self {
        let claim_type = C::claim_type();
        if let Err(errors) = claim.validate() {
            self.errors.extend_prefixed(claim_type.as_str(), errors);
            return self;
        }
        let map = match claim.to_map() {
            Ok(map) => map,
            Err(e) => {
                self.errors.push(claim_type.as_str(), e.message);
                return self;
            }
        };
        for (key, value) in map {
            self.push_claim(key, value, disclosed);
        }
        self.set_claim_type(claim_type);
        self
    }

    pub fn add_bloodwork_claim(self, claim: &BloodworkRange) -> Self {
        self.add_typed_claim(claim, true)
    }

    pub fn add_protocol_adherence_claim(self, claim: &ProtocolAdherence) -> Self {
        self.add_typed_claim(claim, true)
    }

    pub fn add_biometric_percentile_claim(self, claim: &BiometricPercentile) -> Self {
        self.add_typed_claim(claim, true)
    }

    pub fn add_age_over_claim(self, claim: &AgeOver) -> Self {
        self.add_typed_claim(claim, true)
    }

    /// Evidence references. At least one is required; duplicates are dropped.
    pub fn with_source_events<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (i, raw) in ids.into_iter().enumerate() {
            match EventId::new(raw) {
                Ok(id) if !self.source_event_ids.contains(&id) => self.source_event_ids.push(id),
                Ok(_) => {}
                Err(_) => self
                    .errors
                    .push(format!("sourceEventIds[{}]", i), "event id must not be empty"),
            }
        }
        if self.source_event_ids.is_empty() {
            self.errors
                .push("sourceEventIds", "at least one source event is required");
        }
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        if expires_at <= self.issued_at {
            self.errors.push("expiresAt", "must be after issuedAt");
        } else {
            self.expires_at = Some(expires_at);
        }
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        if ttl <= Duration::zero() {
            self.errors.push("ttl", "must be greater than zero");
            return self;
        }
        match self.issued_at.checked_add_signed(ttl) {
            Some(expires_at) => self.expires_at = Some(expires_at),
            None => self.errors.push("ttl", "expiry overflows the calendar"),
        }
        self
    }

    pub fn with_status_entry(mut self, entry: StatusEntry) -> Self {
        self.status_entry = Some(entry);
        self
    }

    pub fn with_schema_version(mut self, version: u32) -> Self {
        if version < 1 {
            self.errors.push("schemaVersion", "must be >= 1");
        } else {
            self.schema_version = version;
        }
        self
    }

    /// Validated `Pending` credential, or every collected error.
    pub fn build(self) -> CredResult<Credential> {
        self.finish(None)
    }

    /// Like `build`, but records the signature and activates before
    /// validating. An invalid credential is never returned active.
    pub fn build_signed(
        self,
        signature: impl Into<String>,
        algorithm: impl Into<String>,
    ) -> CredResult<Credential> {
        let proof = CredentialProof {
            signature: signature.into(),
            algorithm: algorithm.into(),
            created: self.clock.now(),
        };
        self.finish(Some(proof))
    }

    /// Build, have `signer` sign the canonical payload, then activate.
    pub fn sign_with(self, signer: &dyn CredentialSigner) -> CredResult<Credential> {
        let registry = self.registry;
        let created = self.clock.now();
        let pending = self.build()?;
        let payload = pending.signing_payload()?;
        let signature = signer
            .sign(&payload)
            .map_err(|e| CredErrorDetail::from(e).with_credential_id(pending.id.as_str()))?;
        let proof = CredentialProof {
            signature,
            algorithm: signer.algorithm().to_string(),
            created,
        };
        let credential = pending.activate(proof, registry)?;
        tracing::info!(
            credential_id = %credential.id,
            claim_type = %credential.claim_type,
            "credential signed and activated"
        );
        Ok(credential)
    }

    fn finish(self, proof: Option<CredentialProof>) -> CredResult<Credential> {
        let mut errors = self.errors;
        if self.issuer.is_none() && !errors.contains_field("issuer") {
            errors.push("issuer", "is required");
        }
        if self.subject.is_none() && !errors.contains_field("subject") {
            errors.push("subject", "is required");
        }
        if self.claim_type.is_none() && !errors.contains_field("claimType") {
            errors.push("claimType", "is required");
        }
        if self.claims.is_empty() && !errors.contains_field("claims") {
            errors.push("claims", "must contain at least one claim");
        }
        if self.source_event_ids.is_empty() && !errors.contains_field("sourceEventIds") {
            errors.push("sourceEventIds", "at least one source event is required");
        }

        let (issuer, subject, claim_type) = match (self.issuer, self.subject, self.claim_type) {
            (Some(i), Some(s), Some(t)) if errors.is_empty() => (i, s, t),
            _ => {
                tracing::warn!(
                    credential_id = %self.id,
                    errors = errors.len(),
                    fields = ?errors.fields(),
                    "credential build rejected"
                );
                return Err(CredErrorDetail::from(errors).with_credential_id(self.id.as_str()));
            }
        };

        let signed = proof.is_some();
        let credential = Credential {
            id: self.id,
            issuer,
            subject,
            claim_type,
            claims: self.claims,
            disclosures: self.disclosures,
            source_event_ids: self.source_event_ids,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            status: if signed {
                CredentialStatus::Active
            } else {
                CredentialStatus::Pending
            },
            status_entry: self.status_entry,
            schema_version: self.schema_version,
            proof,
        };

        if let Err(errors) = credential.validate(self.registry) {
            tracing::warn!(
                credential_id = %credential.id,
                fields = ?errors.fields(),
                "credential failed validation"
            );
            return Err(CredErrorDetail::from(errors).with_credential_id(credential.id.as_str()));
        }

        tracing::debug!(
            credential_id = %credential.id,
            claims = credential.claims.len(),
            disclosures = credential.disclosures.len(),
            status = %credential.status,
            "credential built"
        );
        Ok(credential)
    }
}
