//! Issuance service: hands out status-list indices, signs and activates.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;

use vitae_core::{Clock, CredentialSigner, WalletAddress};
use vitae_cred::{ClaimTypeRegistry, Credential, CredentialBuilder, CredentialStatus};
use vitae_status::{RevocationList, RevocationRegistry, StatusError};

use crate::config::EngineConfig;
use crate::error::{RootError, RootResult};

struct OpenList {
    list: Arc<RevocationList>,
    seq: u64,
}

pub struct Issuer {
    config: EngineConfig,
    address: WalletAddress,
    registry: ClaimTypeRegistry,
    revocation: RevocationRegistry,
    clock: Arc<dyn Clock>,
    current: Mutex<OpenList>,
}

impl Issuer {
    /// Validate `config`, require an issuer address and open a status list
    /// in `revocation`.
    pub fn new(
        config: EngineConfig,
        registry: ClaimTypeRegistry,
        revocation: RevocationRegistry,
        clock: Arc<dyn Clock>,
    ) -> RootResult<Self> {
        config.validate()?;
        let address = WalletAddress::new(config.issuer.address.clone())
            .map_err(|_| RootError::Config("issuer.address must be set".into()))?;
        let seq = revocation.lists_for_issuer(address.as_str()).len() as u64;
        let current = open_list(&config, &address, &revocation, seq)?;
        tracing::info!(
            issuer = %address,
            list_id = current.list.id(),
            "issuer ready"
        );
        Ok(Self {
            config,
            address,
            registry,
            revocation,
            clock,
            current: Mutex::new(current),
        })
    }

    pub fn address(&self) -> &WalletAddress {
        &self.address
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn claim_types(&self) -> &ClaimTypeRegistry {
        &self.registry
    }

    pub fn revocation_registry(&self) -> &RevocationRegistry {
        &self.revocation
    }

    /// The list new credentials are currently indexed into.
    pub fn current_list(&self) -> Arc<RevocationList> {
        Arc::clone(&self.current.lock().list)
    }

    /// A builder with issuer, schema version and default TTL filled in.
    pub fn builder(&self) -> CredentialBuilder<'_> {
        let builder = CredentialBuilder::new(&self.registry, self.clock.as_ref())
            .with_issuer(self.address.as_str())
            .with_schema_version(self.config.issuer.schema_version);
        match self.config.issuer.default_ttl_secs {
            // Bounded by MAX_TTL_SECS in EngineConfig::validate.
            Some(ttl) => builder.with_ttl(Duration::seconds(ttl as i64)),
            None => builder,
        }
    }

    /// Allocate a status index, then sign and activate the credential.
    ///
    /// The builder must name this issuer's address. An index whose
    /// credential then fails to build or sign stays allocated; indices are
    /// never reused.
    pub fn issue(
        &self,
        builder: CredentialBuilder<'_>,
        signer: &dyn CredentialSigner,
    ) -> RootResult<Credential> {
        if signer.algorithm() != self.config.issuer.signature_algorithm {
            return Err(RootError::Config(format!(
                "signer uses '{}' but issuer.signature_algorithm is '{}'",
                signer.algorithm(),
                self.config.issuer.signature_algorithm
            )));
        }
        if builder.issuer() != Some(&self.address) {
            let found = builder
                .issuer()
                .map(|a| a.to_string())
                .unwrap_or_default();
            tracing::warn!(
                credential_id = %builder.id(),
                issuer = %self.address,
                found = %found,
                "issuance refused for another issuer address"
            );
            return Err(RootError::IssuerMismatch {
                expected: self.address.to_string(),
                found,
            });
        }

        let (list, index) = self.allocate()?;
        let entry = list.status_entry(index)?;
        let credential = builder.with_status_entry(entry).sign_with(signer)?;
        tracing::info!(
            credential_id = %credential.id,
            claim_type = %credential.claim_type,
            list_id = list.id(),
            index,
            "credential issued"
        );
        Ok(credential)
    }

    fn allocate(&self) -> RootResult<(Arc<RevocationList>, u64)> {
        let mut current = self.current.lock();
        match current.list.allocate_index() {
            Ok(index) => return Ok((Arc::clone(&current.list), index)),
            Err(StatusError::ListFull(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let next = open_list(&self.config, &self.address, &self.revocation, current.seq + 1)?;
        tracing::info!(
            full_list = current.list.id(),
            list_id = next.list.id(),
            "status list full, opened next list"
        );
        *current = next;
        let index = current.list.allocate_index()?;
        Ok((Arc::clone(&current.list), index))
    }

    /// Set the credential's status bit and mark it revoked locally.
    ///
    /// Revoking an already revoked credential is a no-op.
    pub fn revoke(&self, credential: &mut Credential) -> RootResult<()> {
        if credential.issuer != self.address {
            return Err(RootError::ForeignCredential(credential.id.to_string()));
        }
        if credential.status == CredentialStatus::Revoked {
            return Ok(());
        }
        // Check the transition before touching the shared bitmap.
        vitae_cred::status::transition_to_revoked(credential.status)
            .map_err(|e| e.with_credential_id(credential.id.as_str()))?;
        match &credential.status_entry {
            Some(entry) => {
                self.revocation
                    .revoke(&entry.status_list_id, entry.status_list_index)?;
            }
            None => tracing::warn!(
                credential_id = %credential.id,
                "credential has no status entry, revoking locally only"
            ),
        }
        credential.revoke()?;
        tracing::info!(credential_id = %credential.id, "credential revoked");
        Ok(())
    }
}

fn open_list(
    config: &EngineConfig,
    address: &WalletAddress,
    revocation: &RevocationRegistry,
    mut seq: u64,
) -> RootResult<OpenList> {
    loop {
        let id = format!(
            "{}:{}:{}",
            config.revocation.list_base_uri, address, seq
        );
        let list = RevocationList::new(id, address.as_str(), config.revocation.list_size)?
            .with_purpose(config.revocation.purpose);
        match revocation.register(list) {
            Ok(list) => return Ok(OpenList { list, seq }),
            Err(StatusError::DuplicateList(id)) => {
                tracing::debug!(list_id = %id, "status list id taken");
                seq += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vitae_core::{CoreResult, FixedClock};
    use vitae_cred::{AgeOver, CredError};

    struct HashSigner(&'static str);

    impl CredentialSigner for HashSigner {
        fn algorithm(&self) -> &str {
            self.0
        }

        fn sign(&self, payload: &[u8]) -> CoreResult<String> {
            Ok(vitae_core::sha256_b64url(payload))
        }
    }

    fn issuer_with(list_size: u64, ttl: Option<u64>) -> Issuer {
        let mut config = EngineConfig::default();
        config.issuer.address = "0xclinic".into();
        config.issuer.default_ttl_secs = ttl;
        config.revocation.list_size = list_size;
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap());
        Issuer::new(
            config,
            ClaimTypeRegistry::with_builtin_types(),
            RevocationRegistry::new(),
            Arc::new(clock),
        )
        .unwrap()
    }

    fn issue_age(issuer: &Issuer) -> RootResult<Credential> {
        let builder = issuer
            .builder()
            .with_subject("0xpatient")
            .add_age_over_claim(&AgeOver {
                age_threshold: 21,
                is_over: true,
            })
            .with_source_events(["evt-dob"]);
        issuer.issue(builder, &HashSigner("ES256K"))
    }

    #[test]
    fn test_issuer_requires_address() {
        let result = Issuer::new(
            EngineConfig::default(),
            ClaimTypeRegistry::with_builtin_types(),
            RevocationRegistry::new(),
            Arc::new(vitae_core::SystemClock),
        );
        assert!(matches!(result, Err(RootError::Config(_))));
    }

    #[test]
    fn test_issue_assigns_status_entry() {
        let issuer = issuer_with(64, None);
        let cred = issue_age(&issuer).unwrap();
        assert_eq!(cred.status, CredentialStatus::Active);
        assert_eq!(cred.issuer.as_str(), "0xclinic");
        let entry = cred.status_entry.as_ref().unwrap();
        assert_eq!(entry.status_list_id, "urn:vitae:status-list:0xclinic:0");
        assert_eq!(entry.status_list_index, 0);
        assert!(cred.expires_at.is_none());

        let second = issue_age(&issuer).unwrap();
        assert_eq!(second.status_entry.unwrap().status_list_index, 1);
    }

    #[test]
    fn test_default_ttl_applied() {
        let issuer = issuer_with(64, Some(3600));
        let cred = issue_age(&issuer).unwrap();
        assert_eq!(cred.expires_at, Some(cred.issued_at + Duration::seconds(3600)));
    }

    #[test]
    fn test_full_list_rolls_over() {
        let issuer = issuer_with(8, None);
        for _ in 0..8 {
            issue_age(&issuer).unwrap();
        }
        let ninth = issue_age(&issuer).unwrap();
        let entry = ninth.status_entry.unwrap();
        assert_eq!(entry.status_list_id, "urn:vitae:status-list:0xclinic:1");
        assert_eq!(entry.status_list_index, 0);
        assert_eq!(issuer.revocation_registry().lists_for_issuer("0xclinic").len(), 2);
    }

    #[test]
    fn test_second_issuer_on_shared_registry_gets_fresh_list() {
        let issuer = issuer_with(64, None);
        let mut config = issuer.config().clone();
        config.issuer.address = "0xclinic".into();
        let other = Issuer::new(
            config,
            ClaimTypeRegistry::with_builtin_types(),
            issuer.revocation_registry().clone(),
            Arc::new(vitae_core::SystemClock),
        )
        .unwrap();
        assert_ne!(issuer.current_list().id(), other.current_list().id());
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let issuer = issuer_with(64, None);
        let builder = issuer
            .builder()
            .with_subject("0xpatient")
            .add_age_over_claim(&AgeOver {
                age_threshold: 18,
                is_over: true,
            })
            .with_source_events(["evt-dob"]);
        let err = issuer.issue(builder, &HashSigner("EdDSA")).unwrap_err();
        assert!(matches!(err, RootError::Config(_)));
        assert_eq!(issuer.current_list().allocated_count(), 0);
    }

    #[test]
    fn test_issue_refuses_other_issuer_address() {
        let issuer = issuer_with(64, None);
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap());
        let builder = CredentialBuilder::new(issuer.claim_types(), &clock)
            .with_issuer("0xmallory")
            .with_subject("0xpatient")
            .add_age_over_claim(&AgeOver {
                age_threshold: 21,
                is_over: true,
            })
            .with_source_events(["evt-dob"]);
        let err = issuer.issue(builder, &HashSigner("ES256K")).unwrap_err();
        match err {
            RootError::IssuerMismatch { expected, found } => {
                assert_eq!(expected, "0xclinic");
                assert_eq!(found, "0xmallory");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(issuer.current_list().allocated_count(), 0);
    }

    #[test]
    fn test_issuer_builder_keeps_own_address() {
        let issuer = issuer_with(64, None);
        let builder = issuer
            .builder()
            .with_issuer("0xmallory")
            .with_subject("0xpatient")
            .add_age_over_claim(&AgeOver {
                age_threshold: 21,
                is_over: true,
            })
            .with_source_events(["evt-dob"]);
        let err = issuer.issue(builder, &HashSigner("ES256K")).unwrap_err();
        let errors = match err.cred_kind() {
            Some(CredError::Validation(errors)) => errors.clone(),
            other => panic!("unexpected error kind: {:?}", other),
        };
        assert!(errors.contains_field("issuer"));

        let mut cred = issue_age(&issuer).unwrap();
        assert_eq!(cred.issuer, *issuer.address());
        issuer.revoke(&mut cred).unwrap();
    }

    #[test]
    fn test_invalid_builder_surfaces_validation() {
        let issuer = issuer_with(64, None);
        let builder = issuer.builder().with_subject("0xpatient");
        let err = issuer.issue(builder, &HashSigner("ES256K")).unwrap_err();
        assert!(matches!(err.cred_kind(), Some(CredError::Validation(_))));
    }

    #[test]
    fn test_revoke_sets_bit_and_status() {
        let issuer = issuer_with(64, None);
        let mut cred = issue_age(&issuer).unwrap();
        let entry = cred.status_entry.clone().unwrap();
        issuer.revoke(&mut cred).unwrap();
        assert_eq!(cred.status, CredentialStatus::Revoked);
        assert!(issuer
            .revocation_registry()
            .check_status(&entry.status_list_id, entry.status_list_index)
            .unwrap());
        // idempotent
        issuer.revoke(&mut cred).unwrap();
    }

    #[test]
    fn test_revoke_foreign_credential_rejected() {
        let issuer = issuer_with(64, None);
        let mut cred = issue_age(&issuer).unwrap();
        cred.issuer = WalletAddress::new("0xelsewhere").unwrap();
        let err = issuer.revoke(&mut cred).unwrap_err();
        assert!(matches!(err, RootError::ForeignCredential(_)));
        assert_eq!(cred.status, CredentialStatus::Active);
    }

    #[test]
    fn test_revoke_expired_status_denied() {
        let issuer = issuer_with(64, None);
        let mut cred = issue_age(&issuer).unwrap();
        cred.status = CredentialStatus::Expired;
        let entry = cred.status_entry.clone().unwrap();
        let err = issuer.revoke(&mut cred).unwrap_err();
        assert!(matches!(
            err.cred_kind(),
            Some(CredError::StatusTransitionDenied(_))
        ));
        assert!(!issuer
            .revocation_registry()
            .check_status(&entry.status_list_id, entry.status_list_index)
            .unwrap());
    }
}
