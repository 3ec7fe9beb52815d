//! Vitae Credential Engine
//!
//! Builds verifiable credentials whose claims can be revealed one at a time.
//! Each selectively disclosable claim is committed to with a salted
//! disclosure `base64url([salt, key, value])` and its SHA-256 digest; the
//! credential carries the digest manifest, and a presentation reveals some
//! disclosures while listing the digests of the rest.
//!
//! Signing is delegated through `vitae_core::CredentialSigner` and checked
//! through `vitae_core::CredentialVerifier`. The engine
//! never holds key material.

pub mod builder;
pub mod claims;
pub mod disclosure;
pub mod disclosure_set;
pub mod error;
pub mod presentation;
pub mod registry;
pub mod status;
pub mod types;
pub mod verify;

pub use builder::{CredentialBuilder, SCHEMA_VERSION};
pub use claims::{
    parse_age_over, parse_biometric_percentile, parse_bloodwork_range, parse_protocol_adherence,
    AgeOver, BiometricPercentile, BloodworkRange, Claim, ClaimMap, ProtocolAdherence,
};
pub use disclosure::{
    compute_disclosure_digest, decode_disclosure, encode_disclosure, verify_disclosure, Disclosure,
};
pub use disclosure_set::DisclosureSet;
pub use error::{CredError, CredErrorDetail, CredResult, FieldError, ValidationErrors};
pub use presentation::{Presentation, PresentationBuilder};
pub use registry::ClaimTypeRegistry;
pub use status::{can_present, can_revoke, is_valid_transition};
pub use types::*;
pub use verify::verify_presentation;
