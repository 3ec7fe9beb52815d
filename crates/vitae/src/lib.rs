//! Vitae Root Library
//!
//! Issuer and verifier services over the Vitae credential engine.
//!
//! - `Issuer` builds credentials from typed claims, assigns each one a slot
//!   in a status list, and signs it through a `CredentialSigner`.
//! - `Verifier` checks the issuer signature through a `CredentialVerifier`,
//!   then the disclosures against the signed digest manifest, then the
//!   status list and the expiry time.
//!
//! Both share a `RevocationRegistry`; persistence of lists (via
//! `RevocationList::snapshot`) and of credentials is left to the caller.

pub mod config;
pub mod error;
pub mod issuer;
pub mod verifier;

pub use config::{EngineConfig, IssuerConfig, RevocationConfig};
pub use error::{RootError, RootResult};
pub use issuer::Issuer;
pub use verifier::{VerificationReport, Verifier};
