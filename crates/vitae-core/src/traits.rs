use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::types::WalletAddress;

// ---------------------------------------------------------------------------
// Clock: source of "now" for issuance and expiry decisions
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// CredentialSigner: external signing capability
//
// The engine never holds key material. It hands the signer the canonical
// credential payload and records whatever signature string comes back.
// ---------------------------------------------------------------------------

pub trait CredentialSigner: Send + Sync {
    /// Algorithm identifier recorded on the credential proof (e.g. "ES256K").
    fn algorithm(&self) -> &str;

    fn sign(&self, payload: &[u8]) -> CoreResult<String>;
}

// ---------------------------------------------------------------------------
// CredentialVerifier: counterpart of CredentialSigner on the relying side
//
// Resolves the issuer's key material however it likes and checks a signature
// over the same canonical payload the signer was given.
// ---------------------------------------------------------------------------

pub trait CredentialVerifier: Send + Sync {
    fn algorithm(&self) -> &str;

    /// `Ok(false)` for a well-formed but wrong signature; `Err` when the
    /// issuer's key cannot be resolved or the signature cannot be parsed.
    fn verify(
        &self,
        issuer: &WalletAddress,
        payload: &[u8],
        signature: &str,
    ) -> CoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_signer_object_safe(_: &dyn CredentialSigner) {}
    fn _assert_clock_object_safe(_: &dyn Clock) {}
    fn _assert_verifier_object_safe(_: &dyn CredentialVerifier) {}

    #[test]
    fn test_fixed_clock() {
        let t = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(FixedClock(t).now(), t);
    }

    #[test]
    fn test_system_clock_advances() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}
