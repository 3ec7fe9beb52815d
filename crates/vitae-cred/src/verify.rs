//! Consistency checks for a received presentation.

use std::collections::HashSet;

use crate::disclosure::{compute_disclosure_digest, decode_disclosure};
use crate::error::{CredError, CredErrorDetail, CredResult};
use crate::presentation::Presentation;

/// Check `presentation` against the credential's digest `manifest`.
///
/// Every disclosure must decode, hash into the manifest and match the
/// presented claim; every presented claim must be backed by a disclosure;
/// withheld digests must come from the manifest, not overlap the disclosed
/// ones, and together with them cover the manifest exactly.
///
/// Signature and revocation checks are separate.
pub fn verify_presentation(presentation: &Presentation, manifest: &[String]) -> CredResult<()> {
    let id = presentation.credential_id.as_str();
    let mismatch = |reason: &str, message: String| {
        tracing::warn!(credential_id = id, reason, "presentation rejected");
        CredErrorDetail::new(CredError::PresentationMismatch(reason.to_string()), message)
            .with_credential_id(id)
    };

    let manifest_set: HashSet<&str> = manifest.iter().map(String::as_str).collect();
    if manifest_set.len() != manifest.len() {
        return Err(mismatch(
            "duplicate manifest digest",
            "the digest manifest lists a digest more than once".into(),
        ));
    }

    let mut disclosed_digests = HashSet::new();
    let mut disclosed_keys = HashSet::new();
    for (i, encoded) in presentation.disclosures.iter().enumerate() {
        let disclosure = decode_disclosure(encoded).map_err(|e| {
            mismatch(
                "undecodable disclosure",
                format!("disclosure {} does not decode: {}", i, e.message),
            )
        })?;
        let digest = compute_disclosure_digest(encoded);
        if !manifest_set.contains(digest.as_str()) {
            return Err(mismatch(
                "digest not in manifest",
                format!("disclosure for '{}' is not committed to", disclosure.key),
            ));
        }
        if !disclosed_digests.insert(digest) {
            return Err(mismatch(
                "repeated disclosure",
                format!("disclosure for '{}' appears twice", disclosure.key),
            ));
        }
        match presentation.claims.get(&disclosure.key) {
            Some(value) if *value == disclosure.value => {}
            Some(_) => {
                return Err(mismatch(
                    "claim value mismatch",
                    format!("claim '{}' differs from its disclosure", disclosure.key),
                ))
            }
            None => {
                return Err(mismatch(
                    "disclosed claim missing",
                    format!("disclosure for '{}' has no presented claim", disclosure.key),
                ))
            }
        }
        disclosed_keys.insert(disclosure.key);
    }

    if let Some(key) = presentation
        .claims
        .keys()
        .find(|k| !disclosed_keys.contains(k.as_str()))
    {
        return Err(mismatch(
            "undisclosed claim",
            format!("claim '{}' is not backed by a disclosure", key),
        ));
    }

    if let Some(key) = presentation
        .plain_claims
        .keys()
        .find(|k| disclosed_keys.contains(k.as_str()))
    {
        return Err(mismatch(
            "disclosed claim shadows plain claim",
            format!("claim '{}' is both plain and disclosed", key),
        ));
    }

    let mut withheld = HashSet::new();
    for digest in &presentation.withheld_digests {
        if !manifest_set.contains(digest.as_str()) {
            return Err(mismatch(
                "withheld digest not in manifest",
                "a withheld digest is not part of the manifest".into(),
            ));
        }
        if disclosed_digests.contains(digest) {
            return Err(mismatch(
                "withheld digest disclosed",
                "a digest is both withheld and disclosed".into(),
            ));
        }
        if !withheld.insert(digest.as_str()) {
            return Err(mismatch(
                "repeated withheld digest",
                "a withheld digest appears twice".into(),
            ));
        }
    }

    if disclosed_digests.len() + withheld.len() != manifest_set.len() {
        return Err(mismatch(
            "incomplete manifest coverage",
            format!(
                "{} disclosed and {} withheld digests do not cover {} committed digests",
                disclosed_digests.len(),
                withheld.len(),
                manifest_set.len()
            ),
        ));
    }

    tracing::debug!(
        credential_id = id,
        disclosed = disclosed_digests.len(),
        withheld = withheld.len(),
        "presentation consistent with manifest"
    );
    Ok(())
}
