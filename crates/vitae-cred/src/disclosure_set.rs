//! Dual-indexed disclosure collection.
//!
//! Entries are reachable by claim key and by digest. The digest of every
//! entry is recomputed from its encoded form on insertion; callers never
//! supply one. Duplicate claim keys are rejected by [`DisclosureSet::add`];
//! [`DisclosureSet::replace`] swaps an entry and drops the old digest from
//! the digest index so it cannot linger.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::disclosure::{
    compute_disclosure_digest, decode_disclosure, encode_disclosure, Disclosure,
};
use crate::error::{CredError, CredErrorDetail, CredResult};

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    disclosure: Disclosure,
    digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct DisclosureSet {
    /// Claim keys in insertion order.
    order: Vec<String>,
    by_key: HashMap<String, Entry>,
    /// digest -> claim key
    by_digest: HashMap<String, String>,
}

impl DisclosureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode (if needed), digest and insert. Returns the digest.
    ///
    /// Fails with `DuplicateDisclosure` if the claim key is already present,
    /// and with `DecodingFailed` if a pre-encoded disclosure does not decode
    /// to its own salt, key and value.
    pub fn add(&mut self, disclosure: Disclosure) -> CredResult<String> {
        self.insert_at(disclosure, None)
    }

    fn insert_at(
        &mut self,
        mut disclosure: Disclosure,
        position: Option<usize>,
    ) -> CredResult<String> {
        if self.by_key.contains_key(&disclosure.key) {
            return Err(CredErrorDetail::new(
                CredError::DuplicateDisclosure(disclosure.key.clone()),
                format!("claim '{}' already has a disclosure", disclosure.key),
            ));
        }
        if disclosure.is_encoded() {
            let decoded = decode_disclosure(&disclosure.encoded)?;
            if decoded.salt != disclosure.salt
                || decoded.key != disclosure.key
                || decoded.value != disclosure.value
            {
                return Err(CredErrorDetail::new(
                    CredError::DecodingFailed("encoded form does not match fields".into()),
                    format!(
                        "encoded disclosure for '{}' carries a different claim",
                        disclosure.key
                    ),
                ));
            }
        } else {
            encode_disclosure(&mut disclosure)?;
        }
        let digest = compute_disclosure_digest(&disclosure.encoded);
        if self.by_digest.contains_key(&digest) {
            return Err(CredErrorDetail::new(
                CredError::DuplicateDisclosure(disclosure.key.clone()),
                "an identical disclosure is already present",
            ));
        }

        let key = disclosure.key.clone();
        self.by_digest.insert(digest.clone(), key.clone());
        match position {
            Some(i) if i <= self.order.len() => self.order.insert(i, key.clone()),
            _ => self.order.push(key.clone()),
        }
        self.by_key.insert(
            key,
            Entry {
                disclosure,
                digest: digest.clone(),
            },
        );
        Ok(digest)
    }

    /// Insert `disclosure` in place of any existing entry for its key,
    /// keeping that entry's manifest position. Returns the displaced
    /// disclosure. On failure the set is left unchanged.
    pub fn replace(&mut self, disclosure: Disclosure) -> CredResult<Option<Disclosure>> {
        let position = self.order.iter().position(|k| *k == disclosure.key);
        let previous = self.remove(&disclosure.key);
        match self.insert_at(disclosure, position) {
            Ok(_) => Ok(previous),
            Err(e) => {
                if let Some(old) = previous {
                    self.insert_at(old, position)?;
                }
                Err(e)
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Disclosure> {
        let entry = self.by_key.remove(key)?;
        self.by_digest.remove(&entry.digest);
        self.order.retain(|k| k != key);
        Some(entry.disclosure)
    }

    pub fn get(&self, key: &str) -> Option<&Disclosure> {
        self.by_key.get(key).map(|e| &e.disclosure)
    }

    pub fn get_by_digest(&self, digest: &str) -> Option<&Disclosure> {
        self.by_digest
            .get(digest)
            .and_then(|key| self.by_key.get(key))
            .map(|e| &e.disclosure)
    }

    pub fn digest_of(&self, key: &str) -> Option<&str> {
        self.by_key.get(key).map(|e| e.digest.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Encoded strings for exactly `keys`, in request order.
    ///
    /// Fails closed: one absent key fails the whole selection.
    pub fn select_disclosures<S: AsRef<str>>(&self, keys: &[S]) -> CredResult<Vec<String>> {
        keys.iter()
            .map(|k| {
                let key = k.as_ref();
                self.by_key
                    .get(key)
                    .map(|e| e.disclosure.encoded.clone())
                    .ok_or_else(|| {
                        CredErrorDetail::new(
                            CredError::ClaimNotFound(key.to_string()),
                            format!("no disclosure for claim '{}'", key),
                        )
                    })
            })
            .collect()
    }

    /// All encoded strings, insertion order.
    pub fn encoded_strings(&self) -> Vec<String> {
        self.iter().map(|d| d.encoded.clone()).collect()
    }

    /// All digests, insertion order. This is the digest manifest.
    pub fn digests(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|k| self.by_key.get(k))
            .map(|e| e.digest.clone())
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Disclosure> {
        self.order
            .iter()
            .filter_map(|k| self.by_key.get(k))
            .map(|e| &e.disclosure)
    }

    /// `(disclosure, digest)` pairs, insertion order.
    pub fn iter_with_digests(&self) -> impl Iterator<Item = (&Disclosure, &str)> {
        self.order
            .iter()
            .filter_map(|k| self.by_key.get(k))
            .map(|e| (&e.disclosure, e.digest.as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl TryFrom<Vec<String>> for DisclosureSet {
    type Error = CredErrorDetail;

    /// Rebuild from encoded strings. Each entry is decoded and re-digested.
    fn try_from(encoded: Vec<String>) -> Result<Self, Self::Error> {
        let mut set = DisclosureSet::new();
        for s in encoded {
            set.add(decode_disclosure(&s)?)?;
        }
        Ok(set)
    }
}

impl From<DisclosureSet> for Vec<String> {
    fn from(set: DisclosureSet) -> Self {
        set.encoded_strings()
    }
}
