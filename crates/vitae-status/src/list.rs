//! Bitmap status list.
//!
//! Bit `i` of the list is `(bitmap[i / 8] >> (i % 8)) & 1`; a set bit means
//! the credential holding index `i` is revoked (or suspended, depending on
//! the list's purpose). The bitmap travels as standard base64.
//!
//! Readers (`is_revoked`, `revoked_count`, `encode_bitmap`,
//! `next_available_index`) take the read lock; mutations take the write
//! lock. Index allocation is a counter advanced under the write lock, so two
//! issuers sharing a list never receive the same index.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use vitae_core::{StatusEntry, StatusPurpose};

use crate::error::{StatusError, StatusResult};

/// 131,072 bits, 16 KiB of bitmap.
pub const DEFAULT_LIST_SIZE: u64 = 131_072;

/// Serializable form of a list, for the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusListSnapshot {
    pub id: String,
    pub issuer_id: String,
    pub purpose: StatusPurpose,
    pub encoded_list: String,
    pub size: u64,
    /// High-water mark of handed-out indices. May exceed `size` after the
    /// bitmap was shrunk; such a list is full.
    pub allocated: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug)]
struct Bitmap {
    bytes: Vec<u8>,
    size: u64,
    allocated: u64,
    last_updated: DateTime<Utc>,
}

impl Bitmap {
    fn get(&self, index: u64) -> bool {
        if index >= self.size {
            return false;
        }
        (self.bytes[(index / 8) as usize] >> (index % 8)) & 1 == 1
    }

    fn set(&mut self, index: u64, value: bool) -> StatusResult<()> {
        if index >= self.size {
            return Err(StatusError::IndexOutOfRange {
                index,
                size: self.size,
            });
        }
        let byte = &mut self.bytes[(index / 8) as usize];
        let mask = 1u8 << (index % 8);
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        self.last_updated = Utc::now();
        Ok(())
    }
}

#[derive(Debug)]
pub struct RevocationList {
    id: String,
    issuer_id: String,
    purpose: StatusPurpose,
    bitmap: RwLock<Bitmap>,
}

fn check_size(size: u64) -> StatusResult<()> {
    if size == 0 || size % 8 != 0 {
        return Err(StatusError::InvalidSize(size));
    }
    Ok(())
}

fn decode(encoded: &str) -> StatusResult<Vec<u8>> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| StatusError::DecodingFailed("invalid base64".into()))?;
    if bytes.is_empty() {
        return Err(StatusError::DecodingFailed("empty bitmap".into()));
    }
    Ok(bytes)
}

impl RevocationList {
    /// A list of `size` clear bits. `size` must be positive and a multiple
    /// of 8.
    pub fn new(
        id: impl Into<String>,
        issuer_id: impl Into<String>,
        size: u64,
    ) -> StatusResult<Self> {
        check_size(size)?;
        Ok(Self::from_parts(
            id.into(),
            issuer_id.into(),
            StatusPurpose::Revocation,
            vec![0u8; (size / 8) as usize],
            0,
            Utc::now(),
        ))
    }

    pub fn with_default_size(id: impl Into<String>, issuer_id: impl Into<String>) -> Self {
        Self::from_parts(
            id.into(),
            issuer_id.into(),
            StatusPurpose::Revocation,
            vec![0u8; (DEFAULT_LIST_SIZE / 8) as usize],
            0,
            Utc::now(),
        )
    }

    pub fn with_purpose(mut self, purpose: StatusPurpose) -> Self {
        self.purpose = purpose;
        self
    }

    fn from_parts(
        id: String,
        issuer_id: String,
        purpose: StatusPurpose,
        bytes: Vec<u8>,
        allocated: u64,
        last_updated: DateTime<Utc>,
    ) -> Self {
        let size = bytes.len() as u64 * 8;
        Self {
            id,
            issuer_id,
            purpose,
            bitmap: RwLock::new(Bitmap {
                bytes,
                size,
                allocated,
                last_updated,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    pub fn purpose(&self) -> StatusPurpose {
        self.purpose
    }

    pub fn size(&self) -> u64 {
        self.bitmap.read().size
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.bitmap.read().last_updated
    }

    /// Out-of-range indices were never allocated, so they read as not revoked.
    pub fn is_revoked(&self, index: u64) -> bool {
        self.bitmap.read().get(index)
    }

    pub fn revoke(&self, index: u64) -> StatusResult<()> {
        self.bitmap.write().set(index, true).map_err(|e| {
            tracing::warn!(list_id = %self.id, index, "revocation index out of range");
            e
        })?;
        tracing::info!(list_id = %self.id, index, "status bit set");
        Ok(())
    }

    pub fn unrevoke(&self, index: u64) -> StatusResult<()> {
        self.bitmap.write().set(index, false).map_err(|e| {
            tracing::warn!(list_id = %self.id, index, "revocation index out of range");
            e
        })?;
        tracing::info!(list_id = %self.id, index, "status bit cleared");
        Ok(())
    }

    /// First clear bit, or -1 if every bit is set.
    ///
    /// This only scans; it claims nothing. Use `allocate_index` when handing
    /// indices to credentials.
    pub fn next_available_index(&self) -> i64 {
        let bitmap = self.bitmap.read();
        for (i, byte) in bitmap.bytes.iter().enumerate() {
            if *byte != 0xFF {
                let bit = byte.trailing_ones() as u64;
                let index = i as u64 * 8 + bit;
                if index < bitmap.size {
                    return index as i64;
                }
            }
        }
        -1
    }

    /// Claim the next unused index. Indices are handed out once each, in
    /// order, whatever their revocation bit says.
    pub fn allocate_index(&self) -> StatusResult<u64> {
        let mut bitmap = self.bitmap.write();
        if bitmap.allocated >= bitmap.size {
            tracing::warn!(list_id = %self.id, size = bitmap.size, "status list exhausted");
            return Err(StatusError::ListFull(self.id.clone()));
        }
        let index = bitmap.allocated;
        bitmap.allocated += 1;
        bitmap.last_updated = Utc::now();
        tracing::debug!(list_id = %self.id, index, "status index allocated");
        Ok(index)
    }

    pub fn allocated_count(&self) -> u64 {
        self.bitmap.read().allocated
    }

    pub fn remaining_capacity(&self) -> u64 {
        let bitmap = self.bitmap.read();
        bitmap.size.saturating_sub(bitmap.allocated)
    }

    /// Number of set bits.
    pub fn revoked_count(&self) -> u64 {
        let bitmap = self.bitmap.read();
        let mut count = 0u64;
        for &byte in &bitmap.bytes {
            let mut b = byte;
            while b != 0 {
                b &= b - 1;
                count += 1;
            }
        }
        count
    }

    pub fn encode_bitmap(&self) -> String {
        STANDARD.encode(&self.bitmap.read().bytes)
    }

    /// Replace the bitmap. The size becomes `8 * decoded_len`; the
    /// allocation counter is kept, so an index handed out before is never
    /// handed out again, even after shrinking and regrowing.
    pub fn decode_bitmap(&self, encoded: &str) -> StatusResult<()> {
        let bytes = decode(encoded)?;
        let mut bitmap = self.bitmap.write();
        bitmap.size = bytes.len() as u64 * 8;
        bitmap.bytes = bytes;
        bitmap.last_updated = Utc::now();
        tracing::debug!(list_id = %self.id, size = bitmap.size, "status bitmap replaced");
        Ok(())
    }

    pub fn snapshot(&self) -> StatusListSnapshot {
        let bitmap = self.bitmap.read();
        StatusListSnapshot {
            id: self.id.clone(),
            issuer_id: self.issuer_id.clone(),
            purpose: self.purpose,
            encoded_list: STANDARD.encode(&bitmap.bytes),
            size: bitmap.size,
            allocated: bitmap.allocated,
            last_updated: bitmap.last_updated,
        }
    }

    /// Rebuild a list. The declared size must match the decoded bitmap.
    pub fn from_snapshot(snapshot: StatusListSnapshot) -> StatusResult<Self> {
        let bytes = decode(&snapshot.encoded_list)?;
        let size = bytes.len() as u64 * 8;
        if snapshot.size != size {
            return Err(StatusError::DecodingFailed(format!(
                "declared size {} does not match bitmap of {} bits",
                snapshot.size, size
            )));
        }
        Ok(Self::from_parts(
            snapshot.id,
            snapshot.issuer_id,
            snapshot.purpose,
            bytes,
            snapshot.allocated,
            snapshot.last_updated,
        ))
    }

    /// The entry a credential embeds to point at `index` of this list.
    pub fn status_entry(&self, index: u64) -> StatusResult<StatusEntry> {
        let size = self.size();
        if index >= size {
            return Err(StatusError::IndexOutOfRange { index, size });
        }
        Ok(StatusEntry {
            status_list_id: self.id.clone(),
            status_list_index: index,
            status_purpose: self.purpose,
        })
    }
}
