//! Vitae Status Lists
//!
//! Bitmap revocation lists in the W3C Status List 2021 layout and a
//! thread-safe registry of lists. A credential records
//! `{ statusListId, statusListIndex, statusPurpose }` at issuance; anyone
//! holding the list can then check its bit without asking the issuer.

pub mod error;
pub mod list;
pub mod registry;

pub use error::{StatusError, StatusResult};
pub use list::{RevocationList, StatusListSnapshot, DEFAULT_LIST_SIZE};
pub use registry::RevocationRegistry;
