use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ValidationErrors: field-scoped, accumulated
// ---------------------------------------------------------------------------

/// One offending field and what is wrong with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Ordered list of field errors. Validation never stops at the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Append another set, prefixing each field with `prefix.`.
    pub fn extend_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for e in other.errors {
            self.errors
                .push(FieldError::new(format!("{}.{}", prefix, e.field), e.message));
        }
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when empty, otherwise the whole list as an error.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", joined.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

// ---------------------------------------------------------------------------
// CredError
// ---------------------------------------------------------------------------

/// Error kinds for the credential engine. Display output never contains
/// claim values, salts or signatures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("encoding failed")]
    EncodingFailed,

    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    #[error("entropy source unavailable")]
    EntropyUnavailable,

    #[error("claim not found: {0}")]
    ClaimNotFound(String),

    #[error("duplicate disclosure for claim: {0}")]
    DuplicateDisclosure(String),

    #[error("claim parse failed: {0}")]
    ClaimParse(String),

    #[error("unknown claim type: {0}")]
    UnknownClaimType(String),

    #[error("credential not usable: {0}")]
    CredentialNotUsable(String),

    #[error("status transition denied: {0}")]
    StatusTransitionDenied(String),

    #[error("presentation mismatch: {0}")]
    PresentationMismatch(String),

    #[error("signing failed")]
    SigningFailed,

    #[error("signature invalid")]
    SignatureInvalid,
}

/// Structured error with a CredError kind and a safe message.
#[derive(Debug, Clone)]
pub struct CredErrorDetail {
    pub kind: CredError,
    pub message: String,
    pub credential_id: Option<String>,
}

impl fmt::Display for CredErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref id) = self.credential_id {
            write!(f, " (credential: {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for CredErrorDetail {}

impl CredErrorDetail {
    pub fn new(kind: CredError, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            credential_id: None,
        }
    }

    pub fn with_credential_id(mut self, id: impl Into<String>) -> Self {
        self.credential_id = Some(id.into());
        self
    }

    /// The field errors, if this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match &self.kind {
            CredError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<CredError> for CredErrorDetail {
    fn from(kind: CredError) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            credential_id: None,
        }
    }
}

impl From<ValidationErrors> for CredErrorDetail {
    fn from(errors: ValidationErrors) -> Self {
        let message = format!("{} field error(s)", errors.len());
        Self {
            kind: CredError::Validation(errors),
            message,
            credential_id: None,
        }
    }
}

impl From<vitae_core::CoreError> for CredErrorDetail {
    fn from(err: vitae_core::CoreError) -> Self {
        match err {
            vitae_core::CoreError::EntropyUnavailable => CredError::EntropyUnavailable.into(),
            vitae_core::CoreError::Signing(_) => {
                // Signer detail may carry key-handling information; drop it.
                Self::new(CredError::SigningFailed, "signer rejected the payload")
            }
            vitae_core::CoreError::InvalidIdentifier(msg) => {
                let mut errors = ValidationErrors::new();
                errors.push("id", msg);
                errors.into()
            }
        }
    }
}

pub type CredResult<T> = Result<T, CredErrorDetail>;
