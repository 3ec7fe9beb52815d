use thiserror::Error;

/// Error type for the issuer and verifier services, aggregating errors from
/// the engine crates.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("credential error: {0}")]
    Credential(#[from] vitae_cred::CredErrorDetail),

    #[error("status list error: {0}")]
    Status(#[from] vitae_status::StatusError),

    #[error("core error: {0}")]
    Core(#[from] vitae_core::CoreError),

    #[error("credential {0} was not issued by this issuer")]
    ForeignCredential(String),

    #[error("credential names issuer '{found}', expected '{expected}'")]
    IssuerMismatch { expected: String, found: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

impl RootError {
    /// The credential error kind, if this wraps one.
    pub fn cred_kind(&self) -> Option<&vitae_cred::CredError> {
        match self {
            RootError::Credential(detail) => Some(&detail.kind),
            _ => None,
        }
    }
}

pub type RootResult<T> = Result<T, RootError>;
