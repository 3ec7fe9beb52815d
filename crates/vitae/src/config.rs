use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use vitae_core::StatusPurpose;
use vitae_status::DEFAULT_LIST_SIZE;

use crate::error::{RootError, RootResult};

/// Upper bound for `issuer.default_ttl_secs`: 100 years.
pub const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Issuance settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerConfig {
    /// Wallet address credentials are issued under. Must be set before an
    /// `Issuer` is constructed.
    #[serde(default)]
    pub address: String,

    /// Lifetime given to every issued credential. Absent means credentials
    /// only end by revocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ttl_secs: Option<u64>,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Algorithm the configured signer is expected to report.
    #[serde(default = "default_signature_algorithm")]
    pub signature_algorithm: String,
}

fn default_schema_version() -> u32 {
    vitae_cred::SCHEMA_VERSION
}

fn default_signature_algorithm() -> String {
    "ES256K".to_string()
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            default_ttl_secs: None,
            schema_version: default_schema_version(),
            signature_algorithm: default_signature_algorithm(),
        }
    }
}

/// Status list settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationConfig {
    /// Bits per list.
    #[serde(default = "default_list_size")]
    pub list_size: u64,

    #[serde(default)]
    pub purpose: StatusPurpose,

    /// Prefix for minted list ids: `<base>:<issuer>:<n>`.
    #[serde(default = "default_list_base_uri")]
    pub list_base_uri: String,
}

fn default_list_size() -> u64 {
    DEFAULT_LIST_SIZE
}

fn default_list_base_uri() -> String {
    "urn:vitae:status-list".to_string()
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            list_size: default_list_size(),
            purpose: StatusPurpose::default(),
            list_base_uri: default_list_base_uri(),
        }
    }
}

/// Top-level engine configuration, loaded from TOML (typically
/// `~/.vitae/config.toml`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub issuer: IssuerConfig,

    #[serde(default)]
    pub revocation: RevocationConfig,
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl EngineConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: EngineConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values. The issuer address is checked when an
    /// `Issuer` is built, so a verifier-only config may leave it empty.
    pub fn validate(&self) -> RootResult<()> {
        let size = self.revocation.list_size;
        if size == 0 || size % 8 != 0 {
            return Err(RootError::Config(format!(
                "revocation.list_size must be a positive multiple of 8, got {}",
                size
            )));
        }
        if self.revocation.list_base_uri.trim().is_empty() {
            return Err(RootError::Config(
                "revocation.list_base_uri must not be empty".into(),
            ));
        }
        if self.issuer.schema_version < 1 {
            return Err(RootError::Config("issuer.schema_version must be >= 1".into()));
        }
        if self.issuer.signature_algorithm.trim().is_empty() {
            return Err(RootError::Config(
                "issuer.signature_algorithm must not be empty".into(),
            ));
        }
        match self.issuer.default_ttl_secs {
            Some(0) => {
                return Err(RootError::Config(
                    "issuer.default_ttl_secs must be > 0 when set".into(),
                ))
            }
            Some(ttl) if ttl > MAX_TTL_SECS => {
                return Err(RootError::Config(format!(
                    "issuer.default_ttl_secs must be at most {}, got {}",
                    MAX_TTL_SECS, ttl
                )))
            }
            _ => {}
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".vitae/config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.issuer.address.is_empty());
        assert_eq!(config.issuer.default_ttl_secs, None);
        assert_eq!(config.issuer.schema_version, 1);
        assert_eq!(config.issuer.signature_algorithm, "ES256K");
        assert_eq!(config.revocation.list_size, 131_072);
        assert_eq!(config.revocation.purpose, StatusPurpose::Revocation);
        assert_eq!(config.revocation.list_base_uri, "urn:vitae:status-list");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[issuer]
address = "0xclinic"
default_ttl_secs = 7776000
signature_algorithm = "EdDSA"

[revocation]
list_size = 4096
purpose = "suspension"
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.issuer.address, "0xclinic");
        assert_eq!(config.issuer.default_ttl_secs, Some(7_776_000));
        assert_eq!(config.issuer.schema_version, 1);
        assert_eq!(config.issuer.signature_algorithm, "EdDSA");
        assert_eq!(config.revocation.list_size, 4096);
        assert_eq!(config.revocation.purpose, StatusPurpose::Suspension);
        assert_eq!(config.revocation.list_base_uri, "urn:vitae:status-list");
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_config_validate_list_size() {
        let mut config = EngineConfig::default();
        config.revocation.list_size = 0;
        assert!(config.validate().is_err());
        config.revocation.list_size = 1001;
        assert!(config.validate().is_err());
        config.revocation.list_size = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_ttl() {
        let mut config = EngineConfig::default();
        config.issuer.default_ttl_secs = Some(0);
        assert!(config.validate().is_err());
        config.issuer.default_ttl_secs = Some(MAX_TTL_SECS + 1);
        assert!(config.validate().is_err());
        config.issuer.default_ttl_secs = Some(3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_strings() {
        let mut config = EngineConfig::default();
        config.revocation.list_base_uri = " ".into();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.issuer.signature_algorithm = String::new();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.issuer.schema_version = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EngineConfig::load(Path::new("/nonexistent/vitae.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_config_load_rejects_invalid_values() {
        let dir = std::env::temp_dir().join("vitae-test-config-invalid");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[revocation]\nlist_size = 12\n").unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, RootError::Config(_)));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = std::env::temp_dir().join("vitae-test-config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let config = EngineConfig {
            issuer: IssuerConfig {
                address: "0xclinic".into(),
                default_ttl_secs: Some(86_400),
                schema_version: 2,
                signature_algorithm: "ES256K".into(),
            },
            revocation: RevocationConfig {
                list_size: 2048,
                purpose: StatusPurpose::Suspension,
                list_base_uri: "https://status.example/lists".into(),
            },
        };

        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_default_config_path() {
        let path = EngineConfig::default_config_path();
        assert!(path.to_str().unwrap().ends_with(".vitae/config.toml"));
    }
}
