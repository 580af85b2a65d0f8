//! Configuration parsing and structures

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::env::substitute_env_vars;

/// Endpoint used when a configuration does not name one
pub const DEFAULT_ENDPOINT: &str = "s3.amazonaws.com";

/// Name looked up when no configuration name is given
pub const DEFAULT_CONFIGURATION_NAME: &str = "default";

// =============================================================================
// Credentials / connection parameters
// =============================================================================

/// Request signing scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureVersion {
    #[default]
    V2,
    V4,
}

impl FromStr for SignatureVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v2" => Ok(SignatureVersion::V2),
            "v4" => Ok(SignatureVersion::V4),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown signature version '{}' (expected v2 or v4)",
                other
            ))),
        }
    }
}

impl fmt::Display for SignatureVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureVersion::V2 => f.write_str("v2"),
            SignatureVersion::V4 => f.write_str("v4"),
        }
    }
}

/// Connection parameters for an object store.
///
/// Built once with the `with_*` methods and never mutated afterwards. This is
/// the part of a driver that is persisted when a handle is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    access_key: String,
    secret_key: String,
    #[serde(default)]
    signature: SignatureVersion,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default = "default_use_ssl")]
    use_ssl: bool,
    #[serde(default)]
    use_legacy_path_style: bool,
}

fn default_use_ssl() -> bool {
    true
}

impl Configuration {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            signature: SignatureVersion::default(),
            region: None,
            endpoint: None,
            use_ssl: default_use_ssl(),
            use_legacy_path_style: false,
        }
    }

    pub fn with_signature(mut self, signature: SignatureVersion) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region;
        self
    }

    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_legacy_path_style(mut self, legacy: bool) -> Self {
        self.use_legacy_path_style = legacy;
        self
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn signature(&self) -> SignatureVersion {
        self.signature
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Endpoint host, falling back to [`DEFAULT_ENDPOINT`]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Endpoint only when one was configured explicitly
    pub fn custom_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn is_ssl(&self) -> bool {
        self.use_ssl
    }

    pub fn use_legacy_path_style(&self) -> bool {
        self.use_legacy_path_style
    }

    /// Scheme-qualified endpoint URL, e.g. `https://s3.amazonaws.com`
    pub fn endpoint_url(&self) -> String {
        let endpoint = self.endpoint();
        if endpoint.contains("://") {
            return endpoint.to_string();
        }
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}", scheme, endpoint)
    }
}

/// A configuration paired with the bucket it addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedConfiguration {
    pub configuration: Configuration,
    pub bucket: String,
}

// =============================================================================
// Option lookup
// =============================================================================

/// Source of named option maps, used to resolve a default driver.
pub trait ConfigurationProvider: Send + Sync {
    /// Raw option value stored under `name`, if any
    fn option(&self, name: &str) -> Option<&Value>;

    /// Top-level fallback consulted for the default name
    fn fallback(&self) -> Option<&Value> {
        None
    }
}

/// Resolve a named configuration.
///
/// Returns `None` when the option is absent or malformed: a missing
/// default configuration is not an error, the caller decides.
pub fn resolve_named(
    provider: &dyn ConfigurationProvider,
    name: Option<&str>,
) -> Option<NamedConfiguration> {
    let name = name.unwrap_or(DEFAULT_CONFIGURATION_NAME);
    let mut option = provider.option(name);
    if option.is_none() && (name.is_empty() || name == DEFAULT_CONFIGURATION_NAME) {
        option = provider.fallback();
    }
    let map = option?.as_mapping()?;

    let access = string_field(map, "key").or_else(|| string_field(map, "access"))?;
    let secret = string_field(map, "secret")?;
    let bucket = string_field(map, "bucket")?;

    let mut configuration = Configuration::new(access, secret);
    if let Some(signature) = string_field(map, "signature").filter(|s| !s.is_empty()) {
        match signature.parse() {
            Ok(signature) => configuration = configuration.with_signature(signature),
            Err(e) => {
                tracing::warn!("configuration '{}': {}", name, e);
                return None;
            }
        }
    }
    if let Some(region) = string_field(map, "region").filter(|s| !s.is_empty()) {
        configuration = configuration.with_region(Some(region.to_string()));
    }
    if let Some(endpoint) = string_field(map, "endpoint").filter(|s| !s.is_empty()) {
        configuration = configuration.with_endpoint(Some(endpoint.to_string()));
    }
    if let Some(value) = map.get("use_ssl") {
        configuration = configuration.with_ssl(loose_bool(value));
    }
    if let Some(value) = map.get("legacy_style_path") {
        configuration = configuration.with_legacy_path_style(loose_bool(value));
    }

    Some(NamedConfiguration {
        configuration,
        bucket: bucket.to_string(),
    })
}

pub(crate) fn string_field<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

/// Truthiness for named option maps: anything but null, false, 0, "", "0"
/// and empty collections.
pub fn loose_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Sequence(s) => !s.is_empty(),
        Value::Mapping(m) => !m.is_empty(),
        Value::Tagged(t) => loose_bool(&t.value),
    }
}

/// Truthiness for storage definitions: only 1, true, "1", "on", "yes", "true"
pub fn strict_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => matches!(s.as_str(), "1" | "on" | "yes" | "true"),
        _ => false,
    }
}

// =============================================================================
// Config file
// =============================================================================

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fallback configuration used for the default name
    #[serde(default)]
    pub configuration: Option<Value>,

    /// Named connection configurations
    #[serde(default)]
    pub configurations: BTreeMap<String, Value>,

    /// Named storage mounts
    #[serde(default)]
    pub storages: BTreeMap<String, Mapping>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.clone(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string, substituting `${VAR}` references
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let content = substitute_env_vars(content)?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, storage) in &self.storages {
            match string_field(storage, "type") {
                Some("public") | Some("protected") | Some("private") => {}
                Some(other) => {
                    return Err(ConfigError::ValidationError(format!(
                        "Storage '{}': unknown type '{}'",
                        name, other
                    )))
                }
                None => {
                    return Err(ConfigError::ValidationError(format!(
                        "Storage '{}': 'type' must be a string",
                        name
                    )))
                }
            }
        }

        Ok(())
    }

    /// Storage definition by name
    pub fn storage(&self, name: &str) -> Option<&Mapping> {
        self.storages.get(name)
    }
}

impl ConfigurationProvider for Config {
    fn option(&self, name: &str) -> Option<&Value> {
        self.configurations.get(name)
    }

    fn fallback(&self) -> Option<&Value> {
        self.configuration.as_ref()
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_defaults() {
        let c = Configuration::new("AK", "SK");
        assert_eq!(c.access_key(), "AK");
        assert_eq!(c.secret_key(), "SK");
        assert_eq!(c.signature(), SignatureVersion::V2);
        assert_eq!(c.region(), None);
        assert_eq!(c.endpoint(), DEFAULT_ENDPOINT);
        assert!(c.is_ssl());
        assert!(!c.use_legacy_path_style());
        assert_eq!(c.endpoint_url(), "https://s3.amazonaws.com");
    }

    #[test]
    fn test_endpoint_url_respects_ssl_flag() {
        let c = Configuration::new("AK", "SK")
            .with_endpoint(Some("minio.local:9000".to_string()))
            .with_ssl(false);
        assert_eq!(c.endpoint_url(), "http://minio.local:9000");

        let c = c.with_endpoint(Some("http://already:1".to_string()));
        assert_eq!(c.endpoint_url(), "http://already:1");
    }

    #[test]
    fn test_parse_named_configurations() {
        let yaml = r#"
logging:
  level: debug

configurations:
  default:
    key: AKIA
    secret: s3cr3t
    bucket: assets
    signature: v4
    region: eu-west-1
    endpoint: s3.example.com
    use_ssl: 0
    legacy_style_path: "yes"
  backups:
    access: BACKUP
    secret: other
    bucket: backups
"#;

        let config = Config::from_str(yaml).unwrap();
        assert_eq!(config.logging.level, "debug");

        let named = resolve_named(&config, None).unwrap();
        assert_eq!(named.bucket, "assets");
        let c = &named.configuration;
        assert_eq!(c.access_key(), "AKIA");
        assert_eq!(c.signature(), SignatureVersion::V4);
        assert_eq!(c.region(), Some("eu-west-1"));
        assert_eq!(c.endpoint(), "s3.example.com");
        assert!(!c.is_ssl());
        assert!(c.use_legacy_path_style());

        let backups = resolve_named(&config, Some("backups")).unwrap();
        assert_eq!(backups.configuration.access_key(), "BACKUP");
        assert_eq!(backups.bucket, "backups");
    }

    #[test]
    fn test_default_falls_back_to_top_level_configuration() {
        let yaml = r#"
configuration:
  key: TOP
  secret: level
  bucket: fallback
"#;
        let config = Config::from_str(yaml).unwrap();
        let named = resolve_named(&config, Some("default")).unwrap();
        assert_eq!(named.bucket, "fallback");

        // Non-default names never fall back
        assert!(resolve_named(&config, Some("other")).is_none());
    }

    #[test]
    fn test_malformed_configuration_is_absent() {
        let yaml = r#"
configurations:
  default:
    key: only-key
    bucket: b
  scalar: "not a map"
  numeric:
    key: 12
    secret: s
    bucket: b
"#;
        let config = Config::from_str(yaml).unwrap();
        assert!(resolve_named(&config, None).is_none());
        assert!(resolve_named(&config, Some("scalar")).is_none());
        assert!(resolve_named(&config, Some("numeric")).is_none());
        assert!(resolve_named(&Config::default(), None).is_none());
    }

    #[test]
    fn test_bool_flavours() {
        assert!(loose_bool(&Value::String("off".into())));
        assert!(!loose_bool(&Value::String("0".into())));
        assert!(!loose_bool(&Value::String(String::new())));
        assert!(!loose_bool(&Value::Null));

        assert!(strict_bool(&Value::String("on".into())));
        assert!(strict_bool(&Value::Number(1.into())));
        assert!(!strict_bool(&Value::String("off".into())));
        assert!(!strict_bool(&Value::Number(2.into())));
        assert!(!strict_bool(&Value::String("TRUE".into())));
    }

    #[test]
    fn test_validate_storage_types() {
        let yaml = r#"
storages:
  assets:
    type: public
    key: k
    secret: s
    bucket: b
  broken:
    type: shared
"#;
        let config = Config::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broken"), "{}", err);
    }

    #[test]
    fn test_env_substitution_in_file() {
        std::env::set_var("BUCKET_FS_TEST_SECRET", "from-env");
        let yaml = r#"
configurations:
  default:
    key: k
    secret: ${BUCKET_FS_TEST_SECRET}
    bucket: b
"#;
        let config = Config::from_str(yaml).unwrap();
        let named = resolve_named(&config, None).unwrap();
        assert_eq!(named.configuration.secret_key(), "from-env");
        std::env::remove_var("BUCKET_FS_TEST_SECRET");
    }

    #[test]
    fn test_signature_parse() {
        assert_eq!("V4".parse::<SignatureVersion>().unwrap(), SignatureVersion::V4);
        assert!("v3".parse::<SignatureVersion>().is_err());
    }
}
