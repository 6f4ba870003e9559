//! Compiler configuration
//!
//! Loaded from a JSON file; every field has a default so an empty object is
//! a valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// Localization preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationConfig {
    /// Fallback language (default: "en_US")
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Languages a request may resolve to (default: ["en_US"])
    #[serde(default = "default_supported_languages")]
    pub supported_languages: Vec<String>,
}

fn default_language() -> String {
    "en_US".to_string()
}

fn default_supported_languages() -> Vec<String> {
    vec![default_language()]
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            default_language: default_language(),
            supported_languages: default_supported_languages(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when `BUCKETQL_LOG` is unset (default: "info")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Collection holding bucket metadata documents (default: "buckets")
    #[serde(default = "default_bucket_collection")]
    pub bucket_collection: String,

    /// Prefix of per-bucket data collections (default: "bucket_")
    #[serde(default = "default_data_collection_prefix")]
    pub data_collection_prefix: String,

    /// Collection holding caller identities (default: "identity")
    #[serde(default = "default_identity_collection")]
    pub identity_collection: String,

    /// Maximum relation hops resolved for one path (default: 8)
    #[serde(default = "default_max_relation_depth")]
    pub max_relation_depth: usize,

    #[serde(default)]
    pub localization: LocalizationConfig,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_bucket_collection() -> String {
    "buckets".to_string()
}

fn default_data_collection_prefix() -> String {
    "bucket_".to_string()
}

fn default_identity_collection() -> String {
    "identity".to_string()
}

fn default_max_relation_depth() -> usize {
    8
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            bucket_collection: default_bucket_collection(),
            data_collection_prefix: default_data_collection_prefix(),
            identity_collection: default_identity_collection(),
            max_relation_depth: default_max_relation_depth(),
            localization: LocalizationConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl CompilerConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> QueryResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| QueryError::config(format!("Failed to read config: {}", e)))?;

        let config: CompilerConfig = serde_json::from_str(&content)
            .map_err(|e| QueryError::config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> QueryResult<()> {
        if self.bucket_collection.is_empty() {
            return Err(QueryError::config("bucket_collection must not be empty"));
        }

        if self.max_relation_depth == 0 {
            return Err(QueryError::config("max_relation_depth must be > 0"));
        }

        let localization = &self.localization;
        if !localization
            .supported_languages
            .contains(&localization.default_language)
        {
            return Err(QueryError::config(format!(
                "default_language '{}' is not among supported_languages",
                localization.default_language
            )));
        }

        // an empty prefix lets a bucket id shadow the metadata collection
        if self.data_collection_prefix.is_empty() {
            return Err(QueryError::config("data_collection_prefix must not be empty"));
        }

        Ok(())
    }

    /// Name of the data collection for a bucket
    pub fn data_collection(&self, bucket_id: &str) -> String {
        format!("{}{}", self.data_collection_prefix, bucket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.bucket_collection, "buckets");
        assert_eq!(config.data_collection("posts"), "bucket_posts");
        assert_eq!(config.max_relation_depth, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_relation_depth": 3, "localization": {{"default_language": "tr_TR", "supported_languages": ["tr_TR", "en_US"]}}}}"#
        )
        .unwrap();

        let config = CompilerConfig::load(file.path()).unwrap();
        assert_eq!(config.max_relation_depth, 3);
        assert_eq!(config.localization.default_language, "tr_TR");
        assert_eq!(config.identity_collection, "identity");
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_relation_depth": 0}}"#).unwrap();
        assert!(matches!(
            CompilerConfig::load(file.path()),
            Err(QueryError::Config(_))
        ));

        let config = CompilerConfig {
            localization: LocalizationConfig {
                default_language: "de_DE".into(),
                supported_languages: vec!["en_US".into()],
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = CompilerConfig::load(Path::new("/nonexistent/bucketql.json"));
        assert!(matches!(result, Err(QueryError::Config(_))));
    }
}
