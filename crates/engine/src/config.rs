use chronicle_codec::CodecConfig;
use chronicle_common::{DEFAULT_BRANCH, DEFAULT_PAGE_LIMIT};
use chronicle_kernel::ChangeGranularity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors from loading engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings. Missing keys fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Branch recorded on versions created without an explicit branch.
    pub default_branch: String,
    /// Page size when a listing asks for zero items.
    pub default_page_limit: usize,
    /// Upper bound on any page size.
    pub max_page_limit: usize,
    /// How new content is encoded.
    pub codec: CodecConfig,
    pub change_granularity: ChangeGranularity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_branch: DEFAULT_BRANCH.to_string(),
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: 500,
            codec: CodecConfig::default(),
            change_granularity: ChangeGranularity::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&raw)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded engine config");
        Ok(config)
    }

    /// Effective page size for a requested `limit`.
    pub fn page_limit(&self, limit: usize) -> usize {
        let limit = if limit == 0 {
            self.default_page_limit
        } else {
            limit
        };
        limit.min(self.max_page_limit)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_branch.trim().is_empty() {
            return Err(ConfigError::Invalid("default_branch must not be empty".into()));
        }
        if self.default_page_limit == 0 || self.max_page_limit == 0 {
            return Err(ConfigError::Invalid("page limits must be positive".into()));
        }
        if self.default_page_limit > self.max_page_limit {
            return Err(ConfigError::Invalid(format!(
                "default_page_limit {} exceeds max_page_limit {}",
                self.default_page_limit, self.max_page_limit
            )));
        }
        if !(1..=22).contains(&self.codec.zstd_level) {
            return Err(ConfigError::Invalid(format!(
                "zstd_level {} outside 1..=22",
                self.codec.zstd_level
            )));
        }
        Ok(())
    }
}
