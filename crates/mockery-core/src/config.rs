//! Harness configuration
//!
//! Loaded from TOML, then overridden by `MOCKERY_*` environment variables, then by
//! whatever the caller sets explicitly. Every field has a default, so an empty file
//! is a valid configuration.

use crate::allocation::DEFAULT_ALLOC_FILL;
use crate::errors::{MockeryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Prefix of environment overrides, e.g. `MOCKERY_HEAP_LIMIT=4096`
pub const ENV_PREFIX: &str = "MOCKERY_";

/// How suite results are rendered by the command-line runner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Human-readable diagnostic lines
    #[default]
    Text,
    /// One JSON document with every suite report
    Json,
}

impl FromStr for ReportFormat {
    type Err = MockeryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(MockeryError::config(format!("unknown report format: {other}"))),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Runner and session settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Cap on bytes held by tracked blocks; allocations beyond it return `None`
    pub heap_limit: Option<usize>,
    /// Pattern written into new non-zeroed blocks
    pub alloc_fill: u8,
    /// Output rendering for the command-line runner
    pub report_format: ReportFormat,
    /// Suppress per-item start/completion lines
    pub quiet: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            heap_limit: None,
            alloc_fill: DEFAULT_ALLOC_FILL,
            report_format: ReportFormat::Text,
            quiet: false,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MockeryError::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MOCKERY_*` overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `MOCKERY_*` overrides from an explicit variable list
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            if let Some(setting) = key.as_ref().strip_prefix(ENV_PREFIX) {
                self.set_from_string(&setting.to_ascii_lowercase(), value.as_ref())?;
            }
        }
        self.validate()
    }

    /// Set one setting from its string form
    pub fn set_from_string(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = |e: &dyn fmt::Display| {
            MockeryError::config(format!("invalid value {value:?} for {key}: {e}"))
        };
        match key {
            "heap_limit" => {
                self.heap_limit = match value {
                    "" | "none" => None,
                    limit => Some(limit.parse().map_err(|e| invalid(&e))?),
                };
            }
            "alloc_fill" => {
                self.alloc_fill = match value.strip_prefix("0x") {
                    Some(hex) => u8::from_str_radix(hex, 16).map_err(|e| invalid(&e))?,
                    None => value.parse().map_err(|e| invalid(&e))?,
                };
            }
            "report_format" => self.report_format = value.parse()?,
            "quiet" => self.quiet = value.parse().map_err(|e| invalid(&e))?,
            other => {
                return Err(MockeryError::config(format!("unknown setting: {other}")));
            }
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.heap_limit == Some(0) {
            return Err(MockeryError::config(
                "heap_limit must be positive; omit it for no limit",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.alloc_fill, 0xBA);
        assert_eq!(config.heap_limit, None);
        assert_eq!(config.report_format, ReportFormat::Text);
        assert_eq!(HarnessConfig::from_toml_str("").unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "heap_limit = 4096\nreport_format = \"json\"\nquiet = true").unwrap();

        let config = HarnessConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.heap_limit, Some(4096));
        assert_eq!(config.report_format, ReportFormat::Json);
        assert!(config.quiet);
    }

    #[test]
    fn test_unknown_keys_and_zero_limit_rejected() {
        assert!(HarnessConfig::from_toml_str("colour = true").is_err());
        assert!(matches!(
            HarnessConfig::from_toml_str("heap_limit = 0"),
            Err(MockeryError::Config { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = HarnessConfig::default();
        config
            .merge_with_vars([
                ("MOCKERY_HEAP_LIMIT", "128"),
                ("MOCKERY_ALLOC_FILL", "0xcd"),
                ("MOCKERY_REPORT_FORMAT", "JSON"),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.heap_limit, Some(128));
        assert_eq!(config.alloc_fill, 0xCD);
        assert_eq!(config.report_format, ReportFormat::Json);

        assert!(config.merge_with_vars([("MOCKERY_QUIET", "maybe")]).is_err());
        assert!(config.merge_with_vars([("MOCKERY_BOGUS", "1")]).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = HarnessConfig::load_from_file(Path::new("/nonexistent/mockery.toml"));
        assert!(err.is_err());
    }
}
