//! Umbrella analysis configuration with TOML loading
//!
//! One file carries every calibration constant the analysis consumes:
//!
//! ```toml
//! [deadtime]
//! reconcile_tolerance = 0.2
//!
//! [gti]
//! step = 1e-4
//! ```
//!
//! Sections and fields are all optional; anything absent takes its default.

use crate::deadtime::DeadTimeConfig;
use crate::gti::GtiParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Full analysis configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub deadtime: DeadTimeConfig,
    pub gti: GtiParams,
}

impl AnalysisConfig {
    /// Load from a TOML file
    pub fn from_toml_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: AnalysisConfig =
            toml::from_str(&text).with_context(|| format!("malformed config {}", path.display()))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.deadtime.validate()?;
        self.gti.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[deadtime]").unwrap();
        writeln!(file, "reconcile_tolerance = 0.05").unwrap();
        file.flush().unwrap();

        let config = AnalysisConfig::from_toml_path(file.path()).unwrap();
        assert_eq!(config.deadtime.reconcile_tolerance, 0.05);
        assert_eq!(config.gti, GtiParams::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[gti]").unwrap();
        writeln!(file, "step = -1.0").unwrap();
        file.flush().unwrap();
        assert!(AnalysisConfig::from_toml_path(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file_is_error() {
        assert!(AnalysisConfig::from_toml_path(Path::new("/nonexistent/lapso.toml")).is_err());
    }
}
