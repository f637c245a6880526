//! Analysis configuration
//!
//! Strategy values handed to the scheduler at construction time. Nothing in
//! the analyses reads configuration from globals or the environment.

use anyhow::{Context, Result};
use dlog_core::TypeAnalysisConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub type_analysis: TypeAnalysisConfig,
    /// Treat any clause that fails to type as a fatal error
    pub fail_on_type_error: bool,
}

impl AnalysisConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        Ok(config)
    }

    pub fn with_debug_report(mut self, enabled: bool) -> Self {
        self.type_analysis.debug_report = enabled;
        self
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            type_analysis: TypeAnalysisConfig::default(),
            fail_on_type_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert!(config.fail_on_type_error);
        assert!(!config.type_analysis.debug_report);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AnalysisConfig::from_json(r#"{"type_analysis": {"debug_report": true}}"#).unwrap();
        assert!(config.type_analysis.debug_report);
        assert!(config.fail_on_type_error);

        let config = AnalysisConfig::from_json(r#"{"fail_on_type_error": false}"#).unwrap();
        assert!(!config.fail_on_type_error);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"fail_on_type_error": false}}"#).unwrap();
        let config = AnalysisConfig::from_file(file.path()).unwrap();
        assert!(!config.fail_on_type_error);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = AnalysisConfig::from_file(Path::new("/nonexistent/dlog.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/dlog.json"));
    }

    #[test]
    fn test_with_debug_report() {
        let config = AnalysisConfig::default().with_debug_report(true);
        assert!(config.type_analysis.debug_report);
    }
}
