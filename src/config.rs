use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Execution switches read by every cursor through its `QueryContext`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub log_execution: bool,
    pub taps_enabled: bool,
    // taps on `next()`, the hot path
    pub tap_next_enabled: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            log_execution: false,
            taps_enabled: true,
            tap_next_enabled: false,
        }
    }
}

impl ExecutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::Error;

    #[test]
    fn partial_toml_test() {
        let config = ExecutionConfig::from_toml_str("log_execution = true").unwrap();
        assert!(config.log_execution);
        assert!(config.taps_enabled);
        assert!(!config.tap_next_enabled);
    }

    #[test]
    fn to_toml_test() {
        let text = ExecutionConfig::default().to_toml().unwrap();
        assert!(text.contains("taps_enabled = true"));
        assert_eq!(ExecutionConfig::from_toml_str(&text).unwrap(), ExecutionConfig::default());
    }

    #[test]
    fn bad_toml_test() {
        let res = ExecutionConfig::from_toml_str("log_execution = 3");
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[test]
    fn file_test() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let config = ExecutionConfig {
            log_execution: true,
            taps_enabled: false,
            tap_next_enabled: true,
        };
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();
        let loaded = ExecutionConfig::from_file(file.path()).unwrap();
        assert_eq!(config, loaded);

        let missing = ExecutionConfig::from_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
