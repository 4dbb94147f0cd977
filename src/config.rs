use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Job-level settings not taken on the command line. Loaded from
/// `dflow.toml` (or the path in `DFLOW_CONFIG`); a missing file means
/// defaults.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JobConfig {
    /// Number of peer ranks the in-process cluster runs.
    #[serde(default = "default_ranks")]
    pub ranks: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            ranks: default_ranks(),
        }
    }
}

impl JobConfig {
    pub fn load() -> Result<Self> {
        let path = std::env::var("DFLOW_CONFIG").unwrap_or_else(|_| "dflow.toml".to_string());
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        let config: JobConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {path:?}"))?;
        Ok(config)
    }
}

fn default_ranks() -> usize {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = JobConfig::load_from_file("/nonexistent/dflow.toml").unwrap();
        assert_eq!(config.ranks, 2);
    }

    #[test]
    fn parses_rank_count() {
        let config: JobConfig = toml::from_str("ranks = 5").unwrap();
        assert_eq!(config.ranks, 5);
    }

    #[test]
    fn empty_config_uses_field_defaults() {
        let config: JobConfig = toml::from_str("").unwrap();
        assert_eq!(config.ranks, 2);
    }
}
