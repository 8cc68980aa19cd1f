use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ReadsError;
use crate::eutils::DEFAULT_EUTILS_BASE;

pub const DEFAULT_CONFIG_FILE: &str = "sra-reads.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub eutils_base_url: Option<String>,
    /// Maximum UIDs per E-utilities request. Unset sends each stage as one
    /// request.
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub bioprojects: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub eutils_base_url: String,
    pub batch_size: Option<usize>,
    pub timeout: Duration,
    pub bioprojects: Vec<String>,
}

impl ResolvedConfig {
    /// Config projects first, then `extra`, without duplicates.
    pub fn bioprojects_with(&self, extra: &[String]) -> Vec<String> {
        unique_accessions(self.bioprojects.iter().chain(extra))
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ReadsError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ReadsError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ReadsError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ReadsError> {
        let schema_version = config.schema_version.unwrap_or(SCHEMA_VERSION);
        if schema_version != SCHEMA_VERSION {
            return Err(ReadsError::ConfigParse(format!(
                "unsupported schema_version {schema_version} (expected {SCHEMA_VERSION})"
            )));
        }
        if let Some(0) = config.batch_size {
            return Err(ReadsError::InvalidBatchSize(0));
        }

        Ok(ResolvedConfig {
            schema_version,
            eutils_base_url: config
                .eutils_base_url
                .unwrap_or_else(|| DEFAULT_EUTILS_BASE.to_string()),
            batch_size: config.batch_size,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            bioprojects: unique_accessions(&config.bioprojects),
        })
    }
}

fn unique_accessions<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty() && seen.insert(value.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.eutils_base_url, DEFAULT_EUTILS_BASE);
        assert_eq!(resolved.batch_size, None);
        assert_eq!(resolved.timeout, Duration::from_secs(60));
        assert!(resolved.bioprojects.is_empty());
    }

    #[test]
    fn bioprojects_are_merged_without_duplicates() {
        let config = Config {
            bioprojects: vec!["PRJNA1".to_string(), " PRJNA2 ".to_string(), "PRJNA1".to_string()],
            ..Config::default()
        };
        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.bioprojects, vec!["PRJNA1", "PRJNA2"]);
        let merged = resolved.bioprojects_with(&["PRJNA2".to_string(), "PRJNA3".to_string()]);
        assert_eq!(merged, vec!["PRJNA1", "PRJNA2", "PRJNA3"]);
    }
}
