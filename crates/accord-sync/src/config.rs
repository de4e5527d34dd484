//! Harvest configuration: environment overrides + YAML rule files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::dedup::DedupConfig;
use crate::validation::ValidationRules;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid similarity_threshold: {0}. Must be in (0, 1]")]
    InvalidThreshold(f64),
    #[error("invalid date_tolerance_days: {0}. Cannot be negative")]
    NegativeTolerance(i64),
    #[error("{0} vocabulary is empty")]
    EmptyVocabulary(&'static str),
    #[error("invalid ACCORD_HARVEST_DATE '{0}'. Expected YYYY-MM-DD")]
    InvalidHarvestDate(String),
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub workspace_root: PathBuf,
    pub reports_dir: PathBuf,
    /// Restrict the run to sources for one country; `None` runs every enabled source.
    pub country_code: Option<String>,
    pub scheduler_enabled: bool,
    pub harvest_crons: Vec<String>,
    /// Fixed "today" for the future-date rule; defaults to the run's start date.
    pub harvest_date: Option<NaiveDate>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            reports_dir: PathBuf::from("reports"),
            country_code: None,
            scheduler_enabled: false,
            harvest_crons: vec!["0 0 5 * * Mon".to_string()],
            harvest_date: None,
        }
    }
}

impl HarvestConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let harvest_date = match std::env::var("ACCORD_HARVEST_DATE") {
            Ok(raw) => Some(
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .map_err(|_| ConfigError::InvalidHarvestDate(raw.clone()))?,
            ),
            Err(_) => None,
        };
        Ok(Self {
            workspace_root: std::env::var("ACCORD_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_root),
            reports_dir: std::env::var("ACCORD_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_dir),
            country_code: std::env::var("ACCORD_COUNTRY")
                .ok()
                .map(|v| v.trim().to_ascii_uppercase())
                .filter(|v| !v.is_empty()),
            scheduler_enabled: std::env::var("ACCORD_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false),
            harvest_crons: std::env::var("ACCORD_HARVEST_CRON")
                .map(|v| {
                    v.split(';')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or(defaults.harvest_crons),
            harvest_date,
        })
    }

    /// Reports directory resolved against the workspace root unless absolute.
    pub fn reports_root(&self) -> PathBuf {
        if self.reports_dir.is_absolute() {
            self.reports_dir.clone()
        } else {
            self.workspace_root.join(&self.reports_dir)
        }
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.workspace_root.join("rules")
    }
}

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn load_dedup_config(path: impl AsRef<Path>) -> Result<DedupConfig> {
    let config: DedupConfig = read_yaml(path.as_ref())?;
    config.validate()?;
    Ok(config)
}

pub fn load_validation_rules(path: impl AsRef<Path>) -> Result<ValidationRules> {
    let rules: ValidationRules = read_yaml(path.as_ref())?;
    rules.validate()?;
    Ok(rules)
}
