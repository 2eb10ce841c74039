//! Configuration file handling.
//!
//! Settings come from `.celulas.toml` and are then overridden by explicit
//! command-line flags.

use crate::cli::{Args, Command};
use crate::snapshot::PeriodPreset;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = ".celulas.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Where the snapshot is read from.
    #[serde(default)]
    pub data: DataConfig,

    /// Summarization endpoint.
    #[serde(default)]
    pub insight: InsightConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Period used when no period flag is given.
    #[serde(default)]
    pub period: PeriodPreset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory of JSON table exports.
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,

    /// SQLite store. When set, reads come from the store instead of `dir`.
    #[serde(default)]
    pub database: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
            database: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    #[serde(default = "default_insight_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            endpoint: default_insight_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_insight_endpoint() -> String {
    "http://localhost:54321/functions/v1/generate-insights".to_string()
}

fn default_api_key_env() -> String {
    "CELULAS_INSIGHT_KEY".to_string()
}

fn default_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Rows shown by `ranking` when `--limit` is not given.
    #[serde(default = "default_ranking_limit")]
    pub ranking_limit: usize,

    /// Submission-rate gate applied by `dashboard`.
    #[serde(default)]
    pub min_submission_rate: Option<u32>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            ranking_limit: default_ranking_limit(),
            min_submission_rate: None,
        }
    }
}

fn default_ranking_limit() -> usize {
    20
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `.celulas.toml` from the current directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Apply flags given on the command line. Absent flags keep file values.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref dir) = args.data {
            self.data.dir = dir.clone();
        }
        if let Some(ref db) = args.db {
            self.data.database = Some(db.clone());
        }
        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            Command::Dashboard {
                min_submission_rate: Some(rate),
                ..
            } => self.report.min_submission_rate = Some(*rate),
            Command::Ranking {
                limit: Some(limit), ..
            } => self.report.ranking_limit = *limit,
            Command::Insight {
                endpoint,
                timeout,
                ..
            } => {
                if let Some(url) = endpoint {
                    self.insight.endpoint = url.clone();
                }
                if let Some(secs) = timeout {
                    self.insight.timeout_seconds = *secs;
                }
            }
            _ => {}
        }
    }

    /// Default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.dir, PathBuf::from("data"));
        assert!(config.data.database.is_none());
        assert_eq!(config.report.ranking_limit, 20);
        assert_eq!(config.general.period, PeriodPreset::CurrentMonth);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true
period = "last-three-months"

[data]
database = "celulas.db"

[insight]
endpoint = "https://example.org/insights"

[report]
min_submission_rate = 80
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.general.period, PeriodPreset::LastThreeMonths);
        assert_eq!(config.data.dir, PathBuf::from("data"));
        assert_eq!(config.data.database, Some(PathBuf::from("celulas.db")));
        assert_eq!(config.insight.endpoint, "https://example.org/insights");
        assert_eq!(config.insight.timeout_seconds, 120);
        assert_eq!(config.report.min_submission_rate, Some(80));
    }

    #[test]
    fn test_merge_with_args() {
        let mut config = Config::default();
        config.report.min_submission_rate = Some(50);

        let mut args = make_args(Command::Dashboard {
            period: Default::default(),
            output: Default::default(),
            min_submission_rate: Some(90),
        });
        args.db = Some(PathBuf::from("/tmp/celulas.db"));

        config.merge_with_args(&args);
        assert_eq!(config.report.min_submission_rate, Some(90));
        assert_eq!(config.data.database, Some(PathBuf::from("/tmp/celulas.db")));
        assert_eq!(config.data.dir, PathBuf::from("data"));
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[data]"));
        assert!(toml_str.contains("[insight]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.report.ranking_limit, 20);
    }
}
