use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. `~` is expanded.
    pub database_path: String,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub search: SearchConfig,
    pub report: ReportConfig,
    pub media_groups: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum files returned by one lookup.
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub page_size: usize,
    pub sessions: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub max_age_secs: u64,
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    fn validate(&self, section: &str) -> Result<()> {
        ensure!(self.capacity >= 1, "{section}.capacity must be at least 1");
        ensure!(self.max_age_secs >= 1, "{section}.max_age_secs must be at least 1");
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_data_dir()
                .join("tagstash.db")
                .to_string_lossy()
                .into_owned(),
            log_level: "tagstash=info".into(),
            search: SearchConfig::default(),
            report: ReportConfig::default(),
            media_groups: CacheConfig {
                capacity: 4096,
                max_age_secs: 60 * 60,
            },
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: crate::search::MAX_RESULTS,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            page_size: crate::report::DEFAULT_PAGE_SIZE,
            sessions: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            max_age_secs: 24 * 60 * 60,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "tagstash")
}

fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default config file location, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

impl Config {
    /// Load from `path`, or from the default location. A missing file yields
    /// the defaults; an unreadable or invalid one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would silently disable a feature.
    pub fn validate(&self) -> Result<()> {
        let max = crate::search::MAX_RESULTS;
        ensure!(
            (1..=max).contains(&self.search.limit),
            "search.limit must be between 1 and {max}, got {}",
            self.search.limit
        );
        ensure!(self.report.page_size >= 1, "report.page_size must be at least 1");
        self.report.sessions.validate("report.sessions")?;
        self.media_groups.validate("media_groups")
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database_path).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.search.limit, 50);
        assert_eq!(cfg.report.page_size, 10);
        assert_eq!(cfg.media_groups.max_age(), Duration::from_secs(3600));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml(
            r#"
            database_path = "~/stash/files.db"

            [report]
            page_size = 5

            [report.sessions]
            capacity = 16
            "#,
        )
        .unwrap();
        assert_eq!(cfg.report.page_size, 5);
        assert_eq!(cfg.report.sessions.capacity, 16);
        assert_eq!(cfg.report.sessions.max_age_secs, 24 * 60 * 60);
        assert!(cfg.database_path().ends_with("stash/files.db"));
    }

    #[test]
    fn missing_explicit_file_yields_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = Config::load(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.search.limit, 50);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "search = 3").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn search_limit_above_inline_cap_is_rejected() {
        let err = Config::from_toml("[search]\nlimit = 200").unwrap_err();
        assert!(err.to_string().contains("search.limit"));
        assert!(Config::from_toml("[search]\nlimit = 0").is_err());
        assert_eq!(Config::from_toml("[search]\nlimit = 50").unwrap().search.limit, 50);
    }

    #[test]
    fn zero_sizes_and_ages_are_rejected() {
        assert!(Config::from_toml("[report]\npage_size = 0").is_err());
        let err = Config::from_toml("[report.sessions]\nmax_age_secs = 0").unwrap_err();
        assert!(err.to_string().contains("report.sessions.max_age_secs"));
        assert!(Config::from_toml("[media_groups]\ncapacity = 0").is_err());
        assert!(Config::default().validate().is_ok());
    }
}
