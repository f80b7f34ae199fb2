use anyhow::{Context, Result};
use backlinks_core::{BacklogConfig, GraphConfig, LibraryConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of `backlinks.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacklinksConfig {
    pub storage: StorageSection,
    pub site: SiteSection,
    pub graph: GraphSection,
    pub backlog: BacklogSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub data_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    /// Links are resolved relative to this URL; only same-host links count.
    pub base_url: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSection {
    pub item_types: Vec<String>,
    pub statuses: Vec<String>,
    pub published_status: String,
    pub over_common_divisor: u64,
}

impl Default for GraphSection {
    fn default() -> Self {
        let graph = GraphConfig::default();
        Self {
            item_types: graph.item_types,
            statuses: graph.statuses,
            published_status: graph.published_status,
            over_common_divisor: graph.over_common_divisor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacklogSection {
    pub batch_size: usize,
    pub delay_secs: u64,
    pub lock_ttl_secs: u64,
    /// How often `backlinks worker` wakes up.
    pub poll_interval_secs: u64,
}

impl Default for BacklogSection {
    fn default() -> Self {
        let backlog = BacklogConfig::default();
        Self {
            batch_size: backlog.batch_size,
            delay_secs: backlog.delay.as_secs(),
            lock_ttl_secs: backlog.lock_ttl.as_secs(),
            poll_interval_secs: 15,
        }
    }
}

impl BacklinksConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join("backlinks.redb")
    }

    pub fn graph_config(&self) -> GraphConfig {
        let mut graph = GraphConfig::default();
        graph.item_types = self.graph.item_types.clone();
        graph.statuses = self.graph.statuses.clone();
        graph.published_status = self.graph.published_status.clone();
        graph.over_common_divisor = self.graph.over_common_divisor;
        graph
    }

    pub fn backlog_config(&self) -> BacklogConfig {
        BacklogConfig::new()
            .with_batch_size(self.backlog.batch_size)
            .with_delay(Duration::from_secs(self.backlog.delay_secs))
            .with_lock_ttl(Duration::from_secs(self.backlog.lock_ttl_secs))
    }

    pub fn library_config(&self) -> LibraryConfig {
        LibraryConfig {
            site_url: self.site.base_url.clone(),
            graph: self.graph_config(),
            backlog: self.backlog_config(),
        }
    }

    /// All problems found, empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let base = &self.site.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            errors.push(format!("site.base_url must be an http(s) URL, got '{}'", base));
        }
        if let Err(e) = self.graph_config().validate() {
            errors.push(format!("graph: {}", e));
        }
        if let Err(e) = self.backlog_config().validate() {
            errors.push(format!("backlog: {}", e));
        }
        if self.backlog.poll_interval_secs == 0 {
            errors.push("backlog.poll_interval_secs must be > 0".into());
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = BacklinksConfig::default();
        assert!(config.validate().is_empty());
        assert_eq!(config.db_path(), PathBuf::from("./data/backlinks.redb"));
        assert_eq!(config.backlog_config().batch_size, 20);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backlinks.toml");
        std::fs::write(
            &path,
            r#"
[site]
base_url = "https://blog.example.org/"

[backlog]
batch_size = 5
"#,
        )
        .unwrap();

        let config = BacklinksConfig::load(&path).unwrap();
        assert_eq!(config.site.base_url, "https://blog.example.org/");
        assert_eq!(config.backlog.batch_size, 5);
        assert_eq!(config.backlog.delay_secs, 60);
        assert_eq!(config.graph.item_types, vec!["post", "page"]);
    }

    #[test]
    fn test_validate_collects_errors() {
        let mut config = BacklinksConfig::default();
        config.site.base_url = "ftp://example.org".into();
        config.backlog.batch_size = 0;
        config.graph.over_common_divisor = 0;

        let errors = config.validate();
        assert_eq!(errors.len(), 3, "{:?}", errors);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = BacklinksConfig::load_or_default(Path::new("/nonexistent/backlinks.toml"));
        assert_eq!(config.site.base_url, "http://localhost/");
    }
}
