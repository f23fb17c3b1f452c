use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_LEVELS: [usize; 2] = [20, 20];
const DEFAULT_CHILDREN_PER_LOAD: usize = 20;
const DEFAULT_LOAD_DELAY_MS: u64 = 2_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read engine config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse engine config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Engine configuration, read from a JSON file.
/// 引擎設定，自 JSON 檔案讀取。
///
/// Every section and field is optional; missing values fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub generator: GeneratorConfig,
}

/// Settings for [`ForestStore`](crate::ForestStore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Upper bound for a single child fetch; `None` waits indefinitely.
    pub load_timeout_ms: Option<u64>,
}

impl StoreConfig {
    pub fn load_timeout(&self) -> Option<Duration> {
        self.load_timeout_ms.map(Duration::from_millis)
    }
}

/// Settings for the sample data generator.
/// 範例資料產生器的設定。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Records per level, outermost first.
    pub levels: Vec<usize>,
    pub seed: u64,
    pub first_id: u64,
    pub children_per_load: usize,
    pub load_delay_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS.to_vec(),
            seed: 0,
            first_id: 0,
            children_per_load: DEFAULT_CHILDREN_PER_LOAD,
            load_delay_ms: DEFAULT_LOAD_DELAY_MS,
        }
    }
}

impl GeneratorConfig {
    pub fn load_delay(&self) -> Duration {
        Duration::from_millis(self.load_delay_ms)
    }
}

impl EngineConfig {
    /// Reads the config at `path`; a missing file yields the defaults.
    /// 讀取設定檔；檔案不存在時回傳預設值。
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let mut config: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.sanitize();
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, serde_json::Error> {
        let mut config: Self = serde_json::from_str(contents)?;
        config.sanitize();
        Ok(config)
    }

    fn sanitize(&mut self) {
        self.generator.levels.retain(|count| *count > 0);
        if self.store.load_timeout_ms == Some(0) {
            self.store.load_timeout_ms = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load(dir.path().join("engine.json")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.generator.levels, vec![20, 20]);
        assert_eq!(config.generator.load_delay(), Duration::from_secs(2));
        assert_eq!(config.store.load_timeout(), None);
    }

    #[test]
    fn partial_file_keeps_unspecified_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "store": {{ "load_timeout_ms": 500 }}, "generator": {{ "levels": [3, 0, 2] }} }}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.store.load_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.generator.levels, vec![3, 2]);
        assert_eq!(config.generator.children_per_load, 20);
    }

    #[test]
    fn malformed_file_reports_the_path() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let config = EngineConfig::from_json_str(r#"{ "store": { "load_timeout_ms": 0 } }"#).unwrap();
        assert_eq!(config.store.load_timeout(), None);
    }
}
