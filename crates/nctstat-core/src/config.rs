/// Pipeline configuration, loadable from a JSON file.
///
/// Every field has a default, so a config file only needs the values it
/// overrides:
///
/// ```json
/// { "file_cache": { "window_hours": 48 }, "target_institution_code": "421" }
/// ```
use crate::error::{ProcessError, Result};
use crate::vocabulary::TARGET_INSTITUTION_CODE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default dedup window for whole files.
pub const DEFAULT_FILE_WINDOW_HOURS: u32 = 24;
/// Default number of file digests retained.
pub const DEFAULT_FILE_CAPACITY: usize = 1_000;
/// Default dedup window for row identities.
pub const DEFAULT_ROW_WINDOW_HOURS: u32 = 1;
/// Default number of row digests retained.
pub const DEFAULT_ROW_CAPACITY: usize = 100_000;

/// Limits for one [`HashCache`](crate::dedup::HashCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
    pub window_hours: u32,
}

impl CacheConfig {
    pub fn file_default() -> Self {
        Self {
            capacity: DEFAULT_FILE_CAPACITY,
            window_hours: DEFAULT_FILE_WINDOW_HOURS,
        }
    }

    pub fn row_default() -> Self {
        Self {
            capacity: DEFAULT_ROW_CAPACITY,
            window_hours: DEFAULT_ROW_WINDOW_HOURS,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.capacity == 0 {
            return Err(ProcessError::Config(format!("{name}.capacity must be > 0")));
        }
        if self.window_hours == 0 {
            return Err(ProcessError::Config(format!(
                "{name}.window_hours must be > 0"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineConfig {
    pub file_cache: CacheConfig,
    pub row_cache: CacheConfig,
    /// Only first-choice specializations tagged with this code are counted.
    pub target_institution_code: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            file_cache: CacheConfig::file_default(),
            row_cache: CacheConfig::row_default(),
            target_institution_code: TARGET_INSTITUTION_CODE.to_owned(),
        }
    }
}

/// A cache section as written in a config file; omitted fields fall back
/// to the matching cache's default, not to a zeroed value.
#[derive(Deserialize)]
struct CacheConfigPatch {
    capacity: Option<usize>,
    window_hours: Option<u32>,
}

impl CacheConfigPatch {
    fn apply(self, base: CacheConfig) -> CacheConfig {
        CacheConfig {
            capacity: self.capacity.unwrap_or(base.capacity),
            window_hours: self.window_hours.unwrap_or(base.window_hours),
        }
    }
}

#[derive(Deserialize)]
struct PipelineConfigFile {
    file_cache: Option<CacheConfigPatch>,
    row_cache: Option<CacheConfigPatch>,
    target_institution_code: Option<String>,
}

impl PipelineConfig {
    /// Parse a JSON config document, filling omitted fields from defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: PipelineConfigFile = serde_json::from_str(text)
            .map_err(|e| ProcessError::Config(format!("invalid config JSON: {e}")))?;
        let defaults = Self::default();
        let config = Self {
            file_cache: match file.file_cache {
                Some(patch) => patch.apply(defaults.file_cache),
                None => defaults.file_cache,
            },
            row_cache: match file.row_cache {
                Some(patch) => patch.apply(defaults.row_cache),
                None => defaults.row_cache,
            },
            target_institution_code: file
                .target_institution_code
                .unwrap_or(defaults.target_institution_code),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ProcessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.file_cache.validate("file_cache")?;
        self.row_cache.validate("row_cache")?;
        if self.target_institution_code.trim().is_empty() {
            return Err(ProcessError::Config(
                "target_institution_code must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.target_institution_code, "421");
    }

    /// A partial cache section keeps the *matching* default for the
    /// omitted field (row cache capacity stays 100 000, not 1 000).
    #[test]
    fn partial_sections_merge_with_their_own_defaults() {
        let config = PipelineConfig::from_json(
            r#"{ "file_cache": { "window_hours": 48 }, "row_cache": { "window_hours": 2 } }"#,
        )
        .unwrap();
        assert_eq!(config.file_cache.window_hours, 48);
        assert_eq!(config.file_cache.capacity, DEFAULT_FILE_CAPACITY);
        assert_eq!(config.row_cache.window_hours, 2);
        assert_eq!(config.row_cache.capacity, DEFAULT_ROW_CAPACITY);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = PipelineConfig::from_json(r#"{ "row_cache": { "capacity": 0 } }"#).unwrap_err();
        assert!(matches!(err, ProcessError::Config(ref m) if m.contains("row_cache.capacity")));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = PipelineConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ProcessError::Config(_)));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nctstat.json");
        std::fs::write(&path, r#"{ "target_institution_code": "045" }"#).unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.target_institution_code, "045");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = PipelineConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ProcessError::Io { .. }));
    }
}
