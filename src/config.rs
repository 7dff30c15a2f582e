//! Configuration structures and utilities

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default cell size in metres
pub const DEFAULT_CELL_SIZE: f64 = 0.34;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwatheConfig {
    /// Side length of a grid cell in metres
    pub cell_size: f64,
    /// Largest plan dimension of a single epoch's swept area before it is discarded as an outlier
    pub max_swath_extent: f64,
    /// Largest number of converted files a worker merges per aggregation epoch
    pub max_mapped_tag_files_per_aggregation_epoch: usize,
    /// Largest number of queued files the grouper hands out in one batch
    pub max_grouped_tag_files: usize,
    /// Fail the whole file when an epoch has no valid positions instead of skipping it
    pub reject_invalid_positions: bool,
    /// Submissions shorter than this many bytes are rejected
    pub min_tag_file_length: usize,
    /// Directory site models are persisted to; in-memory only when unset
    pub site_model_dir: Option<String>,
}

impl Default for SwatheConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            max_swath_extent: 100.0,
            max_mapped_tag_files_per_aggregation_epoch: 20,
            max_grouped_tag_files: 100,
            reject_invalid_positions: false,
            min_tag_file_length: 16,
            site_model_dir: None,
        }
    }
}

impl SwatheConfig {
    /// Load a JSON configuration file. Missing keys take their default values.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: SwatheConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.cell_size > 0.0) {
            return Err(Error::Config(format!(
                "cell_size must be positive, got {}",
                self.cell_size
            )));
        }
        if !(self.max_swath_extent > 0.0) {
            return Err(Error::Config(format!(
                "max_swath_extent must be positive, got {}",
                self.max_swath_extent
            )));
        }
        if self.max_mapped_tag_files_per_aggregation_epoch == 0 || self.max_grouped_tag_files == 0 {
            return Err(Error::Config("batch limits must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "cell_size": 0.5, "max_grouped_tag_files": 4 }}"#).unwrap();

        let config = SwatheConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.cell_size, 0.5);
        assert_eq!(config.max_grouped_tag_files, 4);
        assert_eq!(config.max_mapped_tag_files_per_aggregation_epoch, 20);
        assert!(config.site_model_dir.is_none());
    }

    #[test]
    fn test_invalid_cell_size_rejected() {
        let config = SwatheConfig {
            cell_size: 0.0,
            ..SwatheConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
