//! Dataset configuration. Validated by the functions that use it, never on load.

use crate::error::{BvhError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_bvh_extension() -> String {
    "bvh".to_string()
}

fn default_container_extension() -> String {
    "bvhc".to_string()
}

fn default_true() -> bool {
    true
}

/// Where to read .bvh files from, where to write containers to, and how to process them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    #[serde(default = "default_bvh_extension")]
    pub bvh_extension: String,
    #[serde(default = "default_container_extension")]
    pub container_extension: String,
    /// Joint to re-root every skeleton on before solving.
    #[serde(default)]
    pub new_root: Option<String>,
    /// Normalize positions relative to the root before solving.
    #[serde(default)]
    pub relative_positions: bool,
    /// Store the flattened world positions next to the raw tables.
    #[serde(default = "default_true")]
    pub store_world_motion: bool,
}

impl DatasetConfig {
    pub fn new(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        DatasetConfig {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
            bvh_extension: default_bvh_extension(),
            container_extension: default_container_extension(),
            new_root: None,
            relative_positions: false,
            store_world_motion: true,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BvhError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check the input directory and extensions, create the output directory if needed.
    pub fn validate(&self) -> Result<()> {
        if !self.raw_dir.is_dir() {
            return Err(BvhError::Config(format!(
                "raw data path does not exist: {:?}",
                self.raw_dir
            )));
        }
        for (what, ext) in [
            ("bvh_extension", &self.bvh_extension),
            ("container_extension", &self.container_extension),
        ] {
            if ext.trim_start_matches('.').is_empty() {
                return Err(BvhError::Config(format!("{what} is empty")));
            }
        }
        if self.bvh_extension.trim_start_matches('.') == self.container_extension.trim_start_matches('.') {
            return Err(BvhError::Config(
                "bvh_extension and container_extension must differ".to_string(),
            ));
        }
        if !self.processed_dir.exists() {
            tracing::info!("creating {:?}", self.processed_dir);
            std::fs::create_dir_all(&self.processed_dir)?;
        }
        Ok(())
    }

    pub fn is_bvh(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(self.bvh_extension.trim_start_matches('.')))
    }

    /// Container path for a given input file.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let mut file_name = input.file_stem().unwrap_or(input.as_os_str()).to_os_string();
        file_name.push(".");
        file_name.push(self.container_extension.trim_start_matches('.'));
        self.processed_dir.join(file_name)
    }
}
