//! Batch conversion of a directory of .bvh files into containers.

use crate::config::DatasetConfig;
use crate::container::{self, ContainerData};
use crate::error::Result;
use crate::parse::load_bvh_from_file;
use crate::skeleton::Skeleton;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Default)]
pub struct ConvertSummary {
    pub converted: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Parse one .bvh file, apply the configured root handling, solve it and write the container.
pub fn convert_file(config: &DatasetConfig, input: &Path) -> Result<PathBuf> {
    let output = config.output_path(input);
    tracing::info!("Processing {:?} -> {:?}", input, output);

    let artifacts = load_bvh_from_file(input)?;
    let mut skeleton = Skeleton::new(&artifacts)?;
    if let Some(new_root) = &config.new_root {
        skeleton.set_new_root(new_root)?;
    }
    if config.relative_positions {
        skeleton.compute_relative_positions();
    }

    let mut data = ContainerData::from_skeleton(&skeleton);
    if config.store_world_motion {
        data = data.with_world_motion(&skeleton.forward_kinematics());
    }
    container::save(&output, &data)?;
    Ok(output)
}

/// Convert every .bvh file directly inside `config.raw_dir`. A file that fails is logged
/// and reported in the summary; the remaining files are still converted.
pub fn convert_dataset(config: &DatasetConfig) -> Result<ConvertSummary> {
    config.validate()?;

    let mut summary = ConvertSummary::default();
    for entry in WalkDir::new(&config.raw_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if !entry.file_type().is_file() || !config.is_bvh(path) {
            continue;
        }
        match convert_file(config, path) {
            Ok(output) => summary.converted.push(output),
            Err(e) => {
                tracing::warn!("Failed to convert {:?}: {}", path, e);
                summary.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    tracing::info!(
        converted = summary.converted.len(),
        failed = summary.failed.len(),
        "Processing complete!"
    );
    Ok(summary)
}
