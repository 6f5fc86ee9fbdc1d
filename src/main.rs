//! bvh-skeleton - converts .bvh recordings and inspects skeletons

use anyhow::{Context, Result};
use bvh_skeleton::{container, convert_dataset, load_bvh_from_file, DatasetConfig, Skeleton};
use cgmath::Vector3;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "bvh-skeleton")]
#[command(about = "BVH skeleton parser and forward kinematics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every .bvh file of a directory into containers
    Convert {
        /// Directory holding the .bvh files
        raw_dir: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML dataset configuration (command line flags override it)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Re-root every skeleton on this joint
        #[arg(long)]
        root: Option<String>,

        /// Make positions relative to the root before solving
        #[arg(long)]
        relative: bool,
    },

    /// Print the joint tree and motion summary of a .bvh or container file
    Inspect {
        input: PathBuf,
    },

    /// Print local and world pose of a joint
    Pose {
        input: PathBuf,
        joint: String,
        frame: usize,

        /// Re-root on this joint first
        #[arg(long)]
        root: Option<String>,
    },
}

fn load_skeleton(input: &Path) -> Result<Skeleton> {
    let is_bvh = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("bvh"));
    let skeleton = if is_bvh {
        let artifacts = load_bvh_from_file(input).with_context(|| format!("Failed to parse {:?}", input))?;
        if let Some(fps) = artifacts.fps() {
            tracing::info!("{} frames at {} fps", artifacts.num_frames(), fps);
        }
        Skeleton::new(&artifacts)?
    } else {
        container::load(input)
            .with_context(|| format!("Failed to load container {:?}", input))?
            .to_skeleton()?
    };
    Ok(skeleton)
}

fn format_vector(v: Vector3<f64>) -> String {
    format!("[{:.4}, {:.4}, {:.4}]", v.x, v.y, v.z)
}

fn print_tree(skeleton: &Skeleton, name: &str, depth: usize) -> Result<()> {
    let joint = skeleton.joint(name)?;
    let channels = skeleton.channels_of(name)?.map_or(0, |c| c.len());
    println!(
        "{}{} offset=({:.3}, {:.3}, {:.3}) channels={}",
        "  ".repeat(depth),
        joint.name,
        joint.offset.x,
        joint.offset.y,
        joint.offset.z,
        channels
    );
    for child in skeleton.children_of(name)? {
        print_tree(skeleton, &child.name, depth + 1)?;
    }
    Ok(())
}

/// `RUST_LOG` when set, `info` otherwise.
fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            raw_dir,
            output,
            config,
            root,
            relative,
        } => {
            let mut dataset = match config {
                Some(path) => DatasetConfig::from_toml_file(&path)
                    .with_context(|| format!("Failed to read config {:?}", path))?,
                None => {
                    let raw_dir = raw_dir.clone().context("Either a raw directory or --config is required")?;
                    let output = output.clone().unwrap_or_else(|| raw_dir.join("processed"));
                    DatasetConfig::new(raw_dir, output)
                }
            };
            if let Some(raw_dir) = raw_dir {
                dataset.raw_dir = raw_dir;
            }
            if let Some(output) = output {
                dataset.processed_dir = output;
            }
            if root.is_some() {
                dataset.new_root = root;
            }
            dataset.relative_positions |= relative;

            let summary = convert_dataset(&dataset)?;
            for (path, error) in &summary.failed {
                tracing::error!("{:?}: {}", path, error);
            }
            if !summary.failed.is_empty() {
                anyhow::bail!("{} file(s) failed to convert", summary.failed.len());
            }
        }

        Commands::Inspect { input } => {
            let skeleton = load_skeleton(&input)?;
            println!("root: {}", skeleton.root_name());
            println!("joints: {}", skeleton.joints().len());
            println!("channels: {}", skeleton.channels().len());
            println!("frames: {}", skeleton.num_frames());
            print_tree(&skeleton, skeleton.root_name(), 0)?;
        }

        Commands::Pose {
            input,
            joint,
            frame,
            root,
        } => {
            let mut skeleton = load_skeleton(&input)?;
            if let Some(root) = root {
                skeleton.set_new_root(&root)?;
            }
            let local_position = skeleton.get_joint_position(&joint, frame)?;
            let local_rotation = skeleton.get_joint_rotation(&joint, frame)?;
            let world = skeleton.forward_kinematics();
            let world_position = world.joint_position(&joint, frame)?;
            let world_rotation = world.joint_rotation(&joint, frame)?;
            println!("{joint} @ frame {frame}");
            println!("  local position: {}", format_vector(local_position));
            println!("  local rotation: {}", format_vector(local_rotation));
            println!("  world position: {}", format_vector(world_position));
            println!("  world rotation: {}", format_vector(world_rotation));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn rust_log_level_is_not_capped() {
        std::env::set_var("RUST_LOG", "debug");
        assert_eq!(env_filter().max_level_hint(), Some(LevelFilter::DEBUG));
        std::env::remove_var("RUST_LOG");
        assert_eq!(env_filter().max_level_hint(), Some(LevelFilter::INFO));
    }
}
