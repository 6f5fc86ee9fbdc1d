//! bvh_skeleton
//!
//! Parses .bvh motion-capture files into a joint tree plus a motion table, re-roots
//! skeletons, and computes world-space joint positions with forward kinematics.

pub mod channels;
pub mod config;
pub mod container;
pub mod convert;
pub mod error;
pub mod kinematics;
pub mod parse;
pub mod skeleton;
pub mod types;
pub mod utils;

pub use channels::{build_channel_map, ChannelMap, JointChannels};
pub use config::DatasetConfig;
pub use container::ContainerData;
pub use convert::{convert_dataset, convert_file, ConvertSummary};
pub use error::{BvhError, Result};
pub use kinematics::WorldMotion;
pub use parse::{load_bvh_from_file, load_bvh_from_string, parse_bvh_lines};
pub use skeleton::Skeleton;
pub use types::{BvhArtifacts, ChannelKind, Joint, JointRecord};
