//! Binary container holding the four skeleton tables (hierarchy, motion, channel names,
//! order) plus an optional table of flattened world positions.

use crate::error::{BvhError, Result};
use crate::kinematics::WorldMotion;
use crate::skeleton::Skeleton;
use crate::types::{BvhArtifacts, ChannelKind, Frame, JointRecord};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerData {
    pub hierarchy: Vec<JointRecord>,
    pub motion: Vec<Frame>,
    pub channels: Vec<String>,
    pub order: Vec<String>,
    /// Output of [`WorldMotion::flat_positions`], if it was stored.
    pub world_motion: Option<Vec<Vec<f64>>>,
}

impl ContainerData {
    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        ContainerData {
            hierarchy: skeleton.hierarchy(),
            motion: skeleton.motion().to_vec(),
            channels: skeleton.channels().iter().map(ToString::to_string).collect(),
            order: skeleton.order().to_vec(),
            world_motion: None,
        }
    }

    pub fn with_world_motion(mut self, world: &WorldMotion<'_>) -> Self {
        self.world_motion = Some(world.flat_positions());
        self
    }

    pub fn channel_kinds(&self) -> Result<Vec<ChannelKind>> {
        self.channels
            .iter()
            .map(|name| name.parse::<ChannelKind>().map_err(BvhError::Format))
            .collect()
    }

    /// Rebuild a skeleton from the stored tables.
    pub fn to_skeleton(&self) -> Result<Skeleton> {
        Skeleton::from_parts(
            self.hierarchy.clone(),
            self.motion.clone(),
            self.channel_kinds()?,
            self.order.clone(),
        )
    }
}

impl From<&BvhArtifacts> for ContainerData {
    fn from(artifacts: &BvhArtifacts) -> Self {
        ContainerData {
            hierarchy: artifacts.hierarchy.clone(),
            motion: artifacts.motion.clone(),
            channels: artifacts.channels.iter().map(ToString::to_string).collect(),
            order: artifacts.order.clone(),
            world_motion: None,
        }
    }
}

pub fn save(path: impl AsRef<Path>, data: &ContainerData) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, data)?;
    writer.flush()?;
    tracing::debug!("wrote container {:?}", path);
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<ContainerData> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(bincode::deserialize_from(reader)?)
}

/// Replace (or add) the world position table of an existing container.
pub fn update_world_motion(path: impl AsRef<Path>, world_motion: Vec<Vec<f64>>) -> Result<()> {
    let path = path.as_ref();
    let mut data = load(path)?;
    if data.world_motion.is_some() {
        tracing::info!("world motion exists in {:?}, updating", path);
    } else {
        tracing::info!("world motion missing in {:?}, creating", path);
    }
    data.world_motion = Some(world_motion);
    save(path, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::load_bvh_from_string;

    const BVH: &str = "HIERARCHY
ROOT Hips
{
    OFFSET 0.00 0.00 0.00
    CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
    JOINT Spine
    {
        OFFSET 0.10 10.00 -0.30
        CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation
        End Site
        {
            OFFSET 0.00 5.00 0.00
        }
    }
}
MOTION
Frames: 2
Frame Time: 0.0083333
0.1 0.2 0.3 1.5 -2.25 3.125 0.0 0.0 0.0 0.1 0.7 -0.3333333
1.0 2.0 3.0 4.0 5.0 6.0 7.0 8.0 9.0 10.0 11.0 12.0
";

    fn bits(table: &[Vec<f64>]) -> Vec<Vec<u64>> {
        table.iter().map(|row| row.iter().map(|v| v.to_bits()).collect()).collect()
    }

    #[test]
    fn round_trip_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.bvhc");

        let artifacts = load_bvh_from_string(BVH).unwrap();
        let data = ContainerData::from(&artifacts);
        save(&path, &data).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.hierarchy, artifacts.hierarchy);
        assert_eq!(loaded.order, artifacts.order);
        assert_eq!(loaded.channel_kinds().unwrap(), artifacts.channels);
        assert_eq!(bits(&loaded.motion), bits(&artifacts.motion));
        assert_eq!(loaded.world_motion, None);
    }

    #[test]
    fn skeleton_survives_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.bvhc");

        let skeleton = Skeleton::new(&load_bvh_from_string(BVH).unwrap()).unwrap();
        let world = skeleton.forward_kinematics();
        save(&path, &ContainerData::from_skeleton(&skeleton).with_world_motion(&world)).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(bits(loaded.world_motion.as_ref().unwrap()), bits(&world.flat_positions()));
        let restored = loaded.to_skeleton().unwrap();
        assert_eq!(restored.hierarchy(), skeleton.hierarchy());
        assert_eq!(bits(restored.motion()), bits(skeleton.motion()));
    }

    #[test]
    fn reassigned_root_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.bvhc");

        let mut skeleton = Skeleton::new(&load_bvh_from_string(BVH).unwrap()).unwrap();
        skeleton.set_new_root("Spine").unwrap();
        save(&path, &ContainerData::from_skeleton(&skeleton)).unwrap();

        let restored = load(&path).unwrap().to_skeleton().unwrap();
        assert_eq!(restored.root_name(), "Spine");
        assert_eq!(restored.parent_of("Hips").unwrap().unwrap().name, "Spine");
    }

    #[test]
    fn update_world_motion_replaces_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.bvhc");
        let artifacts = load_bvh_from_string(BVH).unwrap();
        save(&path, &ContainerData::from(&artifacts)).unwrap();

        update_world_motion(&path, vec![vec![1.0, 2.0]]).unwrap();
        assert_eq!(load(&path).unwrap().world_motion, Some(vec![vec![1.0, 2.0]]));
        update_world_motion(&path, vec![vec![3.0]]).unwrap();
        assert_eq!(load(&path).unwrap().world_motion, Some(vec![vec![3.0]]));
    }

    #[test]
    fn missing_and_corrupt_files_fail() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(dir.path().join("nope.bvhc")), Err(BvhError::Io(_))));

        let path = dir.path().join("corrupt.bvhc");
        std::fs::write(&path, [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]).unwrap();
        assert!(matches!(load(&path), Err(BvhError::Container(_))));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn failed_write_is_reported() {
        let data = ContainerData::from(&load_bvh_from_string(BVH).unwrap());
        // opens fine, every write fails with ENOSPC
        assert!(save("/dev/full", &data).is_err());
    }

    #[test]
    fn unknown_channel_name_is_rejected() {
        let mut data = ContainerData::from(&load_bvh_from_string(BVH).unwrap());
        data.channels[0] = "Wposition".into();
        assert!(matches!(data.to_skeleton(), Err(BvhError::Format(_))));
    }
}
