use crate::channels::{build_channel_map, ChannelMap, JointChannels};
use crate::error::{BvhError, Result};
use crate::types::*;
use cgmath::{Vector3, Zero};
use std::collections::{HashMap, HashSet, VecDeque};

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// The in-memory skeleton: joint tree, motion table and channel mapping.
///
/// Joints are addressed by a stable integer id (their position in the hierarchy); the
/// parent links are ids as well. The motion table is owned by the skeleton so that root
/// reassignment and root-relative normalization can rewrite it in place.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub(crate) joints: Vec<Joint>,
    pub(crate) name_to_index: HashMap<String, Index>,
    pub(crate) motion: Vec<Frame>,
    pub(crate) channels: Vec<ChannelKind>,
    pub(crate) order: Vec<String>,
    pub(crate) order_indices: Vec<Index>,
    pub(crate) channel_map: ChannelMap,
    /// `channel_map` keyed by joint id. `None` for end sites.
    pub(crate) joint_channels: Vec<Option<JointChannels>>,
    pub(crate) root: Index,
    /// Every joint appears after its parent.
    pub(crate) topological_order: Vec<Index>,
}

/// Breadth first walk from `root`. Fails if some joint can't be reached, which also
/// catches cycles since a joint on a cycle has no path from the root.
fn __topological_order(parents: &[Option<Index>], root: Index) -> Result<Vec<Index>> {
    let mut children: Vec<Vec<Index>> = vec![Vec::new(); parents.len()];
    for (index, parent) in parents.iter().enumerate() {
        if let Some(parent) = parent {
            children[*parent].push(index);
        }
    }

    let mut order = Vec::with_capacity(parents.len());
    let mut visited = vec![false; parents.len()];
    let mut queue = VecDeque::from([root]);
    visited[root] = true;
    while let Some(index) = queue.pop_front() {
        order.push(index);
        for &child in &children[index] {
            if !visited[child] {
                visited[child] = true;
                queue.push_back(child);
            }
        }
    }

    if order.len() != parents.len() {
        return Err(BvhError::InvalidSkeleton(format!(
            "{} joint(s) are not reachable from the root",
            parents.len() - order.len()
        )));
    }
    Ok(order)
}

/// Subtract, frame by frame, the position of `reference` from every position channel.
fn __shift_positions(
    motion: &mut [Frame],
    joint_channels: &[Option<JointChannels>],
    reference: Option<JointChannels>,
) {
    for frame in motion.iter_mut() {
        let origin = reference.map_or(Position::zero(), |channels| channels.position(frame));
        for channels in joint_channels.iter().flatten() {
            for (axis, kind) in ChannelKind::POSITIONS.into_iter().enumerate() {
                if let Some(column) = channels.get(kind) {
                    frame[column] -= origin[axis];
                }
            }
        }
    }
}

impl Skeleton {
    /// Build a skeleton from parser output. The motion table is copied.
    pub fn new(artifacts: &BvhArtifacts) -> Result<Self> {
        Skeleton::from_parts(
            artifacts.hierarchy.clone(),
            artifacts.motion.clone(),
            artifacts.channels.clone(),
            artifacts.order.clone(),
        )
    }

    /// Build a skeleton from the four boundary artifacts, checking every structural invariant.
    pub fn from_parts(
        hierarchy: Vec<JointRecord>,
        motion: Vec<Frame>,
        channels: Vec<ChannelKind>,
        order: Vec<String>,
    ) -> Result<Self> {
        //// Joint ids and names
        let mut name_to_index: HashMap<String, Index> = HashMap::with_capacity(hierarchy.len());
        for (index, record) in hierarchy.iter().enumerate() {
            if name_to_index.insert(record.name.clone(), index).is_some() {
                return Err(BvhError::InvalidSkeleton(format!(
                    "joint name '{}' is used more than once",
                    record.name
                )));
            }
        }

        //// Parent links
        let mut joints: Vec<Joint> = Vec::with_capacity(hierarchy.len());
        for (index, record) in hierarchy.into_iter().enumerate() {
            let parent_index = match &record.parent {
                None => None,
                Some(parent) => Some(*name_to_index.get(parent).ok_or_else(|| {
                    BvhError::InvalidSkeleton(format!(
                        "joint '{}' references unknown parent '{parent}'",
                        record.name
                    ))
                })?),
            };
            let [x, y, z] = record.offset;
            joints.push(Joint {
                is_end_site: is_end_site(&record.name),
                name: record.name,
                index,
                parent_index,
                offset: Vector3::new(x, y, z),
            });
        }

        let roots: Vec<Index> = joints
            .iter()
            .filter(|joint| joint.parent_index.is_none())
            .map(|joint| joint.index)
            .collect();
        let root = match roots[..] {
            [root] => root,
            _ => {
                return Err(BvhError::InvalidSkeleton(format!(
                    "expected exactly one root joint, found {}",
                    roots.len()
                )))
            }
        };
        let parents: Vec<Option<Index>> = joints.iter().map(|joint| joint.parent_index).collect();
        let topological_order = __topological_order(&parents, root)?;

        //// Order sequence must list every animated joint exactly once
        let mut order_indices = Vec::with_capacity(order.len());
        let mut listed: HashSet<Index> = HashSet::with_capacity(order.len());
        for name in &order {
            let index = *name_to_index
                .get(name)
                .ok_or_else(|| BvhError::InvalidSkeleton(format!("order lists unknown joint '{name}'")))?;
            if joints[index].is_end_site || !listed.insert(index) {
                return Err(BvhError::InvalidSkeleton(format!(
                    "order lists '{name}' more than once or lists an end site"
                )));
            }
            order_indices.push(index);
        }
        if let Some(missing) = joints
            .iter()
            .find(|joint| !joint.is_end_site && !listed.contains(&joint.index))
        {
            return Err(BvhError::InvalidSkeleton(format!(
                "joint '{}' is missing from the order",
                missing.name
            )));
        }

        //// Motion table must line up with the channel sequence
        if let Some(bad) = motion.iter().position(|frame| frame.len() != channels.len()) {
            return Err(BvhError::Format(format!(
                "frame {bad} has {} values but {} channels are declared",
                motion[bad].len(),
                channels.len()
            )));
        }

        let channel_map = build_channel_map(&order, &channels);
        let joint_channels = joints
            .iter()
            .map(|joint| channel_map.get(&joint.name).copied())
            .collect();

        Ok(Skeleton {
            joints,
            name_to_index,
            motion,
            channels,
            order,
            order_indices,
            channel_map,
            joint_channels,
            root,
            topological_order,
        })
    }

    /////////////////////////////////////////////////////////// STRUCTURE ///////////////////////////////////////////////////////////

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, name: &str) -> Result<&Joint> {
        Ok(&self.joints[self.index_of(name)?])
    }

    pub fn index_of(&self, name: &str) -> Result<Index> {
        self.name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| BvhError::NotFound(name.to_string()))
    }

    pub fn root(&self) -> &Joint {
        &self.joints[self.root]
    }

    pub fn root_name(&self) -> &str {
        &self.joints[self.root].name
    }

    pub fn parent_of(&self, name: &str) -> Result<Option<&Joint>> {
        let joint = self.joint(name)?;
        Ok(joint.parent_index.map(|parent| &self.joints[parent]))
    }

    pub fn children_of(&self, name: &str) -> Result<Vec<&Joint>> {
        let index = self.index_of(name)?;
        Ok(self
            .joints
            .iter()
            .filter(|joint| joint.parent_index == Some(index))
            .collect())
    }

    /// Joints with their parents referenced by name, in id order.
    pub fn hierarchy(&self) -> Vec<JointRecord> {
        self.joints
            .iter()
            .map(|joint| JointRecord {
                name: joint.name.clone(),
                parent: joint.parent_index.map(|parent| self.joints[parent].name.clone()),
                offset: joint.offset.into(),
            })
            .collect()
    }

    pub fn motion(&self) -> &[Frame] {
        &self.motion
    }

    pub fn channels(&self) -> &[ChannelKind] {
        &self.channels
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn channel_map(&self) -> &ChannelMap {
        &self.channel_map
    }

    /// Channel columns of a joint, `None` for end sites.
    pub fn channels_of(&self, name: &str) -> Result<Option<&JointChannels>> {
        Ok(self.joint_channels[self.index_of(name)?].as_ref())
    }

    pub fn num_frames(&self) -> usize {
        self.motion.len()
    }

    pub(crate) fn check_frame(&self, frame: usize) -> Result<()> {
        if frame >= self.num_frames() {
            return Err(BvhError::Range {
                frame,
                frame_count: self.num_frames(),
            });
        }
        Ok(())
    }

    /////////////////////////////////////////////////////////// QUERIES ///////////////////////////////////////////////////////////

    /// Local position channels `[X, Y, Z]` of a joint. Missing channels read as 0.
    pub fn get_joint_position(&self, name: &str, frame: usize) -> Result<Position> {
        let index = self.index_of(name)?;
        self.check_frame(frame)?;
        Ok(self.joint_channels[index]
            .map_or(Position::zero(), |channels| channels.position(&self.motion[frame])))
    }

    /// Local rotation channels `[X, Y, Z]` of a joint, in degrees. Missing channels read as 0.
    pub fn get_joint_rotation(&self, name: &str, frame: usize) -> Result<Vector3<f64>> {
        let index = self.index_of(name)?;
        self.check_frame(frame)?;
        Ok(self.joint_channels[index]
            .map_or(Vector3::zero(), |channels| channels.rotation(&self.motion[frame])))
    }

    /////////////////////////////////////////////////////////// MUTATION ///////////////////////////////////////////////////////////

    /// Make `new_root` the root joint.
    ///
    /// Every position channel is shifted, frame by frame, so it is expressed relative to
    /// the new root's position. The old root becomes a child of the new root. Rotations
    /// and offsets are left as they are.
    pub fn set_new_root(&mut self, new_root: &str) -> Result<()> {
        let new_index = self.index_of(new_root)?;
        if new_index == self.root {
            tracing::debug!("{new_root} is already the root joint");
            return Ok(());
        }

        //// Check the new tree before touching anything
        let old_index = self.root;
        let mut parents: Vec<Option<Index>> = self.joints.iter().map(|joint| joint.parent_index).collect();
        parents[old_index] = Some(new_index);
        parents[new_index] = None;
        let topological_order = __topological_order(&parents, new_index)?;

        __shift_positions(&mut self.motion, &self.joint_channels, self.joint_channels[new_index]);

        self.joints[old_index].parent_index = Some(new_index);
        self.joints[new_index].parent_index = None;
        self.root = new_index;
        self.topological_order = topological_order;

        tracing::info!(
            old_root = self.joints[old_index].name.as_str(),
            new_root,
            "root reassigned"
        );
        Ok(())
    }

    /// Express every joint's position channels relative to the current root.
    pub fn compute_relative_positions(&mut self) {
        let reference = self.joint_channels[self.root];
        __shift_positions(&mut self.motion, &self.joint_channels, reference);
    }
}
