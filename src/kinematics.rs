//! Forward kinematics: world-space transforms of every joint, frame by frame.

use crate::error::{BvhError, Result};
use crate::skeleton::Skeleton;
use crate::types::{Index, Position, Transform};
use crate::utils::{__local_transform, __transform_point, euler_yxz_from_matrix};
use cgmath::{Matrix4, SquareMatrix, Vector3, Zero};
use rayon::prelude::*;

/// World transforms of a skeleton for every frame.
///
/// Borrows the skeleton it was computed from, so the skeleton can't be re-rooted or
/// normalized while the result is alive.
#[derive(Debug)]
pub struct WorldMotion<'a> {
    skeleton: &'a Skeleton,
    /// `transforms[frame][joint id]`
    transforms: Vec<Vec<Transform>>,
}

impl Skeleton {
    /// Local transform of a joint in one frame: its static offset, then its channel
    /// translation and rotation. The root's offset is not applied. End sites have no
    /// channels and only carry their offset.
    pub(crate) fn local_transform(&self, index: Index, frame: &[f64]) -> Transform {
        let animated = match &self.joint_channels[index] {
            Some(channels) => __local_transform(channels.position(frame), channels.rotation(frame)),
            None => Transform::identity(),
        };
        if index == self.root {
            animated
        } else {
            Matrix4::from_translation(self.joints[index].offset) * animated
        }
    }

    /// Joints are visited parents first, so each world transform is computed exactly once
    /// and every child finds its parent's transform already in place.
    fn __solve_frame(&self, frame: &[f64]) -> Vec<Transform> {
        let mut world = vec![Transform::identity(); self.joints.len()];
        for &index in &self.topological_order {
            let local = self.local_transform(index, frame);
            world[index] = match self.joints[index].parent_index {
                Some(parent) => world[parent] * local,
                None => local,
            };
        }
        world
    }

    /// World transform of every joint for one row of motion values, indexed by joint id.
    pub fn solve_frame(&self, frame: &[f64]) -> Result<Vec<Transform>> {
        if frame.len() != self.channels.len() {
            return Err(BvhError::Format(format!(
                "frame has {} values but {} channels are declared",
                frame.len(),
                self.channels.len()
            )));
        }
        Ok(self.__solve_frame(frame))
    }

    /// Run forward kinematics over every frame. Frames are independent and solved in parallel.
    pub fn forward_kinematics(&self) -> WorldMotion<'_> {
        let transforms: Vec<Vec<Transform>> = self
            .motion
            .par_iter()
            .map(|frame| self.__solve_frame(frame))
            .collect();
        tracing::debug!(
            frames = transforms.len(),
            joints = self.joints.len(),
            "forward kinematics done"
        );
        WorldMotion {
            skeleton: self,
            transforms,
        }
    }
}

impl<'a> WorldMotion<'a> {
    pub fn skeleton(&self) -> &'a Skeleton {
        self.skeleton
    }

    pub fn num_frames(&self) -> usize {
        self.transforms.len()
    }

    fn __position(&self, frame: usize, index: Index) -> Position {
        __transform_point(&self.transforms[frame][index], Position::zero())
    }

    pub fn joint_transform(&self, name: &str, frame: usize) -> Result<Transform> {
        let index = self.skeleton.index_of(name)?;
        self.skeleton.check_frame(frame)?;
        Ok(self.transforms[frame][index])
    }

    /// World position of a joint: its composed transform applied to the origin.
    pub fn joint_position(&self, name: &str, frame: usize) -> Result<Position> {
        let index = self.skeleton.index_of(name)?;
        self.skeleton.check_frame(frame)?;
        Ok(self.__position(frame, index))
    }

    /// World rotation of a joint as Y-X-Z euler angles `[x, y, z]` in degrees.
    pub fn joint_rotation(&self, name: &str, frame: usize) -> Result<Vector3<f64>> {
        let transform = self.joint_transform(name, frame)?;
        Ok(euler_yxz_from_matrix(&transform))
    }

    /// World positions of the animated joints in one frame, in order-sequence order.
    pub fn frame_positions(&self, frame: usize) -> Result<Vec<Position>> {
        self.skeleton.check_frame(frame)?;
        Ok(self
            .skeleton
            .order_indices
            .iter()
            .map(|&index| self.__position(frame, index))
            .collect())
    }

    /// One row per frame: `x, y, z` of every animated joint, in order-sequence order.
    pub fn flat_positions(&self) -> Vec<Vec<f64>> {
        (0..self.num_frames())
            .map(|frame| {
                self.skeleton
                    .order_indices
                    .iter()
                    .flat_map(|&index| {
                        let p = self.__position(frame, index);
                        [p.x, p.y, p.z]
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BvhError;
    use crate::skeleton::tests::three_joint_chain;
    use crate::types::{ChannelKind, JointRecord};

    fn assert_close(a: Vector3<f64>, b: Vector3<f64>) {
        assert!(
            (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9 && (a.z - b.z).abs() < 1e-9,
            "{a:?} != {b:?}"
        );
    }

    /// Hips -> Spine -> Spine_End, both animated joints with `Xpos Ypos Zpos Zrot Xrot Yrot`.
    fn chain(frames: Vec<Vec<f64>>) -> Skeleton {
        use ChannelKind::*;
        Skeleton::from_parts(
            vec![
                JointRecord::new("Hips", None, [0.0, 0.0, 0.0]),
                JointRecord::new("Spine", Some("Hips"), [0.0, 10.0, 0.0]),
                JointRecord::new("Spine_End", Some("Spine"), [0.0, 5.0, 0.0]),
            ],
            frames,
            [PosX, PosY, PosZ, RotZ, RotX, RotY].repeat(2),
            vec!["Hips".into(), "Spine".into()],
        )
        .unwrap()
    }

    #[test]
    fn root_position_is_its_translation() {
        let skeleton = chain(vec![vec![1.0, 2.0, 3.0, 40.0, 50.0, 60.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]]);
        let world = skeleton.forward_kinematics();
        assert_close(world.joint_position("Hips", 0).unwrap(), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn unrotated_child_adds_its_offset() {
        let skeleton = chain(vec![vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]]);
        let world = skeleton.forward_kinematics();
        let hips = world.joint_position("Hips", 0).unwrap();
        let spine = world.joint_position("Spine", 0).unwrap();
        assert_close(spine, hips + Vector3::new(0.0, 10.0, 0.0));
        let end = world.joint_position("Spine_End", 0).unwrap();
        assert_close(end, spine + Vector3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn offsets_accumulate_when_only_the_root_translates() {
        use ChannelKind::*;
        let skeleton = Skeleton::from_parts(
            vec![
                JointRecord::new("Hips", None, [0.0, 0.0, 0.0]),
                JointRecord::new("Spine", Some("Hips"), [0.0, 10.0, 0.0]),
                JointRecord::new("Neck", Some("Spine"), [0.0, 5.0, 0.0]),
                JointRecord::new("Neck_End", Some("Neck"), [0.0, 2.0, 0.0]),
            ],
            vec![vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]],
            vec![PosX, PosY, PosZ, RotZ, RotX, RotY, RotZ, RotX, RotY, RotZ, RotX, RotY],
            vec!["Hips".into(), "Spine".into(), "Neck".into()],
        )
        .unwrap();
        let world = skeleton.forward_kinematics();
        let hips = world.joint_position("Hips", 0).unwrap();
        let spine = world.joint_position("Spine", 0).unwrap();
        let neck = world.joint_position("Neck", 0).unwrap();
        let end = world.joint_position("Neck_End", 0).unwrap();
        assert_close(spine, hips + Vector3::new(0.0, 10.0, 0.0));
        assert_close(neck, spine + Vector3::new(0.0, 5.0, 0.0));
        assert_close(end, neck + Vector3::new(0.0, 2.0, 0.0));
        assert_close(end, Vector3::new(1.0, 19.0, 3.0));
    }

    #[test]
    fn solve_frame_rejects_short_rows() {
        let skeleton = three_joint_chain();
        assert!(matches!(skeleton.solve_frame(&[0.0; 3]), Err(BvhError::Format(_))));
        assert_eq!(skeleton.solve_frame(&skeleton.motion()[0]).unwrap().len(), 3);
    }

    #[test]
    fn parent_rotation_moves_child() {
        // hips rotated 90 degrees about Z
        let skeleton = chain(vec![vec![0.0, 0.0, 0.0, 90.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]]);
        let world = skeleton.forward_kinematics();
        assert_close(world.joint_position("Spine", 0).unwrap(), Vector3::new(-10.0, 0.0, 0.0));
    }

    #[test]
    fn world_rotation_composes_down_the_chain() {
        let skeleton = chain(vec![vec![0.0, 0.0, 0.0, 0.0, 0.0, 30.0, 0.0, 0.0, 0.0, 0.0, 0.0, 20.0]]);
        let world = skeleton.forward_kinematics();
        assert_close(world.joint_rotation("Hips", 0).unwrap(), Vector3::new(0.0, 30.0, 0.0));
        assert_close(world.joint_rotation("Spine", 0).unwrap(), Vector3::new(0.0, 50.0, 0.0));
        // end sites inherit their parent's rotation
        assert_close(world.joint_rotation("Spine_End", 0).unwrap(), Vector3::new(0.0, 50.0, 0.0));
    }

    #[test]
    fn child_translation_channels_are_composed() {
        let skeleton = three_joint_chain();
        let world = skeleton.forward_kinematics();
        assert_close(world.joint_position("Spine", 0).unwrap(), Vector3::new(10.0, 20.0, 10.0));
        assert_close(world.joint_position("Neck", 0).unwrap(), Vector3::new(30.0, 45.0, 30.0));
        assert_close(world.joint_position("Neck", 1).unwrap(), Vector3::new(33.0, 48.0, 33.0));
    }

    #[test]
    fn flat_positions_follow_order_sequence() {
        let skeleton = three_joint_chain();
        let world = skeleton.forward_kinematics();
        let flat = world.flat_positions();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].len(), 9);
        let neck = world.joint_position("Neck", 0).unwrap();
        assert_eq!(&flat[0][6..9], &[neck.x, neck.y, neck.z]);
        assert_eq!(world.frame_positions(1).unwrap().len(), 3);
    }

    #[test]
    fn parallel_solve_matches_single_frame_solve() {
        let skeleton = three_joint_chain();
        let world = skeleton.forward_kinematics();
        for (frame, row) in skeleton.motion().iter().enumerate() {
            let expected = skeleton.solve_frame(row).unwrap();
            for joint in skeleton.joints() {
                assert_eq!(world.joint_transform(&joint.name, frame).unwrap(), expected[joint.index]);
            }
        }
    }

    #[test]
    fn world_queries_are_bounds_checked() {
        let skeleton = three_joint_chain();
        let world = skeleton.forward_kinematics();
        assert!(matches!(world.joint_position("Hips", 2), Err(BvhError::Range { .. })));
        assert!(matches!(world.joint_rotation("Hips", 2), Err(BvhError::Range { .. })));
        assert!(matches!(world.frame_positions(2), Err(BvhError::Range { .. })));
        assert!(matches!(world.joint_position("Tail", 0), Err(BvhError::NotFound(_))));
        assert!(matches!(world.joint_rotation("Tail", 0), Err(BvhError::NotFound(_))));
    }

    #[test]
    fn reassigned_root_is_solved_first() {
        let mut skeleton = three_joint_chain();
        skeleton.set_new_root("Spine").unwrap();
        let world = skeleton.forward_kinematics();
        // spine is the root with zeroed translation, hips hangs below it
        assert_close(world.joint_position("Spine", 0).unwrap(), Vector3::new(0.0, 0.0, 0.0));
        assert_close(world.joint_position("Hips", 0).unwrap(), Vector3::new(-10.0, -10.0, -10.0));
    }
}
