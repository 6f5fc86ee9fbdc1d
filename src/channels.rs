//! Maps every animated joint to the motion-table columns holding its channels.

use crate::types::{is_end_site, ChannelKind, Index, Position};
use cgmath::Vector3;
use std::collections::HashMap;

/// Column of each channel kind for one joint. Kinds the joint doesn't declare are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JointChannels {
    columns: [Option<Index>; 6],
}

pub type ChannelMap = HashMap<String, JointChannels>;

impl JointChannels {
    pub fn get(&self, kind: ChannelKind) -> Option<Index> {
        self.columns[kind.slot()]
    }

    pub(crate) fn set(&mut self, kind: ChannelKind, column: Index) {
        self.columns[kind.slot()] = Some(column);
    }

    pub fn len(&self) -> usize {
        self.columns.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.len() == ChannelKind::ALL.len()
    }

    /// `(kind, column)` pairs in `ChannelKind::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelKind, Index)> + '_ {
        ChannelKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|column| (kind, column)))
    }

    /// Value of `kind` in `frame`, 0 if the joint has no such channel.
    pub fn value(&self, frame: &[f64], kind: ChannelKind) -> f64 {
        self.get(kind).map_or(0.0, |column| frame[column])
    }

    pub fn position(&self, frame: &[f64]) -> Position {
        Vector3::new(
            self.value(frame, ChannelKind::PosX),
            self.value(frame, ChannelKind::PosY),
            self.value(frame, ChannelKind::PosZ),
        )
    }

    /// Rotation angles in degrees, as `[x, y, z]`.
    pub fn rotation(&self, frame: &[f64]) -> Vector3<f64> {
        Vector3::new(
            self.value(frame, ChannelKind::RotX),
            self.value(frame, ChannelKind::RotY),
            self.value(frame, ChannelKind::RotZ),
        )
    }
}

/// Order in which each channel kind first shows up in the declared channel sequence.
pub fn declared_kind_order(channels: &[ChannelKind]) -> Vec<ChannelKind> {
    let mut kinds: Vec<ChannelKind> = Vec::with_capacity(ChannelKind::ALL.len());
    for &kind in channels {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
        if kinds.len() == ChannelKind::ALL.len() {
            break;
        }
    }
    kinds
}

/// Walk `order` once with a single column cursor. For every joint that isn't an end
/// site, try each channel kind in declared order: if the channel under the cursor is
/// that kind, record it and advance.
///
/// A joint whose channels don't follow the declared order ends up with a partial
/// mapping rather than an error.
pub fn build_channel_map(order: &[String], channels: &[ChannelKind]) -> ChannelMap {
    let kind_order = declared_kind_order(channels);
    let mut map = ChannelMap::with_capacity(order.len());
    let mut cursor: Index = 0;

    for name in order.iter().filter(|name| !is_end_site(name)) {
        let mut joint_channels = JointChannels::default();
        for &kind in &kind_order {
            if channels.get(cursor) == Some(&kind) {
                joint_channels.set(kind, cursor);
                cursor += 1;
            }
        }
        if !joint_channels.is_complete() {
            tracing::warn!(
                joint = name.as_str(),
                mapped = joint_channels.len(),
                "joint has an incomplete channel mapping"
            );
        }
        map.insert(name.clone(), joint_channels);
    }

    if cursor != channels.len() {
        tracing::warn!(
            consumed = cursor,
            declared = channels.len(),
            "not every declared channel was assigned to a joint"
        );
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use ChannelKind::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn follows_declared_order() {
        let channels = [PosX, PosY, PosZ, RotZ, RotX, RotY].repeat(2);
        let map = build_channel_map(&names(&["Hips", "Spine"]), &channels);

        let hips = map["Hips"];
        assert!(hips.is_complete());
        assert_eq!(hips.get(RotZ), Some(3));
        assert_eq!(hips.get(RotY), Some(5));

        let spine = map["Spine"];
        assert_eq!(spine.get(PosX), Some(6));
        assert_eq!(spine.get(RotX), Some(10));
    }

    #[test]
    fn joints_with_rotation_only_are_mapped() {
        let channels = vec![PosX, PosY, PosZ, RotZ, RotX, RotY, RotZ, RotX, RotY];
        let map = build_channel_map(&names(&["Hips", "Spine"]), &channels);

        let spine = map["Spine"];
        assert_eq!(spine.len(), 3);
        assert_eq!(spine.get(PosX), None);
        assert_eq!(spine.get(RotZ), Some(6));
        assert_eq!(spine.get(RotY), Some(8));
    }

    #[test]
    fn out_of_order_channels_leave_partial_mapping() {
        let channels = vec![PosX, PosY, PosZ, RotX, RotY, RotZ, RotZ, RotY, RotX];
        let map = build_channel_map(&names(&["Hips", "Spine"]), &channels);

        // declared order is X, Y, Z: only the first channel under the cursor that fits is taken
        let spine = map["Spine"];
        assert_eq!(spine.get(RotZ), Some(6));
        assert_eq!(spine.len(), 1);
    }

    #[test]
    fn end_sites_get_no_entry() {
        let channels = vec![PosX, PosY, PosZ, RotX, RotY, RotZ];
        let map = build_channel_map(&names(&["Hips", "Hips_End"]), &channels);
        assert_eq!(map.len(), 1);
        assert!(!map.contains_key("Hips_End"));
    }

    #[test]
    fn missing_channels_read_as_zero() {
        let channels = vec![RotZ, RotX, RotY];
        let map = build_channel_map(&names(&["Hips"]), &channels);
        let frame = [5.0, 15.0, 25.0];
        assert_eq!(map["Hips"].position(&frame), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(map["Hips"].rotation(&frame), Vector3::new(15.0, 25.0, 5.0));
    }
}
