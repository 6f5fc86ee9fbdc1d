use cgmath::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/////////////////////////////////////////////////////////////////////////////////////////////////

pub type Index = usize;
pub type Position = Vector3<f64>;
pub type Transform = Matrix4<f64>;
/// One row of the motion table, column-aligned with the channel sequence.
pub type Frame = Vec<f64>;

/// Suffix given to the synthetic joints created for `End Site` blocks.
pub const END_SITE_SUFFIX: &str = "_End";

/// Returns true if `name` was produced from an `End Site` block.
pub fn is_end_site(name: &str) -> bool {
    name.ends_with(END_SITE_SUFFIX)
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// One animated degree of freedom of a joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    #[serde(rename = "Xposition")]
    PosX,
    #[serde(rename = "Yposition")]
    PosY,
    #[serde(rename = "Zposition")]
    PosZ,
    #[serde(rename = "Xrotation")]
    RotX,
    #[serde(rename = "Yrotation")]
    RotY,
    #[serde(rename = "Zrotation")]
    RotZ,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 6] = [
        ChannelKind::PosX,
        ChannelKind::PosY,
        ChannelKind::PosZ,
        ChannelKind::RotX,
        ChannelKind::RotY,
        ChannelKind::RotZ,
    ];
    pub const POSITIONS: [ChannelKind; 3] = [ChannelKind::PosX, ChannelKind::PosY, ChannelKind::PosZ];
    pub const ROTATIONS: [ChannelKind; 3] = [ChannelKind::RotX, ChannelKind::RotY, ChannelKind::RotZ];

    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::PosX => "Xposition",
            ChannelKind::PosY => "Yposition",
            ChannelKind::PosZ => "Zposition",
            ChannelKind::RotX => "Xrotation",
            ChannelKind::RotY => "Yrotation",
            ChannelKind::RotZ => "Zrotation",
        }
    }

    /// Slot of this kind in a `[x, y, z, rx, ry, rz]` layout.
    pub(crate) fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown channel '{s}'"))
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// A joint as it appears on the boundary: parents are referenced by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointRecord {
    pub name: String,
    pub parent: Option<String>,
    pub offset: [f64; 3],
}

impl JointRecord {
    pub fn new(name: &str, parent: Option<&str>, offset: [f64; 3]) -> Self {
        JointRecord {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            offset,
        }
    }
}

/// A joint inside a [`Skeleton`](crate::skeleton::Skeleton). Parents are stored as ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    pub name: String,
    pub index: Index,
    pub parent_index: Option<Index>,
    pub offset: Position,
    pub is_end_site: bool,
}

/////////////////////////////////////////////////////////////////////////////////////////////////

/// Everything the parser extracts from a .bvh file.
#[derive(Debug, Clone, PartialEq)]
pub struct BvhArtifacts {
    pub hierarchy: Vec<JointRecord>,
    pub motion: Vec<Frame>,
    pub channels: Vec<ChannelKind>,
    pub order: Vec<String>,
    /// Value of the `Frames:` header. Informational only.
    pub declared_frames: Option<usize>,
    /// Value of the `Frame Time:` header, in seconds.
    pub frame_time: Option<f64>,
}

impl BvhArtifacts {
    pub fn num_frames(&self) -> usize {
        self.motion.len()
    }

    pub fn fps(&self) -> Option<u32> {
        self.frame_time
            .filter(|t| *t > 0.0)
            .map(|t| (1.0 / t).round() as u32)
    }
}
