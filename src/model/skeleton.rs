//! Bone hierarchy, per-frame poses and skinning.

use crate::util::{Mat3, Vec3};

use super::{RiggedVertex, VertexFrame};

/// Model-space transform of a bone or tag at one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub location: Vec3,
    /// Columns are the forward, left and up axes.
    pub orientation: Mat3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            location: Vec3::ZERO,
            orientation: Mat3::IDENTITY,
        }
    }
}

impl Pose {
    /// Map a point from this pose's frame to model space.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.location + self.orientation * p
    }

    /// Pose of something held at `offset` / `orientation` in this frame.
    pub fn attach(&self, offset: Vec3, orientation: Mat3) -> Pose {
        Pose {
            location: self.transform_point(offset),
            orientation: self.orientation * orientation,
        }
    }

    /// Offset and orientation of `world` expressed in this frame.
    ///
    /// Inverse of [`Pose::attach`] for orthonormal orientations.
    pub fn relative(&self, world: &Pose) -> (Vec3, Mat3) {
        let inv = self.orientation.transpose();
        (inv * (world.location - self.location), inv * world.orientation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<u32>,
    pub torso_weight: f32,
    /// Fixed distance from the parent's location.
    pub parent_dist: f32,
    pub flags: i32,
    /// One pose per frame.
    pub poses: Vec<Pose>,
    /// Quantized pitch and yaw toward this bone from its parent, per frame,
    /// as last read. Encoding reuses an entry while it still lands on the
    /// matching pose; empty for bones built in memory.
    pub parent_dirs: Vec<[i16; 2]>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub name: String,
    pub torso_parent: Option<u32>,
    pub bones: Vec<Bone>,
}

impl Skeleton {
    /// Number of animated frames.
    pub fn frame_count(&self) -> usize {
        self.bones.iter().map(|b| b.poses.len()).max().unwrap_or(0)
    }

    pub fn bone_index(&self, name: &str) -> Option<u32> {
        self.bones.iter().position(|b| b.name == name).map(|i| i as u32)
    }

    /// Pose of `bone` at `frame`, if both exist.
    pub fn try_pose(&self, bone: u32, frame: usize) -> Option<Pose> {
        self.bones.get(bone as usize)?.poses.get(frame).copied()
    }

    /// Pose of `bone` at `frame`, identity when missing.
    pub fn pose(&self, bone: u32, frame: usize) -> Pose {
        self.try_pose(bone, frame).unwrap_or_default()
    }

    /// Skinned location and normal of a vertex.
    pub fn skin(&self, vertex: &RiggedVertex, frame: usize) -> VertexFrame {
        let location = vertex
            .weights
            .iter()
            .map(|w| self.pose(w.bone, frame).transform_point(w.offset) * w.weight)
            .sum();
        let normal = match vertex.weights.first() {
            Some(w) => self.pose(w.bone, frame).orientation * vertex.normal,
            None => vertex.normal,
        };
        VertexFrame { location, normal }
    }

    /// Bone indices ordered so that every parent precedes its children.
    pub fn order(&self) -> Vec<usize> {
        let n = self.bones.len();
        let mut placed = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut chain = Vec::new();
        for start in 0..n {
            let mut b = start;
            while !placed[b] && chain.len() <= n {
                chain.push(b);
                match self.bones[b].parent {
                    Some(p) if (p as usize) < n => b = p as usize,
                    _ => break,
                }
            }
            while let Some(b) = chain.pop() {
                if !placed[b] {
                    placed[b] = true;
                    order.push(b);
                }
            }
        }
        order
    }

    /// The given bones plus all their ancestors, ascending and unique.
    pub fn with_ancestors(&self, bones: impl IntoIterator<Item = u32>) -> Vec<u32> {
        let mut set = vec![false; self.bones.len()];
        for bone in bones {
            let mut b = Some(bone);
            let mut depth = 0;
            while let Some(i) = b {
                let i = i as usize;
                if i >= set.len() || set[i] || depth > set.len() {
                    break;
                }
                set[i] = true;
                b = self.bones[i].parent;
                depth += 1;
            }
        }
        set.iter()
            .enumerate()
            .filter(|(_, &s)| s)
            .map(|(i, _)| i as u32)
            .collect()
    }
}
