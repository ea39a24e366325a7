//! Format-agnostic in-memory model.
//!
//! Every adapter decodes into a [`Model`] and encodes from one. Variation
//! between formats is expressed as enums: vertex animation style
//! ([`Vertices`]), tag attachment ([`Attachment`]) and level of detail
//! ([`Lod`]).

mod skeleton;

pub use skeleton::*;

use crate::util::{bounds_of, radius_about, Mat3, Vec2, Vec3};

/// Weight sums further than this from one are renormalized.
pub const WEIGHT_TOLERANCE: f32 = 1e-3;

/// A complete model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub name: String,
    pub flags: i32,
    pub skin_count: i32,
    pub frames: Vec<Frame>,
    pub surfaces: Vec<Surface>,
    pub tags: Vec<Tag>,
    pub skeleton: Option<Skeleton>,
    pub lod: Option<Lod>,
}

impl Model {
    /// Number of animation frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// True if any surface is skinned to a skeleton.
    pub fn is_rigged(&self) -> bool {
        self.surfaces.iter().any(|s| s.vertices.is_rigged())
    }

    /// Total vertex count over all surfaces.
    pub fn vertex_count(&self) -> usize {
        self.surfaces.iter().map(Surface::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.triangles.len()).sum()
    }

    /// Find a tag by name.
    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }
}

/// Per-frame bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingVolume {
    pub min: Vec3,
    pub max: Vec3,
    pub origin: Vec3,
    pub radius: f32,
}

impl BoundingVolume {
    /// Box around `points` and the sphere about `origin` enclosing them.
    pub fn around(points: &[Vec3], origin: Vec3) -> Self {
        let (min, max) = bounds_of(points.iter().copied());
        Self {
            min,
            max,
            origin,
            radius: radius_about(origin, points.iter().copied()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub name: String,
    pub bounds: BoundingVolume,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderRef {
    pub name: String,
    pub index: i32,
}

/// One mesh with a single material set.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub name: String,
    /// Identifier read from a file that differs from the format's own.
    /// Written back as is; `None` writes the target format's identifier.
    pub ident: Option<[u8; 4]>,
    pub flags: i32,
    pub shaders: Vec<ShaderRef>,
    pub triangles: Vec<[u32; 3]>,
    /// One texture coordinate per vertex.
    pub uvs: Vec<Vec2>,
    pub vertices: Vertices,
    /// Bones the surface depends on, ascending.
    pub bone_refs: Vec<u32>,
}

impl Surface {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Vertex locations at `frame`; rigged vertices are skinned with `skeleton`.
    pub fn positions_at(&self, frame: usize, skeleton: Option<&Skeleton>) -> Vec<Vec3> {
        match &self.vertices {
            Vertices::Morph(verts) => verts
                .iter()
                .map(|v| v.frames.get(frame).map_or(Vec3::ZERO, |f| f.location))
                .collect(),
            Vertices::Rigged(verts) => verts
                .iter()
                .map(|v| match skeleton {
                    Some(s) => s.skin(v, frame).location,
                    None => Vec3::ZERO,
                })
                .collect(),
        }
    }
}

/// Vertices of one surface, all animated the same way.
#[derive(Debug, Clone, PartialEq)]
pub enum Vertices {
    /// Absolute location and normal per frame.
    Morph(Vec<MorphVertex>),
    /// Skinned to skeleton bones.
    Rigged(Vec<RiggedVertex>),
}

impl Vertices {
    pub fn len(&self) -> usize {
        match self {
            Self::Morph(v) => v.len(),
            Self::Rigged(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_rigged(&self) -> bool {
        matches!(self, Self::Rigged(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VertexFrame {
    pub location: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MorphVertex {
    pub frames: Vec<VertexFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight {
    pub bone: u32,
    pub weight: f32,
    /// Location in the bone's frame.
    pub offset: Vec3,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RiggedVertex {
    /// Normal in the frame of the first weight's bone.
    pub normal: Vec3,
    pub weights: Vec<Weight>,
    /// Stored verbatim; no meaning is attached.
    pub fixed_parent: i32,
    pub fixed_dist: f32,
}

/// Outcome of [`normalize_weights`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightFix {
    /// Sum was within tolerance.
    Unchanged,
    /// Weights were rescaled from this sum.
    Rescaled(f32),
    /// Sum was zero; nothing could be done.
    Zero,
}

/// Rescale weights so they sum to one.
pub fn normalize_weights(weights: &mut [Weight]) -> WeightFix {
    if weights.is_empty() {
        return WeightFix::Unchanged;
    }
    let sum: f32 = weights.iter().map(|w| w.weight).sum();
    if (sum - 1.0).abs() <= WEIGHT_TOLERANCE {
        return WeightFix::Unchanged;
    }
    if sum == 0.0 {
        return WeightFix::Zero;
    }
    for w in weights.iter_mut() {
        w.weight /= sum;
    }
    WeightFix::Rescaled(sum)
}

/// A named attachment point.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub attachment: Attachment,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagFrame {
    pub location: Vec3,
    /// Columns are the forward, left and up axes.
    pub orientation: Mat3,
}

impl Default for TagFrame {
    fn default() -> Self {
        Self {
            location: Vec3::ZERO,
            orientation: Mat3::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attachment {
    /// Independent transform per frame.
    Free(Vec<TagFrame>),
    /// Follows a bone exactly.
    Bone { bone: u32, torso_weight: f32 },
    /// Fixed transform relative to a bone.
    BoneOffset {
        bone: u32,
        offset: Vec3,
        orientation: Mat3,
        bone_refs: Vec<u32>,
    },
}

impl Attachment {
    /// Short name of the variant, for messages.
    pub fn style(&self) -> &'static str {
        match self {
            Self::Free(_) => "free",
            Self::Bone { .. } => "bone",
            Self::BoneOffset { .. } => "bone-offset",
        }
    }
}

/// Level-of-detail data.
#[derive(Debug, Clone, PartialEq)]
pub enum Lod {
    /// Only a minimum vertex count per surface.
    Discrete { min_vertices: Vec<u32> },
    /// Full collapse maps per surface.
    CollapseMap {
        scale: f32,
        bias: f32,
        surfaces: Vec<CollapseMap>,
    },
}

impl Lod {
    /// Reduce to per-surface minimum vertex counts, which every style carries.
    pub fn to_discrete(&self) -> Lod {
        match self {
            Self::Discrete { .. } => self.clone(),
            Self::CollapseMap { surfaces, .. } => Self::Discrete {
                min_vertices: surfaces.iter().map(|m| m.min_lod).collect(),
            },
        }
    }

    /// Minimum vertex count per surface.
    pub fn min_vertices(&self) -> Vec<u32> {
        match self.to_discrete() {
            Self::Discrete { min_vertices } => min_vertices,
            Self::CollapseMap { .. } => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollapseMap {
    pub min_lod: u32,
    /// Per vertex: the vertex it collapses into, or -1.
    pub map: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_weights() {
        let w = |weight| Weight {
            bone: 0,
            weight,
            offset: Vec3::ZERO,
        };
        let mut ok = vec![w(0.5), w(0.5005)];
        assert_eq!(normalize_weights(&mut ok), WeightFix::Unchanged);

        let mut off = vec![w(0.5), w(1.5)];
        assert_eq!(normalize_weights(&mut off), WeightFix::Rescaled(2.0));
        let sum: f32 = off.iter().map(|w| w.weight).sum();
        assert!((sum - 1.0).abs() < 1e-6);

        assert_eq!(normalize_weights(&mut [w(0.0)]), WeightFix::Zero);
        assert_eq!(normalize_weights(&mut []), WeightFix::Unchanged);
    }

    #[test]
    fn test_bounding_volume() {
        let b = BoundingVolume::around(&[Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.0, -4.0, 0.0)], Vec3::ZERO);
        assert_eq!(b.min, Vec3::new(0.0, -4.0, 0.0));
        assert_eq!(b.max, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(b.radius, 4.0);
    }

    #[test]
    fn test_collapse_maps_to_discrete() {
        let lod = Lod::CollapseMap {
            scale: 1.0,
            bias: 0.0,
            surfaces: vec![
                CollapseMap {
                    min_lod: 3,
                    map: vec![-1, 0, 1, 2],
                },
                CollapseMap {
                    min_lod: 5,
                    map: vec![],
                },
            ],
        };
        assert_eq!(lod.to_discrete(), Lod::Discrete { min_vertices: vec![3, 5] });
        assert_eq!(lod.to_discrete().min_vertices(), vec![3, 5]);
    }

    #[test]
    fn test_morph_positions() {
        let surface = Surface {
            name: "s".into(),
            ident: None,
            flags: 0,
            shaders: vec![],
            triangles: vec![],
            uvs: vec![Vec2::ZERO],
            vertices: Vertices::Morph(vec![MorphVertex {
                frames: vec![
                    VertexFrame {
                        location: Vec3::X,
                        normal: Vec3::Z,
                    },
                    VertexFrame {
                        location: Vec3::Y,
                        normal: Vec3::Z,
                    },
                ],
            }]),
            bone_refs: vec![],
        };
        assert_eq!(surface.positions_at(1, None), vec![Vec3::Y]);
        assert!(!surface.vertices.is_rigged());
    }
}
