//! Synthetic models shared by the integration tests.

#![allow(dead_code)]

use mdconv::model::{
    Attachment, Bone, BoundingVolume, Frame, MorphVertex, Pose, RiggedVertex, ShaderRef, Skeleton, Surface, Tag,
    TagFrame, VertexFrame, Vertices, Weight,
};
use mdconv::util::{Mat3, Vec2, Vec3};
use mdconv::Model;

/// Flat `n` x `n` vertex grid with unit spacing, two triangles per cell.
pub fn grid(n: u32) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let positions = (0..n * n)
        .map(|i| Vec3::new((i % n) as f32, (i / n) as f32, 0.0))
        .collect();
    let mut triangles = Vec::new();
    for y in 0..n - 1 {
        for x in 0..n - 1 {
            let i = y * n + x;
            triangles.push([i, i + 1, i + n + 1]);
            triangles.push([i, i + n + 1, i + n]);
        }
    }
    (positions, triangles)
}

fn frame(name: &str, points: &[Vec3]) -> Frame {
    Frame {
        name: name.into(),
        bounds: BoundingVolume::around(points, Vec3::ZERO),
    }
}

/// A 3x3 grid surface whose vertices move `shift[f]` along x at frame `f`,
/// plus one free tag following the first vertex.
pub fn morph_model(shift: &[f32]) -> Model {
    let (base, triangles) = grid(3);
    let vertices = base
        .iter()
        .map(|&p| MorphVertex {
            frames: shift
                .iter()
                .map(|&dx| VertexFrame {
                    location: p + Vec3::new(dx, 0.0, 0.0),
                    normal: Vec3::Z,
                })
                .collect(),
        })
        .collect();
    let frames = shift
        .iter()
        .enumerate()
        .map(|(i, &dx)| {
            let moved: Vec<Vec3> = base.iter().map(|&p| p + Vec3::new(dx, 0.0, 0.0)).collect();
            frame(&format!("frame{i}"), &moved)
        })
        .collect();
    let tag_frames = shift
        .iter()
        .map(|&dx| TagFrame {
            location: Vec3::new(dx, 0.0, 2.0),
            orientation: Mat3::IDENTITY,
        })
        .collect();
    Model {
        name: "models/plate.md3".into(),
        frames,
        surfaces: vec![Surface {
            name: "plate".into(),
            ident: None,
            flags: 0,
            shaders: vec![ShaderRef {
                name: "textures/plate".into(),
                index: 0,
            }],
            triangles,
            uvs: base.iter().map(|p| Vec2::new(p.x / 2.0, p.y / 2.0)).collect(),
            vertices: Vertices::Morph(vertices),
            bone_refs: vec![],
        }],
        tags: vec![Tag {
            name: "tag_corner".into(),
            attachment: Attachment::Free(tag_frames),
        }],
        ..Model::default()
    }
}

/// Two-bone rig over a 3x3 grid: the bottom row rides the root, the rest
/// ride a child bone 4 units above it. The root climbs one unit per frame.
pub fn rigged_model(frames: usize) -> Model {
    let (base, triangles) = grid(3);
    let pose = |z: f32| Pose {
        location: Vec3::new(0.0, 0.0, z),
        orientation: Mat3::IDENTITY,
    };
    let bone = |name: &str, parent: Option<u32>, lift: f32| Bone {
        name: name.into(),
        parent,
        torso_weight: 0.5,
        parent_dist: lift,
        flags: 0,
        poses: (0..frames).map(|f| pose(f as f32 + lift)).collect(),
        parent_dirs: Vec::new(),
    };
    let vertices = base
        .iter()
        .map(|p| {
            let bone = if p.y < 0.5 { 0 } else { 1 };
            RiggedVertex {
                normal: Vec3::Z,
                weights: vec![Weight {
                    bone,
                    weight: 1.0,
                    offset: Vec3::new(p.x, p.y, 0.0),
                }],
                fixed_parent: 0,
                fixed_dist: 0.0,
            }
        })
        .collect();
    Model {
        name: "models/rig.mds".into(),
        frames: (0..frames).map(|f| frame(&format!("frame{f}"), &base)).collect(),
        surfaces: vec![Surface {
            name: "body".into(),
            ident: None,
            flags: 0,
            shaders: vec![ShaderRef {
                name: "textures/body".into(),
                index: 0,
            }],
            triangles,
            uvs: vec![Vec2::ZERO; base.len()],
            vertices: Vertices::Rigged(vertices),
            bone_refs: vec![],
        }],
        tags: vec![Tag {
            name: "tag_head".into(),
            attachment: Attachment::Bone {
                bone: 1,
                torso_weight: 0.0,
            },
        }],
        skeleton: Some(Skeleton {
            name: "models/rig.mds".into(),
            torso_parent: Some(0),
            bones: vec![bone("root", None, 0.0), bone("chest", Some(0), 4.0)],
        }),
        ..Model::default()
    }
}
