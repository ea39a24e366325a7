//! Skeleton and weighted-surface translation shared by MDS, MDM and MDX.
//!
//! Bones are stored as quantized Euler angles plus a pitch/yaw direction
//! from the parent; the parent distance is fixed per bone. Both directions
//! walk the hierarchy parents-first and carry model-space locations in
//! double precision down the chain, rounding to `f32` only per pose.

use crate::format::{BoneRecord, CompressedBone, SkelFrame, SkelFrameHeader, SkelLayout, SkelSurface, SkelVertex, WeightRecord, NO_PARENT};
use crate::model::{
    normalize_weights, Bone, BoundingVolume, CollapseMap, Frame, Lod, Model, Pose, RiggedVertex, ShaderRef, Skeleton,
    Surface, Vertices, Weight, WeightFix,
};
use crate::quant::{angle_to_short, short_to_angle};
use crate::util::{angle_vector, angles_to_axis, axis_to_angles, vector_to_pitch_yaw, DVec3, Diagnostics, Error, Result, Vec3, Warning};

use super::{foreign_ident, triangles_from, triangles_to};

fn parent_index(parent: i32) -> Option<u32> {
    (parent != NO_PARENT).then_some(parent as u32)
}

fn decode_orientation(angles: [i16; 4]) -> crate::util::Mat3 {
    angles_to_axis(DVec3::new(
        short_to_angle(angles[0]),
        short_to_angle(angles[1]),
        short_to_angle(angles[2]),
    ))
}

fn direction(ofs_angles: [i16; 2]) -> DVec3 {
    angle_vector(short_to_angle(ofs_angles[0]), short_to_angle(ofs_angles[1]))
}

/// Pitch and yaw steps that place `bone` at its frame `f` location from `from`.
///
/// The direction read from the file wins while it still lands on the pose.
/// Otherwise the nearest steps are derived from the pose, preferring one
/// that lands exactly on the stored `f32` location.
fn parent_direction(bone: &Bone, f: usize, from: DVec3) -> [i16; 2] {
    let target = bone.poses[f].location;
    let dist = bone.parent_dist as f64;
    let lands = |ofs: [i16; 2]| (from + direction(ofs) * dist).as_vec3() == target;
    if let Some(&ofs) = bone.parent_dirs.get(f).filter(|&&ofs| lands(ofs)) {
        return ofs;
    }
    let (pitch, yaw) = vector_to_pitch_yaw(target.as_dvec3() - from);
    let guess = [angle_to_short(pitch), angle_to_short(yaw)];
    let near = (-1i16..=1)
        .flat_map(|dp| (-1i16..=1).map(move |dy| [guess[0].wrapping_add(dp), guess[1].wrapping_add(dy)]));
    std::iter::once(guess).chain(near).find(|&ofs| lands(ofs)).unwrap_or(guess)
}

/// Rebuild a posed skeleton and per-frame bounds from stored bones.
///
/// Bone records must already be validated: parents in range, no cycles.
pub fn decode_skeleton(
    name: &str,
    torso_parent: i32,
    records: &[BoneRecord],
    frames: &[SkelFrame],
) -> (Skeleton, Vec<Frame>) {
    let mut skeleton = Skeleton {
        name: name.to_string(),
        torso_parent: parent_index(torso_parent),
        bones: records
            .iter()
            .map(|b| Bone {
                name: b.name.clone(),
                parent: parent_index(b.parent),
                torso_weight: b.torso_weight,
                parent_dist: b.parent_dist,
                flags: b.flags,
                poses: Vec::with_capacity(frames.len()),
                parent_dirs: Vec::with_capacity(frames.len()),
            })
            .collect(),
    };
    let order = skeleton.order();

    for frame in frames {
        let mut placed = vec![DVec3::ZERO; records.len()];
        for &b in &order {
            let bone = &skeleton.bones[b];
            placed[b] = match bone.parent {
                None => frame.header.parent_offset.as_dvec3(),
                Some(p) => placed[p as usize] + direction(frame.bones[b].ofs_angles) * bone.parent_dist as f64,
            };
        }
        for ((bone, stored), location) in skeleton.bones.iter_mut().zip(&frame.bones).zip(placed) {
            bone.poses.push(Pose {
                location: location.as_vec3(),
                orientation: decode_orientation(stored.angles),
            });
            bone.parent_dirs.push(stored.ofs_angles);
        }
    }

    let frames = frames
        .iter()
        .map(|f| Frame {
            name: String::new(),
            bounds: BoundingVolume {
                min: f.header.min,
                max: f.header.max,
                origin: f.header.origin,
                radius: f.header.radius,
            },
        })
        .collect();
    (skeleton, frames)
}

/// Quantize a posed skeleton back into bone records and frames.
///
/// Every bone must carry one pose per entry of `frames`. The unused fourth
/// angle and the direction of root bones are written as zero; the first
/// root bone's location becomes the frame's parent offset.
pub fn encode_skeleton(skeleton: &Skeleton, frames: &[Frame]) -> Result<(Vec<BoneRecord>, Vec<SkelFrame>)> {
    let count = frames.len();
    let n = skeleton.bones.len();
    let mut records = Vec::with_capacity(n);
    for bone in &skeleton.bones {
        if bone.poses.len() != count {
            return Err(Error::unsupported(format!(
                "bone {:?} has {} poses, model has {count} frames",
                bone.name,
                bone.poses.len()
            )));
        }
        let parent = match bone.parent {
            Some(p) if p as usize >= n => {
                return Err(Error::unsupported(format!("bone {:?}: parent {p} does not exist", bone.name)));
            }
            Some(p) => crate::codec::to_i32(p as usize, "bone parent")?,
            None => NO_PARENT,
        };
        records.push(BoneRecord {
            name: bone.name.clone(),
            parent,
            torso_weight: bone.torso_weight,
            parent_dist: bone.parent_dist,
            flags: bone.flags,
        });
    }
    let root = skeleton.bones.iter().position(|b| b.parent.is_none());
    let order = skeleton.order();

    let frames = frames
        .iter()
        .enumerate()
        .map(|(f, frame)| {
            let parent_offset = root.map_or(Vec3::ZERO, |r| skeleton.bones[r].poses[f].location);
            let mut placed = vec![DVec3::ZERO; n];
            let mut ofs = vec![[0i16; 2]; n];
            for &b in &order {
                let bone = &skeleton.bones[b];
                placed[b] = match bone.parent {
                    None => parent_offset.as_dvec3(),
                    Some(p) => {
                        let from = placed[p as usize];
                        ofs[b] = parent_direction(bone, f, from);
                        from + direction(ofs[b]) * bone.parent_dist as f64
                    }
                };
            }
            let bones = skeleton
                .bones
                .iter()
                .zip(ofs)
                .map(|(bone, ofs_angles)| {
                    let a = axis_to_angles(bone.poses[f].orientation);
                    CompressedBone {
                        angles: [angle_to_short(a.x), angle_to_short(a.y), angle_to_short(a.z), 0],
                        ofs_angles,
                    }
                })
                .collect();
            SkelFrame {
                header: SkelFrameHeader {
                    min: frame.bounds.min,
                    max: frame.bounds.max,
                    origin: frame.bounds.origin,
                    radius: frame.bounds.radius,
                    parent_offset,
                },
                bones,
            }
        })
        .collect();
    Ok((records, frames))
}

/// Turn a stored skeletal surface into a model surface and its collapse map.
pub(crate) fn decode_skel_surface(
    stored: SkelSurface,
    layout: &SkelLayout,
    diag: &mut Diagnostics,
) -> (Surface, CollapseMap) {
    let ident = foreign_ident(&stored.name, stored.ident, layout.ident, diag);
    let uvs = stored.vertices.iter().map(|v| v.uv).collect();
    let vertices = stored
        .vertices
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            let mut weights: Vec<Weight> = v
                .weights
                .iter()
                .map(|w| Weight {
                    bone: w.bone as u32,
                    weight: w.weight,
                    offset: w.offset,
                })
                .collect();
            match normalize_weights(&mut weights) {
                WeightFix::Unchanged => {}
                WeightFix::Rescaled(sum) => diag.push(Warning::WeightSum {
                    surface: stored.name.clone(),
                    vertex: i,
                    sum,
                }),
                WeightFix::Zero => diag.push(Warning::ZeroWeights {
                    surface: stored.name.clone(),
                    vertex: i,
                }),
            }
            RiggedVertex {
                normal: v.normal,
                weights,
                fixed_parent: v.fixed_parent,
                fixed_dist: v.fixed_dist,
            }
        })
        .collect();

    let surface = Surface {
        name: stored.name,
        ident,
        flags: 0,
        shaders: vec![ShaderRef {
            name: stored.shader,
            index: stored.shader_index,
        }],
        triangles: triangles_from(&stored.triangles),
        uvs,
        vertices: Vertices::Rigged(vertices),
        bone_refs: stored.bone_refs.iter().map(|&b| b as u32).collect(),
    };
    let collapse = CollapseMap {
        min_lod: stored.min_lod.max(0) as u32,
        map: stored.collapse_map,
    };
    (surface, collapse)
}

/// Build a stored skeletal surface from a rigged model surface.
///
/// Weights and bone references must name one of `bone_count` bones.
pub(crate) fn encode_skel_surface(
    surface: &Surface,
    collapse: &CollapseMap,
    layout: &SkelLayout,
    bone_count: usize,
) -> Result<SkelSurface> {
    let Vertices::Rigged(verts) = &surface.vertices else {
        return Err(Error::unsupported(format!("surface {:?} is not rigged", surface.name)));
    };
    let weight_bones = verts.iter().flat_map(|v| v.weights.iter().map(|w| w.bone));
    if let Some(bone) = weight_bones.chain(surface.bone_refs.iter().copied()).find(|&b| b as usize >= bone_count) {
        return Err(Error::unsupported(format!(
            "surface {:?} references bone {bone}, skeleton has {bone_count}",
            surface.name
        )));
    }
    if surface.shaders.len() > 1 {
        return Err(Error::unsupported(format!(
            "surface {:?} has {} shaders, skeletal surfaces hold one",
            surface.name,
            surface.shaders.len()
        )));
    }
    if collapse.map.len() != verts.len() {
        return Err(Error::unsupported(format!(
            "surface {:?}: collapse map covers {} of {} vertices",
            surface.name,
            collapse.map.len(),
            verts.len()
        )));
    }
    let (shader, shader_index) = surface
        .shaders
        .first()
        .map_or((String::new(), 0), |s| (s.name.clone(), s.index));

    let vertices = verts
        .iter()
        .enumerate()
        .map(|(i, v)| SkelVertex {
            normal: v.normal,
            uv: surface.uvs.get(i).copied().unwrap_or_default(),
            fixed_parent: v.fixed_parent,
            fixed_dist: v.fixed_dist,
            weights: v
                .weights
                .iter()
                .map(|w| WeightRecord {
                    bone: w.bone as i32,
                    weight: w.weight,
                    offset: w.offset,
                })
                .collect(),
        })
        .collect();

    Ok(SkelSurface {
        ident: surface.ident.unwrap_or(layout.ident),
        name: surface.name.clone(),
        shader,
        shader_index,
        min_lod: crate::codec::to_i32(collapse.min_lod as usize, "minimum LOD")?,
        vertices,
        triangles: triangles_to(surface)?,
        collapse_map: collapse.map.clone(),
        bone_refs: surface.bone_refs.iter().map(|&b| b as i32).collect(),
    })
}

/// Collapse-map LOD of a model, one map per surface.
pub(crate) fn collapse_lod<'a>(model: &'a Model, format: &str) -> Result<(f32, f32, &'a [CollapseMap])> {
    match &model.lod {
        Some(Lod::CollapseMap { scale, bias, surfaces }) if surfaces.len() == model.surfaces.len() => {
            Ok((*scale, *bias, surfaces))
        }
        Some(Lod::CollapseMap { surfaces, .. }) => Err(Error::unsupported(format!(
            "{format}: {} collapse maps for {} surfaces",
            surfaces.len(),
            model.surfaces.len()
        ))),
        _ => Err(Error::unsupported(format!("{format} requires collapse-map LOD"))),
    }
}

/// The model's skeleton, failing if it has none.
pub(crate) fn require_skeleton<'a>(model: &'a Model, format: &str) -> Result<&'a Skeleton> {
    model
        .skeleton
        .as_ref()
        .ok_or_else(|| Error::unsupported(format!("{format} requires a skeleton")))
}

/// Torso parent as stored, `-1` for none.
pub(crate) fn torso_parent_field(skeleton: &Skeleton) -> Result<i32> {
    match skeleton.torso_parent {
        Some(p) if p as usize >= skeleton.bones.len() => {
            Err(Error::unsupported(format!("torso parent {p} does not exist")))
        }
        Some(p) => Ok(p as i32),
        None => Ok(NO_PARENT),
    }
}
