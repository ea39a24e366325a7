//! MDM + MDX: skeletal mesh and its animation in separate files.
//!
//! The pair decodes into one model. An MDM without its MDX still decodes,
//! without a skeleton and with unchecked bone indices; an MDX alone decodes
//! to a skeleton-only model.

use crate::format::{mdm, mdx, Mdm, MdmTag, Mdx};
use crate::model::{Attachment, Lod, Model, Tag};
use crate::util::{Diagnostics, Error, Mat3, Outcome, Result};

use super::skeletal::{
    collapse_lod, decode_skel_surface, encode_skel_surface, require_skeleton, torso_parent_field,
};
use super::{check_tag_name, decode_skeleton, encode_skeleton, require_rigged};

/// Decode an MDM file, optionally paired with its MDX.
pub fn decode(mesh: &[u8], anim: Option<&[u8]>) -> Result<Outcome<Model>> {
    let anim = anim.map(mdx::read).transpose()?;
    let mesh = mdm::read(mesh, anim.as_ref().map(|a| a.bones.len()))?;
    Ok(from_records(mesh, anim))
}

/// Encode a rigged model as an (MDM, MDX) pair.
pub fn encode(model: &Model) -> Result<(Vec<u8>, Vec<u8>)> {
    let (mesh, anim) = to_records(model)?;
    Ok((mdm::write(&mesh)?, mdx::write(&anim)?))
}

/// Decode an MDX file on its own.
pub fn decode_mdx(data: &[u8]) -> Result<Outcome<Model>> {
    let anim = mdx::read(data)?;
    let (skeleton, frames) = decode_skeleton(&anim.name, anim.torso_parent, &anim.bones, &anim.frames);
    Ok(Outcome::clean(Model {
        name: anim.name,
        frames,
        skeleton: Some(skeleton),
        ..Model::default()
    }))
}

/// Encode only the animation half of a model.
pub fn encode_mdx(model: &Model) -> Result<Vec<u8>> {
    mdx::write(&anim_records(model)?)
}

pub fn from_records(mesh: Mdm, anim: Option<Mdx>) -> Outcome<Model> {
    let mut diag = Diagnostics::new();
    let (skeleton, frames) = match &anim {
        Some(a) => {
            let (skeleton, frames) = decode_skeleton(&a.name, a.torso_parent, &a.bones, &a.frames);
            (Some(skeleton), frames)
        }
        None => (None, Vec::new()),
    };
    let (surfaces, maps) = mesh
        .surfaces
        .into_iter()
        .map(|s| decode_skel_surface(s, &mdm::LAYOUT, &mut diag))
        .unzip();
    let tags = mesh
        .tags
        .into_iter()
        .map(|t| {
            check_tag_name(&t.name, &mut diag);
            Tag {
                name: t.name,
                attachment: Attachment::BoneOffset {
                    bone: t.bone as u32,
                    offset: t.offset,
                    orientation: Mat3::from_cols(t.axis[0], t.axis[1], t.axis[2]),
                    bone_refs: t.bone_refs.iter().map(|&b| b as u32).collect(),
                },
            }
        })
        .collect();
    let model = Model {
        name: mesh.name,
        frames,
        surfaces,
        tags,
        skeleton,
        lod: Some(Lod::CollapseMap {
            scale: mesh.lod_scale,
            bias: mesh.lod_bias,
            surfaces: maps,
        }),
        ..Model::default()
    };
    diag.finish(model)
}

fn anim_records(model: &Model) -> Result<Mdx> {
    let skeleton = require_skeleton(model, "MDX")?;
    let (bones, frames) = encode_skeleton(skeleton, &model.frames)?;
    Ok(Mdx {
        name: skeleton.name.clone(),
        torso_parent: torso_parent_field(skeleton)?,
        frames,
        bones,
    })
}

/// Build the (MDM, MDX) record graphs.
///
/// Requires a skeleton, rigged surfaces, one collapse map per surface and
/// bone-offset tags.
pub fn to_records(model: &Model) -> Result<(Mdm, Mdx)> {
    require_rigged(model, "MDM")?;
    let anim = anim_records(model)?;
    let (lod_scale, lod_bias, maps) = collapse_lod(model, "MDM")?;
    let bone_count = anim.bones.len();

    let surfaces = model
        .surfaces
        .iter()
        .zip(maps)
        .map(|(s, map)| encode_skel_surface(s, map, &mdm::LAYOUT, bone_count))
        .collect::<Result<_>>()?;
    let tags = model
        .tags
        .iter()
        .map(|tag| match &tag.attachment {
            Attachment::BoneOffset {
                bone,
                offset,
                orientation,
                bone_refs,
            } => {
                if let Some(b) = std::iter::once(bone).chain(bone_refs).find(|&&b| b as usize >= bone_count) {
                    return Err(Error::unsupported(format!(
                        "tag {:?} references bone {b}, skeleton has {bone_count}",
                        tag.name
                    )));
                }
                Ok(MdmTag {
                    name: tag.name.clone(),
                    axis: [orientation.x_axis, orientation.y_axis, orientation.z_axis],
                    bone: *bone as i32,
                    offset: *offset,
                    bone_refs: bone_refs.iter().map(|&b| b as i32).collect(),
                })
            }
            other => Err(Error::unsupported(format!(
                "MDM stores bone-offset tags only; tag {:?} is {}",
                tag.name,
                other.style()
            ))),
        })
        .collect::<Result<_>>()?;

    let mesh = Mdm {
        name: model.name.clone(),
        lod_scale,
        lod_bias,
        surfaces,
        tags,
    };
    Ok((mesh, anim))
}
