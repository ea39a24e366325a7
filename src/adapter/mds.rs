//! MDS: skeleton, weighted mesh and bone-bound tags in one file.

use crate::format::{mds, Mds, MdsTag};
use crate::model::{Attachment, Lod, Model, Tag};
use crate::util::{Diagnostics, Error, Outcome, Result};

use super::skeletal::{
    collapse_lod, decode_skel_surface, encode_skel_surface, require_skeleton, torso_parent_field,
};
use super::{check_tag_name, decode_skeleton, encode_skeleton, require_rigged};

/// Decode MDS bytes.
pub fn decode(data: &[u8]) -> Result<Outcome<Model>> {
    Ok(from_records(mds::read(data)?))
}

/// Encode a rigged model as MDS bytes.
pub fn encode(model: &Model) -> Result<Vec<u8>> {
    mds::write(&to_records(model)?)
}

pub fn from_records(file: Mds) -> Outcome<Model> {
    let mut diag = Diagnostics::new();
    let (skeleton, frames) = decode_skeleton(&file.name, file.torso_parent, &file.bones, &file.frames);
    let (surfaces, maps) = file
        .surfaces
        .into_iter()
        .map(|s| decode_skel_surface(s, &mds::LAYOUT, &mut diag))
        .unzip();
    let tags = file
        .tags
        .into_iter()
        .map(|t| {
            check_tag_name(&t.name, &mut diag);
            Tag {
                name: t.name,
                attachment: Attachment::Bone {
                    bone: t.bone as u32,
                    torso_weight: t.torso_weight,
                },
            }
        })
        .collect();
    let model = Model {
        name: file.name,
        frames,
        surfaces,
        tags,
        skeleton: Some(skeleton),
        lod: Some(Lod::CollapseMap {
            scale: file.lod_scale,
            bias: file.lod_bias,
            surfaces: maps,
        }),
        ..Model::default()
    };
    diag.finish(model)
}

/// Build an MDS record graph.
///
/// Requires a skeleton, rigged surfaces, one collapse map per surface and
/// bone-bound tags.
pub fn to_records(model: &Model) -> Result<Mds> {
    require_rigged(model, "MDS")?;
    let skeleton = require_skeleton(model, "MDS")?;
    let (lod_scale, lod_bias, maps) = collapse_lod(model, "MDS")?;
    let (bones, frames) = encode_skeleton(skeleton, &model.frames)?;
    let bone_count = bones.len();

    let surfaces = model
        .surfaces
        .iter()
        .zip(maps)
        .map(|(s, map)| encode_skel_surface(s, map, &mds::LAYOUT, bone_count))
        .collect::<Result<_>>()?;
    let tags = model
        .tags
        .iter()
        .map(|tag| match tag.attachment {
            Attachment::Bone { bone, torso_weight } if (bone as usize) < bone_count => Ok(MdsTag {
                name: tag.name.clone(),
                torso_weight,
                bone: bone as i32,
            }),
            Attachment::Bone { bone, .. } => Err(Error::unsupported(format!(
                "tag {:?} references bone {bone}, skeleton has {bone_count}",
                tag.name
            ))),
            ref other => Err(Error::unsupported(format!(
                "MDS stores bone tags only; tag {:?} is {}",
                tag.name,
                other.style()
            ))),
        })
        .collect::<Result<_>>()?;

    Ok(Mds {
        name: model.name.clone(),
        lod_scale,
        lod_bias,
        torso_parent: torso_parent_field(skeleton)?,
        frames,
        bones,
        surfaces,
        tags,
    })
}
