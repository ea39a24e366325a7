//! MD3: full-precision morph targets and free tags.

use crate::format::{md3, Md3, Md3Surface, ShaderRecord, TexCoord, XyzNormal};
use crate::model::{Model, MorphVertex, ShaderRef, Surface, VertexFrame, Vertices};
use crate::quant::{decode_location, decode_normal, encode_location, encode_normal};
use crate::util::{Diagnostics, Error, Outcome, Result};

use super::{
    foreign_ident, frame_from, frame_to, free_tags, morph_frames, require_morph, tag_rows, tags_from_rows,
    triangles_from, triangles_to,
};

/// Decode MD3 bytes.
pub fn decode(data: &[u8]) -> Result<Outcome<Model>> {
    Ok(from_records(md3::read(data)?))
}

/// Encode a morph-animated model as MD3 bytes.
pub fn encode(model: &Model) -> Result<Vec<u8>> {
    md3::write(&to_records(model)?)
}

pub fn from_records(file: Md3) -> Outcome<Model> {
    let mut diag = Diagnostics::new();
    let tags = tags_from_rows(&file.tags, &mut diag);
    let surfaces = file
        .surfaces
        .into_iter()
        .map(|s| decode_surface(s, &mut diag))
        .collect();
    let model = Model {
        name: file.name,
        flags: file.flags,
        skin_count: file.num_skins,
        frames: file.frames.iter().map(frame_from).collect(),
        surfaces,
        tags,
        skeleton: None,
        lod: None,
    };
    diag.finish(model)
}

pub(crate) fn decode_shaders(shaders: &[ShaderRecord]) -> Vec<ShaderRef> {
    shaders
        .iter()
        .map(|s| ShaderRef {
            name: s.name.clone(),
            index: s.index,
        })
        .collect()
}

pub(crate) fn encode_shaders(shaders: &[ShaderRef]) -> Vec<ShaderRecord> {
    shaders
        .iter()
        .map(|s| ShaderRecord {
            name: s.name.clone(),
            index: s.index,
        })
        .collect()
}

fn decode_surface(s: Md3Surface, diag: &mut Diagnostics) -> Surface {
    let ident = foreign_ident(&s.name, s.ident, md3::IDENT, diag);
    let count = s.vertex_count();
    let vertices = (0..count)
        .map(|v| MorphVertex {
            frames: s
                .vertices
                .iter()
                .map(|row| VertexFrame {
                    location: decode_location(row[v].xyz),
                    normal: decode_normal(row[v].normal),
                })
                .collect(),
        })
        .collect();
    Surface {
        shaders: decode_shaders(&s.shaders),
        triangles: triangles_from(&s.triangles),
        uvs: s.uvs.iter().map(|t| t.0).collect(),
        vertices: Vertices::Morph(vertices),
        bone_refs: Vec::new(),
        name: s.name,
        ident,
        flags: s.flags,
    }
}

/// Quantize a model into an MD3 record graph.
///
/// Skeleton and LOD data are not representable and are ignored.
pub fn to_records(model: &Model) -> Result<Md3> {
    require_morph(model, "MD3")?;
    let frames = model.frame_count();
    let tags = tag_rows(&free_tags(model, "MD3")?, frames)?;
    let surfaces = model
        .surfaces
        .iter()
        .map(|s| encode_surface(s, frames))
        .collect::<Result<_>>()?;
    Ok(Md3 {
        name: model.name.clone(),
        flags: model.flags,
        num_skins: model.skin_count,
        frames: model.frames.iter().map(frame_to).collect(),
        tags,
        surfaces,
    })
}

fn encode_surface(s: &Surface, frames: usize) -> Result<Md3Surface> {
    let verts = morph_frames(s, frames)?;
    if s.uvs.len() != verts.len() {
        return Err(Error::unsupported(format!(
            "surface {:?}: {} texture coordinates for {} vertices",
            s.name,
            s.uvs.len(),
            verts.len()
        )));
    }
    let vertices = (0..frames)
        .map(|f| {
            verts
                .iter()
                .map(|v| {
                    let vf = &v.frames[f];
                    Ok(XyzNormal {
                        xyz: encode_location(vf.location)?,
                        normal: encode_normal(vf.normal),
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Md3Surface {
        ident: s.ident.unwrap_or(md3::IDENT),
        name: s.name.clone(),
        flags: s.flags,
        shaders: encode_shaders(&s.shaders),
        triangles: triangles_to(s)?,
        uvs: s.uvs.iter().copied().map(TexCoord).collect(),
        vertices,
    })
}
