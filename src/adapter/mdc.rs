//! MDC: morph targets stored as base frames plus byte deltas.
//!
//! Decoding expands every animation frame to absolute locations. Encoding
//! reselects base frames from the model, so a file written by this crate
//! decodes and re-encodes to the same bytes.

use crate::compress::{decode_vertex, encode_vertex, select_base_frames, FrameLocations};
use crate::format::{mdc, Mdc, MdcSurface, MdcTag, TexCoord, XyzNormal};
use crate::model::{Attachment, Model, MorphVertex, Surface, Tag, TagFrame, VertexFrame, Vertices};
use crate::quant::{decode_location, decode_normal, decode_tag_angle, encode_location, encode_normal, encode_tag_angle};
use crate::util::{angles_to_axis, axis_to_angles, DVec3, Diagnostics, Error, Outcome, Result};

use super::md3::{decode_shaders, encode_shaders};
use super::{check_tag_name, foreign_ident, frame_from, frame_to, free_tags, morph_frames, require_morph, triangles_from, triangles_to};

/// Decode MDC bytes.
pub fn decode(data: &[u8]) -> Result<Outcome<Model>> {
    from_records(mdc::read(data)?)
}

/// Encode a morph-animated model as MDC bytes.
pub fn encode(model: &Model) -> Result<Vec<u8>> {
    mdc::write(&to_records(model)?)
}

fn decode_tag(tag: &MdcTag) -> TagFrame {
    let angles = DVec3::new(
        decode_tag_angle(tag.angles[0]),
        decode_tag_angle(tag.angles[1]),
        decode_tag_angle(tag.angles[2]),
    );
    TagFrame {
        location: decode_location(tag.xyz),
        orientation: angles_to_axis(angles),
    }
}

fn encode_tag(frame: &TagFrame) -> Result<MdcTag> {
    let a = axis_to_angles(frame.orientation);
    Ok(MdcTag {
        xyz: encode_location(frame.location)?,
        angles: [encode_tag_angle(a.x)?, encode_tag_angle(a.y)?, encode_tag_angle(a.z)?],
    })
}

/// Check that frame tables and rows cover every frame, vertex and tag.
fn check_tables(file: &Mdc) -> Result<()> {
    let frames = file.frames.len();
    if file.tags.len() < frames && !file.tag_names.is_empty() {
        return Err(Error::other(format!("mdc tags: {} rows for {frames} frames", file.tags.len())));
    }
    if let Some(row) = file.tags.iter().position(|row| row.len() < file.tag_names.len()) {
        return Err(Error::other(format!("mdc tags: row {row} is short")));
    }
    for s in &file.surfaces {
        let fail = |what: String| Err(Error::other(format!("mdc surface {:?}: {what}", s.name)));
        if s.frame_base.len() < frames || s.frame_comp.len() < frames {
            return fail(format!("frame tables cover fewer than {frames} frames"));
        }
        let count = s.uvs.len();
        for f in 0..frames {
            let base = s.frame_base[f];
            if base < 0 || s.base_vertices.get(base as usize).map_or(true, |row| row.len() < count) {
                return fail(format!("frame {f} names base frame {base}"));
            }
            let comp = s.frame_comp[f];
            if comp >= 0 && s.comp_vertices.get(comp as usize).map_or(true, |row| row.len() < count) {
                return fail(format!("frame {f} names compressed frame {comp}"));
            }
        }
    }
    Ok(())
}

/// Expand an MDC record graph, failing on frame tables that point nowhere.
pub fn from_records(file: Mdc) -> Result<Outcome<Model>> {
    check_tables(&file)?;
    let mut diag = Diagnostics::new();
    let tags = file
        .tag_names
        .iter()
        .enumerate()
        .map(|(t, name)| {
            check_tag_name(name, &mut diag);
            Tag {
                name: name.clone(),
                attachment: Attachment::Free(file.tags.iter().map(|row| decode_tag(&row[t])).collect()),
            }
        })
        .collect();
    let frame_count = file.frames.len();
    let surfaces = file
        .surfaces
        .into_iter()
        .map(|s| decode_surface(s, frame_count, &mut diag))
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
    Ok(diag.finish(model))
}

fn decode_surface(s: MdcSurface, frame_count: usize, diag: &mut Diagnostics) -> Surface {
    let ident = foreign_ident(&s.name, s.ident, mdc::IDENT, diag);
    let count = s.uvs.len();
    let mut vertices = vec![MorphVertex::default(); count];
    for f in 0..frame_count {
        let base = &s.base_vertices[s.frame_base[f] as usize];
        let comp = match s.frame_comp[f] {
            c if c < 0 => None,
            c => Some(&s.comp_vertices[c as usize]),
        };
        for (v, vertex) in vertices.iter_mut().enumerate() {
            let frame = match comp {
                None => VertexFrame {
                    location: decode_location(base[v].xyz),
                    normal: decode_normal(base[v].normal),
                },
                Some(row) => {
                    let (location, normal) = decode_vertex(row[v], decode_location(base[v].xyz));
                    VertexFrame { location, normal }
                }
            };
            vertex.frames.push(frame);
        }
    }
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

/// Compress a model into an MDC record graph.
pub fn to_records(model: &Model) -> Result<Mdc> {
    require_morph(model, "MDC")?;
    let frames = model.frame_count();
    if frames > i16::MAX as usize {
        return Err(Error::OutOfRange {
            what: "mdc frame count",
            value: frames as f64,
        });
    }

    let free = free_tags(model, "MDC")?;
    let mut tags = vec![Vec::with_capacity(free.len()); frames];
    for (name, samples) in &free {
        if samples.len() != frames {
            return Err(Error::unsupported(format!(
                "tag {name:?} has {} frames, model has {frames}",
                samples.len()
            )));
        }
        for (row, sample) in tags.iter_mut().zip(samples.iter()) {
            row.push(encode_tag(sample)?);
        }
    }

    let morph = model
        .surfaces
        .iter()
        .map(|s| morph_frames(s, frames))
        .collect::<Result<Vec<_>>>()?;
    let locations: Vec<FrameLocations> = morph
        .iter()
        .map(|verts| {
            (0..frames)
                .map(|f| verts.iter().map(|v| v.frames[f].location).collect())
                .collect()
        })
        .collect();
    let plan = select_base_frames(&locations, frames);

    let frame_base = plan
        .frame_base
        .iter()
        .map(|&b| {
            i16::try_from(b).map_err(|_| Error::OutOfRange {
                what: "mdc base frame count",
                value: b as f64,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let surfaces = model
        .surfaces
        .iter()
        .zip(&morph)
        .map(|(s, verts)| {
            if s.uvs.len() != verts.len() {
                return Err(Error::unsupported(format!(
                    "surface {:?}: {} texture coordinates for {} vertices",
                    s.name,
                    s.uvs.len(),
                    verts.len()
                )));
            }
            let base_vertices = plan
                .base_frames
                .iter()
                .map(|&f| {
                    verts
                        .iter()
                        .map(|v| {
                            Ok(XyzNormal {
                                xyz: encode_location(v.frames[f].location)?,
                                normal: encode_normal(v.frames[f].normal),
                            })
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?;
            let comp_vertices = plan
                .comp_frames
                .iter()
                .map(|&f| {
                    let base = &base_vertices[plan.frame_base[f] as usize];
                    verts
                        .iter()
                        .zip(base)
                        .map(|(v, b)| encode_vertex(v.frames[f].location, decode_location(b.xyz), v.frames[f].normal))
                        .collect()
                })
                .collect();
            Ok(MdcSurface {
                ident: s.ident.unwrap_or(mdc::IDENT),
                name: s.name.clone(),
                flags: s.flags,
                shaders: encode_shaders(&s.shaders),
                triangles: triangles_to(s)?,
                uvs: s.uvs.iter().copied().map(TexCoord).collect(),
                base_vertices,
                comp_vertices,
                frame_base: frame_base.clone(),
                frame_comp: plan.frame_comp.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Mdc {
        name: model.name.clone(),
        flags: model.flags,
        num_skins: model.skin_count,
        frames: model.frames.iter().map(frame_to).collect(),
        tag_names: free.iter().map(|(name, _)| name.to_string()).collect(),
        tags,
        surfaces,
    })
}
