//! Translation between container record graphs and the [`Model`].
//!
//! One module per format. Each exposes `decode`, which returns the model
//! together with any warnings raised while reading it, and `encode`, which
//! fails with [`Error::Unsupported`] when the model holds something the
//! format cannot store. Use [`crate::convert`] to coerce a model first.
//!
//! [`Model`]: crate::model::Model

pub mod md3;
pub mod mdc;
pub mod mdm;
pub mod mds;
pub mod tag;

mod skeletal;

pub use skeletal::{decode_skeleton, encode_skeleton};

use crate::format::{FrameRecord, TagRecord, Triangle};
use crate::model::{Attachment, BoundingVolume, Frame, Model, Surface, Tag, TagFrame, Vertices};
use crate::util::{Diagnostics, Error, Mat3, Result, Warning};

/// Expected prefix of tag names.
pub const TAG_PREFIX: &str = "tag_";

/// Warn about a tag name that does not follow the naming convention.
pub(crate) fn check_tag_name(name: &str, diag: &mut Diagnostics) {
    if !name.starts_with(TAG_PREFIX) {
        diag.push(Warning::TagName { name: name.to_string() });
    }
}

/// Surface identifier to keep on the model: `None` when it is the file's own,
/// otherwise the foreign one, with a warning.
pub(crate) fn foreign_ident(name: &str, found: [u8; 4], expected: [u8; 4], diag: &mut Diagnostics) -> Option<[u8; 4]> {
    if found == expected {
        return None;
    }
    diag.push(Warning::SurfaceIdent {
        surface: name.to_string(),
        expected,
        found,
    });
    Some(found)
}

pub(crate) fn triangles_from(records: &[Triangle]) -> Vec<[u32; 3]> {
    records.iter().map(|t| t.0.map(|i| i as u32)).collect()
}

pub(crate) fn triangles_to(surface: &Surface) -> Result<Vec<Triangle>> {
    let count = surface.vertex_count();
    surface
        .triangles
        .iter()
        .map(|tri| {
            if let Some(&bad) = tri.iter().find(|&&i| i as usize >= count) {
                return Err(Error::OutOfRange {
                    what: "triangle vertex index",
                    value: bad as f64,
                });
            }
            Ok(Triangle(tri.map(|i| i as i32)))
        })
        .collect()
}

pub(crate) fn frame_from(record: &FrameRecord) -> Frame {
    Frame {
        name: record.name.clone(),
        bounds: BoundingVolume {
            min: record.min,
            max: record.max,
            origin: record.origin,
            radius: record.radius,
        },
    }
}

pub(crate) fn frame_to(frame: &Frame) -> FrameRecord {
    FrameRecord {
        min: frame.bounds.min,
        max: frame.bounds.max,
        origin: frame.bounds.origin,
        radius: frame.bounds.radius,
        name: frame.name.clone(),
    }
}

pub(crate) fn tag_frame_from(record: &TagRecord) -> TagFrame {
    TagFrame {
        location: record.origin,
        orientation: Mat3::from_cols(record.axis[0], record.axis[1], record.axis[2]),
    }
}

pub(crate) fn tag_frame_to(name: &str, frame: &TagFrame) -> TagRecord {
    let m = frame.orientation;
    TagRecord {
        name: name.to_string(),
        origin: frame.location,
        axis: [m.x_axis, m.y_axis, m.z_axis],
    }
}

/// Per-frame transforms of every tag, failing unless all are free.
pub(crate) fn free_tags<'a>(model: &'a Model, format: &str) -> Result<Vec<(&'a str, &'a [TagFrame])>> {
    model
        .tags
        .iter()
        .map(|tag| match &tag.attachment {
            Attachment::Free(frames) => Ok((tag.name.as_str(), frames.as_slice())),
            other => Err(Error::unsupported(format!(
                "{format} stores free tags only; tag {:?} is {}",
                tag.name,
                other.style()
            ))),
        })
        .collect()
}

/// Fail unless every surface holds morph-target vertices.
pub(crate) fn require_morph(model: &Model, format: &str) -> Result<()> {
    if let Some(s) = model.surfaces.iter().find(|s| s.vertices.is_rigged()) {
        return Err(Error::unsupported(format!(
            "{format} stores morph-target vertices only; surface {:?} is rigged",
            s.name
        )));
    }
    Ok(())
}

/// Fail unless every surface holds rigged vertices.
pub(crate) fn require_rigged(model: &Model, format: &str) -> Result<()> {
    if let Some(s) = model.surfaces.iter().find(|s| !s.vertices.is_rigged()) {
        return Err(Error::unsupported(format!(
            "{format} stores rigged vertices only; surface {:?} is morph-animated",
            s.name
        )));
    }
    Ok(())
}

/// Free tag transforms sampled across `frames` frames, one row per frame.
pub(crate) fn tag_rows(tags: &[(&str, &[TagFrame])], frames: usize) -> Result<Vec<Vec<TagRecord>>> {
    for (name, samples) in tags {
        if samples.len() != frames {
            return Err(Error::unsupported(format!(
                "tag {name:?} has {} frames, model has {frames}",
                samples.len()
            )));
        }
    }
    Ok((0..frames)
        .map(|f| tags.iter().map(|(name, samples)| tag_frame_to(name, &samples[f])).collect())
        .collect())
}

/// Gather free tags from frame-major rows.
pub(crate) fn tags_from_rows(rows: &[Vec<TagRecord>], diag: &mut Diagnostics) -> Vec<Tag> {
    let count = rows.first().map_or(0, Vec::len);
    (0..count)
        .map(|t| {
            let name = rows[0][t].name.clone();
            check_tag_name(&name, diag);
            Tag {
                name,
                attachment: Attachment::Free(rows.iter().map(|row| tag_frame_from(&row[t])).collect()),
            }
        })
        .collect()
}

/// Vertex frames of a morph surface, failing on frame count mismatch.
pub(crate) fn morph_frames(surface: &Surface, frames: usize) -> Result<&[crate::model::MorphVertex]> {
    match &surface.vertices {
        Vertices::Morph(verts) => {
            if let Some(v) = verts.iter().find(|v| v.frames.len() != frames) {
                return Err(Error::unsupported(format!(
                    "surface {:?}: vertex has {} frames, model has {frames}",
                    surface.name,
                    v.frames.len()
                )));
            }
            Ok(verts)
        }
        Vertices::Rigged(_) => Err(Error::unsupported(format!("surface {:?} is rigged", surface.name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec3;

    #[test]
    fn test_tag_name_warning() {
        let mut diag = Diagnostics::new();
        check_tag_name("tag_head", &mut diag);
        assert!(diag.is_empty());
        check_tag_name("head", &mut diag);
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn test_tag_frame_axes_are_columns() {
        let record = TagRecord {
            name: "tag_x".into(),
            origin: Vec3::ONE,
            axis: [Vec3::Y, -Vec3::X, Vec3::Z],
        };
        let frame = tag_frame_from(&record);
        assert_eq!(frame.orientation * Vec3::X, Vec3::Y);
        assert_eq!(tag_frame_to("tag_x", &frame), record);
    }

    #[test]
    fn test_free_tags_rejects_bound() {
        let model = Model {
            tags: vec![Tag {
                name: "tag_hand".into(),
                attachment: Attachment::Bone {
                    bone: 0,
                    torso_weight: 0.0,
                },
            }],
            ..Model::default()
        };
        assert!(matches!(free_tags(&model, "MD3"), Err(Error::Unsupported(_))));
    }
}
