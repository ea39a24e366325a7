//! TAG: a single frame of free tags and nothing else.

use crate::format::tag;
use crate::model::{Attachment, Frame, Model, Tag};
use crate::util::{Diagnostics, Error, Outcome, Result};

use super::{check_tag_name, free_tags, tag_frame_from, tag_frame_to};

/// Decode TAG bytes into a one-frame model holding only tags.
pub fn decode(data: &[u8]) -> Result<Outcome<Model>> {
    let records = tag::read(data)?;
    let mut diag = Diagnostics::new();
    let tags = records
        .iter()
        .map(|r| {
            check_tag_name(&r.name, &mut diag);
            Tag {
                name: r.name.clone(),
                attachment: Attachment::Free(vec![tag_frame_from(r)]),
            }
        })
        .collect();
    let model = Model {
        frames: vec![Frame::default()],
        tags,
        ..Model::default()
    };
    Ok(diag.finish(model))
}

/// Encode the model's tags. Every tag must be free with exactly one frame.
pub fn encode(model: &Model) -> Result<Vec<u8>> {
    let records = free_tags(model, "TAG")?
        .into_iter()
        .map(|(name, frames)| match frames {
            [frame] => Ok(tag_frame_to(name, frame)),
            _ => Err(Error::unsupported(format!(
                "TAG stores one frame per tag; tag {name:?} has {}",
                frames.len()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    tag::write(&records)
}
