//! MDX container: skeletal animation shared by MDM meshes.
//!
//! ```text
//! header (96)
//! frames [numFrames] 52-byte header + numBones compressed bones
//! bones  [numBones] 80 bytes each
//! ```

use tracing::debug;

use crate::codec::{check_index, check_span, to_field, write_array, Allocator, FieldReader, FieldWriter};
use crate::util::Result;

use super::{
    read_bones, read_count, read_offset, read_skel_frames, skel_frame_size, write_skel_frames, BoneRecord, SkelFrame,
    NAME_LEN, NO_PARENT,
};

pub const IDENT: [u8; 4] = *b"MDXW";
pub const VERSION: i32 = 2;
pub const HEADER_SIZE: usize = 96;

/// Decoded MDX record graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Mdx {
    pub name: String,
    pub torso_parent: i32,
    pub frames: Vec<SkelFrame>,
    pub bones: Vec<BoneRecord>,
}

impl Default for Mdx {
    fn default() -> Self {
        Self {
            name: String::new(),
            torso_parent: NO_PARENT,
            frames: Vec::new(),
            bones: Vec::new(),
        }
    }
}

/// Parse an MDX buffer.
pub fn read(data: &[u8]) -> Result<Mdx> {
    check_span(data, "mdx header", 0, 1, HEADER_SIZE)?;
    let mut r = FieldReader::new(data, 0, "mdx header");
    r.expect_magic(&IDENT)?;
    r.expect_version(VERSION)?;
    let name = r.name(NAME_LEN)?;
    let num_frames = read_count(&mut r)?;
    let num_bones = read_count(&mut r)?;
    let ofs_frames = read_offset(&mut r, 0)?;
    let ofs_bones = read_offset(&mut r, 0)?;
    let torso_at = r.pos();
    let torso_parent = r.i32()?;
    let _ofs_end = read_offset(&mut r, 0)?;

    debug!(%name, num_frames, num_bones, "read mdx header");

    if torso_parent != NO_PARENT {
        check_index("mdx torso parent", torso_at, torso_parent as i64, num_bones)?;
    }
    Ok(Mdx {
        name,
        torso_parent,
        frames: read_skel_frames(data, ofs_frames, num_frames, num_bones)?,
        bones: read_bones(data, ofs_bones, num_bones)?,
    })
}

/// Serialize an MDX record graph.
pub fn write(mdx: &Mdx) -> Result<Vec<u8>> {
    let num_bones = mdx.bones.len();
    if mdx.frames.iter().any(|f| f.bones.len() != num_bones) {
        return Err(crate::util::Error::other("mdx frames: one compressed bone per bone required"));
    }

    let mut a = Allocator::at(HEADER_SIZE as u64);
    let ofs_frames = a.alloc(mdx.frames.len() * skel_frame_size(num_bones));
    let ofs_bones = a.alloc_array::<BoneRecord>(num_bones);
    let ofs_end = a.end();
    debug!(frames = mdx.frames.len(), bones = num_bones, size = ofs_end, "mdx layout");

    let mut w = FieldWriter::with_capacity(ofs_end as usize);
    w.bytes(&IDENT)?;
    w.i32(VERSION)?;
    w.name(&mdx.name, NAME_LEN)?;
    w.u32(to_field(mdx.frames.len() as u64, "frame count")?)?;
    w.u32(to_field(num_bones as u64, "bone count")?)?;
    w.u32(to_field(ofs_frames, "frame offset")?)?;
    w.u32(to_field(ofs_bones, "bone offset")?)?;
    w.i32(mdx.torso_parent)?;
    w.u32(to_field(ofs_end, "file size")?)?;

    w.expect_pos(ofs_frames, "mdx frames")?;
    write_skel_frames(&mut w, &mdx.frames)?;
    w.expect_pos(ofs_bones, "mdx bones")?;
    write_array(&mut w, &mdx.bones)?;
    w.expect_pos(ofs_end, "mdx end")?;
    Ok(w.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{CompressedBone, SkelFrameHeader};
    use crate::util::{Error, Vec3};

    fn sample() -> Mdx {
        Mdx {
            name: "anim".into(),
            torso_parent: NO_PARENT,
            frames: vec![SkelFrame {
                header: SkelFrameHeader {
                    min: Vec3::ZERO,
                    max: Vec3::ZERO,
                    origin: Vec3::ZERO,
                    radius: 0.0,
                    parent_offset: Vec3::ZERO,
                },
                bones: vec![CompressedBone::default()],
            }],
            bones: vec![BoneRecord {
                name: "root".into(),
                parent: NO_PARENT,
                torso_weight: 0.0,
                parent_dist: 0.0,
                flags: 0,
            }],
        }
    }

    #[test]
    fn test_write_read() {
        let mdx = sample();
        let data = write(&mdx).unwrap();
        assert_eq!(data.len(), 96 + 52 + 12 + 80);
        assert_eq!(read(&data).unwrap(), mdx);
    }

    #[test]
    fn test_torso_parent_checked() {
        let mut mdx = sample();
        mdx.torso_parent = 3;
        let data = write(&mdx).unwrap();
        assert!(matches!(read(&data), Err(Error::BadIndex { offset: 88, .. })));
    }
}
