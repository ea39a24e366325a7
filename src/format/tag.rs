//! TAG container: a single frame of full-precision tags.

use tracing::debug;

use crate::codec::{check_span, read_array, to_field, write_array, Allocator, FieldReader, FieldWriter};
use crate::util::Result;

use super::{read_count, read_offset, TagRecord};

pub const IDENT: [u8; 4] = *b"TAGL";
pub const VERSION: i32 = 1;
pub const HEADER_SIZE: usize = 16;

/// Parse a TAG buffer.
pub fn read(data: &[u8]) -> Result<Vec<TagRecord>> {
    check_span(data, "tag header", 0, 1, HEADER_SIZE)?;
    let mut r = FieldReader::new(data, 0, "tag header");
    r.expect_magic(&IDENT)?;
    r.expect_version(VERSION)?;
    let num_tags = read_count(&mut r)?;
    let _ofs_end = read_offset(&mut r, 0)?;
    debug!(num_tags, "read tag header");
    read_array(data, HEADER_SIZE as u64, num_tags)
}

/// Serialize tags into a TAG buffer.
pub fn write(tags: &[TagRecord]) -> Result<Vec<u8>> {
    let mut a = Allocator::at(HEADER_SIZE as u64);
    let ofs_tags = a.alloc_array::<TagRecord>(tags.len());
    let ofs_end = a.end();

    let mut w = FieldWriter::with_capacity(ofs_end as usize);
    w.bytes(&IDENT)?;
    w.i32(VERSION)?;
    w.u32(to_field(tags.len() as u64, "tag count")?)?;
    w.u32(to_field(ofs_end, "file size")?)?;
    w.expect_pos(ofs_tags, "tags")?;
    write_array(&mut w, tags)?;
    w.expect_pos(ofs_end, "tag end")?;
    Ok(w.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{Error, Vec3};

    #[test]
    fn test_write_read() {
        let tags = vec![
            TagRecord {
                name: "tag_torso".into(),
                origin: Vec3::new(0.0, 0.0, 12.0),
                axis: [Vec3::X, Vec3::Y, Vec3::Z],
            },
            TagRecord {
                name: "tag_head".into(),
                origin: Vec3::new(0.0, 0.0, 30.0),
                axis: [Vec3::Y, -Vec3::X, Vec3::Z],
            },
        ];
        let data = write(&tags).unwrap();
        assert_eq!(data.len(), 16 + 2 * 112);
        assert_eq!(read(&data).unwrap(), tags);
    }

    #[test]
    fn test_truncated() {
        let data = write(&[TagRecord {
            name: "tag_a".into(),
            origin: Vec3::ZERO,
            axis: [Vec3::X, Vec3::Y, Vec3::Z],
        }])
        .unwrap();
        // the end offset no longer fits the buffer
        assert!(matches!(read(&data[..100]), Err(Error::BadOffset { offset: 12, .. })));
        assert!(matches!(read(&data[..10]), Err(Error::Truncated { offset: 0, .. })));
    }
}
