//! Fixed-size little-endian field access at absolute byte offsets.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::util::{Error, Result, Vec2, Vec3};

/// Cursor reading little-endian fields from a borrowed buffer.
///
/// Every read is bounds-checked; a short buffer yields [`Error::Truncated`]
/// naming the record kind being read.
pub struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
    kind: &'static str,
}

impl<'a> FieldReader<'a> {
    /// Start reading `kind` records at absolute position `pos`.
    pub fn new(data: &'a [u8], pos: u64, kind: &'static str) -> Self {
        Self {
            data,
            pos: usize::try_from(pos).unwrap_or(usize::MAX),
            kind,
        }
    }

    /// Current absolute position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos as u64
    }

    /// Record kind used in error reports.
    #[inline]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Change the record kind used in error reports.
    pub fn set_kind(&mut self, kind: &'static str) {
        self.kind = kind;
    }

    /// Whole underlying buffer.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::Truncated {
                kind: self.kind,
                offset: self.pos as u64,
                needed: self.pos as u64 + n as u64,
                len: self.data.len() as u64,
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub fn i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.f32()?, self.f32()?))
    }

    pub fn vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    /// Three consecutive `i16` values.
    pub fn i16x3(&mut self) -> Result<[i16; 3]> {
        Ok([self.i16()?, self.i16()?, self.i16()?])
    }

    /// Three consecutive `i32` values.
    pub fn i32x3(&mut self) -> Result<[i32; 3]> {
        Ok([self.i32()?, self.i32()?, self.i32()?])
    }

    /// Four raw bytes.
    pub fn magic(&mut self) -> Result<[u8; 4]> {
        let b = self.take(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Read a magic identifier and fail unless it equals `expected`.
    pub fn expect_magic(&mut self, expected: &[u8; 4]) -> Result<()> {
        let offset = self.pos();
        let found = self.magic()?;
        if &found != expected {
            return Err(Error::BadMagic {
                kind: self.kind,
                offset,
                expected: *expected,
                found,
            });
        }
        Ok(())
    }

    /// Read a version field and fail unless it equals `expected`.
    pub fn expect_version(&mut self, expected: i32) -> Result<()> {
        let found = self.i32()?;
        if found != expected {
            return Err(Error::UnsupportedVersion {
                kind: self.kind,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Fixed-length NUL-padded text field.
    pub fn name(&mut self, len: usize) -> Result<String> {
        let raw = self.take(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

/// Append-only little-endian writer.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    /// Writer with a pre-sized buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current write position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.buf.len() as u64
    }

    /// Fail unless the writer sits exactly at the planned offset.
    pub fn expect_pos(&self, planned: u64, kind: &'static str) -> Result<()> {
        if self.pos() != planned {
            return Err(Error::LayoutMismatch {
                kind,
                planned,
                actual: self.pos(),
            });
        }
        Ok(())
    }

    pub fn bytes(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    pub fn u8(&mut self, value: u8) -> Result<()> {
        self.buf.write_u8(value)?;
        Ok(())
    }

    pub fn i16(&mut self, value: i16) -> Result<()> {
        self.buf.write_i16::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn u16(&mut self, value: u16) -> Result<()> {
        self.buf.write_u16::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn i32(&mut self, value: i32) -> Result<()> {
        self.buf.write_i32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn u32(&mut self, value: u32) -> Result<()> {
        self.buf.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn f32(&mut self, value: f32) -> Result<()> {
        self.buf.write_f32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn vec2(&mut self, v: Vec2) -> Result<()> {
        self.f32(v.x)?;
        self.f32(v.y)
    }

    pub fn vec3(&mut self, v: Vec3) -> Result<()> {
        self.f32(v.x)?;
        self.f32(v.y)?;
        self.f32(v.z)
    }

    pub fn i16x3(&mut self, v: [i16; 3]) -> Result<()> {
        v.iter().try_for_each(|&x| self.i16(x))
    }

    pub fn i32x3(&mut self, v: [i32; 3]) -> Result<()> {
        v.iter().try_for_each(|&x| self.i32(x))
    }

    /// Fixed-length NUL-padded text field.
    pub fn name(&mut self, name: &str, len: usize) -> Result<()> {
        check_name(name, len)?;
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.resize(self.buf.len() + len - name.len(), 0);
        Ok(())
    }

    /// Finish and return the bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Fail if `name` does not fit a `len`-byte field.
pub fn check_name(name: &str, len: usize) -> Result<()> {
    if name.len() > len {
        return Err(Error::NameTooLong {
            name: name.to_string(),
            max: len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_fields() {
        let mut w = FieldWriter::default();
        w.i16(-2).unwrap();
        w.u32(0xDEAD_BEEF).unwrap();
        w.f32(1.5).unwrap();
        w.vec3(Vec3::new(1.0, 2.0, 3.0)).unwrap();
        let data = w.into_inner();
        assert_eq!(data.len(), 2 + 4 + 4 + 12);
        assert_eq!(&data[2..6], &[0xEF, 0xBE, 0xAD, 0xDE]);

        let mut r = FieldReader::new(&data, 0, "test");
        assert_eq!(r.i16().unwrap(), -2);
        assert_eq!(r.u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.f32().unwrap(), 1.5);
        assert_eq!(r.vec3().unwrap(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(r.pos(), data.len() as u64);
    }

    #[test]
    fn test_name_padding() {
        let mut w = FieldWriter::default();
        w.name("head", 8).unwrap();
        let data = w.into_inner();
        assert_eq!(data, b"head\0\0\0\0");
        let mut r = FieldReader::new(&data, 0, "name");
        assert_eq!(r.name(8).unwrap(), "head");

        let mut w = FieldWriter::default();
        assert!(matches!(w.name("too long", 4), Err(Error::NameTooLong { .. })));
    }

    #[test]
    fn test_truncated_reports_kind_and_offset() {
        let data = [0u8; 6];
        let mut r = FieldReader::new(&data, 4, "triangle");
        match r.u32() {
            Err(Error::Truncated { kind, offset, .. }) => {
                assert_eq!(kind, "triangle");
                assert_eq!(offset, 4);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_magic_and_version() {
        let mut w = FieldWriter::default();
        w.bytes(b"IDP3").unwrap();
        w.i32(15).unwrap();
        let data = w.into_inner();
        let mut r = FieldReader::new(&data, 0, "header");
        r.expect_magic(b"IDP3").unwrap();
        assert!(matches!(
            r.expect_version(16),
            Err(Error::UnsupportedVersion { found: 15, .. })
        ));

        let mut r = FieldReader::new(&data, 0, "header");
        assert!(matches!(r.expect_magic(b"IDPC"), Err(Error::BadMagic { .. })));
    }

    #[test]
    fn test_expect_pos() {
        let mut w = FieldWriter::default();
        w.u32(0).unwrap();
        assert!(w.expect_pos(4, "x").is_ok());
        assert!(matches!(w.expect_pos(8, "x"), Err(Error::LayoutMismatch { .. })));
    }
}
