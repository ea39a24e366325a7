//! Records shared by several formats.

use crate::codec::{check_index, resolve, FieldReader, FieldWriter, Record};
use crate::util::{Error, Result, Vec2, Vec3};

use super::{FRAME_NAME_LEN, NAME_LEN};

/// Read a `u32` offset field and resolve it against `base`.
pub fn read_offset(r: &mut FieldReader<'_>, base: u64) -> Result<u64> {
    let at = r.pos();
    let value = r.u32()? as i64;
    resolve(r.data(), r.kind(), at, base, value)
}

/// Read a `u32` count field.
pub fn read_count(r: &mut FieldReader<'_>) -> Result<usize> {
    Ok(r.u32()? as usize)
}

/// Length of every row of a rectangular table, failing if rows differ.
pub fn row_len<T>(rows: &[Vec<T>], what: &str) -> Result<usize> {
    let len = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != len) {
        return Err(Error::other(format!("{what}: rows differ in length")));
    }
    Ok(len)
}

/// Split a flat record array into `rows` rows of `per_row` items.
pub fn into_rows<T>(flat: Vec<T>, rows: usize, per_row: usize) -> Vec<Vec<T>> {
    let mut iter = flat.into_iter();
    (0..rows).map(|_| iter.by_ref().take(per_row).collect()).collect()
}

/// Bounding data and name of one morph-target frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameRecord {
    pub min: Vec3,
    pub max: Vec3,
    pub origin: Vec3,
    pub radius: f32,
    pub name: String,
}

impl Record for FrameRecord {
    const KIND: &'static str = "frame";
    const SIZE: usize = 56;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            min: r.vec3()?,
            max: r.vec3()?,
            origin: r.vec3()?,
            radius: r.f32()?,
            name: r.name(FRAME_NAME_LEN)?,
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.vec3(self.min)?;
        w.vec3(self.max)?;
        w.vec3(self.origin)?;
        w.f32(self.radius)?;
        w.name(&self.name, FRAME_NAME_LEN)
    }
}

/// Full-precision tag: origin plus three axis vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub name: String,
    pub origin: Vec3,
    pub axis: [Vec3; 3],
}

impl Record for TagRecord {
    const KIND: &'static str = "tag";
    const SIZE: usize = 112;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            name: r.name(NAME_LEN)?,
            origin: r.vec3()?,
            axis: [r.vec3()?, r.vec3()?, r.vec3()?],
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.name(&self.name, NAME_LEN)?;
        w.vec3(self.origin)?;
        self.axis.iter().try_for_each(|&a| w.vec3(a))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderRecord {
    pub name: String,
    pub index: i32,
}

impl Record for ShaderRecord {
    const KIND: &'static str = "shader";
    const SIZE: usize = 68;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            name: r.name(NAME_LEN)?,
            index: r.i32()?,
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.name(&self.name, NAME_LEN)?;
        w.i32(self.index)
    }
}

/// Three vertex indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triangle(pub [i32; 3]);

impl Record for Triangle {
    const KIND: &'static str = "triangle";
    const SIZE: usize = 12;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self(r.i32x3()?))
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.i32x3(self.0)
    }
}

/// Fail unless every triangle index addresses one of `vertex_count` vertices.
///
/// `start` is the absolute offset of the first triangle.
pub fn check_triangles(triangles: &[Triangle], start: u64, vertex_count: usize) -> Result<()> {
    for (t, tri) in triangles.iter().enumerate() {
        for (k, &index) in tri.0.iter().enumerate() {
            let at = start + (t * Triangle::SIZE + k * 4) as u64;
            check_index(Triangle::KIND, at, index as i64, vertex_count)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexCoord(pub Vec2);

impl Record for TexCoord {
    const KIND: &'static str = "texture coordinate";
    const SIZE: usize = 8;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self(r.vec2()?))
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.vec2(self.0)
    }
}

/// Full-precision vertex: fixed-point location and lat/long normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XyzNormal {
    pub xyz: [i16; 3],
    pub normal: u16,
}

impl Record for XyzNormal {
    const KIND: &'static str = "vertex";
    const SIZE: usize = 8;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            xyz: r.i16x3()?,
            normal: r.u16()?,
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.i16x3(self.xyz)?;
        w.u16(self.normal)
    }
}

/// Plain `i32` array element (collapse maps, bone references).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Index(pub i32);

impl Record for Index {
    const KIND: &'static str = "index";
    const SIZE: usize = 4;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self(r.i32()?))
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.i32(self.0)
    }
}

/// Plain `i16` array element (frame tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Short(pub i16);

impl Record for Short {
    const KIND: &'static str = "frame table";
    const SIZE: usize = 2;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self(r.i16()?))
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.i16(self.0)
    }
}

/// Plain `u32` array element (compressed vertices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packed(pub u32);

impl Record for Packed {
    const KIND: &'static str = "compressed vertex";
    const SIZE: usize = 4;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self(r.u32()?))
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.u32(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{read_array, write_array};

    #[test]
    fn test_record_sizes() {
        let mut w = FieldWriter::default();
        FrameRecord {
            min: Vec3::ZERO,
            max: Vec3::ONE,
            origin: Vec3::ZERO,
            radius: 1.0,
            name: "idle".into(),
        }
        .write(&mut w)
        .unwrap();
        assert_eq!(w.pos(), FrameRecord::SIZE as u64);

        let mut w = FieldWriter::default();
        TagRecord {
            name: "tag_head".into(),
            origin: Vec3::ZERO,
            axis: [Vec3::X, Vec3::Y, Vec3::Z],
        }
        .write(&mut w)
        .unwrap();
        assert_eq!(w.pos(), TagRecord::SIZE as u64);

        let mut w = FieldWriter::default();
        ShaderRecord { name: "skin".into(), index: 0 }.write(&mut w).unwrap();
        assert_eq!(w.pos(), ShaderRecord::SIZE as u64);
    }

    #[test]
    fn test_frame_name_field() {
        let mut w = FieldWriter::default();
        let frame = FrameRecord {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
            origin: Vec3::ZERO,
            radius: 0.0,
            name: "a frame name too long".into(),
        };
        assert!(matches!(frame.write(&mut w), Err(Error::NameTooLong { max: 16, .. })));
    }

    #[test]
    fn test_triangle_index_check() {
        let tris = vec![Triangle([0, 1, 2]), Triangle([2, 1, 3])];
        let mut w = FieldWriter::default();
        write_array(&mut w, &tris).unwrap();
        let data = w.into_inner();
        let back: Vec<Triangle> = read_array(&data, 0, 2).unwrap();
        assert!(check_triangles(&back, 100, 4).is_ok());
        match check_triangles(&back, 100, 3) {
            Err(Error::BadIndex { offset, index, .. }) => {
                assert_eq!(offset, 100 + 12 + 8);
                assert_eq!(index, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rows() {
        let rows = into_rows(vec![1, 2, 3, 4, 5, 6], 2, 3);
        assert_eq!(rows, vec![vec![1, 2, 3], vec![4, 5, 6]]);
        assert_eq!(row_len(&rows, "t").unwrap(), 3);
        assert!(row_len(&[vec![1], vec![]], "t").is_err());
        assert_eq!(row_len::<u8>(&[], "t").unwrap(), 0);
    }
}
