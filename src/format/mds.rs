//! MDS container: single-file skeletal model.
//!
//! ```text
//! header (120)
//! frames   [numFrames] 52-byte header + numBones compressed bones
//! bones    [numBones] 80 bytes each
//! surfaces chained through ofsEnd (see skeletal surface layout)
//! tags     [numTags] 72 bytes each
//! ```

use tracing::debug;

use crate::codec::{check_index, check_span, read_array, to_field, write_array, Allocator, FieldReader, FieldWriter, Record};
use crate::util::Result;

use super::{
    plan_skel_surface, read_bones, read_count, read_offset, read_skel_frames, read_skel_surfaces, skel_frame_size,
    write_skel_frames, write_skel_surface, BoneRecord, SkelFrame, SkelLayout, SkelSurface, NAME_LEN, NO_PARENT,
};

pub const IDENT: [u8; 4] = *b"MDSW";
pub const VERSION: i32 = 4;
pub const HEADER_SIZE: usize = 120;

pub const LAYOUT: SkelLayout = SkelLayout {
    surface_kind: "mds surface",
    ident: IDENT,
    fixed_fields: true,
};

/// Tag rigidly attached to a bone.
#[derive(Debug, Clone, PartialEq)]
pub struct MdsTag {
    pub name: String,
    pub torso_weight: f32,
    pub bone: i32,
}

impl Record for MdsTag {
    const KIND: &'static str = "mds tag";
    const SIZE: usize = 72;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            name: r.name(NAME_LEN)?,
            torso_weight: r.f32()?,
            bone: r.i32()?,
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.name(&self.name, NAME_LEN)?;
        w.f32(self.torso_weight)?;
        w.i32(self.bone)
    }
}

/// Decoded MDS record graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Mds {
    pub name: String,
    pub lod_scale: f32,
    pub lod_bias: f32,
    pub torso_parent: i32,
    pub frames: Vec<SkelFrame>,
    pub bones: Vec<BoneRecord>,
    pub surfaces: Vec<SkelSurface>,
    pub tags: Vec<MdsTag>,
}

impl Default for Mds {
    fn default() -> Self {
        Self {
            name: String::new(),
            lod_scale: 0.0,
            lod_bias: 0.0,
            torso_parent: NO_PARENT,
            frames: Vec::new(),
            bones: Vec::new(),
            surfaces: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// Parse an MDS buffer.
pub fn read(data: &[u8]) -> Result<Mds> {
    check_span(data, "mds header", 0, 1, HEADER_SIZE)?;
    let mut r = FieldReader::new(data, 0, "mds header");
    r.expect_magic(&IDENT)?;
    r.expect_version(VERSION)?;
    let name = r.name(NAME_LEN)?;
    let lod_scale = r.f32()?;
    let lod_bias = r.f32()?;
    let num_frames = read_count(&mut r)?;
    let num_bones = read_count(&mut r)?;
    let ofs_frames = read_offset(&mut r, 0)?;
    let ofs_bones = read_offset(&mut r, 0)?;
    let torso_at = r.pos();
    let torso_parent = r.i32()?;
    let num_surfaces = read_count(&mut r)?;
    let ofs_surfaces = read_offset(&mut r, 0)?;
    let num_tags = read_count(&mut r)?;
    let ofs_tags = read_offset(&mut r, 0)?;
    let _ofs_end = read_offset(&mut r, 0)?;

    debug!(%name, num_frames, num_bones, num_surfaces, num_tags, "read mds header");

    if torso_parent != NO_PARENT {
        check_index("mds torso parent", torso_at, torso_parent as i64, num_bones)?;
    }
    let frames = read_skel_frames(data, ofs_frames, num_frames, num_bones)?;
    let bones = read_bones(data, ofs_bones, num_bones)?;
    let surfaces = read_skel_surfaces(data, ofs_surfaces, num_surfaces, &LAYOUT, Some(num_bones))?;
    let tags: Vec<MdsTag> = read_array(data, ofs_tags, num_tags)?;
    for (i, tag) in tags.iter().enumerate() {
        let at = ofs_tags + (i * MdsTag::SIZE + NAME_LEN + 4) as u64;
        check_index(MdsTag::KIND, at, tag.bone as i64, num_bones)?;
    }

    Ok(Mds {
        name,
        lod_scale,
        lod_bias,
        torso_parent,
        frames,
        bones,
        surfaces,
        tags,
    })
}

/// Serialize an MDS record graph.
pub fn write(mds: &Mds) -> Result<Vec<u8>> {
    let num_bones = mds.bones.len();
    if mds.frames.iter().any(|f| f.bones.len() != num_bones) {
        return Err(crate::util::Error::other("mds frames: one compressed bone per bone required"));
    }

    let mut a = Allocator::at(HEADER_SIZE as u64);
    let ofs_frames = a.alloc(mds.frames.len() * skel_frame_size(num_bones));
    let ofs_bones = a.alloc_array::<BoneRecord>(num_bones);
    let ofs_surfaces = a.end();
    let plans: Vec<_> = mds.surfaces.iter().map(|s| plan_skel_surface(s, &LAYOUT)).collect();
    for plan in &plans {
        a.alloc(plan.end as usize);
    }
    let ofs_tags = a.alloc_array::<MdsTag>(mds.tags.len());
    let ofs_end = a.end();
    debug!(frames = mds.frames.len(), bones = num_bones, surfaces = plans.len(), size = ofs_end, "mds layout");

    let mut w = FieldWriter::with_capacity(ofs_end as usize);
    w.bytes(&IDENT)?;
    w.i32(VERSION)?;
    w.name(&mds.name, NAME_LEN)?;
    w.f32(mds.lod_scale)?;
    w.f32(mds.lod_bias)?;
    w.u32(to_field(mds.frames.len() as u64, "frame count")?)?;
    w.u32(to_field(num_bones as u64, "bone count")?)?;
    w.u32(to_field(ofs_frames, "frame offset")?)?;
    w.u32(to_field(ofs_bones, "bone offset")?)?;
    w.i32(mds.torso_parent)?;
    w.u32(to_field(mds.surfaces.len() as u64, "surface count")?)?;
    w.u32(to_field(ofs_surfaces, "surface offset")?)?;
    w.u32(to_field(mds.tags.len() as u64, "tag count")?)?;
    w.u32(to_field(ofs_tags, "tag offset")?)?;
    w.u32(to_field(ofs_end, "file size")?)?;

    w.expect_pos(ofs_frames, "mds frames")?;
    write_skel_frames(&mut w, &mds.frames)?;
    w.expect_pos(ofs_bones, "mds bones")?;
    write_array(&mut w, &mds.bones)?;
    w.expect_pos(ofs_surfaces, "mds surfaces")?;
    for (surface, plan) in mds.surfaces.iter().zip(&plans) {
        write_skel_surface(&mut w, surface, &LAYOUT, plan)?;
    }
    w.expect_pos(ofs_tags, "mds tags")?;
    write_array(&mut w, &mds.tags)?;
    w.expect_pos(ofs_end, "mds end")?;
    Ok(w.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{CompressedBone, SkelFrameHeader, SkelVertex, Triangle, WeightRecord};
    use crate::util::{Error, Vec2, Vec3};

    fn sample() -> Mds {
        let bone = |name: &str, parent: i32| BoneRecord {
            name: name.into(),
            parent,
            torso_weight: 0.0,
            parent_dist: 8.0,
            flags: 0,
        };
        let frame = SkelFrame {
            header: SkelFrameHeader {
                min: Vec3::splat(-8.0),
                max: Vec3::splat(8.0),
                origin: Vec3::ZERO,
                radius: 14.0,
                parent_offset: Vec3::new(0.0, 0.0, 2.0),
            },
            bones: vec![
                CompressedBone::default(),
                CompressedBone {
                    angles: [0, 16384, 0, 0],
                    ofs_angles: [-16384, 0],
                },
            ],
        };
        let vertex = SkelVertex {
            normal: Vec3::X,
            uv: Vec2::ZERO,
            fixed_parent: 0,
            fixed_dist: 0.0,
            weights: vec![WeightRecord {
                bone: 1,
                weight: 1.0,
                offset: Vec3::new(1.0, 0.0, 0.0),
            }],
        };
        Mds {
            name: "body".into(),
            lod_scale: 1.0,
            lod_bias: 0.0,
            torso_parent: 0,
            frames: vec![frame.clone(), frame],
            bones: vec![bone("root", NO_PARENT), bone("spine", 0)],
            surfaces: vec![SkelSurface {
                ident: IDENT,
                name: "torso".into(),
                shader: "models/torso".into(),
                shader_index: 0,
                min_lod: 3,
                vertices: vec![vertex; 3],
                triangles: vec![Triangle([0, 1, 2])],
                collapse_map: vec![-1, 0, 1],
                bone_refs: vec![1],
            }],
            tags: vec![MdsTag {
                name: "tag_chest".into(),
                torso_weight: 1.0,
                bone: 1,
            }],
        }
    }

    #[test]
    fn test_write_read() {
        let mds = sample();
        let data = write(&mds).unwrap();
        assert_eq!(read(&data).unwrap(), mds);
        assert_eq!(write(&read(&data).unwrap()).unwrap(), data);
    }

    #[test]
    fn test_section_offsets() {
        let data = write(&sample()).unwrap();
        let mut r = FieldReader::new(&data, 88, "mds header");
        assert_eq!(r.u32().unwrap(), 120);
        assert_eq!(r.u32().unwrap(), 120 + 2 * (52 + 2 * 12));
    }

    #[test]
    fn test_tag_bone_checked() {
        let mut mds = sample();
        mds.tags[0].bone = 2;
        let data = write(&mds).unwrap();
        assert!(matches!(read(&data), Err(Error::BadIndex { kind: "mds tag", .. })));
    }
}
