//! MDM container: skeletal mesh whose animation lives in an MDX file.
//!
//! ```text
//! header (100)
//! surfaces chained through ofsEnd (see skeletal surface layout)
//! tags chained through ofsEnd
//!   header (128), bone references [numBoneRefs]
//! ```

use tracing::debug;

use crate::codec::{check_index, check_span, read_array, to_field, Allocator, FieldReader, FieldWriter};
use crate::util::{Result, Vec3};

use super::{
    plan_skel_surface, read_count, read_offset, read_skel_surfaces, write_skel_surface, Index, SkelLayout,
    SkelSurface, NAME_LEN,
};

pub const IDENT: [u8; 4] = *b"MDMW";
pub const VERSION: i32 = 3;
pub const HEADER_SIZE: usize = 100;
pub const TAG_HEADER_SIZE: usize = 128;

pub const LAYOUT: SkelLayout = SkelLayout {
    surface_kind: "mdm surface",
    ident: IDENT,
    fixed_fields: false,
};

/// Tag held at a fixed offset from a bone.
#[derive(Debug, Clone, PartialEq)]
pub struct MdmTag {
    pub name: String,
    pub axis: [Vec3; 3],
    pub bone: i32,
    pub offset: Vec3,
    pub bone_refs: Vec<i32>,
}

/// Decoded MDM record graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mdm {
    pub name: String,
    pub lod_scale: f32,
    pub lod_bias: f32,
    pub surfaces: Vec<SkelSurface>,
    pub tags: Vec<MdmTag>,
}

/// Parse an MDM buffer.
///
/// `bone_count` is the size of the paired skeleton when known; bone indices
/// are checked against it.
pub fn read(data: &[u8], bone_count: Option<usize>) -> Result<Mdm> {
    check_span(data, "mdm header", 0, 1, HEADER_SIZE)?;
    let mut r = FieldReader::new(data, 0, "mdm header");
    r.expect_magic(&IDENT)?;
    r.expect_version(VERSION)?;
    let name = r.name(NAME_LEN)?;
    let lod_scale = r.f32()?;
    let lod_bias = r.f32()?;
    let num_surfaces = read_count(&mut r)?;
    let ofs_surfaces = read_offset(&mut r, 0)?;
    let num_tags = read_count(&mut r)?;
    let ofs_tags = read_offset(&mut r, 0)?;
    let _ofs_end = read_offset(&mut r, 0)?;

    debug!(%name, num_surfaces, num_tags, "read mdm header");

    let surfaces = read_skel_surfaces(data, ofs_surfaces, num_surfaces, &LAYOUT, bone_count)?;

    let mut tags = Vec::with_capacity(num_tags.min(256));
    let mut base = ofs_tags;
    for _ in 0..num_tags {
        let (tag, end) = read_tag(data, base, bone_count)?;
        tags.push(tag);
        base = end;
    }

    Ok(Mdm {
        name,
        lod_scale,
        lod_bias,
        surfaces,
        tags,
    })
}

fn read_tag(data: &[u8], base: u64, bone_count: Option<usize>) -> Result<(MdmTag, u64)> {
    const KIND: &str = "mdm tag";
    check_span(data, KIND, base, 1, TAG_HEADER_SIZE)?;
    let mut r = FieldReader::new(data, base, KIND);
    let name = r.name(NAME_LEN)?;
    let axis = [r.vec3()?, r.vec3()?, r.vec3()?];
    let bone_at = r.pos();
    let bone = r.i32()?;
    let offset = r.vec3()?;
    let num_refs = read_count(&mut r)?;
    let ofs_refs = read_offset(&mut r, base)?;
    let end = read_offset(&mut r, base)?;

    let bone_refs: Vec<i32> = read_array::<Index>(data, ofs_refs, num_refs)?
        .into_iter()
        .map(|i| i.0)
        .collect();
    if let Some(count) = bone_count {
        check_index(KIND, bone_at, bone as i64, count)?;
        for (k, &b) in bone_refs.iter().enumerate() {
            check_index("bone reference", ofs_refs + (k * 4) as u64, b as i64, count)?;
        }
    }

    let tag = MdmTag {
        name,
        axis,
        bone,
        offset,
        bone_refs,
    };
    Ok((tag, end))
}

fn tag_size(tag: &MdmTag) -> u64 {
    let mut a = Allocator::at(TAG_HEADER_SIZE as u64);
    a.alloc_array::<Index>(tag.bone_refs.len());
    a.end()
}

/// Serialize an MDM record graph.
pub fn write(mdm: &Mdm) -> Result<Vec<u8>> {
    let mut a = Allocator::at(HEADER_SIZE as u64);
    let ofs_surfaces = a.end();
    let plans: Vec<_> = mdm.surfaces.iter().map(|s| plan_skel_surface(s, &LAYOUT)).collect();
    for plan in &plans {
        a.alloc(plan.end as usize);
    }
    let ofs_tags = a.end();
    let tag_sizes: Vec<u64> = mdm.tags.iter().map(tag_size).collect();
    for &size in &tag_sizes {
        a.alloc(size as usize);
    }
    let ofs_end = a.end();
    debug!(surfaces = plans.len(), tags = mdm.tags.len(), size = ofs_end, "mdm layout");

    let mut w = FieldWriter::with_capacity(ofs_end as usize);
    w.bytes(&IDENT)?;
    w.i32(VERSION)?;
    w.name(&mdm.name, NAME_LEN)?;
    w.f32(mdm.lod_scale)?;
    w.f32(mdm.lod_bias)?;
    w.u32(to_field(mdm.surfaces.len() as u64, "surface count")?)?;
    w.u32(to_field(ofs_surfaces, "surface offset")?)?;
    w.u32(to_field(mdm.tags.len() as u64, "tag count")?)?;
    w.u32(to_field(ofs_tags, "tag offset")?)?;
    w.u32(to_field(ofs_end, "file size")?)?;

    w.expect_pos(ofs_surfaces, "mdm surfaces")?;
    for (surface, plan) in mdm.surfaces.iter().zip(&plans) {
        write_skel_surface(&mut w, surface, &LAYOUT, plan)?;
    }
    w.expect_pos(ofs_tags, "mdm tags")?;
    for (tag, &size) in mdm.tags.iter().zip(&tag_sizes) {
        let base = w.pos();
        w.name(&tag.name, NAME_LEN)?;
        tag.axis.iter().try_for_each(|&a| w.vec3(a))?;
        w.i32(tag.bone)?;
        w.vec3(tag.offset)?;
        w.u32(to_field(tag.bone_refs.len() as u64, "bone reference count")?)?;
        w.u32(TAG_HEADER_SIZE as u32)?;
        w.u32(to_field(size, "tag end")?)?;
        tag.bone_refs.iter().try_for_each(|&b| w.i32(b))?;
        w.expect_pos(base + size, "mdm tag")?;
    }
    w.expect_pos(ofs_end, "mdm end")?;
    Ok(w.into_inner())
}
