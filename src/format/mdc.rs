//! MDC container: delta-compressed morph-target model.
//!
//! ```text
//! header (112)
//! frames     [numFrames]            56 bytes each
//! tag names  [numTags]              64 bytes each
//! tags       [numFrames][numTags]   12 bytes each
//! surfaces chained through ofsEnd
//!   header (124), shaders, triangles, uvs,
//!   base vertices [numBaseFrames][numVerts], compressed [numCompFrames][numVerts],
//!   frame->base table [numFrames], frame->compressed table [numFrames]
//! ```

use tracing::debug;

use crate::codec::{check_index, check_span, read_array, to_field, write_array, Allocator, FieldReader, FieldWriter, Record};
use crate::compress::NOT_COMPRESSED;
use crate::util::{Error, Result};

use super::{
    check_triangles, into_rows, read_count, read_offset, row_len, FrameRecord, Packed, ShaderRecord, Short, TexCoord,
    Triangle, XyzNormal, NAME_LEN,
};

pub const IDENT: [u8; 4] = *b"IDPC";
pub const VERSION: i32 = 2;
pub const HEADER_SIZE: usize = 112;
pub const SURFACE_HEADER_SIZE: usize = 124;

/// Compressed tag: fixed-point location and Euler angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MdcTag {
    pub xyz: [i16; 3],
    pub angles: [i16; 3],
}

impl Record for MdcTag {
    const KIND: &'static str = "mdc tag";
    const SIZE: usize = 12;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            xyz: r.i16x3()?,
            angles: r.i16x3()?,
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.i16x3(self.xyz)?;
        w.i16x3(self.angles)
    }
}

struct TagName(String);

impl Record for TagName {
    const KIND: &'static str = "mdc tag name";
    const SIZE: usize = NAME_LEN;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self(r.name(NAME_LEN)?))
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.name(&self.0, NAME_LEN)
    }
}

/// Decoded MDC record graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mdc {
    pub name: String,
    pub flags: i32,
    pub num_skins: i32,
    pub frames: Vec<FrameRecord>,
    pub tag_names: Vec<String>,
    /// Indexed `[frame][tag]`.
    pub tags: Vec<Vec<MdcTag>>,
    pub surfaces: Vec<MdcSurface>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdcSurface {
    pub ident: [u8; 4],
    pub name: String,
    pub flags: i32,
    pub shaders: Vec<ShaderRecord>,
    pub triangles: Vec<Triangle>,
    pub uvs: Vec<TexCoord>,
    /// Indexed `[base frame][vertex]`.
    pub base_vertices: Vec<Vec<XyzNormal>>,
    /// Indexed `[compressed frame][vertex]`.
    pub comp_vertices: Vec<Vec<u32>>,
    /// Per animation frame: index of its base frame.
    pub frame_base: Vec<i16>,
    /// Per animation frame: index of its compressed frame, or -1.
    pub frame_comp: Vec<i16>,
}

/// Parse an MDC buffer.
pub fn read(data: &[u8]) -> Result<Mdc> {
    check_span(data, "mdc header", 0, 1, HEADER_SIZE)?;
    let mut r = FieldReader::new(data, 0, "mdc header");
    r.expect_magic(&IDENT)?;
    r.expect_version(VERSION)?;
    let name = r.name(NAME_LEN)?;
    let flags = r.i32()?;
    let num_frames = read_count(&mut r)?;
    let num_tags = read_count(&mut r)?;
    let num_surfaces = read_count(&mut r)?;
    let num_skins = r.i32()?;
    let ofs_frames = read_offset(&mut r, 0)?;
    let ofs_tag_names = read_offset(&mut r, 0)?;
    let ofs_tags = read_offset(&mut r, 0)?;
    let ofs_surfaces = read_offset(&mut r, 0)?;
    let _ofs_end = read_offset(&mut r, 0)?;

    debug!(%name, num_frames, num_tags, num_surfaces, "read mdc header");

    let frames = read_array(data, ofs_frames, num_frames)?;
    let tag_names = read_array::<TagName>(data, ofs_tag_names, num_tags)?
        .into_iter()
        .map(|t| t.0)
        .collect();
    let tag_count = num_frames.checked_mul(num_tags).unwrap_or(usize::MAX);
    let tags = into_rows(read_array(data, ofs_tags, tag_count)?, num_frames, num_tags);

    let mut surfaces = Vec::with_capacity(num_surfaces.min(256));
    let mut base = ofs_surfaces;
    for _ in 0..num_surfaces {
        let (surface, end) = read_surface(data, base, num_frames)?;
        surfaces.push(surface);
        base = end;
    }

    Ok(Mdc {
        name,
        flags,
        num_skins,
        frames,
        tag_names,
        tags,
        surfaces,
    })
}

fn read_surface(data: &[u8], base: u64, num_frames: usize) -> Result<(MdcSurface, u64)> {
    const KIND: &str = "mdc surface";
    check_span(data, KIND, base, 1, SURFACE_HEADER_SIZE)?;
    let mut r = FieldReader::new(data, base, KIND);
    let ident = r.magic()?;
    let name = r.name(NAME_LEN)?;
    let flags = r.i32()?;
    let num_comp = read_count(&mut r)?;
    let num_base = read_count(&mut r)?;
    let num_shaders = read_count(&mut r)?;
    let num_verts = read_count(&mut r)?;
    let num_triangles = read_count(&mut r)?;
    let ofs_triangles = read_offset(&mut r, base)?;
    let ofs_shaders = read_offset(&mut r, base)?;
    let ofs_st = read_offset(&mut r, base)?;
    let ofs_xyz = read_offset(&mut r, base)?;
    let ofs_comp = read_offset(&mut r, base)?;
    let ofs_frame_base = read_offset(&mut r, base)?;
    let ofs_frame_comp = read_offset(&mut r, base)?;
    let end = read_offset(&mut r, base)?;

    debug!(%name, base, num_base, num_comp, num_verts, "read mdc surface");

    let shaders = read_array(data, ofs_shaders, num_shaders)?;
    let triangles: Vec<Triangle> = read_array(data, ofs_triangles, num_triangles)?;
    check_triangles(&triangles, ofs_triangles, num_verts)?;
    let uvs = read_array(data, ofs_st, num_verts)?;

    let base_count = num_base.checked_mul(num_verts).unwrap_or(usize::MAX);
    let base_vertices = into_rows(read_array(data, ofs_xyz, base_count)?, num_base, num_verts);
    let comp_count = num_comp.checked_mul(num_verts).unwrap_or(usize::MAX);
    let comp_vertices = into_rows(
        read_array::<Packed>(data, ofs_comp, comp_count)?
            .into_iter()
            .map(|p| p.0)
            .collect(),
        num_comp,
        num_verts,
    );

    let frame_base: Vec<i16> = read_array::<Short>(data, ofs_frame_base, num_frames)?
        .into_iter()
        .map(|s| s.0)
        .collect();
    for (f, &b) in frame_base.iter().enumerate() {
        check_index("mdc frame base table", ofs_frame_base + (f * 2) as u64, b as i64, num_base)?;
    }
    let frame_comp: Vec<i16> = read_array::<Short>(data, ofs_frame_comp, num_frames)?
        .into_iter()
        .map(|s| s.0)
        .collect();
    for (f, &c) in frame_comp.iter().enumerate() {
        if c != NOT_COMPRESSED {
            check_index("mdc frame compressed table", ofs_frame_comp + (f * 2) as u64, c as i64, num_comp)?;
        }
    }

    let surface = MdcSurface {
        ident,
        name,
        flags,
        shaders,
        triangles,
        uvs,
        base_vertices,
        comp_vertices,
        frame_base,
        frame_comp,
    };
    Ok((surface, end))
}

#[derive(Debug)]
struct SurfacePlan {
    verts: usize,
    shaders: u64,
    triangles: u64,
    st: u64,
    xyz: u64,
    comp: u64,
    frame_base: u64,
    frame_comp: u64,
    end: u64,
}

fn plan_surface(s: &MdcSurface, num_frames: usize) -> Result<SurfacePlan> {
    let base_verts = row_len(&s.base_vertices, "mdc base vertices")?;
    let comp_verts = row_len(&s.comp_vertices, "mdc compressed vertices")?;
    if (!s.base_vertices.is_empty() && base_verts != s.uvs.len())
        || (!s.comp_vertices.is_empty() && comp_verts != s.uvs.len())
    {
        return Err(Error::other(format!(
            "surface {:?}: vertex rows do not match {} uvs",
            s.name,
            s.uvs.len()
        )));
    }
    if s.frame_base.len() != num_frames || s.frame_comp.len() != num_frames {
        return Err(Error::other(format!(
            "surface {:?}: frame tables must cover {} frames",
            s.name, num_frames
        )));
    }
    let verts = s.uvs.len();
    let mut a = Allocator::at(SURFACE_HEADER_SIZE as u64);
    Ok(SurfacePlan {
        verts,
        shaders: a.alloc_array::<ShaderRecord>(s.shaders.len()),
        triangles: a.alloc_array::<Triangle>(s.triangles.len()),
        st: a.alloc_array::<TexCoord>(verts),
        xyz: a.alloc_array::<XyzNormal>(s.base_vertices.len() * verts),
        comp: a.alloc_array::<Packed>(s.comp_vertices.len() * verts),
        frame_base: a.alloc_array::<Short>(num_frames),
        frame_comp: a.alloc_array::<Short>(num_frames),
        end: a.end(),
    })
}

/// Serialize an MDC record graph.
pub fn write(mdc: &Mdc) -> Result<Vec<u8>> {
    let num_frames = mdc.frames.len();
    let num_tags = mdc.tag_names.len();
    if mdc.tags.len() != num_frames || mdc.tags.iter().any(|row| row.len() != num_tags) {
        return Err(Error::other("mdc tags: one row of every tag per frame required"));
    }

    let mut a = Allocator::at(HEADER_SIZE as u64);
    let ofs_frames = a.alloc_array::<FrameRecord>(num_frames);
    let ofs_tag_names = a.alloc_array::<TagName>(num_tags);
    let ofs_tags = a.alloc_array::<MdcTag>(num_frames * num_tags);
    let ofs_surfaces = a.end();
    let plans = mdc
        .surfaces
        .iter()
        .map(|s| plan_surface(s, num_frames))
        .collect::<Result<Vec<_>>>()?;
    for plan in &plans {
        a.alloc(plan.end as usize);
    }
    let ofs_end = a.end();
    debug!(frames = num_frames, surfaces = plans.len(), size = ofs_end, "mdc layout");

    let mut w = FieldWriter::with_capacity(ofs_end as usize);
    w.bytes(&IDENT)?;
    w.i32(VERSION)?;
    w.name(&mdc.name, NAME_LEN)?;
    w.i32(mdc.flags)?;
    w.u32(to_field(num_frames as u64, "frame count")?)?;
    w.u32(to_field(num_tags as u64, "tag count")?)?;
    w.u32(to_field(mdc.surfaces.len() as u64, "surface count")?)?;
    w.i32(mdc.num_skins)?;
    w.u32(to_field(ofs_frames, "frame offset")?)?;
    w.u32(to_field(ofs_tag_names, "tag name offset")?)?;
    w.u32(to_field(ofs_tags, "tag offset")?)?;
    w.u32(to_field(ofs_surfaces, "surface offset")?)?;
    w.u32(to_field(ofs_end, "file size")?)?;

    w.expect_pos(ofs_frames, "mdc frames")?;
    write_array(&mut w, &mdc.frames)?;
    w.expect_pos(ofs_tag_names, "mdc tag names")?;
    for name in &mdc.tag_names {
        w.name(name, NAME_LEN)?;
    }
    w.expect_pos(ofs_tags, "mdc tags")?;
    for row in &mdc.tags {
        write_array(&mut w, row)?;
    }
    w.expect_pos(ofs_surfaces, "mdc surfaces")?;
    for (surface, plan) in mdc.surfaces.iter().zip(&plans) {
        write_surface(&mut w, surface, plan)?;
    }
    w.expect_pos(ofs_end, "mdc end")?;
    Ok(w.into_inner())
}

fn write_surface(w: &mut FieldWriter, s: &MdcSurface, plan: &SurfacePlan) -> Result<()> {
    const KIND: &str = "mdc surface";
    let base = w.pos();
    w.bytes(&s.ident)?;
    w.name(&s.name, NAME_LEN)?;
    w.i32(s.flags)?;
    w.u32(to_field(s.comp_vertices.len() as u64, "compressed frame count")?)?;
    w.u32(to_field(s.base_vertices.len() as u64, "base frame count")?)?;
    w.u32(to_field(s.shaders.len() as u64, "shader count")?)?;
    w.u32(to_field(plan.verts as u64, "vertex count")?)?;
    w.u32(to_field(s.triangles.len() as u64, "triangle count")?)?;
    w.u32(to_field(plan.triangles, "triangle offset")?)?;
    w.u32(to_field(plan.shaders, "shader offset")?)?;
    w.u32(to_field(plan.st, "uv offset")?)?;
    w.u32(to_field(plan.xyz, "vertex offset")?)?;
    w.u32(to_field(plan.comp, "compressed vertex offset")?)?;
    w.u32(to_field(plan.frame_base, "frame base table offset")?)?;
    w.u32(to_field(plan.frame_comp, "frame compressed table offset")?)?;
    w.u32(to_field(plan.end, "surface end")?)?;

    w.expect_pos(base + plan.shaders, KIND)?;
    write_array(w, &s.shaders)?;
    w.expect_pos(base + plan.triangles, KIND)?;
    write_array(w, &s.triangles)?;
    w.expect_pos(base + plan.st, KIND)?;
    write_array(w, &s.uvs)?;
    w.expect_pos(base + plan.xyz, KIND)?;
    for row in &s.base_vertices {
        write_array(w, row)?;
    }
    w.expect_pos(base + plan.comp, KIND)?;
    for row in &s.comp_vertices {
        row.iter().try_for_each(|&p| w.u32(p))?;
    }
    w.expect_pos(base + plan.frame_base, KIND)?;
    s.frame_base.iter().try_for_each(|&b| w.i16(b))?;
    w.expect_pos(base + plan.frame_comp, KIND)?;
    s.frame_comp.iter().try_for_each(|&c| w.i16(c))?;
    w.expect_pos(base + plan.end, KIND)
}
