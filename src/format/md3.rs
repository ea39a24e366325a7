//! MD3 container: full-precision morph-target model.
//!
//! ```text
//! header (108)
//! frames   [numFrames]            56 bytes each
//! tags     [numFrames][numTags]  112 bytes each
//! surfaces chained through ofsEnd
//!   header (108), shaders, triangles, uvs, vertices [numFrames][numVerts]
//! ```

use tracing::debug;

use crate::codec::{check_span, read_array, to_field, write_array, Allocator, FieldReader, FieldWriter};
use crate::util::Result;

use super::{
    check_triangles, into_rows, read_count, read_offset, row_len, FrameRecord, ShaderRecord, TagRecord, TexCoord,
    Triangle, XyzNormal, NAME_LEN,
};

pub const IDENT: [u8; 4] = *b"IDP3";
pub const VERSION: i32 = 15;
pub const HEADER_SIZE: usize = 108;
pub const SURFACE_HEADER_SIZE: usize = 108;

/// Decoded MD3 record graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Md3 {
    pub name: String,
    pub flags: i32,
    pub num_skins: i32,
    pub frames: Vec<FrameRecord>,
    /// Indexed `[frame][tag]`.
    pub tags: Vec<Vec<TagRecord>>,
    pub surfaces: Vec<Md3Surface>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Md3Surface {
    pub ident: [u8; 4],
    pub name: String,
    pub flags: i32,
    pub shaders: Vec<ShaderRecord>,
    pub triangles: Vec<Triangle>,
    pub uvs: Vec<TexCoord>,
    /// Indexed `[frame][vertex]`.
    pub vertices: Vec<Vec<XyzNormal>>,
}

impl Md3Surface {
    pub fn vertex_count(&self) -> usize {
        self.vertices.first().map_or(self.uvs.len(), Vec::len)
    }
}

/// Parse an MD3 buffer.
pub fn read(data: &[u8]) -> Result<Md3> {
    check_span(data, "md3 header", 0, 1, HEADER_SIZE)?;
    let mut r = FieldReader::new(data, 0, "md3 header");
    r.expect_magic(&IDENT)?;
    r.expect_version(VERSION)?;
    let name = r.name(NAME_LEN)?;
    let flags = r.i32()?;
    let num_frames = read_count(&mut r)?;
    let num_tags = read_count(&mut r)?;
    let num_surfaces = read_count(&mut r)?;
    let num_skins = r.i32()?;
    let ofs_frames = read_offset(&mut r, 0)?;
    let ofs_tags = read_offset(&mut r, 0)?;
    let ofs_surfaces = read_offset(&mut r, 0)?;
    let _ofs_end = read_offset(&mut r, 0)?;

    debug!(%name, num_frames, num_tags, num_surfaces, "read md3 header");

    let frames = read_array(data, ofs_frames, num_frames)?;
    let tag_count = num_frames.checked_mul(num_tags).unwrap_or(usize::MAX);
    let tags = into_rows(read_array(data, ofs_tags, tag_count)?, num_frames, num_tags);

    let mut surfaces = Vec::with_capacity(num_surfaces.min(256));
    let mut base = ofs_surfaces;
    for _ in 0..num_surfaces {
        let (surface, end) = read_surface(data, base)?;
        surfaces.push(surface);
        base = end;
    }

    Ok(Md3 {
        name,
        flags,
        num_skins,
        frames,
        tags,
        surfaces,
    })
}

fn read_surface(data: &[u8], base: u64) -> Result<(Md3Surface, u64)> {
    const KIND: &str = "md3 surface";
    check_span(data, KIND, base, 1, SURFACE_HEADER_SIZE)?;
    let mut r = FieldReader::new(data, base, KIND);
    let ident = r.magic()?;
    let name = r.name(NAME_LEN)?;
    let flags = r.i32()?;
    let num_frames = read_count(&mut r)?;
    let num_shaders = read_count(&mut r)?;
    let num_verts = read_count(&mut r)?;
    let num_triangles = read_count(&mut r)?;
    let ofs_triangles = read_offset(&mut r, base)?;
    let ofs_shaders = read_offset(&mut r, base)?;
    let ofs_st = read_offset(&mut r, base)?;
    let ofs_xyz = read_offset(&mut r, base)?;
    let end = read_offset(&mut r, base)?;

    debug!(%name, base, num_frames, num_verts, num_triangles, "read md3 surface");

    let shaders = read_array(data, ofs_shaders, num_shaders)?;
    let triangles: Vec<Triangle> = read_array(data, ofs_triangles, num_triangles)?;
    check_triangles(&triangles, ofs_triangles, num_verts)?;
    let uvs = read_array(data, ofs_st, num_verts)?;
    let vertex_count = num_frames.checked_mul(num_verts).unwrap_or(usize::MAX);
    let vertices = into_rows(read_array(data, ofs_xyz, vertex_count)?, num_frames, num_verts);

    let surface = Md3Surface {
        ident,
        name,
        flags,
        shaders,
        triangles,
        uvs,
        vertices,
    };
    Ok((surface, end))
}

#[derive(Debug)]
struct SurfacePlan {
    shaders: u64,
    triangles: u64,
    st: u64,
    xyz: u64,
    end: u64,
}

fn plan_surface(s: &Md3Surface) -> Result<SurfacePlan> {
    let verts = row_len(&s.vertices, "md3 surface vertices")?;
    if !s.vertices.is_empty() && verts != s.uvs.len() {
        return Err(crate::util::Error::other(format!(
            "surface {:?}: {} uvs for {} vertices",
            s.name,
            s.uvs.len(),
            verts
        )));
    }
    let mut a = Allocator::at(SURFACE_HEADER_SIZE as u64);
    Ok(SurfacePlan {
        shaders: a.alloc_array::<ShaderRecord>(s.shaders.len()),
        triangles: a.alloc_array::<Triangle>(s.triangles.len()),
        st: a.alloc_array::<TexCoord>(s.uvs.len()),
        xyz: a.alloc_array::<XyzNormal>(s.vertices.len() * verts),
        end: a.end(),
    })
}

/// Serialize an MD3 record graph.
pub fn write(md3: &Md3) -> Result<Vec<u8>> {
    let num_tags = row_len(&md3.tags, "md3 tags")?;
    if md3.tags.len() != md3.frames.len() && num_tags > 0 {
        return Err(crate::util::Error::other("md3 tags: one row per frame required"));
    }

    let mut a = Allocator::at(HEADER_SIZE as u64);
    let ofs_frames = a.alloc_array::<FrameRecord>(md3.frames.len());
    let ofs_tags = a.alloc_array::<TagRecord>(md3.frames.len() * num_tags);
    let ofs_surfaces = a.end();
    let plans = md3.surfaces.iter().map(plan_surface).collect::<Result<Vec<_>>>()?;
    for plan in &plans {
        a.alloc(plan.end as usize);
    }
    let ofs_end = a.end();
    debug!(frames = md3.frames.len(), surfaces = plans.len(), size = ofs_end, "md3 layout");

    let mut w = FieldWriter::with_capacity(ofs_end as usize);
    w.bytes(&IDENT)?;
    w.i32(VERSION)?;
    w.name(&md3.name, NAME_LEN)?;
    w.i32(md3.flags)?;
    w.u32(to_field(md3.frames.len() as u64, "frame count")?)?;
    w.u32(to_field(num_tags as u64, "tag count")?)?;
    w.u32(to_field(md3.surfaces.len() as u64, "surface count")?)?;
    w.i32(md3.num_skins)?;
    w.u32(to_field(ofs_frames, "frame offset")?)?;
    w.u32(to_field(ofs_tags, "tag offset")?)?;
    w.u32(to_field(ofs_surfaces, "surface offset")?)?;
    w.u32(to_field(ofs_end, "file size")?)?;

    w.expect_pos(ofs_frames, "md3 frames")?;
    write_array(&mut w, &md3.frames)?;
    w.expect_pos(ofs_tags, "md3 tags")?;
    for row in &md3.tags {
        write_array(&mut w, row)?;
    }
    w.expect_pos(ofs_surfaces, "md3 surfaces")?;
    for (surface, plan) in md3.surfaces.iter().zip(&plans) {
        write_surface(&mut w, surface, plan)?;
    }
    w.expect_pos(ofs_end, "md3 end")?;
    Ok(w.into_inner())
}

fn write_surface(w: &mut FieldWriter, s: &Md3Surface, plan: &SurfacePlan) -> Result<()> {
    const KIND: &str = "md3 surface";
    let base = w.pos();
    w.bytes(&s.ident)?;
    w.name(&s.name, NAME_LEN)?;
    w.i32(s.flags)?;
    w.u32(to_field(s.vertices.len() as u64, "frame count")?)?;
    w.u32(to_field(s.shaders.len() as u64, "shader count")?)?;
    w.u32(to_field(s.uvs.len() as u64, "vertex count")?)?;
    w.u32(to_field(s.triangles.len() as u64, "triangle count")?)?;
    w.u32(to_field(plan.triangles, "triangle offset")?)?;
    w.u32(to_field(plan.shaders, "shader offset")?)?;
    w.u32(to_field(plan.st, "uv offset")?)?;
    w.u32(to_field(plan.xyz, "vertex offset")?)?;
    w.u32(to_field(plan.end, "surface end")?)?;

    w.expect_pos(base + plan.shaders, KIND)?;
    write_array(w, &s.shaders)?;
    w.expect_pos(base + plan.triangles, KIND)?;
    write_array(w, &s.triangles)?;
    w.expect_pos(base + plan.st, KIND)?;
    write_array(w, &s.uvs)?;
    w.expect_pos(base + plan.xyz, KIND)?;
    for row in &s.vertices {
        write_array(w, row)?;
    }
    w.expect_pos(base + plan.end, KIND)
}
