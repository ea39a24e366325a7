//! Records and surface containers shared by the skeletal formats.
//!
//! MDS carries mesh and animation in one file; MDM and MDX split them. Both
//! mesh variants use the same 176-byte surface header and weighted vertices,
//! differing only in two unused per-vertex fields that MDS keeps.

use tracing::{debug, trace};

use crate::codec::{
    check_index, check_span, read_array, to_field, to_i32, write_array, Allocator, FieldReader, FieldWriter, Record,
};
use crate::util::{Error, Result, Vec2, Vec3};

use super::{check_triangles, read_count, read_offset, Index, Triangle, NAME_LEN};

/// Size of a skeletal surface header.
pub const SKEL_SURFACE_HEADER_SIZE: usize = 176;

/// Sentinel parent index of a root bone.
pub const NO_PARENT: i32 = -1;

/// Static description of one bone.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneRecord {
    pub name: String,
    pub parent: i32,
    pub torso_weight: f32,
    pub parent_dist: f32,
    pub flags: i32,
}

impl Record for BoneRecord {
    const KIND: &'static str = "bone";
    const SIZE: usize = 80;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            name: r.name(NAME_LEN)?,
            parent: r.i32()?,
            torso_weight: r.f32()?,
            parent_dist: r.f32()?,
            flags: r.i32()?,
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.name(&self.name, NAME_LEN)?;
        w.i32(self.parent)?;
        w.f32(self.torso_weight)?;
        w.f32(self.parent_dist)?;
        w.i32(self.flags)
    }
}

/// Read bone descriptors and check their parent indices.
pub fn read_bones(data: &[u8], start: u64, count: usize) -> Result<Vec<BoneRecord>> {
    let bones: Vec<BoneRecord> = read_array(data, start, count)?;
    for (i, bone) in bones.iter().enumerate() {
        if bone.parent != NO_PARENT {
            let at = start + (i * BoneRecord::SIZE + NAME_LEN) as u64;
            check_index("bone parent", at, bone.parent as i64, count)?;
        }
    }
    // parent chains must end at a root
    for (i, bone) in bones.iter().enumerate() {
        let mut parent = bone.parent;
        let mut depth = 0;
        while parent != NO_PARENT {
            depth += 1;
            if depth > count {
                return Err(Error::BadIndex {
                    kind: "bone parent",
                    offset: start + (i * BoneRecord::SIZE + NAME_LEN) as u64,
                    index: bone.parent as i64,
                    count,
                });
            }
            parent = bones[parent as usize].parent;
        }
    }
    Ok(bones)
}

/// Quantized bone orientation and direction from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressedBone {
    /// Pitch, yaw, roll and one unused slot.
    pub angles: [i16; 4],
    /// Pitch and yaw of the parent-to-bone direction.
    pub ofs_angles: [i16; 2],
}

impl Record for CompressedBone {
    const KIND: &'static str = "compressed bone";
    const SIZE: usize = 12;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            angles: [r.i16()?, r.i16()?, r.i16()?, r.i16()?],
            ofs_angles: [r.i16()?, r.i16()?],
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        self.angles.iter().try_for_each(|&a| w.i16(a))?;
        self.ofs_angles.iter().try_for_each(|&a| w.i16(a))
    }
}

/// Bounds and root location of one skeletal frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkelFrameHeader {
    pub min: Vec3,
    pub max: Vec3,
    pub origin: Vec3,
    pub radius: f32,
    pub parent_offset: Vec3,
}

impl Record for SkelFrameHeader {
    const KIND: &'static str = "skeletal frame";
    const SIZE: usize = 52;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            min: r.vec3()?,
            max: r.vec3()?,
            origin: r.vec3()?,
            radius: r.f32()?,
            parent_offset: r.vec3()?,
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.vec3(self.min)?;
        w.vec3(self.max)?;
        w.vec3(self.origin)?;
        w.f32(self.radius)?;
        w.vec3(self.parent_offset)
    }
}

/// Frame header followed by one compressed bone per skeleton bone.
#[derive(Debug, Clone, PartialEq)]
pub struct SkelFrame {
    pub header: SkelFrameHeader,
    pub bones: Vec<CompressedBone>,
}

/// Encoded size of one frame of a `bone_count`-bone skeleton.
pub fn skel_frame_size(bone_count: usize) -> usize {
    SkelFrameHeader::SIZE + bone_count * CompressedBone::SIZE
}

/// Read `count` interleaved frames.
pub fn read_skel_frames(data: &[u8], start: u64, count: usize, bone_count: usize) -> Result<Vec<SkelFrame>> {
    let stride = skel_frame_size(bone_count);
    check_span(data, SkelFrameHeader::KIND, start, count, stride)?;
    (0..count)
        .map(|i| {
            let at = start + (i * stride) as u64;
            let mut r = FieldReader::new(data, at, SkelFrameHeader::KIND);
            let header = SkelFrameHeader::read(&mut r)?;
            let bones = read_array(data, r.pos(), bone_count)?;
            Ok(SkelFrame { header, bones })
        })
        .collect()
}

/// Write frames back to back.
pub fn write_skel_frames(w: &mut FieldWriter, frames: &[SkelFrame]) -> Result<()> {
    for frame in frames {
        frame.header.write(w)?;
        write_array(w, &frame.bones)?;
    }
    Ok(())
}

/// One bone influence on a vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightRecord {
    pub bone: i32,
    pub weight: f32,
    /// Vertex location in the bone's frame.
    pub offset: Vec3,
}

impl Record for WeightRecord {
    const KIND: &'static str = "weight";
    const SIZE: usize = 20;

    fn read(r: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            bone: r.i32()?,
            weight: r.f32()?,
            offset: r.vec3()?,
        })
    }

    fn write(&self, w: &mut FieldWriter) -> Result<()> {
        w.i32(self.bone)?;
        w.f32(self.weight)?;
        w.vec3(self.offset)
    }
}

/// Per-format variations of the skeletal surface container.
#[derive(Debug, Clone, Copy)]
pub struct SkelLayout {
    pub surface_kind: &'static str,
    pub ident: [u8; 4],
    /// Vertices carry the fixed parent / fixed distance pair.
    pub fixed_fields: bool,
}

impl SkelLayout {
    fn vertex_header_size(&self) -> usize {
        if self.fixed_fields {
            32
        } else {
            24
        }
    }

    /// Encoded size of `vertex`.
    pub fn vertex_size(&self, vertex: &SkelVertex) -> usize {
        self.vertex_header_size() + vertex.weights.len() * WeightRecord::SIZE
    }
}

/// Weighted vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct SkelVertex {
    pub normal: Vec3,
    pub uv: Vec2,
    pub fixed_parent: i32,
    pub fixed_dist: f32,
    pub weights: Vec<WeightRecord>,
}

impl SkelVertex {
    fn read(r: &mut FieldReader<'_>, layout: &SkelLayout, bone_count: Option<usize>) -> Result<Self> {
        r.set_kind("skeletal vertex");
        let normal = r.vec3()?;
        let uv = r.vec2()?;
        let num_weights = read_count(r)?;
        let (fixed_parent, fixed_dist) = if layout.fixed_fields {
            (r.i32()?, r.f32()?)
        } else {
            (0, 0.0)
        };

        check_span(r.data(), WeightRecord::KIND, r.pos(), num_weights, WeightRecord::SIZE)?;
        r.set_kind(WeightRecord::KIND);
        let mut weights = Vec::with_capacity(num_weights);
        for _ in 0..num_weights {
            let at = r.pos();
            let weight = WeightRecord::read(r)?;
            if let Some(count) = bone_count {
                check_index(WeightRecord::KIND, at, weight.bone as i64, count)?;
            }
            weights.push(weight);
        }
        Ok(Self {
            normal,
            uv,
            fixed_parent,
            fixed_dist,
            weights,
        })
    }

    fn write(&self, w: &mut FieldWriter, layout: &SkelLayout) -> Result<()> {
        w.vec3(self.normal)?;
        w.vec2(self.uv)?;
        w.u32(to_field(self.weights.len() as u64, "weight count")?)?;
        if layout.fixed_fields {
            w.i32(self.fixed_parent)?;
            w.f32(self.fixed_dist)?;
        }
        write_array(w, &self.weights)
    }
}

/// One skeletal surface sub-container.
#[derive(Debug, Clone, PartialEq)]
pub struct SkelSurface {
    pub ident: [u8; 4],
    pub name: String,
    pub shader: String,
    pub shader_index: i32,
    pub min_lod: i32,
    pub vertices: Vec<SkelVertex>,
    pub triangles: Vec<Triangle>,
    /// Per vertex: index of the vertex it collapses into, or -1.
    pub collapse_map: Vec<i32>,
    pub bone_refs: Vec<i32>,
}

/// Read `count` chained surfaces starting at `first`.
///
/// `bone_count`, when known, bounds weight and bone-reference indices.
pub fn read_skel_surfaces(
    data: &[u8],
    first: u64,
    count: usize,
    layout: &SkelLayout,
    bone_count: Option<usize>,
) -> Result<Vec<SkelSurface>> {
    let mut surfaces = Vec::with_capacity(count.min(1024));
    let mut base = first;
    for i in 0..count {
        let (surface, end) = read_skel_surface(data, base, layout, bone_count)?;
        debug!(index = i, base, name = %surface.name, "read skeletal surface");
        surfaces.push(surface);
        base = end;
    }
    Ok(surfaces)
}

fn read_skel_surface(
    data: &[u8],
    base: u64,
    layout: &SkelLayout,
    bone_count: Option<usize>,
) -> Result<(SkelSurface, u64)> {
    check_span(data, layout.surface_kind, base, 1, SKEL_SURFACE_HEADER_SIZE)?;
    let mut r = FieldReader::new(data, base, layout.surface_kind);
    let ident = r.magic()?;
    let name = r.name(NAME_LEN)?;
    let shader = r.name(NAME_LEN)?;
    let shader_index = r.i32()?;
    let min_lod = r.i32()?;
    let header_at = r.pos();
    let ofs_header = r.i32()? as i64;
    crate::codec::resolve(data, layout.surface_kind, header_at, base, ofs_header)?;
    let num_verts = read_count(&mut r)?;
    let ofs_verts = read_offset(&mut r, base)?;
    let num_triangles = read_count(&mut r)?;
    let ofs_triangles = read_offset(&mut r, base)?;
    let ofs_collapse = read_offset(&mut r, base)?;
    let num_bone_refs = read_count(&mut r)?;
    let ofs_bone_refs = read_offset(&mut r, base)?;
    let end = read_offset(&mut r, base)?;

    let mut vr = FieldReader::new(data, ofs_verts, "skeletal vertex");
    let mut vertices = Vec::with_capacity(num_verts.min(data.len() / 24 + 1));
    for _ in 0..num_verts {
        vertices.push(SkelVertex::read(&mut vr, layout, bone_count)?);
    }
    trace!(count = num_verts, "read skeletal vertices");

    let triangles: Vec<Triangle> = read_array(data, ofs_triangles, num_triangles)?;
    check_triangles(&triangles, ofs_triangles, num_verts)?;

    let collapse_map: Vec<i32> = read_array::<Index>(data, ofs_collapse, num_verts)?
        .into_iter()
        .map(|i| i.0)
        .collect();
    for (v, &target) in collapse_map.iter().enumerate() {
        if target != -1 {
            check_index("collapse map", ofs_collapse + (v * 4) as u64, target as i64, num_verts)?;
        }
    }

    let bone_refs: Vec<i32> = read_array::<Index>(data, ofs_bone_refs, num_bone_refs)?
        .into_iter()
        .map(|i| i.0)
        .collect();
    if let Some(count) = bone_count {
        for (k, &bone) in bone_refs.iter().enumerate() {
            check_index("bone reference", ofs_bone_refs + (k * 4) as u64, bone as i64, count)?;
        }
    }

    let surface = SkelSurface {
        ident,
        name,
        shader,
        shader_index,
        min_lod,
        vertices,
        triangles,
        collapse_map,
        bone_refs,
    };
    Ok((surface, end))
}

/// Planned offsets of one surface, relative to its start.
#[derive(Debug, Clone, Copy)]
pub struct SkelSurfacePlan {
    pub vertices: u64,
    pub triangles: u64,
    pub collapse_map: u64,
    pub bone_refs: u64,
    pub end: u64,
}

pub fn plan_skel_surface(surface: &SkelSurface, layout: &SkelLayout) -> SkelSurfacePlan {
    let mut a = Allocator::at(SKEL_SURFACE_HEADER_SIZE as u64);
    let vertex_bytes = surface.vertices.iter().map(|v| layout.vertex_size(v)).sum();
    let vertices = a.alloc(vertex_bytes);
    let triangles = a.alloc_array::<Triangle>(surface.triangles.len());
    let collapse_map = a.alloc_array::<Index>(surface.vertices.len());
    let bone_refs = a.alloc_array::<Index>(surface.bone_refs.len());
    SkelSurfacePlan {
        vertices,
        triangles,
        collapse_map,
        bone_refs,
        end: a.end(),
    }
}

/// Emit one surface at the writer's position according to `plan`.
pub fn write_skel_surface(
    w: &mut FieldWriter,
    surface: &SkelSurface,
    layout: &SkelLayout,
    plan: &SkelSurfacePlan,
) -> Result<()> {
    if surface.collapse_map.len() != surface.vertices.len() {
        return Err(Error::other(format!(
            "surface {:?}: collapse map covers {} of {} vertices",
            surface.name,
            surface.collapse_map.len(),
            surface.vertices.len()
        )));
    }
    let base = w.pos();
    let kind = layout.surface_kind;

    w.bytes(&surface.ident)?;
    w.name(&surface.name, NAME_LEN)?;
    w.name(&surface.shader, NAME_LEN)?;
    w.i32(surface.shader_index)?;
    w.i32(surface.min_lod)?;
    w.i32(-to_i32(base as usize, "surface offset")?)?;
    w.u32(to_field(surface.vertices.len() as u64, "vertex count")?)?;
    w.u32(to_field(plan.vertices, "vertex offset")?)?;
    w.u32(to_field(surface.triangles.len() as u64, "triangle count")?)?;
    w.u32(to_field(plan.triangles, "triangle offset")?)?;
    w.u32(to_field(plan.collapse_map, "collapse map offset")?)?;
    w.u32(to_field(surface.bone_refs.len() as u64, "bone reference count")?)?;
    w.u32(to_field(plan.bone_refs, "bone reference offset")?)?;
    w.u32(to_field(plan.end, "surface end")?)?;

    w.expect_pos(base + plan.vertices, kind)?;
    for vertex in &surface.vertices {
        vertex.write(w, layout)?;
    }
    w.expect_pos(base + plan.triangles, kind)?;
    write_array(w, &surface.triangles)?;
    w.expect_pos(base + plan.collapse_map, kind)?;
    surface.collapse_map.iter().try_for_each(|&m| w.i32(m))?;
    w.expect_pos(base + plan.bone_refs, kind)?;
    surface.bone_refs.iter().try_for_each(|&b| w.i32(b))?;
    w.expect_pos(base + plan.end, kind)
}
