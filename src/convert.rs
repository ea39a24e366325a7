//! Cross-format coercion of a [`Model`].
//!
//! Each format stores one vertex style, one tag style and at most one LOD
//! style. [`convert`] rewrites a model so that the target's encoder accepts
//! it, or fails with [`Error::Unsupported`] when the information needed does
//! not exist (morph targets cannot be turned back into a skeleton).
//!
//! ```ignore
//! let opts = ConvertOptions::default().with_bind_frame(2).with_regenerate_lod(true);
//! let outcome = convert(&model, Format::Mds, &opts)?;
//! ```

use tracing::{debug, info};

use crate::format::Format;
use crate::lod::{reduce, ReduceOptions};
use crate::model::{
    Attachment, BoundingVolume, CollapseMap, Frame, Lod, Model, MorphVertex, Pose, Skeleton, Surface, Tag, TagFrame,
    Vertices,
};
use crate::util::{is_orthonormal, Diagnostics, Error, Outcome, Result, Vec3, Warning};

/// Offsets shorter than this count as the tag sitting on its bone.
const ON_BONE_DISTANCE: f32 = 1e-4;

/// Attachment style to force on every tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStyle {
    Free,
    Bone,
    BoneOffset,
}

impl TagStyle {
    /// The style a format stores, if it stores tags at all.
    pub fn native(format: Format) -> Option<Self> {
        match format {
            Format::Md3 | Format::Mdc | Format::Tag => Some(Self::Free),
            Format::Mds => Some(Self::Bone),
            Format::Mdm => Some(Self::BoneOffset),
            Format::Mdx => None,
        }
    }

    /// Parse `free`, `bone` or `offset`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Self::Free),
            "bone" => Some(Self::Bone),
            "offset" | "bone-offset" => Some(Self::BoneOffset),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Bone => "bone",
            Self::BoneOffset => "bone-offset",
        }
    }
}

/// Conversion settings.
#[derive(Clone, Debug)]
pub struct ConvertOptions {
    /// Frame used for bind-pose computations.
    pub bind_frame: usize,
    /// Forced tag style; `None` uses the target's own.
    pub tag_style: Option<TagStyle>,
    /// Rebuild collapse maps even when the model already has usable ones.
    pub regenerate_lod: bool,
    pub lod_scale: f32,
    pub lod_bias: f32,
    pub reduce: ReduceOptions,
    /// Bone, by name, that a tag is bound to when it becomes bone-bound.
    pub tag_bones: Vec<(String, String)>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            bind_frame: 0,
            tag_style: None,
            regenerate_lod: false,
            lod_scale: 1.0,
            lod_bias: 0.0,
            reduce: ReduceOptions::default(),
            tag_bones: Vec::new(),
        }
    }
}

impl ConvertOptions {
    pub fn with_bind_frame(mut self, frame: usize) -> Self {
        self.bind_frame = frame;
        self
    }

    pub fn with_tag_style(mut self, style: TagStyle) -> Self {
        self.tag_style = Some(style);
        self
    }

    pub fn with_regenerate_lod(mut self, regenerate: bool) -> Self {
        self.regenerate_lod = regenerate;
        self
    }

    pub fn with_lod_params(mut self, scale: f32, bias: f32) -> Self {
        self.lod_scale = scale;
        self.lod_bias = bias;
        self
    }

    pub fn with_reduce(mut self, reduce: ReduceOptions) -> Self {
        self.reduce = reduce;
        self
    }

    /// Bind tag `tag` to the bone named `bone` when converting to a
    /// bone-bound tag style. Replaces an earlier binding of the same tag.
    pub fn with_tag_bone(mut self, tag: impl Into<String>, bone: impl Into<String>) -> Self {
        let tag = tag.into();
        self.tag_bones.retain(|(t, _)| *t != tag);
        self.tag_bones.push((tag, bone.into()));
        self
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Coerce `model` into something `target` can encode.
pub fn convert(model: &Model, target: Format, opts: &ConvertOptions) -> Result<Outcome<Model>> {
    let mut out = model.clone();
    let mut diag = Diagnostics::new();
    let frames = out.frame_count();
    if frames > 0 && opts.bind_frame >= frames {
        return Err(Error::OutOfRange {
            what: "bind frame",
            value: opts.bind_frame as f64,
        });
    }

    let native = TagStyle::native(target);
    if let (Some(style), Some(native)) = (opts.tag_style, native) {
        if style != native {
            return Err(Error::unsupported(format!(
                "{target} stores {} tags, {} requested",
                native.name(),
                style.name()
            )));
        }
    }
    if let Some((tag, _)) = opts.tag_bones.iter().find(|(tag, _)| out.tag(tag).is_none()) {
        return Err(Error::unsupported(format!("bone binding names tag {tag:?}, which the model lacks")));
    }
    debug!(%target, frames, surfaces = out.surfaces.len(), tags = out.tags.len(), "convert");

    match target {
        Format::Md3 | Format::Mdc => {
            skin_to_morph(&mut out, &mut diag)?;
            coerce_tags(&mut out, TagStyle::Free, opts, &mut diag)?;
            out.skeleton = None;
            drop_lod(&mut out, target, &mut diag);
        }
        Format::Mds | Format::Mdm => {
            require_rigged(&out, target)?;
            pad_poses(&mut out, &mut diag)?;
            fill_bone_refs(&mut out);
            let style = if target == Format::Mds {
                TagStyle::Bone
            } else {
                TagStyle::BoneOffset
            };
            coerce_tags(&mut out, style, opts, &mut diag)?;
            ensure_collapse_lod(&mut out, opts, &mut diag)?;
        }
        Format::Mdx => {
            pad_poses(&mut out, &mut diag)?;
        }
        Format::Tag => {
            coerce_tags(&mut out, TagStyle::Free, opts, &mut diag)?;
            let tags = out
                .tags
                .into_iter()
                .map(|tag| {
                    let attachment = match tag.attachment {
                        Attachment::Free(frames) => {
                            Attachment::Free(vec![frames.get(opts.bind_frame).copied().unwrap_or_default()])
                        }
                        other => other,
                    };
                    Tag {
                        name: tag.name,
                        attachment,
                    }
                })
                .collect();
            if out.lod.is_some() {
                diag.push(Warning::LodDropped("TAG stores tags only"));
            }
            out = Model {
                name: out.name,
                frames: vec![Frame::default()],
                tags,
                ..Model::default()
            };
        }
    }
    Ok(diag.finish(out))
}

// ============================================================================
// Vertices and skeleton
// ============================================================================

fn require_rigged(model: &Model, target: Format) -> Result<()> {
    if model.skeleton.is_none() {
        return Err(Error::unsupported(format!("{target} requires a skeleton")));
    }
    if let Some(s) = model.surfaces.iter().find(|s| !s.vertices.is_rigged()) {
        return Err(Error::unsupported(format!(
            "{target} needs rigged vertices; surface {:?} is morph-animated",
            s.name
        )));
    }
    Ok(())
}

/// Warn once per bone that lacks poses for some frames.
fn warn_missing_poses(skeleton: &Skeleton, frames: usize, diag: &mut Diagnostics) {
    for bone in &skeleton.bones {
        if bone.poses.len() < frames {
            diag.push(Warning::MissingPose {
                bone: bone.name.clone(),
                frame: bone.poses.len(),
            });
        }
    }
}

/// Replace rigged surfaces with per-frame skinned morph targets.
fn skin_to_morph(model: &mut Model, diag: &mut Diagnostics) -> Result<()> {
    if !model.is_rigged() {
        return Ok(());
    }
    let Some(skeleton) = model.skeleton.as_ref() else {
        return Err(Error::unsupported("rigged surfaces without a skeleton cannot be skinned"));
    };
    let frames = model.frames.len();
    warn_missing_poses(skeleton, frames, diag);
    for surface in &mut model.surfaces {
        if let Vertices::Rigged(verts) = &surface.vertices {
            let morph = verts
                .iter()
                .map(|v| MorphVertex {
                    frames: (0..frames).map(|f| skeleton.skin(v, f)).collect(),
                })
                .collect();
            surface.vertices = Vertices::Morph(morph);
            surface.bone_refs.clear();
        }
    }
    // stored skeletal bounds need not enclose the skinned mesh
    for (f, frame) in model.frames.iter_mut().enumerate() {
        let points: Vec<Vec3> = model.surfaces.iter().flat_map(|s| s.positions_at(f, None)).collect();
        if !points.is_empty() {
            frame.bounds = BoundingVolume::around(&points, frame.bounds.origin);
        }
    }
    debug!(frames, "skinned rigged surfaces");
    Ok(())
}

/// Make every bone carry one pose per model frame.
fn pad_poses(model: &mut Model, diag: &mut Diagnostics) -> Result<()> {
    let Some(skeleton) = model.skeleton.as_mut() else {
        return Err(Error::unsupported("target requires a skeleton"));
    };
    let frames = model.frames.len().max(skeleton.frame_count());
    model.frames.resize_with(frames, Frame::default);
    warn_missing_poses(skeleton, frames, diag);
    for bone in &mut skeleton.bones {
        bone.poses.resize_with(frames, Default::default);
    }
    Ok(())
}

/// Fill empty bone reference lists from vertex weights.
fn fill_bone_refs(model: &mut Model) {
    let Some(skeleton) = model.skeleton.as_ref() else {
        return;
    };
    for surface in &mut model.surfaces {
        if !surface.bone_refs.is_empty() {
            continue;
        }
        if let Vertices::Rigged(verts) = &surface.vertices {
            let bones = verts.iter().flat_map(|v| v.weights.iter().map(|w| w.bone));
            surface.bone_refs = skeleton.with_ancestors(bones);
        }
    }
}

// ============================================================================
// Tags
// ============================================================================

fn tag_skeleton<'a>(skeleton: Option<&'a Skeleton>, tag: &Tag) -> Result<&'a Skeleton> {
    skeleton.ok_or_else(|| Error::unsupported(format!("tag {:?} is bound to a bone but there is no skeleton", tag.name)))
}

/// Model-space transform of a tag at `frame`.
fn tag_pose(attachment: &Attachment, skeleton: &Skeleton, frame: usize) -> Pose {
    match *attachment {
        Attachment::Free(ref frames) => frames.get(frame).map_or_else(Pose::default, |t| Pose {
            location: t.location,
            orientation: t.orientation,
        }),
        Attachment::Bone { bone, .. } => skeleton.pose(bone, frame),
        Attachment::BoneOffset {
            bone,
            offset,
            orientation,
            ..
        } => skeleton.pose(bone, frame).attach(offset, orientation),
    }
}

/// Bone a tag ends up on: the requested binding, else the bone it already follows.
fn bound_bone(tag: &Tag, skeleton: &Skeleton, opts: &ConvertOptions) -> Result<u32> {
    if let Some((_, name)) = opts.tag_bones.iter().find(|(t, _)| *t == tag.name) {
        return skeleton
            .bone_index(name)
            .ok_or_else(|| Error::unsupported(format!("tag {:?}: skeleton has no bone {name:?}", tag.name)));
    }
    match tag.attachment {
        Attachment::Bone { bone, .. } | Attachment::BoneOffset { bone, .. } => Ok(bone),
        Attachment::Free(_) => Err(Error::unsupported(format!(
            "free tag {:?} has no bone binding",
            tag.name
        ))),
    }
}

/// Rewrite every tag into `style`.
///
/// Free targets sample the tag's model-space transform per frame. Bone
/// targets take the tag's bound bone (see [`ConvertOptions::with_tag_bone`])
/// and, for bone-offset tags, the offset of the tag from that bone at the
/// bind frame. Plain bone tags cannot hold an offset; a tag away from its
/// bone loses it with a warning.
pub fn coerce_tags(model: &mut Model, style: TagStyle, opts: &ConvertOptions, diag: &mut Diagnostics) -> Result<()> {
    let frames = model.frames.len();
    let bind_frame = opts.bind_frame;
    let skeleton = model.skeleton.as_ref();
    for tag in &mut model.tags {
        let attachment = match (&tag.attachment, style) {
            (Attachment::Free(_), TagStyle::Free) => continue,
            (Attachment::Bone { .. }, TagStyle::Bone) | (Attachment::BoneOffset { .. }, TagStyle::BoneOffset)
                if !opts.tag_bones.iter().any(|(t, _)| *t == tag.name) =>
            {
                continue
            }

            (_, TagStyle::Free) => {
                let s = tag_skeleton(skeleton, tag)?;
                Attachment::Free(
                    (0..frames)
                        .map(|f| {
                            let pose = tag_pose(&tag.attachment, s, f);
                            TagFrame {
                                location: pose.location,
                                orientation: pose.orientation,
                            }
                        })
                        .collect(),
                )
            }

            (_, TagStyle::Bone) => {
                let s = tag_skeleton(skeleton, tag)?;
                let bone = bound_bone(tag, s, opts)?;
                let (offset, _) = s.pose(bone, bind_frame).relative(&tag_pose(&tag.attachment, s, bind_frame));
                if offset.length() > ON_BONE_DISTANCE {
                    diag.push(Warning::TagOffsetDropped { name: tag.name.clone() });
                }
                let torso_weight = s.bones.get(bone as usize).map_or(0.0, |b| b.torso_weight);
                Attachment::Bone { bone, torso_weight }
            }

            (_, TagStyle::BoneOffset) => {
                let s = tag_skeleton(skeleton, tag)?;
                let bone = bound_bone(tag, s, opts)?;
                let world = tag_pose(&tag.attachment, s, bind_frame);
                if !is_orthonormal(world.orientation, 1e-3) {
                    diag.push(Warning::TagSkewed { name: tag.name.clone() });
                }
                let (offset, orientation) = s.pose(bone, bind_frame).relative(&world);
                Attachment::BoneOffset {
                    bone,
                    offset,
                    orientation,
                    bone_refs: s.with_ancestors([bone]),
                }
            }
        };
        tag.attachment = attachment;
    }
    Ok(())
}

// ============================================================================
// Level of detail
// ============================================================================

fn drop_lod(model: &mut Model, target: Format, diag: &mut Diagnostics) {
    if model.lod.take().is_some() {
        let reason = match target {
            Format::Mdc => "MDC has no level of detail",
            _ => "MD3 has no level of detail",
        };
        diag.push(Warning::LodDropped(reason));
    }
}

fn usable_collapse_maps(model: &Model) -> bool {
    match &model.lod {
        Some(Lod::CollapseMap { surfaces, .. }) => {
            surfaces.len() == model.surfaces.len()
                && surfaces
                    .iter()
                    .zip(&model.surfaces)
                    .all(|(map, s)| map.map.len() == s.vertex_count())
        }
        _ => false,
    }
}

/// Keep usable collapse maps or generate new ones from bind-frame positions.
fn ensure_collapse_lod(model: &mut Model, opts: &ConvertOptions, diag: &mut Diagnostics) -> Result<()> {
    if !opts.regenerate_lod && usable_collapse_maps(model) {
        return Ok(());
    }
    if matches!(model.lod, Some(Lod::Discrete { .. })) {
        diag.push(Warning::LodDropped("discrete LOD replaced by generated collapse maps"));
    }
    let mut maps = Vec::with_capacity(model.surfaces.len());
    for surface in &mut model.surfaces {
        let positions = surface.positions_at(opts.bind_frame, model.skeleton.as_ref());
        maps.push(generate_collapse_map(surface, &positions, &opts.reduce)?);
    }
    info!(surfaces = maps.len(), "generated collapse maps");
    model.lod = Some(Lod::CollapseMap {
        scale: opts.lod_scale,
        bias: opts.lod_bias,
        surfaces: maps,
    });
    Ok(())
}

/// Reduce one surface and renumber its vertices into collapse order.
pub fn generate_collapse_map(surface: &mut Surface, positions: &[Vec3], opts: &ReduceOptions) -> Result<CollapseMap> {
    let reduction = reduce(positions, &surface.triangles, opts)?;
    let order = reduction.collapse_order();
    let old_index = order.old_index();

    for tri in &mut surface.triangles {
        *tri = tri.map(|v| order.new_index[v as usize]);
    }
    if surface.uvs.len() == old_index.len() {
        surface.uvs = old_index.iter().map(|&o| surface.uvs[o as usize]).collect();
    }
    match &mut surface.vertices {
        Vertices::Morph(verts) => *verts = old_index.iter().map(|&o| verts[o as usize].clone()).collect(),
        Vertices::Rigged(verts) => *verts = old_index.iter().map(|&o| verts[o as usize].clone()).collect(),
    }
    debug!(surface = %surface.name, min_lod = reduction.min_lod, "collapse map");
    Ok(CollapseMap {
        min_lod: reduction.min_lod,
        map: order.map,
    })
}
