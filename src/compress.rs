//! Two-tier delta compression of morph-target animation.
//!
//! Some frames ("base frames") keep full-precision vertices. Every other frame
//! stores, per vertex, a one-byte offset per axis from its base frame plus an
//! index into the shared [normal table](crate::quant::anorms).
//!
//! Packed compressed vertex layout (little-endian `u32`):
//!
//! ```text
//! bits  0..8   x offset   (biased by 127, 0.05 units per step)
//! bits  8..16  y offset
//! bits 16..24  z offset
//! bits 24..32  normal table index
//! ```

use tracing::debug;

use crate::quant::{anorms, XYZ_SCALE};
use crate::util::Vec3;

/// Model units per offset step.
pub const DIST_SCALE: f32 = 0.05;

/// Offset bias; a stored byte of 127 means "no movement".
pub const MAX_OFS: f32 = 127.0;

/// Largest per-axis movement a compressed frame may encode.
pub const MAX_COMPRESSIBLE_DISTANCE: f32 = MAX_OFS * DIST_SCALE;

/// Reconstruction tolerance guaranteed for compressed frames.
pub const COMPRESSION_DELTA: f32 = 0.1;

/// Sentinel in the frame→compressed table for base frames.
pub const NOT_COMPRESSED: i16 = -1;

/// Which frames are stored in full and which as deltas.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FramePlan {
    /// Frame number of each base frame, ascending.
    pub base_frames: Vec<usize>,
    /// Frame number of each compressed frame, ascending.
    pub comp_frames: Vec<usize>,
    /// Per frame: index into `base_frames` of the frame it is relative to.
    pub frame_base: Vec<u16>,
    /// Per frame: index into `comp_frames`, or [`NOT_COMPRESSED`].
    pub frame_comp: Vec<i16>,
}

impl FramePlan {
    /// Number of animation frames covered.
    pub fn frame_count(&self) -> usize {
        self.frame_base.len()
    }

    /// Frame number of the base frame that `frame` is stored against.
    pub fn base_of(&self, frame: usize) -> usize {
        self.base_frames[self.frame_base[frame] as usize]
    }

    /// Whether `frame` is stored in full.
    pub fn is_base(&self, frame: usize) -> bool {
        self.frame_comp[frame] == NOT_COMPRESSED
    }
}

/// Per-surface vertex locations, indexed `[frame][vertex]`.
pub type FrameLocations = Vec<Vec<Vec3>>;

/// Snap a location onto the grid base frames are stored on.
#[inline]
fn on_grid(v: Vec3) -> Vec3 {
    (v / XYZ_SCALE).round() * XYZ_SCALE
}

/// Per-axis offset from `base` to `location` in whole steps.
///
/// Both points are taken on the storage grid first, so decoded data yields
/// the same step counts as the locations it was encoded from.
pub fn delta_steps(location: Vec3, base: Vec3) -> Vec3 {
    ((on_grid(location) - on_grid(base)) / DIST_SCALE).round()
}

fn within_reach(location: Vec3, base: Vec3) -> bool {
    delta_steps(location, base).abs().max_element() <= MAX_OFS
}

/// Choose base frames for a model.
///
/// Frame 0 is always a base frame. A later frame is compressed against the
/// current base if every vertex of every surface stays within [`MAX_OFS`]
/// steps ([`MAX_COMPRESSIBLE_DISTANCE`]) on each axis; otherwise it becomes
/// the new base.
pub fn select_base_frames(surfaces: &[FrameLocations], frame_count: usize) -> FramePlan {
    let mut plan = FramePlan::default();
    let mut current_base = 0usize;

    for frame in 0..frame_count {
        let compressible = frame > 0
            && surfaces.iter().all(|surface| {
                surface[frame]
                    .iter()
                    .zip(&surface[current_base])
                    .all(|(&loc, &base)| within_reach(loc, base))
            });

        if compressible {
            plan.frame_base.push((plan.base_frames.len() - 1) as u16);
            plan.frame_comp.push(plan.comp_frames.len() as i16);
            plan.comp_frames.push(frame);
        } else {
            current_base = frame;
            plan.frame_base.push(plan.base_frames.len() as u16);
            plan.frame_comp.push(NOT_COMPRESSED);
            plan.base_frames.push(frame);
        }
    }

    debug!(
        frames = frame_count,
        base = plan.base_frames.len(),
        compressed = plan.comp_frames.len(),
        "selected base frames"
    );
    plan
}

/// Pack one vertex relative to its (already quantized) base location.
pub fn encode_vertex(location: Vec3, base: Vec3, normal: Vec3) -> u32 {
    let delta = delta_steps(location, base);
    let q = |d: f32| (d + MAX_OFS).clamp(0.0, 255.0) as u32;
    let index = anorms::table().nearest(normal) as u32;
    q(delta.x) | (q(delta.y) << 8) | (q(delta.z) << 16) | (index << 24)
}

/// Unpack one vertex into its location and table normal.
pub fn decode_vertex(packed: u32, base: Vec3) -> (Vec3, Vec3) {
    let ofs = |shift: u32| (((packed >> shift) & 0xFF) as f32 - MAX_OFS) * DIST_SCALE;
    let location = base + Vec3::new(ofs(0), ofs(8), ofs(16));
    let normal = anorms::table().get((packed >> 24) as u8);
    (location, normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_vertex(xs: &[f32]) -> Vec<FrameLocations> {
        vec![xs.iter().map(|&x| vec![Vec3::new(x, 0.0, 0.0)]).collect()]
    }

    #[test]
    fn test_max_distance() {
        assert!((MAX_COMPRESSIBLE_DISTANCE - 6.35).abs() < 1e-6);
    }

    #[test]
    fn test_base_frame_selection() {
        let plan = select_base_frames(&one_vertex(&[0.0, 2.0, 10.0]), 3);
        assert_eq!(plan.frame_base, vec![0, 0, 1]);
        assert_eq!(plan.frame_comp, vec![-1, 0, -1]);
        assert_eq!(plan.base_frames, vec![0, 2]);
        assert_eq!(plan.comp_frames, vec![1]);
        assert_eq!(plan.base_of(1), 0);
        assert!(plan.is_base(2));
    }

    #[test]
    fn test_any_surface_forces_base() {
        let mut surfaces = one_vertex(&[0.0, 1.0]);
        surfaces.push(vec![vec![Vec3::ZERO], vec![Vec3::new(0.0, 0.0, -7.0)]]);
        let plan = select_base_frames(&surfaces, 2);
        assert_eq!(plan.base_frames, vec![0, 1]);
    }

    #[test]
    fn test_tests_against_latest_base() {
        let plan = select_base_frames(&one_vertex(&[0.0, 10.0, 14.0, 3.0]), 4);
        assert_eq!(plan.base_frames, vec![0, 1, 3]);
        assert_eq!(plan.frame_base, vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_vertex_quantization_bound() {
        let base = Vec3::new(10.0, -4.0, 2.0);
        for delta in [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(6.35, -6.35, 0.01),
            Vec3::new(1.234, -0.777, 3.3),
        ] {
            let loc = base + delta;
            let packed = encode_vertex(loc, base, Vec3::Z);
            let (back, normal) = decode_vertex(packed, base);
            assert!((back - loc).abs().max_element() <= COMPRESSION_DELTA);
            assert!(normal.dot(Vec3::Z) > 0.99);
        }
    }

    #[test]
    fn test_reach_survives_decoding() {
        // deltas near the reach limit must be judged the same after a decode
        for i in 0..=100 {
            let d = 6.30 + i as f32 * 0.001;
            for sign in [1.0f32, -1.0] {
                let base = Vec3::new(0.0, 0.0, 0.0);
                let loc = Vec3::new(sign * d, 0.0, 0.0);
                let first = select_base_frames(&one_vertex(&[0.0, loc.x]), 2);
                let back = if first.is_base(1) {
                    on_grid(loc)
                } else {
                    let packed = encode_vertex(loc, base, Vec3::Z);
                    let (back, _) = decode_vertex(packed, base);
                    assert_eq!(encode_vertex(back, base, Vec3::Z), packed);
                    back
                };
                let second = select_base_frames(&one_vertex(&[0.0, back.x]), 2);
                assert_eq!(first, second, "delta {}", sign * d);
            }
        }
    }

    #[test]
    fn test_decode_encode_identity() {
        let base = Vec3::new(-3.5, 7.25, 100.0);
        for packed in [0u32, 0x7F7F_7F00, 0xFFFF_FFFF, 0x1280_FE01] {
            let (loc, normal) = decode_vertex(packed, base);
            assert_eq!(encode_vertex(loc, base, normal), packed);
        }
    }
}
