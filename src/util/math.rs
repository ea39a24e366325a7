//! Math type re-exports and the Euler-angle conventions used by the formats.
//!
//! Orientations are `Mat3` whose columns are the forward, left and up axes.
//! Angles are `(pitch, yaw, roll)` in degrees, applied the way the engine's
//! `AnglesToAxis` does. Conversions run in double precision so that a
//! quantized angle survives decode and re-encode unchanged.

pub use glam::{DMat3, DVec3, Mat3, Vec2, Vec3};

/// Angles below this magnitude of `cos(pitch)` are treated as gimbal lock.
const GIMBAL_EPSILON: f64 = 1e-9;

/// Euler angles in degrees: x = pitch, y = yaw, z = roll.
pub type Angles = DVec3;

/// Build an orientation from `(pitch, yaw, roll)` degrees.
pub fn angles_to_axis(angles: Angles) -> Mat3 {
    let (sp, cp) = angles.x.to_radians().sin_cos();
    let (sy, cy) = angles.y.to_radians().sin_cos();
    let (sr, cr) = angles.z.to_radians().sin_cos();

    let forward = DVec3::new(cp * cy, cp * sy, -sp);
    let left = DVec3::new(sr * sp * cy - cr * sy, sr * sp * sy + cr * cy, sr * cp);
    let up = DVec3::new(cr * sp * cy + sr * sy, cr * sp * sy - sr * cy, cr * cp);

    DMat3::from_cols(forward, left, up).as_mat3()
}

/// Recover `(pitch, yaw, roll)` degrees from an orientation.
///
/// Pitch lands in [-90, 90], yaw and roll in (-180, 180]. At gimbal lock yaw
/// is pinned to zero and the whole rotation goes into roll.
pub fn axis_to_angles(axis: Mat3) -> Angles {
    let m = axis.as_dmat3();
    let forward = m.x_axis;
    let left = m.y_axis;
    let up = m.z_axis;

    let xy = forward.x.hypot(forward.y);
    let pitch = (-forward.z).atan2(xy);
    if xy > GIMBAL_EPSILON {
        let yaw = forward.y.atan2(forward.x);
        let roll = left.z.atan2(up.z);
        DVec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
    } else {
        let roll = (-up.y).atan2(left.y);
        DVec3::new(pitch.to_degrees(), 0.0, roll.to_degrees())
    }
}

/// Unit vector pointing along `(pitch, yaw)` degrees.
pub fn angle_vector(pitch: f64, yaw: f64) -> DVec3 {
    let (sp, cp) = pitch.to_radians().sin_cos();
    let (sy, cy) = yaw.to_radians().sin_cos();
    DVec3::new(cp * cy, cp * sy, -sp)
}

/// Inverse of [`angle_vector`]. A zero vector yields `(0, 0)`.
pub fn vector_to_pitch_yaw(v: DVec3) -> (f64, f64) {
    let xy = v.x.hypot(v.y);
    if xy == 0.0 && v.z == 0.0 {
        return (0.0, 0.0);
    }
    let pitch = (-v.z).atan2(xy).to_degrees();
    let yaw = if xy == 0.0 { 0.0 } else { v.y.atan2(v.x).to_degrees() };
    (pitch, yaw)
}

/// Axis-aligned bounds of a point set. Empty input yields zero bounds.
pub fn bounds_of(points: impl IntoIterator<Item = Vec3>) -> (Vec3, Vec3) {
    let mut iter = points.into_iter();
    let Some(first) = iter.next() else {
        return (Vec3::ZERO, Vec3::ZERO);
    };
    iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)))
}

/// Largest distance from `center` to any point.
pub fn radius_about(center: Vec3, points: impl IntoIterator<Item = Vec3>) -> f32 {
    points
        .into_iter()
        .map(|p| p.distance(center))
        .fold(0.0, f32::max)
}

/// Check that an orientation is orthonormal within `eps`.
pub fn is_orthonormal(m: Mat3, eps: f32) -> bool {
    let id = m.transpose() * m;
    id.abs_diff_eq(Mat3::IDENTITY, eps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Angles, b: Angles) -> bool {
        (a - b).abs().max_element() < 1e-6
    }

    #[test]
    fn test_identity_angles() {
        let m = angles_to_axis(DVec3::ZERO);
        assert!(m.abs_diff_eq(Mat3::IDENTITY, 1e-6));
        assert!(close(axis_to_angles(Mat3::IDENTITY), DVec3::ZERO));
    }

    #[test]
    fn test_angles_round_trip() {
        for angles in [
            DVec3::new(10.0, 20.0, 30.0),
            DVec3::new(-45.0, 170.0, -120.0),
            DVec3::new(89.0, -90.0, 5.0),
        ] {
            let m = angles_to_axis(angles);
            assert!(is_orthonormal(m, 1e-5));
            let back = axis_to_angles(m);
            assert!((back - angles).abs().max_element() < 1e-3, "{angles:?} -> {back:?}");
        }
    }

    #[test]
    fn test_gimbal_lock() {
        let m = angles_to_axis(DVec3::new(90.0, 0.0, 30.0));
        let back = axis_to_angles(m);
        let again = angles_to_axis(back);
        assert!(m.abs_diff_eq(again, 1e-5));
    }

    #[test]
    fn test_angle_vector() {
        let v = angle_vector(0.0, 90.0);
        assert!((v - DVec3::Y).length() < 1e-12);
        let (p, y) = vector_to_pitch_yaw(DVec3::new(1.0, 1.0, -1.0));
        let back = angle_vector(p, y);
        assert!((back - DVec3::new(1.0, 1.0, -1.0).normalize()).length() < 1e-12);
        assert_eq!(vector_to_pitch_yaw(DVec3::ZERO), (0.0, 0.0));
    }

    #[test]
    fn test_bounds() {
        let (min, max) = bounds_of([Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 3.0, 4.0)]);
        assert_eq!(min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(max, Vec3::new(1.0, 3.0, 4.0));
        assert_eq!(bounds_of(std::iter::empty()), (Vec3::ZERO, Vec3::ZERO));
        assert_eq!(radius_about(Vec3::ZERO, [Vec3::new(3.0, 4.0, 0.0)]), 5.0);
    }
}
