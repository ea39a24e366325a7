//! Quantization between model-space floats and their on-disk encodings.
//!
//! - Locations: `i16` multiples of [`XYZ_SCALE`]
//! - Normals: latitude/longitude byte pair
//! - Skeletal angles: wrapping `i16` fractions of a full turn
//! - Compressed tag angles: `i16` multiples of [`TAG_ANGLE_SCALE`]
//! - [`anorms`]: the 256-direction table used by compressed vertices

pub mod anorms;

use std::f64::consts::PI;

use crate::util::{Error, Result, Vec3};

/// Model units per stored location step.
pub const XYZ_SCALE: f32 = 1.0 / 64.0;

/// Degrees per stored compressed-tag angle step.
pub const TAG_ANGLE_SCALE: f64 = 360.0 / 32700.0;

/// Latitude radians per byte step, [0, 180] degrees over 0..=255.
const LAT_STEP: f64 = PI / 255.0;

/// Longitude radians per byte step, [0, 360) degrees over 0..256.
const LON_STEP: f64 = 2.0 * PI / 256.0;

/// Decode a stored location.
#[inline]
pub fn decode_location(v: [i16; 3]) -> Vec3 {
    Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32) * XYZ_SCALE
}

/// Encode a location, failing if any axis leaves the `i16` range.
pub fn encode_location(v: Vec3) -> Result<[i16; 3]> {
    let q = |x: f32| -> Result<i16> {
        let scaled = (x / XYZ_SCALE).round();
        if !(i16::MIN as f32..=i16::MAX as f32).contains(&scaled) {
            return Err(Error::OutOfRange {
                what: "vertex location",
                value: x as f64,
            });
        }
        Ok(scaled as i16)
    };
    Ok([q(v.x)?, q(v.y)?, q(v.z)?])
}

/// Decode a packed normal: low byte latitude, high byte longitude.
///
/// The up axis is tilted by latitude and then swung around by longitude.
pub fn decode_normal(packed: u16) -> Vec3 {
    let lat = (packed & 0xFF) as f64 * LAT_STEP;
    let lon = (packed >> 8) as f64 * LON_STEP;
    let (slat, clat) = lat.sin_cos();
    // sin(lat) is non-negative on [0, pi]; rounding at byte 255 must not flip it
    let slat = slat.abs();
    let (slon, clon) = lon.sin_cos();
    Vec3::new((slat * clon) as f32, (slat * slon) as f32, clat as f32)
}

/// Encode a normal to the nearest latitude/longitude pair.
///
/// Exact poles get longitude zero.
pub fn encode_normal(n: Vec3) -> u16 {
    let n = n.as_dvec3();
    let len = n.length();
    if len == 0.0 {
        return 0;
    }
    let n = n / len;
    let lat = n.z.clamp(-1.0, 1.0).acos();
    let lon = if n.x == 0.0 && n.y == 0.0 {
        0.0
    } else {
        n.y.atan2(n.x).rem_euclid(2.0 * PI)
    };
    let lat_byte = (lat / LAT_STEP).round().clamp(0.0, 255.0) as u16;
    let lon_byte = ((lon / LON_STEP).round() as u32 % 256) as u16;
    lat_byte | (lon_byte << 8)
}

/// Degrees of a wrapping skeletal angle.
#[inline]
pub fn short_to_angle(s: i16) -> f64 {
    s as f64 * (360.0 / 65536.0)
}

/// Wrapping skeletal angle of `degrees`.
#[inline]
pub fn angle_to_short(degrees: f64) -> i16 {
    let steps = (degrees * (65536.0 / 360.0)).round() as i64;
    (steps & 0xFFFF) as u16 as i16
}

/// Degrees of a compressed tag angle.
#[inline]
pub fn decode_tag_angle(s: i16) -> f64 {
    s as f64 * TAG_ANGLE_SCALE
}

/// Compressed tag angle of `degrees`, which must lie within about ±360.
pub fn encode_tag_angle(degrees: f64) -> Result<i16> {
    let steps = (degrees / TAG_ANGLE_SCALE).round();
    if !(i16::MIN as f64..=i16::MAX as f64).contains(&steps) {
        return Err(Error::OutOfRange {
            what: "tag angle",
            value: degrees,
        });
    }
    Ok(steps as i16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_exact() {
        for raw in [[0, 0, 0], [1, -1, 64], [i16::MAX, i16::MIN, 1234]] {
            assert_eq!(encode_location(decode_location(raw)).unwrap(), raw);
        }
        let v = Vec3::new(1.01, -2.5, 0.0);
        let back = decode_location(encode_location(v).unwrap());
        assert!((back - v).abs().max_element() <= XYZ_SCALE / 2.0);
    }

    #[test]
    fn test_location_out_of_range() {
        assert!(matches!(
            encode_location(Vec3::new(600.0, 0.0, 0.0)),
            Err(Error::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_normal_bytes_round_trip() {
        for lat in 0..=255u16 {
            for lon in (0..256u16).step_by(7) {
                let packed = if lat == 0 { 0 } else { lat | (lon << 8) };
                let n = decode_normal(packed);
                assert!((n.length() - 1.0).abs() < 1e-5);
                assert_eq!(encode_normal(n), packed, "lat {lat} lon {lon}");
            }
        }
    }

    #[test]
    fn test_normal_quantization_bound() {
        let n = Vec3::new(0.3, -0.5, 0.8).normalize();
        let back = decode_normal(encode_normal(n));
        assert!(n.angle_between(back) < 0.03);
        assert_eq!(decode_normal(encode_normal(Vec3::Z)), Vec3::Z);
        assert!((decode_normal(encode_normal(-Vec3::Z)) + Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_skeletal_angle_wraps() {
        assert_eq!(angle_to_short(180.0), i16::MIN);
        assert_eq!(angle_to_short(-90.0), -16384);
        for s in [i16::MIN, -1, 0, 1, 12345, i16::MAX] {
            assert_eq!(angle_to_short(short_to_angle(s)), s);
        }
    }

    #[test]
    fn test_tag_angle() {
        assert_eq!(encode_tag_angle(decode_tag_angle(-16350)).unwrap(), -16350);
        assert!(encode_tag_angle(400.0).is_err());
    }
}
