//! The 256-entry table of quantized normal directions.
//!
//! Built once from 15 latitude bands of 12 degrees each. Longitude sample
//! counts follow the circumference at each band's latitude, so the directions
//! are roughly evenly spread over the sphere.

use std::sync::OnceLock;

use crate::util::Vec3;

/// Number of table entries; indices fit one byte.
pub const NUM_NORMALS: usize = 256;

/// Longitude samples per band, north pole to south pole.
const BAND_SIZES: [usize; 15] = [3, 8, 13, 18, 22, 24, 26, 28, 26, 24, 22, 18, 13, 8, 3];

/// Degrees of latitude covered by each band.
const BAND_DEGREES: f64 = 180.0 / BAND_SIZES.len() as f64;

/// One latitude band of the table.
#[derive(Debug, Clone, Copy)]
pub struct Band {
    /// Representative z-component shared by every entry in the band.
    pub z: f32,
    /// First table index of the band.
    pub start: usize,
    /// Number of entries.
    pub len: usize,
}

/// Immutable normal table with its band index.
#[derive(Debug)]
pub struct NormalTable {
    normals: [Vec3; NUM_NORMALS],
    bands: Vec<Band>,
}

impl NormalTable {
    fn build() -> Self {
        let mut normals = [Vec3::ZERO; NUM_NORMALS];
        let mut bands = Vec::with_capacity(BAND_SIZES.len());
        let mut next = 0;
        for (i, &len) in BAND_SIZES.iter().enumerate() {
            let lat = ((i as f64 + 0.5) * BAND_DEGREES).to_radians();
            let (slat, clat) = lat.sin_cos();
            for j in 0..len {
                let lon = (j as f64 * 360.0 / len as f64).to_radians();
                let (slon, clon) = lon.sin_cos();
                normals[next + j] = Vec3::new((slat * clon) as f32, (slat * slon) as f32, clat as f32);
            }
            bands.push(Band {
                z: clat as f32,
                start: next,
                len,
            });
            next += len;
        }
        debug_assert_eq!(next, NUM_NORMALS);
        Self { normals, bands }
    }

    /// Direction stored at `index`.
    #[inline]
    pub fn get(&self, index: u8) -> Vec3 {
        self.normals[index as usize]
    }

    /// All entries.
    pub fn normals(&self) -> &[Vec3; NUM_NORMALS] {
        &self.normals
    }

    /// Band layout, north to south.
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Index of the entry closest to `normal`.
    ///
    /// Picks the band whose z is nearest first, then searches that band by
    /// dot product.
    pub fn nearest(&self, normal: Vec3) -> u8 {
        let n = normal.normalize_or_zero();
        let band = self
            .bands
            .iter()
            .min_by(|a, b| (a.z - n.z).abs().total_cmp(&(b.z - n.z).abs()))
            .copied()
            .unwrap_or(Band { z: 0.0, start: 0, len: NUM_NORMALS });

        let mut best = band.start;
        let mut best_dot = f32::NEG_INFINITY;
        for i in band.start..band.start + band.len {
            let dot = self.normals[i].dot(n);
            if dot > best_dot {
                best_dot = dot;
                best = i;
            }
        }
        best as u8
    }
}

/// Shared table, built on first use.
pub fn table() -> &'static NormalTable {
    static TABLE: OnceLock<NormalTable> = OnceLock::new();
    TABLE.get_or_init(NormalTable::build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_size_and_unit_length() {
        let t = table();
        assert_eq!(BAND_SIZES.iter().sum::<usize>(), NUM_NORMALS);
        assert_eq!(t.normals().len(), 256);
        for n in t.normals() {
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_bands_shrink_toward_poles() {
        let mid = BAND_SIZES.len() / 2;
        for i in 0..mid {
            assert!(BAND_SIZES[i] < BAND_SIZES[i + 1]);
            assert!(BAND_SIZES[BAND_SIZES.len() - 1 - i] < BAND_SIZES[BAND_SIZES.len() - 2 - i]);
        }
    }

    #[test]
    fn test_entries_map_to_themselves() {
        let t = table();
        for i in 0..NUM_NORMALS {
            assert_eq!(t.nearest(t.get(i as u8)) as usize, i);
        }
    }

    #[test]
    fn test_nearest_is_close() {
        let t = table();
        for n in [Vec3::Z, -Vec3::Z, Vec3::X, Vec3::new(0.2, 0.7, -0.4).normalize()] {
            let q = t.get(t.nearest(n));
            assert!(q.dot(n) > 0.95, "{n:?} -> {q:?}");
        }
    }

    #[test]
    fn test_table_is_shared() {
        assert!(std::ptr::eq(table(), table()));
    }
}
