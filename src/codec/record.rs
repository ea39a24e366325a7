//! Fixed-size records, offset resolution and layout planning.

use tracing::trace;

use super::{FieldReader, FieldWriter};
use crate::util::{Error, Result};

/// A fixed-size on-disk record.
pub trait Record: Sized {
    /// Name used in error reports.
    const KIND: &'static str;
    /// Encoded size in bytes.
    const SIZE: usize;

    fn read(r: &mut FieldReader<'_>) -> Result<Self>;
    fn write(&self, w: &mut FieldWriter) -> Result<()>;
}

/// Fail unless `count` records of `size` bytes fit at `start`.
pub fn check_span(data: &[u8], kind: &'static str, start: u64, count: usize, size: usize) -> Result<()> {
    let bytes = (count as u64).checked_mul(size as u64);
    let end = bytes.and_then(|b| b.checked_add(start));
    match end {
        Some(end) if end <= data.len() as u64 => Ok(()),
        _ => Err(Error::Truncated {
            kind,
            offset: start,
            needed: end.unwrap_or(u64::MAX),
            len: data.len() as u64,
        }),
    }
}

/// Read `count` consecutive records starting at absolute `start`.
pub fn read_array<T: Record>(data: &[u8], start: u64, count: usize) -> Result<Vec<T>> {
    check_span(data, T::KIND, start, count, T::SIZE)?;
    trace!(kind = T::KIND, start, count, "read array");
    let mut r = FieldReader::new(data, start, T::KIND);
    (0..count).map(|_| T::read(&mut r)).collect()
}

/// Write records back to back.
pub fn write_array<T: Record>(w: &mut FieldWriter, items: &[T]) -> Result<()> {
    items.iter().try_for_each(|item| item.write(w))
}

/// Resolve `base + offset` against the buffer.
///
/// `field_pos` is where the offset field itself was read, for error reports.
pub fn resolve(data: &[u8], kind: &'static str, field_pos: u64, base: u64, offset: i64) -> Result<u64> {
    let target = base as i64 + offset;
    if target < 0 || target as u64 > data.len() as u64 {
        return Err(Error::BadOffset {
            kind,
            offset: field_pos,
            value: offset,
        });
    }
    Ok(target as u64)
}

/// Fail unless `index` addresses one of `count` items.
pub fn check_index(kind: &'static str, offset: u64, index: i64, count: usize) -> Result<usize> {
    if index < 0 || index as u64 >= count as u64 {
        return Err(Error::BadIndex {
            kind,
            offset,
            index,
            count,
        });
    }
    Ok(index as usize)
}

/// Convert an in-memory size or offset to its 32-bit field.
pub fn to_field(value: u64, what: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::OutOfRange {
        what,
        value: value as f64,
    })
}

/// Convert a count to a signed 32-bit field.
pub fn to_i32(value: usize, what: &'static str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::OutOfRange {
        what,
        value: value as f64,
    })
}

/// Sequential byte allocator for the sizing pass of a writer.
///
/// The offsets it hands out form the layout plan; emission then only has to
/// follow them.
#[derive(Debug, Default, Clone, Copy)]
pub struct Allocator {
    next: u64,
}

impl Allocator {
    /// Allocator starting at `start`.
    pub fn at(start: u64) -> Self {
        Self { next: start }
    }

    /// Reserve `bytes` and return where they start.
    pub fn alloc(&mut self, bytes: usize) -> u64 {
        let at = self.next;
        self.next += bytes as u64;
        at
    }

    /// Reserve `count` records of type `T`.
    pub fn alloc_array<T: Record>(&mut self, count: usize) -> u64 {
        self.alloc(count * T::SIZE)
    }

    /// First unreserved byte.
    pub fn end(&self) -> u64 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pair(u16, u16);

    impl Record for Pair {
        const KIND: &'static str = "pair";
        const SIZE: usize = 4;

        fn read(r: &mut FieldReader<'_>) -> Result<Self> {
            Ok(Pair(r.u16()?, r.u16()?))
        }

        fn write(&self, w: &mut FieldWriter) -> Result<()> {
            w.u16(self.0)?;
            w.u16(self.1)
        }
    }

    #[test]
    fn test_array_stride() {
        let mut w = FieldWriter::default();
        w.u32(0).unwrap();
        write_array(&mut w, &[Pair(1, 2), Pair(3, 4)]).unwrap();
        let data = w.into_inner();
        let pairs: Vec<Pair> = read_array(&data, 4, 2).unwrap();
        assert_eq!(pairs, vec![Pair(1, 2), Pair(3, 4)]);
    }

    #[test]
    fn test_span_overflow_is_structural() {
        let data = [0u8; 12];
        let err = read_array::<Pair>(&data, 4, 3).unwrap_err();
        assert!(matches!(err, Error::Truncated { kind: "pair", offset: 4, .. }));
        assert!(check_span(&data, "pair", 0, usize::MAX, 4).is_err());
    }

    #[test]
    fn test_resolve_and_index() {
        let data = [0u8; 16];
        assert_eq!(resolve(&data, "x", 0, 8, -8).unwrap(), 0);
        assert!(resolve(&data, "x", 0, 8, -9).is_err());
        assert!(resolve(&data, "x", 0, 8, 9).is_err());
        assert_eq!(check_index("t", 0, 2, 3).unwrap(), 2);
        assert!(check_index("t", 0, 3, 3).is_err());
        assert!(check_index("t", 0, -1, 3).is_err());
    }

    #[test]
    fn test_allocator() {
        let mut a = Allocator::at(108);
        assert_eq!(a.alloc_array::<Pair>(3), 108);
        assert_eq!(a.alloc(10), 120);
        assert_eq!(a.end(), 130);
    }
}
