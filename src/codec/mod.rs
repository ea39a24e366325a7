//! Primitive field codec shared by every container format.
//!
//! All formats follow the same idiom: a fixed-size header carrying counts and
//! byte offsets to arrays of fixed-size records. [`FieldReader`] walks those
//! arrays with bounds checks, [`FieldWriter`] emits them, and [`Allocator`]
//! plans offsets before any byte is written.

mod field;
mod record;

pub use field::*;
pub use record::*;
