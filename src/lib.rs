//! # mdconv
//!
//! Reader, writer and converter for the MD3 / MDC / MDS / MDM+MDX / TAG
//! animated model containers.
//!
//! Every format decodes into one interchange [`Model`] and encodes back out
//! of it. Files written by a format's own canonical layout round-trip byte
//! for byte; conversions between formats coerce the model first.
//!
//! ## Modules
//!
//! - [`util`] - Errors, warnings, math helpers
//! - [`codec`] - Offset-driven little-endian record reading and writing
//! - [`quant`] - Location, normal and angle quantization
//! - [`compress`] - MDC base-frame selection and delta vertices
//! - [`format`] - Record graphs of each container with readers and writers
//! - [`lod`] - Progressive-mesh reducer producing collapse maps
//! - [`model`] - Format-neutral interchange model
//! - [`adapter`] - Record graph <-> interchange model per format
//! - [`convert`] - Cross-format coercion
//! - [`io`] - File-level read / write with format detection
//!
//! ## Example
//!
//! ```ignore
//! use mdconv::prelude::*;
//!
//! let (_, outcome) = read_model("models/body.mds")?;
//! let model = convert(&outcome.value, Format::Md3, &ConvertOptions::default())?.value;
//! write_model(&model, "body.md3", Format::Md3)?;
//! ```

pub mod util;
pub mod codec;
pub mod quant;
pub mod compress;
pub mod format;
pub mod lod;
pub mod model;
pub mod adapter;
pub mod convert;
pub mod io;

// Re-export commonly used types
pub use util::{Error, Outcome, Result, Warning};
pub use format::Format;
pub use model::Model;
pub use convert::{convert, ConvertOptions, TagStyle};
pub use io::{read_model, write_model};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Outcome, Result, Warning};
    pub use crate::format::Format;
    pub use crate::model::{Attachment, Lod, Model, Surface, Tag, Vertices};
    pub use crate::convert::{convert, ConvertOptions, TagStyle};
    pub use crate::io::{decode_bytes, encode_bytes, read_model, write_model};
    pub use crate::lod::{CancelToken, ReduceOptions};
}
