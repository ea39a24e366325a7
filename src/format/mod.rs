//! On-disk container formats.
//!
//! Each submodule holds the record graph of one format together with its
//! reader and writer. Readers follow header offsets and accept any section
//! order; writers plan a canonical layout and then emit it.
//!
//! - [`md3`] - full-precision morph-target model
//! - [`mdc`] - delta-compressed morph-target model
//! - [`mds`] - single-file skeletal model
//! - [`mdm`] / [`mdx`] - skeletal mesh and skeletal animation halves
//! - [`tag`] - tag-only container

pub mod md3;
pub mod mdc;
pub mod mdm;
pub mod mds;
pub mod mdx;
pub mod tag;

mod records;
mod skel;

pub use md3::{Md3, Md3Surface};
pub use mdc::{Mdc, MdcSurface, MdcTag};
pub use mdm::{Mdm, MdmTag};
pub use mds::{Mds, MdsTag};
pub use mdx::Mdx;
pub use records::*;
pub use skel::*;

use std::fmt;
use std::path::Path;

/// Length of the common name field.
pub const NAME_LEN: usize = 64;

/// Length of the frame name field of morph-target frames.
pub const FRAME_NAME_LEN: usize = 16;

/// Supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Md3,
    Mdc,
    Mds,
    Mdm,
    Mdx,
    Tag,
}

/// Identification data of one format.
#[derive(Debug, Clone, Copy)]
pub struct FormatInfo {
    pub format: Format,
    pub name: &'static str,
    pub extension: &'static str,
    pub magic: [u8; 4],
    pub version: i32,
    pub header_size: usize,
    pub name_len: usize,
}

/// Every supported format.
pub const FORMATS: [FormatInfo; 6] = [
    FormatInfo {
        format: Format::Md3,
        name: "MD3",
        extension: "md3",
        magic: md3::IDENT,
        version: md3::VERSION,
        header_size: md3::HEADER_SIZE,
        name_len: NAME_LEN,
    },
    FormatInfo {
        format: Format::Mdc,
        name: "MDC",
        extension: "mdc",
        magic: mdc::IDENT,
        version: mdc::VERSION,
        header_size: mdc::HEADER_SIZE,
        name_len: NAME_LEN,
    },
    FormatInfo {
        format: Format::Mds,
        name: "MDS",
        extension: "mds",
        magic: mds::IDENT,
        version: mds::VERSION,
        header_size: mds::HEADER_SIZE,
        name_len: NAME_LEN,
    },
    FormatInfo {
        format: Format::Mdm,
        name: "MDM",
        extension: "mdm",
        magic: mdm::IDENT,
        version: mdm::VERSION,
        header_size: mdm::HEADER_SIZE,
        name_len: NAME_LEN,
    },
    FormatInfo {
        format: Format::Mdx,
        name: "MDX",
        extension: "mdx",
        magic: mdx::IDENT,
        version: mdx::VERSION,
        header_size: mdx::HEADER_SIZE,
        name_len: NAME_LEN,
    },
    FormatInfo {
        format: Format::Tag,
        name: "TAG",
        extension: "tag",
        magic: tag::IDENT,
        version: tag::VERSION,
        header_size: tag::HEADER_SIZE,
        name_len: NAME_LEN,
    },
];

impl Format {
    /// Identification data.
    pub fn info(self) -> &'static FormatInfo {
        // FORMATS is ordered like the enum
        &FORMATS[self as usize]
    }

    pub fn magic(self) -> [u8; 4] {
        self.info().magic
    }

    pub fn version(self) -> i32 {
        self.info().version
    }

    pub fn extension(self) -> &'static str {
        self.info().extension
    }

    /// Look up a format by file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        FORMATS
            .iter()
            .find(|f| f.extension.eq_ignore_ascii_case(ext))
            .map(|f| f.format)
    }

    /// Look up a format by the extension of `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Identify a buffer by its leading magic.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        let magic = data.get(..4)?;
        FORMATS.iter().find(|f| f.magic == magic).map(|f| f.format)
    }

    /// Whether the format carries a skeleton.
    pub fn is_skeletal(self) -> bool {
        matches!(self, Self::Mds | Self::Mdm | Self::Mdx)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_enum() {
        for (i, info) in FORMATS.iter().enumerate() {
            assert_eq!(info.format as usize, i);
            assert_eq!(info.format.info().magic, info.magic);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Format::from_extension("MD3"), Some(Format::Md3));
        assert_eq!(Format::from_path("models/body.mdm"), Some(Format::Mdm));
        assert_eq!(Format::from_path("readme.txt"), None);
        assert_eq!(Format::sniff(b"MDXW\x02\0\0\0"), Some(Format::Mdx));
        assert_eq!(Format::sniff(b"ID"), None);
        assert_eq!(Format::Tag.to_string(), "TAG");
    }
}
