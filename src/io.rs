//! File-level entry points.
//!
//! Formats are identified by magic first and file extension second. MDM
//! meshes are paired with the `.mdx` file of the same stem when it exists.

use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::{Path, PathBuf};

#[cfg(feature = "mmap")]
use memmap2::Mmap;
use tracing::{debug, warn};

use crate::adapter;
use crate::format::Format;
use crate::model::Model;
use crate::util::{Error, Outcome, Result};

/// Bytes of an input file.
pub struct Input {
    inner: InputInner,
}

enum InputInner {
    /// Memory-mapped file
    #[cfg(feature = "mmap")]
    Mmap(Mmap),
    /// Whole file read into memory
    Owned(Vec<u8>),
}

impl Input {
    /// Open `path`, memory-mapping it when the `mmap` feature is enabled.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let size = file.metadata()?.len();

        #[cfg(feature = "mmap")]
        if size > 0 {
            // Safety: mapped read-only; the file is not modified while mapped
            let mmap = unsafe { Mmap::map(&file) }?;
            return Ok(Self {
                inner: InputInner::Mmap(mmap),
            });
        }

        let mut data = Vec::with_capacity(size as usize);
        file.read_to_end(&mut data)?;
        Ok(Self {
            inner: InputInner::Owned(data),
        })
    }

    /// Wrap bytes already in memory.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            inner: InputInner::Owned(data),
        }
    }
}

impl Deref for Input {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.inner {
            #[cfg(feature = "mmap")]
            InputInner::Mmap(m) => m,
            InputInner::Owned(v) => v,
        }
    }
}

/// Identify the format of `data`, falling back to the extension of `path`.
pub fn detect_format(path: &Path, data: &[u8]) -> Result<Format> {
    Format::sniff(data)
        .or_else(|| Format::from_path(path))
        .ok_or_else(|| Error::UnknownFormat(path.display().to_string()))
}

/// Path of the animation file paired with an MDM mesh.
pub fn sibling_path(path: &Path) -> PathBuf {
    path.with_extension(Format::Mdx.extension())
}

/// Encoded bytes of a model; MDM also yields its MDX.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub data: Vec<u8>,
    pub sibling: Option<Vec<u8>>,
}

/// Decode a buffer of a known format. `sibling` is the MDX paired with an MDM.
pub fn decode_bytes(format: Format, data: &[u8], sibling: Option<&[u8]>) -> Result<Outcome<Model>> {
    match format {
        Format::Md3 => adapter::md3::decode(data),
        Format::Mdc => adapter::mdc::decode(data),
        Format::Mds => adapter::mds::decode(data),
        Format::Mdm => adapter::mdm::decode(data, sibling),
        Format::Mdx => adapter::mdm::decode_mdx(data),
        Format::Tag => adapter::tag::decode(data),
    }
}

/// Encode a model in `format`. Nothing is produced unless every part succeeds.
pub fn encode_bytes(model: &Model, format: Format) -> Result<Encoded> {
    let (data, sibling) = match format {
        Format::Md3 => (adapter::md3::encode(model)?, None),
        Format::Mdc => (adapter::mdc::encode(model)?, None),
        Format::Mds => (adapter::mds::encode(model)?, None),
        Format::Mdm => {
            let (mesh, anim) = adapter::mdm::encode(model)?;
            (mesh, Some(anim))
        }
        Format::Mdx => (adapter::mdm::encode_mdx(model)?, None),
        Format::Tag => (adapter::tag::encode(model)?, None),
    };
    Ok(Encoded { data, sibling })
}

/// Read a model file of any supported format.
pub fn read_model(path: impl AsRef<Path>) -> Result<(Format, Outcome<Model>)> {
    let path = path.as_ref();
    let input = Input::open(path)?;
    let format = detect_format(path, &input)?;
    debug!(path = %path.display(), %format, size = input.len(), "read model");

    let sibling = if format == Format::Mdm {
        let anim = sibling_path(path);
        match Input::open(&anim) {
            Ok(data) => Some(data),
            Err(Error::FileNotFound(_)) => {
                warn!(path = %anim.display(), "no animation file next to mesh; decoding without skeleton");
                None
            }
            Err(e) => return Err(e),
        }
    } else {
        None
    };
    let outcome = decode_bytes(format, &input, sibling.as_deref())?;
    Ok((format, outcome))
}

/// Write a model, encoding it completely before touching the file system.
///
/// Returns every path written; MDM also writes its `.mdx` sibling.
pub fn write_model(model: &Model, path: impl AsRef<Path>, format: Format) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let encoded = encode_bytes(model, format)?;
    std::fs::write(path, &encoded.data)?;
    let mut written = vec![path.to_path_buf()];
    if let Some(anim) = &encoded.sibling {
        let anim_path = sibling_path(path);
        std::fs::write(&anim_path, anim)?;
        written.push(anim_path);
    }
    debug!(path = %path.display(), %format, files = written.len(), "wrote model");
    Ok(written)
}
