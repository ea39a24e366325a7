//! Non-fatal diagnostics collected during decoding and conversion.

use thiserror::Error;

/// A semantic problem that was repaired with a default.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Warning {
    /// Vertex weights did not sum to one and were renormalized
    #[error("surface {surface:?} vertex {vertex}: weights sum to {sum}, renormalized")]
    WeightSum {
        surface: String,
        vertex: usize,
        sum: f32,
    },

    /// Vertex weights summed to zero and could not be renormalized
    #[error("surface {surface:?} vertex {vertex}: weights sum to zero")]
    ZeroWeights { surface: String, vertex: usize },

    /// A bone property was missing and defaulted to zero
    #[error("bone {bone:?}: missing {property}, defaulted to zero")]
    BoneDefaulted {
        bone: String,
        property: &'static str,
    },

    /// Tag name does not follow the `tag_` convention
    #[error("tag {name:?} does not start with \"tag_\"")]
    TagName { name: String },

    /// Surface identifier differs from the file identifier
    #[error("surface {surface:?} has identifier {found:?}, expected {expected:?}")]
    SurfaceIdent {
        surface: String,
        expected: [u8; 4],
        found: [u8; 4],
    },

    /// Tag offset could not be represented and was dropped
    #[error("tag {name:?}: bone offset dropped")]
    TagOffsetDropped { name: String },

    /// Tag orientation at the bind frame is not a rotation
    #[error("tag {name:?}: orientation is not orthonormal at the bind frame, offset is approximate")]
    TagSkewed { name: String },

    /// LOD data could not be represented and was dropped
    #[error("LOD data dropped: {0}")]
    LodDropped(&'static str),

    /// Skeleton has fewer poses than the model has frames
    #[error("bone {bone:?}: no pose for frame {frame}, using identity")]
    MissingPose { bone: String, frame: usize },
}

/// Collects warnings and mirrors them to the log.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn push(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Append warnings collected elsewhere without logging them again.
    pub fn extend(&mut self, warnings: Vec<Warning>) {
        self.warnings.extend(warnings);
    }

    /// Number of warnings so far.
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Check if no warnings were collected.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Wrap a value together with the collected warnings.
    pub fn finish<T>(self, value: T) -> Outcome<T> {
        Outcome {
            value,
            warnings: self.warnings,
        }
    }
}

/// A successful result plus the warnings raised while producing it.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    /// Result without warnings.
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    /// Discard the warnings.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Transform the value, keeping the warnings.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}
