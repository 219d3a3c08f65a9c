//! Error types of the clip pipeline.

use std::path::PathBuf;
use tch::TchError;
use thiserror::Error;

pub type Result<T, E = DatasetError> = std::result::Result<T, E>;

/// Errors raised while building or reading a clip dataset.
///
/// None of them is recovered internally. A failed lookup is reported to the
/// caller, which decides whether to skip the clip or abort the run.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A manifest row does not have the expected shape.
    #[error("malformed manifest '{}' at line {line}: {reason}", path.display())]
    MalformedManifest {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("manifest '{}' does not contain any clip", path.display())]
    EmptyCatalog { path: PathBuf },

    #[error("manifest '{}' not found", path.display())]
    ManifestNotFound { path: PathBuf },

    /// An expected frame file is missing. Missing files are never retried.
    #[error("frame file '{}' not found", path.display())]
    FrameNotFound { path: PathBuf },

    /// Reading the bytes of an existing frame failed. Transient I/O errors
    /// are retried before this is raised.
    #[error("unable to read frame '{}' after {attempts} attempt(s)", path.display())]
    FrameRead {
        path: PathBuf,
        attempts: usize,
        #[source]
        source: std::io::Error,
    },

    /// The frame bytes are not a decodable image. Decoding is attempted once.
    #[error("unable to decode frame '{}' after {attempts} attempt(s)", path.display())]
    FrameDecode {
        path: PathBuf,
        attempts: usize,
        #[source]
        source: TchError,
    },

    #[error("invalid frame '{}': {reason}", path.display())]
    InvalidFrame { path: PathBuf, reason: String },

    #[error("spatial index must be one of -1, 0, 1 or 2, but get {0}")]
    InvalidSpatialIndex(i64),

    #[error("unsupported mode '{0}', expect train, val or test")]
    UnsupportedMode(String),

    #[error("invalid sampling parameters: {0}")]
    InvalidSamplingSpec(String),

    #[error("cannot crop {crop}x{crop} from a {height}x{width} frame")]
    CropOutOfBounds { crop: i64, height: i64, width: i64 },

    #[error("index {index} is out of range for a dataset of {len} clips")]
    InvalidIndex { index: usize, len: usize },

    #[error("label {label} is out of range for a vocabulary of {num_classes} classes")]
    LabelOutOfRange { label: usize, num_classes: usize },

    #[error("no frame found under '{}'", path.display())]
    NoFrames { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json5(#[from] json5::Error),

    #[error(transparent)]
    Tch(#[from] TchError),
}
