//! Error taxonomy of the mapping pipeline.
//!
//! Everything here is fatal for the run except route-construction
//! failures, which the route builder recovers from locally (the affected
//! synapses are counted as loss and the run continues).

use thiserror::Error;

use wafermap_bio::BioError;
use wafermap_hal::CalibrationError;

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, MapperError>;

/// Fatal mapping errors.
#[derive(Debug, Error)]
pub enum MapperError {
    /// A placement stage ran out of hardware.
    #[error("out of resources: {what}")]
    OutOfResources {
        /// What could not be placed.
        what: String,
    },

    /// Calibration could not be resolved or loaded.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    /// A parameter visitor hit a cell type it has no translation for.
    #[error("unsupported cell type: {cell_type}")]
    UnsupportedCellType {
        /// Name of the offending cell type.
        cell_type: String,
    },

    /// Configuration options that contradict each other.
    #[error("inconsistent configuration: {reason}")]
    InconsistentConfig {
        /// What contradicts what.
        reason: String,
    },

    /// The bio graph is malformed.
    #[error("bio graph error: {0}")]
    BioGraph(BioError),

    /// The run was cancelled between stages; partial results are
    /// discarded.
    #[error("mapping cancelled")]
    Cancelled,

    /// Persistence I/O failed.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying error.
        #[from]
        source: std::io::Error,
    },

    /// Results could not be encoded or decoded.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Encoder/decoder diagnostic.
        reason: String,
    },
}

impl MapperError {
    /// Create an out-of-resources error.
    pub fn out_of_resources(what: impl Into<String>) -> Self {
        Self::OutOfResources { what: what.into() }
    }

    /// Create an inconsistent-configuration error.
    pub fn inconsistent_config(reason: impl Into<String>) -> Self {
        Self::InconsistentConfig { reason: reason.into() }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization { reason: reason.into() }
    }
}

impl From<BioError> for MapperError {
    fn from(error: BioError) -> Self {
        match error {
            BioError::UnsupportedCellType { cell_type } => {
                Self::UnsupportedCellType { cell_type: cell_type.to_string() }
            }
            other => Self::BioGraph(other),
        }
    }
}
