//! Error types for the bio graph.

use thiserror::Error;

use crate::cells::CellType;
use crate::population::PopulationId;

/// Result type alias for bio-graph operations.
pub type Result<T> = std::result::Result<T, BioError>;

/// Errors raised while building or querying the bio graph.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BioError {
    /// A parameter query hit a cell type it is not defined for.
    #[error("unsupported cell type: {cell_type}")]
    UnsupportedCellType {
        /// The offending cell type.
        cell_type: CellType,
    },

    /// A neuron index beyond the population size.
    #[error("neuron index {index} out of range for population {population:?} of size {size}")]
    NeuronIndexOutOfRange {
        /// Population that was indexed.
        population: PopulationId,
        /// Offending index.
        index: usize,
        /// Population size.
        size: usize,
    },

    /// Population parameters do not match the declared size.
    #[error("population {population:?} declares {size} neurons but provides {parameters} parameter sets")]
    ParameterSizeMismatch {
        /// Offending population.
        population: PopulationId,
        /// Declared size.
        size: usize,
        /// Number of parameter sets provided.
        parameters: usize,
    },

    /// A projection references a population that does not exist.
    #[error("projection references unknown population {population:?}")]
    UnknownPopulation {
        /// The missing population id.
        population: PopulationId,
    },

    /// A projection weight matrix with the wrong shape.
    #[error("projection weight matrix is {rows}x{cols}, expected {expected_rows}x{expected_cols}")]
    WeightShapeMismatch {
        /// Actual rows.
        rows: usize,
        /// Actual columns.
        cols: usize,
        /// Source population size.
        expected_rows: usize,
        /// Target population size.
        expected_cols: usize,
    },

    /// A projection whose source is not a spike source but targets one.
    #[error("projection targets a spike-source population {population:?}")]
    SourceAsTarget {
        /// The targeted source population.
        population: PopulationId,
    },
}

impl BioError {
    /// Create an unsupported-cell-type error.
    pub fn unsupported(cell_type: CellType) -> Self {
        Self::UnsupportedCellType { cell_type }
    }
}
