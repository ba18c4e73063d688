//! Biological network description for the wafermap compiler.
//!
//! A read-only view of the network to be mapped: populations of neurons
//! with per-cell parameters, and projections carrying per-synapse weight
//! matrices. The mapping pipeline never mutates this graph; every stage
//! refers into it by `(population id, neuron index)` pairs.
//!
//! Cell-type dispatch is a closed enum with exhaustive matches. Parameter
//! queries that only make sense for a subset of cell types (membrane
//! capacitance of a spike source, say) fail with
//! [`BioError::UnsupportedCellType`] at graph-ingest time rather than
//! deep inside a mapping stage.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod cells;
mod error;
mod graph;
mod population;
mod projection;

pub use cells::{
    AdexParameters, CellParameters, CellType, LifParameters, PoissonSourceParameters,
    SpikeSourceParameters, SynapseType,
};
pub use error::{BioError, Result};
pub use graph::BioGraph;
pub use population::{BioNeuron, Population, PopulationId, PopulationSlice};
pub use projection::{Projection, ProjectionId};
