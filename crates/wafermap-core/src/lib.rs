//! The wafermap mapping pipeline.
//!
//! Lowers a biological network description onto the wafer-scale analog
//! neuromorphic substrate. Given a [`wafermap_bio::BioGraph`], a
//! resource manifest and a [`config::MapperConfig`], the pipeline
//! decides neuron placement, merger routing and address assignment,
//! input placement, L1 routing, synapse allocation, and parameter
//! translation, producing a persistable [`results::Results`] container
//! plus the register image of the wafer.
//!
//! # Example
//!
//! ```no_run
//! use wafermap_core::config::MapperConfig;
//! use wafermap_core::pipeline::Mapper;
//! use wafermap_bio::BioGraph;
//! use wafermap_hal::ResourceManifest;
//! use wafermap_chip::Wafer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = BioGraph::new(vec![], vec![])?;
//! let manifest = ResourceManifest::full_wafer(Wafer(0));
//! let config = MapperConfig::default();
//!
//! let mapping = Mapper::new(&config, &graph, &manifest).run()?;
//! mapping.results.save("results.bin.gz")?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod parameter;
pub mod pipeline;
pub mod placement;
pub mod results;
pub mod routing;
mod util;

pub use config::MapperConfig;
pub use error::{MapperError, Result};
pub use pipeline::{Mapper, Mapping, MappingStats};
pub use results::Results;

/// Commonly used types.
pub mod prelude {
    pub use crate::config::MapperConfig;
    pub use crate::error::{MapperError, Result};
    pub use crate::pipeline::{Mapper, Mapping, MappingStats};
    pub use crate::results::{LogicalNeuron, Placement, Results};
}
