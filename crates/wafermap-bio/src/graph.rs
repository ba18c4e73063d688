//! The bio graph: populations plus projections, with validation at ingest.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BioError, Result};
use crate::population::{Population, PopulationId};
use crate::projection::{Projection, ProjectionId};

/// Read-only view of the network to be mapped.
///
/// Construction validates sizes and cross-references once, so that the
/// mapping stages can index without re-checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBioGraph", into = "RawBioGraph")]
pub struct BioGraph {
    populations: Vec<Population>,
    projections: Vec<Projection>,
}

/// Serde surface of [`BioGraph`]; re-validated on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBioGraph {
    populations: Vec<Population>,
    projections: Vec<Projection>,
}

impl TryFrom<RawBioGraph> for BioGraph {
    type Error = BioError;

    fn try_from(raw: RawBioGraph) -> Result<Self> {
        Self::new(raw.populations, raw.projections)
    }
}

impl From<BioGraph> for RawBioGraph {
    fn from(graph: BioGraph) -> Self {
        Self { populations: graph.populations, projections: graph.projections }
    }
}

impl BioGraph {
    /// Build a graph, validating parameter-vector lengths, projection
    /// endpoints and weight-matrix shapes.
    ///
    /// # Errors
    ///
    /// Any inconsistency yields the corresponding [`BioError`].
    pub fn new(populations: Vec<Population>, projections: Vec<Projection>) -> Result<Self> {
        for population in &populations {
            if population.parameters.len() != population.size {
                return Err(BioError::ParameterSizeMismatch {
                    population: population.id,
                    size: population.size,
                    parameters: population.parameters.len(),
                });
            }
        }

        let graph = Self { populations, projections: Vec::new() };
        let mut checked = Vec::new();
        for projection in projections {
            let source = graph.population(projection.source)?;
            let target = graph.population(projection.target)?;
            if target.is_source() {
                return Err(BioError::SourceAsTarget { population: target.id });
            }
            let (rows, cols) = projection.weights.dim();
            if rows != source.size || cols != target.size {
                return Err(BioError::WeightShapeMismatch {
                    rows,
                    cols,
                    expected_rows: source.size,
                    expected_cols: target.size,
                });
            }
            checked.push(projection);
        }

        let graph = Self { projections: checked, ..graph };
        debug!(
            populations = graph.populations.len(),
            projections = graph.projections.len(),
            "bio graph validated"
        );
        Ok(graph)
    }

    /// All populations in id order of insertion.
    #[must_use]
    pub fn populations(&self) -> &[Population] {
        &self.populations
    }

    /// All projections in id order of insertion.
    #[must_use]
    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    /// Look up a population.
    ///
    /// # Errors
    ///
    /// [`BioError::UnknownPopulation`] if the id is not in the graph.
    pub fn population(&self, id: PopulationId) -> Result<&Population> {
        self.populations
            .iter()
            .find(|p| p.id == id)
            .ok_or(BioError::UnknownPopulation { population: id })
    }

    /// Look up a projection by id.
    #[must_use]
    pub fn projection(&self, id: ProjectionId) -> Option<&Projection> {
        self.projections.iter().find(|p| p.id == id)
    }

    /// All projections leaving `source`.
    pub fn projections_from(
        &self,
        source: PopulationId,
    ) -> impl Iterator<Item = &Projection> + '_ {
        self.projections.iter().filter(move |p| p.source == source)
    }

    /// All projections entering `target`.
    pub fn projections_to(&self, target: PopulationId) -> impl Iterator<Item = &Projection> + '_ {
        self.projections.iter().filter(move |p| p.target == target)
    }

    /// All spike-source populations, in insertion order.
    pub fn sources(&self) -> impl Iterator<Item = &Population> + '_ {
        self.populations.iter().filter(|p| p.is_source())
    }

    /// All non-source populations, in insertion order.
    pub fn neuron_populations(&self) -> impl Iterator<Item = &Population> + '_ {
        self.populations.iter().filter(|p| !p.is_source())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::{CellParameters, LifParameters, PoissonSourceParameters, SynapseType};
    use crate::projection::Projection;
    use ndarray::Array2;

    fn lif_population(id: usize, size: usize) -> Population {
        Population {
            id: PopulationId(id),
            size,
            parameters: CellParameters::IfCondExp(vec![LifParameters::default(); size]),
            label: None,
        }
    }

    fn poisson_population(id: usize, size: usize) -> Population {
        Population {
            id: PopulationId(id),
            size,
            parameters: CellParameters::SpikeSourcePoisson(vec![
                PoissonSourceParameters::default();
                size
            ]),
            label: None,
        }
    }

    #[test]
    fn rejects_parameter_length_mismatch() {
        let mut population = lif_population(0, 4);
        population.size = 5;
        assert!(matches!(
            BioGraph::new(vec![population], vec![]),
            Err(BioError::ParameterSizeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_projection_onto_source() {
        let populations = vec![lif_population(0, 2), poisson_population(1, 2)];
        let projection = Projection {
            id: ProjectionId(0),
            source: PopulationId(0),
            target: PopulationId(1),
            target_type: SynapseType::Excitatory,
            weights: Array2::from_elem((2, 2), 1.0),
        };
        assert!(matches!(
            BioGraph::new(populations, vec![projection]),
            Err(BioError::SourceAsTarget { .. })
        ));
    }

    #[test]
    fn rejects_weight_shape_mismatch() {
        let populations = vec![lif_population(0, 2), lif_population(1, 3)];
        let projection = Projection {
            id: ProjectionId(0),
            source: PopulationId(0),
            target: PopulationId(1),
            target_type: SynapseType::Excitatory,
            weights: Array2::from_elem((2, 2), 1.0),
        };
        assert!(matches!(
            BioGraph::new(populations, vec![projection]),
            Err(BioError::WeightShapeMismatch { .. })
        ));
    }

    #[test]
    fn source_and_neuron_partitions() {
        let graph = BioGraph::new(
            vec![lif_population(0, 2), poisson_population(1, 3), lif_population(2, 1)],
            vec![],
        )
        .unwrap();
        assert_eq!(graph.neuron_populations().count(), 2);
        assert_eq!(graph.sources().count(), 1);
    }
}
