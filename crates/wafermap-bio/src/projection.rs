//! Projections between populations.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::cells::SynapseType;
use crate::population::PopulationId;

/// Identifier of a projection within the bio graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectionId(pub usize);

/// A bundle of synapses from every cell of one population to cells of
/// another.
///
/// Connectivity is carried as a dense weight matrix indexed
/// `[source index, target index]`; entries that are zero, negative or
/// non-finite mean "no synapse". Weights are conductances in µS of
/// biological scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Stable identifier, unique within the graph.
    pub id: ProjectionId,
    /// Source population (rows of the weight matrix).
    pub source: PopulationId,
    /// Target population (columns of the weight matrix).
    pub target: PopulationId,
    /// Which synaptic input of the target cells this projection drives.
    pub target_type: SynapseType,
    /// Dense weight matrix, `source.size × target.size`.
    pub weights: Array2<f64>,
}

impl Projection {
    /// Weight of the synapse from `source_index` to `target_index`, if one
    /// exists.
    #[must_use]
    pub fn weight(&self, source_index: usize, target_index: usize) -> Option<f64> {
        let w = *self.weights.get((source_index, target_index))?;
        (w.is_finite() && w > 0.0).then_some(w)
    }

    /// Iterate over all realised synapses as
    /// `(source index, target index, weight)`.
    pub fn synapses(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.weights.indexed_iter().filter_map(|((src, tgt), &w)| {
            (w.is_finite() && w > 0.0).then_some((src, tgt, w))
        })
    }

    /// Number of realised synapses.
    #[must_use]
    pub fn synapse_count(&self) -> usize {
        self.synapses().count()
    }

    /// An all-to-all projection with a uniform weight.
    #[must_use]
    pub fn all_to_all(
        id: ProjectionId,
        source: PopulationId,
        target: PopulationId,
        target_type: SynapseType,
        source_size: usize,
        target_size: usize,
        weight: f64,
    ) -> Self {
        Self {
            id,
            source,
            target,
            target_type,
            weights: Array2::from_elem((source_size, target_size), weight),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_nan_weights_are_absent_synapses() {
        let mut weights = Array2::from_elem((2, 2), 1.0);
        weights[(0, 1)] = 0.0;
        weights[(1, 0)] = f64::NAN;
        let projection = Projection {
            id: ProjectionId(0),
            source: PopulationId(0),
            target: PopulationId(1),
            target_type: SynapseType::Excitatory,
            weights,
        };
        assert_eq!(projection.synapse_count(), 2);
        assert_eq!(projection.weight(0, 0), Some(1.0));
        assert_eq!(projection.weight(0, 1), None);
        assert_eq!(projection.weight(1, 0), None);
        assert_eq!(projection.weight(5, 5), None);
    }
}
