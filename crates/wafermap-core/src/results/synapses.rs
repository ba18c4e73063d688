//! Synapse routing records: drivers, rows and individual synapses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wafermap_bio::{BioNeuron, ProjectionId, SynapseType};
use wafermap_chip::{
    ChipOnWafer, DenmemOnChip, Side, SynapseDriverOnChip, SynapseRowOnChip, VLine,
    SYNAPSE_COLUMNS_PER_ROW,
};

/// The biological origin of one hardware synapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynapseSource {
    /// The projection the synapse realises.
    pub projection: ProjectionId,
    /// Presynaptic neuron.
    pub source: BioNeuron,
    /// Postsynaptic neuron.
    pub target: BioNeuron,
}

/// Synapses of one row; at most one source per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynapseRowResult {
    /// The synaptic input class this row drives.
    pub input: SynapseType,
    /// One entry per synapse column.
    pub columns: Vec<Option<SynapseSource>>,
}

impl SynapseRowResult {
    /// An empty row for `input`.
    #[must_use]
    pub fn new(input: SynapseType) -> Self {
        Self { input, columns: vec![None; SYNAPSE_COLUMNS_PER_ROW as usize] }
    }

    /// Number of occupied columns.
    #[must_use]
    pub fn synapse_count(&self) -> usize {
        self.columns.iter().flatten().count()
    }
}

/// Everything assigned to one synapse driver (and its chained neighbours).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverResult {
    /// The primary driver, connected to the switch.
    pub driver: SynapseDriverOnChip,
    /// The vertical bus feeding it.
    pub vline: VLine,
    /// Chained drivers (excluding the primary), in allocation order.
    pub chain: Vec<SynapseDriverOnChip>,
    /// Row assignments across the whole chain.
    #[serde(with = "crate::util::map_as_pairs")]
    pub rows: BTreeMap<SynapseRowOnChip, SynapseRowResult>,
}

impl DriverResult {
    /// A fresh result for a driver fed by `vline`.
    #[must_use]
    pub fn new(driver: SynapseDriverOnChip, vline: VLine) -> Self {
        Self { driver, vline, chain: Vec::new(), rows: BTreeMap::new() }
    }

    /// All drivers of the chain including the primary.
    pub fn drivers(&self) -> impl Iterator<Item = SynapseDriverOnChip> + '_ {
        std::iter::once(self.driver).chain(self.chain.iter().copied())
    }

    /// Total synapses over all rows.
    #[must_use]
    pub fn synapse_count(&self) -> usize {
        self.rows.values().map(SynapseRowResult::synapse_count).sum()
    }
}

/// The synapse-input class seen by each denmem column side.
///
/// Each denmem has a left and a right synaptic input; the mapping decides
/// which input class (excitatory/inhibitory) each one carries, uniformly
/// across a logical neuron.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynapseTargetMapping {
    #[serde(with = "crate::util::map_as_pairs")]
    map: BTreeMap<DenmemOnChip, [Option<SynapseType>; 2]>,
}

impl SynapseTargetMapping {
    /// Record the mapping for one denmem side.
    pub fn set(&mut self, denmem: DenmemOnChip, side: Side, target: SynapseType) {
        self.map.entry(denmem).or_default()[side_index(side)] = Some(target);
    }

    /// The input class on one denmem side, if assigned.
    #[must_use]
    pub fn get(&self, denmem: DenmemOnChip, side: Side) -> Option<SynapseType> {
        self.map.get(&denmem).and_then(|sides| sides[side_index(side)])
    }

    /// Whether any mapping was recorded for `denmem`.
    #[must_use]
    pub fn contains(&self, denmem: DenmemOnChip) -> bool {
        self.map.contains_key(&denmem)
    }
}

const fn side_index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

/// Synapse routing of one chip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChipSynapseRouting {
    /// Driver assignments, in allocation order.
    pub drivers: Vec<DriverResult>,
    /// Input-class mapping of the chip's denmems.
    pub target_mapping: SynapseTargetMapping,
}

/// Synapse routing of the whole wafer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynapseRouting {
    #[serde(with = "crate::util::map_as_pairs")]
    chips: BTreeMap<ChipOnWafer, ChipSynapseRouting>,
}

impl SynapseRouting {
    /// Records of one chip, created on first access.
    pub fn chip_mut(&mut self, chip: ChipOnWafer) -> &mut ChipSynapseRouting {
        self.chips.entry(chip).or_default()
    }

    /// Records of one chip.
    #[must_use]
    pub fn chip(&self, chip: ChipOnWafer) -> Option<&ChipSynapseRouting> {
        self.chips.get(&chip)
    }

    /// All per-chip records in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (&ChipOnWafer, &ChipSynapseRouting)> + '_ {
        self.chips.iter()
    }

    /// Total synapses realised on the wafer.
    #[must_use]
    pub fn synapse_count(&self) -> usize {
        self.chips
            .values()
            .map(|chip| chip.drivers.iter().map(DriverResult::synapse_count).sum::<usize>())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wafermap_bio::PopulationId;
    use wafermap_chip::RowOnChip;

    #[test]
    fn row_counts_synapses() {
        let mut row = SynapseRowResult::new(SynapseType::Excitatory);
        assert_eq!(row.columns.len(), 256);
        row.columns[3] = Some(SynapseSource {
            projection: ProjectionId(0),
            source: BioNeuron::new(PopulationId(0), 0),
            target: BioNeuron::new(PopulationId(1), 0),
        });
        assert_eq!(row.synapse_count(), 1);
    }

    #[test]
    fn driver_chain_iterates_primary_first() {
        let driver = SynapseDriverOnChip::new(Side::Left, 2);
        let mut result = DriverResult::new(driver, VLine::new(2));
        result.chain.push(SynapseDriverOnChip::new(Side::Left, 4));
        let drivers: Vec<_> = result.drivers().collect();
        assert_eq!(drivers.len(), 2);
        assert_eq!(drivers[0], driver);
    }

    #[test]
    fn target_mapping_sides_are_independent() {
        let mut mapping = SynapseTargetMapping::default();
        let denmem = DenmemOnChip::new(0, RowOnChip::Top);
        mapping.set(denmem, Side::Left, SynapseType::Excitatory);
        mapping.set(denmem, Side::Right, SynapseType::Inhibitory);
        assert_eq!(mapping.get(denmem, Side::Left), Some(SynapseType::Excitatory));
        assert_eq!(mapping.get(denmem, Side::Right), Some(SynapseType::Inhibitory));
        assert_eq!(mapping.get(DenmemOnChip::new(1, RowOnChip::Top), Side::Left), None);
    }
}
