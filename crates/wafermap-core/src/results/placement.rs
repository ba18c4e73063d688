//! Placement records: which hardware implements which biological neuron.

use serde::{Deserialize, Serialize};

use wafermap_bio::{BioNeuron, PopulationId};
use wafermap_chip::{
    ChipOnWafer, DenmemOnBlock, DenmemOnChip, DenmemOnWafer, DncMergerOnWafer, L1Address,
    NeuronBlockOnWafer, RowOnChip,
};

/// A global L1 address: chip, DNC merger and 6-bit event address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct L1AddressOnWafer {
    /// The merger the events leave through.
    pub merger: DncMergerOnWafer,
    /// The event address.
    pub address: L1Address,
}

/// The hardware realisation of one biological neuron.
///
/// External sources never occupy denmems; placed neurons occupy a
/// rectangle of denmem columns (both rows) on a single neuron block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogicalNeuron {
    /// An external spike source cell.
    External {
        /// Source population.
        source: PopulationId,
        /// Cell index within the population.
        neuron_index: usize,
    },
    /// A rectangle of denmems on one neuron block.
    OnChip {
        /// The neuron block.
        block: NeuronBlockOnWafer,
        /// First occupied column within the block.
        x_offset: u8,
        /// Number of occupied columns; the denmem count is twice this.
        width: u8,
    },
}

impl LogicalNeuron {
    /// Create an external descriptor.
    #[must_use]
    pub const fn external(source: PopulationId, neuron_index: usize) -> Self {
        Self::External { source, neuron_index }
    }

    /// Create an on-chip rectangle.
    #[must_use]
    pub const fn on_chip(block: NeuronBlockOnWafer, x_offset: u8, width: u8) -> Self {
        Self::OnChip { block, x_offset, width }
    }

    /// Whether this is an external source.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }

    /// Number of denmems; zero for external sources.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::External { .. } => 0,
            Self::OnChip { width, .. } => 2 * usize::from(*width),
        }
    }

    /// The chip holding this neuron, if on-chip.
    #[must_use]
    pub fn chip(&self) -> Option<ChipOnWafer> {
        match self {
            Self::External { .. } => None,
            Self::OnChip { block, .. } => Some(block.chip),
        }
    }

    /// The neuron block, if on-chip.
    #[must_use]
    pub fn block(&self) -> Option<NeuronBlockOnWafer> {
        match self {
            Self::External { .. } => None,
            Self::OnChip { block, .. } => Some(*block),
        }
    }

    /// The top-left denmem; digital neuron configuration goes there.
    #[must_use]
    pub fn front(&self) -> Option<DenmemOnWafer> {
        match self {
            Self::External { .. } => None,
            Self::OnChip { block, x_offset, .. } => Some(DenmemOnWafer {
                chip: block.chip,
                denmem: DenmemOnBlock::new(*x_offset, RowOnChip::Top).on_chip(block.block),
            }),
        }
    }

    /// All denmems, top row left-to-right, then bottom row.
    #[must_use]
    pub fn denmems(&self) -> Vec<DenmemOnWafer> {
        match self {
            Self::External { .. } => Vec::new(),
            Self::OnChip { block, x_offset, width } => {
                let mut out = Vec::with_capacity(2 * usize::from(*width));
                for row in [RowOnChip::Top, RowOnChip::Bottom] {
                    for x in *x_offset..*x_offset + *width {
                        out.push(DenmemOnWafer {
                            chip: block.chip,
                            denmem: DenmemOnBlock::new(x, row).on_chip(block.block),
                        });
                    }
                }
                out
            }
        }
    }

    /// Chip-global columns occupied by this neuron, if on-chip.
    #[must_use]
    pub fn column_range(&self) -> Option<(u16, u16)> {
        match self {
            Self::External { .. } => None,
            Self::OnChip { block, x_offset, width } => {
                let first =
                    DenmemOnBlock::new(*x_offset, RowOnChip::Top).on_chip(block.block).x;
                Some((first, first + u16::from(*width) - 1))
            }
        }
    }

    /// Whether `denmem` belongs to this neuron.
    #[must_use]
    pub fn contains(&self, denmem: DenmemOnChip) -> bool {
        match self {
            Self::External { .. } => false,
            Self::OnChip { block, x_offset, width } => {
                denmem.block() == block.block
                    && (*x_offset..*x_offset + *width).contains(&denmem.x_on_block())
            }
        }
    }
}

/// One placement record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementItem {
    /// The biological neuron.
    pub bio: BioNeuron,
    /// Its hardware realisation.
    pub logical: LogicalNeuron,
    /// Assigned L1 address, once merger routing or input placement ran.
    pub address: Option<L1AddressOnWafer>,
}

/// All placement records of a run, append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Placement {
    items: Vec<PlacementItem>,
}

impl Placement {
    /// Record a new bio ↔ logical pairing.
    pub fn add(&mut self, bio: BioNeuron, logical: LogicalNeuron) {
        self.items.push(PlacementItem { bio, logical, address: None });
    }

    /// Attach an L1 address to the item holding `logical`.
    ///
    /// # Panics
    ///
    /// Panics if `logical` was never placed, or on the reserved locking
    /// address: address 0 belongs to the background generators and never
    /// to neurons.
    pub fn set_address(&mut self, logical: &LogicalNeuron, address: L1AddressOnWafer) {
        assert!(
            !address.address.is_locking(),
            "L1 address 0 is reserved for locking events"
        );
        let item = self
            .items
            .iter_mut()
            .find(|item| item.logical == *logical)
            .expect("address assigned to unplaced logical neuron");
        item.address = Some(address);
    }

    /// All records in insertion order.
    #[must_use]
    pub fn items(&self) -> &[PlacementItem] {
        &self.items
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no records exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records of one population, in insertion order.
    pub fn find_population(
        &self,
        population: PopulationId,
    ) -> impl Iterator<Item = &PlacementItem> + '_ {
        self.items.iter().filter(move |item| item.bio.population == population)
    }

    /// Records of one biological neuron.
    pub fn find_neuron(&self, bio: BioNeuron) -> impl Iterator<Item = &PlacementItem> + '_ {
        self.items.iter().filter(move |item| item.bio == bio)
    }

    /// On-chip records on one chip.
    pub fn find_chip(&self, chip: ChipOnWafer) -> impl Iterator<Item = &PlacementItem> + '_ {
        self.items.iter().filter(move |item| item.logical.chip() == Some(chip))
    }

    /// On-chip records on one neuron block.
    pub fn find_block(
        &self,
        block: NeuronBlockOnWafer,
    ) -> impl Iterator<Item = &PlacementItem> + '_ {
        self.items.iter().filter(move |item| item.logical.block() == Some(block))
    }

    /// Records whose events leave through `merger`.
    pub fn find_merger(
        &self,
        merger: DncMergerOnWafer,
    ) -> impl Iterator<Item = &PlacementItem> + '_ {
        self.items
            .iter()
            .filter(move |item| item.address.is_some_and(|a| a.merger == merger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wafermap_chip::NeuronBlockOnChip;

    fn block(x: u8, y: u8, index: u8) -> NeuronBlockOnWafer {
        NeuronBlockOnWafer {
            chip: ChipOnWafer::new(x, y),
            block: NeuronBlockOnChip::new(index),
        }
    }

    #[test]
    fn rectangle_denmems() {
        let neuron = LogicalNeuron::on_chip(block(0, 0, 1), 3, 2);
        assert_eq!(neuron.size(), 4);
        let denmems = neuron.denmems();
        assert_eq!(denmems.len(), 4);
        // Top row first, then bottom; chip-global columns 35, 36.
        assert_eq!(denmems[0].denmem, DenmemOnChip::new(35, RowOnChip::Top));
        assert_eq!(denmems[1].denmem, DenmemOnChip::new(36, RowOnChip::Top));
        assert_eq!(denmems[2].denmem, DenmemOnChip::new(35, RowOnChip::Bottom));
        assert_eq!(neuron.front().unwrap().denmem, DenmemOnChip::new(35, RowOnChip::Top));
        assert_eq!(neuron.column_range(), Some((35, 36)));
    }

    #[test]
    fn contains_respects_rectangle() {
        let neuron = LogicalNeuron::on_chip(block(0, 0, 0), 0, 2);
        assert!(neuron.contains(DenmemOnChip::new(0, RowOnChip::Top)));
        assert!(neuron.contains(DenmemOnChip::new(1, RowOnChip::Bottom)));
        assert!(!neuron.contains(DenmemOnChip::new(2, RowOnChip::Top)));
        assert!(!neuron.contains(DenmemOnChip::new(32, RowOnChip::Top)));
    }

    #[test]
    fn external_neurons_have_no_hardware() {
        let neuron = LogicalNeuron::external(PopulationId(7), 3);
        assert!(neuron.is_external());
        assert_eq!(neuron.size(), 0);
        assert!(neuron.denmems().is_empty());
        assert!(neuron.front().is_none());
    }

    #[test]
    fn placement_queries() {
        let mut placement = Placement::default();
        let bio = BioNeuron::new(PopulationId(0), 0);
        let logical = LogicalNeuron::on_chip(block(1, 1, 0), 0, 2);
        placement.add(bio, logical);

        assert_eq!(placement.find_population(PopulationId(0)).count(), 1);
        assert_eq!(placement.find_chip(ChipOnWafer::new(1, 1)).count(), 1);
        assert_eq!(placement.find_chip(ChipOnWafer::new(0, 0)).count(), 0);

        let merger = DncMergerOnWafer {
            chip: ChipOnWafer::new(1, 1),
            merger: wafermap_chip::DncMerger::new(0),
        };
        placement.set_address(
            &logical,
            L1AddressOnWafer { merger, address: L1Address::new(1) },
        );
        assert_eq!(placement.find_merger(merger).count(), 1);
    }
}
