//! Reverse mapping between hardware addresses and biological neurons.
//!
//! Interpreting recorded events needs the placement map inverted: a spike
//! arrives as (chip, merger, address) and has to be attributed to a
//! `(population, neuron)` pair. The table is built once at the end of
//! placement and travels with the results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wafermap_bio::BioNeuron;
use wafermap_chip::DenmemOnWafer;

use super::placement::{L1AddressOnWafer, Placement};

/// Reverse lookup: hardware event address ↔ biological neuron ↔ denmems.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LookupTable {
    #[serde(with = "crate::util::map_as_pairs")]
    hw_to_bio: BTreeMap<L1AddressOnWafer, BioNeuron>,
    #[serde(with = "crate::util::map_as_pairs")]
    bio_to_hw: BTreeMap<BioNeuron, Vec<L1AddressOnWafer>>,
    #[serde(with = "crate::util::map_as_pairs")]
    bio_to_denmems: BTreeMap<BioNeuron, Vec<DenmemOnWafer>>,
}

impl LookupTable {
    /// Build the table from the forward placement.
    #[must_use]
    pub fn build(placement: &Placement) -> Self {
        let mut table = Self::default();
        for item in placement.items() {
            if let Some(address) = item.address {
                table.hw_to_bio.insert(address, item.bio);
                table.bio_to_hw.entry(item.bio).or_default().push(address);
            }
            let denmems = item.logical.denmems();
            if !denmems.is_empty() {
                table.bio_to_denmems.entry(item.bio).or_default().extend(denmems);
            }
        }
        table
    }

    /// The biological neuron behind a hardware address.
    #[must_use]
    pub fn bio(&self, address: L1AddressOnWafer) -> Option<BioNeuron> {
        self.hw_to_bio.get(&address).copied()
    }

    /// All hardware addresses of a biological neuron.
    #[must_use]
    pub fn addresses(&self, bio: BioNeuron) -> &[L1AddressOnWafer] {
        self.bio_to_hw.get(&bio).map_or(&[], Vec::as_slice)
    }

    /// All denmems of a biological neuron.
    #[must_use]
    pub fn denmems(&self, bio: BioNeuron) -> &[DenmemOnWafer] {
        self.bio_to_denmems.get(&bio).map_or(&[], Vec::as_slice)
    }

    /// Number of address entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hw_to_bio.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hw_to_bio.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::placement::LogicalNeuron;
    use wafermap_bio::PopulationId;
    use wafermap_chip::{
        ChipOnWafer, DncMerger, DncMergerOnWafer, L1Address, NeuronBlockOnChip, NeuronBlockOnWafer,
    };

    #[test]
    fn round_trips_through_the_table() {
        let mut placement = Placement::default();
        let bio = BioNeuron::new(PopulationId(2), 5);
        let logical = LogicalNeuron::on_chip(
            NeuronBlockOnWafer {
                chip: ChipOnWafer::new(0, 0),
                block: NeuronBlockOnChip::new(0),
            },
            0,
            1,
        );
        placement.add(bio, logical);
        let address = L1AddressOnWafer {
            merger: DncMergerOnWafer {
                chip: ChipOnWafer::new(0, 0),
                merger: DncMerger::new(0),
            },
            address: L1Address::new(17),
        };
        placement.set_address(&logical, address);

        let table = LookupTable::build(&placement);
        assert_eq!(table.bio(address), Some(bio));
        assert_eq!(table.addresses(bio), &[address]);
        assert_eq!(table.denmems(bio).len(), 2);
    }
}
