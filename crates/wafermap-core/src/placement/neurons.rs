//! Neuron placement: biological neurons onto denmem rectangles.
//!
//! Populations with a manual placement request are materialised first, in
//! the order given. The rest are placed greedily by decreasing size onto
//! the chip with the most free denmems, preferring the chip the
//! population already landed on so that projections stay local. A
//! population that does not fit in one piece is split.

use std::collections::BTreeMap;

use tracing::{debug, info};

use wafermap_bio::{BioGraph, Population, PopulationSlice};
use wafermap_chip::{
    ChipOnWafer, NeuronBlockOnChip, NeuronBlockOnWafer, DENMEM_COLUMNS_PER_BLOCK,
    NEURON_BLOCKS_PER_CHIP,
};
use wafermap_hal::ResourceManager;

use crate::config::{ManualLocation, MapperConfig};
use crate::error::{MapperError, Result};
use crate::results::{LogicalNeuron, Placement};

/// Free/used state of the 32 denmem columns of one neuron block.
///
/// Neurons occupy whole columns (top and bottom denmem together), so
/// tracking columns is enough to keep placements rectangular.
#[derive(Debug, Clone)]
pub struct OnNeuronBlock {
    used: [bool; DENMEM_COLUMNS_PER_BLOCK as usize],
}

impl Default for OnNeuronBlock {
    fn default() -> Self {
        Self { used: [false; DENMEM_COLUMNS_PER_BLOCK as usize] }
    }
}

impl OnNeuronBlock {
    /// Number of free columns.
    #[must_use]
    pub fn free_columns(&self) -> usize {
        self.used.iter().filter(|used| !**used).count()
    }

    /// All maximal free runs as `(start, length)`, left to right.
    fn free_runs(&self) -> Vec<(u8, u8)> {
        let mut runs = Vec::new();
        let mut start = None;
        for (index, used) in self.used.iter().enumerate() {
            match (used, start) {
                (false, None) => start = Some(index),
                (true, Some(s)) => {
                    runs.push((u8::try_from(s).unwrap(), u8::try_from(index - s).unwrap()));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push((
                u8::try_from(s).unwrap(),
                u8::try_from(self.used.len() - s).unwrap(),
            ));
        }
        runs
    }

    /// Pick the start of a run for `wanted` columns: the smallest run that
    /// holds everything, or the largest run for a partial placement.
    fn pick_run(&self, wanted: usize) -> Option<(u8, u8)> {
        let runs = self.free_runs();
        runs.iter()
            .filter(|(_, len)| usize::from(*len) >= wanted)
            .min_by_key(|(_, len)| *len)
            .or_else(|| runs.iter().max_by_key(|(_, len)| *len))
            .copied()
    }

    /// Mark `width` columns starting at `start` as used.
    fn occupy(&mut self, start: u8, width: u8) {
        for column in start..start + width {
            debug_assert!(!self.used[usize::from(column)]);
            self.used[usize::from(column)] = true;
        }
    }
}

/// Free denmem tracking for every usable chip.
#[derive(Debug, Default)]
struct FreeDenmems {
    chips: BTreeMap<ChipOnWafer, [OnNeuronBlock; NEURON_BLOCKS_PER_CHIP as usize]>,
}

impl FreeDenmems {
    fn new(mgr: &ResourceManager) -> Self {
        let chips = mgr.present().map(|chip| (chip, Default::default())).collect();
        Self { chips }
    }

    fn free_on_chip(&self, chip: ChipOnWafer, restricted: bool) -> usize {
        self.chips.get(&chip).map_or(0, |blocks| {
            blocks
                .iter()
                .take(usable_blocks(restricted))
                .map(OnNeuronBlock::free_columns)
                .sum()
        })
    }

    /// Chip with the most free columns; ties resolved by coordinate order.
    fn fullest_chip(&self, restricted: bool) -> Option<ChipOnWafer> {
        self.chips
            .keys()
            .copied()
            .max_by_key(|chip| (self.free_on_chip(*chip, restricted), std::cmp::Reverse(*chip)))
            .filter(|chip| self.free_on_chip(*chip, restricted) > 0)
    }
}

const fn usable_blocks(restricted: bool) -> usize {
    if restricted {
        NEURON_BLOCKS_PER_CHIP as usize - 2
    } else {
        NEURON_BLOCKS_PER_CHIP as usize
    }
}

/// The neuron placer.
pub struct NeuronPlacer<'a> {
    graph: &'a BioGraph,
    config: &'a MapperConfig,
}

impl<'a> NeuronPlacer<'a> {
    /// Create a placer over `graph`.
    #[must_use]
    pub fn new(graph: &'a BioGraph, config: &'a MapperConfig) -> Self {
        Self { graph, config }
    }

    /// Place every non-source population.
    ///
    /// # Errors
    ///
    /// [`MapperError::OutOfResources`] when a population cannot be packed.
    pub fn run(&self, mgr: &mut ResourceManager, placement: &mut Placement) -> Result<()> {
        let restricted = self.config.neuron_placement.restrict_rightmost_neuron_blocks;
        let neuron_size = usize::from(self.config.neuron_placement.default_neuron_size);
        let width = u8::try_from(neuron_size / 2).unwrap();
        let mut free = FreeDenmems::new(mgr);

        let manual = &self.config.manual_placement.mapping;
        let mut manual_pops: Vec<&Population> = Vec::new();
        let mut auto_pops: Vec<&Population> = Vec::new();
        for population in self.graph.neuron_populations() {
            if manual.contains_key(&population.id) {
                manual_pops.push(population);
            } else {
                auto_pops.push(population);
            }
        }
        // Automatic populations by decreasing size; insertion order breaks
        // ties so runs stay reproducible.
        auto_pops.sort_by_key(|population| std::cmp::Reverse(population.size));

        for population in manual_pops {
            let mut slice = PopulationSlice::whole(population);
            match &manual[&population.id] {
                ManualLocation::Chips(chips) => {
                    for &chip in chips {
                        self.place_on_chip(
                            &mut free, mgr, placement, &mut slice, chip, width, restricted,
                        );
                        if slice.is_empty() {
                            break;
                        }
                    }
                }
                ManualLocation::Blocks(blocks) => {
                    for &block in blocks {
                        self.place_on_block(
                            &mut free, mgr, placement, &mut slice, block, width,
                        );
                        if slice.is_empty() {
                            break;
                        }
                    }
                }
            }
            if !slice.is_empty() {
                return Err(MapperError::out_of_resources(format!(
                    "manually placed population {:?}: {} neurons left unplaced",
                    population.id,
                    slice.size()
                )));
            }
        }

        for population in auto_pops {
            let mut slice = PopulationSlice::whole(population);
            let mut last_chip: Option<ChipOnWafer> = None;
            while !slice.is_empty() {
                // Reuse the previous chip while it has room, otherwise take
                // the emptiest one.
                let chip = last_chip
                    .filter(|chip| free.free_on_chip(*chip, restricted) >= usize::from(width))
                    .or_else(|| free.fullest_chip(restricted))
                    .ok_or_else(|| {
                        MapperError::out_of_resources(format!(
                            "population {:?}: {} neurons left but no free denmems",
                            population.id,
                            slice.size()
                        ))
                    })?;
                let before = slice.size();
                self.place_on_chip(
                    &mut free, mgr, placement, &mut slice, chip, width, restricted,
                );
                if slice.size() == before {
                    // The chip had columns but no run wide enough.
                    last_chip = None;
                    if free.fullest_chip(restricted).is_none() {
                        return Err(MapperError::out_of_resources(format!(
                            "population {:?}: no neuron block fits a neuron of size {neuron_size}",
                            population.id
                        )));
                    }
                    free.chips.remove(&chip);
                    continue;
                }
                last_chip = Some(chip);
            }
        }

        info!(
            neurons = placement.len(),
            chips = mgr.allocated_count(),
            "neuron placement finished"
        );
        Ok(())
    }

    /// Place as much of `slice` as fits on `chip`.
    #[allow(clippy::too_many_arguments)]
    fn place_on_chip(
        &self,
        free: &mut FreeDenmems,
        mgr: &mut ResourceManager,
        placement: &mut Placement,
        slice: &mut PopulationSlice,
        chip: ChipOnWafer,
        width: u8,
        restricted: bool,
    ) {
        if !free.chips.contains_key(&chip) {
            return;
        }
        // Without repeater minimisation each population starts on a fresh
        // neuron block, trading denmems for 1-to-1 merger assignments.
        let align_blocks = !self.config.neuron_placement.minimize_number_of_sending_repeaters;
        for index in 0..usable_blocks(restricted) {
            if slice.is_empty() {
                return;
            }
            if align_blocks && slice.offset() == 0 {
                let untouched = free.chips[&chip][index].free_columns()
                    == usize::from(DENMEM_COLUMNS_PER_BLOCK);
                if !untouched {
                    continue;
                }
            }
            let block = NeuronBlockOnWafer {
                chip,
                block: NeuronBlockOnChip::new(u8::try_from(index).unwrap()),
            };
            self.place_on_block(free, mgr, placement, slice, block, width);
        }
    }

    /// Place as much of `slice` as fits on one neuron block.
    fn place_on_block(
        &self,
        free: &mut FreeDenmems,
        mgr: &mut ResourceManager,
        placement: &mut Placement,
        slice: &mut PopulationSlice,
        block: NeuronBlockOnWafer,
        width: u8,
    ) {
        let Some(blocks) = free.chips.get_mut(&block.chip) else {
            return;
        };
        let on_block = &mut blocks[block.block.index() as usize];

        while !slice.is_empty() {
            let wanted = slice.size() * usize::from(width);
            let Some((start, length)) = on_block.pick_run(wanted) else {
                return;
            };
            let fitting = usize::from(length) / usize::from(width);
            if fitting == 0 {
                return;
            }

            let part = slice.slice_front(fitting.min(slice.size()));
            mgr.allocate(block.chip);
            for (offset, bio) in part.neurons().enumerate() {
                let x = start + u8::try_from(offset).unwrap() * width;
                on_block.occupy(x, width);
                placement.add(bio, LogicalNeuron::on_chip(block, x, width));
            }
            debug!(
                population = ?part.population(),
                count = part.size(),
                chip = %block.chip,
                block = block.block.index(),
                "placed population slice"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_runs_track_fragmentation() {
        let mut block = OnNeuronBlock::default();
        assert_eq!(block.free_runs(), vec![(0, 32)]);
        block.occupy(4, 4);
        assert_eq!(block.free_runs(), vec![(0, 4), (8, 24)]);
        assert_eq!(block.free_columns(), 28);
    }

    #[test]
    fn pick_run_prefers_smallest_fitting() {
        let mut block = OnNeuronBlock::default();
        block.occupy(4, 4); // runs: (0,4), (8,24)
        assert_eq!(block.pick_run(4), Some((0, 4)));
        assert_eq!(block.pick_run(10), Some((8, 24)));
        // Nothing fits completely: the largest run is offered.
        assert_eq!(block.pick_run(100), Some((8, 24)));
    }
}
