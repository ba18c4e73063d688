//! Merger routing and L1 address assignment.
//!
//! Per chip, decide which neuron blocks feed which of the eight DNC
//! mergers, then draw one L1 address per placed neuron from the chosen
//! merger's pool. The merger tree admits only a handful of block
//! groupings per DNC merger; the minSPL1 strategy searches those for a
//! disjoint cover of the occupied blocks that occupies as few DNC
//! mergers as possible, so the remaining ones stay free for external
//! input.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use wafermap_chip::{
    ChipOnWafer, DncMerger, DncMergerOnWafer, Merger0, Merger1, Merger2, Merger3,
    NeuronBlockOnChip, NeuronBlockOnWafer, DNC_MERGERS_PER_CHIP,
};
use wafermap_hal::{MergerMode, ResourceManager, WaferDescriptor};

use crate::config::{MapperConfig, MergerTreeStrategy};
use crate::error::{MapperError, Result};
use crate::placement::address::{L1AddressAssignment, MergerUse, ADDRESSES_PER_MERGER};
use crate::results::{L1AddressOnWafer, Placement};

/// Chosen block → merger mapping per chip.
pub type MergerRoutingResult = BTreeMap<ChipOnWafer, BTreeMap<NeuronBlockOnChip, DncMerger>>;

/// Per-chip address assignment state, carried on to input placement.
pub type WaferL1AddressAssignment = BTreeMap<ChipOnWafer, L1AddressAssignment>;

/// The neuron blocks each DNC merger can collect through the merger tree.
/// Index is the DNC merger; the value is the block set reachable over the
/// merger levels (cf. the successor table of the route checker).
const REACHABLE_BLOCKS: [&[u8]; DNC_MERGERS_PER_CHIP as usize] = [
    &[0],
    &[0, 1],
    &[2],
    &[0, 1, 2, 3, 4, 5, 6, 7],
    &[4],
    &[4, 5, 6, 7],
    &[6, 7],
    &[7],
];

/// Merger routing stage.
pub struct MergerRouting<'a> {
    config: &'a MapperConfig,
}

impl<'a> MergerRouting<'a> {
    /// Create the stage.
    #[must_use]
    pub fn new(config: &'a MapperConfig) -> Self {
        Self { config }
    }

    /// Run merger routing over all allocated chips.
    ///
    /// The per-chip search is pure and fans out across threads; address
    /// drawing and register writes run afterwards in chip order so that
    /// results stay deterministic.
    ///
    /// # Errors
    ///
    /// [`MapperError::OutOfResources`] when a chip's neurons exceed the
    /// address capacity of every feasible merger configuration.
    pub fn run(
        &self,
        mgr: &ResourceManager,
        placement: &mut Placement,
        wafer: &mut WaferDescriptor,
        assignments: &mut WaferL1AddressAssignment,
    ) -> Result<MergerRoutingResult> {
        let chips: Vec<ChipOnWafer> = mgr.allocated().collect();

        let chosen: Vec<(ChipOnWafer, Result<BTreeMap<NeuronBlockOnChip, DncMerger>>)> = chips
            .par_iter()
            .map(|&chip| (chip, self.route_chip(chip, placement)))
            .collect();

        let mut result = MergerRoutingResult::new();
        for (chip, mapping) in chosen {
            let mapping = mapping?;
            self.apply(chip, &mapping, placement, wafer, assignments)?;
            result.insert(chip, mapping);
        }
        info!(chips = result.len(), "merger routing finished");
        Ok(result)
    }

    /// Neurons placed per block of `chip`.
    fn block_occupancy(
        chip: ChipOnWafer,
        placement: &Placement,
    ) -> [usize; DNC_MERGERS_PER_CHIP as usize] {
        let mut counts = [0usize; DNC_MERGERS_PER_CHIP as usize];
        for block in NeuronBlockOnChip::iter_all() {
            counts[block.index() as usize] =
                placement.find_block(NeuronBlockOnWafer { chip, block }).count();
        }
        counts
    }

    /// Choose the block → DNC merger mapping for one chip.
    fn route_chip(
        &self,
        chip: ChipOnWafer,
        placement: &Placement,
    ) -> Result<BTreeMap<NeuronBlockOnChip, DncMerger>> {
        let occupancy = Self::block_occupancy(chip, placement);

        match self.config.routing.merger_tree_strategy {
            MergerTreeStrategy::MinSpl1 => {
                let mut mapping = min_spl1_cover(chip, &occupancy)?;
                // Unoccupied blocks keep their identity merger; input
                // placement checks this 1-to-1 connection before reusing
                // a merger for external sources.
                for block in NeuronBlockOnChip::iter_all() {
                    mapping.entry(block).or_insert_with(|| DncMerger::new(block.index()));
                }
                Ok(mapping)
            }
            MergerTreeStrategy::MaxSpl1 => {
                let mut mapping = BTreeMap::new();
                for index in 0..7u8 {
                    mapping.insert(NeuronBlockOnChip::new(index), DncMerger::new(index));
                }
                if occupancy[7] > 0 {
                    // Merger 7 stays free for external input under maxSPL1;
                    // events of block 7 can not be recorded.
                    warn!(%chip, "maxSPL1: neurons on block 7 have no DNC merger");
                }
                Ok(mapping)
            }
        }
    }

    /// Draw addresses, set modes and write the merger-tree registers.
    fn apply(
        &self,
        chip: ChipOnWafer,
        mapping: &BTreeMap<NeuronBlockOnChip, DncMerger>,
        placement: &mut Placement,
        wafer: &mut WaferDescriptor,
        assignments: &mut WaferL1AddressAssignment,
    ) -> Result<()> {
        let assignment =
            assignments.entry(chip).or_insert_with(|| L1AddressAssignment::new(chip));
        let strategy = self.config.l1_address_assignment.strategy;

        // Per DNC merger, its covered *occupied* blocks in ascending
        // order; identity entries of empty blocks spend no resources.
        let mut by_merger: BTreeMap<DncMerger, Vec<NeuronBlockOnChip>> = BTreeMap::new();
        for (block, merger) in mapping {
            if placement.find_block(NeuronBlockOnWafer { chip, block: *block }).next().is_some()
            {
                by_merger.entry(*merger).or_default().push(*block);
            }
        }

        for (merger, blocks) in &by_merger {
            assignment.set_mode(*merger, MergerUse::Output);
            let on_wafer = DncMergerOnWafer { chip, merger: *merger };

            for block in blocks {
                let items: Vec<_> = placement
                    .find_block(NeuronBlockOnWafer { chip, block: *block })
                    .map(|item| item.logical)
                    .collect();
                for logical in items {
                    let address = assignment
                        .available_addresses_mut(*merger)
                        .pop(strategy)
                        .ok_or_else(|| {
                            MapperError::out_of_resources(format!(
                                "L1 address pool of {merger} on {chip} drained"
                            ))
                        })?;
                    placement.set_address(
                        &logical,
                        L1AddressOnWafer { merger: on_wafer, address },
                    );
                }
            }
            debug!(%chip, merger = merger.index(), blocks = blocks.len(), "merger configured");
        }

        let occupied: BTreeMap<NeuronBlockOnChip, DncMerger> = by_merger
            .iter()
            .flat_map(|(merger, blocks)| blocks.iter().map(|block| (*block, *merger)))
            .collect();
        configure_merger_tree(wafer, chip, &occupied);
        Ok(())
    }
}

/// Search the merger tree for the block assignment occupying the fewest
/// DNC mergers.
///
/// A DNC merger can collect any subset of its reachable blocks: the
/// internal mergers prune the tree with their left/right selects. The
/// constraints are that every occupied block feeds exactly one merger
/// (a level-0 output feeding two paths would duplicate events) and that
/// no merger collects more neurons than its address pool holds.
///
/// With at most four candidate mergers per block the full assignment
/// space is tiny and enumerated outright. Ties on merger count resolve
/// towards the numerically smallest used-merger bitmask, which keeps the
/// rightmost mergers free for external input; remaining ties fall to the
/// first assignment in candidate order, i.e. each block takes the
/// lowest-indexed merger that still fits.
fn min_spl1_cover(
    chip: ChipOnWafer,
    occupancy: &[usize; 8],
) -> Result<BTreeMap<NeuronBlockOnChip, DncMerger>> {
    let blocks: Vec<usize> = (0..8).filter(|&block| occupancy[block] > 0).collect();
    if blocks.is_empty() {
        return Ok(BTreeMap::new());
    }

    let candidates: Vec<Vec<u8>> = blocks
        .iter()
        .map(|block| {
            (0..8u8)
                .filter(|merger| {
                    REACHABLE_BLOCKS[usize::from(*merger)]
                        .contains(&u8::try_from(*block).unwrap())
                })
                .collect()
        })
        .collect();

    let mut best: Option<((u32, u16), Vec<usize>)> = None;
    let mut choice = vec![0usize; blocks.len()];
    'assignments: loop {
        let mut counts = [0usize; DNC_MERGERS_PER_CHIP as usize];
        let mut mask = 0u16;
        for (slot, &block) in blocks.iter().enumerate() {
            let merger = candidates[slot][choice[slot]];
            counts[usize::from(merger)] += occupancy[block];
            mask |= 1 << merger;
        }
        if counts.iter().all(|&count| count <= ADDRESSES_PER_MERGER) {
            let score = (mask.count_ones(), mask);
            if best.as_ref().map_or(true, |(current, _)| score < *current) {
                best = Some((score, choice.clone()));
            }
        }

        // Odometer over the candidate lists.
        let mut slot = 0;
        loop {
            if slot == blocks.len() {
                break 'assignments;
            }
            choice[slot] += 1;
            if choice[slot] < candidates[slot].len() {
                break;
            }
            choice[slot] = 0;
            slot += 1;
        }
    }

    let Some((_, choice)) = best else {
        return Err(MapperError::out_of_resources(format!(
            "no feasible merger-tree configuration for {chip}"
        )));
    };

    let mut mapping = BTreeMap::new();
    for (slot, &block) in blocks.iter().enumerate() {
        mapping.insert(
            NeuronBlockOnChip::new(u8::try_from(block).unwrap()),
            DncMerger::new(candidates[slot][choice[slot]]),
        );
    }
    Ok(mapping)
}

/// Internal tree nodes between the level-0 leaves and one DNC merger.
/// `(left child leaves, right child leaves)` per node on the path.
struct TreeNode {
    level: u8,
    index: u8,
    left_leaves: &'static [u8],
    right_leaves: &'static [u8],
}

/// The feed paths of the eight DNC mergers through the internal mergers.
fn feed_path(merger: DncMerger) -> Vec<TreeNode> {
    let m1 = |index: u8| TreeNode {
        level: 1,
        index,
        left_leaves: LEAVES[usize::from(2 * index)],
        right_leaves: LEAVES[usize::from(2 * index + 1)],
    };
    let m2 = |index: u8| TreeNode {
        level: 2,
        index,
        left_leaves: PAIRS[usize::from(2 * index)],
        right_leaves: PAIRS[usize::from(2 * index + 1)],
    };
    let m3 = || TreeNode { level: 3, index: 0, left_leaves: &[0, 1, 2, 3], right_leaves: &[4, 5, 6, 7] };

    match merger.index() {
        0 | 2 | 4 | 7 => Vec::new(),
        1 => vec![m1(0)],
        6 => vec![m1(3)],
        5 => vec![m1(2), m1(3), m2(1)],
        3 => vec![m1(0), m1(1), m1(2), m1(3), m2(0), m2(1), m3()],
        _ => unreachable!(),
    }
}

const LEAVES: [&[u8]; 8] =
    [&[0], &[1], &[2], &[3], &[4], &[5], &[6], &[7]];
const PAIRS: [&[u8]; 4] = [&[0, 1], &[2, 3], &[4, 5], &[6, 7]];

/// Write the merger select registers realising `mapping` on `chip`.
fn configure_merger_tree(
    wafer: &mut WaferDescriptor,
    chip: ChipOnWafer,
    mapping: &BTreeMap<NeuronBlockOnChip, DncMerger>,
) {
    let descriptor = wafer.chip_mut(chip);
    let covered: Vec<u8> = mapping.keys().map(|block| block.index()).collect();

    // Leaves: occupied blocks merge their background generator (left
    // input) with the neuron block (right input).
    for &block in &covered {
        descriptor.layer1.set_merger0(Merger0::new(block), MergerMode::Merge);
    }

    let mut mergers: BTreeMap<DncMerger, Vec<u8>> = BTreeMap::new();
    for (block, merger) in mapping {
        mergers.entry(*merger).or_default().push(block.index());
    }

    for (merger, blocks) in &mergers {
        for node in feed_path(*merger) {
            let left = node.left_leaves.iter().any(|leaf| blocks.contains(leaf));
            let right = node.right_leaves.iter().any(|leaf| blocks.contains(leaf));
            let mode = match (left, right) {
                (true, true) => MergerMode::Merge,
                (true, false) => MergerMode::LeftOnly,
                (false, true) => MergerMode::RightOnly,
                (false, false) => continue,
            };
            match node.level {
                1 => descriptor.layer1.set_merger1(Merger1::new(node.index), mode),
                2 => descriptor.layer1.set_merger2(Merger2::new(node.index), mode),
                _ => descriptor.layer1.set_merger3(Merger3::new(node.index), mode),
            }
        }
        descriptor.layer1.enable_sending_repeater(merger.sending_repeater());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupancy(counts: &[(usize, usize)]) -> [usize; 8] {
        let mut occupancy = [0; 8];
        for &(block, count) in counts {
            occupancy[block] = count;
        }
        occupancy
    }

    #[test]
    fn single_block_takes_its_direct_merger() {
        let chip = ChipOnWafer::new(0, 0);
        let mapping = min_spl1_cover(chip, &occupancy(&[(0, 4)])).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping[&NeuronBlockOnChip::new(0)], DncMerger::new(0));
    }

    #[test]
    fn two_adjacent_blocks_merge() {
        let chip = ChipOnWafer::new(0, 0);
        let mapping = min_spl1_cover(chip, &occupancy(&[(0, 10), (1, 10)])).unwrap();
        let mergers: Vec<u8> = mapping.values().map(|m| m.index()).collect();
        assert_eq!(mergers, vec![1, 1]);
    }

    #[test]
    fn full_chip_collapses_to_merger_three() {
        let chip = ChipOnWafer::new(0, 0);
        let mapping =
            min_spl1_cover(chip, &occupancy(&(0..8).map(|b| (b, 6)).collect::<Vec<_>>()))
                .unwrap();
        assert!(mapping.values().all(|merger| merger.index() == 3));
    }

    #[test]
    fn capacity_forces_a_split() {
        // 60 + 10 neurons exceed one pool; blocks 0 and 1 can not share
        // merger 1 and must fall back to their direct mergers.
        let chip = ChipOnWafer::new(0, 0);
        let mapping = min_spl1_cover(chip, &occupancy(&[(0, 60), (1, 10)])).unwrap();
        assert_eq!(mapping[&NeuronBlockOnChip::new(0)], DncMerger::new(0));
        assert_eq!(mapping[&NeuronBlockOnChip::new(1)], DncMerger::new(1));
    }

    #[test]
    fn oversized_block_is_rejected() {
        let chip = ChipOnWafer::new(0, 0);
        assert!(min_spl1_cover(chip, &occupancy(&[(0, 64)])).is_err());
    }

    #[test]
    fn rightmost_mergers_stay_free() {
        // Two full blocks exceed a shared pool; the bitmask tie-break
        // settles on the leftmost pair of mergers.
        let chip = ChipOnWafer::new(0, 0);
        let mapping = min_spl1_cover(chip, &occupancy(&[(0, 40), (1, 40)])).unwrap();
        assert_eq!(mapping[&NeuronBlockOnChip::new(0)], DncMerger::new(0));
        assert_eq!(mapping[&NeuronBlockOnChip::new(1)], DncMerger::new(1));
    }

    #[test]
    fn rightmost_blocks_route_through_the_root() {
        // Blocks {6,7} could share merger 6, but collecting them at the
        // tree root keeps mergers 4..=7 free for external input.
        let chip = ChipOnWafer::new(0, 0);
        let mapping = min_spl1_cover(chip, &occupancy(&[(6, 4), (7, 4)])).unwrap();
        assert!(mapping.values().all(|merger| merger.index() == 3));

        let mapping = min_spl1_cover(chip, &occupancy(&[(7, 4)])).unwrap();
        assert_eq!(mapping[&NeuronBlockOnChip::new(7)], DncMerger::new(3));
    }
}
