//! Input placement: external spike sources onto free DNC mergers.
//!
//! Sources are attached where their targets live: the placer computes the
//! mean coordinate of a source's target chips and walks outward from
//! there over the present chips. Insertion on a chip tries the DNC
//! mergers in descending order and only accepts a merger whose
//! background generator reaches it 1-to-1 with no neurons on the
//! corresponding block, because the locking events of the generator must
//! keep flowing once the merger carries external input.
//!
//! This stage is deliberately sequential: it spends shared chip and FPGA
//! bandwidth and a shared neighbour index.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, trace, warn};

use wafermap_bio::{BioGraph, BioNeuron, Population, PopulationSlice};
use wafermap_chip::{
    ChipOnWafer, DncMerger, DncMergerOnWafer, FpgaOnWafer, Merger0, NeuronBlockOnChip,
    NeuronBlockOnWafer,
};
use wafermap_hal::{GbitDirection, MergerMode, ResourceManager, WaferDescriptor};

use crate::config::{ManualLocation, MapperConfig};
use crate::error::{MapperError, Result};
use crate::placement::address::{L1AddressAssignment, MergerUse};
use crate::placement::merger::{MergerRoutingResult, WaferL1AddressAssignment};
use crate::results::{L1AddressOnWafer, LogicalNeuron, Placement};

/// Nominal event rate one chip's off-wafer link sustains, in Hz.
pub const MAX_RATE_CHIP: f64 = 1.78e7;
/// Nominal event rate one FPGA sustains, in Hz.
pub const MAX_RATE_FPGA: f64 = 1.25e8;

/// Nearest-neighbour index over the present chips.
///
/// Chip counts are small (at most 576), so an exact sorted scan replaces
/// a spatial tree.
struct Neighbors {
    chips: Vec<ChipOnWafer>,
}

impl Neighbors {
    fn new(mgr: &ResourceManager) -> Self {
        Self { chips: mgr.present().collect() }
    }

    /// All chips, closest to `(x, y)` first; ties in coordinate order.
    fn find_near(&self, x: f64, y: f64) -> Vec<ChipOnWafer> {
        let mut chips = self.chips.clone();
        chips.sort_by(|a, b| {
            let da = distance_squared(*a, x, y);
            let db = distance_squared(*b, x, y);
            da.partial_cmp(&db).unwrap().then_with(|| a.cmp(b))
        });
        chips
    }
}

fn distance_squared(chip: ChipOnWafer, x: f64, y: f64) -> f64 {
    let dx = f64::from(chip.x) - x;
    let dy = f64::from(chip.y) - y;
    dx * dx + dy * dy
}

/// Input placement stage.
pub struct InputPlacement<'a> {
    graph: &'a BioGraph,
    config: &'a MapperConfig,
    merger_routing: &'a MergerRoutingResult,
    used_rate_chip: BTreeMap<ChipOnWafer, f64>,
    used_rate_fpga: BTreeMap<FpgaOnWafer, f64>,
}

impl<'a> InputPlacement<'a> {
    /// Create the stage.
    #[must_use]
    pub fn new(
        graph: &'a BioGraph,
        config: &'a MapperConfig,
        merger_routing: &'a MergerRoutingResult,
    ) -> Self {
        Self {
            graph,
            config,
            merger_routing,
            used_rate_chip: BTreeMap::new(),
            used_rate_fpga: BTreeMap::new(),
        }
    }

    /// Place every source population and configure the gbit links.
    ///
    /// # Errors
    ///
    /// [`MapperError::OutOfResources`] when a source does not fit.
    pub fn run(
        &mut self,
        mgr: &mut ResourceManager,
        placement: &mut Placement,
        assignments: &mut WaferL1AddressAssignment,
        wafer: &mut WaferDescriptor,
    ) -> Result<()> {
        let neighbors = Neighbors::new(mgr);

        // Sources with more distinct target chips are placed first; within
        // one bucket, graph order is kept.
        let mut auto_inputs: BTreeMap<std::cmp::Reverse<usize>, Vec<((f64, f64), PopulationSlice)>> =
            BTreeMap::new();

        let sources: Vec<&Population> = self.graph.sources().collect();
        for population in sources {
            let mut slice = PopulationSlice::whole(population);

            if let Some(location) = self.config.manual_placement.mapping.get(&population.id) {
                let ManualLocation::Chips(chips) = location else {
                    return Err(MapperError::inconsistent_config(format!(
                        "manual placement of source population {:?} needs a chip list",
                        population.id
                    )));
                };
                for &chip in chips {
                    self.insert_input(chip, placement, assignments, mgr, &mut slice)?;
                    if slice.is_empty() {
                        break;
                    }
                }
                if !slice.is_empty() {
                    return Err(MapperError::out_of_resources(
                        "manually placed external input does not fit the requested chips",
                    ));
                }
                continue;
            }

            // Mean position of the de-duplicated target chips.
            let mut targets: BTreeSet<ChipOnWafer> = BTreeSet::new();
            for projection in self.graph.projections_from(population.id) {
                for item in placement.find_population(projection.target) {
                    if let Some(chip) = item.logical.chip() {
                        targets.insert(chip);
                    }
                }
            }
            if targets.is_empty() {
                warn!(
                    population = ?population.id,
                    "source population does not have any targets"
                );
                continue;
            }

            #[allow(clippy::cast_precision_loss)]
            let count = targets.len() as f64;
            let x_mean = targets.iter().map(|chip| f64::from(chip.x)).sum::<f64>() / count;
            let y_mean = targets.iter().map(|chip| f64::from(chip.y)).sum::<f64>() / count;
            auto_inputs
                .entry(std::cmp::Reverse(targets.len()))
                .or_default()
                .push(((x_mean, y_mean), slice));
        }

        for (_, inputs) in auto_inputs {
            for ((x, y), mut slice) in inputs {
                for chip in neighbors.find_near(x, y) {
                    self.insert_input(chip, placement, assignments, mgr, &mut slice)?;
                    if slice.is_empty() {
                        break;
                    }
                }
                if !slice.is_empty() {
                    return Err(MapperError::out_of_resources(format!(
                        "external input {:?}: {} neurons do not fit",
                        slice.population(),
                        slice.size()
                    )));
                }
            }
        }

        for chip in mgr.allocated().collect::<Vec<_>>() {
            let assignment =
                assignments.entry(chip).or_insert_with(|| L1AddressAssignment::new(chip));
            configure_gbit_links(wafer, chip, assignment);
        }

        info!("input placement finished");
        Ok(())
    }

    /// Try to place (part of) `bio` on `chip`, walking the DNC mergers in
    /// descending order.
    fn insert_input(
        &mut self,
        chip: ChipOnWafer,
        placement: &mut Placement,
        assignments: &mut WaferL1AddressAssignment,
        mgr: &mut ResourceManager,
        bio: &mut PopulationSlice,
    ) -> Result<()> {
        if !mgr.has(chip) {
            return Ok(());
        }
        let assignment =
            assignments.entry(chip).or_insert_with(|| L1AddressAssignment::new(chip));

        for merger in DncMerger::iter_all_rev() {
            if assignment.mode(merger) == MergerUse::Output {
                continue;
            }
            let left_space = assignment.available_addresses(merger).size();
            if left_space == 0 {
                continue;
            }

            // The locking events come from the background generator of the
            // like-numbered neuron block; require the 1-to-1 connection
            // and an empty block so no neurons are muted.
            let block = NeuronBlockOnChip::new(merger.index());
            let routed_one_to_one = self.merger_routing.get(&chip).map_or(true, |mapping| {
                mapping.get(&block).map_or(true, |mapped| *mapped == merger)
            });
            if !routed_one_to_one {
                continue;
            }
            let block_on_wafer = NeuronBlockOnWafer { chip, block };
            if placement.find_block(block_on_wafer).next().is_some() {
                continue;
            }

            trace!(%chip, %merger, left_space, "found insertion point");

            let mut neuron_count = bio.size().min(left_space);
            if self.config.input_placement.consider_firing_rate {
                let available_rate = self.available_rate(chip);
                let (fitting, used_rate) =
                    self.neurons_fitting_into_rate(bio, neuron_count, available_rate)?;
                if fitting == 0 {
                    trace!(%chip, available_rate, "skipping chip due to bandwidth limit");
                    return Ok(());
                }
                neuron_count = fitting;
                self.allocate_rate(chip, used_rate);
            }

            mgr.allocate(chip);
            assignment.set_mode(merger, MergerUse::Input);

            let on_wafer = DncMergerOnWafer { chip, merger };
            let slice = bio.slice_back(neuron_count);
            let strategy = self.config.l1_address_assignment.strategy;
            for index in 0..neuron_count {
                let address = assignment
                    .available_addresses_mut(merger)
                    .pop(strategy)
                    .expect("pool size was checked above");
                let neuron_index = slice.offset() + index;
                let logical = LogicalNeuron::external(slice.population(), neuron_index);
                placement.add(BioNeuron::new(slice.population(), neuron_index), logical);
                placement
                    .set_address(&logical, L1AddressOnWafer { merger: on_wafer, address });
            }
            debug!(%chip, %merger, count = neuron_count, "external input placed");

            if bio.is_empty() {
                return Ok(());
            }
        }
        Ok(())
    }

    fn available_rate(&self, chip: ChipOnWafer) -> f64 {
        let utilization = self.config.input_placement.bandwidth_utilization;
        let used_chip = self.used_rate_chip.get(&chip).copied().unwrap_or(0.0);
        let used_fpga = self.used_rate_fpga.get(&chip.fpga()).copied().unwrap_or(0.0);
        let available_chip = utilization * MAX_RATE_CHIP - used_chip;
        let available_fpga = utilization * MAX_RATE_FPGA - used_fpga;
        available_chip.min(available_fpga).max(0.0)
    }

    fn allocate_rate(&mut self, chip: ChipOnWafer, rate: f64) {
        *self.used_rate_chip.entry(chip).or_insert(0.0) += rate;
        *self.used_rate_fpga.entry(chip.fpga()).or_insert(0.0) += rate;
    }

    /// How many neurons from the back of `bio` fit into `available_rate`.
    fn neurons_fitting_into_rate(
        &self,
        bio: &PopulationSlice,
        max_neurons: usize,
        available_rate: f64,
    ) -> Result<(usize, f64)> {
        let population = self.graph.population(bio.population())?;
        let speedup = self.config.speedup;

        let mut summed = 0.0;
        let mut fitting = 0;
        for index in 0..max_neurons {
            let id_in_slice = bio.size() - index - 1;
            let rate = population
                .parameters
                .estimated_hw_rate(bio.offset() + id_in_slice, speedup)?;
            trace!(id_in_slice, rate, "expected rate for neuron");
            if rate + summed < available_rate {
                summed += rate;
                fitting += 1;
            } else {
                break;
            }
        }
        Ok((fitting, summed))
    }
}

/// Configure gbit links and DNC mergers according to the assignment
/// modes.
///
/// Output mergers send towards the off-wafer network and are slowed so
/// the sending repeaters get their idle cycle. Input mergers receive from
/// the off-wafer network while their level-0 merger forwards only the
/// background generator. Unused mergers are pointed at the (silent)
/// off-wafer direction so neuron-block events can not leak out.
pub fn configure_gbit_links(
    wafer: &mut WaferDescriptor,
    chip: ChipOnWafer,
    assignment: &L1AddressAssignment,
) {
    let descriptor = wafer.chip_mut(chip);
    for merger in DncMerger::iter_all() {
        let link = merger.gbit_link();
        match assignment.mode(merger) {
            MergerUse::Output => {
                descriptor.layer1.set_gbit_link(link, GbitDirection::ToDnc);
                // Slow only works if the merger is set to merge.
                descriptor.layer1.set_dnc_merger(merger, MergerMode::Merge, true);
            }
            MergerUse::Input => {
                descriptor.layer1.set_gbit_link(link, GbitDirection::ToChip);
                descriptor
                    .layer1
                    .set_merger0(Merger0::new(merger.index()), MergerMode::LeftOnly);
                descriptor.layer1.set_dnc_merger(merger, MergerMode::Merge, true);
            }
            MergerUse::Unused => {
                descriptor.layer1.set_gbit_link(link, GbitDirection::ToChip);
                descriptor.layer1.set_dnc_merger(merger, MergerMode::LeftOnly, false);
            }
        }
    }
}
