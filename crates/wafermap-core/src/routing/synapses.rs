//! Synapse driver and row allocation.
//!
//! Every route arrives on a vertical bus of its target chip; a synapse
//! switch couples that bus into one synapse driver, which can be chained
//! to adjacent drivers for more rows. Rows are then dealt out to the
//! arriving projections and individual synapses dropped into the row
//! columns of their target neurons. Capacity overruns are counted as
//! loss, never fatal.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use wafermap_bio::{BioGraph, SynapseType};
use wafermap_chip::{
    reachable_drivers, ChipOnWafer, DenmemOnChip, RowOnChip, Side, SynapseDriverOnChip,
    SynapseRowOnChip, DRIVERS_PER_SIDE,
};
use wafermap_hal::WaferDescriptor;

use crate::config::MapperConfig;
use crate::error::{MapperError, Result};
use crate::results::{
    DriverResult, L1Routing, Placement, SynapseRouting, SynapseRowResult, SynapseSource,
    SynapseTargetMapping,
};
use crate::routing::loss::SynapseLoss;

/// Run synapse allocation for every chip receiving routes.
///
/// # Errors
///
/// Only graph-level inconsistencies are fatal; capacity problems become
/// loss.
pub fn run(
    graph: &BioGraph,
    placement: &Placement,
    config: &MapperConfig,
    l1_routing: &L1Routing,
    wafer: &mut WaferDescriptor,
    results: &mut SynapseRouting,
    loss: &SynapseLoss,
) -> Result<()> {
    for chip in l1_routing.target_chips() {
        run_chip(graph, placement, config, l1_routing, wafer, results, loss, chip)?;
    }
    info!(synapses = results.synapse_count(), "synapse routing finished");
    Ok(())
}

/// Build the synapse-input class mapping of one chip.
///
/// Each denmem offers a left and a right synaptic input. With one
/// required input class both sides carry it; with two, the left side
/// takes the first and the right side the second, uniformly over the
/// logical neuron so that rows can serve many neurons at once.
fn build_target_mapping(
    graph: &BioGraph,
    placement: &Placement,
    chip: ChipOnWafer,
) -> Result<SynapseTargetMapping> {
    let mut mapping = SynapseTargetMapping::default();
    for item in placement.find_chip(chip) {
        let population = graph.population(item.bio.population)?;
        let targets = population.parameters.synapse_targets(item.bio.neuron_index)?;
        let (left, right) = match targets.as_slice() {
            [single] => (*single, *single),
            [first, second] => (*first, *second),
            _ => {
                return Err(MapperError::inconsistent_config(format!(
                    "{} synapse target classes requested; at most two are supported",
                    targets.len()
                )))
            }
        };
        for denmem in item.logical.denmems() {
            mapping.set(denmem.denmem, Side::Left, left);
            mapping.set(denmem.denmem, Side::Right, right);
        }
    }
    Ok(mapping)
}

/// One synapse that wants a hardware slot.
struct SynapseJob {
    source: SynapseSource,
    synapse_type: SynapseType,
    columns: (u16, u16),
}

#[allow(clippy::too_many_arguments)]
fn run_chip(
    graph: &BioGraph,
    placement: &Placement,
    config: &MapperConfig,
    l1_routing: &L1Routing,
    wafer: &mut WaferDescriptor,
    results: &mut SynapseRouting,
    loss: &SynapseLoss,
    chip: ChipOnWafer,
) -> Result<()> {
    let target_mapping = build_target_mapping(graph, placement, chip)?;
    let mut used_drivers: BTreeSet<SynapseDriverOnChip> = BTreeSet::new();
    let mut driver_results: Vec<DriverResult> = Vec::new();

    for route in l1_routing.by_target(chip) {
        let Some(vline) = route.arrival_vline() else {
            warn!(%chip, "route without arrival bus skipped");
            continue;
        };

        // Collect this route's synapses in projection/index order.
        let mut jobs: Vec<SynapseJob> = Vec::new();
        for projection_id in &route.projections {
            let Some(projection) = graph.projection(*projection_id) else {
                continue;
            };
            let sources: BTreeSet<usize> = placement
                .find_merger(route.source)
                .filter(|item| item.bio.population == projection.source)
                .map(|item| item.bio.neuron_index)
                .collect();
            let targets: Vec<(usize, (u16, u16))> = placement
                .find_chip(chip)
                .filter(|item| item.bio.population == projection.target)
                .filter_map(|item| {
                    item.logical.column_range().map(|range| (item.bio.neuron_index, range))
                })
                .collect();

            for (src, tgt, _weight) in projection.synapses() {
                if !sources.contains(&src) {
                    continue;
                }
                let Some((_, columns)) = targets.iter().find(|(index, _)| *index == tgt)
                else {
                    continue;
                };
                jobs.push(SynapseJob {
                    source: SynapseSource {
                        projection: *projection_id,
                        source: wafermap_bio::BioNeuron::new(projection.source, src),
                        target: wafermap_bio::BioNeuron::new(projection.target, tgt),
                    },
                    synapse_type: projection.target_type,
                    columns: *columns,
                });
            }
        }
        if jobs.is_empty() {
            continue;
        }

        // One primary driver per arriving bus.
        let primary = reachable_drivers(vline).find(|driver| !used_drivers.contains(driver));
        let Some(primary) = primary else {
            debug!(%chip, vline = vline.index(), "no free synapse driver");
            for job in &jobs {
                loss.add(job.source.projection, 1);
            }
            continue;
        };
        used_drivers.insert(primary);

        let mut result = DriverResult::new(primary, vline);
        let chain_limit = usize::from(config.routing.syndriver_chain_length);

        for job in jobs {
            if !place_job(
                &job,
                &target_mapping,
                &mut result,
                &mut used_drivers,
                chain_limit,
            ) {
                loss.add(job.source.projection, 1);
            }
        }

        // Hardware side: close the switch, enable the chain.
        let descriptor = wafer.chip_mut(chip);
        descriptor.layer1.set_synapse_switch(vline, primary);
        descriptor.driver_mut(primary).enable = true;
        for driver in result.chain.clone() {
            descriptor.driver_mut(driver).mirror = true;
        }

        driver_results.push(result);
    }

    let chip_results = results.chip_mut(chip);
    chip_results.target_mapping = target_mapping;
    chip_results.drivers.extend(driver_results);
    Ok(())
}

/// Find a row and column for one synapse, growing the driver chain when
/// the existing rows are full.
fn place_job(
    job: &SynapseJob,
    mapping: &SynapseTargetMapping,
    result: &mut DriverResult,
    used_drivers: &mut BTreeSet<SynapseDriverOnChip>,
    chain_limit: usize,
) -> bool {
    loop {
        // Existing rows first.
        let rows: Vec<SynapseRowOnChip> =
            result.drivers().flat_map(|driver| driver.rows()).collect();
        for row in rows {
            let entry = result
                .rows
                .entry(row)
                .or_insert_with(|| SynapseRowResult::new(job.synapse_type));
            if entry.input != job.synapse_type {
                continue;
            }
            for column in job.columns.0..=job.columns.1 {
                let denmem = DenmemOnChip::new(column, RowOnChip::Top);
                let accepts = mapping.get(denmem, Side::Left) == Some(job.synapse_type)
                    || mapping.get(denmem, Side::Right) == Some(job.synapse_type);
                if !accepts {
                    continue;
                }
                let slot = &mut entry.columns[usize::from(column)];
                if slot.is_none() {
                    *slot = Some(job.source);
                    return true;
                }
            }
        }

        // All rows exhausted: try to chain one more driver.
        if result.drivers().count() >= chain_limit {
            return false;
        }
        let last = result.chain.last().copied().unwrap_or(result.driver);
        let next = [last.y.checked_add(2), last.y.checked_sub(2)]
            .into_iter()
            .flatten()
            .filter(|y| *y < DRIVERS_PER_SIDE)
            .map(|y| SynapseDriverOnChip::new(last.side, y))
            .find(|driver| !used_drivers.contains(driver));
        let Some(next) = next else {
            return false;
        };
        used_drivers.insert(next);
        result.chain.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wafermap_bio::{PopulationId, ProjectionId};
    use wafermap_chip::VLine;

    fn job(columns: (u16, u16)) -> SynapseJob {
        SynapseJob {
            source: SynapseSource {
                projection: ProjectionId(0),
                source: wafermap_bio::BioNeuron::new(PopulationId(0), 0),
                target: wafermap_bio::BioNeuron::new(PopulationId(1), 0),
            },
            synapse_type: SynapseType::Excitatory,
            columns,
        }
    }

    fn exc_inh_mapping(columns: std::ops::RangeInclusive<u16>) -> SynapseTargetMapping {
        let mut mapping = SynapseTargetMapping::default();
        for column in columns {
            for row in [RowOnChip::Top, RowOnChip::Bottom] {
                let denmem = DenmemOnChip::new(column, row);
                mapping.set(denmem, Side::Left, SynapseType::Excitatory);
                mapping.set(denmem, Side::Right, SynapseType::Inhibitory);
            }
        }
        mapping
    }

    #[test]
    fn jobs_fill_rows_then_chain() {
        let mapping = exc_inh_mapping(0..=0);
        let driver = SynapseDriverOnChip::new(Side::Left, 0);
        let mut result = DriverResult::new(driver, VLine::new(0));
        let mut used = BTreeSet::from([driver]);

        // Only column 0 is usable: each row takes one synapse, so the
        // third placement needs a chained driver.
        assert!(place_job(&job((0, 0)), &mapping, &mut result, &mut used, 2));
        assert!(place_job(&job((0, 0)), &mapping, &mut result, &mut used, 2));
        assert!(place_job(&job((0, 0)), &mapping, &mut result, &mut used, 2));
        assert_eq!(result.chain.len(), 1);
        assert_eq!(result.synapse_count(), 3);

        // Chain limit reached: rows are full, the job is lost.
        assert!(place_job(&job((0, 0)), &mapping, &mut result, &mut used, 2));
        assert!(!place_job(&job((0, 0)), &mapping, &mut result, &mut used, 2));
    }

    #[test]
    fn wide_targets_spread_over_columns() {
        let mapping = exc_inh_mapping(0..=1);
        let driver = SynapseDriverOnChip::new(Side::Left, 0);
        let mut result = DriverResult::new(driver, VLine::new(0));
        let mut used = BTreeSet::from([driver]);

        assert!(place_job(&job((0, 1)), &mapping, &mut result, &mut used, 1));
        assert!(place_job(&job((0, 1)), &mapping, &mut result, &mut used, 1));
        // Both landed in the same row, different columns.
        assert_eq!(result.rows.len(), 1);
        let row = result.rows.values().next().unwrap();
        assert_eq!(row.synapse_count(), 2);
    }
}
