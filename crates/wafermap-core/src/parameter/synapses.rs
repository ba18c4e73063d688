//! Synaptic weight scaling and quantisation.

use tracing::{debug, trace};

use wafermap_bio::BioGraph;
use wafermap_chip::{ChipOnWafer, SYNAPSE_COLUMNS_PER_ROW};
use wafermap_hal::{ChipCalibration, ChipDescriptor, SynapseRowCalibration};

use crate::config::MapperConfig;
use crate::error::Result;
use crate::parameter::neurons::weight_scale_array;
use crate::results::Results;

/// Scale the biological weights of every assigned synapse row, pick the
/// row's gmax configuration, and store the quantised 4-bit weights.
///
/// # Errors
///
/// Propagates graph lookup failures; quantisation itself cannot fail.
pub fn transform_synapses(
    graph: &BioGraph,
    config: &MapperConfig,
    calibration: &ChipCalibration,
    chip: ChipOnWafer,
    descriptor: &mut ChipDescriptor,
    results: &Results,
) -> Result<()> {
    let Some(routing) = results.synapse_routing.chip(chip) else {
        return Ok(());
    };

    let row_calib: SynapseRowCalibration = if config.param_trafo.use_ess_synapse_trafo {
        SynapseRowCalibration::ess_defaults()
    } else {
        calibration.synapse_rows.clone()
    };

    let weight_scale = weight_scale_array(
        graph,
        config,
        chip,
        config.param_trafo.use_big_capacitors,
        results,
    )?;

    for driver_result in &routing.drivers {
        for (row, row_result) in &driver_result.rows {
            // Scaled weights in nS; zero marks unused columns.
            let mut scaled = vec![0.0f64; SYNAPSE_COLUMNS_PER_ROW as usize];
            for (column, slot) in row_result.columns.iter().enumerate() {
                let Some(source) = slot else {
                    continue;
                };
                let Some(projection) = graph.projection(source.projection) else {
                    continue;
                };
                let Some(bio_weight) =
                    projection.weight(source.source.neuron_index, source.target.neuron_index)
                else {
                    continue;
                };
                let denmem = wafermap_chip::DenmemOnChip::new(
                    u16::try_from(column).unwrap(),
                    wafermap_chip::RowOnChip::Top,
                );
                let scale = weight_scale.get(&denmem).copied().unwrap_or(0.0);
                debug_assert!(scale > 0.0, "routing and placement disagree on {denmem:?}");
                // µS biological, nS hardware.
                scaled[column] = bio_weight * scale * 1000.0;
            }

            let max_weight = scaled.iter().fold(0.0f64, |a, &b| a.max(b));
            let gmax = row_calib.find_best_gmax_config(max_weight);

            let weights = descriptor.synapse_row_mut(*row);
            for (column, &weight_ns) in scaled.iter().enumerate() {
                if weight_ns > 0.0 {
                    let digital = row_calib.digital_weight(weight_ns, gmax);
                    weights[column] = digital;
                    trace!(column, weight_ns, digital, "synapse weight quantised");
                }
            }

            let driver_config = descriptor.driver_mut(row.driver);
            let row_index = match row.row {
                wafermap_chip::RowOnChip::Top => 0,
                wafermap_chip::RowOnChip::Bottom => 1,
            };
            driver_config.rows[row_index].gmax_sel = gmax.sel_vgmax;
            driver_config.rows[row_index].gmax_div = gmax.gmax_div;
        }
        debug!(
            %chip,
            driver = ?driver_result.driver,
            synapses = driver_result.synapse_count(),
            "driver weights programmed"
        );
    }

    Ok(())
}
