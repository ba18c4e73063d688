//! Analog and digital neuron parameter translation.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use wafermap_bio::{BioGraph, CellParameters};
use wafermap_chip::{ChipOnWafer, DenmemOnChip, FgBlockOnChip};
use wafermap_hal::{
    ChipCalibration, ChipDescriptor, HwNeuronParameters, BIG_CAP_FARAD, SMALL_CAP_FARAD,
};

use crate::config::MapperConfig;
use crate::error::{MapperError, Result};
use crate::results::Results;

/// Biological millivolts to hardware volts: scale by `alpha_v`, shift by
/// `shift_v` (mV), then to volts.
fn bio_mv_to_hw_volts(config: &MapperConfig, millivolts: f64) -> f64 {
    (millivolts * config.param_trafo.alpha_v + config.param_trafo.shift_v) / 1000.0
}

/// Translate the analog parameters of every neuron on `chip` and set up
/// the digital spike path of each logical neuron.
///
/// Returns the per-floating-gate-block mean of the biological `v_reset`
/// values, needed by the shared-parameter step.
///
/// # Errors
///
/// [`MapperError::UnsupportedCellType`] when a placed population has no
/// analog translation.
pub fn transform_neurons(
    graph: &BioGraph,
    config: &MapperConfig,
    calibration: &ChipCalibration,
    chip: ChipOnWafer,
    descriptor: &mut ChipDescriptor,
    results: &Results,
) -> Result<BTreeMap<FgBlockOnChip, f64>> {
    // Collect the v_reset requests per shared block first; individual
    // parameters depend on the shared levels.
    let mut v_resets: BTreeMap<FgBlockOnChip, Vec<f64>> = BTreeMap::new();
    let mut distinct: Vec<f64> = Vec::new();

    for item in results.placement.find_chip(chip) {
        let population = graph.population(item.bio.population)?;
        let v_reset = population.parameters.v_reset(item.bio.neuron_index)?;
        if !distinct.iter().any(|known| (known - v_reset).abs() < f64::EPSILON) {
            distinct.push(v_reset);
        }
        for denmem in item.logical.denmems() {
            v_resets.entry(denmem.denmem.shared_fg_block()).or_default().push(v_reset);
        }
    }

    if distinct.len() > 1 {
        warn!(
            %chip,
            values = distinct.len(),
            "more than one v_reset requested; the per-block mean will be used"
        );
    }

    let means: BTreeMap<FgBlockOnChip, f64> = v_resets
        .into_iter()
        .map(|(block, values)| {
            #[allow(clippy::cast_precision_loss)]
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (block, mean)
        })
        .collect();

    // Individual analog parameters, denmem by denmem.
    for item in results.placement.find_chip(chip) {
        let population = graph.population(item.bio.population)?;
        let registers = analog_registers(
            config,
            calibration,
            &population.parameters,
            item.bio.neuron_index,
        )?;
        for denmem in item.logical.denmems() {
            *descriptor.analog_neuron_mut(denmem.denmem) = registers;
        }

        // Digital setup only on the leftmost denmem; the rectangle is
        // interconnected into one electrical neuron below.
        let Some(front) = item.logical.front() else {
            continue;
        };
        let Some(address) = item.address else {
            warn!(bio = ?item.bio, "placed neuron without L1 address stays silent");
            continue;
        };
        let register = descriptor.neuron_mut(front.denmem);
        register.address = address.address;
        register.activate_firing = true;
        register.enable_spl1_output = true;

        if let Some((first, last)) = item.logical.column_range() {
            descriptor.connect_denmems(first, last);
        }
        debug!(bio = ?item.bio, address = %address.address, "digital neuron configured");
    }

    Ok(means)
}

/// Translate one cell's parameters into floating-gate DAC values.
fn analog_registers(
    config: &MapperConfig,
    calibration: &ChipCalibration,
    parameters: &CellParameters,
    index: usize,
) -> Result<HwNeuronParameters> {
    let speedup = config.speedup;
    let denmem_cap = if config.param_trafo.use_big_capacitors {
        BIG_CAP_FARAD
    } else {
        SMALL_CAP_FARAD
    };
    let neuron = &calibration.neuron;
    let volts = |mv: f64| neuron.voltage_dac(bio_mv_to_hw_volts(config, mv));

    let lif = match parameters {
        CellParameters::IfCondExp(v) => &v[index],
        CellParameters::EifCondExpIsfaIsta(v) => &v[index].lif,
        other => {
            return Err(MapperError::UnsupportedCellType {
                cell_type: other.cell_type().to_string(),
            })
        }
    };

    // Hardware leak conductance reproducing the membrane time constant on
    // the accelerated clock: g = C_hw · speedup / tau_m.
    let tau_m_seconds = lif.tau_m * 1e-3;
    let g_l_ns = denmem_cap * speedup / tau_m_seconds * 1e9;

    let mut registers = HwNeuronParameters {
        e_l: volts(lif.v_rest),
        v_t: volts(lif.v_thresh),
        v_reset: volts(lif.v_reset),
        i_gl: neuron.conductance_dac(g_l_ns),
        i_pl: neuron.refrac_dac(lif.tau_refrac * 1e-3 / speedup),
        v_syntc_e: neuron.syn_tc_dac(lif.tau_syn_e * 1e-3 / speedup),
        v_syntc_i: neuron.syn_tc_dac(lif.tau_syn_i * 1e-3 / speedup),
        e_syn_e: volts(lif.e_rev_e),
        e_syn_i: volts(lif.e_rev_i),
        ..HwNeuronParameters::default()
    };

    if let CellParameters::EifCondExpIsfaIsta(v) = parameters {
        let adex = &v[index];
        registers.v_exp = volts(adex.lif.v_thresh - adex.delta_t);
        registers.i_radapt_a = neuron.conductance_dac(adex.a * speedup);
        // The adaptation increment shares the conductance curve scale.
        registers.i_fire_b = neuron.conductance_dac(adex.b * 1e3);
        registers.i_radapt_tau = neuron.syn_tc_dac(adex.tau_w * 1e-3 / speedup);
    }

    Ok(registers)
}

/// Program the shared floating-gate blocks from the per-block `v_reset`
/// means.
pub fn shared_parameters(
    config: &MapperConfig,
    calibration: &ChipCalibration,
    descriptor: &mut ChipDescriptor,
    means: BTreeMap<FgBlockOnChip, f64>,
) {
    for block in FgBlockOnChip::iter_all() {
        let Some(mean) = means.get(&block) else {
            continue;
        };
        let hw_volts = bio_mv_to_hw_volts(config, *mean);
        let dac = calibration.shared.apply_shared_calibration(hw_volts);
        descriptor.floating_gates_mut(block).v_reset = dac;
    }
}

/// Per-denmem synaptic weight scale of one chip.
///
/// The scale from biological to hardware conductance is
/// `speedup · cm_hw / cm_bio`, where `cm_hw` sums the capacitance of all
/// interconnected denmems of the logical neuron.
///
/// # Errors
///
/// Propagates cell-type errors from the capacitance query.
pub fn weight_scale_array(
    graph: &BioGraph,
    config: &MapperConfig,
    chip: ChipOnWafer,
    use_big_capacitors: bool,
    results: &Results,
) -> Result<BTreeMap<DenmemOnChip, f64>> {
    let denmem_cap = if use_big_capacitors { BIG_CAP_FARAD } else { SMALL_CAP_FARAD };
    let mut scales = BTreeMap::new();

    for item in results.placement.find_chip(chip) {
        let population = graph.population(item.bio.population)?;
        let cm_bio_nf = population.parameters.cm(item.bio.neuron_index)?;
        let cm_bio_farad = cm_bio_nf * 1e-9;

        let denmems = item.logical.denmems();
        #[allow(clippy::cast_precision_loss)]
        let cm_hw = denmem_cap * denmems.len() as f64;
        let scale = config.speedup * cm_hw / cm_bio_farad;
        debug_assert!(scale > 0.0);

        for denmem in denmems {
            scales.insert(denmem.denmem, scale);
        }
    }
    Ok(scales)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wafermap_bio::LifParameters;

    fn config() -> MapperConfig {
        MapperConfig::default()
    }

    #[test]
    fn voltage_conversion_defaults() {
        // v_reset −70 mV: (−70 · 10 + 1200) / 1000 = 0.5 V.
        let volts = bio_mv_to_hw_volts(&config(), -70.0);
        assert!((volts - 0.5).abs() < 1e-12);
    }

    #[test]
    fn lif_registers_are_finite_and_ordered() {
        let calibration = ChipCalibration::default();
        let parameters = CellParameters::IfCondExp(vec![LifParameters::default()]);
        let registers = analog_registers(&config(), &calibration, &parameters, 0).unwrap();
        // Threshold above reset for the default cell.
        assert!(registers.v_t > registers.v_reset);
        assert!(registers.i_gl > 0);
    }

    #[test]
    fn sources_have_no_analog_translation() {
        let calibration = ChipCalibration::default();
        let parameters = CellParameters::SpikeSourcePoisson(vec![
            wafermap_bio::PoissonSourceParameters::default(),
        ]);
        let result = analog_registers(&config(), &calibration, &parameters, 0);
        assert!(matches!(result, Err(MapperError::UnsupportedCellType { .. })));
    }
}
