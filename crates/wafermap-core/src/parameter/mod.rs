//! Parameter transformation: biology into registers.
//!
//! Runs once per allocated chip, after placement and routing are known.
//! Per chip it loads the calibration record, translates analog cell
//! parameters into floating-gate DACs, programs the digital neuron
//! registers, scales and quantises synaptic weights, switches on the
//! background generators, and materialises the input spike trains.

mod neurons;
mod spikes;
mod synapses;

use rayon::prelude::*;
use tracing::{debug, info};

use wafermap_bio::BioGraph;
use wafermap_chip::ChipOnWafer;
use wafermap_hal::{
    resolve_calib_path, BackgroundGeneratorConfig, ChipCalibration, ChipDescriptor,
    ResourceManager, WaferDescriptor,
};

use crate::config::MapperConfig;
use crate::error::Result;
use crate::results::Results;

pub use neurons::weight_scale_array;

/// Run the parameter stage over every allocated chip.
///
/// The per-chip work is independent and fans out across threads; spike
/// trains are merged back in chip order afterwards so the results stay
/// deterministic.
///
/// # Errors
///
/// Calibration failures and unsupported cell types abort the run before
/// any hardware write of the affected chip.
pub fn run(
    graph: &BioGraph,
    config: &MapperConfig,
    mgr: &ResourceManager,
    wafer: &mut WaferDescriptor,
    results: &mut Results,
) -> Result<()> {
    let calib_path = resolve_calib_path(&config.calib_path)?;

    let chips: Vec<ChipOnWafer> = mgr.allocated().collect();
    // Partition the descriptor by chip so the fan-out can hand every task
    // its own register image.
    let mut descriptors: Vec<(ChipOnWafer, &mut ChipDescriptor)> = Vec::with_capacity(chips.len());
    for chip in &chips {
        wafer.chip_mut(*chip);
    }
    let mut taken: std::collections::BTreeMap<ChipOnWafer, &mut ChipDescriptor> =
        wafer.chips.iter_mut().map(|(chip, descriptor)| (*chip, descriptor)).collect();
    for chip in &chips {
        if let Some(descriptor) = taken.remove(chip) {
            descriptors.push((*chip, descriptor));
        }
    }

    let snapshot: &Results = &*results;
    let spike_outputs: Vec<Result<ChipSpikes>> = descriptors
        .into_par_iter()
        .map(|(chip, descriptor)| {
            run_chip(graph, config, calib_path.as_deref(), chip, descriptor, snapshot)
        })
        .collect();

    for output in spike_outputs {
        let output = output?;
        for (bio, times) in output.bio_spike_times {
            results.spike_times.set(bio, times);
        }
    }

    info!(chips = chips.len(), "parameter transformation finished");
    Ok(())
}

/// Spike trains produced for one chip, merged into the results
/// afterwards.
struct ChipSpikes {
    bio_spike_times: Vec<(wafermap_bio::BioNeuron, Vec<f64>)>,
}

fn run_chip(
    graph: &BioGraph,
    config: &MapperConfig,
    calib_path: Option<&std::path::Path>,
    chip: ChipOnWafer,
    descriptor: &mut ChipDescriptor,
    results: &Results,
) -> Result<ChipSpikes> {
    debug!(%chip, "transforming parameters");

    let calibration = ChipCalibration::load(
        config.calib_backend,
        calib_path,
        results.resources.wafer,
        chip,
    )?;
    calibration.check_pll(config.pll_freq);

    descriptor.use_big_capacitors = config.param_trafo.use_big_capacitors;

    // Input spike trains first; they do not depend on calibration.
    let bio_spike_times = spikes::spike_input(graph, config, chip, descriptor, results)?;

    background_generators(descriptor, config.bkg_gen_isi);

    let local_neurons = results.placement.find_chip(chip).next().is_some();
    if local_neurons {
        let v_reset_mean =
            neurons::transform_neurons(graph, config, &calibration, chip, descriptor, results)?;

        let local_routes = results.synapse_routing.chip(chip).is_some();
        if local_routes {
            synapses::transform_synapses(graph, config, &calibration, chip, descriptor, results)?;
        }

        neurons::shared_parameters(config, &calibration, descriptor, v_reset_mean);
    }

    Ok(ChipSpikes { bio_spike_times })
}

/// Switch on every background generator: regular mode, the configured
/// inter-spike interval, and the reserved locking address. Repeaters and
/// synapse drivers lock onto these events.
fn background_generators(descriptor: &mut ChipDescriptor, isi: u32) {
    for index in 0..8 {
        descriptor.layer1.set_background(
            index,
            BackgroundGeneratorConfig {
                enable: true,
                random: false,
                seed: 0,
                isi,
                address: wafermap_chip::L1Address::LOCKING,
            },
        );
    }
}
