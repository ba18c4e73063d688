//! Input spike materialisation.
//!
//! Source populations turn into concrete hardware spike trains on the
//! gbit links of the chips they were placed on. Spike-source arrays
//! replay their stored trains compressed by the speedup; Poisson sources
//! are drawn deterministically from a seed derived from the DNC merger
//! index, so identical runs replay identical noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use wafermap_bio::{BioGraph, BioNeuron, CellParameters};
use wafermap_chip::{ChipOnWafer, DncMerger, DncMergerOnWafer};
use wafermap_hal::{ChipDescriptor, Spike};

use crate::config::MapperConfig;
use crate::error::Result;
use crate::results::Results;

/// Seed stride between the per-merger random streams.
const MERGER_SEED_STRIDE: u64 = 209_823;

/// Emit the spike trains of every source placed on `chip`.
///
/// Returns the biological spike times per source neuron for the results
/// container.
///
/// # Errors
///
/// Graph lookups only; generation itself cannot fail.
pub fn spike_input(
    graph: &BioGraph,
    config: &MapperConfig,
    chip: ChipOnWafer,
    descriptor: &mut ChipDescriptor,
    results: &Results,
) -> Result<Vec<(BioNeuron, Vec<f64>)>> {
    let mut recorded = Vec::new();

    for merger in DncMerger::iter_all() {
        let on_wafer = DncMergerOnWafer { chip, merger };
        let mut rng = StdRng::seed_from_u64(u64::from(merger.index()) * MERGER_SEED_STRIDE);
        let mut spikes: Vec<Spike> = Vec::new();

        for item in results.placement.find_merger(on_wafer) {
            let population = graph.population(item.bio.population)?;
            if !population.is_source() {
                continue;
            }
            let address =
                item.address.expect("find_merger only yields items with addresses").address;

            let bio_times: Vec<f64> = match &population.parameters {
                CellParameters::SpikeSourceArray(cells) => {
                    cells[item.bio.neuron_index].spike_times.clone()
                }
                CellParameters::SpikeSourcePoisson(cells) => {
                    let cell = &cells[item.bio.neuron_index];
                    poisson_train(&mut rng, cell.rate, cell.start, cell.duration)
                }
                _ => continue,
            };

            for &t_bio in &bio_times {
                spikes.push(Spike {
                    address,
                    time: t_bio / config.speedup + config.experiment_time_offset,
                });
            }
            recorded.push((item.bio, bio_times));
        }

        if !spikes.is_empty() {
            spikes.sort_by(|a, b| a.time.partial_cmp(&b.time).unwrap());
            debug!(%chip, %merger, count = spikes.len(), "input spikes queued");
            descriptor.send_spikes(merger.gbit_link(), spikes);
        }
    }

    Ok(recorded)
}

/// A Poisson spike train over `[start, start + duration)` in biological
/// seconds.
fn poisson_train(rng: &mut StdRng, rate_hz: f64, start: f64, duration: f64) -> Vec<f64> {
    let mut times = Vec::new();
    if rate_hz <= 0.0 || duration <= 0.0 {
        return times;
    }
    let mut t = start;
    loop {
        let u: f64 = rng.gen_range(f64::EPSILON..1.0);
        t += -u.ln() / rate_hz;
        if t >= start + duration {
            return times;
        }
        times.push(t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisson_trains_are_reproducible() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let train_a = poisson_train(&mut a, 100.0, 0.0, 1.0);
        let train_b = poisson_train(&mut b, 100.0, 0.0, 1.0);
        assert_eq!(train_a, train_b);
        assert!(!train_a.is_empty());
        assert!(train_a.windows(2).all(|w| w[0] < w[1]));
        assert!(train_a.iter().all(|&t| (0.0..1.0).contains(&t)));
    }

    #[test]
    fn empty_trains_for_degenerate_parameters() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(poisson_train(&mut rng, 0.0, 0.0, 1.0).is_empty());
        assert!(poisson_train(&mut rng, 10.0, 0.0, 0.0).is_empty());
    }
}
