//! End-to-end mapping scenarios.

use wafermap_bio::{
    BioGraph, CellParameters, LifParameters, PoissonSourceParameters, Population, PopulationId,
    Projection, ProjectionId, SynapseType,
};
use wafermap_chip::{ChipOnWafer, DncMerger, NeuronBlockOnChip, Wafer};
use wafermap_core::config::{ManualLocation, MapperConfig};
use wafermap_core::pipeline::Mapper;
use wafermap_core::placement::{MAX_RATE_CHIP, MAX_RATE_FPGA};
use wafermap_core::results::LogicalNeuron;
use wafermap_hal::{MergerMode, ResourceManifest, SMALL_CAP_FARAD};

fn lif_population(id: usize, size: usize) -> Population {
    Population {
        id: PopulationId(id),
        size,
        parameters: CellParameters::IfCondExp(vec![LifParameters::default(); size]),
        label: None,
    }
}

fn poisson_population(id: usize, size: usize, rate: f64) -> Population {
    Population {
        id: PopulationId(id),
        size,
        parameters: CellParameters::SpikeSourcePoisson(vec![
            PoissonSourceParameters { rate, start: 0.0, duration: 1.0 };
            size
        ]),
        label: None,
    }
}

fn all_to_all(id: usize, source: usize, target: usize, rows: usize, cols: usize) -> Projection {
    Projection::all_to_all(
        ProjectionId(id),
        PopulationId(source),
        PopulationId(target),
        SynapseType::Excitatory,
        rows,
        cols,
        1.0,
    )
}

/// Scenario: four LIF neurons on an empty wafer, no projections.
#[test]
fn four_neurons_pack_into_block_zero() {
    let graph = BioGraph::new(vec![lif_population(0, 4)], vec![]).unwrap();
    let config = MapperConfig::default();
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();
    let results = &mapping.results;

    assert_eq!(results.placement.len(), 4);
    let chip = ChipOnWafer::new(0, 0);
    let mut addresses = Vec::new();
    for item in results.placement.items() {
        let LogicalNeuron::OnChip { block, width, .. } = item.logical else {
            panic!("expected on-chip neurons");
        };
        assert_eq!(block.chip, chip);
        assert_eq!(block.block, NeuronBlockOnChip::new(0));
        assert_eq!(usize::from(width) * 2, 4);

        let address = item.address.expect("merger routing assigns addresses");
        assert_eq!(address.merger.chip, chip);
        assert_eq!(address.merger.merger, DncMerger::new(0));
        addresses.push(address.address.value());
    }
    addresses.sort_unstable();
    assert_eq!(addresses, vec![1, 2, 3, 4]);

    // DNC merger 0 carries output; no routes, no synapses.
    let descriptor = mapping.wafer.chip(chip).unwrap();
    assert_eq!(descriptor.layer1.dnc_mergers[0].mode, MergerMode::Merge);
    assert!(descriptor.layer1.dnc_mergers[0].slow);
    assert!(results.l1_routing.is_empty());
    assert_eq!(results.synapse_routing.synapse_count(), 0);
}

/// Scenario: two populations, all-to-all projection with unit weights.
#[test]
fn all_to_all_lands_on_one_driver() {
    let graph = BioGraph::new(
        vec![lif_population(0, 8), lif_population(1, 8)],
        vec![all_to_all(0, 0, 1, 8, 8)],
    )
    .unwrap();
    let config = MapperConfig::default();
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();
    let results = &mapping.results;

    assert_eq!(mapping.stats.synapses_lost, 0);
    assert_eq!(results.synapse_routing.synapse_count(), 64);

    // All 64 synapses share a single driver (chain included).
    let (_, chip_result) = results.synapse_routing.iter().next().unwrap();
    assert_eq!(chip_result.drivers.len(), 1);
    assert_eq!(chip_result.drivers[0].synapse_count(), 64);

    // Weight scale: speedup · (small_cap · 4) / cm_bio.
    let target_chip = results
        .placement
        .find_population(PopulationId(1))
        .next()
        .unwrap()
        .logical
        .chip()
        .unwrap();
    let scales = wafermap_core::parameter::weight_scale_array(
        &graph,
        &config,
        target_chip,
        false,
        results,
    )
    .unwrap();
    let expected = config.speedup * SMALL_CAP_FARAD * 4.0 / 1e-9;
    for scale in scales.values() {
        assert!(*scale > 0.0);
        assert!((scale - expected).abs() < 1e-9 * expected);
    }
}

/// Scenario: bandwidth-aware input placement.
#[test]
fn low_rate_sources_fit_one_chip() {
    // Hardware rate 10 Hz per source neuron: everything fits on the
    // first chip (63 + 37 addresses over two mergers).
    let graph = BioGraph::new(
        vec![lif_population(1, 20), poisson_population(0, 100, 10.0 / 1e4)],
        vec![all_to_all(0, 0, 1, 100, 20)],
    )
    .unwrap();
    let mut config = MapperConfig::default();
    config.input_placement.consider_firing_rate = true;
    config.input_placement.bandwidth_utilization = 0.5;
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();
    let results = &mapping.results;

    let placed: Vec<_> = results.placement.find_population(PopulationId(0)).collect();
    assert_eq!(placed.len(), 100);
    let chips: std::collections::BTreeSet<_> =
        placed.iter().map(|item| item.address.unwrap().merger.chip).collect();
    assert_eq!(chips.len(), 1, "all sources share one chip");

    let mergers: std::collections::BTreeSet<_> =
        placed.iter().map(|item| item.address.unwrap().merger.merger).collect();
    assert_eq!(mergers.len(), 2, "63 + 37 sources over two mergers");
}

/// Scenario: high-rate sources spill across chips under the rate budget.
#[test]
fn high_rate_sources_respect_bandwidth() {
    // Hardware rate 1 MHz per neuron, utilization 0.5:
    // floor(0.5 · 1.78e7 / 1e6) = 8 fit per chip.
    let graph = BioGraph::new(
        vec![lif_population(1, 20), poisson_population(0, 100, 100.0)],
        vec![all_to_all(0, 0, 1, 100, 20)],
    )
    .unwrap();
    let mut config = MapperConfig::default();
    config.input_placement.consider_firing_rate = true;
    config.input_placement.bandwidth_utilization = 0.5;
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();
    let results = &mapping.results;

    let placed: Vec<_> = results.placement.find_population(PopulationId(0)).collect();
    assert_eq!(placed.len(), 100);

    // Per-chip and per-FPGA rate budgets hold.
    let mut per_chip: std::collections::BTreeMap<ChipOnWafer, usize> = Default::default();
    for item in &placed {
        *per_chip.entry(item.address.unwrap().merger.chip).or_insert(0) += 1;
    }
    let mut per_fpga: std::collections::BTreeMap<_, usize> = Default::default();
    for (chip, count) in &per_chip {
        assert!(*count <= 8, "at most 8 sources of 1 MHz per chip");
        *per_fpga.entry(chip.fpga()).or_insert(0) += count;
    }
    let rate = 100.0 * config.speedup;
    for count in per_fpga.values() {
        #[allow(clippy::cast_precision_loss)]
        let used = *count as f64 * rate;
        assert!(used <= 0.5 * MAX_RATE_FPGA);
    }
    for count in per_chip.values() {
        #[allow(clippy::cast_precision_loss)]
        let used = *count as f64 * rate;
        assert!(used <= 0.5 * MAX_RATE_CHIP);
    }
}

/// Scenario: manually placed source spills onto the second chip.
#[test]
fn manual_source_placement_spills_in_order() {
    // 550 sources against 8 mergers of 63 addresses per chip: the first
    // chip fills completely (504), the remainder moves on in the order
    // the manual placement lists.
    let chips = vec![ChipOnWafer::new(0, 0), ChipOnWafer::new(1, 0)];
    let graph = BioGraph::new(vec![poisson_population(0, 550, 10.0)], vec![]).unwrap();
    let mut config = MapperConfig::default();
    config
        .manual_placement
        .mapping
        .insert(PopulationId(0), ManualLocation::Chips(chips.clone()));
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();
    let results = &mapping.results;

    let placed: Vec<_> = results.placement.find_population(PopulationId(0)).collect();
    assert_eq!(placed.len(), 550);

    let on_first: Vec<_> = placed
        .iter()
        .filter(|item| item.address.unwrap().merger.chip == chips[0])
        .collect();
    let on_second: Vec<_> = placed
        .iter()
        .filter(|item| item.address.unwrap().merger.chip == chips[1])
        .collect();
    assert_eq!(on_first.len(), 8 * 63);
    assert_eq!(on_second.len(), 550 - 8 * 63);

    // Mergers are walked downwards: the first insertion uses merger 7,
    // and the spill chip starts over at merger 7.
    let first_batch: Vec<_> = on_first
        .iter()
        .filter(|item| item.address.unwrap().merger.merger == DncMerger::new(7))
        .collect();
    assert_eq!(first_batch.len(), 63);
    assert!(on_second
        .iter()
        .all(|item| item.address.unwrap().merger.merger == DncMerger::new(7)));
}

/// A manually placed source that does not fit its chips is fatal.
#[test]
fn manual_source_overflow_is_out_of_resources() {
    let graph = BioGraph::new(vec![poisson_population(0, 550, 10.0)], vec![]).unwrap();
    let mut config = MapperConfig::default();
    config.manual_placement.mapping.insert(
        PopulationId(0),
        ManualLocation::Chips(vec![ChipOnWafer::new(0, 0)]),
    );
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let result = Mapper::new(&config, &graph, &manifest).run();
    assert!(matches!(result, Err(wafermap_core::MapperError::OutOfResources { .. })));
}

/// Address uniqueness per merger, across neurons and inputs.
#[test]
fn addresses_are_unique_per_merger() {
    let graph = BioGraph::new(
        vec![lif_population(0, 40), lif_population(1, 30), poisson_population(2, 20, 10.0)],
        vec![all_to_all(0, 2, 0, 20, 40)],
    )
    .unwrap();
    let config = MapperConfig::default();
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();

    let mut seen: std::collections::BTreeSet<(ChipOnWafer, u8, u8)> = Default::default();
    for item in mapping.results.placement.items() {
        let address = item.address.expect("every placement gets an address");
        assert!(!address.address.is_locking(), "address 0 is reserved");
        assert!(
            seen.insert((
                address.merger.chip,
                address.merger.merger.index(),
                address.address.value()
            )),
            "duplicate address {address:?}"
        );
    }
}

/// Determinism: identical inputs give byte-identical serialised results.
#[test]
fn identical_runs_serialise_identically() {
    let build = || {
        let graph = BioGraph::new(
            vec![
                lif_population(0, 12),
                lif_population(1, 7),
                poisson_population(2, 9, 40.0 / 1e4),
            ],
            vec![all_to_all(0, 0, 1, 12, 7), all_to_all(1, 2, 0, 9, 12)],
        )
        .unwrap();
        let mut config = MapperConfig::default();
        config.input_placement.consider_firing_rate = true;
        let manifest = ResourceManifest::full_wafer(Wafer(0));
        Mapper::new(&config, &graph, &manifest).run().unwrap()
    };

    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");
    build().results.save(&a).unwrap();
    build().results.save(&b).unwrap();
    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
}

/// Serialization idempotence over a populated container.
#[test]
fn results_survive_save_and_load() {
    let graph = BioGraph::new(
        vec![lif_population(0, 8), lif_population(1, 8), poisson_population(2, 5, 10.0)],
        vec![all_to_all(0, 0, 1, 8, 8), all_to_all(1, 2, 0, 5, 8)],
    )
    .unwrap();
    let config = MapperConfig::default();
    let manifest = ResourceManifest::full_wafer(Wafer(0));
    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();

    let dir = tempfile::tempdir().unwrap();
    for name in ["results.json", "results.bin", "results.json.gz", "results.bin.gz"] {
        let path = dir.path().join(name);
        mapping.results.save(&path).unwrap();
        let loaded = wafermap_core::Results::load(&path).unwrap();
        assert_eq!(loaded, mapping.results, "round trip via {name}");
    }
}

/// Reserved neuron blocks under the restriction option.
#[test]
fn restricted_blocks_stay_empty() {
    let graph = BioGraph::new(vec![lif_population(0, 500)], vec![]).unwrap();
    let mut config = MapperConfig::default();
    config.neuron_placement.restrict_rightmost_neuron_blocks = true;
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();

    for item in mapping.results.placement.items() {
        let block = item.logical.block().expect("on-chip neurons only").block;
        assert!(block.index() < 6, "blocks 6 and 7 are reserved");
    }
}

/// Defective chips are never used.
#[test]
fn defect_chips_are_avoided() {
    let graph = BioGraph::new(vec![lif_population(0, 16)], vec![]).unwrap();
    let config = MapperConfig::default();
    let manifest = ResourceManifest {
        wafer: Wafer(0),
        present: vec![ChipOnWafer::new(0, 0), ChipOnWafer::new(1, 0)],
        defects: vec![ChipOnWafer::new(0, 0)],
    };

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();
    for item in mapping.results.placement.items() {
        assert_eq!(item.logical.chip().unwrap(), ChipOnWafer::new(1, 0));
    }
}

/// Placement failure surfaces as an out-of-resources error.
#[test]
fn overfull_wafer_is_out_of_resources() {
    // One chip holds 512 denmems, i.e. 128 neurons of size 4.
    let graph = BioGraph::new(vec![lif_population(0, 200)], vec![]).unwrap();
    let config = MapperConfig::default();
    let manifest = ResourceManifest {
        wafer: Wafer(0),
        present: vec![ChipOnWafer::new(0, 0)],
        defects: vec![],
    };

    let result = Mapper::new(&config, &graph, &manifest).run();
    assert!(matches!(result, Err(wafermap_core::MapperError::OutOfResources { .. })));
}

/// Dijkstra routing reaches the same targets as the backbone.
#[test]
fn dijkstra_routes_all_targets() {
    let graph = BioGraph::new(
        vec![lif_population(0, 8), lif_population(1, 8)],
        vec![all_to_all(0, 0, 1, 8, 8)],
    )
    .unwrap();
    let mut config = MapperConfig::default();
    config.routing.l1.algorithm = wafermap_core::config::L1Algorithm::Dijkstra;
    config.routing.l1.w_congest = 2;
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();
    assert_eq!(mapping.stats.synapses_lost, 0);
    assert_eq!(mapping.results.synapse_routing.synapse_count(), 64);
}

/// Input spikes are materialised at compressed hardware time.
#[test]
fn spike_times_are_compressed_and_offset() {
    let times = vec![0.1, 0.2, 0.3];
    let graph = BioGraph::new(
        vec![
            lif_population(1, 4),
            Population {
                id: PopulationId(0),
                size: 1,
                parameters: CellParameters::SpikeSourceArray(vec![
                    wafermap_bio::SpikeSourceParameters { spike_times: times.clone() },
                ]),
                label: None,
            },
        ],
        vec![all_to_all(0, 0, 1, 1, 4)],
    )
    .unwrap();
    let config = MapperConfig::default();
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let mapping = Mapper::new(&config, &graph, &manifest).run().unwrap();

    let item = mapping.results.placement.find_population(PopulationId(0)).next().unwrap();
    let merger = item.address.unwrap().merger;
    let descriptor = mapping.wafer.chip(merger.chip).unwrap();
    let spikes = &descriptor.input_spikes[&merger.merger.gbit_link()];
    assert_eq!(spikes.len(), 3);
    for (spike, bio_time) in spikes.iter().zip(&times) {
        let expected = bio_time / config.speedup + config.experiment_time_offset;
        assert!((spike.time - expected).abs() < 1e-12);
        assert_eq!(spike.address, item.address.unwrap().address);
    }

    // The biological train also lands in the results container.
    assert_eq!(mapping.results.spike_times.get(item.bio), times.as_slice());
}

/// Cancellation between stages discards the run.
#[test]
fn cancellation_aborts_the_run() {
    let graph = BioGraph::new(vec![lif_population(0, 4)], vec![]).unwrap();
    let config = MapperConfig::default();
    let manifest = ResourceManifest::full_wafer(Wafer(0));

    let cancel = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
    let result = Mapper::new(&config, &graph, &manifest).with_cancel(cancel).run();
    assert!(matches!(result, Err(wafermap_core::MapperError::Cancelled)));
}
