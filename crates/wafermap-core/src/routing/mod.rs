//! L1 routing: from sending repeaters across the bus grid into synapse
//! arrays.

pub mod backbone;
pub mod dijkstra;
pub mod loss;
pub mod synapses;
pub mod vline_usage;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use wafermap_bio::{BioGraph, ProjectionId};
use wafermap_chip::{ChipOnWafer, DncMergerOnWafer, HLine, Segment, VLine};
use wafermap_hal::{ResourceManager, WaferDescriptor};

use crate::config::{L1Algorithm, MapperConfig};
use crate::results::{L1Routing, Placement};

pub use loss::SynapseLoss;
pub use vline_usage::VLineUsage;

/// One routing job: all projections leaving one DNC merger towards their
/// target chips.
#[derive(Debug, Clone)]
pub struct RouteTask {
    /// The merger whose events are routed.
    pub source: DncMergerOnWafer,
    /// Chips holding target neurons.
    pub targets: BTreeSet<ChipOnWafer>,
    /// Projections sharing this source, in id order.
    pub projections: Vec<ProjectionId>,
    /// Accumulated routing priority.
    pub priority: f64,
}

/// Bus ownership registry.
///
/// Buses are exclusive between route trees: two different source mergers
/// can not drive the same bus. Within one tree sharing is fine (the
/// branches carry the same events), so claims carry the owning task.
#[derive(Debug, Default)]
pub struct BusUsage {
    h: BTreeMap<(ChipOnWafer, u8), usize>,
    v: BTreeMap<(ChipOnWafer, u16), usize>,
    owner: usize,
}

impl BusUsage {
    /// Switch to the given owning task.
    pub fn set_owner(&mut self, owner: usize) {
        self.owner = owner;
    }

    /// Claim a horizontal bus; `false` when another task holds it.
    pub fn claim_h(&mut self, chip: ChipOnWafer, hline: HLine) -> bool {
        match self.h.get(&(chip, hline.index())) {
            Some(&owner) => owner == self.owner,
            None => {
                self.h.insert((chip, hline.index()), self.owner);
                true
            }
        }
    }

    /// Claim a vertical bus; `false` when another task holds it.
    pub fn claim_v(&mut self, chip: ChipOnWafer, vline: VLine) -> bool {
        match self.v.get(&(chip, vline.index())) {
            Some(&owner) => owner == self.owner,
            None => {
                self.v.insert((chip, vline.index()), self.owner);
                true
            }
        }
    }

    /// Whether another task holds this horizontal bus.
    #[must_use]
    pub fn is_hline_claimed(&self, chip: ChipOnWafer, hline: HLine) -> bool {
        self.h.get(&(chip, hline.index())).is_some_and(|&owner| owner != self.owner)
    }

    /// Whether another task holds this vertical bus.
    #[must_use]
    pub fn is_vline_claimed(&self, chip: ChipOnWafer, vline: VLine) -> bool {
        self.v.get(&(chip, vline.index())).is_some_and(|&owner| owner != self.owner)
    }
}

/// Gather routing tasks from the placed projections.
///
/// Projections group by the DNC merger their source neurons send
/// through; targets are the chips holding placed target neurons. Tasks
/// are ordered by accumulated priority (descending), then source
/// coordinate, which makes the contended-bus arbitration deterministic.
#[must_use]
pub fn collect_tasks(
    graph: &BioGraph,
    placement: &Placement,
    config: &MapperConfig,
) -> Vec<RouteTask> {
    let mut by_source: BTreeMap<DncMergerOnWafer, RouteTask> = BTreeMap::new();

    for projection in graph.projections() {
        let mut mergers: BTreeSet<DncMergerOnWafer> = BTreeSet::new();
        for item in placement.find_population(projection.source) {
            if let Some(address) = item.address {
                mergers.insert(address.merger);
            }
        }
        let mut targets: BTreeSet<ChipOnWafer> = BTreeSet::new();
        for item in placement.find_population(projection.target) {
            if let Some(chip) = item.logical.chip() {
                targets.insert(chip);
            }
        }
        if mergers.is_empty() || targets.is_empty() {
            warn!(projection = ?projection.id, "projection has no routable endpoints");
            continue;
        }

        for merger in mergers {
            let task = by_source.entry(merger).or_insert_with(|| RouteTask {
                source: merger,
                targets: BTreeSet::new(),
                projections: Vec::new(),
                priority: 0.0,
            });
            task.targets.extend(targets.iter().copied());
            task.projections.push(projection.id);
        }
    }

    let mut tasks: Vec<RouteTask> = by_source.into_values().collect();
    for task in &mut tasks {
        task.projections.sort_unstable();
        task.projections.dedup();
        task.priority = match config.routing.l1.priority_accumulation_measure {
            crate::config::PriorityAccumulationMeasure::ArithmeticMean => {
                #[allow(clippy::cast_precision_loss)]
                let mean = task
                    .projections
                    .iter()
                    .map(|id| f64::from(config.routing.l1.priority(*id)))
                    .sum::<f64>()
                    / task.projections.len() as f64;
                mean
            }
        };
    }
    tasks.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap()
            .then_with(|| a.source.cmp(&b.source))
    });
    tasks
}

/// Run L1 routing over all tasks.
///
/// Route failures are recovered locally: the synapses of unreachable
/// targets are tallied in `loss` and the run continues.
pub fn run(
    graph: &BioGraph,
    placement: &Placement,
    config: &MapperConfig,
    mgr: &ResourceManager,
    wafer: &mut WaferDescriptor,
    loss: &SynapseLoss,
) -> L1Routing {
    let tasks = collect_tasks(graph, placement, config);
    let mut routing = L1Routing::default();
    let mut buses = BusUsage::default();
    let mut vline_usage = VLineUsage::new();

    for (index, task) in tasks.iter().enumerate() {
        buses.set_owner(index);
        let (routes, unreachable) = match config.routing.l1.algorithm {
            L1Algorithm::Backbone => {
                backbone::build(task, mgr, &config.routing.l1, &mut buses, &mut vline_usage)
            }
            L1Algorithm::Dijkstra => {
                dijkstra::build(task, mgr, &config.routing.l1, &mut buses, &mut vline_usage)
            }
        };

        for chip in unreachable {
            record_unreachable(graph, placement, task, chip, loss);
        }
        for item in routes {
            configure_crossbars(wafer, &item.route);
            routing.add(item);
        }
    }

    info!(
        routes = routing.items().len(),
        lost_synapses = loss.total(),
        "L1 routing finished"
    );
    routing
}

/// Count the synapses lost because `chip` is unreachable from the task's
/// source merger.
fn record_unreachable(
    graph: &BioGraph,
    placement: &Placement,
    task: &RouteTask,
    chip: ChipOnWafer,
    loss: &SynapseLoss,
) {
    for projection_id in &task.projections {
        let Some(projection) = graph.projection(*projection_id) else {
            continue;
        };
        let sources: BTreeSet<usize> = placement
            .find_merger(task.source)
            .filter(|item| item.bio.population == projection.source)
            .map(|item| item.bio.neuron_index)
            .collect();
        let targets: BTreeSet<usize> = placement
            .find_chip(chip)
            .filter(|item| item.bio.population == projection.target)
            .map(|item| item.bio.neuron_index)
            .collect();
        let lost = projection
            .synapses()
            .filter(|(src, tgt, _)| sources.contains(src) && targets.contains(tgt))
            .count();
        loss.add(*projection_id, lost);
    }
}

/// Close the crossbar switches a route uses.
fn configure_crossbars(wafer: &mut WaferDescriptor, route: &wafermap_chip::L1Route) {
    let mut chip: Option<ChipOnWafer> = None;
    let mut previous: Option<&Segment> = None;
    for segment in route {
        if let Segment::Chip(c) = segment {
            chip = Some(*c);
        }
        if let (Some(chip), Some(prev)) = (chip, previous) {
            match (prev, segment) {
                (Segment::HLine(h), Segment::VLine(v))
                | (Segment::VLine(v), Segment::HLine(h)) => {
                    wafer.chip_mut(chip).layer1.set_crossbar_switch(*v, *h);
                }
                _ => {}
            }
        }
        previous = Some(segment);
    }
}
