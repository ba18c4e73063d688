//! Stage orchestration.
//!
//! The pipeline is sequential by stage; merger routing and parameter
//! transformation fan out per chip internally. A single [`Results`]
//! value is threaded through by exclusive borrow and comes back with the
//! register image of the wafer and the run statistics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use wafermap_bio::BioGraph;
use wafermap_hal::{ResourceManager, ResourceManifest, WaferDescriptor};

use crate::config::MapperConfig;
use crate::error::{MapperError, Result};
use crate::placement::{InputPlacement, MergerRouting, NeuronPlacer, WaferL1AddressAssignment};
use crate::results::{LookupTable, Results};
use crate::routing::{self, SynapseLoss};
use crate::{parameter, routing::synapses};

/// Run statistics. Not part of the persisted results, so identical runs
/// keep byte-identical result files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingStats {
    /// Placement records (neurons and external inputs).
    pub neurons_placed: usize,
    /// Chips claimed.
    pub chips_used: usize,
    /// Established L1 routes.
    pub routes: usize,
    /// Hardware synapses realised.
    pub synapses_set: usize,
    /// Synapses lost to routing and capacity limits.
    pub synapses_lost: usize,
    /// Wall-clock of the whole run in milliseconds.
    pub time_total_ms: u64,
    /// Wall-clock spent in the data-parallel regions in milliseconds.
    pub time_parallel_ms: u64,
}

/// Everything a mapping run produces.
#[derive(Debug)]
pub struct Mapping {
    /// The persisted mapping decisions.
    pub results: Results,
    /// The register image to hand to a configuration back-end.
    pub wafer: WaferDescriptor,
    /// Run statistics.
    pub stats: MappingStats,
}

/// The mapping pipeline.
pub struct Mapper<'a> {
    config: &'a MapperConfig,
    graph: &'a BioGraph,
    manifest: &'a ResourceManifest,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Mapper<'a> {
    /// Create a pipeline over the given inputs.
    #[must_use]
    pub fn new(
        config: &'a MapperConfig,
        graph: &'a BioGraph,
        manifest: &'a ResourceManifest,
    ) -> Self {
        Self { config, graph, manifest, cancel: None }
    }

    /// Attach a cancellation flag, checked between stages.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(MapperError::Cancelled);
        }
        Ok(())
    }

    /// Run all stages.
    ///
    /// # Errors
    ///
    /// The first fatal error of any stage; see the error taxonomy in
    /// [`MapperError`].
    pub fn run(&self) -> Result<Mapping> {
        let start = Instant::now();
        self.config.validate()?;
        // Resolve the calibration source now so conflicting or missing
        // settings fail before any hardware register is touched.
        let calib_path = wafermap_hal::resolve_calib_path(&self.config.calib_path)?;
        if self.config.calib_backend == wafermap_hal::CalibBackendKind::File
            && calib_path.is_none()
        {
            return Err(wafermap_hal::CalibrationError::MissingPath.into());
        }

        let mut mgr = ResourceManager::new(self.manifest);
        let mut wafer = WaferDescriptor::new(self.manifest.wafer);
        let mut results = Results::default();
        results.resources.wafer = self.manifest.wafer;
        let mut stats = MappingStats::default();

        info!(
            populations = self.graph.populations().len(),
            projections = self.graph.projections().len(),
            "mapping started"
        );

        // Stage: neuron placement.
        NeuronPlacer::new(self.graph, self.config).run(&mut mgr, &mut results.placement)?;
        self.check_cancelled()?;

        // Stage: merger routing and address assignment (parallel per
        // chip).
        let parallel = Instant::now();
        let mut assignments = WaferL1AddressAssignment::new();
        let merger_routing = MergerRouting::new(self.config).run(
            &mgr,
            &mut results.placement,
            &mut wafer,
            &mut assignments,
        )?;
        stats.time_parallel_ms += elapsed_ms(parallel);
        self.check_cancelled()?;

        // Stage: input placement (sequential; spends shared bandwidth).
        InputPlacement::new(self.graph, self.config, &merger_routing).run(
            &mut mgr,
            &mut results.placement,
            &mut assignments,
            &mut wafer,
        )?;
        self.check_cancelled()?;

        // Stage: L1 routing.
        let loss = SynapseLoss::new();
        results.l1_routing =
            routing::run(self.graph, &results.placement, self.config, &mgr, &mut wafer, &loss);
        self.check_cancelled()?;

        // Stage: synapse driver and row allocation.
        {
            let Results { placement, l1_routing, synapse_routing, .. } = &mut results;
            synapses::run(
                self.graph,
                placement,
                self.config,
                l1_routing,
                &mut wafer,
                synapse_routing,
                &loss,
            )?;
        }
        self.check_cancelled()?;

        // Stage: parameter transformation (parallel per chip).
        results.resources.allocated = mgr.allocated().collect();
        let parallel = Instant::now();
        parameter::run(self.graph, self.config, &mgr, &mut wafer, &mut results)?;
        stats.time_parallel_ms += elapsed_ms(parallel);
        self.check_cancelled()?;

        results.lookup = LookupTable::build(&results.placement);

        stats.neurons_placed = results.placement.len();
        stats.chips_used = mgr.allocated_count();
        stats.routes = results.l1_routing.items().len();
        stats.synapses_set = results.synapse_routing.synapse_count();
        stats.synapses_lost = loss.total();
        stats.time_total_ms = elapsed_ms(start);

        info!(
            neurons = stats.neurons_placed,
            chips = stats.chips_used,
            routes = stats.routes,
            synapses = stats.synapses_set,
            lost = stats.synapses_lost,
            "mapping finished"
        );

        Ok(Mapping { results, wafer, stats })
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
