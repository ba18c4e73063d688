//! Mapping configuration.
//!
//! Every knob of the pipeline in one serialisable object. All sections
//! have defaults; [`MapperConfig::validate`] is called once at pipeline
//! start and is the only place that checks cross-option consistency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wafermap_bio::{PopulationId, ProjectionId};
use wafermap_chip::{ChipOnWafer, NeuronBlockOnWafer, DENMEM_COLUMNS_PER_BLOCK};
use wafermap_hal::CalibBackendKind;

use crate::error::{MapperError, Result};

/// Which back-end the mapping is prepared for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Mapping only; nothing is programmed.
    #[default]
    None,
    /// Real wafer hardware.
    Hardware,
    /// The executable system simulator.
    Ess,
}

/// Neuron placement options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NeuronPlacementOptions {
    /// Denmems per biological neuron; even, at most 64.
    pub default_neuron_size: u8,
    /// Keep neuron blocks 6 and 7 free for background and external input.
    pub restrict_rightmost_neuron_blocks: bool,
    /// Pack neuron blocks so that merger routing can minimise the number
    /// of occupied sending repeaters.
    pub minimize_number_of_sending_repeaters: bool,
}

impl Default for NeuronPlacementOptions {
    fn default() -> Self {
        Self {
            default_neuron_size: 4,
            restrict_rightmost_neuron_blocks: false,
            minimize_number_of_sending_repeaters: true,
        }
    }
}

/// A manual placement request for one population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualLocation {
    /// Preferred chips, tried in order.
    Chips(Vec<ChipOnWafer>),
    /// Preferred neuron blocks, tried in order.
    Blocks(Vec<NeuronBlockOnWafer>),
}

/// Manual placement table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManualPlacement {
    /// Population → requested location.
    pub mapping: BTreeMap<PopulationId, ManualLocation>,
}

/// How L1 addresses are drawn from a merger's pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressStrategy {
    /// Ascending from 1.
    #[default]
    Sequential,
    /// Pseudo-random, seeded per merger for reproducibility.
    Random,
}

/// Address assignment options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddressAssignmentOptions {
    /// Pool-draw strategy.
    pub strategy: AddressStrategy,
}

/// Input placement options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputPlacementOptions {
    /// Respect the per-chip and per-FPGA event-rate budgets.
    pub consider_firing_rate: bool,
    /// Usable fraction of the nominal bandwidth, in (0, 1].
    pub bandwidth_utilization: f64,
}

impl Default for InputPlacementOptions {
    fn default() -> Self {
        Self { consider_firing_rate: false, bandwidth_utilization: 1.0 }
    }
}

/// Merger-tree routing strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergerTreeStrategy {
    /// Merge neuron blocks into as few DNC mergers as possible, leaving
    /// the rest free for external input.
    #[default]
    MinSpl1,
    /// One DNC merger per neuron block (blocks 0..=6; merger 7 stays free
    /// for input).
    MaxSpl1,
}

/// L1 route-search algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum L1Algorithm {
    /// Manhattan-style backbone walk.
    #[default]
    Backbone,
    /// Weighted shortest path with congestion awareness.
    Dijkstra,
}

/// How per-projection priorities accumulate when several projections share
/// one route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityAccumulationMeasure {
    /// Arithmetic mean of the projection priorities.
    #[default]
    ArithmeticMean,
}

/// L1 routing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct L1RoutingOptions {
    /// Route-search algorithm.
    pub algorithm: L1Algorithm,
    /// Cost of using a vertical bus.
    pub w_vert: u32,
    /// Cost of using a horizontal bus.
    pub w_horiz: u32,
    /// Cost of leaving through a sending repeater.
    pub w_spl1: u32,
    /// Cost of continuing straight across a horizontal boundary.
    pub w_straight_h: u32,
    /// Cost of continuing straight across a vertical boundary.
    pub w_straight_v: u32,
    /// Congestion penalty per prior route on the same switch period.
    pub w_congest: u32,
    /// Consider crossbar switches in a deterministically shuffled order to
    /// even out wear.
    pub shuffle_switches: bool,
    /// Per-projection routing priorities; larger routes first. Minimum 1.
    pub priorities: BTreeMap<ProjectionId, u32>,
    /// Accumulation of shared-route priorities.
    pub priority_accumulation_measure: PriorityAccumulationMeasure,
}

impl Default for L1RoutingOptions {
    fn default() -> Self {
        Self {
            algorithm: L1Algorithm::default(),
            w_vert: 2,
            w_horiz: 1,
            w_spl1: 4,
            w_straight_h: 1,
            w_straight_v: 1,
            w_congest: 0,
            shuffle_switches: false,
            priorities: BTreeMap::new(),
            priority_accumulation_measure: PriorityAccumulationMeasure::default(),
        }
    }
}

impl L1RoutingOptions {
    /// Priority of one projection; unlisted projections have priority 1.
    #[must_use]
    pub fn priority(&self, projection: ProjectionId) -> u32 {
        self.priorities.get(&projection).copied().unwrap_or(1).max(1)
    }
}

/// Routing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoutingOptions {
    /// Merger-tree strategy.
    pub merger_tree_strategy: MergerTreeStrategy,
    /// L1 routing options.
    pub l1: L1RoutingOptions,
    /// Maximum synapse drivers chained behind one switch, 1..=3.
    pub syndriver_chain_length: u8,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            merger_tree_strategy: MergerTreeStrategy::default(),
            l1: L1RoutingOptions::default(),
            syndriver_chain_length: 3,
        }
    }
}

/// Parameter transformation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParamTrafoOptions {
    /// Voltage scaling from biological mV to hardware mV.
    pub alpha_v: f64,
    /// Voltage shift in mV applied after scaling.
    pub shift_v: f64,
    /// Select the big membrane capacitors.
    pub use_big_capacitors: bool,
    /// Use the simulator's synapse transformation curves.
    pub use_ess_synapse_trafo: bool,
}

impl Default for ParamTrafoOptions {
    fn default() -> Self {
        Self {
            alpha_v: 10.0,
            shift_v: 1200.0,
            use_big_capacitors: false,
            use_ess_synapse_trafo: false,
        }
    }
}

/// The complete mapping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MapperConfig {
    /// Neuron placement options.
    pub neuron_placement: NeuronPlacementOptions,
    /// Manual placement requests.
    pub manual_placement: ManualPlacement,
    /// L1 address assignment options.
    pub l1_address_assignment: AddressAssignmentOptions,
    /// Input placement options.
    pub input_placement: InputPlacementOptions,
    /// Routing options.
    pub routing: RoutingOptions,
    /// Parameter transformation options.
    pub param_trafo: ParamTrafoOptions,
    /// Biological-to-hardware time compression factor.
    pub speedup: f64,
    /// Hardware-time offset in seconds before the first input spike.
    pub experiment_time_offset: f64,
    /// Biological experiment duration in seconds.
    pub experiment_duration: f64,
    /// Background generator inter-spike interval in PLL cycles.
    pub bkg_gen_isi: u32,
    /// PLL frequency in Hz.
    pub pll_freq: f64,
    /// Calibration backend.
    pub calib_backend: CalibBackendKind,
    /// Calibration directory; may be empty (see the environment
    /// variable handling in `wafermap-hal`).
    pub calib_path: String,
    /// Target back-end.
    pub backend: BackendKind,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            neuron_placement: NeuronPlacementOptions::default(),
            manual_placement: ManualPlacement::default(),
            l1_address_assignment: AddressAssignmentOptions::default(),
            input_placement: InputPlacementOptions::default(),
            routing: RoutingOptions::default(),
            param_trafo: ParamTrafoOptions::default(),
            speedup: 1.0e4,
            experiment_time_offset: 20e-6,
            experiment_duration: 1.0,
            bkg_gen_isi: 500,
            pll_freq: 100e6,
            calib_backend: CalibBackendKind::default(),
            calib_path: String::new(),
            backend: BackendKind::default(),
        }
    }
}

impl MapperConfig {
    /// Check option ranges and cross-option consistency.
    ///
    /// # Errors
    ///
    /// [`MapperError::InconsistentConfig`] describing the first violation
    /// found.
    pub fn validate(&self) -> Result<()> {
        let size = self.neuron_placement.default_neuron_size;
        if size == 0 || size % 2 != 0 || size > 2 * DENMEM_COLUMNS_PER_BLOCK {
            return Err(MapperError::inconsistent_config(format!(
                "neuron size has to be a positive multiple of two fitting one neuron block, got {size}"
            )));
        }

        let utilization = self.input_placement.bandwidth_utilization;
        if !(utilization > 0.0 && utilization <= 1.0) {
            return Err(MapperError::inconsistent_config(format!(
                "bandwidth_utilization has to lie in (0, 1], got {utilization}"
            )));
        }

        let chain = self.routing.syndriver_chain_length;
        if !(1..=3).contains(&chain) {
            return Err(MapperError::inconsistent_config(format!(
                "syndriver_chain_length has to lie in 1..=3, got {chain}"
            )));
        }

        if self.speedup <= 0.0 {
            return Err(MapperError::inconsistent_config("speedup has to be positive"));
        }

        if self.backend == BackendKind::Ess && self.calib_backend != CalibBackendKind::Default {
            return Err(MapperError::inconsistent_config(
                "the ESS backend only supports the default calibration backend",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = MapperConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn odd_neuron_size_rejected() {
        let mut config = MapperConfig::default();
        config.neuron_placement.default_neuron_size = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_neuron_rejected() {
        let mut config = MapperConfig::default();
        config.neuron_placement.default_neuron_size = 66;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bandwidth_range_checked() {
        let mut config = MapperConfig::default();
        config.input_placement.bandwidth_utilization = 0.0;
        assert!(config.validate().is_err());
        config.input_placement.bandwidth_utilization = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ess_with_file_calibration_rejected() {
        let mut config = MapperConfig::default();
        config.backend = BackendKind::Ess;
        config.calib_backend = CalibBackendKind::File;
        assert!(matches!(config.validate(), Err(MapperError::InconsistentConfig { .. })));
    }

    #[test]
    fn unknown_config_fields_rejected() {
        let result: std::result::Result<MapperConfig, _> =
            serde_json::from_str(r#"{"bogus_option": 1}"#);
        assert!(result.is_err());
    }
}
