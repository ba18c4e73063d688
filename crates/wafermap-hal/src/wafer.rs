//! In-memory register image of the wafer.
//!
//! Every mapping stage writes the registers it owns into this descriptor;
//! a configuration back-end later walks it and programs silicon or a
//! simulator. The descriptor is partitioned by chip: a stage working on
//! one chip only ever touches that chip's [`ChipDescriptor`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use wafermap_chip::{
    AnalogOutput, ChipOnWafer, DenmemOnChip, DncMerger, FgBlockOnChip, GbitLink, HLine, L1Address,
    Merger0, Merger1, Merger2, Merger3, SendingRepeater, SynapseDriverOnChip, SynapseRowOnChip,
    VLine, Wafer, SYNAPSE_COLUMNS_PER_ROW,
};

/// One hardware spike on an off-wafer link.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    /// 6-bit event address.
    pub address: L1Address,
    /// Time in seconds of hardware time.
    pub time: f64,
}

/// Merger select setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergerMode {
    /// Forward the left input only.
    #[default]
    LeftOnly,
    /// Forward the right input only.
    RightOnly,
    /// Merge both inputs.
    Merge,
}

/// Direction setting of a gbit link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GbitDirection {
    /// Events flow from the off-wafer network into the chip.
    #[default]
    ToChip,
    /// Events flow from the chip to the off-wafer network.
    ToDnc,
}

/// Register image of one background generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundGeneratorConfig {
    /// Generator enabled.
    pub enable: bool,
    /// Random (Poisson) mode instead of regular intervals.
    pub random: bool,
    /// PRNG seed for random mode.
    pub seed: u32,
    /// Inter-spike interval in PLL clock cycles.
    pub isi: u32,
    /// Event address emitted by the generator.
    pub address: L1Address,
}

impl Default for BackgroundGeneratorConfig {
    fn default() -> Self {
        Self { enable: false, random: false, seed: 0, isi: 500, address: L1Address::LOCKING }
    }
}

/// Per-DNC-merger register image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DncMergerConfig {
    /// Select setting.
    pub mode: MergerMode,
    /// One idle clock cycle between events, required by the sending
    /// repeaters; only effective in [`MergerMode::Merge`].
    pub slow: bool,
}

/// Event-network registers of one chip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layer1 {
    /// Closed crossbar switches.
    pub crossbar_switches: Vec<(VLine, HLine)>,
    /// Closed synapse switches.
    pub synapse_switches: Vec<(VLine, SynapseDriverOnChip)>,
    /// Level-0 merger settings.
    pub merger0: [MergerMode; 8],
    /// Level-1 merger settings.
    pub merger1: [MergerMode; 4],
    /// Level-2 merger settings.
    pub merger2: [MergerMode; 2],
    /// Level-3 merger setting.
    pub merger3: [MergerMode; 1],
    /// DNC merger settings.
    pub dnc_mergers: [DncMergerConfig; 8],
    /// Gbit link directions.
    pub gbit_links: [GbitDirection; 8],
    /// Background generators.
    pub background: [BackgroundGeneratorConfig; 8],
    /// Enabled sending repeaters.
    pub sending_repeaters: [bool; 8],
}

impl Layer1 {
    /// Close a crossbar switch.
    pub fn set_crossbar_switch(&mut self, vline: VLine, hline: HLine) {
        if !self.crossbar_switches.contains(&(vline, hline)) {
            self.crossbar_switches.push((vline, hline));
        }
    }

    /// Close a synapse switch.
    pub fn set_synapse_switch(&mut self, vline: VLine, driver: SynapseDriverOnChip) {
        if !self.synapse_switches.contains(&(vline, driver)) {
            self.synapse_switches.push((vline, driver));
        }
    }

    /// Set a level-0 merger.
    pub fn set_merger0(&mut self, merger: Merger0, mode: MergerMode) {
        self.merger0[merger.index() as usize] = mode;
    }

    /// Set a level-1 merger.
    pub fn set_merger1(&mut self, merger: Merger1, mode: MergerMode) {
        self.merger1[merger.index() as usize] = mode;
    }

    /// Set a level-2 merger.
    pub fn set_merger2(&mut self, merger: Merger2, mode: MergerMode) {
        self.merger2[merger.index() as usize] = mode;
    }

    /// Set the level-3 merger.
    pub fn set_merger3(&mut self, merger: Merger3, mode: MergerMode) {
        self.merger3[merger.index() as usize] = mode;
    }

    /// Set a DNC merger.
    pub fn set_dnc_merger(&mut self, merger: DncMerger, mode: MergerMode, slow: bool) {
        self.dnc_mergers[merger.index() as usize] = DncMergerConfig { mode, slow };
    }

    /// Set a gbit link direction.
    pub fn set_gbit_link(&mut self, link: GbitLink, direction: GbitDirection) {
        self.gbit_links[link.index() as usize] = direction;
    }

    /// Configure a background generator.
    pub fn set_background(&mut self, index: u8, config: BackgroundGeneratorConfig) {
        self.background[index as usize] = config;
    }

    /// Enable a sending repeater.
    pub fn enable_sending_repeater(&mut self, repeater: SendingRepeater) {
        self.sending_repeaters[repeater.index() as usize] = true;
    }
}

/// Digital registers of one denmem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeuronRegister {
    /// L1 address emitted on spikes.
    pub address: L1Address,
    /// Spike generation enabled.
    pub activate_firing: bool,
    /// Events forwarded into the merger tree.
    pub enable_spl1_output: bool,
}

impl Default for NeuronRegister {
    fn default() -> Self {
        Self { address: L1Address::LOCKING, activate_firing: false, enable_spl1_output: false }
    }
}

/// Analog (floating-gate) parameter DACs of one denmem. Values are 10-bit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwNeuronParameters {
    /// Leak (resting) potential.
    pub e_l: u16,
    /// Threshold potential.
    pub v_t: u16,
    /// Reset potential.
    pub v_reset: u16,
    /// Leak conductance.
    pub i_gl: u16,
    /// Refractory current (larger means shorter refractory period).
    pub i_pl: u16,
    /// Excitatory synaptic time-constant bias.
    pub v_syntc_e: u16,
    /// Inhibitory synaptic time-constant bias.
    pub v_syntc_i: u16,
    /// Excitatory reversal potential.
    pub e_syn_e: u16,
    /// Inhibitory reversal potential.
    pub e_syn_i: u16,
    /// Exponential-term slope (adaptive cells; 0 disables).
    pub v_exp: u16,
    /// Sub-threshold adaptation conductance (adaptive cells).
    pub i_radapt_a: u16,
    /// Spike-triggered adaptation (adaptive cells).
    pub i_fire_b: u16,
    /// Adaptation time constant (adaptive cells).
    pub i_radapt_tau: u16,
}

/// Register image of a shared floating-gate block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedBlockRegisters {
    /// Shared reset potential DAC.
    pub v_reset: u16,
    /// The four selectable maximum-conductance voltages.
    pub v_gmax: [u16; 4],
}

impl Default for SharedBlockRegisters {
    fn default() -> Self {
        Self { v_reset: 0, v_gmax: [100, 200, 400, 800] }
    }
}

/// Per-row driver configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRowConfig {
    /// Which of the four shared `v_gmax` values this row uses.
    pub gmax_sel: u8,
    /// Conductance divider, 1..=15.
    pub gmax_div: u8,
}

/// Register image of one synapse driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Driver listens on its synapse switch (first driver of a chain).
    pub enable: bool,
    /// Driver is fed by its chain neighbour instead of a switch.
    pub mirror: bool,
    /// Top/bottom row configurations.
    pub rows: [DriverRowConfig; 2],
}

/// Register image of one chip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChipDescriptor {
    /// Digital denmem registers; absent means reset state.
    pub neurons: BTreeMap<DenmemOnChip, NeuronRegister>,
    /// Analog denmem parameters.
    pub analog_neurons: BTreeMap<DenmemOnChip, HwNeuronParameters>,
    /// Horizontal spans of interconnected denmem columns.
    pub denmem_spans: Vec<(u16, u16)>,
    /// Event-network registers.
    pub layer1: Layer1,
    /// Synapse driver registers.
    pub drivers: BTreeMap<SynapseDriverOnChip, DriverConfig>,
    /// 4-bit synapse weights per row.
    pub synapse_weights: BTreeMap<SynapseRowOnChip, Vec<u8>>,
    /// Shared floating-gate blocks.
    pub floating_gates: BTreeMap<FgBlockOnChip, SharedBlockRegisters>,
    /// Big membrane capacitors selected.
    pub use_big_capacitors: bool,
    /// Denmem recorded per analog output.
    pub analog_recorders: BTreeMap<AnalogOutput, DenmemOnChip>,
    /// Input spike trains per gbit link.
    pub input_spikes: BTreeMap<GbitLink, Vec<Spike>>,
    /// Spikes received during an experiment (filled by the back-end).
    pub received: BTreeMap<GbitLink, Vec<Spike>>,
    /// Spikes sent during an experiment (filled by the back-end).
    pub sent: BTreeMap<GbitLink, Vec<Spike>>,
}

impl ChipDescriptor {
    /// Digital registers of `denmem`, creating the reset state on first
    /// access.
    pub fn neuron_mut(&mut self, denmem: DenmemOnChip) -> &mut NeuronRegister {
        self.neurons.entry(denmem).or_default()
    }

    /// Analog parameters of `denmem`, creating zeroes on first access.
    pub fn analog_neuron_mut(&mut self, denmem: DenmemOnChip) -> &mut HwNeuronParameters {
        self.analog_neurons.entry(denmem).or_default()
    }

    /// Interconnect the denmem columns `x_min..=x_max` (both rows) into one
    /// electrical neuron.
    pub fn connect_denmems(&mut self, x_min: u16, x_max: u16) {
        trace!(x_min, x_max, "connecting denmems");
        if !self.denmem_spans.contains(&(x_min, x_max)) {
            self.denmem_spans.push((x_min, x_max));
        }
    }

    /// Weight row of `row`, creating an all-zero row on first access.
    pub fn synapse_row_mut(&mut self, row: SynapseRowOnChip) -> &mut Vec<u8> {
        self.synapse_weights
            .entry(row)
            .or_insert_with(|| vec![0; SYNAPSE_COLUMNS_PER_ROW as usize])
    }

    /// Driver registers, creating the reset state on first access.
    pub fn driver_mut(&mut self, driver: SynapseDriverOnChip) -> &mut DriverConfig {
        self.drivers.entry(driver).or_default()
    }

    /// Shared floating-gate block registers.
    pub fn floating_gates_mut(&mut self, block: FgBlockOnChip) -> &mut SharedBlockRegisters {
        self.floating_gates.entry(block).or_default()
    }

    /// Record the denmem to be traced on an analog output.
    pub fn set_analog_recorder(&mut self, aout: AnalogOutput, denmem: DenmemOnChip) {
        self.analog_recorders.insert(aout, denmem);
    }

    /// Queue input spikes on a gbit link. Spikes are kept in the order
    /// given; the back-end sorts before replay.
    pub fn send_spikes(&mut self, link: GbitLink, spikes: Vec<Spike>) {
        self.input_spikes.entry(link).or_default().extend(spikes);
    }

    /// Spikes received on a link during the experiment.
    #[must_use]
    pub fn received_spikes(&self, link: GbitLink) -> &[Spike] {
        self.received.get(&link).map_or(&[], Vec::as_slice)
    }

    /// Spikes sent on a link during the experiment.
    #[must_use]
    pub fn sent_spikes(&self, link: GbitLink) -> &[Spike] {
        self.sent.get(&link).map_or(&[], Vec::as_slice)
    }
}

/// The whole-wafer register image: one [`ChipDescriptor`] per touched
/// chip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaferDescriptor {
    /// The wafer module.
    pub wafer: Wafer,
    /// Per-chip register images, created on first touch.
    pub chips: BTreeMap<ChipOnWafer, ChipDescriptor>,
}

impl WaferDescriptor {
    /// An empty descriptor for `wafer`.
    #[must_use]
    pub fn new(wafer: Wafer) -> Self {
        Self { wafer, chips: BTreeMap::new() }
    }

    /// Register image of `chip`, created on first access.
    pub fn chip_mut(&mut self, chip: ChipOnWafer) -> &mut ChipDescriptor {
        self.chips.entry(chip).or_default()
    }

    /// Register image of `chip`, if it has been touched.
    #[must_use]
    pub fn chip(&self, chip: ChipOnWafer) -> Option<&ChipDescriptor> {
        self.chips.get(&chip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wafermap_chip::RowOnChip;

    #[test]
    fn chip_images_created_on_demand() {
        let mut wafer = WaferDescriptor::new(Wafer(0));
        let chip = ChipOnWafer::new(0, 0);
        assert!(wafer.chip(chip).is_none());
        wafer.chip_mut(chip).connect_denmems(0, 1);
        assert_eq!(wafer.chip(chip).unwrap().denmem_spans, vec![(0, 1)]);
    }

    #[test]
    fn synapse_rows_initialise_to_zero() {
        let mut chip = ChipDescriptor::default();
        let row = SynapseRowOnChip {
            driver: SynapseDriverOnChip::new(wafermap_chip::Side::Left, 0),
            row: RowOnChip::Top,
        };
        let weights = chip.synapse_row_mut(row);
        assert_eq!(weights.len(), 256);
        assert!(weights.iter().all(|&w| w == 0));
    }

    #[test]
    fn spikes_accumulate_per_link() {
        let mut chip = ChipDescriptor::default();
        let link = GbitLink::new(3);
        chip.send_spikes(link, vec![Spike { address: L1Address::new(1), time: 1e-6 }]);
        chip.send_spikes(link, vec![Spike { address: L1Address::new(2), time: 2e-6 }]);
        assert_eq!(chip.input_spikes[&link].len(), 2);
        assert!(chip.received_spikes(link).is_empty());
    }
}
