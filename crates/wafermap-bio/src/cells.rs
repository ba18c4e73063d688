//! Cell types and per-cell parameter vectors.
//!
//! Two analog neuron models are supported (leaky integrate-and-fire and
//! adaptive exponential, both with conductance-based exponential synapses)
//! plus two spike-source types that exist only as event producers. Each
//! population holds one parameter set per cell; the enum keeps the vectors
//! typed so that a mapping stage asking for, say, `v_reset` of a spike
//! source is a handled error instead of a silent default.

use serde::{Deserialize, Serialize};

use crate::error::{BioError, Result};

/// The supported cell types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    /// Leaky integrate-and-fire with conductance-based exponential synapses.
    IfCondExp,
    /// Adaptive exponential integrate-and-fire (spike-frequency adaptation
    /// and sub-threshold adaptation), conductance-based synapses.
    EifCondExpIsfaIsta,
    /// External source replaying a fixed spike train.
    SpikeSourceArray,
    /// External Poisson spike source.
    SpikeSourcePoisson,
}

impl CellType {
    /// Whether populations of this type are external event sources (no
    /// denmems are allocated for them).
    #[must_use]
    pub const fn is_source(self) -> bool {
        matches!(self, Self::SpikeSourceArray | Self::SpikeSourcePoisson)
    }
}

impl std::fmt::Display for CellType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::IfCondExp => "IF_cond_exp",
            Self::EifCondExpIsfaIsta => "EIF_cond_exp_isfa_ista",
            Self::SpikeSourceArray => "SpikeSourceArray",
            Self::SpikeSourcePoisson => "SpikeSourcePoisson",
        };
        f.write_str(name)
    }
}

/// Synaptic input class of a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SynapseType {
    /// Excitatory input (reversal potential `e_rev_e`).
    Excitatory,
    /// Inhibitory input (reversal potential `e_rev_i`).
    Inhibitory,
}

/// Parameters of one leaky integrate-and-fire cell. Voltages in mV, times
/// in ms, capacitance in nF, rates via the projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifParameters {
    /// Resting potential.
    pub v_rest: f64,
    /// Reset potential after a spike.
    pub v_reset: f64,
    /// Firing threshold.
    pub v_thresh: f64,
    /// Membrane capacitance in nF.
    pub cm: f64,
    /// Membrane time constant in ms.
    pub tau_m: f64,
    /// Refractory period in ms.
    pub tau_refrac: f64,
    /// Excitatory synaptic time constant in ms.
    pub tau_syn_e: f64,
    /// Inhibitory synaptic time constant in ms.
    pub tau_syn_i: f64,
    /// Excitatory reversal potential.
    pub e_rev_e: f64,
    /// Inhibitory reversal potential.
    pub e_rev_i: f64,
}

impl Default for LifParameters {
    fn default() -> Self {
        Self {
            v_rest: -65.0,
            v_reset: -65.0,
            v_thresh: -50.0,
            cm: 1.0,
            tau_m: 20.0,
            tau_refrac: 0.1,
            tau_syn_e: 5.0,
            tau_syn_i: 5.0,
            e_rev_e: 0.0,
            e_rev_i: -70.0,
        }
    }
}

/// Parameters of one adaptive exponential integrate-and-fire cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdexParameters {
    /// The embedded leaky integrate-and-fire parameters.
    #[serde(flatten)]
    pub lif: LifParameters,
    /// Sub-threshold adaptation conductance in nS.
    pub a: f64,
    /// Spike-triggered adaptation increment in nA.
    pub b: f64,
    /// Slope factor of the exponential term in mV.
    pub delta_t: f64,
    /// Adaptation time constant in ms.
    pub tau_w: f64,
    /// Spike detection voltage.
    pub v_spike: f64,
}

impl Default for AdexParameters {
    fn default() -> Self {
        Self {
            lif: LifParameters::default(),
            a: 4.0,
            b: 0.0805,
            delta_t: 2.0,
            tau_w: 144.0,
            v_spike: -40.0,
        }
    }
}

/// Parameters of one spike-source-array cell: its replayed spike train.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpikeSourceParameters {
    /// Spike times in seconds of biological time, ascending.
    pub spike_times: Vec<f64>,
}

/// Parameters of one Poisson spike source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoissonSourceParameters {
    /// Mean rate in Hz of biological time.
    pub rate: f64,
    /// Start of the active window in seconds.
    pub start: f64,
    /// Duration of the active window in seconds.
    pub duration: f64,
}

impl Default for PoissonSourceParameters {
    fn default() -> Self {
        Self { rate: 10.0, start: 0.0, duration: 1.0 }
    }
}

/// The typed per-cell parameter vector of a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellParameters {
    /// One parameter set per `IF_cond_exp` cell.
    IfCondExp(Vec<LifParameters>),
    /// One parameter set per `EIF_cond_exp_isfa_ista` cell.
    EifCondExpIsfaIsta(Vec<AdexParameters>),
    /// One spike train per source cell.
    SpikeSourceArray(Vec<SpikeSourceParameters>),
    /// One rate description per source cell.
    SpikeSourcePoisson(Vec<PoissonSourceParameters>),
}

impl CellParameters {
    /// The cell type these parameters describe.
    #[must_use]
    pub const fn cell_type(&self) -> CellType {
        match self {
            Self::IfCondExp(_) => CellType::IfCondExp,
            Self::EifCondExpIsfaIsta(_) => CellType::EifCondExpIsfaIsta,
            Self::SpikeSourceArray(_) => CellType::SpikeSourceArray,
            Self::SpikeSourcePoisson(_) => CellType::SpikeSourcePoisson,
        }
    }

    /// Number of parameter sets held.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::IfCondExp(v) => v.len(),
            Self::EifCondExpIsfaIsta(v) => v.len(),
            Self::SpikeSourceArray(v) => v.len(),
            Self::SpikeSourcePoisson(v) => v.len(),
        }
    }

    /// Whether no parameter sets are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset potential of cell `index`, in mV. Defined for the analog cell
    /// types only.
    ///
    /// # Errors
    ///
    /// [`BioError::UnsupportedCellType`] for spike sources.
    pub fn v_reset(&self, index: usize) -> Result<f64> {
        match self {
            Self::IfCondExp(v) => Ok(v[index].v_reset),
            Self::EifCondExpIsfaIsta(v) => Ok(v[index].lif.v_reset),
            other => Err(BioError::unsupported(other.cell_type())),
        }
    }

    /// Membrane capacitance of cell `index`, in nF.
    ///
    /// # Errors
    ///
    /// [`BioError::UnsupportedCellType`] for spike sources.
    pub fn cm(&self, index: usize) -> Result<f64> {
        match self {
            Self::IfCondExp(v) => Ok(v[index].cm),
            Self::EifCondExpIsfaIsta(v) => Ok(v[index].lif.cm),
            other => Err(BioError::unsupported(other.cell_type())),
        }
    }

    /// The synapse input classes cell `index` needs, in the order rows are
    /// assigned to them. Conductance-based cells need one excitatory and
    /// one inhibitory input.
    ///
    /// # Errors
    ///
    /// [`BioError::UnsupportedCellType`] for spike sources (they receive
    /// no synapses).
    pub fn synapse_targets(&self, _index: usize) -> Result<Vec<SynapseType>> {
        match self {
            Self::IfCondExp(_) | Self::EifCondExpIsfaIsta(_) => {
                Ok(vec![SynapseType::Excitatory, SynapseType::Inhibitory])
            }
            other => Err(BioError::unsupported(other.cell_type())),
        }
    }

    /// Estimated hardware-time firing rate of source cell `index`, in Hz.
    ///
    /// The wafer runs `speedup` times faster than biology, so a source
    /// firing at rate `r` in biological time loads the event network with
    /// `r · speedup` events per hardware second.
    ///
    /// # Errors
    ///
    /// [`BioError::UnsupportedCellType`] for non-source cells.
    pub fn estimated_hw_rate(&self, index: usize, speedup: f64) -> Result<f64> {
        match self {
            Self::SpikeSourceArray(v) => {
                let spikes = &v[index].spike_times;
                if spikes.len() < 2 {
                    return Ok(0.0);
                }
                let window = spikes.last().unwrap() - spikes.first().unwrap();
                if window <= 0.0 {
                    return Ok(0.0);
                }
                #[allow(clippy::cast_precision_loss)]
                Ok((spikes.len() - 1) as f64 / window * speedup)
            }
            Self::SpikeSourcePoisson(v) => Ok(v[index].rate * speedup),
            other => Err(BioError::unsupported(other.cell_type())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_types_are_flagged() {
        assert!(CellType::SpikeSourceArray.is_source());
        assert!(CellType::SpikeSourcePoisson.is_source());
        assert!(!CellType::IfCondExp.is_source());
        assert!(!CellType::EifCondExpIsfaIsta.is_source());
    }

    #[test]
    fn v_reset_rejects_sources() {
        let params = CellParameters::SpikeSourcePoisson(vec![PoissonSourceParameters::default()]);
        assert_eq!(
            params.v_reset(0),
            Err(BioError::UnsupportedCellType { cell_type: CellType::SpikeSourcePoisson })
        );
    }

    #[test]
    fn array_rate_estimate_scales_with_speedup() {
        // 11 spikes over 1 s of biological time: 10 Hz.
        let times: Vec<f64> = (0..11).map(|i| f64::from(i) * 0.1).collect();
        let params =
            CellParameters::SpikeSourceArray(vec![SpikeSourceParameters { spike_times: times }]);
        let rate = params.estimated_hw_rate(0, 1.0e4).unwrap();
        assert!((rate - 10.0 * 1.0e4).abs() < 1e-6);
    }

    #[test]
    fn poisson_rate_estimate() {
        let params = CellParameters::SpikeSourcePoisson(vec![PoissonSourceParameters {
            rate: 100.0,
            ..PoissonSourceParameters::default()
        }]);
        assert!((params.estimated_hw_rate(0, 1.0e4).unwrap() - 1.0e6).abs() < 1e-9);
    }
}
