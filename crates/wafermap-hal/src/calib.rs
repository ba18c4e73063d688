//! Analog calibration data.
//!
//! Translating biological parameters into floating-gate DACs needs
//! per-chip calibration curves. Two backends exist: the built-in defaults
//! (ideal curves, good enough for the simulator back-end), and a file
//! backend loading one JSON document per chip from a calibration
//! directory. The directory is taken from the configuration; the
//! `WAFERMAP_CALIB_PATH` environment variable may stand in for an empty
//! configuration value, but setting both is a hard error so that runs
//! never silently pick the wrong database.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use wafermap_chip::{ChipOnWafer, Wafer};

/// Environment variable standing in for an empty `calib_path`.
pub const CALIB_PATH_ENV: &str = "WAFERMAP_CALIB_PATH";

/// Maximum floating-gate DAC value (10 bit).
pub const DAC_MAX: u16 = 1023;
/// Floating-gate full-scale voltage in volts.
pub const MAX_FG_VOLTAGE: f64 = 1.8;
/// Membrane capacitance of one denmem with the big capacitor selected, in
/// farad.
pub const BIG_CAP_FARAD: f64 = 2.164_56e-12;
/// Membrane capacitance of one denmem with the small capacitor selected.
pub const SMALL_CAP_FARAD: f64 = 1.642_5e-13;

/// Result alias for calibration access.
pub type Result<T> = std::result::Result<T, CalibrationError>;

/// Errors raised while resolving or loading calibration data.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// `calib_path` and the environment variable are both set.
    #[error(
        "colliding settings: {CALIB_PATH_ENV} and calib_path are both set; unset one of them"
    )]
    CollidingPathSettings,

    /// The file backend was selected but no path is available.
    #[error("file calibration backend selected but no calibration path configured")]
    MissingPath,

    /// A per-chip calibration file is missing.
    #[error("calibration file not found: {path}")]
    FileNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// A calibration file failed to parse.
    #[error("unparseable calibration file {path}: {reason}")]
    Unparseable {
        /// Offending file.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },

    /// I/O error while reading calibration data.
    #[error("calibration I/O error: {source}")]
    Io {
        /// Underlying error.
        #[from]
        source: std::io::Error,
    },
}

/// Which calibration backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibBackendKind {
    /// Built-in ideal calibration.
    #[default]
    Default,
    /// One JSON document per chip under the calibration path.
    File,
}

/// Resolve the calibration directory from the configured value and the
/// environment.
///
/// # Errors
///
/// [`CalibrationError::CollidingPathSettings`] when both the configured
/// path and the environment variable are non-empty.
pub fn resolve_calib_path(configured: &str) -> Result<Option<PathBuf>> {
    match std::env::var(CALIB_PATH_ENV) {
        Ok(env_path) if !env_path.is_empty() => {
            if !configured.is_empty() {
                return Err(CalibrationError::CollidingPathSettings);
            }
            Ok(Some(PathBuf::from(env_path)))
        }
        _ if configured.is_empty() => Ok(None),
        _ => Ok(Some(PathBuf::from(configured))),
    }
}

/// Affine DAC transformation: `dac = clamp(round((value − offset) · gain))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DacCurve {
    /// DAC counts per unit.
    pub gain: f64,
    /// Unit offset subtracted before scaling.
    pub offset: f64,
}

impl DacCurve {
    /// Apply the curve.
    #[must_use]
    pub fn dac(&self, value: f64) -> u16 {
        let raw = (value - self.offset) * self.gain;
        if raw <= 0.0 {
            return 0;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let dac = raw.round() as u32;
        u16::try_from(dac.min(u32::from(DAC_MAX))).unwrap()
    }
}

/// Ideal voltage curve: full scale over 1.8 V.
fn ideal_voltage_curve() -> DacCurve {
    DacCurve { gain: f64::from(DAC_MAX) / MAX_FG_VOLTAGE, offset: 0.0 }
}

/// Per-chip neuron calibration curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeuronCalibration {
    /// Voltage-type parameters (potentials, in hardware volts).
    pub voltage: DacCurve,
    /// Leak-conductance parameter, in hardware nS.
    pub conductance: DacCurve,
    /// Synaptic time-constant bias, in hardware seconds.
    pub syn_tc: DacCurve,
    /// Refractory bias; input is hardware seconds, curve is reciprocal
    /// before the affine step (shorter period, larger current).
    pub refrac: DacCurve,
}

impl Default for NeuronCalibration {
    fn default() -> Self {
        Self {
            voltage: ideal_voltage_curve(),
            // Full scale at 2.5 µS of leak conductance.
            conductance: DacCurve { gain: f64::from(DAC_MAX) / 2500.0, offset: 0.0 },
            // Full scale at 10 µs synaptic time constant.
            syn_tc: DacCurve { gain: f64::from(DAC_MAX) / 1.0e-5, offset: 0.0 },
            // One DAC count per 10 ns of inverse refractory period.
            refrac: DacCurve { gain: 1.0e-8, offset: 0.0 },
        }
    }
}

impl NeuronCalibration {
    /// DAC for a membrane/reversal potential given in hardware volts.
    #[must_use]
    pub fn voltage_dac(&self, volts: f64) -> u16 {
        self.voltage.dac(volts)
    }

    /// DAC for a leak conductance given in hardware nS.
    #[must_use]
    pub fn conductance_dac(&self, nano_siemens: f64) -> u16 {
        self.conductance.dac(nano_siemens)
    }

    /// DAC for a synaptic time constant given in hardware seconds.
    #[must_use]
    pub fn syn_tc_dac(&self, seconds: f64) -> u16 {
        self.syn_tc.dac(seconds)
    }

    /// DAC for a refractory period given in hardware seconds.
    #[must_use]
    pub fn refrac_dac(&self, seconds: f64) -> u16 {
        if seconds <= 0.0 {
            return DAC_MAX;
        }
        self.refrac.dac(1.0 / seconds)
    }
}

/// Calibration of the shared floating-gate blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedCalibration {
    /// Voltage curve for shared potentials.
    pub voltage: DacCurve,
}

impl Default for SharedCalibration {
    fn default() -> Self {
        Self { voltage: ideal_voltage_curve() }
    }
}

impl SharedCalibration {
    /// DAC for the common reset potential of a block, given in hardware
    /// volts.
    #[must_use]
    pub fn apply_shared_calibration(&self, v_reset_volts: f64) -> u16 {
        self.voltage.dac(v_reset_volts)
    }
}

/// A row conductance configuration: one of four shared `v_gmax` voltages
/// and a per-row divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GmaxConfig {
    /// Selected `v_gmax` voltage, 0..4.
    pub sel_vgmax: u8,
    /// Divider, 1..=15.
    pub gmax_div: u8,
}

impl GmaxConfig {
    /// All configurations, deterministic order: ascending reachable
    /// maximum conductance.
    fn iter_all() -> impl Iterator<Item = Self> {
        (0..4u8).flat_map(|sel| (1..=15u8).map(move |div| Self { sel_vgmax: sel, gmax_div: div }))
    }
}

/// Synapse-row calibration: maps row conductance configurations to the
/// analog weight range and quantises weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynapseRowCalibration {
    /// Maximum analog conductance in nS reachable per `v_gmax` selector at
    /// divider 1.
    pub gmax_base_ns: [f64; 4],
}

impl Default for SynapseRowCalibration {
    fn default() -> Self {
        Self { gmax_base_ns: [500.0, 1000.0, 2000.0, 4000.0] }
    }
}

impl SynapseRowCalibration {
    /// The simulator back-end ships its own synapse transformation curves.
    #[must_use]
    pub fn ess_defaults() -> Self {
        Self { gmax_base_ns: [250.0, 500.0, 1000.0, 2000.0] }
    }

    /// Maximum analog weight reachable with `config`, in nS.
    #[must_use]
    pub fn max_analog_weight(&self, config: GmaxConfig) -> f64 {
        self.gmax_base_ns[config.sel_vgmax as usize] / f64::from(config.gmax_div)
    }

    /// Pick the configuration that minimises clipping for a row whose
    /// largest scaled weight is `max_weight_ns`: the smallest reachable
    /// maximum that still covers it, or the overall largest when nothing
    /// does.
    #[must_use]
    pub fn find_best_gmax_config(&self, max_weight_ns: f64) -> GmaxConfig {
        let mut best_covering: Option<(f64, GmaxConfig)> = None;
        let mut largest: (f64, GmaxConfig) =
            (f64::MIN, GmaxConfig { sel_vgmax: 0, gmax_div: 1 });

        for config in GmaxConfig::iter_all() {
            let max = self.max_analog_weight(config);
            if max > largest.0 {
                largest = (max, config);
            }
            if max >= max_weight_ns {
                match best_covering {
                    Some((best, _)) if best <= max => {}
                    _ => best_covering = Some((max, config)),
                }
            }
        }

        best_covering.map_or(largest.1, |(_, config)| config)
    }

    /// Quantise a scaled weight (nS) to the 4-bit digital value under
    /// `config`.
    #[must_use]
    pub fn digital_weight(&self, weight_ns: f64, config: GmaxConfig) -> u8 {
        let max = self.max_analog_weight(config);
        if max <= 0.0 || weight_ns <= 0.0 {
            return 0;
        }
        let step = max / 15.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let digital = (weight_ns / step).round() as u32;
        u8::try_from(digital.min(15)).unwrap()
    }

    /// Analog weight realised by a digital value under `config`, in nS.
    #[must_use]
    pub fn analog_weight(&self, digital: u8, config: GmaxConfig) -> f64 {
        self.max_analog_weight(config) / 15.0 * f64::from(digital.min(15))
    }
}

/// The full calibration record of one chip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChipCalibration {
    /// PLL frequency the calibration was taken at, in Hz.
    pub pll_frequency: f64,
    /// Neuron parameter curves.
    pub neuron: NeuronCalibration,
    /// Shared-block curves.
    pub shared: SharedCalibration,
    /// Synapse-row curves.
    pub synapse_rows: SynapseRowCalibration,
}

impl Default for ChipCalibration {
    fn default() -> Self {
        Self {
            pll_frequency: 100e6,
            neuron: NeuronCalibration::default(),
            shared: SharedCalibration::default(),
            synapse_rows: SynapseRowCalibration::default(),
        }
    }
}

impl ChipCalibration {
    /// File name of a chip's calibration record.
    #[must_use]
    pub fn file_name(wafer: Wafer, chip: ChipOnWafer) -> String {
        format!("w{}-h{}.json", wafer.0, chip.id())
    }

    /// Load the calibration of one chip.
    ///
    /// # Errors
    ///
    /// File-backend failures ([`CalibrationError`]) are fatal before any
    /// hardware write.
    pub fn load(
        backend: CalibBackendKind,
        calib_path: Option<&Path>,
        wafer: Wafer,
        chip: ChipOnWafer,
    ) -> Result<Self> {
        match backend {
            CalibBackendKind::Default => {
                debug!(%chip, "using default calibration");
                Ok(Self::default())
            }
            CalibBackendKind::File => {
                let dir = calib_path.ok_or(CalibrationError::MissingPath)?;
                let path = dir.join(Self::file_name(wafer, chip));
                info!(path = %path.display(), "loading calibration file");
                if !path.exists() {
                    return Err(CalibrationError::FileNotFound { path });
                }
                let data = std::fs::read_to_string(&path)?;
                serde_json::from_str(&data).map_err(|e| CalibrationError::Unparseable {
                    path,
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Warn when the configured PLL frequency disagrees with the
    /// calibration record.
    pub fn check_pll(&self, configured_hz: f64) {
        #[allow(clippy::float_cmp)]
        if self.pll_frequency != configured_hz {
            warn!(
                calibration_mhz = self.pll_frequency / 1e6,
                configured_mhz = configured_hz / 1e6,
                "PLL frequency in calibration differs from configuration"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_dac_is_clamped_and_monotone() {
        let calib = NeuronCalibration::default();
        assert_eq!(calib.voltage_dac(-1.0), 0);
        assert_eq!(calib.voltage_dac(0.0), 0);
        assert_eq!(calib.voltage_dac(MAX_FG_VOLTAGE), DAC_MAX);
        assert_eq!(calib.voltage_dac(10.0), DAC_MAX);
        assert!(calib.voltage_dac(0.5) < calib.voltage_dac(0.9));
    }

    #[test]
    fn half_scale_voltage() {
        let calib = NeuronCalibration::default();
        assert_eq!(calib.voltage_dac(0.9), 512);
    }

    #[test]
    fn gmax_config_prefers_tight_cover() {
        let calib = SynapseRowCalibration::default();
        let config = calib.find_best_gmax_config(480.0);
        // 500/1 covers 480 more tightly than any other combination.
        assert_eq!(config, GmaxConfig { sel_vgmax: 0, gmax_div: 1 });

        let config = calib.find_best_gmax_config(90.0);
        assert!((calib.max_analog_weight(config) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn gmax_config_falls_back_to_largest() {
        let calib = SynapseRowCalibration::default();
        let config = calib.find_best_gmax_config(1e9);
        assert_eq!(config, GmaxConfig { sel_vgmax: 3, gmax_div: 1 });
    }

    #[test]
    fn digital_weights_clip_at_fifteen() {
        let calib = SynapseRowCalibration::default();
        let config = GmaxConfig { sel_vgmax: 0, gmax_div: 1 };
        assert_eq!(calib.digital_weight(0.0, config), 0);
        assert_eq!(calib.digital_weight(500.0, config), 15);
        assert_eq!(calib.digital_weight(1e6, config), 15);
        let mid = calib.digital_weight(250.0, config);
        assert!((7..=8).contains(&mid));
    }

    #[test]
    fn file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let wafer = Wafer(3);
        let chip = ChipOnWafer::new(4, 2);
        let calib = ChipCalibration::default();
        let path = dir.path().join(ChipCalibration::file_name(wafer, chip));
        std::fs::write(&path, serde_json::to_string(&calib).unwrap()).unwrap();

        let loaded =
            ChipCalibration::load(CalibBackendKind::File, Some(dir.path()), wafer, chip).unwrap();
        assert_eq!(loaded, calib);

        let missing = ChipCalibration::load(
            CalibBackendKind::File,
            Some(dir.path()),
            wafer,
            ChipOnWafer::new(0, 0),
        );
        assert!(matches!(missing, Err(CalibrationError::FileNotFound { .. })));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let wafer = Wafer(0);
        let chip = ChipOnWafer::new(0, 0);
        let path = dir.path().join(ChipCalibration::file_name(wafer, chip));
        std::fs::write(&path, r#"{"pll_frequency": 1.0, "bogus": 1}"#).unwrap();
        let result = ChipCalibration::load(CalibBackendKind::File, Some(dir.path()), wafer, chip);
        assert!(matches!(result, Err(CalibrationError::Unparseable { .. })));
    }
}
