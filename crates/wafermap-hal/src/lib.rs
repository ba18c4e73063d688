//! Hardware access layer for the wafer system.
//!
//! Three concerns live here, all below the mapping pipeline:
//!
//! * the **resource manager** — which chips exist, which are defective,
//!   which have been claimed by the mapping;
//! * the **hardware descriptor** — an in-memory register image per chip
//!   that the pipeline stages write into and a configuration back-end
//!   later flushes to silicon or to a simulator;
//! * the **calibration database** — per-chip analog calibration data with
//!   a built-in default backend and a file backend.
//!
//! The descriptor performs no I/O and no validation beyond coordinate
//! ranges; semantic rules (which merger may feed which bus, and so on)
//! are the mapping pipeline's job.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod calib;
mod resources;
mod wafer;

pub use calib::{
    resolve_calib_path, CalibBackendKind, CalibrationError, ChipCalibration, GmaxConfig,
    NeuronCalibration, SharedCalibration, SynapseRowCalibration, BIG_CAP_FARAD, DAC_MAX,
    MAX_FG_VOLTAGE, SMALL_CAP_FARAD,
};
pub use resources::{ResourceManager, ResourceManifest};
pub use wafer::{
    BackgroundGeneratorConfig, ChipDescriptor, DncMergerConfig, DriverConfig, DriverRowConfig,
    GbitDirection, HwNeuronParameters, Layer1, MergerMode, NeuronRegister, SharedBlockRegisters,
    Spike, WaferDescriptor,
};
