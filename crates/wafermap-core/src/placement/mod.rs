//! Placement stages: neurons onto denmems, merger routing, addresses and
//! external inputs.

pub mod address;
pub mod input;
pub mod merger;
pub mod neurons;

pub use address::{L1AddressAssignment, L1AddressPool, MergerUse, ADDRESSES_PER_MERGER};
pub use input::{InputPlacement, MAX_RATE_CHIP, MAX_RATE_FPGA};
pub use merger::{MergerRouting, MergerRoutingResult, WaferL1AddressAssignment};
pub use neurons::{NeuronPlacer, OnNeuronBlock};
