//! Wafer topology for the wafermap compiler.
//!
//! This crate knows *where things are* on the wafer-scale neuromorphic
//! substrate: typed coordinates for every addressable hardware location,
//! the static switch tables of the on-chip event network, and the
//! [`L1Route`] type whose construction enforces the legal-adjacency rules
//! of that network.
//!
//! Nothing in here allocates hardware or holds mapping state; that is the
//! job of `wafermap-core`. This crate is the single source of structural
//! truth the rest of the stack validates against.
//!
//! # Topology summary
//!
//! | Unit | Count per chip |
//! |------|----------------|
//! | Neuron blocks | 8 |
//! | Denmems | 512 (8 × 32 × 2) |
//! | Horizontal L1 buses | 64 |
//! | Vertical L1 buses | 256 (128 per side) |
//! | Synapse drivers | 224 (112 per side) |
//! | DNC mergers / gbit links | 8 |

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod coords;
mod route;
mod switches;

pub use coords::{
    AnalogOutput, ChipOnWafer, DenmemOnBlock, DenmemOnChip, DenmemOnWafer, DncMerger,
    DncMergerOnWafer, FgBlockOnChip, FpgaOnWafer, GbitLink, HLine, L1Address, Merger0, Merger1,
    Merger2, Merger3, NeuronBlockOnChip, NeuronBlockOnWafer, RowOnChip, SendingRepeater, Side,
    SynapseColumn, SynapseDriverOnChip, SynapseOnChip, SynapseRowOnChip, VLine, Wafer,
    CHIP_GRID_HEIGHT, CHIP_GRID_WIDTH, DENMEM_COLUMNS_PER_BLOCK, DNC_MERGERS_PER_CHIP,
    DRIVERS_PER_SIDE, HLINES_PER_CHIP, NEURON_BLOCKS_PER_CHIP, SYNAPSE_COLUMNS_PER_ROW,
    VLINES_PER_CHIP, VLINES_PER_SIDE,
};
pub use route::{InvalidRouteError, L1Route, L1RouteTree, Segment};
pub use switches::{
    crossbar_exists, crossbar_vlines, reachable_drivers, synapse_switch_exists,
    SYNAPSE_SWITCH_PERIOD,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        ChipOnWafer, DncMerger, DncMergerOnWafer, HLine, InvalidRouteError, L1Address, L1Route,
        L1RouteTree, NeuronBlockOnChip, Segment, SynapseDriverOnChip, VLine, Wafer,
    };
}
