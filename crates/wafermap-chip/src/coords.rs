//! Typed coordinates for every addressable location on the wafer.
//!
//! All coordinate types are small `Copy` values with checked constructors.
//! Ranges are enforced on construction so that downstream code can rely on
//! every held value being a real hardware location. Conversions between
//! related locations (merger → sending repeater → horizontal bus, driver →
//! switch row, bus continuations across chip boundaries) live here because
//! they are properties of the silicon, not of any mapping step.

use serde::{Deserialize, Serialize};

/// Chips per wafer row.
pub const CHIP_GRID_WIDTH: u8 = 36;
/// Chips per wafer column.
pub const CHIP_GRID_HEIGHT: u8 = 16;
/// Neuron blocks per chip.
pub const NEURON_BLOCKS_PER_CHIP: u8 = 8;
/// Denmem columns per neuron block (each column holds a top and a bottom denmem).
pub const DENMEM_COLUMNS_PER_BLOCK: u8 = 32;
/// Horizontal L1 buses per chip.
pub const HLINES_PER_CHIP: u8 = 64;
/// Vertical L1 buses per chip.
pub const VLINES_PER_CHIP: u16 = 256;
/// Vertical L1 buses per horizontal side.
pub const VLINES_PER_SIDE: u16 = 128;
/// DNC mergers (and gbit links) per chip.
pub const DNC_MERGERS_PER_CHIP: u8 = 8;
/// Synapse drivers per horizontal side of a chip.
pub const DRIVERS_PER_SIDE: u8 = 112;
/// Synapse columns per driver row.
pub const SYNAPSE_COLUMNS_PER_ROW: u16 = 256;

/// A wafer module. Single-wafer systems use wafer 0.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Wafer(pub u16);

/// Horizontal side of a chip (left or right half).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Left half (vertical buses 0..128, drivers on the left edge).
    Left,
    /// Right half (vertical buses 128..256, drivers on the right edge).
    Right,
}

/// Vertical position within a neuron block or synapse array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RowOnChip {
    /// Upper row.
    Top,
    /// Lower row.
    Bottom,
}

/// Chip position on the wafer grid.
///
/// The grid is a 36 × 16 rectangle; which positions are populated is decided
/// by the resource manifest, not by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChipOnWafer {
    /// Column, 0..36.
    pub x: u8,
    /// Row, 0..16.
    pub y: u8,
}

impl ChipOnWafer {
    /// Create a chip coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` lies outside the wafer grid.
    #[must_use]
    pub fn new(x: u8, y: u8) -> Self {
        assert!(
            x < CHIP_GRID_WIDTH && y < CHIP_GRID_HEIGHT,
            "chip ({x}, {y}) outside the {CHIP_GRID_WIDTH}x{CHIP_GRID_HEIGHT} wafer grid"
        );
        Self { x, y }
    }

    /// Dense index on the wafer grid (row-major).
    #[must_use]
    pub fn id(self) -> u16 {
        u16::from(self.y) * u16::from(CHIP_GRID_WIDTH) + u16::from(self.x)
    }

    /// The FPGA serving this chip. One FPGA drives a 2 × 4 block of chips.
    #[must_use]
    pub fn fpga(self) -> FpgaOnWafer {
        FpgaOnWafer(u8::from(self.x / 2) + (self.y / 4) * (CHIP_GRID_WIDTH / 2))
    }

    /// Neighbouring chip in +x direction, if still on the grid.
    #[must_use]
    pub fn east(self) -> Option<Self> {
        (self.x + 1 < CHIP_GRID_WIDTH).then(|| Self { x: self.x + 1, y: self.y })
    }

    /// Neighbouring chip in −x direction.
    #[must_use]
    pub fn west(self) -> Option<Self> {
        (self.x > 0).then(|| Self { x: self.x - 1, y: self.y })
    }

    /// Neighbouring chip in +y direction.
    #[must_use]
    pub fn south(self) -> Option<Self> {
        (self.y + 1 < CHIP_GRID_HEIGHT).then(|| Self { x: self.x, y: self.y + 1 })
    }

    /// Neighbouring chip in −y direction.
    #[must_use]
    pub fn north(self) -> Option<Self> {
        (self.y > 0).then(|| Self { x: self.x, y: self.y - 1 })
    }
}

impl std::fmt::Display for ChipOnWafer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chip({}, {})", self.x, self.y)
    }
}

/// FPGA position on the wafer. 72 FPGAs serve the 36 × 16 chip grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FpgaOnWafer(pub u8);

/// Neuron block on a chip, 0..8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NeuronBlockOnChip(u8);

impl NeuronBlockOnChip {
    /// Create a neuron block coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 8`.
    #[must_use]
    pub fn new(index: u8) -> Self {
        assert!(index < NEURON_BLOCKS_PER_CHIP, "neuron block {index} out of range");
        Self(index)
    }

    /// Block index, 0..8.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// All neuron blocks in index order.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..NEURON_BLOCKS_PER_CHIP).map(Self)
    }
}

/// A neuron block on a specific chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NeuronBlockOnWafer {
    /// Chip holding the block.
    pub chip: ChipOnWafer,
    /// Block on that chip.
    pub block: NeuronBlockOnChip,
}

/// Denmem within a neuron block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DenmemOnBlock {
    /// Column within the block, 0..32.
    pub x: u8,
    /// Top or bottom row.
    pub y: RowOnChip,
}

impl DenmemOnBlock {
    /// Create a block-local denmem coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `x >= 32`.
    #[must_use]
    pub fn new(x: u8, y: RowOnChip) -> Self {
        assert!(x < DENMEM_COLUMNS_PER_BLOCK, "denmem column {x} out of range");
        Self { x, y }
    }

    /// Chip-global denmem for this block-local coordinate.
    #[must_use]
    pub fn on_chip(self, block: NeuronBlockOnChip) -> DenmemOnChip {
        DenmemOnChip {
            x: u16::from(block.index()) * u16::from(DENMEM_COLUMNS_PER_BLOCK) + u16::from(self.x),
            y: self.y,
        }
    }
}

/// Denmem addressed chip-globally: column 0..256 and top/bottom row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DenmemOnChip {
    /// Chip-global column, 0..256.
    pub x: u16,
    /// Top or bottom row.
    pub y: RowOnChip,
}

impl DenmemOnChip {
    /// Create a chip-global denmem coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `x >= 256`.
    #[must_use]
    pub fn new(x: u16, y: RowOnChip) -> Self {
        assert!(
            x < u16::from(NEURON_BLOCKS_PER_CHIP) * u16::from(DENMEM_COLUMNS_PER_BLOCK),
            "denmem column {x} out of range"
        );
        Self { x, y }
    }

    /// The neuron block this denmem belongs to.
    #[must_use]
    pub fn block(self) -> NeuronBlockOnChip {
        NeuronBlockOnChip::new(u8::try_from(self.x / u16::from(DENMEM_COLUMNS_PER_BLOCK)).unwrap())
    }

    /// Column within the denmem's neuron block.
    #[must_use]
    pub fn x_on_block(self) -> u8 {
        u8::try_from(self.x % u16::from(DENMEM_COLUMNS_PER_BLOCK)).unwrap()
    }

    /// The shared floating-gate block supplying this denmem's analog
    /// parameters. Four blocks per chip: left/right × top/bottom.
    #[must_use]
    pub fn shared_fg_block(self) -> FgBlockOnChip {
        let horizontal = u8::from(self.x >= 128);
        let vertical = match self.y {
            RowOnChip::Top => 0,
            RowOnChip::Bottom => 2,
        };
        FgBlockOnChip(horizontal + vertical)
    }
}

/// A denmem on a specific chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DenmemOnWafer {
    /// Chip holding the denmem.
    pub chip: ChipOnWafer,
    /// Denmem on that chip.
    pub denmem: DenmemOnChip,
}

/// Shared floating-gate block, 0..4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FgBlockOnChip(pub u8);

impl FgBlockOnChip {
    /// All four blocks in index order.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..4).map(Self)
    }
}

/// Horizontal L1 bus, 0..64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HLine(u8);

impl HLine {
    /// Create a horizontal bus coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 64`.
    #[must_use]
    pub fn new(index: u8) -> Self {
        assert!(index < HLINES_PER_CHIP, "hline {index} out of range");
        Self(index)
    }

    /// Bus index, 0..64.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// The bus this line continues on when entering the chip to the east.
    /// Horizontal buses shift by two on every chip boundary.
    #[must_use]
    pub fn east(self) -> Self {
        Self((self.0 + 2) % HLINES_PER_CHIP)
    }

    /// The bus this line continues on when entering the chip to the west.
    #[must_use]
    pub fn west(self) -> Self {
        Self((self.0 + HLINES_PER_CHIP - 2) % HLINES_PER_CHIP)
    }
}

/// Vertical L1 bus, 0..256. Buses 0..128 run on the left side, 128..256 on
/// the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VLine(u16);

impl VLine {
    /// Create a vertical bus coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 256`.
    #[must_use]
    pub fn new(index: u16) -> Self {
        assert!(index < VLINES_PER_CHIP, "vline {index} out of range");
        Self(index)
    }

    /// Bus index, 0..256.
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }

    /// The side this bus runs on.
    #[must_use]
    pub fn side(self) -> Side {
        if self.0 < VLINES_PER_SIDE {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Index within the bus's side, 0..128.
    #[must_use]
    pub fn local(self) -> u16 {
        self.0 % VLINES_PER_SIDE
    }

    /// The bus this line continues on when entering the chip to the south.
    /// Vertical buses shift by two within their side on every boundary.
    #[must_use]
    pub fn south(self) -> Self {
        let base = self.0 - self.local();
        Self(base + (self.local() + 2) % VLINES_PER_SIDE)
    }

    /// The bus this line continues on when entering the chip to the north.
    #[must_use]
    pub fn north(self) -> Self {
        let base = self.0 - self.local();
        Self(base + (self.local() + VLINES_PER_SIDE - 2) % VLINES_PER_SIDE)
    }
}

macro_rules! merger_level {
    ($(#[$doc:meta])* $name:ident, $count:expr) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u8);

        impl $name {
            /// Create a merger coordinate.
            ///
            /// # Panics
            ///
            /// Panics if `index` is out of range for this merger level.
            #[must_use]
            pub fn new(index: u8) -> Self {
                assert!(index < $count, concat!(stringify!($name), " index out of range"));
                Self(index)
            }

            /// Merger index within its level.
            #[must_use]
            pub const fn index(self) -> u8 {
                self.0
            }

            /// All mergers of this level in index order.
            pub fn iter_all() -> impl Iterator<Item = Self> {
                (0..$count).map(Self)
            }
        }
    };
}

merger_level!(
    /// Level-0 merger; one per neuron block. The left input carries the
    /// block's background generator, the right input the block's neurons.
    Merger0,
    8
);
merger_level!(
    /// Level-1 merger; joins two level-0 mergers.
    Merger1,
    4
);
merger_level!(
    /// Level-2 merger; joins two level-1 mergers.
    Merger2,
    2
);
merger_level!(
    /// Level-3 merger; root of the tree.
    Merger3,
    1
);

/// DNC merger, 0..8. Terminal mergers feeding the off-wafer links and the
/// sending repeaters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DncMerger(u8);

impl DncMerger {
    /// Create a DNC merger coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 8`.
    #[must_use]
    pub fn new(index: u8) -> Self {
        assert!(index < DNC_MERGERS_PER_CHIP, "dnc merger {index} out of range");
        Self(index)
    }

    /// Merger index, 0..8.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// The gbit link paired with this merger.
    #[must_use]
    pub const fn gbit_link(self) -> GbitLink {
        GbitLink(self.0)
    }

    /// The sending repeater coupling this merger onto its horizontal bus.
    #[must_use]
    pub const fn sending_repeater(self) -> SendingRepeater {
        SendingRepeater(self.0)
    }

    /// All DNC mergers in index order.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..DNC_MERGERS_PER_CHIP).map(Self)
    }

    /// All DNC mergers in descending index order. Input placement walks
    /// mergers this way; the ordering is part of the mapping contract.
    pub fn iter_all_rev() -> impl Iterator<Item = Self> {
        (0..DNC_MERGERS_PER_CHIP).rev().map(Self)
    }
}

impl std::fmt::Display for DncMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dnc({})", self.0)
    }
}

/// A DNC merger on a specific chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DncMergerOnWafer {
    /// Chip holding the merger.
    pub chip: ChipOnWafer,
    /// Merger on that chip.
    pub merger: DncMerger,
}

/// Gbit link, 0..8; the chip side of the off-wafer (L2) event network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GbitLink(u8);

impl GbitLink {
    /// Create a gbit link coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 8`.
    #[must_use]
    pub fn new(index: u8) -> Self {
        assert!(index < DNC_MERGERS_PER_CHIP, "gbit link {index} out of range");
        Self(index)
    }

    /// Link index, 0..8.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }
}

/// Sending repeater, 0..8; couples a DNC merger onto a horizontal bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SendingRepeater(u8);

impl SendingRepeater {
    /// Repeater index, 0..8.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// The horizontal bus this repeater sends on. Repeater `i` owns bus
    /// `6 + 8·i`.
    #[must_use]
    pub fn hline(self) -> HLine {
        HLine::new(6 + 8 * self.0)
    }
}

/// Synapse driver on a chip: one of 112 per horizontal side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SynapseDriverOnChip {
    /// Edge the driver sits on.
    pub side: Side,
    /// Vertical position on that edge, 0..112.
    pub y: u8,
}

impl SynapseDriverOnChip {
    /// Create a driver coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `y >= 112`.
    #[must_use]
    pub fn new(side: Side, y: u8) -> Self {
        assert!(y < DRIVERS_PER_SIDE, "synapse driver y={y} out of range");
        Self { side, y }
    }

    /// The synapse-switch row through which vertical buses reach this driver.
    #[must_use]
    pub const fn synapse_switch_row(self) -> u8 {
        self.y
    }

    /// Whether `other` can be chained to this driver: same edge, two rows
    /// apart.
    #[must_use]
    pub fn is_adjacent(self, other: Self) -> bool {
        self.side == other.side && self.y.abs_diff(other.y) == 2
    }

    /// The two synapse rows this driver feeds.
    #[must_use]
    pub fn rows(self) -> [SynapseRowOnChip; 2] {
        [
            SynapseRowOnChip { driver: self, row: RowOnChip::Top },
            SynapseRowOnChip { driver: self, row: RowOnChip::Bottom },
        ]
    }
}

/// One of the two synapse rows driven by a synapse driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SynapseRowOnChip {
    /// The owning driver.
    pub driver: SynapseDriverOnChip,
    /// Which of the driver's two rows.
    pub row: RowOnChip,
}

/// Synapse column within a row, 0..256. Column `c` feeds the denmem in
/// chip-global column `c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SynapseColumn(u16);

impl SynapseColumn {
    /// Create a synapse column coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 256`.
    #[must_use]
    pub fn new(index: u16) -> Self {
        assert!(index < SYNAPSE_COLUMNS_PER_ROW, "synapse column {index} out of range");
        Self(index)
    }

    /// Column index, 0..256.
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }
}

/// A single synapse: row plus column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SynapseOnChip {
    /// The synapse row.
    pub row: SynapseRowOnChip,
    /// Column within the row.
    pub column: SynapseColumn,
}

/// Analog output channel of a chip, 0..2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnalogOutput(pub u8);

/// 6-bit L1 event address. Address 0 is reserved for the locking events of
/// the background generators and is never assigned to neurons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct L1Address(u8);

impl L1Address {
    /// The reserved locking address.
    pub const LOCKING: Self = Self(0);

    /// Create an address.
    ///
    /// # Panics
    ///
    /// Panics if `value >= 64`.
    #[must_use]
    pub fn new(value: u8) -> Self {
        assert!(value < 64, "L1 address {value} does not fit in 6 bits");
        Self(value)
    }

    /// Raw 6-bit value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Whether this is the reserved locking address.
    #[must_use]
    pub const fn is_locking(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for L1Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "addr({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_grid_geometry() {
        let c = ChipOnWafer::new(35, 15);
        assert_eq!(c.id(), 15 * 36 + 35);
        assert_eq!(c.east(), None);
        assert_eq!(c.south(), None);
        assert_eq!(ChipOnWafer::new(0, 0).west(), None);
    }

    #[test]
    fn fpga_covers_two_by_four_block() {
        // Chips (0,0)..(1,3) share FPGA 0.
        for x in 0..2 {
            for y in 0..4 {
                assert_eq!(ChipOnWafer::new(x, y).fpga(), FpgaOnWafer(0));
            }
        }
        assert_eq!(ChipOnWafer::new(2, 0).fpga(), FpgaOnWafer(1));
        assert_eq!(ChipOnWafer::new(0, 4).fpga(), FpgaOnWafer(18));
        assert_eq!(ChipOnWafer::new(35, 15).fpga(), FpgaOnWafer(71));
    }

    #[test]
    fn hline_continuations_are_inverse() {
        for i in 0..HLINES_PER_CHIP {
            let h = HLine::new(i);
            assert_eq!(h.east().west(), h);
            assert_eq!(h.west().east(), h);
        }
        assert_eq!(HLine::new(62).east(), HLine::new(0));
    }

    #[test]
    fn vline_continuations_stay_on_side() {
        for i in 0..VLINES_PER_CHIP {
            let v = VLine::new(i);
            assert_eq!(v.south().side(), v.side());
            assert_eq!(v.south().north(), v);
        }
        assert_eq!(VLine::new(127).south(), VLine::new(1));
        assert_eq!(VLine::new(128).south(), VLine::new(130));
    }

    #[test]
    fn sending_repeater_hlines() {
        let lines: Vec<u8> = DncMerger::iter_all()
            .map(|m| m.sending_repeater().hline().index())
            .collect();
        assert_eq!(lines, vec![6, 14, 22, 30, 38, 46, 54, 62]);
    }

    #[test]
    fn denmem_block_mapping() {
        let d = DenmemOnChip::new(37, RowOnChip::Top);
        assert_eq!(d.block().index(), 1);
        assert_eq!(d.x_on_block(), 5);
        let back = DenmemOnBlock::new(5, RowOnChip::Top).on_chip(NeuronBlockOnChip::new(1));
        assert_eq!(back, d);
    }

    #[test]
    fn shared_fg_blocks() {
        assert_eq!(DenmemOnChip::new(0, RowOnChip::Top).shared_fg_block(), FgBlockOnChip(0));
        assert_eq!(DenmemOnChip::new(200, RowOnChip::Top).shared_fg_block(), FgBlockOnChip(1));
        assert_eq!(DenmemOnChip::new(0, RowOnChip::Bottom).shared_fg_block(), FgBlockOnChip(2));
        assert_eq!(DenmemOnChip::new(255, RowOnChip::Bottom).shared_fg_block(), FgBlockOnChip(3));
    }

    #[test]
    fn driver_adjacency() {
        let d = SynapseDriverOnChip::new(Side::Left, 10);
        assert!(d.is_adjacent(SynapseDriverOnChip::new(Side::Left, 12)));
        assert!(d.is_adjacent(SynapseDriverOnChip::new(Side::Left, 8)));
        assert!(!d.is_adjacent(SynapseDriverOnChip::new(Side::Left, 11)));
        assert!(!d.is_adjacent(SynapseDriverOnChip::new(Side::Right, 12)));
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn l1_address_range_checked() {
        let _ = L1Address::new(64);
    }
}
