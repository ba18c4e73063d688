//! L1 address pools and per-chip assignment state.
//!
//! Every DNC merger owns a pool of the 63 usable 6-bit addresses
//! (address 0 stays reserved for the locking events of the background
//! generators). Merger routing drains pools for placed neurons, input
//! placement for external sources; the mode records which of the two a
//! merger serves.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wafermap_chip::{ChipOnWafer, DncMerger, L1Address, DNC_MERGERS_PER_CHIP};

use crate::config::AddressStrategy;

/// Number of drawable addresses per merger.
pub const ADDRESSES_PER_MERGER: usize = 63;

/// The available addresses of one DNC merger.
#[derive(Debug, Clone)]
pub struct L1AddressPool {
    /// Ascending; drawn addresses are removed.
    available: Vec<L1Address>,
    rng: StdRng,
}

impl L1AddressPool {
    /// A full pool (addresses 1..=63). The seed pins the random strategy's
    /// draw order so identical runs draw identical addresses.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            available: (1..64).map(L1Address::new).collect(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Remaining addresses.
    #[must_use]
    pub fn size(&self) -> usize {
        self.available.len()
    }

    /// Whether the pool is drained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    /// Draw one address.
    pub fn pop(&mut self, strategy: AddressStrategy) -> Option<L1Address> {
        if self.available.is_empty() {
            return None;
        }
        let index = match strategy {
            AddressStrategy::Sequential => 0,
            AddressStrategy::Random => self.rng.gen_range(0..self.available.len()),
        };
        Some(self.available.remove(index))
    }
}

/// Whether a DNC merger carries placed neurons, external input, or
/// nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergerUse {
    /// Untouched.
    #[default]
    Unused,
    /// Carries events of placed neurons off the wafer.
    Output,
    /// Carries external source events onto the wafer.
    Input,
}

/// Address pools and modes of one chip's eight DNC mergers.
#[derive(Debug, Clone)]
pub struct L1AddressAssignment {
    modes: [MergerUse; DNC_MERGERS_PER_CHIP as usize],
    pools: [L1AddressPool; DNC_MERGERS_PER_CHIP as usize],
}

impl L1AddressAssignment {
    /// Fresh assignment for `chip`; all mergers unused, pools full.
    #[must_use]
    pub fn new(chip: ChipOnWafer) -> Self {
        let pools = std::array::from_fn(|merger| {
            let seed = (u64::from(chip.id()) << 3) | merger as u64;
            L1AddressPool::new(seed)
        });
        Self { modes: [MergerUse::Unused; 8], pools }
    }

    /// Mode of one merger.
    #[must_use]
    pub fn mode(&self, merger: DncMerger) -> MergerUse {
        self.modes[merger.index() as usize]
    }

    /// Set the mode of one merger.
    pub fn set_mode(&mut self, merger: DncMerger, mode: MergerUse) {
        self.modes[merger.index() as usize] = mode;
    }

    /// The address pool of one merger.
    #[must_use]
    pub fn available_addresses(&self, merger: DncMerger) -> &L1AddressPool {
        &self.pools[merger.index() as usize]
    }

    /// The address pool of one merger, for drawing.
    pub fn available_addresses_mut(&mut self, merger: DncMerger) -> &mut L1AddressPool {
        &mut self.pools[merger.index() as usize]
    }

    /// Whether any merger is in output mode.
    #[must_use]
    pub fn has_output(&self) -> bool {
        self.modes.iter().any(|mode| *mode == MergerUse::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn sequential_draws_ascend_from_one() {
        let mut pool = L1AddressPool::new(0);
        assert_eq!(pool.size(), ADDRESSES_PER_MERGER);
        let drawn: Vec<u8> = (0..4)
            .map(|_| pool.pop(AddressStrategy::Sequential).unwrap().value())
            .collect();
        assert_eq!(drawn, vec![1, 2, 3, 4]);
    }

    #[test]
    fn random_draws_are_reproducible_and_unique() {
        let mut a = L1AddressPool::new(7);
        let mut b = L1AddressPool::new(7);
        let mut seen = BTreeSet::new();
        for _ in 0..ADDRESSES_PER_MERGER {
            let x = a.pop(AddressStrategy::Random).unwrap();
            let y = b.pop(AddressStrategy::Random).unwrap();
            assert_eq!(x, y);
            assert!(!x.is_locking());
            assert!(seen.insert(x.value()));
        }
        assert!(a.pop(AddressStrategy::Random).is_none());
    }

    #[test]
    fn modes_default_to_unused() {
        let assignment = L1AddressAssignment::new(ChipOnWafer::new(0, 0));
        for merger in DncMerger::iter_all() {
            assert_eq!(assignment.mode(merger), MergerUse::Unused);
        }
        assert!(!assignment.has_output());
    }
}
