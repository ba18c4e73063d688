//! Vertical-bus congestion tally.
//!
//! Vertical buses within one synapse-switch period compete for the same
//! drivers on a target chip. The Dijkstra route search penalises periods
//! that prior routes already landed on, spreading arrivals across the
//! switch matrix.

use std::collections::BTreeMap;

use wafermap_chip::{ChipOnWafer, Side, VLine, SYNAPSE_SWITCH_PERIOD};

/// Periods per chip: eight per side.
const PERIODS: usize = 16;

/// The synapse-switch period a vertical bus belongs to.
fn period(vline: VLine) -> usize {
    let base = usize::from(vline.local() / SYNAPSE_SWITCH_PERIOD) % 8;
    match vline.side() {
        Side::Left => base,
        // The right side reaches a different driver bank.
        Side::Right => base + 8,
    }
}

/// Per-chip usage counts by switch period.
#[derive(Debug, Default, Clone)]
pub struct VLineUsage {
    usage: BTreeMap<ChipOnWafer, [usize; PERIODS]>,
}

impl VLineUsage {
    /// A zeroed tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an arrival of a route on `vline` of `chip`.
    pub fn increment(&mut self, chip: ChipOnWafer, vline: VLine) {
        self.usage.entry(chip).or_default()[period(vline)] += 1;
    }

    /// Number of prior arrivals on the period of `vline`.
    #[must_use]
    pub fn get(&self, chip: ChipOnWafer, vline: VLine) -> usize {
        self.usage.get(&chip).map_or(0, |periods| periods[period(vline)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_of_one_period_share_a_counter() {
        let mut usage = VLineUsage::new();
        let chip = ChipOnWafer::new(0, 0);
        usage.increment(chip, VLine::new(0));
        // vline 3 sits in the same 16-line period as vline 0.
        assert_eq!(usage.get(chip, VLine::new(3)), 1);
        // vline 16 starts the next period.
        assert_eq!(usage.get(chip, VLine::new(16)), 0);
        // Same local index on the right side is a different bank.
        assert_eq!(usage.get(chip, VLine::new(128)), 0);
    }
}
