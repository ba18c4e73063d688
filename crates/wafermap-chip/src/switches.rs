//! Static switch tables of the L1 network.
//!
//! Crossbar and synapse switches are sparse: only a fixed subset of
//! bus intersections carries a programmable switch. These tables are
//! properties of the silicon; the route checker and the route builders
//! both consult them, which is what keeps the two in agreement.

use crate::coords::{HLine, SynapseDriverOnChip, VLine};

/// Vertical buses per synapse-switch period. Used by the congestion tally
/// of the routing stage to group buses competing for the same drivers.
pub const SYNAPSE_SWITCH_PERIOD: u16 = 16;

/// Whether the L1 crossbar has a switch at the intersection of `vline` and
/// `hline`.
///
/// Every horizontal bus crosses all 256 vertical buses but carries a switch
/// only every 32 columns, giving 8 reachable vertical buses per horizontal
/// bus and 2 reachable horizontal buses per vertical bus.
#[must_use]
pub fn crossbar_exists(vline: VLine, hline: HLine) -> bool {
    vline.index() % 32 == u16::from(hline.index()) % 32
}

/// Whether a synapse switch connects `vline` to the switch row of `driver`.
///
/// Vertical buses only reach drivers on their own side, in a 16-row period:
/// each bus can select one of 7 drivers, each driver is reachable from 8
/// buses.
#[must_use]
pub fn synapse_switch_exists(vline: VLine, driver: SynapseDriverOnChip) -> bool {
    vline.side() == driver.side
        && vline.local() % SYNAPSE_SWITCH_PERIOD
            == u16::from(driver.synapse_switch_row()) % SYNAPSE_SWITCH_PERIOD
}

/// All vertical buses with a crossbar switch on `hline`, in index order.
pub fn crossbar_vlines(hline: HLine) -> impl Iterator<Item = VLine> {
    let offset = u16::from(hline.index()) % 32;
    (0..8).map(move |i| VLine::new(offset + 32 * i))
}

/// All drivers reachable from `vline` through a synapse switch, in row
/// order.
pub fn reachable_drivers(vline: VLine) -> impl Iterator<Item = SynapseDriverOnChip> {
    let side = vline.side();
    let offset = u8::try_from(vline.local() % SYNAPSE_SWITCH_PERIOD).unwrap();
    (0..7).map(move |i| SynapseDriverOnChip::new(side, offset + 16 * i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Side;

    #[test]
    fn crossbar_counts() {
        for h in 0..64 {
            let hline = HLine::new(h);
            let count = (0..256).filter(|&v| crossbar_exists(VLine::new(v), hline)).count();
            assert_eq!(count, 8);
        }
        for v in 0..256 {
            let vline = VLine::new(v);
            let count = (0..64).filter(|&h| crossbar_exists(vline, HLine::new(h))).count();
            assert_eq!(count, 2);
        }
    }

    #[test]
    fn crossbar_vlines_match_table() {
        for h in 0..64 {
            let hline = HLine::new(h);
            for v in crossbar_vlines(hline) {
                assert!(crossbar_exists(v, hline));
            }
        }
    }

    #[test]
    fn synapse_switches_stay_on_side() {
        let v = VLine::new(3);
        assert!(synapse_switch_exists(v, SynapseDriverOnChip::new(Side::Left, 3)));
        assert!(synapse_switch_exists(v, SynapseDriverOnChip::new(Side::Left, 19)));
        assert!(!synapse_switch_exists(v, SynapseDriverOnChip::new(Side::Right, 3)));
        assert!(!synapse_switch_exists(v, SynapseDriverOnChip::new(Side::Left, 4)));
    }

    #[test]
    fn every_vline_reaches_seven_drivers() {
        for v in [0u16, 57, 128, 255] {
            let vline = VLine::new(v);
            let drivers: Vec<_> = reachable_drivers(vline).collect();
            assert_eq!(drivers.len(), 7);
            for d in drivers {
                assert!(synapse_switch_exists(vline, d));
            }
        }
    }
}
