//! Backbone route construction.
//!
//! Manhattan-style: out of the sending repeater onto the source chip's
//! horizontal bus, along the row to each target column, then down or up
//! a vertical bus to the target row. Chip-boundary crossings insert the
//! chip coordinate the route checker demands, which in turn pins the
//! east/west (or north/south) continuation bus. Every move goes through
//! `L1Route::append`, so an illegal step surfaces immediately and only
//! costs the targets behind it.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, trace};

use wafermap_chip::{
    crossbar_vlines, ChipOnWafer, HLine, L1Route, Segment, VLine,
};
use wafermap_hal::ResourceManager;

use crate::config::L1RoutingOptions;
use crate::results::L1RouteItem;
use crate::routing::vline_usage::VLineUsage;
use crate::routing::{BusUsage, RouteTask};

/// Build routes for one task, Manhattan-style.
///
/// Returns the established routes and the targets that could not be
/// reached.
pub fn build(
    task: &RouteTask,
    mgr: &ResourceManager,
    options: &L1RoutingOptions,
    buses: &mut BusUsage,
    vline_usage: &mut VLineUsage,
) -> (Vec<L1RouteItem>, BTreeSet<ChipOnWafer>) {
    let source_chip = task.source.chip;
    let hline = task.source.merger.sending_repeater().hline();

    let mut routes = Vec::new();
    let mut unreachable = BTreeSet::new();

    let base = L1Route::from_segments(vec![
        Segment::Chip(source_chip),
        Segment::DncMerger(task.source.merger),
        Segment::HLine(hline),
    ])
    .expect("merger onto its sending-repeater bus is always legal");

    if !buses.claim_h(source_chip, hline) {
        // Another route runs over our sending repeater's bus.
        unreachable.extend(task.targets.iter().copied());
        return (routes, unreachable);
    }

    // Columns west of the source, nearest first, then east; the vertical
    // branch handles each column's targets nearest-row first.
    let mut columns: Vec<u8> = task.targets.iter().map(|chip| chip.x).collect();
    columns.sort_unstable();
    columns.dedup();
    columns.sort_by_key(|x| (x.abs_diff(source_chip.x), *x));

    // Per direction, the trunk grown so far.
    let mut west = DirectionalTrunk::new(base.clone(), source_chip, hline);
    let mut east = DirectionalTrunk::new(base, source_chip, hline);

    for column in columns {
        let trunk = if column <= source_chip.x { &mut west } else { &mut east };
        if !trunk.advance_to(column, mgr, buses) {
            for target in task.targets.iter().filter(|chip| chip.x == column) {
                unreachable.insert(*target);
            }
            continue;
        }

        let mut rows: Vec<u8> =
            task.targets.iter().filter(|chip| chip.x == column).map(|chip| chip.y).collect();
        rows.sort_by_key(|y| (y.abs_diff(source_chip.y), *y));

        for row in rows {
            let target = ChipOnWafer::new(column, row);
            match branch_to(trunk, target, mgr, options, buses) {
                Some(route) => {
                    let vline = route.iter().rev().find_map(|segment| match segment {
                        Segment::VLine(v) => Some(*v),
                        _ => None,
                    });
                    if let Some(vline) = vline {
                        vline_usage.increment(target, vline);
                    }
                    trace!(%target, "backbone route established");
                    routes.push(L1RouteItem {
                        source: task.source,
                        projections: task.projections.clone(),
                        route,
                    });
                }
                None => {
                    debug!(%target, "backbone target unreachable");
                    unreachable.insert(target);
                }
            }
        }
    }

    (routes, unreachable)
}

/// The horizontal trunk grown in one direction from the source.
struct DirectionalTrunk {
    route: L1Route,
    chip: ChipOnWafer,
    hline: HLine,
    blocked: bool,
}

impl DirectionalTrunk {
    fn new(route: L1Route, chip: ChipOnWafer, hline: HLine) -> Self {
        Self { route, chip, hline, blocked: false }
    }

    /// Extend the trunk to `column`; the trunk only ever moves away from
    /// the source, so prior columns are already covered.
    fn advance_to(&mut self, column: u8, mgr: &ResourceManager, buses: &mut BusUsage) -> bool {
        if self.blocked {
            return self.chip.x == column;
        }
        while self.chip.x != column {
            let next = if column < self.chip.x { self.chip.west() } else { self.chip.east() };
            let Some(next) = next else {
                self.blocked = true;
                return false;
            };
            if !mgr.has(next) {
                self.blocked = true;
                return false;
            }
            let continuation =
                if column < self.chip.x { self.hline.west() } else { self.hline.east() };
            if !buses.claim_h(next, continuation) {
                self.blocked = true;
                return false;
            }
            self.route
                .append_with_chip(next, continuation)
                .expect("horizontal continuation follows the checker's own rule");
            self.chip = next;
            self.hline = continuation;
        }
        true
    }
}

/// Branch from the trunk at the target's column down/up to the target
/// row, ending on a vertical bus of the target chip.
fn branch_to(
    trunk: &DirectionalTrunk,
    target: ChipOnWafer,
    mgr: &ResourceManager,
    options: &L1RoutingOptions,
    buses: &mut BusUsage,
) -> Option<L1Route> {
    if trunk.chip.x != target.x {
        return None;
    }

    let mut candidates: Vec<VLine> = crossbar_vlines(trunk.hline).collect();
    if options.shuffle_switches {
        // Deterministic shuffle: wear evens out across runs of different
        // branch chips while identical inputs keep identical routes.
        let seed = u64::from(trunk.chip.id()) << 8 | u64::from(trunk.hline.index());
        candidates.shuffle(&mut StdRng::seed_from_u64(seed));
    }

    'candidates: for vline in candidates {
        let mut route = trunk.route.clone();
        if route.append(vline).is_err() {
            continue;
        }
        let mut claims = vec![(trunk.chip, vline)];
        let mut chip = trunk.chip;
        let mut current = vline;
        if buses.is_vline_claimed(chip, current) {
            continue;
        }

        while chip.y != target.y {
            let (next, continuation) = if target.y > chip.y {
                (chip.south(), current.south())
            } else {
                (chip.north(), current.north())
            };
            let Some(next) = next else {
                continue 'candidates;
            };
            if !mgr.has(next) || buses.is_vline_claimed(next, continuation) {
                continue 'candidates;
            }
            if route.append_with_chip(next, continuation).is_err() {
                continue 'candidates;
            }
            claims.push((next, continuation));
            chip = next;
            current = continuation;
        }

        for (chip, vline) in claims {
            buses.claim_v(chip, vline);
        }
        return Some(route);
    }

    None
}
