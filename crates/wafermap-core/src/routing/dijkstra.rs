//! Shortest-path route construction.
//!
//! A weighted search over the bus graph: nodes are `(chip, bus)` pairs,
//! edges are boundary crossings and crossbar switches. Entering a
//! vertical bus pays a congestion penalty proportional to the number of
//! routes already arriving in the same synapse-switch period, which
//! spreads load across the switch matrix. The found path is replayed
//! through `L1Route::append`, so the checker has the final word on
//! legality.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use wafermap_chip::{
    crossbar_vlines, ChipOnWafer, HLine, L1Route, Segment, VLine,
};
use wafermap_hal::ResourceManager;

use crate::config::L1RoutingOptions;
use crate::results::L1RouteItem;
use crate::routing::vline_usage::VLineUsage;
use crate::routing::{BusUsage, RouteTask};

/// A bus on some chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bus {
    H(HLine),
    V(VLine),
}

type Node = (ChipOnWafer, Bus);

/// Build routes for one task via Dijkstra, one search per target.
pub fn build(
    task: &RouteTask,
    mgr: &ResourceManager,
    options: &L1RoutingOptions,
    buses: &mut BusUsage,
    vline_usage: &mut VLineUsage,
) -> (Vec<L1RouteItem>, BTreeSet<ChipOnWafer>) {
    let mut routes = Vec::new();
    let mut unreachable = BTreeSet::new();

    let source_chip = task.source.chip;
    let hline = task.source.merger.sending_repeater().hline();
    if !buses.claim_h(source_chip, hline) {
        unreachable.extend(task.targets.iter().copied());
        return (routes, unreachable);
    }

    for &target in &task.targets {
        match search(task, target, mgr, options, buses, vline_usage) {
            Some(route) => {
                if let Some(vline) = arrival_vline(&route) {
                    vline_usage.increment(target, vline);
                }
                for (chip, bus) in claims_of(&route) {
                    match bus {
                        Bus::H(h) => {
                            buses.claim_h(chip, h);
                        }
                        Bus::V(v) => {
                            buses.claim_v(chip, v);
                        }
                    }
                }
                routes.push(L1RouteItem {
                    source: task.source,
                    projections: task.projections.clone(),
                    route,
                });
            }
            None => {
                debug!(%target, "dijkstra target unreachable");
                unreachable.insert(target);
            }
        }
    }

    (routes, unreachable)
}

fn arrival_vline(route: &L1Route) -> Option<VLine> {
    route.iter().rev().find_map(|segment| match segment {
        Segment::VLine(v) => Some(*v),
        _ => None,
    })
}

/// Buses used by the route, paired with their chip context.
fn claims_of(route: &L1Route) -> Vec<(ChipOnWafer, Bus)> {
    let mut chip = None;
    let mut claims = Vec::new();
    for segment in route {
        match segment {
            Segment::Chip(c) => chip = Some(*c),
            Segment::HLine(h) => claims.push((chip.expect("route starts with chip"), Bus::H(*h))),
            Segment::VLine(v) => claims.push((chip.expect("route starts with chip"), Bus::V(*v))),
            _ => {}
        }
    }
    claims
}

/// One Dijkstra run from the task's sending repeater to `target`.
#[allow(clippy::too_many_lines)]
fn search(
    task: &RouteTask,
    target: ChipOnWafer,
    mgr: &ResourceManager,
    options: &L1RoutingOptions,
    buses: &BusUsage,
    vline_usage: &VLineUsage,
) -> Option<L1Route> {
    let source_chip = task.source.chip;
    let start: Node = (source_chip, Bus::H(task.source.merger.sending_repeater().hline()));

    let mut dist: BTreeMap<Node, u64> = BTreeMap::new();
    let mut prev: BTreeMap<Node, Node> = BTreeMap::new();
    // Reverse for a min-heap; the node itself breaks cost ties
    // deterministically.
    let mut heap: BinaryHeap<Reverse<(u64, Node)>> = BinaryHeap::new();

    dist.insert(start, u64::from(options.w_spl1));
    heap.push(Reverse((u64::from(options.w_spl1), start)));

    let goal: Option<Node> = loop {
        let Some(Reverse((cost, node))) = heap.pop() else {
            break None;
        };
        if dist.get(&node).copied() != Some(cost) {
            continue;
        }
        if node.0 == target && matches!(node.1, Bus::V(_)) {
            break Some(node);
        }

        let push = |next: Node,
                    weight: u64,
                    prev_node: Node,
                    heap: &mut BinaryHeap<Reverse<(u64, Node)>>,
                    dist: &mut BTreeMap<Node, u64>,
                    prev_map: &mut BTreeMap<Node, Node>| {
            let next_cost = cost + weight;
            if dist.get(&next).map_or(true, |&known| next_cost < known) {
                dist.insert(next, next_cost);
                prev_map.insert(next, prev_node);
                heap.push(Reverse((next_cost, next)));
            }
        };

        let (chip, bus) = node;
        match bus {
            Bus::H(h) => {
                for (next_chip, continuation) in
                    [(chip.east(), h.east()), (chip.west(), h.west())]
                {
                    if let Some(next_chip) = next_chip {
                        if mgr.has(next_chip) && !buses.is_hline_claimed(next_chip, continuation)
                        {
                            push(
                                (next_chip, Bus::H(continuation)),
                                u64::from(options.w_horiz) + u64::from(options.w_straight_h),
                                node,
                                &mut heap,
                                &mut dist,
                                &mut prev,
                            );
                        }
                    }
                }
                for vline in crossbar_vlines(h) {
                    if !buses.is_vline_claimed(chip, vline) {
                        let congestion = u64::from(options.w_congest)
                            * vline_usage.get(chip, vline) as u64;
                        push(
                            (chip, Bus::V(vline)),
                            u64::from(options.w_vert) + congestion,
                            node,
                            &mut heap,
                            &mut dist,
                            &mut prev,
                        );
                    }
                }
            }
            Bus::V(v) => {
                for (next_chip, continuation) in
                    [(chip.south(), v.south()), (chip.north(), v.north())]
                {
                    if let Some(next_chip) = next_chip {
                        if mgr.has(next_chip) && !buses.is_vline_claimed(next_chip, continuation)
                        {
                            push(
                                (next_chip, Bus::V(continuation)),
                                u64::from(options.w_straight_v),
                                node,
                                &mut heap,
                                &mut dist,
                                &mut prev,
                            );
                        }
                    }
                }
                for hline in (0..64).map(HLine::new) {
                    if wafermap_chip::crossbar_exists(v, hline)
                        && !buses.is_hline_claimed(chip, hline)
                    {
                        push(
                            (chip, Bus::H(hline)),
                            u64::from(options.w_horiz),
                            node,
                            &mut heap,
                            &mut dist,
                            &mut prev,
                        );
                    }
                }
            }
        }
    };

    let goal = goal?;

    // Reconstruct and replay through the checker.
    let mut path = vec![goal];
    let mut cursor = goal;
    while cursor != start {
        cursor = prev[&cursor];
        path.push(cursor);
    }
    path.reverse();

    let mut route = L1Route::from_segments(vec![
        Segment::Chip(source_chip),
        Segment::DncMerger(task.source.merger),
        Segment::HLine(task.source.merger.sending_repeater().hline()),
    ])
    .expect("merger onto its sending-repeater bus is always legal");

    let mut current_chip = source_chip;
    for (chip, bus) in path.into_iter().skip(1) {
        let segment = match bus {
            Bus::H(h) => Segment::HLine(h),
            Bus::V(v) => Segment::VLine(v),
        };
        let result = if chip == current_chip {
            route.append(segment)
        } else {
            current_chip = chip;
            route.append_with_chip(chip, segment)
        };
        if result.is_err() {
            // The checker disagrees with the graph; treat as unreachable
            // rather than delivering an invalid route.
            return None;
        }
    }
    Some(route)
}
