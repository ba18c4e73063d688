//! L1 routing records.

use serde::{Deserialize, Serialize};

use wafermap_bio::ProjectionId;
use wafermap_chip::{ChipOnWafer, DncMergerOnWafer, L1Route, VLine};

/// One established route from a source merger to a target chip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct L1RouteItem {
    /// The merger whose events the route carries.
    pub source: DncMergerOnWafer,
    /// The projections realised over this route.
    pub projections: Vec<ProjectionId>,
    /// The validated route; its last chip is the target.
    pub route: L1Route,
}

impl L1RouteItem {
    /// The chip the route delivers into.
    #[must_use]
    pub fn target_chip(&self) -> ChipOnWafer {
        self.route.target_chip().expect("stored routes are non-empty")
    }

    /// The vertical bus the route arrives on, if it reaches into a
    /// synapse array.
    #[must_use]
    pub fn arrival_vline(&self) -> Option<VLine> {
        self.route.iter().rev().find_map(|segment| match segment {
            wafermap_chip::Segment::VLine(v) => Some(*v),
            _ => None,
        })
    }
}

/// All routes of a run, append-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct L1Routing {
    items: Vec<L1RouteItem>,
}

impl L1Routing {
    /// Record an established route.
    pub fn add(&mut self, item: L1RouteItem) {
        self.items.push(item);
    }

    /// All routes in insertion order.
    #[must_use]
    pub fn items(&self) -> &[L1RouteItem] {
        &self.items
    }

    /// Whether any routes exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Routes delivering into `chip`.
    pub fn by_target(&self, chip: ChipOnWafer) -> impl Iterator<Item = &L1RouteItem> + '_ {
        self.items.iter().filter(move |item| item.target_chip() == chip)
    }

    /// Routes leaving from `source`.
    pub fn by_source(
        &self,
        source: DncMergerOnWafer,
    ) -> impl Iterator<Item = &L1RouteItem> + '_ {
        self.items.iter().filter(move |item| item.source == source)
    }

    /// All target chips, deduplicated, in coordinate order.
    #[must_use]
    pub fn target_chips(&self) -> Vec<ChipOnWafer> {
        let mut chips: Vec<ChipOnWafer> = self.items.iter().map(L1RouteItem::target_chip).collect();
        chips.sort_unstable();
        chips.dedup();
        chips
    }
}
