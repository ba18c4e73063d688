//! Validated L1 routes.
//!
//! An [`L1Route`] is an ordered sequence of topology segments describing a
//! physical path through the on-wafer event network: out of a DNC merger,
//! through the merger tree or onto the horizontal buses, across crossbar
//! and synapse switches, down to a synapse driver. Structural correctness
//! is enforced at construction time: every way of growing a route checks
//! the new adjacent segment pairs against the successor rules and fails
//! with [`InvalidRouteError`] on any illegal move. Code holding an
//! `L1Route` can therefore rely on it describing real, connectable
//! hardware.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coords::{
    ChipOnWafer, DncMerger, GbitLink, HLine, Merger0, Merger1, Merger2, Merger3,
    SynapseDriverOnChip, SynapseOnChip, VLine,
};
use crate::switches::{crossbar_exists, synapse_switch_exists};

/// Result alias for route operations.
pub type Result<T> = std::result::Result<T, InvalidRouteError>;

/// Error raised when a route operation would violate the successor rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidRouteError {
    /// The route is empty and the operation needs at least a source chip.
    #[error("route has to start with a chip coordinate")]
    MissingSourceChip,

    /// A chip coordinate was appended without a following segment.
    #[error("can not add a chip coordinate on its own")]
    BareChip,

    /// Two adjacent segments are not legal successors.
    #[error("invalid segment {segment} at index {index}")]
    InvalidSegment {
        /// Display form of the offending segment.
        segment: String,
        /// Position of the offending segment within the route.
        index: usize,
    },

    /// Joining two routes failed at the join point.
    #[error("invalid join: {reason}")]
    InvalidJoin {
        /// What went wrong at the join point.
        reason: String,
    },
}

impl InvalidRouteError {
    fn invalid_segment(segment: &Segment, index: usize) -> Self {
        Self::InvalidSegment { segment: segment.to_string(), index }
    }

    fn invalid_join(reason: impl Into<String>) -> Self {
        Self::InvalidJoin { reason: reason.into() }
    }
}

/// One step of an L1 route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Chip context; the first segment of every route, repeated at every
    /// chip-boundary crossing.
    Chip(ChipOnWafer),
    /// Horizontal L1 bus.
    HLine(HLine),
    /// Vertical L1 bus.
    VLine(VLine),
    /// Terminal merger feeding a gbit link and a sending repeater.
    DncMerger(DncMerger),
    /// Off-wafer link endpoint.
    GbitLink(GbitLink),
    /// Merger-tree level 0 (leaf).
    Merger0(Merger0),
    /// Merger-tree level 1.
    Merger1(Merger1),
    /// Merger-tree level 2.
    Merger2(Merger2),
    /// Merger-tree level 3 (root).
    Merger3(Merger3),
    /// Synapse driver at the edge of a synapse array.
    Driver(SynapseDriverOnChip),
    /// A single synapse.
    Synapse(SynapseOnChip),
}

impl Segment {
    /// Whether this segment is a chip coordinate.
    #[must_use]
    pub const fn is_chip(&self) -> bool {
        matches!(self, Self::Chip(_))
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chip(c) => write!(f, "{c}"),
            Self::HLine(h) => write!(f, "hline({})", h.index()),
            Self::VLine(v) => write!(f, "vline({})", v.index()),
            Self::DncMerger(m) => write!(f, "{m}"),
            Self::GbitLink(l) => write!(f, "gbit({})", l.index()),
            Self::Merger0(m) => write!(f, "merger0({})", m.index()),
            Self::Merger1(m) => write!(f, "merger1({})", m.index()),
            Self::Merger2(m) => write!(f, "merger2({})", m.index()),
            Self::Merger3(m) => write!(f, "merger3({})", m.index()),
            Self::Driver(d) => write!(f, "driver({:?}, {})", d.side, d.y),
            Self::Synapse(s) => {
                write!(f, "synapse({:?}, {}, {})", s.row.driver.side, s.row.driver.y, s.column.index())
            }
        }
    }
}

macro_rules! segment_from {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(impl From<$ty> for Segment {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        })+
    };
}

segment_from!(
    Chip(ChipOnWafer),
    HLine(HLine),
    VLine(VLine),
    DncMerger(DncMerger),
    GbitLink(GbitLink),
    Merger0(Merger0),
    Merger1(Merger1),
    Merger2(Merger2),
    Merger3(Merger3),
    Driver(SynapseDriverOnChip),
    Synapse(SynapseOnChip),
);

/// Walks segment pairs and decides admissibility.
///
/// Carries the chip context and, across a chip-boundary crossing, the bus
/// the route is expected to continue on inside the entered chip.
struct SuccessorChecker {
    current_chip: ChipOnWafer,
    expected_line: Option<Segment>,
}

impl SuccessorChecker {
    fn new(start: ChipOnWafer) -> Self {
        Self { current_chip: start, expected_line: None }
    }

    /// Check one adjacent pair. Every pair not explicitly allowed below is
    /// illegal.
    #[allow(clippy::too_many_lines)]
    fn step(&mut self, prev: &Segment, next: &Segment) -> bool {
        use Segment as S;
        match (prev, next) {
            // Chip boundary crossings. The crossing fixes which bus the
            // route must continue on inside the entered chip.
            (S::HLine(h), S::Chip(c)) => self.cross_horizontal(*h, *c),
            (S::VLine(v), S::Chip(c)) => {
                if self.current_chip.y == c.y {
                    return false;
                }
                let continuation =
                    if self.current_chip.y < c.y { v.south() } else { v.north() };
                self.expected_line = Some(S::VLine(continuation));
                self.current_chip = *c;
                true
            }
            // Sending repeater output towards the chip to the left.
            (S::DncMerger(m), S::Chip(c)) => {
                if self.current_chip.x <= c.x {
                    return false;
                }
                self.cross_horizontal(m.sending_repeater().hline(), *c)
            }
            (S::Chip(c), S::HLine(_) | S::VLine(_)) => {
                *c == self.current_chip
                    && self.expected_line.take().is_some_and(|expected| expected == *next)
            }

            // Merger tree, all on one chip.
            (S::Merger0(a), S::Merger1(b)) => b.index() == a.index() / 2,
            (S::Merger1(a), S::Merger2(b)) => b.index() == a.index() / 2,
            (S::Merger2(_), S::Merger3(_)) => true,
            (S::Merger0(a), S::DncMerger(b)) => {
                a.index() == b.index() && matches!(a.index(), 0 | 2 | 4 | 7)
            }
            (S::Merger1(a), S::DncMerger(b)) => {
                (a.index() == 0 && b.index() == 1) || (a.index() == 3 && b.index() == 6)
            }
            (S::Merger2(a), S::DncMerger(b)) => a.index() == 1 && b.index() == 5,
            (S::Merger3(_), S::DncMerger(b)) => b.index() == 3,

            // Off-wafer links, both directions.
            (S::DncMerger(m), S::GbitLink(l)) => m.index() == l.index(),
            (S::GbitLink(l), S::DncMerger(m)) => l.index() == m.index(),

            // Sending repeater onto its horizontal bus.
            (S::DncMerger(m), S::HLine(h)) => m.sending_repeater().hline() == *h,

            // Crossbar switches.
            (S::VLine(v), S::HLine(h)) | (S::HLine(h), S::VLine(v)) => crossbar_exists(*v, *h),

            // Synapse switches and driver chains.
            (S::VLine(v), S::Driver(d)) => synapse_switch_exists(*v, *d),
            (S::Driver(a), S::Driver(b)) => a.is_adjacent(*b),
            // Semantic constraints on the synapse itself are enforced by
            // the synapse allocator.
            (S::Driver(_), S::Synapse(_)) => true,

            _ => false,
        }
    }

    fn cross_horizontal(&mut self, hline: HLine, chip: ChipOnWafer) -> bool {
        if self.current_chip.x == chip.x {
            return false;
        }
        let continuation =
            if self.current_chip.x < chip.x { hline.east() } else { hline.west() };
        self.expected_line = Some(Segment::HLine(continuation));
        self.current_chip = chip;
        true
    }
}

/// A validated path through the L1 network.
///
/// Non-empty routes start with a chip coordinate followed by at least one
/// further segment. The empty route is legal; source/target queries fail on
/// it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct L1Route {
    segments: Vec<Segment>,
    /// Chip context at the end of the route; meaningless when empty.
    last_chip: Option<ChipOnWafer>,
}

impl TryFrom<Vec<Segment>> for L1Route {
    type Error = InvalidRouteError;

    fn try_from(segments: Vec<Segment>) -> Result<Self> {
        Self::from_segments(segments)
    }
}

impl From<L1Route> for Vec<Segment> {
    fn from(route: L1Route) -> Self {
        route.segments
    }
}

impl L1Route {
    /// The empty route.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a route from a full segment sequence, validating every
    /// adjacent pair.
    ///
    /// # Errors
    ///
    /// Fails if the sequence does not start with a chip coordinate, is a
    /// bare chip, or contains an inadmissible pair.
    pub fn from_segments(segments: Vec<Segment>) -> Result<Self> {
        let mut route = Self { segments, last_chip: None };
        route.verify()?;
        Ok(route)
    }

    /// Whether the route has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// The segments of the route.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Iterate over the segments.
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    /// The chip the route starts on.
    ///
    /// # Errors
    ///
    /// Fails on the empty route.
    pub fn source_chip(&self) -> Result<ChipOnWafer> {
        match self.segments.first() {
            Some(Segment::Chip(c)) => Ok(*c),
            _ => Err(InvalidRouteError::MissingSourceChip),
        }
    }

    /// The last chip coordinate of the route.
    ///
    /// # Errors
    ///
    /// Fails on the empty route.
    pub fn target_chip(&self) -> Result<ChipOnWafer> {
        self.last_chip.ok_or(InvalidRouteError::MissingSourceChip)
    }

    /// First segment after the source chip.
    #[must_use]
    pub fn front(&self) -> Option<&Segment> {
        self.segments.get(1)
    }

    /// Last non-chip segment.
    #[must_use]
    pub fn back(&self) -> Option<&Segment> {
        self.segments.iter().rev().find(|s| !s.is_chip())
    }

    /// Append a segment, validating the new pair.
    ///
    /// # Errors
    ///
    /// Fails on the empty route, on a chip segment (use
    /// [`L1Route::append_with_chip`]), or on an inadmissible pair.
    pub fn append(&mut self, segment: impl Into<Segment>) -> Result<()> {
        let segment = segment.into();
        if segment.is_chip() {
            return Err(InvalidRouteError::BareChip);
        }
        if self.segments.is_empty() {
            return Err(InvalidRouteError::MissingSourceChip);
        }
        self.segments.push(segment);
        self.verify_rollback(1)
    }

    /// Append a chip-boundary crossing and the segment following it, as one
    /// atomic step. Both new pairs must be admissible.
    ///
    /// # Errors
    ///
    /// Fails on the empty route, on two chip segments, or on an
    /// inadmissible pair.
    pub fn append_with_chip(
        &mut self,
        chip: ChipOnWafer,
        segment: impl Into<Segment>,
    ) -> Result<()> {
        let segment = segment.into();
        if segment.is_chip() {
            return Err(InvalidRouteError::BareChip);
        }
        if self.segments.is_empty() {
            return Err(InvalidRouteError::MissingSourceChip);
        }
        self.segments.push(Segment::Chip(chip));
        self.segments.push(segment);
        self.verify_rollback(2)
    }

    /// Splice `other` onto the end of this route. If `other` starts on the
    /// chip this route ends on, the duplicate chip coordinate is dropped;
    /// otherwise the join must form a legal boundary crossing.
    ///
    /// # Errors
    ///
    /// Fails when the join point is not admissible. An empty side is a
    /// no-op (or a move, respectively).
    pub fn extend(&mut self, other: &Self) -> Result<()> {
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }
        if other.is_empty() {
            return Ok(());
        }

        let source = other.source_chip()?;
        let skip = usize::from(Some(source) == self.last_chip);
        let added = other.segments.len() - skip;
        self.segments.extend_from_slice(&other.segments[skip..]);
        self.verify_rollback(added).map_err(|e| {
            InvalidRouteError::invalid_join(format!("extending routes failed: {e}"))
        })
    }

    /// Like [`L1Route::extend`], but `other` must repeat this route's last
    /// chip and last segment, which are deduplicated at the join.
    ///
    /// # Errors
    ///
    /// Fails when `other` does not overlap this route's tail.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }
        if other.is_empty() {
            return Ok(());
        }

        let source = other.source_chip()?;
        if Some(source) != self.last_chip {
            return Err(InvalidRouteError::invalid_join(format!(
                "mismatched source chip when merging: {source}"
            )));
        }
        if other.segments.get(1) != self.segments.last() {
            return Err(InvalidRouteError::invalid_join(
                "mismatched overlap segment when merging".to_string(),
            ));
        }
        let added = other.segments.len().saturating_sub(2);
        self.segments.extend_from_slice(&other.segments[2..]);
        self.verify_rollback(added)
            .map_err(|e| InvalidRouteError::invalid_join(format!("merging routes failed: {e}")))
    }

    /// Split the route before segment `at`, yielding two individually valid
    /// routes. A cut immediately after a chip coordinate moves the chip into
    /// the second half so that it remains the source chip of the suffix; a
    /// cut into the middle of a chip-local run prepends the governing chip
    /// to the suffix.
    #[must_use]
    pub fn split(&self, at: usize) -> (Self, Self) {
        if at == 0 {
            return (Self::new(), self.clone());
        }
        if at >= self.segments.len() {
            return (self.clone(), Self::new());
        }

        let mut cut = at;
        if self.segments[cut - 1].is_chip() {
            cut -= 1;
        }
        if cut == 0 {
            return (Self::new(), self.clone());
        }

        let first: Vec<Segment> = self.segments[..cut].to_vec();
        let mut second: Vec<Segment> = Vec::with_capacity(self.segments.len() - cut + 1);
        if !self.segments[cut].is_chip() {
            let chip = self.segments[..cut]
                .iter()
                .rev()
                .find(|s| s.is_chip())
                .copied()
                .expect("non-empty route starts with a chip");
            second.push(chip);
        }
        second.extend_from_slice(&self.segments[cut..]);

        (Self::from_parts(first), Self::from_parts(second))
    }

    /// Construct without validating pairs (both halves of a valid route are
    /// valid by construction). Still recomputes the chip context.
    fn from_parts(segments: Vec<Segment>) -> Self {
        let mut route = Self { segments, last_chip: None };
        route.update_last_chip();
        route
    }

    fn update_last_chip(&mut self) {
        self.last_chip = self.segments.iter().rev().find_map(|s| match s {
            Segment::Chip(c) => Some(*c),
            _ => None,
        });
    }

    /// Full validation of the segment sequence.
    fn verify(&mut self) -> Result<()> {
        if self.segments.is_empty() {
            self.last_chip = None;
            return Ok(());
        }

        let Some(Segment::Chip(start)) = self.segments.first().copied() else {
            return Err(InvalidRouteError::MissingSourceChip);
        };
        if self.segments.len() < 2 {
            return Err(InvalidRouteError::BareChip);
        }

        // The pair (source chip, first segment) is not checked: the first
        // segment anchors the route within the source chip.
        let mut checker = SuccessorChecker::new(start);
        for index in 2..self.segments.len() {
            let prev = &self.segments[index - 1];
            let next = &self.segments[index];
            if !checker.step(prev, next) {
                return Err(InvalidRouteError::invalid_segment(next, index));
            }
        }
        self.last_chip = Some(checker.current_chip);
        Ok(())
    }

    /// Re-validate after `added` segments were pushed; pop them again on
    /// failure so the route is left untouched.
    fn verify_rollback(&mut self, added: usize) -> Result<()> {
        match self.verify() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.segments.truncate(self.segments.len() - added);
                self.update_last_chip();
                Err(e)
            }
        }
    }
}

impl<'a> IntoIterator for &'a L1Route {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// A branching bundle of routes sharing a common prefix.
///
/// The head carries events up to a branch point; every tail continues from
/// the chip the head ends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct L1RouteTree {
    head: L1Route,
    tails: Vec<L1RouteTree>,
}

impl L1RouteTree {
    /// A tree with no branches.
    #[must_use]
    pub fn new(head: L1Route) -> Self {
        Self { head, tails: Vec::new() }
    }

    /// The shared prefix route.
    #[must_use]
    pub fn head(&self) -> &L1Route {
        &self.head
    }

    /// The branches continuing from the head's target chip.
    #[must_use]
    pub fn tails(&self) -> &[L1RouteTree] {
        &self.tails
    }

    /// Attach a branch. The branch must start on the chip the head ends
    /// on, and the head must not be empty.
    ///
    /// # Errors
    ///
    /// Fails when the source/target chips do not line up.
    pub fn add_tail(&mut self, tail: L1RouteTree) -> Result<()> {
        let target = self.head.target_chip()?;
        let source = tail.head.source_chip()?;
        if target != source {
            return Err(InvalidRouteError::invalid_join(format!(
                "branch starts on {source} but trunk ends on {target}"
            )));
        }
        self.tails.push(tail);
        Ok(())
    }

    /// All complete source-to-leaf routes described by this tree.
    #[must_use]
    pub fn flatten(&self) -> Vec<L1Route> {
        let mut out = Vec::new();
        self.collect_into(&L1Route::new(), &mut out);
        out
    }

    fn collect_into(&self, prefix: &L1Route, out: &mut Vec<L1Route>) {
        let mut route = prefix.clone();
        // Branches repeat the bus they fork from; deduplicate it when
        // present, splice otherwise.
        if route.merge(&self.head).is_err() {
            route
                .extend(&self.head)
                .expect("tree invariant: head continues from prefix");
        }
        if self.tails.is_empty() {
            out.push(route);
            return;
        }
        for tail in &self.tails {
            tail.collect_into(&route, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{Side, SynapseColumn, SynapseRowOnChip, RowOnChip};

    fn chip(x: u8, y: u8) -> Segment {
        Segment::Chip(ChipOnWafer::new(x, y))
    }

    #[test]
    fn empty_route_is_legal_but_queries_fail() {
        let route = L1Route::new();
        assert!(route.is_empty());
        assert!(route.source_chip().is_err());
        assert!(route.target_chip().is_err());
    }

    #[test]
    fn bare_chip_is_rejected() {
        assert_eq!(
            L1Route::from_segments(vec![chip(0, 0)]),
            Err(InvalidRouteError::BareChip)
        );
    }

    #[test]
    fn route_must_start_with_chip() {
        let r = L1Route::from_segments(vec![
            Segment::HLine(HLine::new(6)),
            chip(1, 0),
        ]);
        assert_eq!(r, Err(InvalidRouteError::MissingSourceChip));
    }

    #[test]
    fn merger_tree_pairs() {
        for i in 0..8 {
            let mut route = L1Route::from_segments(vec![
                chip(0, 0),
                Segment::Merger0(Merger0::new(i)),
            ])
            .unwrap();
            route.append(Merger1::new(i / 2)).unwrap();
            route.append(Merger2::new(i / 4)).unwrap();
            route.append(Merger3::new(0)).unwrap();
            route.append(DncMerger::new(3)).unwrap();
            route.append(GbitLink::new(3)).unwrap();
        }

        // Direct leaf-to-DNC shortcuts only exist for 0, 2, 4 and 7.
        for i in 0..8 {
            let mut route = L1Route::from_segments(vec![
                chip(0, 0),
                Segment::Merger0(Merger0::new(i)),
            ])
            .unwrap();
            let ok = route.append(DncMerger::new(i)).is_ok();
            assert_eq!(ok, matches!(i, 0 | 2 | 4 | 7), "merger0({i})");
        }
    }

    #[test]
    fn sending_repeater_bus() {
        let mut route =
            L1Route::from_segments(vec![chip(3, 0), Segment::DncMerger(DncMerger::new(1))])
                .unwrap();
        assert!(route.clone().append(HLine::new(6)).is_err());
        route.append(HLine::new(14)).unwrap();
    }

    #[test]
    fn horizontal_boundary_crossing() {
        let h = HLine::new(14);
        let mut route = L1Route::from_segments(vec![
            chip(0, 0),
            Segment::DncMerger(DncMerger::new(1)),
            Segment::HLine(h),
        ])
        .unwrap();

        // Crossing east: the entered chip expects the east continuation.
        route.append_with_chip(ChipOnWafer::new(1, 0), h.east()).unwrap();
        assert_eq!(route.target_chip().unwrap(), ChipOnWafer::new(1, 0));

        // The wrong continuation is rejected and leaves the route intact.
        let before = route.clone();
        assert!(route.append_with_chip(ChipOnWafer::new(2, 0), h).is_err());
        assert_eq!(route, before);
    }

    #[test]
    fn vertical_boundary_crossing() {
        let h = HLine::new(6);
        let v = VLine::new(6); // crossbar: 6 % 32 == 6 % 32
        let mut route = L1Route::from_segments(vec![
            chip(0, 1),
            Segment::DncMerger(DncMerger::new(0)),
            Segment::HLine(h),
            Segment::VLine(v),
        ])
        .unwrap();
        route.append_with_chip(ChipOnWafer::new(0, 2), v.south()).unwrap();
        assert!(route
            .clone()
            .append_with_chip(ChipOnWafer::new(0, 2), v.north())
            .is_err());
    }

    #[test]
    fn crossbar_and_synapse_switch() {
        let h = HLine::new(14);
        let mut route = L1Route::from_segments(vec![
            chip(1, 0),
            Segment::DncMerger(DncMerger::new(1)),
            Segment::HLine(h),
        ])
        .unwrap();

        assert!(route.clone().append(VLine::new(15)).is_err());
        route.append(VLine::new(14)).unwrap();

        // vline 14: switch rows 14, 30, ... on the left side.
        assert!(route.clone().append(SynapseDriverOnChip::new(Side::Left, 15)).is_err());
        route.append(SynapseDriverOnChip::new(Side::Left, 14)).unwrap();

        // Driver chaining: same side, two rows apart.
        route.append(SynapseDriverOnChip::new(Side::Left, 16)).unwrap();
        assert!(route.clone().append(SynapseDriverOnChip::new(Side::Left, 17)).is_err());

        route
            .append(SynapseOnChip {
                row: SynapseRowOnChip {
                    driver: SynapseDriverOnChip::new(Side::Left, 16),
                    row: RowOnChip::Top,
                },
                column: SynapseColumn::new(0),
            })
            .unwrap();
    }

    #[test]
    fn cross_chip_route_into_synapse_driver() {
        // A full east-bound route: valid iff the entered chip continues
        // on the east continuation and the synapse switch exists.
        let h = HLine::new(14);
        let v = VLine::new(48); // crossbar: 48 % 32 == 16 % 32
        let route = L1Route::from_segments(vec![
            chip(0, 0),
            Segment::HLine(h),
            chip(1, 0),
            Segment::HLine(h.east()),
            Segment::VLine(v),
            Segment::Driver(SynapseDriverOnChip::new(Side::Left, 48)),
        ]);
        assert!(route.is_ok());

        let wrong_continuation = L1Route::from_segments(vec![
            chip(0, 0),
            Segment::HLine(h),
            chip(1, 0),
            Segment::HLine(h.west()),
            Segment::VLine(v),
        ]);
        assert!(wrong_continuation.is_err());

        let wrong_switch_row = L1Route::from_segments(vec![
            chip(0, 0),
            Segment::HLine(h),
            chip(1, 0),
            Segment::HLine(h.east()),
            Segment::VLine(v),
            Segment::Driver(SynapseDriverOnChip::new(Side::Left, 49)),
        ]);
        assert!(wrong_switch_row.is_err());
    }

    #[test]
    fn dnc_merger_crossing_to_the_left() {
        let m = DncMerger::new(0);
        let h = m.sending_repeater().hline();
        let mut route =
            L1Route::from_segments(vec![chip(2, 0), Segment::DncMerger(m)]).unwrap();
        // Output to the left reduces to the sending repeater's bus.
        route.append_with_chip(ChipOnWafer::new(1, 0), h.west()).unwrap();

        let mut right =
            L1Route::from_segments(vec![chip(2, 0), Segment::DncMerger(m)]).unwrap();
        assert!(right.append_with_chip(ChipOnWafer::new(3, 0), h.east()).is_err());
    }

    #[test]
    fn split_and_extend_round_trip() {
        let h = HLine::new(14);
        let route = L1Route::from_segments(vec![
            chip(0, 0),
            Segment::DncMerger(DncMerger::new(1)),
            Segment::HLine(h),
            chip(1, 0),
            Segment::HLine(h.east()),
            Segment::VLine(VLine::new(48)), // 16 % 32 == 48 % 32
        ])
        .unwrap();

        for at in 0..=route.len() {
            let (mut first, second) = route.split(at);
            assert!(first.is_empty() || first.len() >= 2);
            assert!(second.is_empty() || second.len() >= 2);
            first.extend(&second).unwrap();
            assert_eq!(first, route, "round trip at {at}");
        }
    }

    #[test]
    fn split_after_chip_moves_chip_into_suffix() {
        let h = HLine::new(14);
        let route = L1Route::from_segments(vec![
            chip(0, 0),
            Segment::DncMerger(DncMerger::new(1)),
            Segment::HLine(h),
            chip(1, 0),
            Segment::HLine(h.east()),
        ])
        .unwrap();

        // Cut right after the boundary chip: the chip belongs to the suffix.
        let (first, second) = route.split(4);
        assert_eq!(first.len(), 3);
        assert_eq!(second.source_chip().unwrap(), ChipOnWafer::new(1, 0));
    }

    #[test]
    fn merge_deduplicates_overlap() {
        let h = HLine::new(14);
        let mut trunk = L1Route::from_segments(vec![
            chip(0, 0),
            Segment::DncMerger(DncMerger::new(1)),
            Segment::HLine(h),
        ])
        .unwrap();
        let branch = L1Route::from_segments(vec![
            chip(0, 0),
            Segment::HLine(h),
            Segment::VLine(VLine::new(46)), // 14 % 32 == 46 % 32
        ])
        .unwrap();
        trunk.merge(&branch).unwrap();
        assert_eq!(trunk.len(), 4);
        assert_eq!(trunk.back(), Some(&Segment::VLine(VLine::new(46))));
    }

    #[test]
    fn route_tree_requires_matching_chips() {
        let h = HLine::new(14);
        let trunk = L1Route::from_segments(vec![
            chip(0, 0),
            Segment::DncMerger(DncMerger::new(1)),
            Segment::HLine(h),
            chip(1, 0),
            Segment::HLine(h.east()),
        ])
        .unwrap();
        let mut tree = L1RouteTree::new(trunk);

        let good = L1Route::from_segments(vec![
            chip(1, 0),
            Segment::HLine(h.east()),
            Segment::VLine(VLine::new(48)),
        ])
        .unwrap();
        tree.add_tail(L1RouteTree::new(good)).unwrap();

        let bad = L1Route::from_segments(vec![
            chip(5, 5),
            Segment::DncMerger(DncMerger::new(0)),
        ])
        .unwrap();
        assert!(tree.add_tail(L1RouteTree::new(bad)).is_err());

        let flat = tree.flatten();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].len(), 6);
    }
}
