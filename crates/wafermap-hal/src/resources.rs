//! Chip resource tracking.
//!
//! A manifest describes which grid positions are populated and which of
//! those are known-defective; the manager then hands chips to the mapping
//! stages. Defects are fixed at initialisation time, allocation is
//! monotone: chips are claimed as the placers touch them and never given
//! back during a run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use wafermap_chip::{ChipOnWafer, Wafer, CHIP_GRID_HEIGHT, CHIP_GRID_WIDTH};

/// On-disk description of the available hardware.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceManifest {
    /// The wafer module.
    pub wafer: Wafer,
    /// Populated grid positions. Empty means "the full grid".
    #[serde(default)]
    pub present: Vec<ChipOnWafer>,
    /// Known-defective chips; never handed out.
    #[serde(default)]
    pub defects: Vec<ChipOnWafer>,
}

impl ResourceManifest {
    /// A manifest with every grid position populated and no defects.
    #[must_use]
    pub fn full_wafer(wafer: Wafer) -> Self {
        Self { wafer, present: Vec::new(), defects: Vec::new() }
    }
}

/// Tracks chip states over a mapping run: *present*, *available*,
/// *allocated* or *defective*.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    wafer: Wafer,
    present: BTreeSet<ChipOnWafer>,
    defects: BTreeSet<ChipOnWafer>,
    allocated: BTreeSet<ChipOnWafer>,
}

impl ResourceManager {
    /// Build the manager from a manifest.
    #[must_use]
    pub fn new(manifest: &ResourceManifest) -> Self {
        let mut present: BTreeSet<ChipOnWafer> = if manifest.present.is_empty() {
            (0..CHIP_GRID_WIDTH)
                .flat_map(|x| (0..CHIP_GRID_HEIGHT).map(move |y| ChipOnWafer::new(x, y)))
                .collect()
        } else {
            manifest.present.iter().copied().collect()
        };
        let defects: BTreeSet<ChipOnWafer> = manifest.defects.iter().copied().collect();
        present.retain(|chip| !defects.contains(chip));

        info!(
            wafer = manifest.wafer.0,
            present = present.len(),
            defects = defects.len(),
            "resource manager initialised"
        );
        Self { wafer: manifest.wafer, present, defects, allocated: BTreeSet::new() }
    }

    /// The wafer module this manager describes.
    #[must_use]
    pub const fn wafer(&self) -> Wafer {
        self.wafer
    }

    /// All usable (present, non-defective) chips in coordinate order.
    pub fn present(&self) -> impl Iterator<Item = ChipOnWafer> + '_ {
        self.present.iter().copied()
    }

    /// Whether a chip is usable at all.
    #[must_use]
    pub fn has(&self, chip: ChipOnWafer) -> bool {
        self.present.contains(&chip)
    }

    /// Whether a chip is marked defective.
    #[must_use]
    pub fn is_defect(&self, chip: ChipOnWafer) -> bool {
        self.defects.contains(&chip)
    }

    /// Whether a chip is usable and not yet claimed.
    #[must_use]
    pub fn available(&self, chip: ChipOnWafer) -> bool {
        self.present.contains(&chip) && !self.allocated.contains(&chip)
    }

    /// Claim a chip for the current mapping. Claiming an already-claimed
    /// chip is a no-op; claiming an absent chip returns `false`.
    pub fn allocate(&mut self, chip: ChipOnWafer) -> bool {
        if !self.present.contains(&chip) {
            return false;
        }
        if self.allocated.insert(chip) {
            debug!(%chip, "chip allocated");
        }
        true
    }

    /// All claimed chips in coordinate order. Stages iterate this to get a
    /// deterministic per-chip fan-out.
    pub fn allocated(&self) -> impl Iterator<Item = ChipOnWafer> + '_ {
        self.allocated.iter().copied()
    }

    /// Number of claimed chips.
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_wafer_has_all_chips() {
        let mgr = ResourceManager::new(&ResourceManifest::full_wafer(Wafer(0)));
        assert_eq!(mgr.present().count(), 36 * 16);
    }

    #[test]
    fn defects_are_excluded() {
        let manifest = ResourceManifest {
            wafer: Wafer(0),
            present: vec![ChipOnWafer::new(0, 0), ChipOnWafer::new(1, 0)],
            defects: vec![ChipOnWafer::new(1, 0)],
        };
        let mgr = ResourceManager::new(&manifest);
        assert_eq!(mgr.present().count(), 1);
        assert!(mgr.is_defect(ChipOnWafer::new(1, 0)));
        assert!(!mgr.available(ChipOnWafer::new(1, 0)));
    }

    #[test]
    fn allocation_is_monotone() {
        let manifest = ResourceManifest {
            wafer: Wafer(0),
            present: vec![ChipOnWafer::new(0, 0)],
            defects: vec![],
        };
        let mut mgr = ResourceManager::new(&manifest);
        assert!(mgr.available(ChipOnWafer::new(0, 0)));
        assert!(mgr.allocate(ChipOnWafer::new(0, 0)));
        assert!(!mgr.available(ChipOnWafer::new(0, 0)));
        assert!(mgr.allocate(ChipOnWafer::new(0, 0)));
        assert!(!mgr.allocate(ChipOnWafer::new(5, 5)));
        assert_eq!(mgr.allocated_count(), 1);
    }
}
