//! Synapse loss accounting.
//!
//! Routing failures are not fatal: an unreachable target or an overfull
//! driver costs the affected synapses, which are tallied here and
//! reported at the end of the run. The accumulator is the one piece of
//! state shared across worker threads.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use wafermap_bio::ProjectionId;

/// Thread-safe synapse loss tally.
#[derive(Debug, Default)]
pub struct SynapseLoss {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default, Clone)]
struct Inner {
    per_projection: BTreeMap<ProjectionId, usize>,
    total: usize,
}

impl SynapseLoss {
    /// A zeroed tally.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `count` lost synapses of `projection`.
    pub fn add(&self, projection: ProjectionId, count: usize) {
        if count == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        *inner.per_projection.entry(projection).or_insert(0) += count;
        inner.total += count;
    }

    /// Total lost synapses.
    #[must_use]
    pub fn total(&self) -> usize {
        self.inner.lock().total
    }

    /// Lost synapses per projection, in id order.
    #[must_use]
    pub fn per_projection(&self) -> BTreeMap<ProjectionId, usize> {
        self.inner.lock().per_projection.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn losses_accumulate() {
        let loss = SynapseLoss::new();
        loss.add(ProjectionId(0), 3);
        loss.add(ProjectionId(1), 2);
        loss.add(ProjectionId(0), 1);
        loss.add(ProjectionId(2), 0);
        assert_eq!(loss.total(), 6);
        let per = loss.per_projection();
        assert_eq!(per[&ProjectionId(0)], 4);
        assert_eq!(per.len(), 2);
    }
}
