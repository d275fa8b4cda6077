use crate::layout::{Granularity, LayoutVariant};

/// Generation parameters for one logical event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventShape {
    pub hits_per_event: usize,
    pub wires_per_event: usize,
    pub rois_per_wire: usize,
    /// Nominal ROI sample count; actual lengths jitter around this value.
    pub samples_per_roi: usize,
}

impl Default for EventShape {
    fn default() -> Self {
        Self {
            hits_per_event: 100,
            wires_per_event: 100,
            rois_per_wire: 10,
            samples_per_roi: 32,
        }
    }
}

/// One benchmark run's full parameter set. There is no process-wide
/// configuration; everything the orchestrators need flows through here.
#[derive(Clone, Copy, Debug)]
pub struct BenchParams {
    pub num_events: usize,
    pub shape: EventShape,
    /// Sub-entry count for spill-granularity variants.
    pub spills: usize,
    pub threads: usize,
    pub iterations: usize,
}

impl Default for BenchParams {
    fn default() -> Self {
        Self {
            num_events: 1000,
            shape: EventShape::default(),
            spills: 4,
            threads: 4,
            iterations: 5,
        }
    }
}

impl BenchParams {
    /// Returns the reason a write operation must be rejected before doing any
    /// work, or `None` if the parameters are usable.
    pub fn reject_write(&self, variant: LayoutVariant) -> Option<String> {
        if self.num_events == 0 {
            return Some("event count must be positive".to_string());
        }
        if self.threads == 0 {
            return Some("thread count must be positive".to_string());
        }
        if variant.granularity == Granularity::Spill && self.spills == 0 {
            return Some(format!(
                "variant {} requires a positive spill count",
                variant.label()
            ));
        }
        None
    }
}

/// Knobs of the write path that are properties of the store, not of the data.
#[derive(Clone, Copy, Debug)]
pub struct WriteOptions {
    /// Buffered row count at which a fill context reports a full cluster.
    pub rows_per_cluster: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            rows_per_cluster: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Grouping;

    #[test]
    fn rejects_degenerate_parameters() {
        let variant = LayoutVariant {
            granularity: Granularity::Event,
            grouping: Grouping::All,
        };
        let spill_variant = LayoutVariant {
            granularity: Granularity::Spill,
            grouping: Grouping::All,
        };

        let ok = BenchParams::default();
        assert!(ok.reject_write(variant).is_none());
        assert!(ok.reject_write(spill_variant).is_none());

        let no_events = BenchParams {
            num_events: 0,
            ..ok
        };
        assert!(no_events.reject_write(variant).is_some());

        let no_threads = BenchParams { threads: 0, ..ok };
        assert!(no_threads.reject_write(variant).is_some());

        let no_spills = BenchParams { spills: 0, ..ok };
        assert!(no_spills.reject_write(variant).is_none());
        assert!(no_spills.reject_write(spill_variant).is_some());
    }
}
