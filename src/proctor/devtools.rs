/// Outer (window) and inner (viewport) dimensions of the proctored surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowMetrics {
    pub outer_width: u32,
    pub outer_height: u32,
    pub inner_width: u32,
    pub inner_height: u32,
}

impl WindowMetrics {
    pub fn new(outer: (u32, u32), inner: (u32, u32)) -> Self {
        Self {
            outer_width: outer.0,
            outer_height: outer.1,
            inner_width: inner.0,
            inner_height: inner.1,
        }
    }
}

/// Docked inspection panels eat into the viewport while the window keeps its
/// size. A gap wider than the threshold on either axis trips the heuristic.
///
/// Known limitation: zoom levels and extensions that dock side panels produce
/// the same gap, so this is a deterrent and not a security boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevtoolsHeuristic {
    pub width_threshold: u32,
    pub height_threshold: u32,
}

impl Default for DevtoolsHeuristic {
    fn default() -> Self {
        Self::uniform(160)
    }
}

impl DevtoolsHeuristic {
    pub fn uniform(threshold: u32) -> Self {
        Self {
            width_threshold: threshold,
            height_threshold: threshold,
        }
    }

    pub fn tripped(&self, m: &WindowMetrics) -> bool {
        m.outer_width.saturating_sub(m.inner_width) > self.width_threshold
            || m.outer_height.saturating_sub(m.inner_height) > self.height_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_at_threshold_does_not_trip() {
        let h = DevtoolsHeuristic::default();
        assert!(!h.tripped(&WindowMetrics::new((1920, 1080), (1760, 920))));
    }

    #[test]
    fn gap_past_threshold_trips_on_either_axis() {
        let h = DevtoolsHeuristic::default();
        assert!(h.tripped(&WindowMetrics::new((1920, 1080), (1759, 1080))));
        assert!(h.tripped(&WindowMetrics::new((1920, 1080), (1920, 700))));
    }

    #[test]
    fn inner_larger_than_outer_never_trips() {
        let h = DevtoolsHeuristic::uniform(0);
        assert!(!h.tripped(&WindowMetrics::new((80, 24), (120, 40))));
    }

    #[test]
    fn per_axis_thresholds() {
        let h = DevtoolsHeuristic {
            width_threshold: 20,
            height_threshold: 8,
        };
        assert!(!h.tripped(&WindowMetrics::new((100, 40), (80, 32))));
        assert!(h.tripped(&WindowMetrics::new((100, 40), (79, 40))));
        assert!(h.tripped(&WindowMetrics::new((100, 40), (100, 31))));
    }
}
