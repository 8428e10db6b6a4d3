//! Maps a scroll position to the single active section.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The probe sits this fraction of the viewport below the top edge.
pub const PROBE_DIVISOR: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub offset: f64,
    pub viewport_height: f64,
}

impl ScrollMetrics {
    pub fn new(offset: f64, viewport_height: f64) -> Self {
        Self {
            offset,
            viewport_height,
        }
    }

    /// Document position used to decide which section is in view.
    pub fn probe(&self) -> f64 {
        self.offset + self.viewport_height / PROBE_DIVISOR
    }
}

/// Returns the index of the last anchor whose top is at or above the probe.
///
/// `None` entries are anchors that are not rendered yet; they are skipped
/// without shifting the index of the others.
pub fn locate(metrics: ScrollMetrics, anchors: &[Option<f64>]) -> Option<usize> {
    let probe = metrics.probe();
    anchors
        .iter()
        .enumerate()
        .rev()
        .filter_map(|(idx, top)| top.map(|top| (idx, top)))
        .find(|&(_, top)| top <= probe)
        .map(|(idx, _)| idx)
}

/// Parses `0,800,,1600`; empty items are anchors that are not rendered.
pub fn parse_anchors(raw: &str) -> Result<Vec<Option<f64>>, String> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(str::trim)
        .map(|item| {
            if item.is_empty() {
                return Ok(None);
            }
            item.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(Some)
                .ok_or_else(|| format!("Invalid anchor offset {item:?}"))
        })
        .collect()
}

/// Holds the active section across scroll events. Starts at the first section.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    ids: Vec<String>,
    active: usize,
}

impl ScrollTracker {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            active: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Section ids in document order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn active_index(&self) -> Option<usize> {
        (!self.ids.is_empty()).then_some(self.active)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.ids.get(self.active).map(String::as_str)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    /// Recomputes the active section. Returns `true` when it changed.
    ///
    /// When the probe is above every anchor the previous section stays active.
    pub fn update(&mut self, metrics: ScrollMetrics, anchors: &[Option<f64>]) -> bool {
        let considered = &anchors[..anchors.len().min(self.ids.len())];
        let Some(idx) = locate(metrics, considered) else {
            return false;
        };
        let changed = idx != self.active;
        if changed {
            debug!(
                from = %self.ids[self.active],
                to = %self.ids[idx],
                probe = metrics.probe(),
                "active section changed"
            );
        }
        self.active = idx;
        changed
    }

    /// Forces the active section, e.g. from a deep link. Unknown ids are ignored.
    pub fn select(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.active = idx;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANCHORS: [Option<f64>; 3] = [Some(0.0), Some(800.0), Some(1600.0)];

    fn tracker() -> ScrollTracker {
        ScrollTracker::new(["introduction", "equity", "environment"])
    }

    #[test]
    fn probe_is_a_third_down_the_viewport() {
        assert_eq!(ScrollMetrics::new(750.0, 900.0).probe(), 1050.0);
    }

    #[test]
    fn starts_on_first_section() {
        assert_eq!(tracker().active_id(), Some("introduction"));
    }

    #[test]
    fn probe_selects_the_last_passed_anchor() {
        let mut tracker = tracker();
        assert!(tracker.update(ScrollMetrics::new(750.0, 900.0), &ANCHORS));
        assert_eq!(tracker.active_id(), Some("equity"));
        assert!(tracker.update(ScrollMetrics::new(1400.0, 900.0), &ANCHORS));
        assert_eq!(tracker.active_id(), Some("environment"));
        assert!(tracker.update(ScrollMetrics::new(0.0, 900.0), &ANCHORS));
        assert_eq!(tracker.active_id(), Some("introduction"));
    }

    #[test]
    fn anchor_exactly_at_probe_is_active() {
        let mut tracker = tracker();
        tracker.update(ScrollMetrics::new(500.0, 900.0), &ANCHORS);
        assert_eq!(tracker.active_id(), Some("equity"));
    }

    #[test]
    fn update_is_idempotent() {
        let mut tracker = tracker();
        let metrics = ScrollMetrics::new(750.0, 900.0);
        assert!(tracker.update(metrics, &ANCHORS));
        assert!(!tracker.update(metrics, &ANCHORS));
        assert_eq!(tracker.active_id(), Some("equity"));
    }

    #[test]
    fn probe_above_all_anchors_keeps_previous() {
        let mut tracker = tracker();
        tracker.update(ScrollMetrics::new(750.0, 900.0), &ANCHORS);
        let shifted = [Some(5000.0), Some(6000.0), Some(7000.0)];
        assert!(!tracker.update(ScrollMetrics::new(0.0, 900.0), &shifted));
        assert_eq!(tracker.active_id(), Some("equity"));
    }

    #[test]
    fn missing_anchors_do_not_shift_indices() {
        let mut tracker = tracker();
        let anchors = [Some(0.0), None, Some(1600.0)];
        tracker.update(ScrollMetrics::new(750.0, 900.0), &anchors);
        assert_eq!(tracker.active_id(), Some("introduction"));
        tracker.update(ScrollMetrics::new(1400.0, 900.0), &anchors);
        assert_eq!(tracker.active_id(), Some("environment"));
    }

    #[test]
    fn extra_anchors_are_ignored() {
        let mut tracker = ScrollTracker::new(["a", "b"]);
        tracker.update(ScrollMetrics::new(5000.0, 900.0), &ANCHORS);
        assert_eq!(tracker.active_id(), Some("b"));
    }

    #[test]
    fn select_ignores_unknown_ids() {
        let mut tracker = tracker();
        assert!(tracker.select("environment"));
        assert!(!tracker.select("nowhere"));
        assert_eq!(tracker.active_id(), Some("environment"));
    }

    #[test]
    fn parse_anchors_keeps_gaps() {
        assert_eq!(
            parse_anchors("0, 800,,1600").unwrap(),
            vec![Some(0.0), Some(800.0), None, Some(1600.0)]
        );
        assert!(parse_anchors("").unwrap().is_empty());
        assert!(parse_anchors("1,inf").is_err());
        assert!(parse_anchors("1,abc").unwrap_err().contains("abc"));
    }

    #[test]
    fn empty_tracker_has_no_active_section() {
        let mut tracker = ScrollTracker::new(Vec::<String>::new());
        assert!(!tracker.update(ScrollMetrics::new(0.0, 900.0), &ANCHORS));
        assert_eq!(tracker.active_id(), None);
        assert_eq!(tracker.active_index(), None);
    }
}
