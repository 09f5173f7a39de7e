//! Debounce and reconciliation of raw measurements into host styling.
//!
//! The reconciler is the only consumer of the observer's sample stream.
//! It drops the first sample of each load cycle (pre-stabilization
//! layout), collapses consecutive duplicates, debounces what remains, and
//! turns the surviving sample into the style patch the host element gets.

use frame_dom::HostStyle;
use tokio::time::{Duration, Instant};

use crate::config::{ContentWidthMatch, FrameConfig};
use crate::observer::SizeSample;

/// Sizing options snapshotted for one load cycle.
#[derive(Clone, Debug)]
pub(crate) struct CycleSizing {
    pub(crate) debounce: Duration,
    pub(crate) match_content_width: ContentWidthMatch,
    pub(crate) resize_content: bool,
    pub(crate) min_width: Option<String>,
    pub(crate) height: Option<String>,
}

impl CycleSizing {
    pub(crate) fn from_config(config: &FrameConfig) -> Self {
        Self {
            debounce: config.resize_debounce(),
            match_content_width: config.match_content_width,
            resize_content: config.resize_content,
            min_width: config.min_width.clone(),
            height: config.height.clone(),
        }
    }
}

/// Collapses the raw measurement stream into debounced style patches.
pub(crate) struct SizeReconciler {
    sizing: CycleSizing,
    seen_first: bool,
    last_offered: Option<SizeSample>,
    pending: Option<SizeSample>,
    deadline: Option<Instant>,
    zoom: f64,
    has_body_width_rule: bool,
}

impl SizeReconciler {
    pub(crate) fn new(sizing: CycleSizing) -> Self {
        Self {
            sizing,
            seen_first: false,
            last_offered: None,
            pending: None,
            deadline: None,
            zoom: 1.0,
            has_body_width_rule: false,
        }
    }

    /// Reset stream state for a fresh load cycle.
    pub(crate) fn begin_cycle(&mut self, sizing: CycleSizing) {
        self.sizing = sizing;
        self.seen_first = false;
        self.last_offered = None;
        self.pending = None;
        self.deadline = None;
        self.zoom = 1.0;
        self.has_body_width_rule = false;
    }

    pub(crate) fn set_body_width_rule(&mut self, present: bool) {
        self.has_body_width_rule = present;
    }

    pub(crate) fn set_zoom(&mut self, factor: f64) {
        self.zoom = factor;
    }

    /// Deadline of the armed debounce window, if any.
    pub(crate) const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Accept a raw sample: the first of a cycle is dropped, consecutive
    /// duplicates collapse, anything else supersedes the pending sample
    /// and re-arms the debounce window.
    pub(crate) fn offer(&mut self, sample: SizeSample) {
        if !self.seen_first {
            // The dropped sample still seeds duplicate detection: layout
            // that never changes after stabilizing produces no patch.
            self.seen_first = true;
            self.last_offered = Some(sample);
            return;
        }
        if self.last_offered == Some(sample) {
            return;
        }
        self.last_offered = Some(sample);
        self.pending = Some(sample);
        self.deadline = Some(Instant::now() + self.sizing.debounce);
    }

    /// Take the debounced sample and derive the patch to apply.
    pub(crate) fn flush(&mut self) -> Option<HostStyle> {
        self.deadline = None;
        self.pending.take().map(|sample| self.derive_patch(sample))
    }

    /// Drop any in-flight debounce without producing a patch.
    pub(crate) fn cancel(&mut self) {
        self.pending = None;
        self.deadline = None;
    }

    /// Turn the surviving sample into host styling. Explicit overrides
    /// always win over measured values.
    fn derive_patch(&self, sample: SizeSample) -> HostStyle {
        let scaled_height = (f64::from(sample.height) * self.zoom).round() as i64;
        let height = self
            .sizing
            .height
            .clone()
            .unwrap_or_else(|| format!("{scaled_height}px"));
        let matched = self.sizing.match_content_width.is_enabled()
            && self.has_body_width_rule
            && self.sizing.min_width.is_none()
            && !self.sizing.resize_content;
        let min_width = if matched {
            Some(format!("{}px", sample.min_width))
        } else {
            self.sizing.min_width.clone()
        };
        HostStyle { height, min_width }
    }

    /// Zoom factor fitting the embedded body into the host width: shrink
    /// only, never magnify.
    pub(crate) fn zoom_factor(host_width: f64, body_width: i32) -> f64 {
        if body_width <= 0 {
            return 1.0;
        }
        (host_width / f64::from(body_width)).min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizing(config: &FrameConfig) -> CycleSizing {
        CycleSizing::from_config(config)
    }

    fn sample(height: i32, min_width: i32) -> SizeSample {
        SizeSample { height, min_width }
    }

    #[test]
    fn first_sample_of_a_cycle_is_dropped() {
        let mut reconciler = SizeReconciler::new(sizing(&FrameConfig::default()));
        reconciler.offer(sample(480, 640));
        assert!(reconciler.deadline().is_none());
        assert!(reconciler.flush().is_none());

        // An identical follow-up counts as a duplicate of the dropped one.
        reconciler.offer(sample(480, 640));
        assert!(reconciler.deadline().is_none());

        reconciler.offer(sample(500, 640));
        assert!(reconciler.deadline().is_some());
    }

    #[test]
    fn duplicate_samples_collapse() {
        let mut reconciler = SizeReconciler::new(sizing(&FrameConfig::default()));
        reconciler.offer(sample(480, 640));
        reconciler.offer(sample(500, 640));
        assert!(reconciler.flush().is_some());

        // The same measurement again does not re-arm the window.
        reconciler.offer(sample(500, 640));
        assert!(reconciler.deadline().is_none());
        assert!(reconciler.flush().is_none());
    }

    #[test]
    fn a_burst_yields_the_last_sample_only() {
        let mut reconciler = SizeReconciler::new(sizing(&FrameConfig::default()));
        reconciler.offer(sample(480, 640));
        reconciler.offer(sample(500, 640));
        reconciler.offer(sample(510, 640));
        reconciler.offer(sample(520, 640));

        let patch = reconciler.flush().map(|style| style.height);
        assert_eq!(patch.as_deref(), Some("520px"));
        assert!(reconciler.flush().is_none());
    }

    #[test]
    fn cancel_discards_the_pending_sample() {
        let mut reconciler = SizeReconciler::new(sizing(&FrameConfig::default()));
        reconciler.offer(sample(480, 640));
        reconciler.offer(sample(500, 640));
        reconciler.cancel();
        assert!(reconciler.deadline().is_none());
        assert!(reconciler.flush().is_none());
    }

    #[test]
    fn height_only_patch_by_default() {
        let reconciler = SizeReconciler::new(sizing(&FrameConfig::default()));
        let patch = reconciler.derive_patch(sample(500, 640));
        assert_eq!(patch.height, "500px");
        assert_eq!(patch.min_width, None);
    }

    #[test]
    fn matched_width_includes_the_measured_min_width() {
        let config = FrameConfig {
            match_content_width: ContentWidthMatch::Auto,
            ..FrameConfig::default()
        };
        let mut reconciler = SizeReconciler::new(sizing(&config));
        reconciler.set_body_width_rule(true);
        let patch = reconciler.derive_patch(sample(500, 640));
        assert_eq!(patch.min_width.as_deref(), Some("640px"));
    }

    #[test]
    fn width_matching_requires_the_body_rule() {
        let config = FrameConfig {
            match_content_width: ContentWidthMatch::Auto,
            ..FrameConfig::default()
        };
        let reconciler = SizeReconciler::new(sizing(&config));
        let patch = reconciler.derive_patch(sample(500, 640));
        assert_eq!(patch.min_width, None);
    }

    #[test]
    fn resize_content_suppresses_width_matching() {
        let config = FrameConfig {
            match_content_width: ContentWidthMatch::Enabled,
            resize_content: true,
            ..FrameConfig::default()
        };
        let mut reconciler = SizeReconciler::new(sizing(&config));
        reconciler.set_body_width_rule(true);
        let patch = reconciler.derive_patch(sample(500, 640));
        assert_eq!(patch.min_width, None);
    }

    #[test]
    fn explicit_overrides_win_over_measured_values() {
        let config = FrameConfig {
            match_content_width: ContentWidthMatch::Enabled,
            min_width: Some(String::from("20rem")),
            height: Some(String::from("75vh")),
            ..FrameConfig::default()
        };
        let mut reconciler = SizeReconciler::new(sizing(&config));
        reconciler.set_body_width_rule(true);
        let patch = reconciler.derive_patch(sample(500, 640));
        assert_eq!(patch.height, "75vh");
        assert_eq!(patch.min_width.as_deref(), Some("20rem"));
    }

    #[test]
    fn zoom_scales_the_measured_height() {
        let mut reconciler = SizeReconciler::new(sizing(&FrameConfig::default()));
        reconciler.set_zoom(0.5);
        let patch = reconciler.derive_patch(sample(501, 640));
        assert_eq!(patch.height, "251px");
    }

    #[test]
    fn zoom_factor_never_magnifies() {
        assert_eq!(SizeReconciler::zoom_factor(1200.0, 600), 1.0);
        assert_eq!(SizeReconciler::zoom_factor(600.0, 600), 1.0);
        assert_eq!(SizeReconciler::zoom_factor(300.0, 600), 0.5);
        // Degenerate body widths fall back to the identity factor.
        assert_eq!(SizeReconciler::zoom_factor(300.0, 0), 1.0);
    }
}
