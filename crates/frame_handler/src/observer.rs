//! Content box observation for the embedded body.
//!
//! Native resize observation is not available inside the embedded context,
//! so the observer falls back to a poll-based detection strategy: while
//! installed it samples the body geometry on a fixed cadence and forwards
//! a measurement whenever it differs from the last one reported. Samples
//! reach the sizing reconciler over a dedicated channel.

use frame_dom::BodyMetrics;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Duration, Instant};

/// One measurement reported to the sizing reconciler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct SizeSample {
    /// Body offset height plus vertical margins, px.
    pub(crate) height: i32,
    /// Body offset width, px.
    pub(crate) min_width: i32,
}

/// Derive a sample from raw body geometry. Non-numeric computed margins
/// count as zero.
pub(crate) fn measure(metrics: &BodyMetrics) -> SizeSample {
    SizeSample {
        height: metrics.offset_height
            + parse_px(&metrics.margin_top)
            + parse_px(&metrics.margin_bottom),
        min_width: metrics.offset_width,
    }
}

/// Leading-integer pixel parse: `"12px"` is 12, `"auto"` is 0.
fn parse_px(raw: &str) -> i32 {
    let text = raw.trim();
    let digits_end = text
        .char_indices()
        .find(|(index, character)| {
            !(character.is_ascii_digit() || (*index == 0 && matches!(character, '+' | '-')))
        })
        .map_or(text.len(), |(index, _)| index);
    text[..digits_end].parse().unwrap_or(0)
}

/// Poll-based watcher for the embedded body's content box.
pub(crate) struct ContentObserver {
    samples: UnboundedSender<SizeSample>,
    period: Duration,
    next_tick: Option<Instant>,
    last_reported: Option<SizeSample>,
}

impl ContentObserver {
    pub(crate) fn new(samples: UnboundedSender<SizeSample>) -> Self {
        Self {
            samples,
            period: Duration::from_millis(50),
            next_tick: None,
            last_reported: None,
        }
    }

    /// Arm the observer for a new body instance; the first poll is due
    /// immediately and its sample is always reported.
    pub(crate) fn install(&mut self, period: Duration) {
        self.period = period.max(Duration::from_millis(1));
        self.next_tick = Some(Instant::now());
        self.last_reported = None;
    }

    /// Disarm the observer. A no-op when not installed.
    pub(crate) fn uninstall(&mut self) {
        self.next_tick = None;
        self.last_reported = None;
    }

    pub(crate) const fn is_installed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Deadline of the next poll while installed.
    pub(crate) const fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Record a poll outcome and schedule the next tick.
    pub(crate) fn observe(&mut self, metrics: &BodyMetrics) {
        if self.next_tick.is_none() {
            return;
        }
        self.next_tick = Some(Instant::now() + self.period);
        let sample = measure(metrics);
        if self.last_reported != Some(sample) {
            self.last_reported = Some(sample);
            let _ = self.samples.send(sample);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn metrics(width: i32, height: i32, top: &str, bottom: &str) -> BodyMetrics {
        BodyMetrics {
            offset_width: width,
            offset_height: height,
            margin_top: top.to_owned(),
            margin_bottom: bottom.to_owned(),
        }
    }

    #[test]
    fn margins_add_to_the_measured_height() {
        let sample = measure(&metrics(640, 480, "8px", "12px"));
        assert_eq!(sample.height, 500);
        assert_eq!(sample.min_width, 640);
    }

    #[test]
    fn non_numeric_margins_count_as_zero() {
        let sample = measure(&metrics(640, 480, "auto", "10em"));
        assert_eq!(sample.height, 480 + 10);

        let sample = measure(&metrics(640, 480, "auto", "auto"));
        assert_eq!(sample.height, 480);
    }

    #[test]
    fn parse_px_reads_the_leading_integer() {
        assert_eq!(parse_px("12px"), 12);
        assert_eq!(parse_px(" 8px "), 8);
        assert_eq!(parse_px("-4px"), -4);
        assert_eq!(parse_px("auto"), 0);
        assert_eq!(parse_px(""), 0);
    }

    #[test]
    fn observe_reports_only_changed_samples() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut observer = ContentObserver::new(sender);
        observer.install(Duration::from_millis(10));

        let first = metrics(640, 480, "0px", "0px");
        observer.observe(&first);
        observer.observe(&first);
        let grown = metrics(640, 520, "0px", "0px");
        observer.observe(&grown);

        assert_eq!(receiver.try_recv().ok().map(|sample| sample.height), Some(480));
        assert_eq!(receiver.try_recv().ok().map(|sample| sample.height), Some(520));
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn uninstalled_observer_ignores_polls() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut observer = ContentObserver::new(sender);
        // Uninstalling before installing is a no-op.
        observer.uninstall();
        observer.observe(&metrics(640, 480, "0px", "0px"));
        assert!(receiver.try_recv().is_err());
        assert!(!observer.is_installed());
    }
}
