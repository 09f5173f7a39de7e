//! Host-facing configuration for an embedded frame.
//!
//! Options are read by every component but snapshotted by the lifecycle
//! controller at the start of each load cycle: replacing the configuration
//! mid-cycle takes effect on the next load.

use core::time::Duration;
use std::env;

/// Whether the host element should adopt the embedded content's width.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ContentWidthMatch {
    /// Never include a min-width in the style patch.
    #[default]
    Disabled,
    /// Treat the embedded content as having an intrinsic width.
    Enabled,
    /// Decide by scanning the embedded stylesheets for a body width rule.
    Auto,
}

impl ContentWidthMatch {
    /// True unless matching is disabled outright.
    #[inline]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Options for one embedded frame.
#[derive(Clone, Debug)]
pub struct FrameConfig {
    /// Inline CSS injected into the embedded document, if any.
    pub styles: Option<String>,
    /// External stylesheets injected in order.
    pub style_urls: Vec<String>,
    /// Watch the embedded body and auto-size the host element.
    pub auto_resize: bool,
    /// Scale embedded content down to fit the host width instead of only
    /// reporting its height.
    pub resize_content: bool,
    /// Content width matching policy.
    pub match_content_width: ContentWidthMatch,
    /// Explicit host min-width override (CSS length text).
    pub min_width: Option<String>,
    /// Explicit host height override (CSS length text).
    pub height: Option<String>,
    /// Debounce window for measurement samples, in milliseconds.
    pub resize_debounce_millis: u64,
    /// Poll cadence of the content observer, in milliseconds (minimum 1).
    pub observer_poll_millis: u64,
    /// Mirror every emitted event record to the log sink.
    pub debug: bool,
    /// Re-validate the source URL against the scheme policy before
    /// trusting it.
    pub sanitize_source: bool,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            styles: None,
            style_urls: Vec::new(),
            auto_resize: true,
            resize_content: false,
            match_content_width: ContentWidthMatch::Disabled,
            min_width: None,
            height: None,
            resize_debounce_millis: 50,
            observer_poll_millis: 50,
            debug: false,
            sanitize_source: false,
        }
    }
}

impl FrameConfig {
    /// Load overrides from environment variables on top of the defaults.
    ///
    /// Reads the following environment variables:
    /// - `FRAME_DEBUG`: set to "1" to mirror event records to the log sink
    /// - `FRAME_RESIZE_DEBOUNCE_MS`: debounce window in milliseconds
    /// - `FRAME_OBSERVER_POLL_MS`: observer poll cadence in milliseconds
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let debug = lookup("FRAME_DEBUG").as_deref() == Some("1");
        let resize_debounce_millis = lookup("FRAME_RESIZE_DEBOUNCE_MS")
            .and_then(|val| val.parse().ok())
            .unwrap_or(defaults.resize_debounce_millis);
        let observer_poll_millis = lookup("FRAME_OBSERVER_POLL_MS")
            .and_then(|val| val.parse::<u64>().ok())
            .map_or(defaults.observer_poll_millis, |millis| millis.max(1));
        Self {
            debug,
            resize_debounce_millis,
            observer_poll_millis,
            ..defaults
        }
    }

    /// Get the resize debounce window as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_millis)
    }

    /// Get the observer poll cadence as a `Duration`, clamped to 1ms.
    #[inline]
    #[must_use]
    pub const fn observer_poll(&self) -> Duration {
        let millis = if self.observer_poll_millis < 1 {
            1
        } else {
            self.observer_poll_millis
        };
        Duration::from_millis(millis)
    }
}
