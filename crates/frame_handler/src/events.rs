//! Event records emitted to the host page.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Kinds of event records the frame emits, named by their wire form.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameEventKind {
    ContentLoaded,
    ContentLoadedWithErrors,
    ContentUnloaded,
    ContentStylesAdded,
    StylesheetLoadStarted,
    StylesheetLoaded,
    AllStylesheetsLoaded,
    ContentClick,
    ContentKeyup,
    ContentResized,
    ContentScaled,
}

impl FrameEventKind {
    /// Kebab-case wire name of the event kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContentLoaded => "content-loaded",
            Self::ContentLoadedWithErrors => "content-loaded-with-errors",
            Self::ContentUnloaded => "content-unloaded",
            Self::ContentStylesAdded => "content-styles-added",
            Self::StylesheetLoadStarted => "stylesheet-load-started",
            Self::StylesheetLoaded => "stylesheet-loaded",
            Self::AllStylesheetsLoaded => "all-stylesheets-loaded",
            Self::ContentClick => "content-click",
            Self::ContentKeyup => "content-keyup",
            Self::ContentResized => "content-resized",
            Self::ContentScaled => "content-scaled",
        }
    }
}

impl fmt::Display for FrameEventKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One record in the outbound event stream. Immutable once emitted;
/// records arrive in causal emission order.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FrameEvent {
    /// What happened.
    pub event: FrameEventKind,
    /// Active source URL captured at emission time.
    pub src: String,
    /// Affected resource (a stylesheet URL, or the joined URL list for
    /// the aggregate completion), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

/// Outbound event surface: stamps the active source on each record and
/// mirrors records to the log sink as JSON lines in debug mode.
pub(crate) struct EventGateway {
    outbound: UnboundedSender<FrameEvent>,
    source: String,
    debug: bool,
}

impl EventGateway {
    pub(crate) fn new(outbound: UnboundedSender<FrameEvent>, debug: bool) -> Self {
        Self {
            outbound,
            source: String::new(),
            debug,
        }
    }

    /// Update the active source stamped on subsequent records.
    pub(crate) fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub(crate) fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub(crate) fn emit(&self, kind: FrameEventKind) {
        self.emit_with(kind, None);
    }

    pub(crate) fn emit_with(&self, kind: FrameEventKind, resource: Option<String>) {
        let record = FrameEvent {
            event: kind,
            src: self.source.clone(),
            resource,
        };
        if self.debug
            && let Ok(line) = serde_json::to_string(&record)
        {
            log::info!(target: "frame_handler::events", "{line}");
        }
        let _ = self.outbound.send(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn wire_names_match_the_serialized_form() {
        let kinds = [
            FrameEventKind::ContentLoaded,
            FrameEventKind::ContentLoadedWithErrors,
            FrameEventKind::ContentUnloaded,
            FrameEventKind::ContentStylesAdded,
            FrameEventKind::StylesheetLoadStarted,
            FrameEventKind::StylesheetLoaded,
            FrameEventKind::AllStylesheetsLoaded,
            FrameEventKind::ContentClick,
            FrameEventKind::ContentKeyup,
            FrameEventKind::ContentResized,
            FrameEventKind::ContentScaled,
        ];
        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn gateway_stamps_the_active_source() {
        let (outbound, mut inbound) = mpsc::unbounded_channel();
        let mut gateway = EventGateway::new(outbound, false);
        gateway.set_source("https://example.test/page.html");
        gateway.emit_with(FrameEventKind::StylesheetLoaded, Some(String::from("a.css")));

        let record = inbound.try_recv().unwrap();
        assert_eq!(record.event, FrameEventKind::StylesheetLoaded);
        assert_eq!(record.src, "https://example.test/page.html");
        assert_eq!(record.resource.as_deref(), Some("a.css"));
    }

    #[test]
    fn records_skip_absent_resources_when_serialized() {
        let record = FrameEvent {
            event: FrameEventKind::ContentLoaded,
            src: String::from("page.html"),
            resource: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"event":"content-loaded","src":"page.html"}"#);
    }
}
