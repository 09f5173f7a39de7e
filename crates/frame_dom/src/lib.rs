//! DOM seam for the embeddable frame handler.
//!
//! The component in `frame_handler` never touches a real DOM directly; it
//! drives the traits in this crate instead. A browser integration implements
//! them on top of its engine bindings, while [`scripted::ScriptedFrame`]
//! provides the in-memory implementation used by tests and headless runs.

pub mod scripted;

use std::fmt;

use serde::Serialize;

/// Opaque handle for a listener attached through [`FrameBackend::attach`].
///
/// Handles are owned by whoever attached them and must be released with
/// [`FrameBackend::detach`]; releasing an unknown handle is a no-op.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(pub u64);

/// Handle for a stylesheet `<link>` element inserted into the embedded head.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct LinkId(pub u64);

/// Handle for a `<style>` element inserted into the embedded head.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct StyleElementId(pub u64);

/// Where a listener is attached.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ListenTarget {
    /// The frame element itself (load signals).
    Frame,
    /// The embedded document's window (click, key-up, beforeunload).
    EmbeddedWindow,
    /// The host page's window (resize signals for content scaling).
    HostWindow,
    /// A single stylesheet link in the embedded head (load signals).
    Link(LinkId),
}

/// Signal kinds a listener can subscribe to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SignalKind {
    Load,
    BeforeUnload,
    Click,
    KeyUp,
    HostResize,
}

/// A DOM occurrence delivered to the controller through an attached listener.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DomSignal {
    /// The frame element finished loading a document.
    FrameLoaded,
    /// The embedded document is about to unload.
    BeforeUnload,
    /// A click happened inside the embedded window.
    Click,
    /// A key was released inside the embedded window.
    KeyUp,
    /// A stylesheet link fired its load event.
    LinkLoaded(LinkId),
    /// The host window was resized.
    HostResized,
}

/// Raw geometry of the embedded body element at sample time.
///
/// Margins stay as raw computed CSS text because the embedded page may
/// declare them as anything (`"8px"`, `"auto"`, ...); the observer decides
/// how to read them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BodyMetrics {
    pub offset_width: i32,
    pub offset_height: i32,
    /// Computed `margin-top` text.
    pub margin_top: String,
    /// Computed `margin-bottom` text.
    pub margin_bottom: String,
}

/// Style patch applied to the host element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HostStyle {
    /// CSS height text, e.g. `"640px"`.
    pub height: String,
    /// CSS min-width text, present only when content width matching applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_width: Option<String>,
}

/// Tri-state loading indicator published to the host.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadPhase {
    /// A load cycle is in flight; the host should show its indicator.
    #[default]
    Loading,
    /// The cycle completed and injected styles are in place.
    Loaded,
    /// The embedded document was unreachable; the cycle was abandoned.
    LoadedWithErrors,
}

/// The browser denied access to the embedded document (same-origin policy).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CrossOriginError;

impl fmt::Display for CrossOriginError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("embedded document is not reachable across origins")
    }
}

impl std::error::Error for CrossOriginError {}

/// Reading stylesheet rules was denied, typically on a cross-origin sheet.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CssRuleAccessError;

impl fmt::Display for CssRuleAccessError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("stylesheet rules are not readable from this origin")
    }
}

impl std::error::Error for CssRuleAccessError {}

/// Host-side view of the frame element and its windows.
///
/// Listener attachment only wires delivery: the occurrences themselves
/// arrive on the [`DomSignal`] channel the backend was created with.
pub trait FrameBackend: Send {
    /// Bind a new navigation target to the frame. The text has already
    /// passed the caller's trust step.
    fn navigate(&mut self, source: &str);

    /// Content-box width of the host element, in px.
    fn host_width(&self) -> f64;

    /// Apply a style patch to the host element.
    fn apply_host_style(&mut self, style: &HostStyle);

    /// Attach a listener; the returned handle must eventually be released
    /// with [`detach`](Self::detach).
    fn attach(&mut self, target: ListenTarget, kind: SignalKind) -> ListenerId;

    /// Release a listener. Unknown handles are ignored.
    fn detach(&mut self, id: ListenerId);

    /// Run `operation` against the embedded document, or fail if the
    /// browser denies access across origins.
    fn with_document<R>(
        &mut self,
        operation: impl FnOnce(&mut dyn EmbeddedDocument) -> R,
    ) -> Result<R, CrossOriginError>;
}

/// Same-origin view of the document rendered inside the frame.
pub trait EmbeddedDocument {
    /// URL the document was actually loaded from.
    fn document_url(&self) -> String;

    /// Append a `<style>` element with the given CSS text to the head.
    fn append_head_style(&mut self, css: &str) -> StyleElementId;

    /// Insert a stylesheet `<link>` before `anchor`. Load completion is
    /// observed through a [`ListenTarget::Link`] listener.
    fn insert_link_before(&mut self, href: &str, anchor: StyleElementId) -> LinkId;

    /// Current body geometry.
    fn body_metrics(&self) -> BodyMetrics;

    /// Set the body `overflow` property.
    fn set_body_overflow(&mut self, value: &str);

    /// Apply a scale factor to the body (content zoom). Factor 1.0 clears it.
    fn set_body_scale(&mut self, factor: f64);

    /// Raw CSS text of every stylesheet reachable from the document, in
    /// document order.
    fn stylesheet_text(&self) -> Result<Vec<String>, CssRuleAccessError>;

    /// Force the document to reload in place.
    fn reload(&mut self);
}
