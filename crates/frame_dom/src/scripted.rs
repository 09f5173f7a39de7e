//! Scripted in-memory frame backend.
//!
//! Implements the seam against plain data so the controller can be driven
//! without a browser: a test (or a headless integration) mutates the fake
//! page, fires signals, and inspects what the component did to it. The
//! handle is cheap to clone and every clone shares the same page state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    BodyMetrics, CrossOriginError, CssRuleAccessError, DomSignal, EmbeddedDocument, FrameBackend,
    HostStyle, LinkId, ListenTarget, ListenerId, SignalKind, StyleElementId,
};

/// An element recorded in the scripted document's head, in insertion order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HeadEntry {
    /// Inline `<style>` element.
    Style { id: StyleElementId, css: String },
    /// Stylesheet `<link>` element.
    Link { id: LinkId, href: String },
}

#[derive(Debug)]
struct ScriptedInner {
    accessible: bool,
    document_url: String,
    pending_navigation: Option<String>,
    navigations: Vec<String>,
    reloads: u32,
    host_width: f64,
    applied_styles: Vec<HostStyle>,
    head: Vec<HeadEntry>,
    body_width: i32,
    body_height: i32,
    margin_top: String,
    margin_bottom: String,
    body_overflow: String,
    body_scale: f64,
    stylesheets: Vec<String>,
    rules_blocked: bool,
    listeners: HashMap<ListenerId, (ListenTarget, SignalKind)>,
    attaches: u64,
    detaches: u64,
    next_id: u64,
}

impl Default for ScriptedInner {
    fn default() -> Self {
        Self {
            accessible: true,
            document_url: String::from("about:blank"),
            pending_navigation: None,
            navigations: Vec::new(),
            reloads: 0,
            host_width: 800.0,
            applied_styles: Vec::new(),
            head: Vec::new(),
            body_width: 800,
            body_height: 600,
            margin_top: String::from("0px"),
            margin_bottom: String::from("0px"),
            body_overflow: String::from("visible"),
            body_scale: 1.0,
            stylesheets: Vec::new(),
            rules_blocked: false,
            listeners: HashMap::new(),
            attaches: 0,
            detaches: 0,
            next_id: 1,
        }
    }
}

impl ScriptedInner {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Cloneable handle to a scripted frame; implements the backend seam.
#[derive(Clone)]
pub struct ScriptedFrame {
    inner: Arc<Mutex<ScriptedInner>>,
    signals: UnboundedSender<DomSignal>,
}

impl ScriptedFrame {
    /// Create a scripted frame together with the signal receiver that is
    /// handed to the controller.
    pub fn new() -> (Self, UnboundedReceiver<DomSignal>) {
        let (signals, receiver) = mpsc::unbounded_channel();
        let frame = Self {
            inner: Arc::new(Mutex::new(ScriptedInner::default())),
            signals,
        };
        (frame, receiver)
    }

    fn lock(&self) -> MutexGuard<'_, ScriptedInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `signal` if a listener with the given kind is attached on a
    /// matching target. Returns whether delivery happened.
    fn send_if_listening(
        &self,
        kind: SignalKind,
        matches: impl Fn(ListenTarget) -> bool,
        signal: DomSignal,
    ) -> bool {
        let armed = self
            .lock()
            .listeners
            .values()
            .any(|(target, attached_kind)| *attached_kind == kind && matches(*target));
        if armed {
            let _ = self.signals.send(signal);
        }
        armed
    }

    // --- page scripting ---

    /// Make the embedded document unreachable, as a cross-origin load is.
    pub fn deny_document_access(&self) {
        self.lock().accessible = false;
    }

    /// Make the embedded document reachable again.
    pub fn allow_document_access(&self) {
        self.lock().accessible = true;
    }

    /// Override the URL the embedded document reports.
    pub fn set_document_url(&self, url: &str) {
        self.lock().document_url = url.to_owned();
    }

    /// Set the host element's content-box width.
    pub fn set_host_width(&self, width: f64) {
        self.lock().host_width = width;
    }

    /// Resize the embedded body's offset box.
    pub fn set_body_size(&self, width: i32, height: i32) {
        let mut inner = self.lock();
        inner.body_width = width;
        inner.body_height = height;
    }

    /// Set the computed vertical margins the body reports.
    pub fn set_body_margins(&self, top: &str, bottom: &str) {
        let mut inner = self.lock();
        inner.margin_top = top.to_owned();
        inner.margin_bottom = bottom.to_owned();
    }

    /// Serve one more stylesheet's raw CSS text from the document.
    pub fn serve_stylesheet(&self, css: &str) {
        self.lock().stylesheets.push(css.to_owned());
    }

    /// Make stylesheet rule access fail, as a cross-origin sheet does.
    pub fn block_stylesheet_rules(&self) {
        self.lock().rules_blocked = true;
    }

    // --- signal firing ---

    /// Fire the frame's load signal. The freshly loaded document replaces
    /// the previous one: pending navigation becomes the document URL and
    /// the head and body styling reset. Returns whether a load listener
    /// was attached.
    pub fn fire_frame_load(&self) -> bool {
        {
            let mut inner = self.lock();
            if let Some(target) = inner.pending_navigation.take() {
                inner.document_url = target;
            }
            inner.head.clear();
            inner.body_overflow = String::from("visible");
            inner.body_scale = 1.0;
        }
        self.send_if_listening(
            SignalKind::Load,
            |target| target == ListenTarget::Frame,
            DomSignal::FrameLoaded,
        )
    }

    /// Fire `beforeunload` on the embedded window.
    pub fn fire_before_unload(&self) -> bool {
        self.send_if_listening(
            SignalKind::BeforeUnload,
            |target| target == ListenTarget::EmbeddedWindow,
            DomSignal::BeforeUnload,
        )
    }

    /// Fire a click inside the embedded window.
    pub fn fire_click(&self) -> bool {
        self.send_if_listening(
            SignalKind::Click,
            |target| target == ListenTarget::EmbeddedWindow,
            DomSignal::Click,
        )
    }

    /// Fire a key-up inside the embedded window.
    pub fn fire_key_up(&self) -> bool {
        self.send_if_listening(
            SignalKind::KeyUp,
            |target| target == ListenTarget::EmbeddedWindow,
            DomSignal::KeyUp,
        )
    }

    /// Fire a host window resize.
    pub fn fire_host_resize(&self) -> bool {
        self.send_if_listening(
            SignalKind::HostResize,
            |target| target == ListenTarget::HostWindow,
            DomSignal::HostResized,
        )
    }

    /// Complete the load of the `<link>` whose href matches. Returns false
    /// when no such link exists or nobody listens for its load.
    pub fn complete_stylesheet(&self, href: &str) -> bool {
        let link = self.lock().head.iter().find_map(|entry| match entry {
            HeadEntry::Link { id, href: recorded } if recorded == href => Some(*id),
            _ => None,
        });
        let Some(link) = link else {
            return false;
        };
        self.send_if_listening(
            SignalKind::Load,
            |target| target == ListenTarget::Link(link),
            DomSignal::LinkLoaded(link),
        )
    }

    // --- inspection ---

    /// Style patches applied to the host element, oldest first.
    pub fn applied_styles(&self) -> Vec<HostStyle> {
        self.lock().applied_styles.clone()
    }

    /// The most recent style patch applied to the host element.
    pub fn last_style(&self) -> Option<HostStyle> {
        self.lock().applied_styles.last().cloned()
    }

    /// Snapshot of the embedded head contents, in insertion order.
    pub fn head(&self) -> Vec<HeadEntry> {
        self.lock().head.clone()
    }

    /// Current body `overflow` value.
    pub fn body_overflow(&self) -> String {
        self.lock().body_overflow.clone()
    }

    /// Current body scale factor.
    pub fn body_scale(&self) -> f64 {
        self.lock().body_scale
    }

    /// Navigation targets bound so far, oldest first.
    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// How many times the embedded document was asked to reload.
    pub fn reload_count(&self) -> u32 {
        self.lock().reloads
    }

    /// Number of currently attached listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Total listener attachments over the frame's lifetime.
    pub fn attach_count(&self) -> u64 {
        self.lock().attaches
    }

    /// Total listener detachments over the frame's lifetime.
    pub fn detach_count(&self) -> u64 {
        self.lock().detaches
    }
}

impl FrameBackend for ScriptedFrame {
    fn navigate(&mut self, source: &str) {
        let mut inner = self.lock();
        inner.navigations.push(source.to_owned());
        inner.pending_navigation = Some(source.to_owned());
    }

    fn host_width(&self) -> f64 {
        self.lock().host_width
    }

    fn apply_host_style(&mut self, style: &HostStyle) {
        self.lock().applied_styles.push(style.clone());
    }

    fn attach(&mut self, target: ListenTarget, kind: SignalKind) -> ListenerId {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_id());
        inner.listeners.insert(id, (target, kind));
        inner.attaches += 1;
        id
    }

    fn detach(&mut self, id: ListenerId) {
        let mut inner = self.lock();
        if inner.listeners.remove(&id).is_some() {
            inner.detaches += 1;
        }
    }

    fn with_document<R>(
        &mut self,
        operation: impl FnOnce(&mut dyn EmbeddedDocument) -> R,
    ) -> Result<R, CrossOriginError> {
        let mut inner = self.lock();
        if !inner.accessible {
            return Err(CrossOriginError);
        }
        Ok(operation(&mut *inner))
    }
}

impl EmbeddedDocument for ScriptedInner {
    fn document_url(&self) -> String {
        self.document_url.clone()
    }

    fn append_head_style(&mut self, css: &str) -> StyleElementId {
        let id = StyleElementId(self.next_id());
        self.head.push(HeadEntry::Style {
            id,
            css: css.to_owned(),
        });
        id
    }

    fn insert_link_before(&mut self, href: &str, anchor: StyleElementId) -> LinkId {
        let id = LinkId(self.next_id());
        let entry = HeadEntry::Link {
            id,
            href: href.to_owned(),
        };
        let at = self.head.iter().position(
            |existing| matches!(existing, HeadEntry::Style { id, .. } if *id == anchor),
        );
        match at {
            Some(index) => self.head.insert(index, entry),
            None => self.head.push(entry),
        }
        id
    }

    fn body_metrics(&self) -> BodyMetrics {
        BodyMetrics {
            offset_width: self.body_width,
            offset_height: self.body_height,
            margin_top: self.margin_top.clone(),
            margin_bottom: self.margin_bottom.clone(),
        }
    }

    fn set_body_overflow(&mut self, value: &str) {
        self.body_overflow = value.to_owned();
    }

    fn set_body_scale(&mut self, factor: f64) {
        self.body_scale = factor;
    }

    fn stylesheet_text(&self) -> Result<Vec<String>, CssRuleAccessError> {
        if self.rules_blocked {
            return Err(CssRuleAccessError);
        }
        Ok(self.stylesheets.clone())
    }

    fn reload(&mut self) {
        self.reloads += 1;
    }
}
