//! Lifecycle controller and host-facing handle for an embedded frame.
//!
//! The controller is a single task that owns the backend, the listener
//! handles, the stylesheet join, the content observer and the sizing
//! reconciler. Everything it reacts to arrives over channels: host
//! commands, DOM signals from attached listeners, measurement samples, and
//! the two timers (debounce deadline, observer poll). One task means all
//! work is cooperative and event records leave in causal order.

use anyhow::{Context as _, Error};
use frame_dom::{
    CrossOriginError, DomSignal, FrameBackend, LinkId, ListenTarget, ListenerId, LoadPhase,
    SignalKind,
};
use log::{debug, info, trace, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info_span;

use crate::config::{ContentWidthMatch, FrameConfig};
use crate::events::{EventGateway, FrameEvent, FrameEventKind};
use crate::injector::{OVERFLOW_GUARD_CSS, StyleJoin};
use crate::observer::{ContentObserver, SizeSample, measure};
use crate::reconciler::{CycleSizing, SizeReconciler};
use crate::url::sanitize_source;

/// Lifecycle states of an embedded frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameState {
    /// No source bound yet.
    Idle,
    /// A navigation is in flight (or the document announced an unload).
    Loading,
    /// The document loaded; styles are being injected.
    Attaching,
    /// The cycle completed; listeners and observer are live.
    Ready,
    /// The embedded document was unreachable this cycle.
    Error,
    /// The component was torn down.
    Destroyed,
}

/// Host commands delivered to the controller task.
enum Command {
    SetSource(String),
    UpdateConfig(FrameConfig),
    Reload,
    Destroy,
}

/// Host-facing handle to a spawned frame controller.
///
/// Dropping the handle tears the controller down the same way
/// [`destroy`](Self::destroy) does, once the command channel closes.
pub struct EmbedFrame {
    commands: UnboundedSender<Command>,
    events: Option<UnboundedReceiver<FrameEvent>>,
    loading: watch::Receiver<LoadPhase>,
    sanitize: bool,
    task: JoinHandle<()>,
}

impl EmbedFrame {
    /// Spawn a controller over `backend`, reading DOM occurrences from
    /// `signals`.
    pub fn spawn<B>(backend: B, signals: UnboundedReceiver<DomSignal>, config: FrameConfig) -> Self
    where
        B: FrameBackend + 'static,
    {
        let (command_sender, command_receiver) = mpsc::unbounded_channel();
        let (event_sender, event_receiver) = mpsc::unbounded_channel();
        let (sample_sender, sample_receiver) = mpsc::unbounded_channel();
        let (loading_sender, loading_receiver) = watch::channel(LoadPhase::Loading);
        let sanitize = config.sanitize_source;
        let gateway = EventGateway::new(event_sender, config.debug);
        let controller = FrameController {
            backend,
            gateway,
            loading: loading_sender,
            state: FrameState::Idle,
            listeners: Vec::new(),
            frame_listener: None,
            join: None,
            observer: ContentObserver::new(sample_sender),
            reconciler: SizeReconciler::new(CycleSizing::from_config(&config)),
            config,
        };
        let task = tokio::spawn(controller.run(command_receiver, signals, sample_receiver));
        Self {
            commands: command_sender,
            events: Some(event_receiver),
            loading: loading_receiver,
            sanitize,
            task,
        }
    }

    /// Set or replace the embed source, starting a load cycle. The raw
    /// text passes the trust step before it reaches the frame.
    pub fn set_source(&self, raw: &str) -> Result<(), Error> {
        let trusted = sanitize_source(raw, self.sanitize)?;
        self.commands
            .send(Command::SetSource(trusted.as_str().to_owned()))
            .ok()
            .context("frame controller is gone")
    }

    /// Replace the configuration. Takes effect from the next load cycle.
    pub fn update_config(&mut self, config: FrameConfig) -> Result<(), Error> {
        self.sanitize = config.sanitize_source;
        self.commands
            .send(Command::UpdateConfig(config))
            .ok()
            .context("frame controller is gone")
    }

    /// Ask the embedded document to reload. A no-op when the document is
    /// unreachable or the controller is gone.
    pub fn reload(&self) {
        let _ = self.commands.send(Command::Reload);
    }

    /// Tear the frame down. Safe to call repeatedly; listeners are
    /// detached exactly once.
    pub fn destroy(&self) {
        let _ = self.commands.send(Command::Destroy);
    }

    /// Watch the tri-state loading indicator.
    #[must_use]
    pub fn loading(&self) -> watch::Receiver<LoadPhase> {
        self.loading.clone()
    }

    /// Take the outbound event receiver. Yields `None` after the first call.
    pub fn take_events(&mut self) -> Option<UnboundedReceiver<FrameEvent>> {
        self.events.take()
    }

    /// The outbound events as a `Stream`; `None` once the receiver was taken.
    pub fn events_stream(&mut self) -> Option<UnboundedReceiverStream<FrameEvent>> {
        self.take_events().map(UnboundedReceiverStream::new)
    }

    /// Wait for the controller task to finish after a destroy.
    pub async fn closed(self) {
        let _ = self.task.await;
    }
}

/// Sleep until `deadline`, or forever when there is none. Only polled
/// behind a `select!` precondition.
async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

struct FrameController<B: FrameBackend> {
    backend: B,
    config: FrameConfig,
    state: FrameState,
    gateway: EventGateway,
    loading: watch::Sender<LoadPhase>,
    /// Per-cycle listener handles; drained on the next successful load and
    /// on destroy.
    listeners: Vec<ListenerId>,
    /// The frame element's own load listener, alive across cycles.
    frame_listener: Option<ListenerId>,
    join: Option<StyleJoin>,
    observer: ContentObserver,
    reconciler: SizeReconciler,
}

impl<B: FrameBackend> FrameController<B> {
    async fn run(
        mut self,
        mut commands: UnboundedReceiver<Command>,
        mut signals: UnboundedReceiver<DomSignal>,
        mut samples: UnboundedReceiver<SizeSample>,
    ) {
        self.frame_listener = Some(self.backend.attach(ListenTarget::Frame, SignalKind::Load));
        loop {
            let debounce_at = self.reconciler.deadline();
            let poll_at = self.observer.next_tick();
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Destroy) | None => {
                        self.teardown();
                        break;
                    }
                    Some(command) => self.handle_command(command),
                },
                signal = signals.recv() => match signal {
                    Some(signal) => self.handle_signal(signal),
                    None => {
                        self.teardown();
                        break;
                    }
                },
                sample = samples.recv() => {
                    if let Some(sample) = sample {
                        self.reconciler.offer(sample);
                    }
                },
                () = sleep_opt(debounce_at), if debounce_at.is_some() => self.flush_resize(),
                () = sleep_opt(poll_at), if poll_at.is_some() => self.poll_body(),
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetSource(source) => self.begin_navigation(&source),
            Command::UpdateConfig(config) => {
                self.gateway.set_debug(config.debug);
                self.config = config;
            }
            Command::Reload => self.reload(),
            // Destroy is handled by the run loop so it can break.
            Command::Destroy => {}
        }
    }

    fn handle_signal(&mut self, signal: DomSignal) {
        if self.state == FrameState::Destroyed {
            return;
        }
        match signal {
            DomSignal::FrameLoaded => self.on_frame_loaded(),
            DomSignal::BeforeUnload => self.on_before_unload(),
            DomSignal::Click => self.gateway.emit(FrameEventKind::ContentClick),
            DomSignal::KeyUp => self.gateway.emit(FrameEventKind::ContentKeyup),
            DomSignal::LinkLoaded(link) => self.on_link_loaded(link),
            DomSignal::HostResized => self.on_host_resized(),
        }
    }

    fn begin_navigation(&mut self, source: &str) {
        if self.state == FrameState::Destroyed {
            return;
        }
        info!("navigating frame to {source}");
        self.gateway.set_source(source);
        self.state = FrameState::Loading;
        let _ = self.loading.send(LoadPhase::Loading);
        self.backend.navigate(source);
    }

    fn reload(&mut self) {
        if self
            .backend
            .with_document(|document| document.reload())
            .is_err()
        {
            debug!("reload skipped: embedded document unreachable");
        }
    }

    /// Start a fresh cycle for the document the frame just loaded.
    fn on_frame_loaded(&mut self) {
        let _span = info_span!("frame.load_cycle").entered();
        self.state = FrameState::Attaching;
        self.observer.uninstall();
        self.join = None;
        self.reconciler
            .begin_cycle(CycleSizing::from_config(&self.config));
        let stale = std::mem::take(&mut self.listeners);
        for listener in stale {
            self.backend.detach(listener);
        }

        let document_url = match self.backend.with_document(|document| document.document_url()) {
            Ok(url) => url,
            Err(CrossOriginError) => {
                self.fail_cross_origin();
                return;
            }
        };
        trace!("frame loaded {document_url}");
        self.gateway.set_source(document_url);

        // Overflow guard first: every later head insertion anchors on it.
        let guard = self
            .backend
            .with_document(|document| document.append_head_style(OVERFLOW_GUARD_CSS));
        let Ok(guard) = guard else {
            self.fail_cross_origin();
            return;
        };

        if let Some(css) = self.config.styles.clone()
            && self
                .backend
                .with_document(|document| {
                    document.append_head_style(&css);
                })
                .is_ok()
        {
            self.gateway.emit(FrameEventKind::ContentStylesAdded);
        }

        if self.config.style_urls.is_empty() {
            self.finish_attach();
        } else {
            let urls = self.config.style_urls.clone();
            let injected = self
                .backend
                .with_document(|document| StyleJoin::inject(document, &urls, guard));
            match injected {
                Ok((join, created)) => {
                    for (link, url) in created {
                        let listener = self
                            .backend
                            .attach(ListenTarget::Link(link), SignalKind::Load);
                        self.listeners.push(listener);
                        self.gateway
                            .emit_with(FrameEventKind::StylesheetLoadStarted, Some(url));
                    }
                    self.join = Some(join);
                }
                Err(CrossOriginError) => {
                    self.fail_cross_origin();
                }
            }
        }
    }

    /// Abandon the cycle: the document is behind another origin, so no
    /// listener, style or resize setup can happen.
    fn fail_cross_origin(&mut self) {
        warn!("cross-origin frame: listeners, styles and resize setup skipped for this cycle");
        self.state = FrameState::Error;
        let _ = self.loading.send(LoadPhase::LoadedWithErrors);
        self.gateway.emit(FrameEventKind::ContentLoadedWithErrors);
    }

    /// The style join is satisfied (or was never needed): enter ready,
    /// arm the observer, wire the interaction listeners, clear loading.
    fn finish_attach(&mut self) {
        self.detect_body_width_rule();
        self.state = FrameState::Ready;

        if self.config.auto_resize {
            self.observer.install(self.config.observer_poll());
        }
        self.listeners.push(
            self.backend
                .attach(ListenTarget::EmbeddedWindow, SignalKind::Click),
        );
        self.listeners.push(
            self.backend
                .attach(ListenTarget::EmbeddedWindow, SignalKind::KeyUp),
        );
        self.listeners.push(
            self.backend
                .attach(ListenTarget::EmbeddedWindow, SignalKind::BeforeUnload),
        );
        if self.config.resize_content {
            self.listeners.push(
                self.backend
                    .attach(ListenTarget::HostWindow, SignalKind::HostResize),
            );
        }

        let _ = self.loading.send(LoadPhase::Loaded);
        self.gateway.emit(FrameEventKind::ContentLoaded);
        if self.config.resize_content {
            self.apply_zoom();
        }
    }

    fn on_link_loaded(&mut self, link: LinkId) {
        let Some(join) = self.join.as_mut() else {
            return;
        };
        let Some((url, done)) = join.complete(link) else {
            return;
        };
        let _ = self
            .backend
            .with_document(|document| document.set_body_overflow("inherit"));
        self.gateway
            .emit_with(FrameEventKind::StylesheetLoaded, Some(url));
        if !done {
            return;
        }
        if let Some(join) = self.join.take()
            && join.requested().len() > 1
        {
            self.gateway.emit_with(
                FrameEventKind::AllStylesheetsLoaded,
                Some(join.requested().join(",")),
            );
        }
        self.finish_attach();
    }

    fn on_before_unload(&mut self) {
        if self.state != FrameState::Ready {
            return;
        }
        self.state = FrameState::Loading;
        let _ = self.loading.send(LoadPhase::Loading);
        let _ = self
            .backend
            .with_document(|document| document.set_body_overflow("hidden"));
        self.gateway.emit(FrameEventKind::ContentUnloaded);
    }

    fn on_host_resized(&mut self) {
        if self.state == FrameState::Ready && self.config.resize_content {
            self.apply_zoom();
        }
    }

    /// Scale the embedded body to fit the host width (shrink only) and
    /// feed the post-scale measurement through the normal stream.
    fn apply_zoom(&mut self) {
        let _span = info_span!("frame.zoom").entered();
        let host_width = self.backend.host_width();
        let metrics = match self.backend.with_document(|document| document.body_metrics()) {
            Ok(metrics) => metrics,
            Err(CrossOriginError) => return,
        };
        let factor = SizeReconciler::zoom_factor(host_width, metrics.offset_width);
        trace!("zooming embedded body by {factor}");
        let _ = self
            .backend
            .with_document(|document| document.set_body_scale(factor));
        self.reconciler.set_zoom(factor);
        self.reconciler.offer(measure(&metrics));
        self.detect_body_width_rule();
        self.gateway.emit(FrameEventKind::ContentScaled);
    }

    /// Decide whether the embedded content has an intrinsic width worth
    /// matching, per the configured policy.
    fn detect_body_width_rule(&mut self) {
        let present = match self.config.match_content_width {
            ContentWidthMatch::Disabled => false,
            ContentWidthMatch::Enabled => true,
            ContentWidthMatch::Auto => self.scan_body_width_rule(),
        };
        self.reconciler.set_body_width_rule(present);
    }

    fn scan_body_width_rule(&mut self) -> bool {
        match self
            .backend
            .with_document(|document| document.stylesheet_text())
        {
            Ok(Ok(sheets)) => {
                let parsed: Vec<_> = sheets
                    .iter()
                    .map(|css| frame_css::parse_stylesheet(css))
                    .collect();
                frame_css::has_body_width_rule(&parsed)
            }
            Ok(Err(denied)) => {
                debug!("cannot read rules from cross-origin stylesheet, assuming none: {denied}");
                false
            }
            Err(CrossOriginError) => false,
        }
    }

    fn flush_resize(&mut self) {
        if let Some(patch) = self.reconciler.flush() {
            trace!("applying host style patch {patch:?}");
            self.backend.apply_host_style(&patch);
            self.gateway.emit(FrameEventKind::ContentResized);
        }
    }

    fn poll_body(&mut self) {
        match self.backend.with_document(|document| document.body_metrics()) {
            Ok(metrics) => self.observer.observe(&metrics),
            Err(CrossOriginError) => {
                // The body went unreachable mid-cycle; stop watching it.
                warn!("embedded body unreachable while observing, uninstalling detector");
                self.observer.uninstall();
            }
        }
    }

    /// Release every resource the controller acquired. Idempotent.
    fn teardown(&mut self) {
        if self.state == FrameState::Destroyed {
            return;
        }
        info!("destroying frame controller");
        self.state = FrameState::Destroyed;
        let owned = std::mem::take(&mut self.listeners);
        for listener in owned {
            self.backend.detach(listener);
        }
        if let Some(listener) = self.frame_listener.take() {
            self.backend.detach(listener);
        }
        self.observer.uninstall();
        self.reconciler.cancel();
    }
}
