//! Embeddable frame handler.
//!
//! Hosts third-party or same-origin HTML inside a sandboxed frame,
//! auto-sizes the host element to the embedded content's rendered height,
//! optionally injects stylesheets into the embedded document, and forwards
//! a curated stream of interaction and lifecycle events to the hosting
//! page. The component drives the DOM through the seam in [`frame_dom`],
//! so the same controller runs against a browser binding or the scripted
//! backend used in tests.
//!
//! The moving parts, wired together by the lifecycle controller in
//! [`state`]: the style injector tracks per-link load completion, the
//! content observer polls the embedded body's box, and the sizing
//! reconciler debounces measurements into host style patches.

pub mod config;
pub mod events;
/// Stylesheet and inline style injection into the embedded head
mod injector;
/// Poll-based content box observation for the embedded body
mod observer;
/// Debounce and reconciliation of measurements into host styling
mod reconciler;
pub mod state;
pub mod url;

pub use config::{ContentWidthMatch, FrameConfig};
pub use events::{FrameEvent, FrameEventKind};
pub use frame_dom::{HostStyle, LoadPhase};
pub use state::{EmbedFrame, FrameState};
pub use crate::url::{SourceUrlError, TrustedSource, sanitize_source};
