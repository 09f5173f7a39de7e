//! Stylesheet and inline style injection into the embedded head.

use std::collections::HashMap;

use frame_dom::{EmbeddedDocument, LinkId, StyleElementId};

/// Overflow guard added at frame load. It keeps the embedded page from
/// scrolling while the host is sized, and doubles as the insertion anchor
/// so injected links sit before it in cascade order.
pub(crate) const OVERFLOW_GUARD_CSS: &str = "html { overflow: hidden; }";

/// Join state over the stylesheet links injected for one load cycle.
///
/// Each link is an independent unit of work; the aggregate completes once
/// every pending link has fired its load signal, in whatever order.
pub(crate) struct StyleJoin {
    pending: HashMap<LinkId, String>,
    requested: Vec<String>,
}

impl StyleJoin {
    /// Inject one `<link>` per URL before `anchor`, preserving input
    /// order. Returns the join plus the created links for listener setup.
    pub(crate) fn inject(
        document: &mut dyn EmbeddedDocument,
        urls: &[String],
        anchor: StyleElementId,
    ) -> (Self, Vec<(LinkId, String)>) {
        let mut pending = HashMap::with_capacity(urls.len());
        let mut created = Vec::with_capacity(urls.len());
        for url in urls {
            let link = document.insert_link_before(url, anchor);
            pending.insert(link, url.clone());
            created.push((link, url.clone()));
        }
        let join = Self {
            pending,
            requested: urls.to_vec(),
        };
        (join, created)
    }

    /// Record one link completion. Gives back the URL and whether the
    /// aggregate join is now complete; unknown links yield `None`.
    pub(crate) fn complete(&mut self, link: LinkId) -> Option<(String, bool)> {
        let url = self.pending.remove(&link)?;
        Some((url, self.pending.is_empty()))
    }

    /// All URLs this join was created over, in input order.
    pub(crate) fn requested(&self) -> &[String] {
        &self.requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_dom::scripted::{HeadEntry, ScriptedFrame};
    use frame_dom::FrameBackend;

    #[test]
    fn links_land_before_the_anchor_in_input_order() {
        let (mut frame, _signals) = ScriptedFrame::new();
        let urls = vec![String::from("a.css"), String::from("b.css")];
        let outcome = frame.with_document(|document| {
            let anchor = document.append_head_style(OVERFLOW_GUARD_CSS);
            StyleJoin::inject(document, &urls, anchor)
        });
        let (mut join, created) = outcome.unwrap();
        assert_eq!(created.len(), 2);

        let head = frame.head();
        assert_eq!(head.len(), 3);
        assert!(matches!(&head[0], HeadEntry::Link { href, .. } if href == "a.css"));
        assert!(matches!(&head[1], HeadEntry::Link { href, .. } if href == "b.css"));
        assert!(matches!(&head[2], HeadEntry::Style { css, .. } if css == OVERFLOW_GUARD_CSS));

        // Completion order does not matter; the join closes on the last one.
        let (first, done) = join.complete(created[1].0).unwrap();
        assert_eq!(first, "b.css");
        assert!(!done);
        let (second, done) = join.complete(created[0].0).unwrap();
        assert_eq!(second, "a.css");
        assert!(done);
        assert!(join.complete(created[0].0).is_none());
        assert_eq!(join.requested(), urls.as_slice());
    }
}
