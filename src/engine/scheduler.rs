//! Render scheduling: pick the pages around the viewport and draw them as one
//! batch, coalescing requests that arrive while a batch is running.
//!
//! ## Coalescing
//!
//! Only one batch runs at a time. A request arriving mid-batch overwrites the
//! single `pending` slot instead of queueing, so after a burst of scroll
//! events only the most recent position is honored once the batch settles.
//!
//! ## in_flight
//!
//! Pages are added to `in_flight` when the batch starts and removed by the
//! per-page guard in `render.rs`. Selection skips them, so a page can never
//! be drawn twice at once even if it stays eligible across requests.

use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;

use futures::future::join_all;
use log::{debug, trace};

use super::{RenderRequest, ScrollEngine};
use crate::layout::PageLayout;
use crate::source::{DocumentSource, PagePainter};
use crate::version::CancelToken;

/// Pages to draw for a scroll position, in page order.
///
/// A page qualifies when it touches `[scroll_top - margin, scroll_top +
/// viewport_height + margin]` (margin = `viewport_height * preload_pages`), is
/// not rendered yet and is not already being drawn.
pub fn select_pages(
    layout: &PageLayout,
    in_flight: &HashSet<u32>,
    request: RenderRequest,
    preload_pages: f64,
) -> Vec<u32> {
    let margin = request.viewport_height * preload_pages;
    let top = request.scroll_top - margin;
    let bottom = request.scroll_top + request.viewport_height + margin;
    layout
        .pages()
        .iter()
        .filter(|p| p.overlaps(top, bottom))
        .filter(|p| !p.rendered && !in_flight.contains(&p.page_number))
        .map(|p| p.page_number)
        .collect()
}

/// Everything one batch needs after the state borrow is released.
struct Batch<D> {
    document: Rc<D>,
    pages: Vec<u32>,
    version: u64,
    cancel: CancelToken,
}

impl<D, P> ScrollEngine<D, P>
where
    D: DocumentSource,
    P: PagePainter<D::Page>,
{
    /// Draw every eligible page around the viewport, then evict.
    ///
    /// If a batch is already running, the request is parked in the pending
    /// slot (replacing any earlier one) and this call returns immediately; the
    /// running call picks it up when its batch settles.
    pub async fn render_visible_pages(&self, scroll_top: f64, viewport_height: f64) {
        let mut request = RenderRequest::new(scroll_top, viewport_height);
        loop {
            let Some(batch) = self.begin_batch(request) else {
                return;
            };

            let start = Instant::now();
            let count = batch.pages.len();
            let draws = batch.pages.iter().map(|&page_number| {
                self.render_page(
                    Rc::clone(&batch.document),
                    page_number,
                    batch.version,
                    batch.cancel.clone(),
                )
            });
            join_all(draws).await;
            debug!(
                "scheduler: batch of {count} pages settled in {:.1}ms",
                start.elapsed().as_secs_f64() * 1000.0
            );

            match self.finish_batch(batch.version, request) {
                Some(next) => {
                    debug!(
                        "scheduler: honoring pending request scroll_top={:.1}",
                        next.scroll_top
                    );
                    request = next;
                }
                None => return,
            }
        }
    }

    fn begin_batch(&self, request: RenderRequest) -> Option<Batch<D>> {
        let mut state = self.shared.state.borrow_mut();
        let Some(document) = state.document.clone() else {
            trace!("scheduler: no document, ignoring request");
            return None;
        };
        if state.batch_running {
            trace!(
                "scheduler: batch running, parking request scroll_top={:.1}",
                request.scroll_top
            );
            state.pending = Some(request);
            return None;
        }

        let pages = select_pages(
            &state.layout,
            &state.in_flight,
            request,
            self.shared.preload_pages,
        );
        if pages.is_empty() {
            trace!("scheduler: nothing to draw at scroll_top={:.1}", request.scroll_top);
            return None;
        }

        debug!("scheduler: starting batch {pages:?}");
        state.batch_running = true;
        state.in_flight.extend(pages.iter().copied());
        Some(Batch {
            document,
            pages,
            version: state.version.current(),
            cancel: state.version.token(),
        })
    }

    /// Close the batch, evict, and hand back the pending request if any.
    ///
    /// A batch from a replaced generation leaves the new generation's flag,
    /// pending slot and pages untouched.
    fn finish_batch(&self, version: u64, request: RenderRequest) -> Option<RenderRequest> {
        {
            let mut state = self.shared.state.borrow_mut();
            if !state.version.is_current(version) {
                debug!("scheduler: batch from generation {version} is stale");
                return None;
            }
            state.batch_running = false;
        }
        self.unload_distant_pages(request.scroll_top, request.viewport_height);
        self.shared.state.borrow_mut().pending.take()
    }
}
