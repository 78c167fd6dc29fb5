//! Drawing a single page.
//!
//! Every `.await` is followed by a generation check. Once the layout has been
//! rebuilt or torn down, the draw returns `DrawOutcome::Stale` without
//! touching the layout, the registry or the error callback.

use std::rc::Rc;
use std::time::Instant;

use anyhow::Result;
use log::{debug, trace, warn};

use super::{ScrollEngine, Shared};
use crate::layout::PageSize;
use crate::source::{DocumentSource, DrawParams, PagePainter};
use crate::version::CancelToken;

enum DrawOutcome {
    Rendered,
    Stale,
}

/// Removes a page from `in_flight` however the draw ends.
///
/// Only acts while the draw's generation is current: a bump already emptied
/// the set, and the same page number may belong to a newer draw by now.
struct InFlightGuard<'a, D, P>
where
    D: DocumentSource,
    P: PagePainter<D::Page>,
{
    shared: &'a Shared<D, P>,
    page_number: u32,
    version: u64,
}

impl<D, P> Drop for InFlightGuard<'_, D, P>
where
    D: DocumentSource,
    P: PagePainter<D::Page>,
{
    fn drop(&mut self) {
        let mut state = self.shared.state.borrow_mut();
        if state.version.is_current(self.version) {
            state.in_flight.remove(&self.page_number);
        }
    }
}

impl<D, P> ScrollEngine<D, P>
where
    D: DocumentSource,
    P: PagePainter<D::Page>,
{
    /// Draw one page and report failures; never propagates errors.
    pub(super) async fn render_page(
        &self,
        document: Rc<D>,
        page_number: u32,
        version: u64,
        cancel: CancelToken,
    ) {
        let _guard = InFlightGuard {
            shared: &self.shared,
            page_number,
            version,
        };
        let start = Instant::now();

        match self.draw_page(&document, page_number, version, &cancel).await {
            Ok(DrawOutcome::Rendered) => debug!(
                "render: page {page_number} completed in {:.1}ms",
                start.elapsed().as_secs_f64() * 1000.0
            ),
            Ok(DrawOutcome::Stale) => {
                debug!("render: page {page_number} abandoned (generation {version} replaced)")
            }
            Err(err) => {
                if !self.is_current(version) {
                    debug!("render: page {page_number} failed after supersession: {err:#}");
                    return;
                }
                warn!("render: page {page_number} failed: {err:#}");
                // A half-drawn page is not `rendered`, so eviction would never
                // reclaim its surface.
                self.shared
                    .state
                    .borrow_mut()
                    .containers
                    .remove(page_number);
                if let Some(f) = &self.shared.hooks.on_render_error {
                    f(&err, page_number);
                }
            }
        }
    }

    async fn draw_page(
        &self,
        document: &D,
        page_number: u32,
        version: u64,
        cancel: &CancelToken,
    ) -> Result<DrawOutcome> {
        let page = document.page(page_number).await?;
        if self.is_stale(version, page_number, "page load") {
            return Ok(DrawOutcome::Stale);
        }

        let settings = self.render_settings();
        let painter = &self.shared.painter;
        let size = painter.measure(&page, settings.scale).await?;
        if self.is_stale(version, page_number, "measure") {
            return Ok(DrawOutcome::Stale);
        }

        let params = DrawParams {
            page_number,
            size,
            scale: settings.scale,
            device_pixel_ratio: settings.device_pixel_ratio,
        };
        let surface = painter.draw_surface(&page, &params, cancel).await?;
        if self.is_stale(version, page_number, "surface") {
            return Ok(DrawOutcome::Stale);
        }

        let container = self
            .shared
            .state
            .borrow_mut()
            .containers
            .get_or_create(page_number);
        container.set_surface(surface);

        if settings.text_layer {
            let layer = painter.draw_text_layer(&page, &params, cancel).await?;
            if self.is_stale(version, page_number, "text layer") {
                return Ok(DrawOutcome::Stale);
            }
            container.set_text_layer(layer);
        }

        if let Some(hook) = &self.shared.hooks.after_page_render {
            hook.after_page_render(&page, size, page_number, &container)
                .await?;
            if self.is_stale(version, page_number, "post-render hook") {
                return Ok(DrawOutcome::Stale);
            }
        }

        self.mark_rendered(page_number, size);
        Ok(DrawOutcome::Rendered)
    }

    fn is_stale(&self, version: u64, page_number: u32, step: &str) -> bool {
        let stale = !self.is_current(version);
        if stale {
            trace!("render: page {page_number} stale after {step}");
        }
        stale
    }

    /// Apply the measured size and flip `rendered`.
    fn mark_rendered(&self, page_number: u32, size: PageSize) {
        let total_height = {
            let mut state = self.shared.state.borrow_mut();
            state.layout.update_page(page_number, size);
            if let Some(page) = state.layout.get_mut(page_number) {
                page.rendered = true;
            }
            state.layout.total_height()
        };
        self.notify_layout_change(total_height);
    }
}
