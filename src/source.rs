//! Collaborator interfaces: the document loader, the page-drawing primitive,
//! the post-render hook and the engine's outgoing callbacks.
//!
//! All futures here run on one logical thread and are not required to be
//! `Send`.

use std::rc::Rc;

use anyhow::Result;
use futures::future::LocalBoxFuture;

use crate::container::PageContainer;
use crate::layout::PageSize;
use crate::version::CancelToken;

/// A loaded document: page count plus per-page handle acquisition.
#[allow(async_fn_in_trait)]
pub trait DocumentSource {
    type Page;

    fn page_count(&self) -> u32;

    /// Acquire the handle for a 1-based page number.
    async fn page(&self, page_number: u32) -> Result<Self::Page>;
}

/// Everything a painter needs to draw one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawParams {
    pub page_number: u32,
    pub size: PageSize,
    pub scale: f64,
    pub device_pixel_ratio: f64,
}

/// Produces pixels (and optionally a text layer) for a single page.
///
/// `cancel` is tripped when the layout generation the draw belongs to is
/// replaced; painters may poll it and bail out with an error, which the
/// engine then discards silently.
#[allow(async_fn_in_trait)]
pub trait PagePainter<P> {
    type Surface;
    type TextLayer;

    /// Size of the page at `scale`, in layout units.
    async fn measure(&self, page: &P, scale: f64) -> Result<PageSize>;

    async fn draw_surface(
        &self,
        page: &P,
        params: &DrawParams,
        cancel: &CancelToken,
    ) -> Result<Self::Surface>;

    async fn draw_text_layer(
        &self,
        page: &P,
        params: &DrawParams,
        cancel: &CancelToken,
    ) -> Result<Self::TextLayer>;
}

/// Capability invoked after a page's surface (and text layer) are in place,
/// e.g. an image overlay that positions embedded images for the page.
///
/// Implementors must treat the arguments as read-only and keep their own
/// per-page state; they learn about teardown through `on_page_unload`.
pub trait AfterPageRender<P, S, T> {
    fn after_page_render<'a>(
        &'a self,
        page: &'a P,
        size: PageSize,
        page_number: u32,
        container: &'a PageContainer<S, T>,
    ) -> LocalBoxFuture<'a, Result<()>>;
}

pub type RenderErrorFn = Box<dyn Fn(&anyhow::Error, u32)>;
pub type PageUnloadFn = Box<dyn Fn(u32)>;
pub type VisiblePageFn = Box<dyn Fn(u32)>;
pub type LayoutChangeFn = Box<dyn Fn(f64)>;

/// Optional callbacks wired into an engine at construction.
pub struct EngineHooks<P, S, T> {
    pub(crate) on_render_error: Option<RenderErrorFn>,
    pub(crate) after_page_render: Option<Rc<dyn AfterPageRender<P, S, T>>>,
    pub(crate) on_page_unload: Option<PageUnloadFn>,
    pub(crate) on_visible_page_change: Option<VisiblePageFn>,
    pub(crate) on_layout_change: Option<LayoutChangeFn>,
}

impl<P, S, T> Default for EngineHooks<P, S, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S, T> EngineHooks<P, S, T> {
    pub fn new() -> Self {
        Self {
            on_render_error: None,
            after_page_render: None,
            on_page_unload: None,
            on_visible_page_change: None,
            on_layout_change: None,
        }
    }

    /// Called with `(error, page_number)` when drawing a page fails.
    pub fn on_render_error(mut self, f: impl Fn(&anyhow::Error, u32) + 'static) -> Self {
        self.on_render_error = Some(Box::new(f));
        self
    }

    pub fn after_page_render(mut self, hook: Rc<dyn AfterPageRender<P, S, T>>) -> Self {
        self.after_page_render = Some(hook);
        self
    }

    /// Called after a page has been evicted.
    pub fn on_page_unload(mut self, f: impl Fn(u32) + 'static) -> Self {
        self.on_page_unload = Some(Box::new(f));
        self
    }

    /// Called only when the page under the viewport center changes.
    pub fn on_visible_page_change(mut self, f: impl Fn(u32) + 'static) -> Self {
        self.on_visible_page_change = Some(Box::new(f));
        self
    }

    /// Called with the new total height whenever the geometry sequence changes.
    pub fn on_layout_change(mut self, f: impl Fn(f64) + 'static) -> Self {
        self.on_layout_change = Some(Box::new(f));
        self
    }
}
