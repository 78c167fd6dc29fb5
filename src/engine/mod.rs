//! Virtual-scroll engine: one instance per document viewport.
//!
//! Data flow:
//!   layout        : uniform estimate from page 1, corrected per drawn page
//!   viewport      : scroll position → visible page (center hit test)
//!   scheduler     : scroll position → pages to draw, one batch at a time
//!   render        : draw one page, version-checked after every await
//!   evict         : scroll position → pages to tear down beyond the ceiling
//!
//! Concurrency:
//!   Everything runs on one logical thread. `ScrollEngine` is an `Rc` handle,
//!   so several scheduling calls may be suspended at once; shared state lives
//!   in a `RefCell` that is never borrowed across an `.await`.
//!
//! Cancellation:
//!   `init_layout`, `set_document` and `cleanup` start a new layout generation.
//!   Draws from an older generation still run to their next suspension point,
//!   then notice the stale version and return without touching state. The
//!   generation's `CancelToken` lets painters stop earlier.

mod evict;
mod render;
mod scheduler;

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::config::{Config, RenderSettings};
use crate::container::{ContainerRegistry, PageContainer};
use crate::layout::{PageGeometry, PageLayout, PageSize};
use crate::source::{DocumentSource, EngineHooks, PagePainter};
use crate::version::LayoutVersion;
use crate::viewport::VisiblePageTracker;

pub use evict::select_evictions;
pub use scheduler::select_pages;

type Surface<D, P> = <P as PagePainter<<D as DocumentSource>::Page>>::Surface;
type TextLayer<D, P> = <P as PagePainter<<D as DocumentSource>::Page>>::TextLayer;

/// Container handle as handed out by [`ScrollEngine::get_page_container`].
pub type ContainerHandle<D, P> = Rc<PageContainer<Surface<D, P>, TextLayer<D, P>>>;

/// A scroll position snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub scroll_top: f64,
    pub viewport_height: f64,
}

impl RenderRequest {
    pub fn new(scroll_top: f64, viewport_height: f64) -> Self {
        Self {
            scroll_top,
            viewport_height,
        }
    }

    pub fn center_y(&self) -> f64 {
        self.scroll_top + self.viewport_height / 2.0
    }
}

struct EngineState<D, S, T> {
    document: Option<Rc<D>>,
    settings: RenderSettings,
    layout: PageLayout,
    version: LayoutVersion,
    tracker: VisiblePageTracker,
    in_flight: HashSet<u32>,
    batch_running: bool,
    pending: Option<RenderRequest>,
    containers: ContainerRegistry<S, T>,
}

impl<D, S, T> EngineState<D, S, T> {
    /// Start a new generation and drop all per-generation bookkeeping.
    fn invalidate(&mut self) -> u64 {
        let version = self.version.bump();
        self.in_flight.clear();
        self.pending = None;
        self.batch_running = false;
        self.containers.clear();
        version
    }
}

struct Shared<D, P>
where
    D: DocumentSource,
    P: PagePainter<D::Page>,
{
    painter: P,
    preload_pages: f64,
    max_rendered_pages: usize,
    hooks: EngineHooks<D::Page, P::Surface, P::TextLayer>,
    state: RefCell<EngineState<D, P::Surface, P::TextLayer>>,
}

/// Decides which pages are drawn, when, and when they are torn down.
pub struct ScrollEngine<D, P>
where
    D: DocumentSource,
    P: PagePainter<D::Page>,
{
    shared: Rc<Shared<D, P>>,
}

impl<D, P> Clone for ScrollEngine<D, P>
where
    D: DocumentSource,
    P: PagePainter<D::Page>,
{
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<D, P> ScrollEngine<D, P>
where
    D: DocumentSource,
    P: PagePainter<D::Page>,
{
    pub fn new(
        painter: P,
        config: &Config,
        hooks: EngineHooks<D::Page, P::Surface, P::TextLayer>,
    ) -> Self {
        let state = EngineState {
            document: None,
            settings: config.render,
            layout: PageLayout::default(),
            version: LayoutVersion::new(),
            tracker: VisiblePageTracker::new(),
            in_flight: HashSet::new(),
            batch_running: false,
            pending: None,
            containers: ContainerRegistry::new(),
        };
        Self {
            shared: Rc::new(Shared {
                painter,
                preload_pages: config.preload_pages,
                max_rendered_pages: config.max_rendered_pages,
                hooks,
                state: RefCell::new(state),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Document / layout lifecycle
    // -----------------------------------------------------------------------

    /// Install a document handle with an empty layout. Draws for the previous
    /// document are abandoned; call [`Self::relayout`] or [`Self::init_layout`]
    /// next.
    pub fn set_document(&self, document: D) {
        {
            let mut state = self.shared.state.borrow_mut();
            state.document = Some(Rc::new(document));
            let version = state.invalidate();
            state.layout = PageLayout::default();
            state.tracker.reset();
            debug!("engine: document set, generation {version}");
        }
        self.notify_layout_change(0.0);
    }

    /// Install a document and build its layout from page 1's measured size.
    pub async fn load_document(&self, document: D) -> Result<()> {
        self.set_document(document);
        self.relayout().await
    }

    /// Re-measure page 1 at the current scale and rebuild the layout.
    ///
    /// Returns `Ok(())` without building anything when there is no document
    /// or when another rebuild superseded this one while it was suspended.
    pub async fn relayout(&self) -> Result<()> {
        let (document, settings, version) = {
            let state = self.shared.state.borrow();
            let Some(document) = state.document.clone() else {
                debug!("engine: relayout without document, skipping");
                return Ok(());
            };
            (document, state.settings, state.version.current())
        };

        let page_count = document.page_count();
        let base = if page_count == 0 {
            PageSize::default()
        } else {
            let page = document.page(1).await.context("failed to load page 1")?;
            if !self.is_current(version) {
                return Ok(());
            }
            let size = self
                .shared
                .painter
                .measure(&page, settings.scale)
                .await
                .context("failed to measure page 1")?;
            if !self.is_current(version) {
                return Ok(());
            }
            size
        };

        self.init_layout(page_count, base, settings.page_gap);
        Ok(())
    }

    /// Build `page_count` estimated entries from `base`. Draws nothing.
    pub fn init_layout(&self, page_count: u32, base: PageSize, gap: f64) {
        let total_height = {
            let mut state = self.shared.state.borrow_mut();
            let version = state.invalidate();
            state.layout = PageLayout::new(page_count, base, gap);
            state.tracker.reset();
            info!("engine: layout generation {version} with {page_count} pages");
            state.layout.total_height()
        };
        self.notify_layout_change(total_height);
    }

    /// Tear everything down. Later-settling draws have no effect.
    pub fn cleanup(&self) {
        {
            let mut state = self.shared.state.borrow_mut();
            let version = state.invalidate();
            state.layout = PageLayout::default();
            state.tracker.reset();
            state.document = None;
            info!("engine: cleanup, generation {version}");
        }
        self.notify_layout_change(0.0);
    }

    /// Apply a measured page size; see [`PageLayout::update_page`].
    pub fn update_page_layout(&self, page_number: u32, width: f64, height: f64) {
        let changed = {
            let mut state = self.shared.state.borrow_mut();
            state
                .layout
                .update_page(page_number, PageSize::new(width, height))
                .then(|| state.layout.total_height())
        };
        if let Some(total_height) = changed {
            self.notify_layout_change(total_height);
        }
    }

    pub fn set_render_settings(&self, settings: RenderSettings) {
        self.shared.state.borrow_mut().settings = settings;
    }

    pub fn render_settings(&self) -> RenderSettings {
        self.shared.state.borrow().settings
    }

    // -----------------------------------------------------------------------
    // Viewport
    // -----------------------------------------------------------------------

    /// Update the visible page from a scroll position.
    pub fn handle_scroll(&self, scroll_top: f64, viewport_height: f64) {
        let changed = {
            let mut state = self.shared.state.borrow_mut();
            let EngineState {
                tracker, layout, ..
            } = &mut *state;
            tracker.handle_scroll(layout, scroll_top, viewport_height)
        };
        if let (Some(page), Some(f)) = (changed, &self.shared.hooks.on_visible_page_change) {
            f(page);
        }
    }

    /// Offset of a page for external scroll control, 0 when unknown.
    pub fn scroll_to_page(&self, page_number: u32) -> f64 {
        self.shared
            .state
            .borrow()
            .layout
            .get(page_number)
            .map_or(0.0, |p| p.offset_y)
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// Snapshot of the geometry sequence.
    pub fn pages(&self) -> Vec<PageGeometry> {
        self.shared.state.borrow().layout.pages().to_vec()
    }

    pub fn page(&self, page_number: u32) -> Option<PageGeometry> {
        self.shared.state.borrow().layout.get(page_number).cloned()
    }

    pub fn page_count(&self) -> usize {
        self.shared.state.borrow().layout.len()
    }

    pub fn total_height(&self) -> f64 {
        self.shared.state.borrow().layout.total_height()
    }

    pub fn visible_page(&self) -> u32 {
        self.shared.state.borrow().tracker.visible_page()
    }

    pub fn rendered_count(&self) -> usize {
        self.shared.state.borrow().layout.rendered_count()
    }

    pub fn in_flight_count(&self) -> usize {
        self.shared.state.borrow().in_flight.len()
    }

    pub fn is_in_flight(&self, page_number: u32) -> bool {
        self.shared.state.borrow().in_flight.contains(&page_number)
    }

    pub fn layout_version(&self) -> u64 {
        self.shared.state.borrow().version.current()
    }

    pub fn get_page_container(&self, page_number: u32) -> Option<ContainerHandle<D, P>> {
        self.shared.state.borrow().containers.get(page_number)
    }

    // -----------------------------------------------------------------------
    // Internal helpers shared by scheduler / render / evict
    // -----------------------------------------------------------------------

    fn is_current(&self, version: u64) -> bool {
        self.shared.state.borrow().version.is_current(version)
    }

    fn notify_layout_change(&self, total_height: f64) {
        if let Some(f) = &self.shared.hooks.on_layout_change {
            f(total_height);
        }
    }
}
