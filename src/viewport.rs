//! Visible-page tracking from the scroll position.

use log::debug;

use crate::layout::PageLayout;

/// Remembers which page sits under the viewport center.
#[derive(Debug, Clone)]
pub struct VisiblePageTracker {
    visible_page: u32,
}

impl Default for VisiblePageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl VisiblePageTracker {
    pub fn new() -> Self {
        Self { visible_page: 1 }
    }

    pub fn visible_page(&self) -> u32 {
        self.visible_page
    }

    pub fn reset(&mut self) {
        self.visible_page = 1;
    }

    /// Recompute the visible page for a scroll position.
    ///
    /// Returns the new page only when it differs from the previous one, so
    /// callers can notify subscribers without spurious updates. A center that
    /// falls into a gap keeps the previous value.
    pub fn handle_scroll(
        &mut self,
        layout: &PageLayout,
        scroll_top: f64,
        viewport_height: f64,
    ) -> Option<u32> {
        let center_y = scroll_top + viewport_height / 2.0;
        let page = layout.page_at(center_y)?;
        if page == self.visible_page {
            return None;
        }
        debug!(
            "viewport: visible page {} → {page} (center_y={center_y:.1})",
            self.visible_page
        );
        self.visible_page = page;
        Some(page)
    }
}
