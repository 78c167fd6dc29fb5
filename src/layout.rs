//! Page geometry: estimated offsets for every page, corrected as pages are drawn.
//!
//! The layout starts from a uniform estimate (the first page's measured size
//! applied to every page) and is corrected in place once a page reports its
//! real size. Invariant kept by every mutation:
//!
//!   pages[i].offset_y == pages[i-1].offset_y + pages[i-1].height + gap
//!   total_height     == last.offset_y + last.height

use std::time::Instant;

use log::{debug, info, trace};

/// Differences below this are treated as measurement noise.
pub const SIZE_TOLERANCE: f64 = 1.0;

/// Width/height pair in layout units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Position and size of one page within the scroll content.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub page_number: u32, // 1-based, stable key
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
    pub rendered: bool,
}

impl PageGeometry {
    pub fn bottom(&self) -> f64 {
        self.offset_y + self.height
    }

    pub fn mid_y(&self) -> f64 {
        self.offset_y + self.height / 2.0
    }

    /// Does `[offset_y, bottom)` contain `y`?
    pub fn contains(&self, y: f64) -> bool {
        y >= self.offset_y && y < self.bottom()
    }

    /// Does the page touch the closed range `[top, bottom]`?
    pub fn overlaps(&self, top: f64, bottom: f64) -> bool {
        self.bottom() >= top && self.offset_y <= bottom
    }
}

/// Ordered geometry sequence for a whole document.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pages: Vec<PageGeometry>,
    gap: f64,
}

impl PageLayout {
    /// Build `page_count` entries, all sized like `base`, with cumulative offsets.
    pub fn new(page_count: u32, base: PageSize, gap: f64) -> Self {
        let start = Instant::now();
        let mut pages = Vec::with_capacity(page_count as usize);
        let mut offset_y = 0.0;
        for page_number in 1..=page_count {
            pages.push(PageGeometry {
                page_number,
                offset_y,
                width: base.width,
                height: base.height,
                rendered: false,
            });
            offset_y += base.height + gap;
        }
        let layout = Self { pages, gap };
        info!(
            "layout: built {} pages ({:.1}x{:.1}, gap={}) in {:.1}ms, total height {:.1}",
            page_count,
            base.width,
            base.height,
            gap,
            start.elapsed().as_secs_f64() * 1000.0,
            layout.total_height()
        );
        layout
    }

    pub fn pages(&self) -> &[PageGeometry] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn gap(&self) -> f64 {
        self.gap
    }

    pub fn get(&self, page_number: u32) -> Option<&PageGeometry> {
        let idx = (page_number as usize).checked_sub(1)?;
        self.pages.get(idx)
    }

    pub(crate) fn get_mut(&mut self, page_number: u32) -> Option<&mut PageGeometry> {
        let idx = (page_number as usize).checked_sub(1)?;
        self.pages.get_mut(idx)
    }

    /// Bottom edge of the last page, or 0 for an empty layout.
    pub fn total_height(&self) -> f64 {
        self.pages.last().map_or(0.0, PageGeometry::bottom)
    }

    pub fn rendered_count(&self) -> usize {
        self.pages.iter().filter(|p| p.rendered).count()
    }

    /// First page whose `[offset_y, bottom)` interval contains `y`.
    ///
    /// Positions inside a gap (or outside the content) belong to no page.
    pub fn page_at(&self, y: f64) -> Option<u32> {
        self.pages.iter().find(|p| p.contains(y)).map(|p| p.page_number)
    }

    /// Apply a measured size to a page and shift every following page.
    ///
    /// Returns `false` (and changes nothing) when the page is unknown or the
    /// measurement is within [`SIZE_TOLERANCE`] of the current estimate.
    pub fn update_page(&mut self, page_number: u32, actual: PageSize) -> bool {
        let Some(idx) = (page_number as usize).checked_sub(1) else {
            return false;
        };
        let Some(page) = self.pages.get_mut(idx) else {
            return false;
        };
        if (page.width - actual.width).abs() < SIZE_TOLERANCE
            && (page.height - actual.height).abs() < SIZE_TOLERANCE
        {
            trace!("layout: page {page_number} within tolerance, no update");
            return false;
        }

        debug!(
            "layout: page {page_number} corrected {:.1}x{:.1} → {:.1}x{:.1}",
            page.width, page.height, actual.width, actual.height
        );
        page.width = actual.width;
        page.height = actual.height;

        let gap = self.gap;
        let mut next_offset = self.pages[idx].bottom() + gap;
        for page in &mut self.pages[idx + 1..] {
            page.offset_y = next_offset;
            next_offset += page.height + gap;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_cumulative(layout: &PageLayout) {
        for pair in layout.pages().windows(2) {
            let expected = pair[0].offset_y + pair[0].height + layout.gap();
            assert!((pair[1].offset_y - expected).abs() < 1e-9);
            assert!(pair[1].offset_y >= pair[0].offset_y);
        }
        if let Some(last) = layout.pages().last() {
            assert_eq!(layout.total_height(), last.offset_y + last.height);
        }
    }

    #[test]
    fn builds_uniform_estimate() {
        let layout = PageLayout::new(10, PageSize::new(600.0, 800.0), 16.0);
        assert_eq!(layout.len(), 10);
        assert!(layout.pages().iter().all(|p| !p.rendered));
        assert_eq!(layout.get(1).unwrap().offset_y, 0.0);
        assert_eq!(layout.get(4).unwrap().offset_y, 3.0 * 816.0);
        assert_eq!(layout.total_height(), 9.0 * 816.0 + 800.0);
        assert_cumulative(&layout);
    }

    #[test]
    fn empty_layout() {
        let layout = PageLayout::new(0, PageSize::new(600.0, 800.0), 16.0);
        assert!(layout.is_empty());
        assert_eq!(layout.total_height(), 0.0);
        assert_eq!(layout.page_at(0.0), None);
        assert!(layout.get(1).is_none());
    }

    #[test]
    fn page_numbers_are_one_based() {
        let layout = PageLayout::new(3, PageSize::new(100.0, 100.0), 0.0);
        assert!(layout.get(0).is_none());
        assert_eq!(layout.get(3).unwrap().page_number, 3);
        assert!(layout.get(4).is_none());
    }

    #[test]
    fn small_difference_is_ignored() {
        let mut layout = PageLayout::new(3, PageSize::new(600.0, 800.0), 16.0);
        assert!(!layout.update_page(1, PageSize::new(600.4, 800.9)));
        assert_eq!(layout.get(1).unwrap().height, 800.0);
        assert_eq!(layout.get(2).unwrap().offset_y, 816.0);
    }

    #[test]
    fn correction_shifts_following_pages() {
        let mut layout = PageLayout::new(4, PageSize::new(600.0, 800.0), 16.0);
        assert!(layout.update_page(2, PageSize::new(600.0, 1000.0)));
        assert_eq!(layout.get(1).unwrap().offset_y, 0.0);
        assert_eq!(layout.get(2).unwrap().offset_y, 816.0);
        assert_eq!(layout.get(3).unwrap().offset_y, 816.0 + 1016.0);
        assert_eq!(layout.get(4).unwrap().offset_y, 816.0 + 1016.0 + 816.0);
        assert_cumulative(&layout);
    }

    #[test]
    fn width_only_change_updates_entry() {
        let mut layout = PageLayout::new(2, PageSize::new(600.0, 800.0), 16.0);
        assert!(layout.update_page(1, PageSize::new(800.0, 800.0)));
        assert_eq!(layout.get(1).unwrap().width, 800.0);
        assert_eq!(layout.get(2).unwrap().offset_y, 816.0);
    }

    #[test]
    fn unknown_page_is_ignored() {
        let mut layout = PageLayout::new(2, PageSize::new(600.0, 800.0), 16.0);
        assert!(!layout.update_page(0, PageSize::new(1.0, 1.0)));
        assert!(!layout.update_page(3, PageSize::new(1.0, 1.0)));
    }

    #[test]
    fn page_at_skips_gaps() {
        let layout = PageLayout::new(3, PageSize::new(600.0, 800.0), 16.0);
        assert_eq!(layout.page_at(0.0), Some(1));
        assert_eq!(layout.page_at(799.9), Some(1));
        assert_eq!(layout.page_at(805.0), None);
        assert_eq!(layout.page_at(816.0), Some(2));
        assert_eq!(layout.page_at(10_000.0), None);
    }

    #[test]
    fn overlap_is_inclusive() {
        let layout = PageLayout::new(2, PageSize::new(600.0, 800.0), 16.0);
        let p2 = layout.get(2).unwrap();
        assert!(p2.overlaps(0.0, 816.0));
        assert!(!p2.overlaps(0.0, 815.0));
        assert!(p2.overlaps(1616.0, 2000.0));
    }
}
