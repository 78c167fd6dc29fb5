//! Bounded-memory eviction: keep at most `max_rendered_pages` pages drawn,
//! tearing down the ones furthest from the viewport center first.

use std::collections::HashSet;

use log::debug;

use super::{RenderRequest, ScrollEngine};
use crate::layout::PageLayout;
use crate::source::{DocumentSource, PagePainter};

/// Rendered pages to unload so that at most `max_rendered` remain.
///
/// Candidates are ordered by descending distance between their midpoint and
/// `center_y` (page order breaks ties). Pages in `in_flight` are never
/// chosen; the next-furthest page is taken instead. `max_rendered == 0`
/// means unbounded.
pub fn select_evictions(
    layout: &PageLayout,
    in_flight: &HashSet<u32>,
    center_y: f64,
    max_rendered: usize,
) -> Vec<u32> {
    if max_rendered == 0 {
        return Vec::new();
    }
    let mut rendered: Vec<(u32, f64)> = layout
        .pages()
        .iter()
        .filter(|p| p.rendered)
        .map(|p| (p.page_number, (p.mid_y() - center_y).abs()))
        .collect();
    if rendered.len() <= max_rendered {
        return Vec::new();
    }
    let excess = rendered.len() - max_rendered;
    rendered.sort_by(|a, b| b.1.total_cmp(&a.1));
    rendered
        .into_iter()
        .map(|(page_number, _)| page_number)
        .filter(|n| !in_flight.contains(n))
        .take(excess)
        .collect()
}

impl<D, P> ScrollEngine<D, P>
where
    D: DocumentSource,
    P: PagePainter<D::Page>,
{
    /// Unload the rendered pages furthest from the viewport center until the
    /// ceiling holds. Each unloaded page loses its container, its `rendered`
    /// flag and its surfaces, then `on_page_unload` is invoked for it.
    pub fn unload_distant_pages(&self, scroll_top: f64, viewport_height: f64) {
        let max_rendered = self.shared.max_rendered_pages;
        if max_rendered == 0 {
            return;
        }
        let center_y = RenderRequest::new(scroll_top, viewport_height).center_y();

        let (evicted, total_height) = {
            let mut state = self.shared.state.borrow_mut();
            let evicted = select_evictions(&state.layout, &state.in_flight, center_y, max_rendered);
            for &page_number in &evicted {
                state.containers.remove(page_number);
                if let Some(page) = state.layout.get_mut(page_number) {
                    page.rendered = false;
                }
            }
            (evicted, state.layout.total_height())
        };
        if evicted.is_empty() {
            return;
        }

        debug!("evict: unloaded {evicted:?} (center_y={center_y:.1}, max={max_rendered})");
        self.notify_layout_change(total_height);
        if let Some(f) = &self.shared.hooks.on_page_unload {
            for &page_number in &evicted {
                f(page_number);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PageSize;

    fn rendered_layout(rendered: &[u32]) -> PageLayout {
        let mut layout = PageLayout::new(10, PageSize::new(600.0, 800.0), 16.0);
        for &n in rendered {
            layout.get_mut(n).unwrap().rendered = true;
        }
        layout
    }

    #[test]
    fn unbounded_never_evicts() {
        let layout = rendered_layout(&[1, 2, 3, 4, 5, 6]);
        assert!(select_evictions(&layout, &HashSet::new(), 0.0, 0).is_empty());
    }

    #[test]
    fn at_ceiling_is_noop() {
        let layout = rendered_layout(&[1, 2, 3]);
        assert!(select_evictions(&layout, &HashSet::new(), 0.0, 3).is_empty());
    }

    #[test]
    fn evicts_furthest_first() {
        let layout = rendered_layout(&[1, 2, 3, 4, 5]);
        // center inside page 4 (midpoint 2848)
        let evicted = select_evictions(&layout, &HashSet::new(), 2848.0, 3);
        assert_eq!(evicted, vec![1, 2]);
    }

    #[test]
    fn skips_in_flight_pages() {
        let layout = rendered_layout(&[1, 2, 3, 4, 5]);
        let in_flight: HashSet<u32> = [1].into_iter().collect();
        let evicted = select_evictions(&layout, &in_flight, 2848.0, 3);
        assert_eq!(evicted, vec![2, 3]);
    }

    #[test]
    fn ignores_unrendered_pages() {
        let layout = rendered_layout(&[9, 10]);
        assert!(select_evictions(&layout, &HashSet::new(), 0.0, 2).is_empty());
        assert_eq!(select_evictions(&layout, &HashSet::new(), 0.0, 1), vec![10]);
    }
}
