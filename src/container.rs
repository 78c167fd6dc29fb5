//! Per-page rendering containers, created lazily and torn down on eviction.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

/// Owns the drawn surface and optional text layer of one page.
///
/// Handed out as `Rc` so collaborators (e.g. an image overlay) can hold onto
/// it; [`ContainerRegistry::remove`] still empties it, so a stale handle never
/// keeps a page's pixels alive.
pub struct PageContainer<S, T> {
    page_number: u32,
    surface: RefCell<Option<S>>,
    text_layer: RefCell<Option<T>>,
}

impl<S, T> PageContainer<S, T> {
    fn new(page_number: u32) -> Self {
        Self {
            page_number,
            surface: RefCell::new(None),
            text_layer: RefCell::new(None),
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn has_surface(&self) -> bool {
        self.surface.borrow().is_some()
    }

    pub fn has_text_layer(&self) -> bool {
        self.text_layer.borrow().is_some()
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> Option<R> {
        self.surface.borrow().as_ref().map(f)
    }

    pub fn with_text_layer<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.text_layer.borrow().as_ref().map(f)
    }

    pub(crate) fn set_surface(&self, surface: S) {
        *self.surface.borrow_mut() = Some(surface);
    }

    pub(crate) fn set_text_layer(&self, layer: T) {
        *self.text_layer.borrow_mut() = Some(layer);
    }

    /// Drop the surface and text layer.
    pub(crate) fn clear(&self) {
        self.surface.borrow_mut().take();
        self.text_layer.borrow_mut().take();
    }
}

/// page_number → container, owned by one engine instance.
pub struct ContainerRegistry<S, T> {
    map: HashMap<u32, Rc<PageContainer<S, T>>>,
}

impl<S, T> Default for ContainerRegistry<S, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, T> ContainerRegistry<S, T> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    pub fn get(&self, page_number: u32) -> Option<Rc<PageContainer<S, T>>> {
        self.map.get(&page_number).cloned()
    }

    pub fn contains(&self, page_number: u32) -> bool {
        self.map.contains_key(&page_number)
    }

    /// Existing container for the page, or a fresh empty one.
    pub fn get_or_create(&mut self, page_number: u32) -> Rc<PageContainer<S, T>> {
        self.map
            .entry(page_number)
            .or_insert_with(|| {
                trace!("container: created for page {page_number}");
                Rc::new(PageContainer::new(page_number))
            })
            .clone()
    }

    /// Empty the page's container and forget it.
    pub fn remove(&mut self, page_number: u32) -> bool {
        match self.map.remove(&page_number) {
            Some(container) => {
                container.clear();
                trace!("container: removed page {page_number}");
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        for container in self.map.values() {
            container.clear();
        }
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_reuses_container() {
        let mut registry: ContainerRegistry<String, ()> = ContainerRegistry::new();
        let first = registry.get_or_create(3);
        first.set_surface("pixels".into());
        let second = registry.get_or_create(3);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(second.with_surface(|s| s.clone()).as_deref(), Some("pixels"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_empties_outstanding_handles() {
        let mut registry: ContainerRegistry<String, String> = ContainerRegistry::new();
        let held = registry.get_or_create(1);
        held.set_surface("pixels".into());
        held.set_text_layer("text".into());

        assert!(registry.remove(1));
        assert!(!registry.contains(1));
        assert!(!held.has_surface());
        assert!(!held.has_text_layer());
        assert!(!registry.remove(1));
    }

    #[test]
    fn clear_drops_everything() {
        let mut registry: ContainerRegistry<u8, u8> = ContainerRegistry::new();
        let a = registry.get_or_create(1);
        a.set_surface(1);
        registry.get_or_create(2);
        registry.clear();
        assert!(registry.is_empty());
        assert!(!a.has_surface());
        assert!(registry.get(1).is_none());
    }
}
