//! Virtual scrolling for long paginated documents.
//!
//! Pages are laid out from an estimate, drawn only when they come near the
//! viewport, corrected once their real size is known, and torn down again
//! when more than a configured number of pages are materialized. Producing
//! pixels for a page is delegated to a [`PagePainter`]; this crate decides
//! which pages are drawn, when, under what concurrency, and when they go.
//!
//! Start with [`ScrollEngine`].

pub mod config;
pub mod container;
pub mod engine;
pub mod layout;
pub mod source;
pub mod version;
pub mod viewport;

pub use config::{Config, RenderSettings};
pub use container::{ContainerRegistry, PageContainer};
pub use engine::{RenderRequest, ScrollEngine};
pub use layout::{PageGeometry, PageLayout, PageSize};
pub use source::{AfterPageRender, DocumentSource, DrawParams, EngineHooks, PagePainter};
pub use version::{CancelToken, LayoutVersion};
pub use viewport::VisiblePageTracker;
