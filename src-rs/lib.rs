//! Overlay-free page capture and tolerant design-property comparison.
//!
//! The pipeline runs leaves first: [`hit_test`] resolves what is under the
//! pointer while ignoring the tool's own UI, [`selection`] turns pointer and
//! key input into a [`SelectionTarget`], [`capture`] suppresses the tool UI
//! around one full-surface grab and turns the result into [`Screenshot`]s,
//! and [`compare`] decides whether two style values match.

pub mod capture;
pub mod compare;
pub mod dom;
pub mod error;
pub mod geometry;
pub mod raster;
pub mod selection;
pub mod suppress;
pub mod surface;
pub mod viewport;

pub use capture::{CaptureKind, CaptureOptions, CaptureOrchestrator, Screenshot};
pub use compare::{compare, compare_all, compare_samples, ComparisonResult, PropertySample};
pub use dom::{Document, NodeId, PageSnapshot};
pub use error::{CaptureError, SnapshotError, SurfaceError};
pub use geometry::{ClientPoint, PageRect, PixelRect};
pub use hit_test::{hit_test, PointerInput, TOOL_ATTRIBUTE};
pub use selection::{SelectionController, SelectionMode, SelectionOutcome, SelectionTarget};
pub use surface::{CaptureSurface, DeviceBitmap, ImageFileSurface, ScreencaptureSurface};
pub use viewport::{PageMetadata, ScreenPoint, Viewport};
