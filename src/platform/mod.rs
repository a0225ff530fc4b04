//! Platform abstraction layer
//!
//! Browser builds get canvas-backed layer surfaces, an `<img>` preloader and
//! a `requestAnimationFrame` driver for the game clock. Native builds run
//! headless on [`RecordingSurface`](crate::renderer::RecordingSurface)s.

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(target_arch = "wasm32")]
pub use web::{CanvasFactory, CanvasSurface, ImagePreloader, RafLoop};
