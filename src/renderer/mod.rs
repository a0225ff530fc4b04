//! Drawing surface abstraction
//!
//! The scene graph never touches a canvas directly. Layers own a boxed
//! [`Surface`], created by an injected [`SurfaceFactory`]; the browser build
//! backs it with a 2D canvas context, tests and the native demo with a
//! [`RecordingSurface`].

pub mod recording;

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::geom::Rect;

pub use recording::{DrawOp, RecordingFactory, RecordingSurface};

/// RGBA color, components in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const DEBUG: Color = Color::rgba(1.0, 0.0, 1.0, 0.8);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// CSS `rgba()` string for canvas fill styles
    pub fn to_css(&self) -> String {
        format!(
            "rgba({},{},{},{})",
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
            self.a.clamp(0.0, 1.0)
        )
    }
}

/// Compositing rules the engine relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeOp {
    #[default]
    SourceOver,
    /// Keep destination alpha, replace color (used for tinting)
    SourceIn,
}

impl CompositeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeOp::SourceOver => "source-over",
            CompositeOp::SourceIn => "source-in",
        }
    }
}

/// An image handle, returned synchronously and populated when loading finishes
#[derive(Debug, Clone, Default)]
pub struct ImageResource {
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub loaded: bool,
    #[cfg(target_arch = "wasm32")]
    pub element: Option<web_sys::HtmlImageElement>,
}

pub type ImageRef = Rc<RefCell<ImageResource>>;

impl ImageResource {
    /// A handle whose pixels are not available yet
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A handle that is already usable (headless hosts, tests)
    pub fn loaded(name: impl Into<String>, width: f32, height: f32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            loaded: true,
            ..Default::default()
        }
    }

    pub fn mark_loaded(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.loaded = true;
    }

    pub fn into_ref(self) -> ImageRef {
        Rc::new(RefCell::new(self))
    }
}

/// The 2D drawing capability a layer renders into
///
/// Resizing a surface discards its pixels; [`Layer::clear`](crate::layer::Layer::clear)
/// depends on that.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Reallocate the pixel buffer; contents are lost
    fn resize(&mut self, width: u32, height: u32);
    /// Wipe all pixels
    fn clear(&mut self);

    fn save(&mut self);
    fn restore(&mut self);
    fn set_alpha(&mut self, alpha: f32);
    fn set_composite(&mut self, op: CompositeOp);
    fn translate(&mut self, x: f32, y: f32);
    /// Rotate by `radians` around the current origin
    fn rotate(&mut self, radians: f32);
    fn scale(&mut self, x: f32, y: f32);

    fn draw_image(&mut self, image: &ImageResource, src: Rect, dst: Rect);
    /// Copy a region of another surface (offscreen buffers) onto this one
    fn draw_buffer(&mut self, buffer: &dyn Surface, src: Rect, dst: Rect);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn stroke_rect(&mut self, rect: Rect, color: Color);
    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color);
    /// Width in pixels of `text` in the current font
    fn measure_text(&self, text: &str) -> f32;

    /// Create an offscreen buffer compatible with this surface
    fn create_buffer(&self, width: u32, height: u32) -> Box<dyn Surface>;

    fn as_any(&self) -> &dyn Any;
}

/// Creates and detaches the surfaces backing layers
pub trait SurfaceFactory {
    fn create(&self, name: &str, z_index: i32, width: u32, height: u32) -> Box<dyn Surface>;
    /// Detach a surface from wherever the factory attached it
    fn detach(&self, name: &str, surface: &dyn Surface);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_to_css() {
        assert_eq!(Color::rgba(1.0, 0.5, 0.0, 0.25).to_css(), "rgba(255,128,0,0.25)");
    }

    #[test]
    fn test_image_mark_loaded() {
        let mut img = ImageResource::pending("hero");
        assert!(!img.loaded);
        img.mark_loaded(64.0, 32.0);
        assert!(img.loaded);
        assert_eq!((img.width, img.height), (64.0, 32.0));
    }
}
