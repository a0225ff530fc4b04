//! Headless surface that records draw calls instead of rasterizing

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use super::{Color, CompositeOp, ImageResource, Surface, SurfaceFactory};
use crate::geom::Rect;

/// One recorded surface operation
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Resize { width: u32, height: u32 },
    Clear,
    Save,
    Restore,
    Alpha(f32),
    Composite(CompositeOp),
    Translate(f32, f32),
    Rotate(f32),
    Scale(f32, f32),
    Image { name: String, src: Rect, dst: Rect },
    Buffer { ops: usize, src: Rect, dst: Rect },
    FillRect(Rect, Color),
    StrokeRect(Rect, Color),
    Text(String, f32, f32),
}

#[derive(Debug, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_count(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, DrawOp::Clear)).count()
    }

    /// Source/destination of every image drawn, in order
    pub fn images(&self) -> Vec<(&str, Rect, Rect)> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image { name, src, dst } => Some((name.as_str(), *src, *dst)),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.ops.push(DrawOp::Resize { width, height });
    }

    fn clear(&mut self) {
        self.ops.push(DrawOp::Clear);
    }

    fn save(&mut self) {
        self.ops.push(DrawOp::Save);
    }

    fn restore(&mut self) {
        self.ops.push(DrawOp::Restore);
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.ops.push(DrawOp::Alpha(alpha));
    }

    fn set_composite(&mut self, op: CompositeOp) {
        self.ops.push(DrawOp::Composite(op));
    }

    fn translate(&mut self, x: f32, y: f32) {
        self.ops.push(DrawOp::Translate(x, y));
    }

    fn rotate(&mut self, radians: f32) {
        self.ops.push(DrawOp::Rotate(radians));
    }

    fn scale(&mut self, x: f32, y: f32) {
        self.ops.push(DrawOp::Scale(x, y));
    }

    fn draw_image(&mut self, image: &ImageResource, src: Rect, dst: Rect) {
        self.ops.push(DrawOp::Image {
            name: image.name.clone(),
            src,
            dst,
        });
    }

    fn draw_buffer(&mut self, buffer: &dyn Surface, src: Rect, dst: Rect) {
        let ops = buffer
            .as_any()
            .downcast_ref::<RecordingSurface>()
            .map_or(0, |b| b.ops.len());
        self.ops.push(DrawOp::Buffer { ops, src, dst });
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::FillRect(rect, color));
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color) {
        self.ops.push(DrawOp::StrokeRect(rect, color));
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, _color: Color) {
        self.ops.push(DrawOp::Text(text.to_string(), x, y));
    }

    fn measure_text(&self, text: &str) -> f32 {
        // Fixed-pitch approximation
        text.chars().count() as f32 * 6.0
    }

    fn create_buffer(&self, width: u32, height: u32) -> Box<dyn Surface> {
        Box::new(RecordingSurface::new(width, height))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory producing [`RecordingSurface`]s; remembers what it created and detached
#[derive(Debug, Default, Clone)]
pub struct RecordingFactory {
    created: Rc<RefCell<Vec<(String, i32)>>>,
    detached: Rc<RefCell<Vec<String>>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(name, z_index)` for every surface created, in creation order
    pub fn created(&self) -> Vec<(String, i32)> {
        self.created.borrow().clone()
    }

    pub fn detached(&self) -> Vec<String> {
        self.detached.borrow().clone()
    }
}

impl SurfaceFactory for RecordingFactory {
    fn create(&self, name: &str, z_index: i32, width: u32, height: u32) -> Box<dyn Surface> {
        self.created.borrow_mut().push((name.to_string(), z_index));
        Box::new(RecordingSurface::new(width, height))
    }

    fn detach(&self, name: &str, _surface: &dyn Surface) {
        self.detached.borrow_mut().push(name.to_string());
    }
}
