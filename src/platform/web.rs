//! Canvas 2D surfaces and the animation-frame loop

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, HtmlImageElement};

use crate::assets::{AssetEvent, AssetEvents, Preloader};
use crate::error::{EngineError, EngineResult};
use crate::geom::Rect;
use crate::renderer::{
    Color, CompositeOp, ImageRef, ImageResource, RecordingSurface, Surface, SurfaceFactory,
};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = "requestAnimationFrame")]
    fn request_animation_frame(callback: &JsValue) -> i32;

    #[wasm_bindgen(js_name = "cancelAnimationFrame")]
    fn cancel_animation_frame(id: i32);
}

fn check(result: Result<(), JsValue>, op: &str) {
    if let Err(e) = result {
        log::warn!("Canvas {op} failed: {e:?}");
    }
}

/// A layer surface backed by its own `<canvas>` element
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
    pub fn new(document: &Document, width: u32, height: u32) -> EngineResult<Self> {
        let canvas = document
            .create_element("canvas")
            .map_err(|e| EngineError::NotReady(format!("cannot create canvas: {e:?}")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| EngineError::NotReady("element is not a canvas".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);
        let ctx = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
            .ok_or_else(|| EngineError::NotReady("2d context unavailable".into()))?;
        Ok(Self { canvas, ctx })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }
}

impl Surface for CanvasSurface {
    fn width(&self) -> u32 {
        self.canvas.width()
    }

    fn height(&self) -> u32 {
        self.canvas.height()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    /// Re-setting the width wipes the bitmap and resets context state
    fn clear(&mut self) {
        self.canvas.set_width(self.canvas.width());
    }

    fn save(&mut self) {
        self.ctx.save();
    }

    fn restore(&mut self) {
        self.ctx.restore();
    }

    fn set_alpha(&mut self, alpha: f32) {
        self.ctx.set_global_alpha(alpha as f64);
    }

    fn set_composite(&mut self, op: CompositeOp) {
        check(
            self.ctx.set_global_composite_operation(op.as_str()),
            "composite",
        );
    }

    fn translate(&mut self, x: f32, y: f32) {
        check(self.ctx.translate(x as f64, y as f64), "translate");
    }

    fn rotate(&mut self, radians: f32) {
        check(self.ctx.rotate(radians as f64), "rotate");
    }

    fn scale(&mut self, x: f32, y: f32) {
        check(self.ctx.scale(x as f64, y as f64), "scale");
    }

    fn draw_image(&mut self, image: &ImageResource, src: Rect, dst: Rect) {
        let Some(element) = &image.element else {
            log::warn!("Image '{}' has no element to draw", image.name);
            return;
        };
        check(
            self.ctx
                .draw_image_with_html_image_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                    element,
                    src.x as f64,
                    src.y as f64,
                    src.width as f64,
                    src.height as f64,
                    dst.x as f64,
                    dst.y as f64,
                    dst.width as f64,
                    dst.height as f64,
                ),
            "draw_image",
        );
    }

    fn draw_buffer(&mut self, buffer: &dyn Surface, src: Rect, dst: Rect) {
        let Some(buffer) = buffer.as_any().downcast_ref::<CanvasSurface>() else {
            log::warn!("Cannot draw a non-canvas buffer onto a canvas");
            return;
        };
        check(
            self.ctx
                .draw_image_with_html_canvas_element_and_sw_and_sh_and_dx_and_dy_and_dw_and_dh(
                    &buffer.canvas,
                    src.x as f64,
                    src.y as f64,
                    src.width as f64,
                    src.height as f64,
                    dst.x as f64,
                    dst.y as f64,
                    dst.width as f64,
                    dst.height as f64,
                ),
            "draw_buffer",
        );
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.ctx.set_fill_style_str(&color.to_css());
        self.ctx.fill_rect(
            rect.x as f64,
            rect.y as f64,
            rect.width as f64,
            rect.height as f64,
        );
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color) {
        self.ctx.set_stroke_style_str(&color.to_css());
        self.ctx.stroke_rect(
            rect.x as f64,
            rect.y as f64,
            rect.width as f64,
            rect.height as f64,
        );
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32, color: Color) {
        self.ctx.set_fill_style_str(&color.to_css());
        check(self.ctx.fill_text(text, x as f64, y as f64), "fill_text");
    }

    fn measure_text(&self, text: &str) -> f32 {
        self.ctx
            .measure_text(text)
            .map(|m| m.width() as f32)
            .unwrap_or_default()
    }

    fn create_buffer(&self, width: u32, height: u32) -> Box<dyn Surface> {
        match self
            .canvas
            .owner_document()
            .ok_or_else(|| EngineError::NotReady("canvas is detached".into()))
            .and_then(|doc| CanvasSurface::new(&doc, width, height))
        {
            Ok(surface) => Box::new(surface),
            Err(e) => {
                log::error!("Offscreen buffer unavailable, drawing headless: {e}");
                Box::new(RecordingSurface::new(width, height))
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Stacks one absolutely-positioned canvas per layer inside a host element
pub struct CanvasFactory {
    document: Document,
    host: Element,
}

impl CanvasFactory {
    /// Use the element with id `host_id` as the layer container
    pub fn new(host_id: &str) -> EngineResult<Self> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| EngineError::NotReady("no document".into()))?;
        let host = document
            .get_element_by_id(host_id)
            .ok_or_else(|| EngineError::not_found(format!("host element '#{host_id}'")))?;
        Ok(Self { document, host })
    }
}

impl SurfaceFactory for CanvasFactory {
    fn create(&self, name: &str, z_index: i32, width: u32, height: u32) -> Box<dyn Surface> {
        let surface = match CanvasSurface::new(&self.document, width, height) {
            Ok(surface) => surface,
            Err(e) => {
                log::error!("Layer '{name}' falls back to a headless surface: {e}");
                return Box::new(RecordingSurface::new(width, height));
            }
        };
        let canvas = surface.canvas();
        canvas.set_id(name);
        let style = canvas.style();
        check(style.set_property("position", "absolute"), "style");
        check(style.set_property("left", "0"), "style");
        check(style.set_property("top", "0"), "style");
        check(style.set_property("z-index", &z_index.to_string()), "style");
        if let Err(e) = self.host.append_child(canvas) {
            log::warn!("Cannot attach layer '{name}': {e:?}");
        }
        Box::new(surface)
    }

    fn detach(&self, name: &str, surface: &dyn Surface) {
        match surface.as_any().downcast_ref::<CanvasSurface>() {
            Some(surface) => surface.canvas().remove(),
            None => log::debug!("Layer '{name}' had no canvas to detach"),
        }
    }
}

type Images = Rc<RefCell<HashMap<String, ImageRef>>>;

fn all_loaded(images: &Images) -> bool {
    images.borrow().values().all(|i| i.borrow().loaded)
}

/// Loads images through `<img>` elements relative to a base URL
pub struct ImagePreloader {
    base_url: String,
    images: Images,
    events: Rc<AssetEvents>,
    onload: Vec<Closure<dyn FnMut()>>,
}

impl ImagePreloader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            images: Rc::new(RefCell::new(HashMap::new())),
            events: Rc::new(AssetEvents::new()),
            onload: Vec::new(),
        }
    }

    fn request(&mut self, name: &str) -> Option<ImageRef> {
        if let Some(image) = self.images.borrow().get(name) {
            return Some(Rc::clone(image));
        }
        let element = match HtmlImageElement::new() {
            Ok(element) => element,
            Err(e) => {
                log::error!("Cannot create image element for '{name}': {e:?}");
                return None;
            }
        };
        let image = ImageResource {
            element: Some(element.clone()),
            ..ImageResource::pending(name)
        }
        .into_ref();
        self.images
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&image));

        let weak = Rc::downgrade(&image);
        let images = Rc::clone(&self.images);
        let events = Rc::clone(&self.events);
        let loaded_element = element.clone();
        let onload = Closure::wrap(Box::new(move || {
            let Some(image) = weak.upgrade() else {
                return;
            };
            image.borrow_mut().mark_loaded(
                loaded_element.natural_width() as f32,
                loaded_element.natural_height() as f32,
            );
            events.emit(&AssetEvent::Update, &());
            if all_loaded(&images) {
                events.emit(&AssetEvent::Complete, &());
            }
        }) as Box<dyn FnMut()>);
        element.set_onload(Some(onload.as_ref().unchecked_ref::<js_sys::Function>()));
        element.set_src(&format!("{}{}", self.base_url, name));
        self.onload.push(onload);
        Some(image)
    }
}

impl Preloader for ImagePreloader {
    fn is_loaded(&self) -> bool {
        all_loaded(&self.images)
    }

    fn num_files(&self) -> usize {
        self.images.borrow().len()
    }

    fn num_files_loaded(&self) -> usize {
        self.images
            .borrow()
            .values()
            .filter(|i| i.borrow().loaded)
            .count()
    }

    /// The declared size is used until the element decodes
    fn load_now(&mut self, name: &str, width: f32, height: f32) -> ImageRef {
        let image = self.load(name);
        if !image.borrow().loaded {
            image.borrow_mut().mark_loaded(width, height);
        }
        image
    }

    fn load(&mut self, name: &str) -> ImageRef {
        self.request(name)
            .unwrap_or_else(|| ImageResource::pending(name).into_ref())
    }

    fn events(&self) -> Rc<AssetEvents> {
        Rc::clone(&self.events)
    }
}

type RafClosure = Closure<dyn FnMut(f64)>;

struct RafInner {
    closure: RefCell<Option<RafClosure>>,
    callback: RefCell<Box<dyn FnMut(f64)>>,
    running: Cell<bool>,
    raf_id: Cell<i32>,
}

/// Calls its callback with the frame timestamp (ms) on every animation frame
pub struct RafLoop {
    inner: Rc<RafInner>,
}

impl RafLoop {
    pub fn new(callback: impl FnMut(f64) + 'static) -> Self {
        Self {
            inner: Rc::new(RafInner {
                closure: RefCell::new(None),
                callback: RefCell::new(Box::new(callback)),
                running: Cell::new(false),
                raf_id: Cell::new(0),
            }),
        }
    }

    pub fn start(&self) {
        if self.inner.running.replace(true) {
            return;
        }

        let inner = Rc::clone(&self.inner);
        let closure = Closure::wrap(Box::new(move |timestamp_ms: f64| {
            if !inner.running.get() {
                return;
            }
            inner.callback.borrow_mut()(timestamp_ms);

            if inner.running.get()
                && let Some(ref closure) = *inner.closure.borrow()
            {
                inner
                    .raf_id
                    .set(request_animation_frame(closure.as_ref().unchecked_ref()));
            }
        }) as Box<dyn FnMut(f64)>);

        self.inner
            .raf_id
            .set(request_animation_frame(closure.as_ref().unchecked_ref()));
        *self.inner.closure.borrow_mut() = Some(closure);
    }

    pub fn stop(&self) {
        if !self.inner.running.replace(false) {
            return;
        }
        cancel_animation_frame(self.inner.raf_id.get());
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }
}

impl Drop for RafLoop {
    fn drop(&mut self) {
        self.stop();
        self.inner.closure.borrow_mut().take();
    }
}
