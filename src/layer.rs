//! Layers: independently clearable drawing surfaces ordered by z-index

use std::cell::RefCell;
use std::rc::Rc;

use crate::renderer::{Surface, SurfaceFactory};

pub type LayerRef = Rc<RefCell<Layer>>;

/// One drawing surface plus the bookkeeping the container needs
pub struct Layer {
    name: String,
    width: u32,
    height: u32,
    z_index: i32,
    /// Pixel density divisor applied to destination rectangles
    scale: f32,
    dirty: bool,
    destroyed: bool,
    surface: Box<dyn Surface>,
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("z_index", &self.z_index)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Layer {
    pub fn new(name: impl Into<String>, z_index: i32, surface: Box<dyn Surface>) -> Self {
        Self {
            name: name.into(),
            width: surface.width(),
            height: surface.height(),
            z_index,
            scale: 1.0,
            dirty: false,
            destroyed: false,
            surface,
        }
    }

    pub fn into_ref(self) -> LayerRef {
        Rc::new(RefCell::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f32) {
        if scale > 0.0 && scale != self.scale {
            self.scale = scale;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Resize the backing surface; this wipes it, so the layer becomes dirty
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.destroyed {
            return;
        }
        self.width = width;
        self.height = height;
        self.surface.resize(width, height);
        self.dirty = true;
    }

    pub fn set_width(&mut self, width: u32) {
        self.resize(width, self.height);
    }

    pub fn set_height(&mut self, height: u32) {
        self.resize(self.width, height);
    }

    /// Wipe the surface and reset the dirty flag
    pub fn clear(&mut self) {
        if self.destroyed {
            return;
        }
        self.surface.clear();
        self.dirty = false;
    }

    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> &mut dyn Surface {
        self.surface.as_mut()
    }

    /// Detach the surface from its host; safe to call more than once
    pub fn destroy(&mut self, factory: &dyn SurfaceFactory) {
        if self.destroyed {
            return;
        }
        factory.detach(&self.name, self.surface.as_ref());
        self.destroyed = true;
        self.dirty = false;
        log::debug!("Layer '{}' destroyed", self.name);
    }
}

/// The layers of one game, kept sorted by ascending z-index
#[derive(Default)]
pub struct LayerSet {
    layers: Vec<LayerRef>,
}

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layer and insert it before the first sibling with a greater z-index
    pub fn create(
        &mut self,
        factory: &dyn SurfaceFactory,
        name: &str,
        z_index: i32,
        width: u32,
        height: u32,
    ) -> LayerRef {
        if let Some(existing) = self.get_quiet(name) {
            log::warn!("Layer '{name}' already exists; returning the existing layer");
            return existing;
        }
        let surface = factory.create(name, z_index, width, height);
        let layer = Layer::new(name, z_index, surface).into_ref();
        let pos = self
            .layers
            .iter()
            .position(|l| l.borrow().z_index() > z_index)
            .unwrap_or(self.layers.len());
        self.layers.insert(pos, Rc::clone(&layer));
        log::debug!("Layer '{name}' created at z {z_index} (slot {pos})");
        layer
    }

    fn get_quiet(&self, name: &str) -> Option<LayerRef> {
        self.layers
            .iter()
            .find(|l| l.borrow().name() == name)
            .cloned()
    }

    /// Look up a layer by name; unknown names are logged
    pub fn get(&self, name: &str) -> Option<LayerRef> {
        let found = self.get_quiet(name);
        if found.is_none() {
            log::warn!("Layer '{name}' not found");
        }
        found
    }

    /// Remove and destroy a layer; returns false for unknown names
    pub fn remove(&mut self, factory: &dyn SurfaceFactory, name: &str) -> bool {
        let Some(pos) = self.layers.iter().position(|l| l.borrow().name() == name) else {
            log::warn!("Cannot remove layer '{name}': not found");
            return false;
        };
        let layer = self.layers.remove(pos);
        layer.borrow_mut().destroy(factory);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerRef> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn resize_all(&mut self, width: u32, height: u32) {
        for layer in &self.layers {
            layer.borrow_mut().resize(width, height);
        }
    }

    pub fn destroy_all(&mut self, factory: &dyn SurfaceFactory) {
        for layer in self.layers.drain(..) {
            layer.borrow_mut().destroy(factory);
        }
    }
}
