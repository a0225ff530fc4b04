//! Blocks: a named set of interchangeable slices ("poses"), one active at a time

use std::rc::Rc;

use super::slice::{CompleteCallback, Slice, SliceOptions};
use super::view::ViewOptions;
use super::{
    Drawable, Notification, Property, RenderContext, StackAnchor, ViewEvent, ViewEvents,
    remove_motors_from,
};
use crate::error::{EngineError, EngineResult};
use crate::geom::Rect;
use crate::layer::LayerRef;
use crate::motor::{Motor, MotorKind};
use crate::renderer::Color;

#[derive(Clone, Default)]
pub struct BlockOptions {
    pub name: Option<String>,
    /// Initial state handed to the first slice added
    pub view: ViewOptions,
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub colorize: Option<Color>,
    pub slices: Vec<SliceOptions>,
}

/// State that follows the block from one slice to the next.
/// Size and offset stay with each slice's own image.
struct Carry {
    layer: Option<LayerRef>,
    stack: Option<StackAnchor>,
    x: f32,
    y: f32,
    scale_x: f32,
    scale_y: f32,
    angle: f32,
    alpha: f32,
    visible: bool,
    hotspots: Vec<Rect>,
    min_hotspot: Option<f32>,
    center_registration_point: bool,
    mirror_x: bool,
    mirror_y: bool,
    colorize: Option<Color>,
}

impl Carry {
    fn capture(slice: &Slice) -> Self {
        let v = slice.view();
        Self {
            layer: v.layer().cloned(),
            stack: v.stack().cloned(),
            x: v.x(),
            y: v.y(),
            scale_x: v.scale_x(),
            scale_y: v.scale_y(),
            angle: v.angle(),
            alpha: v.alpha(),
            visible: v.visible(),
            hotspots: v.hotspots().to_vec(),
            min_hotspot: v.min_hotspot(),
            center_registration_point: v.center_registration_point(),
            mirror_x: slice.mirror_x(),
            mirror_y: slice.mirror_y(),
            colorize: slice.colorize(),
        }
    }

    fn from_options(options: &BlockOptions, stack: Option<StackAnchor>) -> Self {
        let v = &options.view;
        Self {
            layer: v.layer.clone(),
            stack,
            x: v.x,
            y: v.y,
            scale_x: v.scale_x,
            scale_y: v.scale_y,
            angle: v.angle,
            alpha: v.alpha,
            visible: v.visible,
            hotspots: v.hotspots.clone(),
            min_hotspot: v.min_hotspot,
            center_registration_point: v.center_registration_point,
            mirror_x: options.mirror_x,
            mirror_y: options.mirror_y,
            colorize: options.colorize,
        }
    }

    /// Applied in a fixed order: layer and origin first, then the transform
    fn apply(self, slice: &mut Slice) {
        let v = slice.view_mut();
        v.set_layer(self.layer);
        v.set_stack(self.stack);
        v.set_x(self.x);
        v.set_y(self.y);
        v.set_scale_x(self.scale_x);
        v.set_scale_y(self.scale_y);
        v.set_angle(self.angle);
        v.set_alpha(self.alpha);
        v.set_visible(self.visible);
        v.set_hotspots(self.hotspots);
        v.set_min_hotspot(self.min_hotspot);
        v.set_center_registration_point(self.center_registration_point);
        slice.set_mirror_x(self.mirror_x);
        slice.set_mirror_y(self.mirror_y);
        slice.set_colorize(self.colorize);
    }
}

pub struct Block {
    name: String,
    options: BlockOptions,
    slices: Vec<Slice>,
    current: Option<usize>,
    /// State of a removed current slice, handed to the next one selected
    retired: Option<Carry>,
    stack: Option<StackAnchor>,
    motors: Vec<Motor>,
    disposed: bool,
    events: Rc<ViewEvents>,
}

impl Block {
    /// Build a block and add every slice listed in `options`
    pub fn new(mut options: BlockOptions) -> EngineResult<Self> {
        let slices = std::mem::take(&mut options.slices);
        let mut block = Self {
            name: options.name.clone().unwrap_or_default(),
            options,
            slices: Vec::new(),
            current: None,
            retired: None,
            stack: None,
            motors: Vec::new(),
            disposed: false,
            events: Rc::new(ViewEvents::new()),
        };
        for slice in slices {
            block.add_slice(slice)?;
        }
        Ok(block)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a slice and return its name; the first slice becomes current
    pub fn add_slice(&mut self, options: SliceOptions) -> EngineResult<String> {
        if self.disposed {
            return Err(EngineError::Disposed(format!("block '{}'", self.name)));
        }
        let name = options
            .name
            .clone()
            .unwrap_or_else(|| format!("unnamedSlice{}", self.slices.len()));
        if self.index_of(&name).is_some() {
            return Err(EngineError::config(format!(
                "block '{}' already has a slice named '{name}'",
                self.name
            )));
        }

        let mut slice = Slice::new(options);
        slice.set_name(name.clone());
        let hub = Rc::downgrade(&self.events);
        slice.events().on(ViewEvent::Complete, move |_| {
            if let Some(hub) = hub.upgrade() {
                hub.emit(&ViewEvent::Complete, &());
            }
        });

        let first = self.slices.is_empty();
        if first {
            Carry::from_options(&self.options, self.stack.clone()).apply(&mut slice);
        }
        self.slices.push(slice);
        if first {
            self.set_slice(&name, None);
        }
        Ok(name)
    }

    /// Remove and destroy a slice. Removing the active one leaves the block
    /// without a current slice; its state passes to the next `set_slice`.
    pub fn remove_slice(&mut self, name: &str) -> bool {
        let Some(idx) = self.index_of(name) else {
            log::warn!("Block '{}' has no slice '{name}' to remove", self.name);
            return false;
        };
        let mut slice = self.slices.remove(idx);
        if self.current == Some(idx) {
            self.retired = Some(Carry::capture(&slice));
        }
        slice.destroy();
        self.current = match self.current {
            Some(cur) if cur == idx => None,
            Some(cur) if cur > idx => Some(cur - 1),
            other => other,
        };
        true
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.slices.iter().position(|s| s.name() == name)
    }

    /// Switch the active slice, carrying shared state over from the old one.
    /// Returns false for unknown names or when `name` is already current.
    pub fn set_slice(&mut self, name: &str, callback: Option<CompleteCallback>) -> bool {
        if self.disposed {
            return false;
        }
        let Some(idx) = self.index_of(name) else {
            log::warn!("Block '{}' has no slice '{name}'", self.name);
            return false;
        };
        if self.current == Some(idx) {
            return false;
        }

        if let Some(old) = self.current {
            let carry = Carry::capture(&self.slices[old]);
            self.slices[old].stop();
            carry.apply(&mut self.slices[idx]);
        } else if let Some(carry) = self.retired.take() {
            carry.apply(&mut self.slices[idx]);
        }
        self.current = Some(idx);

        let slice = &mut self.slices[idx];
        slice.reset();
        if slice.auto_play() {
            slice.play(callback);
        }
        slice.set_dirty(true);
        log::debug!("Block '{}' switched to slice '{name}'", self.name);
        true
    }

    pub fn slice(&self, name: &str) -> Option<&Slice> {
        self.slices.iter().find(|s| s.name() == name)
    }

    pub fn slice_mut(&mut self, name: &str) -> Option<&mut Slice> {
        self.slices.iter_mut().find(|s| s.name() == name)
    }

    pub fn slice_names(&self) -> impl Iterator<Item = &str> {
        self.slices.iter().map(|s| s.name())
    }

    pub fn current_slice(&self) -> Option<&Slice> {
        self.current.map(|i| &self.slices[i])
    }

    pub fn current_slice_mut(&mut self) -> Option<&mut Slice> {
        self.current.map(|i| &mut self.slices[i])
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current_slice().map(|s| s.name())
    }

    pub fn play(&mut self, callback: Option<CompleteCallback>) {
        if let Some(slice) = self.current_slice_mut() {
            slice.play(callback);
        }
    }

    pub fn pause(&mut self) {
        if let Some(slice) = self.current_slice_mut() {
            slice.pause();
        }
    }

    pub fn stop(&mut self) {
        if let Some(slice) = self.current_slice_mut() {
            slice.stop();
        }
    }

    pub fn reset(&mut self) {
        if let Some(slice) = self.current_slice_mut() {
            slice.reset();
        }
    }

    pub fn goto_frame(&mut self, index: f32) {
        if let Some(slice) = self.current_slice_mut() {
            slice.goto_frame(index);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current_slice().is_some_and(|s| s.is_playing())
    }

    pub fn cur_frame_index(&self) -> Option<usize> {
        self.current_slice().map(|s| s.cur_frame_index())
    }

    pub fn motor_count(&self) -> usize {
        self.motors.iter().filter(|m| !m.is_destroyed()).count()
    }
}

impl Drawable for Block {
    fn update(&mut self) {
        if let Some(slice) = self.current_slice_mut() {
            slice.update();
        }
    }

    fn take_notifications(&mut self) -> Vec<Notification> {
        self.slices
            .iter_mut()
            .flat_map(|s| s.take_notifications())
            .collect()
    }

    fn render(&mut self, ctx: &RenderContext) {
        if let Some(slice) = self.current_slice_mut() {
            slice.render(ctx);
        }
    }

    fn is_dirty(&self) -> bool {
        self.current_slice().is_some_and(|s| s.is_dirty())
    }

    fn set_dirty(&mut self, dirty: bool) {
        if let Some(slice) = self.current_slice_mut() {
            slice.set_dirty(dirty);
        }
    }

    fn is_visible(&self) -> bool {
        self.current_slice().is_some_and(|s| s.is_visible())
    }

    fn set_visible(&mut self, visible: bool) {
        if let Some(slice) = self.current_slice_mut() {
            slice.set_visible(visible);
        }
    }

    fn property(&self, prop: Property) -> Option<f32> {
        self.current_slice()?.property(prop)
    }

    fn set_property(&mut self, prop: Property, value: f32) -> bool {
        self.current_slice_mut()
            .is_some_and(|s| s.set_property(prop, value))
    }

    fn layer(&self) -> Option<LayerRef> {
        self.current_slice()?.layer()
    }

    fn set_layer(&mut self, layer: Option<LayerRef>) {
        if let Some(slice) = self.current_slice_mut() {
            slice.set_layer(layer);
        } else if let Some(carry) = self.retired.as_mut() {
            carry.layer = layer;
        } else {
            self.options.view.layer = layer;
        }
    }

    fn set_stack(&mut self, anchor: Option<StackAnchor>) {
        self.stack = anchor.clone();
        if let Some(carry) = self.retired.as_mut() {
            carry.stack = anchor.clone();
        }
        if let Some(slice) = self.current_slice_mut() {
            slice.set_stack(anchor);
        }
    }

    fn bounds(&self) -> Vec<Rect> {
        self.current_slice().map(|s| s.bounds()).unwrap_or_default()
    }

    fn motorize(&mut self, motor: Motor) {
        if self.disposed {
            log::warn!("Ignoring motor for destroyed block '{}'", self.name);
            motor.destroy();
            return;
        }
        self.motors.retain(|m| !m.is_destroyed());
        self.motors.push(motor);
    }

    fn remove_motors(&mut self, kind: Option<MotorKind>) {
        remove_motors_from(&mut self.motors, kind);
    }

    fn destroy(&mut self) {
        if self.disposed {
            return;
        }
        self.remove_motors(None);
        for slice in &mut self.slices {
            slice.destroy();
        }
        self.slices.clear();
        self.current = None;
        self.retired = None;
        self.disposed = true;
        self.events.emit(&ViewEvent::Destroyed, &());
        self.events.clear();
    }

    fn is_destroyed(&self) -> bool {
        self.disposed
    }

    fn events(&self) -> Rc<ViewEvents> {
        Rc::clone(&self.events)
    }
}
