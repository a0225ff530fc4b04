//! Stacks: a shared coordinate origin for a group of nodes
//!
//! A stack never draws anything itself. Members read their world position
//! through a [`StackAnchor`], so moving the stack moves every member without
//! touching their local coordinates.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::Vec2;

use super::{
    Drawable, Notification, Property, RenderContext, ViewEvent, ViewEvents, ViewRef,
    remove_motors_from,
};
use crate::geom::Rect;
use crate::layer::LayerRef;
use crate::motor::{Motor, MotorKind};

#[derive(Debug)]
struct AnchorInner {
    origin: Cell<Vec2>,
    parent: RefCell<Option<StackAnchor>>,
}

/// Shared origin handed to every member of a stack
#[derive(Debug, Clone)]
pub struct StackAnchor(Rc<AnchorInner>);

impl StackAnchor {
    fn new() -> Self {
        Self(Rc::new(AnchorInner {
            origin: Cell::new(Vec2::ZERO),
            parent: RefCell::new(None),
        }))
    }

    /// Origin relative to the parent stack (if any)
    pub fn origin(&self) -> Vec2 {
        self.0.origin.get()
    }

    /// Origin in world space, following nested stacks
    pub fn world_origin(&self) -> Vec2 {
        let parent = self
            .0
            .parent
            .borrow()
            .as_ref()
            .map_or(Vec2::ZERO, StackAnchor::world_origin);
        parent + self.0.origin.get()
    }

    pub fn ptr_eq(&self, other: &StackAnchor) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether `other` is this anchor or one of its ancestors
    pub fn is_within(&self, other: &StackAnchor) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(anchor) = cursor {
            if anchor.ptr_eq(other) {
                return true;
            }
            cursor = anchor.0.parent.borrow().clone();
        }
        false
    }
}

pub struct Stack {
    anchor: StackAnchor,
    alpha: f32,
    visible: bool,
    views: Vec<ViewRef>,
    motors: Vec<Motor>,
    /// Member notifications collected during `update`
    notifications: Vec<Notification>,
    disposed: bool,
    events: Rc<ViewEvents>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    pub fn new() -> Self {
        Self {
            anchor: StackAnchor::new(),
            alpha: 1.0,
            visible: true,
            views: Vec::new(),
            motors: Vec::new(),
            notifications: Vec::new(),
            disposed: false,
            events: Rc::new(ViewEvents::new()),
        }
    }

    pub fn at(x: f32, y: f32) -> Self {
        let stack = Self::new();
        stack.anchor.0.origin.set(Vec2::new(x, y));
        stack
    }

    pub fn anchor(&self) -> &StackAnchor {
        &self.anchor
    }

    pub fn x(&self) -> f32 {
        self.anchor.origin().x
    }

    pub fn y(&self) -> f32 {
        self.anchor.origin().y
    }

    pub fn world_x(&self) -> f32 {
        self.anchor.world_origin().x
    }

    pub fn world_y(&self) -> f32 {
        self.anchor.world_origin().y
    }

    /// Move the origin; members are only dirtied when the value changes
    pub fn set_x(&mut self, x: f32) {
        let origin = self.anchor.origin();
        if self.disposed || origin.x == x {
            return;
        }
        self.anchor.0.origin.set(Vec2::new(x, origin.y));
        self.dirty_members();
    }

    pub fn set_y(&mut self, y: f32) {
        let origin = self.anchor.origin();
        if self.disposed || origin.y == y {
            return;
        }
        self.anchor.0.origin.set(Vec2::new(origin.x, y));
        self.dirty_members();
    }

    fn dirty_members(&mut self) {
        for view in &self.views {
            view.borrow_mut().set_dirty(true);
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Applies the alpha to every member
    pub fn set_alpha(&mut self, alpha: f32) {
        if self.disposed {
            return;
        }
        self.alpha = alpha.clamp(0.0, 1.0);
        for view in &self.views {
            view.borrow_mut().set_property(Property::Alpha, self.alpha);
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.disposed {
            return;
        }
        self.visible = visible;
        for view in &self.views {
            view.borrow_mut().set_visible(visible);
        }
    }

    /// True if any member is dirty
    pub fn is_dirty(&self) -> bool {
        self.views.iter().any(|v| v.borrow().is_dirty())
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        for view in &self.views {
            view.borrow_mut().set_dirty(dirty);
        }
    }

    pub fn add_view(&mut self, view: ViewRef) {
        if self.disposed {
            return;
        }
        if self.views.iter().any(|v| Rc::ptr_eq(v, &view)) {
            log::warn!("View is already in this stack");
            return;
        }
        let Ok(node) = view.try_borrow() else {
            log::warn!("Cannot add a view to a stack while it is borrowed");
            return;
        };
        if node
            .own_anchor()
            .is_some_and(|child| self.anchor.is_within(&child))
        {
            log::warn!("Refusing to nest a stack inside one of its own members");
            return;
        }
        drop(node);
        view.borrow_mut().set_stack(Some(self.anchor.clone()));
        self.views.push(view);
    }

    /// Remove a member and detach it from the stack origin
    pub fn remove_view(&mut self, view: &ViewRef) -> bool {
        let Some(pos) = self.views.iter().position(|v| Rc::ptr_eq(v, view)) else {
            log::warn!("View not found in stack");
            return false;
        };
        let removed = self.views.remove(pos);
        removed.borrow_mut().set_stack(None);
        true
    }

    pub fn views(&self) -> &[ViewRef] {
        &self.views
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Widest visible member
    pub fn width(&self) -> f32 {
        self.max_visible(Property::Width)
    }

    /// Tallest visible member
    pub fn height(&self) -> f32 {
        self.max_visible(Property::Height)
    }

    fn max_visible(&self, prop: Property) -> f32 {
        self.views
            .iter()
            .filter_map(|v| {
                let v = v.borrow();
                if v.is_visible() { v.property(prop) } else { None }
            })
            .fold(0.0, f32::max)
    }
}

impl Drawable for Stack {
    fn update(&mut self) {
        if self.disposed {
            return;
        }
        self.views.retain(|v| !v.borrow().is_destroyed());
        for view in &self.views {
            let mut node = view.borrow_mut();
            node.update();
            self.notifications.extend(node.take_notifications());
        }
    }

    fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn render(&mut self, ctx: &RenderContext) {
        for view in &self.views {
            let mut view = view.borrow_mut();
            if view.is_visible() {
                view.render(ctx);
            } else {
                view.set_dirty(false);
            }
        }
    }

    fn is_dirty(&self) -> bool {
        Stack::is_dirty(self)
    }

    fn set_dirty(&mut self, dirty: bool) {
        Stack::set_dirty(self, dirty);
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        Stack::set_visible(self, visible);
    }

    fn property(&self, prop: Property) -> Option<f32> {
        match prop {
            Property::X => Some(self.x()),
            Property::Y => Some(self.y()),
            Property::WorldX => Some(self.world_x()),
            Property::WorldY => Some(self.world_y()),
            Property::Alpha => Some(self.alpha),
            Property::Width => Some(self.width()),
            Property::Height => Some(self.height()),
            _ => None,
        }
    }

    fn set_property(&mut self, prop: Property, value: f32) -> bool {
        match prop {
            Property::X => self.set_x(value),
            Property::Y => self.set_y(value),
            Property::Alpha => self.set_alpha(value),
            _ => return false,
        }
        !self.disposed
    }

    fn layer(&self) -> Option<LayerRef> {
        None
    }

    /// Moves every member onto `layer`
    fn set_layer(&mut self, layer: Option<LayerRef>) {
        for view in &self.views {
            view.borrow_mut().set_layer(layer.clone());
        }
    }

    fn for_each_layer(&self, f: &mut dyn FnMut(&LayerRef, bool)) {
        for view in &self.views {
            view.borrow().for_each_layer(f);
        }
    }

    fn invalidate_layer(&mut self, layer: &LayerRef) {
        for view in &self.views {
            view.borrow_mut().invalidate_layer(layer);
        }
    }

    /// Nest this stack inside another one
    fn set_stack(&mut self, anchor: Option<StackAnchor>) {
        if anchor.as_ref().is_some_and(|a| a.is_within(&self.anchor)) {
            log::warn!("A stack cannot be nested in itself or its own members");
            return;
        }
        *self.anchor.0.parent.borrow_mut() = anchor;
        self.dirty_members();
    }

    fn own_anchor(&self) -> Option<StackAnchor> {
        Some(self.anchor.clone())
    }

    fn bounds(&self) -> Vec<Rect> {
        self.views
            .iter()
            .filter(|v| v.borrow().is_visible())
            .flat_map(|v| v.borrow().bounds())
            .collect()
    }

    fn motorize(&mut self, motor: Motor) {
        if self.disposed {
            motor.destroy();
            return;
        }
        self.motors.retain(|m| !m.is_destroyed());
        self.motors.push(motor);
    }

    fn remove_motors(&mut self, kind: Option<MotorKind>) {
        remove_motors_from(&mut self.motors, kind);
    }

    /// Destroys the stack and every member
    fn destroy(&mut self) {
        if self.disposed {
            return;
        }
        self.remove_motors(None);
        for view in self.views.drain(..) {
            view.borrow_mut().destroy();
        }
        self.notifications.clear();
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
