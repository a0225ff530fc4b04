//! Retained-mode scene graph
//!
//! Nodes keep a `dirty` flag instead of being diffed: any visual mutation sets
//! it, a render clears it. The [`Container`] decides which layers must be
//! wiped each frame and forces every node on a wiped layer to redraw.
//!
//! - `view`: the positionable base node (transform, hit testing, motors)
//! - `slice`: an image/sprite-sheet node with frame animation
//! - `stack`: a shared coordinate origin for a group of nodes
//! - `block`: a set of interchangeable slices, one active at a time
//! - `container`: top-level aggregator that owns the dirty-layer pass

pub mod block;
pub mod container;
pub mod slice;
pub mod stack;
pub mod view;

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::event::EventHub;
use crate::geom::Rect;
use crate::layer::LayerRef;
use crate::motor::{Motor, MotorKind};

pub use block::{Block, BlockOptions};
pub use container::Container;
pub use slice::{Loop, Slice, SliceOptions};
pub use stack::{Stack, StackAnchor};
pub use view::{View, ViewOptions};

/// Events a node can announce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewEvent {
    /// A non-looping animation reached its end
    Complete,
    /// The node was destroyed
    Destroyed,
}

pub type ViewEvents = EventHub<ViewEvent>;

/// Shared handle to any scene node
pub type ViewRef = Rc<RefCell<dyn Drawable>>;

/// Wrap a node into a [`ViewRef`]
pub fn view_ref<T: Drawable + 'static>(node: T) -> ViewRef {
    Rc::new(RefCell::new(node))
}

/// Completion work a node queued during `update`: its `Complete` event and
/// any one-shot callback
pub type Notification = Box<dyn FnOnce()>;

/// Update `view`, then deliver its queued notifications with the node borrow
/// released, so listeners may borrow the node again
pub fn update_view(view: &ViewRef) {
    let pending = {
        let mut node = view.borrow_mut();
        node.update();
        node.take_notifications()
    };
    for notify in pending {
        notify();
    }
}

/// Numeric node properties addressable by motors and tweens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    X,
    Y,
    ScaleX,
    ScaleY,
    OffsetX,
    OffsetY,
    Angle,
    Alpha,
    /// Read-only: local width times horizontal scale
    Width,
    /// Read-only: local height times vertical scale
    Height,
    /// Read-only: x plus the stack origin
    WorldX,
    /// Read-only: y plus the stack origin
    WorldY,
}

/// The visible window onto the world, in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Per-frame data handed down a render pass
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext {
    pub camera: Camera,
    /// Outline hit bounds of every drawn node
    pub debug: bool,
}

/// The contract every scene node implements
///
/// Blocks forward the whole surface to their active slice through this trait,
/// and containers/stacks drive their members through it.
pub trait Drawable {
    /// Advance one fixed simulation step
    fn update(&mut self);

    /// Drain notifications queued by `update`; the caller runs them once the
    /// node is no longer borrowed (see [`update_view`])
    fn take_notifications(&mut self) -> Vec<Notification> {
        Vec::new()
    }

    /// Draw if dirty; always leaves the node clean
    fn render(&mut self, ctx: &RenderContext);

    fn is_dirty(&self) -> bool;
    fn set_dirty(&mut self, dirty: bool);

    fn is_visible(&self) -> bool;
    fn set_visible(&mut self, visible: bool);

    /// Read a numeric property; `None` when the node cannot answer
    fn property(&self, prop: Property) -> Option<f32>;

    /// Write a numeric property; returns false for read-only or unavailable ones
    fn set_property(&mut self, prop: Property, value: f32) -> bool;

    fn layer(&self) -> Option<LayerRef>;
    fn set_layer(&mut self, layer: Option<LayerRef>);

    /// Visit each layer this node draws onto together with its dirty state
    fn for_each_layer(&self, f: &mut dyn FnMut(&LayerRef, bool)) {
        if let Some(layer) = self.layer() {
            f(&layer, self.is_dirty());
        }
    }

    /// Mark dirty if this node draws onto `layer`
    fn invalidate_layer(&mut self, layer: &LayerRef) {
        if self.layer().is_some_and(|l| Rc::ptr_eq(&l, layer)) {
            self.set_dirty(true);
        }
    }

    /// Attach to (or detach from) a stack's coordinate origin
    fn set_stack(&mut self, anchor: Option<StackAnchor>);

    /// The origin this node hands to its own members; only stacks have one
    fn own_anchor(&self) -> Option<StackAnchor> {
        None
    }

    /// Hit-test rectangles in world space
    fn bounds(&self) -> Vec<Rect>;

    fn is_point_inside(&self, pt: Vec2) -> bool {
        self.bounds().iter().any(|r| r.contains(pt))
    }

    fn is_rect_inside(&self, rect: &Rect) -> bool {
        self.bounds().iter().any(|r| r.intersects(rect))
    }

    /// Take ownership of a motor driving this node
    fn motorize(&mut self, motor: Motor);

    /// Destroy owned motors, all of them or only those of `kind`
    fn remove_motors(&mut self, kind: Option<MotorKind>);

    fn destroy(&mut self);
    fn is_destroyed(&self) -> bool;

    fn events(&self) -> Rc<ViewEvents>;
}

/// Destroy the given motors in two phases so destruction side effects that
/// touch the owner's list cannot disturb the loop, then drop the dead ones.
pub(crate) fn remove_motors_from(motors: &mut Vec<Motor>, kind: Option<MotorKind>) {
    let doomed: Vec<Motor> = motors
        .iter()
        .filter(|m| kind.is_none_or(|k| m.kind() == k))
        .cloned()
        .collect();
    for motor in &doomed {
        motor.destroy();
    }
    motors.retain(|m| !m.is_destroyed());
}
