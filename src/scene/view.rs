//! The base scene node: transform, visibility, hit bounds and motors

use std::rc::Rc;

use glam::Vec2;

use super::{
    Drawable, Property, RenderContext, StackAnchor, ViewEvent, ViewEvents, remove_motors_from,
};
use crate::geom::Rect;
use crate::layer::LayerRef;
use crate::motor::{Motor, MotorKind};
use crate::renderer::Color;

/// Construction options shared by every node kind
#[derive(Clone)]
pub struct ViewOptions {
    pub layer: Option<LayerRef>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub angle: f32,
    pub alpha: f32,
    pub visible: bool,
    /// Local-space hit regions; empty means "use the node rectangle"
    pub hotspots: Vec<Rect>,
    /// Pad each hit rectangle up to this size (touch targets)
    pub min_hotspot: Option<f32>,
    /// Treat the node center, not its top-left corner, as its position
    pub center_registration_point: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            layer: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            angle: 0.0,
            alpha: 1.0,
            visible: true,
            hotspots: Vec::new(),
            min_hotspot: None,
            center_registration_point: false,
        }
    }
}

/// Wrap an angle in degrees into `[0, 360)`
pub fn normalize_degrees(angle: f32) -> f32 {
    let a = angle % 360.0;
    if a < 0.0 { a + 360.0 } else { a }
}

macro_rules! dirty_setter {
    ($(#[$meta:meta])* $name:ident, $field:ident) => {
        $(#[$meta])*
        pub fn $name(&mut self, value: f32) {
            if self.disposed || self.$field == value {
                return;
            }
            self.$field = value;
            self.dirty = true;
        }
    };
}

pub struct View {
    x: f32,
    y: f32,
    local_width: f32,
    local_height: f32,
    scale_x: f32,
    scale_y: f32,
    offset_x: f32,
    offset_y: f32,
    angle: f32,
    alpha: f32,
    visible: bool,
    layer: Option<LayerRef>,
    hotspots: Vec<Rect>,
    min_hotspot: Option<f32>,
    center_registration_point: bool,
    stack: Option<StackAnchor>,
    dirty: bool,
    disposed: bool,
    motors: Vec<Motor>,
    events: Rc<ViewEvents>,
}

impl View {
    pub fn new(options: ViewOptions) -> Self {
        Self {
            x: options.x,
            y: options.y,
            local_width: options.width,
            local_height: options.height,
            scale_x: options.scale_x,
            scale_y: options.scale_y,
            offset_x: options.offset_x,
            offset_y: options.offset_y,
            angle: normalize_degrees(options.angle),
            alpha: options.alpha.clamp(0.0, 1.0),
            visible: options.visible,
            layer: options.layer,
            hotspots: options.hotspots,
            min_hotspot: options.min_hotspot,
            center_registration_point: options.center_registration_point,
            stack: None,
            dirty: true,
            disposed: false,
            motors: Vec::new(),
            events: Rc::new(ViewEvents::new()),
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    dirty_setter!(set_x, x);
    dirty_setter!(set_y, y);
    dirty_setter!(set_scale_x, scale_x);
    dirty_setter!(set_scale_y, scale_y);
    dirty_setter!(set_offset_x, offset_x);
    dirty_setter!(set_offset_y, offset_y);

    pub fn scale_x(&self) -> f32 {
        self.scale_x
    }

    pub fn scale_y(&self) -> f32 {
        self.scale_y
    }

    pub fn offset_x(&self) -> f32 {
        self.offset_x
    }

    pub fn offset_y(&self) -> f32 {
        self.offset_y
    }

    /// Degrees in `[0, 360)`
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        let angle = normalize_degrees(angle);
        if self.disposed || self.angle == angle {
            return;
        }
        self.angle = angle;
        self.dirty = true;
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if self.disposed || self.alpha == alpha {
            return;
        }
        self.alpha = alpha;
        self.dirty = true;
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.disposed || self.visible == visible {
            return;
        }
        self.visible = visible;
        self.dirty = true;
    }

    pub fn local_width(&self) -> f32 {
        self.local_width
    }

    pub fn local_height(&self) -> f32 {
        self.local_height
    }

    /// Unscaled size; slices set this from their frame geometry
    pub fn set_local_size(&mut self, width: f32, height: f32) {
        if self.disposed || (self.local_width == width && self.local_height == height) {
            return;
        }
        self.local_width = width;
        self.local_height = height;
        self.dirty = true;
    }

    pub fn width(&self) -> f32 {
        self.local_width * self.scale_x
    }

    pub fn height(&self) -> f32 {
        self.local_height * self.scale_y
    }

    pub fn world_x(&self) -> f32 {
        self.stack
            .as_ref()
            .map_or(self.x, |s| s.world_origin().x + self.x)
    }

    pub fn world_y(&self) -> f32 {
        self.stack
            .as_ref()
            .map_or(self.y, |s| s.world_origin().y + self.y)
    }

    pub fn world_position(&self) -> Vec2 {
        Vec2::new(self.world_x(), self.world_y())
    }

    /// Offset actually applied when drawing, including registration centering
    pub fn draw_offset_x(&self) -> f32 {
        if self.center_registration_point {
            self.offset_x - self.width() / 2.0
        } else {
            self.offset_x
        }
    }

    pub fn draw_offset_y(&self) -> f32 {
        if self.center_registration_point {
            self.offset_y - self.height() / 2.0
        } else {
            self.offset_y
        }
    }

    pub fn center_registration_point(&self) -> bool {
        self.center_registration_point
    }

    pub fn set_center_registration_point(&mut self, center: bool) {
        if self.disposed || self.center_registration_point == center {
            return;
        }
        self.center_registration_point = center;
        self.dirty = true;
    }

    pub fn hotspots(&self) -> &[Rect] {
        &self.hotspots
    }

    pub fn set_hotspots(&mut self, hotspots: Vec<Rect>) {
        if self.disposed {
            return;
        }
        self.hotspots = hotspots;
    }

    pub fn min_hotspot(&self) -> Option<f32> {
        self.min_hotspot
    }

    pub fn set_min_hotspot(&mut self, min: Option<f32>) {
        if self.disposed {
            return;
        }
        self.min_hotspot = min;
    }

    pub fn stack(&self) -> Option<&StackAnchor> {
        self.stack.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        if self.disposed {
            return;
        }
        self.dirty = dirty;
    }

    pub fn layer(&self) -> Option<&LayerRef> {
        self.layer.as_ref()
    }

    pub fn set_layer(&mut self, layer: Option<LayerRef>) {
        if self.disposed {
            return;
        }
        self.layer = layer;
        self.dirty = true;
    }

    pub fn set_stack(&mut self, anchor: Option<StackAnchor>) {
        if self.disposed {
            return;
        }
        self.stack = anchor;
        self.dirty = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn events(&self) -> Rc<ViewEvents> {
        Rc::clone(&self.events)
    }

    /// World-space hit rectangles
    pub fn bounds(&self) -> Vec<Rect> {
        let origin_x = self.world_x() + self.draw_offset_x();
        let origin_y = self.world_y() + self.draw_offset_y();
        let rects: Vec<Rect> = if self.hotspots.is_empty() {
            vec![Rect::new(origin_x, origin_y, self.width(), self.height())]
        } else {
            self.hotspots
                .iter()
                .map(|h| {
                    Rect::new(
                        origin_x + h.x * self.scale_x,
                        origin_y + h.y * self.scale_y,
                        h.width * self.scale_x,
                        h.height * self.scale_y,
                    )
                })
                .collect()
        };
        match self.min_hotspot {
            Some(min) => rects.into_iter().map(|r| r.padded_to(min)).collect(),
            None => rects,
        }
    }

    pub fn property(&self, prop: Property) -> f32 {
        match prop {
            Property::X => self.x,
            Property::Y => self.y,
            Property::ScaleX => self.scale_x,
            Property::ScaleY => self.scale_y,
            Property::OffsetX => self.offset_x,
            Property::OffsetY => self.offset_y,
            Property::Angle => self.angle,
            Property::Alpha => self.alpha,
            Property::Width => self.width(),
            Property::Height => self.height(),
            Property::WorldX => self.world_x(),
            Property::WorldY => self.world_y(),
        }
    }

    pub fn set_property(&mut self, prop: Property, value: f32) -> bool {
        if self.disposed {
            return false;
        }
        match prop {
            Property::X => self.set_x(value),
            Property::Y => self.set_y(value),
            Property::ScaleX => self.set_scale_x(value),
            Property::ScaleY => self.set_scale_y(value),
            Property::OffsetX => self.set_offset_x(value),
            Property::OffsetY => self.set_offset_y(value),
            Property::Angle => self.set_angle(value),
            Property::Alpha => self.set_alpha(value),
            Property::Width | Property::Height | Property::WorldX | Property::WorldY => {
                return false;
            }
        }
        true
    }

    /// Outline the hit bounds on the node's layer
    pub(crate) fn render_debug(&self, ctx: &RenderContext) {
        if !ctx.debug || !self.visible {
            return;
        }
        let Some(layer) = &self.layer else { return };
        let Ok(mut layer) = layer.try_borrow_mut() else {
            return;
        };
        let scale = layer.scale();
        let surface = layer.surface_mut();
        for r in self.bounds() {
            surface.stroke_rect(
                Rect::new(
                    (r.x - ctx.camera.offset_x) / scale,
                    (r.y - ctx.camera.offset_y) / scale,
                    r.width / scale,
                    r.height / scale,
                ),
                Color::DEBUG,
            );
        }
    }

    /// Base views draw nothing themselves
    pub fn render(&mut self, ctx: &RenderContext) {
        if self.dirty {
            self.render_debug(ctx);
        }
        self.dirty = false;
    }

    pub fn motorize(&mut self, motor: Motor) {
        if self.disposed {
            log::warn!("Ignoring motor for a destroyed view");
            motor.destroy();
            return;
        }
        self.motors.retain(|m| !m.is_destroyed());
        self.motors.push(motor);
    }

    pub fn remove_motors(&mut self, kind: Option<MotorKind>) {
        remove_motors_from(&mut self.motors, kind);
    }

    pub fn motor_count(&self) -> usize {
        self.motors.iter().filter(|m| !m.is_destroyed()).count()
    }

    /// Detach motors and announce destruction; later calls do nothing
    pub fn destroy(&mut self) {
        if self.disposed {
            return;
        }
        self.remove_motors(None);
        self.disposed = true;
        self.dirty = false;
        self.events.emit(&ViewEvent::Destroyed, &());
        self.events.clear();
    }
}

impl Drawable for View {
    fn update(&mut self) {}

    fn render(&mut self, ctx: &RenderContext) {
        View::render(self, ctx);
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn set_dirty(&mut self, dirty: bool) {
        View::set_dirty(self, dirty);
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_visible(&mut self, visible: bool) {
        View::set_visible(self, visible);
    }

    fn property(&self, prop: Property) -> Option<f32> {
        Some(View::property(self, prop))
    }

    fn set_property(&mut self, prop: Property, value: f32) -> bool {
        View::set_property(self, prop, value)
    }

    fn layer(&self) -> Option<LayerRef> {
        self.layer.clone()
    }

    fn set_layer(&mut self, layer: Option<LayerRef>) {
        View::set_layer(self, layer);
    }

    fn set_stack(&mut self, anchor: Option<StackAnchor>) {
        View::set_stack(self, anchor);
    }

    fn bounds(&self) -> Vec<Rect> {
        View::bounds(self)
    }

    fn motorize(&mut self, motor: Motor) {
        View::motorize(self, motor);
    }

    fn remove_motors(&mut self, kind: Option<MotorKind>) {
        View::remove_motors(self, kind);
    }

    fn destroy(&mut self) {
        View::destroy(self);
    }

    fn is_destroyed(&self) -> bool {
        self.disposed
    }

    fn events(&self) -> Rc<ViewEvents> {
        View::events(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn sized(x: f32, y: f32, w: f32, h: f32) -> View {
        View::new(ViewOptions {
            x,
            y,
            width: w,
            height: h,
            ..Default::default()
        })
    }

    #[test]
    fn test_bounds_with_two_hotspots() {
        let mut view = sized(100.0, 100.0, 30.0, 10.0);
        view.set_hotspots(vec![
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(20.0, 0.0, 10.0, 10.0),
        ]);
        assert_eq!(
            view.bounds(),
            vec![
                Rect::new(100.0, 100.0, 10.0, 10.0),
                Rect::new(120.0, 100.0, 10.0, 10.0)
            ]
        );
        assert!(Drawable::is_point_inside(&view, Vec2::new(105.0, 105.0)));
        assert!(!Drawable::is_point_inside(&view, Vec2::new(115.0, 105.0)));
        assert!(Drawable::is_point_inside(&view, Vec2::new(125.0, 101.0)));
    }

    #[test]
    fn test_bounds_without_hotspots_use_scaled_size_and_offset() {
        let mut view = sized(10.0, 20.0, 8.0, 4.0);
        view.set_scale_x(2.0);
        view.set_offset_x(-3.0);
        assert_eq!(view.bounds(), vec![Rect::new(7.0, 20.0, 16.0, 4.0)]);
    }

    #[test]
    fn test_min_hotspot_pads_symmetrically() {
        let mut view = sized(50.0, 50.0, 10.0, 10.0);
        view.set_min_hotspot(Some(30.0));
        assert_eq!(view.bounds(), vec![Rect::new(40.0, 40.0, 30.0, 30.0)]);
    }

    #[test]
    fn test_center_registration_point() {
        let view = View::new(ViewOptions {
            x: 50.0,
            y: 50.0,
            width: 20.0,
            height: 10.0,
            center_registration_point: true,
            ..Default::default()
        });
        assert_eq!(view.bounds(), vec![Rect::new(40.0, 45.0, 20.0, 10.0)]);
    }

    #[test]
    fn test_is_rect_inside_uses_overlap() {
        let view = sized(0.0, 0.0, 10.0, 10.0);
        assert!(Drawable::is_rect_inside(&view, &Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!Drawable::is_rect_inside(&view, &Rect::new(10.0, 0.0, 5.0, 5.0)));
    }

    #[test]
    fn test_dirty_monotonicity() {
        let mut view = sized(0.0, 0.0, 10.0, 10.0);
        assert!(view.is_dirty());
        view.render(&RenderContext::default());
        assert!(!view.is_dirty());
        view.set_x(0.0);
        assert!(!view.is_dirty(), "unchanged value must not dirty");
        view.set_alpha(0.5);
        assert!(view.is_dirty());
        view.render(&RenderContext::default());
        assert!(!view.is_dirty());
    }

    #[test]
    fn test_angle_and_alpha_are_normalized() {
        let mut view = sized(0.0, 0.0, 1.0, 1.0);
        view.set_angle(-90.0);
        assert_eq!(view.angle(), 270.0);
        view.set_angle(720.0);
        assert_eq!(view.angle(), 0.0);
        view.set_alpha(3.0);
        assert_eq!(view.alpha(), 1.0);
    }

    #[test]
    fn test_read_only_properties_reject_writes() {
        let mut view = sized(0.0, 0.0, 10.0, 10.0);
        assert!(!view.set_property(Property::Width, 3.0));
        assert!(view.set_property(Property::Y, 3.0));
        assert_eq!(view.property(Property::Y), 3.0);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut view = sized(0.0, 0.0, 10.0, 10.0);
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        view.events()
            .on(ViewEvent::Destroyed, move |_| f.set(f.get() + 1));
        view.destroy();
        view.destroy();
        assert_eq!(fired.get(), 1);
        assert!(view.is_disposed());
        view.set_x(40.0);
        assert_eq!(view.x(), 0.0, "destroyed views ignore mutation");
    }
}
