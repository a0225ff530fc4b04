//! Slices: image-backed nodes with sprite-sheet frame animation
//!
//! Frames are laid out row-major on the sheet. A playing slice counts update
//! steps and advances one frame once the count reaches the frame's delay; the
//! last frame either wraps (looping) or completes the animation.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::view::{View, ViewOptions};
use super::{
    Drawable, Notification, Property, RenderContext, StackAnchor, ViewEvent, ViewEvents,
};
use crate::geom::Rect;
use crate::layer::LayerRef;
use crate::motor::{Motor, MotorKind};
use crate::renderer::{Color, CompositeOp, ImageRef};

/// How a slice behaves when it reaches its last frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Loop {
    /// Play once, then stop and complete
    #[default]
    Once,
    /// Wrap forever
    Forever,
    /// Play this many full cycles, then complete
    Times(u32),
}

impl From<bool> for Loop {
    fn from(looping: bool) -> Self {
        if looping { Loop::Forever } else { Loop::Once }
    }
}

/// One-shot completion callback
pub type CompleteCallback = Box<dyn FnOnce()>;

#[derive(Clone)]
pub struct SliceOptions {
    pub view: ViewOptions,
    pub name: Option<String>,
    pub image: Option<ImageRef>,
    pub number_of_frames: u32,
    pub number_of_rows: Option<u32>,
    pub number_of_columns: Option<u32>,
    /// Update steps each frame stays on screen
    pub frame_delay: u32,
    /// Per-frame overrides of `frame_delay`
    pub variable_frame_delay: HashMap<usize, u32>,
    pub looping: Loop,
    pub auto_play: bool,
    pub reset_on_complete: bool,
    pub crop_width: Option<f32>,
    pub crop_height: Option<f32>,
    pub frame_offset_x: f32,
    pub frame_offset_y: f32,
    pub mirror_x: bool,
    pub mirror_y: bool,
    pub colorize: Option<Color>,
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            view: ViewOptions::default(),
            name: None,
            image: None,
            number_of_frames: 1,
            number_of_rows: None,
            number_of_columns: None,
            frame_delay: 1,
            variable_frame_delay: HashMap::new(),
            looping: Loop::Once,
            auto_play: false,
            reset_on_complete: false,
            crop_width: None,
            crop_height: None,
            frame_offset_x: 0.0,
            frame_offset_y: 0.0,
            mirror_x: false,
            mirror_y: false,
            colorize: None,
        }
    }
}

pub struct Slice {
    view: View,
    name: String,
    image: Option<ImageRef>,
    number_of_frames: usize,
    number_of_rows: usize,
    number_of_columns: usize,
    frame_delay: u32,
    variable_frame_delay: HashMap<usize, u32>,
    looping: Loop,
    auto_play: bool,
    reset_on_complete: bool,
    crop_width: Option<f32>,
    crop_height: Option<f32>,
    frame_offset_x: f32,
    frame_offset_y: f32,
    mirror_x: bool,
    mirror_y: bool,
    colorize: Option<Color>,
    cur_frame_index: usize,
    row_index: usize,
    col_index: usize,
    frame_cnt: u32,
    loop_index: u32,
    paused: bool,
    on_complete: Option<CompleteCallback>,
    notifications: Vec<Notification>,
}

impl Slice {
    pub fn new(options: SliceOptions) -> Self {
        let frames = options.number_of_frames.max(1) as usize;
        let (rows, columns) = match (options.number_of_rows, options.number_of_columns) {
            (_, Some(cols)) if cols > 0 => {
                let cols = cols as usize;
                (frames.div_ceil(cols), cols)
            }
            (Some(rows), _) if rows > 0 => {
                let rows = rows as usize;
                (rows, frames.div_ceil(rows))
            }
            _ => (1, frames),
        };
        if options.image.is_none() {
            log::warn!(
                "Slice '{}' has no image resource and will not draw",
                options.name.as_deref().unwrap_or("unnamed")
            );
        }

        let mut slice = Self {
            view: View::new(options.view),
            name: options.name.unwrap_or_default(),
            image: options.image,
            number_of_frames: frames,
            number_of_rows: rows,
            number_of_columns: columns,
            frame_delay: options.frame_delay,
            variable_frame_delay: options.variable_frame_delay,
            looping: options.looping,
            auto_play: options.auto_play,
            reset_on_complete: options.reset_on_complete,
            crop_width: options.crop_width,
            crop_height: options.crop_height,
            frame_offset_x: options.frame_offset_x,
            frame_offset_y: options.frame_offset_y,
            mirror_x: options.mirror_x,
            mirror_y: options.mirror_y,
            colorize: options.colorize,
            cur_frame_index: 0,
            row_index: 0,
            col_index: 0,
            frame_cnt: 0,
            loop_index: 0,
            paused: true,
            on_complete: None,
            notifications: Vec::new(),
        };
        slice.sync_frame_size();
        if slice.auto_play {
            slice.play(None);
        }
        slice
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut View {
        &mut self.view
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    fn image_size(&self) -> Option<(f32, f32)> {
        let image = self.image.as_ref()?.borrow();
        image.loaded.then_some((image.width, image.height))
    }

    /// Size of one frame cell on the sheet (zero until the image loads)
    pub fn frame_width(&self) -> f32 {
        self.image_size()
            .map_or(0.0, |(w, _)| w / self.number_of_columns as f32)
    }

    pub fn frame_height(&self) -> f32 {
        self.image_size()
            .map_or(0.0, |(_, h)| h / self.number_of_rows as f32)
    }

    pub fn crop_width(&self) -> f32 {
        self.crop_width.unwrap_or_else(|| self.frame_width())
    }

    pub fn crop_height(&self) -> f32 {
        self.crop_height.unwrap_or_else(|| self.frame_height())
    }

    pub fn set_crop_width(&mut self, width: Option<f32>) {
        if self.view.is_disposed() {
            return;
        }
        if self.crop_width != width {
            self.crop_width = width;
            self.sync_frame_size();
            self.view.set_dirty(true);
        }
    }

    pub fn set_crop_height(&mut self, height: Option<f32>) {
        if self.view.is_disposed() {
            return;
        }
        if self.crop_height != height {
            self.crop_height = height;
            self.sync_frame_size();
            self.view.set_dirty(true);
        }
    }

    pub fn frame_offset(&self) -> (f32, f32) {
        (self.frame_offset_x, self.frame_offset_y)
    }

    pub fn set_frame_offset(&mut self, x: f32, y: f32) {
        if self.view.is_disposed() {
            return;
        }
        if (self.frame_offset_x, self.frame_offset_y) != (x, y) {
            self.frame_offset_x = x;
            self.frame_offset_y = y;
            self.view.set_dirty(true);
        }
    }

    pub fn mirror_x(&self) -> bool {
        self.mirror_x
    }

    pub fn mirror_y(&self) -> bool {
        self.mirror_y
    }

    pub fn set_mirror_x(&mut self, mirror: bool) {
        if self.view.is_disposed() {
            return;
        }
        if self.mirror_x != mirror {
            self.mirror_x = mirror;
            self.view.set_dirty(true);
        }
    }

    pub fn set_mirror_y(&mut self, mirror: bool) {
        if self.view.is_disposed() {
            return;
        }
        if self.mirror_y != mirror {
            self.mirror_y = mirror;
            self.view.set_dirty(true);
        }
    }

    pub fn colorize(&self) -> Option<Color> {
        self.colorize
    }

    pub fn set_colorize(&mut self, color: Option<Color>) {
        if self.view.is_disposed() {
            return;
        }
        if self.colorize != color {
            self.colorize = color;
            self.view.set_dirty(true);
        }
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    pub fn looping(&self) -> Loop {
        self.looping
    }

    pub fn set_looping(&mut self, looping: Loop) {
        self.looping = looping;
    }

    pub fn number_of_frames(&self) -> usize {
        self.number_of_frames
    }

    pub fn number_of_rows(&self) -> usize {
        self.number_of_rows
    }

    pub fn number_of_columns(&self) -> usize {
        self.number_of_columns
    }

    pub fn cur_frame_index(&self) -> usize {
        self.cur_frame_index
    }

    pub fn row_index(&self) -> usize {
        self.row_index
    }

    pub fn col_index(&self) -> usize {
        self.col_index
    }

    pub fn frame_cnt(&self) -> u32 {
        self.frame_cnt
    }

    pub fn loop_index(&self) -> u32 {
        self.loop_index
    }

    pub fn is_playing(&self) -> bool {
        !self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    fn is_last_frame(&self) -> bool {
        self.cur_frame_index + 1 >= self.number_of_frames
    }

    fn delay_for(&self, frame: usize) -> u32 {
        self.variable_frame_delay
            .get(&frame)
            .copied()
            .unwrap_or(self.frame_delay)
    }

    /// Keep the view's local size in step with the crop/frame geometry
    fn sync_frame_size(&mut self) {
        let (width, height) = (self.crop_width(), self.crop_height());
        self.view.set_local_size(width, height);
    }

    fn set_frame(&mut self, index: usize) {
        self.row_index = index / self.number_of_columns;
        self.col_index = index % self.number_of_columns;
        if index != self.cur_frame_index {
            self.cur_frame_index = index;
            self.view.set_dirty(true);
        }
    }

    /// Start or resume playback; `callback` runs once when the animation completes
    pub fn play(&mut self, callback: Option<CompleteCallback>) {
        if self.view.is_disposed() {
            return;
        }
        if self.is_last_frame() {
            self.stop();
            self.reset();
        }
        self.paused = false;
        self.on_complete = callback;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Pause and drop any partial progress on the current frame
    pub fn stop(&mut self) {
        self.paused = true;
        self.frame_cnt = 0;
    }

    /// Back to the first frame and the first loop
    pub fn reset(&mut self) {
        self.frame_cnt = 0;
        self.loop_index = 0;
        self.set_frame(0);
    }

    /// Jump to `index`; the fractional part pre-fills the frame delay counter
    pub fn goto_frame(&mut self, index: f32) {
        if self.view.is_disposed() {
            return;
        }
        let last = (self.number_of_frames - 1) as f32;
        let clamped = if index.is_nan() { 0.0 } else { index.clamp(0.0, last) };
        let frame = clamped.floor();
        self.frame_cnt = ((clamped - frame) * self.frame_delay as f32).round() as u32;
        self.set_frame(frame as usize);
    }

    fn finish_cycle(&mut self) {
        self.loop_index = self.loop_index.saturating_add(1);
        let again = match self.looping {
            Loop::Forever => true,
            Loop::Times(count) => self.loop_index < count,
            Loop::Once => false,
        };
        if again {
            self.set_frame(0);
            return;
        }

        if self.reset_on_complete {
            self.set_frame(0);
        }
        self.paused = true;
        // Listeners hear the event before the one-shot callback runs
        let events = self.view.events();
        let callback = self.on_complete.take();
        self.notifications.push(Box::new(move || {
            events.emit(&ViewEvent::Complete, &());
            if let Some(callback) = callback {
                callback();
            }
        }));
    }

    fn source_rect(&self) -> Rect {
        let frame_w = self.frame_width();
        let frame_h = self.frame_height();
        Rect::new(
            self.col_index as f32 * frame_w + self.frame_offset_x,
            self.row_index as f32 * frame_h + self.frame_offset_y,
            self.crop_width().min(frame_w - self.frame_offset_x).max(0.0),
            self.crop_height().min(frame_h - self.frame_offset_y).max(0.0),
        )
    }

    fn should_draw(&self) -> bool {
        let v = &self.view;
        v.is_dirty()
            && v.visible()
            && v.alpha() != 0.0
            && self.crop_width() != 0.0
            && self.crop_height() != 0.0
            && v.scale_x() != 0.0
            && v.scale_y() != 0.0
            && self.image_size().is_some()
            && v.layer().is_some()
    }

    fn draw(&self, ctx: &RenderContext) {
        let (Some(layer), Some(image)) = (self.view.layer(), self.image.as_ref()) else {
            return;
        };
        let image = image.borrow();
        let Ok(mut layer) = layer.try_borrow_mut() else {
            log::warn!("Layer busy; skipping draw of slice '{}'", self.name);
            return;
        };
        let src = self.source_rect();
        if src.is_empty() {
            return;
        }

        let v = &self.view;
        let scale = layer.scale();
        let pivot_x = (v.world_x() - ctx.camera.offset_x) / scale;
        let pivot_y = (v.world_y() - ctx.camera.offset_y) / scale;
        let dst = Rect::new(
            (v.world_x() + v.draw_offset_x() - ctx.camera.offset_x) / scale,
            (v.world_y() + v.draw_offset_y() - ctx.camera.offset_y) / scale,
            src.width * v.scale_x() / scale,
            src.height * v.scale_y() / scale,
        );

        let surface = layer.surface_mut();
        surface.save();
        surface.set_alpha(v.alpha());
        if v.angle() != 0.0 {
            surface.translate(pivot_x, pivot_y);
            surface.rotate(v.angle().to_radians());
            surface.translate(-pivot_x, -pivot_y);
        }
        if self.mirror_x || self.mirror_y {
            surface.translate(pivot_x, pivot_y);
            surface.scale(
                if self.mirror_x { -1.0 } else { 1.0 },
                if self.mirror_y { -1.0 } else { 1.0 },
            );
            surface.translate(-pivot_x, -pivot_y);
        }
        match self.colorize {
            Some(color) => {
                let local = Rect::new(0.0, 0.0, src.width, src.height);
                let mut buffer =
                    surface.create_buffer(src.width.ceil() as u32, src.height.ceil() as u32);
                buffer.draw_image(&image, src, local);
                buffer.set_composite(CompositeOp::SourceIn);
                buffer.fill_rect(local, color);
                surface.draw_buffer(buffer.as_ref(), local, dst);
            }
            None => surface.draw_image(&image, src, dst),
        }
        surface.restore();
    }
}

impl Drawable for Slice {
    fn update(&mut self) {
        if self.view.is_disposed() {
            return;
        }
        self.sync_frame_size();
        if self.paused {
            return;
        }
        self.frame_cnt += 1;
        if self.frame_cnt >= self.delay_for(self.cur_frame_index) {
            self.frame_cnt = 0;
            if self.is_last_frame() {
                self.finish_cycle();
            } else {
                self.set_frame(self.cur_frame_index + 1);
            }
        }
    }

    fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn render(&mut self, ctx: &RenderContext) {
        if self.view.is_disposed() {
            return;
        }
        self.sync_frame_size();
        if self.should_draw() {
            self.draw(ctx);
            self.view.render_debug(ctx);
        }
        self.view.set_dirty(false);
    }

    fn is_dirty(&self) -> bool {
        self.view.is_dirty()
    }

    fn set_dirty(&mut self, dirty: bool) {
        self.view.set_dirty(dirty);
    }

    fn is_visible(&self) -> bool {
        self.view.visible()
    }

    fn set_visible(&mut self, visible: bool) {
        self.view.set_visible(visible);
    }

    fn property(&self, prop: Property) -> Option<f32> {
        Some(self.view.property(prop))
    }

    fn set_property(&mut self, prop: Property, value: f32) -> bool {
        self.view.set_property(prop, value)
    }

    fn layer(&self) -> Option<LayerRef> {
        self.view.layer().cloned()
    }

    fn set_layer(&mut self, layer: Option<LayerRef>) {
        self.view.set_layer(layer);
    }

    fn set_stack(&mut self, anchor: Option<StackAnchor>) {
        self.view.set_stack(anchor);
    }

    fn bounds(&self) -> Vec<Rect> {
        self.view.bounds()
    }

    fn motorize(&mut self, motor: Motor) {
        self.view.motorize(motor);
    }

    fn remove_motors(&mut self, kind: Option<MotorKind>) {
        self.view.remove_motors(kind);
    }

    fn destroy(&mut self) {
        self.on_complete = None;
        self.notifications.clear();
        self.paused = true;
        self.view.destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.view.is_disposed()
    }

    fn events(&self) -> Rc<ViewEvents> {
        self.view.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::renderer::{DrawOp, ImageResource, RecordingSurface};
    use proptest::prelude::*;
    use std::cell::Cell;

    fn sheet(frames: u32, delay: u32, looping: Loop) -> Slice {
        Slice::new(SliceOptions {
            image: Some(ImageResource::loaded("sheet", 40.0 * frames as f32, 30.0).into_ref()),
            number_of_frames: frames,
            frame_delay: delay,
            looping,
            auto_play: true,
            ..Default::default()
        })
    }

    /// One update step plus delivery of whatever it queued
    fn tick(slice: &mut Slice) {
        slice.update();
        for notify in slice.take_notifications() {
            notify();
        }
    }

    fn count_events(slice: &Slice, event: ViewEvent) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        slice.events().on(event, move |_| c.set(c.get() + 1));
        count
    }

    fn layer() -> LayerRef {
        Layer::new("actors", 0, Box::new(RecordingSurface::new(320, 240))).into_ref()
    }

    fn ops(layer: &LayerRef) -> Vec<DrawOp> {
        layer
            .borrow()
            .surface()
            .as_any()
            .downcast_ref::<RecordingSurface>()
            .unwrap()
            .ops()
            .to_vec()
    }

    #[test]
    fn test_four_frame_sheet_plays_once() {
        let mut slice = sheet(4, 2, Loop::Once);
        let completes = count_events(&slice, ViewEvent::Complete);
        let mut frames = Vec::new();
        for _ in 0..8 {
            tick(&mut slice);
            frames.push(slice.cur_frame_index());
        }
        assert_eq!(frames, vec![0, 1, 1, 2, 2, 3, 3, 3]);
        assert!(slice.is_paused());
        assert_eq!(completes.get(), 1);

        for _ in 0..10 {
            tick(&mut slice);
        }
        assert_eq!(slice.cur_frame_index(), 3);
        assert_eq!(completes.get(), 1);
    }

    #[test]
    fn test_looping_slice_wraps_to_first_frame() {
        let mut slice = sheet(4, 3, Loop::Forever);
        for _ in 0..(4 * 3) {
            tick(&mut slice);
        }
        assert_eq!(slice.cur_frame_index(), 0);
        assert!(slice.is_playing());
    }

    #[test]
    fn test_loop_count_terminates_after_k_cycles() {
        let mut slice = sheet(4, 1, Loop::Times(3));
        let completes = count_events(&slice, ViewEvent::Complete);
        for _ in 0..(3 * 4 - 1) {
            tick(&mut slice);
        }
        assert!(slice.is_playing());
        tick(&mut slice);
        assert!(slice.is_paused());
        assert_eq!(completes.get(), 1);
        assert_eq!(slice.loop_index(), 3);
    }

    #[test]
    fn test_reset_on_complete_returns_to_first_frame() {
        let mut slice = Slice::new(SliceOptions {
            image: Some(ImageResource::loaded("s", 80.0, 20.0).into_ref()),
            number_of_frames: 2,
            auto_play: true,
            reset_on_complete: true,
            ..Default::default()
        });
        tick(&mut slice);
        assert_eq!(slice.cur_frame_index(), 1);
        tick(&mut slice);
        assert_eq!(slice.cur_frame_index(), 0);
        assert!(slice.is_paused());
    }

    #[test]
    fn test_complete_event_fires_before_callback() {
        let mut slice = sheet(2, 1, Loop::Once);
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let o = order.clone();
        slice.events().on(ViewEvent::Complete, move |_| o.borrow_mut().push("event"));
        let o = order.clone();
        slice.play(Some(Box::new(move || o.borrow_mut().push("callback"))));
        tick(&mut slice);
        tick(&mut slice);
        assert_eq!(*order.borrow(), vec!["event", "callback"]);

        // The callback is one-shot
        slice.play(None);
        tick(&mut slice);
        tick(&mut slice);
        assert_eq!(*order.borrow(), vec!["event", "callback", "event"]);
    }

    #[test]
    fn test_play_on_last_frame_restarts() {
        let mut slice = sheet(3, 1, Loop::Once);
        for _ in 0..3 {
            tick(&mut slice);
        }
        assert_eq!(slice.cur_frame_index(), 2);
        assert!(slice.is_paused());
        slice.play(None);
        assert_eq!(slice.cur_frame_index(), 0);
        assert!(slice.is_playing());
    }

    #[test]
    fn test_paused_slice_does_not_advance() {
        let mut slice = sheet(4, 1, Loop::Forever);
        slice.pause();
        for _ in 0..5 {
            tick(&mut slice);
        }
        assert_eq!(slice.cur_frame_index(), 0);
    }

    #[test]
    fn test_variable_frame_delay() {
        let mut delays = HashMap::new();
        delays.insert(0, 3);
        let mut slice = Slice::new(SliceOptions {
            image: Some(ImageResource::loaded("s", 40.0, 10.0).into_ref()),
            number_of_frames: 4,
            frame_delay: 1,
            variable_frame_delay: delays,
            auto_play: true,
            ..Default::default()
        });
        tick(&mut slice);
        tick(&mut slice);
        assert_eq!(slice.cur_frame_index(), 0);
        tick(&mut slice);
        assert_eq!(slice.cur_frame_index(), 1);
        tick(&mut slice);
        assert_eq!(slice.cur_frame_index(), 2);
    }

    #[test]
    fn test_goto_frame_clamps_and_uses_fraction() {
        let mut slice = Slice::new(SliceOptions {
            image: Some(ImageResource::loaded("grid", 40.0, 40.0).into_ref()),
            number_of_frames: 4,
            number_of_columns: Some(2),
            frame_delay: 4,
            ..Default::default()
        });
        slice.render(&RenderContext::default());
        slice.goto_frame(2.5);
        assert_eq!(slice.cur_frame_index(), 2);
        assert_eq!((slice.row_index(), slice.col_index()), (1, 0));
        assert_eq!(slice.frame_cnt(), 2);
        assert!(slice.is_dirty());

        slice.goto_frame(99.0);
        assert_eq!(slice.cur_frame_index(), 3);
        slice.goto_frame(-4.0);
        assert_eq!(slice.cur_frame_index(), 0);
    }

    #[test]
    fn test_frame_geometry_from_rows() {
        let slice = Slice::new(SliceOptions {
            image: Some(ImageResource::loaded("grid", 90.0, 60.0).into_ref()),
            number_of_frames: 5,
            number_of_rows: Some(2),
            ..Default::default()
        });
        assert_eq!(slice.number_of_columns(), 3);
        assert_eq!(slice.frame_width(), 30.0);
        assert_eq!(slice.frame_height(), 30.0);
        assert_eq!(slice.view().width(), 30.0);
    }

    #[test]
    fn test_render_draws_current_frame_and_clears_dirty() {
        let layer = layer();
        let mut slice = Slice::new(SliceOptions {
            view: ViewOptions {
                layer: Some(layer.clone()),
                x: 10.0,
                y: 20.0,
                ..Default::default()
            },
            image: Some(ImageResource::loaded("run", 120.0, 30.0).into_ref()),
            number_of_frames: 4,
            ..Default::default()
        });
        slice.goto_frame(2.0);
        slice.render(&RenderContext::default());
        assert!(!slice.is_dirty());
        assert_eq!(
            ops(&layer),
            vec![
                DrawOp::Save,
                DrawOp::Alpha(1.0),
                DrawOp::Image {
                    name: "run".into(),
                    src: Rect::new(60.0, 0.0, 30.0, 30.0),
                    dst: Rect::new(10.0, 20.0, 30.0, 30.0),
                },
                DrawOp::Restore,
            ]
        );

        // Clean slices draw nothing
        slice.render(&RenderContext::default());
        assert_eq!(ops(&layer).len(), 4);
    }

    #[test]
    fn test_render_composition_order() {
        let layer = layer();
        let mut slice = Slice::new(SliceOptions {
            view: ViewOptions {
                layer: Some(layer.clone()),
                x: 50.0,
                y: 40.0,
                angle: 90.0,
                alpha: 0.5,
                ..Default::default()
            },
            image: Some(ImageResource::loaded("hero", 16.0, 16.0).into_ref()),
            mirror_x: true,
            colorize: Some(Color::rgb(1.0, 0.0, 0.0)),
            ..Default::default()
        });
        let ctx = RenderContext {
            camera: crate::scene::Camera {
                offset_x: 10.0,
                ..Default::default()
            },
            debug: false,
        };
        slice.render(&ctx);
        let ops = ops(&layer);
        assert_eq!(ops[0], DrawOp::Save);
        assert_eq!(ops[1], DrawOp::Alpha(0.5));
        assert_eq!(ops[2], DrawOp::Translate(40.0, 40.0));
        assert_eq!(ops[3], DrawOp::Rotate(90f32.to_radians()));
        assert_eq!(ops[5], DrawOp::Translate(40.0, 40.0));
        assert_eq!(ops[6], DrawOp::Scale(-1.0, 1.0));
        assert!(matches!(
            ops[8],
            DrawOp::Buffer { ops: 3, dst, .. } if dst == Rect::new(40.0, 40.0, 16.0, 16.0)
        ));
        assert_eq!(ops[9], DrawOp::Restore);
    }

    #[test]
    fn test_source_rect_is_clamped_to_frame() {
        let layer = layer();
        let mut slice = Slice::new(SliceOptions {
            view: ViewOptions {
                layer: Some(layer.clone()),
                ..Default::default()
            },
            image: Some(ImageResource::loaded("s", 20.0, 20.0).into_ref()),
            crop_width: Some(50.0),
            frame_offset_x: 5.0,
            ..Default::default()
        });
        slice.render(&RenderContext::default());
        let images = ops(&layer);
        assert!(images.iter().any(|op| matches!(
            op,
            DrawOp::Image { src, .. } if *src == Rect::new(5.0, 0.0, 15.0, 20.0)
        )));
    }

    #[test]
    fn test_invisible_or_zero_area_render_is_noop_but_cleans() {
        let layer = layer();
        let mut slice = Slice::new(SliceOptions {
            view: ViewOptions {
                layer: Some(layer.clone()),
                alpha: 0.0,
                ..Default::default()
            },
            image: Some(ImageResource::loaded("s", 20.0, 20.0).into_ref()),
            ..Default::default()
        });
        slice.render(&RenderContext::default());
        assert!(!slice.is_dirty());
        slice.set_property(Property::Alpha, 1.0);
        slice.set_property(Property::ScaleX, 0.0);
        slice.render(&RenderContext::default());
        assert!(!slice.is_dirty());
        assert!(ops(&layer).is_empty());
    }

    #[test]
    fn test_unloaded_image_draws_once_loaded() {
        let layer = layer();
        let image = ImageResource::pending("late").into_ref();
        let mut slice = Slice::new(SliceOptions {
            view: ViewOptions {
                layer: Some(layer.clone()),
                ..Default::default()
            },
            image: Some(image.clone()),
            ..Default::default()
        });
        slice.render(&RenderContext::default());
        assert!(ops(&layer).is_empty());
        image.borrow_mut().mark_loaded(8.0, 8.0);
        tick(&mut slice);
        assert!(slice.is_dirty(), "size change after load re-dirties the slice");
        slice.render(&RenderContext::default());
        assert_eq!(ops(&layer).len(), 4);
    }

    #[test]
    fn test_debug_render_outlines_bounds() {
        let layer = layer();
        let mut slice = Slice::new(SliceOptions {
            view: ViewOptions {
                layer: Some(layer.clone()),
                ..Default::default()
            },
            image: Some(ImageResource::loaded("s", 8.0, 8.0).into_ref()),
            ..Default::default()
        });
        slice.render(&RenderContext {
            debug: true,
            ..Default::default()
        });
        assert!(matches!(ops(&layer).last(), Some(DrawOp::StrokeRect(..))));
    }

    #[test]
    fn test_destroyed_slice_ignores_visual_setters() {
        let mut slice = sheet(4, 1, Loop::Once);
        slice.destroy();
        slice.set_crop_width(Some(5.0));
        slice.set_crop_height(Some(5.0));
        slice.set_frame_offset(3.0, 4.0);
        slice.set_mirror_x(true);
        slice.set_mirror_y(true);
        slice.set_colorize(Some(Color::BLACK));
        assert_eq!(slice.crop_width(), 40.0);
        assert_eq!(slice.crop_height(), 30.0);
        assert_eq!(slice.frame_offset(), (0.0, 0.0));
        assert!(!slice.mirror_x() && !slice.mirror_y());
        assert_eq!(slice.colorize(), None);
    }

    #[test]
    fn test_completion_waits_for_delivery() {
        let mut slice = sheet(1, 1, Loop::Once);
        let completes = count_events(&slice, ViewEvent::Complete);
        slice.update();
        assert!(slice.is_paused());
        assert_eq!(completes.get(), 0);
        let pending = slice.take_notifications();
        assert_eq!(pending.len(), 1);
        for notify in pending {
            notify();
        }
        assert_eq!(completes.get(), 1);
        assert!(slice.take_notifications().is_empty());
    }

    proptest! {
        #[test]
        fn prop_row_col_follow_frame_index(
            frames in 1u32..40,
            cols in 1u32..8,
            target in 0.0f32..60.0,
        ) {
            let mut slice = Slice::new(SliceOptions {
                image: Some(ImageResource::loaded("g", 64.0, 64.0).into_ref()),
                number_of_frames: frames,
                number_of_columns: Some(cols),
                ..Default::default()
            });
            slice.goto_frame(target);
            let cur = slice.cur_frame_index();
            prop_assert!(cur < frames as usize);
            prop_assert_eq!(slice.row_index(), cur / cols as usize);
            prop_assert_eq!(slice.col_index(), cur % cols as usize);
        }
    }
}
