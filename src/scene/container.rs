//! The top-level aggregator that owns the per-frame dirty-layer pass

use std::collections::HashMap;
use std::rc::Rc;

use super::{RenderContext, ViewRef, update_view};
use crate::layer::LayerRef;

fn push_unique(list: &mut Vec<LayerRef>, layer: &LayerRef) {
    if !list.iter().any(|l| Rc::ptr_eq(l, layer)) {
        list.push(Rc::clone(layer));
    }
}

pub struct Container {
    visible: bool,
    dirty: bool,
    disposed: bool,
    views: Vec<ViewRef>,
    layers: Vec<LayerRef>,
    layer_labels: HashMap<String, LayerRef>,
    /// Layers referenced by at least one member
    used_layers: Vec<LayerRef>,
    last_cleared: Vec<String>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self {
            visible: true,
            dirty: true,
            disposed: false,
            views: Vec::new(),
            layers: Vec::new(),
            layer_labels: HashMap::new(),
            used_layers: Vec::new(),
            last_cleared: Vec::new(),
        }
    }

    pub fn add_view(&mut self, view: ViewRef) {
        if self.disposed {
            log::warn!("Ignoring view added to a destroyed container");
            return;
        }
        if self.contains(&view) {
            log::warn!("View is already a member of this container");
            return;
        }
        let used = &mut self.used_layers;
        view.borrow().for_each_layer(&mut |layer, _| push_unique(used, layer));
        self.views.push(view);
    }

    /// Remove a member; its layer is retired once no other member draws on it
    pub fn remove_view(&mut self, view: &ViewRef) -> bool {
        let Some(pos) = self.views.iter().position(|v| Rc::ptr_eq(v, view)) else {
            log::warn!("Cannot remove view: not a member of this container");
            return false;
        };
        let removed = self.views.remove(pos);

        let mut its_layers = Vec::new();
        removed
            .borrow()
            .for_each_layer(&mut |layer, _| push_unique(&mut its_layers, layer));
        // Its pixels are still on the surface
        for layer in its_layers {
            if self.uses_layer(&layer) {
                layer.borrow_mut().set_dirty(true);
            } else {
                self.used_layers.retain(|l| !Rc::ptr_eq(l, &layer));
                layer.borrow_mut().clear();
            }
        }
        true
    }

    fn uses_layer(&self, layer: &LayerRef) -> bool {
        let mut found = false;
        for view in &self.views {
            view.borrow().for_each_layer(&mut |l, _| found |= Rc::ptr_eq(l, layer));
        }
        found
    }

    pub fn contains(&self, view: &ViewRef) -> bool {
        self.views.iter().any(|v| Rc::ptr_eq(v, view))
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

    /// Bind a layer so container-wide invalidation reaches it
    pub fn add_layer(&mut self, layer: &LayerRef) {
        push_unique(&mut self.layers, layer);
    }

    pub fn set_layer_label(&mut self, label: impl Into<String>, layer: &LayerRef) {
        self.layer_labels.insert(label.into(), Rc::clone(layer));
    }

    pub fn layer(&self, label: &str) -> Option<LayerRef> {
        let layer = self.layer_labels.get(label).cloned();
        if layer.is_none() {
            log::warn!("No layer labelled '{label}'");
        }
        layer
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Names of the layers wiped by the last render pass
    pub fn last_cleared(&self) -> &[String] {
        &self.last_cleared
    }

    /// Drop members that were destroyed elsewhere; their pixels force a full redraw
    fn prune(&mut self) {
        let before = self.views.len();
        self.views.retain(|v| !v.borrow().is_destroyed());
        if self.views.len() != before {
            log::debug!("Pruned {} destroyed view(s)", before - self.views.len());
            self.dirty = true;
        }
    }

    pub fn update(&mut self) {
        if self.disposed {
            return;
        }
        self.prune();
        for view in &self.views {
            update_view(view);
        }
    }

    fn dirty_layers(&mut self) -> Vec<LayerRef> {
        let mut dirty = Vec::new();
        let all = self.dirty;

        for layer in self.layer_labels.values() {
            if all || layer.borrow().is_dirty() {
                push_unique(&mut dirty, layer);
            }
        }
        for layer in self.layers.iter().chain(&self.used_layers) {
            if all || layer.borrow().is_dirty() {
                push_unique(&mut dirty, layer);
            }
        }
        let used = &mut self.used_layers;
        for view in &self.views {
            view.borrow().for_each_layer(&mut |layer, view_dirty| {
                push_unique(used, layer);
                if view_dirty || all {
                    push_unique(&mut dirty, layer);
                }
            });
        }
        dirty
    }

    /// Clear each dirty layer once, force its members to redraw, then draw
    pub fn render(&mut self, ctx: &RenderContext) {
        if self.disposed {
            return;
        }
        self.prune();

        let cleared = self.dirty_layers();
        self.last_cleared.clear();
        for layer in &cleared {
            let mut layer = layer.borrow_mut();
            layer.clear();
            self.last_cleared.push(layer.name().to_string());
        }

        for view in &self.views {
            let mut view = view.borrow_mut();
            for layer in &cleared {
                view.invalidate_layer(layer);
            }
        }

        for view in &self.views {
            let mut view = view.borrow_mut();
            if self.visible && view.is_visible() {
                view.render(ctx);
            } else {
                view.set_dirty(false);
            }
        }
        self.dirty = false;
    }

    /// Destroy every member; safe to call more than once
    pub fn destroy(&mut self) {
        if self.disposed {
            return;
        }
        for view in self.views.drain(..) {
            view.borrow_mut().destroy();
        }
        self.layers.clear();
        self.layer_labels.clear();
        self.used_layers.clear();
        self.disposed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::renderer::{ImageResource, RecordingSurface};
    use crate::scene::{Drawable, Property, Slice, SliceOptions, ViewOptions, view_ref};

    fn layer(name: &str) -> LayerRef {
        Layer::new(name, 0, Box::new(RecordingSurface::new(64, 64))).into_ref()
    }

    fn recording(layer: &LayerRef) -> (usize, usize) {
        let layer = layer.borrow();
        let surface = layer
            .surface()
            .as_any()
            .downcast_ref::<RecordingSurface>()
            .unwrap();
        (surface.clear_count(), surface.images().len())
    }

    fn sprite(layer: &LayerRef, x: f32) -> ViewRef {
        view_ref(Slice::new(SliceOptions {
            view: ViewOptions {
                layer: Some(layer.clone()),
                x,
                ..Default::default()
            },
            image: Some(ImageResource::loaded("dot", 4.0, 4.0).into_ref()),
            ..Default::default()
        }))
    }

    #[test]
    fn test_shared_layer_is_cleared_once() {
        let bg = layer("bg");
        let mut container = Container::new();
        for x in [0.0, 10.0, 20.0] {
            container.add_view(sprite(&bg, x));
        }
        container.render(&RenderContext::default());
        assert_eq!(recording(&bg), (1, 3));
        assert_eq!(container.last_cleared(), ["bg".to_string()]);
    }

    #[test]
    fn test_clean_frame_clears_nothing() {
        let bg = layer("bg");
        let mut container = Container::new();
        container.add_view(sprite(&bg, 0.0));
        container.render(&RenderContext::default());
        container.render(&RenderContext::default());
        assert_eq!(recording(&bg), (1, 1));
        assert!(container.last_cleared().is_empty());
    }

    #[test]
    fn test_dirty_view_forces_siblings_on_its_layer() {
        let bg = layer("bg");
        let hud = layer("hud");
        let mut container = Container::new();
        let a = sprite(&bg, 0.0);
        container.add_view(a.clone());
        container.add_view(sprite(&bg, 10.0));
        container.add_view(sprite(&hud, 0.0));
        container.render(&RenderContext::default());

        a.borrow_mut().set_property(Property::X, 5.0);
        container.render(&RenderContext::default());
        assert_eq!(recording(&bg), (2, 4));
        assert_eq!(recording(&hud), (1, 1), "untouched layer is left alone");
    }

    #[test]
    fn test_dirty_layer_triggers_clear() {
        let bg = layer("bg");
        let mut container = Container::new();
        container.add_layer(&bg);
        container.set_layer_label("background", &bg);
        container.add_view(sprite(&bg, 0.0));
        container.render(&RenderContext::default());

        bg.borrow_mut().resize(32, 32);
        container.render(&RenderContext::default());
        assert_eq!(recording(&bg), (2, 2));
        assert!(container.layer("background").is_some());
        assert!(container.layer("missing").is_none());
    }

    #[test]
    fn test_remove_view_dirties_and_retires_its_layer() {
        let bg = layer("bg");
        let mut container = Container::new();
        let a = sprite(&bg, 0.0);
        container.add_view(a.clone());
        container.render(&RenderContext::default());

        assert!(container.remove_view(&a));
        assert!(!container.remove_view(&a));
        assert_eq!(recording(&bg), (2, 1));

        // Retired: a container-wide invalidation no longer reaches it
        container.set_dirty(true);
        container.render(&RenderContext::default());
        assert_eq!(recording(&bg).0, 2);
    }

    #[test]
    fn test_destroyed_members_are_pruned() {
        let bg = layer("bg");
        let mut container = Container::new();
        let a = sprite(&bg, 0.0);
        container.add_view(a.clone());
        container.add_view(sprite(&bg, 8.0));
        container.render(&RenderContext::default());

        a.borrow_mut().destroy();
        container.update();
        assert_eq!(container.len(), 1);
        container.render(&RenderContext::default());
        assert_eq!(recording(&bg), (2, 3));
    }

    #[test]
    fn test_hidden_views_are_skipped_and_cleaned() {
        let bg = layer("bg");
        let mut container = Container::new();
        let a = sprite(&bg, 0.0);
        container.add_view(a.clone());
        a.borrow_mut().set_visible(false);
        container.render(&RenderContext::default());
        assert_eq!(recording(&bg), (1, 0));
        assert!(!a.borrow().is_dirty());
        container.render(&RenderContext::default());
        assert_eq!(recording(&bg).0, 1);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let bg = layer("bg");
        let mut container = Container::new();
        let a = sprite(&bg, 0.0);
        container.add_view(a.clone());
        container.destroy();
        container.destroy();
        assert!(a.borrow().is_destroyed());
        assert!(container.is_empty());
    }
}
