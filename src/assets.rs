//! Collaborators the game loop talks to but does not implement itself:
//! asset preloading, audio and normalized pointer input

use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;

use crate::event::EventHub;
use crate::renderer::{ImageRef, ImageResource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetEvent {
    /// One more file finished loading
    Update,
    /// Everything requested so far has loaded
    Complete,
}

pub type AssetEvents = EventHub<AssetEvent>;

/// Loads images ahead of time and reports progress
pub trait Preloader {
    fn is_loaded(&self) -> bool;
    fn num_files(&self) -> usize;
    fn num_files_loaded(&self) -> usize;
    /// Handle for an image that is already available
    fn load_now(&mut self, name: &str, width: f32, height: f32) -> ImageRef;
    /// Request an image; the handle fills in once it loads
    fn load(&mut self, name: &str) -> ImageRef;
    fn events(&self) -> Rc<AssetEvents>;
}

/// Audio playback as far as the game loop is concerned
pub trait Speaker {
    fn is_ready(&self) -> bool;
    fn num_files(&self) -> usize;
    fn num_files_loaded(&self) -> usize;
    fn mute(&mut self);
    fn unmute(&mut self);
    fn is_muted(&self) -> bool;
    fn pause(&mut self);
    fn unpause(&mut self);
    fn stop(&mut self);
    fn events(&self) -> Rc<AssetEvents>;
}

/// Already-normalized pointer input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    Tap,
    Drag,
    Release,
    Cancel,
}

/// Pointer events carrying the world-space point
pub type Controller = EventHub<InputEvent, Vec2>;

/// Preloader whose images are completed by the host (or a test) calling
/// [`MemoryPreloader::finish`]
#[derive(Default)]
pub struct MemoryPreloader {
    images: HashMap<String, ImageRef>,
    events: Rc<AssetEvents>,
}

impl MemoryPreloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self, name: &str) -> Option<ImageRef> {
        let image = self.images.get(name).cloned();
        if image.is_none() {
            log::warn!("Image '{name}' was never requested");
        }
        image
    }

    /// Mark a requested image as loaded with its natural size
    pub fn finish(&mut self, name: &str, width: f32, height: f32) -> bool {
        let Some(image) = self.images.get(name) else {
            log::warn!("Cannot finish '{name}': not requested");
            return false;
        };
        if image.borrow().loaded {
            return false;
        }
        image.borrow_mut().mark_loaded(width, height);
        log::debug!(
            "Loaded '{name}' ({}/{})",
            self.num_files_loaded(),
            self.num_files()
        );
        self.events.emit(&AssetEvent::Update, &());
        if self.is_loaded() {
            self.events.emit(&AssetEvent::Complete, &());
        }
        true
    }
}

impl Preloader for MemoryPreloader {
    fn is_loaded(&self) -> bool {
        self.images.values().all(|i| i.borrow().loaded)
    }

    fn num_files(&self) -> usize {
        self.images.len()
    }

    fn num_files_loaded(&self) -> usize {
        self.images.values().filter(|i| i.borrow().loaded).count()
    }

    fn load_now(&mut self, name: &str, width: f32, height: f32) -> ImageRef {
        let image = self
            .images
            .entry(name.to_string())
            .or_insert_with(|| ImageResource::pending(name).into_ref());
        if !image.borrow().loaded {
            image.borrow_mut().mark_loaded(width, height);
        }
        Rc::clone(image)
    }

    fn load(&mut self, name: &str) -> ImageRef {
        Rc::clone(
            self.images
                .entry(name.to_string())
                .or_insert_with(|| ImageResource::pending(name).into_ref()),
        )
    }

    fn events(&self) -> Rc<AssetEvents> {
        Rc::clone(&self.events)
    }
}

/// A speaker with no audio backend; keeps mute/pause state only
#[derive(Default)]
pub struct SilentSpeaker {
    muted: bool,
    paused: bool,
    events: Rc<AssetEvents>,
}

impl SilentSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl Speaker for SilentSpeaker {
    fn is_ready(&self) -> bool {
        true
    }

    fn num_files(&self) -> usize {
        0
    }

    fn num_files_loaded(&self) -> usize {
        0
    }

    fn mute(&mut self) {
        self.muted = true;
    }

    fn unmute(&mut self) {
        self.muted = false;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn unpause(&mut self) {
        self.paused = false;
    }

    fn stop(&mut self) {
        self.paused = false;
    }

    fn events(&self) -> Rc<AssetEvents> {
        Rc::clone(&self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_preloader_progress_and_complete() {
        let mut preloader = MemoryPreloader::new();
        let completes = Rc::new(Cell::new(0));
        let c = completes.clone();
        preloader
            .events()
            .on(AssetEvent::Complete, move |_| c.set(c.get() + 1));

        let hero = preloader.load("hero");
        preloader.load_now("dot", 1.0, 1.0);
        assert!(!preloader.is_loaded());
        assert_eq!((preloader.num_files_loaded(), preloader.num_files()), (1, 2));

        assert!(preloader.finish("hero", 64.0, 32.0));
        assert!(!preloader.finish("hero", 64.0, 32.0));
        assert!(preloader.is_loaded());
        assert_eq!(hero.borrow().width, 64.0);
        assert_eq!(completes.get(), 1);
        assert!(!preloader.finish("ghost", 1.0, 1.0));
    }

    #[test]
    fn test_same_name_shares_handle() {
        let mut preloader = MemoryPreloader::new();
        let a = preloader.load("bg");
        let b = preloader.load_now("bg", 8.0, 8.0);
        assert!(Rc::ptr_eq(&a, &b));
        assert!(a.borrow().loaded);
    }
}
