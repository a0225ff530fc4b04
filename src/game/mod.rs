//! The game loop
//!
//! Turns variable-rate host frames into fixed simulation steps. Each frame's
//! elapsed time goes into an accumulator that is clamped to a maximum backlog
//! and drained one fixed step at a time; after draining, the scene is
//! rendered exactly once.
//!
//! Lifecycle: `Loading → Ready → Running ⇄ Paused → Destroyed`.

pub mod clock;

pub use clock::{Clock, ClockEvent, ClockState};

use std::cell::RefCell;
use std::rc::Rc;

use crate::assets::{Preloader, Speaker};
use crate::config::GameConfig;
use crate::error::EngineResult;
use crate::event::EventHub;
use crate::layer::{LayerRef, LayerSet};
use crate::renderer::{Color, SurfaceFactory};
use crate::scene::{Camera, Container, RenderContext};

/// Key of the fixed-step hub motors subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step;

/// Fixed-step hub; the payload is the running step count
pub type StepHub = EventHub<Step, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Loading,
    Ready,
    Running,
    Paused,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameEvent {
    Ready,
    Paused,
    Unpaused,
    Destroyed,
}

pub type GameEvents = EventHub<GameEvent>;

/// The game-specific code the loop drives
pub trait GameApp {
    /// Called once all collaborators report ready
    fn loaded(&mut self) {}
    /// One fixed simulation step
    fn update(&mut self);
    /// Draw the current state; called once per host frame
    fn render(&mut self, ctx: &RenderContext);
    fn destroy(&mut self) {}
}

impl GameApp for Container {
    fn update(&mut self) {
        Container::update(self);
    }

    fn render(&mut self, ctx: &RenderContext) {
        Container::render(self, ctx);
    }

    fn destroy(&mut self) {
        Container::destroy(self);
    }
}

/// Lets the host keep a handle to an app it gave to the game
impl<T: GameApp> GameApp for Rc<RefCell<T>> {
    fn loaded(&mut self) {
        self.borrow_mut().loaded();
    }

    fn update(&mut self) {
        self.borrow_mut().update();
    }

    fn render(&mut self, ctx: &RenderContext) {
        self.borrow_mut().render(ctx);
    }

    fn destroy(&mut self) {
        self.borrow_mut().destroy();
    }
}

/// What one host frame did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub steps: u32,
    pub rendered: bool,
    /// Simulation time discarded by the backlog clamp
    pub dropped_ms: f64,
}

/// Handle returned by [`Game::add_ticker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickerId(u64);

const FPS_WINDOW: usize = 60;
const DEBUG_LAYER: &str = "debug";

pub struct Game {
    config: GameConfig,
    state: GameState,
    clock: Clock,
    steps: Rc<StepHub>,
    step_count: u64,
    events: Rc<GameEvents>,
    tickers: Vec<(TickerId, Box<dyn FnMut()>)>,
    next_ticker: u64,
    factory: Box<dyn SurfaceFactory>,
    layers: LayerSet,
    camera: Camera,
    remaining_update: f64,
    last_update_time: Option<f64>,
    preloader: Option<Box<dyn Preloader>>,
    speaker: Option<Box<dyn Speaker>>,
    app: Option<Box<dyn GameApp>>,
    was_muted: bool,
    // FPS tracking
    frame_times: [f64; FPS_WINDOW],
    frame_index: usize,
    fps: u32,
}

impl Game {
    /// Create the game and the layers listed in `config`; the clock starts stopped
    pub fn new(config: GameConfig, factory: Box<dyn SurfaceFactory>) -> EngineResult<Self> {
        config.validate()?;
        let mut game = Self {
            camera: Camera {
                width: config.width as f32,
                height: config.height as f32,
                ..config.camera
            },
            config,
            state: GameState::Loading,
            clock: Clock::new(),
            steps: Rc::new(StepHub::new()),
            step_count: 0,
            events: Rc::new(GameEvents::new()),
            tickers: Vec::new(),
            next_ticker: 1,
            factory,
            layers: LayerSet::new(),
            remaining_update: 0.0,
            last_update_time: None,
            preloader: None,
            speaker: None,
            app: None,
            was_muted: false,
            frame_times: [0.0; FPS_WINDOW],
            frame_index: 0,
            fps: 0,
        };
        for layer in game.config.layers.clone() {
            game.create_layer(&layer.name, layer.z_index);
        }
        if game.config.debug {
            game.create_layer(DEBUG_LAYER, i32::MAX);
        }
        log::info!(
            "Game created ({}x{}, {} layers)",
            game.config.width,
            game.config.height,
            game.layers.len()
        );
        Ok(game)
    }

    pub fn set_app(&mut self, app: Box<dyn GameApp>) {
        self.app = Some(app);
    }

    pub fn set_preloader(&mut self, preloader: Box<dyn Preloader>) {
        self.preloader = Some(preloader);
    }

    pub fn set_speaker(&mut self, speaker: Box<dyn Speaker>) {
        self.speaker = Some(speaker);
    }

    pub fn preloader_mut(&mut self) -> Option<&mut (dyn Preloader + 'static)> {
        self.preloader.as_deref_mut()
    }

    pub fn speaker(&self) -> Option<&(dyn Speaker + 'static)> {
        self.speaker.as_deref()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == GameState::Paused
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Hub emitted once per fixed step, after the tickers ran
    pub fn ticks(&self) -> Rc<StepHub> {
        Rc::clone(&self.steps)
    }

    pub fn events(&self) -> Rc<GameEvents> {
        Rc::clone(&self.events)
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Fraction of preloader and speaker files loaded so far
    pub fn load_progress(&self) -> f32 {
        let (mut total, mut done) = (0, 0);
        if let Some(p) = &self.preloader {
            total += p.num_files();
            done += p.num_files_loaded();
        }
        if let Some(s) = &self.speaker {
            total += s.num_files();
            done += s.num_files_loaded();
        }
        if total == 0 {
            1.0
        } else {
            done as f32 / total as f32
        }
    }

    pub fn start(&mut self) {
        if self.state == GameState::Destroyed {
            log::warn!("Cannot start a destroyed game");
            return;
        }
        self.clock.start();
        log::info!("Game clock started");
    }

    pub fn create_layer(&mut self, name: &str, z_index: i32) -> LayerRef {
        let layer = self.layers.create(
            self.factory.as_ref(),
            name,
            z_index,
            self.config.width,
            self.config.height,
        );
        layer.borrow_mut().set_scale(self.config.scale);
        layer
    }

    pub fn get_layer(&self, name: &str) -> Option<LayerRef> {
        self.layers.get(name)
    }

    pub fn remove_layer(&mut self, name: &str) -> bool {
        self.layers.remove(self.factory.as_ref(), name)
    }

    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("Ignoring resize to {width}x{height}");
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.camera.width = width as f32;
        self.camera.height = height as f32;
        self.layers.resize_all(width, height);
        log::debug!("Game resized to {width}x{height}");
    }

    /// Run `ticker` at the start of every fixed step
    pub fn add_ticker(&mut self, ticker: impl FnMut() + 'static) -> TickerId {
        let id = TickerId(self.next_ticker);
        self.next_ticker += 1;
        self.tickers.push((id, Box::new(ticker)));
        id
    }

    pub fn remove_ticker(&mut self, id: TickerId) -> bool {
        let before = self.tickers.len();
        self.tickers.retain(|(t, _)| *t != id);
        self.tickers.len() != before
    }

    fn collaborators_ready(&self) -> bool {
        self.preloader.as_ref().is_none_or(|p| p.is_loaded())
            && self.speaker.as_ref().is_none_or(|s| s.is_ready())
    }

    /// Feed one host frame at `now_ms`
    pub fn frame(&mut self, now_ms: f64) -> FrameReport {
        let mut report = FrameReport::default();
        if self.state == GameState::Destroyed || !self.clock.frame(now_ms) {
            return report;
        }

        match self.state {
            GameState::Loading => {
                if self.collaborators_ready() {
                    self.state = GameState::Ready;
                    log::info!("Game ready");
                    if let Some(app) = self.app.as_mut() {
                        app.loaded();
                    }
                    self.events.emit(&GameEvent::Ready, &());
                }
            }
            GameState::Ready => {
                self.state = GameState::Running;
                self.last_update_time = Some(now_ms);
                log::info!("Game running");
            }
            GameState::Running => self.run_frame(now_ms, &mut report),
            GameState::Paused | GameState::Destroyed => {}
        }
        report
    }

    fn run_frame(&mut self, now_ms: f64, report: &mut FrameReport) {
        if self.app.is_none() {
            log::error!("No app attached to a running game; stopping the clock");
            self.clock.stop();
            return;
        }

        let elapsed = self.last_update_time.map_or(0.0, |t| (now_ms - t).max(0.0));
        self.last_update_time = Some(now_ms);
        self.remaining_update += elapsed;

        let max = self.config.max_loop_duration_ms;
        if self.remaining_update > max {
            report.dropped_ms = self.remaining_update - max;
            log::warn!(
                "Frame backlog clamped to {max}ms, dropping {:.1}ms of simulation",
                report.dropped_ms
            );
            self.remaining_update = max;
        }

        let step = self.config.fixed_step_ms;
        while self.remaining_update >= step {
            self.step();
            self.remaining_update -= step;
            report.steps += 1;
        }

        self.track_fps(now_ms);
        self.render();
        report.rendered = true;
    }

    fn step(&mut self) {
        for (_, ticker) in &mut self.tickers {
            ticker();
        }
        self.steps.emit(&Step, &self.step_count);
        self.step_count += 1;
        if let Some(app) = self.app.as_mut() {
            app.update();
        }
    }

    fn render(&mut self) {
        let ctx = RenderContext {
            camera: self.camera,
            debug: self.config.debug,
        };
        if let Some(app) = self.app.as_mut() {
            app.render(&ctx);
        }
        if self.config.debug {
            self.render_debug_overlay();
        }
    }

    fn track_fps(&mut self, now_ms: f64) {
        self.frame_times[self.frame_index] = now_ms;
        self.frame_index = (self.frame_index + 1) % FPS_WINDOW;

        // Oldest sample sits at the next write position
        let oldest = self.frame_times[self.frame_index];
        if oldest > 0.0 {
            let elapsed = now_ms - oldest;
            if elapsed > 0.0 {
                self.fps = ((FPS_WINDOW as f64 - 1.0) * 1000.0 / elapsed).round() as u32;
            }
        }
    }

    fn render_debug_overlay(&mut self) {
        let Some(layer) = self.layers.iter().find(|l| l.borrow().name() == DEBUG_LAYER) else {
            return;
        };
        let mut layer = layer.borrow_mut();
        layer.clear();
        let text = format!("FPS: {}  steps: {}", self.fps, self.step_count);
        layer.surface_mut().fill_text(&text, 4.0, 12.0, Color::WHITE);
    }

    /// Stop simulating and drawing; audio is muted and paused
    pub fn pause(&mut self) {
        if self.state != GameState::Running {
            return;
        }
        self.state = GameState::Paused;
        self.clock.pause();
        if let Some(speaker) = self.speaker.as_mut() {
            self.was_muted = speaker.is_muted();
            speaker.mute();
            speaker.pause();
        }
        self.events.emit(&GameEvent::Paused, &());
        log::info!("Game paused");
    }

    /// Resume; the paused interval is not simulated
    pub fn unpause(&mut self) {
        if self.state != GameState::Paused {
            return;
        }
        self.state = GameState::Running;
        self.clock.unpause();
        self.last_update_time = None;
        if let Some(speaker) = self.speaker.as_mut() {
            speaker.unpause();
            if !self.was_muted {
                speaker.unmute();
            }
        }
        self.events.emit(&GameEvent::Unpaused, &());
        log::info!("Game unpaused");
    }

    /// Tear everything down; later calls do nothing
    pub fn destroy(&mut self) {
        if self.state == GameState::Destroyed {
            return;
        }
        self.state = GameState::Destroyed;
        self.clock.destroy();
        if let Some(mut app) = self.app.take() {
            app.destroy();
        }
        if let Some(speaker) = self.speaker.as_mut() {
            speaker.stop();
        }
        self.tickers.clear();
        self.steps.clear();
        self.layers.destroy_all(self.factory.as_ref());
        self.events.emit(&GameEvent::Destroyed, &());
        self.events.clear();
        log::info!("Game destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{MemoryPreloader, SilentSpeaker};
    use crate::config::LayerConfig;
    use crate::consts::{FIXED_STEP_MS, MAX_LOOP_DURATION_MS};
    use crate::motor::{Easing, MotorSpec, motorize};
    use crate::renderer::RecordingFactory;
    use crate::scene::{Property, View, ViewOptions, view_ref};
    use proptest::prelude::*;
    use std::cell::Cell;

    #[derive(Default)]
    struct Probe {
        loaded: u32,
        updates: u32,
        renders: u32,
        destroyed: u32,
    }

    impl GameApp for Probe {
        fn loaded(&mut self) {
            self.loaded += 1;
        }

        fn update(&mut self) {
            self.updates += 1;
        }

        fn render(&mut self, _ctx: &RenderContext) {
            self.renders += 1;
        }

        fn destroy(&mut self) {
            self.destroyed += 1;
        }
    }

    fn running_game() -> (Game, Rc<RefCell<Probe>>) {
        let mut game = Game::new(GameConfig::default(), Box::new(RecordingFactory::new())).unwrap();
        let probe = Rc::new(RefCell::new(Probe::default()));
        game.set_app(Box::new(probe.clone()));
        game.start();
        game.frame(0.0);
        game.frame(0.0);
        assert_eq!(game.state(), GameState::Running);
        (game, probe)
    }

    #[test]
    fn test_lifecycle_waits_for_collaborators() {
        let mut game = Game::new(GameConfig::default(), Box::new(RecordingFactory::new())).unwrap();
        let probe = Rc::new(RefCell::new(Probe::default()));
        game.set_app(Box::new(probe.clone()));
        let mut preloader = MemoryPreloader::new();
        preloader.load("hero");
        game.set_preloader(Box::new(preloader));

        assert_eq!(game.frame(0.0), FrameReport::default(), "clock not started");
        game.start();
        game.frame(16.0);
        assert_eq!(game.state(), GameState::Loading);
        assert_eq!(game.load_progress(), 0.0);

        game.preloader_mut().unwrap().load_now("hero", 8.0, 8.0);
        game.frame(32.0);
        assert_eq!(game.state(), GameState::Ready);
        assert_eq!(probe.borrow().loaded, 1);
        game.frame(48.0);
        assert_eq!(game.state(), GameState::Running);
        assert_eq!(probe.borrow().updates, 0);
    }

    #[test]
    fn test_fixed_steps_and_single_render() {
        let (mut game, probe) = running_game();
        let report = game.frame(FIXED_STEP_MS * 3.0 + 1.0);
        assert_eq!(report.steps, 3);
        assert!(report.rendered);
        assert_eq!(probe.borrow().updates, 3);
        assert_eq!(probe.borrow().renders, 1);

        // Leftover time carries into the next frame
        let report = game.frame(FIXED_STEP_MS * 3.0 + 5.0);
        assert_eq!(report.steps, 0);
        let report = game.frame(FIXED_STEP_MS * 5.0 + 2.0);
        assert_eq!(report.steps, 2);
        assert_eq!(probe.borrow().renders, 3);
    }

    #[test]
    fn test_backlog_is_clamped() {
        let (mut game, probe) = running_game();
        let report = game.frame(MAX_LOOP_DURATION_MS * 2.0);
        let max_steps = (MAX_LOOP_DURATION_MS / FIXED_STEP_MS).round() as u32;
        assert!(report.steps <= max_steps);
        assert!(report.steps + 1 >= max_steps, "{} steps", report.steps);
        assert_eq!(report.dropped_ms, MAX_LOOP_DURATION_MS);
        assert_eq!(probe.borrow().renders, 1);
    }

    #[test]
    fn test_pause_skips_frames_and_restores_audio() {
        let (mut game, probe) = running_game();
        game.set_speaker(Box::new(SilentSpeaker::new()));
        game.pause();
        assert!(game.is_paused());
        assert!(game.speaker().unwrap().is_muted());

        assert_eq!(game.frame(10_000.0), FrameReport::default());
        assert_eq!(probe.borrow().renders, 0);

        game.unpause();
        assert!(!game.speaker().unwrap().is_muted());
        let report = game.frame(20_000.0);
        assert_eq!(report.steps, 0, "paused time is not simulated");
        assert!(report.rendered);
        let report = game.frame(20_000.0 + FIXED_STEP_MS + 1.0);
        assert_eq!(report.steps, 1);
    }

    #[test]
    fn test_pause_remembers_prior_mute() {
        let (mut game, _) = running_game();
        let mut speaker = SilentSpeaker::new();
        speaker.mute();
        game.set_speaker(Box::new(speaker));
        game.pause();
        game.unpause();
        assert!(game.speaker().unwrap().is_muted());
    }

    #[test]
    fn test_running_without_app_stops_the_clock() {
        let mut game = Game::new(GameConfig::default(), Box::new(RecordingFactory::new())).unwrap();
        game.start();
        game.frame(0.0);
        game.frame(0.0);
        let report = game.frame(100.0);
        assert_eq!(report.steps, 0);
        assert_eq!(game.clock().state(), ClockState::Stopped);
    }

    #[test]
    fn test_tickers_and_motors_run_each_step() {
        let (mut game, _) = running_game();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let id = game.add_ticker(move || c.set(c.get() + 1));

        let view = view_ref(View::new(ViewOptions::default()));
        motorize(
            &view,
            MotorSpec::Move {
                dx: 30.0,
                dy: 0.0,
                duration: 2,
                easing: Easing::Linear,
            },
            &game.ticks(),
        )
        .unwrap();

        game.frame(FIXED_STEP_MS * 3.0 + 1.0);
        assert_eq!(count.get(), 3);
        assert_eq!(view.borrow().property(Property::X), Some(30.0));

        assert!(game.remove_ticker(id));
        assert!(!game.remove_ticker(id));
        game.frame(FIXED_STEP_MS * 4.0 + 1.0);
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn test_layers_from_config_and_destroy() {
        let factory = RecordingFactory::new();
        let config = GameConfig {
            layers: vec![
                LayerConfig {
                    name: "hud".into(),
                    z_index: 10,
                },
                LayerConfig {
                    name: "bg".into(),
                    z_index: 0,
                },
            ],
            scale: 2.0,
            debug: true,
            ..Default::default()
        };
        let mut game = Game::new(config, Box::new(factory.clone())).unwrap();
        let names: Vec<String> = game
            .layers()
            .iter()
            .map(|l| l.borrow().name().to_string())
            .collect();
        assert_eq!(names, vec!["bg", "hud", "debug"]);
        assert_eq!(game.get_layer("bg").unwrap().borrow().scale(), 2.0);

        let probe = Rc::new(RefCell::new(Probe::default()));
        game.set_app(Box::new(probe.clone()));
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        game.events().on(GameEvent::Destroyed, move |_| f.set(f.get() + 1));
        game.destroy();
        game.destroy();
        assert_eq!(fired.get(), 1);
        assert_eq!(probe.borrow().destroyed, 1);
        assert_eq!(factory.detached().len(), 3);
        assert_eq!(game.frame(1000.0), FrameReport::default());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = GameConfig {
            width: 0,
            ..Default::default()
        };
        assert!(Game::new(config, Box::new(RecordingFactory::new())).is_err());
    }

    proptest! {
        #[test]
        fn prop_each_frame_steps_within_backlog_cap(
            gaps in proptest::collection::vec(0.0f64..2_000.0, 1..24)
        ) {
            let (mut game, probe) = running_game();
            let cap = (MAX_LOOP_DURATION_MS / FIXED_STEP_MS).round() as u32;
            let mut now = 0.0;
            for (i, gap) in gaps.iter().enumerate() {
                now += gap;
                let report = game.frame(now);
                prop_assert!(report.steps <= cap);
                prop_assert!(report.rendered);
                prop_assert_eq!(probe.borrow().renders as usize, i + 1);
            }
        }
    }
}
