//! Blocks Canvas demo entry point
//!
//! Builds a small scene (an animated hero walking across a tiled ground strip)
//! and runs it in the browser, or headless on native with recording surfaces.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

mod demo {
    use std::cell::RefCell;
    use std::rc::Rc;

    use blocks_canvas::assets::Preloader;
    use blocks_canvas::motor::MotorEvent;
    use blocks_canvas::scene::{Loop, ViewOptions};
    use blocks_canvas::{
        Block, BlockOptions, Container, EngineError, EngineResult, Easing, Game, GameConfig,
        LayerConfig, LayerRef, MotorSpec, Slice, SliceOptions, Stack, ViewRef, motorize, view_ref,
    };

    const TILE_SIZE: f32 = 64.0;

    pub fn config() -> GameConfig {
        GameConfig {
            width: 640,
            height: 360,
            layers: vec![
                LayerConfig {
                    name: "background".into(),
                    z_index: 0,
                },
                LayerConfig {
                    name: "sprites".into(),
                    z_index: 1,
                },
            ],
            ..GameConfig::default()
        }
    }

    fn layer(game: &Game, name: &str) -> EngineResult<LayerRef> {
        game.get_layer(name)
            .ok_or_else(|| EngineError::not_found(format!("layer '{name}'")))
    }

    /// Populate `game` with the demo scene and return its root container
    pub fn build(
        game: &mut Game,
        preloader: &mut dyn Preloader,
    ) -> EngineResult<Rc<RefCell<Container>>> {
        let background = layer(game, "background")?;
        let sprites = layer(game, "sprites")?;
        let tiles = preloader.load("tiles.png");
        let hero_sheet = preloader.load("hero.png");

        let mut container = Container::new();
        container.set_layer_label("background", &background);

        let mut ground = Stack::at(0.0, game.config().height as f32 - TILE_SIZE);
        let columns = (game.config().width as f32 / TILE_SIZE).ceil() as usize;
        for i in 0..columns {
            let mut tile = Slice::new(SliceOptions {
                view: ViewOptions {
                    layer: Some(background.clone()),
                    x: i as f32 * TILE_SIZE,
                    ..Default::default()
                },
                name: Some(format!("tile{i}")),
                image: Some(tiles.clone()),
                number_of_frames: 4,
                ..Default::default()
            });
            tile.goto_frame((i % 4) as f32);
            ground.add_view(view_ref(tile));
        }
        container.add_view(view_ref(ground));

        let mut hero = Block::new(BlockOptions {
            name: Some("hero".into()),
            view: ViewOptions {
                layer: Some(sprites),
                x: 32.0,
                y: game.config().height as f32 - TILE_SIZE * 2.0,
                ..Default::default()
            },
            ..Default::default()
        })?;
        hero.add_slice(SliceOptions {
            name: Some("walk".into()),
            image: Some(hero_sheet.clone()),
            number_of_frames: 8,
            number_of_columns: Some(4),
            frame_delay: 6,
            looping: Loop::Forever,
            auto_play: true,
            ..Default::default()
        })?;
        hero.add_slice(SliceOptions {
            name: Some("idle".into()),
            image: Some(hero_sheet),
            number_of_frames: 1,
            ..Default::default()
        })?;

        let hero = Rc::new(RefCell::new(hero));
        let hero_view: ViewRef = hero.clone();
        container.add_view(Rc::clone(&hero_view));

        let walk = motorize(
            &hero_view,
            MotorSpec::Move {
                dx: game.config().width as f32 - 128.0,
                dy: 0.0,
                duration: 240,
                easing: Easing::EaseInOut,
            },
            &game.ticks(),
        )?;
        let weak = Rc::downgrade(&hero);
        let ticks = game.ticks();
        walk.events().once(MotorEvent::Complete, move |_| {
            let Some(hero) = weak.upgrade() else {
                return;
            };
            hero.borrow_mut().set_slice("idle", None);
            let view: ViewRef = hero;
            if let Err(e) = motorize(&view, MotorSpec::vibrate(0.0, 6.0, 4), &ticks) {
                log::warn!("Landing shake failed: {e}");
            }
            log::info!("Hero arrived");
        });

        Ok(Rc::new(RefCell::new(container)))
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::prelude::*;

    use blocks_canvas::platform::{CanvasFactory, ImagePreloader, RafLoop};
    use blocks_canvas::{EngineError, EngineResult, Game, GameConfig};

    use crate::demo;

    thread_local! {
        static RAF: RefCell<Option<RafLoop>> = const { RefCell::new(None) };
    }

    fn js_error(e: EngineError) -> JsValue {
        JsValue::from_str(&e.to_string())
    }

    fn start() -> EngineResult<()> {
        let mut config = GameConfig::load();
        if config.layers.is_empty() {
            config.layers = demo::config().layers;
        }

        let mut game = Game::new(config, Box::new(CanvasFactory::new("game")?))?;
        let mut preloader = ImagePreloader::new("assets/");
        let scene = demo::build(&mut game, &mut preloader)?;
        game.set_preloader(Box::new(preloader));
        game.set_app(Box::new(scene));
        game.start();

        let game = Rc::new(RefCell::new(game));
        let raf = RafLoop::new(move |timestamp_ms| {
            game.borrow_mut().frame(timestamp_ms);
        });
        raf.start();
        RAF.with(|slot| *slot.borrow_mut() = Some(raf));
        Ok(())
    }

    pub fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        log::info!("Blocks Canvas starting...");
        start().map_err(js_error)
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() -> Result<(), JsValue> {
    wasm_game::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The wasm entry point is wasm_main
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Blocks Canvas (native) starting...");
    log::info!("Native mode renders headless - build for wasm32 to see pixels");

    if let Err(e) = headless::run(300) {
        log::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use blocks_canvas::assets::MemoryPreloader;
    use blocks_canvas::consts::FIXED_STEP_MS;
    use blocks_canvas::renderer::{RecordingFactory, RecordingSurface};
    use blocks_canvas::{EngineResult, Game};

    use crate::demo;

    /// Drive `frames` simulated 60 Hz frames and log what each layer drew
    pub fn run(frames: u32) -> EngineResult<()> {
        let mut game = Game::new(demo::config(), Box::new(RecordingFactory::new()))?;
        let mut preloader = MemoryPreloader::new();
        let scene = demo::build(&mut game, &mut preloader)?;
        preloader.finish("tiles.png", 256.0, 64.0);
        preloader.finish("hero.png", 256.0, 128.0);
        game.set_preloader(Box::new(preloader));
        game.set_app(Box::new(scene));
        game.start();

        let (mut steps, mut renders) = (0u32, 0u32);
        for frame in 0..frames {
            let report = game.frame(f64::from(frame) * FIXED_STEP_MS);
            steps += report.steps;
            renders += u32::from(report.rendered);
            if report.dropped_ms > 0.0 {
                log::warn!("Frame {frame} dropped {:.1}ms", report.dropped_ms);
            }
        }
        log::info!("{frames} frames: {steps} updates, {renders} renders");

        for layer in game.layers().iter() {
            let layer = layer.borrow();
            if let Some(surface) = layer.surface().as_any().downcast_ref::<RecordingSurface>() {
                log::info!(
                    "Layer '{}': cleared {} times, {} ops recorded",
                    layer.name(),
                    surface.clear_count(),
                    surface.ops().len()
                );
            }
        }

        game.destroy();
        Ok(())
    }
}
