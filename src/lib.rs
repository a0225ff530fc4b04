//! Blocks Canvas - a layered 2D scene graph and game loop for canvas games
//!
//! Core modules:
//! - `scene`: Views, animated slices, blocks, stacks and the container that
//!   redraws only dirty layers
//! - `layer`: Named, z-ordered drawing surfaces
//! - `motor`: Per-step behaviors (move, vibrate, drag, tween) attached to views
//! - `game`: Fixed-timestep update loop over a variable-rate clock
//! - `renderer`: Surface abstraction plus a recording backend for headless use
//! - `platform`: Browser canvas surfaces and animation-frame driver
//! - `assets`: Preloader, speaker and controller interfaces

pub mod assets;
pub mod config;
pub mod error;
pub mod event;
pub mod game;
pub mod geom;
pub mod layer;
pub mod motor;
pub mod platform;
pub mod renderer;
pub mod scene;

pub use config::{GameConfig, LayerConfig};
pub use error::{EngineError, EngineResult};
pub use event::{EventHub, ListenerId};
pub use game::{Game, GameApp, GameEvent, GameState};
pub use geom::Rect;
pub use layer::{Layer, LayerRef, LayerSet};
pub use motor::{Easing, Motor, MotorKind, MotorSpec, motorize};
pub use scene::{
    Block, BlockOptions, Container, Drawable, Slice, SliceOptions, Stack, View, ViewRef, view_ref,
};

/// Loop timing constants
pub mod consts {
    /// Fixed update step (60 updates per second)
    pub const FIXED_STEP_MS: f64 = 1000.0 / 60.0;
    /// Largest elapsed time a single frame will simulate
    pub const MAX_LOOP_DURATION_MS: f64 = 500.0;
}
