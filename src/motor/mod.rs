//! Motors: per-step animators that drive a node's properties
//!
//! A motor subscribes to the game's fixed-step hub and nudges its target a
//! little on every step. Moves, vibrations and tweens destroy themselves when
//! they finish; a drag motor lives until it is destroyed explicitly.
//! Motors hold their target weakly, and the target owns the motor handle, so
//! destroying a node destroys its motors.

pub mod easing;

pub use easing::Easing;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use glam::Vec2;

use crate::assets::{Controller, InputEvent};
use crate::error::{EngineError, EngineResult};
use crate::event::{EventHub, ListenerId};
use crate::game::{Step, StepHub};
use crate::geom::Rect;
use crate::scene::{Drawable, Property, ViewRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorKind {
    Move,
    Vibrate,
    Drag,
    Tween,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorEvent {
    Complete,
    Destroyed,
    DragStart,
    DragEnd,
}

pub type MotorEvents = EventHub<MotorEvent>;

/// What a motor should do; durations count fixed steps
#[derive(Clone)]
pub enum MotorSpec {
    /// Move by `(dx, dy)` over `duration` steps
    Move {
        dx: f32,
        dy: f32,
        duration: u32,
        easing: Easing,
    },
    /// Shake around the current position, `duration` steps per half-cycle.
    /// Each swing is `decay` times the previous one; the last half-cycle
    /// returns to the start.
    Vibrate {
        amount_x: f32,
        amount_y: f32,
        duration: u32,
        half_cycles: u32,
        decay: f32,
    },
    /// Follow the pointer while a tap that hit the target is held
    Drag {
        controller: Rc<Controller>,
        bounds: Option<Rect>,
    },
    /// Change one property by `amount` over `duration` steps
    Tween {
        property: Property,
        amount: f32,
        duration: u32,
        easing: Easing,
    },
}

impl MotorSpec {
    pub fn vibrate(amount_x: f32, amount_y: f32, duration: u32) -> Self {
        MotorSpec::Vibrate {
            amount_x,
            amount_y,
            duration,
            half_cycles: 4,
            decay: 1.0,
        }
    }

    pub fn kind(&self) -> MotorKind {
        match self {
            MotorSpec::Move { .. } => MotorKind::Move,
            MotorSpec::Vibrate { .. } => MotorKind::Vibrate,
            MotorSpec::Drag { .. } => MotorKind::Drag,
            MotorSpec::Tween { .. } => MotorKind::Tween,
        }
    }

    fn validate(&self) -> EngineResult<()> {
        match self {
            MotorSpec::Move { duration: 0, .. }
            | MotorSpec::Vibrate { duration: 0, .. }
            | MotorSpec::Tween { duration: 0, .. } => {
                Err(EngineError::config(format!("{:?} motor needs a duration", self.kind())))
            }
            MotorSpec::Vibrate { half_cycles: 0, .. } => {
                Err(EngineError::config("vibrate motor needs at least one half-cycle"))
            }
            MotorSpec::Tween {
                property: Property::Width | Property::Height | Property::WorldX | Property::WorldY,
                ..
            } => Err(EngineError::config("tween target property is read-only")),
            _ => Ok(()),
        }
    }
}

/// Shared between a drag motor's input listeners and its step callback
#[derive(Default)]
struct DragState {
    dragging: Cell<bool>,
    grab: Cell<Vec2>,
    pending: Cell<Option<Vec2>>,
}

enum Driver {
    Move {
        delta: Vec2,
        duration: u32,
        easing: Easing,
        tick: u32,
        applied: Vec2,
    },
    Vibrate {
        /// Offset reached at the end of each half-cycle
        stops: Vec<Vec2>,
        duration: u32,
        tick: u32,
        applied: Vec2,
    },
    Drag {
        bounds: Option<Rect>,
        state: Rc<DragState>,
    },
    Tween {
        property: Property,
        amount: f32,
        duration: u32,
        easing: Easing,
        tick: u32,
        /// Property value when the first step ran
        start: Option<f32>,
    },
}

fn nudge(target: &mut dyn Drawable, prop: Property, delta: f32) {
    if delta == 0.0 {
        return;
    }
    if let Some(value) = target.property(prop) {
        target.set_property(prop, value + delta);
    }
}

fn nudge_position(target: &mut dyn Drawable, delta: Vec2) {
    nudge(target, Property::X, delta.x);
    nudge(target, Property::Y, delta.y);
}

impl Driver {
    /// Advance one step; true once the motion is finished
    fn step(&mut self, target: &mut dyn Drawable) -> bool {
        match self {
            Driver::Move {
                delta,
                duration,
                easing,
                tick,
                applied,
            } => {
                *tick += 1;
                let t = *tick as f32 / *duration as f32;
                let goal = Vec2::new(easing.value(t, delta.x), easing.value(t, delta.y));
                nudge_position(target, goal - *applied);
                *applied = goal;
                *tick >= *duration
            }
            Driver::Vibrate {
                stops,
                duration,
                tick,
                applied,
            } => {
                *tick += 1;
                let segment = ((*tick - 1) / *duration) as usize;
                let within = (*tick - 1) % *duration + 1;
                let from = if segment == 0 { Vec2::ZERO } else { stops[segment - 1] };
                let goal = from.lerp(stops[segment], within as f32 / *duration as f32);
                nudge_position(target, goal - *applied);
                *applied = goal;
                segment + 1 == stops.len() && within == *duration
            }
            Driver::Drag { bounds, state } => {
                if let Some(mut pos) = state.pending.take() {
                    if let Some(b) = bounds {
                        pos = pos.clamp(Vec2::new(b.x, b.y), Vec2::new(b.right(), b.bottom()));
                    }
                    target.set_property(Property::X, pos.x);
                    target.set_property(Property::Y, pos.y);
                }
                false
            }
            Driver::Tween {
                property,
                amount,
                duration,
                easing,
                tick,
                start,
            } => {
                // Written absolutely: a clamped overshoot must not skew later steps
                let Some(from) = start.or_else(|| target.property(*property)) else {
                    log::warn!("Tween target no longer exposes {property:?}");
                    return true;
                };
                *start = Some(from);
                *tick += 1;
                let offset = easing.value(*tick as f32 / *duration as f32, *amount);
                target.set_property(*property, from + offset);
                *tick >= *duration
            }
        }
    }
}

struct MotorInner {
    kind: MotorKind,
    destroyed: Cell<bool>,
    events: MotorEvents,
    ticks: Weak<StepHub>,
    tick_id: Cell<Option<ListenerId>>,
    inputs: RefCell<Option<(Weak<Controller>, Vec<(InputEvent, ListenerId)>)>>,
}

impl MotorInner {
    fn detach(&self) {
        if let (Some(hub), Some(id)) = (self.ticks.upgrade(), self.tick_id.take()) {
            hub.off(&Step, Some(id));
        }
        if let Some((controller, ids)) = self.inputs.borrow_mut().take()
            && let Some(controller) = controller.upgrade()
        {
            for (event, id) in ids {
                controller.off(&event, Some(id));
            }
        }
    }
}

impl Drop for MotorInner {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Handle to a running motor; clones share the same motor
#[derive(Clone)]
pub struct Motor(Rc<MotorInner>);

impl std::fmt::Debug for Motor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Motor")
            .field("kind", &self.0.kind)
            .field("destroyed", &self.0.destroyed.get())
            .finish()
    }
}

impl Motor {
    /// Build a motor for `target` and subscribe it to `ticks`.
    /// The caller is responsible for handing it to the target (see [`motorize`]).
    pub fn new(spec: MotorSpec, target: &ViewRef, ticks: &Rc<StepHub>) -> EngineResult<Self> {
        spec.validate()?;
        let kind = spec.kind();
        let mut drag = None;
        let driver = match spec {
            MotorSpec::Move {
                dx,
                dy,
                duration,
                easing,
            } => Driver::Move {
                delta: Vec2::new(dx, dy),
                duration,
                easing,
                tick: 0,
                applied: Vec2::ZERO,
            },
            MotorSpec::Vibrate {
                amount_x,
                amount_y,
                duration,
                half_cycles,
                decay,
            } => {
                let amount = Vec2::new(amount_x, amount_y);
                let mut stops: Vec<Vec2> = (0..half_cycles - 1)
                    .map(|i| {
                        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                        amount * sign * decay.powi(i as i32)
                    })
                    .collect();
                stops.push(Vec2::ZERO);
                Driver::Vibrate {
                    stops,
                    duration,
                    tick: 0,
                    applied: Vec2::ZERO,
                }
            }
            MotorSpec::Drag { controller, bounds } => {
                let state = Rc::new(DragState::default());
                drag = Some((controller, Rc::clone(&state)));
                Driver::Drag { bounds, state }
            }
            MotorSpec::Tween {
                property,
                amount,
                duration,
                easing,
            } => Driver::Tween {
                property,
                amount,
                duration,
                easing,
                tick: 0,
                start: None,
            },
        };

        let motor = Motor(Rc::new(MotorInner {
            kind,
            destroyed: Cell::new(false),
            events: MotorEvents::new(),
            ticks: Rc::downgrade(ticks),
            tick_id: Cell::new(None),
            inputs: RefCell::new(None),
        }));

        let driver = RefCell::new(driver);
        let weak_target = Rc::downgrade(target);
        let weak_motor = Rc::downgrade(&motor.0);
        let id = ticks.on(Step, move |_| {
            let Some(inner) = weak_motor.upgrade() else {
                return;
            };
            let motor = Motor(inner);
            if motor.is_destroyed() {
                return;
            }
            let Some(target) = weak_target.upgrade() else {
                motor.destroy();
                return;
            };
            let finished = {
                let Ok(mut target) = target.try_borrow_mut() else {
                    log::warn!("{:?} motor skipped a step: target is busy", motor.kind());
                    return;
                };
                if target.is_destroyed() {
                    None
                } else {
                    Some(driver.borrow_mut().step(&mut *target))
                }
            };
            match finished {
                None => motor.destroy(),
                Some(true) => {
                    motor.0.events.emit(&MotorEvent::Complete, &());
                    motor.destroy();
                }
                Some(false) => {}
            }
        });
        motor.0.tick_id.set(Some(id));

        if let Some((controller, state)) = drag {
            motor.listen_for_drags(&controller, target, state);
        }
        log::debug!("{kind:?} motor started");
        Ok(motor)
    }

    fn listen_for_drags(&self, controller: &Rc<Controller>, target: &ViewRef, state: Rc<DragState>) {
        let mut ids = Vec::with_capacity(4);

        let (weak_target, weak_motor, s) =
            (Rc::downgrade(target), Rc::downgrade(&self.0), Rc::clone(&state));
        ids.push((
            InputEvent::Tap,
            controller.on(InputEvent::Tap, move |pt| {
                let (Some(target), Some(inner)) = (weak_target.upgrade(), weak_motor.upgrade())
                else {
                    return;
                };
                let Ok(target) = target.try_borrow() else { return };
                if !target.is_point_inside(*pt) {
                    return;
                }
                let origin = Vec2::new(
                    target.property(Property::X).unwrap_or_default(),
                    target.property(Property::Y).unwrap_or_default(),
                );
                drop(target);
                s.grab.set(*pt - origin);
                s.dragging.set(true);
                inner.events.emit(&MotorEvent::DragStart, &());
            }),
        ));

        let s = Rc::clone(&state);
        ids.push((
            InputEvent::Drag,
            controller.on(InputEvent::Drag, move |pt| {
                if s.dragging.get() {
                    s.pending.set(Some(*pt - s.grab.get()));
                }
            }),
        ));

        for event in [InputEvent::Release, InputEvent::Cancel] {
            let (weak_motor, s) = (Rc::downgrade(&self.0), Rc::clone(&state));
            ids.push((
                event,
                controller.on(event, move |_| {
                    if !s.dragging.replace(false) {
                        return;
                    }
                    if let Some(inner) = weak_motor.upgrade() {
                        inner.events.emit(&MotorEvent::DragEnd, &());
                    }
                }),
            ));
        }

        *self.0.inputs.borrow_mut() = Some((Rc::downgrade(controller), ids));
    }

    pub fn kind(&self) -> MotorKind {
        self.0.kind
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    pub fn events(&self) -> &MotorEvents {
        &self.0.events
    }

    /// Stop receiving steps and input; only the first call has any effect
    pub fn destroy(&self) {
        if self.0.destroyed.replace(true) {
            return;
        }
        self.0.detach();
        self.0.events.emit(&MotorEvent::Destroyed, &());
        self.0.events.clear();
        log::debug!("{:?} motor destroyed", self.0.kind);
    }
}

/// Create a motor for `target` and hand ownership of it to the target
pub fn motorize(target: &ViewRef, spec: MotorSpec, ticks: &Rc<StepHub>) -> EngineResult<Motor> {
    let motor = Motor::new(spec, target, ticks)?;
    target.borrow_mut().motorize(motor.clone());
    Ok(motor)
}
