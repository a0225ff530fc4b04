//! The variable-rate frame clock
//!
//! The host (a `requestAnimationFrame` loop in the browser, a plain loop
//! natively) calls [`Clock::frame`] once per paint; the clock only passes the
//! frame on while it is running.

use std::rc::Rc;

use crate::event::EventHub;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
    Paused,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockEvent {
    /// Payload is the host timestamp in milliseconds
    Tick,
    Destroyed,
}

pub type ClockEvents = EventHub<ClockEvent, f64>;

pub struct Clock {
    state: ClockState,
    frames: u64,
    events: Rc<ClockEvents>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            state: ClockState::Stopped,
            frames: 0,
            events: Rc::new(ClockEvents::new()),
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Number of frames ticked so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn start(&mut self) {
        if self.state == ClockState::Stopped {
            self.state = ClockState::Running;
        }
    }

    pub fn stop(&mut self) {
        if matches!(self.state, ClockState::Running | ClockState::Paused) {
            self.state = ClockState::Stopped;
        }
    }

    pub fn pause(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
        }
    }

    pub fn unpause(&mut self) {
        if self.state == ClockState::Paused {
            self.state = ClockState::Running;
        }
    }

    /// Feed one host frame; emits `Tick` and returns true only while running
    pub fn frame(&mut self, timestamp_ms: f64) -> bool {
        if !self.is_running() {
            return false;
        }
        self.frames += 1;
        self.events.emit(&ClockEvent::Tick, &timestamp_ms);
        true
    }

    pub fn destroy(&mut self) {
        if self.state == ClockState::Destroyed {
            return;
        }
        self.state = ClockState::Destroyed;
        self.events.emit(&ClockEvent::Destroyed, &0.0);
        self.events.clear();
    }

    pub fn events(&self) -> Rc<ClockEvents> {
        Rc::clone(&self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_ticks_only_while_running() {
        let mut clock = Clock::new();
        let ticks = Rc::new(Cell::new(0));
        let t = ticks.clone();
        clock.events().on(ClockEvent::Tick, move |_| t.set(t.get() + 1));

        assert!(!clock.frame(0.0));
        clock.start();
        assert!(clock.frame(16.0));
        clock.pause();
        assert!(!clock.frame(32.0));
        clock.unpause();
        assert!(clock.frame(48.0));
        clock.stop();
        assert!(!clock.frame(64.0));
        assert_eq!(ticks.get(), 2);
        assert_eq!(clock.frames(), 2);
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let mut clock = Clock::new();
        let fired = Rc::new(Cell::new(0));
        let f = fired.clone();
        clock
            .events()
            .on(ClockEvent::Destroyed, move |_| f.set(f.get() + 1));
        clock.start();
        clock.destroy();
        clock.destroy();
        clock.start();
        assert_eq!(fired.get(), 1);
        assert_eq!(clock.state(), ClockState::Destroyed);
        assert!(!clock.frame(1.0));
    }
}
