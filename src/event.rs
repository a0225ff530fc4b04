//! Minimal publish/subscribe hub
//!
//! Every engine component that announces something (a slice completing, a
//! view being destroyed, a clock ticking) owns an [`EventHub`]. Dispatch works
//! on a snapshot of the listener list, so a callback may register or remove
//! listeners, including itself, without disturbing the emit in progress.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

/// Handle returned by [`EventHub::on`], used to remove a single listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<P> = Rc<dyn Fn(&P)>;

struct Listener<P> {
    id: ListenerId,
    callback: Callback<P>,
    once: bool,
}

impl<P> Clone for Listener<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Rc::clone(&self.callback),
            once: self.once,
        }
    }
}

/// Listener registry keyed by event `K`, delivering payloads of type `P`.
pub struct EventHub<K, P = ()> {
    listeners: RefCell<HashMap<K, Vec<Listener<P>>>>,
    next_id: Cell<u64>,
}

impl<K: Eq + Hash + Clone, P> Default for EventHub<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, P> EventHub<K, P> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    fn register(&self, key: K, callback: impl Fn(&P) + 'static, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners
            .borrow_mut()
            .entry(key)
            .or_default()
            .push(Listener {
                id,
                callback: Rc::new(callback),
                once,
            });
        id
    }

    /// Register a persistent listener
    pub fn on(&self, key: K, callback: impl Fn(&P) + 'static) -> ListenerId {
        self.register(key, callback, false)
    }

    /// Register a listener that is dropped after its first invocation
    pub fn once(&self, key: K, callback: impl Fn(&P) + 'static) -> ListenerId {
        self.register(key, callback, true)
    }

    /// Remove one listener, or every listener for `key` when `id` is `None`
    pub fn off(&self, key: &K, id: Option<ListenerId>) {
        let mut listeners = self.listeners.borrow_mut();
        match id {
            Some(id) => {
                if let Some(list) = listeners.get_mut(key) {
                    list.retain(|l| l.id != id);
                    if list.is_empty() {
                        listeners.remove(key);
                    }
                }
            }
            None => {
                listeners.remove(key);
            }
        }
    }

    /// Invoke the listeners registered for `key`, in registration order
    pub fn emit(&self, key: &K, payload: &P) {
        let snapshot: Vec<Listener<P>> = match self.listeners.borrow().get(key) {
            Some(list) => list.clone(),
            None => return,
        };

        for listener in &snapshot {
            (listener.callback)(payload);
        }

        let fired_once: Vec<ListenerId> = snapshot
            .iter()
            .filter(|l| l.once)
            .map(|l| l.id)
            .collect();
        if !fired_once.is_empty() {
            let mut listeners = self.listeners.borrow_mut();
            if let Some(list) = listeners.get_mut(key) {
                list.retain(|l| !fired_once.contains(&l.id));
                if list.is_empty() {
                    listeners.remove(key);
                }
            }
        }
    }

    pub fn listener_count(&self, key: &K) -> usize {
        self.listeners.borrow().get(key).map_or(0, Vec::len)
    }

    /// Drop every listener for every key
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Ev {
        Ping,
        Pong,
    }

    #[test]
    fn test_emit_in_registration_order() {
        let hub: EventHub<Ev, u32> = EventHub::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in 0..3 {
            let seen = seen.clone();
            hub.on(Ev::Ping, move |v| seen.borrow_mut().push((tag, *v)));
        }
        hub.emit(&Ev::Ping, &7);
        assert_eq!(*seen.borrow(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_emit_without_listeners_is_noop() {
        let hub: EventHub<Ev> = EventHub::new();
        hub.emit(&Ev::Pong, &());
        assert_eq!(hub.listener_count(&Ev::Pong), 0);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let hub: EventHub<Ev> = EventHub::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        hub.once(Ev::Ping, move |_| c.set(c.get() + 1));
        hub.emit(&Ev::Ping, &());
        hub.emit(&Ev::Ping, &());
        assert_eq!(count.get(), 1);
        assert_eq!(hub.listener_count(&Ev::Ping), 0);
    }

    #[test]
    fn test_off_single_and_all() {
        let hub: EventHub<Ev> = EventHub::new();
        let a = hub.on(Ev::Ping, |_| {});
        hub.on(Ev::Ping, |_| {});
        hub.off(&Ev::Ping, Some(a));
        assert_eq!(hub.listener_count(&Ev::Ping), 1);
        hub.off(&Ev::Ping, None);
        assert_eq!(hub.listener_count(&Ev::Ping), 0);
    }

    #[test]
    fn test_listener_added_during_emit_waits_for_next_emit() {
        let hub: Rc<EventHub<Ev>> = Rc::new(EventHub::new());
        let count = Rc::new(Cell::new(0));
        {
            let weak = Rc::downgrade(&hub);
            let count = count.clone();
            hub.once(Ev::Ping, move |_| {
                if let Some(hub) = weak.upgrade() {
                    let count = count.clone();
                    hub.on(Ev::Ping, move |_| count.set(count.get() + 1));
                }
            });
        }
        hub.emit(&Ev::Ping, &());
        assert_eq!(count.get(), 0);
        hub.emit(&Ev::Ping, &());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_listener_removed_during_emit_still_runs_this_dispatch() {
        let hub: Rc<EventHub<Ev>> = Rc::new(EventHub::new());
        let count = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(None));
        {
            let weak = Rc::downgrade(&hub);
            let second = second.clone();
            hub.on(Ev::Ping, move |_| {
                if let (Some(hub), Some(id)) = (weak.upgrade(), second.get()) {
                    hub.off(&Ev::Ping, Some(id));
                }
            });
        }
        let c = count.clone();
        second.set(Some(hub.on(Ev::Ping, move |_| c.set(c.get() + 1))));

        hub.emit(&Ev::Ping, &());
        assert_eq!(count.get(), 1);
        hub.emit(&Ev::Ping, &());
        assert_eq!(count.get(), 1);
    }
}
