//! Synchronous notification signals.
//!
//! A [`Signal`] owns its subscriber list and dispatches in subscription
//! order. Handlers receive an [`EventScope`] with the two propagation
//! controls: `stop_propagation` marks the event consumed for the embedding,
//! `stop_immediate_propagation` additionally skips the remaining handlers.
//! `notify` reports both flags plus the last non-`None` handler return
//! value, which is how vetoable notifications answer.

use slab::Slab;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandlerId(usize);

#[derive(Debug, Default)]
pub struct EventScope {
    stop_propagation: bool,
    stop_immediate: bool,
}

impl EventScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop_propagation(&mut self) {
        self.stop_propagation = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.stop_propagation = true;
        self.stop_immediate = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stop_propagation
    }

    pub fn is_immediate_propagation_stopped(&self) -> bool {
        self.stop_immediate
    }
}

/// Result of one dispatch pass.
#[derive(Debug)]
pub struct NotifyOutcome<R> {
    /// Last non-`None` value returned by a handler.
    pub result: Option<R>,
    pub propagation_stopped: bool,
    pub immediate_propagation_stopped: bool,
}

impl<R> NotifyOutcome<R> {
    fn empty() -> Self {
        Self {
            result: None,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
        }
    }
}

type Handler<A, R> = Box<dyn FnMut(&mut EventScope, &A) -> Option<R>>;

pub struct Signal<A, R = ()> {
    handlers: Slab<Handler<A, R>>,
    order: Vec<usize>,
}

impl<A, R> Default for Signal<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> Signal<A, R> {
    pub fn new() -> Self {
        Self {
            handlers: Slab::new(),
            order: Vec::new(),
        }
    }

    pub fn subscribe(
        &mut self,
        handler: impl FnMut(&mut EventScope, &A) -> Option<R> + 'static,
    ) -> HandlerId {
        let key = self.handlers.insert(Box::new(handler));
        self.order.push(key);
        HandlerId(key)
    }

    pub fn unsubscribe(&mut self, id: HandlerId) -> bool {
        if self.handlers.try_remove(id.0).is_some() {
            self.order.retain(|k| *k != id.0);
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn notify(&mut self, args: &A) -> NotifyOutcome<R> {
        let mut scope = EventScope::new();
        let mut outcome = NotifyOutcome::empty();
        for &key in &self.order {
            let Some(handler) = self.handlers.get_mut(key) else {
                continue;
            };
            if let Some(value) = handler(&mut scope, args) {
                outcome.result = Some(value);
            }
            if scope.is_immediate_propagation_stopped() {
                break;
            }
        }
        outcome.propagation_stopped = scope.is_propagation_stopped();
        outcome.immediate_propagation_stopped = scope.is_immediate_propagation_stopped();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn dispatches_in_subscription_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut signal: Signal<u32> = Signal::new();
        for tag in ["a", "b", "c"] {
            let seen = Rc::clone(&seen);
            signal.subscribe(move |_, n| {
                seen.borrow_mut().push(format!("{tag}{n}"));
                None
            });
        }
        signal.notify(&7);
        assert_eq!(*seen.borrow(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn result_is_last_non_none() {
        let mut signal: Signal<(), i32> = Signal::new();
        signal.subscribe(|_, _| Some(1));
        signal.subscribe(|_, _| None);
        signal.subscribe(|_, _| Some(3));
        signal.subscribe(|_, _| None);
        assert_eq!(signal.notify(&()).result, Some(3));
    }

    #[test]
    fn stop_immediate_skips_remaining_handlers() {
        let seen = Rc::new(RefCell::new(0u32));
        let mut signal: Signal<()> = Signal::new();
        {
            let seen = Rc::clone(&seen);
            signal.subscribe(move |scope, _| {
                *seen.borrow_mut() += 1;
                scope.stop_immediate_propagation();
                None
            });
        }
        {
            let seen = Rc::clone(&seen);
            signal.subscribe(move |_, _| {
                *seen.borrow_mut() += 1;
                None
            });
        }
        let outcome = signal.notify(&());
        assert_eq!(*seen.borrow(), 1);
        assert!(outcome.immediate_propagation_stopped);
        assert!(outcome.propagation_stopped);
    }

    #[test]
    fn stop_propagation_alone_runs_all_handlers() {
        let seen = Rc::new(RefCell::new(0u32));
        let mut signal: Signal<()> = Signal::new();
        {
            let seen = Rc::clone(&seen);
            signal.subscribe(move |scope, _| {
                *seen.borrow_mut() += 1;
                scope.stop_propagation();
                None
            });
        }
        {
            let seen = Rc::clone(&seen);
            signal.subscribe(move |_, _| {
                *seen.borrow_mut() += 1;
                None
            });
        }
        let outcome = signal.notify(&());
        assert_eq!(*seen.borrow(), 2);
        assert!(outcome.propagation_stopped);
        assert!(!outcome.immediate_propagation_stopped);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let seen = Rc::new(RefCell::new(0u32));
        let mut signal: Signal<()> = Signal::new();
        let id = {
            let seen = Rc::clone(&seen);
            signal.subscribe(move |_, _| {
                *seen.borrow_mut() += 1;
                None
            })
        };
        signal.notify(&());
        assert!(signal.unsubscribe(id));
        assert!(!signal.unsubscribe(id));
        signal.notify(&());
        assert_eq!(*seen.borrow(), 1);
    }
}
