//! Single-threaded event subscription.
//!
//! Handlers are registered with [`EventHub::subscribe`] and stay registered
//! until their [`Subscription`] is cancelled or dropped, which deregisters
//! exactly once. Dispatch is not re-entrant: emitting from inside a handler
//! fails with [`EventError::Reentrant`]. A handler cancelled by another
//! handler during a dispatch does not run for the rest of that dispatch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EventError {
    Reentrant,
    Busy,
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::Reentrant => write!(f, "event emitted while a dispatch is running"),
            EventError::Busy => write!(f, "cannot subscribe while a dispatch is running"),
        }
    }
}

impl std::error::Error for EventError {}

type Handler<E> = Box<dyn FnMut(&E)>;

struct Registry<E> {
    listeners: RefCell<Vec<(u64, Handler<E>)>>,
    pending_removals: RefCell<Vec<u64>>,
    next_id: Cell<u64>,
}

impl<E> Registry<E> {
    fn drain_pending(&self, listeners: &mut Vec<(u64, Handler<E>)>) {
        let pending = std::mem::take(&mut *self.pending_removals.borrow_mut());
        if !pending.is_empty() {
            listeners.retain(|(id, _)| !pending.contains(id));
        }
    }
}

trait Deregister {
    fn deregister(&self, id: u64);
}

impl<E> Deregister for Registry<E> {
    fn deregister(&self, id: u64) {
        match self.listeners.try_borrow_mut() {
            Ok(mut listeners) => listeners.retain(|(existing, _)| *existing != id),
            // Dispatch in progress: removed once it completes.
            Err(_) => self.pending_removals.borrow_mut().push(id),
        }
    }
}

pub struct EventHub<E> {
    registry: Rc<Registry<E>>,
}

impl<E: 'static> EventHub<E> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(Registry {
                listeners: RefCell::new(Vec::new()),
                pending_removals: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Result<Subscription, EventError>
    where
        F: FnMut(&E) + 'static,
    {
        let mut listeners = self
            .registry
            .listeners
            .try_borrow_mut()
            .map_err(|_| EventError::Busy)?;
        let id = self.registry.next_id.get();
        self.registry.next_id.set(id + 1);
        listeners.push((id, Box::new(handler)));
        let erased: Rc<dyn Deregister> = self.registry.clone();
        Ok(Subscription {
            id,
            registry: Some(Rc::downgrade(&erased)),
        })
    }

    /// Runs every handler to completion, in subscription order. Returns how many ran.
    pub fn emit(&self, event: &E) -> Result<usize, EventError> {
        let mut listeners = self
            .registry
            .listeners
            .try_borrow_mut()
            .map_err(|_| EventError::Reentrant)?;
        let mut ran = 0;
        for (id, handler) in listeners.iter_mut() {
            if self.registry.pending_removals.borrow().contains(id) {
                continue;
            }
            handler(event);
            ran += 1;
        }
        self.registry.drain_pending(&mut listeners);
        Ok(ran)
    }

    pub fn listener_count(&self) -> usize {
        self.registry
            .listeners
            .try_borrow()
            .map(|listeners| listeners.len())
            .unwrap_or(0)
    }
}

impl<E: 'static> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a registered handler. Deregisters on drop.
pub struct Subscription {
    id: u64,
    registry: Option<Weak<dyn Deregister>>,
}

impl Subscription {
    pub fn cancel(mut self) {
        self.release();
    }

    pub fn is_active(&self) -> bool {
        self.registry
            .as_ref()
            .is_some_and(|registry| registry.strong_count() > 0)
    }

    fn release(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|weak| weak.upgrade()) {
            registry.deregister(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
