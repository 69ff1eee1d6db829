//! Capacity-1 mailbox
//!
//! A single slot guarded by a mutex. Used both as the worker input slot
//! (with a bounded wait on the consumer side) and as the latest-wins result
//! slot.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Single-slot mailbox
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    /// Store `item` only if the slot is empty; hands it back otherwise
    pub fn try_put(&self, item: T) -> Result<(), T> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(item);
        }
        *slot = Some(item);
        drop(slot);
        self.ready.notify_one();
        Ok(())
    }

    /// Store `item`, returning whatever it displaced
    pub fn replace(&self, item: T) -> Option<T> {
        let previous = self.slot.lock().replace(item);
        self.ready.notify_one();
        previous
    }

    /// Take the item without waiting
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Take the item, waiting up to `timeout` for one to arrive
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            self.ready.wait_for(&mut slot, timeout);
        }
        slot.take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Discard any stored item
    pub fn clear(&self) {
        self.slot.lock().take();
    }
}
