// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Wait-list shared by the event types.
//!
//! Waiter nodes live in a slab addressed by generational keys; a FIFO of
//! keys gives wake order. A node is freed either when its waiter collects
//! the delivered value or when the waiting future is dropped. Keys of freed
//! nodes may linger in the FIFO, where a generation mismatch marks them
//! stale; the FIFO is compacted once stale keys outnumber live ones.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::panic::Location;
use std::task::Poll;

use crate::continuation::Continuation;

/// Stale keys tolerated in the FIFO before it is compacted.
const COMPACT_SLACK: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WaitKey {
    index: u32,
    generation: u32,
}

enum Node<T> {
    Waiting(Continuation),
    Notified(T),
}

struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

pub(crate) struct WaitList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    order: VecDeque<WaitKey>,
    waiting: usize,
}

impl<T> WaitList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: VecDeque::new(),
            waiting: 0,
        }
    }

    /// Waiters registered and not yet notified.
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn push(&mut self, cont: Continuation) -> WaitKey {
        let node = Some(Node::Waiting(cont));
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = node;
                WaitKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
                self.slots.push(Slot {
                    generation: 0,
                    node,
                });
                WaitKey {
                    index,
                    generation: 0,
                }
            }
        };
        self.order.push_back(key);
        self.waiting += 1;
        key
    }

    fn slot_mut(&mut self, key: WaitKey) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation && slot.node.is_some())
    }

    fn release(&mut self, key: WaitKey) -> Option<Node<T>> {
        let slot = self.slot_mut(key)?;
        let node = slot.node.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        if matches!(node, Some(Node::Waiting(_))) {
            self.waiting -= 1;
            self.compact();
        }
        node
    }

    /// Drop stale keys from the FIFO when they make up most of it.
    fn compact(&mut self) {
        if self.order.len() <= 2 * self.waiting + COMPACT_SLACK {
            return;
        }
        let slots = &self.slots;
        self.order.retain(|key| {
            slots.get(key.index as usize).is_some_and(|slot| {
                slot.generation == key.generation && matches!(slot.node, Some(Node::Waiting(_)))
            })
        });
    }

    /// Deliver `value` to the oldest live waiter and hand back its
    /// continuation for scheduling.
    pub fn notify_next(&mut self, value: T) -> Option<Continuation> {
        while let Some(key) = self.order.pop_front() {
            let Some(slot) = self.slot_mut(key) else {
                continue;
            };
            if let Some(Node::Waiting(cont)) = slot.node.take() {
                slot.node = Some(Node::Notified(value));
                self.waiting -= 1;
                return Some(cont);
            }
        }
        None
    }

    /// Collect the value delivered to `key`, freeing its node. `None` while
    /// the waiter has not been notified.
    pub fn take(&mut self, key: WaitKey) -> Option<T> {
        let slot = self.slot_mut(key)?;
        if !matches!(slot.node, Some(Node::Notified(_))) {
            return None;
        }
        match self.release(key) {
            Some(Node::Notified(value)) => Some(value),
            _ => None,
        }
    }

    /// Forget `key`. Any continuation it held is dropped unresumed.
    #[cfg(test)]
    pub fn remove(&mut self, key: WaitKey) {
        self.release(key);
    }
}

/// One waiter's registration in a `WaitList`, deregistered on drop.
pub(crate) struct Registration<'a, T> {
    list: &'a RefCell<WaitList<T>>,
    key: Option<WaitKey>,
}

impl<'a, T> Registration<'a, T> {
    pub fn new(list: &'a RefCell<WaitList<T>>) -> Self {
        Self { list, key: None }
    }

    pub fn is_registered(&self) -> bool {
        self.key.is_some()
    }

    pub fn list(&self) -> &'a RefCell<WaitList<T>> {
        self.list
    }

    /// First call parks the running task; later calls yield the delivered
    /// value once a trigger has written it.
    pub fn poll_value(&mut self, at: &'static Location<'static>) -> Poll<T> {
        let Some(key) = self.key else {
            let cont = Continuation::capture(at);
            self.key = Some(self.list.borrow_mut().push(cont));
            return Poll::Pending;
        };
        match self.list.borrow_mut().take(key) {
            Some(value) => {
                self.key = None;
                Poll::Ready(value)
            }
            None => Poll::Pending,
        }
    }
}

impl<T> Drop for Registration<'_, T> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // Unlink under the borrow, drop the node after releasing it.
            let node = self.list.borrow_mut().release(key);
            drop(node);
        }
    }
}
