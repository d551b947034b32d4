// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::core::cmp::Reverse;
use ::std::{
    cell::RefCell,
    collections::{
        BinaryHeap,
        HashSet,
    },
    fmt,
    rc::Rc,
    time::{
        Duration,
        Instant,
    },
};

//==============================================================================
// Structures
//==============================================================================

/// Identifies one armed timer. Handles are never reused.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TimerHandle(u64);

struct TimerQueueEntry<K> {
    expiry: Instant,
    handle: TimerHandle,
    key: K,
}

/// Timer that holds one or more events for future delivery. Expired events are handed back to the event loop as
/// messages instead of being run as callbacks.
pub struct Timer<K> {
    now: Instant,
    next_handle: u64,
    // Use a reverse to get a min heap.
    heap: BinaryHeap<Reverse<TimerQueueEntry<K>>>,
    armed: HashSet<TimerHandle>,
}

pub struct SharedTimer<K>(Rc<RefCell<Timer<K>>>);

//==============================================================================
// Associate Functions
//==============================================================================

impl<K: Clone> SharedTimer<K> {
    pub fn new(now: Instant) -> Self {
        Self(Rc::new(RefCell::new(Timer {
            now,
            next_handle: 0,
            heap: BinaryHeap::new(),
            armed: HashSet::new(),
        })))
    }

    /// Moves the clock forward to `now` and returns the keys of every armed timer that expired, in expiry order.
    pub fn advance_clock(&self, now: Instant) -> Vec<K> {
        let mut timer = self.0.borrow_mut();
        assert!(timer.now <= now);

        let mut expired: Vec<K> = Vec::new();
        while let Some(Reverse(entry)) = timer.heap.peek() {
            if now < entry.expiry {
                break;
            }
            let entry: TimerQueueEntry<K> = match timer.heap.pop() {
                Some(Reverse(entry)) => entry,
                None => break,
            };
            // Canceled timers below the top are only dropped once they surface.
            if timer.armed.remove(&entry.handle) {
                expired.push(entry.key);
            }
        }
        timer.now = now;
        expired
    }

    pub fn now(&self) -> Instant {
        self.0.borrow().now
    }

    /// Schedules `key` to be delivered once `timeout` has elapsed.
    pub fn arm(&self, timeout: Duration, key: K) -> TimerHandle {
        let mut timer = self.0.borrow_mut();
        timer.discard_canceled();
        let handle: TimerHandle = TimerHandle(timer.next_handle);
        timer.next_handle += 1;
        let expiry: Instant = timer.now + timeout;
        timer.heap.push(Reverse(TimerQueueEntry { expiry, handle, key }));
        timer.armed.insert(handle);
        handle
    }

    /// Cancels a timer. Canceling an expired or already canceled timer is a no-op.
    pub fn cancel(&self, handle: TimerHandle) {
        let mut timer = self.0.borrow_mut();
        timer.armed.remove(&handle);
        timer.discard_canceled();
    }

    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.0.borrow().armed.contains(&handle)
    }

    /// Returns the expiry of the earliest armed timer.
    pub fn next_expiry(&self) -> Option<Instant> {
        let mut timer = self.0.borrow_mut();
        timer.discard_canceled();
        timer.heap.peek().map(|Reverse(entry)| entry.expiry)
    }
}

impl<K> Timer<K> {
    // Pops canceled entries until the top of the heap is armed.
    fn discard_canceled(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            if self.armed.contains(&entry.handle) {
                break;
            }
            self.heap.pop();
        }
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl<K> Clone for SharedTimer<K> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<K> fmt::Debug for SharedTimer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timer = self.0.borrow();
        f.debug_struct("SharedTimer")
            .field("now", &timer.now)
            .field("armed", &timer.armed.len())
            .finish()
    }
}

impl<K> PartialEq for TimerQueueEntry<K> {
    fn eq(&self, other: &TimerQueueEntry<K>) -> bool {
        self.expiry == other.expiry && self.handle == other.handle
    }
}

impl<K> Eq for TimerQueueEntry<K> {}

impl<K> PartialOrd for TimerQueueEntry<K> {
    fn partial_cmp(&self, other: &TimerQueueEntry<K>) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for TimerQueueEntry<K> {
    fn cmp(&self, other: &TimerQueueEntry<K>) -> core::cmp::Ordering {
        // Ties on expiry are broken by arming order.
        self.expiry
            .cmp(&other.expiry)
            .then_with(|| self.handle.0.cmp(&other.handle.0))
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
