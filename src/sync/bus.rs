//! In-process change notification.
//!
//! Each collection has one `watch` channel holding the latest full snapshot.
//! Writers in this process publish synchronously; subscribers always see the
//! newest snapshot, and intermediate ones may be coalesced.

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::{Item, Member};

/// Latest item and member snapshots for this process.
#[derive(Debug)]
pub struct ChangeBus {
    items: watch::Sender<Vec<Item>>,
    members: watch::Sender<Vec<Member>>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    /// Creates a bus with empty snapshots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: watch::channel(Vec::new()).0,
            members: watch::channel(Vec::new()).0,
        }
    }

    /// Replaces the item snapshot and wakes every item subscriber.
    pub fn publish_items(&self, items: Vec<Item>) {
        self.items.send_replace(items);
    }

    /// Replaces the member snapshot and wakes every member subscriber.
    pub fn publish_members(&self, members: Vec<Member>) {
        self.members.send_replace(members);
    }

    /// New receiver positioned at the current item snapshot.
    #[must_use]
    pub fn items(&self) -> watch::Receiver<Vec<Item>> {
        self.items.subscribe()
    }

    /// New receiver positioned at the current member snapshot.
    #[must_use]
    pub fn members(&self) -> watch::Receiver<Vec<Member>> {
        self.members.subscribe()
    }
}

/// A live feed of snapshots.
///
/// The first call to [`Subscription::next`] returns the current snapshot without
/// waiting. Background listeners feeding this subscription are stopped by
/// [`Subscription::unsubscribe`] or on drop.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: watch::Receiver<Vec<T>>,
    initial_pending: bool,
    listeners: Vec<JoinHandle<()>>,
    closed: bool,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: watch::Receiver<Vec<T>>, listeners: Vec<JoinHandle<()>>) -> Self {
        Self {
            rx,
            initial_pending: true,
            listeners,
            closed: false,
        }
    }

    /// Stops delivery and releases listeners. Safe to call repeatedly.
    pub fn unsubscribe(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
        self.closed = true;
    }

    /// Whether snapshots are still being delivered.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.closed
    }
}

impl<T: Clone> Subscription<T> {
    /// Waits for the next snapshot; `None` once unsubscribed or the bus is gone.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        if self.closed {
            return None;
        }
        if self.initial_pending {
            self.initial_pending = false;
            return Some(self.rx.borrow_and_update().clone());
        }
        match self.rx.changed().await {
            Ok(()) if !self.closed => Some(self.rx.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// The latest snapshot, without consuming a change.
    #[must_use]
    pub fn current(&self) -> Vec<T> {
        self.rx.borrow().clone()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
