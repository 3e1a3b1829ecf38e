//! # FIFO mailbox for a poll-only consumer.
//!
//! Items leave in exactly the order they entered. The mailbox is unbounded:
//! `enqueue` always succeeds. Two dequeue flavours exist:
//!
//! - [`Mailbox::dequeue`] treats an empty mailbox as a programming error
//!   ([`CollectionError::Underflow`]);
//! - [`Mailbox::dequeue_or_none`] is used by the polling path, where "nothing
//!   to deliver right now" is the normal answer.

use std::collections::VecDeque;

use crate::error::CollectionError;

/// Unbounded FIFO of outbound items.
#[derive(Debug)]
pub struct Mailbox<T> {
    items: VecDeque<T>,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `item`. Always returns `true`.
    pub fn enqueue(&mut self, item: T) -> bool {
        self.items.push_back(item);
        true
    }

    /// Removes the oldest item, failing on an empty mailbox.
    pub fn dequeue(&mut self) -> Result<T, CollectionError> {
        self.items.pop_front().ok_or(CollectionError::Underflow)
    }

    /// Removes the oldest item, if any.
    pub fn dequeue_or_none(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Removes every pending item, oldest first.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
