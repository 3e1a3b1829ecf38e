//! # Closed-vocabulary event bus.
//!
//! [`EventBus`] is a synchronous publish/subscribe primitive. Each instance
//! accepts a fixed set of event names (its *vocabulary*); subscribing to or
//! dispatching any other name fails with [`BusError::UnknownEvent`].
//!
//! ## Architecture
//! ```text
//! subscribe(name, handler, Invocations) ──► listeners[name] = [L1, L2, ...]
//!                                                 (subscription order)
//! dispatch(name, &args)
//!     ├─► lock: check vocabulary, snapshot listeners[name] with budget left
//!     │         decrement every snapshotted counter
//!     ├─► unlock
//!     ├─► invoke snapshot in order: L1(&args), L2(&args), ...
//!     └─► lock: drop listeners whose counter reached zero
//! ```
//!
//! ## Rules
//! - **Ordering**: listeners run in subscription order.
//! - **Bounded invocations**: a listener registered with `AtMost(k)` runs
//!   exactly `min(k, dispatches)` times; `Unlimited` never expires.
//!   An exhausted listener is removed once its last invocation returned, so
//!   it still counts in [`EventBus::listener_count`] while that call runs.
//! - **Re-entrancy**: handlers may subscribe or dispatch on the same bus.
//!   Listeners added during a dispatch first run on the next dispatch.
//! - **No lock held while handlers run.**

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::collections::SortedSet;
use crate::error::BusError;

/// Shared event handler. Context is whatever the closure captures.
pub type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// How many times a listener may be invoked before it is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Invocations {
    /// Runs on every dispatch.
    #[default]
    Unlimited,
    /// Runs at most `n` times.
    AtMost(NonZeroU32),
}

impl Invocations {
    /// Exactly one invocation.
    pub const ONCE: Invocations = Invocations::AtMost(NonZeroU32::MIN);

    /// Builds a limit from a plain count; `0` means unlimited.
    pub fn at_most(n: u32) -> Self {
        NonZeroU32::new(n).map_or(Invocations::Unlimited, Invocations::AtMost)
    }

    fn remaining(self) -> Option<u32> {
        match self {
            Invocations::Unlimited => None,
            Invocations::AtMost(n) => Some(n.get()),
        }
    }
}

struct Listener<A> {
    handler: Handler<A>,
    /// `None` = unlimited.
    remaining: Option<u32>,
}

struct Inner<A> {
    vocabulary: SortedSet<String>,
    listeners: HashMap<String, Vec<Listener<A>>>,
}

/// Typed publish/subscribe bus with a closed vocabulary.
///
/// `A` is the argument type every handler receives by reference.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use sandrun::{EventBus, Invocations};
///
/// let bus: EventBus<String> = EventBus::new("demo", ["ping"]).unwrap();
/// let hits = Arc::new(AtomicU32::new(0));
/// let h = hits.clone();
/// bus.subscribe("ping", move |_msg: &String| { h.fetch_add(1, Ordering::SeqCst); }, Invocations::ONCE)
///     .unwrap();
///
/// assert!(bus.dispatch("ping", &"a".to_string()).unwrap());
/// assert!(!bus.dispatch("ping", &"b".to_string()).unwrap());
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// assert!(bus.dispatch("pong", &"c".to_string()).is_err());
/// ```
pub struct EventBus<A> {
    owner: Arc<str>,
    inner: Mutex<Inner<A>>,
}

impl<A> EventBus<A> {
    /// Creates a bus owned by `owner` accepting exactly `vocabulary`.
    pub fn new<I, S>(owner: impl Into<Arc<str>>, vocabulary: I) -> Result<Self, BusError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let vocabulary = SortedSet::from_values(vocabulary.into_iter().map(Into::into))?;
        Ok(Self {
            owner: owner.into(),
            inner: Mutex::new(Inner {
                vocabulary,
                listeners: HashMap::new(),
            }),
        })
    }

    /// Owner label (diagnostics only).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Subscribes `handler` to `event` for at most `invocations` dispatches.
    pub fn subscribe<F>(&self, event: &str, handler: F, invocations: Invocations) -> Result<(), BusError>
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.subscribe_arc(event, Arc::new(handler), invocations)
    }

    /// Same as [`subscribe`](Self::subscribe) with an already shared handler.
    pub fn subscribe_arc(
        &self,
        event: &str,
        handler: Handler<A>,
        invocations: Invocations,
    ) -> Result<(), BusError> {
        let mut inner = self.inner.lock();
        self.ensure_known(&inner, event)?;
        inner
            .listeners
            .entry(event.to_string())
            .or_default()
            .push(Listener {
                handler,
                remaining: invocations.remaining(),
            });
        Ok(())
    }

    /// Shorthand for an unlimited subscription.
    pub fn on<F>(&self, event: &str, handler: F) -> Result<(), BusError>
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.subscribe(event, handler, Invocations::Unlimited)
    }

    /// Shorthand for a single-shot subscription.
    pub fn once<F>(&self, event: &str, handler: F) -> Result<(), BusError>
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.subscribe(event, handler, Invocations::ONCE)
    }

    /// Invokes every listener of `event` with `args`.
    ///
    /// Returns `true` if at least one listener ran.
    pub fn dispatch(&self, event: &str, args: &A) -> Result<bool, BusError> {
        let (snapshot, expiring) = {
            let mut inner = self.inner.lock();
            self.ensure_known(&inner, event)?;
            let Some(list) = inner.listeners.get_mut(event) else {
                return Ok(false);
            };
            let mut expiring = false;
            let snapshot: Vec<Handler<A>> = list
                .iter_mut()
                .filter(|l| l.remaining != Some(0))
                .map(|l| {
                    if let Some(n) = l.remaining.as_mut() {
                        *n -= 1;
                        expiring |= *n == 0;
                    }
                    Arc::clone(&l.handler)
                })
                .collect();
            (snapshot, expiring)
        };

        for handler in &snapshot {
            handler(args);
        }

        if expiring {
            if let Some(list) = self.inner.lock().listeners.get_mut(event) {
                list.retain(|l| l.remaining != Some(0));
            }
        }
        Ok(!snapshot.is_empty())
    }

    /// Adds `event` to the vocabulary.
    pub fn extend_vocabulary(&self, event: impl Into<String>) -> Result<bool, BusError> {
        Ok(self.inner.lock().vocabulary.add(event.into())?)
    }

    /// Replaces the vocabulary. Listeners of dropped names stay registered
    /// but become unreachable until the name is accepted again.
    pub fn replace_vocabulary<I, S>(&self, events: I) -> Result<(), BusError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let vocabulary = SortedSet::from_values(events.into_iter().map(Into::into))?;
        self.inner.lock().vocabulary = vocabulary;
        Ok(())
    }

    /// Accepted event names, ascending.
    pub fn vocabulary(&self) -> Vec<String> {
        self.inner.lock().vocabulary.iter().cloned().collect()
    }

    /// Is `event` part of the vocabulary?
    pub fn accepts(&self, event: &str) -> bool {
        self.inner.lock().vocabulary.has(&event.to_string())
    }

    /// Number of listeners registered for `event`, including one whose last
    /// invocation is still running.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner
            .lock()
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }

    fn ensure_known(&self, inner: &Inner<A>, event: &str) -> Result<(), BusError> {
        if inner.vocabulary.has(&event.to_string()) {
            Ok(())
        } else {
            Err(BusError::UnknownEvent {
                owner: self.owner.to_string(),
                event: event.to_string(),
            })
        }
    }
}

impl<A> fmt::Debug for EventBus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventBus")
            .field("owner", &self.owner)
            .field("vocabulary", &inner.vocabulary)
            .field("listeners", &inner.listeners.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
