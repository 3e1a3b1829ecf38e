//! Foundation containers.
//!
//! - [`SortedSet`] deduplicated values in ascending order (membership tests, event vocabularies)
//! - [`OrderedSet`] deduplicated values in first-insertion order (script injection lists)
//! - [`Mailbox`] unbounded FIFO for messages awaiting a poll
//!
//! Both sets reject empty values through [`SetValue::is_empty_value`].

mod mailbox;
mod ordered_set;
mod sorted_set;

pub use mailbox::Mailbox;
pub use ordered_set::OrderedSet;
pub use sorted_set::SortedSet;

use std::borrow::Cow;
use std::path::PathBuf;

/// Values storable in the unique containers.
///
/// Rust has no null; an *empty* value (empty string, empty path) plays its
/// role and is refused with [`CollectionError::InvalidValue`](crate::CollectionError::InvalidValue).
pub trait SetValue: Ord + Clone {
    /// Returns `true` if the value must not be stored.
    fn is_empty_value(&self) -> bool {
        false
    }
}

impl SetValue for String {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl SetValue for &str {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl SetValue for Cow<'_, str> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

impl SetValue for PathBuf {
    fn is_empty_value(&self) -> bool {
        self.as_os_str().is_empty()
    }
}

macro_rules! plain_set_value {
    ($($t:ty),*) => { $(impl SetValue for $t {})* };
}

plain_set_value!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, char, bool);
