//! # Insertion-ordered unique container.
//!
//! [`OrderedSet`] deduplicates like [`SortedSet`](super::SortedSet) but
//! iterates in first-insertion order. Script injection lists need this: a
//! library must be loaded before the scripts that use it.

use std::collections::BTreeSet;

use super::SetValue;
use crate::error::CollectionError;

/// Deduplicated sequence that remembers first-insertion order.
///
/// # Example
/// ```
/// use sandrun::collections::OrderedSet;
///
/// let mut scripts = OrderedSet::new();
/// scripts.add("lib/events.js").unwrap();
/// scripts.add("browser/bus.js").unwrap();
/// scripts.add("lib/events.js").unwrap();
///
/// let order: Vec<_> = scripts.iter().copied().collect();
/// assert_eq!(order, vec!["lib/events.js", "browser/bus.js"]);
/// ```
#[derive(Debug, Clone)]
pub struct OrderedSet<T: Ord> {
    order: Vec<T>,
    members: BTreeSet<T>,
}

impl<T: Ord> Default for OrderedSet<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            members: BTreeSet::new(),
        }
    }
}

impl<T: SetValue> OrderedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `val` at the end unless already present; returns `true` if new.
    pub fn add(&mut self, val: T) -> Result<bool, CollectionError> {
        if val.is_empty_value() {
            return Err(CollectionError::InvalidValue);
        }
        if !self.members.insert(val.clone()) {
            return Ok(false);
        }
        self.order.push(val);
        Ok(true)
    }

    /// Adds every value of `values`, keeping their relative order.
    pub fn extend<I>(&mut self, values: I) -> Result<(), CollectionError>
    where
        I: IntoIterator<Item = T>,
    {
        for v in values {
            self.add(v)?;
        }
        Ok(())
    }

    pub fn has(&self, val: &T) -> bool {
        self.members.contains(val)
    }

    /// Removes `val`; later values keep their relative order.
    pub fn delete(&mut self, val: &T) -> bool {
        if !self.members.remove(val) {
            return false;
        }
        self.order.retain(|v| v != val);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates values in first-insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn keeps_first_insertion_order() {
        let mut set = OrderedSet::new();
        set.extend(["c", "a", "b", "a", "c"]).unwrap();
        let all: Vec<&str> = set.iter().copied().collect();
        assert_eq!(all, vec!["c", "a", "b"]);
    }

    #[test]
    fn rejects_empty_path() {
        let mut set: OrderedSet<PathBuf> = OrderedSet::new();
        assert_eq!(set.add(PathBuf::new()), Err(CollectionError::InvalidValue));
        assert_eq!(set.add(PathBuf::from("init.js")), Ok(true));
        assert!(set.has(&PathBuf::from("init.js")));
    }

    #[test]
    fn delete_then_readd_moves_to_end() {
        let mut set = OrderedSet::new();
        set.extend([1u32, 2, 3]).unwrap();
        assert!(set.delete(&1));
        assert!(!set.delete(&1));
        assert_eq!(set.add(1), Ok(true));
        let all: Vec<u32> = set.iter().copied().collect();
        assert_eq!(all, vec![2, 3, 1]);
    }
}
