//! # Sorted unique container.
//!
//! [`SortedSet`] keeps values in a sorted `Vec` and locates them with binary
//! search. Insertion and removal are O(n), lookup is O(log n). Iteration is
//! ascending and yields each value exactly once.

use super::SetValue;
use crate::error::CollectionError;

/// Deduplicated container iterating in ascending order.
///
/// # Example
/// ```
/// use sandrun::collections::SortedSet;
///
/// let mut set = SortedSet::new();
/// assert_eq!(set.add("b".to_string()), Ok(true));
/// assert_eq!(set.add("a".to_string()), Ok(true));
/// assert_eq!(set.add("b".to_string()), Ok(false));
/// assert!(set.add(String::new()).is_err());
///
/// let all: Vec<_> = set.iter().cloned().collect();
/// assert_eq!(all, vec!["a", "b"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedSet<T> {
    data: Vec<T>,
}

impl<T> Default for SortedSet<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: SetValue> SortedSet<T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from `values`, failing on the first empty value.
    pub fn from_values<I>(values: I) -> Result<Self, CollectionError>
    where
        I: IntoIterator<Item = T>,
    {
        let mut set = Self::new();
        for v in values {
            set.add(v)?;
        }
        Ok(set)
    }

    /// Adds `val`; returns `true` if it was not present yet.
    pub fn add(&mut self, val: T) -> Result<bool, CollectionError> {
        if val.is_empty_value() {
            return Err(CollectionError::InvalidValue);
        }
        match self.data.binary_search(&val) {
            Ok(_) => Ok(false),
            Err(at) => {
                self.data.insert(at, val);
                Ok(true)
            }
        }
    }

    /// Is `val` stored?
    pub fn has(&self, val: &T) -> bool {
        self.data.binary_search(val).is_ok()
    }

    /// Removes `val`; returns `true` if it existed.
    pub fn delete(&mut self, val: &T) -> bool {
        match self.data.binary_search(val) {
            Ok(at) => {
                self.data.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    /// Removes all values.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterates values in ascending order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}

impl<'a, T> IntoIterator for &'a SortedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}
