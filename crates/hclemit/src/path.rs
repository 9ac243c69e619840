//! Attribute paths and the lock-step path stack.
//!
//! An [`AttributePath`] identifies an attribute's position within a
//! resource as a dotted string. Sequence indices are normalized to the
//! `*` placeholder so trait-table lookups are index-independent:
//! `root_block_device.0.iops` and `root_block_device.3.iops` both
//! normalize to `root_block_device.*.iops`.
//!
//! The [`PathStack`] is mutated in lock-step with the event walk: a key
//! segment is pushed for every mapping key and popped exactly once when
//! its value completes; an index segment brackets every sequence. The
//! stack must be empty between resources.

use serde::{Deserialize, Serialize};

/// Placeholder that replaces sequence indices in normalized paths.
pub const INDEX_PLACEHOLDER: &str = "*";

/// A normalized, dotted attribute path.
///
/// Deserialization goes through [`AttributePath::new`] so paths written
/// with literal indices in a trait document normalize the same way as
/// paths computed during the walk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AttributePath(String);

impl From<String> for AttributePath {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<AttributePath> for String {
    fn from(p: AttributePath) -> Self {
        p.0
    }
}

impl AttributePath {
    /// Builds a path from a dotted string, normalizing numeric segments
    /// to [`INDEX_PLACEHOLDER`].
    #[must_use]
    pub fn new(dotted: &str) -> Self {
        let normalized: Vec<&str> = dotted
            .split('.')
            .map(|seg| {
                if !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit()) {
                    INDEX_PLACEHOLDER
                } else {
                    seg
                }
            })
            .collect();
        Self(normalized.join("."))
    }

    /// The normalized path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the empty path (between resources).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AttributePath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index,
}

/// Stack of path segments maintained alongside the event walk.
#[derive(Debug, Default)]
pub struct PathStack {
    segments: Vec<Segment>,
}

impl PathStack {
    /// An empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a key segment for an encountered mapping key.
    pub fn push_key(&mut self, name: &str) {
        self.segments.push(Segment::Key(name.to_owned()));
    }

    /// Pushes an index placeholder for an entered sequence.
    pub fn push_index(&mut self) {
        self.segments.push(Segment::Index);
    }

    /// Removes the innermost segment. Returns `false` if the stack was
    /// already empty, which indicates a bookkeeping bug in the caller.
    pub fn pop(&mut self) -> bool {
        self.segments.pop().is_some()
    }

    /// Whether the stack holds no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of segments on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The normalized path for the current position.
    #[must_use]
    pub fn current(&self) -> AttributePath {
        let joined: Vec<&str> = self
            .segments
            .iter()
            .map(|seg| match seg {
                Segment::Key(k) => k.as_str(),
                Segment::Index => INDEX_PLACEHOLDER,
            })
            .collect();
        AttributePath(joined.join("."))
    }

    /// The path that `name` would have if pushed at the current position,
    /// without mutating the stack.
    #[must_use]
    pub fn child(&self, name: &str) -> AttributePath {
        let mut path = self.current();
        if !path.0.is_empty() {
            path.0.push('.');
        }
        path.0.push_str(name);
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_indices() {
        let p = AttributePath::new("root_block_device.0.iops");
        assert_eq!(p.as_str(), "root_block_device.*.iops");
        assert_eq!(AttributePath::new("tags").as_str(), "tags");
        assert_eq!(AttributePath::new("ingress.12.cidr_blocks.3").as_str(), "ingress.*.cidr_blocks.*");
    }

    #[test]
    fn non_numeric_segments_untouched() {
        // A key that merely contains digits is not an index.
        assert_eq!(AttributePath::new("ebs0.size").as_str(), "ebs0.size");
    }

    #[test]
    fn stack_tracks_nesting() {
        let mut stack = PathStack::new();
        assert!(stack.is_empty());

        stack.push_key("ingress");
        stack.push_index();
        assert_eq!(stack.current().as_str(), "ingress.*");
        assert_eq!(stack.child("from_port").as_str(), "ingress.*.from_port");

        stack.push_key("from_port");
        assert_eq!(stack.current().as_str(), "ingress.*.from_port");

        assert!(stack.pop());
        assert!(stack.pop());
        assert!(stack.pop());
        assert!(stack.is_empty());
        assert!(!stack.pop());
    }

    #[test]
    fn child_of_root() {
        let stack = PathStack::new();
        assert_eq!(stack.child("tags").as_str(), "tags");
    }
}
