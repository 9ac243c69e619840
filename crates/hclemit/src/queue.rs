//! The lookahead event queue.
//!
//! The preprocessor and emitter both operate on a [`EventQueue`]: a
//! double-ended buffer of [`HclEvent`]s supporting random-access peeks,
//! path-based key lookup, and balanced-run removal. Removal of an
//! attribute always takes the key event and its complete value run in
//! one operation so the queue never holds a dangling key or an orphaned
//! value.

use std::collections::VecDeque;

use crate::{
    error::ErrorKind,
    event::{AttributeKey, BalanceTracker, HclEvent},
    path::AttributePath,
};

/// A buffered run of events for one or more resources.
#[derive(Debug, Default, Clone)]
pub struct EventQueue {
    events: VecDeque<HclEvent>,
}

impl EventQueue {
    /// An empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn enqueue(&mut self, event: HclEvent) {
        self.events.push_back(event);
    }

    /// Removes and returns the front event.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::QueueExhausted`] when the queue is empty.
    pub fn dequeue(&mut self) -> Result<HclEvent, ErrorKind> {
        self.events.pop_front().ok_or(ErrorKind::QueueExhausted)
    }

    /// The front event without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&HclEvent> {
        self.events.front()
    }

    /// The event at `index` from the front.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&HclEvent> {
        self.events.get(index)
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates the buffered events front to back.
    pub fn iter(&self) -> impl Iterator<Item = &HclEvent> {
        self.events.iter()
    }

    /// Paths of every mapping key currently buffered, front to back.
    /// Duplicate paths (list elements) appear once per occurrence.
    #[must_use]
    pub fn key_paths(&self) -> Vec<AttributePath> {
        self.events
            .iter()
            .filter_map(|e| e.as_key().map(|k| k.path.clone()))
            .collect()
    }

    /// Index of the first mapping key whose path equals `path`.
    #[must_use]
    pub fn find_key_by_path(&self, path: &AttributePath) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.as_key().is_some_and(|k| &k.path == path))
    }

    /// The key at `index`, when that event is a mapping key.
    #[must_use]
    pub fn key_at(&self, index: usize) -> Option<&AttributeKey> {
        self.events.get(index).and_then(HclEvent::as_key)
    }

    /// Indices of every buffered key whose path the given key declares
    /// a conflict with, front to back.
    #[must_use]
    pub fn conflicting_attributes(&self, key: &AttributeKey) -> Vec<usize> {
        self.events
            .iter()
            .enumerate()
            .filter(|(_, event)| {
                event
                    .as_key()
                    .is_some_and(|other| key.flags.conflicts_with.contains(&other.path))
            })
            .map(|(index, _)| index)
            .collect()
    }

    /// The extent of the balanced value run starting at `start`:
    /// the number of events from `start` through the event that
    /// returns the run to balance, inclusive. A scalar has extent 1.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::QueueExhausted`] when the run never balances;
    /// [`ErrorKind::UnbalancedEvents`] when end events outnumber starts.
    pub fn balanced_extent(&self, start: usize) -> Result<usize, ErrorKind> {
        let mut tracker = BalanceTracker::new();
        for (offset, event) in self.events.iter().skip(start).enumerate() {
            if tracker.advance(event) {
                return Ok(offset + 1);
            }
            if tracker.underflowed() {
                return Err(ErrorKind::UnbalancedEvents);
            }
        }
        Err(ErrorKind::QueueExhausted)
    }

    /// Removes the first key matching `path` together with its value
    /// run. Returns `false` when no such key is buffered.
    ///
    /// # Errors
    ///
    /// Propagates balance errors from the value run.
    pub fn consume_key(&mut self, path: &AttributePath) -> Result<bool, ErrorKind> {
        let Some(index) = self.find_key_by_path(path) else {
            return Ok(false);
        };
        self.remove_attribute_at(index)?;
        Ok(true)
    }

    /// Removes the key event at `index` and its entire value run.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::UnexpectedEvent`] when `index` is not a mapping key;
    /// balance errors from the value run.
    pub fn remove_attribute_at(&mut self, index: usize) -> Result<(), ErrorKind> {
        match self.events.get(index) {
            Some(HclEvent::MappingKey(_)) => {}
            Some(other) => {
                return Err(ErrorKind::UnexpectedEvent {
                    expected: "MappingKey",
                    actual: other.kind_name(),
                });
            }
            None => return Err(ErrorKind::QueueExhausted),
        }
        let extent = self.balanced_extent(index + 1)?;
        // Key plus its whole value run leave together.
        self.events.drain(index..=index + extent);
        Ok(())
    }

    /// Removes and returns events from the front until `stop` matches.
    /// The matching event itself is removed only when `inclusive` is
    /// set; otherwise it stays at the front.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::QueueExhausted`] when no buffered event matches.
    pub fn consume_until<F>(
        &mut self,
        stop: F,
        inclusive: bool,
    ) -> Result<Vec<HclEvent>, ErrorKind>
    where
        F: Fn(&HclEvent) -> bool,
    {
        let Some(end) = self.events.iter().position(&stop) else {
            return Err(ErrorKind::QueueExhausted);
        };
        let end = end + usize::from(inclusive);
        Ok(self.events.drain(..end).collect())
    }

    /// Events from the front up to the first match of `stop`, without
    /// removing them. The matching event is included only when
    /// `inclusive` is set.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::QueueExhausted`] when no buffered event matches.
    pub fn peek_until<F>(&self, stop: F, inclusive: bool) -> Result<Vec<&HclEvent>, ErrorKind>
    where
        F: Fn(&HclEvent) -> bool,
    {
        let Some(end) = self.events.iter().position(&stop) else {
            return Err(ErrorKind::QueueExhausted);
        };
        Ok(self.events.iter().take(end + usize::from(inclusive)).collect())
    }

    /// Discards the balanced value run at the front of the queue.
    ///
    /// # Errors
    ///
    /// Balance errors from the run.
    pub fn skip_value(&mut self) -> Result<(), ErrorKind> {
        let extent = self.balanced_extent(0)?;
        self.events.drain(..extent);
        Ok(())
    }
}

impl Extend<HclEvent> for EventQueue {
    fn extend<T: IntoIterator<Item = HclEvent>>(&mut self, iter: T) {
        self.events.extend(iter);
    }
}

impl FromIterator<HclEvent> for EventQueue {
    fn from_iter<T: IntoIterator<Item = HclEvent>>(iter: T) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event::ScalarValue, traits::AttributeFlags};

    fn key(name: &str) -> HclEvent {
        HclEvent::MappingKey(AttributeKey::new(
            name,
            AttributePath::new(name),
            AttributeFlags::default(),
        ))
    }

    fn scalar(v: &str) -> HclEvent {
        HclEvent::Scalar(ScalarValue::string(v))
    }

    #[test]
    fn consume_key_removes_scalar_value() {
        let mut queue: EventQueue = [
            key("ami"),
            scalar("ami-123"),
            key("instance_type"),
            scalar("t2.micro"),
        ]
        .into_iter()
        .collect();

        assert!(queue.consume_key(&AttributePath::new("ami")).unwrap());
        assert_eq!(queue.len(), 2);
        assert_eq!(
            queue.peek().and_then(HclEvent::as_key).map(|k| k.name.as_str()),
            Some("instance_type")
        );
    }

    #[test]
    fn consume_key_removes_compound_value() {
        let mut queue: EventQueue = [
            key("tags"),
            HclEvent::MappingStart,
            key("Name"),
            scalar("web"),
            HclEvent::MappingEnd,
            key("ami"),
            scalar("ami-123"),
        ]
        .into_iter()
        .collect();

        assert!(queue.consume_key(&AttributePath::new("tags")).unwrap());
        assert_eq!(queue.len(), 2);
        assert!(queue.find_key_by_path(&AttributePath::new("ami")).is_some());
    }

    #[test]
    fn consume_key_missing_path_is_false() {
        let mut queue: EventQueue = [key("ami"), scalar("ami-123")].into_iter().collect();
        assert!(!queue.consume_key(&AttributePath::new("absent")).unwrap());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn balanced_extent_of_scalar_is_one() {
        let queue: EventQueue = [scalar("x")].into_iter().collect();
        assert_eq!(queue.balanced_extent(0).unwrap(), 1);
    }

    #[test]
    fn balanced_extent_detects_truncation() {
        let queue: EventQueue = [HclEvent::MappingStart, key("a"), scalar("1")]
            .into_iter()
            .collect();
        assert!(matches!(
            queue.balanced_extent(0),
            Err(ErrorKind::QueueExhausted)
        ));
    }

    #[test]
    fn balanced_extent_detects_underflow() {
        let queue: EventQueue = [HclEvent::MappingEnd].into_iter().collect();
        assert!(matches!(
            queue.balanced_extent(0),
            Err(ErrorKind::UnbalancedEvents)
        ));
    }

    #[test]
    fn consume_until_honors_inclusive_flag() {
        let events = [key("a"), scalar("1"), HclEvent::ResourceEnd, key("b")];

        let mut queue: EventQueue = events.clone().into_iter().collect();
        let taken = queue
            .consume_until(|e| matches!(e, HclEvent::ResourceEnd), true)
            .unwrap();
        assert_eq!(taken.len(), 3);
        assert_eq!(queue.len(), 1);

        let mut queue: EventQueue = events.into_iter().collect();
        let taken = queue
            .consume_until(|e| matches!(e, HclEvent::ResourceEnd), false)
            .unwrap();
        assert_eq!(taken.len(), 2);
        // The stop event stays at the front.
        assert!(matches!(queue.peek(), Some(HclEvent::ResourceEnd)));
    }

    #[test]
    fn consume_until_exhaustion_errors() {
        let mut queue: EventQueue = [key("a")].into_iter().collect();
        assert!(matches!(
            queue.consume_until(|e| matches!(e, HclEvent::ResourceEnd), true),
            Err(ErrorKind::QueueExhausted)
        ));
    }

    #[test]
    fn peek_until_leaves_queue_intact() {
        let queue: EventQueue = [key("a"), scalar("1"), HclEvent::ResourceEnd, key("b")]
            .into_iter()
            .collect();
        let inclusive = queue
            .peek_until(|e| matches!(e, HclEvent::ResourceEnd), true)
            .unwrap();
        assert_eq!(inclusive.len(), 3);
        let exclusive = queue
            .peek_until(|e| matches!(e, HclEvent::ResourceEnd), false)
            .unwrap();
        assert_eq!(exclusive.len(), 2);
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn conflicting_attributes_locates_declared_counterparts() {
        let flags = AttributeFlags {
            conflicts_with: vec![
                AttributePath::new("template_url"),
                AttributePath::new("use_previous_template"),
            ],
            ..AttributeFlags::default()
        };
        let subject = AttributeKey::new(
            "template_body",
            AttributePath::new("template_body"),
            flags,
        );

        let queue: EventQueue = [
            key("template_body"),
            scalar("{}"),
            key("template_url"),
            scalar("https://example.com/stack.yaml"),
            key("name"),
            scalar("web"),
        ]
        .into_iter()
        .collect();

        assert_eq!(queue.conflicting_attributes(&subject), [2]);
        assert!(queue.conflicting_attributes(queue.key_at(4).unwrap()).is_empty());
    }

    #[test]
    fn key_paths_normalize_indices() {
        let queue: EventQueue = [
            key("block"),
            HclEvent::SequenceStart,
            HclEvent::MappingStart,
            HclEvent::MappingKey(AttributeKey::new(
                "size",
                AttributePath::new("block.0.size"),
                AttributeFlags::default(),
            )),
            scalar("8"),
            HclEvent::MappingEnd,
            HclEvent::SequenceEnd,
        ]
        .into_iter()
        .collect();

        let paths = queue.key_paths();
        assert_eq!(paths[1].as_str(), "block.*.size");
    }
}
