//! Queue preprocessing.
//!
//! Before emission the event queue is rewritten in three fixed-order
//! passes: empty optional attributes are dropped, computed-only
//! attributes are dropped, then conflicting attribute pairs are reduced
//! to a single winner. Later passes assume earlier deletions already
//! happened. Preprocessing is idempotent; running it twice leaves the
//! queue unchanged.

use tracing::{debug, trace};

use crate::{
    content::AttributeContent,
    error::ErrorKind,
    event::HclEvent,
    queue::EventQueue,
    traits::{MERGED_TAGS_ATTRIBUTE, ResourceTraits},
};

/// Rewrites an event queue according to one resource's trait entry.
#[derive(Debug)]
pub struct Preprocessor<'a> {
    traits: &'a ResourceTraits,
}

impl<'a> Preprocessor<'a> {
    /// A preprocessor applying the given trait entry.
    #[must_use]
    pub fn new(traits: &'a ResourceTraits) -> Self {
        Self { traits }
    }

    /// Runs all three passes in order.
    ///
    /// # Errors
    ///
    /// Balance errors from malformed runs, and
    /// [`ErrorKind::ConflictResolution`] when a live conflict has no
    /// declared priority ordering.
    pub fn run(&self, queue: &mut EventQueue) -> Result<(), ErrorKind> {
        self.remove_empty_optionals(queue)?;
        self.remove_computed(queue)?;
        self.resolve_conflicts(queue)?;
        Ok(())
    }

    /// Pass 1: delete every optional attribute whose value classifies
    /// as empty, unless a default substitution is declared for it.
    fn remove_empty_optionals(&self, queue: &mut EventQueue) -> Result<(), ErrorKind> {
        let mut index = 0;
        let mut json_depth = 0u32;
        while index < queue.len() {
            match queue.get(index) {
                Some(HclEvent::JsonStart) => json_depth += 1,
                Some(HclEvent::JsonEnd) => {
                    json_depth = json_depth.checked_sub(1).ok_or(ErrorKind::UnbalancedEvents)?;
                }
                Some(HclEvent::MappingKey(key)) if json_depth == 0 => {
                    let path = key.path.clone();
                    if key.flags.optional && self.traits.default_for(&path).is_none() {
                        let content =
                            AttributeContent::analyze_at(queue, index + 1, &path, self.traits)?;
                        if content.is_empty() {
                            trace!(path = path.as_str(), ?content, "dropping empty optional");
                            queue.remove_attribute_at(index)?;
                            continue;
                        }
                    }
                }
                _ => {}
            }
            index += 1;
        }
        Ok(())
    }

    /// Pass 2: delete computed-only attributes unconditionally. The
    /// merged-tags attribute is always deleted at the top level no
    /// matter how it is flagged; it is a derived artifact.
    fn remove_computed(&self, queue: &mut EventQueue) -> Result<(), ErrorKind> {
        let mut index = 0;
        let mut json_depth = 0u32;
        while index < queue.len() {
            match queue.get(index) {
                Some(HclEvent::JsonStart) => json_depth += 1,
                Some(HclEvent::JsonEnd) => {
                    json_depth = json_depth.checked_sub(1).ok_or(ErrorKind::UnbalancedEvents)?;
                }
                Some(HclEvent::MappingKey(key)) if json_depth == 0 => {
                    let is_merged_tags = key.path.as_str() == MERGED_TAGS_ATTRIBUTE;
                    if key.flags.computed || is_merged_tags {
                        trace!(path = key.path.as_str(), "dropping computed attribute");
                        queue.remove_attribute_at(index)?;
                        continue;
                    }
                }
                _ => {}
            }
            index += 1;
        }
        Ok(())
    }

    /// Pass 3: for every surviving attribute with declared conflicts,
    /// keep exactly one side of each live conflict.
    ///
    /// An optional empty side is dropped outright. When both sides hold
    /// values, the declared conflict group decides: the member listed
    /// later in the group wins.
    fn resolve_conflicts(&self, queue: &mut EventQueue) -> Result<(), ErrorKind> {
        'restart: loop {
            let mut index = 0;
            let mut json_depth = 0u32;
            while index < queue.len() {
                match queue.get(index) {
                    Some(HclEvent::JsonStart) => json_depth += 1,
                    Some(HclEvent::JsonEnd) => {
                        json_depth =
                            json_depth.checked_sub(1).ok_or(ErrorKind::UnbalancedEvents)?;
                    }
                    Some(HclEvent::MappingKey(key)) if json_depth == 0 => {
                        let key = key.clone();
                        if !key.flags.conflicts_with.is_empty() {
                            let content = AttributeContent::analyze_at(
                                queue,
                                index + 1,
                                &key.path,
                                self.traits,
                            )?;
                            if key.flags.optional && content.is_empty() {
                                debug!(
                                    path = key.path.as_str(),
                                    "dropping empty side of conflict"
                                );
                                queue.remove_attribute_at(index)?;
                                continue 'restart;
                            }
                            for other_index in queue.conflicting_attributes(&key) {
                                let Some(other) = queue.key_at(other_index).cloned() else {
                                    continue;
                                };
                                let other_content = AttributeContent::analyze_at(
                                    queue,
                                    other_index + 1,
                                    &other.path,
                                    self.traits,
                                )?;
                                if other.flags.optional && other_content.is_empty() {
                                    debug!(
                                        path = other.path.as_str(),
                                        "dropping empty side of conflict"
                                    );
                                    queue.remove_attribute_at(other_index)?;
                                    continue 'restart;
                                }
                                let Some(group) =
                                    self.traits.conflict_group(&key.path, &other.path)
                                else {
                                    return Err(ErrorKind::ConflictResolution {
                                        first: key.path.as_str().to_owned(),
                                        second: other.path.as_str().to_owned(),
                                    });
                                };
                                let my_rank = group.iter().position(|p| p == &key.path);
                                let other_rank = group.iter().position(|p| p == &other.path);
                                let loser = if other_rank > my_rank {
                                    index
                                } else {
                                    other_index
                                };
                                debug!(
                                    winner = if loser == index {
                                        other.path.as_str()
                                    } else {
                                        key.path.as_str()
                                    },
                                    "resolving attribute conflict"
                                );
                                queue.remove_attribute_at(loser)?;
                                continue 'restart;
                            }
                        }
                    }
                    _ => {}
                }
                index += 1;
            }
            return Ok(());
        }
    }
}
