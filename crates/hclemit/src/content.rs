//! Classification of attribute values by lookahead.
//!
//! The preprocessor and emitter both need to know what kind of value
//! follows a key before consuming it: an empty scalar, an inline
//! mapping, a block, a plain sequence. [`AttributeContent::analyze_at`]
//! answers that by peeking the balanced run in the queue without
//! removing anything.

use crate::{
    error::ErrorKind,
    event::HclEvent,
    path::AttributePath,
    queue::EventQueue,
    traits::ResourceTraits,
};

/// What kind of value sits after a mapping key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeContent {
    /// The key has no value event at all.
    NoValue,
    /// A null scalar.
    Null,
    /// A scalar counting as empty: blank string, false, or near zero.
    Empty,
    /// An explicitly empty string.
    EmptyString,
    /// A compound value holding nothing, or only empty scalars.
    EmptyCollection,
    /// A sequence of mappings rendered as repeated named blocks.
    BlockList,
    /// A mapping rendered as a named block.
    BlockObject,
    /// A plain bracketed sequence.
    Sequence,
    /// An inline braced mapping with `=`.
    Mapping,
    /// A scalar with a meaningful value.
    Value,
}

impl AttributeContent {
    /// Whether this content should vanish when the attribute is optional.
    #[must_use]
    pub fn is_empty(self) -> bool {
        matches!(
            self,
            Self::NoValue | Self::Null | Self::Empty | Self::EmptyString | Self::EmptyCollection
        )
    }

    /// Classifies the value run starting at `index` in the queue.
    ///
    /// `path` is the attribute's normalized path and `traits` the entry
    /// for the enclosing resource; together they decide whether a
    /// mapping renders as an inline map or a block.
    ///
    /// # Errors
    ///
    /// Propagates balance errors when the run is truncated or malformed.
    pub fn analyze_at(
        queue: &EventQueue,
        index: usize,
        path: &AttributePath,
        traits: &ResourceTraits,
    ) -> Result<Self, ErrorKind> {
        let Some(event) = queue.get(index) else {
            return Ok(Self::NoValue);
        };
        match event {
            HclEvent::Scalar(scalar) => Ok(Self::classify_scalar(scalar)),
            HclEvent::JsonStart => Ok(Self::Value),
            HclEvent::SequenceStart => {
                if matches!(queue.get(index + 1), Some(HclEvent::SequenceEnd)) {
                    return Ok(Self::EmptyCollection);
                }
                if Self::all_scalars_empty(queue, index)? {
                    return Ok(Self::EmptyCollection);
                }
                if matches!(queue.get(index + 1), Some(HclEvent::MappingStart))
                    && Self::elements_all_mappings(queue, index)?
                    && !traits.is_non_block(path)
                {
                    // Single blocks persisted as one-element sequences
                    // render as one block, not a repeated list.
                    if traits.is_block_object(path) {
                        Ok(Self::BlockObject)
                    } else {
                        Ok(Self::BlockList)
                    }
                } else {
                    Ok(Self::Sequence)
                }
            }
            HclEvent::MappingStart => {
                if matches!(queue.get(index + 1), Some(HclEvent::MappingEnd)) {
                    return Ok(Self::EmptyCollection);
                }
                if Self::all_scalars_empty(queue, index)? {
                    return Ok(Self::EmptyCollection);
                }
                if traits.is_non_block(path) {
                    Ok(Self::Mapping)
                } else {
                    Ok(Self::BlockObject)
                }
            }
            other => Err(ErrorKind::UnexpectedEvent {
                expected: "a value event",
                actual: other.kind_name(),
            }),
        }
    }

    fn classify_scalar(scalar: &crate::event::ScalarValue) -> Self {
        match &scalar.raw {
            None => Self::Null,
            Some(raw) if raw.is_empty() => Self::EmptyString,
            Some(_) if scalar.is_empty() => Self::Empty,
            Some(_) => Self::Value,
        }
    }

    /// Whether every direct element of the sequence starting at `start`
    /// is a mapping. A mixed sequence cannot render as a block list.
    fn elements_all_mappings(queue: &EventQueue, start: usize) -> Result<bool, ErrorKind> {
        let extent = queue.balanced_extent(start)?;
        let mut depth = 0i32;
        for offset in 0..extent {
            let Some(event) = queue.get(start + offset) else {
                return Err(ErrorKind::QueueExhausted);
            };
            if depth == 1
                && !matches!(event, HclEvent::SequenceEnd | HclEvent::MappingStart)
            {
                return Ok(false);
            }
            depth += i32::from(event.nesting_delta());
        }
        Ok(true)
    }

    /// Whether every scalar in the balanced run at `start` is empty.
    /// A collection of empty strings, nulls and zeros carries no
    /// information and is treated as empty itself.
    fn all_scalars_empty(queue: &EventQueue, start: usize) -> Result<bool, ErrorKind> {
        let extent = queue.balanced_extent(start)?;
        for offset in 0..extent {
            if let Some(HclEvent::Scalar(scalar)) = queue.get(start + offset) {
                if !scalar.is_empty() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event::{AttributeKey, ScalarValue},
        traits::AttributeFlags,
    };

    fn key(name: &str) -> HclEvent {
        HclEvent::MappingKey(AttributeKey::new(
            name,
            AttributePath::new(name),
            AttributeFlags::default(),
        ))
    }

    fn analyze(events: Vec<HclEvent>, path: &str, traits: &ResourceTraits) -> AttributeContent {
        let queue: EventQueue = events.into_iter().collect();
        AttributeContent::analyze_at(&queue, 0, &AttributePath::new(path), traits).unwrap()
    }

    #[test]
    fn scalar_classification() {
        let traits = ResourceTraits::default();
        assert_eq!(
            analyze(vec![HclEvent::Scalar(ScalarValue::null())], "a", &traits),
            AttributeContent::Null
        );
        assert_eq!(
            analyze(vec![HclEvent::Scalar(ScalarValue::string(""))], "a", &traits),
            AttributeContent::EmptyString
        );
        assert_eq!(
            analyze(vec![HclEvent::Scalar(ScalarValue::bare("false"))], "a", &traits),
            AttributeContent::Empty
        );
        assert_eq!(
            analyze(vec![HclEvent::Scalar(ScalarValue::string("x"))], "a", &traits),
            AttributeContent::Value
        );
    }

    #[test]
    fn empty_sequence_is_empty_collection() {
        let traits = ResourceTraits::default();
        assert_eq!(
            analyze(
                vec![HclEvent::SequenceStart, HclEvent::SequenceEnd],
                "a",
                &traits
            ),
            AttributeContent::EmptyCollection
        );
    }

    #[test]
    fn sequence_of_empty_scalars_is_empty_collection() {
        let traits = ResourceTraits::default();
        assert_eq!(
            analyze(
                vec![
                    HclEvent::SequenceStart,
                    HclEvent::Scalar(ScalarValue::string("")),
                    HclEvent::Scalar(ScalarValue::null()),
                    HclEvent::SequenceEnd,
                ],
                "a",
                &traits
            ),
            AttributeContent::EmptyCollection
        );
    }

    #[test]
    fn sequence_of_mappings_is_block_list() {
        let traits = ResourceTraits::default();
        assert_eq!(
            analyze(
                vec![
                    HclEvent::SequenceStart,
                    HclEvent::MappingStart,
                    key("size"),
                    HclEvent::Scalar(ScalarValue::bare("8")),
                    HclEvent::MappingEnd,
                    HclEvent::SequenceEnd,
                ],
                "ebs_block_device",
                &traits
            ),
            AttributeContent::BlockList
        );
    }

    #[test]
    fn mixed_sequence_is_not_a_block_list() {
        let traits = ResourceTraits::default();
        assert_eq!(
            analyze(
                vec![
                    HclEvent::SequenceStart,
                    HclEvent::MappingStart,
                    key("k"),
                    HclEvent::Scalar(ScalarValue::string("v")),
                    HclEvent::MappingEnd,
                    HclEvent::Scalar(ScalarValue::string("loose")),
                    HclEvent::SequenceEnd,
                ],
                "entries",
                &traits
            ),
            AttributeContent::Sequence
        );
    }

    #[test]
    fn non_block_sequence_of_mappings_stays_sequence() {
        let mut traits = ResourceTraits::default();
        traits.non_block_attributes.insert(AttributePath::new("items"));
        assert_eq!(
            analyze(
                vec![
                    HclEvent::SequenceStart,
                    HclEvent::MappingStart,
                    key("k"),
                    HclEvent::Scalar(ScalarValue::string("v")),
                    HclEvent::MappingEnd,
                    HclEvent::SequenceEnd,
                ],
                "items",
                &traits
            ),
            AttributeContent::Sequence
        );
    }

    #[test]
    fn tags_mapping_is_inline() {
        let traits = ResourceTraits::universal();
        assert_eq!(
            analyze(
                vec![
                    HclEvent::MappingStart,
                    key("Name"),
                    HclEvent::Scalar(ScalarValue::string("web")),
                    HclEvent::MappingEnd,
                ],
                "tags",
                &traits
            ),
            AttributeContent::Mapping
        );
    }

    #[test]
    fn bare_mapping_defaults_to_block_object() {
        let traits = ResourceTraits::default();
        assert_eq!(
            analyze(
                vec![
                    HclEvent::MappingStart,
                    key("enabled"),
                    HclEvent::Scalar(ScalarValue::bare("true")),
                    HclEvent::MappingEnd,
                ],
                "versioning",
                &traits
            ),
            AttributeContent::BlockObject
        );
    }

    #[test]
    fn declared_block_object_unwraps_single_element_sequence() {
        let mut traits = ResourceTraits::default();
        traits
            .block_object_attributes
            .insert(AttributePath::new("timeouts_block"));
        assert_eq!(
            analyze(
                vec![
                    HclEvent::SequenceStart,
                    HclEvent::MappingStart,
                    key("create"),
                    HclEvent::Scalar(ScalarValue::string("10m")),
                    HclEvent::MappingEnd,
                    HclEvent::SequenceEnd,
                ],
                "timeouts_block",
                &traits
            ),
            AttributeContent::BlockObject
        );
    }
}
