//! The front door: state tree in, configuration text out.
//!
//! [`Serializer`] walks one resource's attribute tree depth first,
//! producing the flat event run the rest of the engine operates on,
//! then preprocesses and emits it. One resource is fully buffered,
//! fully preprocessed and fully emitted before the next begins.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    emitter::HclEmitter,
    error::{ErrorKind, HclError},
    event::{AttributeKey, HclEvent, ScalarValue},
    path::{AttributePath, PathStack},
    preprocess::Preprocessor,
    queue::EventQueue,
    traits::{AttributeFlags, POLICY_MARKER_KEY, ResourceTraits, TraitRegistry},
};

/// One typed resource from the persisted state: its type, instance name,
/// and attribute-value tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResource {
    /// The resource type string.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// The instance name.
    pub name: String,
    /// The attribute tree; must be an object.
    pub attributes: serde_json::Value,
}

impl StateResource {
    /// Builds a resource from its parts.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::UnexpectedNode`] when `attributes` is not an object.
    pub fn new(
        resource_type: &str,
        name: &str,
        attributes: serde_json::Value,
    ) -> Result<Self, HclError> {
        if !attributes.is_object() {
            return Err(ErrorKind::UnexpectedNode(format!(
                "attribute tree of {resource_type}.{name} is not an object"
            ))
            .into());
        }
        Ok(Self {
            resource_type: resource_type.to_owned(),
            name: name.to_owned(),
            attributes,
        })
    }
}

/// Serializes state resources to configuration text using a trait
/// registry for per-type emission rules.
#[derive(Debug)]
pub struct Serializer<'a> {
    registry: &'a TraitRegistry,
}

impl<'a> Serializer<'a> {
    /// A serializer using the given registry.
    #[must_use]
    pub fn new(registry: &'a TraitRegistry) -> Self {
        Self { registry }
    }

    /// Serializes one resource to a string.
    ///
    /// # Errors
    ///
    /// Any failure is returned carrying the resource's identity; the
    /// partial output is discarded.
    pub fn serialize(&self, resource: &StateResource) -> Result<String, HclError> {
        let mut out = String::new();
        self.serialize_to(resource, &mut out)?;
        Ok(out)
    }

    /// Serializes a sequence of resources, separated by blank lines.
    ///
    /// Stops at the first failing resource; output already written for
    /// preceding resources is complete and usable.
    ///
    /// # Errors
    ///
    /// The first failure, carrying that resource's identity.
    pub fn serialize_all<W: Write>(
        &self,
        resources: &[StateResource],
        out: &mut W,
    ) -> Result<(), HclError> {
        for resource in resources {
            self.serialize_to(resource, out)?;
        }
        Ok(())
    }

    fn serialize_to<W: Write>(
        &self,
        resource: &StateResource,
        out: &mut W,
    ) -> Result<(), HclError> {
        let traits = self.registry.traits_for(&resource.resource_type);
        debug!(
            resource_type = resource.resource_type.as_str(),
            name = resource.name.as_str(),
            "serializing resource"
        );
        let mut queue = self
            .build_queue(resource, traits)
            .map_err(|kind| kind.for_resource(&resource.resource_type, &resource.name))?;
        Preprocessor::new(traits)
            .run(&mut queue)
            .map_err(|kind| kind.for_resource(&resource.resource_type, &resource.name))?;
        HclEmitter::new(out, traits).emit(&mut queue)
    }

    /// Walks the attribute tree into a flat event run.
    pub(crate) fn build_queue(
        &self,
        resource: &StateResource,
        traits: &ResourceTraits,
    ) -> Result<EventQueue, ErrorKind> {
        let mut queue = EventQueue::new();
        queue.enqueue(HclEvent::ResourceStart {
            resource_type: resource.resource_type.clone(),
            name: resource.name.clone(),
        });

        let serde_json::Value::Object(attributes) = &resource.attributes else {
            return Err(ErrorKind::UnexpectedNode(
                "attribute tree is not an object".to_owned(),
            ));
        };

        let mut path = PathStack::new();
        for (name, value) in attributes {
            self.walk_attribute(name, value, &mut path, traits, &mut queue)?;
        }

        queue.enqueue(HclEvent::ResourceEnd);
        Ok(queue)
    }

    fn walk_attribute(
        &self,
        name: &str,
        value: &serde_json::Value,
        path: &mut PathStack,
        traits: &ResourceTraits,
        queue: &mut EventQueue,
    ) -> Result<(), ErrorKind> {
        let attribute_path = path.child(name);
        let flags = traits.flags_for(&attribute_path);
        queue.enqueue(HclEvent::MappingKey(AttributeKey::new(
            name,
            attribute_path.clone(),
            flags,
        )));
        path.push_key(name);
        self.walk_value(value, &attribute_path, path, traits, queue)?;
        path.pop();
        Ok(())
    }

    fn walk_value(
        &self,
        value: &serde_json::Value,
        attribute_path: &AttributePath,
        path: &mut PathStack,
        traits: &ResourceTraits,
        queue: &mut EventQueue,
    ) -> Result<(), ErrorKind> {
        match value {
            serde_json::Value::Object(map) => {
                queue.enqueue(HclEvent::MappingStart);
                for (name, nested) in map {
                    self.walk_attribute(name, nested, path, traits, queue)?;
                }
                queue.enqueue(HclEvent::MappingEnd);
            }
            serde_json::Value::Array(items) => {
                queue.enqueue(HclEvent::SequenceStart);
                path.push_index();
                let element_path = path.current();
                for item in items {
                    self.walk_value(item, &element_path, path, traits, queue)?;
                }
                path.pop();
                queue.enqueue(HclEvent::SequenceEnd);
            }
            serde_json::Value::String(_) if traits.is_policy_document(attribute_path) => {
                self.walk_policy_document(value, attribute_path, queue)?;
            }
            other => queue.enqueue(HclEvent::Scalar(ScalarValue::from_json(other))),
        }
        Ok(())
    }

    /// An attribute declared as a policy document must hold an embedded
    /// JSON object carrying the policy marker key; its parsed content is
    /// re-walked between `JsonStart` and `JsonEnd` so it renders inside
    /// an encoding-function call.
    fn walk_policy_document(
        &self,
        value: &serde_json::Value,
        attribute_path: &AttributePath,
        queue: &mut EventQueue,
    ) -> Result<(), ErrorKind> {
        let scalar = ScalarValue::from_json(value);
        let Some(document) = scalar.embedded_document() else {
            return Err(ErrorKind::MalformedPolicyDocument {
                path: attribute_path.as_str().to_owned(),
                reason: "value does not parse as a JSON document".to_owned(),
            });
        };
        let is_policy = document
            .as_object()
            .is_some_and(|map| map.contains_key(POLICY_MARKER_KEY));
        if !is_policy {
            return Err(ErrorKind::MalformedPolicyDocument {
                path: attribute_path.as_str().to_owned(),
                reason: format!("document has no \"{POLICY_MARKER_KEY}\" key"),
            });
        }

        queue.enqueue(HclEvent::JsonStart);
        Self::walk_document(&document, queue);
        queue.enqueue(HclEvent::JsonEnd);
        Ok(())
    }

    /// Walks an embedded document. Keys inside it carry document flags:
    /// everything is emitted, nothing is preprocessed away.
    fn walk_document(value: &serde_json::Value, queue: &mut EventQueue) {
        match value {
            serde_json::Value::Object(map) => {
                queue.enqueue(HclEvent::MappingStart);
                for (name, nested) in map {
                    queue.enqueue(HclEvent::MappingKey(AttributeKey::new(
                        name,
                        AttributePath::new(name),
                        AttributeFlags::json_document(),
                    )));
                    Self::walk_document(nested, queue);
                }
                queue.enqueue(HclEvent::MappingEnd);
            }
            serde_json::Value::Array(items) => {
                queue.enqueue(HclEvent::SequenceStart);
                for item in items {
                    Self::walk_document(item, queue);
                }
                queue.enqueue(HclEvent::SequenceEnd);
            }
            other => queue.enqueue(HclEvent::Scalar(ScalarValue::from_json(other))),
        }
    }
}
