//! Per-resource-type trait tables.
//!
//! The persisted state document contains much that does not translate
//! directly to configuration text. A [`ResourceTraits`] entry declares,
//! per resource type, which attribute paths are optional, required or
//! computed-only, which conflict with one another and in what priority
//! order, which map-shaped attributes are *not* nested blocks, and which
//! null attributes receive default substitution values.
//!
//! A [`TraitRegistry`] is an explicit, immutable lookup table from
//! resource-type strings to entries, constructed once and passed into the
//! engine. The universal fallback is an ordinary entry under the
//! [`FALLBACK_TYPE`] key; every type-specific entry is merged with it at
//! construction time so common suppressions (`arn`, `id`, ...) apply
//! everywhere.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::path::AttributePath;

/// Registry key of the universal fallback entry.
pub const FALLBACK_TYPE: &str = "*";

/// The merged-tags artifact attribute, always removed from output even
/// though its schema flags it computed *and* optional.
pub const MERGED_TAGS_ATTRIBUTE: &str = "tags_all";

/// Key that marks an embedded JSON document as a policy document.
pub const POLICY_MARKER_KEY: &str = "Statement";

/// Declarative emission rules for one resource type.
///
/// All paths are normalized (sequence indices as `*`). Deserializable so
/// registries can be maintained as YAML or JSON documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceTraits {
    /// Resource type this entry applies to; [`FALLBACK_TYPE`] for the
    /// universal entry.
    pub resource_type: String,

    /// Attributes that may be omitted when empty.
    pub optional_attributes: BTreeSet<AttributePath>,

    /// Attributes that must appear in output even when empty.
    pub required_attributes: BTreeSet<AttributePath>,

    /// Attributes that are derived by the provisioning system and can
    /// never be supplied by configuration.
    pub computed_attributes: BTreeSet<AttributePath>,

    /// Map-shaped attributes emitted as `key = { ... }` rather than as a
    /// nested block (e.g. tag maps).
    pub non_block_attributes: BTreeSet<AttributePath>,

    /// Attributes rendered as a single block even when the state stores
    /// their value as a one-element sequence of mappings.
    pub block_object_attributes: BTreeSet<AttributePath>,

    /// Attributes whose string value must parse as a policy document.
    pub policy_document_attributes: BTreeSet<AttributePath>,

    /// Substitution values for attributes that are null in the state.
    pub default_values: BTreeMap<AttributePath, serde_json::Value>,

    /// Per-attribute conflict declarations.
    pub conflicting_attributes: BTreeMap<AttributePath, Vec<AttributePath>>,

    /// Priority-ordered conflict groups; the member appearing later in a
    /// group outranks earlier members.
    pub conflict_groups: Vec<Vec<AttributePath>>,
}

impl ResourceTraits {
    /// An entry for the given type with no declarations.
    #[must_use]
    pub fn for_type(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_owned(),
            ..Self::default()
        }
    }

    /// The universal entry: suppressions and shapes common to every
    /// resource type.
    #[must_use]
    pub fn universal() -> Self {
        let mut traits = Self::for_type(FALLBACK_TYPE);
        for attr in ["arn", "id", MERGED_TAGS_ATTRIBUTE, "timeouts"] {
            traits.computed_attributes.insert(AttributePath::new(attr));
        }
        traits.non_block_attributes.insert(AttributePath::new("tags"));
        traits
    }

    /// Whether the attribute may be omitted when empty.
    #[must_use]
    pub fn is_optional(&self, path: &AttributePath) -> bool {
        self.optional_attributes.contains(path)
    }

    /// Whether the attribute must be present in output.
    #[must_use]
    pub fn is_required(&self, path: &AttributePath) -> bool {
        self.required_attributes.contains(path)
    }

    /// Whether the attribute can never be user-set and must never be
    /// emitted.
    #[must_use]
    pub fn is_computed_only(&self, path: &AttributePath) -> bool {
        self.computed_attributes.contains(path)
    }

    /// Whether a map-shaped value at this path renders as key/value
    /// pairs instead of a block.
    #[must_use]
    pub fn is_non_block(&self, path: &AttributePath) -> bool {
        self.non_block_attributes.contains(path)
    }

    /// Whether a bare mapping at this path is forced to single-block
    /// rendering.
    #[must_use]
    pub fn is_block_object(&self, path: &AttributePath) -> bool {
        self.block_object_attributes.contains(path)
    }

    /// Whether a string at this path must be a policy document.
    #[must_use]
    pub fn is_policy_document(&self, path: &AttributePath) -> bool {
        self.policy_document_attributes.contains(path)
    }

    /// The default substitution value for a null attribute, if declared.
    #[must_use]
    pub fn default_for(&self, path: &AttributePath) -> Option<&serde_json::Value> {
        self.default_values.get(path)
    }

    /// Paths declared as conflicting with the given attribute.
    #[must_use]
    pub fn conflicts_of(&self, path: &AttributePath) -> &[AttributePath] {
        self.conflicting_attributes
            .get(path)
            .map_or(&[], Vec::as_slice)
    }

    /// The ordered conflict group containing both paths, if one is
    /// declared.
    #[must_use]
    pub fn conflict_group(
        &self,
        first: &AttributePath,
        second: &AttributePath,
    ) -> Option<&[AttributePath]> {
        self.conflict_groups
            .iter()
            .find(|group| group.contains(first) && group.contains(second))
            .map(Vec::as_slice)
    }

    /// Classification flags for one attribute, attached to its key event
    /// at walk time.
    #[must_use]
    pub fn flags_for(&self, path: &AttributePath) -> AttributeFlags {
        AttributeFlags {
            optional: self.is_optional(path),
            required: self.is_required(path),
            computed: self.is_computed_only(path),
            conflicts_with: self.conflicts_of(path).to_vec(),
        }
    }

    /// Folds the universal entry's declarations into this one. Called
    /// once at registry construction; entries are immutable afterwards.
    fn absorb(&mut self, universal: &Self) {
        self.optional_attributes
            .extend(universal.optional_attributes.iter().cloned());
        self.required_attributes
            .extend(universal.required_attributes.iter().cloned());
        self.computed_attributes
            .extend(universal.computed_attributes.iter().cloned());
        self.non_block_attributes
            .extend(universal.non_block_attributes.iter().cloned());
        self.block_object_attributes
            .extend(universal.block_object_attributes.iter().cloned());
        self.policy_document_attributes
            .extend(universal.policy_document_attributes.iter().cloned());
        for (path, value) in &universal.default_values {
            self.default_values
                .entry(path.clone())
                .or_insert_with(|| value.clone());
        }
        for (path, conflicts) in &universal.conflicting_attributes {
            self.conflicting_attributes
                .entry(path.clone())
                .or_insert_with(|| conflicts.clone());
        }
        self.conflict_groups
            .extend(universal.conflict_groups.iter().cloned());
    }
}

/// Flags attached to a mapping-key event, derived from the trait entry
/// of the resource being walked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeFlags {
    /// May be omitted when empty.
    pub optional: bool,
    /// Must be present even when empty.
    pub required: bool,
    /// Never user-settable; never emitted.
    pub computed: bool,
    /// Paths this attribute conflicts with.
    pub conflicts_with: Vec<AttributePath>,
}

impl AttributeFlags {
    /// Flags for keys inside an embedded JSON document: everything is
    /// emitted, nothing is preprocessed away.
    #[must_use]
    pub fn json_document() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }
}

/// Immutable lookup table from resource-type strings to trait entries.
#[derive(Debug, Clone)]
pub struct TraitRegistry {
    entries: HashMap<String, ResourceTraits>,
}

impl Default for TraitRegistry {
    fn default() -> Self {
        Self::new(std::iter::empty())
    }
}

impl TraitRegistry {
    /// Builds a registry from type-specific entries.
    ///
    /// If no entry is supplied under [`FALLBACK_TYPE`],
    /// [`ResourceTraits::universal`] is installed there. Every other
    /// entry absorbs the fallback's declarations so common rules apply
    /// uniformly.
    pub fn new(entries: impl IntoIterator<Item = ResourceTraits>) -> Self {
        let mut map: HashMap<String, ResourceTraits> = entries
            .into_iter()
            .map(|t| (t.resource_type.clone(), t))
            .collect();
        let universal = map
            .remove(FALLBACK_TYPE)
            .unwrap_or_else(ResourceTraits::universal);
        for entry in map.values_mut() {
            entry.absorb(&universal);
        }
        map.insert(FALLBACK_TYPE.to_owned(), universal);
        Self { entries: map }
    }

    /// Loads a registry from a YAML document: a sequence of entries.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error when the document
    /// does not describe a list of trait entries.
    #[cfg(feature = "yaml")]
    pub fn from_yaml(document: &str) -> Result<Self, serde_yaml::Error> {
        let entries: Vec<ResourceTraits> = serde_yaml::from_str(document)?;
        Ok(Self::new(entries))
    }

    /// The entry for a resource type, falling back to the universal
    /// entry for unknown types.
    #[must_use]
    pub fn traits_for(&self, resource_type: &str) -> &ResourceTraits {
        self.entries
            .get(resource_type)
            .unwrap_or_else(|| &self.entries[FALLBACK_TYPE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(mut entry: ResourceTraits) -> TraitRegistry {
        entry.resource_type = "example_resource".into();
        TraitRegistry::new([entry])
    }

    #[test]
    fn fallback_resolves_for_unknown_types() {
        let registry = TraitRegistry::default();
        let traits = registry.traits_for("never_heard_of_it");
        assert!(traits.is_computed_only(&AttributePath::new("arn")));
        assert!(traits.is_non_block(&AttributePath::new("tags")));
    }

    #[test]
    fn specific_entries_absorb_universal_rules() {
        let mut entry = ResourceTraits::default();
        entry
            .required_attributes
            .insert(AttributePath::new("policy"));
        let registry = registry_with(entry);

        let traits = registry.traits_for("example_resource");
        assert!(traits.is_required(&AttributePath::new("policy")));
        // Universal suppressions still apply.
        assert!(traits.is_computed_only(&AttributePath::new("id")));
    }

    #[test]
    fn conflict_group_lookup() {
        let mut entry = ResourceTraits::default();
        entry.conflict_groups.push(vec![
            AttributePath::new("use_previous_template"),
            AttributePath::new("template_body"),
        ]);
        let registry = registry_with(entry);

        let traits = registry.traits_for("example_resource");
        let group = traits
            .conflict_group(
                &AttributePath::new("template_body"),
                &AttributePath::new("use_previous_template"),
            )
            .expect("group should be found regardless of argument order");
        assert_eq!(group.len(), 2);
        assert!(
            traits
                .conflict_group(
                    &AttributePath::new("template_body"),
                    &AttributePath::new("unrelated"),
                )
                .is_none()
        );
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn loads_from_yaml() {
        let doc = r"
- resource_type: example_resource
  optional_attributes:
    - description
  default_values:
    acl: private
  conflict_groups:
    - [use_previous_template, template_body]
";
        let registry = TraitRegistry::from_yaml(doc).expect("valid document");
        let traits = registry.traits_for("example_resource");
        assert!(traits.is_optional(&AttributePath::new("description")));
        assert_eq!(
            traits.default_for(&AttributePath::new("acl")),
            Some(&serde_json::Value::String("private".into()))
        );
    }
}
