//! A serialization engine that turns a persisted-state tree of typed
//! resources into formatted HCL configuration text.
//!
//! The pipeline has three stages. A [`Serializer`] walks one resource's
//! attribute tree into a flat run of [`HclEvent`]s buffered in an
//! [`EventQueue`]; a [`Preprocessor`] deletes attributes that must not
//! reach output (empty optionals, computed values, losing sides of
//! declared conflicts); an [`HclEmitter`] drains the queue once,
//! deciding at each key whether the value renders as a scalar, an
//! inline mapping, a sequence, a single block or a repeated block list.
//!
//! Per-resource-type emission rules live in a [`TraitRegistry`] built
//! from [`ResourceTraits`] entries and passed in at construction; a
//! universal fallback entry applies to unknown types.
//!
//! ```
//! use hclemit::{Serializer, StateResource, TraitRegistry};
//!
//! let registry = TraitRegistry::default();
//! let resource = StateResource::new(
//!     "example_resource",
//!     "main",
//!     serde_json::json!({ "name": "web", "tags": {} }),
//! )?;
//! let text = Serializer::new(&registry).serialize(&resource)?;
//! assert!(text.starts_with("resource \"example_resource\" \"main\" {"));
//! assert!(!text.contains("tags"));
//! # Ok::<(), hclemit::HclError>(())
//! ```

mod content;
mod emitter;
mod error;
mod event;
mod path;
mod preprocess;
mod queue;
mod serializer;
mod traits;

#[cfg(test)]
mod tests;

pub use content::AttributeContent;
pub use emitter::HclEmitter;
pub use error::{ErrorKind, HclError};
pub use event::{AttributeKey, BalanceTracker, HclEvent, ScalarValue};
pub use path::{AttributePath, INDEX_PLACEHOLDER, PathStack};
pub use preprocess::Preprocessor;
pub use queue::EventQueue;
pub use serializer::{Serializer, StateResource};
pub use traits::{
    AttributeFlags, FALLBACK_TYPE, MERGED_TAGS_ATTRIBUTE, POLICY_MARKER_KEY, ResourceTraits,
    TraitRegistry,
};
