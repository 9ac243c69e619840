//! The structural event vocabulary.
//!
//! A depth-first walk of a resource's attribute tree is represented as a
//! flat run of [`HclEvent`]s. Every event contributes a fixed nesting
//! delta (+1 for starts, -1 for ends, 0 otherwise); summing deltas lets
//! lookahead routines find the end of a compound value without ever
//! materializing a parsed structure, via [`BalanceTracker`].
//!
//! # Examples
//!
//! ```
//! use hclemit::{BalanceTracker, HclEvent, ScalarValue};
//!
//! let events = [
//!     HclEvent::MappingStart,
//!     HclEvent::Scalar(ScalarValue::string("a")),
//!     HclEvent::MappingEnd,
//! ];
//! let mut tracker = BalanceTracker::new();
//! let balanced: Vec<bool> = events.iter().map(|e| tracker.advance(e)).collect();
//! assert_eq!(balanced, [false, false, true]);
//! ```

use serde::Serialize;

use crate::{path::AttributePath, traits::AttributeFlags};

/// One structural event in the walk of a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum HclEvent {
    /// Begins a resource: its type and instance name.
    ResourceStart {
        /// The resource type string.
        resource_type: String,
        /// The instance name.
        name: String,
    },
    /// Ends the current resource.
    ResourceEnd,
    /// Begins a mapping value.
    MappingStart,
    /// Ends a mapping value.
    MappingEnd,
    /// A key within a mapping, with its normalized path and trait flags.
    MappingKey(AttributeKey),
    /// Begins a sequence value.
    SequenceStart,
    /// Ends a sequence value.
    SequenceEnd,
    /// A scalar value.
    Scalar(ScalarValue),
    /// Begins an embedded JSON document re-walk.
    JsonStart,
    /// Ends an embedded JSON document re-walk.
    JsonEnd,
}

impl HclEvent {
    /// The variation of nesting depth caused by this event: +1 for start
    /// events, -1 for end events, 0 otherwise.
    #[must_use]
    pub fn nesting_delta(&self) -> i8 {
        match self {
            Self::MappingStart | Self::SequenceStart | Self::JsonStart | Self::ResourceStart { .. } => 1,
            Self::MappingEnd | Self::SequenceEnd | Self::JsonEnd | Self::ResourceEnd => -1,
            Self::MappingKey(_) | Self::Scalar(_) => 0,
        }
    }

    /// Short name used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ResourceStart { .. } => "ResourceStart",
            Self::ResourceEnd => "ResourceEnd",
            Self::MappingStart => "MappingStart",
            Self::MappingEnd => "MappingEnd",
            Self::MappingKey(_) => "MappingKey",
            Self::SequenceStart => "SequenceStart",
            Self::SequenceEnd => "SequenceEnd",
            Self::Scalar(_) => "Scalar",
            Self::JsonStart => "JsonStart",
            Self::JsonEnd => "JsonEnd",
        }
    }

    /// The key, if this event is a mapping key.
    #[must_use]
    pub fn as_key(&self) -> Option<&AttributeKey> {
        if let Self::MappingKey(key) = self {
            Some(key)
        } else {
            None
        }
    }

    /// The scalar, if this event is a scalar value.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        if let Self::Scalar(s) = self {
            Some(s)
        } else {
            None
        }
    }
}

/// A mapping key event payload: the key text, its normalized path within
/// the resource, and the trait flags attached at walk time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeKey {
    /// The key as it appears in the state tree.
    pub name: String,
    /// Normalized path of this attribute.
    pub path: AttributePath,
    /// Trait flags resolved for the path.
    pub flags: AttributeFlags,
}

impl AttributeKey {
    /// Builds a key with the given flags.
    #[must_use]
    pub fn new(name: &str, path: AttributePath, flags: AttributeFlags) -> Self {
        Self {
            name: name.to_owned(),
            path,
            flags,
        }
    }
}

/// Numeric values closer to zero than this count as empty. A legitimate
/// zero is emitted only when its path is whitelisted through the
/// required-attribute or default-value trait sets.
const ZERO_THRESHOLD: f64 = 1e-9;

/// A scalar value event payload.
///
/// `raw` of `None` represents JSON null. `quoted` is type-driven: string
/// values are quoted, numbers and booleans are not, and pre-resolved
/// references arrive unquoted so they render as bare expressions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalarValue {
    /// The raw text of the value; `None` for null.
    pub raw: Option<String>,
    /// Whether the value renders inside double quotes.
    pub quoted: bool,
}

impl ScalarValue {
    /// A null scalar.
    #[must_use]
    pub fn null() -> Self {
        Self { raw: None, quoted: false }
    }

    /// A quoted string scalar.
    #[must_use]
    pub fn string(value: &str) -> Self {
        Self {
            raw: Some(value.to_owned()),
            quoted: true,
        }
    }

    /// An unquoted scalar: a number, boolean or reference expression.
    #[must_use]
    pub fn bare(value: &str) -> Self {
        Self {
            raw: Some(value.to_owned()),
            quoted: false,
        }
    }

    /// Builds a scalar from a leaf node of the input tree.
    ///
    /// Objects and arrays are not scalars; callers must have dispatched
    /// those already.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::null(),
            serde_json::Value::Bool(b) => Self::bare(if *b { "true" } else { "false" }),
            serde_json::Value::Number(n) => Self::bare(&n.to_string()),
            serde_json::Value::String(s) => Self::string(s),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                unreachable!("compound nodes are walked, not scalarized")
            }
        }
    }

    /// Whether this scalar counts as empty: null, blank, boolean false,
    /// or a number within [`ZERO_THRESHOLD`] of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let Some(raw) = &self.raw else {
            return true;
        };
        if raw.trim().is_empty() {
            return true;
        }
        if raw == "false" {
            return true;
        }
        if let Ok(n) = raw.parse::<f64>() {
            return n.abs() < ZERO_THRESHOLD;
        }
        false
    }

    /// Attempts to parse the value as an embedded JSON document.
    ///
    /// Mirrors the shape probe used for policy documents: only text whose
    /// first non-whitespace character opens an object or array is
    /// considered, and anything that fails to parse is simply not a
    /// document.
    #[must_use]
    pub fn embedded_document(&self) -> Option<serde_json::Value> {
        let raw = self.raw.as_deref()?;
        let first = raw.trim_start().chars().next()?;
        if first != '{' && first != '[' {
            return None;
        }
        serde_json::from_str(raw).ok()
    }
}

/// Stateful nesting counter used by balanced-run lookahead.
///
/// Feed events in order; `advance` reports `true` once the run returns
/// to balance (depth zero). A scalar fed to a fresh tracker balances
/// immediately, so the same predicate handles scalar and compound
/// attribute values.
#[derive(Debug, Default)]
pub struct BalanceTracker {
    depth: i32,
}

impl BalanceTracker {
    /// A tracker at depth zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances over one event; returns `true` when the run is balanced.
    pub fn advance(&mut self, event: &HclEvent) -> bool {
        self.depth += i32::from(event.nesting_delta());
        self.depth == 0
    }

    /// Whether more end events were seen than start events; a malformed
    /// stream.
    #[must_use]
    pub fn underflowed(&self) -> bool {
        self.depth < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_sum_to_zero_over_balanced_runs() {
        let events = [
            HclEvent::SequenceStart,
            HclEvent::MappingStart,
            HclEvent::Scalar(ScalarValue::string("x")),
            HclEvent::MappingEnd,
            HclEvent::SequenceEnd,
        ];
        let total: i32 = events.iter().map(|e| i32::from(e.nesting_delta())).sum();
        assert_eq!(total, 0);
    }

    #[test]
    fn tracker_balances_scalar_immediately() {
        let mut tracker = BalanceTracker::new();
        assert!(tracker.advance(&HclEvent::Scalar(ScalarValue::null())));
    }

    #[test]
    fn tracker_handles_nesting() {
        let mut tracker = BalanceTracker::new();
        assert!(!tracker.advance(&HclEvent::MappingStart));
        assert!(!tracker.advance(&HclEvent::SequenceStart));
        assert!(!tracker.advance(&HclEvent::SequenceEnd));
        assert!(tracker.advance(&HclEvent::MappingEnd));
        assert!(!tracker.underflowed());
    }

    #[test]
    fn tracker_reports_underflow() {
        let mut tracker = BalanceTracker::new();
        tracker.advance(&HclEvent::MappingEnd);
        assert!(tracker.underflowed());
    }

    #[test]
    fn scalar_emptiness() {
        assert!(ScalarValue::null().is_empty());
        assert!(ScalarValue::string("").is_empty());
        assert!(ScalarValue::string("   ").is_empty());
        assert!(ScalarValue::bare("false").is_empty());
        assert!(ScalarValue::bare("0").is_empty());
        assert!(ScalarValue::bare("0.0").is_empty());
        assert!(!ScalarValue::bare("true").is_empty());
        assert!(!ScalarValue::bare("42").is_empty());
        assert!(!ScalarValue::string("host-0").is_empty());
    }

    #[test]
    fn embedded_document_probe() {
        let doc = ScalarValue::string(r#"{"Statement": []}"#);
        assert!(doc.embedded_document().is_some());

        assert!(ScalarValue::string("not json").embedded_document().is_none());
        assert!(ScalarValue::string("{ not json").embedded_document().is_none());
        assert!(ScalarValue::null().embedded_document().is_none());
    }
}
