//! Error types for the serialization engine.
//!
//! All failures surface through a single [`HclError`] carrying the identity
//! of the resource being serialized, wrapping an [`ErrorKind`] that
//! distinguishes structural inconsistencies, schema incompleteness and
//! malformed embedded documents. Nothing is retried internally; a raised
//! error means no usable output was produced for that resource.

use thiserror::Error;

/// The single error type exposed to callers.
///
/// Carries the resource type and instance name when they are known, so a
/// failure deep inside the emitter can be attributed to the resource that
/// triggered it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct HclError {
    pub(crate) kind: ErrorKind,
    /// Type of the resource being serialized, when known.
    pub resource_type: Option<String>,
    /// Instance name of the resource being serialized, when known.
    pub resource_name: Option<String>,
}

impl core::fmt::Display for HclError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match (&self.resource_type, &self.resource_name) {
            (Some(t), Some(n)) => write!(f, "resource \"{t}.{n}\": {}", self.kind),
            _ => self.kind.fmt(f),
        }
    }
}

impl HclError {
    /// The underlying failure.
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl From<ErrorKind> for HclError {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            resource_type: None,
            resource_name: None,
        }
    }
}

/// Classified failure causes.
///
/// Structural variants indicate a producer/consumer contract violation
/// (the event stream was not well formed); `ConflictResolution` indicates
/// an incomplete trait table; `MalformedPolicyDocument` indicates embedded
/// JSON that was required to be a policy document but is not.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The queue ran out before a nesting-balance condition was met.
    #[error("reached end of event queue before condition was met")]
    QueueExhausted,

    /// Nesting balance went negative, meaning an end event had no
    /// matching start.
    #[error("unbalanced event stream: end event without matching start")]
    UnbalancedEvents,

    /// An event of an unexpected type arrived for the current state.
    #[error("expected {expected}, got {actual}")]
    UnexpectedEvent {
        /// What the current state was prepared to consume.
        expected: &'static str,
        /// What actually arrived.
        actual: &'static str,
    },

    /// The attribute path stack was not empty when the resource ended.
    #[error("attribute path stack not empty at resource end: \"{path}\"")]
    DanglingPath {
        /// The path left on the stack.
        path: String,
    },

    /// A conflicting attribute pair has no declared priority ordering.
    #[error(
        "unable to resolve conflict between \"{first}\" and \"{second}\": \
         no conflict group declares both"
    )]
    ConflictResolution {
        /// One side of the conflict.
        first: String,
        /// The other side.
        second: String,
    },

    /// An attribute declared as a policy document holds JSON that is not
    /// a policy, or text that is not JSON at all.
    #[error("expected policy document at \"{path}\": {reason}")]
    MalformedPolicyDocument {
        /// Path of the offending attribute.
        path: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The input tree contained a node the walker cannot represent.
    #[error("unexpected node in state tree: {0}")]
    UnexpectedNode(String),

    /// The output sink refused a write.
    #[error("failed writing to output")]
    Format(#[from] core::fmt::Error),
}

impl ErrorKind {
    /// Attaches resource identity, producing the public error.
    pub(crate) fn for_resource(self, resource_type: &str, name: &str) -> HclError {
        HclError {
            kind: self,
            resource_type: Some(resource_type.to_owned()),
            resource_name: Some(name.to_owned()),
        }
    }
}
