//! Error types for the annotation runtime.
//!
//! Every facade operation completes synchronously with either a value or one
//! of these errors; nothing unwinds across the public surface. Each variant
//! maps onto one of the stable status codes reported to instrumented code
//! (`invalid-argument`, `out-of-memory`, `type-mismatch`, `unavailable`,
//! `io`).

use crate::types::{AttributeId, EnvironmentId};
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for annotation-runtime operations.
#[derive(Error, Debug)]
pub enum VernierError {
    /// An operation received the invalid-attribute sentinel.
    #[error("invalid attribute passed to {operation}")]
    InvalidAttribute {
        /// The facade operation that rejected the attribute.
        operation: &'static str,
    },

    /// A request was malformed (empty attribute name, truncated buffer, ...).
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the malformed input.
        reason: String,
    },

    /// A value-class attribute was given a payload of the wrong size.
    #[error("attribute {attribute} stores inline values: expected {expected} bytes, got {actual}")]
    PayloadSize {
        /// The attribute whose slot was being written.
        attribute: AttributeId,
        /// Required payload size in bytes.
        expected: usize,
        /// Size of the payload that was supplied.
        actual: usize,
    },

    /// A payload does not fit the attribute's declared type.
    #[error("type mismatch for attribute {attribute}: {expected} takes {width} bytes, got {actual}")]
    TypeMismatch {
        /// The attribute whose type was violated.
        attribute: AttributeId,
        /// Name of the declared type.
        expected: &'static str,
        /// Width of the declared type in bytes.
        width: usize,
        /// Size of the payload that was supplied.
        actual: usize,
    },

    /// `end` was called for an attribute with no active slot.
    #[error("no active value for attribute {attribute} in {environment}")]
    NoActiveValue {
        /// The attribute being ended.
        attribute: AttributeId,
        /// The environment whose slot was empty.
        environment: EnvironmentId,
    },

    /// The memory pool could not satisfy an allocation. Fatal by contract:
    /// callers propagate it, since further annotation would silently lose
    /// state.
    #[error("memory pool exhausted: failed to allocate {requested} bytes")]
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
    },

    /// A lock required by a signal-safe path was write-held; the caller
    /// should drop its sample and retry later.
    #[error("runtime state is locked by a writer")]
    Unavailable,

    /// The configured metadata writer is not registered.
    #[error("metadata writer \"{name}\" not found")]
    UnknownWriter {
        /// The writer name looked up in the service registry.
        name: String,
    },

    /// A metadata writer failed to produce output.
    #[error("metadata output failed at {path}: {cause}")]
    Io {
        /// The path the writer was producing.
        path: PathBuf,
        /// Description of the failure.
        cause: String,
    },
}

impl VernierError {
    /// Get the stable status code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAttribute { .. }
            | Self::InvalidArgument { .. }
            | Self::PayloadSize { .. }
            | Self::NoActiveValue { .. } => "invalid-argument",
            Self::TypeMismatch { .. } => "type-mismatch",
            Self::OutOfMemory { .. } => "out-of-memory",
            Self::Unavailable => "unavailable",
            Self::UnknownWriter { .. } | Self::Io { .. } => "io",
        }
    }

    /// Whether the caller may retry the operation unchanged.
    ///
    /// Only lock contention on a signal-safe path is transient; everything
    /// else reflects a caller mistake or an unrecoverable state.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

/// Result type alias using [`VernierError`].
pub type Result<T> = std::result::Result<T, VernierError>;
