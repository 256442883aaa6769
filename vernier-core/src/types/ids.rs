//! Strongly-typed identifiers for vernier entities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a registered attribute.
///
/// Attribute IDs are dense, assigned from 0 in creation order, and stable
/// for the lifetime of the process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AttributeId(u32);

impl AttributeId {
    /// Sentinel for "no such attribute".
    pub const INVALID: AttributeId = AttributeId(u32::MAX);

    /// Create an attribute ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Whether this ID refers to a real attribute.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "attr_{}", self.0)
        } else {
            write!(f, "attr_invalid")
        }
    }
}

impl From<u32> for AttributeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier for an interned context-tree node.
///
/// Node IDs are dense and equal to the node's index in the node store;
/// once published, an ID stays valid until process end.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a node ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// The ID as a stored 64-bit slot payload.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier for an annotation environment.
///
/// Environment 0 is the default environment and always exists; further
/// environments are created by cloning or on first access.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct EnvironmentId(u32);

impl EnvironmentId {
    /// The default environment.
    pub const DEFAULT: EnvironmentId = EnvironmentId(0);

    /// Create an environment ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// The ID as a store index.
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env_{}", self.0)
    }
}

impl From<u32> for EnvironmentId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_id_sentinel() {
        assert!(!AttributeId::INVALID.is_valid());
        assert!(AttributeId::new(0).is_valid());
        assert_eq!(format!("{}", AttributeId::INVALID), "attr_invalid");
    }

    #[test]
    fn node_id_display() {
        assert_eq!(format!("{}", NodeId::new(5)), "node_5");
        assert_eq!(NodeId::new(5).as_u64(), 5);
    }

    #[test]
    fn environment_default_is_zero() {
        assert_eq!(EnvironmentId::DEFAULT.as_u32(), 0);
        assert_eq!(EnvironmentId::default(), EnvironmentId::DEFAULT);
    }

    #[test]
    fn ids_serialize_as_integers() {
        let json = serde_json::to_string(&NodeId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeId::new(7));
    }
}
