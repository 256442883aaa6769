//! Strongly-typed identifiers.

mod ids;

pub use ids::{AttributeId, EnvironmentId, NodeId};
