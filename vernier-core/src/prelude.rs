//! Prelude for convenient imports.
//!
//! # Example
//!
//! ```ignore
//! use vernier_core::prelude::*;
//! ```

pub use crate::attribute::{Attribute, AttributeProperties};
pub use crate::config::RuntimeConfig;
pub use crate::context::Slot;
pub use crate::error::{Result, VernierError};
pub use crate::record::{ContextEntry, ContextRecord};
pub use crate::runtime::Vernier;
pub use crate::services::{MetadataWriter, Service};
pub use crate::types::{AttributeId, EnvironmentId, NodeId};
pub use crate::variant::{AttributeType, Variant};
