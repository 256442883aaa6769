//! Vernier annotation runtime core.
//!
//! This crate is the process-wide core of the vernier performance-annotation
//! library: instrumented code pushes, pops, and sets named attribute values
//! as it runs, and the core folds those annotations into a shared tree of
//! `(attribute, value)` nodes plus per-environment context snapshots that
//! downstream consumers (metadata writers, query callbacks, samplers) read
//! back out.
//!
//! # Key components
//!
//! - **Pool**: append-only, never-freed storage for node payloads
//! - **Node store**: the deduplicated context tree, addressed by dense IDs
//! - **Attribute registry**: name-to-ID mapping with typed, flagged entries
//! - **Context store**: per-environment slot maps with a global overlay
//! - **Events**: synchronous hook fan-out to service plugins
//! - **Runtime**: the [`Vernier`] facade and its singleton lifecycle
//!
//! # Example
//!
//! ```
//! use vernier_core::prelude::*;
//!
//! let rt = Vernier::create(RuntimeConfig::default().with_output("none"));
//! let env = EnvironmentId::DEFAULT;
//!
//! let function = rt
//!     .create_attribute("function", AttributeType::String, AttributeProperties::empty())
//!     .unwrap();
//!
//! rt.begin(env, &function, b"main").unwrap();
//! rt.begin(env, &function, b"solve").unwrap();
//!
//! let mut buf = vec![0u64; rt.context_size(env)];
//! let written = rt.get_context(env, &mut buf).unwrap();
//! let records = rt.unpack(&buf[..written]).unwrap();
//! assert_eq!(records[0].entries.len(), 2);
//!
//! rt.end(env, &function).unwrap();
//! ```
//!
//! Production instrumentation shares one process-wide instance through
//! [`Vernier::instance`]; signal handlers use the non-blocking
//! [`Vernier::try_instance`] and back off with an `unavailable` status
//! instead of deadlocking against interrupted mutators.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod lock;
pub mod node;
pub mod pool;
pub mod prelude;
pub mod record;
pub mod runtime;
pub mod services;
pub mod types;
pub mod variant;

pub use attribute::{Attribute, AttributeProperties, AttributeRegistry};
pub use config::RuntimeConfig;
pub use context::{ContextStore, Slot};
pub use error::{Result, VernierError};
pub use events::Events;
pub use lock::SigsafeRwLock;
pub use node::{Node, NodeStore};
pub use pool::{MemoryPool, PoolSlice};
pub use record::{ContextEntry, ContextRecord, ResolvedNode};
pub use runtime::Vernier;
pub use services::{CsvMetadataWriter, MetadataWriter, Service, ServiceRegistry};
pub use types::{AttributeId, EnvironmentId, NodeId};
pub use variant::{AttributeType, Variant};
