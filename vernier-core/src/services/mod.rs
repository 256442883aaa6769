//! Service host adapter.
//!
//! Services are plugins installed while the runtime initializes: they
//! subscribe to event hooks, create their own attributes, and register
//! metadata writers. The core stays ignorant of what a service does; it only
//! drives registration at init and resolves the configured writer at output
//! time.
//!
//! Two built-ins ship with the core so `write_metadata` works out of the
//! box: the CSV metadata writer and a debug service that traces every
//! annotation event.

mod csv;

pub use self::csv::CsvMetadataWriter;

use crate::attribute::Attribute;
use crate::error::Result;
use crate::node::Node;
use crate::runtime::Vernier;
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only traversal over all registered attributes, handed to writers.
pub type AttributeWalk<'a> = &'a dyn Fn(&mut dyn FnMut(&Attribute));

/// Read-only traversal over all published nodes in ID order.
pub type NodeWalk<'a> = &'a dyn Fn(&mut dyn FnMut(&Node));

/// A plugin installed during runtime initialization.
pub trait Service: Send + Sync {
    /// The service's registry name.
    fn name(&self) -> &'static str;

    /// Hook the service into the runtime: subscribe to events, create
    /// attributes, register writers. Called exactly once, before the
    /// runtime is published.
    fn register(&self, runtime: &mut Vernier);
}

/// A metadata output backend.
///
/// Writers are invoked with the two traversal callbacks and must not call
/// back into the mutating surface.
pub trait MetadataWriter: Send + Sync {
    /// The name `output` is matched against.
    fn name(&self) -> &'static str;

    /// Serialize the attribute registry and the context tree.
    ///
    /// # Errors
    ///
    /// I/O failures are reported to the runtime, which logs them and
    /// returns `false` from `write_metadata`.
    fn write(&self, attributes: AttributeWalk<'_>, nodes: NodeWalk<'_>) -> Result<()>;
}

/// Name-keyed registry of metadata writers.
#[derive(Default)]
pub struct ServiceRegistry {
    writers: HashMap<&'static str, Arc<dyn MetadataWriter>>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metadata writer under its own name.
    pub fn register_writer(&mut self, writer: Arc<dyn MetadataWriter>) {
        self.writers.insert(writer.name(), writer);
    }

    /// Look up a writer by name.
    #[must_use]
    pub fn writer(&self, name: &str) -> Option<Arc<dyn MetadataWriter>> {
        self.writers.get(name).map(Arc::clone)
    }

    /// Number of registered writers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writers.len()
    }

    /// Whether no writer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("writers", &self.writers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Traces every annotation event at trace level. The smallest possible
/// event consumer; also keeps the hook surface exercised in default builds.
struct DebugService;

impl Service for DebugService {
    fn name(&self) -> &'static str {
        "debug"
    }

    fn register(&self, runtime: &mut Vernier) {
        runtime.events_mut().on_begin(Box::new(|_, env, attribute| {
            tracing::trace!(%env, attribute = attribute.name(), "begin");
        }));
        runtime.events_mut().on_end(Box::new(|_, env, attribute| {
            tracing::trace!(%env, attribute = attribute.name(), "end");
        }));
        runtime.events_mut().on_set(Box::new(|_, env, attribute| {
            tracing::trace!(%env, attribute = attribute.name(), "set");
        }));
        runtime.events_mut().on_create_attribute(Box::new(|_, attribute| {
            tracing::trace!(attribute = attribute.name(), "create-attribute");
        }));
    }
}

/// Install the built-in services into an initializing runtime.
pub(crate) fn register_builtin(runtime: &mut Vernier) {
    let output_dir = runtime.config().output_dir().to_path_buf();
    runtime
        .writers_mut()
        .register_writer(Arc::new(CsvMetadataWriter::new(output_dir)));
    DebugService.register(runtime);
}
