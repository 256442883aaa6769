//! The annotation runtime facade and its process-wide singleton.
//!
//! [`Vernier`] owns every core component — memory pool, node store,
//! attribute registry, context store, event hooks, writer registry — and
//! implements the user-facing annotation semantics on top of them:
//!
//! - `begin` nests a new value under the attribute's current node,
//! - `end` peels exactly one layer, repairing out-of-order pops by walking
//!   ancestors,
//! - `set` replaces the current value under the current node's parent.
//!
//! Instances are directly constructible for tests and embedding; production
//! instrumentation goes through the singleton (`instance`/`try_instance`),
//! which follows a strict two-phase discipline: construct and initialize
//! under a guard, then flip a monotone ready flag. Signal handlers consult
//! only the flag, so they can never race construction.

use crate::attribute::{Attribute, AttributeProperties, AttributeRegistry};
use crate::config::RuntimeConfig;
use crate::context::{ContextStore, Slot};
use crate::error::{Result, VernierError};
use crate::events::Events;
use crate::lock::SigsafeRwLock;
use crate::node::{Node, NodeStore};
use crate::pool::MemoryPool;
use crate::record::{self, ContextRecord, ResolvedNode};
use crate::services::{self, ServiceRegistry};
use crate::types::{AttributeId, EnvironmentId, NodeId};
use crate::variant::AttributeType;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

/// Callback supplying the calling thread's environment.
pub type EnvironmentCallback = Box<dyn Fn() -> EnvironmentId + Send + Sync>;

const LIFECYCLE_UNINITIALIZED: u8 = 0;
const LIFECYCLE_READY: u8 = 1;
const LIFECYCLE_FINALIZED: u8 = 2;

static INSTANCE: OnceLock<Vernier> = OnceLock::new();
static LIFECYCLE: AtomicU8 = AtomicU8::new(LIFECYCLE_UNINITIALIZED);

/// The annotation runtime.
pub struct Vernier {
    config: RuntimeConfig,
    env_callback: Option<EnvironmentCallback>,
    pool: MemoryPool,
    nodes: SigsafeRwLock<NodeStore>,
    attributes: SigsafeRwLock<AttributeRegistry>,
    context: ContextStore,
    events: Events,
    writers: ServiceRegistry,
}

impl Vernier {
    /// Create a bare runtime: empty registries, no services.
    ///
    /// Callers that want the built-in services must follow up with
    /// [`Vernier::init`]; [`Vernier::create`] does both.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let capacity = config.node_pool_size();
        Self {
            config,
            env_callback: None,
            pool: MemoryPool::new(),
            nodes: SigsafeRwLock::new(NodeStore::with_capacity(capacity)),
            attributes: SigsafeRwLock::new(AttributeRegistry::new()),
            context: ContextStore::new(),
            events: Events::default(),
            writers: ServiceRegistry::new(),
        }
    }

    /// Create and initialize a runtime in one step.
    #[must_use]
    pub fn create(config: RuntimeConfig) -> Self {
        let mut runtime = Self::new(config);
        runtime.init();
        runtime
    }

    /// Deferred initialization: install services and announce readiness.
    ///
    /// Runs while the runtime is still exclusively owned, so services can
    /// subscribe to events without synchronization. Only after `init`
    /// returns may the runtime be shared.
    pub fn init(&mut self) {
        services::register_builtin(self);
        self.events.fire_init_complete(self);
        tracing::info!("initialized");
        self.config.dump();
    }

    // --- singleton lifecycle

    /// The process-wide runtime, constructed and initialized on first call.
    pub fn instance() -> &'static Vernier {
        let runtime = INSTANCE.get_or_init(|| Self::create(RuntimeConfig::from_env()));
        let _ = LIFECYCLE.compare_exchange(
            LIFECYCLE_UNINITIALIZED,
            LIFECYCLE_READY,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
        runtime
    }

    /// The process-wide runtime, iff it is fully initialized and not yet
    /// finalized.
    ///
    /// Async-signal-safe: one atomic flag load and one pointer read, no
    /// locks, no allocation. Sampling handlers call this instead of
    /// [`Vernier::instance`] so they can never race construction.
    pub fn try_instance() -> Option<&'static Vernier> {
        if LIFECYCLE.load(Ordering::Acquire) == LIFECYCLE_READY {
            INSTANCE.get()
        } else {
            None
        }
    }

    /// Tear down the process-wide runtime: fire the finalize hooks and stop
    /// handing the instance to signal-safe callers.
    ///
    /// Callers that want metadata output must run
    /// [`Vernier::write_metadata`] before this; writers are not invoked
    /// afterwards. The instance's storage is never reclaimed, so readers
    /// holding a reference stay valid.
    pub fn finalize() {
        if LIFECYCLE
            .compare_exchange(
                LIFECYCLE_READY,
                LIFECYCLE_FINALIZED,
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            if let Some(runtime) = INSTANCE.get() {
                runtime.events.fire_finalize(runtime);
            }
            tracing::info!("finished");
        }
    }

    // --- init-time surface for services

    /// The runtime configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The event hooks, for init-time subscription.
    pub fn events_mut(&mut self) -> &mut Events {
        &mut self.events
    }

    /// The writer registry, for init-time registration.
    pub fn writers_mut(&mut self) -> &mut ServiceRegistry {
        &mut self.writers
    }

    /// Install the callback that maps the calling thread to its
    /// environment. Installed by an environment service during init; the
    /// default maps every caller to environment 0.
    pub fn set_environment_callback(&mut self, callback: EnvironmentCallback) {
        self.env_callback = Some(callback);
    }

    // --- environment interface

    /// The calling thread's environment.
    #[must_use]
    pub fn current_environment(&self) -> EnvironmentId {
        self.env_callback
            .as_ref()
            .map_or(EnvironmentId::DEFAULT, |callback| callback())
    }

    /// Snapshot `env` into a fresh, independent environment.
    #[must_use]
    pub fn clone_environment(&self, env: EnvironmentId) -> EnvironmentId {
        self.context.clone_environment(env)
    }

    // --- attribute interface

    /// Create an attribute, or fetch the existing record registered under
    /// `name`.
    ///
    /// # Errors
    ///
    /// Fails with an invalid-argument status when `name` is empty.
    pub fn create_attribute(
        &self,
        name: &str,
        attr_type: AttributeType,
        properties: AttributeProperties,
    ) -> Result<Attribute> {
        if name.is_empty() {
            return Err(VernierError::InvalidArgument {
                reason: "attribute name must not be empty".to_owned(),
            });
        }

        let (attribute, created) = {
            let mut attributes = self.attributes.write();
            attributes.create(name, attr_type, properties)
        };

        if created {
            self.events.fire_create_attribute(self, &attribute);
        }

        Ok(attribute)
    }

    /// Look up an attribute by ID; the invalid sentinel on miss.
    #[must_use]
    pub fn get_attribute(&self, id: AttributeId) -> Attribute {
        self.attributes.read().get(id)
    }

    /// Look up an attribute by name; the invalid sentinel on miss.
    #[must_use]
    pub fn get_attribute_by_name(&self, name: &str) -> Attribute {
        self.attributes.read().get_by_name(name)
    }

    /// Number of registered attributes.
    #[must_use]
    pub fn num_attributes(&self) -> usize {
        self.attributes.read().len()
    }

    // --- annotation interface

    /// Push `data` as a nested value of `attribute` in `env`.
    ///
    /// Value-class attributes store the payload inline (exactly 8 bytes,
    /// little-endian); everything else interns a node under the attribute's
    /// current node, or under the root when the slot is empty.
    ///
    /// # Errors
    ///
    /// Invalid-argument for the invalid sentinel or a mis-sized inline
    /// payload, type-mismatch when the payload width contradicts the
    /// attribute's declared type, out-of-memory when the pool is exhausted.
    pub fn begin(&self, env: EnvironmentId, attribute: &Attribute, data: &[u8]) -> Result<()> {
        if !attribute.is_valid() {
            return Err(VernierError::InvalidAttribute { operation: "begin" });
        }

        if attribute.store_as_value() {
            let value = inline_value(attribute, data)?;
            self.context
                .set(env, attribute.id(), Slot::Value(value), attribute.is_global());
        } else {
            check_width(attribute, data)?;
            let parent = self
                .context
                .get(env, attribute.id())
                .and_then(|slot| slot.as_node());
            let node = self.intern(parent, attribute.id(), data)?;
            self.context
                .set(env, attribute.id(), Slot::Node(node), attribute.is_global());
        }

        self.events.fire_begin(self, env, attribute);
        Ok(())
    }

    /// Pop one layer of `attribute` in `env`.
    ///
    /// If the slot's node does not carry `attribute` (the ends arrived out
    /// of order), the nearest ancestor that does is popped instead; the
    /// structure stays intact either way.
    ///
    /// # Errors
    ///
    /// Invalid-argument for the invalid sentinel, for an empty slot, and
    /// when no ancestor carries the attribute.
    pub fn end(&self, env: EnvironmentId, attribute: &Attribute) -> Result<()> {
        if !attribute.is_valid() {
            return Err(VernierError::InvalidAttribute { operation: "end" });
        }

        let no_active = || VernierError::NoActiveValue {
            attribute: attribute.id(),
            environment: env,
        };

        if attribute.store_as_value() {
            if !self.context.unset(env, attribute.id()) {
                return Err(no_active());
            }
        } else {
            let slot = self.context.get(env, attribute.id()).ok_or_else(no_active)?;
            let current = slot.as_node().ok_or_else(no_active)?;

            let parent = {
                let nodes = self.nodes.read();
                let popped = nodes
                    .ancestor_with_attribute(current, attribute.id())
                    .ok_or_else(no_active)?;
                nodes.get(popped).ok_or_else(no_active)?.parent()
            };

            match parent {
                Some(parent) => self.context.set(
                    env,
                    attribute.id(),
                    Slot::Node(parent),
                    attribute.is_global(),
                ),
                None => {
                    self.context.unset(env, attribute.id());
                }
            }
        }

        self.events.fire_end(self, env, attribute);
        Ok(())
    }

    /// Replace the current value of `attribute` in `env` with `data`.
    ///
    /// Unlike [`Vernier::begin`] the new node is attached under the current
    /// node's parent, so the nesting depth is unchanged.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Vernier::begin`].
    pub fn set(&self, env: EnvironmentId, attribute: &Attribute, data: &[u8]) -> Result<()> {
        if !attribute.is_valid() {
            return Err(VernierError::InvalidAttribute { operation: "set" });
        }

        if attribute.store_as_value() {
            let value = inline_value(attribute, data)?;
            self.context
                .set(env, attribute.id(), Slot::Value(value), attribute.is_global());
        } else {
            check_width(attribute, data)?;
            let parent = match self
                .context
                .get(env, attribute.id())
                .and_then(|slot| slot.as_node())
            {
                Some(current) => {
                    let nodes = self.nodes.read();
                    nodes.get(current).and_then(Node::parent)
                }
                None => None,
            };
            let node = self.intern(parent, attribute.id(), data)?;
            self.context
                .set(env, attribute.id(), Slot::Node(node), attribute.is_global());
        }

        self.events.fire_set(self, env, attribute);
        Ok(())
    }

    /// Find or intern the child of `parent` carrying `(attribute, data)`.
    fn intern(
        &self,
        parent: Option<NodeId>,
        attribute: AttributeId,
        data: &[u8],
    ) -> Result<NodeId> {
        {
            let nodes = self.nodes.read();
            if let Some(id) = nodes.find_child(parent, attribute, data) {
                return Ok(id);
            }
        }

        // Allocate outside the node lock; `publish` re-checks for a racing
        // creator, so at most one sibling wins.
        let payload = self.pool.allocate(data)?;
        let mut nodes = self.nodes.write();
        Ok(nodes.publish(parent, attribute, payload))
    }

    // --- context interface

    /// The raw slot for `attribute` in `env`, if present.
    #[must_use]
    pub fn get(&self, env: EnvironmentId, attribute: AttributeId) -> Option<Slot> {
        self.context.get(env, attribute)
    }

    /// Words required to snapshot `env`'s context.
    #[must_use]
    pub fn context_size(&self, env: EnvironmentId) -> usize {
        self.context.context_size(env)
    }

    /// Snapshot `env`'s context into `buf`; fires the query hook first so
    /// samplers can decorate the environment with last-moment state.
    ///
    /// Returns the required word count; if `buf` is smaller than that,
    /// nothing is written and the caller grows the buffer and retries.
    ///
    /// # Errors
    ///
    /// Fails with an unavailable status when a writer holds a required
    /// lock — the signal-safe refusal, never a deadlock. Signal-handler
    /// callers must additionally ensure their registered query callbacks
    /// are themselves signal-safe.
    pub fn get_context(&self, env: EnvironmentId, buf: &mut [u64]) -> Result<usize> {
        self.events.fire_query(self, env);
        self.context.get_context(env, buf)
    }

    /// Decode a packed context buffer into attribute/value chains.
    ///
    /// # Errors
    ///
    /// Invalid-argument for truncated buffers and unknown IDs,
    /// type-mismatch for payloads that contradict their attribute's type.
    pub fn unpack(&self, buf: &[u64]) -> Result<Vec<ContextRecord>> {
        record::unpack(buf, |id| self.get_attribute(id), |id| self.node(id))
    }

    // --- retrieval and serialization

    /// An owned snapshot of the node `id`, if published.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<ResolvedNode> {
        let nodes = self.nodes.read();
        nodes.get(id).map(|node| ResolvedNode {
            attribute: node.attribute(),
            data: node.data().to_vec(),
            parent: node.parent(),
        })
    }

    /// Number of published nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.read().len()
    }

    /// Visit every published node in ID order, under the read lock.
    pub fn foreach_node(&self, mut visit: impl FnMut(&Node)) {
        let nodes = self.nodes.read();
        for node in nodes.iter() {
            visit(node);
        }
    }

    /// Visit every registered attribute in ID order, under the read lock.
    pub fn foreach_attribute(&self, mut visit: impl FnMut(&Attribute)) {
        let attributes = self.attributes.read();
        for attribute in attributes.iter() {
            visit(attribute);
        }
    }

    /// Run the configured metadata writer over the registry and the tree.
    ///
    /// `output = "none"` succeeds without output; an unregistered writer
    /// name and writer failures are logged and reported as `false`.
    #[must_use]
    pub fn write_metadata(&self) -> bool {
        let name = self.config.output();
        if name == "none" {
            return true;
        }

        let Some(writer) = self.writers.writer(name) else {
            tracing::error!(writer = name, "metadata writer not found");
            return false;
        };

        let attribute_walk = |visit: &mut dyn FnMut(&Attribute)| {
            let attributes = self.attributes.read();
            for attribute in attributes.iter() {
                visit(attribute);
            }
        };
        let node_walk = |visit: &mut dyn FnMut(&Node)| {
            let nodes = self.nodes.read();
            for node in nodes.iter() {
                visit(node);
            }
        };

        match writer.write(&attribute_walk, &node_walk) {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(writer = name, %error, "metadata output failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for Vernier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vernier")
            .field("attributes", &self.num_attributes())
            .field("nodes", &self.num_nodes())
            .field("environments", &self.context.environment_count())
            .field("writers", &self.writers)
            .finish()
    }
}

/// Read an inline slot payload: exactly one little-endian 64-bit word.
fn inline_value(attribute: &Attribute, data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| VernierError::PayloadSize {
            attribute: attribute.id(),
            expected: 8,
            actual: data.len(),
        })?;
    Ok(u64::from_le_bytes(bytes))
}

/// Opportunistic type check: fixed-width attribute types take payloads of
/// exactly their width.
fn check_width(attribute: &Attribute, data: &[u8]) -> Result<()> {
    if let Some(width) = attribute.attribute_type().fixed_width() {
        if data.len() != width {
            return Err(VernierError::TypeMismatch {
                attribute: attribute.id(),
                expected: attribute.attribute_type().as_str(),
                width,
                actual: data.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Variant;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn runtime() -> Vernier {
        Vernier::create(RuntimeConfig::default().with_output("none"))
    }

    fn string_attr(rt: &Vernier, name: &str) -> Attribute {
        rt.create_attribute(name, AttributeType::String, AttributeProperties::empty())
            .unwrap()
    }

    #[test]
    fn begin_end_restores_prior_state() {
        let rt = runtime();
        let env = EnvironmentId::DEFAULT;
        let function = string_attr(&rt, "function");

        assert_eq!(rt.get(env, function.id()), None);
        rt.begin(env, &function, b"main").unwrap();
        let outer = rt.get(env, function.id()).unwrap();

        rt.begin(env, &function, b"solve").unwrap();
        rt.end(env, &function).unwrap();
        assert_eq!(rt.get(env, function.id()), Some(outer));

        rt.end(env, &function).unwrap();
        assert_eq!(rt.get(env, function.id()), None);
    }

    #[test]
    fn nesting_points_at_the_deepest_value() {
        let rt = runtime();
        let env = EnvironmentId::DEFAULT;
        let function = string_attr(&rt, "function");

        rt.begin(env, &function, b"outer").unwrap();
        rt.begin(env, &function, b"inner").unwrap();
        rt.end(env, &function).unwrap();

        let slot = rt.get(env, function.id()).unwrap();
        let node = rt.node(slot.as_node().unwrap()).unwrap();
        assert_eq!(node.data, b"outer");
    }

    #[test]
    fn set_replaces_without_nesting() {
        let rt = runtime();
        let env = EnvironmentId::DEFAULT;
        let phase = string_attr(&rt, "phase");

        rt.begin(env, &phase, b"outer").unwrap();
        rt.begin(env, &phase, b"first").unwrap();
        rt.set(env, &phase, b"second").unwrap();

        let node = rt
            .node(rt.get(env, phase.id()).unwrap().as_node().unwrap())
            .unwrap();
        assert_eq!(node.data, b"second");

        // Replacement kept the depth: the parent is still "outer".
        let parent = rt.node(node.parent.unwrap()).unwrap();
        assert_eq!(parent.data, b"outer");

        // set with no current slot attaches under the root.
        let other = string_attr(&rt, "other");
        rt.set(env, &other, b"value").unwrap();
        let node = rt
            .node(rt.get(env, other.id()).unwrap().as_node().unwrap())
            .unwrap();
        assert_eq!(node.parent, None);
    }

    #[test]
    fn out_of_order_ends_are_tolerated() {
        let rt = runtime();
        let env = EnvironmentId::DEFAULT;
        let a = string_attr(&rt, "a");
        let b = string_attr(&rt, "b");

        rt.begin(env, &a, b"x").unwrap();
        rt.begin(env, &b, b"y").unwrap();

        // Ending a before b pops a's own layer and leaves b untouched.
        let b_slot = rt.get(env, b.id()).unwrap();
        rt.end(env, &a).unwrap();

        assert_eq!(rt.get(env, a.id()), None);
        assert_eq!(rt.get(env, b.id()), Some(b_slot));
    }

    #[test]
    fn value_attributes_store_inline() {
        let rt = runtime();
        let env = EnvironmentId::DEFAULT;
        let count = rt
            .create_attribute(
                "count",
                AttributeType::Uint,
                AttributeProperties::STORE_AS_VALUE,
            )
            .unwrap();

        rt.set(env, &count, &7u64.to_le_bytes()).unwrap();
        assert_eq!(rt.get(env, count.id()), Some(Slot::Value(7)));
        assert_eq!(rt.num_nodes(), 0);

        rt.end(env, &count).unwrap();
        assert_eq!(rt.get(env, count.id()), None);

        let err = rt.set(env, &count, &[1, 2, 3]).unwrap_err();
        assert_eq!(err.code(), "invalid-argument");
    }

    #[test]
    fn invalid_attribute_is_rejected_everywhere() {
        let rt = runtime();
        let env = EnvironmentId::DEFAULT;
        let invalid = Attribute::invalid();

        assert_eq!(rt.begin(env, &invalid, b"x").unwrap_err().code(), "invalid-argument");
        assert_eq!(rt.end(env, &invalid).unwrap_err().code(), "invalid-argument");
        assert_eq!(rt.set(env, &invalid, b"x").unwrap_err().code(), "invalid-argument");
    }

    #[test]
    fn end_without_begin_is_invalid() {
        let rt = runtime();
        let function = string_attr(&rt, "function");
        let err = rt.end(EnvironmentId::DEFAULT, &function).unwrap_err();
        assert_eq!(err.code(), "invalid-argument");
    }

    #[test]
    fn fixed_width_payloads_are_checked() {
        let rt = runtime();
        let env = EnvironmentId::DEFAULT;
        let depth = rt
            .create_attribute("depth", AttributeType::Uint, AttributeProperties::empty())
            .unwrap();

        let err = rt.begin(env, &depth, b"oops").unwrap_err();
        assert_eq!(err.code(), "type-mismatch");
        rt.begin(env, &depth, &3u64.to_le_bytes()).unwrap();
    }

    #[test]
    fn attribute_lookup_round_trip() {
        let rt = runtime();
        let function = string_attr(&rt, "function");

        assert_eq!(rt.get_attribute(function.id()).name(), "function");
        assert_eq!(rt.get_attribute_by_name("function"), function);
        assert!(!rt.get_attribute_by_name("absent").is_valid());
        assert_eq!(rt.num_attributes(), 1);
    }

    #[test]
    fn unpack_round_trips_the_trie_walk() {
        let rt = runtime();
        let env = EnvironmentId::DEFAULT;
        let function = string_attr(&rt, "function");

        rt.begin(env, &function, b"foo").unwrap();
        rt.begin(env, &function, b"bar").unwrap();

        let mut buf = vec![0u64; rt.context_size(env)];
        let written = rt.get_context(env, &mut buf).unwrap();
        let records = rt.unpack(&buf[..written]).unwrap();

        assert_eq!(records.len(), 1);
        let values: Vec<_> = records[0]
            .entries
            .iter()
            .map(|e| e.value.clone())
            .collect();
        assert_eq!(
            values,
            [Variant::Str("foo".into()), Variant::Str("bar".into())]
        );
    }

    #[test]
    fn events_fire_in_registration_order_after_mutation() {
        let mut rt = Vernier::new(RuntimeConfig::default().with_output("none"));
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        rt.events_mut().on_begin(Box::new(move |rt, env, attribute| {
            // The state change is visible from inside the callback.
            assert!(rt.get(env, attribute.id()).is_some());
            first.lock().push("first");
        }));
        let second = Arc::clone(&order);
        rt.events_mut().on_begin(Box::new(move |_, _, _| {
            second.lock().push("second");
        }));
        rt.init();

        let function = string_attr(&rt, "function");
        rt.begin(EnvironmentId::DEFAULT, &function, b"f").unwrap();
        assert_eq!(*order.lock(), ["first", "second"]);
    }

    #[test]
    fn panicking_callback_does_not_poison_the_mutator() {
        let mut rt = Vernier::new(RuntimeConfig::default().with_output("none"));
        rt.events_mut().on_begin(Box::new(|_, _, _| panic!("bad plugin")));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        rt.events_mut().on_begin(Box::new(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        rt.init();

        let function = string_attr(&rt, "function");
        rt.begin(EnvironmentId::DEFAULT, &function, b"f").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn create_attribute_event_fires_once_per_name() {
        let mut rt = Vernier::new(RuntimeConfig::default().with_output("none"));
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        rt.events_mut().on_create_attribute(Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        rt.init();

        string_attr(&rt, "function");
        string_attr(&rt, "function");
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn environment_callback_overrides_the_default() {
        let mut rt = Vernier::new(RuntimeConfig::default().with_output("none"));
        assert_eq!(rt.current_environment(), EnvironmentId::DEFAULT);

        rt.set_environment_callback(Box::new(|| EnvironmentId::new(3)));
        rt.init();
        assert_eq!(rt.current_environment(), EnvironmentId::new(3));
    }

    #[test]
    fn singleton_lifecycle() {
        let rt = Vernier::instance();
        assert!(Vernier::try_instance().is_some());

        let marker = rt
            .create_attribute(
                "lifecycle-marker",
                AttributeType::Uint,
                AttributeProperties::STORE_AS_VALUE,
            )
            .unwrap();
        assert!(marker.is_valid());

        Vernier::finalize();
        assert!(Vernier::try_instance().is_none());
    }
}
