//! Per-environment context store.
//!
//! Every environment maps attribute IDs to slots; a slot holds either an
//! inline 64-bit value (for value-class attributes) or a node ID into the
//! shared context tree. Each environment sits behind its own signal-safe RW
//! lock so writes to distinct environments never serialize on each other;
//! the outer lock only guards growth of the environment table.
//!
//! Global attributes live in a process-wide overlay that is merged into
//! every environment's lookups and packed output.

use crate::error::{Result, VernierError};
use crate::lock::SigsafeRwLock;
use crate::record;
use crate::types::{AttributeId, EnvironmentId, NodeId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One context entry: an inline value or a reference into the context tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Inline 64-bit value; only value-class attributes use this form.
    Value(u64),
    /// Reference to a published node.
    Node(NodeId),
}

impl Slot {
    /// The raw 64-bit payload (the value itself, or the node id).
    #[must_use]
    pub fn raw(&self) -> u64 {
        match self {
            Self::Value(v) => *v,
            Self::Node(id) => id.as_u64(),
        }
    }

    /// The node reference, if this slot holds one.
    #[must_use]
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Value(_) => None,
        }
    }
}

/// Slot map of a single environment. `BTreeMap` keeps packed output in
/// stable attribute-id order.
#[derive(Debug, Clone, Default)]
struct Environment {
    slots: BTreeMap<AttributeId, Slot>,
}

type EnvironmentCell = Arc<SigsafeRwLock<Environment>>;

/// The context store: environment table plus the global overlay.
#[derive(Debug)]
pub struct ContextStore {
    environments: SigsafeRwLock<Vec<EnvironmentCell>>,
    globals: SigsafeRwLock<Environment>,
}

impl ContextStore {
    /// Create a store containing only the default environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            environments: SigsafeRwLock::new(vec![EnvironmentCell::default()]),
            globals: SigsafeRwLock::new(Environment::default()),
        }
    }

    /// Number of environments.
    #[must_use]
    pub fn environment_count(&self) -> usize {
        self.environments.read().len()
    }

    /// Snapshot `src` into a fresh environment and return its ID.
    ///
    /// The copy is atomic with respect to `src` (taken under its read lock);
    /// the two environments are fully independent afterwards. The global
    /// overlay is shared, not copied.
    pub fn clone_environment(&self, src: EnvironmentId) -> EnvironmentId {
        let snapshot = {
            let cell = self.environment(src);
            let guard = cell.read();
            guard.clone()
        };

        let mut environments = self.environments.write();
        environments.push(Arc::new(SigsafeRwLock::new(snapshot)));
        EnvironmentId::new((environments.len() - 1) as u32)
    }

    /// Get the cell for `id`, creating empty environments up to it on first
    /// access.
    fn environment(&self, id: EnvironmentId) -> EnvironmentCell {
        {
            let environments = self.environments.read();
            if let Some(cell) = environments.get(id.as_usize()) {
                return Arc::clone(cell);
            }
        }

        let mut environments = self.environments.write();
        while environments.len() <= id.as_usize() {
            environments.push(EnvironmentCell::default());
        }
        Arc::clone(&environments[id.as_usize()])
    }

    /// Read the slot for `attribute` in `env`, falling back to the global
    /// overlay.
    #[must_use]
    pub fn get(&self, env: EnvironmentId, attribute: AttributeId) -> Option<Slot> {
        {
            let cell = self.environment(env);
            let guard = cell.read();
            if let Some(slot) = guard.slots.get(&attribute) {
                return Some(*slot);
            }
        }
        self.globals.read().slots.get(&attribute).copied()
    }

    /// Replace the slot for `attribute`. Global attributes go to the shared
    /// overlay; everything else is local to `env`.
    pub fn set(&self, env: EnvironmentId, attribute: AttributeId, slot: Slot, is_global: bool) {
        if is_global {
            self.globals.write().slots.insert(attribute, slot);
        } else {
            let cell = self.environment(env);
            cell.write().slots.insert(attribute, slot);
        }
    }

    /// Remove the slot for `attribute`; reports whether one was present.
    ///
    /// The local slot is tried first, then the global overlay, matching the
    /// lookup order of [`ContextStore::get`].
    pub fn unset(&self, env: EnvironmentId, attribute: AttributeId) -> bool {
        {
            let cell = self.environment(env);
            if cell.write().slots.remove(&attribute).is_some() {
                return true;
            }
        }
        self.globals.write().slots.remove(&attribute).is_some()
    }

    /// Words required to pack `env`'s context (local slots plus unshadowed
    /// globals).
    #[must_use]
    pub fn context_size(&self, env: EnvironmentId) -> usize {
        let cell = self.environment(env);
        let local = cell.read();
        let globals = self.globals.read();
        let merged = globals
            .slots
            .keys()
            .filter(|key| !local.slots.contains_key(key))
            .count();
        (local.slots.len() + merged) * record::RECORD_WORDS
    }

    /// Pack `env`'s context into `buf`.
    ///
    /// Returns the required word count. If `buf` is too small, nothing is
    /// written and the caller grows the buffer and retries.
    ///
    /// This path is safe to call from a signal handler that interrupted a
    /// mutator: every lock is taken with `try_read`, and contention with a
    /// writer surfaces as [`VernierError::Unavailable`] instead of a
    /// deadlock.
    pub fn get_context(&self, env: EnvironmentId, buf: &mut [u64]) -> Result<usize> {
        let environments = self.environments.try_read().ok_or(VernierError::Unavailable)?;
        let cell = environments.get(env.as_usize()).map(Arc::clone);
        drop(environments);

        // An environment that was never touched packs as overlay-only.
        let local_guard = match &cell {
            Some(cell) => Some(cell.try_read().ok_or(VernierError::Unavailable)?),
            None => None,
        };
        let globals = self.globals.try_read().ok_or(VernierError::Unavailable)?;

        let empty = BTreeMap::new();
        let local_slots = local_guard.as_deref().map_or(&empty, |e| &e.slots);

        let required = (local_slots.len()
            + globals
                .slots
                .keys()
                .filter(|key| !local_slots.contains_key(key))
                .count())
            * record::RECORD_WORDS;

        if buf.len() < required {
            return Ok(required);
        }

        let mut cursor = 0;
        for (&attribute, &slot) in local_slots {
            buf[cursor..cursor + record::RECORD_WORDS]
                .copy_from_slice(&record::encode(attribute, slot));
            cursor += record::RECORD_WORDS;
        }
        for (&attribute, &slot) in &globals.slots {
            if local_slots.contains_key(&attribute) {
                continue;
            }
            buf[cursor..cursor + record::RECORD_WORDS]
                .copy_from_slice(&record::encode(attribute, slot));
            cursor += record::RECORD_WORDS;
        }

        Ok(required)
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}
