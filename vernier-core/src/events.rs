//! Event fan-out for service plugins.
//!
//! Services subscribe to hook points while the runtime is being initialized
//! and still exclusively owned; after publication the callback lists are
//! read-only, so dispatch needs no locking. Callbacks run synchronously on
//! the mutating thread, in registration order, after the state change they
//! observe and with no runtime locks held.
//!
//! A callback must not call `begin`/`end`/`set` for the same
//! (environment, attribute) it is being notified about; that reentrancy is
//! undefined. Panics are caught and logged, never propagated into the
//! mutator.

use crate::attribute::Attribute;
use crate::runtime::Vernier;
use crate::types::EnvironmentId;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Callback for the begin/end/set hooks.
pub type AnnotationCallback = Box<dyn Fn(&Vernier, EnvironmentId, &Attribute) + Send + Sync>;

/// Callback for the query hook, fired before a context snapshot is taken.
pub type QueryCallback = Box<dyn Fn(&Vernier, EnvironmentId) + Send + Sync>;

/// Callback for attribute creation.
pub type AttributeCallback = Box<dyn Fn(&Vernier, &Attribute) + Send + Sync>;

/// Callback for lifecycle hooks (init-complete, finalize).
pub type LifecycleCallback = Box<dyn Fn(&Vernier) + Send + Sync>;

/// The hook points services can subscribe to.
#[derive(Default)]
pub struct Events {
    query: Vec<QueryCallback>,
    begin: Vec<AnnotationCallback>,
    end: Vec<AnnotationCallback>,
    set: Vec<AnnotationCallback>,
    create_attribute: Vec<AttributeCallback>,
    init_complete: Vec<LifecycleCallback>,
    finalize: Vec<LifecycleCallback>,
}

impl Events {
    /// Subscribe to the query hook.
    pub fn on_query(&mut self, callback: QueryCallback) {
        self.query.push(callback);
    }

    /// Subscribe to the begin hook.
    pub fn on_begin(&mut self, callback: AnnotationCallback) {
        self.begin.push(callback);
    }

    /// Subscribe to the end hook.
    pub fn on_end(&mut self, callback: AnnotationCallback) {
        self.end.push(callback);
    }

    /// Subscribe to the set hook.
    pub fn on_set(&mut self, callback: AnnotationCallback) {
        self.set.push(callback);
    }

    /// Subscribe to attribute creation.
    pub fn on_create_attribute(&mut self, callback: AttributeCallback) {
        self.create_attribute.push(callback);
    }

    /// Subscribe to the end of initialization.
    pub fn on_init_complete(&mut self, callback: LifecycleCallback) {
        self.init_complete.push(callback);
    }

    /// Subscribe to runtime finalization.
    pub fn on_finalize(&mut self, callback: LifecycleCallback) {
        self.finalize.push(callback);
    }

    pub(crate) fn fire_query(&self, runtime: &Vernier, env: EnvironmentId) {
        for callback in &self.query {
            guarded("query", || callback(runtime, env));
        }
    }

    pub(crate) fn fire_begin(&self, runtime: &Vernier, env: EnvironmentId, attribute: &Attribute) {
        for callback in &self.begin {
            guarded("begin", || callback(runtime, env, attribute));
        }
    }

    pub(crate) fn fire_end(&self, runtime: &Vernier, env: EnvironmentId, attribute: &Attribute) {
        for callback in &self.end {
            guarded("end", || callback(runtime, env, attribute));
        }
    }

    pub(crate) fn fire_set(&self, runtime: &Vernier, env: EnvironmentId, attribute: &Attribute) {
        for callback in &self.set {
            guarded("set", || callback(runtime, env, attribute));
        }
    }

    pub(crate) fn fire_create_attribute(&self, runtime: &Vernier, attribute: &Attribute) {
        for callback in &self.create_attribute {
            guarded("create-attribute", || callback(runtime, attribute));
        }
    }

    pub(crate) fn fire_init_complete(&self, runtime: &Vernier) {
        for callback in &self.init_complete {
            guarded("init-complete", || callback(runtime));
        }
    }

    pub(crate) fn fire_finalize(&self, runtime: &Vernier) {
        for callback in &self.finalize {
            guarded("finalize", || callback(runtime));
        }
    }
}

impl std::fmt::Debug for Events {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Events")
            .field("query", &self.query.len())
            .field("begin", &self.begin.len())
            .field("end", &self.end.len())
            .field("set", &self.set.len())
            .field("create_attribute", &self.create_attribute.len())
            .field("init_complete", &self.init_complete.len())
            .field("finalize", &self.finalize.len())
            .finish()
    }
}

/// Run one callback, swallowing (and logging) a panic so it cannot unwind
/// into the annotation path.
fn guarded(hook: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(hook, "event callback panicked; continuing");
    }
}
