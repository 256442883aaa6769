//! Attribute registry.
//!
//! Attributes are the named, typed keys under which instrumented code
//! records values. IDs are dense from 0 and stable for the process lifetime;
//! attributes are never destroyed.

use crate::types::AttributeId;
use crate::variant::AttributeType;
use bitflags::bitflags;
use std::collections::HashMap;
use std::sync::Arc;

bitflags! {
    /// Behavior flags attached to an attribute at creation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttributeProperties: u32 {
        /// Store the value inline in the context slot instead of interning
        /// a tree node. Requires 8-byte payloads.
        const STORE_AS_VALUE = 1 << 0;
        /// Overlay this attribute's slot onto every environment's packed
        /// context.
        const GLOBAL = 1 << 1;
    }
}

/// A registered attribute.
///
/// Cheap to clone; the name is shared. Equality compares the ID, which is
/// unique within the registry.
#[derive(Debug, Clone)]
pub struct Attribute {
    id: AttributeId,
    name: Arc<str>,
    attr_type: AttributeType,
    properties: AttributeProperties,
}

impl Attribute {
    /// The invalid-attribute sentinel. Every facade operation that receives
    /// it fails with an invalid-argument status.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            id: AttributeId::INVALID,
            name: Arc::from(""),
            attr_type: AttributeType::Inv,
            properties: AttributeProperties::empty(),
        }
    }

    /// Whether this is a real registered attribute.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.id.is_valid()
    }

    /// The attribute's dense ID.
    #[must_use]
    pub fn id(&self) -> AttributeId {
        self.id
    }

    /// The attribute's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared value type.
    #[must_use]
    pub fn attribute_type(&self) -> AttributeType {
        self.attr_type
    }

    /// The property flags.
    #[must_use]
    pub fn properties(&self) -> AttributeProperties {
        self.properties
    }

    /// Whether values are stored inline in the context slot.
    #[must_use]
    pub fn store_as_value(&self) -> bool {
        self.properties.contains(AttributeProperties::STORE_AS_VALUE)
    }

    /// Whether the attribute overlays every environment's context.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.properties.contains(AttributeProperties::GLOBAL)
    }
}

impl PartialEq for Attribute {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Attribute {}

/// Name-to-ID registry of attributes.
///
/// The registry does no locking of its own; the runtime guards it with the
/// attribute RW lock.
#[derive(Debug, Default)]
pub struct AttributeRegistry {
    entries: Vec<Attribute>,
    index: HashMap<Arc<str>, AttributeId>,
}

impl AttributeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the attribute `name`, or return the existing record.
    ///
    /// Creation is first-writer-wins: if `name` is already registered, the
    /// original record is returned unchanged even when `attr_type` or
    /// `properties` differ. The boolean reports whether a new entry was
    /// inserted, so the caller can fire the create-attribute event exactly
    /// once per attribute.
    pub fn create(
        &mut self,
        name: &str,
        attr_type: AttributeType,
        properties: AttributeProperties,
    ) -> (Attribute, bool) {
        if let Some(&id) = self.index.get(name) {
            let existing = self.entries[id.as_u32() as usize].clone();
            if existing.attr_type != attr_type || existing.properties != properties {
                tracing::debug!(
                    attribute = name,
                    "re-registration with different type or properties returns the original"
                );
            }
            return (existing, false);
        }

        let id = AttributeId::new(self.entries.len() as u32);
        let name: Arc<str> = Arc::from(name);
        let attribute = Attribute {
            id,
            name: Arc::clone(&name),
            attr_type,
            properties,
        };
        self.entries.push(attribute.clone());
        self.index.insert(name, id);
        (attribute, true)
    }

    /// Look up an attribute by ID; the invalid sentinel on miss.
    #[must_use]
    pub fn get(&self, id: AttributeId) -> Attribute {
        self.entries
            .get(id.as_u32() as usize)
            .cloned()
            .unwrap_or_else(Attribute::invalid)
    }

    /// Look up an attribute by name; the invalid sentinel on miss.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Attribute {
        match self.index.get(name) {
            Some(&id) => self.entries[id.as_u32() as usize].clone(),
            None => Attribute::invalid(),
        }
    }

    /// Number of registered attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over attributes in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.entries.iter()
    }
}
