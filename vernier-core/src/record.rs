//! The packed context buffer contract.
//!
//! `get_context` emits snapshots as a flat sequence of 64-bit words and
//! `unpack` turns them back into attribute/value chains. Both directions
//! live here so the wire layout has exactly one owner.
//!
//! Layout, per record:
//!
//! ```text
//! word 0 (header):  bits 0..32  attribute id
//!                   bit  32     set = payload is a node id, clear = inline value
//! word 1 (payload): the inline 64-bit value, or the node id zero-extended
//! ```
//!
//! Words are host-endian; buffers do not cross process boundaries.

use crate::attribute::Attribute;
use crate::context::Slot;
use crate::error::{Result, VernierError};
use crate::types::{AttributeId, NodeId};
use crate::variant::Variant;
use serde::{Deserialize, Serialize};

/// Words per packed record.
pub const RECORD_WORDS: usize = 2;

const NODE_FLAG: u64 = 1 << 32;
const ATTR_MASK: u64 = u32::MAX as u64;

/// Encode one context slot as a packed record.
pub(crate) fn encode(attribute: AttributeId, slot: Slot) -> [u64; RECORD_WORDS] {
    match slot {
        Slot::Value(value) => [u64::from(attribute.as_u32()), value],
        Slot::Node(id) => [u64::from(attribute.as_u32()) | NODE_FLAG, id.as_u64()],
    }
}

/// An owned snapshot of a published node, as handed to the decoder by the
/// runtime's resolver closure.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    /// The attribute whose value the node carries.
    pub attribute: AttributeId,
    /// The value payload.
    pub data: Vec<u8>,
    /// The parent node, `None` for children of the root.
    pub parent: Option<NodeId>,
}

/// One decoded `attribute = value` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// The attribute's name.
    pub attribute: String,
    /// The attribute's ID.
    pub attribute_id: AttributeId,
    /// The decoded value.
    pub value: Variant,
}

/// One decoded record: a chain of entries ordered root to leaf.
///
/// Inline-value records decode to a single entry; node records expand to the
/// full chain of `(attribute, value)` pairs from the outermost annotation
/// down to the referenced node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContextRecord {
    /// The chain entries, outermost first.
    pub entries: Vec<ContextEntry>,
}

/// Decode a packed context buffer.
///
/// `attribute_of` and `node_of` are injected by the runtime so the decoder
/// itself holds no locks; they resolve IDs against the registry and the node
/// store.
///
/// # Errors
///
/// Fails with an invalid-argument status on truncated buffers, unknown
/// attribute or node IDs, and with a type-mismatch status when a node
/// payload does not fit its attribute's declared type.
pub fn unpack<A, N>(buf: &[u64], attribute_of: A, node_of: N) -> Result<Vec<ContextRecord>>
where
    A: Fn(AttributeId) -> Attribute,
    N: Fn(NodeId) -> Option<ResolvedNode>,
{
    if buf.len() % RECORD_WORDS != 0 {
        return Err(VernierError::InvalidArgument {
            reason: format!("packed buffer of {} words is truncated", buf.len()),
        });
    }

    let mut records = Vec::with_capacity(buf.len() / RECORD_WORDS);

    for pair in buf.chunks_exact(RECORD_WORDS) {
        let (header, payload) = (pair[0], pair[1]);
        let attribute_id = AttributeId::new((header & ATTR_MASK) as u32);

        let record = if header & NODE_FLAG == 0 {
            let attribute = attribute_of(attribute_id);
            if !attribute.is_valid() {
                return Err(VernierError::InvalidArgument {
                    reason: format!("packed record references unknown {attribute_id}"),
                });
            }
            ContextRecord {
                entries: vec![ContextEntry {
                    attribute: attribute.name().to_owned(),
                    attribute_id,
                    value: Variant::from_word(attribute.attribute_type(), payload),
                }],
            }
        } else {
            if payload > ATTR_MASK {
                return Err(VernierError::InvalidArgument {
                    reason: format!("packed record carries out-of-range node id {payload}"),
                });
            }
            expand_chain(NodeId::new(payload as u32), &attribute_of, &node_of)?
        };

        records.push(record);
    }

    Ok(records)
}

/// Walk `leaf`'s parent chain and decode it into a root-first record.
fn expand_chain<A, N>(leaf: NodeId, attribute_of: &A, node_of: &N) -> Result<ContextRecord>
where
    A: Fn(AttributeId) -> Attribute,
    N: Fn(NodeId) -> Option<ResolvedNode>,
{
    let mut entries = Vec::new();
    let mut cursor = Some(leaf);

    while let Some(id) = cursor {
        let node = node_of(id).ok_or_else(|| VernierError::InvalidArgument {
            reason: format!("packed record references unknown {id}"),
        })?;
        let attribute = attribute_of(node.attribute);
        if !attribute.is_valid() {
            return Err(VernierError::InvalidArgument {
                reason: format!("{id} carries unknown {}", node.attribute),
            });
        }
        entries.push(ContextEntry {
            attribute: attribute.name().to_owned(),
            attribute_id: node.attribute,
            value: Variant::from_bytes(node.attribute, attribute.attribute_type(), &node.data)?,
        });
        cursor = node.parent;
    }

    entries.reverse();
    Ok(ContextRecord { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeProperties, AttributeRegistry};
    use crate::variant::AttributeType;
    use std::collections::HashMap;

    fn registry() -> AttributeRegistry {
        let mut reg = AttributeRegistry::new();
        reg.create(
            "function",
            AttributeType::String,
            AttributeProperties::empty(),
        );
        reg.create(
            "count",
            AttributeType::Uint,
            AttributeProperties::STORE_AS_VALUE,
        );
        reg
    }

    #[test]
    fn inline_value_records_decode_to_one_entry() {
        let reg = registry();
        let count = reg.get_by_name("count");

        let words = encode(count.id(), Slot::Value(7));
        let records = unpack(&words, |id| reg.get(id), |_| None).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entries.len(), 1);
        assert_eq!(records[0].entries[0].attribute, "count");
        assert_eq!(records[0].entries[0].value, Variant::Uint(7));
    }

    #[test]
    fn node_records_expand_root_first() {
        let reg = registry();
        let function = reg.get_by_name("function");

        let mut nodes = HashMap::new();
        nodes.insert(
            NodeId::new(0),
            ResolvedNode {
                attribute: function.id(),
                data: b"foo".to_vec(),
                parent: None,
            },
        );
        nodes.insert(
            NodeId::new(1),
            ResolvedNode {
                attribute: function.id(),
                data: b"bar".to_vec(),
                parent: Some(NodeId::new(0)),
            },
        );

        let words = encode(function.id(), Slot::Node(NodeId::new(1)));
        let records = unpack(&words, |id| reg.get(id), |id| nodes.get(&id).cloned()).unwrap();

        let values: Vec<_> = records[0]
            .entries
            .iter()
            .map(|e| e.value.to_string())
            .collect();
        assert_eq!(values, ["foo", "bar"]);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let reg = registry();
        let err = unpack(&[0u64], |id| reg.get(id), |_| None).unwrap_err();
        assert_eq!(err.code(), "invalid-argument");
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let reg = registry();

        let words = encode(AttributeId::new(99), Slot::Value(1));
        let err = unpack(&words, |id| reg.get(id), |_| None).unwrap_err();
        assert_eq!(err.code(), "invalid-argument");

        let function = reg.get_by_name("function");
        let words = encode(function.id(), Slot::Node(NodeId::new(5)));
        let err = unpack(&words, |id| reg.get(id), |_| None).unwrap_err();
        assert_eq!(err.code(), "invalid-argument");
    }

    #[test]
    fn records_serialize_for_downstream_consumers() {
        let reg = registry();
        let count = reg.get_by_name("count");
        let words = encode(count.id(), Slot::Value(3));
        let records = unpack(&words, |id| reg.get(id), |_| None).unwrap();

        let json = serde_json::to_string(&records).unwrap();
        assert!(json.contains("\"count\""));
        let back: Vec<ContextRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, records);
    }
}
