//! CSV metadata writer.
//!
//! Serializes the attribute registry to `attributes.csv` and the context
//! tree to `nodes.csv` in the configured output directory. Node payloads
//! are rendered through their attribute's declared type; payloads that do
//! not decode fall back to a hex rendering.

use super::{AttributeWalk, MetadataWriter, NodeWalk};
use crate::error::{Result, VernierError};
use crate::types::AttributeId;
use crate::variant::{AttributeType, Variant};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const ATTRIBUTES_FILE: &str = "attributes.csv";
const NODES_FILE: &str = "nodes.csv";

#[derive(Serialize)]
struct AttributeRow<'a> {
    id: u32,
    name: &'a str,
    r#type: &'static str,
    properties: u32,
}

#[derive(Serialize)]
struct NodeRow {
    id: u32,
    attribute: u32,
    parent: Option<u32>,
    data: String,
}

/// The built-in `csv` metadata writer.
pub struct CsvMetadataWriter {
    output_dir: PathBuf,
}

impl CsvMetadataWriter {
    /// Create a writer emitting into `output_dir`.
    #[must_use]
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    fn io_error(path: &Path, cause: impl std::fmt::Display) -> VernierError {
        VernierError::Io {
            path: path.to_path_buf(),
            cause: cause.to_string(),
        }
    }
}

impl MetadataWriter for CsvMetadataWriter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write(&self, attributes: AttributeWalk<'_>, nodes: NodeWalk<'_>) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| Self::io_error(&self.output_dir, e))?;

        let attr_path = self.output_dir.join(ATTRIBUTES_FILE);
        let mut writer =
            csv::Writer::from_path(&attr_path).map_err(|e| Self::io_error(&attr_path, e))?;

        let mut types: HashMap<AttributeId, AttributeType> = HashMap::new();
        let mut outcome = Ok(());
        attributes(&mut |attribute| {
            types.insert(attribute.id(), attribute.attribute_type());
            if outcome.is_ok() {
                outcome = writer
                    .serialize(AttributeRow {
                        id: attribute.id().as_u32(),
                        name: attribute.name(),
                        r#type: attribute.attribute_type().as_str(),
                        properties: attribute.properties().bits(),
                    })
                    .map_err(|e| Self::io_error(&attr_path, e));
            }
        });
        outcome?;
        writer.flush().map_err(|e| Self::io_error(&attr_path, e))?;

        let node_path = self.output_dir.join(NODES_FILE);
        let mut writer =
            csv::Writer::from_path(&node_path).map_err(|e| Self::io_error(&node_path, e))?;

        let mut outcome = Ok(());
        nodes(&mut |node| {
            let ty = types
                .get(&node.attribute())
                .copied()
                .unwrap_or(AttributeType::Usr);
            let data = Variant::from_bytes(node.attribute(), ty, node.data())
                .unwrap_or_else(|_| Variant::Usr(node.data().to_vec()))
                .to_string();
            if outcome.is_ok() {
                outcome = writer
                    .serialize(NodeRow {
                        id: node.id().as_u32(),
                        attribute: node.attribute().as_u32(),
                        parent: node.parent().map(|p| p.as_u32()),
                        data,
                    })
                    .map_err(|e| Self::io_error(&node_path, e));
            }
        });
        outcome?;
        writer.flush().map_err(|e| Self::io_error(&node_path, e))?;

        Ok(())
    }
}
