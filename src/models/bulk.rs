use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

use crate::buffer::BytesArray;
use crate::error::{BridgeError, Result};
use crate::models::Row;
use crate::settings::{ES_OPERATION_CREATE, ES_OPERATION_INDEX, ES_OPERATION_UPDATE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Insert, failing if the id already exists.
    Create,
    /// Insert or replace.
    Index,
    /// Partial merge into an existing document.
    Update,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => ES_OPERATION_CREATE,
            Operation::Index => ES_OPERATION_INDEX,
            Operation::Update => ES_OPERATION_UPDATE,
        }
    }
}

impl FromStr for Operation {
    type Err = BridgeError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            ES_OPERATION_CREATE => Ok(Operation::Create),
            ES_OPERATION_INDEX => Ok(Operation::Index),
            ES_OPERATION_UPDATE => Ok(Operation::Update),
            other => Err(BridgeError::UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionMetadata {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "_routing", skip_serializing_if = "Option::is_none")]
    routing: Option<String>,
    #[serde(rename = "_parent", skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
}

impl ActionMetadata {
    pub fn new(id: Option<String>, routing: Option<String>, parent: Option<String>) -> Self {
        Self {
            id,
            routing,
            parent,
        }
    }

    pub fn get_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
    pub fn get_routing(&self) -> Option<&str> {
        self.routing.as_deref()
    }
    pub fn get_parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

/// Bulk action line: `{"<operation>": {"_id": .., "_routing": .., "_parent": ..}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionHeader {
    operation: Operation,
    metadata: ActionMetadata,
}

impl ActionHeader {
    pub fn new(operation: Operation, metadata: ActionMetadata) -> Self {
        Self {
            operation,
            metadata,
        }
    }

    pub fn get_operation(&self) -> Operation {
        self.operation
    }
    pub fn get_metadata(&self) -> &ActionMetadata {
        &self.metadata
    }
}

impl Serialize for ActionHeader {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.operation.as_str(), &self.metadata)?;
        map.end()
    }
}

/// Document content: either aliased row fields or caller-provided JSON text sent verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Source {
    Fields(Row),
    Raw(Box<RawValue>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DocumentBody {
    Full(Source),
    Partial { doc: Source, doc_as_upsert: bool },
}

impl DocumentBody {
    pub fn get_source(&self) -> &Source {
        match self {
            DocumentBody::Full(source) => source,
            DocumentBody::Partial { doc, .. } => doc,
        }
    }
}

/// Action header plus body for one row. Produced per row and written out immediately.
#[derive(Debug, Clone)]
pub struct BulkEntry {
    header: ActionHeader,
    body: DocumentBody,
}

impl BulkEntry {
    pub fn new(header: ActionHeader, body: DocumentBody) -> Self {
        Self { header, body }
    }

    pub fn get_header(&self) -> &ActionHeader {
        &self.header
    }
    pub fn get_body(&self) -> &DocumentBody {
        &self.body
    }

    /// Appends the two NDJSON lines of this entry.
    pub fn write_to(&self, buffer: &mut BytesArray) -> Result<()> {
        serde_json::to_writer(&mut *buffer, &self.header)?;
        buffer.add_byte(b'\n');
        serde_json::to_writer(&mut *buffer, &self.body)?;
        buffer.add_byte(b'\n');
        Ok(())
    }
}
