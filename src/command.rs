//! Write commands: turn one row into a bulk action header and document body.

use serde_json::value::RawValue;
use serde_json::Value;
use tracing::{debug, info};

use crate::alias::FieldAlias;
use crate::error::{BridgeError, Result};
use crate::models::bulk::{ActionHeader, ActionMetadata, BulkEntry, DocumentBody, Operation, Source};
use crate::models::Row;
use crate::settings::{Settings, ES_INPUT_JSON, ES_MAPPING_ID, ES_MAPPING_PARENT, ES_MAPPING_ROUTING};

/// Reads one metadata value (id, routing or parent) out of a row.
#[derive(Debug, Clone)]
struct FieldExtractor {
    key: &'static str,
    field: String,
    store_field: String,
}

impl FieldExtractor {
    fn from_settings(key: &'static str, field: Option<&str>, alias: &FieldAlias) -> Option<Self> {
        field.map(|field| Self {
            key,
            field: field.to_string(),
            store_field: alias.to_es(field).to_string(),
        })
    }

    /// Looks up the logical name first, then the store name (JSON input carries store names).
    fn extract(&self, row: &Row) -> Result<String> {
        let value = row
            .get(&self.field)
            .or_else(|| row.get(&self.store_field))
            .filter(|value| !value.is_null())
            .ok_or_else(|| BridgeError::MissingField {
                key: self.key.to_string(),
                field: self.field.clone(),
            })?;
        match value {
            Value::String(text) => Ok(text.clone()),
            Value::Number(number) => Ok(number.to_string()),
            Value::Bool(flag) => Ok(flag.to_string()),
            other => Err(BridgeError::InvalidFieldValue {
                key: self.key.to_string(),
                field: self.field.clone(),
                value: other.to_string(),
            }),
        }
    }
}

/// A write strategy bound to one [`Operation`], fixed for the whole task.
#[derive(Debug, Clone)]
pub struct Command {
    operation: Operation,
    alias: FieldAlias,
    id: Option<FieldExtractor>,
    routing: Option<FieldExtractor>,
    parent: Option<FieldExtractor>,
    upsert: bool,
    input_json: bool,
}

/// Selects and builds the command named by `es.write.operation`.
pub fn create_command(settings: &Settings) -> Result<Command> {
    Command::from_settings(settings)
}

impl Command {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let operation: Operation = settings.get_operation().parse()?;
        let alias = FieldAlias::from_settings(settings)?;
        Self::with_alias(settings, operation, alias)
    }

    pub fn with_alias(settings: &Settings, operation: Operation, alias: FieldAlias) -> Result<Self> {
        let id = FieldExtractor::from_settings(ES_MAPPING_ID, settings.get_mapping_id(), &alias);
        if operation == Operation::Update && id.is_none() {
            return Err(BridgeError::MissingSetting {
                key: ES_MAPPING_ID.to_string(),
                reason: "update operations need a document id".to_string(),
            });
        }
        let routing =
            FieldExtractor::from_settings(ES_MAPPING_ROUTING, settings.get_mapping_routing(), &alias);
        let parent =
            FieldExtractor::from_settings(ES_MAPPING_PARENT, settings.get_mapping_parent(), &alias);
        let upsert = settings.is_upsert_doc()?;
        let input_json = settings.is_input_json()?;

        info!(
            "Prepared [{}] command: id={:?}, routing={:?}, parent={:?}, upsert={}, json={}, aliases={}",
            operation,
            id.as_ref().map(|e| &e.field),
            routing.as_ref().map(|e| &e.field),
            parent.as_ref().map(|e| &e.field),
            upsert,
            input_json,
            alias.len()
        );

        Ok(Self {
            operation,
            alias,
            id,
            routing,
            parent,
            upsert,
            input_json,
        })
    }

    pub fn get_operation(&self) -> Operation {
        self.operation
    }
    pub fn get_alias(&self) -> &FieldAlias {
        &self.alias
    }
    pub fn is_upsert(&self) -> bool {
        self.upsert
    }

    pub fn build(&self, row: &Row) -> Result<BulkEntry> {
        let (source, lookup) = if self.input_json {
            let (raw, document) = self.json_source(row)?;
            (Source::Raw(raw), document)
        } else {
            (Source::Fields(self.aliased(row)), None)
        };
        let lookup = lookup.as_ref().unwrap_or(row);

        let metadata = ActionMetadata::new(
            extract(&self.id, lookup)?,
            extract(&self.routing, lookup)?,
            extract(&self.parent, lookup)?,
        );
        debug!(
            "Built [{}] entry id={:?} routing={:?} parent={:?}",
            self.operation,
            metadata.get_id(),
            metadata.get_routing(),
            metadata.get_parent()
        );

        let body = match self.operation {
            Operation::Create | Operation::Index => DocumentBody::Full(source),
            Operation::Update => DocumentBody::Partial {
                doc: source,
                doc_as_upsert: self.upsert,
            },
        };
        Ok(BulkEntry::new(ActionHeader::new(self.operation, metadata), body))
    }

    fn aliased(&self, row: &Row) -> Row {
        row.iter()
            .map(|(name, value)| (self.alias.to_es(name).to_string(), value.clone()))
            .collect()
    }

    /// The row carries a single field holding document text. The text is kept verbatim;
    /// it is parsed only when metadata has to be read from it.
    fn json_source(&self, row: &Row) -> Result<(Box<RawValue>, Option<Row>)> {
        let (name, value) = row.iter().next().ok_or_else(|| BridgeError::MissingField {
            key: ES_INPUT_JSON.to_string(),
            field: String::from("<document>"),
        })?;
        let text = value.as_str().ok_or_else(|| BridgeError::InvalidFieldValue {
            key: ES_INPUT_JSON.to_string(),
            field: name.clone(),
            value: value.to_string(),
        })?;
        let raw = RawValue::from_string(text.to_string())?;
        let needs_lookup = self.id.is_some() || self.routing.is_some() || self.parent.is_some();
        let document = if needs_lookup {
            Some(serde_json::from_str::<Row>(text)?)
        } else {
            None
        };
        Ok((raw, document))
    }
}

fn extract(extractor: &Option<FieldExtractor>, row: &Row) -> Result<Option<String>> {
    extractor.as_ref().map(|e| e.extract(row)).transpose()
}
