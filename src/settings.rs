//! Immutable task settings.
//!
//! A [`Settings`] value is resolved once per task from external configuration and then
//! shared read-only. Mutation only happens through [`SettingsBuilder`], which produces a
//! fresh frozen copy.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{BridgeError, Result};

pub const ES_WRITE_OPERATION: &str = "es.write.operation";
pub const ES_MAPPING_NAMES: &str = "es.mapping.names";
pub const ES_MAPPING_ID: &str = "es.mapping.id";
pub const ES_MAPPING_PARENT: &str = "es.mapping.parent";
pub const ES_MAPPING_ROUTING: &str = "es.mapping.routing";
pub const ES_UPSERT_DOC: &str = "es.upsert.doc";
pub const ES_INDEX_READ_MISSING_AS_EMPTY: &str = "es.index.read.missing.as.empty";
pub const ES_NODES: &str = "es.nodes";
pub const ES_PORT: &str = "es.port";
pub const ES_RESOURCE: &str = "es.resource";
pub const ES_QUERY: &str = "es.query";
pub const ES_INPUT_JSON: &str = "es.input.json";
pub const ES_MAPPING_DATE_RICH: &str = "es.mapping.date.rich";

pub const INTERNAL_ES_TARGET_FIELDS: &str = "es.internal.target.fields";
pub const INTERNAL_ES_MAPPING_NAMES_TABLE: &str = "es.internal.mapping.names.table";

pub const ES_OPERATION_CREATE: &str = "create";
pub const ES_OPERATION_INDEX: &str = "index";
pub const ES_OPERATION_UPDATE: &str = "update";

const ES_NODES_DEFAULT: &str = "localhost";
const ES_PORT_DEFAULT: u16 = 9200;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    props: Arc<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    props: BTreeMap<String, String>,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            props: settings.props.as_ref().clone(),
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn set_all<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self.props.insert(key.into(), value.into());
        }
        self
    }

    /// Loads `key=value` lines. Blank lines and lines starting with `#` are skipped;
    /// a line without `=` is a configuration error.
    pub fn load_properties(mut self, text: &str) -> Result<Self> {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    self.props
                        .insert(key.trim().to_string(), value.trim().to_string());
                }
                None => {
                    return Err(BridgeError::InvalidSetting {
                        key: line.to_string(),
                        value: String::default(),
                    })
                }
            }
        }
        Ok(self)
    }

    pub fn build(self) -> Settings {
        Settings {
            props: Arc::new(self.props),
        }
    }
}

fn parse_bool(key: &str, value: Option<&str>, default: bool) -> Result<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) if v == "true" || v == "yes" => Ok(true),
        Some(v) if v == "false" || v == "no" => Ok(false),
        Some(v) => Err(BridgeError::InvalidSetting {
            key: key.to_string(),
            value: v,
        }),
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Like [`Settings::get_property`] but treats blank values as unset.
    fn get_text(&self, key: &str) -> Option<&str> {
        self.get_property(key)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.props
    }

    pub fn get_operation(&self) -> &str {
        self.get_property(ES_WRITE_OPERATION)
            .unwrap_or(ES_OPERATION_INDEX)
    }
    pub fn get_mapping_names(&self) -> Option<&str> {
        self.get_text(ES_MAPPING_NAMES)
    }
    pub fn get_mapping_names_table(&self) -> Option<&str> {
        self.get_text(INTERNAL_ES_MAPPING_NAMES_TABLE)
    }
    pub fn get_mapping_id(&self) -> Option<&str> {
        self.get_text(ES_MAPPING_ID)
    }
    pub fn get_mapping_parent(&self) -> Option<&str> {
        self.get_text(ES_MAPPING_PARENT)
    }
    pub fn get_mapping_routing(&self) -> Option<&str> {
        self.get_text(ES_MAPPING_ROUTING)
    }
    pub fn is_upsert_doc(&self) -> Result<bool> {
        parse_bool(ES_UPSERT_DOC, self.get_property(ES_UPSERT_DOC), false)
    }
    pub fn is_read_missing_as_empty(&self) -> Result<bool> {
        parse_bool(
            ES_INDEX_READ_MISSING_AS_EMPTY,
            self.get_property(ES_INDEX_READ_MISSING_AS_EMPTY),
            false,
        )
    }
    pub fn is_input_json(&self) -> Result<bool> {
        parse_bool(ES_INPUT_JSON, self.get_property(ES_INPUT_JSON), false)
    }
    pub fn is_date_rich(&self) -> Result<bool> {
        parse_bool(
            ES_MAPPING_DATE_RICH,
            self.get_property(ES_MAPPING_DATE_RICH),
            true,
        )
    }
    pub fn get_nodes(&self) -> &str {
        self.get_text(ES_NODES).unwrap_or(ES_NODES_DEFAULT)
    }
    pub fn get_port(&self) -> Result<u16> {
        match self.get_text(ES_PORT) {
            None => Ok(ES_PORT_DEFAULT),
            Some(value) => value.parse().map_err(|_| BridgeError::InvalidSetting {
                key: ES_PORT.to_string(),
                value: value.to_string(),
            }),
        }
    }
    pub fn get_resource(&self) -> Option<&str> {
        self.get_text(ES_RESOURCE)
    }
    pub fn get_query(&self) -> Option<&str> {
        self.get_text(ES_QUERY)
    }
    pub fn get_target_fields(&self) -> Option<&str> {
        self.get_text(INTERNAL_ES_TARGET_FIELDS)
    }
    pub fn get_target_uri(&self) -> Result<String> {
        Ok(format!("http://{}:{}", self.get_nodes(), self.get_port()?))
    }
}
