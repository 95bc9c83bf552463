//! Bidirectional mapping between pipeline field names and store field names.
//!
//! Dotted paths are opaque keys here: `a.b` is aliased only when `a.b` itself is listed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{self, Transportable};
use crate::error::{BridgeError, Result};
use crate::settings::{Settings, ES_MAPPING_NAMES};

/// Ordered alias pairs in the shape used for one-shot transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasTable {
    pub pairs: Vec<(String, String)>,
}

impl Transportable for AliasTable {
    const KIND: &'static str = "alias-table";
}

#[derive(Debug, Clone, Default)]
pub struct FieldAlias {
    pairs: Vec<(String, String)>,
    to_es: HashMap<String, String>,
    from_es: HashMap<String, String>,
}

impl FieldAlias {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `logical:store` pairs separated by commas.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for raw in spec.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let malformed = || BridgeError::MalformedAlias {
                key: ES_MAPPING_NAMES.to_string(),
                pair: raw.to_string(),
            };
            let (logical, store) = raw.split_once(':').ok_or_else(malformed)?;
            let (logical, store) = (logical.trim(), store.trim());
            if logical.is_empty() || store.is_empty() || store.contains(':') {
                return Err(malformed());
            }
            pairs.push((logical.to_string(), store.to_string()));
        }
        Self::from_pairs(pairs)
    }

    pub fn from_pairs<I, L, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (L, S)>,
        L: Into<String>,
        S: Into<String>,
    {
        let mut alias = Self::new();
        for (logical, store) in pairs {
            alias.insert(logical.into(), store.into())?;
        }
        Ok(alias)
    }

    /// Resolves the alias for a task. A table transported through
    /// `es.internal.mapping.names.table` wins over the plain `es.mapping.names` text.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        if let Some(encoded) = settings.get_mapping_names_table() {
            let table: AliasTable = codec::decode(encoded)?;
            debug!("Using transported alias table with {} entries", table.pairs.len());
            return Self::try_from(table);
        }
        match settings.get_mapping_names() {
            Some(spec) => Self::parse(spec),
            None => Ok(Self::new()),
        }
    }

    fn insert(&mut self, logical: String, store: String) -> Result<()> {
        let conflicting = self
            .to_es
            .get(&logical)
            .is_some_and(|existing| existing != &store)
            || self
                .from_es
                .get(&store)
                .is_some_and(|existing| existing != &logical);
        if conflicting {
            return Err(BridgeError::MalformedAlias {
                key: ES_MAPPING_NAMES.to_string(),
                pair: format!("{logical}:{store}"),
            });
        }
        if self.to_es.contains_key(&logical) {
            return Ok(());
        }
        self.to_es.insert(logical.clone(), store.clone());
        self.from_es.insert(store.clone(), logical.clone());
        self.pairs.push((logical, store));
        Ok(())
    }

    pub fn to_es<'a>(&'a self, name: &'a str) -> &'a str {
        self.to_es.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn from_es<'a>(&'a self, name: &'a str) -> &'a str {
        self.from_es.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn to_table(&self) -> AliasTable {
        AliasTable {
            pairs: self.pairs.clone(),
        }
    }
}

impl TryFrom<AliasTable> for FieldAlias {
    type Error = BridgeError;

    fn try_from(table: AliasTable) -> Result<Self> {
        Self::from_pairs(table.pairs)
    }
}
