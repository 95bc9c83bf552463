//! Read side of the adapter contract.

use serde_json::Value;
use tracing::{debug, info};

use crate::alias::FieldAlias;
use crate::buffer::close_quietly;
use crate::date::DateConverter;
use crate::error::{BridgeError, Result};
use crate::models::schema::{self, RequiredField, SchemaField};
use crate::models::Row;
use crate::projection;
use crate::settings::{Settings, SettingsBuilder, INTERNAL_ES_TARGET_FIELDS};

/// Yields raw documents (store field names) from a search. Implemented by the transport.
pub trait DocumentCursor {
    fn next_document(&mut self) -> Result<Option<Row>>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EsSource {
    settings: Settings,
    schema: Vec<SchemaField>,
}

impl EsSource {
    /// `schema` lists the fields the pipeline declares; empty means "take whatever comes".
    pub fn new(settings: Settings, schema: Vec<SchemaField>) -> Self {
        Self { settings, schema }
    }

    /// Job-setup step: stores the pruned field list in `es.internal.target.fields`.
    pub fn configure(settings: &Settings, schema: &[SchemaField]) -> Result<Settings> {
        let alias = FieldAlias::from_settings(settings)?;
        let fields = projection::from_schema(schema, &alias);
        debug!("Source projection: {:?}", fields);
        Ok(SettingsBuilder::from_settings(settings)
            .set(INTERNAL_ES_TARGET_FIELDS, projection::as_filter(&fields))
            .build())
    }

    /// Fields to request for a consumer that only needs `required`. Computed once before
    /// iteration.
    pub fn project(&self, required: &[RequiredField]) -> Result<Vec<String>> {
        let alias = FieldAlias::from_settings(&self.settings)?;
        Ok(projection::from_required(required, &alias))
    }

    /// Fields recorded by [`EsSource::configure`], if any.
    pub fn target_fields(&self) -> Vec<String> {
        self.settings
            .get_target_fields()
            .map(projection::parse_filter)
            .unwrap_or_default()
    }

    pub fn prepare<C: DocumentCursor>(&self, cursor: C) -> Result<SourceContext<C>> {
        let alias = FieldAlias::from_settings(&self.settings)?;
        let dates = DateConverter::from_settings(&self.settings)?;
        let missing_as_empty = self.settings.is_read_missing_as_empty()?;
        let fields = self
            .schema
            .iter()
            .map(|field| field.get_name().clone())
            .collect();
        info!(
            "Source prepared for [{}] query={:?}",
            self.settings.get_resource().unwrap_or("<unset>"),
            self.settings.get_query()
        );
        Ok(SourceContext {
            cursor,
            row: Row::new(),
            alias,
            fields,
            dates,
            date_paths: schema::date_paths(&self.schema),
            missing_as_empty,
            finished: false,
            read: 0,
        })
    }
}

/// Per-task read state. `row` is reused for every document.
#[derive(Debug)]
pub struct SourceContext<C: DocumentCursor> {
    cursor: C,
    row: Row,
    alias: FieldAlias,
    fields: Vec<String>,
    dates: DateConverter,
    date_paths: Vec<Vec<String>>,
    missing_as_empty: bool,
    finished: bool,
    read: u64,
}

impl<C: DocumentCursor> SourceContext<C> {
    /// Advances to the next document. Returns false at end of stream and keeps returning
    /// false without touching the cursor again.
    pub fn next(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        let document = match self.cursor.next_document() {
            Ok(Some(document)) => document,
            Ok(None) => {
                self.finished = true;
                return Ok(false);
            }
            Err(BridgeError::TargetNotFound(resource)) if self.missing_as_empty => {
                info!("Target [{}] is missing; treating as empty", resource);
                self.finished = true;
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        self.row.clear();
        if self.fields.is_empty() {
            for (name, value) in document {
                let logical = self.alias.from_es(&name).to_string();
                self.row.insert(logical, value);
            }
        } else {
            let mut document = document;
            for field in &self.fields {
                let value = document
                    .remove(self.alias.to_es(field))
                    .unwrap_or(Value::Null);
                self.row.insert(field.clone(), value);
            }
        }
        for path in &self.date_paths {
            let dates = self.dates;
            schema::convert_at(&mut self.row, path, |value| dates.from_es(value))?;
        }
        self.read += 1;
        Ok(true)
    }

    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn cleanup(mut self) -> u64 {
        close_quietly("document cursor", self.cursor.close());
        debug!("Source finished after {} documents", self.read);
        self.read
    }
}
