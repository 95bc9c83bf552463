//! Write side of the adapter contract.
//!
//! A framework adapter calls [`EsSink::configure`] once at job setup, then on every worker
//! [`EsSink::prepare`], [`SinkContext::write`] per row and finally [`SinkContext::cleanup`].

use std::io::Write;

use tracing::{debug, info};

use crate::alias::FieldAlias;
use crate::buffer::{close_quietly, BytesArray};
use crate::codec;
use crate::command::Command;
use crate::date::DateConverter;
use crate::error::Result;
use crate::models::bulk_response::BulkResponse;
use crate::models::schema::{self, SchemaField};
use crate::models::Row;
use crate::settings::{Settings, SettingsBuilder, INTERNAL_ES_MAPPING_NAMES_TABLE};

const INITIAL_BUFFER: usize = 8 * 1024;

/// Carries bulk payloads to the store. Implemented outside this crate by HTTP clients.
pub trait BulkTransport {
    /// Sends one payload. Returns the store's reply when the transport receives one.
    fn send(&mut self, payload: &[u8]) -> Result<Option<BulkResponse>>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: BulkTransport + ?Sized> BulkTransport for &mut T {
    fn send(&mut self, payload: &[u8]) -> Result<Option<BulkResponse>> {
        (**self).send(payload)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Appends payloads to a writer as NDJSON. Items are not acknowledged.
#[derive(Debug)]
pub struct NdjsonTransport<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> BulkTransport for NdjsonTransport<W> {
    fn send(&mut self, payload: &[u8]) -> Result<Option<BulkResponse>> {
        self.writer.write_all(payload)?;
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        Ok(self.writer.flush()?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkSummary {
    pub entries: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct EsSink {
    settings: Settings,
    schema: Vec<SchemaField>,
}

impl EsSink {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            schema: Vec::new(),
        }
    }

    /// Declares the row schema; leaves typed as dates are converted on write.
    pub fn with_schema(mut self, schema: Vec<SchemaField>) -> Self {
        self.schema = schema;
        self
    }

    /// Coordinator-side setup: resolves the alias table once and embeds it for workers.
    pub fn configure(settings: &Settings) -> Result<Settings> {
        let alias = FieldAlias::from_settings(settings)?;
        let encoded = codec::encode(&alias.to_table())?;
        debug!("Embedding alias table ({} entries) into job settings", alias.len());
        Ok(SettingsBuilder::from_settings(settings)
            .set(INTERNAL_ES_MAPPING_NAMES_TABLE, encoded)
            .build())
    }

    pub fn prepare<T: BulkTransport>(&self, transport: T) -> Result<SinkContext<T>> {
        let command = Command::from_settings(&self.settings)?;
        let dates = DateConverter::from_settings(&self.settings)?;
        info!(
            "Sink prepared for [{}] on {}",
            self.settings.get_resource().unwrap_or("<unset>"),
            self.settings.get_target_uri()?
        );
        Ok(SinkContext {
            command,
            buffer: BytesArray::with_capacity(INITIAL_BUFFER),
            transport,
            dates,
            date_paths: schema::date_paths(&self.schema),
            summary: SinkSummary::default(),
        })
    }
}

/// Per-task write state: the command, the reusable payload buffer and the transport.
#[derive(Debug)]
pub struct SinkContext<T: BulkTransport> {
    command: Command,
    buffer: BytesArray,
    transport: T,
    dates: DateConverter,
    date_paths: Vec<Vec<String>>,
    summary: SinkSummary,
}

impl<T: BulkTransport> SinkContext<T> {
    pub fn get_command(&self) -> &Command {
        &self.command
    }

    /// Builds and ships one bulk entry. Any error ends the row stream for this task.
    pub fn write(&mut self, row: &Row) -> Result<()> {
        let converted;
        let row = if self.date_paths.is_empty() {
            row
        } else {
            let mut copy = row.clone();
            for path in &self.date_paths {
                schema::convert_at(&mut copy, path, |value| self.dates.to_es(value))?;
            }
            converted = copy;
            &converted
        };

        let entry = self.command.build(row)?;
        self.buffer.reset();
        entry.write_to(&mut self.buffer)?;
        if let Some(response) = self.transport.send(self.buffer.as_slice())? {
            response.into_result()?;
        }
        self.summary.entries += 1;
        self.summary.bytes += self.buffer.len() as u64;
        Ok(())
    }

    pub fn cleanup(mut self) -> SinkSummary {
        close_quietly("bulk transport", self.transport.close());
        info!(
            "Sink finished: {} entries, {} bytes",
            self.summary.entries, self.summary.bytes
        );
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::models::schema::FieldType;
    use crate::settings::{ES_MAPPING_DATE_RICH, ES_MAPPING_ID, ES_MAPPING_NAMES};
    use serde_json::json;

    struct FailingClose;

    impl BulkTransport for FailingClose {
        fn send(&mut self, _payload: &[u8]) -> Result<Option<BulkResponse>> {
            Ok(None)
        }

        fn close(&mut self) -> Result<()> {
            Err(BridgeError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "closed",
            )))
        }
    }

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn writes_each_row_as_ndjson() {
        let settings = Settings::builder().set(ES_MAPPING_ID, "num").build();
        let sink = EsSink::new(settings);
        let mut ctx = sink.prepare(NdjsonTransport::new(Vec::new())).unwrap();
        ctx.write(&row(json!({"num": "7", "name": "x"}))).unwrap();
        ctx.write(&row(json!({"num": "8", "name": "y"}))).unwrap();
        let SinkContext { transport, .. } = ctx;
        let output = String::from_utf8(transport.into_inner()).unwrap();
        assert_eq!(
            output,
            "{\"index\":{\"_id\":\"7\"}}\n{\"num\":\"7\",\"name\":\"x\"}\n\
             {\"index\":{\"_id\":\"8\"}}\n{\"num\":\"8\",\"name\":\"y\"}\n"
        );
    }

    #[test]
    fn dates_are_converted_before_build() {
        let settings = Settings::builder()
            .set(ES_MAPPING_DATE_RICH, "false")
            .build();
        let sink = EsSink::new(settings).with_schema(vec![
            SchemaField::leaf("name", FieldType::String),
            SchemaField::leaf("at", FieldType::Date),
        ]);
        let mut ctx = sink.prepare(NdjsonTransport::new(Vec::new())).unwrap();
        ctx.write(&row(json!({"name": "x", "at": 0}))).unwrap();
        let SinkContext { transport, .. } = ctx;
        let output = String::from_utf8(transport.into_inner()).unwrap();
        assert!(output.contains("\"at\":\"1970-01-01T00:00:00.000Z\""));
    }

    #[test]
    fn close_errors_do_not_escape_cleanup() {
        let sink = EsSink::new(Settings::default());
        let mut ctx = sink.prepare(FailingClose).unwrap();
        ctx.write(&row(json!({"a": 1}))).unwrap();
        let summary = ctx.cleanup();
        assert_eq!(summary.entries, 1);
        assert!(summary.bytes > 0);
    }

    #[test]
    fn configure_embeds_alias_table() {
        let settings = Settings::builder()
            .set(ES_MAPPING_NAMES, "url:address")
            .build();
        let configured = EsSink::configure(&settings).unwrap();
        assert!(configured
            .get_property(INTERNAL_ES_MAPPING_NAMES_TABLE)
            .is_some());
        let alias = FieldAlias::from_settings(&configured).unwrap();
        assert_eq!(alias.to_es("url"), "address");
    }

    #[test]
    fn configure_rejects_malformed_alias() {
        let settings = Settings::builder().set(ES_MAPPING_NAMES, "url").build();
        assert!(EsSink::configure(&settings).is_err());
    }
}
