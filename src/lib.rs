//! Bridges row-oriented processing pipelines to a document store.
//!
//! The crate resolves field aliases, builds bulk write entries per row under the configured
//! write operation, prunes the fields requested from the store, and moves resolved
//! configuration across process boundaries. Transport and framework adapters live
//! elsewhere and plug in through [`sink::BulkTransport`] and [`source::DocumentCursor`].

pub mod alias;
pub mod buffer;
pub mod codec;
pub mod command;
pub mod date;
pub mod error;
pub mod models;
pub mod projection;
pub mod settings;
pub mod sink;
pub mod source;
pub mod store;
pub mod utils;

pub use alias::FieldAlias;
pub use command::{create_command, Command};
pub use error::{BridgeError, ErrorKind, Result};
pub use models::bulk::{BulkEntry, Operation};
pub use models::Row;
pub use settings::{Settings, SettingsBuilder};
