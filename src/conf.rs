use std::collections::HashMap;

use es_row_bridge::models::schema::{RequiredField, SchemaField};
use es_row_bridge::Settings;
use twelf::config;

/// CLI configuration file. Every value under `settings` is kept as text and handed to
/// [`Settings`] unchanged, so booleans and numbers must be quoted.
#[config]
#[derive(Debug, Default)]
pub struct Config {
    settings: HashMap<String, String>,
    schema: Option<Vec<SchemaField>>,
    required: Option<Vec<String>>,
}

impl Config {
    pub fn get_settings(&self) -> Settings {
        Settings::builder()
            .set_all(self.settings.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .build()
    }
    pub fn get_schema(&self) -> Vec<SchemaField> {
        self.schema.clone().unwrap_or_default()
    }
    pub fn get_required(&self) -> Option<Vec<RequiredField>> {
        self.required
            .as_ref()
            .map(|names| names.iter().map(RequiredField::new).collect())
    }
}
