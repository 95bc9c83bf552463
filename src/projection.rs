//! Computes the source-field filter sent to the store so only consumed fields are fetched.

use crate::alias::FieldAlias;
use crate::models::schema::{RequiredField, SchemaField};

/// Depth-first walk over `schema`. Composite fields extend the dotted prefix, leaves
/// are appended with the prefix. Only top-level names go through [`FieldAlias::to_es`],
/// the same names a row has renamed on write.
pub fn from_schema(schema: &[SchemaField], alias: &FieldAlias) -> Vec<String> {
    let mut fields = Vec::new();
    for field in schema {
        add_schema_field(field, alias.to_es(field.get_name()).to_string(), &mut fields);
    }
    fields
}

fn add_schema_field(field: &SchemaField, path: String, fields: &mut Vec<String>) {
    if !field.is_composite() {
        fields.push(path);
        return;
    }
    for child in field.get_fields() {
        add_schema_field(child, format!("{path}.{}", child.get_name()), fields);
    }
}

/// One entry per required top-level field, aliased. Sub-field requests are
/// flattened to their top-level field.
pub fn from_required(required: &[RequiredField], alias: &FieldAlias) -> Vec<String> {
    let mut fields: Vec<String> = Vec::with_capacity(required.len());
    for field in required {
        let name = alias.to_es(field.get_name());
        if !fields.iter().any(|existing| existing == name) {
            fields.push(name.to_string());
        }
    }
    fields
}

/// Aliases a flat list of declared field names.
pub fn from_names<S: AsRef<str>>(names: &[S], alias: &FieldAlias) -> Vec<String> {
    names
        .iter()
        .map(|name| alias.to_es(name.as_ref()).to_string())
        .collect()
}

/// Comma-joined form stored in `es.internal.target.fields`.
pub fn as_filter(fields: &[String]) -> String {
    fields.join(",")
}

/// Inverse of [`as_filter`]; blank entries are dropped.
pub fn parse_filter(filter: &str) -> Vec<String> {
    filter
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}
