pub mod bulk;
pub mod bulk_response;
pub mod schema;

/// One record as seen by the pipeline: field name to value, in field order.
pub type Row = serde_json::Map<String, serde_json::Value>;
