use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::models::Row;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Long,
    Double,
    Boolean,
    Date,
    Object,
}

/// A node of a pipeline schema. Nodes with children are composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    name: String,
    #[serde(rename = "type", default)]
    field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<SchemaField>,
}

impl SchemaField {
    pub fn leaf(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            fields: Vec::new(),
        }
    }

    pub fn composite(name: impl Into<String>, fields: Vec<SchemaField>) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Object,
            fields,
        }
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }
    pub fn get_field_type(&self) -> FieldType {
        self.field_type
    }
    pub fn get_fields(&self) -> &Vec<SchemaField> {
        &self.fields
    }
    pub fn is_composite(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// Logical paths of every leaf typed [`FieldType::Date`], depth first.
pub fn date_paths(schema: &[SchemaField]) -> Vec<Vec<String>> {
    fn walk(fields: &[SchemaField], prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        for field in fields {
            prefix.push(field.name.clone());
            if field.is_composite() {
                walk(&field.fields, prefix, out);
            } else if field.field_type == FieldType::Date {
                out.push(prefix.clone());
            }
            prefix.pop();
        }
    }
    let mut out = Vec::new();
    walk(schema, &mut Vec::new(), &mut out);
    out
}

/// Replaces the value at `path` with `convert(value)`. Absent paths are left alone.
pub fn convert_at<F>(row: &mut Row, path: &[String], convert: F) -> Result<()>
where
    F: Fn(&Value) -> Result<Value>,
{
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };
    let mut current = row;
    for segment in parents {
        match current.get_mut(segment) {
            Some(Value::Object(inner)) => current = inner,
            _ => return Ok(()),
        }
    }
    if let Some(value) = current.get_mut(last) {
        *value = convert(value)?;
    }
    Ok(())
}

/// A field a downstream consumer asked for, possibly narrowed to sub-fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredField {
    name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sub_fields: Vec<RequiredField>,
}

impl RequiredField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_fields: Vec::new(),
        }
    }

    pub fn with_sub_fields(name: impl Into<String>, sub_fields: Vec<RequiredField>) -> Self {
        Self {
            name: name.into(),
            sub_fields,
        }
    }

    pub fn get_name(&self) -> &String {
        &self.name
    }
    pub fn get_sub_fields(&self) -> &Vec<RequiredField> {
        &self.sub_fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_nested_date_leaves() {
        let schema = vec![
            SchemaField::leaf("name", FieldType::String),
            SchemaField::leaf("born", FieldType::Date),
            SchemaField::composite("meta", vec![SchemaField::leaf("seen", FieldType::Date)]),
        ];
        assert_eq!(
            date_paths(&schema),
            vec![vec!["born".to_string()], vec!["meta".to_string(), "seen".to_string()]]
        );
    }

    #[test]
    fn converts_only_present_paths() {
        let mut row = match json!({"meta": {"seen": 1}, "born": 2}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let double = |v: &Value| Ok(json!(v.as_i64().unwrap_or(0) * 2));
        convert_at(&mut row, &["meta".to_string(), "seen".to_string()], double).unwrap();
        convert_at(&mut row, &["missing".to_string(), "x".to_string()], double).unwrap();
        assert_eq!(Value::Object(row), json!({"meta": {"seen": 2}, "born": 2}));
    }

    #[test]
    fn schema_reads_from_config_shape() {
        let field: SchemaField = serde_json::from_value(json!({
            "name": "links",
            "type": "object",
            "fields": [{"name": "url"}, {"name": "at", "type": "date"}]
        }))
        .unwrap();
        assert!(field.is_composite());
        assert_eq!(field.get_fields()[0].get_field_type(), FieldType::String);
        assert_eq!(field.get_fields()[1].get_field_type(), FieldType::Date);
    }
}
