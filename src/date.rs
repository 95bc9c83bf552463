//! Date conversion between pipeline values and store values.

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use crate::error::{BridgeError, Result};
use crate::settings::Settings;

/// Strategy picked once per task from `es.mapping.date.rich` and handed to adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateConverter {
    /// Pipeline holds ISO-8601 text; both directions normalize to RFC 3339.
    Rich,
    /// Pipeline holds epoch milliseconds; the store holds RFC 3339 text.
    EpochMillis,
}

impl DateConverter {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(if settings.is_date_rich()? {
            DateConverter::Rich
        } else {
            DateConverter::EpochMillis
        })
    }

    pub fn to_es(&self, value: &Value) -> Result<Value> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (DateConverter::Rich, Value::String(text)) => {
                Ok(Value::String(format_date(parse_date(text)?)))
            }
            (DateConverter::EpochMillis, Value::Number(number)) => {
                let millis = number.as_i64().ok_or_else(|| invalid(value, "not an integer"))?;
                let date = Utc
                    .timestamp_millis_opt(millis)
                    .single()
                    .ok_or_else(|| invalid(value, "out of range"))?;
                Ok(Value::String(format_date(date)))
            }
            // already textual, the store parses it
            (DateConverter::EpochMillis, Value::String(_)) => Ok(value.clone()),
            _ => Err(invalid(value, "unsupported type")),
        }
    }

    pub fn from_es(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(text) => {
                let date = parse_date(text)?;
                Ok(match self {
                    DateConverter::Rich => Value::String(format_date(date)),
                    DateConverter::EpochMillis => Value::from(date.timestamp_millis()),
                })
            }
            // stores may keep dates as epoch millis
            Value::Number(number) => match (self, number.as_i64()) {
                (DateConverter::EpochMillis, Some(_)) => Ok(value.clone()),
                (DateConverter::Rich, Some(_)) => {
                    DateConverter::EpochMillis.to_es(value)
                }
                _ => Err(invalid(value, "not an integer")),
            },
            _ => Err(invalid(value, "unsupported type")),
        }
    }
}

fn invalid(value: &Value, reason: &str) -> BridgeError {
    BridgeError::InvalidDate {
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date (taken as UTC midnight).
fn parse_date(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Ok(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| BridgeError::InvalidDate {
            value: text.to_string(),
            reason: "expected ISO-8601".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ES_MAPPING_DATE_RICH;
    use serde_json::json;

    #[test]
    fn strategy_follows_settings() {
        let rich = Settings::builder().build();
        let millis = Settings::builder().set(ES_MAPPING_DATE_RICH, "false").build();
        assert_eq!(DateConverter::from_settings(&rich).unwrap(), DateConverter::Rich);
        assert_eq!(
            DateConverter::from_settings(&millis).unwrap(),
            DateConverter::EpochMillis
        );
    }

    #[test]
    fn epoch_millis_round_trip() {
        let converter = DateConverter::EpochMillis;
        let es = converter.to_es(&json!(1_000)).unwrap();
        assert_eq!(es, json!("1970-01-01T00:00:01.000Z"));
        assert_eq!(converter.from_es(&es).unwrap(), json!(1_000));
    }

    #[test]
    fn rich_normalizes_offsets() {
        let converter = DateConverter::Rich;
        assert_eq!(
            converter.to_es(&json!("2014-01-02T03:04:05+01:00")).unwrap(),
            json!("2014-01-02T02:04:05.000Z")
        );
        assert_eq!(
            converter.from_es(&json!("2014-01-02")).unwrap(),
            json!("2014-01-02T00:00:00.000Z")
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(DateConverter::Rich.to_es(&json!("yesterday")).is_err());
        assert!(DateConverter::Rich.to_es(&json!(true)).is_err());
        assert!(DateConverter::EpochMillis.to_es(&json!(1.5)).is_err());
        assert_eq!(DateConverter::Rich.to_es(&Value::Null).unwrap(), Value::Null);
    }
}
