use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Reply of the store to one bulk request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    pub errors: bool,
    pub items: Vec<BulkItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkItem {
    Index(BulkItemStatus),
    Create(BulkItemStatus),
    Update(BulkItemStatus),
    Delete(BulkItemStatus),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkItemStatus {
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BulkItemError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub reason: String,
}

impl BulkItem {
    pub fn get_status(&self) -> &BulkItemStatus {
        match self {
            BulkItem::Index(status)
            | BulkItem::Create(status)
            | BulkItem::Update(status)
            | BulkItem::Delete(status) => status,
        }
    }
}

impl BulkItemStatus {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status)
    }
}

impl BulkResponse {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Fails with the first rejected item, keeping the store's own error detail.
    pub fn into_result(self) -> Result<Self> {
        if let Some(failed) = self
            .items
            .iter()
            .map(BulkItem::get_status)
            .find(|status| !status.is_success())
        {
            let (error_type, reason) = match &failed.error {
                Some(error) => (error.error_type.clone(), error.reason.clone()),
                None => (String::from("unknown"), format!("status {}", failed.status)),
            };
            return Err(BridgeError::WriteConflict {
                id: failed.id.clone(),
                status: failed.status,
                error_type,
                reason,
            });
        }
        Ok(self)
    }
}
