//! One-shot transport of configuration records through plain string properties.
//!
//! A record is wrapped in a versioned envelope, serialized as JSON and then encoded with the
//! URL-safe base64 alphabet without padding. This runs once per task when the coordinator
//! hands resolved state to workers and is never on the per-row path.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_with::{serde_as, TimestampMilliSeconds};
use tracing::debug;

use crate::error::{BridgeError, Result};

pub const CODEC_VERSION: &str = "1.0.0";

/// A configuration record with a fixed field set that may cross a process boundary.
pub trait Transportable: Serialize + DeserializeOwned {
    const KIND: &'static str;
}

#[serde_as]
#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    version: &'a str,
    kind: &'a str,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    issued_at: DateTime<Utc>,
    payload: &'a T,
}

#[serde_as]
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvelopeIn {
    version: String,
    kind: String,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    issued_at: DateTime<Utc>,
    payload: Box<RawValue>,
}

pub fn encode<T: Transportable>(object: &T) -> Result<String> {
    let envelope = EnvelopeOut {
        version: CODEC_VERSION,
        kind: T::KIND,
        issued_at: Utc::now(),
        payload: object,
    };
    let json = serde_json::to_vec(&envelope)?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

pub fn decode<T: Transportable>(data: &str) -> Result<T> {
    let raw = URL_SAFE_NO_PAD
        .decode(data.trim())
        .map_err(|e| BridgeError::Decode(format!("invalid base64: {e}")))?;
    let envelope: EnvelopeIn = serde_json::from_slice(&raw)
        .map_err(|e| BridgeError::Decode(format!("invalid envelope: {e}")))?;

    check_version(&envelope.version)?;
    if envelope.kind != T::KIND {
        return Err(BridgeError::KindMismatch {
            found: envelope.kind,
            expected: T::KIND.to_string(),
        });
    }

    debug!(
        "Decoding transported [{}] issued at {}",
        envelope.kind, envelope.issued_at
    );
    serde_json::from_str(envelope.payload.get())
        .map_err(|e| BridgeError::Decode(format!("invalid [{}] payload: {e}", T::KIND)))
}

/// Same major line and not newer than this reader.
fn check_version(found: &str) -> Result<()> {
    let mismatch = || BridgeError::VersionMismatch {
        found: found.to_string(),
        expected: CODEC_VERSION.to_string(),
    };
    let current = Version::parse(CODEC_VERSION).map_err(|_| mismatch())?;
    let version = Version::parse(found).map_err(|_| mismatch())?;
    if version.major != current.major || version > current {
        return Err(mismatch());
    }
    Ok(())
}
