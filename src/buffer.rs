//! Decompression of gzip "Buffer" envelopes in API responses.
//!
//! Some sections of the device document (`component_info`, `nvm`, `status`)
//! arrive as `{"type": "Buffer", "data": [31, 139, ...]}`: a serialized byte
//! array holding gzip-compressed JSON. Plain JSON responses are left alone.

use std::io::Read;

use flate2::read::GzDecoder;
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Whether `value` is a buffer envelope.
pub fn is_buffer(value: &Value) -> bool {
    match value.as_object() {
        Some(object) => {
            object.get("type").and_then(Value::as_str) == Some("Buffer")
                && object.contains_key("data")
        }
        None => false,
    }
}

/// Decompress a buffer envelope into the JSON it carries.
///
/// Non-buffers are returned unchanged. If the bytes are not gzip or the
/// payload is not JSON a warning is logged and the envelope is returned as is.
pub fn decompress_buffer(value: &Value) -> Value {
    if !is_buffer(value) {
        return value.clone();
    }

    match try_decompress(value) {
        Ok(decompressed) => decompressed,
        Err(e) => {
            warn!("Failed to decompress buffer: {}. Returning original value.", e);
            value.clone()
        }
    }
}

fn try_decompress(value: &Value) -> Result<Value> {
    let data = value
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Other("buffer data is not an array".to_string()))?;

    let bytes = data
        .iter()
        .map(|byte| {
            byte.as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .ok_or_else(|| Error::Other(format!("invalid byte in buffer: {}", byte)))
        })
        .collect::<Result<Vec<u8>>>()?;

    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    debug!(
        "Decompressed buffer from {} to {} bytes",
        bytes.len(),
        decompressed.len()
    );

    Ok(serde_json::from_slice(&decompressed)?)
}

/// Recursively replace every buffer envelope in `response` with its content.
pub fn process_response(response: Value) -> Value {
    match response {
        value if is_buffer(&value) => decompress_buffer(&value),
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .map(|(key, value)| (key, process_response(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(process_response).collect()),
        other => other,
    }
}
