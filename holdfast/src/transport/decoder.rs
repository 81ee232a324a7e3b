//! Response body decoders.

use super::TransportResponse;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use thiserror::Error;

/// Errors produced while decoding a response body.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

/// Turns a successful raw response into a typed payload.
///
/// Any `Fn(&TransportResponse) -> Result<T, DecodeError>` closure is a
/// decoder.
pub trait ResponseDecoder<T>: Send + Sync {
    fn decode(&self, response: &TransportResponse) -> Result<T, DecodeError>;
}

impl<T, F> ResponseDecoder<T> for F
where
    F: Fn(&TransportResponse) -> Result<T, DecodeError> + Send + Sync,
{
    fn decode(&self, response: &TransportResponse) -> Result<T, DecodeError> {
        self(response)
    }
}

/// Returns the body unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesDecoder;

impl ResponseDecoder<Bytes> for BytesDecoder {
    fn decode(&self, response: &TransportResponse) -> Result<Bytes, DecodeError> {
        Ok(response.body.clone())
    }
}

/// Decodes the body as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl ResponseDecoder<String> for TextDecoder {
    fn decode(&self, response: &TransportResponse) -> Result<String, DecodeError> {
        Ok(std::str::from_utf8(&response.body)?.to_owned())
    }
}

/// Deserializes the body as JSON.
pub struct JsonDecoder<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> ResponseDecoder<T> for JsonDecoder<T> {
    fn decode(&self, response: &TransportResponse) -> Result<T, DecodeError> {
        Ok(serde_json::from_slice(&response.body)?)
    }
}
