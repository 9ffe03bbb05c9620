//! Event wire codec

use crate::stream::error::CodecError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts events to and from record values
pub trait EventCodec<E>: Send + Sync {
    fn encode(&self, event: &E) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, value: Option<&[u8]>) -> Result<E, CodecError>;
}

/// JSON objects, timestamps as RFC 3339 strings
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl<E: Serialize + DeserializeOwned> EventCodec<E> for JsonCodec {
    fn encode(&self, event: &E) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(event).map_err(CodecError::Encode)
    }

    fn decode(&self, value: Option<&[u8]>) -> Result<E, CodecError> {
        let bytes = value.ok_or(CodecError::EmptyMessage)?;
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }
}
