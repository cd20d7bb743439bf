//! Codec for serializing and deserializing wire messages.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Converts between Rust types and raw bytes. The gateway only talks to
/// this trait, so the wire format can be swapped without touching it.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON codec: human-readable frames, easy to inspect from a browser
/// client.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientMessage;

    #[test]
    fn test_round_trip() {
        let codec = JsonCodec;
        let msg = ClientMessage::Message {
            text: "hello".into(),
        };
        let bytes = codec.encode(&msg).unwrap();
        let decoded: ClientMessage = codec.decode(&bytes).unwrap();
        assert!(matches!(decoded, ClientMessage::Message { text } if text == "hello"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let codec = JsonCodec;
        let result: Result<ClientMessage, _> = codec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
