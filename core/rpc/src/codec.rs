// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Codec traits for message serialization and deserialization
//!
//! Message types cross the transport as opaque bytes. The traits here are
//! blanket-implemented for prost messages, so any type in a service
//! description works without extra glue.

use crate::Status;

/// Trait for encoding messages to bytes
pub trait Encoder {
    fn encode(&self) -> Result<Vec<u8>, Status>;
}

/// Trait for decoding messages from bytes
pub trait Decoder: Default {
    fn decode(buf: &[u8]) -> Result<Self, Status>;
}

/// Combined codec trait for types that can be both encoded and decoded
pub trait Codec: Encoder + Decoder {}

impl<T: Encoder + Decoder> Codec for T {}

impl<T> Encoder for T
where
    T: prost::Message,
{
    fn encode(&self) -> Result<Vec<u8>, Status> {
        Ok(prost::Message::encode_to_vec(self))
    }
}

impl<T> Decoder for T
where
    T: prost::Message + Default,
{
    fn decode(buf: &[u8]) -> Result<Self, Status> {
        <T as prost::Message>::decode(buf)
            .map_err(|e| Status::internal(format!("failed to decode message: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, ::prost::Message)]
    struct TestMessage {
        #[prost(string, tag = "1")]
        text: String,
        #[prost(uint32, tag = "2")]
        value: u32,
    }

    #[test]
    fn test_prost_codec_roundtrip() {
        let msg = TestMessage {
            text: "ping".to_string(),
            value: 7,
        };
        let bytes = msg.encode().unwrap();
        let back = TestMessage::decode(&bytes).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_decode_failure_is_internal() {
        // A truncated varint is not a valid message
        let err = TestMessage::decode(&[0x0a, 0xff]).unwrap_err();
        assert_eq!(err.code(), crate::Code::Internal);
    }
}
