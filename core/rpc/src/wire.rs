// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Wire frames
//!
//! Every call, response message, trailer and cancellation travels as one
//! length-delimited [`Frame`]. Frames from many concurrent calls interleave
//! over a single connection; the `id` field ties a frame to its call, so one
//! call's payload bytes never mix with another's.

use bytes::Bytes;
use prost::Message as _;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::{Metadata, Status};

/// Upper bound on an encoded frame, including headers.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

/// One metadata key-value pair on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetadataPair {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Role of a frame within a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum FrameKind {
    /// Opens a call: carries path, metadata, deadline and the request payload
    Request = 0,
    /// One response message
    Message = 1,
    /// Terminates a call: carries the final status
    Trailer = 2,
    /// Advises the remote side to stop a call; fire-and-forget
    Cancel = 3,
}

/// The unit of transmission between channel and server.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Frame {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(enumeration = "FrameKind", tag = "2")]
    pub kind: i32,
    #[prost(string, tag = "3")]
    pub path: String,
    #[prost(message, repeated, tag = "4")]
    pub metadata: Vec<MetadataPair>,
    #[prost(int32, tag = "5")]
    pub status_code: i32,
    #[prost(string, tag = "6")]
    pub status_message: String,
    #[prost(string, tag = "7")]
    pub encoding: String,
    #[prost(uint64, tag = "8")]
    pub timeout_ms: u64,
    #[prost(bytes = "vec", tag = "9")]
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn request(
        id: u64,
        path: &str,
        metadata: &Metadata,
        encoding: &str,
        timeout_ms: u64,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            id,
            kind: FrameKind::Request as i32,
            path: path.to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| MetadataPair {
                    key: k.to_string(),
                    value: v.to_string(),
                })
                .collect(),
            encoding: encoding.to_string(),
            timeout_ms,
            payload,
            ..Default::default()
        }
    }

    pub fn message(id: u64, encoding: &str, payload: Vec<u8>) -> Self {
        Self {
            id,
            kind: FrameKind::Message as i32,
            encoding: encoding.to_string(),
            payload,
            ..Default::default()
        }
    }

    pub fn trailer(id: u64, status: &Status) -> Self {
        Self {
            id,
            kind: FrameKind::Trailer as i32,
            status_code: status.code().as_i32(),
            status_message: status.message().unwrap_or("").to_string(),
            ..Default::default()
        }
    }

    pub fn cancel(id: u64) -> Self {
        Self {
            id,
            kind: FrameKind::Cancel as i32,
            ..Default::default()
        }
    }

    /// Frame kind, treating out-of-range values as a request so the server
    /// rejects them through the normal dispatch path.
    pub fn frame_kind(&self) -> FrameKind {
        FrameKind::try_from(self.kind).unwrap_or(FrameKind::Request)
    }

    /// Status carried by a trailer frame.
    pub fn status(&self) -> Status {
        let code =
            crate::Code::from_i32(self.status_code).unwrap_or(crate::Code::Unknown);
        if self.status_message.is_empty() {
            Status::with_code(code)
        } else {
            Status::new(code, self.status_message.clone())
        }
    }

    pub fn take_metadata(&mut self) -> Metadata {
        Metadata::from_pairs(
            std::mem::take(&mut self.metadata)
                .into_iter()
                .map(|p| (p.key, p.value))
                .collect(),
        )
    }

    pub fn encode_bytes(&self) -> Bytes {
        Bytes::from(self.encode_to_vec())
    }

    pub fn decode_bytes(buf: &[u8]) -> Result<Self, Status> {
        Frame::decode(buf).map_err(|e| Status::internal(format!("malformed frame: {}", e)))
    }
}

/// Wrap a TCP stream in length-delimited framing with a bounded frame size.
pub(crate) fn framed(stream: TcpStream, max_frame_size: usize) -> Framed<TcpStream, LengthDelimitedCodec> {
    LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_size)
        .new_framed(stream)
}
