// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-call options
//!
//! Options resolve in three layers: per-call values override channel
//! defaults, which override the built-in defaults. Resolution happens once
//! when the call is issued; the resolved set is immutable afterwards.

use std::io::{Read, Write};
use std::time::Duration;

use crate::{Metadata, Status};

/// Payload compression codec, negotiated per call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// No transformation
    #[default]
    Identity,
    /// Gzip-compressed payloads
    Gzip,
}

impl Compression {
    pub fn name(&self) -> &'static str {
        match self {
            Compression::Identity => "identity",
            Compression::Gzip => "gzip",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "" | "identity" => Some(Compression::Identity),
            "gzip" => Some(Compression::Gzip),
            _ => None,
        }
    }

    pub(crate) fn compress(&self, data: Vec<u8>) -> Result<Vec<u8>, Status> {
        match self {
            Compression::Identity => Ok(data),
            Compression::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(&data)
                    .and_then(|_| encoder.finish())
                    .map_err(|e| Status::internal(format!("failed to compress payload: {}", e)))
            }
        }
    }

    pub(crate) fn decompress(&self, data: Vec<u8>) -> Result<Vec<u8>, Status> {
        match self {
            Compression::Identity => Ok(data),
            Compression::Gzip => {
                let mut decoder = flate2::read::GzDecoder::new(data.as_slice());
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .map(|_| out)
                    .map_err(|e| Status::internal(format!("failed to decompress payload: {}", e)))
            }
        }
    }
}

/// Credentials attached to a single call as metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallCredentials {
    /// `authorization: Bearer <token>`
    Bearer(String),
}

impl CallCredentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        CallCredentials::Bearer(token.into())
    }

    pub(crate) fn apply(&self, metadata: &mut Metadata) {
        match self {
            CallCredentials::Bearer(token) => {
                metadata.insert("authorization", format!("Bearer {}", token));
            }
        }
    }
}

/// Options applied to one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    /// Deadline relative to call start; `None` means no deadline.
    pub timeout: Option<Duration>,
    /// Metadata pairs sent with the request.
    pub metadata: Metadata,
    /// Payload compression; `None` inherits the channel default.
    pub compression: Option<Compression>,
    /// Wait for the connection to become ready instead of failing fast.
    pub wait_for_ready: bool,
    /// Credentials overriding the channel's defaults for this call.
    pub credentials: Option<CallCredentials>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_wait_for_ready(mut self, wait_for_ready: bool) -> Self {
        self.wait_for_ready = wait_for_ready;
        self
    }

    pub fn with_credentials(mut self, credentials: CallCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Resolve this call's options on top of the channel defaults.
    ///
    /// Scalar fields fall back to the default when unset; metadata pairs
    /// are the defaults followed by the per-call pairs, so per-call values
    /// win on lookup conflicts while repeated keys survive.
    pub(crate) fn merged_over(&self, defaults: &CallOptions) -> CallOptions {
        let mut metadata = defaults.metadata.clone();
        metadata.merge(self.metadata.clone());

        let mut resolved = CallOptions {
            timeout: self.timeout.or(defaults.timeout),
            metadata,
            compression: self.compression.or(defaults.compression),
            wait_for_ready: self.wait_for_ready || defaults.wait_for_ready,
            credentials: self
                .credentials
                .clone()
                .or_else(|| defaults.credentials.clone()),
        };

        if let Some(credentials) = &resolved.credentials {
            credentials.apply(&mut resolved.metadata);
        }
        resolved
    }
}
