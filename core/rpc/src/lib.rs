// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Description-driven RPC transport
//!
//! One generic mechanism carries any described service: a service
//! description yields a method descriptor table, a [`Channel`] issues unary
//! and server-streaming calls against those descriptors, and a [`Server`]
//! dispatches inbound calls by exact wire path. Every failure, local or
//! remote, reaches the caller as a [`Status`].

pub mod channel;
pub mod codec;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod metadata;
pub mod options;
pub mod server;
pub mod status;
pub mod stream;
pub mod wire;

pub use channel::Channel;
pub use codec::{Codec, Decoder, Encoder};
pub use config::{BackoffConfig, ClientConfig, ServerConfig};
pub use context::CallContext;
pub use descriptor::{Cardinality, MethodDescriptor, ServiceDescriptor};
pub use error::{ConfigError, DescriptorError};
pub use metadata::Metadata;
pub use options::{CallCredentials, CallOptions, Compression};
pub use server::{ResponseStream, Server, ServiceRegistry};
pub use status::{Code, Status};
pub use stream::{StreamSession, Streaming};
