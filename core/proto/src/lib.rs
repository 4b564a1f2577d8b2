// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core node service bound onto the noderpc transport
//!
//! Message shapes, the service description, the typed [`CoreClient`] stub
//! and the [`Core`] servicer contract. The business logic behind each
//! method lives in whatever implements [`Core`]; this crate is the glue
//! projecting one service description onto the generic transport.

pub mod client;
pub mod descriptor;
pub mod messages;
pub mod server;

pub use client::CoreClient;
pub use descriptor::{core_descriptor, methods, SERVICE_NAME};
pub use messages::*;
pub use server::{register_core_service, Core};
