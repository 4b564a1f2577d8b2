// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Load-time error types
//!
//! Runtime failures always travel as a [`crate::Status`]. The enums here
//! cover the startup phase only: malformed service descriptions and
//! unusable configuration.

use thiserror::Error;

/// Faults in a service description, detected when the description is built.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("service {0} declares a method with an empty name")]
    EmptyMethodName(String),

    #[error("service {service} declares method {method} more than once")]
    DuplicateMethod { service: String, method: String },
}

/// Faults in client or server configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("endpoint must be in host:port form, got: {0}")]
    InvalidEndpoint(String),

    #[error("failed to read configuration file: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[source] serde_yaml::Error),
}
