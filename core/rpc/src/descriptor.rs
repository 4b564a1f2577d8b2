// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Method descriptors and service descriptions
//!
//! A [`ServiceDescriptor`] is built once from an ordered list of method
//! declarations and never mutated afterwards. The wire path of a method is
//! `/<fully-qualified-service-name>/<method-name>`, case-exact on both
//! sides of the connection. Lookup by path is an exact-match map access.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DescriptorError;

/// Streaming shape of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Single request, single response
    UnaryUnary,
    /// Single request, streaming response
    UnaryStream,
}

/// Static metadata for one RPC method.
///
/// Created at service-description load time and shared read-only by every
/// call referencing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    path: Arc<str>,
    service: Arc<str>,
    method: Arc<str>,
    cardinality: Cardinality,
}

impl MethodDescriptor {
    fn new(service: &str, method: &str, cardinality: Cardinality) -> Self {
        Self {
            path: format!("/{}/{}", service, method).into(),
            service: service.into(),
            method: method.into(),
            cardinality,
        }
    }

    /// Full wire path, `/<service>/<method>`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fully-qualified service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Bare method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
}

/// An immutable, ordered set of method descriptors for one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    name: Arc<str>,
    methods: Vec<MethodDescriptor>,
    by_method: HashMap<String, usize>,
}

impl ServiceDescriptor {
    pub fn builder(name: impl Into<String>) -> ServiceDescriptorBuilder {
        ServiceDescriptorBuilder {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// Fully-qualified service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared methods, in declaration order.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// Look up a method by its bare name.
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.by_method.get(name).map(|i| &self.methods[*i])
    }
}

/// Builder accumulating method declarations in order.
pub struct ServiceDescriptorBuilder {
    name: String,
    methods: Vec<(String, Cardinality)>,
}

impl ServiceDescriptorBuilder {
    /// Declare a unary-request, unary-response method.
    pub fn unary(mut self, method: impl Into<String>) -> Self {
        self.methods.push((method.into(), Cardinality::UnaryUnary));
        self
    }

    /// Declare a unary-request, streaming-response method.
    pub fn server_streaming(mut self, method: impl Into<String>) -> Self {
        self.methods.push((method.into(), Cardinality::UnaryStream));
        self
    }

    /// Finalize the description.
    ///
    /// A duplicate method name is a configuration fault of the description
    /// itself and is rejected here, before anything is registered or called.
    pub fn build(self) -> Result<ServiceDescriptor, DescriptorError> {
        if self.name.is_empty() {
            return Err(DescriptorError::EmptyServiceName);
        }

        let mut methods = Vec::with_capacity(self.methods.len());
        let mut by_method = HashMap::with_capacity(self.methods.len());
        for (method, cardinality) in self.methods {
            if method.is_empty() {
                return Err(DescriptorError::EmptyMethodName(self.name.clone()));
            }
            let descriptor = MethodDescriptor::new(&self.name, &method, cardinality);
            if by_method.insert(method.clone(), methods.len()).is_some() {
                return Err(DescriptorError::DuplicateMethod {
                    service: self.name,
                    method,
                });
            }
            methods.push(descriptor);
        }

        Ok(ServiceDescriptor {
            name: self.name.into(),
            methods,
            by_method,
        })
    }
}
