// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-call context handed to server handlers
//!
//! The context carries the request metadata and peer identity, exposes the
//! call's deadline and cooperative cancellation, and lets a handler
//! override the outgoing trailer status before returning.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Metadata, Status};

struct ContextInner {
    peer: SocketAddr,
    path: String,
    metadata: Metadata,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
    trailer: parking_lot::Mutex<Option<Status>>,
}

/// Context for one inbound call.
#[derive(Clone)]
pub struct CallContext {
    inner: Arc<ContextInner>,
}

impl CallContext {
    /// Build a context directly.
    ///
    /// The server builds one per inbound call; building one by hand is
    /// useful for exercising a servicer without a transport.
    pub fn new(
        peer: SocketAddr,
        path: String,
        metadata: Metadata,
        deadline: Option<Instant>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                peer,
                path,
                metadata,
                deadline,
                cancellation,
                trailer: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// Address of the calling peer.
    pub fn peer(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Wire path of the invoked method.
    pub fn path(&self) -> &str {
        &self.inner.path
    }

    /// Metadata pairs the caller sent with the request.
    pub fn metadata(&self) -> &Metadata {
        &self.inner.metadata
    }

    /// Absolute deadline, if the caller attached one.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// True once the caller cancelled the call or its deadline fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancellation.is_cancelled()
    }

    /// Resolves when the call is cancelled; lets streaming handlers stop
    /// producing at their next safe point.
    pub async fn cancelled(&self) {
        self.inner.cancellation.cancelled().await
    }

    /// Override the status sent in the call's trailer.
    ///
    /// Applies only when the handler itself returns successfully; a handler
    /// error always wins.
    pub fn set_status(&self, status: Status) {
        *self.inner.trailer.lock() = Some(status);
    }

    pub(crate) fn take_status(&self) -> Option<Status> {
        self.inner.trailer.lock().take()
    }

    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.inner.cancellation.clone()
    }
}
