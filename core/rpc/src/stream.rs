// Copyright Noderpc Contributors
// SPDX-License-Identifier: Apache-2.0

//! Client-side streaming sessions
//!
//! A session moves through `Open -> {Emitting}* -> Closed` and never leaves
//! a closed state. Messages arrive in the order the handler produced them;
//! once the consumer has observed a terminal status, no further message is
//! delivered. Cancellation is cooperative: it closes the session locally at
//! once and advises the server to stop producing.

use std::marker::PhantomData;

use async_stream::stream;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::channel::{Conn, Inbound, deadline_sleep, decompress};
use crate::codec::Decoder;
use crate::wire::Frame;
use crate::{Code, Status};

enum SessionState {
    Open,
    Closed(Status),
}

/// Byte-level server-streaming session for one call.
pub struct StreamSession {
    conn: Conn,
    id: u64,
    rx: mpsc::Receiver<Inbound>,
    deadline: Option<Instant>,
    state: SessionState,
}

impl StreamSession {
    pub(crate) fn new(
        conn: Conn,
        id: u64,
        rx: mpsc::Receiver<Inbound>,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            conn,
            id,
            rx,
            deadline,
            state: SessionState::Open,
        }
    }

    /// Pull the next message.
    ///
    /// `Ok(Some(bytes))` is one message, `Ok(None)` is a clean end of
    /// stream. Pulling again after any terminal outcome fails immediately
    /// with a "session closed" status rather than hanging.
    pub async fn message(&mut self) -> Result<Option<Vec<u8>>, Status> {
        if let SessionState::Closed(_) = self.state {
            return Err(Status::failed_precondition("session closed"));
        }

        tokio::select! {
            inbound = self.rx.recv() => match inbound {
                Some(Inbound::Message(payload, encoding)) => match decompress(payload, &encoding) {
                    Ok(payload) => Ok(Some(payload)),
                    Err(status) => {
                        self.terminate(status.clone());
                        Err(status)
                    }
                },
                Some(Inbound::Trailer(status)) if status.is_ok() => {
                    self.close_locally(status);
                    Ok(None)
                }
                Some(Inbound::Trailer(status)) => {
                    self.close_locally(status.clone());
                    Err(status)
                }
                None => {
                    let status = Status::unavailable("connection lost");
                    self.close_locally(status.clone());
                    Err(status)
                }
            },
            _ = deadline_sleep(self.deadline) => {
                let status = Status::deadline_exceeded("stream deadline exceeded");
                self.terminate(status.clone());
                Err(status)
            }
        }
    }

    /// Cancel the session.
    ///
    /// Idempotent: the first call flips the session to its cancelled
    /// terminal state and advises the server; later calls are no-ops.
    pub fn cancel(&mut self) {
        if matches!(self.state, SessionState::Open) {
            tracing::debug!(id = self.id, "cancelling stream session");
            self.terminate(Status::cancelled("stream cancelled"));
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed(_))
    }

    /// Terminal status once the session has closed.
    pub fn close_status(&self) -> Option<&Status> {
        match &self.state {
            SessionState::Open => None,
            SessionState::Closed(status) => Some(status),
        }
    }

    /// Close locally and advise the server to stop producing.
    fn terminate(&mut self, status: Status) {
        self.conn.send_best_effort(Frame::cancel(self.id));
        self.close_locally(status);
    }

    /// True once the session closed due to cancellation specifically.
    pub fn is_cancelled(&self) -> bool {
        matches!(&self.state, SessionState::Closed(status) if status.code() == Code::Cancelled)
    }

    /// Close without notifying the server (it already sent a trailer).
    fn close_locally(&mut self, status: Status) {
        self.rx.close();
        self.conn.deregister(self.id);
        self.state = SessionState::Closed(status);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if matches!(self.state, SessionState::Open) {
            self.conn.send_best_effort(Frame::cancel(self.id));
            self.conn.deregister(self.id);
        }
    }
}

/// Typed server-streaming session decoding each message on arrival.
pub struct Streaming<Res> {
    session: StreamSession,
    _marker: PhantomData<fn() -> Res>,
}

impl<Res> Streaming<Res>
where
    Res: Decoder,
{
    pub(crate) fn new(session: StreamSession) -> Self {
        Self {
            session,
            _marker: PhantomData,
        }
    }

    /// Pull and decode the next message.
    ///
    /// A decode failure is a local fault: the session terminates with
    /// `Internal` and the server is advised to stop.
    pub async fn message(&mut self) -> Result<Option<Res>, Status> {
        match self.session.message().await? {
            Some(payload) => match Res::decode(&payload) {
                Ok(message) => Ok(Some(message)),
                Err(status) => {
                    self.session.terminate(status.clone());
                    Err(status)
                }
            },
            None => Ok(None),
        }
    }

    pub fn cancel(&mut self) {
        self.session.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    pub fn close_status(&self) -> Option<&Status> {
        self.session.close_status()
    }

    /// Consume the session as a `Stream` of decoded messages.
    ///
    /// The stream ends after a clean trailer; an error is yielded once and
    /// ends the stream.
    pub fn into_stream(mut self) -> impl Stream<Item = Result<Res, Status>>
    where
        Res: Send + 'static,
    {
        stream! {
            loop {
                match self.message().await {
                    Ok(Some(message)) => yield Ok(message),
                    Ok(None) => break,
                    Err(status) => {
                        yield Err(status);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> (Conn, mpsc::Receiver<Inbound>) {
        Conn::stub_for_tests()
    }

    #[tokio::test]
    async fn test_messages_then_clean_close() {
        let (conn, rx) = test_conn();
        let mut session = StreamSession::new(conn.clone(), 1, rx, None);

        conn.push_for_tests(1, Inbound::Message(vec![1], "identity".into()))
            .await;
        conn.push_for_tests(1, Inbound::Message(vec![2], "identity".into()))
            .await;
        conn.push_for_tests(1, Inbound::Trailer(Status::ok())).await;

        assert_eq!(session.message().await.unwrap(), Some(vec![1]));
        assert_eq!(session.message().await.unwrap(), Some(vec![2]));
        assert_eq!(session.message().await.unwrap(), None);
        assert!(session.is_closed());

        // A pull on a closed session fails, it does not hang.
        let err = session.message().await.unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_blocks_delivery() {
        let (conn, rx) = test_conn();
        let mut session = StreamSession::new(conn.clone(), 1, rx, None);

        conn.push_for_tests(1, Inbound::Message(vec![1], "identity".into()))
            .await;
        session.cancel();
        session.cancel();

        assert!(session.is_cancelled());
        let err = session.message().await.unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
    }

    #[tokio::test]
    async fn test_deadline_closes_session() {
        let (conn, rx) = test_conn();
        let deadline = Instant::now() + std::time::Duration::from_millis(20);
        let mut session = StreamSession::new(conn, 1, rx, Some(deadline));

        let err = session.message().await.unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
        assert!(session.is_closed());
    }
}
