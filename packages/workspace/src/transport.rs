//! # Transport Seam
//!
//! Wire message kinds and the transport trait the sync channel speaks
//! through. A transport is a bidirectional, per-document pipe to the remote
//! peer set; delivery is assumed FIFO per direction. The in-tree
//! implementation is [`LocalTransport`] over the in-process
//! [`DocumentHub`](crate::hub::DocumentHub); network transports (WebSocket
//! and friends) live outside this crate behind the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identity of a shared document. Fixed for a channel's whole lifetime;
/// mixing documents on one channel is forbidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of one editing session; tags outbound batches so the hub can
/// broadcast to everyone except the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Client → hub. Payloads are opaque serialized JSON: a `send-changes`
/// payload is a serialized operation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    GetDocument,
    SendChanges { payload: String },
}

/// Hub → client. A `load-document` payload is a serialized document; a
/// `receive-changes` payload is one serialized operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    LoadDocument { payload: String, version: u64 },
    ReceiveChanges { payload: String },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
}

/// One connected, per-document pipe. `recv` returning `None` means the
/// remote side is gone for good.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, message: ClientMessage) -> Result<(), TransportError>;
    async fn recv(&mut self) -> Option<ServerMessage>;
    /// Release the connection. Must be called on teardown; the hub keeps a
    /// stale participant around otherwise.
    async fn close(&mut self);
}
