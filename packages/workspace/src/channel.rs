//! # Sync Channel
//!
//! Per-document state machine over a [`Transport`]:
//!
//! ```text
//! Disconnected → Connecting → Joined → Disconnected
//! ```
//!
//! On entering `Joined` the channel requests the authoritative snapshot;
//! while `Joined` it pushes non-empty local batches out and turns inbound
//! wire messages into typed [`ChannelEvent`]s. The channel does not
//! resequence or deduplicate — FIFO per direction is the transport's
//! contract. Teardown must be explicit: a channel dropped while still
//! joined is a leaked remote participant and is logged as such.

use thiserror::Error;

use coscribe_editor::{Document, Operation};

use crate::transport::{
    ClientMessage, DocumentId, ServerMessage, SessionId, Transport, TransportError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Joined,
}

/// Decoded inbound traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Authoritative snapshot; install wholesale, never re-broadcast.
    Loaded(Document),
    /// One peer operation to replay.
    Remote(Operation),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel is not joined")]
    NotJoined,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct SyncChannel {
    document_id: DocumentId,
    session_id: SessionId,
    state: ChannelState,
    transport: Box<dyn Transport>,
}

impl SyncChannel {
    /// Connect and join the document: transitions through `Connecting` and
    /// requests the snapshot on entering `Joined`.
    pub async fn join(
        document_id: DocumentId,
        session_id: SessionId,
        transport: Box<dyn Transport>,
    ) -> Result<Self, ChannelError> {
        let mut channel = Self {
            document_id,
            session_id,
            state: ChannelState::Connecting,
            transport,
        };
        channel.state = ChannelState::Joined;
        channel.transport.send(ClientMessage::GetDocument).await?;
        tracing::debug!(document = %document_id, session = %session_id, "channel joined");
        Ok(channel)
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Push one local batch to the peer set. Empty batches are suppressed
    /// here as well as at the session: idle typing states (selection moves)
    /// must keep the wire quiet.
    pub async fn send_changes(&mut self, batch: &[Operation]) -> Result<(), ChannelError> {
        if self.state != ChannelState::Joined {
            return Err(ChannelError::NotJoined);
        }
        if batch.is_empty() {
            tracing::debug!(document = %self.document_id, "suppressing empty batch");
            return Ok(());
        }
        let payload = serde_json::to_string(batch).expect("operation serialization cannot fail");
        self.transport
            .send(ClientMessage::SendChanges { payload })
            .await?;
        Ok(())
    }

    /// Re-request the snapshot (desync recovery / rejoin).
    pub async fn request_document(&mut self) -> Result<(), ChannelError> {
        if self.state != ChannelState::Joined {
            return Err(ChannelError::NotJoined);
        }
        self.transport.send(ClientMessage::GetDocument).await?;
        Ok(())
    }

    /// Next inbound event. `None` means the transport is gone. Undecodable
    /// payloads are logged and skipped; the transport is trusted for
    /// framing, not for content.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            let message = self.transport.recv().await?;
            match message {
                ServerMessage::LoadDocument { payload, version } => {
                    match serde_json::from_str::<Document>(&payload) {
                        Ok(document) => {
                            tracing::debug!(
                                document = %self.document_id,
                                version,
                                "snapshot received"
                            );
                            return Some(ChannelEvent::Loaded(document));
                        }
                        Err(error) => {
                            tracing::error!(
                                document = %self.document_id,
                                %error,
                                "undecodable snapshot skipped"
                            );
                        }
                    }
                }
                ServerMessage::ReceiveChanges { payload } => {
                    match serde_json::from_str::<Operation>(&payload) {
                        Ok(op) => return Some(ChannelEvent::Remote(op)),
                        Err(error) => {
                            tracing::error!(
                                document = %self.document_id,
                                %error,
                                "undecodable operation skipped"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Explicit teardown; releases the transport's remote participant slot.
    pub async fn disconnect(&mut self) {
        if self.state == ChannelState::Joined {
            self.transport.close().await;
            self.state = ChannelState::Disconnected;
            tracing::debug!(document = %self.document_id, session = %self.session_id, "channel disconnected");
        }
    }
}

impl Drop for SyncChannel {
    fn drop(&mut self) {
        if self.state == ChannelState::Joined {
            tracing::warn!(
                document = %self.document_id,
                session = %self.session_id,
                "sync channel dropped while joined; call disconnect() on teardown"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::DocumentHub;
    use coscribe_editor::InlinePath;

    fn insert(text: &str) -> Operation {
        Operation::InsertText {
            at: InlinePath::new(0, 0),
            offset: 0,
            text: text.to_string(),
        }
    }

    async fn joined_channel(hub: &DocumentHub, id: DocumentId) -> SyncChannel {
        let session = SessionId::random();
        SyncChannel::join(id, session, Box::new(hub.connect(id, session)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_join_requests_snapshot() {
        let hub = DocumentHub::new();
        let id = DocumentId::random();
        let mut channel = joined_channel(&hub, id).await;
        assert_eq!(channel.state(), ChannelState::Joined);

        let event = channel.recv().await.unwrap();
        assert!(matches!(event, ChannelEvent::Loaded(_)));
        channel.disconnect().await;
    }

    #[tokio::test]
    async fn test_empty_batch_is_never_transmitted() {
        let hub = DocumentHub::new();
        let id = DocumentId::random();
        let mut spectator = hub.subscribe(id);
        let mut channel = joined_channel(&hub, id).await;

        channel.send_changes(&[]).await.unwrap();
        assert!(spectator.try_recv().is_err());

        channel.send_changes(&[insert("x")]).await.unwrap();
        assert!(spectator.recv().await.is_ok());
        channel.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnected_channel_rejects_sends() {
        let hub = DocumentHub::new();
        let id = DocumentId::random();
        let mut channel = joined_channel(&hub, id).await;
        channel.disconnect().await;
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert!(matches!(
            channel.send_changes(&[insert("x")]).await,
            Err(ChannelError::NotJoined)
        ));
    }

    #[tokio::test]
    async fn test_remote_operations_are_decoded() {
        let hub = DocumentHub::new();
        let id = DocumentId::random();
        let mut channel = joined_channel(&hub, id).await;
        let ChannelEvent::Loaded(_) = channel.recv().await.unwrap() else {
            panic!("expected snapshot first");
        };

        hub.apply_and_broadcast(id, SessionId::random(), vec![insert("peer")]);
        let event = channel.recv().await.unwrap();
        assert!(
            matches!(event, ChannelEvent::Remote(Operation::InsertText { text, .. }) if text == "peer")
        );
        channel.disconnect().await;
    }
}
