//! # Document Hub
//!
//! In-process realization of the document-store and broadcast
//! collaborators: rooms keyed by document ID, each holding the
//! authoritative document replica and a broadcast channel fanning applied
//! operations out to every connected peer except their origin.
//!
//! Inbound batches are applied to the room's replica through the same
//! operation-application path the clients use before being relayed; an
//! operation that fails validation is dropped with a warning and never
//! reaches peers, so a buggy or desynchronized client cannot corrupt the
//! others.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use async_trait::async_trait;
use coscribe_editor::{Document, Editor, Operation};

use crate::transport::{
    ClientMessage, DocumentId, ServerMessage, SessionId, Transport, TransportError,
};

const BROADCAST_CAPACITY: usize = 256;

/// A broadcast unit: one applied operation plus its origin, so receivers
/// can skip their own echoes.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: SessionId,
    pub message: ServerMessage,
}

/// Current state of one room, cloned out for snapshot replies.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSnapshot {
    pub document: Document,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

struct Room {
    editor: Editor,
    version: u64,
    updated_at: DateTime<Utc>,
    tx: broadcast::Sender<Envelope>,
    peers: usize,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            editor: Editor::new(),
            version: 0,
            updated_at: Utc::now(),
            tx,
            peers: 0,
        }
    }

    fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            document: self.editor.document().clone(),
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

/// Shared hub over all rooms. Cheap to clone; the lock guards only short,
/// non-awaiting critical sections.
#[derive(Clone, Default)]
pub struct DocumentHub {
    rooms: Arc<Mutex<HashMap<DocumentId, Room>>>,
}

impl DocumentHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a room, creating it with a fresh document on first
    /// access.
    pub fn open(&self, document: DocumentId) -> DocumentSnapshot {
        let mut rooms = self.rooms.lock().unwrap();
        rooms.entry(document).or_insert_with(Room::new).snapshot()
    }

    /// Subscribe to a room's broadcast stream (creating the room if
    /// needed). Used by spectators such as the SSE endpoint; sessions get
    /// their subscription through [`DocumentHub::connect`].
    pub fn subscribe(&self, document: DocumentId) -> broadcast::Receiver<Envelope> {
        let mut rooms = self.rooms.lock().unwrap();
        rooms
            .entry(document)
            .or_insert_with(Room::new)
            .tx
            .subscribe()
    }

    /// Attach a peer and return its transport.
    pub fn connect(&self, document: DocumentId, session: SessionId) -> LocalTransport {
        let rx = {
            let mut rooms = self.rooms.lock().unwrap();
            let room = rooms.entry(document).or_insert_with(Room::new);
            room.peers += 1;
            room.tx.subscribe()
        };
        tracing::debug!(%document, %session, "peer connected");
        LocalTransport {
            hub: self.clone(),
            document,
            session,
            rx,
            replies: VecDeque::new(),
            open: true,
        }
    }

    /// Apply a batch to the authoritative replica and broadcast each
    /// applied operation individually, tagged with its origin. Returns the
    /// number of operations relayed. An operation that fails to apply
    /// aborts the remainder of its batch (later operations in a batch
    /// depend on earlier ones).
    pub fn apply_and_broadcast(
        &self,
        document: DocumentId,
        origin: SessionId,
        operations: Vec<Operation>,
    ) -> usize {
        if operations.is_empty() {
            tracing::warn!(%document, %origin, "discarding empty change batch");
            return 0;
        }
        let mut rooms = self.rooms.lock().unwrap();
        let Some(room) = rooms.get_mut(&document) else {
            tracing::warn!(%document, "changes for unknown room discarded");
            return 0;
        };
        let mut relayed = 0;
        for op in operations {
            if let Err(error) = room.editor.apply_remote(&op) {
                tracing::warn!(
                    %document,
                    %origin,
                    %error,
                    "operation does not apply to the authoritative copy; dropping rest of batch"
                );
                break;
            }
            room.version += 1;
            room.updated_at = Utc::now();
            let payload =
                serde_json::to_string(&op).expect("operation serialization cannot fail");
            let _ = room.tx.send(Envelope {
                origin,
                message: ServerMessage::ReceiveChanges { payload },
            });
            relayed += 1;
        }
        relayed
    }

    fn submit_serialized(&self, document: DocumentId, origin: SessionId, payload: &str) {
        match serde_json::from_str::<Vec<Operation>>(payload) {
            Ok(operations) => {
                self.apply_and_broadcast(document, origin, operations);
            }
            Err(error) => {
                tracing::warn!(%document, %origin, %error, "undecodable change batch discarded");
            }
        }
    }

    /// Snapshot a room for one particular subscriber. Broadcast sends and
    /// this snapshot both run under the room lock, so draining the
    /// receiver here guarantees the snapshot contains everything the
    /// subscriber might otherwise replay twice after the load.
    fn consistent_snapshot(
        &self,
        document: DocumentId,
        rx: &mut broadcast::Receiver<Envelope>,
    ) -> DocumentSnapshot {
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms.entry(document).or_insert_with(Room::new);
        loop {
            match rx.try_recv() {
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        room.snapshot()
    }

    fn disconnect(&self, document: DocumentId, session: SessionId) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(room) = rooms.get_mut(&document) {
            room.peers = room.peers.saturating_sub(1);
            tracing::debug!(%document, %session, remaining = room.peers, "peer disconnected");
        }
    }
}

/// Hub-backed transport: snapshot replies are queued locally and drained
/// before broadcast traffic; broadcasts from this peer's own session are
/// filtered out.
pub struct LocalTransport {
    hub: DocumentHub,
    document: DocumentId,
    session: SessionId,
    rx: broadcast::Receiver<Envelope>,
    replies: VecDeque<ServerMessage>,
    open: bool,
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&mut self, message: ClientMessage) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        match message {
            ClientMessage::GetDocument => {
                let snapshot = self.hub.consistent_snapshot(self.document, &mut self.rx);
                let payload = serde_json::to_string(&snapshot.document)
                    .expect("document serialization cannot fail");
                self.replies.push_back(ServerMessage::LoadDocument {
                    payload,
                    version: snapshot.version,
                });
            }
            ClientMessage::SendChanges { payload } => {
                self.hub
                    .submit_serialized(self.document, self.session, &payload);
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            if let Some(reply) = self.replies.pop_front() {
                return Some(reply);
            }
            if !self.open {
                return None;
            }
            match self.rx.recv().await {
                Ok(envelope) if envelope.origin == self.session => continue,
                Ok(envelope) => return Some(envelope.message),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    // FIFO recovery under loss is a transport non-goal; the
                    // session will fall back to a snapshot reload on the
                    // first operation that no longer applies.
                    tracing::warn!(document = %self.document, lagged = count, "transport lagged; messages lost");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.hub.disconnect(self.document, self.session);
        }
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            self.hub.disconnect(self.document, self.session);
        }
    }
}
