//! # Session
//!
//! The ownership binding of one client, one document ID, one live sync
//! channel, and one in-memory editor. A session is an explicitly owned
//! object with scoped acquire/release — spawned against a transport, torn
//! down by `shutdown` (or by dropping every handle), at which point the
//! channel is disconnected.
//!
//! All mutation flows through a single dispatch loop consuming typed
//! events — local commands and channel traffic, FIFO per source — so two
//! operations are never applied concurrently to the same editor. Local
//! batches are applied to the local editor before transmission; inbound
//! operations are applied in receipt order.
//!
//! A remote operation that fails to apply is a divergence signal: the
//! session logs it, stops applying anything further, and re-requests the
//! snapshot. Local edits arriving while desynchronized are dropped with a
//! warning; the snapshot wins.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use coscribe_editor::{extract_topic, Document, Editor, EditorChange, History};

use crate::channel::{ChannelError, ChannelEvent, SyncChannel};
use crate::transport::{DocumentId, SessionId, Transport};

/// Commands a client feeds into the dispatch loop. One `Edit` is one
/// logical edit event (one keystroke or composition), possibly carrying
/// several operations.
#[derive(Debug)]
pub enum SessionCommand {
    Edit(Vec<EditorChange>),
    Undo,
    Redo,
    Snapshot(oneshot::Sender<Document>),
    Shutdown,
}

#[derive(Error, Debug)]
#[error("session closed")]
pub struct SessionClosed;

/// Client-side handle; cheap to clone. Dropping every handle ends the
/// session.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    document_id: DocumentId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    topic: watch::Receiver<String>,
}

impl SessionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Submit one logical edit batch.
    pub fn edit(&self, changes: Vec<EditorChange>) -> Result<(), SessionClosed> {
        self.commands
            .send(SessionCommand::Edit(changes))
            .map_err(|_| SessionClosed)
    }

    pub fn undo(&self) -> Result<(), SessionClosed> {
        self.commands
            .send(SessionCommand::Undo)
            .map_err(|_| SessionClosed)
    }

    pub fn redo(&self) -> Result<(), SessionClosed> {
        self.commands
            .send(SessionCommand::Redo)
            .map_err(|_| SessionClosed)
    }

    /// Current document state, as of all events dispatched so far.
    pub async fn snapshot(&self) -> Result<Document, SessionClosed> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Snapshot(tx))
            .map_err(|_| SessionClosed)?;
        rx.await.map_err(|_| SessionClosed)
    }

    /// Topic stream: the first block's text, updated only when its value
    /// actually changes.
    pub fn topic(&self) -> watch::Receiver<String> {
        self.topic.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
    }
}

pub struct Session {
    editor: Editor,
    history: History,
    channel: SyncChannel,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    topic_tx: watch::Sender<String>,
    desynced: bool,
}

impl Session {
    /// Join the document over the given transport and spawn the dispatch
    /// loop.
    pub async fn spawn(
        document_id: DocumentId,
        session_id: SessionId,
        transport: Box<dyn Transport>,
    ) -> Result<(SessionHandle, JoinHandle<()>), ChannelError> {
        let (session, handle) = Session::create(document_id, session_id, transport).await?;
        let join = tokio::spawn(session.run());
        Ok((handle, join))
    }

    async fn create(
        document_id: DocumentId,
        session_id: SessionId,
        transport: Box<dyn Transport>,
    ) -> Result<(Session, SessionHandle), ChannelError> {
        let channel = SyncChannel::join(document_id, session_id, transport).await?;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (topic_tx, topic_rx) = watch::channel(String::new());
        let session = Session {
            editor: Editor::new(),
            history: History::new(),
            channel,
            commands: commands_rx,
            topic_tx,
            desynced: false,
        };
        let handle = SessionHandle {
            session_id,
            document_id,
            commands: commands_tx,
            topic: topic_rx,
        };
        Ok((session, handle))
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(SessionCommand::Shutdown) => break,
                    Some(command) => self.dispatch_command(command).await,
                },
                event = self.channel.recv() => match event {
                    Some(event) => self.dispatch_channel(event).await,
                    None => {
                        tracing::warn!(
                            document = %self.channel.document_id(),
                            "transport closed; ending session"
                        );
                        break;
                    }
                },
            }
        }
        self.channel.disconnect().await;
    }

    async fn dispatch_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Edit(changes) => self.handle_edit(changes).await,
            SessionCommand::Undo => {
                if let Some(ops) = self.history.undo() {
                    self.apply_history_batch(ops).await;
                }
            }
            SessionCommand::Redo => {
                if let Some(ops) = self.history.redo() {
                    self.apply_history_batch(ops).await;
                }
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.editor.document().clone());
            }
            SessionCommand::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    async fn handle_edit(&mut self, changes: Vec<EditorChange>) {
        if self.desynced {
            tracing::warn!(
                document = %self.channel.document_id(),
                "dropping local edit while awaiting resync"
            );
            return;
        }
        let before = self.editor.document().clone();
        match self.editor.record_batch(changes) {
            Ok(batch) => {
                if let Err(error) = self.history.record(&batch, &before) {
                    tracing::error!(%error, "failed to record batch in history");
                }
                self.transmit(&batch).await;
                self.refresh_topic();
            }
            Err(error) => {
                tracing::error!(
                    document = %self.channel.document_id(),
                    %error,
                    "local batch failed to apply; resynchronizing"
                );
                self.resync().await;
            }
        }
    }

    /// Apply an undo/redo batch: recorded and transmitted like any local
    /// edit, but never re-entered into the history.
    async fn apply_history_batch(&mut self, ops: Vec<coscribe_editor::Operation>) {
        if self.desynced {
            return;
        }
        let changes: Vec<EditorChange> = ops.into_iter().map(EditorChange::Edit).collect();
        match self.editor.record_batch(changes) {
            Ok(batch) => {
                self.transmit(&batch).await;
                self.refresh_topic();
            }
            Err(error) => {
                tracing::error!(
                    document = %self.channel.document_id(),
                    %error,
                    "history batch failed to apply; resynchronizing"
                );
                self.resync().await;
            }
        }
    }

    async fn transmit(&mut self, batch: &[coscribe_editor::Operation]) {
        if batch.is_empty() {
            return;
        }
        if let Err(error) = self.channel.send_changes(batch).await {
            tracing::error!(
                document = %self.channel.document_id(),
                %error,
                "failed to transmit batch"
            );
        }
    }

    async fn dispatch_channel(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Loaded(document) => {
                self.editor.load(document);
                self.history.clear();
                self.desynced = false;
                self.refresh_topic();
            }
            ChannelEvent::Remote(op) => {
                if self.desynced {
                    tracing::debug!("dropping remote operation while awaiting resync");
                    return;
                }
                match self.editor.apply_remote(&op) {
                    Ok(()) => self.refresh_topic(),
                    Err(error) => {
                        tracing::error!(
                            document = %self.channel.document_id(),
                            %error,
                            "remote operation does not apply; document divergence detected"
                        );
                        self.resync().await;
                    }
                }
            }
        }
    }

    async fn resync(&mut self) {
        self.desynced = true;
        if let Err(error) = self.channel.request_document().await {
            tracing::error!(%error, "failed to request snapshot for resync");
        }
    }

    fn refresh_topic(&self) {
        let topic = extract_topic(self.editor.document());
        self.topic_tx.send_if_modified(|current| {
            if *current != topic {
                *current = topic;
                true
            } else {
                false
            }
        });
    }
}
