//! # Coscribe Workspace
//!
//! The collaboration layer around the editing core: sessions bind one
//! client to one document over one sync channel; the document hub is the
//! in-process document-store/broadcast collaborator; the article feed
//! turns the document's first line into a generated reference article.
//!
//! ```text
//! widget ─► Session ─► Editor (coscribe-editor)
//!              │
//!              ├─► SyncChannel ─► Transport ─► DocumentHub ─► peers
//!              │
//!              └─► topic watch ─► ArticleFeed ─► article service
//! ```

pub mod article;
pub mod channel;
pub mod config;
pub mod hub;
pub mod sanitize;
pub mod session;
pub mod transport;

pub use article::{spawn_topic_watcher, ArticleError, ArticleFeed, FeedState};
pub use channel::{ChannelError, ChannelEvent, ChannelState, SyncChannel};
pub use config::{ArticleServiceConfig, DEFAULT_ARTICLE_SERVICE_URL};
pub use hub::{DocumentHub, DocumentSnapshot, Envelope, LocalTransport};
pub use sanitize::{IdentitySanitizer, Sanitize};
pub use session::{Session, SessionClosed, SessionCommand, SessionHandle};
pub use transport::{
    ClientMessage, DocumentId, ServerMessage, SessionId, Transport, TransportError,
};
