//! Album-aware message dispatch
//!
//! Sits between the poller and the handlers: album members are collated by
//! `media_group_id` so an album reaches the handlers once, as one unit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::collator::{Admission, AlbumCollator, Collated};
use crate::error::HandlerResult;
use crate::handlers::Handlers;
use crate::telegram::Message;

pub struct Dispatcher {
    collator: AlbumCollator<Message>,
    handlers: Handlers,
}

impl Dispatcher {
    pub fn new(handlers: Handlers, album_latency: Duration) -> Self {
        Self {
            collator: AlbumCollator::new(album_latency),
            handlers,
        }
    }

    /// Albums still inside their collection window
    pub fn open_albums(&self) -> usize {
        self.collator.open_groups()
    }

    /// Admit a message and return the work it triggers, if any
    ///
    /// Must be called in arrival order. The returned future waits out the
    /// album window (if any) and runs the handlers; spawn it. `None` means the
    /// message joined an album that another future will deliver.
    pub fn admit(
        self: &Arc<Self>,
        message: Message,
    ) -> Option<impl Future<Output = ()> + Send + 'static> {
        let admission = match self.collator.admit(message.media_group_id.clone(), message) {
            Admission::Absorbed => return None,
            admission => admission,
        };

        let this = Arc::clone(self);
        Some(async move {
            let members = match admission {
                Admission::Passthrough(message) => vec![message],
                Admission::Opened(group) => group.close().await,
                Admission::Absorbed => Vec::new(),
            };
            if !members.is_empty() {
                this.deliver(members).await;
            }
        })
    }

    /// Admit and process a message on the caller's task
    ///
    /// Returns [`Collated::Absorbed`] for album members delivered by an
    /// earlier call. Handler errors are returned, not logged.
    pub async fn accept(&self, message: Message) -> HandlerResult<Collated<()>> {
        self.collator
            .accept(message.media_group_id.clone(), message, |members| {
                self.handlers.handle(members)
            })
            .await
    }

    async fn deliver(&self, members: Vec<Message>) {
        let Some(first) = members.first() else {
            return;
        };
        let chat_id = first.chat.id;
        let message_id = first.message_id;
        debug!(chat_id, message_id, members = members.len(), "Dispatching message");

        if let Err(e) = self.handlers.handle(members).await {
            error!(chat_id, message_id, error = %e, "Message handler failed");
        }
    }
}
