//! Client-side conversation state and decoder binding.

use std::collections::HashSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use super::decoder::StreamDecoder;
use crate::core::Message;
use crate::error::DecodeError;

type ActiveIds = Arc<Mutex<HashSet<String>>>;

/// Tracks which message ids have a decoder in flight.
///
/// At most one decoder is bound to a message id at a time. The binding is
/// released when the [`BoundDecoder`] is dropped or finished.
#[derive(Debug, Clone, Default)]
pub struct DecoderRegistry {
    active: ActiveIds,
}

impl DecoderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a new decoder to `message_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::AlreadyBound`] if a decoder for the id is
    /// still alive.
    pub fn bind(&self, message_id: impl Into<String>) -> Result<BoundDecoder, DecodeError> {
        let message_id = message_id.into();
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(message_id.clone()) {
            return Err(DecodeError::AlreadyBound { message_id });
        }
        Ok(BoundDecoder {
            decoder: StreamDecoder::new(message_id),
            active: Arc::clone(&self.active),
        })
    }

    /// Returns `true` while a decoder is bound to `message_id`.
    #[must_use]
    pub fn is_bound(&self, message_id: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(message_id)
    }
}

/// A [`StreamDecoder`] holding its registry lease.
pub struct BoundDecoder {
    decoder: StreamDecoder,
    active: ActiveIds,
}

impl BoundDecoder {
    /// Finishes the stream and releases the lease.
    ///
    /// # Errors
    ///
    /// See [`StreamDecoder::finish`].
    pub fn finish(mut self) -> Result<Message, DecodeError> {
        let id = self.decoder.message_id().to_string();
        let decoder = std::mem::replace(&mut self.decoder, StreamDecoder::new(id));
        decoder.finish()
    }
}

impl Deref for BoundDecoder {
    type Target = StreamDecoder;

    fn deref(&self) -> &StreamDecoder {
        &self.decoder
    }
}

impl DerefMut for BoundDecoder {
    fn deref_mut(&mut self) -> &mut StreamDecoder {
        &mut self.decoder
    }
}

impl Drop for BoundDecoder {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.decoder.message_id());
    }
}

impl fmt::Debug for BoundDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundDecoder")
            .field("message_id", &self.decoder.message_id())
            .finish_non_exhaustive()
    }
}

/// A failure shown next to the message it interrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Message the failure belongs to.
    pub message_id: String,
    /// Human-readable text.
    pub text: String,
}

/// Client view of one conversation.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    /// History, oldest first.
    pub messages: Vec<Message>,
    /// Status indicator of the in-flight turn.
    pub status: Option<String>,
    /// Failures, kept apart from message content.
    pub notices: Vec<Notice>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a user message and returns its id.
    pub fn push_user(&mut self, content: impl Into<String>) -> String {
        let message = Message::user(content);
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Replaces the message with the same id, or appends it.
    pub fn upsert(&mut self, message: Message) {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
    }

    /// Mirrors a decoder's progress into the conversation.
    pub fn observe(&mut self, decoder: &StreamDecoder) {
        self.status = decoder.status().map(str::to_string);
        self.upsert(decoder.snapshot().clone());
    }

    /// Stores the completed message and clears the status indicator.
    pub fn complete(&mut self, message: Message) {
        self.status = None;
        self.upsert(message);
    }

    /// Records a failure without touching the partial content.
    pub fn push_notice(&mut self, message_id: impl Into<String>, text: impl Into<String>) {
        self.status = None;
        self.notices.push(Notice {
            message_id: message_id.into(),
            text: text.into(),
        });
    }
}
