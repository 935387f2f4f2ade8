//! Broadcast channel delivery contract.
//!
//! The dispatcher hands each due post to a [`ChannelSender`] and records the
//! returned [`ChannelRef`]. Real transports live outside this crate; the
//! binary ships [`LogChannelSender`], a dry-run sender that only logs.

pub mod format;

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use crate::domain::{ChannelRef, Post, PostId};

pub use format::render_caption;

/// Failure to deliver one post. Never fatal to a dispatch tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The transport rejected the message.
    #[error("channel rejected message: {0}")]
    Rejected(String),

    /// The transport could not be reached.
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// No answer within the configured send timeout.
    #[error("send timed out after {0}s")]
    Timeout(u64),
}

/// One message ready for the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPost {
    /// Post being published.
    pub post_id: PostId,
    /// Target channel id.
    pub channel_id: String,
    /// Rendered message text (HTML parse mode).
    pub text: String,
    /// Image to attach; the text becomes its caption.
    pub image_file_id: Option<String>,
}

impl OutboundPost {
    /// Renders `post` for `channel_id`.
    #[must_use]
    pub fn from_post(channel_id: &str, post: &Post) -> Self {
        Self {
            post_id: post.id,
            channel_id: channel_id.to_string(),
            text: render_caption(&post.content),
            image_file_id: post.content.image_file_id.clone(),
        }
    }
}

/// Transport that publishes a message to the broadcast channel.
#[async_trait]
pub trait ChannelSender: Send + Sync + std::fmt::Debug {
    /// Sends one message and returns the channel-side reference.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] when the message was not delivered.
    async fn send(&self, message: &OutboundPost) -> Result<ChannelRef, SendError>;
}

/// Dry-run sender: logs every message and hands out increasing message ids.
#[derive(Debug)]
pub struct LogChannelSender {
    next_message_id: AtomicI64,
    username: Option<String>,
}

impl LogChannelSender {
    /// Creates a sender. With a channel `username`, references carry a
    /// public `https://t.me/<username>/<id>` link.
    #[must_use]
    pub fn new(username: Option<String>) -> Self {
        Self {
            next_message_id: AtomicI64::new(1),
            username,
        }
    }
}

impl Default for LogChannelSender {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl ChannelSender for LogChannelSender {
    async fn send(&self, message: &OutboundPost) -> Result<ChannelRef, SendError> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            post_id = %message.post_id,
            channel_id = %message.channel_id,
            message_id,
            has_image = message.image_file_id.is_some(),
            chars = message.text.chars().count(),
            "dry-run channel send"
        );
        Ok(ChannelRef {
            message_id,
            url: self
                .username
                .as_ref()
                .map(|u| format!("https://t.me/{u}/{message_id}")),
        })
    }
}


#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::{Payment, PostContent, PostState};

    fn post(image: Option<&str>) -> Post {
        Post {
            id: PostId::new(4),
            owner_id: 1,
            state: PostState::Queued { position: 1 },
            payment: Payment::default(),
            content: PostContent {
                product_name: "Lamp".to_string(),
                image_file_id: image.map(str::to_string),
                ..PostContent::default()
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn log_sender_hands_out_increasing_ids_and_links() {
        let sender = LogChannelSender::new(Some("ads".to_string()));
        let message = OutboundPost::from_post("-100", &post(None));
        let Ok(first) = sender.send(&message).await else {
            panic!("dry run never fails");
        };
        let Ok(second) = sender.send(&message).await else {
            panic!("dry run never fails");
        };
        assert_eq!(first.message_id + 1, second.message_id);
        assert_eq!(first.url.as_deref(), Some("https://t.me/ads/1"));
    }

    #[test]
    fn outbound_carries_image_and_caption() {
        let message = OutboundPost::from_post("-100", &post(Some("file-1")));
        assert_eq!(message.image_file_id.as_deref(), Some("file-1"));
        assert!(message.text.contains("Lamp"));
        assert_eq!(message.channel_id, "-100");
    }

    #[test]
    fn send_error_messages() {
        assert_eq!(SendError::Timeout(10).to_string(), "send timed out after 10s");
    }
}
