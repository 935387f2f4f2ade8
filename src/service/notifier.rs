//! Owner notifications derived from the event stream.
//!
//! The notifier subscribes to the [`EventBus`] and turns the events an
//! advertiser cares about into [`Notification`]s. Delivery to the messaging
//! platform belongs to the bot shell; this crate logs them.

use std::future::Future;

use tokio::sync::broadcast;

use crate::domain::{EventBus, Lane, PostEvent, PostId};

/// Who to tell what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// The advertiser who submitted the post.
    Owner(i64),
    /// Channel administrators.
    Admins,
}

/// One message for a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Addressee.
    pub recipient: Recipient,
    /// Post the message is about.
    pub post_id: PostId,
    /// Message text.
    pub text: String,
}

impl Notification {
    /// Builds the notification for `event`, if it warrants one.
    #[must_use]
    pub fn from_event(event: &PostEvent) -> Option<Self> {
        match event {
            PostEvent::PostPublished {
                post_id,
                owner_id,
                lane,
                channel_ref,
                ..
            } => {
                let lane = match lane {
                    Lane::Queue => "queue",
                    Lane::Priority => "priority",
                };
                let link = channel_ref
                    .url
                    .as_deref()
                    .map(|u| format!(": {u}"))
                    .unwrap_or_default();
                Some(Self {
                    recipient: Recipient::Owner(*owner_id),
                    post_id: *post_id,
                    text: format!("Your post #{post_id} was published ({lane}){link}"),
                })
            }
            PostEvent::PostDeleted {
                post_id, owner_id, ..
            } => Some(Self {
                recipient: Recipient::Owner(*owner_id),
                post_id: *post_id,
                text: format!("Your post #{post_id} was removed by an administrator"),
            }),
            PostEvent::PublishFailed {
                post_id, reason, ..
            } => Some(Self {
                recipient: Recipient::Admins,
                post_id: *post_id,
                text: format!("Publishing post #{post_id} failed: {reason}"),
            }),
            _ => None,
        }
    }
}

/// Consumes events until `shutdown` resolves or the bus closes, logging a
/// line per notification.
pub async fn run_notifier<F>(event_bus: &EventBus, shutdown: F)
where
    F: Future<Output = ()> + Send,
{
    let mut rx = event_bus.subscribe();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            event = rx.recv() => match event {
                Ok(event) => {
                    tracing::debug!(event = event.event_type_str(), "event received");
                    if let Some(n) = Notification::from_event(&event) {
                        match n.recipient {
                            Recipient::Owner(owner_id) => {
                                tracing::info!(owner_id, post_id = %n.post_id, text = %n.text, "owner notification");
                            }
                            Recipient::Admins => {
                                tracing::warn!(post_id = %n.post_id, text = %n.text, "admin notification");
                            }
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "notifier lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    tracing::debug!("notifier stopped");
}
