//! Service layer: business logic orchestration.
//!
//! [`PostService`] coordinates post operations over the repository, the
//! settings view, and the admin log, and emits events through the
//! [`super::domain::EventBus`]. [`Dispatcher`] publishes due posts through a
//! [`crate::channel::ChannelSender`]. The notifier turns events into owner
//! messages.

pub mod dispatcher;
pub mod notifier;
pub mod post_service;

pub use dispatcher::{
    Dispatcher, DispatcherConfig, FailedItem, PublishedItem, TickReport, TickSkip, UnrecordedItem,
};
pub use notifier::{Notification, Recipient, run_notifier};
pub use post_service::{PostService, PostView, QueueCalendar, SchedulerStats};
