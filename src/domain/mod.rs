//! Domain layer: post model, lifecycle state machine, queue allocation,
//! publish-time estimation, duplicate detection, and the event system.
//!
//! Everything here is pure or in-process; persistence and delivery live in
//! [`crate::persistence`] and [`crate::channel`].

pub mod duplicate;
pub mod estimator;
pub mod event_bus;
pub mod post;
pub mod post_event;
pub mod post_id;
pub mod post_state;
pub mod queue;
pub mod schedule;

pub use duplicate::{DuplicateCheck, DuplicateDetector, ImageHash};
pub use estimator::{Estimate, estimate_publish_time};
pub use event_bus::EventBus;
pub use post::{
    CreateTarget, NewPost, Payment, PaymentStatus, PaymentType, Post, PostContent, PostFilter,
};
pub use post_event::PostEvent;
pub use post_id::PostId;
pub use post_state::{ChannelRef, Lane, PostState, PostStatus, Transition};
pub use schedule::{PublishSchedule, SlotTime};
