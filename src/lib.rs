//! # post-scheduler
//!
//! Publication engine for an advertising channel bot. Advertisers submit
//! posts; the engine keeps a dense FIFO queue published at fixed daily
//! slots plus a paid priority lane published at exact times, estimates
//! when each queued post goes out, flags near-duplicate submissions, and
//! exposes an admin REST API over all of it.
//!
//! The messaging platform itself stays outside: posts leave through the
//! [`channel::ChannelSender`] contract, and owner notifications are derived
//! from the [`domain::EventBus`].
//!
//! ## Architecture
//!
//! ```text
//! Admin clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── PostService ── Dispatcher (service/)
//!     ├── EventBus ── notifier (domain/, service/)
//!     │
//!     ├── PostRepository · AdminLogStore (persistence/)
//!     ├── Settings (settings/)
//!     ├── ChannelSender (channel/)
//!     │
//!     └── PostgreSQL or in-memory stores
//! ```

pub mod api;
pub mod app_state;
pub mod channel;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod settings;
