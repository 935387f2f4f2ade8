//! Data Transfer Objects for REST request/response serialization.
//!
//! Posts are flattened into [`PostDto`]; prices travel as decimal strings.

pub mod admin_dto;
pub mod common_dto;
pub mod post_dto;
pub mod queue_dto;
pub mod settings_dto;

pub use admin_dto::*;
pub use common_dto::*;
pub use post_dto::*;
pub use queue_dto::*;
pub use settings_dto::*;
