//! Post aggregate: lifecycle state, payment flags, and the opaque content
//! payload carried through to the channel sender.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::duplicate::ImageHash;
use super::post_state::{PostState, PostStatus};
use super::PostId;
use crate::error::SchedulerError;

/// How the advertiser chose to pay for the post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Free or cheap FIFO placement.
    Queue,
    /// Paid exact-time placement.
    Priority,
}

/// Settlement state reported by the payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Invoice issued, not settled.
    Pending,
    /// Settled.
    Paid,
    /// Declined or cancelled.
    Failed,
}

macro_rules! str_enum {
    ($ty:ty, $label:literal, { $($variant:path => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Returns the storage string for this value.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($variant => $s,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = SchedulerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($variant),)+
                    other => Err(SchedulerError::InvalidRequest(format!(
                        concat!("unknown ", $label, ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

str_enum!(PaymentType, "payment type", {
    PaymentType::Queue => "queue",
    PaymentType::Priority => "priority",
});

str_enum!(PaymentStatus, "payment status", {
    PaymentStatus::Pending => "pending",
    PaymentStatus::Paid => "paid",
    PaymentStatus::Failed => "failed",
});

/// Payment flags on a post. The engine only reads `status`; amounts are
/// carried for the admin shell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    /// Chosen lane, if the advertiser picked one.
    pub payment_type: Option<PaymentType>,
    /// Settlement state.
    pub status: Option<PaymentStatus>,
    /// Charged amount as a decimal string.
    pub amount: Option<String>,
}

impl Payment {
    /// Returns `true` once the payment collaborator confirmed settlement.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == Some(PaymentStatus::Paid)
    }
}

/// Advertiser-provided content. Never interpreted by the scheduling logic;
/// only the duplicate detector reads a few fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PostContent {
    /// Advertised product.
    pub product_name: String,
    /// Whether an extra fee is offered to bloggers.
    pub has_payment: Option<String>,
    /// Extra fee amount, free text.
    pub payment_amount: Option<String>,
    /// Marketplace the product is sold on.
    pub marketplace: Option<String>,
    /// Expected publication date on the blogger side, free text.
    pub expected_date: Option<String>,
    /// Blog theme the advertiser targets.
    pub blog_theme: Option<String>,
    /// Targeted social networks.
    pub social_networks: Vec<String>,
    /// Ad format per social network.
    pub ad_formats: BTreeMap<String, String>,
    /// Collaboration conditions.
    pub conditions: Option<String>,
    /// Channel-side file reference of the attached image.
    pub image_file_id: Option<String>,
    /// Perceptual hash of the attached image.
    #[schema(value_type = Option<String>)]
    pub image_hash: Option<ImageHash>,
}

/// A post as stored by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Store-assigned identifier.
    pub id: PostId,
    /// Submitting advertiser.
    pub owner_id: i64,
    /// Lifecycle state.
    pub state: PostState,
    /// Payment flags.
    pub payment: Payment,
    /// Opaque content payload.
    pub content: PostContent,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Shorthand for `self.state.status()`.
    #[must_use]
    pub const fn status(&self) -> PostStatus {
        self.state.status()
    }
}

/// Input for [`crate::persistence::PostRepository::create`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPost {
    /// Submitting advertiser.
    pub owner_id: i64,
    /// Payment flags at submission time.
    pub payment: Payment,
    /// Content payload.
    pub content: PostContent,
}

/// Lane a new post is created into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum CreateTarget {
    /// Keep as a draft.
    Draft,
    /// Append to the FIFO queue.
    Queue,
    /// Put in the priority lane at an exact time.
    Scheduled {
        /// Target publish time.
        at: DateTime<Utc>,
    },
}

/// Filter for repository listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Only posts in this status.
    pub status: Option<PostStatus>,
    /// Only posts of this advertiser.
    pub owner_id: Option<i64>,
}

impl PostFilter {
    /// Filter on a single status.
    #[must_use]
    pub const fn status(status: PostStatus) -> Self {
        Self {
            status: Some(status),
            owner_id: None,
        }
    }

    /// Returns `true` when `post` passes the filter.
    #[must_use]
    pub fn matches(&self, post: &Post) -> bool {
        self.status.is_none_or(|s| post.status() == s)
            && self.owner_id.is_none_or(|o| post.owner_id == o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_is_paid_only_when_settled() {
        let mut payment = Payment::default();
        assert!(!payment.is_paid());
        payment.status = Some(PaymentStatus::Pending);
        assert!(!payment.is_paid());
        payment.status = Some(PaymentStatus::Paid);
        assert!(payment.is_paid());
    }

    #[test]
    fn payment_enums_parse() {
        assert_eq!("priority".parse::<PaymentType>().ok(), Some(PaymentType::Priority));
        assert_eq!("failed".parse::<PaymentStatus>().ok(), Some(PaymentStatus::Failed));
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn content_deserializes_with_missing_fields() {
        let content: Result<PostContent, _> =
            serde_json::from_str(r#"{"product_name":"Face cream"}"#);
        assert!(content.is_ok());
        let content = content.unwrap_or_default();
        assert_eq!(content.product_name, "Face cream");
        assert!(content.social_networks.is_empty());
    }
}
