//! Database entities

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Delivery state of a single message. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Success,
    Failed,
}

impl MessageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Success => "success",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, MessageStatus::Pending)
    }
}

/// One dispatch attempt for one contact within one campaign.
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: i64,
    pub campaign_id: Uuid,
    pub phone_number: String,
    pub rendered_body: String,
    pub status: MessageStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Insert payload for a message. `created_at` and `completed_at` are
/// assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub campaign_id: Uuid,
    pub phone_number: String,
    pub rendered_body: String,
    pub status: MessageStatus,
    pub error_message: Option<String>,
}

impl NewMessage {
    pub fn pending(campaign_id: Uuid, phone_number: String, rendered_body: String) -> Self {
        NewMessage {
            campaign_id,
            phone_number,
            rendered_body,
            status: MessageStatus::Pending,
            error_message: None,
        }
    }

    /// A message that never reached the gateway, e.g. because rendering
    /// failed. Created directly in `failed`.
    pub fn failed(campaign_id: Uuid, phone_number: String, error_message: String) -> Self {
        NewMessage {
            campaign_id,
            phone_number,
            rendered_body: String::new(),
            status: MessageStatus::Failed,
            error_message: Some(error_message),
        }
    }
}

/// Per-status message counts, recomputed on every read.
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct StatusCounts {
    pub total_messages: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub pending_count: i64,
}
