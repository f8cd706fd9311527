//! Infrastructure traits, used for DI on higher levels

use crate::infrastructure::entities::{Message, MessageStatus, NewMessage, StatusCounts};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested edge is not `pending -> success` or
    /// `pending -> failed`, or the message already left `pending`.
    #[error("message {id} cannot transition to '{}': message is not pending", requested.as_str())]
    InvalidTransition { id: i64, requested: MessageStatus },

    #[error("message {0} not found")]
    NotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The message store: single source of truth for dispatch outcomes.
/// Writes must be safe under concurrent dispatch workers; reads must never
/// observe a half-written row.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Inserts a new message and returns it with its assigned id.
    async fn create(&self, message: NewMessage) -> Result<Message, StoreError>;

    /// Moves a pending message to a terminal status, atomically.
    ///
    /// Returns `InvalidTransition` if the message is no longer pending or
    /// the target status is not terminal, so two workers can never both
    /// complete the same message.
    async fn transition(
        &self,
        id: i64,
        status: MessageStatus,
        error_message: Option<String>,
    ) -> Result<Message, StoreError>;

    /// The most recently created messages, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Message>, StoreError>;

    /// Per-status counts, over one campaign or the whole store.
    async fn summarize(&self, campaign_id: Option<Uuid>) -> Result<StatusCounts, StoreError>;

    /// Cheap round-trip used by the health probe.
    async fn count_all(&self) -> Result<i64, StoreError>;
}
