//! DB Repository abstractions

use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::{Message, MessageStatus, NewMessage, StatusCounts};
use crate::infrastructure::traits::{MessageRepository, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use uuid::Uuid;

#[injectable(MessageRepository)]
pub struct DbMessageRepository {
    connection: Ref<DatabaseConnection>,
}

#[async_trait]
impl MessageRepository for DbMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<Message, StoreError> {
        let now = Utc::now();
        // Messages created directly in a terminal state (render failures)
        // are complete the moment they exist.
        let completed_at = message.status.is_terminal().then_some(now);

        let created = sqlx::query_as(
            "INSERT INTO messages (campaign_id, phone_number, rendered_body, status, error_message, created_at, completed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(message.campaign_id)
        .bind(message.phone_number)
        .bind(message.rendered_body)
        .bind(message.status)
        .bind(message.error_message)
        .bind(now)
        .bind(completed_at)
        .fetch_one(&**self.connection)
        .await?;

        Ok(created)
    }

    async fn transition(
        &self,
        id: i64,
        status: MessageStatus,
        error_message: Option<String>,
    ) -> Result<Message, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id,
                requested: status,
            });
        }

        // Conditional update keyed on the prior status: if another worker
        // already completed this message, zero rows match and we refuse.
        let updated: Option<Message> = sqlx::query_as(
            "UPDATE messages SET status = ?, error_message = ?, completed_at = ? \
             WHERE id = ? AND status = 'pending' RETURNING *",
        )
        .bind(status)
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&**self.connection)
        .await?;

        match updated {
            Some(message) => Ok(message),
            None => {
                let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM messages WHERE id = ?")
                    .bind(id)
                    .fetch_optional(&**self.connection)
                    .await?;

                match exists {
                    Some(_) => Err(StoreError::InvalidTransition {
                        id,
                        requested: status,
                    }),
                    None => Err(StoreError::NotFound(id)),
                }
            }
        }
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as("SELECT * FROM messages ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&**self.connection)
            .await?;

        Ok(messages)
    }

    async fn summarize(&self, campaign_id: Option<Uuid>) -> Result<StatusCounts, StoreError> {
        const COUNT_COLUMNS: &str = "COUNT(*) AS total_messages, \
             COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0) AS success_count, \
             COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed_count, \
             COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending_count";

        let counts = match campaign_id {
            Some(campaign_id) => {
                sqlx::query_as(&format!(
                    "SELECT {COUNT_COLUMNS} FROM messages WHERE campaign_id = ?"
                ))
                .bind(campaign_id)
                .fetch_one(&**self.connection)
                .await?
            }
            None => {
                sqlx::query_as(&format!("SELECT {COUNT_COLUMNS} FROM messages"))
                    .fetch_one(&**self.connection)
                    .await?
            }
        };

        Ok(counts)
    }

    async fn count_all(&self) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(&**self.connection)
            .await?;

        Ok(count.0)
    }
}
