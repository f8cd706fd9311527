//! Implementations for the service the app needs.
//!

use crate::core::gateway::SmsGateway;
use crate::core::ingest;
use crate::core::template;
use crate::core::traits::{
    CampaignError, CampaignReport, CampaignService, HealthReport, MetricsReport,
};
use crate::infrastructure::entities::{MessageStatus, NewMessage, StatusCounts};
use crate::infrastructure::traits::MessageRepository;
use async_trait::async_trait;
use di::{Ref, inject, injectable};
use log::{error, info};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use uuid::Uuid;

/// The dashboard's recent-activity feed length.
const RECENT_ACTIVITY_LIMIT: i64 = 100;

const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Dispatch tuning knobs, read once from the environment.
pub struct DispatchConfig {
    /// Bounded worker pool size: the only admission-control knob for
    /// outbound gateway concurrency.
    pub worker_count: usize,
    pub gateway_timeout: Duration,
    pub max_csv_rows: usize,
}

#[injectable]
impl DispatchConfig {
    #[inject]
    pub fn create() -> DispatchConfig {
        dotenvy::dotenv().ok();

        DispatchConfig {
            worker_count: env_or("DISPATCH_WORKERS", 10),
            gateway_timeout: Duration::from_millis(env_or("GATEWAY_TIMEOUT_MS", 10_000)),
            max_csv_rows: env_or("MAX_CSV_ROWS", 10_000),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[injectable(CampaignService)]
pub struct MyCampaignService {
    repository: Ref<dyn MessageRepository>,
    gateway: Ref<dyn SmsGateway>,
    config: Ref<DispatchConfig>,
}

#[async_trait]
impl CampaignService for MyCampaignService {
    async fn run_campaign(
        &self,
        template: &str,
        csv_data: &[u8],
    ) -> Result<CampaignReport, CampaignError> {
        if template.trim().is_empty() {
            return Err(CampaignError::EmptyTemplate);
        }

        let ingested = ingest::ingest_contacts(csv_data, self.config.max_csv_rows)?;
        if ingested.contacts.is_empty() {
            return Err(CampaignError::NoValidContacts);
        }

        let campaign_id = Uuid::new_v4();
        info!(
            "campaign {campaign_id}: dispatching {} contacts ({} rows rejected)",
            ingested.contacts.len(),
            ingested.row_errors.len()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.worker_count));
        let mut workers = JoinSet::new();

        for contact in ingested.contacts {
            let semaphore = Arc::clone(&semaphore);
            let repository = self.repository.clone();
            let gateway = self.gateway.clone();
            let template = template.to_owned();
            let gateway_timeout = self.config.gateway_timeout;

            workers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                dispatch_contact(
                    repository,
                    gateway,
                    campaign_id,
                    &template,
                    contact,
                    gateway_timeout,
                )
                .await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("campaign {campaign_id}: dispatch worker panicked: {e}");
            }
        }

        let counts = self.repository.summarize(Some(campaign_id)).await?;
        info!(
            "campaign {campaign_id}: finished, {} sent, {} failed",
            counts.success_count, counts.failed_count
        );

        Ok(CampaignReport {
            campaign_id,
            processed: counts.success_count + counts.failed_count,
            failed: counts.failed_count,
            row_errors: ingested.row_errors,
        })
    }

    async fn metrics_summary(&self) -> Result<MetricsReport, CampaignError> {
        let counts = self.repository.summarize(None).await?;
        let recent = self.repository.list_recent(RECENT_ACTIVITY_LIMIT).await?;

        Ok(MetricsReport {
            counts,
            success_rate_percent: success_rate(counts),
            recent,
        })
    }

    async fn health(&self) -> HealthReport {
        let started = Instant::now();
        let probe = tokio::time::timeout(HEALTH_PROBE_TIMEOUT, self.repository.count_all()).await;
        let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        match probe {
            Ok(Ok(_)) => HealthReport {
                healthy: true,
                database: "connected".to_string(),
                response_time_ms,
            },
            Ok(Err(e)) => HealthReport {
                healthy: false,
                database: e.to_string(),
                response_time_ms,
            },
            Err(_) => HealthReport {
                healthy: false,
                database: format!("health probe timed out after {HEALTH_PROBE_TIMEOUT:?}"),
                response_time_ms,
            },
        }
    }
}

/// One worker's whole job: render, record, submit, resolve. Every path
/// leaves the contact's message in a terminal state unless the store
/// itself is down, which is logged and never panics the pool.
async fn dispatch_contact(
    repository: Ref<dyn MessageRepository>,
    gateway: Ref<dyn SmsGateway>,
    campaign_id: Uuid,
    template: &str,
    contact: ingest::Contact,
    gateway_timeout: Duration,
) {
    let body = match template::render(template, &contact.fields) {
        Ok(body) => body,
        Err(e) => {
            // Never reaches the gateway; the message is born failed.
            let failed = NewMessage::failed(campaign_id, contact.phone, e.to_string());
            if let Err(store_err) = repository.create(failed).await {
                error!("campaign {campaign_id}: could not record render failure: {store_err}");
            }
            return;
        }
    };

    let pending = NewMessage::pending(campaign_id, contact.phone, body.clone());
    let message = match repository.create(pending).await {
        Ok(message) => message,
        Err(store_err) => {
            error!("campaign {campaign_id}: could not create message: {store_err}");
            return;
        }
    };

    let submission = tokio::time::timeout(
        gateway_timeout,
        gateway.send_sms(&message.phone_number, &body),
    )
    .await;

    let (status, error_message) = match submission {
        Ok(Ok(())) => (MessageStatus::Success, None),
        Ok(Err(e)) => (MessageStatus::Failed, Some(e.to_string())),
        Err(_) => (
            MessageStatus::Failed,
            Some(format!(
                "gateway timeout after {}ms",
                gateway_timeout.as_millis()
            )),
        ),
    };

    if let Err(store_err) = repository
        .transition(message.id, status, error_message)
        .await
    {
        error!(
            "campaign {campaign_id}: message {} left unresolved: {store_err}",
            message.id
        );
    }
}

fn success_rate(counts: StatusCounts) -> f64 {
    if counts.total_messages == 0 {
        return 0.0;
    }

    let rate = counts.success_count as f64 / counts.total_messages as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(total: i64, success: i64, failed: i64, pending: i64) -> StatusCounts {
        StatusCounts {
            total_messages: total,
            success_count: success,
            failed_count: failed,
            pending_count: pending,
        }
    }

    #[test]
    fn test_success_rate_zero_messages_is_zero() {
        assert_eq!(success_rate(counts(0, 0, 0, 0)), 0.0);
    }

    #[test]
    fn test_success_rate_rounds_to_one_decimal() {
        assert_eq!(success_rate(counts(3, 2, 1, 0)), 66.7);
        assert_eq!(success_rate(counts(8, 1, 7, 0)), 12.5);
    }

    #[test]
    fn test_success_rate_counts_pending_against_total() {
        // A partially-completed campaign reports against everything
        // created so far, pending included.
        assert_eq!(success_rate(counts(4, 1, 1, 2)), 25.0);
    }

    #[test]
    fn test_env_or_falls_back_on_missing_or_garbage() {
        assert_eq!(env_or("DEFINITELY_NOT_SET_ANYWHERE", 7usize), 7);
    }
}
