//! Dispatch orchestration tests
//!
//! Drives the campaign service directly against a mock gateway to check
//! the concurrency contract: every contact ends terminal, ids are unique,
//! the worker pool ceiling is respected, and timeouts become failures.
//!
//! Serialized: the tests share the global test pool, the mock gateway
//! state, and the environment-driven dispatch configuration.

use async_trait::async_trait;
use di::{Injectable, ServiceCollection, inject, injectable};
use serial_test::serial;
use sms_campaign_api::core::gateway::{GatewayError, SmsGateway};
use sms_campaign_api::core::services::{DispatchConfig, MyCampaignService};
use sms_campaign_api::core::traits::{CampaignError, CampaignService};
use sms_campaign_api::infrastructure::database::DatabaseConnection;
use sms_campaign_api::infrastructure::repositories::DbMessageRepository;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

static TEST_DB_COUNTER: AtomicU32 = AtomicU32::new(1000);

/// In-flight gateway calls, tracked to observe the pool ceiling.
static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
static MAX_IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
/// When non-zero, every send sleeps this many milliseconds.
static SEND_DELAY_MS: AtomicUsize = AtomicUsize::new(0);

pub struct CountingGateway;

#[injectable(SmsGateway)]
impl CountingGateway {
    #[inject]
    pub fn create() -> CountingGateway {
        CountingGateway
    }
}

#[async_trait]
impl SmsGateway for CountingGateway {
    async fn send_sms(&self, _phone_number: &str, _body: &str) -> Result<(), GatewayError> {
        let now = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
        MAX_IN_FLIGHT.fetch_max(now, Ordering::SeqCst);

        let delay = SEND_DELAY_MS.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }

        IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn setup_test_db() -> SqlitePool {
    let db_num = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_url = format!("sqlite:file:testdb{}?mode=memory&cache=shared", db_num);

    let pool = SqlitePool::connect(&db_url).await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    DatabaseConnection::set_test_pool(pool.clone());
    IN_FLIGHT.store(0, Ordering::SeqCst);
    MAX_IN_FLIGHT.store(0, Ordering::SeqCst);
    SEND_DELAY_MS.store(0, Ordering::SeqCst);

    pool
}

fn cleanup_test_db() {
    DatabaseConnection::clear_test_pool();
    unsafe {
        std::env::remove_var("DISPATCH_WORKERS");
        std::env::remove_var("GATEWAY_TIMEOUT_MS");
    }
}

fn create_service() -> (di::ServiceProvider, di::Ref<dyn CampaignService>) {
    let provider = ServiceCollection::new()
        .add(DatabaseConnection::transient())
        .add(DispatchConfig::singleton())
        .add(CountingGateway::singleton())
        .add(DbMessageRepository::scoped())
        .add(MyCampaignService::scoped())
        .build_provider()
        .unwrap();
    let service = provider.get_required::<dyn CampaignService>();
    (provider, service)
}

fn contacts_csv(count: usize) -> String {
    let mut csv = String::from("phone,name\n");
    for n in 0..count {
        csv.push_str(&format!("+1555{n:07},Contact{n}\n"));
    }
    csv
}

#[tokio::test]
#[serial]
async fn test_every_contact_ends_terminal_with_unique_id() {
    let pool = setup_test_db().await;

    let (_provider, service) = create_service();
    let report = service
        .run_campaign("Hi {name}", contacts_csv(25).as_bytes())
        .await
        .unwrap();

    assert_eq!(report.processed, 25);
    assert_eq!(report.failed, 0);

    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, status FROM messages")
        .fetch_all(&pool)
        .await
        .unwrap();

    assert_eq!(rows.len(), 25);
    let ids: HashSet<i64> = rows.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids.len(), 25);
    // No message may still be pending after dispatch returned.
    assert!(rows.iter().all(|(_, status)| status != "pending"));

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_worker_pool_ceiling_is_respected() {
    let _pool = setup_test_db().await;
    SEND_DELAY_MS.store(30, Ordering::SeqCst);
    unsafe {
        std::env::set_var("DISPATCH_WORKERS", "3");
    }

    let (_provider, service) = create_service();
    let report = service
        .run_campaign("Hi {name}", contacts_csv(12).as_bytes())
        .await
        .unwrap();

    assert_eq!(report.processed, 12);
    assert!(
        MAX_IN_FLIGHT.load(Ordering::SeqCst) <= 3,
        "observed {} concurrent gateway calls with a pool of 3",
        MAX_IN_FLIGHT.load(Ordering::SeqCst)
    );

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_gateway_timeout_becomes_failed_message() {
    let pool = setup_test_db().await;
    // Every send takes much longer than the configured deadline.
    SEND_DELAY_MS.store(5_000, Ordering::SeqCst);
    unsafe {
        std::env::set_var("GATEWAY_TIMEOUT_MS", "100");
    }

    let (_provider, service) = create_service();
    let report = service
        .run_campaign("Hi {name}", contacts_csv(2).as_bytes())
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 2);

    let rows: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT status, error_message FROM messages")
            .fetch_all(&pool)
            .await
            .unwrap();

    assert_eq!(rows.len(), 2);
    for (status, error_message) in rows {
        assert_eq!(status, "failed");
        assert!(error_message.unwrap().contains("gateway timeout"));
    }

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_rerun_is_a_fresh_campaign() {
    let pool = setup_test_db().await;

    let (_provider, service) = create_service();
    let first = service
        .run_campaign("Hi {name}", contacts_csv(3).as_bytes())
        .await
        .unwrap();
    let second = service
        .run_campaign("Hi {name}", contacts_csv(3).as_bytes())
        .await
        .unwrap();

    assert_ne!(first.campaign_id, second.campaign_id);
    assert_eq!(first.processed, 3);
    assert_eq!(second.processed, 3);

    let campaigns: Vec<(Uuid,)> = sqlx::query_as("SELECT DISTINCT campaign_id FROM messages")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(campaigns.len(), 2);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_rejected_rows_never_reach_the_store() {
    let pool = setup_test_db().await;

    let (_provider, service) = create_service();
    let csv = "phone,name\n+15550001234,Ann\nnot-a-phone,Bob\n";
    let report = service.run_campaign("Hi {name}", csv.as_bytes()).await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.row_errors.len(), 1);
    assert_eq!(report.row_errors[0].row_number, 2);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_zero_valid_contacts_is_a_request_error() {
    let _pool = setup_test_db().await;

    let (_provider, service) = create_service();
    let result = service
        .run_campaign("Hi {name}", b"phone,name\nnot-a-phone,Ann\n")
        .await;

    assert!(matches!(result, Err(CampaignError::NoValidContacts)));

    cleanup_test_db();
}
