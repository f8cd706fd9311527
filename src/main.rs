//! Bulk SMS campaign server
//!
//! Upload a contact CSV plus a message template, dispatch one personalized
//! SMS per contact, and watch delivery status through the monitoring
//! endpoints.

use sms_campaign_api::api;
use sms_campaign_api::core::gateway::HttpSmsGateway;
use sms_campaign_api::core::services::{DispatchConfig, MyCampaignService};
use sms_campaign_api::infrastructure::database::DatabaseConnection;
use sms_campaign_api::infrastructure::repositories::DbMessageRepository;

use axum::http::{HeaderValue, Method};
use axum::response::Html;
use axum::{Router, routing::get};
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use log::info;
use tokio::runtime::{Builder, Runtime};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt::init();

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(web_server_task());

    Ok(())
}

async fn web_server_task() {
    let provider = ServiceCollection::new()
        .add(DatabaseConnection::singleton())
        .add(DispatchConfig::singleton())
        .add(HttpSmsGateway::singleton())
        .add(DbMessageRepository::scoped())
        .add(MyCampaignService::scoped())
        .build_provider()
        .unwrap();

    // The store schema is owned by the migrations; apply them before
    // accepting uploads.
    let database = provider.get_required::<DatabaseConnection>();
    sqlx::migrate!()
        .run(&**database)
        .await
        .expect("failed to run database migrations");

    // build our application with a route
    let app = Router::new()
        .route("/", get(index))
        .nest_service(
            "/static",
            ServiceBuilder::new().service(ServeDir::new("static")),
        )
        .merge(api::upload::router())
        .merge(api::monitoring::router())
        .layer(
            CorsLayer::new()
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_origin([
                    "http://localhost:3000".parse::<HeaderValue>().unwrap(),
                    "http://localhost:5173".parse::<HeaderValue>().unwrap(),
                ]),
        )
        .with_provider(provider);

    // run our app with hyper, listening globally on port 3000
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
    info!("Shutting down...");
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}
