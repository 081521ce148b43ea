use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use rally_api::{AppState, AppStateInner, campaigns, donations};
use rally_core::{CampaignService, DonationService, LedgerCaches, SummaryService};
use rally_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rally=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("RALLY_DB_PATH").unwrap_or_else(|_| "rally.db".into());
    let host = std::env::var("RALLY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("RALLY_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database and services
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);
    let caches = Arc::new(LedgerCaches::new());
    let summaries = SummaryService::new(db.clone(), caches.clone());
    let state: AppState = Arc::new(AppStateInner {
        campaigns: CampaignService::new(db.clone(), caches.clone()),
        donations: DonationService::new(db.clone(), caches, summaries.clone()),
        summaries,
    });

    // Routes
    let app = Router::new()
        .route("/campaigns", post(campaigns::create_campaign))
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns/by-slug/{slug}", get(campaigns::get_campaign))
        .route("/campaigns/{id}", patch(campaigns::update_campaign))
        .route("/campaigns/{id}", delete(campaigns::delete_campaign))
        .route("/campaigns/{id}/donations", post(donations::record_donation))
        .route("/campaigns/{id}/donations", get(donations::list_campaign_donations))
        .route("/campaigns/{id}/summary", get(donations::campaign_summary))
        .route("/wallets/{wallet}/donations", get(donations::list_wallet_donations))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Rally server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
