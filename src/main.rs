mod api;
mod data;
mod db;
mod error;
mod ledger;
mod level;
mod missions;
mod models;
mod srs;
mod study;

use api::ApiState;
use db::Db;
use study::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://medtrack.db?mode=rwc".to_string());
    let db = Db::connect(&database_url).await?;

    let engine = Engine::new(db);
    let router = api::app_router(ApiState { engine });

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("medtrack listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}
