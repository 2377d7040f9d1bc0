use axum::routing::{get, post};
use axum::Router;
use socketioxide::SocketIo;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod models;
mod routes;
mod schema;
mod services;
mod socket;

use config::AppConfig;
use tara_shared::clients::db::{create_pool, DbPool};
use tara_shared::clients::push::PushClient;
use tara_shared::clients::storage::StorageClient;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub storage: StorageClient,
    pub push: PushClient,
    pub io: SocketIo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tara_shared::middleware::init_tracing("tara-api");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url);

    let storage = StorageClient::new(
        &config.storage_endpoint,
        &config.storage_access_key,
        &config.storage_secret_key,
        &config.storage_bucket,
    )
    .await;

    let push = PushClient::new(&config.fcm_endpoint, &config.fcm_server_key);

    // Build Socket.IO layer - we need io in AppState for emitting from REST routes
    let (sio_layer, io) = SocketIo::builder().build_layer();

    let state = Arc::new(AppState { db, config, storage, push, io: io.clone() });

    // Configure the Socket.IO namespace with state via closure
    io.ns("/", {
        let state = state.clone();
        move |socket: socketioxide::extract::SocketRef| {
            let state = state.clone();
            async move {
                socket::handlers::on_connect_with_state(socket, state).await;
            }
        }
    });

    // Scheduled jobs: quest generation at midnight, score sweep just after
    services::jobs::spawn_quest_generation_task(state.clone());
    services::jobs::spawn_score_sweep_task(state.clone());

    let app = Router::new()
        // Health
        .route("/health", get(routes::health::health_check))
        // Pairing
        .route("/register", post(routes::register::register))
        .route("/login", post(routes::login::login))
        // Chat history
        .route("/messages/:cpin", get(routes::messages::list_messages))
        // Gallery / media
        .route("/gallery/upload-request", post(routes::gallery::upload_request))
        .route("/gallery/confirm", post(routes::gallery::confirm_upload))
        .route("/gallery/view", post(routes::gallery::view_media))
        .route("/gallery/consume", post(routes::gallery::consume_media))
        .route("/gallery/:cpin", get(routes::gallery::list_gallery))
        // Love / quests
        .route("/love/interact", post(routes::love::interact))
        .route("/love/state/:cpin", get(routes::love::get_state))
        .route("/love/quests/:cpin", get(routes::love::list_quests))
        .route("/love/quest/complete", post(routes::love::complete_quest))
        .route("/love/quest/approve", post(routes::love::approve_quest))
        .route("/love/fcm", post(routes::love::register_fcm))
        // Location
        .route("/map/update", post(routes::map::update_location))
        .route("/map/:cpin", get(routes::map::get_locations))
        // Profiles
        .route("/profile/couple/:cpin/:phone", get(routes::profile::get_couple_profile))
        .route("/profile/update", post(routes::profile::update_profile))
        .route("/profile/remove-photo", post(routes::profile::remove_photo))
        .layer(sio_layer)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "tara-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
