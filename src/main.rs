use std::sync::Arc;
use std::time::Duration;

use fresh_recs::{
    config::Config,
    engine::{cache::RecommendationCache, recommend::Recommender},
    routes::create_router,
    services::{
        delivery::PlexDelivery,
        enrich::Enricher,
        providers::{plex::PlexClient, tautulli::TautulliClient, tmdb::TmdbClient},
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fresh_recs=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()?;

    let plex = Arc::new(PlexClient::new(
        http_client.clone(),
        config.plex_base_url.clone(),
        config.plex_token.clone(),
    ));
    let tmdb = Arc::new(TmdbClient::new(
        http_client.clone(),
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
    ));
    let tautulli = Arc::new(TautulliClient::new(
        http_client,
        config.tautulli_base_url.clone(),
        config.tautulli_api_key.clone(),
    ));

    let recommender = Arc::new(Recommender::new(
        plex.clone(),
        Enricher::new(tmdb),
        RecommendationCache::new(&config.cache_dir),
    ));
    let delivery = Arc::new(PlexDelivery::new(
        plex,
        config.playlist_template.clone(),
        config.home_promote,
    ));

    let state = AppState {
        recommender,
        history: tautulli,
        delivery,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "fresh-recs listening");
    axum::serve(listener, app).await?;
    Ok(())
}
