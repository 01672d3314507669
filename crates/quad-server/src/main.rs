use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use quad_api::auth::{self, AppStateInner};
use quad_api::middleware::require_auth;
use quad_api::{comments, posts, votes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quad=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("QUAD_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("QUAD_DB_PATH").unwrap_or_else(|_| "quad.db".into());
    let host = std::env::var("QUAD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("QUAD_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(quad_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let state = AppStateInner::new(db, jwt_secret);

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/session", get(auth::session))
        .route("/profile", post(auth::complete_profile))
        .route("/posts", get(posts::list_posts))
        .route("/posts", post(posts::create_post))
        .route("/posts/{post_id}", get(posts::get_post))
        .route("/posts/{post_id}/vote", post(votes::toggle_vote))
        .route("/posts/{post_id}/comments", get(comments::get_comments))
        .route("/posts/{post_id}/comments", post(comments::post_comment))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Quad server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
