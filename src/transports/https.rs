// src/transports/https.rs
// HTTP/WS front door: the garden WebSocket, the save relay, health, stats and static assets.

use anyhow::Result;
use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::WebSocketUpgrade,
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::assets::AssetLoader;
use crate::config::{GardenConfig, ServerConfig};
use crate::game::SessionRegistry;
use crate::persistence::relay::RelayResponse;
use crate::persistence::{PersistenceError, ShoppingListDocument, ShoppingListStore};

use super::session::{ws_loop, SessionDriver};

/// Shared handles every request sees
#[derive(Clone)]
pub struct AppState {
    pub garden: Arc<GardenConfig>,
    /// Where sessions send their saves (direct or relayed)
    pub store: Arc<dyn ShoppingListStore>,
    /// What the relay endpoint commits with; always the direct GitHub backend
    pub relay_store: Arc<dyn ShoppingListStore>,
    pub assets: Arc<dyn AssetLoader>,
    pub registry: SessionRegistry,
}

/* ------------------------------- serve() -------------------------------- */

pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    // Socket tuning (keepalive, reuseaddr)
    let listener = tuned_listener(addr)?;

    info!(assets = %config.assets_dir.display(), "HTTP/WS listening on http://{addr}");

    let app = router(state, &config.assets_dir);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/* ------------------------------- router() ------------------------------- */

pub fn router(state: AppState, assets_dir: &Path) -> Router {
    // bring trait for .and() on compression predicates
    use tower_http::compression::Predicate as _;

    let max_inflight: usize = num_cpus::get().max(1) * 1024;

    // Compress only when default rules allow AND body > 1 KiB
    let compression = tower_http::compression::CompressionLayer::new().compress_when(
        tower_http::compression::predicate::DefaultPredicate::new()
            .and(tower_http::compression::predicate::SizeAbove::new(1024)),
    );

    let middleware = tower::ServiceBuilder::new()
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
            ),
        )
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(compression)
        // Handle errors from fallible middleware BEFORE applying them
        .layer(axum::error_handling::HandleErrorLayer::new(middleware_error))
        // Outbound GitHub calls time out at 10s; leave room for both round trips
        .timeout(Duration::from_secs(25))
        .concurrency_limit(max_inflight)
        .load_shed()
        .layer(tower_http::limit::RequestBodyLimitLayer::new(1024 * 1024));

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/ws", get(ws_upgrade))
        .route(
            "/api/save-shopping-list",
            post(save_shopping_list).fallback(method_not_allowed),
        )
        .fallback_service(ServeDir::new(assets_dir))
        .with_state(state)
        .layer(middleware)
}

/// Errors from the fallible layers, in the same `{success, error}` shape the relay answers with
async fn middleware_error(err: tower::BoxError) -> axum::response::Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        relay_error(StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else if err.is::<tower::load_shed::error::Overloaded>() {
        relay_error(StatusCode::SERVICE_UNAVAILABLE, "service overloaded".to_string())
    } else {
        warn!(error = %err, "middleware error");
        relay_error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
    }
}

/* ------------------------------- Handlers ------------------------------- */

async fn health() -> impl IntoResponse {
    "OK"
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.stats())
}

/// Relay function: commit a client's shopping list with the server-held token
async fn save_shopping_list(
    State(state): State<AppState>,
    payload: Result<Json<ShoppingListDocument>, JsonRejection>,
) -> impl IntoResponse {
    let Json(document) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            debug!(error = %rejection, "Relay request body rejected");
            return relay_error(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    match state.relay_store.save(&document).await {
        Ok(receipt) => {
            info!(commit = %receipt.commit, total = document.total, "Relay committed shopping list");
            let body = RelayResponse {
                success: true,
                message: Some(receipt.message),
                commit: Some(receipt.commit),
                error: None,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            match &e {
                PersistenceError::Auth(_) => error!("Relay has no usable GitHub token"),
                _ => warn!(error = %e, "Relay failed to commit shopping list"),
            }
            relay_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn method_not_allowed() -> impl IntoResponse {
    relay_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
}

fn relay_error(status: StatusCode, message: String) -> axum::response::Response {
    let body = RelayResponse {
        success: false,
        error: Some(message),
        ..Default::default()
    };
    (status, Json(body)).into_response()
}

/* ---------------------------- WebSocket path ---------------------------- */

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    debug!("Garden WebSocket upgrade requested");

    ws.max_message_size(64 * 1024)
        .max_frame_size(64 * 1024)
        .on_upgrade(move |socket| async move {
            let (driver, events) = SessionDriver::new(state.garden, state.store, state.registry);
            ws_loop(socket, driver, events, state.assets).await
        })
}

/* ----------------------------- Socket tuning ---------------------------- */

fn tuned_listener(addr: SocketAddr) -> Result<TcpListener> {
    use socket2::{Domain, Protocol, Socket, Type};
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // Reuseaddr to speed restarts
    socket.set_reuse_address(true)?;
    socket.set_keepalive(true)?;
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        use socket2::TcpKeepalive;
        let ka = TcpKeepalive::new()
            .with_time(Duration::from_secs(30))
            .with_interval(Duration::from_secs(10));
        let _ = socket.set_tcp_keepalive(&ka);
    }

    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    let std_listener = std::net::TcpListener::from(socket);
    std_listener.set_nonblocking(true)?;
    // TCP_NODELAY is set per-connection by hyper/axum
    Ok(TcpListener::from_std(std_listener)?)
}

/* ----------------------------- Shutdown hook ---------------------------- */

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::FsAssetLoader;
    use crate::persistence::github::tests::sample_document;
    use crate::persistence::testing::MockStore;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Request};
    use http_body_util::BodyExt;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn scratch_assets() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("veggie-garden-https-{}", ulid::Ulid::new()));
        std::fs::create_dir_all(dir.join("models")).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>garden</h1>").unwrap();
        dir
    }

    fn app(relay_store: Arc<MockStore>, dir: &Path) -> Router {
        let state = AppState {
            garden: Arc::new(GardenConfig::default()),
            store: Arc::new(MockStore::succeeding("unused")),
            relay_store,
            assets: Arc::new(FsAssetLoader::new(dir)),
            registry: SessionRegistry::default(),
        };
        router(state, dir)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/save-shopping-list")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = scratch_assets();
        let response = app(Arc::new(MockStore::succeeding("x")), &dir)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_relay_success_returns_commit() {
        let dir = scratch_assets();
        let store = Arc::new(MockStore::succeeding("cafe123"));
        let body = serde_json::to_string(&sample_document()).unwrap();

        let response = app(store.clone(), &dir).oneshot(post_json(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["commit"], "cafe123");
        assert_eq!(json["message"], "Shopping list saved");
        assert_eq!(store.calls(), 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_relay_without_token_is_500() {
        let dir = scratch_assets();
        let store = Arc::new(MockStore::failing(PersistenceError::Auth(
            "GitHub token not configured".to_string(),
        )));
        let body = serde_json::to_string(&sample_document()).unwrap();

        let response = app(store, &dir).oneshot(post_json(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "GitHub token not configured");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_relay_rejects_bad_body_and_wrong_method() {
        let dir = scratch_assets();
        let store = Arc::new(MockStore::succeeding("x"));

        let response = app(store.clone(), &dir)
            .oneshot(post_json("{\"vegetables\":".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);

        let response = app(store.clone(), &dir)
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/save-shopping-list")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await["error"], "Method not allowed");
        assert_eq!(store.calls(), 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_middleware_errors_are_json() {
        let response = middleware_error(Box::new(tower::timeout::error::Elapsed::new())).await;
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "request timed out");

        let response = middleware_error(Box::new(tower::load_shed::error::Overloaded::new())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["error"], "service overloaded");
    }

    #[tokio::test]
    async fn test_stats_and_static_files() {
        let dir = scratch_assets();

        let response = app(Arc::new(MockStore::succeeding("x")), &dir)
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["sessions"], 0);

        let response = app(Arc::new(MockStore::succeeding("x")), &dir)
            .oneshot(Request::builder().uri("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"<h1>garden</h1>");
        let _ = std::fs::remove_dir_all(dir);
    }
}
