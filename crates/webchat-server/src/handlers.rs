//! HTTP and WebSocket handlers for the chat server.
//!
//! Serves the home page, upgrades WebSocket requests into hub connections
//! and reports hub health.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        ConnectInfo, Host, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, MethodRouter},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};
use webchat_core::{chat, CallbackRegistry, HubHandle, HubRunner};
use webchat_transport::{run_connection, PumpConfig};

/// Built-in home page, used when no `home_page` is configured.
const DEFAULT_HOME_PAGE: &str = include_str!("../static/home.html");

/// Shared server state.
pub struct AppState {
    /// Handle to the running hub.
    pub hub: HubHandle,
    /// Server configuration.
    pub config: Config,
    /// Per-connection pump settings.
    pub pump: PumpConfig,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config, hub: HubHandle) -> Self {
        let pump = config.pump_config();
        Self { hub, config, pump }
    }
}

/// Spawn the hub loop with the chat behavior installed.
pub fn start_hub(config: &Config) -> HubHandle {
    let mut callbacks = CallbackRegistry::new();
    chat::install(&mut callbacks);

    let (runner, hub) = HubRunner::new(config.hub_config(), callbacks);
    tokio::spawn(runner.run());
    hub
}

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let config = &state.config;
    let mut app = Router::new()
        .route("/", home_route(config.websocket_path.clone()))
        .route(&config.websocket_path, get(ws_handler))
        .route("/health", get(health_handler));

    if let Some(alias_ws) = config.alias_websocket_path() {
        let alias = config.alias.trim_end_matches('/');
        app = app
            .route(alias, home_route(alias_ws.clone()))
            .route(&alias_ws, get(ws_handler));
    }

    app.with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the listen address is invalid or the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let hub = start_hub(&config);
    metrics::spawn_hub_stats_exporter(hub.subscribe_stats());

    let addr = config.bind_addr()?;
    let state = Arc::new(AppState::new(config.clone(), hub));
    let app = build_router(state);

    // Bind and serve
    let listener = TcpListener::bind(addr).await?;

    info!("Chat server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}{}", addr, config.websocket_path);
    if let Some(alias_ws) = config.alias_websocket_path() {
        info!("WebSocket alias: ws://{}{}", addr, alias_ws);
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn home_route(ws_path: String) -> MethodRouter<Arc<AppState>> {
    get(
        move |Host(host): Host, State(state): State<Arc<AppState>>| async move {
            home_handler(&state, &host, &ws_path).await
        },
    )
}

/// Render the home page for the requesting host.
async fn home_handler(
    state: &AppState,
    host: &str,
    ws_path: &str,
) -> Result<Html<String>, (StatusCode, &'static str)> {
    let template = match &state.config.home_page {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(page) => page,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read home page");
                return Err((StatusCode::INTERNAL_SERVER_ERROR, "home page unavailable"));
            }
        },
        None => DEFAULT_HOME_PAGE.to_string(),
    };

    Ok(Html(render_home(&template, host, ws_path)))
}

fn render_home(template: &str, host: &str, ws_path: &str) -> String {
    template
        .replace("{{host}}", host)
        .replace("{{ws_path}}", ws_path)
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "hub": state.hub.stats(),
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.max_message_size(state.pump.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, remote, state))
}

/// Drive one upgraded WebSocket until it closes.
async fn handle_websocket(socket: WebSocket, remote: SocketAddr, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    debug!(%remote, "WebSocket connected");
    run_connection(
        state.hub.clone(),
        socket,
        Some(remote.to_string()),
        state.pump.clone(),
    )
    .await;
    debug!(%remote, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn spawn_app(config: Config) -> (SocketAddr, HubHandle) {
        let hub = start_hub(&config);
        let state = Arc::new(AppState::new(config, hub.clone()));
        let app = build_router(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        (addr, hub)
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: chat.example:8080\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn connect(addr: SocketAddr, path: &str, hub: &HubHandle) -> Client {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}{}", addr, path))
            .await
            .unwrap();

        let mut stats = hub.subscribe_stats();
        tokio::time::timeout(
            Duration::from_secs(5),
            stats.wait_for(|s| s.connections == 1),
        )
        .await
        .unwrap()
        .unwrap();
        ws
    }

    async fn next_json(ws: &mut Client) -> serde_json::Value {
        let text = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match ws.next().await {
                    Some(Ok(WsMessage::Text(text))) => break text,
                    Some(Ok(_)) => continue,
                    other => panic!("connection ended: {:?}", other),
                }
            }
        })
        .await
        .unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[test]
    fn test_render_home() {
        let page = render_home(
            "<a href=\"http://{{host}}/\">ws://{{host}}{{ws_path}}</a>",
            "localhost:8080",
            "/chat/ws",
        );
        assert_eq!(
            page,
            "<a href=\"http://localhost:8080/\">ws://localhost:8080/chat/ws</a>"
        );
    }

    #[test]
    fn test_default_home_page_has_placeholders() {
        assert!(DEFAULT_HOME_PAGE.contains("{{host}}"));
        assert!(DEFAULT_HOME_PAGE.contains("{{ws_path}}"));
    }

    #[tokio::test]
    async fn test_home_page_substitutes_host() {
        let (addr, _hub) = spawn_app(Config::default()).await;

        let response = http_get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("chat.example:8080"));
        assert!(!response.contains("{{host}}"));

        let aliased = http_get(addr, "/chat").await;
        assert!(aliased.starts_with("HTTP/1.1 200"));
        assert!(aliased.contains("/chat/ws"));
    }

    #[tokio::test]
    async fn test_missing_home_page_file() {
        let config = Config {
            home_page: Some("/nonexistent/webchat/home.html".into()),
            ..Config::default()
        };
        let (addr, _hub) = spawn_app(config).await;

        let response = http_get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 500"));
    }

    #[tokio::test]
    async fn test_health_reports_hub_stats() {
        let (addr, _hub) = spawn_app(Config::default()).await;

        let response = http_get(addr, "/health").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("\"status\":\"ok\""));
        assert!(response.contains("\"connections\":0"));
    }

    #[tokio::test]
    async fn test_websocket_chat_over_alias() {
        let (addr, hub) = spawn_app(Config::default()).await;
        let mut ws = connect(addr, "/chat/ws", &hub).await;

        ws.send(WsMessage::Text(r#"{"op":2,"message":"hi"}"#.into()))
            .await
            .unwrap();

        let envelope = next_json(&mut ws).await;
        assert_eq!(envelope["op"], 2);
        assert_eq!(envelope["message"], "hi");
    }

    #[test]
    fn test_home_page_frames_carry_nick() {
        assert!(DEFAULT_HOME_PAGE.contains("JSON.stringify({ op: op, from: nick, message: text })"));
        assert!(DEFAULT_HOME_PAGE.contains("send(OP_NICK, \"\")"));
    }

    #[tokio::test]
    async fn test_home_page_nick_then_chat() {
        let (addr, hub) = spawn_app(Config::default()).await;
        let mut ws = connect(addr, "/ws", &hub).await;

        // Frames exactly as the built-in page serializes them.
        ws.send(WsMessage::Text(r#"{"op":5,"from":"ann","message":""}"#.into()))
            .await
            .unwrap();
        ws.send(WsMessage::Text(r#"{"op":2,"from":"ann","message":"hi"}"#.into()))
            .await
            .unwrap();

        let notice = next_json(&mut ws).await;
        assert_eq!(notice["op"], 3);
        assert_eq!(notice["message"], "ann has joined");

        let chat = next_json(&mut ws).await;
        assert_eq!(chat["op"], 2);
        assert_eq!(chat["from"], "ann");
        assert_eq!(chat["message"], "hi");
    }
}
