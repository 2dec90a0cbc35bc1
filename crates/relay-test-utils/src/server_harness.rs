//! Test server harness for E2E testing
//!
//! Provides `TestRelayServer` for spawning real relay instances in tests.

use signal_relay::config::Config;
use signal_relay::observability::HealthState;
use signal_relay::routes::{self, AppState};
use signal_relay::signaling::Hub;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning Signal Relay in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_e2e() -> Result<()> {
///     let server = TestRelayServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/api/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     assert_eq!(response.text().await?, "OK");
///     Ok(())
/// }
/// ```
pub struct TestRelayServer {
    addr: SocketAddr,
    hub: Arc<Hub>,
    health: Arc<HealthState>,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestRelayServer {
    /// Spawn a relay with default configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(HashMap::new()).await
    }

    /// Spawn a relay with extra `RELAY_*` variables.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background, marked ready
    pub async fn spawn_with(overrides: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("RELAY_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "RELAY_STATIC_DIR".to_string(),
                std::env::temp_dir().to_string_lossy().into_owned(),
            ),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let hub = Arc::new(Hub::new(config.room_queue_capacity));
        let health = Arc::new(HealthState::new());
        let state = Arc::new(AppState {
            hub: Arc::clone(&hub),
            config: config.clone(),
            health: Arc::clone(&health),
        });

        // Build routes using the relay's real route builder
        let app = routes::build_routes(state, None);

        let listener = tokio::net::TcpListener::bind(&config.bind_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            // The upgrade handler extracts the peer address
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });
        health.set_ready();

        Ok(Self {
            addr,
            hub,
            health,
            config,
            _handle: handle,
        })
    }

    /// Base HTTP URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL of the upgrade endpoint with `query` appended.
    pub fn ws_url(&self, query: &str) -> String {
        if query.is_empty() {
            format!("ws://{}/ws", self.addr)
        } else {
            format!("ws://{}/ws?{}", self.addr, query)
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The server's hub, for inspecting rooms directly.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn health(&self) -> &Arc<HealthState> {
        &self.health
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestRelayServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
