//! Test helpers for integration tests
//!
//! Spawns a gateway on an ephemeral port backed by a `MemoryStore`, and wraps a
//! tungstenite client for reading typed frames off the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use relay_common::{AppError, HubConfig, JwtService};
use relay_core::UserId;
use relay_gateway::{serve, GatewayState, Hub};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::fixtures::MemoryStore;

pub const TEST_SECRET: &str = "integration-test-secret";

/// How long a test waits for an expected frame
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(3);

/// Gateway running on 127.0.0.1 with an ephemeral port
pub struct TestServer {
    pub addr: SocketAddr,
    pub hub: Hub,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
    jwt: JwtService,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), AppError>>,
}

impl TestServer {
    pub async fn start(store: Arc<MemoryStore>) -> Result<Self> {
        Self::start_with_config(store, HubConfig::default()).await
    }

    pub async fn start_with_config(store: Arc<MemoryStore>, config: HubConfig) -> Result<Self> {
        let jwt = JwtService::new(TEST_SECRET, 3600);
        let hub = Hub::start(store.clone(), &config);
        let state = GatewayState::new(hub.clone(), jwt.clone(), &config);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(
            listener,
            state,
            async move {
                let _ = shutdown_rx.await;
            },
            Duration::from_secs(2),
        ));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            addr,
            hub,
            store,
            client,
            jwt,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `/ws` URL without credentials
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn ws_url_with_token(&self, token: &str) -> String {
        format!("{}?token={token}", self.ws_url())
    }

    pub fn token_for(&self, user_id: i64) -> Result<String> {
        Ok(self.jwt.issue_access_token(UserId::new(user_id))?)
    }

    /// Connect `user_id` with a query token and wait until the hub has registered it
    pub async fn connect(&self, user_id: i64) -> Result<WsClient> {
        let before = self.hub.session_count(UserId::new(user_id)).await;
        let client = WsClient::connect(&self.ws_url_with_token(&self.token_for(user_id)?)).await?;
        self.wait_for_sessions(user_id, before + 1).await?;
        Ok(client)
    }

    /// Poll the hub until `user_id` has exactly `count` sessions
    pub async fn wait_for_sessions(&self, user_id: i64, count: usize) -> Result<()> {
        let user_id = UserId::new(user_id);
        let poll = async {
            while self.hub.session_count(user_id).await != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(FRAME_TIMEOUT, poll)
            .await
            .map_err(|_| anyhow!("user {user_id} never reached {count} sessions"))
    }

    /// Trigger graceful shutdown and wait for `serve` to return
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.handle).await???;
        Ok(())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// WebSocket client speaking the gateway's JSON frames
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let (stream, _response) = connect_async(url).await?;
        Ok(Self { stream })
    }

    /// Connect with `Authorization: Bearer <token>` instead of a query parameter
    pub async fn connect_with_bearer(url: &str, token: &str) -> Result<Self> {
        let mut request = url.into_client_request()?;
        request
            .headers_mut()
            .insert("Authorization", HeaderValue::from_str(&format!("Bearer {token}"))?);
        let (stream, _response) = connect_async(request).await?;
        Ok(Self { stream })
    }

    pub async fn send_json(&mut self, value: &Value) -> Result<()> {
        self.stream.send(Message::Text(value.to_string())).await?;
        Ok(())
    }

    /// Next JSON frame, or `None` once the server closes
    async fn next_json(&mut self) -> Result<Option<Value>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(&text)?)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Wait for the next frame whose `type` is `kind`, skipping any other frames
    pub async fn next_of(&mut self, kind: &str) -> Result<Value> {
        let wait = async {
            loop {
                match self.next_json().await? {
                    Some(value) if value["type"] == kind => return Ok(value),
                    Some(_) => continue,
                    None => bail!("connection closed while waiting for {kind}"),
                }
            }
        };
        tokio::time::timeout(FRAME_TIMEOUT, wait)
            .await
            .map_err(|_| anyhow!("timed out waiting for {kind}"))?
    }

    /// Fail if a frame of `kind` arrives within `window`
    pub async fn expect_no(&mut self, kind: &str, window: Duration) -> Result<()> {
        let watch = async {
            loop {
                match self.next_json().await? {
                    Some(value) if value["type"] == kind => bail!("unexpected {kind}: {value}"),
                    Some(_) => continue,
                    None => return Ok(()),
                }
            }
        };
        match tokio::time::timeout(window, watch).await {
            Ok(result) => result,
            Err(_) => Ok(()),
        }
    }

    /// Read until the server's close frame and return its code
    pub async fn closed(&mut self) -> Result<Option<CloseCode>> {
        let wait = async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| f.code)),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(anyhow::Error::from(e)),
                    None => return Ok(None),
                }
            }
        };
        tokio::time::timeout(FRAME_TIMEOUT, wait)
            .await
            .map_err(|_| anyhow!("timed out waiting for close"))?
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
