//! Short-lived local HTTP listener receiving the OAuth redirect.
//!
//! The `/callback` handler forwards the outcome through a one-shot channel;
//! the login flow awaits it with a timeout and then stops the server.
use anyhow::{anyhow, bail, Context, Result};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Outcome = std::result::Result<String, String>;

#[derive(Clone)]
struct CallbackState {
    expected_state: String,
    tx: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

pub struct CallbackListener {
    addr: SocketAddr,
    rx: oneshot::Receiver<Outcome>,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind `addr` (e.g. "127.0.0.1:8080") and start serving `/callback`.
    /// Only a redirect carrying `expected_state` is accepted.
    pub async fn bind(addr: &str, expected_state: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind callback listener on {}", addr))?;
        let local = listener.local_addr()?;

        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let state = CallbackState {
            expected_state: expected_state.to_string(),
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        let app = Router::new()
            .route("/callback", get(callback))
            .with_state(state);

        let handle = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                warn!("callback listener stopped with error: {}", e);
            }
        });

        debug!("OAuth callback listener on {}", local);
        Ok(Self {
            addr: local,
            rx,
            shutdown: shutdown_tx,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the redirect, then shut the listener down. Fails on timeout,
    /// on a state mismatch, or when the redirect carries no code.
    pub async fn wait_for_code(self, timeout: Duration) -> Result<String> {
        let CallbackListener {
            rx,
            shutdown,
            handle,
            ..
        } = self;

        let received = tokio::time::timeout(timeout, rx).await;

        let _ = shutdown.send(());
        if tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .is_err()
        {
            warn!("callback listener did not stop within 5s");
        }

        match received {
            Err(_) => bail!("authentication timeout after {}s", timeout.as_secs()),
            Ok(Err(_)) => bail!("callback listener closed before a code arrived"),
            Ok(Ok(outcome)) => outcome.map_err(|msg| anyhow!("callback error: {}", msg)),
        }
    }
}

async fn callback(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<CallbackState>,
) -> Html<&'static str> {
    let outcome = if let Some(err) = params.get("error") {
        let desc = params.get("error_description").cloned().unwrap_or_default();
        Err(format!("{} {}", err, desc).trim().to_string())
    } else if params.get("state").map(String::as_str) != Some(state.expected_state.as_str()) {
        Err("state mismatch in callback".to_string())
    } else {
        match params.get("code").filter(|c| !c.is_empty()) {
            Some(code) => Ok(code.clone()),
            None => Err("no code in callback".to_string()),
        }
    };

    let ok = outcome.is_ok();
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(outcome);
    }

    if ok {
        Html("<h2>Authentication successful!</h2><p>You can close this window.</p>")
    } else {
        Html("<h4>Authentication failed.</h4><p>Check the terminal for details.</p>")
    }
}
