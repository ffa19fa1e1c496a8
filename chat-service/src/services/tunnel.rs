//! Optional public tunnel for remote testing.
//!
//! When enabled, the ngrok agent is started for the listening port and its
//! local API is polled until a public URL shows up. Nothing here can affect
//! the HTTP service: every failure is logged and swallowed by
//! [`start_tunnel_if_configured`].

use crate::config::TunnelConfig;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};

/// Environment variable the ngrok agent reads its auth token from.
const AUTH_TOKEN_ENV: &str = "NGROK_AUTHTOKEN";

const AGENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("Failed to start tunnel agent '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Tunnel agent API error: {0}")]
    Api(String),

    #[error("Tunnel agent reported no public URL")]
    NoPublicUrl,
}

/// An established tunnel. Dropping it stops the agent process, if any.
pub struct Tunnel {
    pub public_url: String,
    _agent: Option<Child>,
}

impl Tunnel {
    pub fn new(public_url: impl Into<String>, agent: Option<Child>) -> Self {
        Self {
            public_url: public_url.into(),
            _agent: agent,
        }
    }
}

/// Something that can expose a local port under a public URL.
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    async fn open(&self, port: u16, auth_token: &Secret<String>) -> Result<Tunnel, TunnelError>;
}

/// Tunnel provider backed by the ngrok agent binary.
pub struct NgrokTunnel {
    binary: String,
    api_url: String,
    startup_timeout: Duration,
    client: Client,
}

impl NgrokTunnel {
    pub fn new(config: &TunnelConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            startup_timeout: Duration::from_secs(15),
            client: Client::new(),
        }
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// `ngrok http <port>`; the token goes through the environment so it
    /// stays out of the process list.
    fn agent_command(&self, port: u16, auth_token: &Secret<String>) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("http")
            .arg(port.to_string())
            .env(AUTH_TOKEN_ENV, auth_token.expose_secret())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }

    /// Ask the agent for its tunnels and pick a public URL, preferring https.
    pub async fn fetch_public_url(&self) -> Result<String, TunnelError> {
        let response = self
            .client
            .get(format!("{}/api/tunnels", self.api_url))
            .send()
            .await
            .map_err(|e| TunnelError::Api(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TunnelError::Api(format!(
                "agent returned {}",
                response.status()
            )));
        }

        let tunnels: TunnelList = response
            .json()
            .await
            .map_err(|e| TunnelError::Api(format!("Failed to parse tunnel list: {}", e)))?;

        tunnels.public_url().ok_or(TunnelError::NoPublicUrl)
    }
}

#[async_trait]
impl TunnelProvider for NgrokTunnel {
    async fn open(&self, port: u16, auth_token: &Secret<String>) -> Result<Tunnel, TunnelError> {
        let mut agent = self
            .agent_command(port, auth_token)
            .spawn()
            .map_err(|source| TunnelError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        tracing::debug!(binary = %self.binary, port, "Started tunnel agent");

        let backoff = ExponentialBackoff {
            initial_interval: AGENT_POLL_INTERVAL,
            current_interval: AGENT_POLL_INTERVAL,
            max_elapsed_time: Some(self.startup_timeout),
            ..Default::default()
        };

        // The agent needs a moment before its API answers.
        tokio::time::sleep(AGENT_POLL_INTERVAL).await;

        let public_url = retry(backoff, || {
            let exited = agent_exited(&mut agent);
            async move {
                // A URL seen after our agent died belongs to some other agent.
                if let Some(reason) = exited {
                    return Err(backoff::Error::permanent(TunnelError::Api(reason)));
                }
                self.fetch_public_url()
                    .await
                    .map_err(backoff::Error::transient)
            }
        })
        .await?;

        if let Some(reason) = agent_exited(&mut agent) {
            return Err(TunnelError::Api(reason));
        }

        Ok(Tunnel::new(public_url, Some(agent)))
    }
}

fn agent_exited(agent: &mut Child) -> Option<String> {
    match agent.try_wait() {
        Ok(None) => None,
        Ok(Some(status)) => Some(format!("agent exited before reporting a tunnel ({})", status)),
        Err(e) => Some(format!("agent status unavailable: {}", e)),
    }
}

/// Open a tunnel when the configuration asks for one.
///
/// Returns `None` when disabled, when no auth token is set, or when the
/// provider fails. The returned [`Tunnel`] must be kept alive for as long as
/// the public URL should keep working.
pub async fn start_tunnel_if_configured(
    config: &TunnelConfig,
    provider: &dyn TunnelProvider,
    port: u16,
) -> Option<Tunnel> {
    if !config.enabled {
        tracing::info!("Tunnel disabled; set ENABLE_NGROK=true to enable");
        return None;
    }

    let Some(token) = config.auth_token.as_ref() else {
        tracing::warn!("NGROK_AUTH_TOKEN not set; skipping tunnel");
        return None;
    };

    match provider.open(port, token).await {
        Ok(tunnel) => {
            tracing::info!(public_url = %tunnel.public_url, port, "Tunnel established");
            Some(tunnel)
        }
        Err(e) => {
            tracing::error!(error = %e, port, "Failed to establish tunnel");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<TunnelInfo>,
}

#[derive(Debug, Deserialize)]
struct TunnelInfo {
    public_url: String,
    #[serde(default)]
    proto: String,
}

impl TunnelList {
    fn public_url(self) -> Option<String> {
        let mut tunnels = self.tunnels;
        tunnels.sort_by_key(|t| t.proto != "https");
        tunnels.into_iter().next().map(|t| t.public_url)
    }
}
