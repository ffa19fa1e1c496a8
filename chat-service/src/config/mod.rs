use crate::services::providers::gemini::GEMINI_API_BASE;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Model used when `GENAI_MODEL_NAME` is not set.
pub const DEFAULT_MODEL_NAME: &str = "gemma-3-1b-it";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub tunnel: TunnelConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// `None` leaves the session unavailable rather than failing startup.
    pub api_key: Option<Secret<String>>,
    pub model_name: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct TunnelConfig {
    pub enabled: bool,
    pub auth_token: Option<Secret<String>>,
    pub binary: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub otlp_endpoint: Option<String>,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let mut common = core_config::Config::load()?;
        if let Some(port) = first_port(&["PY_AGENT_PORT", "PORT"]) {
            common.port = port;
        }

        Ok(ChatConfig {
            common,
            google: GoogleConfig {
                api_key: first_env(&["GOOGLE_API_KEY", "VITE_GOOGLE_API_KEY"])
                    .map(|k| strip_quotes(&k).to_string())
                    .filter(|k| !k.trim().is_empty())
                    .map(Secret::new),
                model_name: env::var("GENAI_MODEL_NAME")
                    .ok()
                    .map(|m| strip_quotes(&m).to_string())
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
                api_base: get_env("GENAI_API_BASE", GEMINI_API_BASE),
            },
            tunnel: TunnelConfig {
                enabled: env::var("ENABLE_NGROK")
                    .map(|v| is_truthy(&v))
                    .unwrap_or(false),
                auth_token: env::var("NGROK_AUTH_TOKEN")
                    .ok()
                    .filter(|t| !t.trim().is_empty())
                    .map(Secret::new),
                binary: get_env("NGROK_BIN", "ngrok"),
                api_url: get_env("NGROK_API_URL", "http://127.0.0.1:4040"),
            },
            logging: LoggingConfig {
                level: get_env("LOG_LEVEL", "info"),
                otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|e| !e.is_empty()),
            },
        })
    }
}

/// Removes one pair of matching surrounding quotes, after trimming whitespace.
pub fn strip_quotes(value: &str) -> &str {
    let v = value.trim();
    if v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')))
    {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

/// `1`, `true` and `yes` in any case.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| env::var(key).ok().filter(|v| !v.is_empty()))
}

/// First of `keys` holding a valid port; unparseable values are skipped.
fn first_port(keys: &[&str]) -> Option<u16> {
    keys.iter()
        .find_map(|key| env::var(key).ok().and_then(|v| parse_port(&v)))
}

fn parse_port(value: &str) -> Option<u16> {
    value.trim().parse().ok()
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
