use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::RoutingMode;

pub const DEFAULT_IDLE_TTL_S: u64 = 3600;
pub const DEFAULT_TIME_WASTER_THRESHOLD: f64 = 7.0;
pub const DEFAULT_MAX_AI_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_SALES_ATTEMPTS: u32 = 5;
pub const DEFAULT_AI_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_EVICTION_INTERVAL_S: u64 = 60;
pub const DEFAULT_SEND_TIMEOUT_S: u64 = 30;
pub const DEFAULT_SEND_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MAX_INFLIGHT_PER_CHANNEL: usize = 1000;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Top-level config (router.toml + ROUTER_* env overrides), following the
/// layered figment setup used throughout the rest of this workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub routing: RoutingRulesConfig,
    #[serde(default)]
    pub channels: ChannelCredentials,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub send: SendConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            routing: RoutingRulesConfig::default(),
            channels: ChannelCredentials::default(),
            queue: QueueConfig::default(),
            send: SendConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl RoutingConfig {
    /// Load config from a TOML file with `ROUTER_*` env var overrides.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RoutingConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ROUTER_").split("_"))
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.routing-engine/router.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_max_inflight")]
    pub max_inflight_per_channel: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_inflight_per_channel: default_max_inflight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRulesConfig {
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_s: u64,
    #[serde(default = "default_time_waster_threshold")]
    pub time_waster_threshold: f64,
    #[serde(default = "default_max_ai_attempts")]
    pub max_ai_attempts: u32,
    #[serde(default = "default_max_sales_attempts")]
    pub max_sales_attempts: u32,
    #[serde(default = "default_ai_confidence_threshold")]
    pub ai_confidence_threshold: f64,
    #[serde(default)]
    pub routing_mode_default: RoutingMode,
    #[serde(default = "default_vip_keywords")]
    pub vip_keywords: Vec<String>,
}

impl Default for RoutingRulesConfig {
    fn default() -> Self {
        Self {
            idle_ttl_s: default_idle_ttl(),
            time_waster_threshold: default_time_waster_threshold(),
            max_ai_attempts: default_max_ai_attempts(),
            max_sales_attempts: default_max_sales_attempts(),
            ai_confidence_threshold: default_ai_confidence_threshold(),
            routing_mode_default: RoutingMode::default(),
            vip_keywords: default_vip_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelCredentials {
    pub whatsapp: Option<WhatsAppCredentials>,
    pub telegram: Option<TelegramCredentials>,
    pub facebook: Option<MessengerCredentials>,
    pub instagram: Option<InstagramCredentials>,
    pub webchat: Option<WebChatCredentials>,
    pub sms: Option<SmsCredentials>,
    pub email: Option<EmailCredentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WhatsAppCredentials {
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default)]
    pub verify_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelegramCredentials {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub secret_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessengerCredentials {
    #[serde(default)]
    pub page_access_token: String,
    #[serde(default)]
    pub app_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InstagramCredentials {
    #[serde(default)]
    pub ig_account_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub app_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebChatCredentials {
    #[serde(default)]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmsCredentials {
    #[serde(default)]
    pub from_number: String,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default)]
    pub shared_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmailCredentials {
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub bearer_token: String,
    #[serde(default)]
    pub send_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_s: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            eviction_interval_s: default_eviction_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendConfig {
    #[serde(default = "default_send_timeout")]
    pub timeout_s: u64,
    #[serde(default = "default_send_max_retries")]
    pub max_retries: u32,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            timeout_s: default_send_timeout(),
            max_retries: default_send_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}
fn default_max_inflight() -> usize {
    DEFAULT_MAX_INFLIGHT_PER_CHANNEL
}
fn default_idle_ttl() -> u64 {
    DEFAULT_IDLE_TTL_S
}
fn default_time_waster_threshold() -> f64 {
    DEFAULT_TIME_WASTER_THRESHOLD
}
fn default_max_ai_attempts() -> u32 {
    DEFAULT_MAX_AI_ATTEMPTS
}
fn default_max_sales_attempts() -> u32 {
    DEFAULT_MAX_SALES_ATTEMPTS
}
fn default_ai_confidence_threshold() -> f64 {
    DEFAULT_AI_CONFIDENCE_THRESHOLD
}
fn default_vip_keywords() -> Vec<String> {
    vec![
        "vip".to_string(),
        "premium".to_string(),
        "ejecutivo".to_string(),
        "corporate".to_string(),
    ]
}
fn default_eviction_interval() -> u64 {
    DEFAULT_EVICTION_INTERVAL_S
}
fn default_send_timeout() -> u64 {
    DEFAULT_SEND_TIMEOUT_S
}
fn default_send_max_retries() -> u32 {
    DEFAULT_SEND_MAX_RETRIES
}
fn default_log_level() -> String {
    "info".to_string()
}
