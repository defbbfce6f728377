/// 配置管理

use anyhow::Context;
use common::models::constants::*;
use common::utils::{stream_endpoint, to_stream_base};
use common::{Error, Result};
use std::str::FromStr;
use std::time::Duration;

use crate::ws::{ConnectionOptions, ReconnectPolicy};

/// 会话身份，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub session_id: String,
    pub credential: String,
}

/// 时间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub heartbeat_interval: Duration,
    pub poll_interval: Duration,
    pub reconnect_base: Duration,
    pub reconnect_cap: Duration,
    pub max_reconnect_attempts: u32,
    pub request_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
            reconnect_base: Duration::from_secs(DEFAULT_RECONNECT_BASE),
            reconnect_cap: Duration::from_secs(DEFAULT_RECONNECT_CAP),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// 流式会话配置
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub identity: SessionIdentity,

    /// 流式传输基地址（ws:// 或 wss://）
    pub stream_base: String,

    /// REST 基地址
    pub api_base: String,

    pub timing: Timing,
}

impl SessionConfig {
    pub fn new(
        session_id: impl Into<String>,
        credential: impl Into<String>,
        stream_base: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            identity: SessionIdentity {
                session_id: session_id.into(),
                credential: credential.into(),
            },
            stream_base: stream_base.into(),
            api_base: api_base.into(),
            timing: Timing::default(),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.identity.session_id.trim().is_empty() {
            return Err(Error::Config("session_id 不能为空".to_string()));
        }
        if self.stream_base.trim().is_empty() {
            return Err(Error::Config("stream_base 不能为空".to_string()));
        }

        let intervals = [
            ("heartbeat_interval", self.timing.heartbeat_interval),
            ("poll_interval", self.timing.poll_interval),
            ("request_timeout", self.timing.request_timeout),
        ];
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(Error::Config(format!("{} 必须大于 0", name)));
            }
        }

        if self.timing.reconnect_cap < self.timing.reconnect_base {
            return Err(Error::Config(
                "reconnect_cap 不能小于 reconnect_base".to_string(),
            ));
        }

        Ok(())
    }

    /// 会话级流式端点
    pub fn stream_endpoint(&self) -> String {
        stream_endpoint(&self.stream_base, &self.identity.session_id)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.timing.reconnect_base,
            self.timing.reconnect_cap,
            self.timing.max_reconnect_attempts,
        )
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            endpoint: self.stream_endpoint(),
            credential: self.identity.credential.clone(),
            policy: self.reconnect_policy(),
            heartbeat_interval: self.timing.heartbeat_interval,
        }
    }
}

/// 进程配置（从环境变量加载）
#[derive(Debug, Clone)]
pub struct Config {
    pub session_id: String,
    pub token: String,
    pub stream_base_url: String,
    pub api_base_url: String,
    pub heartbeat_interval: u64,
    pub poll_interval: u64,
    pub reconnect_base: u64,
    pub reconnect_cap: u64,
    pub reconnect_max_attempts: u32,
    pub request_timeout: u64,
    pub log_level: String,
    /// `json` 输出结构化日志，其余取值为文本
    pub log_format: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        let session_id = std::env::var("STREAM_SESSION_ID")
            .unwrap_or_else(|_| common::utils::generate_id());

        let token = std::env::var("STREAM_TOKEN").unwrap_or_default();

        let stream_base_url = std::env::var("STREAM_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let api_base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());

        let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

        Ok(Self {
            session_id,
            token,
            stream_base_url,
            api_base_url,
            heartbeat_interval: env_or("HEARTBEAT_INTERVAL", DEFAULT_HEARTBEAT_INTERVAL)?,
            poll_interval: env_or("POLL_INTERVAL", DEFAULT_POLL_INTERVAL)?,
            reconnect_base: env_or("RECONNECT_BASE", DEFAULT_RECONNECT_BASE)?,
            reconnect_cap: env_or("RECONNECT_CAP", DEFAULT_RECONNECT_CAP)?,
            reconnect_max_attempts: env_or(
                "RECONNECT_MAX_ATTEMPTS",
                DEFAULT_MAX_RECONNECT_ATTEMPTS,
            )?,
            request_timeout: env_or("REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT)?,
            log_level,
            log_format,
        })
    }

    /// 转换为会话配置，流式地址的协议头在这里规范化
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(
            self.session_id.clone(),
            self.token.clone(),
            to_stream_base(&self.stream_base_url),
            self.api_base_url.clone(),
        )
        .with_timing(Timing {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval),
            poll_interval: Duration::from_secs(self.poll_interval),
            reconnect_base: Duration::from_secs(self.reconnect_base),
            reconnect_cap: Duration::from_secs(self.reconnect_cap),
            max_reconnect_attempts: self.reconnect_max_attempts,
            request_timeout: Duration::from_secs(self.request_timeout),
        })
    }
}

/// 读取环境变量，缺省时使用默认值
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("环境变量 {} 的值无效: {}", key, raw)),
        Err(_) => Ok(default),
    }
}
