/// 共享数据模型
///
/// 定义流式分析会话中推送和拉取的数据结构

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// 告警级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// 实时分析快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamingAnalysis {
    pub analysis_id: String,
    pub session_id: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub emotional_state: String,

    /// 参与度 [0, 1]
    pub engagement_level: f64,

    /// 注意力 [0, 1]
    pub attention_level: f64,

    /// 过度刺激风险 [0, 1]
    pub overstimulation_risk: f64,

    pub intervention_needed: bool,

    /// 置信度 [0, 1]
    pub confidence_score: f64,

    #[serde(default)]
    pub insights: Vec<String>,

    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl StreamingAnalysis {
    /// 校验所有分值都落在 [0, 1] 区间内
    pub fn validate(&self) -> Result<()> {
        let scores = [
            ("engagement_level", self.engagement_level),
            ("attention_level", self.attention_level),
            ("overstimulation_risk", self.overstimulation_risk),
            ("confidence_score", self.confidence_score),
        ];

        for (name, value) in scores {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Decode(format!(
                    "{} 超出范围 [0, 1]: {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// 干预告警
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alert {
    pub id: String,
    pub session_id: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub level: AlertLevel,
    pub intervention_type: String,
    pub message: String,
    #[serde(default)]
    pub auto_resolved: bool,
}

/// 时间戳解析：RFC 3339 优先，不带时区偏移的 ISO-8601 按 UTC 处理
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }

        raw.parse::<NaiveDateTime>()
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("无效时间戳 {}: {}", raw, e))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// 仪表盘聚合视图
///
/// 结构由服务端决定，客户端只做整体替换
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DashboardSnapshot {
    pub data: serde_json::Value,
}

impl DashboardSnapshot {
    pub fn new(data: serde_json::Value) -> Self {
        Self { data }
    }
}

/// 推荐集合
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RecommendationSet {
    pub data: serde_json::Value,
}

impl RecommendationSet {
    pub fn new(data: serde_json::Value) -> Self {
        Self { data }
    }
}

/// 常量定义
pub mod constants {
    /// 默认心跳间隔（秒）
    pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 30;

    /// 默认 REST 轮询间隔（秒）
    pub const DEFAULT_POLL_INTERVAL: u64 = 30;

    /// 默认重连退避基数（秒）
    pub const DEFAULT_RECONNECT_BASE: u64 = 1;

    /// 默认重连退避上限（秒）
    pub const DEFAULT_RECONNECT_CAP: u64 = 30;

    /// 默认最大重连次数
    pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

    /// 默认 REST 请求超时（秒）
    pub const DEFAULT_REQUEST_TIMEOUT: u64 = 10;

    /// 告警历史容量
    pub const ALERT_HISTORY_CAPACITY: usize = 10;
}
