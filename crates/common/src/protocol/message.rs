/// 流式会话消息定义

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::models::{Alert, DashboardSnapshot, StreamingAnalysis};

/// 入站消息类型标签
pub mod tags {
    pub const STREAMING_ANALYSIS: &str = "streaming_analysis";
    pub const INTERVENTION_ALERT: &str = "intervention_alert";
    pub const DASHBOARD_UPDATE: &str = "dashboard_update";
    pub const HEARTBEAT_RESPONSE: &str = "heartbeat_response";
    pub const GATEWAY_HEARTBEAT: &str = "gateway_heartbeat";
    pub const ERROR: &str = "error";
}

/// 入站消息
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    StreamingAnalysis(StreamingAnalysis),
    InterventionAlert(Alert),
    DashboardUpdate(DashboardSnapshot),
    /// 心跳确认（heartbeat_response / gateway_heartbeat）
    HeartbeatAck,
    /// 服务端错误
    Error { message: String },
    /// 未识别的类型标签
    Unknown { kind: String },
}

/// 入站消息外层结构，先按 type 分流再解析 data
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    data: Option<serde_json::Value>,

    /// 仅 error 帧读取；其它类型携带的 message 不参与解析
    #[serde(default)]
    message: Option<serde_json::Value>,
}

impl InboundMessage {
    /// 从 JSON 文本解码
    pub fn decode(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;

        let msg = match envelope.kind.as_str() {
            tags::STREAMING_ANALYSIS => {
                let analysis: StreamingAnalysis = parse_data(&envelope.kind, envelope.data)?;
                analysis.validate()?;
                Self::StreamingAnalysis(analysis)
            }
            tags::INTERVENTION_ALERT => {
                Self::InterventionAlert(parse_data(&envelope.kind, envelope.data)?)
            }
            tags::DASHBOARD_UPDATE => {
                Self::DashboardUpdate(parse_data(&envelope.kind, envelope.data)?)
            }
            tags::HEARTBEAT_RESPONSE | tags::GATEWAY_HEARTBEAT => Self::HeartbeatAck,
            tags::ERROR => Self::Error {
                message: match envelope.message {
                    Some(serde_json::Value::String(text)) => text,
                    Some(other) => other.to_string(),
                    None => "未知服务端错误".to_string(),
                },
            },
            _ => Self::Unknown {
                kind: envelope.kind.clone(),
            },
        };

        Ok(msg)
    }

    /// 消息类型标签（用于日志）
    pub fn kind(&self) -> &str {
        match self {
            Self::StreamingAnalysis(_) => tags::STREAMING_ANALYSIS,
            Self::InterventionAlert(_) => tags::INTERVENTION_ALERT,
            Self::DashboardUpdate(_) => tags::DASHBOARD_UPDATE,
            Self::HeartbeatAck => tags::HEARTBEAT_RESPONSE,
            Self::Error { .. } => tags::ERROR,
            Self::Unknown { kind } => kind.as_str(),
        }
    }
}

fn parse_data<T: serde::de::DeserializeOwned>(
    kind: &str,
    data: Option<serde_json::Value>,
) -> Result<T> {
    let data = data.ok_or_else(|| Error::Decode(format!("{} 消息缺少 data 字段", kind)))?;
    serde_json::from_value(data).map_err(|e| Error::Decode(format!("{} 消息体无效: {}", kind, e)))
}

/// 出站消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Heartbeat {
        /// ISO-8601 时间戳
        timestamp: String,
    },
}

impl OutboundMessage {
    /// 以当前时间创建心跳消息
    pub fn heartbeat() -> Self {
        Self::Heartbeat {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
