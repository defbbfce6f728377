/// 入站消息路由
///
/// 解码入站帧并按 type 分发到会话状态存储，任何解析失败都只记录日志不影响连接

use common::{Error, InboundMessage};
use tracing::{debug, error, info, warn};

use crate::store::SessionStateStore;

/// 路由结果
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// 已写入存储
    Applied { kind: String },
    /// 心跳确认，无需处理
    Acknowledged,
    /// 未识别的类型，已丢弃
    Unknown { kind: String },
    /// 解码失败，已丢弃
    Rejected(Error),
}

/// 消息路由器
#[derive(Clone)]
pub struct MessageRouter {
    store: SessionStateStore,
}

impl MessageRouter {
    pub fn new(store: SessionStateStore) -> Self {
        Self { store }
    }

    /// 解码并分发一帧文本消息
    pub fn route(&self, frame: &str) -> RouteOutcome {
        match InboundMessage::decode(frame) {
            Ok(msg) => self.dispatch(msg),
            Err(e) => {
                warn!("丢弃无法解码的消息: {}", e);
                RouteOutcome::Rejected(e)
            }
        }
    }

    /// 分发已解码的消息
    pub fn dispatch(&self, msg: InboundMessage) -> RouteOutcome {
        let kind = msg.kind().to_string();
        debug!("收到消息: type={}", kind);

        match msg {
            InboundMessage::StreamingAnalysis(analysis) => {
                debug!(
                    "更新实时分析: id={}, engagement={:.2}",
                    analysis.analysis_id, analysis.engagement_level
                );
                self.store.replace_analysis(analysis);
            }
            InboundMessage::InterventionAlert(alert) => {
                info!(
                    "收到干预告警: id={}, level={:?}, type={}",
                    alert.id, alert.level, alert.intervention_type
                );
                self.store.push_alert(alert);
            }
            InboundMessage::DashboardUpdate(dashboard) => {
                self.store.replace_dashboard(dashboard);
            }
            InboundMessage::HeartbeatAck => return RouteOutcome::Acknowledged,
            InboundMessage::Error { message } => {
                error!("服务端返回错误: {}", message);
                self.store.report_error(Error::ServerReported(message));
            }
            InboundMessage::Unknown { kind } => {
                warn!("未知消息类型，已忽略: {}", kind);
                return RouteOutcome::Unknown { kind };
            }
        }

        RouteOutcome::Applied { kind }
    }

    /// 上报连接层错误（例如重连耗尽）
    pub fn report_error(&self, error: Error) {
        self.store.report_error(error);
    }

    /// 连接恢复
    pub fn connection_restored(&self) {
        self.store.clear_connectivity_error();
    }
}
