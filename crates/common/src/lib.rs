/// Insight Stream - 公共库
///
/// 提供流式客户端共享的协议类型、数据模型、错误处理、工具函数等

pub mod errors;
pub mod models;
pub mod protocol;
pub mod utils;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use models::{Alert, AlertLevel, DashboardSnapshot, RecommendationSet, StreamingAnalysis};
pub use protocol::{InboundMessage, OutboundMessage};
