use thiserror::Error;

/// 统一错误类型
///
/// 需要放入会话状态的错误槽位，所以实现了 `Clone`，底层错误统一转成字符串保存
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 连接级错误，会触发重连策略
    #[error("传输错误: {0}")]
    Transport(String),

    /// 入站帧格式错误，丢弃该帧
    #[error("解码错误: {0}")]
    Decode(String),

    /// 服务端主动下发的 error 消息
    #[error("服务端错误: {0}")]
    ServerReported(String),

    /// REST 兜底拉取失败，保留旧数据
    #[error("拉取失败: {0}")]
    Fetch(String),

    /// 重连次数耗尽，需要手动重新 open
    #[error("重连次数已耗尽: 共尝试 {attempts} 次")]
    ExhaustedRetries { attempts: u32 },

    #[error("配置错误: {0}")]
    Config(String),

    /// 后台驱动任务已退出
    #[error("会话已关闭")]
    Shutdown,
}

impl Error {
    /// 是否为连接性错误（重连耗尽）
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::ExhaustedRetries { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;
