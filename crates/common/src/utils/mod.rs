/// 工具函数集合

use uuid::Uuid;

/// 生成唯一 ID
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// 把 HTTP 地址转换为流式传输地址
///
/// `https://` 转为 `wss://`，`http://` 转为 `ws://`，没有协议头时默认 `ws://`，
/// 已经是 `ws(s)://` 的地址原样返回。末尾的 `/` 会被去掉。
pub fn to_stream_base(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');

    if url.starts_with("ws://") || url.starts_with("wss://") {
        url.to_string()
    } else if let Some(host) = url.strip_prefix("https://") {
        format!("wss://{}", host)
    } else if let Some(host) = url.strip_prefix("http://") {
        format!("ws://{}", host)
    } else {
        format!("ws://{}", url)
    }
}

/// 拼接会话级流式端点
pub fn stream_endpoint(stream_base: &str, session_id: &str) -> String {
    format!(
        "{}/ws/analysis/{}",
        stream_base.trim_end_matches('/'),
        session_id
    )
}

/// 拼接 REST 地址
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
