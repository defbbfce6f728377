/// REST 快照拉取

use async_trait::async_trait;
use common::utils::join_url;
use common::{DashboardSnapshot, Error, RecommendationSet, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// 快照拉取抽象
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch_dashboard(&self) -> Result<DashboardSnapshot>;

    async fn fetch_recommendations(&self) -> Result<RecommendationSet>;
}

/// 基于 HTTP 的拉取实现
#[derive(Clone)]
pub struct HttpSnapshotFetcher {
    http: Client,
    api_base: String,
    session_id: String,
    credential: String,
}

impl HttpSnapshotFetcher {
    pub fn new(
        api_base: impl Into<String>,
        session_id: impl Into<String>,
        credential: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into(),
            session_id: session_id.into(),
            credential: credential.into(),
        })
    }

    fn endpoint(&self, resource: &str) -> String {
        join_url(
            &self.api_base,
            &format!("api/sessions/{}/{}", self.session_id, resource),
        )
    }

    async fn get<T: DeserializeOwned>(&self, resource: &str) -> Result<T> {
        let url = self.endpoint(resource);
        let mut request = self.http.get(&url);
        if !self.credential.is_empty() {
            request = request.bearer_auth(&self.credential);
        }

        let res = request
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("请求 {} 失败: {}", url, e)))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!(
                "{} 返回异常状态 {}: {}",
                url, status, body
            )));
        }

        let body: Value = res
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("解析 {} 响应失败: {}", url, e)))?;
        debug!("拉取成功: {}", url);

        serde_json::from_value(unwrap_payload(body))
            .map_err(|e| Error::Fetch(format!("{} 响应结构无效: {}", url, e)))
    }
}

/// `{"data": X, ...}` 取 X，其它结构原样返回
fn unwrap_payload(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) => data,
            None => Value::Object(map),
        },
        other => other,
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch_dashboard(&self) -> Result<DashboardSnapshot> {
        self.get("dashboard").await
    }

    async fn fetch_recommendations(&self) -> Result<RecommendationSet> {
        self.get("recommendations").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(server: &MockServer) -> HttpSnapshotFetcher {
        HttpSnapshotFetcher::new(server.uri(), "s-1", "tok", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_unwrap_payload() {
        assert_eq!(unwrap_payload(json!({"success": true, "data": {"a": 1}})), json!({"a": 1}));
        assert_eq!(unwrap_payload(json!({"a": 1})), json!({"a": 1}));
        assert_eq!(unwrap_payload(json!([1, 2])), json!([1, 2]));
    }

    #[tokio::test]
    async fn test_fetch_dashboard_with_bearer_and_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/s-1/dashboard"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"active_sessions": 4}
            })))
            .mount(&server)
            .await;

        let dashboard = fetcher(&server).fetch_dashboard().await.unwrap();
        assert_eq!(dashboard, DashboardSnapshot::new(json!({"active_sessions": 4})));
    }

    #[tokio::test]
    async fn test_fetch_recommendations_without_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/s-1/recommendations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"title": "short break"}])),
            )
            .mount(&server)
            .await;

        let recommendations = fetcher(&server).fetch_recommendations().await.unwrap();
        assert_eq!(recommendations.data[0]["title"], "short break");
    }

    #[tokio::test]
    async fn test_non_success_status_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/sessions/s-1/dashboard"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = fetcher(&server).fetch_dashboard().await.unwrap_err();
        assert!(matches!(err, Error::Fetch(msg) if msg.contains("503")));
    }
}
