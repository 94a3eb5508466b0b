//! HTTP 注册中心客户端
//!
//! 使用 `DiscoverInstances` JSON 1.1 协议访问注册中心数据面端点，
//! 适用于本地模拟器或负责签名的代理。请求签名不在此实现范围内

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::discovery::backend::{DiscoverQuery, RegistryClient};
use crate::discovery::instance::InstanceRecord;
use crate::error::{ConfigError, RegistryError};

/// `DiscoverInstances` 操作名
pub const DISCOVER_INSTANCES_TARGET: &str = "Route53AutoNaming_v20170314.DiscoverInstances";

const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DiscoverInstancesOutput {
    #[serde(default)]
    instances: Vec<InstanceRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// HTTP 注册中心客户端
#[derive(Clone)]
pub struct HttpRegistryClient {
    http_client: HttpClient,
    endpoint: Url,
}

impl HttpRegistryClient {
    /// 创建新的 HTTP 客户端
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        Self::with_client(endpoint, HttpClient::new())
    }

    /// 使用自定义的 reqwest 客户端（如需设置超时、代理）
    pub fn with_client(endpoint: &str, http_client: HttpClient) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: format!("unsupported scheme {}", endpoint.scheme()),
            });
        }

        Ok(Self {
            http_client,
            endpoint,
        })
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn discover_instances(
        &self,
        query: &DiscoverQuery,
    ) -> Result<Vec<InstanceRecord>, RegistryError> {
        let body = serde_json::to_vec(query)
            .map_err(|e| RegistryError::unclassified(format!("cannot encode request: {}", e)))?;

        let resp = self
            .http_client
            .post(self.endpoint.clone())
            .header("X-Amz-Target", DISCOVER_INSTANCES_TARGET)
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                RegistryError::unclassified(format!("request to {} failed: {}", self.endpoint, e))
            })?;

        let status = resp.status();
        let error_type = resp
            .headers()
            .get(ERROR_TYPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let text = resp.text().await.map_err(|e| {
            RegistryError::unclassified(format!("cannot read response body: {}", e))
        })?;

        if !status.is_success() {
            return Err(classify_error_response(status, error_type.as_deref(), &text));
        }

        parse_discover_output(&text)
    }
}

/// 解析成功响应
pub(crate) fn parse_discover_output(body: &str) -> Result<Vec<InstanceRecord>, RegistryError> {
    serde_json::from_str::<DiscoverInstancesOutput>(body)
        .map(|output| output.instances)
        .map_err(|e| RegistryError::unclassified(format!("cannot decode response: {}", e)))
}

/// 将失败响应映射为注册中心错误
///
/// 错误代码优先取 `x-amzn-ErrorType` 头，其次取响应体中的 `__type`
pub(crate) fn classify_error_response(
    status: StatusCode,
    error_type: Option<&str>,
    body: &str,
) -> RegistryError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("registry responded with {}", status));

    match error_type.map(str::to_string).or(parsed.error_type) {
        Some(code) => RegistryError::from_code(&code, message),
        None => RegistryError::unclassified(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HealthStatusFilter, ResolverConfig};
    use crate::error::RegistryErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// 接受一个连接并返回固定响应，任务结果为收到的原始请求
    async fn serve_once(response: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request_complete(&request) {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8(request).unwrap()
        });
        (format!("http://{}", addr), handle)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= length
    }

    fn http_response(status: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\ncontent-type: {}\r\n{}content-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            AMZ_JSON_CONTENT_TYPE,
            extra_headers,
            body.len(),
            body
        )
    }

    #[tokio::test]
    async fn discover_instances_posts_json_request() {
        let body = r#"{"Instances": [{"InstanceId": "a", "Attributes": {"AWS_INSTANCE_IPV4": "10.0.0.1", "AWS_INSTANCE_PORT": "80"}}]}"#;
        let (endpoint, server) = serve_once(http_response("200 OK", "", body)).await;
        let client = HttpRegistryClient::new(&endpoint).unwrap();

        let query = ResolverConfig::new("example.local", "orders").query();
        let records = client.discover_instances(&query).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].instance_id, "a");

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST / HTTP/1.1\r\n"));
        assert!(lower.contains("x-amz-target: route53autonaming_v20170314.discoverinstances\r\n"));
        assert!(lower.contains("content-type: application/x-amz-json-1.1\r\n"));
        assert!(request.ends_with(
            r#"{"NamespaceName":"example.local","ServiceName":"orders","HealthStatus":"HEALTHY","MaxResults":100}"#
        ));
    }

    #[tokio::test]
    async fn discover_instances_maps_error_status() {
        let response = http_response(
            "400 Bad Request",
            "x-amzn-errortype: ServiceNotFound:http://internal.amazon.com/\r\n",
            r#"{"message": "srv-1 not found"}"#,
        );
        let (endpoint, server) = serve_once(response).await;
        let client = HttpRegistryClient::new(&endpoint).unwrap();

        let query = ResolverConfig::new("example.local", "orders").query();
        let err = client.discover_instances(&query).await.unwrap_err();
        assert_eq!(err.kind(), RegistryErrorKind::ServiceNotFound);
        assert_eq!(err.message(), "srv-1 not found");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn discover_instances_reports_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpRegistryClient::new(&format!("http://{}", addr)).unwrap();
        let query = ResolverConfig::new("example.local", "orders").query();
        let err = client.discover_instances(&query).await.unwrap_err();
        assert_eq!(err.kind(), RegistryErrorKind::Unclassified);
    }

    #[test]
    fn query_serializes_as_request_body() {
        let query = DiscoverQuery {
            namespace_name: "example.local".to_string(),
            service_name: "orders".to_string(),
            health_status: HealthStatusFilter::Healthy,
            max_results: 100,
        };

        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "NamespaceName": "example.local",
                "ServiceName": "orders",
                "HealthStatus": "HEALTHY",
                "MaxResults": 100
            })
        );
    }

    #[test]
    fn parses_instances_in_order() {
        let body = r#"{"Instances": [
            {"InstanceId": "a", "Attributes": {"AWS_INSTANCE_IPV4": "10.0.0.1", "AWS_INSTANCE_PORT": "80"}},
            {"InstanceId": "b", "Attributes": {"AWS_INSTANCE_IPV4": "10.0.0.2", "AWS_INSTANCE_PORT": "80"}}
        ], "InstancesRevision": 3}"#;

        let records = parse_discover_output(body).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn empty_output_has_no_instances() {
        assert!(parse_discover_output("{}").unwrap().is_empty());
        assert_eq!(
            parse_discover_output("not json").unwrap_err().kind(),
            RegistryErrorKind::Unclassified
        );
    }

    #[test]
    fn classifies_error_body() {
        let err = classify_error_response(
            StatusCode::BAD_REQUEST,
            None,
            r#"{"__type": "com.amazonaws.servicediscovery#ServiceNotFound", "message": "srv-1 not found"}"#,
        );
        assert_eq!(err.kind(), RegistryErrorKind::ServiceNotFound);
        assert_eq!(err.message(), "srv-1 not found");
    }

    #[test]
    fn error_header_takes_precedence() {
        let err = classify_error_response(
            StatusCode::BAD_REQUEST,
            Some("RequestLimitExceeded:http://internal/"),
            r#"{"__type": "InvalidInput", "Message": "slow down"}"#,
        );
        assert_eq!(err.kind(), RegistryErrorKind::RequestLimitExceeded);
        assert_eq!(err.message(), "slow down");
    }

    #[test]
    fn unparseable_error_is_unclassified() {
        let err = classify_error_response(StatusCode::BAD_GATEWAY, None, "<html>bad gateway</html>");
        assert_eq!(err.kind(), RegistryErrorKind::Unclassified);
        assert!(err.message().contains("502"));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        assert!(HttpRegistryClient::new("http://localhost:4566").is_ok());
        assert!(matches!(
            HttpRegistryClient::new("ftp://localhost"),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            HttpRegistryClient::new("not a url"),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }
}
