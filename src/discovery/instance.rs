//! 服务实例定义与转换

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TranslateError;

/// 实例 IPv4 地址属性名
pub const ATTR_INSTANCE_IPV4: &str = "AWS_INSTANCE_IPV4";

/// 实例端口属性名
pub const ATTR_INSTANCE_PORT: &str = "AWS_INSTANCE_PORT";

/// 注册中心返回的原始实例记录
///
/// 地址和端口以字符串属性的形式存放在 `attributes` 中
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceRecord {
    /// 实例 ID
    #[serde(default)]
    pub instance_id: String,

    /// 所属命名空间
    pub namespace_name: Option<String>,

    /// 所属服务
    pub service_name: Option<String>,

    /// 健康状态（HEALTHY / UNHEALTHY / UNKNOWN）
    pub health_status: Option<String>,

    /// 实例属性
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl InstanceRecord {
    /// 创建新的实例记录
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }

    /// 设置 IPv4 地址和端口属性
    pub fn with_address(self, ipv4: impl Into<String>, port: impl Into<String>) -> Self {
        self.with_attribute(ATTR_INSTANCE_IPV4, ipv4)
            .with_attribute(ATTR_INSTANCE_PORT, port)
    }

    /// 添加属性
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// 设置所属命名空间和服务
    pub fn with_target(mut self, namespace: impl Into<String>, service: impl Into<String>) -> Self {
        self.namespace_name = Some(namespace.into());
        self.service_name = Some(service.into());
        self
    }

    /// 设置健康状态
    pub fn with_health_status(mut self, status: impl Into<String>) -> Self {
        self.health_status = Some(status.into());
        self
    }
}

/// 解析出的服务端点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// `host:port`
    pub address: String,

    /// 实例的全部属性（包含地址和端口属性本身）
    pub metadata: HashMap<String, String>,
}

impl Endpoint {
    /// 转换为 gRPC URI
    pub fn to_grpc_uri(&self) -> String {
        format!("http://{}", self.address)
    }
}

/// 一次成功刷新的结果
///
/// 保持注册中心返回的顺序，作为一个整体发布给消费端
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionState {
    pub endpoints: Vec<Endpoint>,
}

impl ResolutionState {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// 按顺序返回所有地址
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|ep| ep.address.as_str())
    }
}

/// 将原始实例记录转换为端点
///
/// 地址和端口属性缺一不可；其它属性原样复制到 metadata
pub fn translate(record: &InstanceRecord) -> Result<Endpoint, TranslateError> {
    let missing = |attribute| TranslateError::MissingAttribute {
        instance_id: record.instance_id.clone(),
        attribute,
    };

    let ip = record
        .attributes
        .get(ATTR_INSTANCE_IPV4)
        .ok_or_else(|| missing(ATTR_INSTANCE_IPV4))?;
    let port = record
        .attributes
        .get(ATTR_INSTANCE_PORT)
        .ok_or_else(|| missing(ATTR_INSTANCE_PORT))?;

    Ok(Endpoint {
        address: format!("{}:{}", ip, port),
        metadata: record.attributes.clone(),
    })
}

/// 转换一批实例记录
///
/// 转换失败的实例被丢弃并记录日志，其余实例保持原有顺序
pub fn translate_batch(records: &[InstanceRecord]) -> ResolutionState {
    let endpoints = records
        .iter()
        .filter_map(|record| match translate(record) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!(error = %e, "Dropping instance that cannot be translated");
                None
            }
        })
        .collect();

    ResolutionState::new(endpoints)
}
