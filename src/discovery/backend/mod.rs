//! 服务注册中心客户端抽象和实现

pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::HealthStatusFilter;
use crate::discovery::instance::InstanceRecord;
use crate::error::RegistryError;

pub use http::HttpRegistryClient;
pub use memory::StaticRegistry;

/// 一次实例查询的条件
///
/// 序列化结果即注册中心 `DiscoverInstances` 请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoverQuery {
    pub namespace_name: String,
    pub service_name: String,
    pub health_status: HealthStatusFilter,
    pub max_results: u32,
}

/// 服务注册中心客户端 trait
///
/// 每次调用对应注册中心的一次往返，返回的实例保持注册中心给出的顺序
/// 注意：由于需要动态分发（dyn），使用 async-trait
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// 查询实例
    ///
    /// # 参数
    /// * `query` - 查询条件（命名空间、服务、健康状态过滤器、最大返回数）
    ///
    /// # 返回
    /// 返回原始实例记录列表
    async fn discover_instances(
        &self,
        query: &DiscoverQuery,
    ) -> Result<Vec<InstanceRecord>, RegistryError>;
}
