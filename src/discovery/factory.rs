//! 解析器构建器
//!
//! 构建器持有注册中心客户端和默认参数，可以根据不同的目标字符串反复构建解析器

use std::sync::Arc;
use std::time::Duration;

use tonic::transport::{Channel, Endpoint as TonicEndpoint};

use crate::config::{
    DEFAULT_MAX_RESULTS, DEFAULT_REFRESH_INTERVAL, HealthStatusFilter, ResolverConfig,
};
use crate::discovery::backend::RegistryClient;
use crate::discovery::resolver::Resolver;
use crate::discovery::sink::{BalanceChannelSink, ResolverSink};
use crate::discovery::target::{SCHEME, Target};
use crate::error::{ConfigError, ResolverError, Result};

/// 解析器构建器
///
/// # 默认配置
/// - 健康状态过滤器：HEALTHY
/// - 最大返回实例数：100
/// - 刷新间隔：30 秒
///
/// 目标字符串中的查询参数优先于构建器的默认值
#[derive(Clone)]
pub struct ResolverBuilder {
    registry: Option<Arc<dyn RegistryClient>>,
    health_status_filter: HealthStatusFilter,
    max_results: u32,
    refresh_interval: Duration,
}

impl Default for ResolverBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            health_status_filter: HealthStatusFilter::default(),
            max_results: DEFAULT_MAX_RESULTS,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl ResolverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 目标字符串的 scheme
    pub fn scheme(&self) -> &'static str {
        SCHEME
    }

    /// 设置注册中心客户端
    pub fn with_registry<R>(self, registry: R) -> Self
    where
        R: RegistryClient + 'static,
    {
        self.with_shared_registry(Arc::new(registry))
    }

    /// 设置共享的注册中心客户端
    pub fn with_shared_registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_health_status_filter(mut self, filter: HealthStatusFilter) -> Self {
        self.health_status_filter = filter;
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    /// 解析目标字符串并补齐默认值
    pub fn config_for(&self, target: &str) -> std::result::Result<ResolverConfig, ConfigError> {
        let config = Target::parse(target)?.into_config_with(
            self.health_status_filter,
            self.max_results,
            self.refresh_interval,
        );
        config.validate()?;
        Ok(config)
    }

    /// 构建解析器，结果推送给指定消费端
    pub fn build(&self, target: &str, sink: Arc<dyn ResolverSink>) -> Result<Resolver> {
        let config = self.config_for(target)?;
        let registry = self.registry.clone().ok_or(ResolverError::MissingRegistry)?;
        Ok(Resolver::new(config, registry, sink)?)
    }

    /// 构建 tonic 负载均衡 Channel 以及为其提供地址的解析器
    ///
    /// 关闭解析器不会关闭 Channel，已插入的地址保持可用
    pub fn build_balanced_channel(
        &self,
        target: &str,
        buffer: usize,
    ) -> Result<(Channel, Resolver)> {
        self.build_balanced_channel_with(target, buffer, |endpoint| endpoint)
    }

    /// 同 [`build_balanced_channel`](Self::build_balanced_channel)，可定制每个 Endpoint
    pub fn build_balanced_channel_with<F>(
        &self,
        target: &str,
        buffer: usize,
        configure: F,
    ) -> Result<(Channel, Resolver)>
    where
        F: Fn(TonicEndpoint) -> TonicEndpoint + Send + Sync + 'static,
    {
        let config = self.config_for(target)?;
        let registry = self.registry.clone().ok_or(ResolverError::MissingRegistry)?;

        let (channel, tx) = Channel::balance_channel::<String>(buffer);
        let sink = BalanceChannelSink::new(tx).with_endpoint_config(configure);
        let resolver = Resolver::new(config, registry, Arc::new(sink))?;

        Ok((channel, resolver))
    }
}
