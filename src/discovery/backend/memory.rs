//! 内存注册中心
//!
//! 持有固定的实例列表，用于本地开发和测试

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::HealthStatusFilter;
use crate::discovery::backend::{DiscoverQuery, RegistryClient};
use crate::discovery::instance::InstanceRecord;
use crate::error::RegistryError;

const UNHEALTHY: &str = "UNHEALTHY";

/// 内存注册中心
#[derive(Default)]
pub struct StaticRegistry {
    instances: RwLock<Vec<InstanceRecord>>,
    failure: RwLock<Option<RegistryError>>,
    lookups: AtomicUsize,
}

impl StaticRegistry {
    /// 创建新的内存注册中心
    pub fn new(instances: Vec<InstanceRecord>) -> Self {
        Self {
            instances: RwLock::new(instances),
            failure: RwLock::new(None),
            lookups: AtomicUsize::new(0),
        }
    }

    /// 替换实例列表
    pub async fn set_instances(&self, instances: Vec<InstanceRecord>) {
        *self.instances.write().await = instances;
    }

    /// 设置后续查询返回的错误，`None` 恢复正常
    pub async fn set_failure(&self, failure: Option<RegistryError>) {
        *self.failure.write().await = failure;
    }

    /// 已处理的查询次数
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

fn matches_query(record: &InstanceRecord, query: &DiscoverQuery) -> bool {
    let same = |value: &Option<String>, expected: &str| {
        value.as_deref().map(|v| v == expected).unwrap_or(true)
    };
    if !same(&record.namespace_name, &query.namespace_name)
        || !same(&record.service_name, &query.service_name)
    {
        return false;
    }

    let unhealthy = record.health_status.as_deref() == Some(UNHEALTHY);
    match query.health_status {
        HealthStatusFilter::All => true,
        HealthStatusFilter::Healthy => !unhealthy,
        HealthStatusFilter::Unhealthy => unhealthy,
    }
}

#[async_trait]
impl RegistryClient for StaticRegistry {
    async fn discover_instances(
        &self,
        query: &DiscoverQuery,
    ) -> Result<Vec<InstanceRecord>, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.failure.read().await.clone() {
            return Err(err);
        }

        let instances = self.instances.read().await;
        Ok(instances
            .iter()
            .filter(|record| matches_query(record, query))
            .take(query.max_results as usize)
            .cloned()
            .collect())
    }
}
