//! 解析器配置

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::discovery::backend::DiscoverQuery;
use crate::error::ConfigError;

/// 默认最大返回实例数
pub const DEFAULT_MAX_RESULTS: u32 = 100;

/// 默认刷新间隔
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// 实例健康状态过滤器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatusFilter {
    /// 返回所有实例
    All,
    /// 只返回健康实例
    #[default]
    Healthy,
    /// 只返回不健康实例
    Unhealthy,
}

impl HealthStatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatusFilter::All => "ALL",
            HealthStatusFilter::Healthy => "HEALTHY",
            HealthStatusFilter::Unhealthy => "UNHEALTHY",
        }
    }
}

impl fmt::Display for HealthStatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatusFilter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALL" => Ok(HealthStatusFilter::All),
            "HEALTHY" => Ok(HealthStatusFilter::Healthy),
            "UNHEALTHY" => Ok(HealthStatusFilter::Unhealthy),
            _ => Err(ConfigError::InvalidHealthStatusFilter(s.to_string())),
        }
    }
}

/// 解析器配置
///
/// 在解析器的整个生命周期内不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// 命名空间（必填）
    pub namespace: String,

    /// 服务名（必填）
    pub service: String,

    /// 健康状态过滤器，默认 HEALTHY
    #[serde(default)]
    pub health_status_filter: HealthStatusFilter,

    /// 每次查询最多返回的实例数，默认 100
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// 周期刷新间隔，默认 30 秒（如 "30s"、"1m 30s"）
    #[serde(default = "default_refresh_interval", with = "duration_str")]
    pub refresh_interval: Duration,
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

fn default_refresh_interval() -> Duration {
    DEFAULT_REFRESH_INTERVAL
}

impl ResolverConfig {
    /// 使用默认值创建配置
    pub fn new(namespace: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service: service.into(),
            health_status_filter: HealthStatusFilter::default(),
            max_results: DEFAULT_MAX_RESULTS,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// 设置健康状态过滤器
    pub fn with_health_status_filter(mut self, filter: HealthStatusFilter) -> Self {
        self.health_status_filter = filter;
        self
    }

    /// 设置最大返回实例数
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// 设置刷新间隔
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::MissingNamespace);
        }
        if self.service.is_empty() {
            return Err(ConfigError::MissingService);
        }
        if self.max_results == 0 {
            return Err(ConfigError::InvalidMaxResults {
                value: self.max_results.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.refresh_interval.is_zero() {
            return Err(ConfigError::InvalidRefreshInterval {
                value: humantime::format_duration(self.refresh_interval).to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// 每个刷新周期使用的固定查询条件
    pub fn query(&self) -> DiscoverQuery {
        DiscoverQuery {
            namespace_name: self.namespace.clone(),
            service_name: self.service.clone(),
            health_status: self.health_status_filter,
            max_results: self.max_results,
        }
    }

    /// 从 TOML 文件加载并校验配置
    pub fn load_from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read resolver config {}", path.display()))?;
        let config: ResolverConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse resolver config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn new_applies_defaults() {
        let config = ResolverConfig::new("example.local", "orders");
        assert_eq!(config.health_status_filter, HealthStatusFilter::Healthy);
        assert_eq!(config.max_results, 100);
        assert_eq!(config.refresh_interval, Duration::from_secs(30));
        assert_ok!(config.validate());
    }

    #[test]
    fn validate_rejects_empty_target() {
        assert_eq!(
            ResolverConfig::new("", "orders").validate(),
            Err(ConfigError::MissingNamespace)
        );
        assert_eq!(
            ResolverConfig::new("example.local", "").validate(),
            Err(ConfigError::MissingService)
        );
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let config = ResolverConfig::new("example.local", "orders").with_max_results(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMaxResults { .. })
        ));

        let config =
            ResolverConfig::new("example.local", "orders").with_refresh_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRefreshInterval { .. })
        ));
    }

    #[test]
    fn health_status_filter_parses_wire_names() {
        assert_eq!("ALL".parse::<HealthStatusFilter>(), Ok(HealthStatusFilter::All));
        assert_eq!("HEALTHY".parse::<HealthStatusFilter>(), Ok(HealthStatusFilter::Healthy));
        assert_eq!(
            "UNHEALTHY".parse::<HealthStatusFilter>(),
            Ok(HealthStatusFilter::Unhealthy)
        );
        assert_err!("HEALTHY_OR_ELSE_ALL".parse::<HealthStatusFilter>());
        assert_eq!(
            "healthy".parse::<HealthStatusFilter>(),
            Err(ConfigError::InvalidHealthStatusFilter("healthy".to_string()))
        );
        assert_eq!(HealthStatusFilter::Unhealthy.to_string(), "UNHEALTHY");
    }

    #[test]
    fn query_carries_fixed_criteria() {
        let query = ResolverConfig::new("example.local", "orders")
            .with_health_status_filter(HealthStatusFilter::All)
            .with_max_results(5)
            .query();
        assert_eq!(query.namespace_name, "example.local");
        assert_eq!(query.service_name, "orders");
        assert_eq!(query.health_status, HealthStatusFilter::All);
        assert_eq!(query.max_results, 5);
    }

    #[test]
    fn load_from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
namespace = "example.local"
service = "orders"
health_status_filter = "ALL"
refresh_interval = "1m 30s"
"#
        )
        .unwrap();

        let config = ResolverConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.namespace, "example.local");
        assert_eq!(config.service, "orders");
        assert_eq!(config.health_status_filter, HealthStatusFilter::All);
        assert_eq!(config.max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(config.refresh_interval, Duration::from_secs(90));
    }

    #[test]
    fn load_from_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "namespace = \"\"\nservice = \"orders\"").unwrap();

        let err = ResolverConfig::load_from_file(file.path()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingNamespace)
        );
    }

    #[test]
    fn refresh_interval_serializes_as_human_duration() {
        let config = ResolverConfig::new("example.local", "orders")
            .with_refresh_interval(Duration::from_secs(50));
        let encoded = toml::to_string(&config).unwrap();
        assert!(encoded.contains("refresh_interval = \"50s\""));

        let decoded: ResolverConfig = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded, config);
    }
}
