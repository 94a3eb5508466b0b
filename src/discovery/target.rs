//! 目标字符串解析
//!
//! 格式：`cloudmap://{namespace}/{service}?healthStatusFilter=..&maxAddrs=..&refreshInterval=..`

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::config::{
    DEFAULT_MAX_RESULTS, DEFAULT_REFRESH_INTERVAL, HealthStatusFilter, ResolverConfig,
};
use crate::error::ConfigError;

/// 目标字符串的 scheme
pub const SCHEME: &str = "cloudmap";

const PARAM_HEALTH_STATUS_FILTER: &str = "healthStatusFilter";
const PARAM_MAX_ADDRS: &str = "maxAddrs";
const PARAM_REFRESH_INTERVAL: &str = "refreshInterval";

/// 解析后的目标
///
/// 查询参数可选，未设置的参数由构建器默认值补齐
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub namespace: String,
    pub service: String,
    pub health_status_filter: Option<HealthStatusFilter>,
    pub max_results: Option<u32>,
    pub refresh_interval: Option<Duration>,
}

impl Target {
    /// 解析目标字符串
    pub fn parse(target: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(target).map_err(|e| ConfigError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != SCHEME {
            return Err(ConfigError::UnexpectedScheme(url.scheme().to_string()));
        }

        let namespace = decode(target, url.host_str().unwrap_or_default())?;
        if namespace.is_empty() {
            return Err(ConfigError::MissingNamespace);
        }

        let service = decode(target, url.path().trim_start_matches('/'))?;
        if service.is_empty() {
            return Err(ConfigError::MissingService);
        }

        let mut parsed = Target {
            namespace,
            service,
            health_status_filter: None,
            max_results: None,
            refresh_interval: None,
        };

        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                PARAM_HEALTH_STATUS_FILTER => {
                    parsed.health_status_filter = Some(value.parse()?);
                }
                PARAM_MAX_ADDRS => {
                    let max_results =
                        value
                            .parse::<u32>()
                            .map_err(|e| ConfigError::InvalidMaxResults {
                                value: value.to_string(),
                                reason: e.to_string(),
                            })?;
                    if max_results == 0 {
                        return Err(ConfigError::InvalidMaxResults {
                            value: value.to_string(),
                            reason: "must be greater than zero".to_string(),
                        });
                    }
                    parsed.max_results = Some(max_results);
                }
                PARAM_REFRESH_INTERVAL => {
                    let interval = humantime::parse_duration(&value).map_err(|e| {
                        ConfigError::InvalidRefreshInterval {
                            value: value.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
                    parsed.refresh_interval = Some(interval);
                }
                _ => {}
            }
        }

        Ok(parsed)
    }

    /// 使用全局默认值补齐为完整配置
    pub fn into_config(self) -> ResolverConfig {
        self.into_config_with(
            HealthStatusFilter::default(),
            DEFAULT_MAX_RESULTS,
            DEFAULT_REFRESH_INTERVAL,
        )
    }

    /// 使用给定默认值补齐为完整配置，目标中的查询参数优先
    pub fn into_config_with(
        self,
        health_status_filter: HealthStatusFilter,
        max_results: u32,
        refresh_interval: Duration,
    ) -> ResolverConfig {
        ResolverConfig {
            namespace: self.namespace,
            service: self.service,
            health_status_filter: self.health_status_filter.unwrap_or(health_status_filter),
            max_results: self.max_results.unwrap_or(max_results),
            refresh_interval: self.refresh_interval.unwrap_or(refresh_interval),
        }
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

impl ResolverConfig {
    /// 从目标字符串创建配置，未设置的参数使用默认值
    pub fn from_target(target: &str) -> Result<Self, ConfigError> {
        let config = Target::parse(target)?.into_config();
        config.validate()?;
        Ok(config)
    }
}

/// 根据配置构建目标字符串
///
/// 只输出与默认值不同的参数
pub fn build_target(config: &ResolverConfig) -> String {
    let mut target = format!(
        "{}://{}/{}",
        SCHEME,
        urlencoding::encode(&config.namespace),
        urlencoding::encode(&config.service)
    );

    let mut params = url::form_urlencoded::Serializer::new(String::new());
    if config.health_status_filter != HealthStatusFilter::default() {
        params.append_pair(PARAM_HEALTH_STATUS_FILTER, config.health_status_filter.as_str());
    }
    if config.max_results != DEFAULT_MAX_RESULTS {
        params.append_pair(PARAM_MAX_ADDRS, &config.max_results.to_string());
    }
    if config.refresh_interval != DEFAULT_REFRESH_INTERVAL {
        params.append_pair(
            PARAM_REFRESH_INTERVAL,
            &humantime::format_duration(config.refresh_interval).to_string(),
        );
    }

    let query = params.finish();
    if !query.is_empty() {
        target.push('?');
        target.push_str(&query);
    }
    target
}

fn decode(target: &str, raw: &str) -> Result<String, ConfigError> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| ConfigError::InvalidTarget {
            target: target.to_string(),
            reason: e.to_string(),
        })
}
