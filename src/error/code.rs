//! 注册中心错误分类
//!
//! 分类只用于日志和观测，所有类别的处理方式完全一致：记录日志并转发给消费端

use serde::{Deserialize, Serialize};
use std::fmt;

/// 注册中心查询失败的类别
///
/// 字符串形式与注册中心返回的错误代码保持一致（如 `ServiceNotFound`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryErrorKind {
    /// 配置的服务在注册中心中已不存在
    ServiceNotFound,
    /// 配置的命名空间在注册中心中已不存在
    NamespaceNotFound,
    /// 请求参数不合法（校验之后仍出现说明配置有缺陷）
    InvalidInput,
    /// 调用方被注册中心限流
    RequestLimitExceeded,
    /// 其它无法归类的错误，原样转发
    Unclassified,
}

impl RegistryErrorKind {
    /// 获取错误代码字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryErrorKind::ServiceNotFound => "ServiceNotFound",
            RegistryErrorKind::NamespaceNotFound => "NamespaceNotFound",
            RegistryErrorKind::InvalidInput => "InvalidInput",
            RegistryErrorKind::RequestLimitExceeded => "RequestLimitExceeded",
            RegistryErrorKind::Unclassified => "Unclassified",
        }
    }

    /// 从注册中心返回的错误代码解析类别
    ///
    /// 兼容带命名空间前缀（`com.amazonaws.servicediscovery#ServiceNotFound`）
    /// 和带附加信息后缀（`ServiceNotFound:http://...`）的写法，无法识别的代码归为 `Unclassified`
    pub fn from_code(code: &str) -> Self {
        let code = code.rsplit('#').next().unwrap_or(code);
        let code = code.split(':').next().unwrap_or(code).trim();

        match code {
            "ServiceNotFound" => RegistryErrorKind::ServiceNotFound,
            "NamespaceNotFound" => RegistryErrorKind::NamespaceNotFound,
            "InvalidInput" => RegistryErrorKind::InvalidInput,
            "RequestLimitExceeded" => RegistryErrorKind::RequestLimitExceeded,
            _ => RegistryErrorKind::Unclassified,
        }
    }

    /// 目标服务或命名空间是否已从注册中心消失
    pub fn is_target_missing(&self) -> bool {
        matches!(
            self,
            RegistryErrorKind::ServiceNotFound | RegistryErrorKind::NamespaceNotFound
        )
    }
}

impl fmt::Display for RegistryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
