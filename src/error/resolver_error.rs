//! 解析器错误类型

use super::code::RegistryErrorKind;
use thiserror::Error;

/// 配置与目标字符串解析错误
///
/// 全部在构造阶段返回，不会出现在运行期
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unexpected scheme: {0}")]
    UnexpectedScheme(String),

    #[error("cannot parse target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("namespace is required")]
    MissingNamespace,

    #[error("service is required")]
    MissingService,

    #[error("invalid healthStatusFilter: {0}")]
    InvalidHealthStatusFilter(String),

    #[error("cannot parse maxAddrs {value:?}: {reason}")]
    InvalidMaxResults { value: String, reason: String },

    #[error("cannot parse refreshInterval {value:?}: {reason}")]
    InvalidRefreshInterval { value: String, reason: String },

    #[error("invalid registry endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// 注册中心查询错误
///
/// 对单个刷新周期是终止性的，但不会改变解析器状态，也不会停止后续周期
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RegistryError {
    kind: RegistryErrorKind,
    message: String,
}

impl RegistryError {
    /// 创建指定类别的错误
    pub fn new(kind: RegistryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// 根据注册中心返回的错误代码创建错误
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        Self::new(RegistryErrorKind::from_code(code), message)
    }

    /// 创建无法归类的错误
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(RegistryErrorKind::Unclassified, message)
    }

    /// 错误类别
    pub fn kind(&self) -> RegistryErrorKind {
        self.kind
    }

    /// 原始错误信息
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 单个实例转换失败
///
/// 只导致该实例被丢弃，不会中断整批转换
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("instance {instance_id} is missing attribute {attribute}")]
    MissingAttribute {
        instance_id: String,
        attribute: &'static str,
    },
}

/// 解析器构建错误
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("registry client is required")]
    MissingRegistry,
}

/// 解析器结果类型
pub type Result<T> = std::result::Result<T, ResolverError>;

/// 消费端回调使用的通用错误类型
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
