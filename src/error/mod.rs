//! 错误处理模块
//!
//! 区分三类错误：构造阶段的配置错误、运行期的注册中心错误和单个实例的转换错误

pub mod code;
pub mod resolver_error;

pub use code::RegistryErrorKind;
pub use resolver_error::{
    BoxError, ConfigError, RegistryError, ResolverError, Result, TranslateError,
};
