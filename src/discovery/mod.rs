//! 服务发现与地址刷新模块
//!
//! 根据命名空间/服务持续从注册中心发现实例，转换为端点后推送给 RPC 客户端的连接管理器

pub mod backend;
pub mod factory;
pub mod instance;
pub mod resolver;
pub mod sink;
pub mod target;

pub use backend::{DiscoverQuery, HttpRegistryClient, RegistryClient, StaticRegistry};
pub use factory::ResolverBuilder;
pub use instance::{
    ATTR_INSTANCE_IPV4, ATTR_INSTANCE_PORT, Endpoint, InstanceRecord, ResolutionState, translate,
    translate_batch,
};
pub use resolver::{Resolver, ResolverState};
pub use sink::{BalanceChannelSink, EventSink, ResolverEvent, ResolverEvents, ResolverSink};
pub use target::{SCHEME, Target, build_target};
