//! Flare Cloud Map Resolver
//!
//! Discovers the live endpoints of a namespace/service pair from a service registry and keeps
//! an RPC client's connection manager up to date, with periodic and on-demand refreshes.

pub mod config;
pub mod discovery;
pub mod error;
pub mod utils;

// Re-exports
pub use config::{HealthStatusFilter, ResolverConfig};
pub use error::{
    BoxError, ConfigError, RegistryError, RegistryErrorKind, ResolverError, Result,
    TranslateError,
};

pub use discovery::{
    BalanceChannelSink, DiscoverQuery, Endpoint, EventSink, HttpRegistryClient, InstanceRecord,
    RegistryClient, ResolutionState, Resolver, ResolverBuilder, ResolverEvent, ResolverEvents,
    ResolverSink, ResolverState, SCHEME, StaticRegistry, Target, build_target, translate,
};
pub use utils::init_tracing;
