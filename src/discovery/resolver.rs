//! 刷新协调器
//!
//! 每个解析器只有一个后台任务负责调用注册中心：
//! - 周期定时器和按需刷新信号都只是唤醒源，注册中心调用天然串行
//! - 按需刷新使用容量为 1 的队列，并发请求合并为一次额外刷新
//! - 关闭时先发送一次性关闭信号，再等待后台任务退出
//!
//! 注册中心调用没有超时：调用一直阻塞时 `close()` 也会一直等待

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::config::ResolverConfig;
use crate::discovery::backend::{DiscoverQuery, RegistryClient};
use crate::discovery::instance::translate_batch;
use crate::discovery::sink::ResolverSink;
use crate::error::{ConfigError, RegistryErrorKind};

/// 解析器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    /// 接收定时和按需刷新
    Running,
    /// 已请求关闭，不再发起新的查询
    Closing,
    /// 后台任务已退出
    Closed,
}

impl ResolverState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ResolverState::Running,
            1 => ResolverState::Closing,
            _ => ResolverState::Closed,
        }
    }
}

/// 后台任务的唤醒原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WakeReason {
    Tick,
    ResolveNow,
}

struct Shutdown {
    tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// 服务地址解析器
///
/// 构造时启动后台刷新任务，第一次查询在后台任务的第一轮循环中执行
///
/// # 使用示例
/// ```rust,no_run
/// use std::sync::Arc;
/// use flare_cloudmap_resolver::{EventSink, Resolver, ResolverConfig, StaticRegistry};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (sink, mut events) = EventSink::channel(16);
/// let resolver = Resolver::new(
///     ResolverConfig::new("example.local", "orders"),
///     Arc::new(StaticRegistry::default()),
///     Arc::new(sink),
/// )?;
///
/// let first = events.recv().await;
/// resolver.resolve_now();
/// resolver.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Resolver {
    resolve_tx: mpsc::Sender<()>,
    shutdown: Mutex<Option<Shutdown>>,
    state: Arc<AtomicU8>,
    namespace: String,
    service: String,
}

impl Resolver {
    /// 创建解析器并启动后台刷新任务
    ///
    /// 必须在 tokio 运行时中调用。命名空间或服务为空时返回错误
    pub fn new(
        config: ResolverConfig,
        registry: Arc<dyn RegistryClient>,
        sink: Arc<dyn ResolverSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (resolve_tx, resolve_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = Arc::new(AtomicU8::new(ResolverState::Running as u8));

        let watcher = Watcher {
            registry,
            sink,
            query: config.query(),
            refresh_interval: config.refresh_interval,
        };
        let task = tokio::spawn(watcher.run(shutdown_rx, resolve_rx));

        info!(
            namespace = %config.namespace,
            service = %config.service,
            health_status = %config.health_status_filter,
            max_results = config.max_results,
            refresh_interval = ?config.refresh_interval,
            "Resolver started"
        );

        Ok(Self {
            resolve_tx,
            shutdown: Mutex::new(Some(Shutdown {
                tx: Some(shutdown_tx),
                task,
            })),
            state,
            namespace: config.namespace,
            service: config.service,
        })
    }

    /// 请求一次额外刷新
    ///
    /// 不会阻塞。已有未处理的刷新请求时直接忽略
    pub fn resolve_now(&self) {
        match self.resolve_tx.try_send(()) {
            Ok(()) => debug!(service = %self.service, "Resolve now requested"),
            Err(TrySendError::Full(())) => {
                trace!(service = %self.service, "Resolve now already pending")
            }
            Err(TrySendError::Closed(())) => {
                trace!(service = %self.service, "Resolver closed, ignoring resolve now")
            }
        }
    }

    /// 关闭解析器
    ///
    /// 等待后台任务退出后返回，此后不会再调用消费端。重复调用直接返回
    pub async fn close(&self) {
        let mut shutdown = self.shutdown.lock().await;
        let Some(pending) = shutdown.as_mut() else {
            return;
        };

        if let Some(tx) = pending.tx.take() {
            self.state
                .store(ResolverState::Closing as u8, Ordering::SeqCst);
            info!(
                namespace = %self.namespace,
                service = %self.service,
                "Closing resolver"
            );
            let _ = tx.send(());
        }

        if let Err(e) = (&mut pending.task).await {
            error!(service = %self.service, error = %e, "Resolver task terminated abnormally");
        }
        *shutdown = None;
        self.state.store(ResolverState::Closed as u8, Ordering::SeqCst);

        info!(
            namespace = %self.namespace,
            service = %self.service,
            "Resolver closed"
        );
    }

    /// 当前生命周期状态
    pub fn state(&self) -> ResolverState {
        ResolverState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        // 未显式关闭时只发送关闭信号，不等待后台任务
        if let Some(pending) = self.shutdown.get_mut().as_mut() {
            if let Some(tx) = pending.tx.take() {
                let _ = tx.send(());
                warn!(
                    service = %self.service,
                    "Resolver dropped without close, background task detached"
                );
            }
        }
    }
}

/// 后台刷新任务
struct Watcher {
    registry: Arc<dyn RegistryClient>,
    sink: Arc<dyn ResolverSink>,
    query: DiscoverQuery,
    refresh_interval: Duration,
}

impl Watcher {
    async fn run(
        self,
        mut shutdown_rx: oneshot::Receiver<()>,
        mut resolve_rx: mpsc::Receiver<()>,
    ) {
        // 第一次 tick 立即完成，即第一轮循环执行首次查询
        let mut ticker = tokio::time::interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // biased：关闭信号与其它唤醒源同时就绪时优先关闭
            let reason = tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => WakeReason::Tick,
                signal = resolve_rx.recv() => match signal {
                    Some(()) => WakeReason::ResolveNow,
                    None => break,
                },
            };

            trace!(service = %self.query.service_name, reason = ?reason, "Resolver woke up");
            self.refresh().await;
        }

        debug!(
            namespace = %self.query.namespace_name,
            service = %self.query.service_name,
            "Resolver task stopped"
        );
    }

    /// 执行一次刷新周期
    async fn refresh(&self) {
        let records = match self.registry.discover_instances(&self.query).await {
            Ok(records) => records,
            Err(err) => {
                let hint = match err.kind() {
                    kind if kind.is_target_missing() => "target no longer exists in registry",
                    RegistryErrorKind::InvalidInput => "registry rejected request parameters",
                    RegistryErrorKind::RequestLimitExceeded => "throttled by registry",
                    _ => "registry lookup failed",
                };
                error!(
                    namespace = %self.query.namespace_name,
                    service = %self.query.service_name,
                    kind = %err.kind(),
                    error = %err.message(),
                    "{}", hint
                );
                self.sink.report_error(err).await;
                return;
            }
        };

        let state = translate_batch(&records);
        if state.is_empty() && !records.is_empty() {
            warn!(
                service = %self.query.service_name,
                dropped = records.len(),
                "No instance could be translated, keeping last published addresses"
            );
            return;
        }

        debug!(
            service = %self.query.service_name,
            count = state.len(),
            dropped = records.len() - state.len(),
            "Publishing resolved addresses"
        );
        if let Err(e) = self.sink.update_addresses(state).await {
            warn!(
                service = %self.query.service_name,
                error = %e,
                "Failed to update addresses"
            );
        }
    }
}
