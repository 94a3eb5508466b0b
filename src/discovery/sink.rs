//! 消费端抽象和实现
//!
//! 解析器只向消费端推送完整的地址集合或错误通知，
//! 如何维护连接、如何对比新旧集合由消费端自己决定

use std::collections::HashSet;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::{Mutex, mpsc};
use tonic::transport::Endpoint as TonicEndpoint;
use tonic::transport::channel::Change;
use tracing::{debug, warn};

use crate::discovery::instance::ResolutionState;
use crate::error::{BoxError, RegistryError};

/// 消费端 trait
///
/// 通常由 RPC 客户端的连接管理器实现
#[async_trait]
pub trait ResolverSink: Send + Sync {
    /// 发布最新的完整地址集合
    ///
    /// 可能被重复调用，集合可能与上一次重叠或缩小。返回的错误只会被记录日志
    async fn update_addresses(&self, state: ResolutionState) -> Result<(), BoxError>;

    /// 通知一次注册中心查询失败
    ///
    /// 只是通知，之前发布的地址集合仍然有效
    async fn report_error(&self, error: RegistryError);
}

/// 对接 tonic 负载均衡 Channel 的消费端
///
/// 将每次发布的地址集合与已插入的地址对比，转换为 `Change::Insert` / `Change::Remove`
pub struct BalanceChannelSink {
    tx: mpsc::Sender<Change<String, TonicEndpoint>>,
    inserted: Mutex<HashSet<String>>,
    configure: Option<Box<dyn Fn(TonicEndpoint) -> TonicEndpoint + Send + Sync>>,
}

impl BalanceChannelSink {
    /// 使用 `Channel::balance_channel` 返回的 sender 创建
    pub fn new(tx: mpsc::Sender<Change<String, TonicEndpoint>>) -> Self {
        Self {
            tx,
            inserted: Mutex::new(HashSet::new()),
            configure: None,
        }
    }

    /// 设置 Endpoint 定制函数（超时、TLS 等）
    pub fn with_endpoint_config<F>(mut self, configure: F) -> Self
    where
        F: Fn(TonicEndpoint) -> TonicEndpoint + Send + Sync + 'static,
    {
        self.configure = Some(Box::new(configure));
        self
    }

    fn build_endpoint(&self, uri: String) -> Result<TonicEndpoint, BoxError> {
        let endpoint = TonicEndpoint::from_shared(uri.clone())
            .map_err(|e| format!("Invalid URI {}: {}", uri, e))?;
        Ok(match &self.configure {
            Some(configure) => configure(endpoint),
            None => endpoint,
        })
    }
}

#[async_trait]
impl ResolverSink for BalanceChannelSink {
    async fn update_addresses(&self, state: ResolutionState) -> Result<(), BoxError> {
        let mut inserted = self.inserted.lock().await;
        let latest: HashSet<&str> = state.addresses().collect();

        // 先插入新地址再移除旧地址，避免出现空窗口
        for endpoint in &state.endpoints {
            if inserted.contains(&endpoint.address) {
                continue;
            }
            let tonic_endpoint = match self.build_endpoint(endpoint.to_grpc_uri()) {
                Ok(ep) => ep,
                Err(e) => {
                    warn!(address = %endpoint.address, error = %e, "Skipping endpoint");
                    continue;
                }
            };
            self.tx
                .send(Change::Insert(endpoint.address.clone(), tonic_endpoint))
                .await
                .map_err(|_| "balance channel closed")?;
            inserted.insert(endpoint.address.clone());
            debug!(address = %endpoint.address, "Endpoint inserted");
        }

        let stale: Vec<String> = inserted
            .iter()
            .filter(|addr| !latest.contains(addr.as_str()))
            .cloned()
            .collect();
        for addr in stale {
            self.tx
                .send(Change::Remove(addr.clone()))
                .await
                .map_err(|_| "balance channel closed")?;
            inserted.remove(&addr);
            debug!(address = %addr, "Endpoint removed");
        }

        Ok(())
    }

    async fn report_error(&self, error: RegistryError) {
        warn!(kind = %error.kind(), error = %error.message(), "Keeping last known endpoints");
    }
}

/// 解析器事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverEvent {
    /// 新的地址集合
    Update(ResolutionState),
    /// 注册中心查询失败
    Error(RegistryError),
}

/// 将解析结果转发为事件的消费端
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ResolverEvent>,
}

impl EventSink {
    /// 创建事件消费端和对应的事件流
    ///
    /// 事件流读取过慢时刷新循环会在发送处等待
    pub fn channel(buffer: usize) -> (Self, ResolverEvents) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, ResolverEvents { rx })
    }
}

#[async_trait]
impl ResolverSink for EventSink {
    async fn update_addresses(&self, state: ResolutionState) -> Result<(), BoxError> {
        self.tx
            .send(ResolverEvent::Update(state))
            .await
            .map_err(|_| "event receiver dropped".into())
    }

    async fn report_error(&self, error: RegistryError) {
        if self.tx.send(ResolverEvent::Error(error)).await.is_err() {
            debug!("Event receiver dropped, discarding error");
        }
    }
}

/// 解析器事件流
///
/// 所有 `EventSink` 被释放（解析器关闭）后结束
pub struct ResolverEvents {
    rx: mpsc::Receiver<ResolverEvent>,
}

impl ResolverEvents {
    /// 等待下一个事件
    pub async fn recv(&mut self) -> Option<ResolverEvent> {
        self.rx.recv().await
    }

    /// 非阻塞地获取事件
    pub fn try_recv(&mut self) -> Option<ResolverEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for ResolverEvents {
    type Item = ResolverEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
