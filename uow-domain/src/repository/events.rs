//! 数据变更事件与观察者（events）
//!
//! 每次成功的插入/更新/删除都会产生一个类型化事件，在调用方任务上同步分发给零个或多个观察者。
//! 观察者按订阅顺序收到事件；没有观察者时分发为空操作。
//!
use crate::entity::Entity;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// 数据变更事件
#[derive(Debug, Clone)]
pub enum DataEvent<E: Entity> {
    Added { key: E::Key, entity: E },
    Updated { key: E::Key, entity: E },
    Deleted { key: E::Key },
}

impl<E: Entity> DataEvent<E> {
    pub fn key(&self) -> &E::Key {
        match self {
            DataEvent::Added { key, .. }
            | DataEvent::Updated { key, .. }
            | DataEvent::Deleted { key } => key,
        }
    }

    /// 删除事件不携带实体
    pub fn entity(&self) -> Option<&E> {
        match self {
            DataEvent::Added { entity, .. } | DataEvent::Updated { entity, .. } => Some(entity),
            DataEvent::Deleted { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DataEvent::Added { .. } => "added",
            DataEvent::Updated { .. } => "updated",
            DataEvent::Deleted { .. } => "deleted",
        }
    }
}

/// 仓储观察者：三个回调均有空的默认实现，按需覆盖
pub trait RepositoryObserver<E: Entity>: Send + Sync {
    fn on_data_added(&self, _key: &E::Key, _entity: &E) {}

    fn on_data_updated(&self, _key: &E::Key, _entity: &E) {}

    fn on_data_deleted(&self, _key: &E::Key) {}

    /// 事件入口，默认按事件类型分派到上述回调
    fn on_event(&self, event: &DataEvent<E>) {
        match event {
            DataEvent::Added { key, entity } => self.on_data_added(key, entity),
            DataEvent::Updated { key, entity } => self.on_data_updated(key, entity),
            DataEvent::Deleted { key } => self.on_data_deleted(key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// 观察者列表（按订阅顺序分发）
pub struct Observers<E: Entity> {
    next_id: u64,
    entries: IndexMap<ObserverId, Arc<dyn RepositoryObserver<E>>>,
}

impl<E: Entity> Default for Observers<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: IndexMap::new(),
        }
    }
}

impl<E: Entity> std::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("ids", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<E: Entity> Observers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式追加观察者，便于在构造仓储前准备
    pub fn with(mut self, observer: impl RepositoryObserver<E> + 'static) -> Self {
        self.subscribe(observer);
        self
    }

    pub fn subscribe(&mut self, observer: impl RepositoryObserver<E> + 'static) -> ObserverId {
        self.subscribe_arc(Arc::new(observer))
    }

    pub fn subscribe_arc(&mut self, observer: Arc<dyn RepositoryObserver<E>>) -> ObserverId {
        self.next_id += 1;
        let id = ObserverId(self.next_id);
        self.entries.insert(id, observer);
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn notify(&self, event: &DataEvent<E>) {
        if self.entries.is_empty() {
            return;
        }
        debug!(
            entity_type = E::TYPE,
            event = event.kind(),
            key = ?event.key(),
            observers = self.entries.len(),
            "notifying observers"
        );
        for observer in self.entries.values() {
            observer.on_event(event);
        }
    }
}

/// 以闭包充当观察者
pub struct FnObserver<F>(F);

impl<F> FnObserver<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<E, F> RepositoryObserver<E> for FnObserver<F>
where
    E: Entity,
    F: Fn(&DataEvent<E>) + Send + Sync,
{
    fn on_event(&self, event: &DataEvent<E>) {
        (self.0)(event)
    }
}

/// 将事件转发到无界通道，供流式消费
pub struct ChannelObserver<E: Entity> {
    tx: mpsc::UnboundedSender<DataEvent<E>>,
}

impl<E: Entity> ChannelObserver<E> {
    pub fn new() -> (Self, UnboundedReceiverStream<DataEvent<E>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, UnboundedReceiverStream::new(rx))
    }
}

impl<E: Entity> RepositoryObserver<E> for ChannelObserver<E> {
    fn on_event(&self, event: &DataEvent<E>) {
        // 接收端已关闭时丢弃事件
        if self.tx.send(event.clone()).is_err() {
            debug!(entity_type = E::TYPE, "event receiver closed");
        }
    }
}
