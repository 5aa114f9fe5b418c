//! 通用仓储（Repository）
//!
//! 以持久化上下文为工作单元，为任意已登记的实体类型提供：
//! - 基于主键身份的增删改查（`insert`/`update`/`delete`/`delete_by_id`/`get_by_id`）；
//! - 批量操作：逐个应用状态迁移，随后（按需）提交，最后按输入顺序通知；
//! - 延迟查询（`as_queryable`）与本地跟踪视图（`local`）；
//! - 变更通知：提交成功后向观察者同步分发 `DataEvent`；
//! - 显式且幂等的释放（`dispose`，同时在 `Drop` 时执行）。
//!
//! 主键一律由 `KeyResolver` 依据模型中的实体描述解析。
//!
mod events;
mod options;
mod query;

pub use events::{ChannelObserver, DataEvent, FnObserver, ObserverId, Observers, RepositoryObserver};
pub use options::{CommitOutcome, SaveOptions};
pub use query::Query;

use crate::config::RepositoryConfig;
use crate::context::{Checkpoint, DbContext, EntityState};
use crate::entity::Entity;
use crate::error::{RepositoryError, RepositoryResult as Result};
use crate::key_resolver::KeyResolver;
use crate::persist::CommitReport;
use tracing::{debug, info, warn};

pub struct Repository<E: Entity> {
    context: DbContext,
    observers: Observers<E>,
    disposed: bool,
}

impl<E: Entity> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity_type", &E::TYPE)
            .field("config", self.context.config())
            .field("observers", &self.observers.len())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    /// 以默认配置包装上下文
    pub fn new(context: DbContext) -> Result<Self> {
        Self::with_config(context, RepositoryConfig::default())
    }

    /// 包装上下文并一次性应用配置；实体类型须已在模型中登记并声明主键
    pub fn with_config(mut context: DbContext, config: RepositoryConfig) -> Result<Self> {
        KeyResolver::descriptor::<E, DbContext>(&context)?;
        context.configure(config);
        debug!(entity_type = E::TYPE, "repository created");

        Ok(Self {
            context,
            observers: Observers::default(),
            disposed: false,
        })
    }

    pub fn with_observers(mut self, observers: Observers<E>) -> Self {
        self.observers = observers;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        self.context.config()
    }

    pub fn context(&self) -> &DbContext {
        &self.context
    }

    pub fn subscribe(&mut self, observer: impl RepositoryObserver<E> + 'static) -> ObserverId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn observers(&self) -> &Observers<E> {
        &self.observers
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn ensure_active(&self) -> Result<()> {
        if self.disposed {
            return Err(RepositoryError::Disposed);
        }
        Ok(())
    }

    // --- 单实体状态迁移（不提交、不通知） ---

    fn stage_insert(&mut self, entity: E) -> Result<E::Key> {
        let key = KeyResolver::resolve(&self.context, &entity)?;
        self.context.set::<E>()?.add(entity)?;
        Ok(key)
    }

    fn stage_update(&mut self, entity: E) -> Result<E::Key> {
        let key = KeyResolver::resolve(&self.context, &entity)?;
        let mut set = self.context.set::<E>()?;

        let prior = set.state(&key);
        let state = match prior {
            EntityState::Detached => EntityState::Modified,
            EntityState::Added => EntityState::Added,
            EntityState::Unchanged | EntityState::Modified | EntityState::Deleted => {
                EntityState::Modified
            }
        };
        if prior != EntityState::Detached {
            set.detach(&key);
            warn!(entity_type = E::TYPE, key = ?key, ?prior, "stale tracked instance detached");
        }

        set.set_state(entity, state)?;
        Ok(key)
    }

    fn stage_delete(&mut self, entity: E) -> Result<E::Key> {
        let key = KeyResolver::resolve(&self.context, &entity)?;
        let mut set = self.context.set::<E>()?;
        if set.state(&key) == EntityState::Detached {
            set.attach(entity)?;
        }
        set.remove(&key)?;
        Ok(key)
    }

    async fn commit(&mut self, opts: SaveOptions) -> Result<CommitOutcome> {
        if !opts.save_after {
            return Ok(CommitOutcome::Skipped);
        }
        if opts.run_async {
            Ok(CommitOutcome::Pending(self.context.save_changes_async()?))
        } else {
            Ok(CommitOutcome::Completed(self.context.save_changes().await?))
        }
    }

    /// 逐个迁移整批实体；任一元素失败时按逆序还原本批已迁移的跟踪记录
    fn stage_batch<F>(
        &mut self,
        entities: impl IntoIterator<Item = E>,
        stage: F,
    ) -> Result<Vec<DataEvent<E>>>
    where
        F: Fn(&mut Self, E) -> Result<DataEvent<E>>,
    {
        let mut checkpoints = Vec::new();
        let mut events = Vec::new();
        for entity in entities {
            let staged = self
                .checkpoint(&entity, &mut checkpoints)
                .and_then(|()| stage(self, entity));
            match staged {
                Ok(event) => events.push(event),
                Err(err) => {
                    warn!(
                        entity_type = E::TYPE,
                        staged = events.len(),
                        error = %err,
                        "batch aborted, staged transitions reverted"
                    );
                    self.rollback(checkpoints);
                    return Err(err);
                }
            }
        }
        Ok(events)
    }

    fn checkpoint(&mut self, entity: &E, checkpoints: &mut Vec<Checkpoint<E>>) -> Result<()> {
        let key = KeyResolver::resolve(&self.context, entity)?;
        checkpoints.push(self.context.set::<E>()?.checkpoint(&key));
        Ok(())
    }

    fn rollback(&mut self, checkpoints: Vec<Checkpoint<E>>) {
        if let Ok(mut set) = self.context.set::<E>() {
            for checkpoint in checkpoints.into_iter().rev() {
                set.restore(checkpoint);
            }
        }
    }

    fn notify_all(&self, events: Vec<DataEvent<E>>) {
        for event in &events {
            self.observers.notify(event);
        }
    }

    // --- 单实体操作 ---

    pub async fn insert(&mut self, entity: E, opts: impl Into<SaveOptions>) -> Result<CommitOutcome> {
        self.ensure_active()?;
        let key = self.stage_insert(entity.clone())?;
        let outcome = self.commit(opts.into()).await?;
        self.observers.notify(&DataEvent::Added { key, entity });
        Ok(outcome)
    }

    /// 已跟踪同主键的旧实例会被分离，不作为错误返回
    pub async fn update(&mut self, entity: E, opts: impl Into<SaveOptions>) -> Result<CommitOutcome> {
        self.ensure_active()?;
        let key = self.stage_update(entity.clone())?;
        let outcome = self.commit(opts.into()).await?;
        self.observers.notify(&DataEvent::Updated { key, entity });
        Ok(outcome)
    }

    pub async fn delete(&mut self, entity: E, opts: impl Into<SaveOptions>) -> Result<CommitOutcome> {
        self.ensure_active()?;
        let key = self.stage_delete(entity)?;
        let outcome = self.commit(opts.into()).await?;
        self.observers.notify(&DataEvent::Deleted { key });
        Ok(outcome)
    }

    /// 按主键删除；主键不存在时返回 `NotFound` 且不产生事件
    pub async fn delete_by_id(&mut self, id: E::Key, opts: impl Into<SaveOptions>) -> Result<CommitOutcome> {
        self.ensure_active()?;
        let Some(entity) = self.get_by_id(&id).await? else {
            return Err(RepositoryError::not_found(format!("{} {:?}", E::TYPE, id)));
        };
        self.stage_delete(entity)?;
        let outcome = self.commit(opts.into()).await?;
        self.observers.notify(&DataEvent::Deleted { key: id });
        Ok(outcome)
    }

    pub async fn get_by_id(&mut self, id: &E::Key) -> Result<Option<E>> {
        self.ensure_active()?;
        self.context.find::<E>(id).await
    }

    pub fn as_queryable(&self) -> Result<Query<E>> {
        self.ensure_active()?;
        self.context.query::<E>()
    }

    /// 已跟踪且未标记删除的实例
    pub fn local(&self) -> Result<Vec<E>> {
        self.ensure_active()?;
        Ok(self.context.local::<E>())
    }

    /// 就地修改已跟踪实例
    pub fn tracked_mut(&mut self, id: &E::Key) -> Result<Option<&mut E>> {
        self.ensure_active()?;
        Ok(self.context.set::<E>()?.into_local_mut(id))
    }

    pub fn entry_state(&self, id: &E::Key) -> EntityState {
        self.context.entry_state::<E>(id)
    }

    pub fn detect_changes(&mut self) -> Result<usize> {
        self.ensure_active()?;
        self.context.detect_changes()
    }

    // --- 批量操作：全部迁移 → 提交 → 按输入顺序通知 ---

    pub async fn bulk_insert(
        &mut self,
        entities: impl IntoIterator<Item = E>,
        opts: impl Into<SaveOptions>,
    ) -> Result<CommitOutcome> {
        self.ensure_active()?;
        let events = self.stage_batch(entities, |repo, entity| {
            let key = repo.stage_insert(entity.clone())?;
            Ok(DataEvent::Added { key, entity })
        })?;

        let outcome = self.commit(opts.into()).await?;
        debug!(entity_type = E::TYPE, count = events.len(), "bulk insert staged");
        self.notify_all(events);
        Ok(outcome)
    }

    pub async fn bulk_update(
        &mut self,
        entities: impl IntoIterator<Item = E>,
        opts: impl Into<SaveOptions>,
    ) -> Result<CommitOutcome> {
        self.ensure_active()?;
        let events = self.stage_batch(entities, |repo, entity| {
            let key = repo.stage_update(entity.clone())?;
            Ok(DataEvent::Updated { key, entity })
        })?;

        let outcome = self.commit(opts.into()).await?;
        debug!(entity_type = E::TYPE, count = events.len(), "bulk update staged");
        self.notify_all(events);
        Ok(outcome)
    }

    pub async fn bulk_delete(
        &mut self,
        entities: impl IntoIterator<Item = E>,
        opts: impl Into<SaveOptions>,
    ) -> Result<CommitOutcome> {
        self.ensure_active()?;
        let events = self.stage_batch(entities, |repo, entity| {
            let key = repo.stage_delete(entity)?;
            Ok(DataEvent::Deleted { key })
        })?;

        let outcome = self.commit(opts.into()).await?;
        debug!(entity_type = E::TYPE, count = events.len(), "bulk delete staged");
        self.notify_all(events);
        Ok(outcome)
    }

    /// 提交上下文中全部待定变更；`run_async` 时立即返回 `Pending` 句柄
    pub async fn save(&mut self, run_async: bool) -> Result<CommitOutcome> {
        self.ensure_active()?;
        self.commit(SaveOptions {
            save_after: true,
            run_async,
        })
        .await
    }

    /// 同步提交的便捷形式
    pub async fn save_changes(&mut self) -> Result<CommitReport> {
        self.ensure_active()?;
        self.context.save_changes().await
    }

    /// 释放上下文；仅首次调用生效
    pub fn dispose(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        self.context.release();
        self.observers.clear();
        info!(entity_type = E::TYPE, "repository disposed");
        true
    }
}

impl<E: Entity> Drop for Repository<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}
