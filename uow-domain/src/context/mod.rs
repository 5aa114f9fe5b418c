//! 持久化上下文（DbContext）
//!
//! 工作单元边界：按实体类型维护跟踪表，记录 Added/Modified/Deleted/Unchanged 状态，
//! 并在提交时将待定变更整理为有序变更集交给存储。
//!
//! - `set::<E>()`：类型化集合视图（增、附加、移除、分离、本地查找）；
//! - `find::<E>()`：先查跟踪表，再回落到存储，命中后以 Unchanged 附加；
//! - `save_changes` / `save_changes_async`：同步等待或派发到后台的提交；
//! - `release`：幂等释放，释放后的任何操作返回 `Disposed`。
//!
mod commit;
mod entity_set;

pub use commit::CommitHandle;
pub use entity_set::{EntitySet, EntityState};
pub(crate) use entity_set::Checkpoint;

use crate::config::RepositoryConfig;
use crate::entity::Entity;
use crate::error::{RepositoryError, RepositoryResult as Result};
use crate::key_resolver::{KeyResolver, MetadataSource};
use crate::model::Model;
use crate::persist::{ChangeSet, CommitReport, Store};
use crate::repository::Query;
use entity_set::{Table, TrackedTable};
use indexmap::IndexMap;
use std::any::TypeId;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct DbContext {
    store: Arc<dyn Store>,
    model: Arc<Model>,
    config: RepositoryConfig,
    tables: IndexMap<TypeId, Box<dyn TrackedTable>>,
    released: bool,
}

impl MetadataSource for DbContext {
    fn model(&self) -> &Model {
        &self.model
    }
}

impl DbContext {
    pub fn new(store: Arc<dyn Store>, model: impl Into<Arc<Model>>) -> Self {
        Self {
            store,
            model: model.into(),
            config: RepositoryConfig::default(),
            tables: IndexMap::new(),
            released: false,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub(crate) fn configure(&mut self, config: RepositoryConfig) {
        debug!(?config, "context configured");
        self.config = config;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn ensure_active(&self) -> Result<()> {
        if self.released {
            return Err(RepositoryError::Disposed);
        }
        Ok(())
    }

    /// 类型化集合视图；类型未在模型中登记或未声明主键时报错
    pub fn set<E: Entity>(&mut self) -> Result<EntitySet<'_, E>> {
        self.ensure_active()?;
        KeyResolver::descriptor::<E, Self>(self)?;

        let table = self
            .tables
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Table::<E>::default()) as Box<dyn TrackedTable>);
        let found = table.entity_type();
        let table = table
            .as_any_mut()
            .downcast_mut::<Table<E>>()
            .ok_or_else(|| RepositoryError::TypeMismatch {
                expected: E::TYPE.to_string(),
                found: found.to_string(),
            })?;

        Ok(EntitySet::new(table))
    }

    fn table<E: Entity>(&self) -> Option<&Table<E>> {
        self.tables
            .get(&TypeId::of::<E>())
            .and_then(|t| t.as_any().downcast_ref::<Table<E>>())
    }

    /// 已跟踪且未标记删除的实例（按跟踪顺序）
    pub fn local<E: Entity>(&self) -> Vec<E> {
        self.table::<E>()
            .map(|t| t.local().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entry_state<E: Entity>(&self, key: &E::Key) -> EntityState {
        self.table::<E>()
            .map(|t| t.state(key))
            .unwrap_or(EntityState::Detached)
    }

    pub fn set_entry_state<E: Entity>(&mut self, entity: E, state: EntityState) -> Result<()> {
        self.set::<E>()?.set_state(entity, state)
    }

    /// 按主键查找：先查跟踪表，再查存储
    pub async fn find<E: Entity>(&mut self, key: &E::Key) -> Result<Option<E>> {
        {
            let set = self.set::<E>()?;
            match set.state(key) {
                EntityState::Detached => {}
                EntityState::Deleted => return Ok(None),
                _ => return Ok(set.find_local(key).cloned()),
            }
        }

        let encoded = KeyResolver::encode_key::<E>(key)?;
        let store = Arc::clone(&self.store);
        let Some(row) = store.find(E::TYPE, &encoded).await? else {
            return Ok(None);
        };

        let entity: E = row.to_entity()?;
        self.set::<E>()?.attach(entity.clone())?;
        Ok(Some(entity))
    }

    /// 针对存储中全部行的延迟查询
    pub fn query<E: Entity>(&self) -> Result<Query<E>> {
        self.ensure_active()?;
        KeyResolver::descriptor::<E, Self>(self)?;
        Ok(Query::new(Arc::clone(&self.store), &self.config))
    }

    /// 将就地修改过的 Unchanged 实例提升为 Modified，返回提升数量
    pub fn detect_changes(&mut self) -> Result<usize> {
        self.ensure_active()?;
        let mut promoted = 0;
        for table in self.tables.values_mut() {
            promoted += table.detect_changes()?;
        }
        Ok(promoted)
    }

    pub fn has_changes(&self) -> bool {
        self.tables.values().any(|t| t.has_changes())
    }

    /// 跟踪中的实例总数（含已标记删除）
    pub fn tracked_count(&self) -> usize {
        self.tables.values().map(|t| t.tracked()).sum()
    }

    fn prepare_commit(&mut self) -> Result<ChangeSet> {
        self.ensure_active()?;
        if self.config.auto_detect_changes() {
            self.detect_changes()?;
        }

        let validate = self.config.validate_on_save();
        let mut changes = Vec::new();
        for table in self.tables.values() {
            table.collect_changes(validate, &mut changes)?;
        }

        Ok(ChangeSet::new(changes, self.config.ensure_transactions()))
    }

    fn accept_changes(&mut self) -> Result<()> {
        for table in self.tables.values_mut() {
            table.accept_changes()?;
        }
        Ok(())
    }

    /// 提交全部待定变更并等待存储完成；失败时跟踪状态保持不变，可重试
    pub async fn save_changes(&mut self) -> Result<CommitReport> {
        let changes = self.prepare_commit()?;
        if changes.is_empty() {
            debug!("no pending changes");
            return Ok(CommitReport::default());
        }

        let size = changes.len();
        let store = Arc::clone(&self.store);
        let report = store.apply(changes).await?;
        self.accept_changes()?;

        info!(
            size,
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            "changes committed"
        );
        Ok(report)
    }

    /// 将提交派发到 tokio 运行时并立即返回句柄。
    ///
    /// 派发时跟踪状态即视为已接受；提交失败只能通过句柄观察到，此时应丢弃该工作单元。
    pub fn save_changes_async(&mut self) -> Result<CommitHandle> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
            RepositoryError::CommitAborted {
                reason: err.to_string(),
            }
        })?;

        let changes = self.prepare_commit()?;
        self.accept_changes()?;

        let size = changes.len();
        let store = Arc::clone(&self.store);
        let task = runtime.spawn(async move {
            if changes.is_empty() {
                return Ok(CommitReport::default());
            }
            store.apply(changes).await
        });

        info!(size, "commit dispatched");
        Ok(CommitHandle::new(task))
    }

    /// 释放跟踪状态；仅首次调用生效，返回是否真正执行了释放
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }

        if self.has_changes() {
            warn!("context released with uncommitted changes");
        }
        let tracked = self.tracked_count();
        self.tables.clear();
        self.released = true;
        info!(tracked, "context released");
        true
    }
}
