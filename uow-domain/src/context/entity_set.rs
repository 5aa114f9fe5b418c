//! 类型化集合（EntitySet）与跟踪表
//!
//! 每个实体类型一张跟踪表，按主键记录实例及其状态；
//! 插入顺序即变更集顺序，保证提交与通知的确定性。
//!
use crate::entity::Entity;
use crate::error::{RepositoryError, RepositoryResult as Result};
use crate::key_resolver::KeyResolver;
use crate::persist::{Change, ChangeKind, SerializedEntity};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use tracing::debug;

/// 实体在上下文中的跟踪状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    Detached,
    Unchanged,
    Added,
    Modified,
    Deleted,
}

impl EntityState {
    /// 是否有待提交的变更
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            EntityState::Added | EntityState::Modified | EntityState::Deleted
        )
    }
}

#[derive(Clone)]
struct Entry<E> {
    entity: E,
    state: EntityState,
    /// 附加（或上次提交）时的快照，用于变更检测
    original: Option<Value>,
}

/// 单个主键在某一时刻的跟踪记录（含其在跟踪顺序中的位置），用于撤销未提交的迁移
pub(crate) struct Checkpoint<E: Entity> {
    key: E::Key,
    slot: Option<(usize, Entry<E>)>,
}

pub(crate) struct Table<E: Entity> {
    entries: IndexMap<E::Key, Entry<E>>,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<E: Entity> Table<E> {
    pub(crate) fn state(&self, key: &E::Key) -> EntityState {
        self.entries
            .get(key)
            .map(|e| e.state)
            .unwrap_or(EntityState::Detached)
    }

    pub(crate) fn local(&self) -> impl Iterator<Item = &E> + '_ {
        self.entries
            .values()
            .filter(|e| e.state != EntityState::Deleted)
            .map(|e| &e.entity)
    }

    pub(crate) fn find_local(&self, key: &E::Key) -> Option<&E> {
        self.entries
            .get(key)
            .filter(|e| e.state != EntityState::Deleted)
            .map(|e| &e.entity)
    }

    fn put(&mut self, key: E::Key, entity: E, state: EntityState) -> Result<()> {
        let original = match state {
            EntityState::Unchanged => Some(serde_json::to_value(&entity)?),
            _ => self.entries.get(&key).and_then(|e| e.original.clone()),
        };
        debug!(entity_type = E::TYPE, key = ?key, ?state, "entity tracked");
        self.entries.insert(
            key,
            Entry {
                entity,
                state,
                original,
            },
        );
        Ok(())
    }

    fn detach(&mut self, key: &E::Key) -> Option<E> {
        let entry = self.entries.shift_remove(key)?;
        debug!(entity_type = E::TYPE, key = ?key, from = ?entry.state, "entity detached");
        Some(entry.entity)
    }
}

/// 类型擦除后的跟踪表，供上下文统一检测、收集与接受变更
pub(crate) trait TrackedTable: Send + Sync {
    fn entity_type(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn tracked(&self) -> usize;
    fn has_changes(&self) -> bool;
    fn detect_changes(&mut self) -> Result<usize>;
    fn collect_changes(&self, validate: bool, out: &mut Vec<Change>) -> Result<()>;
    fn accept_changes(&mut self) -> Result<()>;
}

impl<E: Entity> TrackedTable for Table<E> {
    fn entity_type(&self) -> &'static str {
        E::TYPE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn tracked(&self) -> usize {
        self.entries.len()
    }

    fn has_changes(&self) -> bool {
        self.entries.values().any(|e| e.state.is_pending())
    }

    fn detect_changes(&mut self) -> Result<usize> {
        let mut promoted = 0;
        for (key, entry) in self.entries.iter_mut() {
            if entry.state != EntityState::Unchanged {
                continue;
            }
            let current = serde_json::to_value(&entry.entity)?;
            if entry.original.as_ref() != Some(&current) {
                entry.state = EntityState::Modified;
                promoted += 1;
                debug!(entity_type = E::TYPE, key = ?key, "change detected");
            }
        }
        Ok(promoted)
    }

    fn collect_changes(&self, validate: bool, out: &mut Vec<Change>) -> Result<()> {
        for (key, entry) in self.entries.iter() {
            let kind = match entry.state {
                EntityState::Added => ChangeKind::Insert,
                EntityState::Modified => ChangeKind::Update,
                EntityState::Deleted => ChangeKind::Delete,
                EntityState::Unchanged | EntityState::Detached => continue,
            };

            if validate && kind != ChangeKind::Delete {
                if let Err(reason) = entry.entity.validate() {
                    return Err(RepositoryError::Validation {
                        entity_type: E::TYPE.to_string(),
                        key: KeyResolver::encode_key::<E>(key)?,
                        reason,
                    });
                }
            }

            out.push(Change::new(kind, SerializedEntity::from_entity(&entry.entity)?));
        }
        Ok(())
    }

    fn accept_changes(&mut self) -> Result<()> {
        self.entries
            .retain(|_, e| e.state != EntityState::Deleted);

        for entry in self.entries.values_mut() {
            if entry.state.is_pending() {
                entry.original = Some(serde_json::to_value(&entry.entity)?);
                entry.state = EntityState::Unchanged;
            }
        }
        Ok(())
    }
}

/// 某一实体类型的跟踪视图（增、附加、移除、分离与本地查找）
pub struct EntitySet<'a, E: Entity> {
    table: &'a mut Table<E>,
}

impl<'a, E: Entity> EntitySet<'a, E> {
    pub(crate) fn new(table: &'a mut Table<E>) -> Self {
        Self { table }
    }

    /// 以 Added 状态加入；同一主键已被跟踪（非 Deleted）时报身份冲突
    pub fn add(&mut self, entity: E) -> Result<()> {
        let key = entity.key();
        match self.table.state(&key) {
            EntityState::Detached => self.table.put(key, entity, EntityState::Added),
            // 行仍在存储中，重新加入即以新值覆盖
            EntityState::Deleted => self.table.put(key, entity, EntityState::Modified),
            _ => Err(identity_conflict::<E>(&key)),
        }
    }

    /// 以 Unchanged 状态附加
    pub fn attach(&mut self, entity: E) -> Result<()> {
        let key = entity.key();
        match self.table.state(&key) {
            EntityState::Detached => self.table.put(key, entity, EntityState::Unchanged),
            _ => Err(identity_conflict::<E>(&key)),
        }
    }

    /// 标记删除；未提交的新增直接分离
    pub fn remove(&mut self, key: &E::Key) -> Result<()> {
        match self.table.state(key) {
            EntityState::Added => {
                self.table.detach(key);
                Ok(())
            }
            EntityState::Unchanged | EntityState::Modified => {
                if let Some(entry) = self.table.entries.get_mut(key) {
                    entry.state = EntityState::Deleted;
                    debug!(entity_type = E::TYPE, key = ?key, "entity marked deleted");
                }
                Ok(())
            }
            EntityState::Deleted => Ok(()),
            EntityState::Detached => Err(RepositoryError::not_found(format!(
                "{} {:?} is not tracked",
                E::TYPE,
                key
            ))),
        }
    }

    /// 停止跟踪并返回被跟踪的实例
    pub fn detach(&mut self, key: &E::Key) -> Option<E> {
        self.table.detach(key)
    }

    pub fn find_local(&self, key: &E::Key) -> Option<&E> {
        self.table.find_local(key)
    }

    /// 就地修改已跟踪实例，由变更检测识别为 Modified
    pub fn find_local_mut(&mut self, key: &E::Key) -> Option<&mut E> {
        self.table
            .entries
            .get_mut(key)
            .filter(|e| e.state != EntityState::Deleted)
            .map(|e| &mut e.entity)
    }

    /// 同 `find_local_mut`，借用期限延续到集合视图所借用的上下文
    pub fn into_local_mut(self, key: &E::Key) -> Option<&'a mut E> {
        self.table
            .entries
            .get_mut(key)
            .filter(|e| e.state != EntityState::Deleted)
            .map(|e| &mut e.entity)
    }

    /// 已跟踪且未标记删除的实例
    pub fn local(&self) -> impl Iterator<Item = &E> + '_ {
        self.table.local()
    }

    pub fn state(&self, key: &E::Key) -> EntityState {
        self.table.state(key)
    }

    /// 直接设置跟踪状态；传入实例会替换同主键的已跟踪实例
    pub fn set_state(&mut self, entity: E, state: EntityState) -> Result<()> {
        let key = entity.key();
        match (self.table.state(&key), state) {
            (_, EntityState::Detached) => {
                self.table.detach(&key);
                Ok(())
            }
            (EntityState::Added, EntityState::Deleted) => {
                self.table.detach(&key);
                Ok(())
            }
            (_, state) => self.table.put(key, entity, state),
        }
    }

    /// 跟踪中的实例数（含已标记删除）
    pub fn tracked(&self) -> usize {
        self.table.entries.len()
    }

    pub(crate) fn checkpoint(&self, key: &E::Key) -> Checkpoint<E> {
        let slot = self
            .table
            .entries
            .get_full(key)
            .map(|(index, _, entry)| (index, entry.clone()));
        Checkpoint {
            key: key.clone(),
            slot,
        }
    }

    /// 还原检查点记录的跟踪记录；多个检查点须按记录的逆序还原
    pub(crate) fn restore(&mut self, checkpoint: Checkpoint<E>) {
        let Checkpoint { key, slot } = checkpoint;
        self.table.entries.shift_remove(&key);
        if let Some((index, entry)) = slot {
            let index = index.min(self.table.entries.len());
            self.table.entries.shift_insert(index, key, entry);
        }
    }
}

fn identity_conflict<E: Entity>(key: &E::Key) -> RepositoryError {
    RepositoryError::IdentityConflict {
        entity_type: E::TYPE.to_string(),
        key: format!("{key:?}"),
    }
}
