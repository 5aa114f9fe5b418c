//! 存储协议（Store）
//!
//! 底层持久化引擎只需按类型名与规范主键读取行，并整体应用一次提交产生的变更集。
//! 引擎自身的错误（约束冲突、连接失败等）原样返回给调用方。
//!
use crate::{error::RepositoryResult as Result, persist::SerializedEntity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[async_trait]
pub trait Store: Send + Sync {
    /// 按主键读取一行
    async fn find(&self, entity_type: &str, key: &str) -> Result<Option<SerializedEntity>>;

    /// 读取某类型的全部行
    async fn scan(&self, entity_type: &str) -> Result<Vec<SerializedEntity>>;

    /// 应用变更集
    async fn apply(&self, changes: ChangeSet) -> Result<CommitReport>;
}

#[async_trait]
impl<T> Store for Arc<T>
where
    T: Store + ?Sized,
{
    async fn find(&self, entity_type: &str, key: &str) -> Result<Option<SerializedEntity>> {
        (**self).find(entity_type, key).await
    }

    async fn scan(&self, entity_type: &str) -> Result<Vec<SerializedEntity>> {
        (**self).scan(entity_type).await
    }

    async fn apply(&self, changes: ChangeSet) -> Result<CommitReport> {
        (**self).apply(changes).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// 单条变更
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    kind: ChangeKind,
    row: SerializedEntity,
}

impl Change {
    pub fn new(kind: ChangeKind, row: SerializedEntity) -> Self {
        Self { kind, row }
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn row(&self) -> &SerializedEntity {
        &self.row
    }

    pub fn into_row(self) -> SerializedEntity {
        self.row
    }
}

/// 一次提交的有序变更集
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<Change>,
    atomic: bool,
}

impl ChangeSet {
    pub fn new(changes: Vec<Change>, atomic: bool) -> Self {
        Self { changes, atomic }
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// 是否要求整体生效
    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

/// 提交结果统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub committed_at: DateTime<Utc>,
}

impl Default for CommitReport {
    fn default() -> Self {
        Self {
            inserted: 0,
            updated: 0,
            deleted: 0,
            committed_at: Utc::now(),
        }
    }
}

impl CommitReport {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub(crate) fn record(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Insert => self.inserted += 1,
            ChangeKind::Update => self.updated += 1,
            ChangeKind::Delete => self.deleted += 1,
        }
    }
}
