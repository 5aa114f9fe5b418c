//! 内存版存储（InMemoryStore）
//!
//! 基于 `DashMap` 的轻量存储，满足 `Store` 协议：
//! - 每个实体类型一张按规范主键排序的表；
//! - 提交经由互斥闸门串行执行，原子变更集先在副本上演练，成功后整体写回；
//! - 插入已存在的主键返回 `DuplicateKey`，更新/删除不存在的行返回 `Concurrency`；
//! - 典型用途：测试环境、示例与本地开发。
//!
use crate::error::{RepositoryError, RepositoryResult as Result};
use crate::persist::{Change, ChangeKind, ChangeSet, CommitReport, SerializedEntity, Store};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

type Table = BTreeMap<String, SerializedEntity>;

#[derive(Default)]
pub struct InMemoryStore {
    tables: DashMap<String, Table>,
    commit_gate: tokio::sync::Mutex<()>,
    commits: AtomicUsize,
    injected_failure: Mutex<Option<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一行数据（绕过变更集，便于测试与示例准备数据）
    pub fn seed(&self, row: SerializedEntity) {
        self.tables
            .entry(row.entity_type().to_string())
            .or_default()
            .insert(row.key().to_string(), row);
    }

    /// 某类型当前的行数
    pub fn len(&self, entity_type: &str) -> usize {
        self.tables.get(entity_type).map(|t| t.value().len()).unwrap_or(0)
    }

    pub fn contains(&self, entity_type: &str, key: &str) -> bool {
        self.tables
            .get(entity_type)
            .map(|t| t.value().contains_key(key))
            .unwrap_or(false)
    }

    /// 已成功应用的变更集数量
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }

    /// 令下一次 `apply` 以存储错误失败
    pub fn fail_next_commit(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.injected_failure.lock() {
            *slot = Some(reason.into());
        }
    }

    fn take_injected_failure(&self) -> Option<String> {
        self.injected_failure
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
    }

    fn apply_one(table: &mut Table, change: Change, report: &mut CommitReport) -> Result<()> {
        let kind = change.kind();
        let row = change.into_row();
        let exists = table.contains_key(row.key());

        match (kind, exists) {
            (ChangeKind::Insert, true) => {
                return Err(RepositoryError::DuplicateKey {
                    entity_type: row.entity_type().to_string(),
                    key: row.key().to_string(),
                });
            }
            (ChangeKind::Update | ChangeKind::Delete, false) => {
                return Err(RepositoryError::Concurrency {
                    entity_type: row.entity_type().to_string(),
                    key: row.key().to_string(),
                });
            }
            (ChangeKind::Delete, true) => {
                table.remove(row.key());
            }
            (ChangeKind::Insert | ChangeKind::Update, _) => {
                table.insert(row.key().to_string(), row);
            }
        }

        report.record(kind);
        Ok(())
    }

    fn apply_staged(&self, changes: Vec<Change>, report: &mut CommitReport) -> Result<()> {
        let mut staged: HashMap<String, Table> = HashMap::new();

        for change in changes {
            let entity_type = change.row().entity_type().to_string();
            let table = staged.entry(entity_type.clone()).or_insert_with(|| {
                self.tables
                    .get(&entity_type)
                    .map(|t| t.value().clone())
                    .unwrap_or_default()
            });
            Self::apply_one(table, change, report)?;
        }

        for (entity_type, table) in staged {
            self.tables.insert(entity_type, table);
        }
        Ok(())
    }

    fn apply_in_place(&self, changes: Vec<Change>, report: &mut CommitReport) -> Result<()> {
        for change in changes {
            let mut table = self
                .tables
                .entry(change.row().entity_type().to_string())
                .or_default();
            Self::apply_one(&mut table, change, report)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find(&self, entity_type: &str, key: &str) -> Result<Option<SerializedEntity>> {
        Ok(self
            .tables
            .get(entity_type)
            .and_then(|t| t.value().get(key).cloned()))
    }

    async fn scan(&self, entity_type: &str) -> Result<Vec<SerializedEntity>> {
        Ok(self
            .tables
            .get(entity_type)
            .map(|t| t.value().values().cloned().collect())
            .unwrap_or_default())
    }

    async fn apply(&self, changes: ChangeSet) -> Result<CommitReport> {
        let _gate = self.commit_gate.lock().await;

        if let Some(reason) = self.take_injected_failure() {
            warn!(%reason, "injected store failure");
            return Err(RepositoryError::store(reason));
        }

        let atomic = changes.is_atomic();
        let size = changes.len();
        let mut report = CommitReport::default();

        if atomic {
            self.apply_staged(changes.into_changes(), &mut report)?;
        } else {
            self.apply_in_place(changes.into_changes(), &mut report)?;
        }

        self.commits.fetch_add(1, Ordering::Relaxed);
        debug!(
            atomic,
            size,
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            "change set applied"
        );
        Ok(report)
    }
}
