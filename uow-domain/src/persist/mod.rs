//! 持久化协议（persist）
//!
//! 定义仓储与底层存储之间的边界：
//! - 行在存储边界上的形态（`SerializedEntity`）；
//! - 一次提交的有序变更集与提交统计（`ChangeSet`、`CommitReport`）；
//! - 存储协议（`Store`）及内存实现（`InMemoryStore`）。
//!
//! 该模块聚焦协议，具体存储后端（如关系数据库）由上层提供实现并注入。
//!
mod inmemory_store;
mod serialized_entity;
mod store;

pub use inmemory_store::InMemoryStore;
pub use serialized_entity::SerializedEntity;
pub use store::{Change, ChangeKind, ChangeSet, CommitReport, Store};
