//! 通用仓储与工作单元基础库（uow-domain）
//!
//! 为任意实体类型提供一套可复用的数据访问抽象：
//! - 实体契约与元数据（`entity`、`model`），主键由类型自身声明；
//! - 主键解析器（`key_resolver`）：依据模型中的实体描述统一解析主键；
//! - 二进制状态编解码（`codec`）：将任意可序列化对象存为不透明字节块；
//! - 持久化上下文（`context`）：跟踪实体状态并以变更集提交；
//! - 存储协议与内存实现（`persist`）；
//! - 通用仓储（`repository`）：增删改查、批量操作、延迟查询与变更事件；
//! - 仓储配置（`config`）：六个独立开关，在构造时一次性应用。
//!
//! 本 crate 不绑定具体存储引擎，仅定义 `Store` 协议并附带一个内存实现，
//! 以便在不同基础设施上进行适配。
//!
//! 典型用法：
//! 1. 使用 `#[entity]` 声明实体及其 `#[key]` 字段；
//! 2. 在启动时通过 `Model::builder()` 登记实体类型；
//! 3. 以存储与模型创建 `DbContext`，再包装为 `Repository<E>`；
//! 4. 执行变更并按需提交，观察者在提交后收到 `DataEvent`。
//!
pub mod codec;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod key_resolver;
#[cfg(feature = "logging")]
pub mod logging;
pub mod model;
pub mod persist;
pub mod repository;

pub use config::RepositoryConfig;
pub use context::DbContext;
pub use entity::Entity;
pub use error::{RepositoryError, RepositoryResult};
pub use model::Model;
pub use repository::Repository;

// 允许在本 crate 内部通过 ::uow_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::uow_domain 路径。
extern crate self as uow_domain;
