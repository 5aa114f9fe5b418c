//! 仓储配置（RepositoryConfig）
//!
//! 六个相互独立的开关，在构造仓储时一次性应用到持久化上下文，此后在仓储生命周期内保持不变。
//!
use crate::error::RepositoryResult;
use bon::Builder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// 提交前自动检测已跟踪实体的就地修改
    #[builder(default = true)]
    auto_detect_changes: bool,
    /// 查询结果按需（逐行）解码
    #[builder(default = true)]
    lazy_loading: bool,
    /// 允许为实体生成延迟加载载体；关闭时延迟加载不生效
    #[builder(default = true)]
    proxy_creation: bool,
    /// 使用存储层的空值比较语义（三值逻辑）
    #[builder(default = false)]
    database_null_semantics: bool,
    /// 提交前执行实体校验
    #[builder(default = true)]
    validate_on_save: bool,
    /// 变更集整体提交（全部成功或全部不生效）
    #[builder(default = true)]
    ensure_transactions: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RepositoryConfig {
    /// 从 JSON 读取配置，缺省字段取默认值
    pub fn from_json(raw: &str) -> RepositoryResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn auto_detect_changes(&self) -> bool {
        self.auto_detect_changes
    }

    pub fn lazy_loading(&self) -> bool {
        self.lazy_loading
    }

    pub fn proxy_creation(&self) -> bool {
        self.proxy_creation
    }

    pub fn database_null_semantics(&self) -> bool {
        self.database_null_semantics
    }

    pub fn validate_on_save(&self) -> bool {
        self.validate_on_save
    }

    pub fn ensure_transactions(&self) -> bool {
        self.ensure_transactions
    }

    /// 延迟加载需要同时开启 `lazy_loading` 与 `proxy_creation`
    pub fn loading_strategy(&self) -> LoadingStrategy {
        if self.lazy_loading && self.proxy_creation {
            LoadingStrategy::Deferred
        } else {
            LoadingStrategy::Eager
        }
    }

    pub fn null_semantics(&self) -> NullSemantics {
        if self.database_null_semantics {
            NullSemantics::ThreeValued
        } else {
            NullSemantics::TwoValued
        }
    }
}

/// 查询结果的加载策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadingStrategy {
    /// 执行查询时一次性解码全部行
    Eager,
    /// 行在结果流被拉取时才解码
    Deferred,
}

/// 可空值的相等比较语义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullSemantics {
    /// `None == None`
    TwoValued,
    /// 任何一侧为 `None` 时比较结果都不成立（SQL 风格）
    ThreeValued,
}

impl NullSemantics {
    pub fn equals<V: PartialEq>(self, left: &Option<V>, right: &Option<V>) -> bool {
        match self {
            NullSemantics::TwoValued => left == right,
            NullSemantics::ThreeValued => matches!((left, right), (Some(l), Some(r)) if l == r),
        }
    }
}
