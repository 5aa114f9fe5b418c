//! 仓储层统一错误定义
//!
//! 聚焦实体元数据、跟踪状态、提交与存储等最小必要集合，
//! 存储后端抛出的错误原样向上传递，不做二次翻译。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RepositoryError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 元数据 ---
    #[error("entity type not registered in model: {entity_type}")]
    UnregisteredEntity { entity_type: String },
    #[error("entity declares no key member: {entity_type}")]
    KeyNotDeclared { entity_type: String },
    #[error("invalid model: {reason}")]
    InvalidModel { reason: String },

    // --- 跟踪状态 ---
    #[error("identity conflict: type={entity_type}, key={key}")]
    IdentityConflict { entity_type: String, key: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },
    #[error("validation failed: type={entity_type}, key={key}, reason={reason}")]
    Validation {
        entity_type: String,
        key: String,
        reason: String,
    },

    // --- 存储/提交 ---
    #[error("duplicate key: type={entity_type}, key={key}")]
    DuplicateKey { entity_type: String, key: String },
    #[error("concurrency conflict: type={entity_type}, key={key}")]
    Concurrency { entity_type: String, key: String },
    #[error("store error: {reason}")]
    Store { reason: String },
    #[error("commit aborted: {reason}")]
    CommitAborted { reason: String },

    // --- 生命周期 ---
    #[error("repository disposed")]
    Disposed,
}

/// 统一 Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub fn not_found(reason: impl Into<String>) -> Self {
        RepositoryError::NotFound {
            reason: reason.into(),
        }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        RepositoryError::Store {
            reason: reason.into(),
        }
    }
}

impl From<tokio::task::JoinError> for RepositoryError {
    fn from(err: tokio::task::JoinError) -> Self {
        let reason = if err.is_cancelled() {
            "commit task cancelled".to_string()
        } else {
            err.to_string()
        };
        RepositoryError::CommitAborted { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = RepositoryError::IdentityConflict {
            entity_type: "customer".into(),
            key: "\"c-1\"".into(),
        };
        assert_eq!(
            err.to_string(),
            "identity conflict: type=customer, key=\"c-1\""
        );
        assert_eq!(RepositoryError::Disposed.to_string(), "repository disposed");
    }

    #[test]
    fn serde_errors_convert() {
        let err: RepositoryError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, RepositoryError::Serde { .. }));
    }
}
