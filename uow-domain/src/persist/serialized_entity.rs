use crate::{
    entity::Entity,
    error::{RepositoryError, RepositoryResult as Result},
    key_resolver::KeyResolver,
};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 实体在存储边界上的形态
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct SerializedEntity {
    /// 实体类型名
    entity_type: String,
    /// 主键的规范字符串形式
    key: String,
    /// 实体负载
    payload: Value,
}

impl SerializedEntity {
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// 从实体实例创建
    pub fn from_entity<E>(entity: &E) -> Result<Self>
    where
        E: Entity,
    {
        Ok(Self {
            entity_type: E::TYPE.to_string(),
            key: KeyResolver::encode_key::<E>(&entity.key())?,
            payload: serde_json::to_value(entity)?,
        })
    }

    /// 反序列化为实体实例
    pub fn to_entity<E>(&self) -> Result<E>
    where
        E: Entity,
    {
        if E::TYPE != self.entity_type {
            return Err(RepositoryError::TypeMismatch {
                expected: E::TYPE.to_string(),
                found: self.entity_type.clone(),
            });
        }

        let entity = serde_json::from_value(self.payload.clone())?;
        Ok(entity)
    }
}
