//! 主键解析器（KeyResolver）
//!
//! 基于模型中登记的实体描述解析实例的主键值，
//! 凡是需要判断两个实例是否代表同一身份的地方（更新冲突、删除通知）都经由这里。
//!
use crate::entity::{Entity, EntityDescriptor};
use crate::error::{RepositoryError, RepositoryResult};
use crate::model::Model;

/// 可提供实体元数据的对象（模型本身、持久化上下文等）
pub trait MetadataSource {
    fn model(&self) -> &Model;
}

impl MetadataSource for Model {
    fn model(&self) -> &Model {
        self
    }
}

pub struct KeyResolver;

impl KeyResolver {
    /// 获取实体描述；未登记或未声明主键时报错
    pub fn descriptor<E, S>(source: &S) -> RepositoryResult<&EntityDescriptor>
    where
        E: Entity,
        S: MetadataSource + ?Sized,
    {
        let descriptor = source.model().descriptor_of::<E>().ok_or_else(|| {
            RepositoryError::UnregisteredEntity {
                entity_type: E::TYPE.to_string(),
            }
        })?;

        if !descriptor.has_key() {
            return Err(RepositoryError::KeyNotDeclared {
                entity_type: E::TYPE.to_string(),
            });
        }

        Ok(descriptor)
    }

    /// 解析实体的主键值
    pub fn resolve<E, S>(source: &S, entity: &E) -> RepositoryResult<E::Key>
    where
        E: Entity,
        S: MetadataSource + ?Sized,
    {
        Self::descriptor::<E, S>(source)?;
        Ok(entity.key())
    }

    /// 两个实例是否代表同一身份
    pub fn same_identity<E, S>(source: &S, a: &E, b: &E) -> RepositoryResult<bool>
    where
        E: Entity,
        S: MetadataSource + ?Sized,
    {
        Ok(Self::resolve(source, a)? == Self::resolve(source, b)?)
    }

    /// 主键的规范字符串形式（存储层按此寻址）
    pub fn encode_key<E: Entity>(key: &E::Key) -> RepositoryResult<String> {
        Ok(serde_json::to_string(key)?)
    }
}
