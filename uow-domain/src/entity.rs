//! 实体（Entity）基础抽象
//!
//! 实体在类型自身上声明主键成员（通常由 `#[entity]` 宏配合 `#[key]` 字段生成），
//! 仓储通过 `EntityDescriptor` 发现主键，而不是为每个类型手写比较逻辑。
//!
use serde::{Serialize, de::DeserializeOwned};
use std::any::TypeId;
use std::fmt;
use std::hash::Hash;

/// 主键类型需要满足的能力边界（单值或元组形式的复合主键均可）
pub trait EntityKey:
    Clone + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> EntityKey for T where
    T: Clone + Eq + Hash + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// 可被仓储管理的实体
pub trait Entity:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// 实体类型名（存储层以此区分集合）
    const TYPE: &'static str;

    /// 声明为主键的成员名，按声明顺序排列；为空表示未声明主键
    const KEY_MEMBERS: &'static [&'static str];

    /// 主键类型
    type Key: EntityKey;

    /// 提取主键值
    fn key(&self) -> Self::Key;

    /// 提交前校验（`validate_on_save` 开启时调用）
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// 该类型的元数据描述
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
    }
}

/// 实体元数据：类型名、主键成员与 Rust 类型标识
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescriptor {
    entity_type: &'static str,
    key_members: &'static [&'static str],
    type_id: TypeId,
}

impl EntityDescriptor {
    pub fn of<E: Entity>() -> Self {
        Self {
            entity_type: E::TYPE,
            key_members: E::KEY_MEMBERS,
            type_id: TypeId::of::<E>(),
        }
    }

    pub fn entity_type(&self) -> &'static str {
        self.entity_type
    }

    pub fn key_members(&self) -> &'static [&'static str] {
        self.key_members
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn has_key(&self) -> bool {
        !self.key_members.is_empty()
    }

    pub fn is_composite(&self) -> bool {
        self.key_members.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uow_macros::entity;

    #[entity(name = "order_line")]
    struct OrderLine {
        #[key]
        order_id: String,
        #[key]
        line_no: u32,
        sku: String,
    }

    #[entity]
    struct Tag {
        #[key]
        id: u64,
        label: String,
    }

    #[test]
    fn composite_key_is_tuple_in_declaration_order() {
        let line = OrderLine {
            order_id: "o-1".into(),
            line_no: 2,
            sku: "sku-9".into(),
        };
        assert_eq!(line.key(), ("o-1".to_string(), 2));
        assert_eq!(OrderLine::KEY_MEMBERS, &["order_id", "line_no"]);

        let d = OrderLine::descriptor();
        assert_eq!(d.entity_type(), "order_line");
        assert!(d.has_key());
        assert!(d.is_composite());
        assert_eq!(line.sku, "sku-9");
    }

    #[test]
    fn default_type_name_is_snake_case() {
        let tag = Tag {
            id: 7,
            label: "x".into(),
        };
        assert_eq!(Tag::TYPE, "tag");
        assert_eq!(tag.key(), 7);
        assert!(!Tag::descriptor().is_composite());
        assert_eq!(tag.label, "x");
    }
}
