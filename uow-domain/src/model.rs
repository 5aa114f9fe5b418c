//! 模型（Model）
//!
//! 启动时一次性登记参与持久化的实体类型描述，供主键解析与上下文校验使用。
//!
use crate::entity::{Entity, EntityDescriptor};
use crate::error::{RepositoryError, RepositoryResult};
use indexmap::IndexMap;

/// 已登记实体描述的只读集合
#[derive(Debug, Clone, Default)]
pub struct Model {
    entities: IndexMap<&'static str, EntityDescriptor>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// 按类型名查找描述
    pub fn descriptor(&self, entity_type: &str) -> Option<&EntityDescriptor> {
        self.entities.get(entity_type)
    }

    /// 按 Rust 类型查找描述（类型名相同但 Rust 类型不同视为未登记）
    pub fn descriptor_of<E: Entity>(&self) -> Option<&EntityDescriptor> {
        self.entities
            .get(E::TYPE)
            .filter(|d| d.type_id() == std::any::TypeId::of::<E>())
    }

    pub fn contains<E: Entity>(&self) -> bool {
        self.descriptor_of::<E>().is_some()
    }

    /// 按登记顺序返回类型名
    pub fn entity_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// 模型构建器：`Model::builder().entity::<A>().entity::<B>().build()`
#[derive(Debug, Default)]
pub struct ModelBuilder {
    descriptors: Vec<EntityDescriptor>,
}

impl ModelBuilder {
    pub fn entity<E: Entity>(mut self) -> Self {
        self.descriptors.push(E::descriptor());
        self
    }

    pub fn descriptor(mut self, descriptor: EntityDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// 构建模型；重复登记同一类型是幂等的，同名不同类型则报错
    pub fn build(self) -> RepositoryResult<Model> {
        let mut entities: IndexMap<&'static str, EntityDescriptor> = IndexMap::new();

        for d in self.descriptors {
            match entities.get(d.entity_type()) {
                Some(existing) if existing.type_id() != d.type_id() => {
                    return Err(RepositoryError::InvalidModel {
                        reason: format!(
                            "entity type name '{}' registered by two different types",
                            d.entity_type()
                        ),
                    });
                }
                Some(_) => {}
                None => {
                    entities.insert(d.entity_type(), d);
                }
            }
        }

        Ok(Model { entities })
    }
}
