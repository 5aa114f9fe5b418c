//! 延迟查询（Query）
//!
//! 针对存储中某一实体类型全部行的可组合查询：
//! - 组合算子（`filter`、`filter_eq`、`order_by`、`skip`、`take` 等）只记录意图，不访问存储；
//! - 终结算子（`to_list`、`first`、`count`、`any`、`stream`）执行时才读取存储；
//! - `Deferred` 加载下且无排序时按需逐行解码，否则执行时一次性解码全部行。
//!
//! 查询结果不进入跟踪表。
//!
use crate::config::{LoadingStrategy, NullSemantics, RepositoryConfig};
use crate::entity::Entity;
use crate::error::{RepositoryError, RepositoryResult as Result};
use crate::persist::Store;
use futures_core::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt, future, stream};
use std::cmp::Ordering;
use std::sync::Arc;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type Comparator<E> = Arc<dyn Fn(&E, &E) -> Ordering + Send + Sync>;

pub struct Query<E: Entity> {
    store: Arc<dyn Store>,
    strategy: LoadingStrategy,
    null_semantics: NullSemantics,
    predicates: Vec<Predicate<E>>,
    ordering: Vec<Comparator<E>>,
    skip: usize,
    take: Option<usize>,
}

impl<E: Entity> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            strategy: self.strategy,
            null_semantics: self.null_semantics,
            predicates: self.predicates.clone(),
            ordering: self.ordering.clone(),
            skip: self.skip,
            take: self.take,
        }
    }
}

impl<E: Entity> std::fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("entity_type", &E::TYPE)
            .field("strategy", &self.strategy)
            .field("null_semantics", &self.null_semantics)
            .field("predicates", &self.predicates.len())
            .field("ordering", &self.ordering.len())
            .field("skip", &self.skip)
            .field("take", &self.take)
            .finish()
    }
}

impl<E: Entity> Query<E> {
    pub(crate) fn new(store: Arc<dyn Store>, config: &RepositoryConfig) -> Self {
        Self {
            store,
            strategy: config.loading_strategy(),
            null_semantics: config.null_semantics(),
            predicates: Vec::new(),
            ordering: Vec::new(),
            skip: 0,
            take: None,
        }
    }

    pub fn strategy(&self) -> LoadingStrategy {
        self.strategy
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// 可空字段的相等过滤，比较语义取决于 `database_null_semantics`
    pub fn filter_eq<V, F>(self, field: F, value: Option<V>) -> Self
    where
        V: PartialEq + Send + Sync + 'static,
        F: Fn(&E) -> Option<V> + Send + Sync + 'static,
    {
        let semantics = self.null_semantics;
        self.filter(move |e| semantics.equals(&field(e), &value))
    }

    /// 以 `key` 升序排序，替换已有排序
    pub fn order_by<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.ordering.clear();
        self.then_by(key)
    }

    pub fn order_by_desc<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.ordering.clear();
        self.then_by_desc(key)
    }

    /// 追加次级排序
    pub fn then_by<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.ordering.push(Arc::new(move |a, b| key(a).cmp(&key(b))));
        self
    }

    pub fn then_by_desc<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&E) -> K + Send + Sync + 'static,
    {
        self.ordering.push(Arc::new(move |a, b| key(b).cmp(&key(a))));
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = self.skip.saturating_add(n);
        self
    }

    pub fn take(mut self, n: usize) -> Self {
        self.take = Some(self.take.map_or(n, |t| t.min(n)));
        self
    }

    /// 执行查询并以流的形式返回结果
    pub fn stream(self) -> BoxStream<'static, Result<E>> {
        let Self {
            store,
            strategy,
            predicates,
            ordering,
            skip,
            take,
            ..
        } = self;
        let matches = move |e: &E| predicates.iter().all(|p| p(e));

        let entities: BoxStream<'static, Result<E>> =
            if strategy == LoadingStrategy::Deferred && ordering.is_empty() {
                stream::once(async move { store.scan(E::TYPE).await })
                    .map_ok(|rows| stream::iter(rows.into_iter().map(|row| row.to_entity::<E>())))
                    .try_flatten()
                    .try_filter(move |e| future::ready(matches(e)))
                    .boxed()
            } else {
                stream::once(async move {
                    let rows = store.scan(E::TYPE).await?;
                    let mut entities = rows
                        .iter()
                        .map(|row| row.to_entity::<E>())
                        .collect::<Result<Vec<_>>>()?;
                    entities.retain(|e| matches(e));
                    entities.sort_by(|a, b| compare(&ordering, a, b));
                    let entities = entities.into_iter().map(Ok::<E, RepositoryError>);
                    Ok::<_, RepositoryError>(stream::iter(entities))
                })
                .try_flatten()
                .boxed()
            };

        let entities = entities.skip(skip);
        match take {
            Some(n) => entities.take(n).boxed(),
            None => entities.boxed(),
        }
    }

    pub async fn to_list(self) -> Result<Vec<E>> {
        self.stream().try_collect().await
    }

    pub async fn first(self) -> Result<Option<E>> {
        self.take(1).stream().try_next().await
    }

    pub async fn count(self) -> Result<usize> {
        self.stream()
            .try_fold(0usize, |n, _| future::ready(Ok(n + 1)))
            .await
    }

    pub async fn any(self) -> Result<bool> {
        Ok(self.first().await?.is_some())
    }
}

fn compare<E>(ordering: &[Comparator<E>], a: &E, b: &E) -> Ordering {
    ordering
        .iter()
        .map(|cmp| cmp(a, b))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}
