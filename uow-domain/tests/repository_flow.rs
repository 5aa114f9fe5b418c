use anyhow::Result as AnyResult;
use std::sync::{Arc, Mutex};
use uow_domain::context::{DbContext, EntityState};
use uow_domain::error::RepositoryError;
use uow_domain::persist::{InMemoryStore, SerializedEntity};
use uow_domain::repository::{
    ChannelObserver, CommitOutcome, DataEvent, Observers, Repository, RepositoryObserver,
    SaveOptions,
};
use uow_domain::{Model, RepositoryConfig};
use uow_macros::entity;

#[entity(validate = check_customer)]
#[derive(PartialEq)]
struct Customer {
    #[key]
    id: String,
    name: String,
    email: Option<String>,
}

fn check_customer(c: &Customer) -> Result<(), String> {
    if c.name.trim().is_empty() {
        return Err("name is required".into());
    }
    Ok(())
}

fn customer(id: &str, name: &str) -> Customer {
    Customer {
        id: id.into(),
        name: name.into(),
        email: None,
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

struct Logging(Arc<EventLog>);

impl RepositoryObserver<Customer> for Logging {
    fn on_data_added(&self, key: &String, _entity: &Customer) {
        self.0.events.lock().unwrap().push(format!("added:{key}"));
    }

    fn on_data_updated(&self, key: &String, _entity: &Customer) {
        self.0.events.lock().unwrap().push(format!("updated:{key}"));
    }

    fn on_data_deleted(&self, key: &String) {
        self.0.events.lock().unwrap().push(format!("deleted:{key}"));
    }
}

fn model() -> Model {
    Model::builder().entity::<Customer>().build().unwrap()
}

fn repository(
    store: &Arc<InMemoryStore>,
    config: RepositoryConfig,
) -> (Repository<Customer>, Arc<EventLog>) {
    let log = Arc::new(EventLog::default());
    let repo = Repository::with_config(DbContext::new(store.clone(), model()), config)
        .unwrap()
        .with_observers(Observers::new().with(Logging(log.clone())));
    (repo, log)
}

#[tokio::test]
async fn insert_with_save_then_get_by_id() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    let (mut repo, log) = repository(&store, RepositoryConfig::default());

    let ann = customer("c-1", "Ann");
    repo.insert(ann.clone(), SaveOptions::immediate()).await?;

    assert_eq!(log.take(), vec!["added:c-1"]);
    assert_eq!(repo.get_by_id(&"c-1".to_string()).await?, Some(ann.clone()));

    // 新的工作单元从存储读取
    let (mut fresh, _) = repository(&store, RepositoryConfig::default());
    assert_eq!(fresh.get_by_id(&"c-1".to_string()).await?, Some(ann));
    assert_eq!(
        fresh.entry_state(&"c-1".to_string()),
        EntityState::Unchanged
    );
    Ok(())
}

#[tokio::test]
async fn update_replaces_distinct_tracked_instance() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    store.seed(SerializedEntity::from_entity(&customer("c-1", "Ann"))?);
    let (mut repo, log) = repository(&store, RepositoryConfig::default());

    let tracked = repo.get_by_id(&"c-1".to_string()).await?.unwrap();
    let mut incoming = tracked.clone();
    incoming.email = Some("ann@example.com".into());

    repo.update(incoming.clone(), false).await?;
    assert_eq!(repo.local()?, vec![incoming.clone()]);
    assert!(!repo.local()?.contains(&tracked));

    repo.save(false).await?;
    let (mut fresh, _) = repository(&store, RepositoryConfig::default());
    assert_eq!(fresh.get_by_id(&"c-1".to_string()).await?, Some(incoming));
    assert_eq!(log.take(), vec!["updated:c-1"]);
    Ok(())
}

#[tokio::test]
async fn bulk_delete_notifies_in_order_after_commit() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    let batch = vec![customer("a", "A"), customer("b", "B"), customer("c", "C")];
    for c in &batch {
        store.seed(SerializedEntity::from_entity(c)?);
    }

    let (mut repo, _) = repository(&store, RepositoryConfig::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe_store = store.clone();
    let probe = seen.clone();
    repo.subscribe(uow_domain::repository::FnObserver::new(
        move |event: &DataEvent<Customer>| {
            // 通知时三条删除都已落库
            probe
                .lock()
                .unwrap()
                .push((event.key().clone(), probe_store.len("customer")));
        },
    ));

    let outcome = repo.bulk_delete(batch, true).await?;
    assert_eq!(outcome.report().map(|r| r.deleted), Some(3));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("a".to_string(), 0),
            ("b".to_string(), 0),
            ("c".to_string(), 0)
        ]
    );
    Ok(())
}

#[tokio::test]
async fn lazy_loading_toggle_is_independent() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    let config = RepositoryConfig::builder().lazy_loading(false).build();
    let (repo, _) = repository(&store, config);

    let cfg = repo.config();
    assert!(!cfg.lazy_loading());
    assert!(cfg.auto_detect_changes());
    assert!(cfg.proxy_creation());
    assert!(!cfg.database_null_semantics());
    assert!(cfg.validate_on_save());
    assert!(cfg.ensure_transactions());
    assert_eq!(
        repo.as_queryable()?.strategy(),
        uow_domain::config::LoadingStrategy::Eager
    );
    Ok(())
}

#[tokio::test]
async fn insert_then_delete_without_commit_is_net_zero() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    let (mut repo, log) = repository(&store, RepositoryConfig::default());

    let ann = customer("c-1", "Ann");
    repo.insert(ann.clone(), false).await?;
    repo.delete(ann, false).await?;
    let outcome = repo.save(false).await?;

    assert_eq!(outcome.report().map(|r| r.total()), Some(0));
    assert_eq!(store.len("customer"), 0);
    assert_eq!(store.commit_count(), 0);
    assert_eq!(log.take(), vec!["added:c-1", "deleted:c-1"]);
    Ok(())
}

#[tokio::test]
async fn insert_then_delete_with_commits() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    let (mut repo, log) = repository(&store, RepositoryConfig::default());

    let ann = customer("c-1", "Ann");
    repo.insert(ann.clone(), true).await?;
    assert_eq!(store.len("customer"), 1);
    repo.delete(ann, true).await?;

    assert_eq!(store.len("customer"), 0);
    assert_eq!(log.take(), vec!["added:c-1", "deleted:c-1"]);
    Ok(())
}

#[tokio::test]
async fn validation_failure_aborts_commit() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    let (mut repo, log) = repository(&store, RepositoryConfig::default());

    repo.insert(customer("c-1", "Ann"), false).await?;
    let err = repo
        .insert(customer("c-2", "  "), true)
        .await
        .unwrap_err();
    match err {
        RepositoryError::Validation { key, reason, .. } => {
            assert_eq!(key, "\"c-2\"");
            assert_eq!(reason, "name is required");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(store.len("customer"), 0);
    assert_eq!(log.take(), vec!["added:c-1"]);

    // 关闭校验后同一批变更可以提交
    let config = RepositoryConfig::builder().validate_on_save(false).build();
    let (mut lenient, _) = repository(&store, config);
    lenient.insert(customer("c-3", ""), true).await?;
    assert_eq!(store.len("customer"), 1);
    Ok(())
}

#[tokio::test]
async fn non_transactional_commit_keeps_earlier_changes() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    store.seed(SerializedEntity::from_entity(&customer("b", "B"))?);

    let config = RepositoryConfig::builder().ensure_transactions(false).build();
    let (mut repo, _) = repository(&store, config);
    repo.insert(customer("a", "A"), false).await?;
    repo.insert(customer("b", "dup"), false).await?;

    let err = repo.save(false).await.unwrap_err();
    assert!(matches!(err, RepositoryError::DuplicateKey { .. }));
    assert!(store.contains("customer", "\"a\""));

    // 事务模式下同样的变更集整体回退
    let store = Arc::new(InMemoryStore::new());
    store.seed(SerializedEntity::from_entity(&customer("b", "B"))?);
    let (mut repo, _) = repository(&store, RepositoryConfig::default());
    repo.insert(customer("a", "A"), false).await?;
    repo.insert(customer("b", "dup"), false).await?;
    assert!(repo.save(false).await.is_err());
    assert!(!store.contains("customer", "\"a\""));
    Ok(())
}

#[tokio::test]
async fn async_save_reports_through_handle() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    let (mut repo, log) = repository(&store, RepositoryConfig::default());

    let outcome = repo
        .insert(customer("c-1", "Ann"), SaveOptions::background())
        .await?;
    assert!(matches!(outcome, CommitOutcome::Pending(_)));
    assert_eq!(log.take(), vec!["added:c-1"]);
    let report = outcome.wait().await?.unwrap();
    assert_eq!(report.inserted, 1);

    repo.insert(customer("c-2", "Bob"), false).await?;
    store.fail_next_commit("replica unavailable");
    let CommitOutcome::Pending(handle) = repo.save(true).await? else {
        panic!("expected a pending commit");
    };
    let err = handle.await.unwrap_err();
    assert_eq!(err.to_string(), "store error: replica unavailable");
    assert!(!store.contains("customer", "\"c-2\""));
    Ok(())
}

#[tokio::test]
async fn channel_observer_streams_changes() -> AnyResult<()> {
    use futures_util::StreamExt;

    let store = Arc::new(InMemoryStore::new());
    let (mut repo, _) = repository(&store, RepositoryConfig::default());
    let (observer, events) = ChannelObserver::new();
    let id = repo.subscribe(observer);

    repo.bulk_insert(vec![customer("a", "A"), customer("b", "B")], true)
        .await?;
    repo.update(customer("a", "Ada"), true).await?;
    assert!(repo.unsubscribe(id));
    repo.delete_by_id("b".to_string(), true).await?;
    repo.dispose();

    let kinds: Vec<_> = events
        .map(|e| format!("{}:{}", e.kind(), e.key()))
        .collect()
        .await;
    assert_eq!(kinds, vec!["added:a", "added:b", "updated:a"]);
    Ok(())
}

#[tokio::test]
async fn queries_see_committed_rows_only() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    let (mut repo, _) = repository(&store, RepositoryConfig::default());

    repo.insert(customer("a", "Ann"), true).await?;
    repo.insert(customer("b", "Bob"), false).await?;

    let names: Vec<_> = repo
        .as_queryable()?
        .order_by(|c| c.name.clone())
        .to_list()
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Ann"]);
    assert_eq!(repo.local()?.len(), 2);

    repo.save(false).await?;
    assert_eq!(repo.as_queryable()?.count().await?, 2);
    assert!(
        repo.as_queryable()?
            .filter_eq(|c| c.email.clone(), None)
            .any()
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn dispose_releases_once() -> AnyResult<()> {
    let store = Arc::new(InMemoryStore::new());
    let (mut repo, _) = repository(&store, RepositoryConfig::default());
    repo.insert(customer("a", "A"), false).await?;

    assert!(repo.dispose());
    assert!(!repo.dispose());
    assert!(matches!(
        repo.get_by_id(&"a".to_string()).await.unwrap_err(),
        RepositoryError::Disposed
    ));
    assert!(matches!(
        repo.save(false).await.unwrap_err(),
        RepositoryError::Disposed
    ));
    assert_eq!(store.len("customer"), 0);
    Ok(())
}

#[tokio::test]
async fn unregistered_entity_is_rejected_at_construction() {
    #[entity]
    struct Stray {
        #[key]
        id: u8,
    }

    let store = Arc::new(InMemoryStore::new());
    let err = Repository::<Stray>::new(DbContext::new(store, model())).unwrap_err();
    assert!(matches!(err, RepositoryError::UnregisteredEntity { .. }));
}
