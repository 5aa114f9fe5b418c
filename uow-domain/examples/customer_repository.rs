/// 通用仓储示例
/// 展示登记实体、增删改查、批量操作、延迟查询、变更通知与后台提交
use anyhow::Result as AnyResult;
use std::sync::Arc;
use uow_domain::context::DbContext;
use uow_domain::logging::{self, Profile};
use uow_domain::persist::InMemoryStore;
use uow_domain::repository::{DataEvent, FnObserver, Observers, Repository, SaveOptions};
use uow_domain::{Model, RepositoryConfig};
use uow_macros::entity;

#[entity(validate = check_customer)]
struct Customer {
    #[key]
    id: u32,
    name: String,
    city: Option<String>,
}

fn check_customer(c: &Customer) -> Result<(), String> {
    if c.name.is_empty() {
        return Err("name is required".into());
    }
    Ok(())
}

fn customer(id: u32, name: &str, city: Option<&str>) -> Customer {
    Customer {
        id,
        name: name.into(),
        city: city.map(Into::into),
    }
}

fn printer() -> FnObserver<impl Fn(&DataEvent<Customer>) + Send + Sync> {
    FnObserver::new(|event: &DataEvent<Customer>| {
        println!("  📣 {} #{}", event.kind(), event.key());
    })
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> AnyResult<()> {
    logging::init(Profile::Development);
    println!("=== 通用仓储示例 ===\n");

    let store = Arc::new(InMemoryStore::new());
    let model = Arc::new(Model::builder().entity::<Customer>().build()?);

    // 第一个工作单元：写入
    {
        let context = DbContext::new(store.clone(), model.clone());
        let mut repo = Repository::<Customer>::with_config(context, RepositoryConfig::default())?
            .with_observers(Observers::new().with(printer()));

        repo.insert(customer(1, "Ann", Some("Oslo")), SaveOptions::immediate())
            .await?;
        repo.bulk_insert(
            vec![
                customer(2, "Bob", None),
                customer(3, "Cai", Some("Lyon")),
                customer(4, "Dee", Some("Oslo")),
            ],
            true,
        )
        .await?;
        println!("✅ 已写入 {} 行", store.len("customer"));

        repo.update(customer(2, "Bob", Some("Ghent")), true).await?;
        repo.delete_by_id(4, true).await?;

        let report = repo
            .insert(customer(5, "Eve", None), SaveOptions::background())
            .await?
            .wait()
            .await?;
        println!("✅ 后台提交完成: {report:?}");
    }

    // 第二个工作单元：查询（三值空值语义）
    let config = RepositoryConfig::builder()
        .database_null_semantics(true)
        .build();
    let mut repo = Repository::<Customer>::with_config(DbContext::new(store.clone(), model), config)?;

    let oslo = repo
        .as_queryable()?
        .filter_eq(|c| c.city.clone(), Some("Oslo".to_string()))
        .order_by(|c| c.name.clone())
        .to_list()
        .await?;
    println!("✅ Oslo: {:?}", oslo.iter().map(|c| &c.name).collect::<Vec<_>>());

    let unknown_city = repo
        .as_queryable()?
        .filter_eq(|c| c.city.clone(), None)
        .count()
        .await?;
    println!("✅ city = NULL（三值逻辑）: {unknown_city}");

    if let Some(c) = repo.get_by_id(&3).await? {
        println!("✅ get_by_id(3): {c:?}");
    }

    let err = repo.insert(customer(6, "", None), true).await.unwrap_err();
    println!("✅ 校验失败: {err}");

    repo.dispose();
    println!("\n✅ 仓储已释放");
    Ok(())
}
