/// 会话状态示例
/// 使用二进制状态编解码将会话对象存为不透明字节块，再经由仓储持久化与还原
use anyhow::Result as AnyResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ulid::Ulid;
use uow_domain::codec;
use uow_domain::context::DbContext;
use uow_domain::persist::InMemoryStore;
use uow_domain::repository::Repository;
use uow_domain::{Model, RepositoryConfig};
use uow_macros::entity;

#[entity(name = "session")]
struct SessionRow {
    #[key]
    id: Ulid,
    data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WizardState {
    step: u8,
    answers: Vec<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> AnyResult<()> {
    println!("=== 会话状态示例 ===\n");

    let store = Arc::new(InMemoryStore::new());
    let model = Arc::new(Model::builder().entity::<SessionRow>().build()?);
    let open = || {
        Repository::<SessionRow>::with_config(
            DbContext::new(store.clone(), model.clone()),
            RepositoryConfig::default(),
        )
    };

    let state = WizardState {
        step: 2,
        answers: vec!["rust".into(), "tokio".into()],
    };
    let Some(data) = codec::serialize(&state) else {
        anyhow::bail!("wizard state is not serializable");
    };
    println!("✅ 编码 {} 字节", data.len());

    let id = Ulid::new();
    open()?.insert(SessionRow { id, data }, true).await?;

    let mut repo = open()?;
    let row = repo
        .get_by_id(&id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("session {id} missing"))?;
    let restored: Option<WizardState> = codec::deserialize(Some(row.data.as_slice()));
    println!("✅ 还原: {restored:?}");
    assert_eq!(restored, Some(state));

    let wrong: Option<Vec<u32>> = codec::deserialize(Some(row.data.as_slice()));
    println!("✅ 以其他类型读取: {wrong:?}");
    Ok(())
}
