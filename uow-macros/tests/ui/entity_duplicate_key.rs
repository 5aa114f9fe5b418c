use uow_macros::entity;

#[entity]
struct Ledger {
    #[key]
    #[key]
    id: u64,
    balance: i64,
}

fn main() {}
