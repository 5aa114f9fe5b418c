use uow_macros::entity;

#[entity]
struct Orphan {
    id: u64,
    name: String,
}

fn main() {}
