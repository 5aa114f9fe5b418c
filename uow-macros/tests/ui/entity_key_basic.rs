use uow_domain::entity::Entity;
use uow_macros::{entity, entity_key};

#[entity_key]
struct CustomerId(u64);

#[entity_key(debug = false)]
struct Sku(String);

impl std::fmt::Debug for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sku(..)")
    }
}

#[entity]
struct Customer {
    #[key]
    id: CustomerId,
    favourite: Option<Sku>,
}

fn main() {
    let id: CustomerId = "42".parse().unwrap();
    assert_eq!(id, CustomerId::new(42));
    assert_eq!(id.to_string(), "42");
    assert_eq!(*id.as_ref(), 42);
    assert_eq!(serde_json::to_string(&id).unwrap(), "42");

    let c = Customer {
        id: CustomerId::from(42),
        favourite: Some(Sku::new("tea".into())),
    };
    assert_eq!(c.key().into_inner(), 42);
    assert_eq!(format!("{:?}", Sku::new("x".into())), "Sku(..)");
}
