use uow_domain::entity::Entity;
use uow_macros::entity;

#[entity]
struct OrderLine {
    #[key]
    order_id: String,
    qty: u32,
    #[key]
    line_no: u16,
}

fn main() {
    assert_eq!(OrderLine::TYPE, "order_line");
    assert_eq!(OrderLine::KEY_MEMBERS, &["order_id", "line_no"]);
    assert!(OrderLine::descriptor().is_composite());

    let line = OrderLine {
        order_id: "o-1".into(),
        qty: 2,
        line_no: 3,
    };
    let key: (String, u16) = line.key();
    assert_eq!(key, ("o-1".to_string(), 3));
    assert_eq!(serde_json::to_string(&key).unwrap(), r#"["o-1",3]"#);
}
